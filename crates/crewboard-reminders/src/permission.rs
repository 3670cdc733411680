use crate::{NotificationPlatform, Permission};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Platform notification permission, asked for lazily.
///
/// Clones share state. Once disposed, results of in-flight requests are
/// dropped instead of being applied.
#[derive(Clone)]
pub struct PermissionGate {
    platform: Arc<dyn NotificationPlatform>,
    state: Arc<GateState>,
}

struct GateState {
    permission: AtomicU8,
    auto_requested: AtomicBool,
    disposed: AtomicBool,
}

impl PermissionGate {
    pub fn new(platform: Arc<dyn NotificationPlatform>) -> Self {
        let initial = match platform.permission() {
            Ok(permission) => permission,
            Err(err) => {
                tracing::warn!("notification permission unavailable: {err}");
                Permission::Default
            }
        };

        Self {
            platform,
            state: Arc::new(GateState {
                permission: AtomicU8::new(initial.to_u8()),
                auto_requested: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn permission(&self) -> Permission {
        Permission::from_u8(self.state.permission.load(Ordering::Acquire))
    }

    /// Asks the platform now and reports whether permission is granted.
    pub async fn request_permission(&self) -> bool {
        match self.platform.request_permission().await {
            Ok(permission) => {
                if self.is_disposed() {
                    tracing::debug!(?permission, "permission answer arrived after dispose");
                    return false;
                }
                self.state
                    .permission
                    .store(permission.to_u8(), Ordering::Release);
                tracing::info!(?permission, "notification permission updated");
                permission == Permission::Granted
            }
            Err(err) => {
                tracing::warn!("notification permission request failed: {err}");
                false
            }
        }
    }

    /// First-run prompt: requests only while undecided, and at most once per gate.
    pub async fn request_if_undecided(&self) -> Option<bool> {
        if self.permission() != Permission::Default {
            return None;
        }
        if self.state.auto_requested.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(self.request_permission().await)
    }

    pub fn dispose(&self) {
        self.state.disposed.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::Acquire)
    }
}
