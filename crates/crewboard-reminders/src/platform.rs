use crate::{NotifyError, SnoozeDirective, SoundError};
use async_trait::async_trait;
use crewboard_core::{Priority, ReminderId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use url::Url;

/// Vibrate, pause, vibrate.
pub const VIBRATION_PATTERN_MS: [u64; 3] = [200, 100, 200];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Never asked.
    Default,
    Granted,
    Denied,
}

impl Permission {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Default => 0,
            Self::Granted => 1,
            Self::Denied => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Granted,
            2 => Self::Denied,
            _ => Self::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformNotification {
    pub title: String,
    pub body: String,
    /// Coalescing key; a newer notification with the same tag replaces the old one.
    pub tag: ReminderId,
    pub require_interaction: bool,
    pub priority: Priority,
    pub deep_link: Url,
}

/// User actions taken on a shown notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationIntent {
    Snooze {
        reminder_id: ReminderId,
        directive: SnoozeDirective,
    },
    Dismiss {
        reminder_id: ReminderId,
    },
}

/// Route for notification actions back into the engine that showed them.
#[derive(Debug, Clone)]
pub struct IntentSender(mpsc::UnboundedSender<NotificationIntent>);

impl IntentSender {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationIntent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    /// Returns `false` once the engine has been disposed.
    pub fn send(&self, intent: NotificationIntent) -> bool {
        self.0.send(intent).is_ok()
    }
}

#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    /// Current permission without prompting.
    fn permission(&self) -> Result<Permission, NotifyError>;

    async fn request_permission(&self) -> Result<Permission, NotifyError>;

    fn show(
        &self,
        notification: PlatformNotification,
        intents: IntentSender,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundRequest {
    pub priority: Priority,
    pub volume: f32,
}

/// Starts playback and returns without waiting for it to finish.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, request: SoundRequest) -> Result<(), SoundError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentPlayer;

impl SoundPlayer for SilentPlayer {
    fn play(&self, _request: SoundRequest) -> Result<(), SoundError> {
        Ok(())
    }
}

pub trait Haptics: Send + Sync {
    fn is_supported(&self) -> bool;

    fn vibrate(&self, pattern_ms: &[u64]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn is_supported(&self) -> bool {
        false
    }

    fn vibrate(&self, _pattern_ms: &[u64]) {}
}
