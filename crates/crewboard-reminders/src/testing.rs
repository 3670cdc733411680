use crate::{
    Haptics, IntentSender, NotificationPlatform, NotifyError, Permission, PlatformNotification,
    SoundError, SoundPlayer, SoundRequest,
};
use async_trait::async_trait;
use crewboard_core::ReminderId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) struct FakePlatform {
    unsupported: bool,
    current: Mutex<Permission>,
    answer: Mutex<Permission>,
    requests: AtomicUsize,
    shown: Mutex<Vec<PlatformNotification>>,
    failing: Mutex<HashSet<ReminderId>>,
    intents: Mutex<Option<IntentSender>>,
}

impl FakePlatform {
    pub(crate) fn new(current: Permission) -> Self {
        Self {
            unsupported: false,
            current: Mutex::new(current),
            answer: Mutex::new(current),
            requests: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            intents: Mutex::new(None),
        }
    }

    pub(crate) fn granted() -> Self {
        Self::new(Permission::Granted)
    }

    pub(crate) fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::new(Permission::Default)
        }
    }

    pub(crate) fn answer_with(&self, permission: Permission) {
        *self.answer.lock().unwrap() = permission;
    }

    pub(crate) fn fail_for(&self, id: &str) {
        self.failing.lock().unwrap().insert(ReminderId::from(id));
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub(crate) fn shown(&self) -> Vec<PlatformNotification> {
        self.shown.lock().unwrap().clone()
    }

    pub(crate) fn last_intents(&self) -> Option<IntentSender> {
        self.intents.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPlatform for FakePlatform {
    fn permission(&self) -> Result<Permission, NotifyError> {
        if self.unsupported {
            return Err(NotifyError::Unsupported("fake".to_string()));
        }
        Ok(*self.current.lock().unwrap())
    }

    async fn request_permission(&self) -> Result<Permission, NotifyError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.unsupported {
            return Err(NotifyError::Unsupported("fake".to_string()));
        }
        let answer = *self.answer.lock().unwrap();
        *self.current.lock().unwrap() = answer;
        Ok(answer)
    }

    fn show(
        &self,
        notification: PlatformNotification,
        intents: IntentSender,
    ) -> Result<(), NotifyError> {
        if self.failing.lock().unwrap().contains(&notification.tag) {
            return Err(NotifyError::Show("fake failure".to_string()));
        }
        self.shown.lock().unwrap().push(notification);
        *self.intents.lock().unwrap() = Some(intents);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSound {
    pub(crate) fail: bool,
    plays: Mutex<Vec<SoundRequest>>,
}

impl RecordingSound {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn plays(&self) -> Vec<SoundRequest> {
        self.plays.lock().unwrap().clone()
    }
}

impl SoundPlayer for RecordingSound {
    fn play(&self, request: SoundRequest) -> Result<(), SoundError> {
        self.plays.lock().unwrap().push(request);
        if self.fail {
            return Err(SoundError::Playback("fake".to_string()));
        }
        Ok(())
    }
}

pub(crate) struct RecordingHaptics {
    supported: bool,
    calls: AtomicUsize,
}

impl RecordingHaptics {
    pub(crate) fn new(supported: bool) -> Self {
        Self {
            supported,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Haptics for RecordingHaptics {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn vibrate(&self, _pattern_ms: &[u64]) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}
