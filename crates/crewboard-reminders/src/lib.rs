//! Reminder notification engine: polls a reminder snapshot, announces each
//! `(reminder, lead time)` once, and resolves snooze directives.

mod clock;
mod dispatcher;
mod engine;
mod error;
mod ledger;
mod permission;
mod platform;
mod snooze;
mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{
    build_notification, deep_link, CheckSummary, DispatchSettings, NotificationDispatcher,
};
pub use engine::{PollHandle, ReminderEngine, SnoozeHandler};
pub use error::{EngineError, NotifyError, SnoozeError, SoundError};
pub use ledger::DeduplicationLedger;
pub use permission::PermissionGate;
pub use platform::{
    Haptics, IntentSender, NoHaptics, NotificationIntent, NotificationPlatform, Permission,
    PlatformNotification, SilentPlayer, SoundPlayer, SoundRequest, VIBRATION_PATTERN_MS,
};
pub use snooze::{resolve_in, snooze_reminder, SnoozeDirective, SnoozeZone, SNOOZE_RESUME_HOUR};
pub use source::{ReminderSource, SharedReminders};
