use chrono::NaiveDate;
use crewboard_core::Priority;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifications unsupported: {0}")]
    Unsupported(String),
    #[error("failed to show notification: {0}")]
    Show(String),
}

#[derive(Debug, Error)]
pub enum SoundError {
    #[error("no sound available for {0} priority")]
    Missing(Priority),
    #[error("sound playback failed: {0}")]
    Playback(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SnoozeError {
    #[error("invalid snooze code {0}: expected minutes > 0, -1 or -2")]
    InvalidDirective(i64),
    #[error("09:00 does not exist on {0} in the snooze time zone")]
    NonexistentLocalTime(NaiveDate),
    #[error("snooze target is out of range")]
    OutOfRange,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] crewboard_config::ConfigError),
    #[error("reminder engine already started")]
    AlreadyStarted,
}
