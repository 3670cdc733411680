use crate::ConfigError;
use chrono_tz::Tz;
use crewboard_core::Priority;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: u32,
    pub profile_name: String,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.notifications.validate()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Play the priority sound when a reminder fires.
    pub sound: bool,
    /// Playback volume, 0.0 to 1.0.
    pub volume: f32,
    /// Vibrate on dispatch where the device supports it.
    pub vibrate: bool,
    pub poll_interval_secs: u64,
    /// Half-width of the window around a reminder's notify time.
    pub match_window_secs: u64,
    /// Base URL of the web client; deep links append `#/reminders/{id}`.
    pub app_url: Url,
    /// IANA zone used for "tomorrow" and "next Monday" snoozes. System zone if unset.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub sounds: SoundTable,
}

impl NotificationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.volume) || self.volume.is_nan() {
            return Err(ConfigError::Invalid {
                field: "notifications.volume",
                reason: format!("{} is outside 0.0..=1.0", self.volume),
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "notifications.poll_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.match_window_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "notifications.match_window_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.timezone()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<Option<Tz>, ConfigError> {
        match self.timezone.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(name) => name.parse::<Tz>().map(Some).map_err(|_| ConfigError::Invalid {
                field: "notifications.timezone",
                reason: format!("unknown time zone {name}"),
            }),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sound: true,
            volume: 0.7,
            vibrate: true,
            poll_interval_secs: 30,
            match_window_secs: 60,
            app_url: Url::parse("http://localhost:3000/").expect("static url"),
            timezone: None,
            sounds: SoundTable::default(),
        }
    }
}

/// Sound file per priority. Relative names resolve against the data dir's `sounds/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SoundTable {
    pub low: String,
    pub medium: String,
    pub high: String,
    pub urgent: String,
}

impl SoundTable {
    pub fn for_priority(&self, priority: Priority) -> &str {
        match priority {
            Priority::Low => &self.low,
            Priority::Medium => &self.medium,
            Priority::High => &self.high,
            Priority::Urgent => &self.urgent,
        }
    }
}

impl Default for SoundTable {
    fn default() -> Self {
        Self {
            low: "notification-low.wav".to_string(),
            medium: "notification-medium.wav".to_string(),
            high: "notification-high.wav".to_string(),
            urgent: "notification-urgent.wav".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Reminder snapshot written by the web client, relative to the data dir.
    pub reminders_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reminders_file: "reminders.json".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            profile_name: "default".to_string(),
            notifications: NotificationConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}
