use crate::{
    DeduplicationLedger, Haptics, IntentSender, NotificationPlatform, NotifyError, Permission,
    PlatformNotification, SoundPlayer, SoundRequest, VIBRATION_PATTERN_MS,
};
use chrono::{DateTime, Duration, Utc};
use crewboard_config::NotificationConfig;
use crewboard_core::{Priority, Reminder, ReminderId};
use std::iter;
use std::sync::Arc;
use url::Url;

const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub sound: bool,
    pub volume: f32,
    pub vibrate: bool,
    pub match_window: Duration,
    pub app_url: Url,
}

impl From<&NotificationConfig> for DispatchSettings {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            sound: config.sound,
            volume: config.volume.clamp(0.0, 1.0),
            vibrate: config.vibrate,
            match_window: Duration::seconds(config.match_window_secs.min(MAX_WINDOW_SECS) as i64),
            app_url: config.app_url.clone(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&NotificationConfig::default())
    }
}

/// Outcome of one pass over the reminder snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckSummary {
    /// `(reminder, lead time)` pairs looked at.
    pub evaluated: usize,
    pub dispatched: usize,
    /// Matched, but permission was not granted.
    pub awaiting_permission: usize,
    pub failed: usize,
}

pub struct NotificationDispatcher {
    settings: DispatchSettings,
    ledger: DeduplicationLedger,
    platform: Arc<dyn NotificationPlatform>,
    sound: Arc<dyn SoundPlayer>,
    haptics: Arc<dyn Haptics>,
}

impl NotificationDispatcher {
    pub fn new(
        settings: DispatchSettings,
        platform: Arc<dyn NotificationPlatform>,
        sound: Arc<dyn SoundPlayer>,
        haptics: Arc<dyn Haptics>,
    ) -> Self {
        Self {
            settings,
            ledger: DeduplicationLedger::new(),
            platform,
            sound,
            haptics,
        }
    }

    pub fn ledger(&self) -> &DeduplicationLedger {
        &self.ledger
    }

    pub(crate) fn set_sound_player(&mut self, sound: Arc<dyn SoundPlayer>) {
        self.sound = sound;
    }

    pub(crate) fn set_haptics(&mut self, haptics: Arc<dyn Haptics>) {
        self.haptics = haptics;
    }

    pub fn should_notify(
        &self,
        reminder: &Reminder,
        minutes_before: u32,
        now: DateTime<Utc>,
    ) -> bool {
        if reminder.completed {
            return false;
        }
        if reminder.is_snoozed_at(now) {
            return false;
        }
        if self.ledger.contains(&reminder.id, minutes_before) {
            return false;
        }

        let notify_at = reminder.due_date - Duration::minutes(i64::from(minutes_before));
        let drift = (now - notify_at).num_milliseconds().abs();
        drift < self.settings.match_window.num_milliseconds()
    }

    /// Evaluates every push lead time plus the implicit due-time alert of each
    /// reminder, in collection order.
    pub fn check(
        &mut self,
        reminders: &[Reminder],
        permission: Permission,
        now: DateTime<Utc>,
        intents: &IntentSender,
    ) -> CheckSummary {
        let mut summary = CheckSummary::default();

        for reminder in reminders {
            for minutes_before in reminder.push_lead_times().chain(iter::once(0)) {
                summary.evaluated += 1;
                if !self.should_notify(reminder, minutes_before, now) {
                    continue;
                }

                if permission != Permission::Granted {
                    tracing::debug!(
                        reminder_id = %reminder.id,
                        minutes_before,
                        ?permission,
                        "reminder due but notifications not permitted"
                    );
                    summary.awaiting_permission += 1;
                    continue;
                }

                match self.dispatch(reminder, minutes_before, intents) {
                    Ok(()) => {
                        self.ledger.mark(&reminder.id, minutes_before);
                        summary.dispatched += 1;
                    }
                    Err(err) => {
                        tracing::warn!(
                            reminder_id = %reminder.id,
                            minutes_before,
                            "reminder notification failed: {err}"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }

        summary
    }

    fn dispatch(
        &self,
        reminder: &Reminder,
        minutes_before: u32,
        intents: &IntentSender,
    ) -> Result<(), NotifyError> {
        let notification = build_notification(reminder, minutes_before, &self.settings.app_url);
        self.platform.show(notification, intents.clone())?;
        tracing::info!(
            reminder_id = %reminder.id,
            minutes_before,
            priority = %reminder.priority,
            "reminder notification shown"
        );

        self.play_sound(reminder.priority);
        if self.settings.vibrate && self.haptics.is_supported() {
            self.haptics.vibrate(&VIBRATION_PATTERN_MS);
        }
        Ok(())
    }

    /// Plays the alert for `priority`; playback errors are logged and dropped.
    pub fn play_sound(&self, priority: Priority) {
        if !self.settings.sound {
            return;
        }
        let request = SoundRequest {
            priority,
            volume: self.settings.volume,
        };
        if let Err(err) = self.sound.play(request) {
            tracing::warn!(%priority, "reminder sound failed: {err}");
        }
    }
}

pub fn build_notification(
    reminder: &Reminder,
    minutes_before: u32,
    app_url: &Url,
) -> PlatformNotification {
    let title = if minutes_before > 0 {
        format!("Reminder in {minutes_before} minutes")
    } else {
        format!("Reminder: {}", reminder.title)
    };
    let body = match reminder.description.as_deref() {
        Some(description) if !description.trim().is_empty() => description.to_string(),
        _ => format!("{} due now", reminder.reminder_type.label()),
    };

    PlatformNotification {
        title,
        body,
        tag: reminder.id.clone(),
        require_interaction: reminder.priority.requires_interaction(),
        priority: reminder.priority,
        deep_link: deep_link(app_url, &reminder.id),
    }
}

/// `{app_url}#/reminders/{id}`
pub fn deep_link(app_url: &Url, id: &ReminderId) -> Url {
    let mut link = app_url.clone();
    link.set_fragment(Some(&format!("/reminders/{id}")));
    link
}
