use crate::blocking::run_blocking;
use anyhow::Context;
use chrono::{DateTime, Utc};
use crewboard_core::{NotificationChannel, Reminder, ReminderId, ReminderNotification};
use crewboard_reminders::{ReminderSource, SnoozeHandler};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Reminders persisted as the web client's JSON array.
///
/// Snapshots fall back to the last good read when the file is mid-write or
/// malformed, so a bad save never silences notifications already loaded.
pub struct JsonReminderStore {
    path: PathBuf,
    last_good: RwLock<Vec<Reminder>>,
}

impl JsonReminderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: RwLock::new(Vec::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty collection.
    pub fn load(&self) -> anyhow::Result<Vec<Reminder>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", self.path.display()))
            }
        };
        let reminders: Vec<Reminder> = serde_json::from_str(&content)
            .with_context(|| format!("parse reminders in {}", self.path.display()))?;
        *self.last_good.write().unwrap_or_else(PoisonError::into_inner) = reminders.clone();
        Ok(reminders)
    }

    pub fn save(&self, reminders: &[Reminder]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(reminders).context("serialize reminders")?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content).with_context(|| format!("write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;

        *self.last_good.write().unwrap_or_else(PoisonError::into_inner) = reminders.to_vec();
        Ok(())
    }

    /// Adds calendar reminders to the store. Returns how many were new.
    ///
    /// A reminder whose id is already stored only takes the fields a calendar
    /// carries; see [`apply_calendar_fields`].
    pub fn merge(&self, incoming: Vec<Reminder>) -> anyhow::Result<usize> {
        let mut reminders = self.load()?;
        let mut added = 0;
        for reminder in incoming {
            match reminders.iter_mut().find(|existing| existing.id == reminder.id) {
                Some(existing) => apply_calendar_fields(existing, reminder),
                None => {
                    reminders.push(reminder);
                    added += 1;
                }
            }
        }
        self.save(&reminders)?;
        Ok(added)
    }

    /// Writes `snoozedUntil` for one reminder; `false` if no reminder has `id`.
    pub fn set_snoozed_until(&self, id: &ReminderId, until: DateTime<Utc>) -> anyhow::Result<bool> {
        let mut reminders = self.load()?;
        let Some(reminder) = reminders.iter_mut().find(|reminder| &reminder.id == id) else {
            return Ok(false);
        };
        reminder.snoozed_until = Some(until);
        self.save(&reminders)?;
        Ok(true)
    }
}

/// Updates `existing` from a calendar copy of the same reminder.
///
/// Type, snooze state and sms entries have no calendar form and are kept.
/// Each alarm lead time keeps the stored email or push entry with the same
/// minutes; lead times without one become push entries, and stored email or
/// push entries with no matching alarm are dropped.
fn apply_calendar_fields(existing: &mut Reminder, imported: Reminder) {
    existing.title = imported.title;
    existing.description = imported.description;
    existing.due_date = imported.due_date;
    existing.priority = imported.priority;
    existing.completed = imported.completed;

    let mut unmatched: Vec<u32> = imported
        .notifications
        .iter()
        .map(|notification| notification.minutes_before)
        .collect();
    existing.notifications.retain(|notification| {
        if notification.channel == NotificationChannel::Sms {
            return true;
        }
        match unmatched
            .iter()
            .position(|minutes| *minutes == notification.minutes_before)
        {
            Some(index) => {
                unmatched.remove(index);
                true
            }
            None => false,
        }
    });
    existing
        .notifications
        .extend(unmatched.into_iter().map(ReminderNotification::push));
}

impl ReminderSource for JsonReminderStore {
    fn snapshot(&self) -> Vec<Reminder> {
        match run_blocking(|| self.load()) {
            Ok(reminders) => reminders,
            Err(err) => {
                tracing::warn!("reminder store unreadable, using last good snapshot: {err:#}");
                self.last_good
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            }
        }
    }
}

impl SnoozeHandler for JsonReminderStore {
    fn snoozed(&self, id: &ReminderId, until: DateTime<Utc>) {
        match run_blocking(|| self.set_snoozed_until(id, until)) {
            Ok(true) => {}
            Ok(false) => tracing::warn!(reminder_id = %id, "snoozed reminder not found in store"),
            Err(err) => tracing::error!(reminder_id = %id, "failed to persist snooze: {err:#}"),
        }
    }
}
