use crate::SnoozeHandler;
use chrono::{DateTime, Utc};
use crewboard_core::{Reminder, ReminderId};
use std::sync::{Arc, PoisonError, RwLock};

/// Supplies the engine with the host's current reminders, in display order.
pub trait ReminderSource: Send + Sync {
    fn snapshot(&self) -> Vec<Reminder>;
}

/// In-memory reminder collection shared between a host and its engine.
#[derive(Debug, Clone, Default)]
pub struct SharedReminders {
    inner: Arc<RwLock<Vec<Reminder>>>,
}

impl SharedReminders {
    pub fn new(reminders: Vec<Reminder>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(reminders)),
        }
    }

    /// Applies `change` to the reminder with `id`; `false` if there is none.
    pub fn update<F>(&self, id: &ReminderId, change: F) -> bool
    where
        F: FnOnce(&mut Reminder),
    {
        let mut reminders = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match reminders.iter_mut().find(|reminder| &reminder.id == id) {
            Some(reminder) => {
                change(reminder);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &ReminderId) -> Option<Reminder> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|reminder| &reminder.id == id)
            .cloned()
    }
}

impl ReminderSource for SharedReminders {
    fn snapshot(&self) -> Vec<Reminder> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SnoozeHandler for SharedReminders {
    fn snoozed(&self, id: &ReminderId, until: DateTime<Utc>) {
        if !self.update(id, |reminder| reminder.snoozed_until = Some(until)) {
            tracing::warn!(reminder_id = %id, "snoozed reminder is no longer in the collection");
        }
    }
}
