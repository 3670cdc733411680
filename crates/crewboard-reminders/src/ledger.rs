use crewboard_core::ReminderId;
use std::collections::{BTreeSet, HashMap};

/// `(reminder, minutes_before)` pairs already announced by one engine.
///
/// Entries are never removed: a lead time fires at most once per engine
/// lifetime, even if the reminder is later un-completed or un-snoozed.
#[derive(Debug, Default)]
pub struct DeduplicationLedger {
    notified: HashMap<ReminderId, BTreeSet<u32>>,
}

impl DeduplicationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, reminder_id: &ReminderId, minutes_before: u32) -> bool {
        self.notified
            .get(reminder_id)
            .is_some_and(|leads| leads.contains(&minutes_before))
    }

    /// Returns `false` if the pair was already present.
    pub fn mark(&mut self, reminder_id: &ReminderId, minutes_before: u32) -> bool {
        self.notified
            .entry(reminder_id.clone())
            .or_default()
            .insert(minutes_before)
    }

    pub fn len(&self) -> usize {
        self.notified.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }
}
