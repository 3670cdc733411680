use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque reminder identifier as issued by the reminders API.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(String);

impl ReminderId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReminderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ReminderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReminderType {
    Task,
    Meeting,
    Deadline,
    Milestone,
    Personal,
}

impl ReminderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Meeting => "meeting",
            Self::Deadline => "deadline",
            Self::Milestone => "milestone",
            Self::Personal => "personal",
        }
    }

    /// Display label with the first letter upper-cased, e.g. `Meeting`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Task => "Task",
            Self::Meeting => "Meeting",
            Self::Deadline => "Deadline",
            Self::Milestone => "Milestone",
            Self::Personal => "Personal",
        }
    }
}

impl Default for ReminderType {
    fn default() -> Self {
        Self::Task
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Urgent and high priority alerts stay on screen until the user acts.
    pub fn requires_interaction(self) -> bool {
        matches!(self, Self::Urgent | Self::High)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Push,
    Sms,
}

/// One lead-time alert configured on a reminder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReminderNotification {
    #[serde(rename = "type")]
    pub channel: NotificationChannel,
    pub minutes_before: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent: Option<bool>,
}

impl ReminderNotification {
    pub fn new(channel: NotificationChannel, minutes_before: u32) -> Self {
        Self {
            channel,
            minutes_before,
            sent: None,
        }
    }

    pub fn push(minutes_before: u32) -> Self {
        Self::new(NotificationChannel::Push, minutes_before)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: ReminderId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default)]
    pub reminder_type: ReminderType,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
    /// Alerts are suppressed while `now < snoozed_until`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notifications: Vec<ReminderNotification>,
}

impl Reminder {
    pub fn new(
        id: impl Into<ReminderId>,
        title: impl Into<String>,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            reminder_type: ReminderType::Task,
            priority: Priority::Medium,
            due_date,
            completed: false,
            snoozed_until: None,
            notifications: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_type(mut self, reminder_type: ReminderType) -> Self {
        self.reminder_type = reminder_type;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_notification(mut self, notification: ReminderNotification) -> Self {
        self.notifications.push(notification);
        self
    }

    pub fn is_snoozed_at(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until.is_some_and(|until| now < until)
    }

    /// Lead times the local dispatcher acts on: every push entry, in order.
    pub fn push_lead_times(&self) -> impl Iterator<Item = u32> + '_ {
        self.notifications
            .iter()
            .filter(|n| n.channel == NotificationChannel::Push)
            .map(|n| n.minutes_before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deserializes_client_payload() {
        let payload = r#"{
            "id": "665f1c2a9d",
            "title": "Sprint review",
            "type": "meeting",
            "priority": "high",
            "dueDate": "2024-06-03T09:00:00Z",
            "completed": false,
            "snoozedUntil": "2024-06-03T08:30:00Z",
            "notifications": [
                { "type": "push", "minutesBefore": 15 },
                { "type": "email", "minutesBefore": 60, "sent": true }
            ]
        }"#;

        let reminder: Reminder = serde_json::from_str(payload).expect("reminder parsed");
        assert_eq!(reminder.id.as_str(), "665f1c2a9d");
        assert_eq!(reminder.reminder_type, ReminderType::Meeting);
        assert_eq!(reminder.priority, Priority::High);
        assert_eq!(
            reminder.due_date,
            Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
        );
        assert_eq!(reminder.notifications.len(), 2);
        assert_eq!(reminder.notifications[1].sent, Some(true));
        assert_eq!(reminder.push_lead_times().collect::<Vec<_>>(), vec![15]);
    }

    #[test]
    fn missing_due_date_is_rejected() {
        let payload = r#"{ "id": "a", "title": "No date" }"#;
        assert!(serde_json::from_str::<Reminder>(payload).is_err());
    }

    #[test]
    fn snooze_is_exclusive_of_its_end() {
        let due = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let mut reminder = Reminder::new("r1", "Standup", due);
        reminder.snoozed_until = Some(due);
        assert!(reminder.is_snoozed_at(due - chrono::Duration::seconds(1)));
        assert!(!reminder.is_snoozed_at(due));
    }

    #[test]
    fn only_high_and_urgent_require_interaction() {
        assert!(Priority::Urgent.requires_interaction());
        assert!(Priority::High.requires_interaction());
        assert!(!Priority::Medium.requires_interaction());
        assert!(!Priority::Low.requires_interaction());
    }
}
