use crate::export::UID_DOMAIN;
use crate::CalendarError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use crewboard_core::{Priority, Reminder, ReminderNotification};
use ical::property::Property;
use regex::Regex;
use std::io::Cursor;

const DEFAULT_TITLE: &str = "Untitled reminder";

/// Parses an iCalendar document into reminders, one per VEVENT.
///
/// Alarms with a negative relative trigger become push lead times. Anything
/// else in the document is ignored.
pub fn import_ics(payload: &str) -> Result<Vec<Reminder>, CalendarError> {
    let trigger_pattern = Regex::new(
        r"^([+-])?P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$",
    )
    .map_err(|err| CalendarError::Parse(err.to_string()))?;

    let reader = Cursor::new(payload.as_bytes());
    let parser = ical::IcalParser::new(reader);

    let mut imported = Vec::new();
    for calendar in parser {
        let calendar = calendar.map_err(|err| CalendarError::Parse(err.to_string()))?;
        for event in calendar.events {
            let uid = property_value(&event.properties, "UID")
                .map(|value| unescape_text(&value))
                .ok_or_else(|| CalendarError::Data("VEVENT missing UID".to_string()))?;
            let id = uid
                .strip_suffix(&format!("@{UID_DOMAIN}"))
                .unwrap_or(&uid)
                .to_string();

            let title = property_value(&event.properties, "SUMMARY")
                .map(|value| unescape_text(&value))
                .unwrap_or_else(|| DEFAULT_TITLE.to_string());

            let start = find_property(&event.properties, "DTSTART")
                .ok_or_else(|| CalendarError::Data(format!("VEVENT {id} missing DTSTART")))?;
            let due_date = parse_start(start)?;

            let mut reminder = Reminder::new(id, title, due_date);
            reminder.description =
                property_value(&event.properties, "DESCRIPTION").map(|value| unescape_text(&value));
            reminder.priority = property_value(&event.properties, "PRIORITY")
                .and_then(|value| value.trim().parse::<u8>().ok())
                .map(priority_from_ical)
                .unwrap_or_default();
            reminder.completed = property_value(&event.properties, "STATUS")
                .is_some_and(|status| status.trim().eq_ignore_ascii_case("COMPLETED"));

            for alarm in &event.alarms {
                let Some(trigger) = property_value(&alarm.properties, "TRIGGER") else {
                    continue;
                };
                match lead_minutes(&trigger_pattern, &trigger) {
                    Some(minutes) => reminder
                        .notifications
                        .push(ReminderNotification::push(minutes)),
                    None => {
                        tracing::debug!(
                            reminder_id = %reminder.id,
                            trigger = %trigger,
                            "skipping alarm without a lead-time trigger"
                        );
                    }
                }
            }

            imported.push(reminder);
        }
    }

    tracing::debug!(count = imported.len(), "imported reminders from calendar");
    Ok(imported)
}

/// Reverses TEXT escaping. Unknown escapes keep the escaped character.
pub fn unescape_text(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(current) = chars.next() {
        if current != '\\' {
            output.push(current);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => output.push('\n'),
            Some(other) => output.push(other),
            None => output.push('\\'),
        }
    }
    output
}

fn find_property<'a>(properties: &'a [Property], key: &str) -> Option<&'a Property> {
    properties
        .iter()
        .find(|property| property.name.eq_ignore_ascii_case(key))
}

fn property_value(properties: &[Property], key: &str) -> Option<String> {
    find_property(properties, key).and_then(|property| property.value.clone())
}

fn param_value<'a>(property: &'a Property, key: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

fn parse_start(property: &Property) -> Result<DateTime<Utc>, CalendarError> {
    let raw = property
        .value
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| CalendarError::Data("DTSTART has no value".to_string()))?;

    if let Ok(value) = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ") {
        return Ok(Utc.from_utc_datetime(&value));
    }
    if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
        return Ok(value.with_timezone(&Utc));
    }

    let local = if let Ok(value) = NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%S") {
        value
    } else if let Ok(value) = NaiveDate::parse_from_str(raw, "%Y%m%d") {
        value
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| CalendarError::Parse(format!("invalid all-day date: {raw}")))?
    } else {
        return Err(CalendarError::Parse(format!(
            "unsupported datetime format in ICS: {raw}"
        )));
    };

    // Floating times without a TZID are read as UTC.
    match param_value(property, "TZID") {
        Some(name) => {
            let zone: Tz = name
                .parse()
                .map_err(|_| CalendarError::Parse(format!("unknown TZID: {name}")))?;
            zone.from_local_datetime(&local)
                .earliest()
                .map(|value| value.with_timezone(&Utc))
                .ok_or_else(|| {
                    CalendarError::Parse(format!("{raw} does not exist in {name}"))
                })
        }
        None => Ok(Utc.from_utc_datetime(&local)),
    }
}

fn priority_from_ical(value: u8) -> Priority {
    match value {
        1..=2 => Priority::Urgent,
        3..=4 => Priority::High,
        7..=9 => Priority::Low,
        _ => Priority::Medium,
    }
}

/// Minutes before the start for a negative duration trigger, rounded down.
fn lead_minutes(pattern: &Regex, trigger: &str) -> Option<u32> {
    let captures = pattern.captures(trigger.trim())?;
    if captures.get(1).map(|sign| sign.as_str()) != Some("-") {
        return None;
    }

    let part = |index: usize| -> u64 {
        captures
            .get(index)
            .and_then(|value| value.as_str().parse().ok())
            .unwrap_or(0)
    };
    let seconds = part(2)
        .saturating_mul(7 * 24 * 3600)
        .saturating_add(part(3).saturating_mul(24 * 3600))
        .saturating_add(part(4).saturating_mul(3600))
        .saturating_add(part(5).saturating_mul(60))
        .saturating_add(part(6));

    u32::try_from(seconds / 60).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export_ics;
    use crewboard_core::{NotificationChannel, ReminderNotification};

    fn wrap(event: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Other//EN\r\n{event}END:VCALENDAR\r\n"
        )
    }

    #[test]
    fn round_trips_exported_reminders() {
        let due = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let mut done = Reminder::new("r2", "Retro, part 2", due)
            .with_description("Bring notes;\nand \\coffee")
            .with_priority(Priority::Low);
        done.completed = true;
        let original = vec![
            Reminder::new("665f1c2a9d", "Standup", due)
                .with_priority(Priority::Urgent)
                .with_notification(ReminderNotification::push(10))
                .with_notification(ReminderNotification::new(NotificationChannel::Email, 60)),
            done,
        ];

        let ics = export_ics(&original, due).expect("exported");
        let imported = import_ics(&ics).expect("imported");

        assert_eq!(imported.len(), 2);
        let standup = &imported[0];
        assert_eq!(standup.id.as_str(), "665f1c2a9d");
        assert_eq!(standup.title, "Standup");
        assert_eq!(standup.due_date, due);
        assert_eq!(standup.priority, Priority::Urgent);
        assert!(!standup.completed);
        assert_eq!(standup.push_lead_times().collect::<Vec<_>>(), vec![10, 60]);

        let retro = &imported[1];
        assert_eq!(retro.title, "Retro, part 2");
        assert_eq!(
            retro.description.as_deref(),
            Some("Bring notes;\nand \\coffee")
        );
        assert_eq!(retro.priority, Priority::Low);
        assert!(retro.completed);
        assert!(retro.notifications.is_empty());
    }

    #[test]
    fn ids_with_separators_survive_export() {
        let due = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let original = vec![Reminder::new("a,b;c\\d", "Odd id", due)];

        let ics = export_ics(&original, due).expect("exported");
        let imported = import_ics(&ics).expect("imported");

        assert_eq!(imported[0].id.as_str(), "a,b;c\\d");
    }

    #[test]
    fn accepts_foreign_events() {
        let ics = wrap(
            "BEGIN:VEVENT\r\n\
             UID:abc@example.com\r\n\
             DTSTART;TZID=Europe/Berlin:20240603T090000\r\n\
             PRIORITY:4\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:-P1DT30M\r\nEND:VALARM\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:PT5M\r\nEND:VALARM\r\n\
             BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:-PT90S\r\nEND:VALARM\r\n\
             END:VEVENT\r\n",
        );
        let imported = import_ics(&ics).expect("imported");

        assert_eq!(imported.len(), 1);
        let reminder = &imported[0];
        assert_eq!(reminder.id.as_str(), "abc@example.com");
        assert_eq!(reminder.title, DEFAULT_TITLE);
        assert_eq!(
            reminder.due_date,
            Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 0).unwrap()
        );
        assert_eq!(reminder.priority, Priority::High);
        assert_eq!(
            reminder.push_lead_times().collect::<Vec<_>>(),
            vec![1470, 1]
        );
    }

    #[test]
    fn all_day_and_floating_dates_are_utc() {
        let ics = wrap(
            "BEGIN:VEVENT\r\nUID:a\r\nDTSTART;VALUE=DATE:20240610\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:b\r\nDTSTART:20240610T083000\r\nEND:VEVENT\r\n",
        );
        let imported = import_ics(&ics).expect("imported");

        assert_eq!(
            imported[0].due_date,
            Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap()
        );
        assert_eq!(
            imported[1].due_date,
            Utc.with_ymd_and_hms(2024, 6, 10, 8, 30, 0).unwrap()
        );
        assert_eq!(imported[0].priority, Priority::Medium);
    }

    #[test]
    fn missing_fields_are_errors() {
        let no_uid = wrap("BEGIN:VEVENT\r\nDTSTART:20240610T083000Z\r\nEND:VEVENT\r\n");
        assert!(matches!(import_ics(&no_uid), Err(CalendarError::Data(_))));

        let no_start = wrap("BEGIN:VEVENT\r\nUID:x\r\nEND:VEVENT\r\n");
        assert!(matches!(import_ics(&no_start), Err(CalendarError::Data(_))));

        let bad_start = wrap("BEGIN:VEVENT\r\nUID:x\r\nDTSTART:next week\r\nEND:VEVENT\r\n");
        assert!(matches!(import_ics(&bad_start), Err(CalendarError::Parse(_))));
    }

    #[test]
    fn priority_bands() {
        assert_eq!(priority_from_ical(0), Priority::Medium);
        assert_eq!(priority_from_ical(2), Priority::Urgent);
        assert_eq!(priority_from_ical(6), Priority::Medium);
        assert_eq!(priority_from_ical(9), Priority::Low);
    }

    #[test]
    fn unescapes_text() {
        assert_eq!(unescape_text("a\\,b\\;c\\nd\\\\e"), "a,b;c\nd\\e");
        assert_eq!(unescape_text("trailing\\"), "trailing\\");
    }
}
