use crate::CalendarError;
use chrono::{DateTime, Utc};
use crewboard_core::{NotificationChannel, Priority, Reminder};
use std::fs;
use std::path::Path;

pub const PRODID: &str = "-//Crewboard//Reminders//EN";
pub(crate) const UID_DOMAIN: &str = "crewboard";

const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const MAX_LINE_OCTETS: usize = 75;

/// Renders every reminder, completed or not, as a VEVENT with one VALARM per
/// email or push lead time. `stamp` becomes each event's DTSTAMP.
pub fn export_ics(reminders: &[Reminder], stamp: DateTime<Utc>) -> Result<String, CalendarError> {
    let mut output = String::new();
    push_line(&mut output, "BEGIN:VCALENDAR");
    push_line(&mut output, "VERSION:2.0");
    push_line(&mut output, &format!("PRODID:{PRODID}"));

    for reminder in reminders {
        write_event(&mut output, reminder, stamp)?;
    }

    push_line(&mut output, "END:VCALENDAR");
    Ok(output)
}

/// Writes the export to `path`, replacing any existing file.
pub fn write_ics_file(
    path: &Path,
    reminders: &[Reminder],
    stamp: DateTime<Utc>,
) -> Result<(), CalendarError> {
    let document = export_ics(reminders, stamp)?;
    fs::write(path, document)?;
    tracing::info!(
        path = %path.display(),
        reminders = reminders.len(),
        "exported reminders calendar"
    );
    Ok(())
}

fn write_event(
    output: &mut String,
    reminder: &Reminder,
    stamp: DateTime<Utc>,
) -> Result<(), CalendarError> {
    if reminder.id.is_empty() {
        return Err(CalendarError::Data(format!(
            "reminder \"{}\" has no id",
            reminder.title
        )));
    }

    let summary = escape_text(&reminder.title);

    push_line(output, "BEGIN:VEVENT");
    push_line(
        output,
        &format!("UID:{}@{UID_DOMAIN}", escape_text(reminder.id.as_str())),
    );
    push_line(output, &format!("DTSTAMP:{}", stamp.format(DATE_TIME_FORMAT)));
    push_line(
        output,
        &format!("DTSTART:{}", reminder.due_date.format(DATE_TIME_FORMAT)),
    );
    push_line(output, &format!("SUMMARY:{summary}"));
    if let Some(description) = &reminder.description {
        push_line(output, &format!("DESCRIPTION:{}", escape_text(description)));
    }
    push_line(output, &format!("PRIORITY:{}", ical_priority(reminder.priority)));
    push_line(
        output,
        if reminder.completed {
            "STATUS:COMPLETED"
        } else {
            "STATUS:CONFIRMED"
        },
    );

    for alarm in reminder
        .notifications
        .iter()
        .filter(|n| matches!(n.channel, NotificationChannel::Email | NotificationChannel::Push))
    {
        push_line(output, "BEGIN:VALARM");
        push_line(output, "ACTION:DISPLAY");
        push_line(output, &format!("TRIGGER:-PT{}M", alarm.minutes_before));
        push_line(output, &format!("DESCRIPTION:{summary}"));
        push_line(output, "END:VALARM");
    }

    push_line(output, "END:VEVENT");
    Ok(())
}

/// RFC 5545 priority: lower is more important.
pub fn ical_priority(priority: Priority) -> u8 {
    match priority {
        Priority::Urgent => 1,
        Priority::High => 3,
        Priority::Medium => 5,
        Priority::Low => 9,
    }
}

/// Escapes a TEXT value. Backslash goes first so later escapes are not doubled.
pub fn escape_text(value: &str) -> String {
    value
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Appends a content line, folded at 75 octets without splitting a character.
fn push_line(output: &mut String, line: &str) {
    let mut rest = line;
    let mut limit = MAX_LINE_OCTETS;
    while rest.len() > limit {
        let mut split = limit;
        while !rest.is_char_boundary(split) {
            split -= 1;
        }
        output.push_str(&rest[..split]);
        output.push_str("\r\n ");
        rest = &rest[split..];
        // Continuation lines spend one octet on the leading space.
        limit = MAX_LINE_OCTETS - 1;
    }
    output.push_str(rest);
    output.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crewboard_core::{ReminderNotification, ReminderType};

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap()
    }

    fn standup() -> Reminder {
        Reminder::new(
            "665f1c2a9d",
            "Standup",
            Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
        )
        .with_priority(Priority::Urgent)
        .with_notification(ReminderNotification::push(10))
    }

    #[test]
    fn exports_standup_event() {
        let ics = export_ics(&[standup()], stamp()).expect("exported");

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert!(ics.contains("UID:665f1c2a9d@crewboard\r\n"));
        assert!(ics.contains("DTSTAMP:20240601T123000Z\r\n"));
        assert!(ics.contains("DTSTART:20240603T090000Z\r\n"));
        assert!(ics.contains("SUMMARY:Standup\r\n"));
        assert!(ics.contains("PRIORITY:1\r\n"));
        assert!(ics.contains("STATUS:CONFIRMED\r\n"));
        assert!(ics.contains(
            "BEGIN:VALARM\r\nACTION:DISPLAY\r\nTRIGGER:-PT10M\r\nDESCRIPTION:Standup\r\nEND:VALARM\r\n"
        ));
    }

    #[test]
    fn escapes_text_fields() {
        let reminder = Reminder::new("r1", "Plan; review, notes\nfinal", stamp())
            .with_description("C:\\temp\r\nsecond line");
        let ics = export_ics(&[reminder], stamp()).expect("exported");

        assert!(ics.contains("SUMMARY:Plan\\; review\\, notes\\nfinal\r\n"));
        assert!(ics.contains("DESCRIPTION:C:\\\\temp\\nsecond line\r\n"));
        for line in ics.split("\r\n") {
            assert!(!line.contains('\n') && !line.contains('\r'));
        }
    }

    #[test]
    fn escaping_does_not_double_up() {
        assert_eq!(escape_text("a\\;b"), "a\\\\\\;b");
        assert_eq!(escape_text("x,y"), "x\\,y");
    }

    #[test]
    fn completed_reminders_are_still_exported() {
        let mut done = standup();
        done.completed = true;
        let ics = export_ics(&[done, standup()], stamp()).expect("exported");

        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
        assert!(ics.contains("STATUS:COMPLETED\r\n"));
    }

    #[test]
    fn sms_alarms_are_left_out() {
        let reminder = Reminder::new("r1", "Payroll", stamp())
            .with_type(ReminderType::Deadline)
            .with_notification(ReminderNotification::new(NotificationChannel::Email, 60))
            .with_notification(ReminderNotification::new(NotificationChannel::Sms, 30))
            .with_notification(ReminderNotification::push(5));
        let ics = export_ics(&[reminder], stamp()).expect("exported");

        assert_eq!(ics.matches("BEGIN:VALARM").count(), 2);
        assert!(ics.contains("TRIGGER:-PT60M"));
        assert!(ics.contains("TRIGGER:-PT5M"));
        assert!(!ics.contains("TRIGGER:-PT30M"));
    }

    #[test]
    fn priorities_follow_rfc_ordering() {
        assert_eq!(ical_priority(Priority::Urgent), 1);
        assert_eq!(ical_priority(Priority::High), 3);
        assert_eq!(ical_priority(Priority::Medium), 5);
        assert_eq!(ical_priority(Priority::Low), 9);
    }

    #[test]
    fn output_is_deterministic_for_a_fixed_stamp() {
        let reminders = vec![standup(), Reminder::new("r2", "Retro", stamp())];
        assert_eq!(
            export_ics(&reminders, stamp()).unwrap(),
            export_ics(&reminders, stamp()).unwrap()
        );
    }

    #[test]
    fn empty_id_fails_fast() {
        let reminder = Reminder::new("  ", "Orphan", stamp());
        assert!(matches!(
            export_ics(&[reminder], stamp()),
            Err(CalendarError::Data(_))
        ));
    }

    #[test]
    fn long_lines_are_folded() {
        let description = "é".repeat(60) + &"x".repeat(100);
        let reminder = Reminder::new("r1", "Long", stamp()).with_description(description.clone());
        let ics = export_ics(&[reminder], stamp()).expect("exported");

        for line in ics.split("\r\n") {
            assert!(line.len() <= 75, "line too long: {line}");
        }
        let unfolded = ics.replace("\r\n ", "");
        assert!(unfolded.contains(&format!("DESCRIPTION:{description}\r\n")));
    }

    #[test]
    fn writes_named_file() {
        let path = std::env::temp_dir().join(format!("crewboard-export-{}.ics", std::process::id()));
        write_ics_file(&path, &[standup()], stamp()).expect("written");
        let written = fs::read_to_string(&path).expect("readable");
        assert!(written.contains("SUMMARY:Standup"));
        let _ = fs::remove_file(&path);
    }
}
