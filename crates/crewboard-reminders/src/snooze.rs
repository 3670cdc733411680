use crate::SnoozeError;
use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use crewboard_core::ReminderId;
use serde::{Deserialize, Serialize};

/// Local hour the symbolic snoozes resume at.
pub const SNOOZE_RESUME_HOUR: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnoozeDirective {
    Minutes(u32),
    /// Next calendar day, 09:00 local.
    TomorrowMorning,
    /// Next Monday strictly after today, 09:00 local.
    NextMondayMorning,
}

impl SnoozeDirective {
    pub const TOMORROW_MORNING_CODE: i64 = -1;
    pub const NEXT_MONDAY_MORNING_CODE: i64 = -2;

    /// Decodes the web client's integer form: minutes, or -1 / -2.
    pub fn from_code(code: i64) -> Result<Self, SnoozeError> {
        match code {
            Self::TOMORROW_MORNING_CODE => Ok(Self::TomorrowMorning),
            Self::NEXT_MONDAY_MORNING_CODE => Ok(Self::NextMondayMorning),
            minutes if minutes > 0 => u32::try_from(minutes)
                .map(Self::Minutes)
                .map_err(|_| SnoozeError::InvalidDirective(code)),
            other => Err(SnoozeError::InvalidDirective(other)),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Minutes(minutes) => i64::from(minutes),
            Self::TomorrowMorning => Self::TOMORROW_MORNING_CODE,
            Self::NextMondayMorning => Self::NEXT_MONDAY_MORNING_CODE,
        }
    }
}

/// Zone the symbolic snoozes are evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnoozeZone {
    #[default]
    System,
    Named(Tz),
}

impl SnoozeZone {
    pub fn resolve(
        &self,
        directive: SnoozeDirective,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SnoozeError> {
        match self {
            Self::System => resolve_in(directive, now, &Local),
            Self::Named(tz) => resolve_in(directive, now, tz),
        }
    }
}

impl From<Option<Tz>> for SnoozeZone {
    fn from(zone: Option<Tz>) -> Self {
        zone.map_or(Self::System, Self::Named)
    }
}

pub fn resolve_in<Z: TimeZone>(
    directive: SnoozeDirective,
    now: DateTime<Utc>,
    zone: &Z,
) -> Result<DateTime<Utc>, SnoozeError> {
    match directive {
        SnoozeDirective::Minutes(minutes) => now
            .checked_add_signed(Duration::minutes(i64::from(minutes)))
            .ok_or(SnoozeError::OutOfRange),
        SnoozeDirective::TomorrowMorning => {
            let today = now.with_timezone(zone).date_naive();
            let tomorrow = today.succ_opt().ok_or(SnoozeError::OutOfRange)?;
            resume_on(tomorrow, zone)
        }
        SnoozeDirective::NextMondayMorning => {
            let today = now.with_timezone(zone).date_naive();
            let since_monday = u64::from(today.weekday().num_days_from_monday());
            let ahead = if since_monday == 0 { 7 } else { 7 - since_monday };
            let monday = today
                .checked_add_days(Days::new(ahead))
                .ok_or(SnoozeError::OutOfRange)?;
            resume_on(monday, zone)
        }
    }
}

fn resume_on<Z: TimeZone>(date: NaiveDate, zone: &Z) -> Result<DateTime<Utc>, SnoozeError> {
    let local = date
        .and_hms_opt(SNOOZE_RESUME_HOUR, 0, 0)
        .ok_or(SnoozeError::NonexistentLocalTime(date))?;
    zone.from_local_datetime(&local)
        .earliest()
        .map(|resume| resume.with_timezone(&Utc))
        .ok_or(SnoozeError::NonexistentLocalTime(date))
}

/// Resolves `directive` and hands the result to `on_snooze`; persisting it is the caller's job.
pub fn snooze_reminder<F>(
    reminder_id: &ReminderId,
    directive: SnoozeDirective,
    now: DateTime<Utc>,
    zone: &SnoozeZone,
    on_snooze: F,
) -> Result<DateTime<Utc>, SnoozeError>
where
    F: FnOnce(&ReminderId, DateTime<Utc>),
{
    let until = zone.resolve(directive, now)?;
    tracing::debug!(
        reminder_id = %reminder_id,
        code = directive.code(),
        until = %until,
        "reminder snoozed"
    );
    on_snooze(reminder_id, until);
    Ok(until)
}
