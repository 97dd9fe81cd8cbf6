//! Daily wall-clock schedule for the backend sync.
//!
//! The agent reconciles its active printer once a day at a fixed local time in
//! a named IANA time zone (07:00 `America/New_York` by default).  Computing
//! "the next 07:00 in New York" is done here, in pure code, so the timer loop
//! in the application crate only has to sleep until the returned instant.
//!
//! # Accepted formats
//!
//! | Input           | Meaning                                              |
//! |-----------------|------------------------------------------------------|
//! | `"07:00"`       | 07:00 every day                                      |
//! | `"0 0 7 * * ?"` | Spring-style six-field cron: sec min hour, every day |
//! | `"0 7 * * *"`   | Classic five-field cron: min hour, every day         |
//!
//! Only fixed daily times are supported.  Cron expressions with ranges,
//! steps, lists, or day/month restrictions are rejected.
//!
//! # Daylight-saving transitions
//!
//! - If the wall-clock time occurs twice (clocks fall back), the earlier
//!   instant is used.
//! - If the wall-clock time does not exist (clocks spring forward), the sync
//!   runs one hour later on the same local day.

use chrono::{DateTime, Days, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// Default time of day for the sync.
pub const DEFAULT_SYNC_TIME: &str = "07:00";

/// Default IANA zone the sync time is interpreted in.
pub const DEFAULT_SYNC_TIMEZONE: &str = "America/New_York";

/// Errors produced while parsing a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("unsupported cron expression '{0}': only a fixed time every day is supported")]
    UnsupportedCron(String),

    #[error("unknown time zone '{0}'")]
    UnknownTimeZone(String),
}

/// A fixed time of day in a fixed time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
    zone: Tz,
}

impl DailySchedule {
    /// Creates a schedule firing at `hour:minute:second` in `zone`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidTime`] when the components are out of
    /// range.
    pub fn new(hour: u32, minute: u32, second: u32, zone: Tz) -> Result<Self, ScheduleError> {
        let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
            ScheduleError::InvalidTime(format!("{hour:02}:{minute:02}:{second:02}"))
        })?;
        Ok(Self { time, zone })
    }

    /// Parses a time expression (see module docs) and an IANA zone name.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::UnknownTimeZone`] for an unrecognised zone,
    /// [`ScheduleError::InvalidTime`] for a malformed `HH:MM`, and
    /// [`ScheduleError::UnsupportedCron`] for cron expressions that do not
    /// describe a single daily time.
    pub fn parse(expression: &str, zone: &str) -> Result<Self, ScheduleError> {
        let tz: Tz = zone
            .trim()
            .parse()
            .map_err(|_| ScheduleError::UnknownTimeZone(zone.to_string()))?;

        let expression = expression.trim();
        let fields: Vec<&str> = expression.split_whitespace().collect();

        match fields.as_slice() {
            [single] => parse_clock_time(single, tz),
            [sec, min, hour, dom, month, dow] => {
                if !is_wildcard(dom) || !is_wildcard(month) || !is_wildcard(dow) {
                    return Err(ScheduleError::UnsupportedCron(expression.to_string()));
                }
                let unsupported = || ScheduleError::UnsupportedCron(expression.to_string());
                Self::new(
                    cron_number(hour).ok_or_else(unsupported)?,
                    cron_number(min).ok_or_else(unsupported)?,
                    cron_number(sec).ok_or_else(unsupported)?,
                    tz,
                )
            }
            [min, hour, dom, month, dow] => {
                if !is_wildcard(dom) || !is_wildcard(month) || !is_wildcard(dow) {
                    return Err(ScheduleError::UnsupportedCron(expression.to_string()));
                }
                let unsupported = || ScheduleError::UnsupportedCron(expression.to_string());
                Self::new(
                    cron_number(hour).ok_or_else(unsupported)?,
                    cron_number(min).ok_or_else(unsupported)?,
                    0,
                    tz,
                )
            }
            _ => Err(ScheduleError::InvalidTime(expression.to_string())),
        }
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Returns the first firing instant strictly after `now`.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.with_timezone(&self.zone).date_naive();

        // Two days ahead always suffices: today's slot may have passed and
        // tomorrow's can at worst be shifted by a DST gap.
        for offset in 0..=2u64 {
            let day = today + Days::new(offset);
            let candidate = self.resolve_local(day.and_time(self.time));
            if candidate > now {
                return candidate;
            }
        }

        // Unreachable for real zones; keep a sane answer anyway.
        now + chrono::Duration::days(1)
    }

    fn resolve_local(&self, local: NaiveDateTime) -> DateTime<Utc> {
        match self.zone.from_local_datetime(&local) {
            LocalResult::Single(t) => t.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            LocalResult::None => {
                let shifted = local + chrono::Duration::hours(1);
                match self.zone.from_local_datetime(&shifted).earliest() {
                    Some(t) => t.with_timezone(&Utc),
                    None => Utc.from_utc_datetime(&local),
                }
            }
        }
    }
}

impl std::fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "daily at {} {}", self.time.format("%H:%M:%S"), self.zone)
    }
}

impl Default for DailySchedule {
    fn default() -> Self {
        Self {
            time: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or_default(),
            zone: chrono_tz::America::New_York,
        }
    }
}

fn parse_clock_time(text: &str, zone: Tz) -> Result<DailySchedule, ScheduleError> {
    let time = NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .map_err(|_| ScheduleError::InvalidTime(text.to_string()))?;
    Ok(DailySchedule { time, zone })
}

fn is_wildcard(field: &str) -> bool {
    field == "*" || field == "?"
}

fn cron_number(field: &str) -> Option<u32> {
    if field.chars().all(|c| c.is_ascii_digit()) {
        field.parse().ok()
    } else {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
