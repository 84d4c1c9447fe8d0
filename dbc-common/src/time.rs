//! Timestamp and calendar-day utilities
//!
//! All tracking happens at UTC day granularity. Timestamps coming from callers
//! are reduced to a [`NaiveDate`] with [`to_day`] before they reach any
//! business logic.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveDateTime, Utc};
use std::sync::RwLock;

use crate::{Error, Result};

/// Wire format accepted for dates at the API boundary, e.g. `2023-10-26T00:00:00.000Z`
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const ISO_LEN: usize = "2023-10-26T00:00:00.000Z".len();

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Strip the time-of-day from a UTC timestamp
pub fn to_day(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.date_naive()
}

/// Day after `date`
///
/// Saturates at the calendar maximum instead of overflowing.
pub fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX)
}

/// Day before `date`
pub fn prev_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(NaiveDate::MIN)
}

/// Parse a boundary timestamp in the fixed millisecond ISO-8601 format
pub fn parse_iso(value: &str) -> Result<DateTime<Utc>> {
    // chrono treats the fraction in `%.3f` as optional, so pin the shape first
    let bytes = value.as_bytes();
    if bytes.len() != ISO_LEN || bytes[19] != b'.' || bytes[ISO_LEN - 1] != b'Z' {
        return Err(Error::InvalidInput(format!(
            "Invalid ISO date '{}': expected YYYY-MM-DDTHH:MM:SS.sssZ",
            value
        )));
    }
    NaiveDateTime::parse_from_str(value, ISO_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::InvalidInput(format!("Invalid ISO date '{}': {}", value, e)))
}

/// First and last day of the calendar month containing `date`
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(Months::new(1))
        .map(prev_day)
        .unwrap_or(NaiveDate::MAX);
    (first, last)
}

/// Source of "now" for everything that depends on the current day
///
/// Services hold an `Arc<dyn Clock>` so tests can pin the calendar.
pub trait Clock: Send + Sync {
    /// Current UTC timestamp
    fn now(&self) -> DateTime<Utc>;

    /// Current UTC day
    fn today(&self) -> NaiveDate {
        to_day(self.now())
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now()
    }
}

/// Clock frozen at a settable instant
#[derive(Debug)]
pub struct FixedClock {
    instant: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock frozen at `instant`
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: RwLock::new(instant),
        }
    }

    /// Create a clock frozen at midday of `date`
    pub fn at_day(date: NaiveDate) -> Self {
        let instant = date
            .and_hms_opt(12, 0, 0)
            .map(|naive| naive.and_utc())
            .unwrap_or_else(now);
        Self::new(instant)
    }

    /// Move the clock to `instant`
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut guard) = self.instant.write() {
            *guard = instant;
        }
    }

    /// Move the clock forward by whole days
    pub fn advance_days(&self, days: u64) {
        if let Ok(mut guard) = self.instant.write() {
            if let Some(next) = guard.checked_add_days(Days::new(days)) {
                *guard = next;
            }
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.instant.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
