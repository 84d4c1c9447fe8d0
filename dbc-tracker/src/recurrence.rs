//! Recurrence engine
//!
//! A recurrence rule decides which calendar days are trackable points
//! ("occurrences") of a challenge. Everything here works backwards from a
//! date: the streak math only ever needs "the occurrence before this one".
//!
//! All functions are pure and operate on UTC days ([`NaiveDate`]).

use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};
use dbc_common::time::{next_day, prev_day};

/// Search bound for weekday rules
const WEEKDAY_SEARCH_DAYS: usize = 7;

/// Search bound for month-day rules
const MONTH_DAY_SEARCH_DAYS: usize = 31;

pub const PERIOD_EVERY_DAY: &str = "every_day";
pub const PERIOD_WEEK_DAYS: &str = "week_days";
pub const PERIOD_MONTH_DATES: &str = "month_dates";

/// Which days count as occurrences
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RecurrenceRule {
    /// Every calendar day
    #[default]
    EveryDay,
    /// Days whose weekday index (0 = Sunday .. 6 = Saturday) is in the set
    SpecificWeekdays(BTreeSet<u8>),
    /// Days whose day-of-month (1..=31) is in the set
    SpecificMonthDays(BTreeSet<u8>),
}

impl RecurrenceRule {
    /// Build a rule from its persisted tag and values
    ///
    /// Values are not range-checked here; use [`RecurrenceRule::validate`]
    /// before storing a rule supplied by a caller.
    pub fn from_parts<I>(period_type: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut set = BTreeSet::new();
        for value in values {
            let value = u8::try_from(value)
                .map_err(|_| Error::MalformedRule(format!("value {} out of range", value)))?;
            set.insert(value);
        }

        match period_type {
            PERIOD_EVERY_DAY | "" => Ok(RecurrenceRule::EveryDay),
            PERIOD_WEEK_DAYS => Ok(RecurrenceRule::SpecificWeekdays(set)),
            PERIOD_MONTH_DATES => Ok(RecurrenceRule::SpecificMonthDays(set)),
            other => Err(Error::MalformedRule(format!("unknown period type '{}'", other))),
        }
    }

    /// Build a rule from the `period_type` / `period_data` columns
    pub fn from_columns(period_type: &str, period_data: &str) -> Result<Self> {
        let values = period_data
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| Error::MalformedRule(format!("invalid period value '{}'", s)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_parts(period_type, values)
    }

    /// Persisted tag
    pub fn period_type(&self) -> &'static str {
        match self {
            RecurrenceRule::EveryDay => PERIOD_EVERY_DAY,
            RecurrenceRule::SpecificWeekdays(_) => PERIOD_WEEK_DAYS,
            RecurrenceRule::SpecificMonthDays(_) => PERIOD_MONTH_DATES,
        }
    }

    /// Persisted values (comma-separated, ascending)
    pub fn period_data(&self) -> String {
        match self {
            RecurrenceRule::EveryDay => String::new(),
            RecurrenceRule::SpecificWeekdays(set) | RecurrenceRule::SpecificMonthDays(set) => set
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Check that every backward search under this rule terminates
    ///
    /// Weekday rules need at least one index in 0..=6. Month-day rules need
    /// values in 1..=31 and at least one day that exists in every month
    /// (1..=28); a rule made only of 29/30/31 has gaps longer than the
    /// 31-day search bound.
    pub fn validate(&self) -> Result<()> {
        match self {
            RecurrenceRule::EveryDay => Ok(()),
            RecurrenceRule::SpecificWeekdays(set) => {
                if set.is_empty() {
                    return Err(Error::MalformedRule("empty weekday set".to_string()));
                }
                if let Some(bad) = set.iter().find(|d| **d > 6) {
                    return Err(Error::MalformedRule(format!("weekday {} out of range", bad)));
                }
                Ok(())
            }
            RecurrenceRule::SpecificMonthDays(set) => {
                if set.is_empty() {
                    return Err(Error::MalformedRule("empty month-day set".to_string()));
                }
                if let Some(bad) = set.iter().find(|d| **d == 0 || **d > 31) {
                    return Err(Error::MalformedRule(format!("month day {} out of range", bad)));
                }
                if !set.iter().any(|d| *d <= 28) {
                    return Err(Error::MalformedRule(
                        "month-day set has no day present in every month".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    fn matches(&self, date: NaiveDate) -> bool {
        match self {
            RecurrenceRule::EveryDay => true,
            RecurrenceRule::SpecificWeekdays(set) => {
                set.contains(&(date.weekday().num_days_from_sunday() as u8))
            }
            RecurrenceRule::SpecificMonthDays(set) => set.contains(&(date.day() as u8)),
        }
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceRule::EveryDay => write!(f, "{}", PERIOD_EVERY_DAY),
            _ => write!(f, "{}[{}]", self.period_type(), self.period_data()),
        }
    }
}

/// Latest occurrence strictly before `from`
pub fn previous_occurrence(from: NaiveDate, rule: &RecurrenceRule) -> Result<NaiveDate> {
    let bound = match rule {
        RecurrenceRule::EveryDay => return Ok(prev_day(from)),
        RecurrenceRule::SpecificWeekdays(_) => WEEKDAY_SEARCH_DAYS,
        RecurrenceRule::SpecificMonthDays(_) => MONTH_DAY_SEARCH_DAYS,
    };

    let mut cursor = from;
    for _ in 0..bound {
        cursor = prev_day(cursor);
        if rule.matches(cursor) {
            return Ok(cursor);
        }
    }

    Err(Error::MalformedRule(format!(
        "no occurrence of {} within {} days before {}",
        rule, bound, from
    )))
}

/// Apply [`previous_occurrence`] `n` times
pub fn step_back_n(from: NaiveDate, rule: &RecurrenceRule, n: usize) -> Result<NaiveDate> {
    let mut cursor = from;
    for _ in 0..n {
        cursor = previous_occurrence(cursor, rule)?;
    }
    Ok(cursor)
}

/// Whether `date` is itself an occurrence
pub fn is_occurrence(date: NaiveDate, rule: &RecurrenceRule) -> Result<bool> {
    Ok(previous_occurrence(next_day(date), rule)? == date)
}

/// The `count` most recent occurrences on or before `from`, newest first
pub fn enumerate_backward(
    from: NaiveDate,
    rule: &RecurrenceRule,
    count: usize,
) -> Result<Vec<NaiveDate>> {
    let mut list = Vec::with_capacity(count);
    let mut cursor = next_day(from);
    for _ in 0..count {
        cursor = previous_occurrence(cursor, rule)?;
        list.push(cursor);
    }
    Ok(list)
}

/// Every occurrence strictly between `start` and `end`, ascending
pub fn missing_occurrences(
    start: NaiveDate,
    end: NaiveDate,
    rule: &RecurrenceRule,
) -> Result<Vec<NaiveDate>> {
    let mut list = Vec::new();
    let mut cursor = end;

    while start < cursor {
        cursor = previous_occurrence(cursor, rule)?;
        if start < cursor {
            list.push(cursor);
        }
    }

    // Produced newest first
    list.reverse();
    Ok(list)
}
