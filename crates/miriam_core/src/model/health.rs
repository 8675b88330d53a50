//! Resource health states, reliability and check calendars.
//!
//! # Invariants
//! - State codes are stable storage values: 0 down, 1 up, 2 unknown,
//!   3 probably up, 4 obsolete, 5 restricted, 8 no check, 9 no such day.
//! - Reliability is `round(uptime * 100 / (uptime + downtime))`, 0 when no
//!   success or failure was ever recorded.

use super::identifier::{CollectionId, ResourceId};
use chrono::{DateTime, Datelike, Month, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Failure,
    Success,
    Unknown,
    ProbablyUp,
    Obsolete,
    Restricted,
    /// Calendar slot of a real day without any check.
    NotApplicable,
    /// Calendar slot past the end of the month.
    Nonexistent,
}

impl HealthState {
    pub const ALL: [HealthState; 8] = [
        Self::Failure,
        Self::Success,
        Self::Unknown,
        Self::ProbablyUp,
        Self::Obsolete,
        Self::Restricted,
        Self::NotApplicable,
        Self::Nonexistent,
    ];

    pub fn code(self) -> i64 {
        match self {
            Self::Failure => 0,
            Self::Success => 1,
            Self::Unknown => 2,
            Self::ProbablyUp => 3,
            Self::Obsolete => 4,
            Self::Restricted => 5,
            Self::NotApplicable => 8,
            Self::Nonexistent => 9,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.code() == code)
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Failure => "down",
            Self::Success => "up",
            Self::Unknown => "unknown",
            Self::ProbablyUp => "probably up",
            Self::Obsolete => "obsolete resource",
            Self::Restricted => "restricted access",
            Self::NotApplicable => "na",
            Self::Nonexistent => "no data",
        }
    }

    /// Display colour used by status pages.
    pub fn colour(self) -> &'static str {
        match self {
            Self::Failure => "red",
            Self::Success => "green",
            Self::ProbablyUp => "lightgreen",
            Self::Unknown => "orange",
            Self::Obsolete | Self::Restricted => "grey",
            Self::NotApplicable | Self::Nonexistent => "white",
        }
    }

    /// Resource answered as expected.
    pub fn is_working(self) -> bool {
        matches!(self, Self::Success | Self::ProbablyUp)
    }
}

/// Uptime percentage over recorded successes and failures.
pub fn reliability(uptime: u64, downtime: u64) -> u8 {
    let total = uptime + downtime;
    if total == 0 {
        return 0;
    }
    ((uptime * 100 + total / 2) / total) as u8
}

/// Outcome of one check, as produced by the external checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub resource_id: ResourceId,
    pub state: HealthState,
    /// Epoch ms of the check.
    pub checked_at: i64,
    pub message: Option<String>,
    pub errors: Option<String>,
}

impl CheckReport {
    /// Report stamped with the current time.
    pub fn now(resource_id: impl Into<ResourceId>, state: HealthState) -> Self {
        Self::at(resource_id, state, Utc::now().timestamp_millis())
    }

    pub fn at(resource_id: impl Into<ResourceId>, state: HealthState, checked_at: i64) -> Self {
        Self {
            resource_id: resource_id.into(),
            state,
            checked_at,
            message: None,
            errors: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_errors(mut self, errors: impl Into<String>) -> Self {
        self.errors = Some(errors.into());
        self
    }
}

/// Aggregate health record of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceCheckDetails {
    pub resource_id: ResourceId,
    pub collection_id: CollectionId,
    pub state: HealthState,
    pub last_check: Option<i64>,
    pub last_success: Option<i64>,
    pub last_failure: Option<i64>,
    /// Start of the current working streak.
    pub uptime_since: Option<i64>,
    /// Start of the current failing streak.
    pub downtime_since: Option<i64>,
    pub uptime: u64,
    pub downtime: u64,
    pub unknown: u64,
    pub keyword: Option<String>,
    pub message: Option<String>,
    pub errors: Option<String>,
}

impl ResourceCheckDetails {
    pub fn reliability(&self) -> u8 {
        reliability(self.uptime, self.downtime)
    }
}

/// One month of daily states, 31 slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthHistory {
    pub name: &'static str,
    pub days: [HealthState; 31],
}

/// Daily health states grouped by year, 12 months per year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthCalendar {
    pub years: BTreeMap<i32, Vec<MonthHistory>>,
}

impl HealthCalendar {
    /// Builds the calendar from `(epoch ms, state)` checks.
    ///
    /// Checks must be ordered oldest first; the last check of a day wins.
    pub fn from_checks(checks: &[(i64, HealthState)]) -> Self {
        let mut calendar = Self::default();
        for (checked_at, state) in checks {
            let Some(date) = DateTime::from_timestamp_millis(*checked_at) else {
                continue;
            };
            let date = date.date_naive();
            let months = calendar
                .years
                .entry(date.year())
                .or_insert_with(|| empty_year(date.year()));
            months[date.month0() as usize].days[date.day0() as usize] = *state;
        }
        calendar
    }

    /// State recorded for one day, `None` when the year has no checks.
    pub fn day(&self, year: i32, month: u32, day: u32) -> Option<HealthState> {
        let months = self.years.get(&year)?;
        let month = months.get(month.checked_sub(1)? as usize)?;
        month.days.get(day.checked_sub(1)? as usize).copied()
    }
}

fn empty_year(year: i32) -> Vec<MonthHistory> {
    (1..=12u32)
        .map(|month| {
            let length = days_in_month(year, month);
            let mut days = [HealthState::Nonexistent; 31];
            for slot in days.iter_mut().take(length as usize) {
                *slot = HealthState::NotApplicable;
            }
            MonthHistory {
                name: Month::try_from(month as u8).map_or("", |month| month.name()),
                days,
            }
        })
        .collect()
}

fn days_in_month(year: i32, month: u32) -> u32 {
    (28..=31)
        .rev()
        .find(|day| NaiveDate::from_ymd_opt(year, month, *day).is_some())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::{reliability, HealthCalendar, HealthState};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn millis(year: i32, month: u32, day: u32, hour: u32) -> i64 {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        Utc.from_utc_datetime(&date).timestamp_millis()
    }

    #[test]
    fn reliability_rounds_percentage() {
        assert_eq!(reliability(0, 0), 0);
        assert_eq!(reliability(75, 25), 75);
        assert_eq!(reliability(2, 1), 67);
        assert_eq!(reliability(1, 2), 33);
        assert_eq!(reliability(10, 0), 100);
    }

    #[test]
    fn codes_are_stable() {
        for state in HealthState::ALL {
            assert_eq!(HealthState::from_code(state.code()), Some(state));
        }
        assert_eq!(HealthState::NotApplicable.code(), 8);
        assert_eq!(HealthState::Nonexistent.code(), 9);
        assert_eq!(HealthState::from_code(6), None);
        assert_eq!(HealthState::ProbablyUp.description(), "probably up");
    }

    #[test]
    fn calendar_pads_missing_and_impossible_days() {
        let calendar = HealthCalendar::from_checks(&[(millis(2023, 2, 10, 9), HealthState::Success)]);

        let months = &calendar.years[&2023];
        assert_eq!(months.len(), 12);
        assert_eq!(months[1].name, "February");
        assert_eq!(calendar.day(2023, 2, 10), Some(HealthState::Success));
        assert_eq!(calendar.day(2023, 2, 11), Some(HealthState::NotApplicable));
        assert_eq!(calendar.day(2023, 2, 28), Some(HealthState::NotApplicable));
        assert_eq!(calendar.day(2023, 2, 29), Some(HealthState::Nonexistent));
        assert_eq!(calendar.day(2023, 4, 31), Some(HealthState::Nonexistent));
        assert_eq!(calendar.day(2022, 1, 1), None);
    }

    #[test]
    fn calendar_handles_leap_years_and_last_check_of_day() {
        let calendar = HealthCalendar::from_checks(&[
            (millis(2024, 2, 29, 1), HealthState::Failure),
            (millis(2024, 2, 29, 13), HealthState::Success),
        ]);
        assert_eq!(calendar.day(2024, 2, 29), Some(HealthState::Success));
        assert_eq!(calendar.day(2024, 2, 30), Some(HealthState::Nonexistent));
    }
}
