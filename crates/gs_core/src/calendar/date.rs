//! Calendar date value type.
//!
//! One concrete date type for the whole engine. Conversion to Unix-ms
//! integers and ISO `YYYY-MM-DD` strings happens only at the storage
//! boundary; everything above it passes `Date` values around.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

const MS_PER_DAY: i64 = 86_400_000;

/// A calendar day. Ordered, copyable, and convertible to/from Unix-ms
/// timestamps. No timezone handling: timestamps are interpreted as local
/// wall-clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(NaiveDate);

impl Date {
    /// Build a date from year/month/day. Returns `None` for invalid
    /// combinations (e.g. Feb 30).
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Date)
    }

    /// Parse an ISO `YYYY-MM-DD` string.
    pub fn parse(value: &str) -> Result<Self> {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Date)
            .map_err(|e| SyncError::State(format!("invalid date '{value}': {e}")))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// The date `days` days later (negative moves backward).
    pub fn add_days(&self, days: i64) -> Self {
        Date(self.0 + Duration::days(days))
    }

    pub fn next_day(&self) -> Self {
        self.add_days(1)
    }

    /// Signed difference `self - other` in whole days.
    pub fn days_since(&self, other: Date) -> i64 {
        (self.0 - other.0).num_days()
    }

    /// Midnight of this day as Unix milliseconds.
    pub fn start_of_day_ms(&self) -> i64 {
        NaiveDateTime::new(self.0, NaiveTime::MIN)
            .and_utc()
            .timestamp_millis()
    }

    /// Last millisecond of this day.
    pub fn end_of_day_ms(&self) -> i64 {
        self.start_of_day_ms() + MS_PER_DAY - 1
    }

    /// The day containing the given Unix-ms timestamp.
    pub fn from_millis(ms: i64) -> Result<Self> {
        chrono::DateTime::from_timestamp_millis(ms)
            .map(|dt| Date(dt.date_naive()))
            .ok_or_else(|| SyncError::State(format!("timestamp {ms}ms out of range")))
    }

    /// NFL season year for this date. The season year boundary is August 1:
    /// Aug-Dec belong to the current calendar year, Jan-Jul to the previous
    /// one. This is the single definition of year-from-date derivation.
    pub fn season_year(&self) -> i32 {
        if self.month() >= 8 {
            self.year()
        } else {
            self.year() - 1
        }
    }

    /// First Thursday of August for the given season year. Used as the
    /// preseason start when no preseason games are scheduled yet.
    pub fn first_thursday_of_august(season_year: i32) -> Self {
        let mut d = NaiveDate::from_ymd_opt(season_year, 8, 1)
            .expect("August 1 exists in every year");
        while d.weekday() != Weekday::Thu {
            d += Duration::days(1);
        }
        Date(d)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for Date {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Date::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ordering_and_arithmetic() {
        let a = Date::new(2024, 8, 1).unwrap();
        let b = a.add_days(31);
        assert!(b > a);
        assert_eq!(b.to_string(), "2024-09-01");
        assert_eq!(b.days_since(a), 31);
        assert_eq!(a.next_day().to_string(), "2024-08-02");
    }

    #[test]
    fn millis_round_trip() {
        let d = Date::new(2025, 1, 15).unwrap();
        assert_eq!(Date::from_millis(d.start_of_day_ms()).unwrap(), d);
        assert_eq!(Date::from_millis(d.end_of_day_ms()).unwrap(), d);
        assert_eq!(Date::from_millis(d.end_of_day_ms() + 1).unwrap(), d.next_day());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(Date::parse("not-a-date").is_err());
        assert!(Date::parse("2024-13-01").is_err());
        assert_eq!(Date::parse("2024-08-01").unwrap(), Date::new(2024, 8, 1).unwrap());
    }

    #[test]
    fn season_year_boundary_is_august_first() {
        assert_eq!(Date::new(2025, 8, 1).unwrap().season_year(), 2025);
        assert_eq!(Date::new(2026, 1, 15).unwrap().season_year(), 2025);
        assert_eq!(Date::new(2026, 7, 31).unwrap().season_year(), 2025);
        assert_eq!(Date::new(2026, 8, 1).unwrap().season_year(), 2026);
    }

    #[test]
    fn first_thursday_of_august_known_years() {
        // 2024-08-01 is a Thursday; 2025-08-07 is the first Thursday of Aug 2025
        assert_eq!(
            Date::first_thursday_of_august(2024),
            Date::new(2024, 8, 1).unwrap()
        );
        assert_eq!(
            Date::first_thursday_of_august(2025),
            Date::new(2025, 8, 7).unwrap()
        );
    }

    proptest! {
        #[test]
        fn season_year_derivation(year in 1990i32..2100, month in 1u32..=12, day in 1u32..=28) {
            let d = Date::new(year, month, day).unwrap();
            if month >= 8 {
                prop_assert_eq!(d.season_year(), year);
            } else {
                prop_assert_eq!(d.season_year(), year - 1);
            }
        }

        #[test]
        fn millis_round_trip_any_day(offset in 0i64..40_000) {
            let d = Date::new(1990, 1, 1).unwrap().add_days(offset);
            prop_assert_eq!(Date::from_millis(d.start_of_day_ms()).unwrap(), d);
        }
    }
}
