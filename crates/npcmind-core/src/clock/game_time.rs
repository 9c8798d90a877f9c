//! Calendar time inside the simulation

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;
/// Approximate month used by the minute count
const MINUTES_PER_MONTH: i64 = 30 * MINUTES_PER_DAY;
/// Approximate year used by the minute count
const MINUTES_PER_YEAR: i64 = 365 * MINUTES_PER_DAY;
/// Origin of the minute count
pub const BASE_YEAR: i32 = 2024;
pub const MAX_YEAR: i32 = 2100;

/// Minute-resolution simulated date and time.
///
/// Field order makes the derived ordering chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid game time '{input}': expected YYYY-MM-DD HH:MM")]
pub struct GameTimeParseError {
    pub input: String,
}

impl GameTime {
    pub const fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
        }
    }

    /// Build a valid time, clamping every field into range
    pub fn clamped(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let year = year.clamp(BASE_YEAR, MAX_YEAR);
        let month = month.clamp(1, 12);
        Self {
            year,
            month,
            day: day.clamp(1, Self::days_in_month(year, month)),
            hour: hour.min(23),
            minute: minute.min(59),
        }
    }

    pub fn is_leap_year(year: i32) -> bool {
        (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
    }

    pub fn days_in_month(year: i32, month: u32) -> u32 {
        match month {
            2 if Self::is_leap_year(year) => 29,
            2 => 28,
            4 | 6 | 9 | 11 => 30,
            _ => 31,
        }
    }

    /// Same date at another time of day
    pub fn at(self, hour: u32, minute: u32) -> Self {
        Self::clamped(self.year, self.month, self.day, hour, minute)
    }

    pub fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    /// Advance along the real calendar (leap years included)
    pub fn advance_minutes(self, minutes: u64) -> Self {
        let total = u64::from(self.minute_of_day()).saturating_add(minutes);
        let days = total / MINUTES_PER_DAY as u64;
        let hour = ((total / 60) % 24) as u32;
        let minute = (total % 60) as u32;

        let month = self.month.clamp(1, 12);
        let day = self.day.clamp(1, Self::days_in_month(self.year, month));
        let date = NaiveDate::from_ymd_opt(self.year, month, day)
            .and_then(|date| date.checked_add_days(Days::new(days)));
        match date {
            Some(date) => Self::new(date.year(), date.month(), date.day(), hour, minute),
            // Past the end of the representable calendar
            None => {
                let last = NaiveDate::MAX;
                Self::new(last.year(), last.month(), last.day(), 23, 59)
            }
        }
    }

    /// Minutes since the base year using 30-day months and 365-day years.
    ///
    /// Approximate; only useful for coarse comparisons and storage.
    pub fn to_minutes(&self) -> i64 {
        i64::from(self.minute)
            + i64::from(self.hour) * MINUTES_PER_HOUR
            + (i64::from(self.day) - 1) * MINUTES_PER_DAY
            + (i64::from(self.month) - 1) * MINUTES_PER_MONTH
            + i64::from(self.year - BASE_YEAR) * MINUTES_PER_YEAR
    }

    /// Inverse of `to_minutes`
    pub fn from_minutes(total: i64) -> Self {
        let total = total.max(0);
        let year = BASE_YEAR + (total / MINUTES_PER_YEAR) as i32;
        let rest = total % MINUTES_PER_YEAR;
        // 365 = 12 * 30 + 5, so the last five days spill into a 13th "month"
        let month = (rest / MINUTES_PER_MONTH) as u32 + 1;
        let rest = rest % MINUTES_PER_MONTH;
        let day = (rest / MINUTES_PER_DAY) as u32 + 1;
        let rest = rest % MINUTES_PER_DAY;
        Self::new(
            year,
            month,
            day,
            (rest / MINUTES_PER_HOUR) as u32,
            (rest % MINUTES_PER_HOUR) as u32,
        )
    }
}

impl Default for GameTime {
    fn default() -> Self {
        Self::new(BASE_YEAR, 1, 1, 6, 0)
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

impl FromStr for GameTime {
    type Err = GameTimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || GameTimeParseError {
            input: s.to_string(),
        };
        let (date, time) = s.trim().split_once(' ').ok_or_else(err)?;
        let fields = date
            .split('-')
            .chain(time.trim().split(':'))
            .map(|part| part.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(err)?;
        let [year, month, day, hour, minute] = fields[..] else {
            return Err(err());
        };
        let year = year as i32;

        if !(1..=12).contains(&month)
            || day == 0
            || day > Self::days_in_month(year, month)
            || hour > 23
            || minute > 59
        {
            return Err(err());
        }
        Ok(Self::new(year, month, day, hour, minute))
    }
}
