//! CF time units and calendar conversion
//!
//! Time coordinates are stored as numeric offsets from an epoch, described by a
//! units string such as `days since 1900-01-01 00:00:00` and a calendar name.
//! Only the Gregorian family of calendars is supported, which chrono handles
//! natively.

use crate::errors::{Result, RuNeStackError};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

/// Units string written to new containers
pub const DEFAULT_TIME_UNITS: &str = "days since 1900-01-01 00:00:00";

/// Calendar written to new containers
pub const DEFAULT_CALENDAR: &str = "gregorian";

/// Magnitude of one time coordinate step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Days => 86_400.0,
            TimeUnit::Hours => 3_600.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Seconds => 1.0,
        }
    }

    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => Some(TimeUnit::Days),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(TimeUnit::Hours),
            "minutes" | "minute" | "mins" | "min" => Some(TimeUnit::Minutes),
            "seconds" | "second" | "secs" | "sec" | "s" => Some(TimeUnit::Seconds),
            _ => None,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            TimeUnit::Days => "days",
            TimeUnit::Hours => "hours",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Seconds => "seconds",
        };
        f.write_str(word)
    }
}

/// Supported calendars
///
/// Offsets are always computed on the proleptic Gregorian calendar. For
/// `gregorian` that only agrees with netCDF's mixed Julian/Gregorian calendar
/// from the 1582-10-15 reform onwards, so earlier timestamps are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    /// `gregorian` / `standard`
    Gregorian,
    ProlepticGregorian,
}

impl Calendar {
    /// Whether `t` can be encoded in this calendar.
    pub fn supports(self, t: NaiveDateTime) -> bool {
        match self {
            Calendar::Gregorian => {
                NaiveDate::from_ymd_opt(1582, 10, 15).is_some_and(|reform| t.date() >= reform)
            }
            Calendar::ProlepticGregorian => true,
        }
    }
}

impl FromStr for Calendar {
    type Err = RuNeStackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gregorian" | "standard" => Ok(Calendar::Gregorian),
            "proleptic_gregorian" => Ok(Calendar::ProlepticGregorian),
            _ => Err(RuNeStackError::UnsupportedCalendar {
                calendar: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Gregorian => f.write_str("gregorian"),
            Calendar::ProlepticGregorian => f.write_str("proleptic_gregorian"),
        }
    }
}

/// Parsed `<unit> since <epoch>` string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub unit: TimeUnit,
    pub epoch: NaiveDateTime,
}

impl TimeUnits {
    /// Numeric offset of `t` from the epoch, in this unit.
    pub fn date2num(&self, t: NaiveDateTime) -> f64 {
        let delta = t - self.epoch;
        let seconds = delta.num_seconds() as f64
            + f64::from(delta.subsec_nanos()) / 1_000_000_000.0;
        seconds / self.unit.seconds()
    }

    /// Timestamp of a numeric offset, rounded to the nearest second.
    pub fn num2date(&self, value: f64) -> Result<NaiveDateTime> {
        let seconds = value * self.unit.seconds();
        if !seconds.is_finite() {
            return Err(RuNeStackError::InvalidTimeUnits {
                units: self.to_string(),
                reason: format!("offset {value} is not finite"),
            });
        }

        Duration::try_seconds(seconds.round() as i64)
            .and_then(|delta| self.epoch.checked_add_signed(delta))
            .ok_or_else(|| RuNeStackError::InvalidTimeUnits {
                units: self.to_string(),
                reason: format!("offset {value} overflows the calendar"),
            })
    }
}

impl Default for TimeUnits {
    fn default() -> Self {
        Self {
            unit: TimeUnit::Days,
            epoch: NaiveDate::from_ymd_opt(1900, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or_default(),
        }
    }
}

impl FromStr for TimeUnits {
    type Err = RuNeStackError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| RuNeStackError::InvalidTimeUnits {
            units: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.trim().splitn(3, char::is_whitespace);
        let unit_word = parts.next().unwrap_or_default();
        let since = parts.next().unwrap_or_default();
        let reference = parts.next().unwrap_or_default().trim();

        if !since.eq_ignore_ascii_case("since") {
            return Err(invalid("expected '<unit> since <epoch>'"));
        }
        let unit = TimeUnit::parse(unit_word).ok_or_else(|| invalid("unknown unit"))?;
        let epoch = parse_epoch(reference).ok_or_else(|| invalid("unparseable epoch"))?;

        Ok(Self { unit, epoch })
    }
}

impl fmt::Display for TimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} since {}", self.unit, self.epoch.format("%Y-%m-%d %H:%M:%S"))
    }
}

fn parse_epoch(s: &str) -> Option<NaiveDateTime> {
    // Trailing "UTC"/"Z" style zone markers carry no offset information here
    let s = s
        .trim_end_matches(|c: char| c.is_ascii_alphabetic() || c.is_whitespace())
        .trim();

    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
