//! Timestamp sequencing for map stacks
//!
//! A map stack holds one map per timestep. The converter needs the ordered,
//! gap-free list of timestamps the stack covers so each map can be placed on
//! the container's time axis.

use crate::errors::{Result, RuNeStackError};
use chrono::{Duration, NaiveDateTime};
use std::fmt;

/// Cadence of a map stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUnit {
    Day,
    Hour,
}

impl StepUnit {
    /// Map a timestep given in seconds onto a supported cadence.
    ///
    /// Only 86400 (daily) and 3600 (hourly) are accepted.
    pub fn from_seconds(seconds: u64) -> Result<Self> {
        match seconds {
            86_400 => Ok(StepUnit::Day),
            3_600 => Ok(StepUnit::Hour),
            _ => Err(RuNeStackError::UnsupportedTimestep { seconds }),
        }
    }

    /// Offset of the `n`-th step from the first one
    pub fn offset(self, n: i64) -> Duration {
        match self {
            StepUnit::Day => Duration::days(n),
            StepUnit::Hour => Duration::hours(n),
        }
    }

    /// Number of steps that fit in one day
    pub fn steps_per_day(self) -> i64 {
        match self {
            StepUnit::Day => 1,
            StepUnit::Hour => 24,
        }
    }
}

impl fmt::Display for StepUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepUnit::Day => write!(f, "day"),
            StepUnit::Hour => write!(f, "hour"),
        }
    }
}

/// Builds the ordered timestamps between `start` and `end`.
///
/// The span is counted in whole calendar days, `end`'s day included. Daily
/// sequences hold one entry per day and hourly sequences 24 per day, each
/// entry offset from `start` by a whole number of steps.
///
/// # Errors
///
/// Returns [`RuNeStackError::InvalidTimeRange`] when `end` falls on a day
/// before `start`.
pub fn sequence(start: NaiveDateTime, end: NaiveDateTime, step: StepUnit) -> Result<Vec<NaiveDateTime>> {
    let days = (end.date() - start.date()).num_days() + 1;
    if days < 1 {
        return Err(RuNeStackError::InvalidTimeRange { start, end });
    }

    let count = days * step.steps_per_day();
    Ok((0..count).map(|i| start + step.offset(i)).collect())
}
