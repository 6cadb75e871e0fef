//! Cycle and valid-time handling for GDAS data.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Hours between two consecutive GDAS cycles.
pub const CYCLE_INTERVAL_HOURS: i64 = 6;

/// Represents a valid time for meteorological data.
///
/// Combines reference time (model run time) and forecast offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidTime {
    /// Model run/reference time
    pub reference_time: DateTime<Utc>,
    /// Forecast hour offset from reference time
    pub forecast_hour: u32,
}

impl ValidTime {
    pub fn new(reference_time: DateTime<Utc>, forecast_hour: u32) -> Self {
        Self {
            reference_time,
            forecast_hour,
        }
    }

    /// Create from analysis time (forecast_hour = 0)
    pub fn analysis(reference_time: DateTime<Utc>) -> Self {
        Self {
            reference_time,
            forecast_hour: 0,
        }
    }

    /// Calculate the actual valid time (reference + forecast offset)
    pub fn valid_datetime(&self) -> DateTime<Utc> {
        self.reference_time + Duration::hours(self.forecast_hour as i64)
    }

    /// Directory component for the reference cycle: `YYYYMMDD/HH`.
    pub fn cycle_path(&self) -> String {
        self.reference_time.format("%Y%m%d/%H").to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid cycle format '{0}', expected YYYYMMDDHH")]
    InvalidFormat(String),

    #[error("Cycle {0} is not on a 6-hour boundary")]
    NotOnCycleBoundary(String),

    #[error("Cycle window is reversed: start {start} is after end {end}")]
    ReversedWindow { start: String, end: String },
}

/// Parse a `YYYYMMDDHH` cycle string.
///
/// The hour must be one of the four synoptic cycles (00, 06, 12, 18).
pub fn parse_cycle(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = s.trim();
    if trimmed.len() != 10 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TimeParseError::InvalidFormat(s.to_string()));
    }

    let ndt = NaiveDateTime::parse_from_str(&format!("{}00", trimmed), "%Y%m%d%H%M")
        .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))?;
    let dt = Utc.from_utc_datetime(&ndt);

    if !is_cycle_hour(dt.hour()) {
        return Err(TimeParseError::NotOnCycleBoundary(s.to_string()));
    }

    Ok(dt)
}

/// Format a cycle as `YYYYMMDDHH`.
pub fn format_cycle(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H").to_string()
}

fn is_cycle_hour(hour: u32) -> bool {
    hour as i64 % CYCLE_INTERVAL_HOURS == 0
}

/// An inclusive window of GDAS cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CycleRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeParseError> {
        for dt in [&start, &end] {
            let on_boundary = dt.minute() == 0
                && dt.second() == 0
                && dt.nanosecond() == 0
                && is_cycle_hour(dt.hour());
            if !on_boundary {
                return Err(TimeParseError::NotOnCycleBoundary(dt.to_rfc3339()));
            }
        }
        if start > end {
            return Err(TimeParseError::ReversedWindow {
                start: format_cycle(&start),
                end: format_cycle(&end),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from `YYYYMMDDHH` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeParseError> {
        Self::new(parse_cycle(start)?, parse_cycle(end)?)
    }

    /// All cycles in the window, oldest first.
    pub fn cycles(&self) -> Vec<DateTime<Utc>> {
        let mut cycles = Vec::new();
        let mut current = self.start;
        while current <= self.end {
            cycles.push(current);
            current += Duration::hours(CYCLE_INTERVAL_HOURS);
        }
        cycles
    }

    pub fn len(&self) -> usize {
        ((self.end - self.start).num_hours() / CYCLE_INTERVAL_HOURS) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
