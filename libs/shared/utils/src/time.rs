use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

const CLOCK_FORMAT: &str = "%H:%M";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeRangeError {
    #[error("Time range '{0}' must look like HH:MM-HH:MM")]
    Malformed(String),

    #[error("Time range start {start} must be before end {end}")]
    Inverted { start: String, end: String },
}

impl From<TimeRangeError> for AppError {
    fn from(err: TimeRangeError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// A same-day clock interval rendered as `HH:MM-HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, TimeRangeError> {
        if start >= end {
            return Err(TimeRangeError::Inverted {
                start: start.format(CLOCK_FORMAT).to_string(),
                end: end.format(CLOCK_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

pub fn parse_clock_time(raw: &str) -> Result<NaiveTime, TimeRangeError> {
    NaiveTime::parse_from_str(raw.trim(), CLOCK_FORMAT)
        .map_err(|_| TimeRangeError::Malformed(raw.to_string()))
}

impl FromStr for TimeRange {
    type Err = TimeRangeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (start, end) = raw
            .split_once('-')
            .ok_or_else(|| TimeRangeError::Malformed(raw.to_string()))?;
        let start = parse_clock_time(start).map_err(|_| TimeRangeError::Malformed(raw.to_string()))?;
        let end = parse_clock_time(end).map_err(|_| TimeRangeError::Malformed(raw.to_string()))?;
        Self::new(start, end)
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format(CLOCK_FORMAT),
            self.end.format(CLOCK_FORMAT)
        )
    }
}

impl TryFrom<String> for TimeRange {
    type Error = TimeRangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeRange> for String {
    fn from(range: TimeRange) -> Self {
        range.to_string()
    }
}

/// The fixed-offset zone in which appointment dates and clock times are expressed.
#[derive(Debug, Clone, Copy)]
pub struct OperatingTimezone {
    offset: FixedOffset,
}

impl OperatingTimezone {
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// The UTC instant of a local calendar date and clock time.
    pub fn instant(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        let utc = local - Duration::seconds(self.offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&utc)
    }

    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.instant(date, NaiveTime::default())
    }
}
