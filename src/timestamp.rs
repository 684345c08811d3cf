use std::fmt;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How to read timestamps that carry no UTC offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NaiveTz {
    /// Treat naive timestamps as UTC wall-clock time.
    #[default]
    Utc,
    /// Treat naive timestamps as the host's local time.
    Local,
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse a usage-period value into an absolute instant.
///
/// Accepts epoch seconds (integer or fractional), RFC 3339, and the
/// naive layouts billing exports use. `field` names the column for errors.
pub fn parse_timestamp(field: &'static str, value: &str, naive_tz: NaiveTz) -> Result<DateTime<Utc>> {
    let invalid = || Error::InvalidTimestamp {
        field,
        value: value.to_string(),
    };
    let raw = value.trim();
    if raw.is_empty() {
        return Err(invalid());
    }

    if let Ok(secs) = raw.parse::<f64>() {
        return epoch_to_utc(secs).ok_or_else(invalid);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok_or_else(invalid)?;

    match naive_tz {
        NaiveTz::Utc => Ok(naive.and_utc()),
        NaiveTz::Local => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(invalid),
    }
}

fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// A billing period: `start` and `end` as absolute instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Canonical bucket key, e.g.
    /// `2015-03-01 00:00:00+00:00-2015-03-01 01:00:00+00:00`.
    pub fn key(&self) -> String {
        format!("{}-{}", format_instant(&self.start), format_instant(&self.end))
    }

    /// True when `other` lies entirely inside this interval.
    /// Partial overlap does not count.
    pub fn contains(&self, other: &Interval) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Earliest start wins, latest end wins.
    pub fn widen(&mut self, other: &Interval) {
        if other.start < self.start {
            self.start = other.start;
        }
        if other.end > self.end {
            self.end = other.end;
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

pub fn format_instant(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}
