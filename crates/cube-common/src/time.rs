//! Time handling for acquisition times and `datetime` query filters.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A closed time range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Zero-length range at one instant.
    pub fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// Overlap of two ranges, `None` when disjoint.
    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(TimeRange { start, end })
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &TimeRange) -> TimeRange {
        TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// `start/end` in RFC 3339, as used in `Content-Datetime` headers.
    pub fn to_interval_string(&self) -> String {
        if self.start == self.end {
            format_datetime(&self.start)
        } else {
            format!(
                "{}/{}",
                format_datetime(&self.start),
                format_datetime(&self.end)
            )
        }
    }
}

/// Parsed `datetime` query parameter.
///
/// Both bounds are inclusive; `None` means open-ended. A date-only instant
/// such as `2020-06-15` covers that whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeFilter {
    /// A filter that matches everything.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Parse an OGC API `datetime` value.
    ///
    /// Supports:
    /// - Instant: "2020-06-15T12:00:00Z" or "2020-06-15"
    /// - Interval: "2020-06-01/2020-06-30"
    /// - Open interval: "../2020-06-30", "2020-06-01/..", "2020-06-01/"
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TimeParseError::InvalidFormat(s.to_string()));
        }

        if let Some((start, end)) = s.split_once('/') {
            let start = parse_bound(start, Bound::Start)?;
            let end = parse_bound(end, Bound::End)?;
            if let (Some(a), Some(b)) = (start, end) {
                if a > b {
                    return Err(TimeParseError::InvertedInterval(s.to_string()));
                }
            }
            return Ok(Self { start, end });
        }

        match parse_datetime(s)? {
            Parsed::Date(date) => Ok(Self {
                start: Some(start_of_day(date)),
                end: Some(end_of_day(date)),
            }),
            Parsed::DateTime(dt) => Ok(Self {
                start: Some(dt),
                end: Some(dt),
            }),
        }
    }

    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| dt >= &s) && self.end.map_or(true, |e| dt <= &e)
    }

    /// Intersect this filter with a closed range.
    pub fn clip(&self, range: &TimeRange) -> Option<TimeRange> {
        let start = self.start.map_or(range.start, |s| s.max(range.start));
        let end = self.end.map_or(range.end, |e| e.min(range.end));
        (start <= end).then_some(TimeRange { start, end })
    }

    /// True when the filter overlaps the given range.
    pub fn overlaps(&self, range: &TimeRange) -> bool {
        self.clip(range).is_some()
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

enum Parsed {
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

fn parse_bound(s: &str, bound: Bound) -> Result<Option<DateTime<Utc>>, TimeParseError> {
    let s = s.trim();
    if s.is_empty() || s == ".." {
        return Ok(None);
    }
    Ok(Some(match (parse_datetime(s)?, bound) {
        (Parsed::DateTime(dt), _) => dt,
        (Parsed::Date(d), Bound::Start) => start_of_day(d),
        (Parsed::Date(d), Bound::End) => end_of_day(d),
    }))
}

fn parse_datetime(s: &str) -> Result<Parsed, TimeParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Parsed::DateTime(dt.with_timezone(&Utc)));
    }

    // Without timezone, assume UTC
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Parsed::DateTime(Utc.from_utc_datetime(&ndt)));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Parsed::Date(date));
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Parse a single ISO 8601 timestamp, date-only values at midnight UTC.
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    match parse_datetime(s.trim())? {
        Parsed::DateTime(dt) => Ok(dt),
        Parsed::Date(d) => Ok(start_of_day(d)),
    }
}

/// RFC 3339 with a `Z` suffix and second precision.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::nanoseconds(1)
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid time interval {0}: start is after end")]
    InvertedInterval(String),
}
