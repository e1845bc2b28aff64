use chrono::{Duration, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};

/// Wire format for every timestamp exchanged with the backend.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Separator between the two halves of a custom range label.
pub const CUSTOM_RANGE_SEPARATOR: &str = " - ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRangeBucket {
    pub label: String,
    pub minutes: u32,
}

impl TimeRangeBucket {
    pub fn new(label: impl Into<String>, minutes: u32) -> Self {
        Self {
            label: label.into(),
            minutes,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.minutes))
    }
}

/// Ordered label → minutes table. Order is smallest to largest and defines
/// which buckets are adjacent for zooming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TimeRangeBucket>", into = "Vec<TimeRangeBucket>")]
pub struct TimeRangeTable {
    buckets: Vec<TimeRangeBucket>,
}

impl TimeRangeTable {
    pub fn new(buckets: Vec<TimeRangeBucket>) -> Result<Self> {
        if buckets.is_empty() {
            return Err(DashboardError::InvalidTimeRangeTable(
                "table has no buckets".to_string(),
            ));
        }
        for (i, bucket) in buckets.iter().enumerate() {
            if bucket.minutes == 0 {
                return Err(DashboardError::InvalidTimeRangeTable(format!(
                    "bucket '{}' has zero minutes",
                    bucket.label
                )));
            }
            if bucket.label.contains(CUSTOM_RANGE_SEPARATOR) {
                return Err(DashboardError::InvalidTimeRangeTable(format!(
                    "bucket label '{}' looks like a custom range",
                    bucket.label
                )));
            }
            if buckets[..i].iter().any(|b| b.label == bucket.label) {
                return Err(DashboardError::InvalidTimeRangeTable(format!(
                    "duplicate label '{}'",
                    bucket.label
                )));
            }
            if i > 0 && buckets[i - 1].minutes >= bucket.minutes {
                return Err(DashboardError::InvalidTimeRangeTable(format!(
                    "bucket '{}' is not larger than '{}'",
                    bucket.label,
                    buckets[i - 1].label
                )));
            }
        }
        Ok(Self { buckets })
    }

    pub fn buckets(&self) -> &[TimeRangeBucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TimeRangeBucket> {
        self.buckets.get(index)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.buckets.iter().position(|b| b.label == label)
    }

    pub fn minutes(&self, label: &str) -> Option<u32> {
        self.buckets
            .iter()
            .find(|b| b.label == label)
            .map(|b| b.minutes)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.label.as_str())
    }
}

impl Default for TimeRangeTable {
    fn default() -> Self {
        let buckets = [
            ("Last 5 minutes", 5),
            ("Last 15 minutes", 15),
            ("Last 30 minutes", 30),
            ("Last 1 hour", 60),
            ("Last 3 hours", 180),
            ("Last 6 hours", 360),
            ("Last 12 hours", 720),
            ("Last 24 hours", 1440),
            ("Last 2 days", 2880),
            ("Last 7 days", 10080),
        ]
        .into_iter()
        .map(|(label, minutes)| TimeRangeBucket::new(label, minutes))
        .collect();
        Self { buckets }
    }
}

impl TryFrom<Vec<TimeRangeBucket>> for TimeRangeTable {
    type Error = DashboardError;

    fn try_from(buckets: Vec<TimeRangeBucket>) -> Result<Self> {
        Self::new(buckets)
    }
}

impl From<TimeRangeTable> for Vec<TimeRangeBucket> {
    fn from(table: TimeRangeTable) -> Self {
        table.buckets
    }
}

/// Start/end as the backend expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRange {
    pub start_time: String,
    pub end_time: String,
}

/// Concrete window with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start >= end {
            return Err(DashboardError::InvalidRangeFormat(format!(
                "{}{}{}",
                start.format(TIMESTAMP_FORMAT),
                CUSTOM_RANGE_SEPARATOR,
                end.format(TIMESTAMP_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(range: &ResolvedRange) -> Result<Self> {
        let start = parse_timestamp(&range.start_time)?;
        let end = parse_timestamp(&range.end_time)?;
        Self::new(start, end)
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn to_resolved(&self) -> ResolvedRange {
        ResolvedRange {
            start_time: self.start.format(TIMESTAMP_FORMAT).to_string(),
            end_time: self.end.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| DashboardError::InvalidTimestamp(s.to_string()))
}

pub fn is_custom_range(label: &str) -> bool {
    label.contains(CUSTOM_RANGE_SEPARATOR)
}

/// Label the date pickers produce for an explicit window.
pub fn custom_range_label(window: &TimeWindow) -> String {
    let resolved = window.to_resolved();
    format!(
        "{}{}{}",
        resolved.start_time, CUSTOM_RANGE_SEPARATOR, resolved.end_time
    )
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t - Duration::seconds(i64::from(t.second()))
        - Duration::nanoseconds(i64::from(t.nanosecond()))
}

/// Resolve `label` against `table` at instant `now`.
///
/// Labels containing `" - "` are custom ranges and are returned as-is once
/// both halves are known to be present. Anything else must name a bucket; the
/// window then ends at `now` rounded down to the minute.
pub fn resolve_time_range(
    table: &TimeRangeTable,
    label: &str,
    now: NaiveDateTime,
) -> Result<ResolvedRange> {
    if let Some((start, end)) = label.split_once(CUSTOM_RANGE_SEPARATOR) {
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() || end.is_empty() {
            return Err(DashboardError::InvalidRangeFormat(label.to_string()));
        }
        return Ok(ResolvedRange {
            start_time: start.to_string(),
            end_time: end.to_string(),
        });
    }

    let minutes = table
        .minutes(label)
        .ok_or_else(|| DashboardError::UnknownRangeLabel(label.to_string()))?;
    let end = truncate_to_minute(now);
    let start = end - Duration::minutes(i64::from(minutes));
    Ok(TimeWindow { start, end }.to_resolved())
}

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// [`resolve_time_range`] against the local clock.
pub fn resolve_time_range_now(table: &TimeRangeTable, label: &str) -> Result<ResolvedRange> {
    resolve_time_range(table, label, local_now())
}
