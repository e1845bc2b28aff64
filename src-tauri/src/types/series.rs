use serde::{Deserialize, Serialize};

use crate::timerange::parse_timestamp;
use chrono::NaiveDateTime;

/// One `[timestamp, value]` sample as the backend sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint(pub String, pub f64);

impl SeriesPoint {
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.0).ok()
    }

    pub fn value(&self) -> f64 {
        self.1
    }
}

/// A named metric series with optional anomaly markers. Replaced wholesale
/// on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySeries {
    pub title: String,
    pub data: Vec<SeriesPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<SeriesPoint>>,
}

impl AnomalySeries {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn anomaly_count(&self) -> usize {
        self.anomalies.as_ref().map_or(0, Vec::len)
    }

    /// Earliest and latest parseable timestamps in `data`.
    pub fn extent(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        self.data
            .iter()
            .filter_map(SeriesPoint::timestamp)
            .fold(None, |acc, t| match acc {
                None => Some((t, t)),
                Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
            })
    }
}
