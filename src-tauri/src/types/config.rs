use serde::{Deserialize, Serialize};

use crate::timerange::TimeRangeTable;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Persisted dashboard settings. Missing fields take their defaults so older
/// stored JSON keeps loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub refresh_interval_secs: u64,
    pub page_size: u32,
    pub options_ttl_secs: i64,
    pub default_time_range: String,
    pub time_ranges: Option<TimeRangeTable>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_interval_secs: 60,
            page_size: 25,
            options_ttl_secs: 3600,
            default_time_range: "Last 1 hour".to_string(),
            time_ranges: None,
        }
    }
}

impl DashboardConfig {
    pub fn time_range_table(&self) -> TimeRangeTable {
        self.time_ranges.clone().unwrap_or_default()
    }
}
