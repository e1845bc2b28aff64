use serde::{Deserialize, Serialize};

/// Data source tabs of the dashboard.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    #[default]
    Apm,
    Network,
    Dns,
    Security,
}

impl DataSource {
    pub const ALL: [DataSource; 4] = [
        DataSource::Apm,
        DataSource::Network,
        DataSource::Dns,
        DataSource::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Apm => "apm",
            DataSource::Network => "network",
            DataSource::Dns => "dns",
            DataSource::Security => "security",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }

    /// Identifier dimensions the source can be filtered by.
    pub fn dimensions(&self) -> &'static [FilterDimension] {
        match self {
            DataSource::Apm => &[FilterDimension::Services, FilterDimension::Cluster],
            DataSource::Network => &[
                FilterDimension::Network,
                FilterDimension::Node,
                FilterDimension::Interface,
            ],
            DataSource::Dns => &[FilterDimension::Domain, FilterDimension::Category],
            DataSource::Security => &[FilterDimension::Device, FilterDimension::Sensor],
        }
    }
}

/// Per-source identifier dimension, keyed in the URL by [`query_key`].
///
/// [`query_key`]: FilterDimension::query_key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDimension {
    Services,
    Cluster,
    Network,
    Node,
    Interface,
    Domain,
    Category,
    Device,
    Sensor,
}

impl FilterDimension {
    pub const ALL: [FilterDimension; 9] = [
        FilterDimension::Services,
        FilterDimension::Cluster,
        FilterDimension::Network,
        FilterDimension::Node,
        FilterDimension::Interface,
        FilterDimension::Domain,
        FilterDimension::Category,
        FilterDimension::Device,
        FilterDimension::Sensor,
    ];

    pub fn query_key(&self) -> &'static str {
        match self {
            FilterDimension::Services => "services",
            FilterDimension::Cluster => "cluster",
            FilterDimension::Network => "network",
            FilterDimension::Node => "node",
            FilterDimension::Interface => "interface",
            FilterDimension::Domain => "domain",
            FilterDimension::Category => "category",
            FilterDimension::Device => "device",
            FilterDimension::Sensor => "sensor",
        }
    }

    pub fn from_query_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.query_key() == key)
    }
}
