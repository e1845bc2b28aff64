//! Filter option lists per data source, cached in SQLite.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::db::DbPool;
use crate::error::Result;
use crate::types::anomaly::FilterOption;
use crate::types::source::{DataSource, FilterDimension};

/// One independently loaded list in the filter panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionSection {
    Anomalies,
    Severities,
    Dimension(FilterDimension),
}

impl OptionSection {
    pub fn cache_key(&self) -> &'static str {
        match self {
            OptionSection::Anomalies => "anomalies",
            OptionSection::Severities => "severities",
            OptionSection::Dimension(d) => d.query_key(),
        }
    }

    pub fn for_source(source: DataSource) -> Vec<OptionSection> {
        let mut sections = vec![OptionSection::Anomalies, OptionSection::Severities];
        sections.extend(source.dimensions().iter().copied().map(OptionSection::Dimension));
        sections
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionPayload {
    Options(Vec<FilterOption>),
    Values(Vec<String>),
}

/// Option lists loaded for the current data source. `None` means the list
/// has not loaded; `failed` names sections whose last load failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSet {
    pub data_source: DataSource,
    pub anomalies: Option<Vec<FilterOption>>,
    pub severities: Option<Vec<FilterOption>>,
    pub dimensions: BTreeMap<FilterDimension, BTreeSet<String>>,
    pub failed: BTreeSet<OptionSection>,
}

impl OptionSet {
    pub fn new(data_source: DataSource) -> Self {
        Self {
            data_source,
            ..Default::default()
        }
    }

    pub fn anomaly_ids(&self) -> Option<BTreeSet<String>> {
        self.anomalies
            .as_ref()
            .map(|opts| opts.iter().map(|o| o.id.clone()).collect())
    }

    pub fn severity_ids(&self) -> Option<BTreeSet<String>> {
        self.severities
            .as_ref()
            .map(|opts| opts.iter().map(|o| o.id.clone()).collect())
    }

    pub fn values(&self, dimension: FilterDimension) -> Option<&BTreeSet<String>> {
        self.dimensions.get(&dimension)
    }

    pub fn has_error(&self, section: OptionSection) -> bool {
        self.failed.contains(&section)
    }

    fn insert(&mut self, section: OptionSection, payload: SectionPayload) {
        match (section, payload) {
            (OptionSection::Anomalies, SectionPayload::Options(o)) => self.anomalies = Some(o),
            (OptionSection::Severities, SectionPayload::Options(o)) => self.severities = Some(o),
            (OptionSection::Dimension(d), SectionPayload::Values(v)) => {
                self.dimensions.insert(d, v.into_iter().collect());
            }
            (OptionSection::Dimension(d), SectionPayload::Options(o)) => {
                self.dimensions.insert(d, o.into_iter().map(|o| o.id).collect());
            }
            (section, SectionPayload::Values(v)) => {
                let opts = v
                    .into_iter()
                    .map(|id| FilterOption {
                        label: id.clone(),
                        id,
                    })
                    .collect();
                if section == OptionSection::Anomalies {
                    self.anomalies = Some(opts);
                } else {
                    self.severities = Some(opts);
                }
            }
        }
    }
}

/// Where option lists come from when the cache is cold.
pub trait OptionFetcher {
    fn fetch_section(
        &self,
        source: DataSource,
        section: OptionSection,
    ) -> impl Future<Output = Result<SectionPayload>> + Send;
}

impl OptionFetcher for ApiClient {
    async fn fetch_section(
        &self,
        source: DataSource,
        section: OptionSection,
    ) -> Result<SectionPayload> {
        match section {
            OptionSection::Anomalies => self
                .fetch_anomaly_options(source)
                .await
                .map(SectionPayload::Options),
            OptionSection::Severities => self
                .fetch_severity_options()
                .await
                .map(SectionPayload::Options),
            OptionSection::Dimension(d) => self
                .fetch_dimension_options(source, d)
                .await
                .map(SectionPayload::Values),
        }
    }
}

pub fn option_cache_set(
    pool: &DbPool,
    source: DataSource,
    section: OptionSection,
    payload: &SectionPayload,
) -> Result<()> {
    let conn = pool.get()?;
    let json = serde_json::to_string(payload)?;
    conn.execute(
        "INSERT INTO option_cache (data_source, section, payload, fetched_at)
         VALUES (?1, ?2, ?3, datetime('now'))
         ON CONFLICT(data_source, section) DO UPDATE SET
            payload = ?3, fetched_at = datetime('now')",
        rusqlite::params![source.as_str(), section.cache_key(), json],
    )?;
    Ok(())
}

pub fn option_cache_get(
    pool: &DbPool,
    source: DataSource,
    section: OptionSection,
) -> Result<Option<SectionPayload>> {
    let conn = pool.get()?;
    let json: Option<String> = match conn.query_row(
        "SELECT payload FROM option_cache WHERE data_source = ?1 AND section = ?2",
        [source.as_str(), section.cache_key()],
        |row| row.get(0),
    ) {
        Ok(json) => Some(json),
        Err(rusqlite::Error::QueryReturnedNoRows) => None,
        Err(e) => return Err(e.into()),
    };
    match json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Whether the entry is missing or older than `max_age_secs`.
pub fn option_cache_is_stale(
    pool: &DbPool,
    source: DataSource,
    section: OptionSection,
    max_age_secs: i64,
) -> Result<bool> {
    let conn = pool.get()?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM option_cache
         WHERE data_source = ?1 AND section = ?2 AND fetched_at > datetime('now', ?3)",
        rusqlite::params![
            source.as_str(),
            section.cache_key(),
            format!("-{} seconds", max_age_secs)
        ],
        |row| row.get(0),
    )?;
    Ok(count == 0)
}

pub fn option_cache_clear(pool: &DbPool, source: DataSource) -> Result<usize> {
    let conn = pool.get()?;
    Ok(conn.execute(
        "DELETE FROM option_cache WHERE data_source = ?1",
        [source.as_str()],
    )?)
}

/// Load every section for `source`. Fresh cache entries win; otherwise the
/// fetcher is asked, falling back to a stale entry when it fails. A section
/// with neither is marked failed rather than failing the whole set.
pub async fn load_options<F: OptionFetcher>(
    pool: &DbPool,
    fetcher: &F,
    source: DataSource,
    ttl_secs: i64,
) -> Result<OptionSet> {
    let mut set = OptionSet::new(source);
    for section in OptionSection::for_source(source) {
        if !option_cache_is_stale(pool, source, section, ttl_secs)? {
            if let Some(payload) = option_cache_get(pool, source, section)? {
                set.insert(section, payload);
                continue;
            }
        }

        match fetcher.fetch_section(source, section).await {
            Ok(payload) => {
                option_cache_set(pool, source, section, &payload)?;
                set.insert(section, payload);
            }
            Err(e) => {
                warn!(error = %e, source = source.as_str(), section = section.cache_key(), "option fetch failed");
                match option_cache_get(pool, source, section)? {
                    Some(stale) => {
                        debug!(section = section.cache_key(), "serving stale options");
                        set.insert(section, stale);
                    }
                    None => {
                        set.failed.insert(section);
                    }
                }
            }
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::error::DashboardError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&dir.path().join("test.sqlite")).unwrap();
        db::init_db(&pool).unwrap();
        crate::migrations::run_pending(&pool).unwrap();
        (dir, pool)
    }

    struct FakeBackend {
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl OptionFetcher for FakeBackend {
        async fn fetch_section(
            &self,
            source: DataSource,
            section: OptionSection,
        ) -> Result<SectionPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DashboardError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(match section {
                OptionSection::Dimension(d) => SectionPayload::Values(vec![format!(
                    "{}-{}-1",
                    source.as_str(),
                    d.query_key()
                )]),
                _ => SectionPayload::Options(vec![FilterOption {
                    id: format!("{}-opt", section.cache_key()),
                    label: "Option".to_string(),
                }]),
            })
        }
    }

    #[test]
    fn sections_follow_data_source_dimensions() {
        let sections = OptionSection::for_source(DataSource::Network);
        assert_eq!(sections.len(), 5);
        assert!(sections.contains(&OptionSection::Dimension(FilterDimension::Interface)));
        assert!(!sections.contains(&OptionSection::Dimension(FilterDimension::Domain)));
    }

    #[test]
    fn cache_is_stale_when_empty() {
        let (_dir, pool) = test_pool();
        assert!(
            option_cache_is_stale(&pool, DataSource::Apm, OptionSection::Anomalies, 3600).unwrap()
        );
        assert!(option_cache_get(&pool, DataSource::Apm, OptionSection::Anomalies)
            .unwrap()
            .is_none());
    }

    #[test]
    fn cache_set_and_get_roundtrip() {
        let (_dir, pool) = test_pool();
        let payload = SectionPayload::Values(vec!["edge-1".to_string(), "edge-2".to_string()]);
        let section = OptionSection::Dimension(FilterDimension::Node);
        option_cache_set(&pool, DataSource::Network, section, &payload).unwrap();
        assert_eq!(
            option_cache_get(&pool, DataSource::Network, section).unwrap(),
            Some(payload)
        );
        assert!(!option_cache_is_stale(&pool, DataSource::Network, section, 3600).unwrap());
        // Same section under another source is independent.
        assert!(option_cache_get(&pool, DataSource::Apm, section).unwrap().is_none());
    }

    #[test]
    fn clear_removes_only_that_source() {
        let (_dir, pool) = test_pool();
        let payload = SectionPayload::Values(vec!["x".to_string()]);
        option_cache_set(&pool, DataSource::Dns, OptionSection::Severities, &payload).unwrap();
        option_cache_set(&pool, DataSource::Apm, OptionSection::Severities, &payload).unwrap();
        assert_eq!(option_cache_clear(&pool, DataSource::Dns).unwrap(), 1);
        assert!(option_cache_get(&pool, DataSource::Apm, OptionSection::Severities)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn load_fetches_then_serves_from_cache() {
        let (_dir, pool) = test_pool();
        let backend = FakeBackend::new(false);
        let set = load_options(&pool, &backend, DataSource::Dns, 3600).await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
        assert!(set.failed.is_empty());
        assert_eq!(
            set.anomaly_ids().unwrap(),
            BTreeSet::from(["anomalies-opt".to_string()])
        );
        assert!(set
            .values(FilterDimension::Domain)
            .unwrap()
            .contains("dns-domain-1"));

        let again = load_options(&pool, &backend, DataSource::Dns, 3600).await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
        assert_eq!(again, set);
    }

    #[tokio::test]
    async fn failed_fetch_without_cache_marks_section() {
        let (_dir, pool) = test_pool();
        let backend = FakeBackend::new(true);
        let set = load_options(&pool, &backend, DataSource::Security, 3600)
            .await
            .unwrap();
        assert!(set.has_error(OptionSection::Anomalies));
        assert!(set.has_error(OptionSection::Dimension(FilterDimension::Sensor)));
        assert!(set.anomalies.is_none());
    }

    #[tokio::test]
    async fn failed_fetch_falls_back_to_stale_cache() {
        let (_dir, pool) = test_pool();
        let payload = SectionPayload::Values(vec!["fw-01".to_string()]);
        let section = OptionSection::Dimension(FilterDimension::Device);
        option_cache_set(&pool, DataSource::Security, section, &payload).unwrap();

        let backend = FakeBackend::new(true);
        // A zero TTL makes every entry stale.
        let set = load_options(&pool, &backend, DataSource::Security, 0)
            .await
            .unwrap();
        assert!(!set.has_error(section));
        assert!(set.values(FilterDimension::Device).unwrap().contains("fw-01"));
    }
}
