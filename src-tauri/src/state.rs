use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDateTime;
use tracing::info;

use crate::api::ApiClient;
use crate::error::Result;
use crate::refresh::AutoRefresh;
use crate::session::DashboardSession;
use crate::timerange::local_now;
use crate::types::config::DashboardConfig;

/// Shared state managed by the desktop shell. Locks are never held across
/// an `.await`: commands copy what they need out, fetch, then lock again to
/// apply the response.
pub struct AppState {
    session: Mutex<DashboardSession>,
    client: Mutex<ApiClient>,
    refresh: Mutex<AutoRefresh>,
    options_ttl_secs: Mutex<i64>,
    data_dir: PathBuf,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl AppState {
    pub fn new(
        config: &DashboardConfig,
        token: Option<String>,
        data_dir: PathBuf,
        now: NaiveDateTime,
    ) -> Result<Self> {
        Ok(Self {
            session: Mutex::new(DashboardSession::new(config, now)?),
            client: Mutex::new(ApiClient::new(&config.api_base_url, token)?),
            refresh: Mutex::new(AutoRefresh::new(Duration::from_secs(
                config.refresh_interval_secs,
            ))),
            options_ttl_secs: Mutex::new(config.options_ttl_secs),
            data_dir,
        })
    }

    pub fn session(&self) -> MutexGuard<'_, DashboardSession> {
        lock(&self.session)
    }

    pub fn client(&self) -> ApiClient {
        lock(&self.client).clone()
    }

    pub fn refresh(&self) -> MutexGuard<'_, AutoRefresh> {
        lock(&self.refresh)
    }

    pub fn options_ttl_secs(&self) -> i64 {
        *lock(&self.options_ttl_secs)
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// Apply a changed config: new backend client, page size, time-range
    /// table and refresh period. A running refresh loop keeps its old period
    /// until restarted.
    pub fn reconfigure(&self, config: &DashboardConfig) -> Result<()> {
        let token = lock(&self.client).token().map(str::to_string);
        let client = ApiClient::new(&config.api_base_url, token)?;
        *lock(&self.client) = client;
        *lock(&self.options_ttl_secs) = config.options_ttl_secs;
        {
            let mut session = self.session();
            session.set_page_size(config.page_size);
            session.set_time_ranges(
                config.time_range_table(),
                &config.default_time_range,
                local_now(),
            )?;
        }
        self.refresh()
            .set_period(Duration::from_secs(config.refresh_interval_secs));
        info!(api = %config.api_base_url, "dashboard reconfigured");
        Ok(())
    }

    pub fn set_token(&self, token: Option<String>) -> Result<()> {
        let base = lock(&self.client).base_url().to_string();
        *lock(&self.client) = ApiClient::new(&base, token)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let state = AppState::new(&DashboardConfig::default(), None, dir.path().to_path_buf(), now)
            .unwrap();
        (dir, state)
    }

    #[test]
    fn reconfigure_swaps_client_and_page_size() {
        let (_dir, state) = state();
        let config = DashboardConfig {
            api_base_url: "http://backend:9000/v2".to_string(),
            page_size: 100,
            refresh_interval_secs: 15,
            ..DashboardConfig::default()
        };
        state.reconfigure(&config).unwrap();
        assert_eq!(state.client().base_url().as_str(), "http://backend:9000/v2/");
        assert_eq!(state.session().table().limit, 100);
        assert_eq!(state.refresh().period(), Duration::from_secs(15));
    }

    #[test]
    fn reconfigure_installs_new_time_ranges() {
        use crate::timerange::{TimeRangeBucket, TimeRangeTable};

        let (_dir, state) = state();
        let config = DashboardConfig {
            default_time_range: "Last day".to_string(),
            time_ranges: Some(
                TimeRangeTable::new(vec![
                    TimeRangeBucket::new("Last 15 minutes", 15),
                    TimeRangeBucket::new("Last day", 1440),
                ])
                .unwrap(),
            ),
            ..DashboardConfig::default()
        };
        state.reconfigure(&config).unwrap();
        let session = state.session();
        assert_eq!(session.cursor().current_label(), "Last day");
        assert_eq!(session.cursor().table().len(), 2);
    }

    #[test]
    fn token_survives_reconfigure() {
        let (_dir, state) = state();
        state.set_token(Some("secret".to_string())).unwrap();
        state.reconfigure(&DashboardConfig::default()).unwrap();
        assert_eq!(state.client().token(), Some("secret"));
    }

    #[test]
    fn bad_url_keeps_previous_client() {
        let (_dir, state) = state();
        let config = DashboardConfig {
            api_base_url: "not a url".to_string(),
            ..DashboardConfig::default()
        };
        assert!(state.reconfigure(&config).is_err());
        assert_eq!(
            state.client().base_url().as_str(),
            "http://localhost:8000/api/"
        );
    }
}
