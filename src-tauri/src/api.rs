//! HTTP client for the anomaly backend.

use std::collections::BTreeMap;

use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DashboardError, Result};
use crate::timerange::ResolvedRange;
use crate::types::anomaly::{FilterOption, HistoricalPage, SortOrder};
use crate::types::series::AnomalySeries;
use crate::types::source::{DataSource, FilterDimension};
use crate::types::tree::TreeNode;

/// Body of the historical query and the CSV export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRequest {
    #[serde(rename = "type")]
    pub data_source: DataSource,
    pub start_time: String,
    pub end_time: String,
    pub filters: Vec<String>,
    pub severity: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub page: u32,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    /// Identifier keys (`node`, `domain`, ...) sent as top-level arrays.
    #[serde(flatten)]
    pub identifiers: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRequest {
    #[serde(rename = "type")]
    pub data_source: DataSource,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub scales: Vec<String>,
}

impl SeriesRequest {
    pub fn new(data_source: DataSource, range: &ResolvedRange) -> Self {
        Self {
            data_source,
            start_time: range.start_time.clone(),
            end_time: range.end_time.clone(),
            service: None,
            scales: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RcaTreeRequest {
    #[serde(rename = "type")]
    pub data_source: DataSource,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized)
            .map_err(|e| DashboardError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| DashboardError::InvalidUrl(format!("{}: {}", path, e)))
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), %message, "backend request failed");
        Err(DashboardError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let resp = self.authorize(self.http.post(url)).json(body).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let resp = self.authorize(self.http.get(url)).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn fetch_history(&self, req: &HistoryRequest) -> Result<HistoricalPage> {
        self.post_json("anomalies/history", req).await
    }

    pub async fn fetch_series(&self, req: &SeriesRequest) -> Result<Vec<AnomalySeries>> {
        self.post_json("metrics/series", req).await
    }

    /// Raw CSV for the same filters as the historical query.
    pub async fn export_csv(&self, req: &HistoryRequest) -> Result<Vec<u8>> {
        let url = self.endpoint("anomalies/export")?;
        let resp = self.authorize(self.http.post(url)).json(req).send().await?;
        let bytes = Self::check(resp).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn fetch_dimension_options(
        &self,
        source: DataSource,
        dimension: FilterDimension,
    ) -> Result<Vec<String>> {
        self.get_json(&format!(
            "options/{}/{}",
            source.as_str(),
            dimension.query_key()
        ))
        .await
    }

    pub async fn fetch_anomaly_options(&self, source: DataSource) -> Result<Vec<FilterOption>> {
        self.get_json(&format!("options/{}/anomalies", source.as_str()))
            .await
    }

    pub async fn fetch_severity_options(&self) -> Result<Vec<FilterOption>> {
        self.get_json("options/severities").await
    }

    pub async fn fetch_rca_tree(&self, req: &RcaTreeRequest) -> Result<Vec<TreeNode>> {
        self.post_json("rca/tree", req).await
    }

    pub async fn fetch_rca_children(
        &self,
        detail_params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<Vec<TreeNode>> {
        self.post_json("rca/children", detail_params).await
    }
}
