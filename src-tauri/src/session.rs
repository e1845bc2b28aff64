//! The dashboard's filter context.
//!
//! `DashboardSession` owns every piece of view state and is the only source
//! of truth; the page URL is written from it and read back into it, never
//! consulted directly. Fetches go through a begin/accept pair so a response
//! is applied only while its request token is still the latest one.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{HistoryRequest, RcaTreeRequest, SeriesRequest};
use crate::charts::{ChartPanelGroup, ChartZoomResult, PanelView, ZoomRequest};
use crate::error::Result;
use crate::filters::{query_value, query_values, replace_query_values, FilterSelection};
use crate::history::{build_history_request, TableState};
use crate::options::OptionSet;
use crate::rca::{Connector, PathEntry, RcaDrillDown, Transition};
use crate::requests::{RequestGuard, RequestToken};
use crate::timerange::{ResolvedRange, TimeRangeTable, TimeWindow};
use crate::types::anomaly::HistoricalPage;
use crate::types::config::DashboardConfig;
use crate::types::series::AnomalySeries;
use crate::types::source::DataSource;
use crate::types::tree::TreeNode;
use crate::zoom::{ZoomControls, ZoomCursor, ZoomOutcome};

pub const TIME_RANGE_KEY: &str = "time_range";
pub const DATA_SOURCE_KEY: &str = "data_source";
pub const SCALE_KEY: &str = "scale";

pub const HISTORY_REQUEST: &str = "history";
pub const SERIES_REQUEST: &str = "series";
pub const RCA_TREE_REQUEST: &str = "rca:tree";
pub const RCA_CHILDREN_REQUEST: &str = "rca:children";

pub fn options_request_key(source: DataSource) -> String {
    format!("options:{}", source.as_str())
}

/// Everything the front-end renders, in one serializable snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub data_source: DataSource,
    pub zoom: ZoomControls,
    pub filters: FilterSelection,
    pub table: TableState,
    pub history: Option<HistoricalPage>,
    pub panels: Vec<PanelView>,
    pub scales: Vec<String>,
    pub options: OptionSet,
    pub rca_levels: Vec<Vec<TreeNode>>,
    pub rca_path: Vec<PathEntry>,
    pub rca_connectors: Vec<Connector>,
}

pub struct DashboardSession {
    data_source: DataSource,
    cursor: ZoomCursor,
    filters: FilterSelection,
    table: TableState,
    charts: ChartPanelGroup,
    scales: BTreeSet<String>,
    options: OptionSet,
    history: Option<HistoricalPage>,
    rca: RcaDrillDown,
    requests: RequestGuard,
}

impl DashboardSession {
    pub fn new(config: &DashboardConfig, now: NaiveDateTime) -> Result<Self> {
        let table = config.time_range_table();
        let configured = ZoomCursor::new(table.clone(), &config.default_time_range)
            .and_then(|cursor| {
                let outer = TimeWindow::parse(&cursor.resolve(now)?)?;
                Ok((cursor, outer))
            });
        let (cursor, outer) = match configured {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "default time range unusable, using first bucket");
                let cursor = ZoomCursor::at_index(table, 0);
                let outer = TimeWindow::parse(&cursor.resolve(now)?)?;
                (cursor, outer)
            }
        };
        let data_source = DataSource::default();
        Ok(Self {
            data_source,
            cursor,
            filters: FilterSelection::default(),
            table: TableState::new(config.page_size),
            charts: ChartPanelGroup::new(outer),
            scales: BTreeSet::new(),
            options: OptionSet::new(data_source),
            history: None,
            rca: RcaDrillDown::new(Vec::new()),
            requests: RequestGuard::new(),
        })
    }

    /// Restore a session from a bookmarked or reloaded URL. Unknown values
    /// are ignored and the defaults kept.
    pub fn from_url(config: &DashboardConfig, url: &Url, now: NaiveDateTime) -> Result<Self> {
        let mut session = Self::new(config, now)?;
        if let Some(source) = query_value(url, DATA_SOURCE_KEY) {
            match DataSource::parse(&source) {
                Some(source) => {
                    session.data_source = source;
                    session.options = OptionSet::new(source);
                }
                None => warn!(%source, "unknown data source in url"),
            }
        }
        if let Some(label) = query_value(url, TIME_RANGE_KEY) {
            if let Err(e) = session.select_time_range(&label, now) {
                warn!(error = %e, "ignoring time range from url");
            }
        }
        session.filters = FilterSelection::from_url(url);
        session.filters.restrict_to(session.data_source);
        session.table = TableState::from_url(url, config.page_size);
        session.scales = query_values(url, SCALE_KEY).into_iter().collect();
        Ok(session)
    }

    /// Serialize the session onto `base`, keeping its unrelated parameters.
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        replace_query_values(&mut url, DATA_SOURCE_KEY, [self.data_source.as_str()]);
        replace_query_values(&mut url, TIME_RANGE_KEY, [self.cursor.current_label()]);
        replace_query_values(&mut url, SCALE_KEY, self.scales.iter().map(String::as_str));
        self.filters.apply_to_url(&mut url);
        self.table.apply_to_url(&mut url);
        url
    }

    pub fn data_source(&self) -> DataSource {
        self.data_source
    }

    pub fn cursor(&self) -> &ZoomCursor {
        &self.cursor
    }

    pub fn filters(&self) -> &FilterSelection {
        &self.filters
    }

    pub fn table(&self) -> &TableState {
        &self.table
    }

    pub fn charts(&self) -> &ChartPanelGroup {
        &self.charts
    }

    pub fn scales(&self) -> &BTreeSet<String> {
        &self.scales
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn history(&self) -> Option<&HistoricalPage> {
        self.history.as_ref()
    }

    pub fn rca(&self) -> &RcaDrillDown {
        &self.rca
    }

    pub fn rca_mut(&mut self) -> &mut RcaDrillDown {
        &mut self.rca
    }

    pub fn requests(&self) -> &RequestGuard {
        &self.requests
    }

    /// Re-resolve the current label against `now` and move the charts'
    /// outer bound there.
    pub fn refresh_window(&mut self, now: NaiveDateTime) -> Result<ResolvedRange> {
        let range = self.cursor.resolve(now)?;
        self.charts.set_outer_bound(TimeWindow::parse(&range)?);
        Ok(range)
    }

    /// Select a bucket label or a custom `"start - end"` range. Nothing
    /// changes unless the range resolves to a valid window.
    pub fn select_time_range(&mut self, label: &str, now: NaiveDateTime) -> Result<ResolvedRange> {
        let mut cursor = self.cursor.clone();
        cursor.select(label)?;
        let range = cursor.resolve(now)?;
        let window = TimeWindow::parse(&range)?;
        self.cursor = cursor;
        self.charts.set_outer_bound(window);
        self.table.rewind();
        info!(label, "time range selected");
        Ok(range)
    }

    /// Install a new bucket table. The current label survives when the table
    /// still has it; otherwise the cursor moves to `default_label`, or the
    /// first bucket. Returns false when the table is unchanged.
    pub fn set_time_ranges(
        &mut self,
        table: TimeRangeTable,
        default_label: &str,
        now: NaiveDateTime,
    ) -> Result<bool> {
        if self.cursor.table() == &table {
            return Ok(false);
        }
        let cursor = ZoomCursor::new(table.clone(), self.cursor.current_label())
            .or_else(|_| ZoomCursor::new(table.clone(), default_label))
            .unwrap_or_else(|e| {
                warn!(error = %e, "default time range unusable, using first bucket");
                ZoomCursor::at_index(table, 0)
            });
        self.cursor = cursor;
        self.table.rewind();
        self.refresh_window(now)?;
        info!(label = self.cursor.current_label(), "time range table replaced");
        Ok(true)
    }

    pub fn zoom_in(&mut self, now: NaiveDateTime) -> Result<ZoomOutcome> {
        let outcome = self.cursor.zoom_in();
        if outcome.moved() {
            self.table.rewind();
            self.refresh_window(now)?;
        }
        Ok(outcome)
    }

    pub fn zoom_out(&mut self, now: NaiveDateTime) -> Result<ZoomOutcome> {
        let outcome = self.cursor.zoom_out();
        if outcome.moved() {
            self.table.rewind();
            self.refresh_window(now)?;
        }
        Ok(outcome)
    }

    /// Zoom or pan gesture from any chart panel.
    pub fn chart_zoom(&mut self, request: ZoomRequest, now: NaiveDateTime) -> Result<ChartZoomResult> {
        let result = self.charts.apply_zoom(&mut self.cursor, request, now)?;
        if matches!(result, ChartZoomResult::Refetch { .. }) {
            self.table.rewind();
        }
        Ok(result)
    }

    pub fn reset_chart_zoom(&mut self) {
        self.charts.reset_zoom();
    }

    /// Switch to another data source. Identifier filters the new source does
    /// not have are dropped; option lists start over. Returns false when
    /// `source` is already active.
    pub fn switch_data_source(&mut self, source: DataSource) -> bool {
        if source == self.data_source {
            return false;
        }
        info!(from = self.data_source.as_str(), to = source.as_str(), "data source switched");
        self.data_source = source;
        self.filters.restrict_to(source);
        self.options = OptionSet::new(source);
        self.table.rewind();
        self.history = None;
        self.charts.replace_series(Vec::new());
        self.requests.invalidate_all();
        true
    }

    /// Metric scales the series query asks for. Takes effect on the next
    /// series fetch; an in-flight one is superseded.
    pub fn set_scales<I: IntoIterator<Item = String>>(&mut self, scales: I) {
        self.scales = scales
            .into_iter()
            .map(|scale| scale.trim().to_string())
            .filter(|scale| !scale.is_empty())
            .collect();
        self.requests.issue(SERIES_REQUEST);
        debug!(count = self.scales.len(), "series scales set");
    }

    pub fn apply_filters(&mut self, selection: FilterSelection) {
        self.filters = selection;
        self.filters.restrict_to(self.data_source);
        self.filters.retain_known(&self.options);
        self.table.rewind();
        debug!(empty = self.filters.is_empty(), "filters applied");
    }

    pub fn reset_filters(&mut self) {
        self.filters = FilterSelection::default();
        self.table.rewind();
    }

    pub fn sort_by(&mut self, column: &str) {
        self.table.sort_by(column);
    }

    pub fn set_page(&mut self, page: u32) {
        self.table.set_page(page);
    }

    pub fn set_page_size(&mut self, limit: u32) {
        self.table.set_limit(limit);
    }

    pub fn begin_history(&mut self, now: NaiveDateTime) -> Result<(RequestToken, HistoryRequest)> {
        let range = self.cursor.resolve(now)?;
        let req = build_history_request(self.data_source, &range, &self.filters, &self.table);
        Ok((self.requests.issue(HISTORY_REQUEST), req))
    }

    /// Request body for a CSV export of the current table query. Exports do
    /// not compete with table fetches, so no token is issued.
    pub fn export_request(&self, now: NaiveDateTime) -> Result<HistoryRequest> {
        let range = self.cursor.resolve(now)?;
        Ok(build_history_request(self.data_source, &range, &self.filters, &self.table))
    }

    pub fn accept_history(&mut self, token: &RequestToken, page: HistoricalPage) -> bool {
        match self.requests.accept(token, page) {
            Some(page) => {
                self.table.absorb(&page);
                self.history = Some(page);
                true
            }
            None => false,
        }
    }

    pub fn begin_series(&mut self, now: NaiveDateTime) -> Result<(RequestToken, SeriesRequest)> {
        let range = self.refresh_window(now)?;
        let mut req = SeriesRequest::new(self.data_source, &range);
        req.service = (!self.filters.service.is_empty())
            .then(|| self.filters.service.iter().cloned().collect::<Vec<_>>().join(","));
        req.scales = self.scales.iter().cloned().collect();
        Ok((self.requests.issue(SERIES_REQUEST), req))
    }

    pub fn accept_series(&mut self, token: &RequestToken, series: Vec<AnomalySeries>) -> bool {
        match self.requests.accept(token, series) {
            Some(series) => {
                self.charts.replace_series(series);
                true
            }
            None => false,
        }
    }

    pub fn begin_options(&self) -> RequestToken {
        self.requests.issue(&options_request_key(self.data_source))
    }

    /// Install loaded option lists and drop selected values they do not
    /// contain. Lists for another data source are ignored.
    pub fn accept_options(&mut self, token: &RequestToken, options: OptionSet) -> bool {
        if options.data_source != self.data_source {
            debug!(source = options.data_source.as_str(), "options for inactive source ignored");
            return false;
        }
        match self.requests.accept(token, options) {
            Some(options) => {
                self.filters.retain_known(&options);
                self.options = options;
                true
            }
            None => false,
        }
    }

    pub fn begin_rca_tree(&mut self, now: NaiveDateTime) -> Result<(RequestToken, RcaTreeRequest)> {
        let range = self.cursor.resolve(now)?;
        let req = RcaTreeRequest {
            data_source: self.data_source,
            start_time: range.start_time,
            end_time: range.end_time,
        };
        Ok((self.requests.issue(RCA_TREE_REQUEST), req))
    }

    pub fn accept_rca_tree(&mut self, token: &RequestToken, roots: Vec<TreeNode>) -> bool {
        match self.requests.accept(token, roots) {
            Some(roots) => {
                self.rca.set_roots(roots);
                true
            }
            None => false,
        }
    }

    /// Click on a tree node. A depth-0 click also switches the data source.
    pub fn rca_select(&mut self, depth: usize, index: usize) -> Result<Transition> {
        let transition = self.rca.select(depth, index)?;
        if let Transition::NavigateDataSource { name } = &transition {
            match DataSource::parse(name) {
                Some(source) => {
                    self.switch_data_source(source);
                }
                None => warn!(%name, "tree root is not a known data source"),
            }
        }
        Ok(transition)
    }

    pub fn begin_rca_children(&self) -> RequestToken {
        self.requests.issue(RCA_CHILDREN_REQUEST)
    }

    pub fn accept_rca_children(
        &mut self,
        token: &RequestToken,
        depth: usize,
        children: Vec<TreeNode>,
    ) -> Result<bool> {
        match self.requests.accept(token, children) {
            Some(children) => {
                self.rca.set_children(depth, children)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            data_source: self.data_source,
            zoom: ZoomControls::from(&self.cursor),
            filters: self.filters.clone(),
            table: self.table.clone(),
            history: self.history.clone(),
            panels: self.charts.render(),
            scales: self.scales.iter().cloned().collect(),
            options: self.options.clone(),
            rca_levels: self.rca.levels().to_vec(),
            rca_path: self.rca.path().to_vec(),
            rca_connectors: self.rca.connectors(),
        }
    }
}
