use std::collections::BTreeMap;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::api::HistoryRequest;
use crate::filters::{query_value, replace_query_values, FilterSelection};
use crate::timerange::ResolvedRange;
use crate::types::anomaly::{HistoricalPage, SortOrder};
use crate::types::source::DataSource;

pub const PAGE_KEY: &str = "page";
pub const SORT_BY_KEY: &str = "sort_by";
pub const SORT_ORDER_KEY: &str = "sort_order";

/// Paging and sorting of the historical anomaly table. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub page: u32,
    pub limit: u32,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub total_pages: u32,
    pub total_rows: u64,
}

impl TableState {
    pub fn new(limit: u32) -> Self {
        Self {
            page: 1,
            limit: limit.max(1),
            sort_by: None,
            sort_order: SortOrder::default(),
            total_pages: 0,
            total_rows: 0,
        }
    }

    fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.clamp(1, self.last_page());
    }

    pub fn next_page(&mut self) -> bool {
        if self.page < self.last_page() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev_page(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit.max(1);
        self.page = 1;
    }

    /// Clicking the current sort column flips the order; a new column starts
    /// descending. Either way the table returns to page 1.
    pub fn sort_by(&mut self, column: &str) {
        if self.sort_by.as_deref() == Some(column) {
            self.sort_order = self.sort_order.flipped();
        } else {
            self.sort_by = Some(column.to_string());
            self.sort_order = SortOrder::Desc;
        }
        self.page = 1;
    }

    /// Filters or time range changed: results restart at page 1.
    pub fn rewind(&mut self) {
        self.page = 1;
    }

    /// Record totals from a fetched page, pulling `page` back in range if
    /// the result set shrank.
    pub fn absorb(&mut self, page: &HistoricalPage) {
        self.total_pages = page.total_pages;
        self.total_rows = page.total_rows;
        self.page = self.page.clamp(1, self.last_page());
    }

    pub fn apply_to_url(&self, url: &mut Url) {
        let page = self.page.to_string();
        replace_query_values(url, PAGE_KEY, [page.as_str()]);
        replace_query_values(url, SORT_BY_KEY, self.sort_by.as_deref());
        let order = self.sort_by.as_ref().map(|_| self.sort_order.as_str());
        replace_query_values(url, SORT_ORDER_KEY, order);
    }

    pub fn from_url(url: &Url, limit: u32) -> Self {
        let mut state = Self::new(limit);
        state.page = query_value(url, PAGE_KEY)
            .and_then(|p| p.parse().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        state.sort_by = query_value(url, SORT_BY_KEY);
        state.sort_order = query_value(url, SORT_ORDER_KEY)
            .and_then(|o| SortOrder::parse(&o))
            .unwrap_or_default();
        state
    }
}

/// Compose the historical query from the current selection.
pub fn build_history_request(
    data_source: DataSource,
    range: &ResolvedRange,
    filters: &FilterSelection,
    table: &TableState,
) -> HistoryRequest {
    let identifiers: BTreeMap<String, Vec<String>> = data_source
        .dimensions()
        .iter()
        .filter_map(|d| {
            filters
                .identifier(*d)
                .map(|values| (d.query_key().to_string(), values.iter().cloned().collect()))
        })
        .collect();
    let service = (!filters.service.is_empty())
        .then(|| filters.service.iter().cloned().collect::<Vec<_>>().join(","));

    HistoryRequest {
        data_source,
        start_time: range.start_time.clone(),
        end_time: range.end_time.clone(),
        filters: filters.anomaly.iter().cloned().collect(),
        severity: filters.severity.iter().cloned().collect(),
        service,
        page: table.page,
        limit: table.limit,
        sort_by: table.sort_by.clone(),
        sort_order: table.sort_by.as_ref().map(|_| table.sort_order),
        identifiers,
    }
}
