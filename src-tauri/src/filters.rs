//! Typed filter selection and its URL query form.

use std::collections::{BTreeMap, BTreeSet};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::options::OptionSet;
use crate::types::source::{DataSource, FilterDimension};

pub const ANOMALY_KEY: &str = "anomaly";
pub const SEVERITY_KEY: &str = "severity";
pub const SERVICE_KEY: &str = "service";

/// Every query key owned by the filter state.
pub fn filter_keys() -> impl Iterator<Item = &'static str> {
    [ANOMALY_KEY, SEVERITY_KEY, SERVICE_KEY]
        .into_iter()
        .chain(FilterDimension::ALL.into_iter().map(|d| d.query_key()))
}

/// Remove every value of each key in `keys`, keeping all other pairs in order.
pub fn remove_query_keys<'a>(url: &mut Url, keys: impl IntoIterator<Item = &'a str>) {
    let keys: BTreeSet<&str> = keys.into_iter().collect();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !keys.contains(k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    set_query_pairs(url, &kept);
}

/// Replace all values of `key` with `values`.
pub fn replace_query_values<'a>(
    url: &mut Url,
    key: &str,
    values: impl IntoIterator<Item = &'a str>,
) {
    remove_query_keys(url, [key]);
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.extend(values.into_iter().map(|v| (key.to_string(), v.to_string())));
    set_query_pairs(url, &pairs);
}

pub fn query_values(url: &Url, key: &str) -> Vec<String> {
    url.query_pairs()
        .filter(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
        .collect()
}

pub fn query_value(url: &Url, key: &str) -> Option<String> {
    query_values(url, key).into_iter().next()
}

fn set_query_pairs(url: &mut Url, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        url.set_query(None);
        return;
    }
    url.query_pairs_mut().clear().extend_pairs(pairs);
}

/// Selected anomaly types, severities, services and identifier values.
/// An empty set means the field is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    #[serde(default)]
    pub anomaly: BTreeSet<String>,
    #[serde(default)]
    pub severity: BTreeSet<String>,
    #[serde(default)]
    pub service: BTreeSet<String>,
    #[serde(default)]
    pub identifiers: BTreeMap<FilterDimension, BTreeSet<String>>,
}

impl FilterSelection {
    pub fn is_empty(&self) -> bool {
        self.anomaly.is_empty()
            && self.severity.is_empty()
            && self.service.is_empty()
            && self.identifiers.values().all(BTreeSet::is_empty)
    }

    pub fn identifier(&self, dimension: FilterDimension) -> Option<&BTreeSet<String>> {
        self.identifiers.get(&dimension).filter(|s| !s.is_empty())
    }

    pub fn set_identifier(
        &mut self,
        dimension: FilterDimension,
        values: impl IntoIterator<Item = String>,
    ) {
        let values: BTreeSet<String> = values.into_iter().collect();
        if values.is_empty() {
            self.identifiers.remove(&dimension);
        } else {
            self.identifiers.insert(dimension, values);
        }
    }

    /// Parse the filter keys of `url`; unrelated parameters are ignored.
    pub fn from_url(url: &Url) -> Self {
        let mut selection = Self {
            anomaly: query_values(url, ANOMALY_KEY).into_iter().collect(),
            severity: query_values(url, SEVERITY_KEY).into_iter().collect(),
            service: query_values(url, SERVICE_KEY).into_iter().collect(),
            identifiers: BTreeMap::new(),
        };
        for dimension in FilterDimension::ALL {
            selection.set_identifier(dimension, query_values(url, dimension.query_key()));
        }
        selection
    }

    /// Write the selection into `url`: each key is deleted and re-appended so
    /// no value from an earlier selection survives.
    pub fn apply_to_url(&self, url: &mut Url) {
        replace_query_values(url, ANOMALY_KEY, self.anomaly.iter().map(String::as_str));
        replace_query_values(url, SEVERITY_KEY, self.severity.iter().map(String::as_str));
        replace_query_values(url, SERVICE_KEY, self.service.iter().map(String::as_str));
        for dimension in FilterDimension::ALL {
            let values = self
                .identifiers
                .get(&dimension)
                .into_iter()
                .flatten()
                .map(String::as_str);
            replace_query_values(url, dimension.query_key(), values);
        }
    }

    /// Clear the selection and strip every filter key from `url`.
    pub fn reset(&mut self, url: &mut Url) {
        *self = Self::default();
        remove_query_keys(url, filter_keys());
    }

    /// Drop identifier dimensions the data source does not have.
    pub fn restrict_to(&mut self, source: DataSource) {
        self.identifiers
            .retain(|dimension, _| source.dimensions().contains(dimension));
    }

    /// Keep only ids present in the loaded option lists. Lists that have not
    /// loaded leave their selection untouched.
    pub fn retain_known(&mut self, options: &OptionSet) {
        if let Some(known) = options.anomaly_ids() {
            retain_logged(&mut self.anomaly, ANOMALY_KEY, |id| known.contains(id));
        }
        if let Some(known) = options.severity_ids() {
            retain_logged(&mut self.severity, SEVERITY_KEY, |id| known.contains(id));
        }
        if let Some(known) = options.values(FilterDimension::Services) {
            retain_logged(&mut self.service, SERVICE_KEY, |s| known.contains(s));
        }
        for (dimension, selected) in self.identifiers.iter_mut() {
            if let Some(known) = options.values(*dimension) {
                retain_logged(selected, dimension.query_key(), |v| known.contains(v));
            }
        }
        self.identifiers.retain(|_, s| !s.is_empty());
    }
}

fn retain_logged(set: &mut BTreeSet<String>, key: &str, keep: impl Fn(&String) -> bool) {
    let before = set.len();
    set.retain(|v| keep(v));
    if set.len() != before {
        debug!(key, dropped = before - set.len(), "dropped stale filter values");
    }
}
