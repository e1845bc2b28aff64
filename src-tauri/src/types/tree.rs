use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A node of the root-cause tree. Parents own their children; the tree is
/// never cyclic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, rename = "anomalyCount", skip_serializing_if = "Option::is_none")]
    pub anomaly_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltips: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub detail_params: BTreeMap<String, serde_json::Value>,
}

impl TreeNode {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            anomaly_count: None,
            children: None,
            tooltips: None,
            detail_params: BTreeMap::new(),
        }
    }

    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or_default()
    }
}
