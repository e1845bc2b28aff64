//! Root-cause drill-down: data source → metric → grouping field → impacted
//! service.
//!
//! The state is the list of node lists on screen (`levels`) and the path of
//! expanded nodes. A single [`RcaDrillDown::select`] transition replaces the
//! path from the selected depth onward, so choosing another branch always
//! discards the deeper selections that belonged to the old one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DashboardError, Result};
use crate::types::tree::TreeNode;

pub const MAX_DEPTH: usize = 4;
pub const DEFAULT_ROW_HEIGHT: f64 = 36.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 540.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEntry {
    pub depth: usize,
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Transition {
    /// Depth 0 picks the data source; the caller switches the whole view.
    NavigateDataSource { name: String },
    /// Children came with the node and are now shown at `depth`.
    Expanded { depth: usize, count: usize },
    /// Children for `depth` must be fetched with `detail_params`.
    LoadChildren {
        depth: usize,
        detail_params: BTreeMap<String, serde_json::Value>,
    },
    /// Deepest level; nothing further to show.
    Leaf,
}

/// Curve from an expanded parent row to the visible rows of its children,
/// in viewport coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub depth: usize,
    pub from_y: f64,
    pub to_ys: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RcaDrillDown {
    levels: Vec<Vec<TreeNode>>,
    path: Vec<PathEntry>,
    scroll: Vec<f64>,
    row_height: f64,
    viewport_height: f64,
}

impl RcaDrillDown {
    pub fn new(roots: Vec<TreeNode>) -> Self {
        Self {
            levels: vec![roots],
            path: Vec::new(),
            scroll: vec![0.0; MAX_DEPTH],
            row_height: DEFAULT_ROW_HEIGHT,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
        }
    }

    pub fn with_geometry(mut self, row_height: f64, viewport_height: f64) -> Self {
        self.row_height = row_height.max(1.0);
        self.viewport_height = viewport_height.max(0.0);
        self
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn path(&self) -> &[PathEntry] {
        &self.path
    }

    pub fn level(&self, depth: usize) -> &[TreeNode] {
        self.levels.get(depth).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn levels(&self) -> &[Vec<TreeNode>] {
        &self.levels
    }

    pub fn selected(&self, depth: usize) -> Option<&TreeNode> {
        let entry = self.path.get(depth)?;
        self.level(depth).get(entry.index)
    }

    /// Replace the depth-0 list (new time range or data source reload).
    pub fn set_roots(&mut self, roots: Vec<TreeNode>) {
        *self = Self::new(roots).with_geometry(self.row_height, self.viewport_height);
    }

    pub fn select(&mut self, depth: usize, index: usize) -> Result<Transition> {
        if depth >= MAX_DEPTH || depth >= self.levels.len() || depth > self.path.len() {
            return Err(DashboardError::InvalidDepth {
                depth,
                expanded: self.path.len(),
            });
        }
        let node = self
            .levels[depth]
            .get(index)
            .cloned()
            .ok_or(DashboardError::NodeNotFound { depth, index })?;

        self.path.truncate(depth);
        self.levels.truncate(depth + 1);
        for offset in self.scroll.iter_mut().skip(depth + 1) {
            *offset = 0.0;
        }
        self.path.push(PathEntry {
            depth,
            index,
            name: node.name.clone(),
        });
        debug!(depth, index, name = %node.name, "rca select");

        if depth == 0 {
            return Ok(Transition::NavigateDataSource { name: node.name });
        }
        if depth + 1 >= MAX_DEPTH {
            return Ok(Transition::Leaf);
        }
        match node.children {
            Some(children) if !children.is_empty() => {
                let count = children.len();
                self.levels.push(children);
                Ok(Transition::Expanded {
                    depth: depth + 1,
                    count,
                })
            }
            _ => Ok(Transition::LoadChildren {
                depth: depth + 1,
                detail_params: node.detail_params,
            }),
        }
    }

    /// Install fetched children at `depth`. Only the level directly under
    /// the deepest selection accepts children.
    pub fn set_children(&mut self, depth: usize, children: Vec<TreeNode>) -> Result<()> {
        if depth == 0 || depth >= MAX_DEPTH || depth != self.path.len() {
            return Err(DashboardError::InvalidDepth {
                depth,
                expanded: self.path.len(),
            });
        }
        self.levels.truncate(depth);
        self.levels.push(children);
        self.scroll[depth] = 0.0;
        Ok(())
    }

    pub fn set_scroll(&mut self, depth: usize, offset: f64) {
        if let Some(slot) = self.scroll.get_mut(depth) {
            *slot = offset.max(0.0);
        }
    }

    pub fn scroll(&self, depth: usize) -> f64 {
        self.scroll.get(depth).copied().unwrap_or(0.0)
    }

    fn row_center(&self, depth: usize, index: usize) -> f64 {
        index as f64 * self.row_height + self.row_height / 2.0 - self.scroll(depth)
    }

    /// Connector from the expanded node at `depth` to its children at
    /// `depth + 1`. The parent anchor sticks to the viewport edge when its
    /// row is scrolled out of view.
    pub fn connector(&self, depth: usize) -> Option<Connector> {
        let entry = self.path.get(depth)?;
        let children = self.levels.get(depth + 1)?;
        let from_y = self
            .row_center(depth, entry.index)
            .clamp(0.0, self.viewport_height);
        let to_ys = (0..children.len())
            .map(|j| self.row_center(depth + 1, j))
            .filter(|y| *y >= 0.0 && *y < self.viewport_height)
            .collect();
        Some(Connector {
            depth,
            from_y,
            to_ys,
        })
    }

    pub fn connectors(&self) -> Vec<Connector> {
        (0..self.path.len()).filter_map(|d| self.connector(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> TreeNode {
        let mut n = TreeNode::leaf(name);
        n.detail_params
            .insert("name".to_string(), serde_json::Value::String(name.to_string()));
        n
    }

    fn with_children(name: &str, children: Vec<TreeNode>) -> TreeNode {
        let mut n = node(name);
        n.children = Some(children);
        n
    }

    /// apm > {latency > {region > [svc-a, svc-b]}, errors > {pod > [svc-c]}}
    fn drill() -> RcaDrillDown {
        let latency = with_children(
            "latency",
            vec![with_children("region", vec![node("svc-a"), node("svc-b")])],
        );
        let errors = with_children("errors", vec![with_children("pod", vec![node("svc-c")])]);
        let mut d = RcaDrillDown::new(vec![node("apm"), node("network")]);
        assert_eq!(
            d.select(0, 0).unwrap(),
            Transition::NavigateDataSource {
                name: "apm".to_string()
            }
        );
        d.set_children(1, vec![latency, errors]).unwrap();
        d
    }

    #[test]
    fn depth_zero_navigates() {
        let mut d = RcaDrillDown::new(vec![node("apm"), node("dns")]);
        match d.select(0, 1).unwrap() {
            Transition::NavigateDataSource { name } => assert_eq!(name, "dns"),
            other => panic!("expected navigation, got {:?}", other),
        }
        assert_eq!(d.depth(), 1);
    }

    #[test]
    fn expanding_walks_down_to_leaf() {
        let mut d = drill();
        assert_eq!(
            d.select(1, 0).unwrap(),
            Transition::Expanded { depth: 2, count: 1 }
        );
        assert_eq!(
            d.select(2, 0).unwrap(),
            Transition::Expanded { depth: 3, count: 2 }
        );
        assert_eq!(d.select(3, 1).unwrap(), Transition::Leaf);
        assert_eq!(d.depth(), 4);
        assert_eq!(d.selected(3).unwrap().name, "svc-b");
    }

    #[test]
    fn switching_depth_one_branch_clears_deeper_selections() {
        let mut d = drill();
        d.select(1, 0).unwrap();
        d.select(2, 0).unwrap();
        d.select(3, 0).unwrap();
        assert_eq!(d.depth(), 4);

        d.select(1, 1).unwrap();
        assert_eq!(d.depth(), 2);
        assert!(d.selected(2).is_none());
        assert!(d.selected(3).is_none());
        assert_eq!(d.level(2)[0].name, "pod");
        assert!(d.level(3).is_empty());
    }

    #[test]
    fn node_without_children_requests_a_fetch() {
        let mut d = RcaDrillDown::new(vec![node("apm")]);
        d.select(0, 0).unwrap();
        d.set_children(1, vec![node("throughput")]).unwrap();
        match d.select(1, 0).unwrap() {
            Transition::LoadChildren {
                depth,
                detail_params,
            } => {
                assert_eq!(depth, 2);
                assert_eq!(detail_params["name"], "throughput");
            }
            other => panic!("expected load, got {:?}", other),
        }
        d.set_children(2, vec![node("host")]).unwrap();
        assert_eq!(d.level(2).len(), 1);
    }

    #[test]
    fn cannot_skip_levels() {
        let mut d = drill();
        assert!(matches!(
            d.select(2, 0),
            Err(DashboardError::InvalidDepth { depth: 2, .. })
        ));
        assert!(matches!(
            d.select(1, 9),
            Err(DashboardError::NodeNotFound { depth: 1, index: 9 })
        ));
        assert!(d.select(MAX_DEPTH, 0).is_err());
    }

    #[test]
    fn children_for_an_abandoned_branch_are_rejected() {
        let mut d = drill();
        d.select(1, 0).unwrap();
        d.select(2, 0).unwrap();
        // Back up to depth 1; children meant for depth 3 no longer fit.
        d.select(1, 1).unwrap();
        assert!(d.set_children(3, vec![node("late")]).is_err());
    }

    #[test]
    fn connector_tracks_both_scroll_offsets() {
        let mut d = drill().with_geometry(20.0, 100.0);
        d.select(1, 1).unwrap();
        let c = d.connector(1).unwrap();
        assert_eq!(c.from_y, 30.0);
        assert_eq!(c.to_ys, vec![10.0]);

        d.set_scroll(1, 25.0);
        d.set_scroll(2, 5.0);
        let c = d.connector(1).unwrap();
        assert_eq!(c.from_y, 5.0);
        assert_eq!(c.to_ys, vec![5.0]);
    }

    #[test]
    fn connector_hides_rows_outside_viewport() {
        let many: Vec<TreeNode> = (0..10).map(|i| node(&format!("m{}", i))).collect();
        let mut d = RcaDrillDown::new(vec![node("apm")]).with_geometry(20.0, 50.0);
        d.select(0, 0).unwrap();
        d.set_children(1, many).unwrap();
        let c = d.connector(0).unwrap();
        assert_eq!(c.to_ys, vec![10.0, 30.0]);

        d.set_scroll(0, 500.0);
        assert_eq!(d.connector(0).unwrap().from_y, 0.0);
    }

    #[test]
    fn selecting_resets_deeper_scroll() {
        let mut d = drill();
        d.select(1, 0).unwrap();
        d.set_scroll(2, 40.0);
        d.select(1, 1).unwrap();
        assert_eq!(d.scroll(2), 0.0);
    }
}
