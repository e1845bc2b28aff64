use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DashboardError, Result};
use crate::timerange::{
    is_custom_range, resolve_time_range, ResolvedRange, TimeRangeBucket, TimeRangeTable, TimeWindow,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CursorPosition {
    Bucket { index: usize },
    /// Window picked explicitly with the date pickers; has no neighbours.
    Custom { range: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ZoomOutcome {
    Moved { label: String },
    AlreadyAtMinimum,
    AlreadyAtMaximum,
    CustomRange,
}

impl ZoomOutcome {
    pub fn moved(&self) -> bool {
        matches!(self, ZoomOutcome::Moved { .. })
    }
}

/// Pointer into a [`TimeRangeTable`] tracking the bucket on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoomCursor {
    table: TimeRangeTable,
    position: CursorPosition,
}

impl ZoomCursor {
    pub fn new(table: TimeRangeTable, label: &str) -> Result<Self> {
        let mut cursor = Self {
            table,
            position: CursorPosition::Bucket { index: 0 },
        };
        cursor.select(label)?;
        Ok(cursor)
    }

    pub fn at_index(table: TimeRangeTable, index: usize) -> Self {
        let index = index.min(table.len().saturating_sub(1));
        Self {
            table,
            position: CursorPosition::Bucket { index },
        }
    }

    pub fn table(&self) -> &TimeRangeTable {
        &self.table
    }

    pub fn position(&self) -> &CursorPosition {
        &self.position
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.position, CursorPosition::Custom { .. })
    }

    /// Bucket label or the raw custom range string.
    pub fn current_label(&self) -> &str {
        match &self.position {
            CursorPosition::Bucket { index } => self
                .table
                .get(*index)
                .map(|b| b.label.as_str())
                .unwrap_or_default(),
            CursorPosition::Custom { range } => range,
        }
    }

    pub fn current_bucket(&self) -> Option<&TimeRangeBucket> {
        match self.position {
            CursorPosition::Bucket { index } => self.table.get(index),
            CursorPosition::Custom { .. } => None,
        }
    }

    /// Next narrower bucket, if one exists.
    pub fn smaller_bucket(&self) -> Option<&TimeRangeBucket> {
        match self.position {
            CursorPosition::Bucket { index } if index > 0 => self.table.get(index - 1),
            _ => None,
        }
    }

    /// Next wider bucket, if one exists.
    pub fn larger_bucket(&self) -> Option<&TimeRangeBucket> {
        match self.position {
            CursorPosition::Bucket { index } => self.table.get(index + 1),
            CursorPosition::Custom { .. } => None,
        }
    }

    pub fn can_zoom_in(&self) -> bool {
        self.smaller_bucket().is_some()
    }

    pub fn can_zoom_out(&self) -> bool {
        self.larger_bucket().is_some()
    }

    pub fn zoom_in(&mut self) -> ZoomOutcome {
        let outcome = match self.position {
            CursorPosition::Custom { .. } => ZoomOutcome::CustomRange,
            CursorPosition::Bucket { index: 0 } => ZoomOutcome::AlreadyAtMinimum,
            CursorPosition::Bucket { index } => {
                self.position = CursorPosition::Bucket { index: index - 1 };
                ZoomOutcome::Moved {
                    label: self.current_label().to_string(),
                }
            }
        };
        debug!(?outcome, "zoom in");
        outcome
    }

    pub fn zoom_out(&mut self) -> ZoomOutcome {
        let last = self.table.len() - 1;
        let outcome = match self.position {
            CursorPosition::Custom { .. } => ZoomOutcome::CustomRange,
            CursorPosition::Bucket { index } if index >= last => ZoomOutcome::AlreadyAtMaximum,
            CursorPosition::Bucket { index } => {
                self.position = CursorPosition::Bucket { index: index + 1 };
                ZoomOutcome::Moved {
                    label: self.current_label().to_string(),
                }
            }
        };
        debug!(?outcome, "zoom out");
        outcome
    }

    pub fn select_label(&mut self, label: &str) -> Result<()> {
        let index = self
            .table
            .index_of(label)
            .ok_or_else(|| DashboardError::UnknownRangeLabel(label.to_string()))?;
        self.position = CursorPosition::Bucket { index };
        Ok(())
    }

    /// Enter custom mode. Both ends must be timestamps with start before end.
    pub fn select_custom(&mut self, range: &str) -> Result<()> {
        if !is_custom_range(range) {
            return Err(DashboardError::InvalidRangeFormat(range.to_string()));
        }
        let resolved = resolve_time_range(&self.table, range, NaiveDateTime::default())?;
        TimeWindow::parse(&resolved)?;
        self.position = CursorPosition::Custom {
            range: range.to_string(),
        };
        Ok(())
    }

    /// Bucket label or custom range, whichever `label` is.
    pub fn select(&mut self, label: &str) -> Result<()> {
        if is_custom_range(label) {
            self.select_custom(label)
        } else {
            self.select_label(label)
        }
    }

    pub fn resolve(&self, now: NaiveDateTime) -> Result<ResolvedRange> {
        resolve_time_range(&self.table, self.current_label(), now)
    }
}

/// What the front-end needs to enable or disable the zoom buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomControls {
    pub current_label: String,
    pub custom: bool,
    pub zoom_in_enabled: bool,
    pub zoom_out_enabled: bool,
}

impl From<&ZoomCursor> for ZoomControls {
    fn from(cursor: &ZoomCursor) -> Self {
        Self {
            current_label: cursor.current_label().to_string(),
            custom: cursor.is_custom(),
            zoom_in_enabled: cursor.can_zoom_in(),
            zoom_out_enabled: cursor.can_zoom_out(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(label: &str) -> ZoomCursor {
        ZoomCursor::new(TimeRangeTable::default(), label).unwrap()
    }

    #[test]
    fn zoom_in_at_minimum_is_noop() {
        let mut c = cursor("Last 5 minutes");
        assert_eq!(c.zoom_in(), ZoomOutcome::AlreadyAtMinimum);
        assert_eq!(c.current_label(), "Last 5 minutes");
        assert!(!c.can_zoom_in());
    }

    #[test]
    fn zoom_out_at_maximum_is_noop() {
        let mut c = cursor("Last 7 days");
        assert_eq!(c.zoom_out(), ZoomOutcome::AlreadyAtMaximum);
        assert_eq!(c.current_label(), "Last 7 days");
        assert!(!c.can_zoom_out());
    }

    #[test]
    fn zoom_in_then_out_round_trips_from_every_interior_bucket() {
        let table = TimeRangeTable::default();
        for index in 1..table.len() - 1 {
            let mut c = ZoomCursor::at_index(table.clone(), index);
            let before = c.current_label().to_string();
            assert!(c.zoom_in().moved());
            assert!(c.zoom_out().moved());
            assert_eq!(c.current_label(), before);
        }
    }

    #[test]
    fn zoom_moves_to_adjacent_buckets() {
        let mut c = cursor("Last 1 hour");
        assert_eq!(
            c.zoom_in(),
            ZoomOutcome::Moved {
                label: "Last 30 minutes".to_string()
            }
        );
        c.zoom_out();
        assert_eq!(
            c.zoom_out(),
            ZoomOutcome::Moved {
                label: "Last 3 hours".to_string()
            }
        );
    }

    #[test]
    fn custom_mode_disables_both_directions() {
        let mut c = cursor("Last 1 hour");
        c.select("2024-01-01 00:00:00 - 2024-01-01 06:00:00").unwrap();
        assert!(c.is_custom());
        assert_eq!(c.zoom_in(), ZoomOutcome::CustomRange);
        assert_eq!(c.zoom_out(), ZoomOutcome::CustomRange);

        let controls = ZoomControls::from(&c);
        assert!(!controls.zoom_in_enabled);
        assert!(!controls.zoom_out_enabled);
        assert!(controls.custom);
    }

    #[test]
    fn invalid_custom_range_keeps_position() {
        let mut c = cursor("Last 1 hour");
        assert!(c.select(" - 2024-01-01 06:00:00").is_err());
        assert_eq!(c.current_label(), "Last 1 hour");
    }

    #[test]
    fn custom_range_must_hold_ordered_timestamps() {
        let mut c = cursor("Last 1 hour");
        assert!(matches!(
            c.select("yesterday - today"),
            Err(DashboardError::InvalidTimestamp(_))
        ));
        assert!(c
            .select("2024-01-01 06:00:00 - 2024-01-01 05:00:00")
            .is_err());
        assert!(!c.is_custom());
        assert!(ZoomCursor::new(TimeRangeTable::default(), "yesterday - today").is_err());
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = ZoomCursor::new(TimeRangeTable::default(), "Last century");
        assert!(matches!(err, Err(DashboardError::UnknownRangeLabel(_))));
    }

    #[test]
    fn leaving_custom_mode_restores_zooming() {
        let mut c = cursor("Last 1 hour");
        c.select("2024-01-01 00:00:00 - 2024-01-01 06:00:00").unwrap();
        c.select("Last 15 minutes").unwrap();
        assert!(c.can_zoom_in());
        assert!(c.can_zoom_out());
    }
}
