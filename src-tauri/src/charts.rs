//! Shared x-axis window for a group of time-series panels.
//!
//! Every panel in a group renders the same domain. Zoom gestures are clamped
//! to the outer bound (the active bucket's window) and either move the
//! [`ZoomCursor`] to an adjacent bucket, which requires a refetch, or stay a
//! local rendering zoom.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::timerange::{ResolvedRange, TimeWindow, TIMESTAMP_FORMAT};
use crate::types::series::{AnomalySeries, SeriesPoint};
use crate::zoom::{ZoomControls, ZoomCursor};

/// Relative distance between a requested span and a bucket's duration under
/// which the gesture is taken to mean that bucket.
pub const DEFAULT_BUCKET_TOLERANCE: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRequest {
    pub min: NaiveDateTime,
    pub max: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    ZoomIn,
    ZoomOut,
    Pan,
}

/// Classify by span alone: a simultaneous pan is folded into whichever zoom
/// direction the span change indicates.
pub fn classify_gesture(requested: Duration, current: Duration) -> Gesture {
    if requested < current {
        Gesture::ZoomIn
    } else if requested > current {
        Gesture::ZoomOut
    } else {
        Gesture::Pan
    }
}

/// Fit `requested` inside `outer`, shifting it rather than cropping when it
/// is narrower than `outer`.
pub fn clamp_window(requested: TimeWindow, outer: TimeWindow) -> TimeWindow {
    if requested.span() >= outer.span() {
        return outer;
    }
    let (mut start, mut end) = (requested.start, requested.end);
    if start < outer.start {
        let shift = outer.start - start;
        start += shift;
        end += shift;
    }
    if end > outer.end {
        let shift = end - outer.end;
        start -= shift;
        end -= shift;
    }
    TimeWindow { start, end }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartZoomResult {
    /// The cursor moved; data for `range` must be fetched.
    Refetch {
        label: String,
        range: ResolvedRange,
        controls: ZoomControls,
    },
    /// Rendering-only zoom inside the current bucket.
    LocalZoom { domain: ChartDomain },
    /// Degenerate request, nothing changed.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartDomain {
    #[serde(with = "wire_timestamp")]
    pub min: NaiveDateTime,
    #[serde(with = "wire_timestamp")]
    pub max: NaiveDateTime,
}

impl From<TimeWindow> for ChartDomain {
    fn from(w: TimeWindow) -> Self {
        Self {
            min: w.start,
            max: w.end,
        }
    }
}

/// What one panel draws. All panels of a group carry the same `domain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelView {
    pub title: String,
    pub domain: ChartDomain,
    pub data: Vec<SeriesPoint>,
    pub anomalies: Vec<SeriesPoint>,
}

#[derive(Debug, Clone)]
pub struct ChartPanelGroup {
    panels: Vec<AnomalySeries>,
    outer: TimeWindow,
    zoom: Option<TimeWindow>,
    tolerance: f64,
}

impl ChartPanelGroup {
    pub fn new(outer: TimeWindow) -> Self {
        Self {
            panels: Vec::new(),
            outer,
            zoom: None,
            tolerance: DEFAULT_BUCKET_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.max(0.0);
        self
    }

    pub fn outer_bound(&self) -> TimeWindow {
        self.outer
    }

    pub fn panels(&self) -> &[AnomalySeries] {
        &self.panels
    }

    /// New outer bound after a time range change; drops any local zoom.
    pub fn set_outer_bound(&mut self, outer: TimeWindow) {
        self.outer = outer;
        self.zoom = None;
    }

    /// Swap in a fresh response. Panels are never patched individually.
    pub fn replace_series(&mut self, series: Vec<AnomalySeries>) {
        self.panels = series;
        self.zoom = None;
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = None;
    }

    pub fn is_empty(&self) -> bool {
        self.panels.iter().all(AnomalySeries::is_empty)
    }

    /// The domain shared by every panel.
    ///
    /// With no data at all the outer bound is used (`minXOnEmpty` /
    /// `maxXOnEmpty` on the front-end); otherwise the data extent, clamped
    /// to the outer bound.
    pub fn domain(&self) -> TimeWindow {
        if let Some(zoom) = self.zoom {
            return zoom;
        }
        if self.is_empty() {
            return self.outer;
        }
        let extent = self
            .panels
            .iter()
            .filter_map(AnomalySeries::extent)
            .fold(None, |acc: Option<(NaiveDateTime, NaiveDateTime)>, (lo, hi)| {
                Some(match acc {
                    None => (lo, hi),
                    Some((a, b)) => (a.min(lo), b.max(hi)),
                })
            });
        match extent {
            Some((lo, hi)) => {
                let lo = lo.max(self.outer.start);
                let hi = hi.min(self.outer.end);
                TimeWindow::new(lo, hi).unwrap_or(self.outer)
            }
            None => self.outer,
        }
    }

    pub fn render(&self) -> Vec<PanelView> {
        let domain = ChartDomain::from(self.domain());
        self.panels
            .iter()
            .map(|series| PanelView {
                title: series.title.clone(),
                domain,
                data: series.data.clone(),
                anomalies: series.anomalies.clone().unwrap_or_default(),
            })
            .collect()
    }

    fn near_bucket(&self, requested: Duration, bucket: Duration) -> bool {
        let diff = (requested - bucket).num_milliseconds().abs() as f64;
        diff <= bucket.num_milliseconds() as f64 * self.tolerance
    }

    /// Handle a zoom or pan gesture from any panel.
    pub fn apply_zoom(
        &mut self,
        cursor: &mut ZoomCursor,
        request: ZoomRequest,
        now: NaiveDateTime,
    ) -> Result<ChartZoomResult> {
        let (min, max) = if request.min <= request.max {
            (request.min, request.max)
        } else {
            (request.max, request.min)
        };
        if min == max {
            return Ok(ChartZoomResult::Ignored);
        }
        let requested = TimeWindow { start: min, end: max };
        let current = self.domain();
        let gesture = classify_gesture(requested.span(), current.span());
        debug!(?gesture, %min, %max, "chart zoom request");

        match gesture {
            Gesture::ZoomIn => {
                let advance = cursor
                    .smaller_bucket()
                    .is_some_and(|b| self.near_bucket(requested.span(), b.duration()));
                if advance {
                    cursor.zoom_in();
                    return self.refetch(cursor, now);
                }
            }
            Gesture::ZoomOut => {
                if requested.span() > self.outer.span() && cursor.can_zoom_out() {
                    cursor.zoom_out();
                    return self.refetch(cursor, now);
                }
            }
            Gesture::Pan => {}
        }

        let clamped = clamp_window(requested, self.outer);
        self.zoom = (clamped != self.outer).then_some(clamped);
        Ok(ChartZoomResult::LocalZoom {
            domain: ChartDomain::from(self.domain()),
        })
    }

    fn refetch(&mut self, cursor: &ZoomCursor, now: NaiveDateTime) -> Result<ChartZoomResult> {
        let range = cursor.resolve(now)?;
        self.set_outer_bound(TimeWindow::parse(&range)?);
        debug!(label = cursor.current_label(), "zoom moved cursor, refetching");
        Ok(ChartZoomResult::Refetch {
            label: cursor.current_label().to_string(),
            range,
            controls: ZoomControls::from(cursor),
        })
    }
}

mod wire_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timerange::{parse_timestamp, resolve_time_range, TimeRangeTable};

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn now() -> NaiveDateTime {
        at("2024-01-01 12:00:00")
    }

    fn setup(label: &str) -> (ZoomCursor, ChartPanelGroup) {
        let table = TimeRangeTable::default();
        let cursor = ZoomCursor::new(table.clone(), label).unwrap();
        let range = resolve_time_range(&table, label, now()).unwrap();
        let group = ChartPanelGroup::new(TimeWindow::parse(&range).unwrap());
        (cursor, group)
    }

    fn series(title: &str, points: &[(&str, f64)]) -> AnomalySeries {
        AnomalySeries {
            title: title.to_string(),
            data: points
                .iter()
                .map(|(t, v)| SeriesPoint(t.to_string(), *v))
                .collect(),
            anomalies: None,
        }
    }

    fn req(min: &str, max: &str) -> ZoomRequest {
        ZoomRequest {
            min: at(min),
            max: at(max),
        }
    }

    #[test]
    fn empty_group_uses_outer_bound() {
        let (_, mut group) = setup("Last 1 hour");
        group.replace_series(vec![series("cpu", &[]), series("mem", &[])]);
        assert!(group.is_empty());
        assert_eq!(group.domain(), group.outer_bound());
        for view in group.render() {
            assert_eq!(view.domain.min, at("2024-01-01 11:00:00"));
            assert_eq!(view.domain.max, at("2024-01-01 12:00:00"));
        }
    }

    #[test]
    fn data_extent_is_shared_and_clamped() {
        let (_, mut group) = setup("Last 1 hour");
        group.replace_series(vec![
            series("cpu", &[("2024-01-01 10:30:00", 1.0), ("2024-01-01 11:20:00", 2.0)]),
            series("mem", &[("2024-01-01 11:40:00", 3.0)]),
        ]);
        let views = group.render();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].domain, views[1].domain);
        assert_eq!(views[0].domain.min, at("2024-01-01 11:00:00"));
        assert_eq!(views[0].domain.max, at("2024-01-01 11:40:00"));
    }

    #[test]
    fn zoom_request_outside_outer_bound_is_clamped() {
        let (mut cursor, mut group) = setup("Last 1 hour");
        let result = group
            .apply_zoom(&mut cursor, req("2024-01-01 10:50:00", "2024-01-01 11:05:00"), now())
            .unwrap();
        match result {
            ChartZoomResult::LocalZoom { domain } => {
                assert_eq!(domain.min, at("2024-01-01 11:00:00"));
                assert_eq!(domain.max, at("2024-01-01 11:15:00"));
            }
            other => panic!("expected local zoom, got {:?}", other),
        }
        assert!(group.outer_bound().contains(&group.domain()));
        assert_eq!(cursor.current_label(), "Last 1 hour");
    }

    #[test]
    fn overly_wide_request_caps_at_outer_bound_when_cursor_cannot_widen() {
        let (mut cursor, mut group) = setup("Last 7 days");
        let result = group
            .apply_zoom(&mut cursor, req("2023-12-01 00:00:00", "2024-02-01 00:00:00"), now())
            .unwrap();
        match result {
            ChartZoomResult::LocalZoom { domain } => {
                assert_eq!(TimeWindow { start: domain.min, end: domain.max }, group.outer_bound());
            }
            other => panic!("expected local zoom, got {:?}", other),
        }
        assert_eq!(cursor.current_label(), "Last 7 days");
    }

    #[test]
    fn zoom_in_matching_smaller_bucket_moves_cursor() {
        let (mut cursor, mut group) = setup("Last 1 hour");
        let result = group
            .apply_zoom(&mut cursor, req("2024-01-01 11:20:00", "2024-01-01 11:51:00"), now())
            .unwrap();
        match result {
            ChartZoomResult::Refetch { label, range, controls } => {
                assert_eq!(label, "Last 30 minutes");
                assert_eq!(range.start_time, "2024-01-01 11:30:00");
                assert_eq!(range.end_time, "2024-01-01 12:00:00");
                assert!(controls.zoom_in_enabled);
            }
            other => panic!("expected refetch, got {:?}", other),
        }
        assert_eq!(cursor.current_label(), "Last 30 minutes");
        assert_eq!(group.outer_bound().span(), Duration::minutes(30));
    }

    #[test]
    fn zoom_in_tolerance_applies_on_both_sides_of_the_bucket() {
        // 28 minutes is inside 10% of the 30 minute bucket.
        let (mut cursor, mut group) = setup("Last 1 hour");
        let result = group
            .apply_zoom(&mut cursor, req("2024-01-01 11:20:00", "2024-01-01 11:48:00"), now())
            .unwrap();
        assert!(matches!(result, ChartZoomResult::Refetch { .. }));

        // 20 minutes is well under it and stays a rendering zoom.
        let (mut cursor, mut group) = setup("Last 1 hour");
        let result = group
            .apply_zoom(&mut cursor, req("2024-01-01 11:20:00", "2024-01-01 11:40:00"), now())
            .unwrap();
        assert!(matches!(result, ChartZoomResult::LocalZoom { .. }));
        assert_eq!(cursor.current_label(), "Last 1 hour");
    }

    #[test]
    fn zoom_in_far_from_any_bucket_stays_local() {
        let (mut cursor, mut group) = setup("Last 1 hour");
        let result = group
            .apply_zoom(&mut cursor, req("2024-01-01 11:10:00", "2024-01-01 11:12:00"), now())
            .unwrap();
        assert!(matches!(result, ChartZoomResult::LocalZoom { .. }));
        assert_eq!(cursor.current_label(), "Last 1 hour");
        assert_eq!(group.domain().span(), Duration::minutes(2));
    }

    #[test]
    fn zoom_in_at_smallest_bucket_stays_local() {
        let (mut cursor, mut group) = setup("Last 5 minutes");
        let result = group
            .apply_zoom(&mut cursor, req("2024-01-01 11:56:00", "2024-01-01 11:58:00"), now())
            .unwrap();
        assert!(matches!(result, ChartZoomResult::LocalZoom { .. }));
        assert_eq!(cursor.current_label(), "Last 5 minutes");
    }

    #[test]
    fn zoom_out_beyond_bucket_widens_cursor() {
        let (mut cursor, mut group) = setup("Last 15 minutes");
        let result = group
            .apply_zoom(&mut cursor, req("2024-01-01 11:30:00", "2024-01-01 12:00:00"), now())
            .unwrap();
        match result {
            ChartZoomResult::Refetch { label, .. } => assert_eq!(label, "Last 30 minutes"),
            other => panic!("expected refetch, got {:?}", other),
        }
    }

    #[test]
    fn zoom_out_within_bucket_widens_local_zoom_only() {
        let (mut cursor, mut group) = setup("Last 1 hour");
        group
            .apply_zoom(&mut cursor, req("2024-01-01 11:10:00", "2024-01-01 11:12:00"), now())
            .unwrap();
        let result = group
            .apply_zoom(&mut cursor, req("2024-01-01 11:05:00", "2024-01-01 11:25:00"), now())
            .unwrap();
        assert!(matches!(result, ChartZoomResult::LocalZoom { .. }));
        assert_eq!(group.domain().span(), Duration::minutes(20));
        assert_eq!(cursor.current_label(), "Last 1 hour");
    }

    #[test]
    fn custom_range_never_moves_cursor() {
        let (mut cursor, mut group) = setup("Last 1 hour");
        cursor
            .select("2024-01-01 11:00:00 - 2024-01-01 12:00:00")
            .unwrap();
        let result = group
            .apply_zoom(&mut cursor, req("2024-01-01 09:00:00", "2024-01-01 14:00:00"), now())
            .unwrap();
        assert!(matches!(result, ChartZoomResult::LocalZoom { .. }));
        assert!(cursor.is_custom());
    }

    #[test]
    fn pan_shifts_inside_outer_bound() {
        let (mut cursor, mut group) = setup("Last 1 hour");
        group
            .apply_zoom(&mut cursor, req("2024-01-01 11:10:00", "2024-01-01 11:20:00"), now())
            .unwrap();
        group
            .apply_zoom(&mut cursor, req("2024-01-01 11:55:00", "2024-01-01 12:05:00"), now())
            .unwrap();
        let d = group.domain();
        assert_eq!(d.start, at("2024-01-01 11:50:00"));
        assert_eq!(d.end, at("2024-01-01 12:00:00"));
    }

    #[test]
    fn reversed_and_degenerate_requests() {
        let (mut cursor, mut group) = setup("Last 1 hour");
        let same = req("2024-01-01 11:10:00", "2024-01-01 11:10:00");
        assert_eq!(
            group.apply_zoom(&mut cursor, same, now()).unwrap(),
            ChartZoomResult::Ignored
        );
        let reversed = req("2024-01-01 11:20:00", "2024-01-01 11:10:00");
        group.apply_zoom(&mut cursor, reversed, now()).unwrap();
        assert_eq!(group.domain().start, at("2024-01-01 11:10:00"));
    }

    #[test]
    fn replacing_series_resets_local_zoom() {
        let (mut cursor, mut group) = setup("Last 1 hour");
        group
            .apply_zoom(&mut cursor, req("2024-01-01 11:10:00", "2024-01-01 11:20:00"), now())
            .unwrap();
        group.replace_series(vec![series("cpu", &[])]);
        assert_eq!(group.domain(), group.outer_bound());
    }

    #[test]
    fn chart_domain_serializes_in_wire_format() {
        let domain = ChartDomain {
            min: at("2024-01-01 11:00:00"),
            max: at("2024-01-01 12:00:00"),
        };
        let json = serde_json::to_string(&domain).unwrap();
        assert_eq!(json, r#"{"min":"2024-01-01 11:00:00","max":"2024-01-01 12:00:00"}"#);
        let back: ChartDomain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, domain);
    }
}
