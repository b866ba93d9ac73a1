//! # Timeline/Marker Overlay
//!
//! Pure layout of markers and clips over the video timeline, plus the
//! hover and drag state of the scrubber. Positions are fractions in
//! `[0, 1]` of the timeline width; the UI multiplies by its pixel width.
//!
//! The overlay never touches playback. A click or the end of a drag yields
//! a seek target that the player forwards to the coordinator.

use crate::sequencer::ClipRequest;
use bridge_traits::SourceId;
use serde::{Deserialize, Serialize};

/// Default hit-test tolerance, as a fraction of the timeline width.
pub const DEFAULT_HIT_TOLERANCE: f64 = 0.01;

/// A labelled point on the timeline. Several markers may share a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub time: f64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Marker {
    pub fn new(time: f64, label: impl Into<String>) -> Self {
        Self {
            time,
            label: label.into(),
            color: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// A stored clip as the surrounding application persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipDefinition {
    pub start_time: f64,
    /// Seconds; 0 means open-ended.
    #[serde(default)]
    pub duration: f64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ClipDefinition {
    pub fn to_request(&self, source: SourceId) -> ClipRequest {
        ClipRequest::new(source, self.start_time, self.duration).with_label(self.label.clone())
    }

    pub fn to_marker(&self) -> Marker {
        Marker::new(self.start_time, self.label.clone())
    }
}

fn known(duration: f64) -> Option<f64> {
    (duration.is_finite() && duration > 0.0).then_some(duration)
}

/// Position of `time` on the timeline, `None` while the duration is unknown.
pub fn marker_position(time: f64, duration: f64) -> Option<f64> {
    let duration = known(duration)?;
    time.is_finite()
        .then(|| (time / duration).clamp(0.0, 1.0))
}

/// Playback progress in `[0, 1]`.
pub fn progress_fraction(current_time: f64, duration: f64) -> Option<f64> {
    marker_position(current_time, duration)
}

/// `(left, width)` of a clip span, clipped to the timeline.
pub fn clip_span(start_time: f64, clip_duration: f64, duration: f64) -> Option<(f64, f64)> {
    let left = marker_position(start_time, duration)?;
    let right = marker_position(start_time + clip_duration.max(0.0), duration)?;
    Some((left, right - left))
}

/// Timeline time under `fraction`.
pub fn time_at(fraction: f64, duration: f64) -> Option<f64> {
    let duration = known(duration)?;
    fraction
        .is_finite()
        .then(|| fraction.clamp(0.0, 1.0) * duration)
}

/// Index of the marker closest to `fraction`, if within `tolerance`.
pub fn nearest_marker(
    markers: &[Marker],
    fraction: f64,
    duration: f64,
    tolerance: f64,
) -> Option<usize> {
    markers
        .iter()
        .enumerate()
        .filter_map(|(index, marker)| {
            let position = marker_position(marker.time, duration)?;
            let distance = (position - fraction).abs();
            (distance <= tolerance).then_some((index, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Layout of one marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerLayout {
    pub index: usize,
    pub position: f64,
}

/// What the pointer is over.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineHover {
    pub fraction: f64,
    pub time: f64,
    /// Marker under the pointer, if any.
    pub marker: Option<usize>,
}

/// Interaction state of the timeline.
#[derive(Debug, Clone)]
pub struct TimelineOverlay {
    markers: Vec<Marker>,
    duration: f64,
    hit_tolerance: f64,
    hover: Option<TimelineHover>,
    drag: Option<f64>,
}

impl Default for TimelineOverlay {
    fn default() -> Self {
        Self::new(DEFAULT_HIT_TOLERANCE)
    }
}

impl TimelineOverlay {
    pub fn new(hit_tolerance: f64) -> Self {
        Self {
            markers: Vec::new(),
            duration: 0.0,
            hit_tolerance: hit_tolerance.max(0.0),
            hover: None,
            drag: None,
        }
    }

    pub fn set_markers(&mut self, markers: Vec<Marker>) {
        self.markers = markers;
        self.hover = None;
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = duration;
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Positions of every marker; empty while the duration is unknown.
    pub fn layout(&self) -> Vec<MarkerLayout> {
        self.markers
            .iter()
            .enumerate()
            .filter_map(|(index, marker)| {
                marker_position(marker.time, self.duration)
                    .map(|position| MarkerLayout { index, position })
            })
            .collect()
    }

    pub fn hover(&mut self, fraction: f64) -> Option<TimelineHover> {
        let time = time_at(fraction, self.duration)?;
        let fraction = fraction.clamp(0.0, 1.0);
        let hover = TimelineHover {
            fraction,
            time,
            marker: nearest_marker(&self.markers, fraction, self.duration, self.hit_tolerance),
        };
        self.hover = Some(hover.clone());
        Some(hover)
    }

    pub fn hovered(&self) -> Option<&TimelineHover> {
        self.hover.as_ref()
    }

    pub fn clear_hover(&mut self) {
        self.hover = None;
    }

    /// Seek target of a click; snaps to a marker within the tolerance.
    pub fn click(&self, fraction: f64) -> Option<f64> {
        if let Some(index) =
            nearest_marker(&self.markers, fraction, self.duration, self.hit_tolerance)
        {
            return Some(self.markers[index].time.max(0.0));
        }
        time_at(fraction, self.duration)
    }

    pub fn begin_drag(&mut self, fraction: f64) {
        if known(self.duration).is_some() && fraction.is_finite() {
            self.drag = Some(fraction.clamp(0.0, 1.0));
        }
    }

    /// Moves the drag handle; returns the time under it for previews.
    pub fn drag_to(&mut self, fraction: f64) -> Option<f64> {
        self.drag.as_ref()?;
        let time = time_at(fraction, self.duration)?;
        self.drag = Some(fraction.clamp(0.0, 1.0));
        Some(time)
    }

    /// Ends the drag and returns its seek target.
    pub fn end_drag(&mut self) -> Option<f64> {
        let fraction = self.drag.take()?;
        time_at(fraction, self.duration)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_require_known_duration() {
        assert_eq!(marker_position(10.0, 0.0), None);
        assert_eq!(marker_position(10.0, f64::NAN), None);
        assert_eq!(marker_position(10.0, 40.0), Some(0.25));
        assert_eq!(marker_position(50.0, 40.0), Some(1.0));
        assert_eq!(marker_position(-3.0, 40.0), Some(0.0));
    }

    #[test]
    fn clip_span_is_clipped() {
        assert_eq!(clip_span(10.0, 10.0, 40.0), Some((0.25, 0.25)));
        assert_eq!(clip_span(30.0, 20.0, 40.0), Some((0.75, 0.25)));
        assert_eq!(clip_span(10.0, 5.0, 0.0), None);
    }

    #[test]
    fn fraction_time_conversion() {
        assert_eq!(time_at(0.5, 120.0), Some(60.0));
        assert_eq!(time_at(1.2, 120.0), Some(120.0));
        assert_eq!(time_at(0.5, 0.0), None);
        assert_eq!(progress_fraction(30.0, 120.0), Some(0.25));
    }

    #[test]
    fn nearest_marker_picks_closest_within_tolerance() {
        let markers = vec![
            Marker::new(10.0, "tip-off"),
            Marker::new(11.0, "foul"),
            Marker::new(50.0, "three"),
        ];
        // 100s timeline: markers at 0.10, 0.11, 0.50.
        assert_eq!(nearest_marker(&markers, 0.108, 100.0, 0.01), Some(1));
        assert_eq!(nearest_marker(&markers, 0.3, 100.0, 0.01), None);
    }

    #[test]
    fn click_snaps_to_markers() {
        let mut overlay = TimelineOverlay::new(0.02);
        overlay.set_duration(100.0);
        overlay.set_markers(vec![Marker::new(42.0, "dunk").with_color("#f60")]);

        assert_eq!(overlay.click(0.41), Some(42.0));
        assert_eq!(overlay.click(0.8), Some(80.0));
        assert_eq!(overlay.layout(), vec![MarkerLayout { index: 0, position: 0.42 }]);
    }

    #[test]
    fn hover_reports_marker_under_pointer() {
        let mut overlay = TimelineOverlay::default();
        overlay.set_markers(vec![Marker::new(25.0, "block")]);
        assert_eq!(overlay.hover(0.25), None);

        overlay.set_duration(100.0);
        let hover = overlay.hover(0.255).unwrap();
        assert_eq!(hover.marker, Some(0));
        assert!(overlay.hovered().is_some());

        overlay.clear_hover();
        assert!(overlay.hovered().is_none());
    }

    #[test]
    fn drag_yields_target_on_release() {
        let mut overlay = TimelineOverlay::default();
        overlay.set_duration(200.0);

        assert_eq!(overlay.drag_to(0.5), None);
        overlay.begin_drag(0.1);
        assert!(overlay.is_dragging());
        assert_eq!(overlay.drag_to(0.5), Some(100.0));
        assert_eq!(overlay.end_drag(), Some(100.0));
        assert!(!overlay.is_dragging());
        assert_eq!(overlay.end_drag(), None);
    }

    #[test]
    fn clip_definitions_convert() {
        let definition: ClipDefinition = serde_json::from_str(
            r#"{ "startTime": 12.4, "duration": 6, "label": "Q1 dunk", "notes": "fast break" }"#,
        )
        .unwrap();
        let source = SourceId::new();

        let request = definition.to_request(source);
        assert_eq!(request.start_time, 12.4);
        assert_eq!(request.duration_seconds, 6.0);
        assert_eq!(request.label.as_deref(), Some("Q1 dunk"));
        assert_eq!(request.source, source);

        assert_eq!(definition.to_marker(), Marker::new(12.4, "Q1 dunk"));
    }
}
