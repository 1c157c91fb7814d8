//! # Track Overlay
//!
//! Derived geospatial overlays for a live map view of tracked devices.
//!
//! This library provides:
//! - Stop segmentation over a time-ordered position trace
//! - Traveled-distance aggregation that excludes geofenced segments
//! - An interactive point-and-click distance measuring control
//! - Lifecycle management for a marker rendering layer with popups
//!
//! The map engine itself is an external collaborator: every rendering
//! component receives a [`surface::MapSurface`] handle at construction and
//! owns the sources, layers, listeners and popups it allocates through it.
//! Nothing in this crate fetches data or touches a global map instance.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Duration, TimeZone, Utc};
//! use track_overlay::{segment_stops, Position, StopConfig};
//!
//! // A device parked at the same spot for six minutes
//! let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
//! let trace: Vec<Position> = (0..4i64)
//!     .map(|i| Position::new(59.3293, 18.0686, base + Duration::minutes(i * 2)))
//!     .collect();
//!
//! let stops = segment_stops(&trace, &StopConfig::default());
//! assert_eq!(stops.len(), 1);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OverlayError, Result};

// Geographic utilities (distance, midpoint, point-in-polygon)
pub mod geo_utils;

// Stop segmentation over position traces
pub mod stops;
pub use stops::{segment_stops, StopConfig, StopMarker};

// Geofence-exclusion distance aggregation
pub mod exclusion;
pub use exclusion::{excluded_distance, GeofenceIndex};

// Map surface abstraction (injected rendering seam)
pub mod surface;
pub use surface::{Feature, FeatureCollection, LngLat, MapSurface};

// Marker layer lifecycle management
pub mod markers;
pub use markers::{MarkerLayer, MarkerLayerOptions};

// Interactive distance measuring control
pub mod measure;
pub use measure::{MeasureControl, MeasureStyle};

// Human-readable label formatting
pub mod format;

// ============================================================================
// Core Types
// ============================================================================

/// A single reported position fix for a tracked device.
///
/// Traces handed to [`segment_stops`] and [`excluded_distance`] must be
/// sorted by `fix_time` ascending; the trace is read-only for the duration
/// of a computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub fix_time: DateTime<Utc>,
    #[serde(default)]
    pub attributes: PositionAttributes,
}

/// Upstream-computed attributes attached to a fix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAttributes {
    /// Meters traveled since the previous fix in the trace, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Remaining attributes the server reported alongside the fix.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Position {
    /// Create a new position fix with empty attributes.
    pub fn new(latitude: f64, longitude: f64, fix_time: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            fix_time,
            attributes: PositionAttributes::default(),
        }
    }

    /// Attach the upstream per-segment distance in meters.
    pub fn with_distance(mut self, meters: f64) -> Self {
        self.attributes.distance = Some(meters);
        self
    }

    /// Check if the fix has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// The fix location as a map-surface coordinate.
    pub fn lng_lat(&self) -> LngLat {
        LngLat {
            lng: self.longitude,
            lat: self.latitude,
        }
    }
}

/// The `[start, end, duration]` triple describing a stationary interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopWindow {
    pub start_fix: DateTime<Utc>,
    pub end_fix: DateTime<Utc>,
    /// Duration in milliseconds (`end_fix - start_fix`).
    pub duration_ms: i64,
}

impl StopWindow {
    /// Create a window spanning `start_fix..end_fix`.
    pub fn new(start_fix: DateTime<Utc>, end_fix: DateTime<Utc>) -> Self {
        Self {
            start_fix,
            end_fix,
            duration_ms: (end_fix - start_fix).num_milliseconds(),
        }
    }

    /// The window duration as a [`chrono::Duration`].
    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.duration_ms)
    }
}

/// Descriptor for one rendered point marker.
///
/// Markers are value objects; [`MarkerLayer::set_markers`] replaces the
/// rendered set atomically with whatever list it is given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub latitude: f64,
    pub longitude: f64,
    /// Icon name; the layer substitutes its default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Explicit popup content; wins over the synthesized stop popup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popup_html: Option<String>,
    /// Stationary interval this marker represents, if any. Used to
    /// synthesize popup content when `popup_html` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopWindow>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_position_validation() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert!(Position::new(51.5074, -0.1278, t).is_valid());
        assert!(!Position::new(91.0, 0.0, t).is_valid());
        assert!(!Position::new(0.0, 181.0, t).is_valid());
        assert!(!Position::new(f64::NAN, 0.0, t).is_valid());
    }

    #[test]
    fn test_position_wire_format() {
        let json = r#"{
            "latitude": 59.3293,
            "longitude": 18.0686,
            "fixTime": "2024-05-01T08:00:00Z",
            "attributes": { "distance": 12.5, "ignition": true }
        }"#;

        let position: Position = serde_json::from_str(json).unwrap();
        assert_eq!(position.attributes.distance, Some(12.5));
        assert_eq!(
            position.attributes.extra.get("ignition"),
            Some(&serde_json::Value::Bool(true))
        );

        let round_trip = serde_json::to_value(&position).unwrap();
        assert_eq!(round_trip["fixTime"], "2024-05-01T08:00:00Z");
    }

    #[test]
    fn test_stop_window_duration() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let end = start + chrono::Duration::minutes(90);
        let window = StopWindow::new(start, end);
        assert_eq!(window.duration_ms, 90 * 60 * 1000);
        assert_eq!(window.duration(), chrono::Duration::minutes(90));
    }
}
