//! Stop segmentation over a time-ordered position trace.
//!
//! A stop is an interval where consecutive fixes stay within a small
//! distance tolerance of an anchor fix for at least a minimum duration.
//! The scan absorbs GPS jitter around a parked location and runs in O(n):
//! each position is visited by exactly one inner scan step.

use chrono::Duration;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::geo_utils::haversine_distance;
use crate::{Marker, Position, StopWindow};

/// Configuration for stop segmentation.
#[derive(Debug, Clone)]
pub struct StopConfig {
    /// Minimum stationary duration for an interval to count as a stop.
    /// Default: 5 minutes.
    pub min_stop_duration: Duration,

    /// Radius around the anchor fix within which movement is treated as
    /// GPS noise. Default: 10 meters.
    pub jitter_tolerance_meters: f64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            min_stop_duration: Duration::minutes(5),
            jitter_tolerance_meters: 10.0,
        }
    }
}

/// A detected stationary interval, anchored at its first fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub window: StopWindow,
}

impl From<StopMarker> for Marker {
    /// Convert into a marker descriptor. The layer's default icon applies
    /// and popup content is synthesized from the stop window on click.
    fn from(stop: StopMarker) -> Self {
        Marker {
            latitude: stop.latitude,
            longitude: stop.longitude,
            stop: Some(stop.window),
            ..Marker::default()
        }
    }
}

/// Detect stationary intervals in a trace sorted by fix time.
///
/// Scans with a sliding anchor: starting at index `i`, a cursor advances
/// while fixes stay within `jitter_tolerance_meters` of `trace[i]`. When
/// the cursor breaks out (or the trace ends), the absorbed run is emitted
/// as a stop if it lasted at least `min_stop_duration`, and the anchor
/// jumps past the run. Both thresholds are inclusive.
///
/// Traces shorter than 2 positions yield an empty result. An unsorted
/// trace is logged and processed best-effort; segmentation of such input
/// is undefined.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use track_overlay::{segment_stops, Position, StopConfig};
///
/// let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
/// let trace = vec![
///     Position::new(59.3293, 18.0686, base),
///     Position::new(59.3293, 18.0686, base + Duration::minutes(2)),
///     Position::new(59.3293, 18.0686, base + Duration::minutes(6)),
/// ];
///
/// let stops = segment_stops(&trace, &StopConfig::default());
/// assert_eq!(stops.len(), 1);
/// assert_eq!(stops[0].window.duration(), Duration::minutes(6));
/// ```
pub fn segment_stops(trace: &[Position], config: &StopConfig) -> Vec<StopMarker> {
    if trace.len() < 2 {
        return Vec::new();
    }
    if trace.windows(2).any(|w| w[1].fix_time < w[0].fix_time) {
        warn!("position trace is not sorted by fix time; stop segmentation is undefined");
    }

    let mut stops = Vec::new();
    let mut i = 0;
    while i < trace.len() {
        let anchor = trace[i].lng_lat();

        let mut j = i + 1;
        while j < trace.len()
            && haversine_distance(anchor, trace[j].lng_lat()) <= config.jitter_tolerance_meters
        {
            j += 1;
        }

        // Candidate run [i, j-1]; the trailing run ends at the last fix.
        let end = j - 1;
        if end > i {
            let duration = trace[end].fix_time - trace[i].fix_time;
            if duration >= config.min_stop_duration {
                stops.push(StopMarker {
                    latitude: trace[i].latitude,
                    longitude: trace[i].longitude,
                    window: StopWindow::new(trace[i].fix_time, trace[end].fix_time),
                });
            }
        }

        i = j;
    }

    debug!(
        "segmented {} stops from {} positions",
        stops.len(),
        trace.len()
    );
    stops
}
