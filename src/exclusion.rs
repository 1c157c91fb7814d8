//! Traveled-distance aggregation that excludes geofenced segments.
//!
//! Sums the upstream per-segment distances of a trace, dropping every
//! segment whose midpoint lies inside any of the supplied geofence
//! geometries. Fences are prefiltered through an R-tree over their
//! bounding boxes before the exact ray-casting test runs.

use geo::{BoundingRect, Geometry};
use log::{debug, warn};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geo_utils::{point_in_geometry, segment_midpoint};
use crate::{LngLat, Position};

/// Bounding-box entry pointing back at a fence geometry.
struct FenceEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for FenceEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for FenceEnvelope {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

/// Spatial index over a set of geofence geometries.
///
/// Borrows the fences for its lifetime; build once per geofence set and
/// reuse across trace updates. Geometries without an area (points, lines,
/// unsupported types) never contain anything and are skipped at build
/// time.
pub struct GeofenceIndex<'a> {
    fences: &'a [Geometry<f64>],
    tree: RTree<FenceEnvelope>,
}

impl<'a> GeofenceIndex<'a> {
    /// Index the bounding boxes of the given fences.
    pub fn new(fences: &'a [Geometry<f64>]) -> Self {
        let envelopes = fences
            .iter()
            .enumerate()
            .filter(|(_, fence)| {
                matches!(fence, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
            })
            .filter_map(|(index, fence)| {
                fence.bounding_rect().map(|rect| FenceEnvelope {
                    index,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        Self {
            fences,
            tree: RTree::bulk_load(envelopes),
        }
    }

    /// Number of indexed fences.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Whether the point lies inside at least one fence.
    pub fn contains(&self, point: LngLat) -> bool {
        self.tree
            .locate_all_at_point(&[point.lng, point.lat])
            .any(|entry| point_in_geometry(point, &self.fences[entry.index]))
    }

    /// Meters traveled outside all indexed fences.
    ///
    /// Reads the upstream per-segment distance from each pair's second fix
    /// (`attributes.distance`), skipping missing or non-positive values.
    /// A segment counts as inside when its arithmetic midpoint is inside
    /// any fence. Returns `0.0` for traces shorter than 2 positions; the
    /// caller distinguishes "no data" from "zero distance" by trace
    /// length.
    pub fn excluded_distance(&self, trace: &[Position]) -> f64 {
        if trace.len() < 2 {
            return 0.0;
        }
        if trace.windows(2).any(|w| w[1].fix_time < w[0].fix_time) {
            warn!("position trace is not sorted by fix time");
        }

        let mut total = 0.0;
        for pair in trace.windows(2) {
            let meters = pair[1].attributes.distance.unwrap_or(0.0);
            if meters <= 0.0 {
                continue;
            }
            let midpoint = segment_midpoint(pair[0].lng_lat(), pair[1].lng_lat());
            if !self.contains(midpoint) {
                total += meters;
            }
        }

        debug!(
            "aggregated {:.1}m outside {} fences over {} positions",
            total,
            self.fences.len(),
            trace.len()
        );
        total
    }
}

/// Meters traveled outside all of the given fences.
///
/// Convenience wrapper that builds a [`GeofenceIndex`] for a single pass;
/// hosts recomputing on every trace update with a stable geofence set
/// should hold on to the index instead.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use geo::{Geometry, LineString, Polygon};
/// use track_overlay::{excluded_distance, Position};
///
/// let depot = Geometry::Polygon(Polygon::new(
///     LineString::from(vec![(18.0, 59.0), (18.0, 59.1), (18.1, 59.1), (18.1, 59.0)]),
///     vec![],
/// ));
///
/// let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
/// let trace = vec![
///     Position::new(59.05, 18.05, base),
///     // Still inside the depot fence: excluded
///     Position::new(59.05, 18.06, base + Duration::minutes(1)).with_distance(570.0),
///     // Left the fence: counted
///     Position::new(59.05, 18.25, base + Duration::minutes(5)).with_distance(10_900.0),
/// ];
///
/// assert_eq!(excluded_distance(&trace, &[depot]), 10_900.0);
/// ```
pub fn excluded_distance(trace: &[Position], fences: &[Geometry<f64>]) -> f64 {
    GeofenceIndex::new(fences).excluded_distance(trace)
}
