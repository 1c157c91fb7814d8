//! GeoJSON-style feature payloads handed to map data sources.
//!
//! Only the two geometry kinds the overlays render are modeled: points for
//! markers and labels, line strings for the measuring line.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::LngLat;

/// Geometry of a single feature, coordinates longitude-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeatureGeometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
}

/// One renderable feature: geometry plus string-keyed properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: FeatureGeometry,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    /// A point feature with no properties.
    pub fn point(at: LngLat) -> Self {
        Self {
            geometry: FeatureGeometry::Point {
                coordinates: [at.lng, at.lat],
            },
            properties: Map::new(),
        }
    }

    /// A line-string feature through the given coordinates.
    pub fn line(points: &[LngLat]) -> Self {
        Self {
            geometry: FeatureGeometry::LineString {
                coordinates: points.iter().map(|p| [p.lng, p.lat]).collect(),
            },
            properties: Map::new(),
        }
    }

    /// Attach a property, consuming and returning the feature.
    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Read a string property; `None` when absent or not a string.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// Read an integer property; `None` when absent or not a number.
    pub fn property_i64(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(Value::as_i64)
    }

    /// The anchor coordinate of the feature: the point itself, or the
    /// first vertex of a line.
    pub fn anchor(&self) -> Option<LngLat> {
        match &self.geometry {
            FeatureGeometry::Point { coordinates } => Some(LngLat {
                lng: coordinates[0],
                lat: coordinates[1],
            }),
            FeatureGeometry::LineString { coordinates } => {
                coordinates.first().map(|c| LngLat { lng: c[0], lat: c[1] })
            }
        }
    }
}

/// An ordered collection of features, replaced wholesale on every update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_feature_geometry() {
        let feature = Feature::point(LngLat { lng: 18.0686, lat: 59.3293 })
            .with_property("image", "default-neutral");

        let value = serde_json::to_value(&feature).unwrap();
        assert_eq!(value["geometry"]["type"], "Point");
        assert_eq!(value["geometry"]["coordinates"], json!([18.0686, 59.3293]));
        assert_eq!(value["properties"]["image"], "default-neutral");
    }

    #[test]
    fn test_line_feature_roundtrip() {
        let points = vec![
            LngLat { lng: 0.0, lat: 0.0 },
            LngLat { lng: 0.0, lat: 0.009 },
        ];
        let feature = Feature::line(&points);
        let json = serde_json::to_string(&feature).unwrap();
        let back: Feature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, feature);
        assert_eq!(back.anchor(), Some(points[0]));
    }

    #[test]
    fn test_property_accessors() {
        let feature = Feature::point(LngLat { lng: 0.0, lat: 0.0 })
            .with_property("title", "Depot")
            .with_property("durationMs", 360_000);

        assert_eq!(feature.property_str("title"), Some("Depot"));
        assert_eq!(feature.property_i64("durationMs"), Some(360_000));
        assert_eq!(feature.property_str("missing"), None);
        assert_eq!(feature.property_str("durationMs"), None);
    }
}
