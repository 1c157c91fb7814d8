//! The rendering seam between overlay components and the map engine.
//!
//! Components never reach a global map instance; they receive an
//! `Rc<dyn MapSurface>` at construction and own every resource they
//! allocate through it. The trait covers the subset of a vector map engine
//! the overlays need: named GeoJSON-style sources, named layers bound to a
//! source, click listeners, popups and the cursor affordance.
//!
//! [`mock::MockSurface`] implements the trait as a recording double, which
//! is how the resource-accounting tests verify that mount/unmount cycles
//! leave nothing behind.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod features;
pub mod mock;

pub use features::{Feature, FeatureCollection, FeatureGeometry};

/// A map-surface coordinate, longitude first as in GeoJSON.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

/// Allocate a process-unique resource key with the given prefix.
///
/// Keys separate each component instance's sources, layers and popups on
/// the shared surface. A monotonic counter keeps them deterministic within
/// a run, which random identifiers would not be.
pub fn alloc_key(prefix: &str) -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("{}-{}", prefix, NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Handle for a registered click listener, assigned by the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// Pointer affordance over the map canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cursor {
    #[default]
    Default,
    Crosshair,
}

/// A click delivered by the event dispatcher.
#[derive(Debug, Clone)]
pub struct ClickEvent {
    /// The clicked map coordinate.
    pub lng_lat: LngLat,
    /// The topmost feature under the cursor, for layer-scoped listeners.
    pub feature: Option<Feature>,
}

/// Callback invoked synchronously for each delivered event.
pub type ClickHandler = Box<dyn Fn(&ClickEvent)>;

/// Specification of a rendering layer bound to a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    pub source: String,
    pub kind: LayerKind,
}

/// How a layer draws its source features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LayerKind {
    /// Icon per point feature, icon name from the feature's `image` property.
    Symbol(SymbolStyle),
    /// Stroked line geometry.
    Line(LineStyle),
    /// Text per point feature, content from the feature's `label` property.
    Text(TextStyle),
}

/// Styling for a symbol (icon) layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolStyle {
    /// Scale factor applied to marker icons.
    pub icon_scale: f64,
    /// Secondary text anchored below the icon, drawn from the feature's
    /// `title` property. `None` renders icons only.
    pub titles: Option<TextStyle>,
}

/// Styling for a line layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: String,
    pub width: f64,
    /// Round caps and joins.
    pub rounded: bool,
}

/// Styling for rendered text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub size: f64,
    pub halo_color: String,
    pub halo_width: f64,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 12.0,
            halo_color: "white".to_string(),
            halo_width: 1.0,
        }
    }
}

/// A live handle to the map surface.
///
/// All methods take `&self`: the surface runs on a single-threaded UI loop
/// and implementations use interior mutability. Removal methods are
/// idempotent no-ops when the resource is absent, so teardown paths can
/// run unconditionally without masking an earlier mount error.
pub trait MapSurface {
    /// Register an empty feature data source under a unique key.
    fn add_source(&self, id: &str) -> Result<()>;

    /// Replace the source's feature collection wholesale.
    fn set_source_data(&self, id: &str, data: FeatureCollection) -> Result<()>;

    /// Remove a data source. No-op when absent.
    fn remove_source(&self, id: &str);

    /// Register a rendering layer bound to an existing source.
    fn add_layer(&self, spec: LayerSpec) -> Result<()>;

    /// Remove a rendering layer. No-op when absent.
    fn remove_layer(&self, id: &str);

    /// Register a click listener scoped to one layer's features.
    fn on_layer_click(&self, layer: &str, handler: ClickHandler) -> ListenerId;

    /// Register a raw map click listener (reports the clicked coordinate).
    fn on_click(&self, handler: ClickHandler) -> ListenerId;

    /// Register a raw map double-click listener.
    fn on_double_click(&self, handler: ClickHandler) -> ListenerId;

    /// Unregister any listener. No-op when absent.
    fn remove_listener(&self, id: ListenerId);

    /// Open a popup at a coordinate with HTML content, replacing any popup
    /// currently open for the same owner key. The engine closes popups on
    /// the next map interaction or movement.
    fn open_popup(&self, owner: &str, at: LngLat, html: &str);

    /// Close the owner's popup, if one is open. No-op when absent.
    fn close_popup(&self, owner: &str);

    /// Change the pointer affordance over the map canvas.
    fn set_cursor(&self, cursor: Cursor);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_key_is_unique_and_prefixed() {
        let a = alloc_key("measure-src");
        let b = alloc_key("measure-src");
        assert!(a.starts_with("measure-src-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_layer_spec_serialization() {
        let spec = LayerSpec {
            id: "measure-line-0".to_string(),
            source: "measure-src-0".to_string(),
            kind: LayerKind::Line(LineStyle {
                color: "#1976d2".to_string(),
                width: 3.0,
                rounded: true,
            }),
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["kind"]["type"], "line");
        assert_eq!(value["kind"]["color"], "#1976d2");
    }
}
