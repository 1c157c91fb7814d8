//! Lifecycle management for a point-marker rendering layer.
//!
//! A [`MarkerLayer`] owns one data source, one symbol layer and (when
//! popups are enabled) one click listener on the injected map surface.
//! Each update replaces the rendered marker set wholesale; teardown
//! releases everything in reverse acquisition order and is idempotent.

use std::cell::Cell;
use std::rc::Rc;

use log::debug;
use serde_json::json;

use crate::error::Result;
use crate::format::{format_duration, format_fix_time};
use crate::surface::{
    alloc_key, Feature, FeatureCollection, LayerKind, LayerSpec, ListenerId, MapSurface,
    SymbolStyle, TextStyle,
};
use crate::Marker;

/// Display options fixed at mount time. Switching them requires a remount.
#[derive(Debug, Clone)]
pub struct MarkerLayerOptions {
    /// Render title labels below the icons.
    pub show_titles: bool,
    /// Open a popup when a rendered feature is clicked.
    pub enable_popup: bool,
    /// Scale factor applied to marker icons. Default: 1.0.
    pub icon_scale: f64,
    /// Icon substituted for markers without an `image`.
    pub default_image: String,
}

impl Default for MarkerLayerOptions {
    fn default() -> Self {
        Self {
            show_titles: false,
            enable_popup: false,
            icon_scale: 1.0,
            default_image: "default-neutral".to_string(),
        }
    }
}

/// A mounted marker layer.
///
/// Resources are acquired on [`mount`](MarkerLayer::mount) and released on
/// [`unmount`](MarkerLayer::unmount) or drop, whichever comes first.
pub struct MarkerLayer {
    surface: Rc<dyn MapSurface>,
    source_id: String,
    layer_id: String,
    listener: Cell<Option<ListenerId>>,
    options: MarkerLayerOptions,
    mounted: Cell<bool>,
}

impl MarkerLayer {
    /// Allocate the layer's source, symbol layer and popup listener.
    ///
    /// A partial failure releases whatever was already acquired before the
    /// error is returned.
    pub fn mount(surface: Rc<dyn MapSurface>, options: MarkerLayerOptions) -> Result<Self> {
        let source_id = alloc_key("markers-src");
        let layer_id = alloc_key("markers");

        surface.add_source(&source_id)?;

        let kind = LayerKind::Symbol(SymbolStyle {
            icon_scale: options.icon_scale,
            titles: options.show_titles.then(TextStyle::default),
        });
        let spec = LayerSpec {
            id: layer_id.clone(),
            source: source_id.clone(),
            kind,
        };
        if let Err(err) = surface.add_layer(spec) {
            surface.remove_source(&source_id);
            return Err(err);
        }

        let listener = if options.enable_popup {
            let popup_surface = Rc::clone(&surface);
            let owner = layer_id.clone();
            Some(surface.on_layer_click(
                &layer_id,
                Box::new(move |event| {
                    let Some(feature) = &event.feature else { return };
                    let Some(html) = popup_content(feature) else { return };
                    popup_surface.open_popup(&owner, event.lng_lat, &html);
                }),
            ))
        } else {
            None
        };

        debug!("mounted marker layer '{layer_id}' on source '{source_id}'");
        Ok(Self {
            surface,
            source_id,
            layer_id,
            listener: Cell::new(listener),
            options,
            mounted: Cell::new(true),
        })
    }

    /// Replace the rendered marker set with the given list.
    pub fn set_markers(&self, markers: &[Marker]) -> Result<()> {
        let features = markers
            .iter()
            .map(|marker| self.to_feature(marker))
            .collect();
        self.surface
            .set_source_data(&self.source_id, FeatureCollection::new(features))
    }

    /// Release the popup, listener, layer and source, in reverse
    /// acquisition order. Safe to call more than once.
    pub fn unmount(&self) {
        if !self.mounted.replace(false) {
            return;
        }
        self.surface.close_popup(&self.layer_id);
        if let Some(id) = self.listener.take() {
            self.surface.remove_listener(id);
        }
        self.surface.remove_layer(&self.layer_id);
        self.surface.remove_source(&self.source_id);
        debug!("unmounted marker layer '{}'", self.layer_id);
    }

    /// The layer's resource key, which also owns its popup.
    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    fn to_feature(&self, marker: &Marker) -> Feature {
        let mut feature = Feature::point(crate::LngLat {
            lng: marker.longitude,
            lat: marker.latitude,
        })
        .with_property(
            "image",
            marker
                .image
                .clone()
                .unwrap_or_else(|| self.options.default_image.clone()),
        )
        .with_property("title", marker.title.clone().unwrap_or_default())
        .with_property("popupHtml", marker.popup_html.clone().unwrap_or_default());

        if let Some(window) = &marker.stop {
            feature = feature
                .with_property("startFix", format_fix_time(window.start_fix))
                .with_property("endFix", format_fix_time(window.end_fix))
                .with_property("durationMs", json!(window.duration_ms));
        }
        feature
    }
}

impl Drop for MarkerLayer {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Resolve popup content for a clicked feature.
///
/// Explicit `popupHtml` wins; otherwise a stop window synthesizes a
/// two-line block; a feature with neither yields no popup at all.
fn popup_content(feature: &Feature) -> Option<String> {
    if let Some(html) = feature.property_str("popupHtml") {
        if !html.is_empty() {
            return Some(html.to_string());
        }
    }

    let start = feature.property_str("startFix")?;
    let end = feature.property_str("endFix")?;
    let duration_ms = feature.property_i64("durationMs")?;
    Some(format!(
        "<div>{} — {}</div><div>{}</div>",
        start,
        end,
        format_duration(duration_ms)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::mock::MockSurface;
    use crate::StopWindow;
    use chrono::{Duration, TimeZone, Utc};

    fn marker(lat: f64, lng: f64) -> Marker {
        Marker {
            latitude: lat,
            longitude: lng,
            ..Marker::default()
        }
    }

    fn mounted(options: MarkerLayerOptions) -> (Rc<MockSurface>, MarkerLayer) {
        let surface = Rc::new(MockSurface::new());
        let layer = MarkerLayer::mount(surface.clone(), options).unwrap();
        (surface, layer)
    }

    #[test]
    fn test_mount_allocates_source_and_layer() {
        let (surface, layer) = mounted(MarkerLayerOptions::default());
        assert_eq!(surface.source_count(), 1);
        assert_eq!(surface.layer_count(), 1);
        assert_eq!(surface.listener_count(), 0);

        let spec = surface.layer_spec(layer.layer_id()).unwrap();
        assert!(matches!(
            spec.kind,
            LayerKind::Symbol(SymbolStyle { titles: None, .. })
        ));
    }

    #[test]
    fn test_titles_mode_selected_at_mount() {
        let (surface, layer) = mounted(MarkerLayerOptions {
            show_titles: true,
            ..MarkerLayerOptions::default()
        });
        let spec = surface.layer_spec(layer.layer_id()).unwrap();
        assert!(matches!(
            spec.kind,
            LayerKind::Symbol(SymbolStyle { titles: Some(_), .. })
        ));
    }

    #[test]
    fn test_set_markers_replaces_wholesale() {
        let (surface, layer) = mounted(MarkerLayerOptions::default());

        layer
            .set_markers(&[marker(59.0, 18.0), marker(59.1, 18.1)])
            .unwrap();
        assert_eq!(surface.source_data(&layer.source_id).unwrap().len(), 2);

        layer.set_markers(&[marker(60.0, 19.0)]).unwrap();
        let data = surface.source_data(&layer.source_id).unwrap();
        assert_eq!(data.len(), 1);

        layer.set_markers(&[]).unwrap();
        assert!(surface.source_data(&layer.source_id).unwrap().is_empty());
    }

    #[test]
    fn test_default_image_substituted() {
        let (surface, layer) = mounted(MarkerLayerOptions::default());
        layer
            .set_markers(&[
                Marker {
                    image: Some("depot".to_string()),
                    ..marker(59.0, 18.0)
                },
                marker(59.1, 18.1),
            ])
            .unwrap();

        let data = surface.source_data(&layer.source_id).unwrap();
        assert_eq!(data.features[0].property_str("image"), Some("depot"));
        assert_eq!(
            data.features[1].property_str("image"),
            Some("default-neutral")
        );
    }

    #[test]
    fn test_unmount_releases_everything() {
        let (surface, layer) = mounted(MarkerLayerOptions {
            enable_popup: true,
            ..MarkerLayerOptions::default()
        });
        assert_eq!(surface.listener_count(), 1);

        layer.unmount();
        assert_eq!(surface.source_count(), 0);
        assert_eq!(surface.layer_count(), 0);
        assert_eq!(surface.listener_count(), 0);

        // Idempotent
        layer.unmount();
        assert_eq!(surface.source_count(), 0);
    }

    #[test]
    fn test_drop_tears_down() {
        let surface = Rc::new(MockSurface::new());
        {
            let layer =
                MarkerLayer::mount(surface.clone(), MarkerLayerOptions::default()).unwrap();
            layer.set_markers(&[marker(59.0, 18.0)]).unwrap();
        }
        assert_eq!(surface.source_count(), 0);
        assert_eq!(surface.layer_count(), 0);
    }

    #[test]
    fn test_popup_from_explicit_html() {
        let (surface, layer) = mounted(MarkerLayerOptions {
            enable_popup: true,
            ..MarkerLayerOptions::default()
        });
        layer
            .set_markers(&[Marker {
                popup_html: Some("<b>Depot</b>".to_string()),
                ..marker(59.0, 18.0)
            }])
            .unwrap();

        surface.click_feature(layer.layer_id(), 0);
        assert_eq!(
            surface.popup_html(layer.layer_id()).as_deref(),
            Some("<b>Depot</b>")
        );
    }

    #[test]
    fn test_popup_synthesized_from_stop_window() {
        let (surface, layer) = mounted(MarkerLayerOptions {
            enable_popup: true,
            ..MarkerLayerOptions::default()
        });
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        layer
            .set_markers(&[Marker {
                stop: Some(StopWindow::new(start, start + Duration::minutes(90))),
                ..marker(59.0, 18.0)
            }])
            .unwrap();

        surface.click_feature(layer.layer_id(), 0);
        let html = surface.popup_html(layer.layer_id()).unwrap();
        assert!(html.contains("2024-05-01 08:00"));
        assert!(html.contains("2024-05-01 09:30"));
        assert!(html.contains("1h 30m"));
    }

    #[test]
    fn test_click_without_content_is_a_no_op() {
        let (surface, layer) = mounted(MarkerLayerOptions {
            enable_popup: true,
            ..MarkerLayerOptions::default()
        });
        layer.set_markers(&[marker(59.0, 18.0)]).unwrap();

        surface.click_feature(layer.layer_id(), 0);
        assert_eq!(surface.popup_count(), 0);
    }

    #[test]
    fn test_popups_disabled_registers_no_listener() {
        let (surface, layer) = mounted(MarkerLayerOptions::default());
        layer
            .set_markers(&[Marker {
                popup_html: Some("<b>hi</b>".to_string()),
                ..marker(59.0, 18.0)
            }])
            .unwrap();

        surface.click_feature(layer.layer_id(), 0);
        assert_eq!(surface.popup_count(), 0);
    }
}
