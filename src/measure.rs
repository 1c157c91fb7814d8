//! Interactive distance measuring control.
//!
//! A toggleable control that collects map clicks into a polyline and
//! renders it with per-segment distance labels plus a cumulative total.
//! The control owns a line source/layer pair and a label source/layer
//! pair while active; double-click or an explicit deactivate tears both
//! down and clears the session.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};

use crate::format::format_km;
use crate::geo_utils::{haversine_distance, segment_midpoint};
use crate::surface::{
    alloc_key, Cursor, Feature, FeatureCollection, LayerKind, LayerSpec, LineStyle, LngLat,
    ListenerId, MapSurface, TextStyle,
};
use crate::Result;

/// Styling for the measuring line and its labels.
#[derive(Debug, Clone)]
pub struct MeasureStyle {
    pub line_color: String,
    pub line_width: f64,
    pub label: TextStyle,
}

impl Default for MeasureStyle {
    fn default() -> Self {
        Self {
            line_color: "#1976d2".to_string(),
            line_width: 3.0,
            label: TextStyle::default(),
        }
    }
}

/// One measurement session: alive between activate and deactivate.
#[derive(Default)]
struct Session {
    active: bool,
    points: Vec<LngLat>,
    click: Option<ListenerId>,
    double_click: Option<ListenerId>,
}

/// A manual point-and-click distance measuring control.
///
/// ```
/// use std::rc::Rc;
/// use track_overlay::surface::mock::MockSurface;
/// use track_overlay::{LngLat, MeasureControl};
///
/// let surface = Rc::new(MockSurface::new());
/// let control = MeasureControl::new(surface.clone());
///
/// control.activate().unwrap();
/// surface.click_map(LngLat { lng: 0.0, lat: 0.0 });
/// surface.click_map(LngLat { lng: 0.0, lat: 0.009 });
/// assert_eq!(control.point_count(), 2);
///
/// control.deactivate();
/// assert_eq!(surface.layer_count(), 0);
/// ```
pub struct MeasureControl {
    inner: Rc<MeasureInner>,
}

struct MeasureInner {
    surface: Rc<dyn MapSurface>,
    style: MeasureStyle,
    line_source: String,
    line_layer: String,
    label_source: String,
    label_layer: String,
    session: RefCell<Session>,
    on_toggle: RefCell<Option<Box<dyn Fn(bool)>>>,
}

impl MeasureControl {
    /// Create an inactive control bound to the given surface.
    pub fn new(surface: Rc<dyn MapSurface>) -> Self {
        Self::with_style(surface, MeasureStyle::default())
    }

    /// Create an inactive control with custom styling.
    pub fn with_style(surface: Rc<dyn MapSurface>, style: MeasureStyle) -> Self {
        Self {
            inner: Rc::new(MeasureInner {
                surface,
                style,
                line_source: alloc_key("measure-src"),
                line_layer: alloc_key("measure-line"),
                label_source: alloc_key("measure-label-src"),
                label_layer: alloc_key("measure-label"),
                session: RefCell::new(Session::default()),
                on_toggle: RefCell::new(None),
            }),
        }
    }

    /// Register a callback invoked with the new state on every
    /// activate/deactivate transition, including double-click finishes.
    pub fn on_toggle(&self, callback: impl Fn(bool) + 'static) {
        *self.inner.on_toggle.borrow_mut() = Some(Box::new(callback));
    }

    /// Flip between collecting and inactive.
    pub fn toggle(&self) -> Result<()> {
        if self.is_active() {
            self.deactivate();
            Ok(())
        } else {
            self.activate()
        }
    }

    /// Start a fresh measurement session. No-op when already active.
    pub fn activate(&self) -> Result<()> {
        if self.is_active() {
            return Ok(());
        }
        self.inner.clone().activate()?;
        self.inner.notify(true);
        Ok(())
    }

    /// End the session, releasing all rendered resources and clearing the
    /// collected points. No-op when inactive.
    pub fn deactivate(&self) {
        if self.inner.deactivate() {
            self.inner.notify(false);
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.session.borrow().active
    }

    /// Number of points collected in the current session.
    pub fn point_count(&self) -> usize {
        self.inner.session.borrow().points.len()
    }
}

impl Drop for MeasureControl {
    fn drop(&mut self) {
        // Release map resources; no notification for a control that is
        // going away with its host.
        self.inner.deactivate();
    }
}

impl MeasureInner {
    fn activate(self: Rc<Self>) -> Result<()> {
        if let Err(err) = self.mount_render() {
            self.release_render();
            return Err(err);
        }
        self.surface.set_cursor(Cursor::Crosshair);

        let click_target = Rc::clone(&self);
        let click = self
            .surface
            .on_click(Box::new(move |event| click_target.handle_click(event.lng_lat)));

        let finish_target = Rc::clone(&self);
        let double_click = self
            .surface
            .on_double_click(Box::new(move |_| finish_target.finish()));

        let mut session = self.session.borrow_mut();
        session.active = true;
        session.points.clear();
        session.click = Some(click);
        session.double_click = Some(double_click);

        debug!("measurement session started on '{}'", self.line_layer);
        Ok(())
    }

    fn mount_render(&self) -> Result<()> {
        self.surface.add_source(&self.line_source)?;
        self.surface.add_layer(LayerSpec {
            id: self.line_layer.clone(),
            source: self.line_source.clone(),
            kind: LayerKind::Line(LineStyle {
                color: self.style.line_color.clone(),
                width: self.style.line_width,
                rounded: true,
            }),
        })?;
        self.surface.add_source(&self.label_source)?;
        self.surface.add_layer(LayerSpec {
            id: self.label_layer.clone(),
            source: self.label_source.clone(),
            kind: LayerKind::Text(self.style.label.clone()),
        })?;
        Ok(())
    }

    // Removal is idempotent, so this doubles as the rollback path for a
    // partially failed mount.
    fn release_render(&self) {
        self.surface.remove_layer(&self.label_layer);
        self.surface.remove_source(&self.label_source);
        self.surface.remove_layer(&self.line_layer);
        self.surface.remove_source(&self.line_source);
        self.surface.set_cursor(Cursor::Default);
    }

    fn handle_click(&self, at: LngLat) {
        {
            let mut session = self.session.borrow_mut();
            if !session.active {
                return;
            }
            session.points.push(at);
        }
        self.redraw();
    }

    /// Double-click ends the session without appending a point.
    fn finish(&self) {
        if self.deactivate() {
            self.notify(false);
        }
    }

    fn deactivate(&self) -> bool {
        let (click, double_click) = {
            let mut session = self.session.borrow_mut();
            if !session.active {
                return false;
            }
            session.active = false;
            session.points.clear();
            (session.click.take(), session.double_click.take())
        };

        if let Some(id) = click {
            self.surface.remove_listener(id);
        }
        if let Some(id) = double_click {
            self.surface.remove_listener(id);
        }
        self.release_render();

        debug!("measurement session ended on '{}'", self.line_layer);
        true
    }

    fn redraw(&self) {
        let points = self.session.borrow().points.clone();

        let line = if points.len() >= 2 {
            FeatureCollection::new(vec![Feature::line(&points)])
        } else {
            FeatureCollection::empty()
        };

        let mut labels = Vec::new();
        let mut total = 0.0;
        for pair in points.windows(2) {
            let meters = haversine_distance(pair[0], pair[1]);
            total += meters;
            labels.push(
                Feature::point(segment_midpoint(pair[0], pair[1]))
                    .with_property("label", format_km(meters)),
            );
        }
        if let Some(last) = points.last() {
            if points.len() >= 2 {
                labels.push(
                    Feature::point(*last).with_property("label", format!("Σ {}", format_km(total))),
                );
            }
        }

        if let Err(err) = self.surface.set_source_data(&self.line_source, line) {
            warn!("measurement line update failed: {err}");
        }
        if let Err(err) = self
            .surface
            .set_source_data(&self.label_source, FeatureCollection::new(labels))
        {
            warn!("measurement label update failed: {err}");
        }
    }

    fn notify(&self, active: bool) {
        if let Some(callback) = self.on_toggle.borrow().as_ref() {
            callback(active);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::mock::MockSurface;
    use std::cell::RefCell;

    fn at(lng: f64, lat: f64) -> LngLat {
        LngLat { lng, lat }
    }

    fn setup() -> (Rc<MockSurface>, MeasureControl) {
        let surface = Rc::new(MockSurface::new());
        let control = MeasureControl::new(surface.clone());
        (surface, control)
    }

    fn labels(surface: &MockSurface, control: &MeasureControl) -> Vec<String> {
        surface
            .source_data(&control.inner.label_source)
            .unwrap()
            .features
            .iter()
            .filter_map(|f| f.property_str("label").map(str::to_string))
            .collect()
    }

    #[test]
    fn test_activate_allocates_resources() {
        let (surface, control) = setup();
        control.activate().unwrap();

        assert!(control.is_active());
        assert_eq!(surface.source_count(), 2);
        assert_eq!(surface.layer_count(), 2);
        assert_eq!(surface.listener_count(), 2);
        assert_eq!(surface.cursor(), Cursor::Crosshair);
    }

    #[test]
    fn test_activate_twice_is_a_no_op() {
        let (surface, control) = setup();
        control.activate().unwrap();
        control.activate().unwrap();
        assert_eq!(surface.source_count(), 2);
        assert_eq!(surface.listener_count(), 2);
    }

    #[test]
    fn test_single_point_renders_nothing() {
        let (surface, control) = setup();
        control.activate().unwrap();
        surface.click_map(at(0.0, 0.0));

        assert_eq!(control.point_count(), 1);
        assert!(surface
            .source_data(&control.inner.line_source)
            .unwrap()
            .is_empty());
        assert!(labels(&surface, &control).is_empty());
    }

    #[test]
    fn test_segment_and_total_labels() {
        let (surface, control) = setup();
        control.activate().unwrap();

        // Two clicks ~1km apart, then ~1km further north
        surface.click_map(at(0.0, 0.0));
        surface.click_map(at(0.0, 0.009));
        surface.click_map(at(0.0, 0.018));

        let line = surface.source_data(&control.inner.line_source).unwrap();
        assert_eq!(line.len(), 1);

        let rendered = labels(&surface, &control);
        assert_eq!(
            rendered,
            vec!["1.00 km", "1.00 km", "Σ 2.00 km"]
        );
    }

    #[test]
    fn test_total_label_anchored_at_last_point() {
        let (surface, control) = setup();
        control.activate().unwrap();
        surface.click_map(at(0.0, 0.0));
        surface.click_map(at(0.0, 0.009));

        let data = surface.source_data(&control.inner.label_source).unwrap();
        let total = data.features.last().unwrap();
        assert_eq!(total.anchor(), Some(at(0.0, 0.009)));
        assert!(total.property_str("label").unwrap().starts_with("Σ "));
    }

    #[test]
    fn test_deactivate_releases_everything() {
        let (surface, control) = setup();
        control.activate().unwrap();
        surface.click_map(at(0.0, 0.0));
        surface.click_map(at(0.0, 0.009));

        control.deactivate();
        assert!(!control.is_active());
        assert_eq!(control.point_count(), 0);
        assert_eq!(surface.source_count(), 0);
        assert_eq!(surface.layer_count(), 0);
        assert_eq!(surface.listener_count(), 0);
        assert_eq!(surface.cursor(), Cursor::Default);
    }

    #[test]
    fn test_double_click_finishes_session() {
        let (surface, control) = setup();
        control.activate().unwrap();
        surface.click_map(at(0.0, 0.0));
        surface.double_click(at(0.0, 0.0));

        assert!(!control.is_active());
        assert_eq!(surface.source_count(), 0);
        assert_eq!(surface.listener_count(), 0);
    }

    #[test]
    fn test_reactivation_starts_fresh() {
        let (surface, control) = setup();
        control.activate().unwrap();
        surface.click_map(at(0.0, 0.0));
        surface.click_map(at(0.0, 0.009));
        control.deactivate();

        control.activate().unwrap();
        assert_eq!(control.point_count(), 0);
        assert!(surface
            .source_data(&control.inner.line_source)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_clicks_after_deactivation_are_ignored() {
        let (surface, control) = setup();
        control.activate().unwrap();
        control.deactivate();

        surface.click_map(at(0.0, 0.0));
        assert_eq!(control.point_count(), 0);
    }

    #[test]
    fn test_toggle_callback_sees_transitions() {
        let (surface, control) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        control.on_toggle(move |active| sink.borrow_mut().push(active));

        control.toggle().unwrap();
        control.toggle().unwrap();
        control.activate().unwrap();
        surface.double_click(at(0.0, 0.0));

        assert_eq!(*seen.borrow(), vec![true, false, true, false]);
    }

    #[test]
    fn test_drop_releases_resources() {
        let surface = Rc::new(MockSurface::new());
        {
            let control = MeasureControl::new(surface.clone());
            control.activate().unwrap();
            surface.click_map(at(0.0, 0.0));
        }
        assert_eq!(surface.source_count(), 0);
        assert_eq!(surface.layer_count(), 0);
        assert_eq!(surface.listener_count(), 0);
    }
}
