//! Recording map surface for tests and development.
//!
//! `MockSurface` implements [`MapSurface`] over in-memory state, counts
//! every live resource, and can replay user events (clicks, double-clicks,
//! map movement) into registered listeners. Popup auto-close on map
//! interaction is emulated the way the real engine behaves.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{OverlayError, Result};

use super::{
    ClickEvent, ClickHandler, Cursor, FeatureCollection, LayerSpec, LngLat, ListenerId, MapSurface,
};

/// In-memory [`MapSurface`] double.
///
/// Single-threaded, like the UI loop it stands in for. Wrap it in an `Rc`
/// and hand clones to the components under test:
///
/// ```
/// use std::rc::Rc;
/// use track_overlay::surface::mock::MockSurface;
/// use track_overlay::{MarkerLayer, MarkerLayerOptions};
///
/// let surface = Rc::new(MockSurface::new());
/// let layer = MarkerLayer::mount(surface.clone(), MarkerLayerOptions::default()).unwrap();
/// assert_eq!(surface.source_count(), 1);
/// drop(layer);
/// assert_eq!(surface.source_count(), 0);
/// ```
pub struct MockSurface {
    state: RefCell<MockState>,
    next_listener: Cell<u64>,
}

#[derive(Default)]
struct MockState {
    sources: BTreeMap<String, FeatureCollection>,
    layers: Vec<LayerSpec>,
    listeners: Vec<MockListener>,
    popups: BTreeMap<String, (LngLat, String)>,
    cursor: Cursor,
}

struct MockListener {
    id: ListenerId,
    kind: ListenerKind,
    handler: Rc<dyn Fn(&ClickEvent)>,
}

enum ListenerKind {
    Layer(String),
    Click,
    DoubleClick,
}

impl MockSurface {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(MockState::default()),
            next_listener: Cell::new(0),
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn source_count(&self) -> usize {
        self.state.borrow().sources.len()
    }

    pub fn layer_count(&self) -> usize {
        self.state.borrow().layers.len()
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn popup_count(&self) -> usize {
        self.state.borrow().popups.len()
    }

    pub fn cursor(&self) -> Cursor {
        self.state.borrow().cursor
    }

    /// Current feature collection of a source.
    pub fn source_data(&self, id: &str) -> Option<FeatureCollection> {
        self.state.borrow().sources.get(id).cloned()
    }

    /// Specification of a registered layer.
    pub fn layer_spec(&self, id: &str) -> Option<LayerSpec> {
        self.state
            .borrow()
            .layers
            .iter()
            .find(|layer| layer.id == id)
            .cloned()
    }

    /// Content of the owner's open popup, if any.
    pub fn popup_html(&self, owner: &str) -> Option<String> {
        self.state
            .borrow()
            .popups
            .get(owner)
            .map(|(_, html)| html.clone())
    }

    // ========================================================================
    // Event replay
    // ========================================================================

    /// Deliver a click on the feature at `index` in the layer's source to
    /// that layer's scoped listeners.
    pub fn click_feature(&self, layer_id: &str, index: usize) {
        let feature = {
            let state = self.state.borrow();
            let Some(layer) = state.layers.iter().find(|l| l.id == layer_id) else {
                return;
            };
            state
                .sources
                .get(&layer.source)
                .and_then(|data| data.features.get(index))
                .cloned()
        };
        let Some(feature) = feature else { return };
        let Some(at) = feature.anchor() else { return };

        let event = ClickEvent {
            lng_lat: at,
            feature: Some(feature),
        };
        self.dispatch(
            |kind| matches!(kind, ListenerKind::Layer(layer) if layer == layer_id),
            &event,
        );
    }

    /// Deliver a raw map click. Open popups close first, as the engine
    /// closes them on any map interaction.
    pub fn click_map(&self, at: LngLat) {
        self.state.borrow_mut().popups.clear();
        let event = ClickEvent {
            lng_lat: at,
            feature: None,
        };
        self.dispatch(|kind| matches!(kind, ListenerKind::Click), &event);
    }

    /// Deliver a raw map double-click.
    pub fn double_click(&self, at: LngLat) {
        let event = ClickEvent {
            lng_lat: at,
            feature: None,
        };
        self.dispatch(|kind| matches!(kind, ListenerKind::DoubleClick), &event);
    }

    /// Simulate map movement, which closes any open popup.
    pub fn move_map(&self) {
        self.state.borrow_mut().popups.clear();
    }

    fn register(&self, kind: ListenerKind, handler: ClickHandler) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.state.borrow_mut().listeners.push(MockListener {
            id,
            kind,
            handler: Rc::from(handler),
        });
        id
    }

    // Handlers are cloned out before invocation so they may call back into
    // the surface (open a popup, remove their own registration).
    fn dispatch(&self, matches: impl Fn(&ListenerKind) -> bool, event: &ClickEvent) {
        let handlers: Vec<Rc<dyn Fn(&ClickEvent)>> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|listener| matches(&listener.kind))
            .map(|listener| Rc::clone(&listener.handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MapSurface for MockSurface {
    fn add_source(&self, id: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.sources.contains_key(id) {
            return Err(OverlayError::DuplicateSource(id.to_string()));
        }
        state.sources.insert(id.to_string(), FeatureCollection::empty());
        Ok(())
    }

    fn set_source_data(&self, id: &str, data: FeatureCollection) -> Result<()> {
        let mut state = self.state.borrow_mut();
        match state.sources.get_mut(id) {
            Some(existing) => {
                *existing = data;
                Ok(())
            }
            None => Err(OverlayError::UnknownSource(id.to_string())),
        }
    }

    fn remove_source(&self, id: &str) {
        self.state.borrow_mut().sources.remove(id);
    }

    fn add_layer(&self, spec: LayerSpec) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.layers.iter().any(|layer| layer.id == spec.id) {
            return Err(OverlayError::DuplicateLayer(spec.id));
        }
        if !state.sources.contains_key(&spec.source) {
            return Err(OverlayError::UnknownSource(spec.source));
        }
        state.layers.push(spec);
        Ok(())
    }

    fn remove_layer(&self, id: &str) {
        self.state.borrow_mut().layers.retain(|layer| layer.id != id);
    }

    fn on_layer_click(&self, layer: &str, handler: ClickHandler) -> ListenerId {
        self.register(ListenerKind::Layer(layer.to_string()), handler)
    }

    fn on_click(&self, handler: ClickHandler) -> ListenerId {
        self.register(ListenerKind::Click, handler)
    }

    fn on_double_click(&self, handler: ClickHandler) -> ListenerId {
        self.register(ListenerKind::DoubleClick, handler)
    }

    fn remove_listener(&self, id: ListenerId) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|listener| listener.id != id);
    }

    fn open_popup(&self, owner: &str, at: LngLat, html: &str) {
        self.state
            .borrow_mut()
            .popups
            .insert(owner.to_string(), (at, html.to_string()));
    }

    fn close_popup(&self, owner: &str) {
        self.state.borrow_mut().popups.remove(owner);
    }

    fn set_cursor(&self, cursor: Cursor) {
        self.state.borrow_mut().cursor = cursor;
    }
}
