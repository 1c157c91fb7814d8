//! Wires a synthetic day of positions through the overlay components on a
//! mock map surface: stop detection, geofence-aware distance and a short
//! measurement session.
//!
//! Run with: `cargo run --example stop_overlay`

use std::rc::Rc;

use chrono::{Duration, TimeZone, Utc};
use geo::{Geometry, LineString, Polygon};

use track_overlay::format::format_km;
use track_overlay::surface::mock::MockSurface;
use track_overlay::{
    excluded_distance, segment_stops, LngLat, Marker, MarkerLayer, MarkerLayerOptions,
    MeasureControl, Position, StopConfig,
};

fn main() {
    env_logger::init();

    // A delivery van: parked at the depot, two legs of driving, a long
    // customer stop in between.
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let trace = vec![
        Position::new(59.3293, 18.0686, base),
        Position::new(59.3293, 18.0686, base + Duration::minutes(4)).with_distance(0.0),
        Position::new(59.3293, 18.0686, base + Duration::minutes(9)).with_distance(0.0),
        Position::new(59.3360, 18.0750, base + Duration::minutes(18)).with_distance(850.0),
        Position::new(59.3420, 18.0820, base + Duration::minutes(26)).with_distance(790.0),
        Position::new(59.3420, 18.0820, base + Duration::minutes(40)).with_distance(0.0),
        Position::new(59.3500, 18.0900, base + Duration::minutes(50)).with_distance(1020.0),
    ];

    // Stops
    let stops = segment_stops(&trace, &StopConfig::default());
    println!("detected {} stops:", stops.len());
    for stop in &stops {
        println!(
            "  {} -> {} ({})",
            stop.window.start_fix.format("%H:%M"),
            stop.window.end_fix.format("%H:%M"),
            track_overlay::format::format_duration(stop.window.duration_ms),
        );
    }

    // Daily distance, ignoring movement inside the depot fence
    let depot_fence = Geometry::Polygon(Polygon::new(
        LineString::from(vec![
            (18.06, 59.325),
            (18.06, 59.334),
            (18.075, 59.334),
            (18.075, 59.325),
        ]),
        vec![],
    ));
    let distance = excluded_distance(&trace, &[depot_fence]);
    println!("distance outside geofences: {}", format_km(distance));

    // Render the stops as markers with popups
    let surface = Rc::new(MockSurface::new());
    let layer = MarkerLayer::mount(
        surface.clone(),
        MarkerLayerOptions {
            enable_popup: true,
            ..MarkerLayerOptions::default()
        },
    )
    .expect("mount marker layer");
    let markers: Vec<Marker> = stops.into_iter().map(Marker::from).collect();
    layer.set_markers(&markers).expect("update markers");

    surface.click_feature(layer.layer_id(), 0);
    if let Some(html) = surface.popup_html(layer.layer_id()) {
        println!("first stop popup: {html}");
    }

    // A quick manual measurement
    let control = MeasureControl::new(surface.clone());
    control.on_toggle(|active| println!("measuring: {active}"));
    control.activate().expect("activate measure control");
    surface.click_map(LngLat { lng: 18.0686, lat: 59.3293 });
    surface.click_map(LngLat { lng: 18.0750, lat: 59.3360 });
    surface.click_map(LngLat { lng: 18.0820, lat: 59.3420 });
    control.deactivate();

    layer.unmount();
    println!(
        "surface clean: {} sources, {} layers, {} listeners",
        surface.source_count(),
        surface.layer_count(),
        surface.listener_count(),
    );
}
