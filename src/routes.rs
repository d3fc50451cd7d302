//! Demo routes and fleet around Guayana City, and the route planning placeholder.

use crate::position::Coordinate;
use crate::state_machine::simulator::{Route, SimulatedVehicle};

/// Initial map view: Guayana City at zoom 13.
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(8.2863, -62.7303);
pub const DEFAULT_ZOOM: u8 = 13;

pub fn demo_routes() -> Vec<Route> {
    vec![
        Route::new(
            "L01",
            [
                [8.30, -62.75],
                [8.31, -62.76],
                [8.32, -62.77],
                [8.33, -62.76],
                [8.32, -62.75],
            ],
        ),
        Route::new(
            "L02",
            [
                [8.28, -62.70],
                [8.27, -62.69],
                [8.26, -62.70],
                [8.27, -62.71],
                [8.28, -62.70],
            ],
        ),
        Route::new(
            "L03",
            [
                [8.25, -62.72],
                [8.26, -62.73],
                [8.27, -62.72],
                [8.26, -62.71],
                [8.25, -62.72],
            ],
        ),
    ]
}

pub fn demo_fleet() -> Vec<SimulatedVehicle> {
    [
        ("bus001", "L01", "001", [8.30, -62.75], 45.0, 0.0005),
        ("bus002", "L02", "002", [8.28, -62.70], 180.0, 0.0004),
        ("bus003", "L03", "003", [8.25, -62.72], 90.0, 0.0006),
    ]
    .into_iter()
    .map(|(id, line, label, at, heading, speed)| {
        SimulatedVehicle::builder()
            .vehicle_id(id)
            .line_id(line)
            .label(label)
            .route_id(line)
            .coordinate(at)
            .heading(heading)
            .speed(speed)
            .build()
    })
    .collect()
}

/// Placeholder for trip planning; always suggests the same transfer.
pub fn plan_route(origin: &str, destination: &str) -> String {
    let (origin, destination) = (origin.trim(), destination.trim());
    if origin.is_empty() || destination.is_empty() {
        return "Please enter an origin and a destination.".to_string();
    }
    format!("Simulating route from \"{origin}\" to \"{destination}\". Take L01, then L03.")
}
