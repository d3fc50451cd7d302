//! Constant-speed movement of simulated vehicles around closed routes.
//!
//! Motion is straight-line interpolation in coordinate-degree space: no acceleration and no road
//! snapping. Heading only changes when a vehicle reaches a waypoint.

use std::collections::{HashMap, VecDeque};

use bon::Builder;

use super::StateMachine;
use crate::position::{Coordinate, Timestamp, VehiclePosition, normalize_heading};
use crate::vehicle::VehicleId;

/// A vehicle has arrived once it is closer to its target than this many ticks of travel.
pub const ARRIVAL_FACTOR: f64 = 2.0;

/// Marker icons rest pointing north and rotate clockwise. `atan2(Δlat, Δlng)` measures
/// counter-clockwise from east, so the compass heading is this offset minus that angle.
pub const HEADING_OFFSET_DEG: f64 = 90.0;

/// Compass heading in degrees from `from` towards `to`, in `[0, 360)`.
pub fn bearing_deg(from: &Coordinate, to: &Coordinate) -> f64 {
    let angle = (to.lat - from.lat).atan2(to.lng - from.lng).to_degrees();
    normalize_heading(HEADING_OFFSET_DEG - angle)
}

/// A named closed loop of waypoints. The last waypoint connects back to the first.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: String,
    pub waypoints: Vec<Coordinate>,
}

impl Route {
    pub fn new(id: impl Into<String>, waypoints: impl IntoIterator<Item = [f64; 2]>) -> Self {
        Self {
            id: id.into(),
            waypoints: waypoints.into_iter().map(Coordinate::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Builder)]
pub struct SimulatedVehicle {
    #[builder(into)]
    pub vehicle_id: VehicleId,
    #[builder(into)]
    pub line_id: String,
    #[builder(into)]
    pub label: Option<String>,
    #[builder(into)]
    pub route_id: String,
    /// Index of the waypoint the vehicle is currently heading for.
    #[builder(default)]
    pub route_index: usize,
    /// Degrees of lat/lng travelled per tick.
    pub speed: f64,
    #[builder(into)]
    pub coordinate: Coordinate,
    #[builder(default)]
    pub heading: f64,
}

impl SimulatedVehicle {
    pub fn position(&self, now: Timestamp) -> VehiclePosition {
        VehiclePosition {
            vehicle_id: self.vehicle_id.clone(),
            line_id: self.line_id.clone(),
            label: self.label.clone(),
            coordinate: self.coordinate,
            heading: Some(self.heading),
            last_updated: now,
        }
    }

    /// Move one tick along `route`. Returns whether the vehicle arrived at a waypoint.
    ///
    /// An arriving vehicle turns toward the next waypoint but finishes this tick's step toward
    /// the one it just reached. Only a vehicle sitting exactly on its target moves toward the
    /// next waypoint straight away.
    fn step(&mut self, route: &Route) -> bool {
        let len = route.len();
        if len == 0 {
            return false;
        }
        self.route_index %= len;

        let mut target = route.waypoints[self.route_index];
        let mut distance = self.coordinate.planar_distance(&target);
        let arrived = distance == 0.0 || distance < self.speed * ARRIVAL_FACTOR;

        if arrived {
            self.route_index = (self.route_index + 1) % len;
            let mut next = route.waypoints[self.route_index];
            if distance == 0.0 {
                // skip waypoints sitting exactly on the vehicle, at most once around the loop
                for _ in 1..len {
                    if self.coordinate.planar_distance(&next) > 0.0 {
                        break;
                    }
                    self.route_index = (self.route_index + 1) % len;
                    next = route.waypoints[self.route_index];
                }
                target = next;
                distance = self.coordinate.planar_distance(&target);
                if distance == 0.0 {
                    return true;
                }
            }
            if self.coordinate.planar_distance(&next) > 0.0 {
                self.heading = bearing_deg(&self.coordinate, &next);
            }
        }

        self.coordinate.lat += (target.lat - self.coordinate.lat) * self.speed / distance;
        self.coordinate.lng += (target.lng - self.coordinate.lng) * self.speed / distance;
        arrived
    }
}

/// Advances a fixed set of simulated vehicles along their routes.
///
/// Vehicles are created once and never destroyed; every tick emits the updated position of each
/// vehicle that has a usable route.
#[derive(Debug, Default)]
pub struct RouteSimulator {
    routes: HashMap<String, Route, ahash::RandomState>,
    vehicles: Vec<SimulatedVehicle>,
    pending: VecDeque<SimulatorOutput>,
}

impl RouteSimulator {
    pub fn new(
        routes: impl IntoIterator<Item = Route>,
        vehicles: impl IntoIterator<Item = SimulatedVehicle>,
    ) -> Self {
        Self {
            routes: routes
                .into_iter()
                .map(|route| (route.id.clone(), route))
                .collect(),
            vehicles: vehicles.into_iter().collect(),
            pending: VecDeque::new(),
        }
    }

    pub fn vehicles(&self) -> &[SimulatedVehicle] {
        &self.vehicles
    }

    /// Current position of every vehicle, for the initial draw before the first tick.
    pub fn positions(&self, now: Timestamp) -> Vec<VehiclePosition> {
        self.vehicles
            .iter()
            .map(|vehicle| vehicle.position(now))
            .collect()
    }

    /// Advance every vehicle by one tick, queueing its new position.
    pub fn tick(&mut self, now: Timestamp) {
        for vehicle in &mut self.vehicles {
            let Some(route) = self.routes.get(&vehicle.route_id) else {
                continue;
            };
            if route.is_empty() {
                continue;
            }

            if vehicle.step(route) {
                tracing::trace!(
                    vehicle_id = %vehicle.vehicle_id,
                    route_index = vehicle.route_index,
                    heading = vehicle.heading,
                    "Reached waypoint"
                );
            }
            self.pending
                .push_back(SimulatorOutput::Moved(vehicle.position(now)));
        }
    }
}

pub enum SimulatorInput {
    Tick(Timestamp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulatorOutput {
    Moved(VehiclePosition),
}

impl StateMachine for RouteSimulator {
    type Input = SimulatorInput;
    type Output = SimulatorOutput;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            SimulatorInput::Tick(now) => self.tick(now),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;
    const T0: Timestamp = Timestamp::from_millis(0);

    fn l01_leg() -> Route {
        Route::new("L01", [[8.30, -62.75], [8.31, -62.76]])
    }

    fn bus(at: [f64; 2], speed: f64) -> SimulatedVehicle {
        SimulatedVehicle::builder()
            .vehicle_id("bus001")
            .line_id("L01")
            .route_id("L01")
            .speed(speed)
            .coordinate(at)
            .heading(45.0)
            .build()
    }

    #[test]
    fn test_bearing_convention() {
        let origin = Coordinate::new(0.0, 0.0);
        assert!((bearing_deg(&origin, &Coordinate::new(1.0, 0.0)) - 0.0).abs() < EPS);
        assert!((bearing_deg(&origin, &Coordinate::new(0.0, 1.0)) - 90.0).abs() < EPS);
        assert!((bearing_deg(&origin, &Coordinate::new(-1.0, 0.0)) - 180.0).abs() < EPS);
        assert!((bearing_deg(&origin, &Coordinate::new(0.0, -1.0)) - 270.0).abs() < EPS);
    }

    #[test]
    fn test_vehicle_on_waypoint_advances_without_dividing_by_zero() {
        let mut simulator = RouteSimulator::new([l01_leg()], [bus([8.30, -62.75], 0.0005)]);
        simulator.tick(T0);

        let vehicle = &simulator.vehicles()[0];
        assert_eq!(vehicle.route_index, 1);
        assert!(vehicle.coordinate.lat.is_finite());
        assert!(vehicle.coordinate.lng.is_finite());
    }

    #[test]
    fn test_one_tick_moves_toward_next_waypoint() {
        let start = Coordinate::new(8.30, -62.75);
        let target = Coordinate::new(8.31, -62.76);
        let mut simulator = RouteSimulator::new([l01_leg()], [bus([8.30, -62.75], 0.0005)]);

        simulator.tick(T0);
        let vehicle = simulator.vehicles()[0].clone();

        let travelled = start.planar_distance(&vehicle.coordinate);
        assert!((travelled - 0.0005).abs() < EPS);
        assert!(vehicle.coordinate.planar_distance(&target) < start.planar_distance(&target));
        // northwest
        assert!((vehicle.heading - 315.0).abs() < EPS);
    }

    #[test]
    fn test_arrival_inside_threshold_finishes_step_toward_reached_waypoint() {
        let mut simulator = RouteSimulator::new([l01_leg()], [bus([8.3003, -62.75], 0.0005)]);
        simulator.tick(T0);

        let vehicle = &simulator.vehicles()[0];
        assert_eq!(vehicle.route_index, 1);
        assert!((vehicle.coordinate.lat - 8.2998).abs() < EPS);
        assert!((vehicle.coordinate.lng - -62.75).abs() < EPS);
        let expected = bearing_deg(
            &Coordinate::new(8.3003, -62.75),
            &Coordinate::new(8.31, -62.76),
        );
        assert!((vehicle.heading - expected).abs() < EPS);
    }

    #[test]
    fn test_heading_unchanged_mid_leg() {
        let mut simulator = RouteSimulator::new([l01_leg()], [bus([8.30, -62.75], 0.0005)]);
        simulator.tick(T0);
        let heading = simulator.vehicles()[0].heading;

        for _ in 0..5 {
            simulator.tick(T0);
            assert_eq!(simulator.vehicles()[0].heading, heading);
            assert_eq!(simulator.vehicles()[0].route_index, 1);
        }
    }

    #[test]
    fn test_route_index_loops_after_route_length_arrivals() {
        let route = Route::new(
            "L03",
            [[8.25, -62.72], [8.26, -62.73], [8.27, -62.72], [8.26, -62.71]],
        );
        let mut vehicle = SimulatedVehicle::builder()
            .vehicle_id("bus003")
            .line_id("L03")
            .route_id("L03")
            .speed(0.0006)
            .coordinate([8.25, -62.72])
            .build();

        let start_index = vehicle.route_index;
        let mut arrivals = 0;
        let mut ticks = 0;
        while arrivals < route.len() {
            if vehicle.step(&route) {
                arrivals += 1;
            }
            ticks += 1;
            assert!(ticks < 10_000, "vehicle never completed the loop");
        }
        assert_eq!(vehicle.route_index, start_index);
    }

    #[test]
    fn test_zero_speed_on_waypoint_is_finite() {
        let mut simulator = RouteSimulator::new([l01_leg()], [bus([8.30, -62.75], 0.0)]);
        simulator.tick(T0);

        let vehicle = &simulator.vehicles()[0];
        assert_eq!(vehicle.route_index, 1);
        assert_eq!(vehicle.coordinate, Coordinate::new(8.30, -62.75));
    }

    #[test]
    fn test_coincident_waypoints_park_vehicle() {
        let route = Route::new("X", [[8.0, -62.0], [8.0, -62.0]]);
        let mut simulator = RouteSimulator::new(
            [route],
            [SimulatedVehicle::builder()
                .vehicle_id("parked")
                .line_id("X")
                .route_id("X")
                .speed(0.001)
                .coordinate([8.0, -62.0])
                .heading(90.0)
                .build()],
        );

        simulator.tick(T0);
        let vehicle = &simulator.vehicles()[0];
        assert_eq!(vehicle.coordinate, Coordinate::new(8.0, -62.0));
        assert_eq!(vehicle.heading, 90.0);
    }

    #[test]
    fn test_unknown_route_is_skipped() {
        let mut vehicle = bus([8.30, -62.75], 0.0005);
        vehicle.route_id = "nowhere".to_string();
        let mut simulator = RouteSimulator::new([l01_leg()], [vehicle]);

        simulator.process_input(SimulatorInput::Tick(T0));
        assert!(simulator.poll_output().is_none());
    }

    #[test]
    fn test_tick_emits_stamped_positions() {
        let mut simulator = RouteSimulator::new([l01_leg()], [bus([8.30, -62.75], 0.0005)]);
        let now = Timestamp::from_millis(1_700_000_000_000);

        simulator.process_input(SimulatorInput::Tick(now));
        let Some(SimulatorOutput::Moved(position)) = simulator.poll_output() else {
            panic!("expected a moved position");
        };
        assert_eq!(position.last_updated, now);
        assert_eq!(position.vehicle_id, VehicleId::from("bus001"));
        assert!(position.heading.is_some());
        assert!(simulator.poll_output().is_none());
    }
}
