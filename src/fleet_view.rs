use std::time::Instant;

use tracing::{debug, info, warn};

use crate::event::{ConnectionStatus, FleetEvent, FleetUpdate};
use crate::position::{PositionReport, Timestamp, VehiclePosition};
use crate::state_machine::StateMachine;
use crate::state_machine::fleet::{FleetStore, RejectedReport};
use crate::state_machine::reconciler::MarkerReconciler;
use crate::state_machine::wrappers::input::system::SystemResource;
use crate::surface::MapSurface;
use crate::vehicle::{LineFilter, VehicleId};

/// Status shown by the public map once the simulated fleet is moving.
pub const SIMULATION_STATUS: &str = "Simulated buses in motion.";

/// One viewer's picture of the fleet: the store, the reconciler, the selected line and the map
/// surface the markers are drawn on.
///
/// All mutation goes through [`handle`](FleetView::handle). Each event fully updates the store
/// before the reconciler reads it, and the resulting marker commands are flushed to the surface
/// before the call returns.
pub struct FleetView<S> {
    store: FleetStore,
    reconciler: MarkerReconciler,
    filter: LineFilter,
    surface: S,
    status: String,
    awaiting_snapshot: bool,
}

impl<S: std::fmt::Debug> std::fmt::Debug for FleetView<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetView")
            .field("vehicles", &self.store.len())
            .field("markers", &self.reconciler.marker_count())
            .field("filter", &self.filter)
            .field("surface", &self.surface)
            .field("status", &self.status)
            .finish()
    }
}

impl<S: MapSurface> FleetView<S> {
    pub fn new(surface: S, filter: LineFilter) -> Self {
        Self {
            store: FleetStore::new(),
            reconciler: MarkerReconciler::new(),
            filter,
            surface,
            status: String::new(),
            awaiting_snapshot: true,
        }
    }

    /// Apply one event, stamping it with the current wall-clock time.
    pub fn handle(&mut self, event: FleetEvent) {
        let (now, started): (Timestamp, Instant) = SystemResource::generate();
        self.handle_at(event, now);
        debug!(elapsed_us = started.elapsed().as_micros(), "Fleet event applied");
    }

    /// Apply one event as if it arrived at `now`.
    pub fn handle_at(&mut self, event: FleetEvent, now: Timestamp) {
        match event {
            FleetEvent::Update(FleetUpdate::PositionUpdate(report)) => {
                self.apply_position(report, now);
            }
            FleetEvent::Update(FleetUpdate::VehicleRemoved(vehicle_id)) => {
                self.remove_vehicle(&vehicle_id);
            }
            FleetEvent::Update(FleetUpdate::FullSnapshot(reports)) => {
                self.apply_snapshot(reports, now);
            }
            FleetEvent::FilterChanged(filter) => self.change_filter(filter),
            FleetEvent::Connection(status) => self.set_connection(status),
        }

        self.flush();
    }

    fn apply_position(&mut self, report: PositionReport, now: Timestamp) {
        match self.store.upsert(report, now) {
            Ok(position) => self.reconciler.reconcile(&position, &self.filter),
            Err(RejectedReport::Invalid(e)) => {
                warn!(error = %e, "Dropping invalid position");
            }
            Err(RejectedReport::Stale(e)) => {
                debug!(error = %e, "Dropping out-of-order position");
            }
        }
    }

    fn remove_vehicle(&mut self, vehicle_id: &VehicleId) {
        self.store.remove(vehicle_id);
        self.reconciler.remove_vehicle(vehicle_id);
        info!(vehicle_id = %vehicle_id, "Vehicle removed");
    }

    fn apply_snapshot(&mut self, reports: Vec<PositionReport>, now: Timestamp) {
        if !self.awaiting_snapshot {
            debug!(vehicles = reports.len(), "Ignoring snapshot, already synced");
            return;
        }

        self.store.clear();
        for report in reports {
            if let Err(e) = self.store.upsert(report, now) {
                warn!(error = %e, "Dropping snapshot entry");
            }
        }

        let store = &self.store;
        self.reconciler.prune(|vehicle_id| store.contains(vehicle_id));
        self.reconciler.reconcile_all(&store.get_all(), &self.filter);
        self.awaiting_snapshot = false;

        info!(vehicles = self.store.len(), "Applied fleet snapshot");
    }

    fn change_filter(&mut self, filter: LineFilter) {
        self.filter = filter;
        self.reconciler
            .reconcile_all(&self.store.get_all(), &self.filter);
        self.status = format!("Showing line: {}", self.filter);
        info!(filter = %self.filter, "Line filter changed");
    }

    fn set_connection(&mut self, status: ConnectionStatus) {
        if status == ConnectionStatus::Connected {
            self.awaiting_snapshot = true;
        }
        self.status = status.to_string();
        info!(status = %self.status, "Connection status changed");
    }

    fn flush(&mut self) {
        while let Some(command) = self.reconciler.poll_output() {
            self.surface.apply(command);
        }
    }

    pub fn store(&self) -> &FleetStore {
        &self.store
    }

    pub fn reconciler(&self) -> &MarkerReconciler {
        &self.reconciler
    }

    pub fn filter(&self) -> &LineFilter {
        &self.filter
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// User-facing status line.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Draw the simulated fleet before its first tick and report that it is moving.
    pub fn start_simulation(
        &mut self,
        positions: impl IntoIterator<Item = VehiclePosition>,
        now: Timestamp,
    ) {
        for position in positions {
            self.apply_position(position.to_report(), now);
        }
        self.flush();
        self.status = SIMULATION_STATUS.to_string();
        info!(vehicles = self.store.len(), "Simulated fleet drawn");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Coordinate;
    use crate::surface::MarkerBoard;

    const T0: Timestamp = Timestamp::from_millis(1_000);

    fn report(id: &str, line: &str, lat: f64, lng: f64) -> PositionReport {
        PositionReport::builder()
            .vehicle_id(id)
            .line_id(line)
            .coordinate([lat, lng])
            .build()
    }

    fn three_vehicle_snapshot() -> FleetEvent {
        FleetUpdate::FullSnapshot(vec![
            report("bus001", "L01", 8.30, -62.75),
            report("bus002", "L02", 8.28, -62.70),
            report("bus003", "L03", 8.25, -62.72),
        ])
        .into()
    }

    #[test]
    fn test_snapshot_then_removal_leaves_two_markers() {
        let mut view = FleetView::new(MarkerBoard::new(), LineFilter::All);

        view.handle_at(three_vehicle_snapshot(), T0);
        view.handle_at(
            FleetUpdate::VehicleRemoved(VehicleId::from("bus002")).into(),
            T0,
        );

        let board = view.surface();
        assert_eq!(board.len(), 2);
        assert_eq!(view.store().len(), 2);
        for position in view.store().get_all() {
            let marker = board.get(&position.vehicle_id).unwrap();
            assert_eq!(marker.coordinate, position.coordinate);
        }
        assert!(board.get(&VehicleId::from("bus002")).is_none());
    }

    #[test]
    fn test_snapshot_replaces_stale_vehicles() {
        let mut view = FleetView::new(MarkerBoard::new(), LineFilter::All);
        view.handle_at(
            FleetUpdate::PositionUpdate(report("ghost", "L09", 8.0, -62.0)).into(),
            T0,
        );
        view.handle_at(
            FleetUpdate::PositionUpdate(report("bus001", "L01", 8.29, -62.74)).into(),
            T0,
        );

        view.handle_at(three_vehicle_snapshot(), T0);

        let board = view.surface();
        assert_eq!(board.len(), 3);
        assert!(board.get(&VehicleId::from("ghost")).is_none());
        // bus001 was moved in place, not recreated
        assert_eq!(board.created(), 4);
        assert_eq!(board.destroyed(), 1);
        assert_eq!(
            board.get(&VehicleId::from("bus001")).unwrap().coordinate,
            Coordinate::new(8.30, -62.75)
        );
    }

    #[test]
    fn test_snapshot_applied_once_per_connection() {
        let mut view = FleetView::new(MarkerBoard::new(), LineFilter::All);
        view.handle_at(FleetEvent::Connection(ConnectionStatus::Connected), T0);
        view.handle_at(three_vehicle_snapshot(), T0);
        view.handle_at(
            FleetUpdate::VehicleRemoved(VehicleId::from("bus003")).into(),
            T0,
        );

        // periodic snapshots after the first are ignored
        view.handle_at(three_vehicle_snapshot(), T0);
        assert_eq!(view.store().len(), 2);

        view.handle_at(FleetEvent::Connection(ConnectionStatus::Disconnected), T0);
        assert_eq!(view.status(), "Disconnected. Retrying connection...");
        assert_eq!(view.store().len(), 2);

        view.handle_at(FleetEvent::Connection(ConnectionStatus::Connected), T0);
        view.handle_at(three_vehicle_snapshot(), T0);
        assert_eq!(view.store().len(), 3);
        assert_eq!(view.status(), "Connected. Monitoring vehicles...");
    }

    #[test]
    fn test_filter_change_hides_without_destroying() {
        let mut view = FleetView::new(MarkerBoard::new(), LineFilter::All);
        view.handle_at(three_vehicle_snapshot(), T0);

        view.handle_at(FleetEvent::FilterChanged("L02".parse().unwrap()), T0);
        let visible: Vec<String> = view
            .surface()
            .visible()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(visible, ["bus002"]);
        assert_eq!(view.surface().len(), 3);
        assert_eq!(view.status(), "Showing line: L02");

        // hidden vehicles keep moving
        view.handle_at(
            FleetUpdate::PositionUpdate(report("bus001", "L01", 8.31, -62.76)).into(),
            T0,
        );

        view.handle_at(FleetEvent::FilterChanged(LineFilter::All), T0);
        let board = view.surface();
        assert_eq!(board.visible().count(), 3);
        assert_eq!(board.created(), 3);
        assert_eq!(board.destroyed(), 0);
        assert_eq!(
            board.get(&VehicleId::from("bus001")).unwrap().coordinate,
            Coordinate::new(8.31, -62.76)
        );
    }

    #[test]
    fn test_vehicle_first_seen_while_filtered_appears_on_show() {
        let mut view = FleetView::new(MarkerBoard::new(), "L02".parse().unwrap());
        view.handle_at(
            FleetUpdate::PositionUpdate(report("bus001", "L01", 8.30, -62.75)).into(),
            T0,
        );
        assert!(view.surface().is_empty());
        assert_eq!(view.store().len(), 1);

        view.handle_at(FleetEvent::FilterChanged(LineFilter::All), T0);
        assert_eq!(view.surface().len(), 1);
    }

    #[test]
    fn test_invalid_update_keeps_prior_marker() {
        let mut view = FleetView::new(MarkerBoard::new(), LineFilter::All);
        view.handle_at(
            FleetUpdate::PositionUpdate(report("bus001", "L01", 8.30, -62.75)).into(),
            T0,
        );
        view.handle_at(
            FleetUpdate::PositionUpdate(report("bus001", "L01", 8.30, 250.0)).into(),
            T0,
        );

        assert_eq!(
            view.surface()
                .get(&VehicleId::from("bus001"))
                .unwrap()
                .coordinate,
            Coordinate::new(8.30, -62.75)
        );
    }

    #[test]
    fn test_simulation_start_draws_fleet_and_sets_status() {
        let mut view = FleetView::new(MarkerBoard::new(), LineFilter::All);
        assert_eq!(view.status(), "");

        let fleet = [("bus001", "L01", 8.30), ("bus002", "L02", 8.28)];
        let positions = fleet.map(|(id, line, lat)| VehiclePosition {
            vehicle_id: VehicleId::from(id),
            line_id: line.to_string(),
            label: None,
            coordinate: Coordinate::new(lat, -62.75),
            heading: Some(45.0),
            last_updated: T0,
        });
        view.start_simulation(positions, T0);

        assert_eq!(view.status(), SIMULATION_STATUS);
        assert_eq!(view.surface().len(), 2);

        view.handle_at(FleetEvent::FilterChanged("L01".parse().unwrap()), T0);
        assert_eq!(view.status(), "Showing line: L01");
    }

    #[test]
    fn test_handle_stamps_receive_time() {
        let mut view = FleetView::new(MarkerBoard::new(), LineFilter::All);
        view.handle(FleetUpdate::PositionUpdate(report("bus001", "L01", 8.30, -62.75)).into());

        let position = view.store().get(&VehicleId::from("bus001")).unwrap();
        assert!(position.last_updated.as_millis() > 0);
    }
}
