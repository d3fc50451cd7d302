use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use super::StateMachine;
use crate::error::{StaleReport, ValidationError};
use crate::position::{PositionReport, Timestamp, VehiclePosition};
use crate::vehicle::VehicleId;

/// Why a report was not merged into the store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectedReport {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Stale(#[from] StaleReport),
}

#[derive(Debug)]
struct StoredVehicle {
    position: VehiclePosition,
    inserted: u64,
    last_seq: Option<u64>,
}

/// Authoritative in-memory mapping from vehicle id to its last known position.
///
/// This is the single source of truth for what should be drawn. Nothing is persisted.
#[derive(Debug, Default)]
pub struct FleetStore {
    vehicles: HashMap<VehicleId, StoredVehicle, ahash::RandomState>,
    insertions: u64,
    pending: VecDeque<FleetOutput>,
}

impl FleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `report` into the entry for its vehicle and return the merged position.
    ///
    /// The coordinate is always replaced as a whole. `heading` and `label` only overwrite the
    /// stored values when the report carries them. `received_at` stamps reports that carry no
    /// timestamp of their own.
    pub fn upsert(
        &mut self,
        report: PositionReport,
        received_at: Timestamp,
    ) -> Result<VehiclePosition, RejectedReport> {
        let report = report.validate()?;
        let last_updated = report.timestamp.unwrap_or(received_at);

        match self.vehicles.entry(report.vehicle_id.clone()) {
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();

                if let (Some(seq), Some(last_applied)) = (report.seq, stored.last_seq) {
                    if seq <= last_applied {
                        return Err(StaleReport {
                            vehicle_id: report.vehicle_id,
                            seq,
                            last_applied,
                        }
                        .into());
                    }
                }

                let position = &mut stored.position;
                position.coordinate = report.coordinate;
                position.line_id = report.line_id;
                position.last_updated = last_updated;
                if let Some(heading) = report.heading {
                    position.heading = Some(heading);
                }
                if let Some(label) = report.label {
                    position.label = Some(label);
                }
                if report.seq.is_some() {
                    stored.last_seq = report.seq;
                }

                Ok(position.clone())
            }

            Entry::Vacant(slot) => {
                let position = VehiclePosition {
                    vehicle_id: report.vehicle_id,
                    line_id: report.line_id,
                    label: report.label,
                    coordinate: report.coordinate,
                    heading: report.heading,
                    last_updated,
                };
                self.insertions += 1;
                slot.insert(StoredVehicle {
                    position: position.clone(),
                    inserted: self.insertions,
                    last_seq: report.seq,
                });
                Ok(position)
            }
        }
    }

    /// Delete the entry for `vehicle_id`. Absent ids are not an error.
    pub fn remove(&mut self, vehicle_id: &VehicleId) -> Option<VehiclePosition> {
        self.vehicles
            .remove(vehicle_id)
            .map(|stored| stored.position)
    }

    pub fn get(&self, vehicle_id: &VehicleId) -> Option<&VehiclePosition> {
        self.vehicles.get(vehicle_id).map(|stored| &stored.position)
    }

    pub fn contains(&self, vehicle_id: &VehicleId) -> bool {
        self.vehicles.contains_key(vehicle_id)
    }

    /// Snapshot of every known position, oldest insertion first.
    pub fn get_all(&self) -> Vec<VehiclePosition> {
        let mut stored: Vec<&StoredVehicle> = self.vehicles.values().collect();
        stored.sort_by_key(|stored| stored.inserted);
        stored
            .into_iter()
            .map(|stored| stored.position.clone())
            .collect()
    }

    /// Drop every entry, including the per-vehicle sequence numbers.
    pub fn clear(&mut self) {
        self.vehicles.clear();
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

pub enum FleetInput {
    Upsert {
        report: PositionReport,
        received_at: Timestamp,
    },
    Remove(VehicleId),
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FleetOutput {
    Upserted(VehiclePosition),
    Removed(VehicleId),
    Cleared,
    Rejected(RejectedReport),
}

impl StateMachine for FleetStore {
    type Input = FleetInput;
    type Output = FleetOutput;

    fn process_input(&mut self, input: Self::Input) {
        let output = match input {
            FleetInput::Upsert {
                report,
                received_at,
            } => match self.upsert(report, received_at) {
                Ok(position) => FleetOutput::Upserted(position),
                Err(rejected) => FleetOutput::Rejected(rejected),
            },
            FleetInput::Remove(vehicle_id) => match self.remove(&vehicle_id) {
                Some(_) => FleetOutput::Removed(vehicle_id),
                None => return,
            },
            FleetInput::Clear => {
                self.clear();
                FleetOutput::Cleared
            }
        };

        self.pending.push_back(output);
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Coordinate;

    const T0: Timestamp = Timestamp::from_millis(1_000);

    fn report(id: &str, lat: f64, lng: f64) -> PositionReport {
        PositionReport::builder()
            .vehicle_id(id)
            .line_id("L01")
            .coordinate([lat, lng])
            .build()
    }

    #[test]
    fn test_initial_state() {
        let store = FleetStore::new();
        assert!(store.is_empty());
        assert!(store.get_all().is_empty());
    }

    #[test]
    fn test_upsert_keeps_one_entry_per_vehicle() {
        let mut store = FleetStore::new();

        store.upsert(report("bus001", 8.30, -62.75), T0).unwrap();
        store.upsert(report("bus001", 8.31, -62.76), T0).unwrap();
        let merged = store.upsert(report("bus001", 8.32, -62.77), T0).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(merged.coordinate, Coordinate::new(8.32, -62.77));
        assert_eq!(
            store.get(&VehicleId::from("bus001")).unwrap().coordinate,
            Coordinate::new(8.32, -62.77)
        );
    }

    #[test]
    fn test_missing_heading_keeps_previous() {
        let mut store = FleetStore::new();

        let mut first = report("bus001", 8.30, -62.75);
        first.heading = Some(45.0);
        first.label = Some("001".to_string());
        store.upsert(first, T0).unwrap();

        let merged = store.upsert(report("bus001", 8.31, -62.76), T0).unwrap();
        assert_eq!(merged.heading, Some(45.0));
        assert_eq!(merged.label.as_deref(), Some("001"));

        let mut third = report("bus001", 8.32, -62.77);
        third.heading = Some(180.0);
        let merged = store.upsert(third, T0).unwrap();
        assert_eq!(merged.heading, Some(180.0));
    }

    #[test]
    fn test_report_timestamp_wins_over_receive_time() {
        let mut store = FleetStore::new();

        let merged = store.upsert(report("bus001", 8.30, -62.75), T0).unwrap();
        assert_eq!(merged.last_updated, T0);

        let mut stamped = report("bus001", 8.31, -62.76);
        stamped.timestamp = Some(Timestamp::from_millis(42));
        let merged = store.upsert(stamped, T0).unwrap();
        assert_eq!(merged.last_updated, Timestamp::from_millis(42));
    }

    #[test]
    fn test_invalid_report_leaves_state_untouched() {
        let mut store = FleetStore::new();
        store.upsert(report("bus001", 8.30, -62.75), T0).unwrap();

        let result = store.upsert(report("bus001", 123.0, -62.75), T0);
        assert!(matches!(result, Err(RejectedReport::Invalid(_))));
        assert_eq!(
            store.get(&VehicleId::from("bus001")).unwrap().coordinate,
            Coordinate::new(8.30, -62.75)
        );
    }

    #[test]
    fn test_sequence_regression_is_rejected() {
        let mut store = FleetStore::new();

        let mut newer = report("bus001", 8.31, -62.76);
        newer.seq = Some(5);
        store.upsert(newer, T0).unwrap();

        let mut older = report("bus001", 8.30, -62.75);
        older.seq = Some(4);
        let result = store.upsert(older, T0);
        assert!(matches!(
            result,
            Err(RejectedReport::Stale(StaleReport { seq: 4, last_applied: 5, .. }))
        ));
        assert_eq!(
            store.get(&VehicleId::from("bus001")).unwrap().coordinate,
            Coordinate::new(8.31, -62.76)
        );

        // unsequenced reports stay best effort
        store.upsert(report("bus001", 8.32, -62.77), T0).unwrap();
        assert_eq!(
            store.get(&VehicleId::from("bus001")).unwrap().coordinate,
            Coordinate::new(8.32, -62.77)
        );
    }

    #[test]
    fn test_remove_forgets_sequence() {
        let mut store = FleetStore::new();
        let id = VehicleId::from("bus001");

        let mut r = report("bus001", 8.31, -62.76);
        r.seq = Some(9);
        store.upsert(r, T0).unwrap();
        store.remove(&id);

        let mut restarted = report("bus001", 8.30, -62.75);
        restarted.seq = Some(0);
        assert!(store.upsert(restarted, T0).is_ok());
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut store = FleetStore::new();
        let id = VehicleId::from("bus001");
        store.upsert(report("bus001", 8.30, -62.75), T0).unwrap();

        assert!(store.remove(&id).is_some());
        assert!(store.remove(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_all_in_insertion_order() {
        let mut store = FleetStore::new();
        for id in ["bus003", "bus001", "bus002"] {
            store.upsert(report(id, 8.30, -62.75), T0).unwrap();
        }
        store.upsert(report("bus003", 8.31, -62.75), T0).unwrap();

        let ids: Vec<String> = store
            .get_all()
            .into_iter()
            .map(|p| p.vehicle_id.to_string())
            .collect();
        assert_eq!(ids, ["bus003", "bus001", "bus002"]);
    }

    #[test]
    fn test_clear() {
        let mut store = FleetStore::new();
        store.upsert(report("bus001", 8.30, -62.75), T0).unwrap();
        store.upsert(report("bus002", 8.28, -62.70), T0).unwrap();

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_replay_through_state_machine() {
        let mut store = FleetStore::new();

        store.process_input(FleetInput::Upsert {
            report: report("bus001", 8.30, -62.75),
            received_at: T0,
        });
        store.process_input(FleetInput::Remove(VehicleId::from("bus001")));
        // second removal produces no output
        store.process_input(FleetInput::Remove(VehicleId::from("bus001")));
        store.process_input(FleetInput::Upsert {
            report: report("bus002", 95.0, -62.70),
            received_at: T0,
        });
        store.process_input(FleetInput::Clear);

        assert!(matches!(store.poll_output(), Some(FleetOutput::Upserted(_))));
        assert!(matches!(store.poll_output(), Some(FleetOutput::Removed(_))));
        assert!(matches!(
            store.poll_output(),
            Some(FleetOutput::Rejected(RejectedReport::Invalid(_)))
        ));
        assert_eq!(store.poll_output(), Some(FleetOutput::Cleared));
        assert!(store.poll_output().is_none());
    }
}
