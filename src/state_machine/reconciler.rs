use std::collections::{HashMap, VecDeque};

use super::StateMachine;
use crate::position::{Coordinate, VehiclePosition};
use crate::vehicle::{LineFilter, VehicleId};

/// What the reconciler believes is currently drawn for one vehicle.
///
/// Bound to a vehicle only through the id key of the reconciler's marker table, never stored on
/// the [`VehiclePosition`] itself.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMarker {
    pub coordinate: Coordinate,
    pub heading: f64,
    pub label: String,
    pub visible: bool,
}

/// A single call against the map surface.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerCommand {
    Create {
        vehicle_id: VehicleId,
        coordinate: Coordinate,
        heading: f64,
        label: String,
    },
    Update {
        vehicle_id: VehicleId,
        coordinate: Coordinate,
        heading: f64,
        label: String,
    },
    Show(VehicleId),
    Hide(VehicleId),
    Destroy(VehicleId),
}

/// Popup text for a vehicle's marker.
pub fn marker_label(position: &VehiclePosition) -> String {
    format!(
        "Line: {}\nBus: {}",
        position.line_id,
        position.display_label()
    )
}

/// Keeps rendered markers consistent with fleet state and the active line filter.
///
/// Markers are created lazily on the first visible sighting, hidden rather than destroyed when
/// the filter excludes them, and destroyed only on an explicit removal.
#[derive(Debug, Default)]
pub struct MarkerReconciler {
    markers: HashMap<VehicleId, RenderedMarker, ahash::RandomState>,
    pending: VecDeque<MarkerCommand>,
}

impl MarkerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker(&self, vehicle_id: &VehicleId) -> Option<&RenderedMarker> {
        self.markers.get(vehicle_id)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn visible_count(&self) -> usize {
        self.markers.values().filter(|marker| marker.visible).count()
    }

    /// Bring the marker for `position` in line with it under `filter`.
    pub fn reconcile(&mut self, position: &VehiclePosition, filter: &LineFilter) {
        let visible = filter.admits(&position.line_id);
        let vehicle_id = &position.vehicle_id;
        let label = marker_label(position);

        match self.markers.get_mut(vehicle_id) {
            Some(marker) => {
                // hidden markers still track the vehicle so they reappear in the right place
                let heading = position.heading.unwrap_or(marker.heading);
                if marker.coordinate != position.coordinate
                    || marker.heading != heading
                    || marker.label != label
                {
                    marker.coordinate = position.coordinate;
                    marker.heading = heading;
                    marker.label.clone_from(&label);
                    self.pending.push_back(MarkerCommand::Update {
                        vehicle_id: vehicle_id.clone(),
                        coordinate: position.coordinate,
                        heading,
                        label,
                    });
                }

                if visible != marker.visible {
                    marker.visible = visible;
                    self.pending.push_back(if visible {
                        MarkerCommand::Show(vehicle_id.clone())
                    } else {
                        MarkerCommand::Hide(vehicle_id.clone())
                    });
                }
            }
            None if visible => {
                let heading = position.heading.unwrap_or(0.0);
                self.markers.insert(
                    vehicle_id.clone(),
                    RenderedMarker {
                        coordinate: position.coordinate,
                        heading,
                        label: label.clone(),
                        visible: true,
                    },
                );
                self.pending.push_back(MarkerCommand::Create {
                    vehicle_id: vehicle_id.clone(),
                    coordinate: position.coordinate,
                    heading,
                    label,
                });
            }
            // created lazily once the filter admits it
            None => {}
        }
    }

    /// Reconcile every position, e.g. after a filter change.
    pub fn reconcile_all<'a>(
        &mut self,
        positions: impl IntoIterator<Item = &'a VehiclePosition>,
        filter: &LineFilter,
    ) {
        for position in positions {
            self.reconcile(position, filter);
        }
    }

    /// Destroy the marker for a vehicle that left the fleet.
    pub fn remove_vehicle(&mut self, vehicle_id: &VehicleId) {
        if self.markers.remove(vehicle_id).is_some() {
            self.pending
                .push_back(MarkerCommand::Destroy(vehicle_id.clone()));
        }
    }

    /// Destroy every marker whose vehicle is no longer known.
    pub fn prune(&mut self, is_known: impl Fn(&VehicleId) -> bool) {
        let mut stale: Vec<VehicleId> = self
            .markers
            .keys()
            .filter(|vehicle_id| !is_known(vehicle_id))
            .cloned()
            .collect();
        stale.sort();

        for vehicle_id in stale {
            self.remove_vehicle(&vehicle_id);
        }
    }
}

pub enum ReconcileInput {
    Reconcile {
        position: VehiclePosition,
        filter: LineFilter,
    },
    Remove(VehicleId),
}

impl StateMachine for MarkerReconciler {
    type Input = ReconcileInput;
    type Output = MarkerCommand;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            ReconcileInput::Reconcile { position, filter } => self.reconcile(&position, &filter),
            ReconcileInput::Remove(vehicle_id) => self.remove_vehicle(&vehicle_id),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
