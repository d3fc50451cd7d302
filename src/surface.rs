//! Map surfaces that marker commands are applied to.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::position::Coordinate;
use crate::state_machine::reconciler::MarkerCommand;
use crate::vehicle::VehicleId;

/// Anything that can draw vehicle markers keyed by vehicle id.
pub trait MapSurface {
    fn apply(&mut self, command: MarkerCommand);
}

/// Renders markers as structured log lines. Used by the terminal binaries.
#[derive(Debug, Default)]
pub struct LogSurface;

impl MapSurface for LogSurface {
    fn apply(&mut self, command: MarkerCommand) {
        match command {
            MarkerCommand::Create {
                vehicle_id,
                coordinate,
                heading,
                label,
            } => info!(
                vehicle_id = %vehicle_id,
                lat = coordinate.lat,
                lng = coordinate.lng,
                heading,
                label = %label.replace('\n', " | "),
                "Marker created"
            ),
            MarkerCommand::Update {
                vehicle_id,
                coordinate,
                heading,
                ..
            } => debug!(
                vehicle_id = %vehicle_id,
                lat = coordinate.lat,
                lng = coordinate.lng,
                heading,
                "Marker moved"
            ),
            MarkerCommand::Show(vehicle_id) => info!(vehicle_id = %vehicle_id, "Marker shown"),
            MarkerCommand::Hide(vehicle_id) => info!(vehicle_id = %vehicle_id, "Marker hidden"),
            MarkerCommand::Destroy(vehicle_id) => {
                info!(vehicle_id = %vehicle_id, "Marker destroyed");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardMarker {
    pub coordinate: Coordinate,
    pub heading: f64,
    pub label: String,
    pub visible: bool,
}

/// An in-memory surface that keeps what is drawn and counts marker churn.
#[derive(Debug, Default)]
pub struct MarkerBoard {
    markers: HashMap<VehicleId, BoardMarker, ahash::RandomState>,
    created: usize,
    destroyed: usize,
}

impl MarkerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, vehicle_id: &VehicleId) -> Option<&BoardMarker> {
        self.markers.get(vehicle_id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn visible(&self) -> impl Iterator<Item = (&VehicleId, &BoardMarker)> {
        self.markers.iter().filter(|(_, marker)| marker.visible)
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed
    }
}

impl MapSurface for MarkerBoard {
    fn apply(&mut self, command: MarkerCommand) {
        match command {
            MarkerCommand::Create {
                vehicle_id,
                coordinate,
                heading,
                label,
            } => {
                let marker = BoardMarker {
                    coordinate,
                    heading,
                    label,
                    visible: true,
                };
                if self.markers.insert(vehicle_id.clone(), marker).is_some() {
                    warn!(vehicle_id = %vehicle_id, "Marker created twice");
                }
                self.created += 1;
            }
            MarkerCommand::Update {
                vehicle_id,
                coordinate,
                heading,
                label,
            } => match self.markers.get_mut(&vehicle_id) {
                Some(marker) => {
                    marker.coordinate = coordinate;
                    marker.heading = heading;
                    marker.label = label;
                }
                None => warn!(vehicle_id = %vehicle_id, "Update for unknown marker"),
            },
            MarkerCommand::Show(vehicle_id) | MarkerCommand::Hide(vehicle_id)
                if !self.markers.contains_key(&vehicle_id) =>
            {
                warn!(vehicle_id = %vehicle_id, "Visibility change for unknown marker");
            }
            MarkerCommand::Show(vehicle_id) => {
                if let Some(marker) = self.markers.get_mut(&vehicle_id) {
                    marker.visible = true;
                }
            }
            MarkerCommand::Hide(vehicle_id) => {
                if let Some(marker) = self.markers.get_mut(&vehicle_id) {
                    marker.visible = false;
                }
            }
            MarkerCommand::Destroy(vehicle_id) => {
                if self.markers.remove(&vehicle_id).is_some() {
                    self.destroyed += 1;
                }
            }
        }
    }
}
