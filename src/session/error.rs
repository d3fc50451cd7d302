//! Error types for driver session management.

use crate::vehicle::VehicleId;

/// A driver announced a broadcast for a vehicle that is already being followed.
#[derive(Debug, thiserror::Error)]
#[error("vehicle {vehicle_id} already has an active driver session")]
pub struct SessionAlreadyActive {
    pub vehicle_id: VehicleId,
}

#[derive(Debug, thiserror::Error)]
#[error("no active driver session for vehicle {vehicle_id}")]
pub struct SessionNotFound {
    pub vehicle_id: VehicleId,
}
