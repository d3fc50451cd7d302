//! Error types shared across the fleet core.

use thiserror::Error;

use crate::vehicle::VehicleId;

/// A malformed inbound position. The sample is dropped and prior state is kept.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("position for vehicle {vehicle_id} has no coordinate")]
    MissingCoordinate { vehicle_id: String },

    #[error("coordinate ({lat}, {lng}) is outside WGS84 bounds")]
    CoordinateOutOfRange { lat: f64, lng: f64 },

    #[error("heading {0} is not a finite number")]
    NonFiniteHeading(f64),

    #[error("position has an empty vehicle id")]
    EmptyVehicleId,

    #[error("position for vehicle {vehicle_id} has an empty line id")]
    EmptyLineId { vehicle_id: String },
}

/// Indicates that a report was older than one already applied for the same vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("report #{seq} for vehicle {vehicle_id} is not newer than #{last_applied}")]
pub struct StaleReport {
    pub vehicle_id: VehicleId,
    pub seq: u64,
    pub last_applied: u64,
}

/// Errors surfaced by the tracking glue. None of them are fatal to the process.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("invalid position: {0}")]
    Validation(#[from] ValidationError),

    /// The transport is gone; outbound and inbound flow is suspended until it reconnects.
    #[error("transport disconnected: {0}")]
    TransportDisconnected(String),

    #[error("failed to create broadcast at '{0}'")]
    BroadcastCreate(String),

    #[error("protobuf decode error")]
    Decode(#[from] prost::DecodeError),

    #[error("frame carried no payload")]
    EmptyFrame,

    #[error("MoQ transport error")]
    Moq(#[from] moq_lite::Error),
}
