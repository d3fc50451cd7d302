use std::fmt;

use crate::position::PositionReport;
use crate::vehicle::{LineFilter, VehicleId};

/// What a driver sends over the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    SendPosition(PositionReport),
    StopTracking(VehicleId),
}

/// What operators receive over the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum FleetUpdate {
    PositionUpdate(PositionReport),
    VehicleRemoved(VehicleId),
    /// Full fleet state, applied once after connecting.
    FullSnapshot(Vec<PositionReport>),
}

/// Connection lifecycle of the transport as seen by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("Connected. Monitoring vehicles..."),
            Self::Disconnected => f.write_str("Disconnected. Retrying connection..."),
        }
    }
}

/// Every event a fleet view reacts to, fed through one entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum FleetEvent {
    Update(FleetUpdate),
    FilterChanged(LineFilter),
    Connection(ConnectionStatus),
}

impl From<FleetUpdate> for FleetEvent {
    fn from(update: FleetUpdate) -> Self {
        Self::Update(update)
    }
}
