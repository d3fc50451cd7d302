//! Protobuf framing for everything sent over the relay.
//!
//! Every frame on the `position` track is a [`proto::DriverMessage`], every frame on the hub's
//! `events` track is a [`proto::FleetEnvelope`]. Coordinates are `optional` on the wire so a
//! frame missing them is caught by validation instead of decoding as `(0, 0)`.

use bytes::Bytes;
use prost::Message;
use tracing::warn;

use crate::error::{TrackingError, ValidationError};
use crate::event::{DriverEvent, FleetUpdate};
use crate::position::{Coordinate, PositionReport, Timestamp, VehiclePosition};
use crate::vehicle::VehicleId;

pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PositionMessage {
        #[prost(string, tag = "1")]
        pub vehicle_id: String,
        #[prost(string, tag = "2")]
        pub line_id: String,
        #[prost(double, optional, tag = "3")]
        pub lat: Option<f64>,
        #[prost(double, optional, tag = "4")]
        pub lng: Option<f64>,
        #[prost(double, optional, tag = "5")]
        pub heading: Option<f64>,
        #[prost(string, optional, tag = "6")]
        pub label: Option<String>,
        #[prost(uint64, optional, tag = "7")]
        pub timestamp_ms: Option<u64>,
        #[prost(uint64, optional, tag = "8")]
        pub seq: Option<u64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StopTracking {
        #[prost(string, tag = "1")]
        pub vehicle_id: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct VehicleRemoved {
        #[prost(string, tag = "1")]
        pub vehicle_id: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FleetSnapshot {
        #[prost(message, repeated, tag = "1")]
        pub positions: Vec<PositionMessage>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DriverMessage {
        #[prost(oneof = "driver_message::Payload", tags = "1, 2")]
        pub payload: Option<driver_message::Payload>,
    }

    pub mod driver_message {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Payload {
            #[prost(message, tag = "1")]
            Position(super::PositionMessage),
            #[prost(message, tag = "2")]
            Stop(super::StopTracking),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FleetEnvelope {
        #[prost(oneof = "fleet_envelope::Payload", tags = "1, 2, 3")]
        pub payload: Option<fleet_envelope::Payload>,
    }

    pub mod fleet_envelope {
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Payload {
            #[prost(message, tag = "1")]
            Position(super::PositionMessage),
            #[prost(message, tag = "2")]
            Removed(super::VehicleRemoved),
            #[prost(message, tag = "3")]
            Snapshot(super::FleetSnapshot),
        }
    }
}

use proto::{driver_message, fleet_envelope};

impl From<&PositionReport> for proto::PositionMessage {
    fn from(report: &PositionReport) -> Self {
        Self {
            vehicle_id: report.vehicle_id.to_string(),
            line_id: report.line_id.clone(),
            lat: Some(report.coordinate.lat),
            lng: Some(report.coordinate.lng),
            heading: report.heading,
            label: report.label.clone(),
            timestamp_ms: report.timestamp.map(|ts| ts.as_millis()),
            seq: report.seq,
        }
    }
}

impl From<&VehiclePosition> for proto::PositionMessage {
    fn from(position: &VehiclePosition) -> Self {
        Self::from(&position.to_report())
    }
}

impl TryFrom<proto::PositionMessage> for PositionReport {
    type Error = ValidationError;

    fn try_from(message: proto::PositionMessage) -> Result<Self, Self::Error> {
        let (Some(lat), Some(lng)) = (message.lat, message.lng) else {
            return Err(ValidationError::MissingCoordinate {
                vehicle_id: message.vehicle_id,
            });
        };

        PositionReport {
            vehicle_id: VehicleId::from(message.vehicle_id),
            line_id: message.line_id,
            coordinate: Coordinate::new(lat, lng),
            label: message.label,
            heading: message.heading,
            timestamp: message.timestamp_ms.map(Timestamp::from_millis),
            seq: message.seq,
        }
        .validate()
    }
}

pub fn encode_driver_event(event: &DriverEvent) -> Vec<u8> {
    let payload = match event {
        DriverEvent::SendPosition(report) => driver_message::Payload::Position(report.into()),
        DriverEvent::StopTracking(vehicle_id) => {
            driver_message::Payload::Stop(proto::StopTracking {
                vehicle_id: vehicle_id.to_string(),
            })
        }
    };

    proto::DriverMessage {
        payload: Some(payload),
    }
    .encode_to_vec()
}

pub fn decode_driver_event(frame: Bytes) -> Result<DriverEvent, TrackingError> {
    let message = proto::DriverMessage::decode(frame)?;

    match message.payload.ok_or(TrackingError::EmptyFrame)? {
        driver_message::Payload::Position(position) => {
            Ok(DriverEvent::SendPosition(position.try_into()?))
        }
        driver_message::Payload::Stop(stop) => {
            Ok(DriverEvent::StopTracking(stop.vehicle_id.into()))
        }
    }
}

pub fn encode_fleet_update(update: &FleetUpdate) -> Vec<u8> {
    let payload = match update {
        FleetUpdate::PositionUpdate(report) => fleet_envelope::Payload::Position(report.into()),
        FleetUpdate::VehicleRemoved(vehicle_id) => {
            fleet_envelope::Payload::Removed(proto::VehicleRemoved {
                vehicle_id: vehicle_id.to_string(),
            })
        }
        FleetUpdate::FullSnapshot(reports) => {
            fleet_envelope::Payload::Snapshot(proto::FleetSnapshot {
                positions: reports.iter().map(proto::PositionMessage::from).collect(),
            })
        }
    };

    proto::FleetEnvelope {
        payload: Some(payload),
    }
    .encode_to_vec()
}

/// Decode one hub frame. Invalid entries inside a snapshot are dropped individually.
pub fn decode_fleet_update(frame: Bytes) -> Result<FleetUpdate, TrackingError> {
    let envelope = proto::FleetEnvelope::decode(frame)?;

    match envelope.payload.ok_or(TrackingError::EmptyFrame)? {
        fleet_envelope::Payload::Position(position) => {
            Ok(FleetUpdate::PositionUpdate(position.try_into()?))
        }
        fleet_envelope::Payload::Removed(removed) => {
            Ok(FleetUpdate::VehicleRemoved(removed.vehicle_id.into()))
        }
        fleet_envelope::Payload::Snapshot(snapshot) => {
            let reports = snapshot
                .positions
                .into_iter()
                .filter_map(|position| match PositionReport::try_from(position) {
                    Ok(report) => Some(report),
                    Err(e) => {
                        warn!(error = %e, "Dropping invalid snapshot entry");
                        None
                    }
                })
                .collect();
            Ok(FleetUpdate::FullSnapshot(reports))
        }
    }
}
