//! Periodic position samples for the driver role.
//!
//! A [`GeoSensor`] is the raw capability (a synthetic route follower, a replayed trace). The
//! [`GeoSampleSource`] wraps one with the start/stop lifecycle the driver's buttons drive.

use std::time::Duration;

use bon::Builder;
use futures::stream::BoxStream;

use crate::position::{Coordinate, PositionReport, Timestamp};
use crate::vehicle::VehicleId;

pub mod error;
pub mod replay;
pub mod simulated;
pub mod source;

pub use self::error::{SensorError, SensorUnavailable};
pub use self::replay::ReplaySensor;
pub use self::simulated::RouteFollowerSensor;
pub use self::source::{GeoSampleSource, SourceEvent};

/// One reading from a sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoSample {
    pub coordinate: Coordinate,
    pub heading: Option<f64>,
    pub timestamp: Timestamp,
}

impl GeoSample {
    pub fn to_report(&self, vehicle_id: &VehicleId, line_id: &str, seq: u64) -> PositionReport {
        PositionReport {
            vehicle_id: vehicle_id.clone(),
            line_id: line_id.to_string(),
            coordinate: self.coordinate,
            label: None,
            heading: self.heading,
            timestamp: Some(self.timestamp),
            seq: Some(seq),
        }
    }
}

/// Watch options handed to the sensor.
#[derive(Debug, Clone, Builder)]
pub struct SensorOptions {
    /// Prefer precise fixes over cheap ones.
    #[builder(default = true)]
    pub high_accuracy: bool,

    /// How old a cached fix may be. Zero asks for fresh fixes only.
    #[builder(default = Duration::ZERO)]
    pub max_cache_age: Duration,

    /// Longest gap between samples before the watch fails. Zero disables the check.
    #[builder(default = Duration::from_secs(5))]
    pub timeout: Duration,
}

impl Default for SensorOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

pub type SampleStream = BoxStream<'static, Result<GeoSample, SensorError>>;

/// A continuous position-sensing capability.
pub trait GeoSensor {
    /// Begin watching. Dropping the returned stream ends the watch.
    fn watch(&mut self, options: &SensorOptions) -> Result<SampleStream, SensorUnavailable>;
}
