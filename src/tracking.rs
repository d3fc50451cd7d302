//! The driver's side of tracking: a sample source turned into outbound driver events.

use std::fmt;

use tracing::{info, warn};

use crate::event::DriverEvent;
use crate::sensor::{GeoSampleSource, GeoSensor, SensorError, SourceEvent};
use crate::vehicle::VehicleId;

/// What the driver's status line shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingStatus {
    Inactive,
    Active,
    Error(String),
    /// Location sensing is unavailable; tracking stays disabled.
    Unsupported,
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => f.write_str("Inactive"),
            Self::Active => f.write_str("Active"),
            Self::Error(message) => write!(f, "Error: {message}"),
            Self::Unsupported => f.write_str("Not supported"),
        }
    }
}

/// Stamps each sample with the driver's identity and a per-vehicle sequence number.
#[derive(Debug)]
pub struct DriverTracker<S> {
    source: GeoSampleSource<S>,
    vehicle_id: VehicleId,
    line_id: String,
    label: Option<String>,
    seq: u64,
    status: TrackingStatus,
}

impl<S: GeoSensor> DriverTracker<S> {
    pub fn new(
        source: GeoSampleSource<S>,
        vehicle_id: VehicleId,
        line_id: impl Into<String>,
        label: Option<String>,
    ) -> Self {
        Self {
            source,
            vehicle_id,
            line_id: line_id.into(),
            label,
            seq: 0,
            status: TrackingStatus::Inactive,
        }
    }

    pub fn vehicle_id(&self) -> &VehicleId {
        &self.vehicle_id
    }

    pub fn status(&self) -> &TrackingStatus {
        &self.status
    }

    /// Start tracking. Returns whether a new watch began.
    pub fn start(&mut self) -> bool {
        if self.status == TrackingStatus::Unsupported {
            return false;
        }

        match self.source.start() {
            Ok(started) => {
                self.status = TrackingStatus::Active;
                started
            }
            Err(e) => {
                warn!(vehicle_id = %self.vehicle_id, error = %e, "Tracking disabled");
                self.status = TrackingStatus::Unsupported;
                false
            }
        }
    }

    /// Stop tracking. Yields the event announcing the end of tracking if it was running.
    pub fn stop(&mut self) -> Option<DriverEvent> {
        if !self.source.stop() {
            return None;
        }
        if self.status != TrackingStatus::Unsupported {
            self.status = TrackingStatus::Inactive;
        }
        info!(vehicle_id = %self.vehicle_id, "Tracking stopped");
        Some(DriverEvent::StopTracking(self.vehicle_id.clone()))
    }

    /// Wait for the next outbound position. Pends while tracking is stopped.
    pub async fn next(&mut self) -> Result<DriverEvent, SensorError> {
        match self.source.next().await {
            SourceEvent::Sample(sample) => {
                self.seq += 1;
                let mut report = sample.to_report(&self.vehicle_id, &self.line_id, self.seq);
                report.label.clone_from(&self.label);
                Ok(DriverEvent::SendPosition(report))
            }
            SourceEvent::Failed(e) => {
                self.status = TrackingStatus::Error(e.to_string());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::{StreamExt, stream};

    use super::*;
    use crate::position::{Coordinate, Timestamp};
    use crate::sensor::{GeoSample, SampleStream, SensorOptions, SensorUnavailable};

    struct FixedSensor(Vec<Result<GeoSample, SensorError>>);

    impl GeoSensor for FixedSensor {
        fn watch(&mut self, _: &SensorOptions) -> Result<SampleStream, SensorUnavailable> {
            if self.0.is_empty() {
                return Err(SensorUnavailable {
                    reason: "no receiver".to_string(),
                });
            }
            Ok(stream::iter(self.0.clone())
                .chain(stream::pending())
                .boxed())
        }
    }

    fn sample(lat: f64) -> GeoSample {
        GeoSample {
            coordinate: Coordinate::new(lat, -62.75),
            heading: Some(90.0),
            timestamp: Timestamp::from_millis(5),
        }
    }

    fn tracker(script: Vec<Result<GeoSample, SensorError>>) -> DriverTracker<FixedSensor> {
        let options = SensorOptions::builder()
            .timeout(Duration::from_secs(30))
            .build();
        DriverTracker::new(
            GeoSampleSource::new(FixedSensor(script), options),
            VehicleId::from("BUS_CH_001"),
            "L01",
            Some("CH-001".to_string()),
        )
    }

    #[tokio::test]
    async fn test_samples_become_sequenced_reports() {
        let mut tracker = tracker(vec![Ok(sample(8.30)), Ok(sample(8.31))]);
        assert!(tracker.start());
        assert_eq!(tracker.status().to_string(), "Active");

        for expected_seq in 1..=2 {
            let Ok(DriverEvent::SendPosition(report)) = tracker.next().await else {
                panic!("expected a position");
            };
            assert_eq!(report.seq, Some(expected_seq));
            assert_eq!(report.line_id, "L01");
            assert_eq!(report.label.as_deref(), Some("CH-001"));
        }
    }

    #[tokio::test]
    async fn test_stop_announces_end_once() {
        let mut tracker = tracker(vec![Ok(sample(8.30))]);
        assert_eq!(tracker.stop(), None);

        tracker.start();
        assert_eq!(
            tracker.stop(),
            Some(DriverEvent::StopTracking(VehicleId::from("BUS_CH_001")))
        );
        assert_eq!(tracker.stop(), None);
        assert_eq!(tracker.status(), &TrackingStatus::Inactive);
    }

    #[tokio::test]
    async fn test_sensor_error_sets_status() {
        let mut tracker = tracker(vec![Err(SensorError::Timeout(Duration::from_secs(5)))]);
        tracker.start();

        assert!(tracker.next().await.is_err());
        assert_eq!(
            tracker.status().to_string(),
            "Error: no position received within 5s"
        );
    }

    #[test]
    fn test_unavailable_sensor_disables_tracking() {
        let mut tracker = tracker(vec![]);
        assert!(!tracker.start());
        assert_eq!(tracker.status().to_string(), "Not supported");
        assert!(!tracker.start());
    }
}
