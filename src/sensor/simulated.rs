use std::time::Duration;

use futures::StreamExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;

use super::{GeoSample, GeoSensor, SampleStream, SensorError, SensorOptions, SensorUnavailable};
use crate::position::Timestamp;
use crate::state_machine::StateMachine;
use crate::state_machine::simulator::{
    Route, RouteSimulator, SimulatedVehicle, SimulatorInput, SimulatorOutput,
};
use crate::state_machine::wrappers::input::system::SystemResource;

/// Degrees of noise added to each axis when low accuracy is requested.
pub const LOW_ACCURACY_JITTER_DEG: f64 = 0.0001;

/// A sensor that drives one simulated vehicle around a route and reports where it is.
///
/// Each watch restarts the vehicle from its configured starting point.
#[derive(Debug, Clone)]
pub struct RouteFollowerSensor {
    route: Route,
    vehicle: SimulatedVehicle,
    period: Duration,
    seed: u64,
}

impl RouteFollowerSensor {
    pub fn new(route: Route, vehicle: SimulatedVehicle, period: Duration) -> Self {
        Self {
            route,
            vehicle,
            period,
            seed: 0,
        }
    }

    /// Seed for the low-accuracy noise.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl GeoSensor for RouteFollowerSensor {
    fn watch(&mut self, options: &SensorOptions) -> Result<SampleStream, SensorUnavailable> {
        if self.route.is_empty() {
            return Err(SensorUnavailable {
                reason: format!("route {} has no waypoints", self.route.id),
            });
        }
        if self.period.is_zero() {
            return Err(SensorUnavailable {
                reason: "sample period must be positive".to_string(),
            });
        }

        let mut vehicle = self.vehicle.clone();
        vehicle.route_id = self.route.id.clone();
        let mut simulator = RouteSimulator::new([self.route.clone()], [vehicle]);

        let jitter = if options.high_accuracy {
            0.0
        } else {
            LOW_ACCURACY_JITTER_DEG
        };
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let samples = IntervalStream::new(interval).map(move |_| {
            let now = Timestamp::generate();
            simulator.process_input(SimulatorInput::Tick(now));

            let Some(SimulatorOutput::Moved(position)) = simulator.poll_output() else {
                return Err(SensorError::Stream("simulated vehicle did not move".to_string()));
            };

            let mut coordinate = position.coordinate;
            if jitter > 0.0 {
                coordinate.lat += rng.random_range(-jitter..=jitter);
                coordinate.lng += rng.random_range(-jitter..=jitter);
            }

            Ok(GeoSample {
                coordinate,
                heading: position.heading,
                timestamp: now,
            })
        });

        Ok(samples.boxed())
    }
}
