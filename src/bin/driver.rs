use anyhow::Result;
use fleet_tracker::config::{DriverConfig, GeoSourceKind};
use fleet_tracker::console::{ConsoleCommand, stdin_commands};
use fleet_tracker::event::{DriverEvent, FleetUpdate};
use fleet_tracker::fleet_view::FleetView;
use fleet_tracker::routes::{DEFAULT_CENTER, demo_routes};
use fleet_tracker::sensor::{GeoSampleSource, GeoSensor, ReplaySensor, RouteFollowerSensor};
use fleet_tracker::state_machine::simulator::{Route, SimulatedVehicle};
use fleet_tracker::surface::LogSurface;
use fleet_tracker::tracking::DriverTracker;
use fleet_tracker::transport::TrackPublisher;
use fleet_tracker::vehicle::LineFilter;
use fleet_tracker::wire::encode_driver_event;
use fleet_tracker::{POSITION_TRACK, connect_bidirectional, driver_broadcast_path};
use futures::StreamExt;
use tracing::{debug, info, warn};

/// Degrees per sample travelled by the synthetic driver.
const SIMULATED_SPEED: f64 = 0.0005;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let config = DriverConfig::from_env()?;

    match config.geo_source.clone() {
        GeoSourceKind::Simulated => {
            let sensor = route_follower(&config);
            run(config, sensor).await
        }
        GeoSourceKind::Replay(path) => {
            let sensor = ReplaySensor::new(path, config.sample_period);
            run(config, sensor).await
        }
    }
}

/// Follow the demo route of the driver's line, or the first demo route for unknown lines.
fn route_follower(config: &DriverConfig) -> RouteFollowerSensor {
    let mut routes = demo_routes();
    let index = routes
        .iter()
        .position(|route| route.id == config.line_id)
        .unwrap_or(0);
    let route = if index < routes.len() {
        routes.swap_remove(index)
    } else {
        Route::new(config.line_id.clone(), Vec::<[f64; 2]>::new())
    };

    let start = route.waypoints.first().copied().unwrap_or(DEFAULT_CENTER);
    let vehicle = SimulatedVehicle::builder()
        .vehicle_id(config.vehicle_id.clone())
        .line_id(config.line_id.clone())
        .maybe_label(config.label.clone())
        .route_id(route.id.clone())
        .coordinate(start)
        .speed(SIMULATED_SPEED)
        .build();

    RouteFollowerSensor::new(route, vehicle, config.sample_period)
}

async fn run<S: GeoSensor>(config: DriverConfig, sensor: S) -> Result<()> {
    let path = driver_broadcast_path(config.vehicle_id.as_str());

    info!(
        vehicle_id = %config.vehicle_id,
        line_id = %config.line_id,
        relay = %config.relay_url,
        position_path = %format!("{path}/{POSITION_TRACK}"),
        "Driver connecting to relay"
    );

    let (_session, producer, _consumer) = connect_bidirectional(&config.relay_url).await?;
    let mut publisher = TrackPublisher::create(&producer, &path, POSITION_TRACK)?;

    let source = GeoSampleSource::new(sensor, config.sensor.clone());
    let mut tracker = DriverTracker::new(
        source,
        config.vehicle_id.clone(),
        config.line_id.clone(),
        config.label.clone(),
    );
    let mut local_view = config
        .local_echo
        .then(|| FleetView::new(LogSurface, LineFilter::All));

    info!(vehicle_id = %config.vehicle_id, "Driver is online; type `start` or `stop`");
    if config.auto_start {
        tracker.start();
        info!(status = %tracker.status(), "Tracking status");
    }

    let mut commands = stdin_commands();

    loop {
        tokio::select! {
            event = tracker.next() => match event {
                Ok(event) => {
                    publisher.publish(encode_driver_event(&event));
                    if let (Some(view), DriverEvent::SendPosition(report)) =
                        (local_view.as_mut(), &event)
                    {
                        view.handle(FleetUpdate::PositionUpdate(report.clone()).into());
                    }
                    debug!(vehicle_id = %tracker.vehicle_id(), "Sent position");
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        status = %tracker.status(),
                        "Tracking halted; type `start` to retry"
                    );
                }
            },

            command = commands.next() => match command {
                Some(Ok(ConsoleCommand::Start)) => {
                    if !tracker.start() {
                        debug!("Tracking already active or unavailable");
                    }
                    info!(status = %tracker.status(), "Tracking status");
                }
                Some(Ok(ConsoleCommand::Stop)) => {
                    stop_tracking(&mut tracker, &mut publisher, local_view.as_mut());
                    info!(status = %tracker.status(), "Tracking status");
                }
                Some(Ok(ConsoleCommand::Quit)) | None => {
                    stop_tracking(&mut tracker, &mut publisher, local_view.as_mut());
                    break;
                }
                Some(Ok(other)) => warn!(command = ?other, "Not available to drivers"),
                Some(Err(e)) => warn!(error = %e, "Unrecognised command"),
            },
        }
    }

    info!(vehicle_id = %config.vehicle_id, "Driver offline");
    Ok(())
}

fn stop_tracking<S: GeoSensor>(
    tracker: &mut DriverTracker<S>,
    publisher: &mut TrackPublisher,
    local_view: Option<&mut FleetView<LogSurface>>,
) {
    let Some(event) = tracker.stop() else {
        return;
    };
    publisher.publish(encode_driver_event(&event));

    if let (Some(view), DriverEvent::StopTracking(vehicle_id)) = (local_view, event) {
        view.handle(FleetUpdate::VehicleRemoved(vehicle_id).into());
    }
}
