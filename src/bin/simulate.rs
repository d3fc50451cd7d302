use anyhow::Result;
use fleet_tracker::config::SimulatorConfig;
use fleet_tracker::console::{ConsoleCommand, stdin_commands};
use fleet_tracker::event::{FleetEvent, FleetUpdate};
use fleet_tracker::fleet_view::FleetView;
use fleet_tracker::position::Timestamp;
use fleet_tracker::routes::{DEFAULT_CENTER, DEFAULT_ZOOM, demo_fleet, demo_routes, plan_route};
use fleet_tracker::state_machine::StateMachine;
use fleet_tracker::state_machine::simulator::{RouteSimulator, SimulatorInput, SimulatorOutput};
use fleet_tracker::state_machine::wrappers::input::system::SystemResource;
use fleet_tracker::surface::{LogSurface, MapSurface};
use futures::StreamExt;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let config = SimulatorConfig::from_env()?;

    let mut simulator = RouteSimulator::new(demo_routes(), demo_fleet());
    let mut view = FleetView::new(LogSurface, config.line_filter.clone());

    info!(
        center = %DEFAULT_CENTER,
        zoom = DEFAULT_ZOOM,
        vehicles = simulator.vehicles().len(),
        tick_ms = config.tick.as_millis(),
        "Public map starting; type `line <id>`, `line all` or `plan <origin> -> <destination>`"
    );

    let now = Timestamp::generate();
    view.start_simulation(simulator.positions(now), now);
    info!(status = %view.status(), "Simulation started");

    let mut ticker = interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut commands = stdin_commands();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Timestamp::generate();
                advance(&mut simulator, &mut view, now);
            }

            command = commands.next() => match command {
                Some(Ok(ConsoleCommand::Line(filter))) => {
                    view.handle(FleetEvent::FilterChanged(filter));
                    info!(status = %view.status(), "Filter applied");
                }
                Some(Ok(ConsoleCommand::Plan { origin, destination })) => {
                    info!("{}", plan_route(&origin, &destination));
                }
                Some(Ok(ConsoleCommand::Quit)) | None => break,
                Some(Ok(other)) => warn!(command = ?other, "Not available on the public map"),
                Some(Err(e)) => warn!(error = %e, "Unrecognised command"),
            },
        }
    }

    Ok(())
}

/// One simulation tick: move every vehicle, then push the new positions through the view.
fn advance<S: MapSurface>(
    simulator: &mut RouteSimulator,
    view: &mut FleetView<S>,
    now: Timestamp,
) {
    simulator.process_input(SimulatorInput::Tick(now));

    while let Some(SimulatorOutput::Moved(position)) = simulator.poll_output() {
        view.handle_at(FleetUpdate::PositionUpdate(position.to_report()).into(), now);
    }
}
