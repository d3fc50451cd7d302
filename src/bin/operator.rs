use anyhow::Result;
use fleet_tracker::config::OperatorConfig;
use fleet_tracker::console::{ConsoleCommand, ParseCommandError, stdin_commands};
use fleet_tracker::event::{ConnectionStatus, FleetEvent};
use fleet_tracker::fleet_view::FleetView;
use fleet_tracker::surface::LogSurface;
use fleet_tracker::transport::{track_frames, wait_for_broadcast};
use fleet_tracker::wire::decode_fleet_update;
use fleet_tracker::{EVENTS_TRACK, HUB_BROADCAST, connect_bidirectional};
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{info, warn};

type Commands = BoxStream<'static, Result<ConsoleCommand, ParseCommandError>>;

/// Why a connection to the hub feed ended.
enum Outcome {
    Quit,
    Lost,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let config = OperatorConfig::from_env()?;

    let mut view = FleetView::new(LogSurface, config.line_filter.clone());
    let mut commands = stdin_commands();

    info!(
        relay = %config.relay_url,
        filter = %view.filter(),
        "Operator starting; type `line <id>` or `line all`"
    );

    loop {
        match follow_hub(&config, &mut view, &mut commands).await {
            Ok(Outcome::Quit) => break,
            Ok(Outcome::Lost) => warn!("Hub feed closed"),
            Err(e) => warn!(error = %e, "Hub connection failed"),
        }

        view.handle(FleetEvent::Connection(ConnectionStatus::Disconnected));
        warn!(status = %view.status(), retry_in = ?config.retry_delay, "Reconnecting");
        tokio::time::sleep(config.retry_delay).await;
    }

    info!(vehicles = view.store().len(), "Operator stopped");
    Ok(())
}

async fn follow_hub(
    config: &OperatorConfig,
    view: &mut FleetView<LogSurface>,
    commands: &mut Commands,
) -> Result<Outcome> {
    let (_session, _producer, mut consumer) = connect_bidirectional(&config.relay_url).await?;
    let broadcast = wait_for_broadcast(&mut consumer, HUB_BROADCAST).await?;
    let mut frames = track_frames(&broadcast, EVENTS_TRACK);

    view.handle(FleetEvent::Connection(ConnectionStatus::Connected));
    info!(status = %view.status(), "Hub feed subscribed");

    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(frame)) => match decode_fleet_update(frame) {
                    Ok(update) => view.handle(update.into()),
                    Err(e) => warn!(error = %e, "Dropping undecodable fleet frame"),
                },
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(Outcome::Lost),
            },

            command = commands.next() => match command {
                Some(Ok(ConsoleCommand::Line(filter))) => {
                    view.handle(FleetEvent::FilterChanged(filter));
                    info!(
                        status = %view.status(),
                        visible = view.reconciler().visible_count(),
                        "Filter applied"
                    );
                }
                Some(Ok(ConsoleCommand::Quit)) | None => return Ok(Outcome::Quit),
                Some(Ok(other)) => warn!(command = ?other, "Not available to operators"),
                Some(Err(e)) => warn!(error = %e, "Unrecognised command"),
            },
        }
    }
}
