use anyhow::{Result, anyhow};
use fleet_tracker::config::HubConfig;
use fleet_tracker::event::FleetUpdate;
use fleet_tracker::hub::{DriverInput, FleetHub, HubInput};
use fleet_tracker::position::Timestamp;
use fleet_tracker::session::DriverSessionId;
use fleet_tracker::state_machine::StateMachine;
use fleet_tracker::state_machine::wrappers::input::system::SystemResource;
use fleet_tracker::transport::{TrackPublisher, track_frames};
use fleet_tracker::vehicle::VehicleId;
use fleet_tracker::wire::{decode_driver_event, encode_fleet_update};
use fleet_tracker::{
    EVENTS_TRACK, FLEET_PREFIX, HUB_BROADCAST, POSITION_TRACK, connect_bidirectional,
};
use futures::StreamExt;
use moq_lite::BroadcastConsumer;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

const CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let config = HubConfig::from_env()?;

    info!(relay = %config.relay_url, "Hub connecting to relay");

    let (_session, producer, consumer) = connect_bidirectional(&config.relay_url).await?;
    let mut publisher = TrackPublisher::create(&producer, HUB_BROADCAST, EVENTS_TRACK)?;

    let mut announcements = consumer
        .with_root(FLEET_PREFIX)
        .ok_or_else(|| anyhow!("{FLEET_PREFIX} prefix not authorized"))?;

    let (tx, mut rx) = mpsc::channel::<HubInput>(CHANNEL_CAPACITY);
    let mut hub = FleetHub::new();
    let mut snapshot_ticker = interval(config.snapshot_interval);

    info!("Waiting for drivers to connect...");

    loop {
        let input = tokio::select! {
            announced = announcements.announced() => match announced {
                Some((path, Some(broadcast))) => {
                    let vehicle_id = VehicleId::from(path.to_string());
                    match hub.announce(&vehicle_id) {
                        Ok(session_id) => {
                            spawn_driver_reader(vehicle_id, session_id, broadcast, tx.clone());
                        }
                        Err(e) => warn!(error = %e, "Ignoring duplicate driver broadcast"),
                    }
                    continue;
                }
                Some((path, None)) => HubInput::Unannounced(VehicleId::from(path.to_string())),
                None => {
                    info!("Announcement stream closed");
                    break;
                }
            },

            Some(input) = rx.recv() => input,

            _ = snapshot_ticker.tick() => HubInput::Snapshot,
        };

        hub.process_input(input);
        publish(&mut hub, &mut publisher);
    }

    Ok(())
}

fn publish(hub: &mut FleetHub, publisher: &mut TrackPublisher) {
    while let Some(update) = hub.poll_output() {
        if let FleetUpdate::VehicleRemoved(vehicle_id) = &update {
            info!(vehicle_id = %vehicle_id, "Vehicle removed");
        }
        publisher.publish(encode_fleet_update(&update));
    }
}

fn spawn_driver_reader(
    vehicle_id: VehicleId,
    session_id: DriverSessionId,
    broadcast: BroadcastConsumer,
    tx: mpsc::Sender<HubInput>,
) {
    tokio::spawn(async move {
        if let Err(e) = run_driver_reader(&vehicle_id, session_id, &broadcast, &tx).await {
            error!(vehicle_id = %vehicle_id, error = %e, "Driver reader error");
        }
        let _ = tx
            .send(HubInput::Driver {
                vehicle_id,
                session_id,
                input: DriverInput::Departed,
            })
            .await;
    });
}

async fn run_driver_reader(
    vehicle_id: &VehicleId,
    session_id: DriverSessionId,
    broadcast: &BroadcastConsumer,
    tx: &mpsc::Sender<HubInput>,
) -> Result<()> {
    let mut frames = track_frames(broadcast, POSITION_TRACK);

    while let Some(frame) = frames.next().await {
        let event = match decode_driver_event(frame?) {
            Ok(event) => event,
            Err(e) => {
                warn!(vehicle_id = %vehicle_id, error = %e, "Dropping undecodable frame");
                continue;
            }
        };

        let input = HubInput::Driver {
            vehicle_id: vehicle_id.clone(),
            session_id,
            input: DriverInput::Event {
                event,
                received_at: Timestamp::generate(),
            },
        };
        tx.send(input).await.map_err(|_| anyhow!("hub loop closed"))?;
    }

    info!(vehicle_id = %vehicle_id, "Position track closed");
    Ok(())
}
