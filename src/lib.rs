pub mod config;
pub mod console;
pub mod error;
pub mod event;
pub mod fleet_view;
pub mod hub;
pub mod position;
pub mod routes;
pub mod sensor;
pub mod session;
pub mod state_machine;
pub mod surface;
pub mod tracking;
pub mod transport;
pub mod vehicle;
pub mod wire;

use anyhow::Result;
use moq_lite::{Client, Origin, Session};
use url::Url;
use web_transport_quinn::ClientBuilder;

/// Prefix under which every driver announces its broadcast.
pub const FLEET_PREFIX: &str = "fleet/";

/// Broadcast the hub republishes the merged fleet on.
pub const HUB_BROADCAST: &str = "hub/fleet";

/// Track carrying `DriverMessage` frames on a driver broadcast.
pub const POSITION_TRACK: &str = "position";

/// Track carrying `FleetEnvelope` frames on the hub broadcast.
pub const EVENTS_TRACK: &str = "events";

/// Broadcast path for a driver's outbound positions.
/// Published by the driver, consumed by the hub.
pub fn driver_broadcast_path(vehicle_id: &str) -> String {
    format!("{FLEET_PREFIX}{vehicle_id}")
}

/// Connect to the relay as a publisher + subscriber (bidirectional).
/// Returns the session handle and the origin producer/consumer pair.
pub async fn connect_bidirectional(
    relay_url: &str,
) -> Result<(Session, moq_lite::OriginProducer, moq_lite::OriginConsumer)> {
    let pub_origin = Origin::produce();
    let sub_origin = Origin::produce();

    let wt_client = ClientBuilder::new()
        .dangerous()
        .with_no_certificate_verification()?;
    let wt_session = wt_client.connect(relay_url.parse::<Url>()?).await?;

    let client = Client::new()
        .with_publish(pub_origin.consumer)
        .with_consume(sub_origin.producer);
    let session = client.connect(wt_session).await?;

    Ok((session, pub_origin.producer, sub_origin.consumer))
}
