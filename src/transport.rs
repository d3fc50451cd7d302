//! Thin helpers over MoQ broadcasts: one track per broadcast, one protobuf message per frame.

use async_stream::stream;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use moq_lite::{
    BroadcastConsumer, BroadcastProducer, OriginConsumer, OriginProducer, Track, TrackConsumer,
    TrackProducer,
};
use tracing::{debug, info};

use crate::error::TrackingError;

/// A broadcast with a single track we write frames to.
///
/// The broadcast stays announced for as long as this value lives.
pub struct TrackPublisher {
    path: String,
    _broadcast: BroadcastProducer,
    track: TrackProducer,
}

impl TrackPublisher {
    pub fn create(
        producer: &OriginProducer,
        path: &str,
        track_name: &str,
    ) -> Result<Self, TrackingError> {
        let mut broadcast = producer
            .create_broadcast(path)
            .ok_or_else(|| TrackingError::BroadcastCreate(path.to_string()))?;
        let track = broadcast.create_track(Track::new(track_name));
        info!(path = %path, track = %track_name, "Broadcast announced");

        Ok(Self {
            path: path.to_string(),
            _broadcast: broadcast,
            track,
        })
    }

    pub fn publish(&mut self, frame: Vec<u8>) {
        self.track.write_frame(frame);
    }
}

impl std::fmt::Debug for TrackPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackPublisher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Every frame of `track_name` on `broadcast`, in order. The stream ends with the track.
pub fn track_frames(
    broadcast: &BroadcastConsumer,
    track_name: &str,
) -> BoxStream<'static, Result<Bytes, TrackingError>> {
    let mut track: TrackConsumer = broadcast.subscribe_track(&Track::new(track_name));

    stream! {
        loop {
            match track.next_group().await {
                Ok(Some(mut group)) => loop {
                    match group.read_frame().await {
                        Ok(Some(frame)) => yield Ok(frame),
                        Ok(None) => break,
                        Err(e) => {
                            debug!(error = %e, "Group ended early");
                            break;
                        }
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    yield Err(TrackingError::from(e));
                    break;
                }
            }
        }
    }
    .boxed()
}

/// Wait until `path` is announced on `consumer`.
///
/// Fails if the path is announced as gone or the announcement stream closes first.
pub async fn wait_for_broadcast(
    consumer: &mut OriginConsumer,
    path: &str,
) -> Result<BroadcastConsumer, TrackingError> {
    loop {
        match consumer.announced().await {
            Some((announced, Some(broadcast))) if announced.as_str() == path => {
                return Ok(broadcast);
            }
            Some((announced, None)) if announced.as_str() == path => {
                return Err(TrackingError::TransportDisconnected(format!(
                    "{path} was unannounced"
                )));
            }
            Some(_) => continue,
            None => {
                return Err(TrackingError::TransportDisconnected(
                    "announcement stream closed".to_string(),
                ));
            }
        }
    }
}
