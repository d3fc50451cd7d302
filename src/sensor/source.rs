use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{GeoSample, GeoSensor, SampleStream, SensorError, SensorOptions, SensorUnavailable};

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Sample(GeoSample),
    /// The watch failed and the source is halted until restarted.
    Failed(SensorError),
}

#[derive(Debug)]
enum WatchState {
    Idle,
    Watching {
        task: JoinHandle<()>,
        events: mpsc::Receiver<SourceEvent>,
    },
    Halted,
}

/// Start/stop lifecycle around a [`GeoSensor`].
///
/// `start` and `stop` are idempotent. Once `stop` returns, no further sample is delivered: the
/// forwarding task is aborted and its channel dropped.
#[derive(Debug)]
pub struct GeoSampleSource<S> {
    sensor: S,
    options: SensorOptions,
    state: WatchState,
}

impl<S: GeoSensor> GeoSampleSource<S> {
    pub fn new(sensor: S, options: SensorOptions) -> Self {
        Self {
            sensor,
            options,
            state: WatchState::Idle,
        }
    }

    pub fn is_watching(&self) -> bool {
        matches!(self.state, WatchState::Watching { .. })
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.state, WatchState::Halted)
    }

    /// Begin watching. Returns `Ok(false)` without side effects when already watching.
    ///
    /// A halted source is restarted.
    pub fn start(&mut self) -> Result<bool, SensorUnavailable> {
        if self.is_watching() {
            return Ok(false);
        }

        let stream = self.sensor.watch(&self.options)?;
        let (tx, events) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(forward_samples(stream, tx, self.options.timeout));

        self.state = WatchState::Watching { task, events };
        info!(
            high_accuracy = self.options.high_accuracy,
            timeout_ms = self.options.timeout.as_millis(),
            "Position watch started"
        );
        Ok(true)
    }

    /// Cancel the watch. Returns whether tracking was running (watching or halted), in which
    /// case the caller should announce that tracking ended.
    pub fn stop(&mut self) -> bool {
        match std::mem::replace(&mut self.state, WatchState::Idle) {
            WatchState::Idle => false,
            WatchState::Watching { task, events } => {
                task.abort();
                drop(events);
                info!("Position watch stopped");
                true
            }
            WatchState::Halted => true,
        }
    }

    /// Wait for the next event. Pends forever while not watching.
    pub async fn next(&mut self) -> SourceEvent {
        let WatchState::Watching { events, .. } = &mut self.state else {
            return std::future::pending().await;
        };

        let event = events
            .recv()
            .await
            .unwrap_or(SourceEvent::Failed(SensorError::Ended));

        if let SourceEvent::Failed(e) = &event {
            warn!(error = %e, "Position watch halted");
            self.state = WatchState::Halted;
        }
        event
    }
}

impl<S> Drop for GeoSampleSource<S> {
    fn drop(&mut self) {
        if let WatchState::Watching { task, .. } = &self.state {
            task.abort();
        }
    }
}

async fn forward_samples(
    mut stream: SampleStream,
    tx: mpsc::Sender<SourceEvent>,
    timeout: Duration,
) {
    loop {
        let next = if timeout.is_zero() {
            Ok(stream.next().await)
        } else {
            tokio::time::timeout(timeout, stream.next()).await
        };

        let event = match next {
            Ok(Some(Ok(sample))) => SourceEvent::Sample(sample),
            Ok(Some(Err(e))) => SourceEvent::Failed(e),
            Ok(None) => SourceEvent::Failed(SensorError::Ended),
            Err(_) => SourceEvent::Failed(SensorError::Timeout(timeout)),
        };

        let failed = matches!(event, SourceEvent::Failed(_));
        if tx.send(event).await.is_err() {
            debug!("Position receiver dropped");
            break;
        }
        if failed {
            break;
        }
    }
}
