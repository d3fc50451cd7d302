//! Error types for location sensing.

use std::time::Duration;

/// Location sensing is not available at all. Tracking stays disabled for the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("location sensing unavailable: {reason}")]
pub struct SensorUnavailable {
    pub reason: String,
}

/// A failure while a sensor is streaming. Tracking halts until the user restarts it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("sensor failed: {0}")]
    Stream(String),

    #[error("no position received within {0:?}")]
    Timeout(Duration),

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("position stream ended")]
    Ended,
}
