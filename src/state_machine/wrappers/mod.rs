//! Helpers for the impure runners that own a [`StateMachine`](super::StateMachine).
//!
//! Runners read system resources such as the wall clock and pass them into the machines as input,
//! keeping the machines themselves deterministic.

pub mod input;
