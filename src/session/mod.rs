//! Driver sessions tracked by the hub, one per announced vehicle broadcast.
//!
//! A session id ties every input from a driver's reader task to the announcement that spawned
//! it, so inputs from a departed or replaced broadcast can be told apart from current ones.

pub mod error;

use std::fmt;

use dashmap::{DashMap, Entry};
use uuid::Uuid;

use self::error::{SessionAlreadyActive, SessionNotFound};
use crate::vehicle::VehicleId;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct DriverSessionId(Uuid);

impl DriverSessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for DriverSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Default)]
pub struct DriverSessionMap {
    sessions: DashMap<VehicleId, DriverSessionId, ahash::RandomState>,
}

impl DriverSessionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(
        &self,
        vehicle_id: &VehicleId,
    ) -> Result<DriverSessionId, SessionAlreadyActive> {
        match self.sessions.entry(vehicle_id.clone()) {
            Entry::Occupied(_) => Err(SessionAlreadyActive {
                vehicle_id: vehicle_id.clone(),
            }),
            Entry::Vacant(slot) => Ok(*slot.insert(DriverSessionId::generate())),
        }
    }

    pub fn remove_session(
        &self,
        vehicle_id: &VehicleId,
    ) -> Result<DriverSessionId, SessionNotFound> {
        self.sessions
            .remove(vehicle_id)
            .map(|(_, session_id)| session_id)
            .ok_or_else(|| SessionNotFound {
                vehicle_id: vehicle_id.clone(),
            })
    }

    /// Remove the session only if it is still the one identified by `session_id`.
    pub fn end_session(&self, vehicle_id: &VehicleId, session_id: &DriverSessionId) -> bool {
        self.sessions
            .remove_if(vehicle_id, |_, current| current == session_id)
            .is_some()
    }

    /// Whether `session_id` is the live session for `vehicle_id`.
    pub fn is_current(&self, vehicle_id: &VehicleId, session_id: &DriverSessionId) -> bool {
        self.sessions
            .get(vehicle_id)
            .is_some_and(|current| *current == *session_id)
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> VehicleId {
        VehicleId::from("BUS_CH_001")
    }

    #[test]
    fn test_one_session_per_vehicle() {
        let map = DriverSessionMap::new();
        let session_id = map.create_session(&bus()).unwrap();

        let result = map.create_session(&bus());
        assert!(matches!(result, Err(SessionAlreadyActive { .. })));
        assert!(map.is_current(&bus(), &session_id));
        assert_eq!(map.active_session_count(), 1);
    }

    #[test]
    fn test_remove_returns_session_once() {
        let map = DriverSessionMap::new();
        let session_id = map.create_session(&bus()).unwrap();

        assert_eq!(map.remove_session(&bus()).unwrap(), session_id);
        assert!(matches!(
            map.remove_session(&bus()),
            Err(SessionNotFound { .. })
        ));
        assert!(!map.is_current(&bus(), &session_id));
    }

    #[test]
    fn test_replaced_session_cannot_be_ended_by_old_id() {
        let map = DriverSessionMap::new();
        let first = map.create_session(&bus()).unwrap();
        map.remove_session(&bus()).unwrap();

        let second = map.create_session(&bus()).unwrap();
        assert_ne!(first, second);
        assert!(!map.end_session(&bus(), &first));
        assert!(!map.is_current(&bus(), &first));
        assert!(map.is_current(&bus(), &second));

        assert!(map.end_session(&bus(), &second));
        assert_eq!(map.active_session_count(), 0);
    }
}
