//! The hub's merge of every driver broadcast into one fleet feed.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::event::{DriverEvent, FleetUpdate};
use crate::position::{PositionReport, Timestamp};
use crate::session::error::SessionAlreadyActive;
use crate::session::{DriverSessionId, DriverSessionMap};
use crate::state_machine::StateMachine;
use crate::state_machine::fleet::{FleetInput, FleetOutput, FleetStore, RejectedReport};
use crate::vehicle::VehicleId;

/// What a driver reader task hands to the hub loop.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverInput {
    Event {
        event: DriverEvent,
        received_at: Timestamp,
    },
    /// The driver's position track ended.
    Departed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HubInput {
    /// Input from the reader task of one driver session.
    Driver {
        vehicle_id: VehicleId,
        session_id: DriverSessionId,
        input: DriverInput,
    },
    /// The relay withdrew the vehicle's broadcast.
    Unannounced(VehicleId),
    /// Republish the whole fleet.
    Snapshot,
}

/// Fleet state as merged by the hub, plus the sessions of the drivers feeding it.
///
/// Every input is checked against the session it came from. Anything a reader task queued before
/// its broadcast was withdrawn or replaced is dropped, so a departed vehicle stays removed.
#[derive(Debug, Default)]
pub struct FleetHub {
    store: FleetStore,
    sessions: DriverSessionMap,
    pending: VecDeque<FleetUpdate>,
}

impl FleetHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for a newly announced driver broadcast.
    pub fn announce(
        &self,
        vehicle_id: &VehicleId,
    ) -> Result<DriverSessionId, SessionAlreadyActive> {
        let session_id = self.sessions.create_session(vehicle_id)?;
        info!(vehicle_id = %vehicle_id, session_id = %session_id, "Driver discovered");
        Ok(session_id)
    }

    pub fn store(&self) -> &FleetStore {
        &self.store
    }

    pub fn active_drivers(&self) -> usize {
        self.sessions.active_session_count()
    }

    fn apply_driver(
        &mut self,
        vehicle_id: VehicleId,
        session_id: DriverSessionId,
        input: DriverInput,
    ) {
        match input {
            DriverInput::Event { event, received_at } => {
                if !self.sessions.is_current(&vehicle_id, &session_id) {
                    debug!(
                        vehicle_id = %vehicle_id,
                        session_id = %session_id,
                        "Dropping input from ended session"
                    );
                    return;
                }
                if claimed_vehicle(&event) != &vehicle_id {
                    warn!(
                        vehicle_id = %vehicle_id,
                        claimed = %claimed_vehicle(&event),
                        "Dropping frame for another vehicle"
                    );
                    return;
                }

                match event {
                    DriverEvent::SendPosition(report) => {
                        self.apply_store(FleetInput::Upsert {
                            report,
                            received_at,
                        });
                    }
                    DriverEvent::StopTracking(_) => {
                        info!(vehicle_id = %vehicle_id, "Driver stopped tracking");
                        self.apply_store(FleetInput::Remove(vehicle_id));
                    }
                }
            }
            DriverInput::Departed => {
                if self.sessions.end_session(&vehicle_id, &session_id) {
                    info!(vehicle_id = %vehicle_id, "Driver track closed");
                    self.apply_store(FleetInput::Remove(vehicle_id));
                }
            }
        }
    }

    fn unannounce(&mut self, vehicle_id: VehicleId) {
        if self.sessions.remove_session(&vehicle_id).is_ok() {
            info!(vehicle_id = %vehicle_id, "Driver departed");
            self.apply_store(FleetInput::Remove(vehicle_id));
        }
    }

    fn snapshot(&mut self) {
        let reports: Vec<PositionReport> = self
            .store
            .get_all()
            .iter()
            .map(|position| position.to_report())
            .collect();
        debug!(
            vehicles = reports.len(),
            drivers = self.sessions.active_session_count(),
            "Publishing snapshot"
        );
        self.pending.push_back(FleetUpdate::FullSnapshot(reports));
    }

    fn apply_store(&mut self, input: FleetInput) {
        self.store.process_input(input);

        while let Some(output) = self.store.poll_output() {
            let update = match output {
                FleetOutput::Upserted(position) => {
                    FleetUpdate::PositionUpdate(position.to_report())
                }
                FleetOutput::Removed(vehicle_id) => FleetUpdate::VehicleRemoved(vehicle_id),
                FleetOutput::Cleared => continue,
                FleetOutput::Rejected(RejectedReport::Stale(e)) => {
                    debug!(error = %e, "Dropping out-of-order position");
                    continue;
                }
                FleetOutput::Rejected(RejectedReport::Invalid(e)) => {
                    warn!(error = %e, "Dropping invalid position");
                    continue;
                }
            };
            self.pending.push_back(update);
        }
    }
}

fn claimed_vehicle(event: &DriverEvent) -> &VehicleId {
    match event {
        DriverEvent::SendPosition(report) => &report.vehicle_id,
        DriverEvent::StopTracking(vehicle_id) => vehicle_id,
    }
}

impl StateMachine for FleetHub {
    type Input = HubInput;
    type Output = FleetUpdate;

    fn process_input(&mut self, input: Self::Input) {
        match input {
            HubInput::Driver {
                vehicle_id,
                session_id,
                input,
            } => self.apply_driver(vehicle_id, session_id, input),
            HubInput::Unannounced(vehicle_id) => self.unannounce(vehicle_id),
            HubInput::Snapshot => self.snapshot(),
        }
    }

    fn poll_output(&mut self) -> Option<Self::Output> {
        self.pending.pop_front()
    }
}
