//! # Shared race coordination library
//!
//! Types and logic used by both the authoritative server and its observers:
//! replicated fields, the participant entity, progress tracking and ranking,
//! body reconciliation, observer state machines and the wire protocol.
//!
//! Nothing in this crate performs I/O. The server and client crates wrap it
//! with sockets and a fixed-rate tick.

pub mod body;
pub mod error;
pub mod observer;
pub mod participant;
pub mod phase;
pub mod progress;
pub mod replicated;
pub mod steering;

use serde::{Deserialize, Serialize};

pub use body::{BodyKind, BodyReconciler, BodySample, BodyTransform, DriveInput, ReconcilerSet};
pub use error::RaceError;
pub use observer::{AgentObserver, AgentState, ClientObserver, ClientState, ObserverView};
pub use participant::{FieldChange, Participant, ParticipantEvent, ParticipantSnapshot, Role};
pub use phase::{PhaseKind, RaceSessionData, SessionView};
pub use progress::{Checkpoint, CheckpointId, CheckpointSequence, ProgressInfo, Standing, Timestamp};
pub use replicated::{Authority, ChangeRequest, Replicated, RequestQueue, RequestTransport};

pub type ParticipantId = u32;
pub type BodyId = u32;

pub const PROTOCOL_VERSION: u32 = 1;
pub const DEFAULT_MAX_HEALTH: i32 = 100;
pub const DEFAULT_TICK_RATE: u32 = 60;
/// Per-tick blend factor for remote bodies
pub const RECONCILE_ALPHA: f32 = 0.2;
pub const CONNECTION_TIMEOUT_SECS: u64 = 5;
pub const MAX_PACKET_SIZE: usize = 8192;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
    },
    Request(ChangeRequest),
    /// Keeps an idle connection from timing out
    Heartbeat,
    Disconnect,

    Connected {
        participant_id: ParticipantId,
    },
    Snapshot {
        participants: Vec<ParticipantSnapshot>,
        session: SessionView,
        track: Option<CheckpointSequence>,
    },
    ParticipantJoined(ParticipantSnapshot),
    ParticipantLeft {
        participant: ParticipantId,
    },
    FieldUpdate {
        participant: ParticipantId,
        change: FieldChange,
    },
    Session(SessionView),
    Track(Option<CheckpointSequence>),
    Standings {
        entries: Vec<Standing>,
    },
    BodySamples {
        tick: u32,
        time: Timestamp,
        samples: Vec<(BodyId, BodySample)>,
    },
    BodyRemoved {
        body: BodyId,
    },
    Disconnected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect {
            client_version: 42,
            name: "Ada".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Connect {
                client_version,
                name,
            } => {
                assert_eq!(client_version, 42);
                assert_eq!(name, "Ada");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_request() {
        let packet = Packet::Request(ChangeRequest::Drive(DriveInput::new(0.5, -1.0)));
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Request(ChangeRequest::Drive(input)) => {
                assert_eq!(input.throttle, 0.5);
                assert_eq!(input.steer, -1.0);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_unfinished_progress_survives_the_wire() {
        let packet = Packet::FieldUpdate {
            participant: 3,
            change: FieldChange::Progress(ProgressInfo::started(2.5)),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::FieldUpdate {
                participant,
                change: FieldChange::Progress(progress),
            } => {
                assert_eq!(participant, 3);
                assert!(!progress.is_finished());
                assert_eq!(progress.finish_time, f64::INFINITY);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_body_samples_fit_in_a_datagram() {
        let samples: Vec<(BodyId, BodySample)> = (0..32)
            .map(|id| {
                (
                    id,
                    BodySample::at_rest(Vec3::new(id as f32, 0.0, 0.0), Quat::IDENTITY, 1.0),
                )
            })
            .collect();
        let packet = Packet::BodySamples {
            tick: 10,
            time: 1.0,
            samples,
        };

        let serialized = bincode::serialize(&packet).unwrap();
        assert!(serialized.len() < MAX_PACKET_SIZE);
    }
}
