//! # Race Client Library
//!
//! A headless observer of a race session. The client never owns participant
//! state: it keeps read-only projections that the server updates through
//! field broadcasts, and it asks for changes (ready, name, drive input) with
//! fire-and-forget requests.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Local projection of the session:
//! - Participant projections and the session view mirror
//! - Track and live standings
//! - One body reconciler per remote body, blending toward server samples
//! - The client observer machine (start menu, intermission, race, spectate, death)
//! - An optional autopilot that steers toward the next checkpoint
//!
//! ### Network Module (`network`)
//! UDP plumbing around the game module:
//! - Connection handshake and protocol version
//! - Request flushing and heartbeats
//! - Optional simulated latency for testing reconciliation

pub mod game;
pub mod network;
