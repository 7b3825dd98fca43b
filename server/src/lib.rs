//! # Race Server Library
//!
//! The authoritative side of a multiplayer race. It owns the race session,
//! the only place participant state is ever written, and drives it at a fixed
//! tick from a single task.
//!
//! ## Core Responsibilities
//!
//! ### Race Lifecycle
//! The session moves between `Idle`, `Intermission` and `Race`. Transitions
//! are decided once per tick from a small set of facts (how many participants
//! are ready, whether the countdown has elapsed, whether the race is settled),
//! so phase changes never race with packet handling.
//!
//! ### Participants and Progress
//! Humans and AI agents are both participants. Each carries replicated fields
//! (name, ready, health, role, body, progress) that only the session writes.
//! Observers ask for changes with requests; the session validates and applies
//! them at the start of the next tick.
//!
//! ### Body Sync
//! Every tick during a race the session reads each body from the physics
//! provider and broadcasts the samples. Clients reconcile toward them.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! Network receive, send and timeout checks run in their own tasks and talk
//! to the tick loop through channels. All session mutation happens inside
//! the tick loop.
//!
//! ### Pluggable Collaborators
//! Track generation and physics sit behind the [`track::TrackProvider`] and
//! [`world::BodyProvider`] traits. The binary uses a procedural loop track
//! and a kinematic car world; tests substitute deterministic fakes.
//!
//! ## Module Organization
//!
//! - [`session`]: the race session state machine
//! - [`ai`]: in-process AI agents that behave like remote observers
//! - [`client_manager`]: address to participant bookkeeping and timeouts
//! - [`network`]: UDP tasks and the tick loop
//! - [`track`], [`world`]: default collaborators
//! - [`config`]: session tunables

pub mod ai;
pub mod client_manager;
pub mod config;
pub mod network;
pub mod session;
pub mod track;
pub mod world;
