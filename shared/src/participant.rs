//! The replicated participant entity
//!
//! A participant is one human or AI competitor. Each piece of its state is an
//! individual [`Replicated`] field so the session can broadcast only what
//! changed during a tick. The same type serves both sides: on the server it is
//! constructed with [`Authority::Server`] and mutated through the operations
//! below, on observers it is rebuilt from a snapshot and kept current with
//! [`Participant::apply_change`].

use crate::error::RaceError;
use crate::progress::{CheckpointId, ProgressInfo, Timestamp};
use crate::replicated::{Authority, ChangeRequest, Replicated, RequestTransport};
use crate::{BodyId, ParticipantId};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Longest display name the authority accepts, in characters
pub const MAX_NAME_LEN: usize = 24;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Races for position and can finish
    #[default]
    Racer,
    /// Hunts racers; never ranked and never finishes
    Pursuer,
}

/// A single field update broadcast by the authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldChange {
    Name(String),
    Ready(bool),
    Health(i32),
    Role(Role),
    Body(Option<BodyId>),
    Progress(ProgressInfo),
}

/// Lifecycle events raised by authority-side operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParticipantEvent {
    Died {
        participant: ParticipantId,
    },
    Finished {
        participant: ParticipantId,
        time: Timestamp,
    },
}

/// Complete replicated state, sent when an observer first learns of a participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub id: ParticipantId,
    pub name: String,
    pub is_ai: bool,
    pub role: Role,
    pub ready: bool,
    pub health: i32,
    pub max_health: i32,
    pub body: Option<BodyId>,
    pub progress: ProgressInfo,
}

#[derive(Debug)]
pub struct Participant {
    id: ParticipantId,
    is_ai: bool,
    max_health: i32,
    name: Replicated<String>,
    ready: Replicated<bool>,
    health: Replicated<i32>,
    role: Replicated<Role>,
    body: Replicated<Option<BodyId>>,
    progress: Replicated<ProgressInfo>,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        name: impl Into<String>,
        is_ai: bool,
        role: Role,
        max_health: i32,
        authority: Authority,
    ) -> Self {
        let max_health = max_health.max(1);
        Self {
            id,
            is_ai,
            max_health,
            name: Replicated::new(sanitize_name(&name.into()).unwrap_or_default(), authority),
            ready: Replicated::new(false, authority),
            health: Replicated::new(max_health, authority),
            role: Replicated::new(role, authority),
            body: Replicated::new(None, authority),
            progress: Replicated::new(ProgressInfo::default(), authority),
        }
    }

    /// Rebuilds an observer-side projection from a snapshot
    pub fn from_snapshot(snapshot: ParticipantSnapshot) -> Self {
        let authority = Authority::Observer;
        Self {
            id: snapshot.id,
            is_ai: snapshot.is_ai,
            max_health: snapshot.max_health.max(1),
            name: Replicated::new(snapshot.name, authority),
            ready: Replicated::new(snapshot.ready, authority),
            health: Replicated::new(
                snapshot.health.clamp(0, snapshot.max_health.max(1)),
                authority,
            ),
            role: Replicated::new(snapshot.role, authority),
            body: Replicated::new(snapshot.body, authority),
            progress: Replicated::new(snapshot.progress, authority),
        }
    }

    pub fn snapshot(&self) -> ParticipantSnapshot {
        ParticipantSnapshot {
            id: self.id,
            name: self.name.get().clone(),
            is_ai: self.is_ai,
            role: *self.role.get(),
            ready: *self.ready.get(),
            health: *self.health.get(),
            max_health: self.max_health,
            body: *self.body.get(),
            progress: self.progress.get().clone(),
        }
    }

    pub fn id(&self) -> ParticipantId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.name.get()
    }

    pub fn is_ai(&self) -> bool {
        self.is_ai
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.get()
    }

    pub fn health(&self) -> i32 {
        *self.health.get()
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    pub fn is_alive(&self) -> bool {
        self.health() > 0
    }

    pub fn role(&self) -> Role {
        *self.role.get()
    }

    pub fn body(&self) -> Option<BodyId> {
        *self.body.get()
    }

    pub fn progress(&self) -> &ProgressInfo {
        self.progress.get()
    }

    pub fn is_finished(&self) -> bool {
        self.progress().is_finished()
    }

    pub fn is_authority(&self) -> bool {
        self.ready.is_authority()
    }

    /// Registers a callback for health updates, e.g. to refresh a health bar
    pub fn on_health_change<F>(&mut self, hook: F)
    where
        F: FnMut(&i32) + Send + Sync + 'static,
    {
        self.health.on_change(hook);
    }

    pub fn on_ready_change<F>(&mut self, hook: F)
    where
        F: FnMut(&bool) + Send + Sync + 'static,
    {
        self.ready.on_change(hook);
    }

    pub fn set_ready(&mut self, ready: bool) -> Result<(), RaceError> {
        self.require_authority("set_ready")?;
        self.ready.write(ready)
    }

    /// Validates and writes a display name
    ///
    /// Blank names are ignored and long names truncated.
    pub fn set_name(&mut self, name: &str) -> Result<(), RaceError> {
        self.require_authority("set_name")?;
        match sanitize_name(name) {
            Some(name) => self.name.write(name),
            None => {
                warn!("Participant {}: ignoring blank name", self.id);
                Ok(())
            }
        }
    }

    pub fn set_role(&mut self, role: Role) -> Result<(), RaceError> {
        self.require_authority("set_role")?;
        self.role.write(role)
    }

    pub fn request_ready<R: RequestTransport + ?Sized>(&self, ready: bool, transport: &mut R) -> bool {
        self.ready.request(ready, transport, ChangeRequest::SetReady)
    }

    pub fn request_name<R: RequestTransport + ?Sized>(&self, name: &str, transport: &mut R) -> bool {
        self.name
            .request(name.to_string(), transport, ChangeRequest::SetName)
    }

    /// Subtracts health, reporting death the first time it reaches zero
    ///
    /// Negative amounts count as zero. Once dead further damage is ignored.
    pub fn apply_damage(&mut self, amount: i32) -> Result<Option<ParticipantEvent>, RaceError> {
        self.require_authority("apply_damage")?;

        let current = self.health();
        if current == 0 {
            return Ok(None);
        }

        let next = current.saturating_sub(amount.max(0)).clamp(0, self.max_health);
        self.health.write(next)?;

        if next == 0 {
            info!("Participant {} died", self.id);
            Ok(Some(ParticipantEvent::Died {
                participant: self.id,
            }))
        } else {
            Ok(None)
        }
    }

    pub fn restore_health(&mut self) -> Result<(), RaceError> {
        self.require_authority("restore_health")?;
        self.health.write(self.max_health)
    }

    /// Gives this participant ownership of a body
    ///
    /// A participant owns at most one body; assigning a second one without
    /// releasing the first is refused.
    pub fn assign_body(&mut self, body: BodyId) -> Result<(), RaceError> {
        self.require_authority("assign_body")?;
        match self.body() {
            Some(existing) if existing == body => Ok(()),
            Some(existing) => Err(RaceError::BodyAlreadyAssigned {
                participant: self.id,
                body: existing,
            }),
            None => self.body.write(Some(body)),
        }
    }

    /// Drops ownership of the current body, returning it for destruction
    pub fn release_body(&mut self) -> Result<Option<BodyId>, RaceError> {
        self.require_authority("release_body")?;
        let released = self.body();
        if released.is_some() {
            self.body.write(None)?;
        }
        Ok(released)
    }

    /// Resets progress at the start of a race
    pub fn start_race(&mut self, now: Timestamp) -> Result<(), RaceError> {
        self.require_authority("start_race")?;
        self.progress.write(ProgressInfo::started(now))
    }

    /// Records a checkpoint crossing, finishing on the finish checkpoint
    ///
    /// A crossing after finishing is a no-op.
    pub fn record_checkpoint(
        &mut self,
        checkpoint: CheckpointId,
        finish: CheckpointId,
        now: Timestamp,
    ) -> Result<Option<ParticipantEvent>, RaceError> {
        self.require_authority("record_checkpoint")?;

        if self.is_finished() {
            return Ok(None);
        }

        let next = self.progress().with_checkpoint(checkpoint, finish, now);
        let finished = next.is_finished();
        self.progress.write(next)?;

        if finished {
            info!("Participant {} finished at {:.2}s", self.id, now);
            Ok(Some(ParticipantEvent::Finished {
                participant: self.id,
                time: now,
            }))
        } else {
            Ok(None)
        }
    }

    /// Collects the fields written since the last drain
    pub fn drain_changes(&mut self) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        if self.name.take_dirty() {
            changes.push(FieldChange::Name(self.name.get().clone()));
        }
        if self.ready.take_dirty() {
            changes.push(FieldChange::Ready(*self.ready.get()));
        }
        if self.health.take_dirty() {
            changes.push(FieldChange::Health(*self.health.get()));
        }
        if self.role.take_dirty() {
            changes.push(FieldChange::Role(*self.role.get()));
        }
        if self.body.take_dirty() {
            changes.push(FieldChange::Body(*self.body.get()));
        }
        if self.progress.take_dirty() {
            changes.push(FieldChange::Progress(self.progress.get().clone()));
        }
        changes
    }

    /// Applies a broadcast field update on an observer
    pub fn apply_change(&mut self, change: FieldChange) {
        match change {
            FieldChange::Name(name) => self.name.apply_remote(name),
            FieldChange::Ready(ready) => self.ready.apply_remote(ready),
            FieldChange::Health(health) => {
                self.health.apply_remote(health.clamp(0, self.max_health))
            }
            FieldChange::Role(role) => self.role.apply_remote(role),
            FieldChange::Body(body) => self.body.apply_remote(body),
            FieldChange::Progress(progress) => self.progress.apply_remote(progress),
        }
    }

    fn require_authority(&self, operation: &'static str) -> Result<(), RaceError> {
        if self.is_authority() {
            Ok(())
        } else {
            warn!(
                "Participant {}: {} denied outside the authority",
                self.id, operation
            );
            Err(RaceError::PermissionDenied { operation })
        }
    }
}

fn sanitize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(MAX_NAME_LEN).collect())
    }
}
