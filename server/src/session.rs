//! The authoritative race session
//!
//! [`RaceSession`] owns every participant and body and moves the session
//! through `Idle -> Intermission -> Race -> Intermission -> ...`. It is driven
//! by a fixed-rate [`RaceSession::tick`]: queued inputs are applied in arrival
//! order first, then the current phase runs, then transitions are evaluated
//! and finally every change made during the tick is turned into packets for
//! broadcast.
//!
//! Transition rules live in the pure [`next_phase`] function so they can be
//! audited and tested without a session. Delays are deadlines on the session
//! clock checked each tick, so abandoning a countdown is simply not checking
//! it any more.

use crate::config::SessionConfig;
use crate::track::TrackProvider;
use crate::world::{BodyEvent, BodyProvider};
use glam::{Quat, Vec3};
use log::{debug, info, warn};
use shared::progress::rank;
use shared::{
    Authority, BodyId, BodyKind, BodySample, BodyTransform, ChangeRequest, CheckpointId,
    CheckpointSequence, Packet, Participant, ParticipantEvent, ParticipantId, PhaseKind,
    RaceError, RaceSessionData, Replicated, Role, SessionView, Standing, Timestamp,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Work queued for the next tick by the network layer or the AI driver
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Join {
        participant: ParticipantId,
        name: String,
        is_ai: bool,
        role: Role,
    },
    Leave {
        participant: ParticipantId,
    },
    Request {
        participant: ParticipantId,
        request: ChangeRequest,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceStage {
    /// Waiting for the track provider to finish
    AwaitingTrack,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Intermission {
        deadline: Option<Timestamp>,
        ready: BTreeSet<ParticipantId>,
    },
    Race {
        stage: RaceStage,
    },
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Idle => PhaseKind::Idle,
            Phase::Intermission { .. } => PhaseKind::Intermission,
            Phase::Race { .. } => PhaseKind::Race,
        }
    }
}

/// What the transition rules look at each tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionFacts {
    pub ready_count: usize,
    pub countdown_elapsed: bool,
    pub race_empty: bool,
    pub race_settled: bool,
}

/// Picks the phase the session should be in given the current facts
pub fn next_phase(current: PhaseKind, facts: &SessionFacts) -> PhaseKind {
    match current {
        PhaseKind::Idle if facts.ready_count > 0 => PhaseKind::Intermission,
        PhaseKind::Intermission if facts.ready_count == 0 => PhaseKind::Idle,
        PhaseKind::Intermission if facts.countdown_elapsed => PhaseKind::Race,
        PhaseKind::Race if facts.race_empty => PhaseKind::Idle,
        PhaseKind::Race if facts.race_settled => PhaseKind::Intermission,
        other => other,
    }
}

/// Edges of the session graph
pub fn is_allowed(from: PhaseKind, to: PhaseKind) -> bool {
    matches!(
        (from, to),
        (PhaseKind::Idle, PhaseKind::Intermission)
            | (PhaseKind::Intermission, PhaseKind::Idle)
            | (PhaseKind::Intermission, PhaseKind::Race)
            | (PhaseKind::Race, PhaseKind::Intermission)
            | (PhaseKind::Race, PhaseKind::Idle)
    )
}

pub struct RaceSession<T: TrackProvider, B: BodyProvider> {
    config: SessionConfig,
    tracks: T,
    bodies: B,
    phase: Phase,
    participants: BTreeMap<ParticipantId, Participant>,
    inbox: Vec<SessionInput>,
    outbox: Vec<Packet>,
    current_race: Option<RaceSessionData>,
    previous_race: Option<RaceSessionData>,
    track: Option<CheckpointSequence>,
    standings: Vec<Standing>,
    pending_respawns: HashMap<ParticipantId, Timestamp>,
    published: Replicated<SessionView>,
    race_counter: u32,
    tick: u32,
    now: Timestamp,
}

impl<T: TrackProvider, B: BodyProvider> RaceSession<T, B> {
    pub fn new(config: SessionConfig, tracks: T, bodies: B) -> Self {
        Self {
            config,
            tracks,
            bodies,
            phase: Phase::Idle,
            participants: BTreeMap::new(),
            inbox: Vec::new(),
            outbox: Vec::new(),
            current_race: None,
            previous_race: None,
            track: None,
            standings: Vec::new(),
            pending_respawns: HashMap::new(),
            published: Replicated::new(SessionView::default(), Authority::Server),
            race_counter: 0,
            tick: 0,
            now: 0.0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn phase_kind(&self) -> PhaseKind {
        self.phase.kind()
    }

    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn track(&self) -> Option<&CheckpointSequence> {
        self.track.as_ref()
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }

    pub fn current_race(&self) -> Option<&RaceSessionData> {
        self.current_race.as_ref()
    }

    pub fn previous_race(&self) -> Option<&RaceSessionData> {
        self.previous_race.as_ref()
    }

    pub fn bodies(&self) -> &B {
        &self.bodies
    }

    pub fn body_transform(&self, body: BodyId) -> Option<BodyTransform> {
        self.bodies.read(body)
    }

    pub fn has_pending_respawn(&self, participant: ParticipantId) -> bool {
        self.pending_respawns.contains_key(&participant)
    }

    /// Externally visible session state
    pub fn view(&self) -> SessionView {
        let countdown_deadline = match &self.phase {
            Phase::Intermission { deadline, .. } => *deadline,
            _ => None,
        };

        SessionView {
            phase: self.phase.kind(),
            countdown_deadline,
            current_race: self.current_race.clone(),
            previous_race: self.previous_race.clone(),
        }
    }

    /// Full state for an observer that just connected
    pub fn snapshot_packet(&self) -> Packet {
        Packet::Snapshot {
            participants: self.participants.values().map(Participant::snapshot).collect(),
            session: self.view(),
            track: self.track.clone(),
        }
    }

    /// Queues input for the next tick; inputs are applied in arrival order
    pub fn enqueue(&mut self, input: SessionInput) {
        self.inbox.push(input);
    }

    /// Advances the session by one fixed tick, returning packets to broadcast
    pub fn tick(&mut self, now: Timestamp, dt: f32) -> Vec<Packet> {
        self.now = now;
        self.tick = self.tick.wrapping_add(1);

        for input in std::mem::take(&mut self.inbox) {
            self.apply_input(input);
        }

        match self.phase.clone() {
            Phase::Idle => {}
            Phase::Intermission { .. } => self.update_countdown(),
            Phase::Race {
                stage: RaceStage::AwaitingTrack,
            } => self.poll_track(),
            Phase::Race {
                stage: RaceStage::Running,
            } => self.run_race(dt),
        }

        let current = self.phase.kind();
        let next = next_phase(current, &self.facts());
        if next != current {
            self.transition(next);
        }

        if self.tick % 60 == 0 {
            debug!(
                "Tick {}: {:?}, {} participants, {} packets queued",
                self.tick,
                self.phase.kind(),
                self.participants.len(),
                self.outbox.len()
            );
        }

        self.flush()
    }

    /// Moves to `target` immediately if the edge exists
    ///
    /// Used for operator overrides. The current phase is kept on error.
    pub fn request_transition(&mut self, target: PhaseKind) -> Result<(), RaceError> {
        let from = self.phase.kind();
        if !is_allowed(from, target) {
            warn!("Refusing transition from {:?} to {:?}", from, target);
            return Err(RaceError::InvalidTransition { from, to: target });
        }
        self.transition(target);
        Ok(())
    }

    pub fn request_transition_code(&mut self, code: u8) -> Result<(), RaceError> {
        let target = PhaseKind::try_from(code).map_err(|e| {
            warn!("Refusing transition: {}", e);
            e
        })?;
        self.request_transition(target)
    }

    fn facts(&self) -> SessionFacts {
        let ready_count = self.participants.values().filter(|p| p.is_ready()).count();

        let countdown_elapsed = match &self.phase {
            Phase::Intermission {
                deadline: Some(deadline),
                ..
            } => self.now >= *deadline,
            _ => false,
        };

        let race_empty = self
            .current_race
            .as_ref()
            .is_some_and(RaceSessionData::is_empty);

        let race_settled = matches!(
            self.phase,
            Phase::Race {
                stage: RaceStage::Running
            }
        ) && self.race_settled();

        SessionFacts {
            ready_count,
            countdown_elapsed,
            race_empty,
            race_settled,
        }
    }

    fn ready_set(&self) -> BTreeSet<ParticipantId> {
        self.participants
            .values()
            .filter(|p| p.is_ready())
            .map(Participant::id)
            .collect()
    }

    fn is_eliminated(&self, participant: &Participant) -> bool {
        !participant.is_alive() && !self.pending_respawns.contains_key(&participant.id())
    }

    /// Whether the running race has nothing left to decide
    ///
    /// Every racer must be finished or eliminated. A race with no racers
    /// left, such as after the last one disconnects, is settled at once.
    fn race_settled(&self) -> bool {
        let Some(race) = self.current_race.as_ref() else {
            return false;
        };

        if let Some(limit) = self.config.race_time_limit {
            if race.elapsed(self.now) >= limit {
                return true;
            }
        }

        race.participants_in_race
            .iter()
            .filter_map(|id| self.participants.get(id))
            .filter(|p| p.role() == Role::Racer)
            .all(|p| p.is_finished() || self.is_eliminated(p))
    }

    fn apply_input(&mut self, input: SessionInput) {
        match input {
            SessionInput::Join {
                participant,
                name,
                is_ai,
                role,
            } => self.join(participant, name, is_ai, role),
            SessionInput::Leave { participant } => self.leave(participant),
            SessionInput::Request {
                participant,
                request,
            } => {
                if let Err(e) = self.handle_request(participant, request) {
                    warn!("Request from participant {} rejected: {}", participant, e);
                }
            }
        }
    }

    fn join(&mut self, id: ParticipantId, name: String, is_ai: bool, role: Role) {
        if self.participants.contains_key(&id) {
            warn!("Participant {} joined twice, ignoring", id);
            return;
        }

        let participant = Participant::new(
            id,
            name,
            is_ai,
            role,
            self.config.max_health,
            Authority::Server,
        );
        info!(
            "Participant {} ({}) joined as {:?}{}",
            id,
            participant.name(),
            role,
            if is_ai { ", AI" } else { "" }
        );
        self.outbox
            .push(Packet::ParticipantJoined(participant.snapshot()));
        self.participants.insert(id, participant);
    }

    fn leave(&mut self, id: ParticipantId) {
        if !self.participants.contains_key(&id) {
            return;
        }

        self.release_body_of(id);
        self.pending_respawns.remove(&id);
        if let Some(race) = self.current_race.as_mut() {
            if race.remove_participant(id) {
                info!(
                    "Participant {} left mid-race, {} remaining",
                    id,
                    race.participants_in_race.len()
                );
            }
        }

        self.participants.remove(&id);
        info!("Participant {} left", id);
        self.outbox.push(Packet::ParticipantLeft { participant: id });
    }

    fn handle_request(
        &mut self,
        id: ParticipantId,
        request: ChangeRequest,
    ) -> Result<(), RaceError> {
        let racing = self.is_racing(id);
        let participant = self
            .participants
            .get_mut(&id)
            .ok_or(RaceError::UnknownParticipant(id))?;

        match request {
            ChangeRequest::SetReady(ready) => participant.set_ready(ready),
            ChangeRequest::SetName(name) => participant.set_name(&name),
            ChangeRequest::Drive(input) => {
                let body = participant
                    .body()
                    .ok_or(RaceError::MissingBody { participant: id })?;
                if racing && participant.is_alive() {
                    self.bodies.drive(body, input.clamped());
                }
                Ok(())
            }
        }
    }

    fn is_racing(&self, id: ParticipantId) -> bool {
        matches!(
            self.phase,
            Phase::Race {
                stage: RaceStage::Running
            }
        ) && self
            .current_race
            .as_ref()
            .is_some_and(|race| race.contains(id))
    }

    fn update_countdown(&mut self) {
        let ready = self.ready_set();
        let now = self.now;
        let length = self.config.intermission_for(ready.len());
        // Pursuers alone never start a race
        let has_racer = ready
            .iter()
            .any(|id| self.participants.get(id).map(Participant::role) == Some(Role::Racer));

        if let Phase::Intermission {
            deadline,
            ready: known,
        } = &mut self.phase
        {
            if *known != ready {
                *deadline = has_racer.then_some(now + length);
                debug!(
                    "Ready set changed to {} participants, countdown {:?}",
                    ready.len(),
                    deadline.map(|d| d - now)
                );
                *known = ready;
            }
        }
    }

    fn transition(&mut self, next: PhaseKind) {
        let from = self.phase.kind();
        info!("Session phase {:?} -> {:?}", from, next);

        if from == PhaseKind::Race {
            self.exit_race();
        }

        match next {
            PhaseKind::Idle => self.phase = Phase::Idle,
            PhaseKind::Intermission => self.enter_intermission(),
            PhaseKind::Race => self.enter_race(),
        }
    }

    fn enter_intermission(&mut self) {
        let ready = self.ready_set();
        let deadline =
            (!ready.is_empty()).then(|| self.now + self.config.intermission_for(ready.len()));
        self.phase = Phase::Intermission { deadline, ready };
    }

    fn enter_race(&mut self) {
        self.race_counter += 1;
        let entrants: Vec<ParticipantId> = self.ready_set().into_iter().collect();
        info!(
            "Race {} starting with participants {:?}",
            self.race_counter, entrants
        );

        for id in &entrants {
            self.release_body_of(*id);
            if let Some(p) = self.participants.get_mut(id) {
                if let Err(e) = p.restore_health() {
                    warn!("Could not reset participant {}: {}", id, e);
                }
            }
        }

        self.previous_race = None;
        self.current_race = Some(RaceSessionData::new(self.race_counter, entrants));
        self.standings.clear();
        self.pending_respawns.clear();
        self.phase = Phase::Race {
            stage: RaceStage::AwaitingTrack,
        };

        self.tracks.generate();
        self.poll_track();
    }

    fn poll_track(&mut self) {
        if let Some(track) = self.tracks.poll_ready() {
            self.start_running(track);
        }
    }

    /// Puts every entrant on the grid once the track exists
    fn start_running(&mut self, track: CheckpointSequence) {
        let now = self.now;
        let entrants = self
            .current_race
            .as_ref()
            .map(|race| race.participants_in_race.clone())
            .unwrap_or_default();
        let grid = self.tracks.start_grid(entrants.len());

        for (id, (position, rotation)) in entrants.iter().zip(grid) {
            let Some(role) = self.participants.get(id).map(Participant::role) else {
                continue;
            };
            let body = self.bodies.spawn(body_kind(role), position, rotation);
            self.send_body_sample(body);

            if let Some(p) = self.participants.get_mut(id) {
                let result = p.assign_body(body).and_then(|_| p.start_race(now));
                if let Err(e) = result {
                    warn!("Could not place participant {} on the grid: {}", id, e);
                }
            }
        }

        if let Some(race) = self.current_race.as_mut() {
            race.start_time = Some(now);
            info!(
                "Race {} running with {} checkpoints",
                race.race_number,
                track.len()
            );
        }

        self.outbox.push(Packet::Track(Some(track.clone())));
        self.track = Some(track);
        self.phase = Phase::Race {
            stage: RaceStage::Running,
        };
    }

    fn run_race(&mut self, dt: f32) {
        let events = self.bodies.step(dt, self.track.as_ref());
        for event in events {
            let result = match event {
                BodyEvent::CheckpointTriggered { body, checkpoint } => {
                    self.handle_checkpoint(body, checkpoint)
                }
                BodyEvent::Collision { a, b, impact_speed } => {
                    self.handle_collision(a, b, impact_speed)
                }
            };
            if let Err(e) = result {
                warn!("Body event {:?} not applied: {}", event, e);
            }
        }

        self.process_respawns();

        if let Some(track) = self.track.as_ref() {
            let entrants = self
                .current_race
                .as_ref()
                .map(|race| race.participants_in_race.as_slice())
                .unwrap_or_default();
            let bodies = &self.bodies;
            self.standings = rank(
                entrants.iter().filter_map(|id| self.participants.get(id)),
                track,
                |body| bodies.read(body).map(|t| t.position),
            );
            self.outbox.push(Packet::Standings {
                entries: self.standings.clone(),
            });
        }

        self.broadcast_body_samples();
    }

    fn body_owner(&self, body: BodyId) -> Option<ParticipantId> {
        self.participants
            .values()
            .find(|p| p.body() == Some(body))
            .map(Participant::id)
    }

    /// Records a crossing if it is the owner's next checkpoint
    fn handle_checkpoint(
        &mut self,
        body: BodyId,
        checkpoint: CheckpointId,
    ) -> Result<(), RaceError> {
        let Some(owner) = self.body_owner(body) else {
            return Ok(());
        };
        let Some(track) = self.track.as_ref() else {
            return Ok(());
        };
        if !self.is_racing(owner) {
            return Ok(());
        }

        let participant = self
            .participants
            .get_mut(&owner)
            .ok_or(RaceError::UnknownParticipant(owner))?;

        if participant.role() != Role::Racer || !participant.is_alive() {
            return Ok(());
        }

        let expected = track
            .next_checkpoint(participant.progress().passed_count())
            .id;
        if checkpoint != expected || participant.progress().has_passed(checkpoint) {
            return Ok(());
        }

        let event = participant.record_checkpoint(checkpoint, track.finish_id(), self.now)?;
        if let Some(ParticipantEvent::Finished { participant, .. }) = event {
            if let Some(race) = self.current_race.as_mut() {
                race.record_finish(participant);
            }
        }
        Ok(())
    }

    fn handle_collision(&mut self, a: BodyId, b: BodyId, impact_speed: f32) -> Result<(), RaceError> {
        let (Some(owner_a), Some(owner_b)) = (self.body_owner(a), self.body_owner(b)) else {
            return Ok(());
        };

        let role_of = |id: ParticipantId| self.participants.get(&id).map(Participant::role);
        let (Some(role_a), Some(role_b)) = (role_of(owner_a), role_of(owner_b)) else {
            return Ok(());
        };

        let base = (impact_speed * self.config.collision_damage_scale).round() as i32;
        for (owner, amount) in [
            (owner_a, collision_damage(base, role_a, role_b)),
            (owner_b, collision_damage(base, role_b, role_a)),
        ] {
            if let Err(e) = self.damage(owner, amount) {
                warn!("Collision damage to {} not applied: {}", owner, e);
            }
        }
        Ok(())
    }

    fn damage(&mut self, id: ParticipantId, amount: i32) -> Result<(), RaceError> {
        if amount <= 0 || !self.is_racing(id) {
            return Ok(());
        }

        let participant = self
            .participants
            .get_mut(&id)
            .ok_or(RaceError::UnknownParticipant(id))?;
        if participant.is_finished() {
            return Ok(());
        }

        if let Some(ParticipantEvent::Died { participant }) = participant.apply_damage(amount)? {
            self.handle_death(participant);
        }
        Ok(())
    }

    /// Disables the wreck and schedules a respawn if the session allows one
    fn handle_death(&mut self, id: ParticipantId) {
        if let Some(body) = self.participants.get(&id).and_then(Participant::body) {
            self.bodies.set_input_enabled(body, false);
        }

        match self.config.respawn_delay {
            Some(delay) => {
                info!("Participant {} respawns in {:.1}s", id, delay);
                self.pending_respawns.insert(id, self.now + delay);
            }
            None => info!("Participant {} eliminated", id),
        }
    }

    fn process_respawns(&mut self) {
        let now = self.now;
        let mut due: Vec<ParticipantId> = self
            .pending_respawns
            .iter()
            .filter(|(_, deadline)| now >= **deadline)
            .map(|(id, _)| *id)
            .collect();
        due.sort_unstable();

        for id in due {
            self.pending_respawns.remove(&id);
            if let Err(e) = self.respawn(id) {
                warn!("Respawn of participant {} failed: {}", id, e);
            }
        }
    }

    /// Replaces the wreck with a fresh body at the last checkpoint reached
    fn respawn(&mut self, id: ParticipantId) -> Result<(), RaceError> {
        let slot = self
            .current_race
            .as_ref()
            .and_then(|race| race.participants_in_race.iter().position(|p| *p == id))
            .ok_or(RaceError::UnknownParticipant(id))?;

        self.release_body_of(id);

        let participant = self
            .participants
            .get(&id)
            .ok_or(RaceError::UnknownParticipant(id))?;
        let (position, rotation) = self.respawn_point(participant, slot);
        let body = self
            .bodies
            .spawn(body_kind(participant.role()), position, rotation);
        self.send_body_sample(body);

        let participant = self
            .participants
            .get_mut(&id)
            .ok_or(RaceError::UnknownParticipant(id))?;
        participant.restore_health()?;
        participant.assign_body(body)?;
        info!("Participant {} respawned with body {}", id, body);
        Ok(())
    }

    fn respawn_point(&self, participant: &Participant, slot: usize) -> (Vec3, Quat) {
        let passed = participant.progress().passed_count();
        if let (Some(track), true) = (self.track.as_ref(), passed > 0) {
            let from = track.next_checkpoint(passed - 1);
            let to = track.next_checkpoint(passed);
            let heading = to.position - from.position;
            let yaw = heading.x.atan2(heading.z);
            return (from.position, Quat::from_rotation_y(yaw));
        }

        self.tracks
            .start_grid(slot + 1)
            .pop()
            .unwrap_or((Vec3::ZERO, Quat::IDENTITY))
    }

    fn release_body_of(&mut self, id: ParticipantId) {
        let Some(participant) = self.participants.get_mut(&id) else {
            return;
        };

        match participant.release_body() {
            Ok(Some(body)) => {
                self.bodies.destroy(body);
                self.outbox.push(Packet::BodyRemoved { body });
            }
            Ok(None) => {}
            Err(e) => warn!("Could not release body of participant {}: {}", id, e),
        }
    }

    fn exit_race(&mut self) {
        let holders: Vec<ParticipantId> = self
            .participants
            .values()
            .filter(|p| p.body().is_some())
            .map(Participant::id)
            .collect();

        if let Some(mut race) = self.current_race.take() {
            race.last_known_duration = race.elapsed(self.now);
            race.final_standings = self.standings.clone();
            info!(
                "Race {} over after {:.1}s, finish order {:?}",
                race.race_number, race.last_known_duration, race.finished_participants
            );
            self.previous_race = Some(race);
        }

        for id in holders {
            self.release_body_of(id);
        }

        self.pending_respawns.clear();
        self.tracks.teardown();
        if self.track.take().is_some() {
            self.outbox.push(Packet::Track(None));
        }
    }

    fn send_body_sample(&mut self, body: BodyId) {
        if let Some(transform) = self.bodies.read(body) {
            self.outbox.push(Packet::BodySamples {
                tick: self.tick,
                time: self.now,
                samples: vec![(body, BodySample::from_transform(transform, self.now))],
            });
        }
    }

    fn broadcast_body_samples(&mut self) {
        let samples: Vec<(BodyId, BodySample)> = self
            .participants
            .values()
            .filter_map(Participant::body)
            .filter_map(|body| {
                self.bodies
                    .read(body)
                    .map(|t| (body, BodySample::from_transform(t, self.now)))
            })
            .collect();

        if !samples.is_empty() {
            self.outbox.push(Packet::BodySamples {
                tick: self.tick,
                time: self.now,
                samples,
            });
        }
    }

    /// Turns this tick's writes into packets
    fn flush(&mut self) -> Vec<Packet> {
        for participant in self.participants.values_mut() {
            let id = participant.id();
            for change in participant.drain_changes() {
                self.outbox.push(Packet::FieldUpdate {
                    participant: id,
                    change,
                });
            }
        }

        let view = self.view();
        if let Err(e) = self.published.write(view) {
            warn!("Could not publish session view: {}", e);
        }
        if self.published.take_dirty() {
            self.outbox.push(Packet::Session(self.published.get().clone()));
        }

        std::mem::take(&mut self.outbox)
    }
}

fn body_kind(role: Role) -> BodyKind {
    match role {
        Role::Racer => BodyKind::Car,
        Role::Pursuer => BodyKind::PursuerCar,
    }
}

/// Damage taken by a `victim` hit by an `other`
///
/// Pursuers are armoured and hit twice as hard.
fn collision_damage(base: i32, victim: Role, other: Role) -> i32 {
    match (victim, other) {
        (Role::Pursuer, _) => 0,
        (Role::Racer, Role::Pursuer) => base * 2,
        (Role::Racer, Role::Racer) => base,
    }
}
