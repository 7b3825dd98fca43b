use log::{debug, info};
use shared::steering::steer_towards;
use shared::{
    BodyId, BodyTransform, CheckpointSequence, ClientObserver, ClientState, DriveInput,
    ObserverView, Packet, Participant, ParticipantId, ReconcilerSet, RequestTransport,
    SessionView, Standing, Timestamp, RECONCILE_ALPHA,
};
use std::collections::BTreeMap;

/// Everything a client knows about the session, rebuilt from server packets
///
/// All participant fields are observer-side projections; the only way to
/// change them is a request through a [`RequestTransport`].
#[derive(Debug)]
pub struct ClientGameState {
    local_id: Option<ParticipantId>,
    participants: BTreeMap<ParticipantId, Participant>,
    session: SessionView,
    track: Option<CheckpointSequence>,
    standings: Vec<Standing>,
    bodies: ReconcilerSet,
    observer: ClientObserver,
    last_sample_tick: u32,
    server_time: Timestamp,
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::with_alpha(RECONCILE_ALPHA)
    }

    pub fn with_alpha(alpha: f32) -> Self {
        Self {
            local_id: None,
            participants: BTreeMap::new(),
            session: SessionView::default(),
            track: None,
            standings: Vec::new(),
            bodies: ReconcilerSet::new(alpha),
            observer: ClientObserver::new(),
            last_sample_tick: 0,
            server_time: 0.0,
        }
    }

    pub fn local_id(&self) -> Option<ParticipantId> {
        self.local_id
    }

    pub fn local_participant(&self) -> Option<&Participant> {
        self.local_id.and_then(|id| self.participants.get(&id))
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn session(&self) -> &SessionView {
        &self.session
    }

    pub fn track(&self) -> Option<&CheckpointSequence> {
        self.track.as_ref()
    }

    pub fn standings(&self) -> &[Standing] {
        &self.standings
    }

    pub fn state(&self) -> ClientState {
        self.observer.state()
    }

    pub fn observer_mut(&mut self) -> &mut ClientObserver {
        &mut self.observer
    }

    /// Latest session clock reading carried by a body sample batch
    pub fn server_time(&self) -> Timestamp {
        self.server_time
    }

    pub fn body_transform(&self, body: BodyId) -> Option<BodyTransform> {
        self.bodies.transform(body)
    }

    pub fn tracked_bodies(&self) -> usize {
        self.bodies.len()
    }

    /// Folds one server packet into the local projection
    pub fn apply_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { participant_id } => {
                self.local_id = Some(participant_id);
            }

            Packet::Snapshot {
                participants,
                session,
                track,
            } => {
                self.participants = participants
                    .into_iter()
                    .map(|snapshot| (snapshot.id, Participant::from_snapshot(snapshot)))
                    .collect();
                self.session = session;
                self.track = track;
                self.bodies.clear();
            }

            Packet::ParticipantJoined(snapshot) => {
                debug!("Participant {} ({}) joined", snapshot.id, snapshot.name);
                self.participants
                    .insert(snapshot.id, Participant::from_snapshot(snapshot));
            }

            Packet::ParticipantLeft { participant } => {
                if let Some(body) = self
                    .participants
                    .remove(&participant)
                    .and_then(|p| p.body())
                {
                    self.bodies.remove(body);
                }
            }

            Packet::FieldUpdate {
                participant,
                change,
            } => match self.participants.get_mut(&participant) {
                Some(p) => p.apply_change(change),
                None => debug!("Field update for unknown participant {}", participant),
            },

            Packet::Session(view) => {
                if view.previous_race != self.session.previous_race {
                    if let Some(race) = &view.previous_race {
                        info!(
                            "Race {} over after {:.1}s, finishers: {:?}",
                            race.race_number, race.last_known_duration, race.finished_participants
                        );
                    }
                }
                self.session = view;
            }

            Packet::Track(track) => {
                if track.is_none() {
                    self.standings.clear();
                }
                self.track = track;
            }

            Packet::Standings { entries } => {
                self.standings = entries;
            }

            Packet::BodySamples {
                tick,
                time,
                samples,
            } => {
                self.last_sample_tick = self.last_sample_tick.max(tick);
                self.server_time = self.server_time.max(time);
                for (body, sample) in samples {
                    self.bodies.push_sample(body, sample);
                }
            }

            Packet::BodyRemoved { body } => {
                self.bodies.remove(body);
            }

            other => debug!("Ignoring packet {:?}", other),
        }
    }

    /// Advances reconcilers and the observer machine by one fixed tick
    pub fn tick(&mut self, dt: f32) -> Option<(ClientState, ClientState)> {
        self.bodies.tick(dt);

        let local = self.local_id.and_then(|id| self.participants.get(&id));
        let view = ObserverView::observe(&self.session, local);
        self.observer.tick(&view)
    }

    /// Asks the server to flip the local participant's ready flag
    pub fn request_ready<R: RequestTransport + ?Sized>(
        &self,
        ready: bool,
        transport: &mut R,
    ) -> bool {
        match self.local_participant() {
            Some(p) => p.request_ready(ready, transport),
            None => false,
        }
    }

    /// Drive controls toward the next checkpoint while racing
    pub fn autopilot(&self) -> Option<DriveInput> {
        if self.observer.state() != ClientState::Race {
            return None;
        }

        let me = self.local_participant()?;
        let transform = me.body().and_then(|b| self.bodies.transform(b))?;
        let target = self
            .track
            .as_ref()?
            .next_checkpoint(me.progress().passed_count())
            .position;

        Some(steer_towards(
            transform.position,
            transform.rotation,
            target,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};
    use shared::{
        Authority, BodySample, ChangeRequest, Checkpoint, FieldChange, PhaseKind,
        RaceSessionData, RequestQueue, Role,
    };

    const DT: f32 = 1.0 / 60.0;

    fn snapshot_of(id: ParticipantId, name: &str) -> shared::ParticipantSnapshot {
        Participant::new(id, name, false, Role::Racer, 100, Authority::Server).snapshot()
    }

    fn track() -> CheckpointSequence {
        CheckpointSequence::new(vec![
            Checkpoint {
                id: 1,
                position: Vec3::new(0.0, 0.0, 50.0),
                radius: 5.0,
            },
            Checkpoint {
                id: 2,
                position: Vec3::new(50.0, 0.0, 50.0),
                radius: 5.0,
            },
        ])
        .unwrap()
    }

    fn connected_state() -> ClientGameState {
        let mut state = ClientGameState::new();
        state.apply_packet(Packet::Connected { participant_id: 1 });
        state.apply_packet(Packet::Snapshot {
            participants: vec![snapshot_of(1, "Ada"), snapshot_of(2, "Bob")],
            session: SessionView::default(),
            track: None,
        });
        state
    }

    fn racing_view() -> SessionView {
        let mut race = RaceSessionData::new(1, vec![1, 2]);
        race.start_time = Some(0.0);
        SessionView {
            phase: PhaseKind::Race,
            countdown_deadline: None,
            current_race: Some(race),
            previous_race: None,
        }
    }

    #[test]
    fn test_snapshot_builds_observer_projections() {
        let mut state = connected_state();
        assert_eq!(state.participant_count(), 2);
        assert_eq!(state.local_participant().unwrap().name(), "Ada");

        // Projections cannot be written locally.
        let ada = state.participants.get_mut(&1).unwrap();
        assert!(!ada.is_authority());
        assert!(ada.set_ready(true).unwrap_err().is_permission());
    }

    #[test]
    fn test_field_updates_apply() {
        let mut state = connected_state();
        state.apply_packet(Packet::FieldUpdate {
            participant: 2,
            change: FieldChange::Health(40),
        });
        state.apply_packet(Packet::FieldUpdate {
            participant: 9,
            change: FieldChange::Ready(true),
        });

        assert_eq!(state.participant(2).unwrap().health(), 40);
        assert!(state.participant(9).is_none());
    }

    #[test]
    fn test_observer_leaves_start_menu_once_ready() {
        let mut state = connected_state();
        state.tick(DT);
        assert_eq!(state.state(), ClientState::StartMenu);

        state.apply_packet(Packet::FieldUpdate {
            participant: 1,
            change: FieldChange::Ready(true),
        });
        assert_eq!(
            state.tick(DT),
            Some((ClientState::StartMenu, ClientState::Intermission))
        );
    }

    #[test]
    fn test_observer_follows_race_and_death() {
        let mut state = connected_state();
        state.apply_packet(Packet::FieldUpdate {
            participant: 1,
            change: FieldChange::Ready(true),
        });
        state.apply_packet(Packet::Session(racing_view()));
        state.tick(DT);
        assert_eq!(state.state(), ClientState::Race);

        state.apply_packet(Packet::FieldUpdate {
            participant: 1,
            change: FieldChange::Health(0),
        });
        state.tick(DT);
        assert_eq!(state.state(), ClientState::Death);

        state.apply_packet(Packet::Session(SessionView::default()));
        state.tick(DT);
        assert_eq!(state.state(), ClientState::Intermission);
    }

    #[test]
    fn test_ready_request_goes_through_transport() {
        let state = connected_state();
        let mut queue = RequestQueue::new(true);
        assert!(state.request_ready(true, &mut queue));
        assert_eq!(queue.drain(), vec![ChangeRequest::SetReady(true)]);

        let mut offline = RequestQueue::new(false);
        assert!(!state.request_ready(true, &mut offline));
        assert!(offline.is_empty());

        // Not yet told our id
        let fresh = ClientGameState::new();
        assert!(!fresh.request_ready(true, &mut queue));
    }

    #[test]
    fn test_body_samples_feed_reconcilers() {
        let mut state = connected_state();
        state.apply_packet(Packet::BodySamples {
            tick: 5,
            time: 1.5,
            samples: vec![(7, BodySample::at_rest(Vec3::X, Quat::IDENTITY, 1.5))],
        });
        assert_eq!(state.tracked_bodies(), 1);
        assert_eq!(state.server_time(), 1.5);
        assert_eq!(state.body_transform(7).unwrap().position, Vec3::X);

        state.apply_packet(Packet::BodyRemoved { body: 7 });
        assert_eq!(state.tracked_bodies(), 0);
    }

    #[test]
    fn test_participant_left_drops_its_body() {
        let mut state = connected_state();
        state.apply_packet(Packet::FieldUpdate {
            participant: 2,
            change: FieldChange::Body(Some(4)),
        });
        state.apply_packet(Packet::BodySamples {
            tick: 1,
            time: 0.1,
            samples: vec![(4, BodySample::at_rest(Vec3::ZERO, Quat::IDENTITY, 0.1))],
        });

        state.apply_packet(Packet::ParticipantLeft { participant: 2 });
        assert!(state.participant(2).is_none());
        assert!(state.body_transform(4).is_none());
    }

    #[test]
    fn test_autopilot_only_while_racing() {
        let mut state = connected_state();
        state.apply_packet(Packet::Track(Some(track())));
        state.apply_packet(Packet::FieldUpdate {
            participant: 1,
            change: FieldChange::Body(Some(3)),
        });
        state.apply_packet(Packet::BodySamples {
            tick: 1,
            time: 0.0,
            samples: vec![(3, BodySample::at_rest(Vec3::ZERO, Quat::IDENTITY, 0.0))],
        });
        assert!(state.autopilot().is_none());

        state.apply_packet(Packet::FieldUpdate {
            participant: 1,
            change: FieldChange::Ready(true),
        });
        state.apply_packet(Packet::Session(racing_view()));
        state.tick(DT);

        // Straight ahead along +Z
        let input = state.autopilot().unwrap();
        assert_eq!(input.throttle, 1.0);
        assert!(input.steer.abs() < 1e-3);
    }

    #[test]
    fn test_track_cleared_drops_standings() {
        let mut state = connected_state();
        state.apply_packet(Packet::Track(Some(track())));
        state.apply_packet(Packet::Standings {
            entries: vec![Standing {
                participant: 1,
                finish_time: f64::INFINITY,
                checkpoints_passed: 0,
                distance_to_next: 10.0,
            }],
        });
        assert_eq!(state.standings().len(), 1);

        state.apply_packet(Packet::Track(None));
        assert!(state.track().is_none());
        assert!(state.standings().is_empty());
    }
}
