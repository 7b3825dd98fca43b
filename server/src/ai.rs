//! In-process AI agents
//!
//! Agents are observers like any remote client: each one keeps a read-only
//! projection of its own participant, runs an [`AgentObserver`] and sends
//! change requests through a [`RequestQueue`] that the server drains into the
//! session's input queue. Nothing here writes session state directly.

use crate::session::{RaceSession, SessionInput};
use crate::track::TrackProvider;
use crate::world::BodyProvider;
use glam::Vec3;
use log::{debug, info};
use shared::steering::steer_towards;
use shared::{
    AgentObserver, AgentState, ChangeRequest, ObserverView, Participant, ParticipantId,
    RequestQueue, RequestTransport, Role, SessionView,
};
use std::collections::BTreeMap;

struct Agent {
    role: Role,
    observer: AgentObserver,
    outgoing: RequestQueue,
}

#[derive(Default)]
pub struct AgentDriver {
    agents: BTreeMap<ParticipantId, Agent>,
}

impl AgentDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent and returns the join to queue on the session
    pub fn add_agent(&mut self, id: ParticipantId, name: &str, role: Role) -> SessionInput {
        info!("AI agent {} ({}) added as {:?}", id, name, role);
        self.agents.insert(
            id,
            Agent {
                role,
                observer: AgentObserver::new(),
                outgoing: RequestQueue::new(true),
            },
        );
        SessionInput::Join {
            participant: id,
            name: name.to_string(),
            is_ai: true,
            role,
        }
    }

    pub fn remove_agent(&mut self, id: ParticipantId) -> Option<SessionInput> {
        self.agents
            .remove(&id)
            .map(|_| SessionInput::Leave { participant: id })
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn state(&self, id: ParticipantId) -> Option<AgentState> {
        self.agents.get(&id).map(|agent| agent.observer.state())
    }

    /// Runs every agent for one tick and collects their requests
    pub fn tick<T, B>(&mut self, session: &RaceSession<T, B>) -> Vec<SessionInput>
    where
        T: TrackProvider,
        B: BodyProvider,
    {
        let view = session.view();
        let mut inputs = Vec::new();

        for (&id, agent) in self.agents.iter_mut() {
            let Some(projection) = session
                .participant(id)
                .map(|p| Participant::from_snapshot(p.snapshot()))
            else {
                continue;
            };

            let observed = ObserverView::observe(&view, Some(&projection));
            if let Some((from, to)) = agent.observer.tick(&observed) {
                debug!("AI agent {}: {:?} -> {:?}", id, from, to);
            }

            if !projection.is_ready() {
                projection.request_ready(true, &mut agent.outgoing);
            }

            if agent.observer.state() == AgentState::Race {
                if let Some(target) = steering_target(session, &view, &projection, agent.role) {
                    let transform = projection.body().and_then(|b| session.body_transform(b));
                    if let Some(transform) = transform {
                        let input =
                            steer_towards(transform.position, transform.rotation, target);
                        agent.outgoing.submit(ChangeRequest::Drive(input));
                    }
                }
            }

            inputs.extend(agent.outgoing.drain().into_iter().map(|request| {
                SessionInput::Request {
                    participant: id,
                    request,
                }
            }));
        }

        inputs
    }
}

/// Where an agent should head: its next checkpoint, or the nearest live
/// racer for pursuers
fn steering_target<T, B>(
    session: &RaceSession<T, B>,
    view: &SessionView,
    me: &Participant,
    role: Role,
) -> Option<Vec3>
where
    T: TrackProvider,
    B: BodyProvider,
{
    match role {
        Role::Racer => {
            let track = session.track()?;
            Some(track.next_checkpoint(me.progress().passed_count()).position)
        }
        Role::Pursuer => {
            let own = me.body().and_then(|b| session.body_transform(b))?.position;
            session
                .participants()
                .filter(|p| p.role() == Role::Racer && p.is_alive() && !p.is_finished())
                .filter(|p| view.is_racing(p.id()))
                .filter_map(|p| p.body().and_then(|b| session.body_transform(b)))
                .map(|t| t.position)
                .min_by(|a, b| a.distance_squared(own).total_cmp(&b.distance_squared(own)))
        }
    }
}
