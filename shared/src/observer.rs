//! Local state machines for clients and AI agents
//!
//! Observers mirror the session phase and react to their own participant's
//! status. Transition rules are pure functions of the current state and an
//! [`ObserverView`], evaluated once per tick; the session's phase always wins
//! over local state. Entering or leaving a state only matters to presentation,
//! which hooks in through [`ObserverMachine::on_transition`].

use crate::participant::Participant;
use crate::phase::{PhaseKind, SessionView};
use std::fmt;

/// Everything an observer needs to pick its next state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverView {
    pub phase: PhaseKind,
    pub local_ready: bool,
    pub in_race: bool,
    pub local_finished: bool,
    pub local_alive: bool,
}

impl ObserverView {
    pub fn observe(session: &SessionView, local: Option<&Participant>) -> Self {
        match local {
            Some(p) => Self {
                phase: session.phase,
                local_ready: p.is_ready(),
                in_race: session.is_racing(p.id()),
                local_finished: p.is_finished(),
                local_alive: p.is_alive(),
            },
            None => Self {
                phase: session.phase,
                local_ready: false,
                in_race: false,
                local_finished: false,
                local_alive: false,
            },
        }
    }
}

/// Transition table for one kind of observer
pub trait ObserverRules {
    type State: Copy + Eq + fmt::Debug;

    fn initial() -> Self::State;

    fn next(current: Self::State, view: &ObserverView) -> Self::State;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    StartMenu,
    Intermission,
    Race,
    Spectate,
    Death,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentState {
    Intermission,
    Race,
    Spectate,
}

pub struct ClientRules;

impl ObserverRules for ClientRules {
    type State = ClientState;

    fn initial() -> ClientState {
        ClientState::StartMenu
    }

    fn next(current: ClientState, view: &ObserverView) -> ClientState {
        // The start menu is only left once the local player has opted in.
        if current == ClientState::StartMenu && !view.local_ready {
            return ClientState::StartMenu;
        }

        match view.phase {
            PhaseKind::Idle | PhaseKind::Intermission => ClientState::Intermission,
            PhaseKind::Race if !view.in_race => ClientState::Spectate,
            PhaseKind::Race if !view.local_alive => ClientState::Death,
            PhaseKind::Race if view.local_finished => ClientState::Spectate,
            PhaseKind::Race => ClientState::Race,
        }
    }
}

pub struct AgentRules;

impl ObserverRules for AgentRules {
    type State = AgentState;

    fn initial() -> AgentState {
        AgentState::Intermission
    }

    fn next(_current: AgentState, view: &ObserverView) -> AgentState {
        match view.phase {
            PhaseKind::Idle | PhaseKind::Intermission => AgentState::Intermission,
            PhaseKind::Race if !view.in_race => AgentState::Spectate,
            PhaseKind::Race if !view.local_alive || view.local_finished => AgentState::Spectate,
            PhaseKind::Race => AgentState::Race,
        }
    }
}

type TransitionHook<S> = Box<dyn FnMut(S, S) + Send + Sync>;

pub struct ObserverMachine<R: ObserverRules> {
    state: R::State,
    ticks_in_state: u64,
    hook: Option<TransitionHook<R::State>>,
}

pub type ClientObserver = ObserverMachine<ClientRules>;
pub type AgentObserver = ObserverMachine<AgentRules>;

impl<R: ObserverRules> fmt::Debug for ObserverMachine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverMachine")
            .field("state", &self.state)
            .field("ticks_in_state", &self.ticks_in_state)
            .finish()
    }
}

impl<R: ObserverRules> Default for ObserverMachine<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ObserverRules> ObserverMachine<R> {
    pub fn new() -> Self {
        Self {
            state: R::initial(),
            ticks_in_state: 0,
            hook: None,
        }
    }

    pub fn state(&self) -> R::State {
        self.state
    }

    pub fn ticks_in_state(&self) -> u64 {
        self.ticks_in_state
    }

    /// Registers the exit/enter callback, called with `(from, to)`
    pub fn on_transition<F>(&mut self, hook: F)
    where
        F: FnMut(R::State, R::State) + Send + Sync + 'static,
    {
        self.hook = Some(Box::new(hook));
    }

    /// Evaluates the rules once, returning the transition if one happened
    pub fn tick(&mut self, view: &ObserverView) -> Option<(R::State, R::State)> {
        let next = R::next(self.state, view);
        if next == self.state {
            self.ticks_in_state += 1;
            return None;
        }

        let from = std::mem::replace(&mut self.state, next);
        self.ticks_in_state = 0;
        if let Some(hook) = self.hook.as_mut() {
            hook(from, next);
        }
        Some((from, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn view(phase: PhaseKind) -> ObserverView {
        ObserverView {
            phase,
            local_ready: true,
            in_race: true,
            local_finished: false,
            local_alive: true,
        }
    }

    #[test]
    fn test_client_stays_in_start_menu_until_ready() {
        let mut machine = ClientObserver::new();
        let mut v = view(PhaseKind::Intermission);
        v.local_ready = false;

        assert_eq!(machine.tick(&v), None);
        assert_eq!(machine.state(), ClientState::StartMenu);

        v.local_ready = true;
        assert_eq!(
            machine.tick(&v),
            Some((ClientState::StartMenu, ClientState::Intermission))
        );
    }

    #[test]
    fn test_intermission_overrides_local_state() {
        let mut machine = ClientObserver::new();
        let mut v = view(PhaseKind::Race);
        v.local_alive = false;
        machine.tick(&v);
        assert_eq!(machine.state(), ClientState::Death);

        machine.tick(&view(PhaseKind::Intermission));
        assert_eq!(machine.state(), ClientState::Intermission);
    }

    #[test]
    fn test_client_race_outcomes() {
        let mut v = view(PhaseKind::Race);
        assert_eq!(ClientRules::next(ClientState::Intermission, &v), ClientState::Race);

        v.local_finished = true;
        assert_eq!(ClientRules::next(ClientState::Race, &v), ClientState::Spectate);

        v.local_finished = false;
        v.local_alive = false;
        assert_eq!(ClientRules::next(ClientState::Race, &v), ClientState::Death);

        v.local_alive = true;
        assert_eq!(ClientRules::next(ClientState::Death, &v), ClientState::Race);

        v.in_race = false;
        assert_eq!(ClientRules::next(ClientState::Intermission, &v), ClientState::Spectate);
    }

    #[test]
    fn test_agent_spectates_instead_of_dying() {
        let mut v = view(PhaseKind::Race);
        assert_eq!(AgentRules::next(AgentState::Intermission, &v), AgentState::Race);

        v.local_alive = false;
        assert_eq!(AgentRules::next(AgentState::Race, &v), AgentState::Spectate);

        v.local_alive = true;
        v.local_finished = true;
        assert_eq!(AgentRules::next(AgentState::Race, &v), AgentState::Spectate);

        assert_eq!(
            AgentRules::next(AgentState::Spectate, &view(PhaseKind::Idle)),
            AgentState::Intermission
        );
    }

    #[test]
    fn test_transition_hook_and_tick_count() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);

        let mut machine = AgentObserver::new();
        machine.on_transition(move |from, to| sink.lock().unwrap().push((from, to)));

        machine.tick(&view(PhaseKind::Intermission));
        machine.tick(&view(PhaseKind::Intermission));
        assert_eq!(machine.ticks_in_state(), 2);

        machine.tick(&view(PhaseKind::Race));
        assert_eq!(machine.ticks_in_state(), 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec![(AgentState::Intermission, AgentState::Race)]
        );
    }

    #[test]
    fn test_observe_without_local_participant() {
        let session = SessionView {
            phase: PhaseKind::Race,
            ..SessionView::default()
        };
        let v = ObserverView::observe(&session, None);
        assert!(!v.in_race);
        assert_eq!(ClientRules::next(ClientState::StartMenu, &v), ClientState::StartMenu);
    }
}
