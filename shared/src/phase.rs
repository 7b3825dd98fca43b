//! Externally visible session phase and per-race data

use crate::error::RaceError;
use crate::progress::{Standing, Timestamp};
use crate::ParticipantId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    #[default]
    Idle,
    Intermission,
    Race,
}

impl PhaseKind {
    pub fn code(self) -> u8 {
        match self {
            PhaseKind::Idle => 0,
            PhaseKind::Intermission => 1,
            PhaseKind::Race => 2,
        }
    }
}

impl TryFrom<u8> for PhaseKind {
    type Error = RaceError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PhaseKind::Idle),
            1 => Ok(PhaseKind::Intermission),
            2 => Ok(PhaseKind::Race),
            other => Err(RaceError::UnknownPhase(other)),
        }
    }
}

/// Book-keeping for one race instance
///
/// Created when the session enters the race phase, then kept read-only
/// through the following intermission so results stay on display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSessionData {
    pub race_number: u32,
    /// Set once the track is ready and bodies are on the grid
    pub start_time: Option<Timestamp>,
    pub last_known_duration: f64,
    pub participants_in_race: Vec<ParticipantId>,
    pub finished_participants: Vec<ParticipantId>,
    pub final_standings: Vec<Standing>,
}

impl RaceSessionData {
    pub fn new(race_number: u32, participants_in_race: Vec<ParticipantId>) -> Self {
        Self {
            race_number,
            start_time: None,
            last_known_duration: 0.0,
            participants_in_race,
            finished_participants: Vec::new(),
            final_standings: Vec::new(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.participants_in_race.contains(&participant)
    }

    pub fn elapsed(&self, now: Timestamp) -> f64 {
        self.start_time
            .map(|start| (now - start).max(0.0))
            .unwrap_or(0.0)
    }

    /// Appends to the finish order; repeated finishes are ignored
    pub fn record_finish(&mut self, participant: ParticipantId) {
        if !self.finished_participants.contains(&participant) {
            self.finished_participants.push(participant);
        }
    }

    /// Drops a disconnected participant, returning whether it was racing
    pub fn remove_participant(&mut self, participant: ParticipantId) -> bool {
        let before = self.participants_in_race.len();
        self.participants_in_race.retain(|id| *id != participant);
        before != self.participants_in_race.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants_in_race.is_empty()
    }
}

/// What observers are told about the session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub phase: PhaseKind,
    pub countdown_deadline: Option<Timestamp>,
    pub current_race: Option<RaceSessionData>,
    pub previous_race: Option<RaceSessionData>,
}

impl SessionView {
    pub fn countdown_remaining(&self, now: Timestamp) -> Option<f64> {
        self.countdown_deadline
            .map(|deadline| (deadline - now).max(0.0))
    }

    pub fn is_racing(&self, participant: ParticipantId) -> bool {
        self.phase == PhaseKind::Race
            && self
                .current_race
                .as_ref()
                .is_some_and(|race| race.contains(participant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_codes() {
        for phase in [PhaseKind::Idle, PhaseKind::Intermission, PhaseKind::Race] {
            assert_eq!(PhaseKind::try_from(phase.code()), Ok(phase));
        }
        assert_eq!(PhaseKind::try_from(9), Err(RaceError::UnknownPhase(9)));
    }

    #[test]
    fn test_finish_order_append_only() {
        let mut race = RaceSessionData::new(1, vec![1, 2, 3]);
        race.record_finish(2);
        race.record_finish(1);
        race.record_finish(2);
        assert_eq!(race.finished_participants, vec![2, 1]);
    }

    #[test]
    fn test_remove_participant() {
        let mut race = RaceSessionData::new(1, vec![1, 2]);
        assert!(race.remove_participant(1));
        assert!(!race.remove_participant(1));
        assert!(!race.is_empty());
        assert!(race.remove_participant(2));
        assert!(race.is_empty());
    }

    #[test]
    fn test_elapsed_before_start() {
        let mut race = RaceSessionData::new(1, vec![1]);
        assert_eq!(race.elapsed(50.0), 0.0);
        race.start_time = Some(40.0);
        assert_eq!(race.elapsed(50.0), 10.0);
    }

    #[test]
    fn test_session_view_helpers() {
        let view = SessionView {
            phase: PhaseKind::Race,
            countdown_deadline: Some(12.0),
            current_race: Some(RaceSessionData::new(3, vec![4])),
            previous_race: None,
        };
        assert_eq!(view.countdown_remaining(10.0), Some(2.0));
        assert_eq!(view.countdown_remaining(20.0), Some(0.0));
        assert!(view.is_racing(4));
        assert!(!view.is_racing(5));
    }
}
