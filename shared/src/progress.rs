//! Race progress and leaderboard ordering
//!
//! Progress is tracked as an unordered set of passed checkpoints plus start and
//! finish timestamps. Standings are derived fresh every tick from participant
//! state; nothing here keeps ranking state between ticks.

use crate::participant::{Participant, Role};
use crate::{BodyId, ParticipantId};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

pub type CheckpointId = u32;

/// Seconds on the session clock
pub type Timestamp = f64;

/// Finish time of a participant that has not finished
pub const NOT_FINISHED: Timestamp = f64::INFINITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub start_time: Timestamp,
    pub finish_time: Timestamp,
    pub checkpoints_passed: BTreeSet<CheckpointId>,
}

impl Default for ProgressInfo {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            finish_time: NOT_FINISHED,
            checkpoints_passed: BTreeSet::new(),
        }
    }
}

impl ProgressInfo {
    pub fn started(start_time: Timestamp) -> Self {
        Self {
            start_time,
            ..Self::default()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish_time != NOT_FINISHED
    }

    pub fn passed_count(&self) -> usize {
        self.checkpoints_passed.len()
    }

    pub fn has_passed(&self, checkpoint: CheckpointId) -> bool {
        self.checkpoints_passed.contains(&checkpoint)
    }

    /// Returns the progress after crossing `checkpoint`
    ///
    /// Crossing the finish checkpoint stamps the finish time. Once finished
    /// the progress is frozen and further crossings return it unchanged.
    pub fn with_checkpoint(
        &self,
        checkpoint: CheckpointId,
        finish: CheckpointId,
        now: Timestamp,
    ) -> Self {
        if self.is_finished() {
            return self.clone();
        }

        let mut next = self.clone();
        next.checkpoints_passed.insert(checkpoint);
        if checkpoint == finish {
            next.finish_time = now;
        }
        next
    }

    /// Elapsed race time for a finished participant
    pub fn race_time(&self) -> Option<f64> {
        self.is_finished()
            .then(|| self.finish_time - self.start_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub position: Vec3,
    pub radius: f32,
}

impl Checkpoint {
    pub fn contains(&self, point: Vec3) -> bool {
        self.position.distance_squared(point) <= self.radius * self.radius
    }
}

/// Ordered checkpoints of one generated track, the last one being the finish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSequence {
    checkpoints: Vec<Checkpoint>,
}

impl CheckpointSequence {
    /// Builds a sequence, rejecting an empty list since a track needs a finish
    pub fn new(checkpoints: Vec<Checkpoint>) -> Option<Self> {
        if checkpoints.is_empty() {
            None
        } else {
            Some(Self { checkpoints })
        }
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.checkpoints.iter()
    }

    pub fn as_slice(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn finish(&self) -> &Checkpoint {
        &self.checkpoints[self.checkpoints.len() - 1]
    }

    pub fn finish_id(&self) -> CheckpointId {
        self.finish().id
    }

    pub fn get(&self, id: CheckpointId) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.id == id)
    }

    pub fn index_of(&self, id: CheckpointId) -> Option<usize> {
        self.checkpoints.iter().position(|c| c.id == id)
    }

    /// Next checkpoint for someone who has passed `passed` of them
    ///
    /// Clamped to the finish so a finished participant still has a target.
    pub fn next_checkpoint(&self, passed: usize) -> &Checkpoint {
        let index = passed.min(self.checkpoints.len() - 1);
        &self.checkpoints[index]
    }
}

/// One row of the leaderboard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub participant: ParticipantId,
    pub finish_time: Timestamp,
    pub checkpoints_passed: usize,
    pub distance_to_next: f32,
}

impl Standing {
    /// Measures a participant against the track
    ///
    /// Without a known body position the distance is infinite, which puts the
    /// participant last among those with equal progress.
    pub fn measure(
        participant: ParticipantId,
        progress: &ProgressInfo,
        position: Option<Vec3>,
        track: &CheckpointSequence,
    ) -> Self {
        let checkpoints_passed = progress.passed_count();
        let distance_to_next = match position {
            Some(position) => track
                .next_checkpoint(checkpoints_passed)
                .position
                .distance(position),
            None => f32::INFINITY,
        };

        Self {
            participant,
            finish_time: progress.finish_time,
            checkpoints_passed,
            distance_to_next,
        }
    }
}

/// Leaderboard comparator
///
/// Earlier finish first, then more checkpoints, then closer to the next
/// checkpoint, then lower participant id.
pub fn compare_standings(a: &Standing, b: &Standing) -> Ordering {
    a.finish_time
        .total_cmp(&b.finish_time)
        .then_with(|| b.checkpoints_passed.cmp(&a.checkpoints_passed))
        .then_with(|| a.distance_to_next.total_cmp(&b.distance_to_next))
        .then_with(|| a.participant.cmp(&b.participant))
}

/// Sorts already measured standings into leaderboard order
pub fn sort_standings(mut standings: Vec<Standing>) -> Vec<Standing> {
    standings.sort_by(compare_standings);
    standings
}

/// Ranks the racers among `participants`
///
/// Pursuers take no part in scoring and are skipped. `position_of` resolves
/// a body to its current position and may fail for destroyed bodies.
pub fn rank<'a, I, F>(participants: I, track: &CheckpointSequence, position_of: F) -> Vec<Standing>
where
    I: IntoIterator<Item = &'a Participant>,
    F: Fn(BodyId) -> Option<Vec3>,
{
    let standings = participants
        .into_iter()
        .filter(|p| p.role() == Role::Racer)
        .map(|p| {
            let position = p.body().and_then(&position_of);
            Standing::measure(p.id(), p.progress(), position, track)
        })
        .collect();

    sort_standings(standings)
}
