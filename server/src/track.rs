//! Track generation for the race session
//!
//! The session asks for a track when a race begins and waits for the
//! provider to signal that it is ready. Generation is modelled as taking a
//! number of ticks so the session's waiting stage is exercised the same way a
//! slow procedural generator would exercise it.

use glam::{Quat, Vec3};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Checkpoint, CheckpointSequence};
use std::f32::consts::TAU;

pub const CHECKPOINT_RADIUS: f32 = 15.0;
const GRID_COLUMN_SPACING: f32 = 6.0;
const GRID_ROW_SPACING: f32 = 8.0;

pub trait TrackProvider {
    /// Starts building a new track, discarding any previous one
    fn generate(&mut self);

    /// Returns the finished checkpoint sequence exactly once per `generate`
    fn poll_ready(&mut self) -> Option<CheckpointSequence>;

    /// Starting transforms for `count` bodies on the current track
    fn start_grid(&self, count: usize) -> Vec<(Vec3, Quat)>;

    fn teardown(&mut self);
}

/// Builds loop tracks with jittered checkpoints around an ellipse
///
/// The start line sits at the origin facing +Z and the course runs
/// counter-clockwise back toward it. The finish is the last checkpoint
/// before the start so the grid never overlaps it.
pub struct LoopTrackGenerator {
    rng: StdRng,
    checkpoint_count: usize,
    latency_ticks: u32,
    radius_x: f32,
    radius_z: f32,
    pending: Option<u32>,
    current: Option<CheckpointSequence>,
}

impl LoopTrackGenerator {
    pub fn new(checkpoint_count: usize, latency_ticks: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            rng,
            checkpoint_count: checkpoint_count.max(1),
            latency_ticks,
            radius_x: 150.0,
            radius_z: 220.0,
            pending: None,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&CheckpointSequence> {
        self.current.as_ref()
    }

    fn point_on_loop(&self, angle: f32, scale: f32) -> Vec3 {
        Vec3::new(
            self.radius_x * (1.0 - angle.cos() * scale),
            0.0,
            self.radius_z * angle.sin() * scale,
        )
    }

    fn build(&mut self) -> Option<CheckpointSequence> {
        let n = self.checkpoint_count;
        let checkpoints = (0..n)
            .map(|i| {
                let angle = TAU * (i + 1) as f32 / (n + 1) as f32;
                let scale = self.rng.gen_range(0.9..1.1);
                Checkpoint {
                    id: i as u32 + 1,
                    position: self.point_on_loop(angle, scale),
                    radius: CHECKPOINT_RADIUS,
                }
            })
            .collect();

        CheckpointSequence::new(checkpoints)
    }
}

impl TrackProvider for LoopTrackGenerator {
    fn generate(&mut self) {
        self.current = None;
        self.pending = Some(self.latency_ticks);
    }

    fn poll_ready(&mut self) -> Option<CheckpointSequence> {
        match self.pending {
            Some(0) => {
                self.pending = None;
                let track = self.build()?;
                info!("Track ready with {} checkpoints", track.len());
                self.current = Some(track.clone());
                Some(track)
            }
            Some(remaining) => {
                self.pending = Some(remaining - 1);
                None
            }
            None => None,
        }
    }

    fn start_grid(&self, count: usize) -> Vec<(Vec3, Quat)> {
        (0..count)
            .map(|slot| {
                let column = (slot % 2) as f32 - 0.5;
                let row = (slot / 2) as f32;
                let position = Vec3::new(
                    column * GRID_COLUMN_SPACING,
                    0.0,
                    -row * GRID_ROW_SPACING,
                );
                (position, Quat::IDENTITY)
            })
            .collect()
    }

    fn teardown(&mut self) {
        self.pending = None;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_after_latency() {
        let mut generator = LoopTrackGenerator::new(6, 2, Some(7));
        assert!(generator.poll_ready().is_none());

        generator.generate();
        assert!(generator.poll_ready().is_none());
        assert!(generator.poll_ready().is_none());
        let track = generator.poll_ready().unwrap();
        assert_eq!(track.len(), 6);
        assert!(generator.poll_ready().is_none());
        assert_eq!(generator.current(), Some(&track));
    }

    #[test]
    fn test_zero_latency_ready_immediately() {
        let mut generator = LoopTrackGenerator::new(3, 0, Some(1));
        generator.generate();
        assert!(generator.poll_ready().is_some());
    }

    #[test]
    fn test_zero_checkpoints_still_builds_a_track() {
        let mut generator = LoopTrackGenerator::new(0, 0, Some(2));
        generator.generate();
        let track = generator.poll_ready().unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(generator.current(), Some(&track));
    }

    #[test]
    fn test_seeded_generation_is_deterministic() {
        let mut a = LoopTrackGenerator::new(5, 0, Some(99));
        let mut b = LoopTrackGenerator::new(5, 0, Some(99));
        a.generate();
        b.generate();
        assert_eq!(a.poll_ready(), b.poll_ready());
    }

    #[test]
    fn test_finish_clear_of_grid() {
        let mut generator = LoopTrackGenerator::new(8, 0, Some(3));
        generator.generate();
        let track = generator.poll_ready().unwrap();

        for (position, _) in generator.start_grid(8) {
            for checkpoint in track.iter() {
                assert!(!checkpoint.contains(position));
            }
        }
        assert_eq!(track.finish_id(), 8);
    }

    #[test]
    fn test_teardown_discards_track() {
        let mut generator = LoopTrackGenerator::new(4, 0, Some(5));
        generator.generate();
        generator.poll_ready();
        generator.teardown();
        assert!(generator.current().is_none());
    }
}
