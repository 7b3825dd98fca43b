//! Tunables for the race session

use shared::{DEFAULT_MAX_HEALTH, DEFAULT_TICK_RATE};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Countdown, in seconds, when exactly one participant is ready
    pub intermission_single_player: f64,
    /// Countdown, in seconds, when several participants are ready
    pub intermission_multi_player: f64,
    pub max_health: i32,
    /// Delay before a dead racer gets a fresh body; `None` means death eliminates
    pub respawn_delay: Option<f64>,
    /// Races end after this many seconds even if not everyone is done
    pub race_time_limit: Option<f64>,
    /// Health lost per unit of impact speed
    pub collision_damage_scale: f32,
    pub checkpoint_count: usize,
    /// Ticks the track generator takes before signalling ready
    pub track_latency_ticks: u32,
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            intermission_single_player: 3.0,
            intermission_multi_player: 10.0,
            max_health: DEFAULT_MAX_HEALTH,
            respawn_delay: None,
            race_time_limit: None,
            collision_damage_scale: 1.5,
            checkpoint_count: 8,
            track_latency_ticks: 30,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Countdown length for the given number of ready participants
    pub fn intermission_for(&self, ready_count: usize) -> f64 {
        if ready_count == 1 {
            self.intermission_single_player
        } else {
            self.intermission_multi_player
        }
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intermission_lengths() {
        let config = SessionConfig::default();
        assert_eq!(config.intermission_for(1), 3.0);
        assert_eq!(config.intermission_for(2), 10.0);
        assert_eq!(config.intermission_for(8), 10.0);
    }

    #[test]
    fn test_tick_duration_validation() {
        let config = SessionConfig {
            tick_rate: 60,
            ..SessionConfig::default()
        };
        assert_eq!(config.tick_duration().as_millis(), 16);

        let broken = SessionConfig {
            tick_rate: 0,
            ..SessionConfig::default()
        };
        assert_eq!(broken.tick_duration(), Duration::from_secs(1));
    }
}
