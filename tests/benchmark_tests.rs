//! Performance benchmarks for critical race systems

use glam::{Quat, Vec3};
use server::ai::AgentDriver;
use server::config::SessionConfig;
use server::session::RaceSession;
use server::track::LoopTrackGenerator;
use server::world::{BodyProvider, KinematicWorld};
use shared::progress::rank;
use shared::{
    Authority, BodyKind, BodyReconciler, BodySample, Checkpoint, CheckpointSequence, DriveInput,
    Participant, Role,
};
use std::time::Instant;

const DT: f32 = 1.0 / 60.0;

fn track(count: u32) -> CheckpointSequence {
    let checkpoints = (1..=count)
        .map(|id| Checkpoint {
            id,
            position: Vec3::new(0.0, 0.0, id as f32 * 40.0),
            radius: 10.0,
        })
        .collect();
    CheckpointSequence::new(checkpoints).unwrap()
}

/// Benchmarks leaderboard ranking for a full grid
#[test]
fn benchmark_ranking() {
    let track = track(8);
    let mut participants: Vec<Participant> = (1..=32)
        .map(|id| Participant::new(id, format!("P{}", id), false, Role::Racer, 100, Authority::Server))
        .collect();
    for (i, p) in participants.iter_mut().enumerate() {
        p.assign_body(i as u32 + 1).unwrap();
        p.start_race(0.0).unwrap();
        for checkpoint in track.iter().take(i % 8) {
            p.record_checkpoint(checkpoint.id, track.finish_id(), 1.0).unwrap();
        }
    }

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let standings = rank(&participants, &track, |body| {
            Some(Vec3::new(body as f32, 0.0, 0.0))
        });
        assert_eq!(standings.len(), 32);
    }

    let duration = start.elapsed();
    println!(
        "Ranking: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks reconciler ticks for many remote bodies
#[test]
fn benchmark_reconciler() {
    let mut reconcilers: Vec<BodyReconciler> = (0..100)
        .map(|i| {
            let mut r = BodyReconciler::new(0.2);
            r.push_sample(BodySample::at_rest(
                Vec3::new(i as f32, 0.0, 0.0),
                Quat::IDENTITY,
                0.0,
            ));
            r
        })
        .collect();

    let iterations = 1000;
    let start = Instant::now();

    for tick in 0..iterations {
        for (i, r) in reconcilers.iter_mut().enumerate() {
            if tick % 3 == 0 {
                r.push_sample(BodySample {
                    position: Vec3::new(i as f32, 0.0, tick as f32 * 0.5),
                    rotation: Quat::from_rotation_y(tick as f32 * 0.01),
                    linear_velocity: Vec3::new(0.0, 0.0, 30.0),
                    angular_velocity: Vec3::ZERO,
                    time: tick as f64 * DT as f64,
                });
            }
            r.tick(DT);
        }
    }

    let duration = start.elapsed();
    println!(
        "Reconciler: {} ticks x 100 bodies in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks the kinematic world stepping a crowded grid
#[test]
fn benchmark_world_step() {
    let track = track(8);
    let mut world = KinematicWorld::new();
    let bodies: Vec<_> = (0..32)
        .map(|i| {
            let position = Vec3::new((i % 8) as f32 * 6.0, 0.0, (i / 8) as f32 * -8.0);
            world.spawn(BodyKind::Car, position, Quat::IDENTITY)
        })
        .collect();
    for (i, &body) in bodies.iter().enumerate() {
        world.set_input_enabled(body, true);
        world.drive(body, DriveInput::new(1.0, (i as f32 * 0.1).sin()));
    }

    let iterations = 1000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = world.step(DT, Some(&track));
    }

    let duration = start.elapsed();
    println!(
        "World step: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 3000);
}

/// Benchmarks full session ticks with AI agents racing
#[test]
fn benchmark_session_tick() {
    let config = SessionConfig {
        intermission_multi_player: 0.1,
        track_latency_ticks: 0,
        seed: Some(5),
        ..SessionConfig::default()
    };
    let tracks = LoopTrackGenerator::new(config.checkpoint_count, 0, config.seed);
    let mut session = RaceSession::new(config, tracks, KinematicWorld::new());
    let mut agents = AgentDriver::new();
    for id in 1..=12 {
        let role = if id % 4 == 0 { Role::Pursuer } else { Role::Racer };
        session.enqueue(agents.add_agent(id, &format!("Bot {}", id), role));
    }

    let iterations = 1200;
    let mut now = 0.0;
    let start = Instant::now();

    for _ in 0..iterations {
        now += DT as f64;
        for input in agents.tick(&session) {
            session.enqueue(input);
        }
        let _ = session.tick(now, DT);
    }

    let duration = start.elapsed();
    println!(
        "Session tick: {} ticks with 12 agents in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Twenty seconds of simulated time must run well under real time
    assert!(duration.as_millis() < 5000);
}
