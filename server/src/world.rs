//! Body simulation for the authoritative session
//!
//! [`KinematicWorld`] stands in for a full vehicle physics engine: bodies are
//! flat arcade cars with a yaw and a forward speed. It reports what the
//! session needs to know (checkpoint entries and collisions) and nothing else.

use glam::{EulerRot, Quat, Vec3};
use log::debug;
use shared::{BodyId, BodyKind, BodyTransform, CheckpointId, CheckpointSequence, DriveInput};
use std::collections::{BTreeMap, HashSet};

pub const BODY_RADIUS: f32 = 2.0;
pub const MAX_SPEED: f32 = 40.0;
const MAX_REVERSE_SPEED: f32 = 10.0;
const ACCELERATION: f32 = 25.0;
const DRAG: f32 = 0.4;
const BRAKE_DECELERATION: f32 = 30.0;
/// Yaw rate at full lock and full speed, radians per second
const TURN_RATE: f32 = 2.0;
/// Pursuers are a little faster than the cars they hunt
const PURSUER_SPEED_FACTOR: f32 = 1.1;
/// Speed retained by both bodies after an impact
const IMPACT_RESTITUTION: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyEvent {
    /// A body entered a checkpoint volume this step
    CheckpointTriggered {
        body: BodyId,
        checkpoint: CheckpointId,
    },
    /// Two bodies started touching this step
    Collision {
        a: BodyId,
        b: BodyId,
        impact_speed: f32,
    },
}

pub trait BodyProvider {
    fn spawn(&mut self, kind: BodyKind, position: Vec3, rotation: Quat) -> BodyId;

    /// Removes a body, returning whether it existed
    fn destroy(&mut self, body: BodyId) -> bool;

    fn read(&self, body: BodyId) -> Option<BodyTransform>;

    /// Disabled bodies ignore drive input and coast to a stop
    fn set_input_enabled(&mut self, body: BodyId, enabled: bool);

    fn drive(&mut self, body: BodyId, input: DriveInput);

    fn step(&mut self, dt: f32, track: Option<&CheckpointSequence>) -> Vec<BodyEvent>;
}

#[derive(Debug, Clone)]
struct KinematicBody {
    kind: BodyKind,
    position: Vec3,
    yaw: f32,
    speed: f32,
    yaw_rate: f32,
    input: DriveInput,
    input_enabled: bool,
    inside: HashSet<CheckpointId>,
}

impl KinematicBody {
    fn max_speed(&self) -> f32 {
        match self.kind {
            BodyKind::Car => MAX_SPEED,
            BodyKind::PursuerCar => MAX_SPEED * PURSUER_SPEED_FACTOR,
        }
    }

    fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }

    fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    fn velocity(&self) -> Vec3 {
        self.forward() * self.speed
    }

    fn simulate(&mut self, dt: f32) {
        if self.input_enabled {
            self.speed += self.input.throttle * ACCELERATION * dt;
            self.speed -= self.speed * DRAG * dt;
        } else {
            let brake = BRAKE_DECELERATION * dt;
            self.speed = if self.speed.abs() <= brake {
                0.0
            } else {
                self.speed - brake * self.speed.signum()
            };
        }
        self.speed = self.speed.clamp(-MAX_REVERSE_SPEED, self.max_speed());

        let steer = if self.input_enabled { self.input.steer } else { 0.0 };
        let grip = (self.speed / MAX_SPEED).clamp(-1.0, 1.0);
        self.yaw_rate = steer * TURN_RATE * grip;
        self.yaw = (self.yaw + self.yaw_rate * dt).rem_euclid(std::f32::consts::TAU);

        self.position += self.velocity() * dt;
    }

    fn transform(&self) -> BodyTransform {
        BodyTransform {
            position: self.position,
            rotation: self.rotation(),
            linear_velocity: self.velocity(),
            angular_velocity: Vec3::new(0.0, self.yaw_rate, 0.0),
        }
    }
}

#[derive(Debug, Default)]
pub struct KinematicWorld {
    bodies: BTreeMap<BodyId, KinematicBody>,
    contacts: HashSet<(BodyId, BodyId)>,
    next_body_id: BodyId,
}

impl KinematicWorld {
    pub fn new() -> Self {
        Self {
            bodies: BTreeMap::new(),
            contacts: HashSet::new(),
            next_body_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn contains(&self, body: BodyId) -> bool {
        self.bodies.contains_key(&body)
    }

    pub fn is_input_enabled(&self, body: BodyId) -> Option<bool> {
        self.bodies.get(&body).map(|b| b.input_enabled)
    }

    /// Substeps needed so no body moves more than half its radius per substep
    fn required_substeps(dt: f32) -> u32 {
        const SAFETY_FACTOR: f32 = 0.5;

        let max_movement_per_step = BODY_RADIUS * SAFETY_FACTOR;
        let max_movement_this_tick = MAX_SPEED * PURSUER_SPEED_FACTOR * dt;

        if max_movement_this_tick > max_movement_per_step {
            (max_movement_this_tick / max_movement_per_step).ceil() as u32
        } else {
            1
        }
    }

    fn detect_checkpoints(&mut self, track: &CheckpointSequence, events: &mut Vec<BodyEvent>) {
        for (&id, body) in self.bodies.iter_mut() {
            for checkpoint in track.iter() {
                if checkpoint.contains(body.position) {
                    if body.inside.insert(checkpoint.id) {
                        events.push(BodyEvent::CheckpointTriggered {
                            body: id,
                            checkpoint: checkpoint.id,
                        });
                    }
                } else {
                    body.inside.remove(&checkpoint.id);
                }
            }
        }
    }

    fn handle_collisions(&mut self, events: &mut Vec<BodyEvent>) {
        let ids: Vec<BodyId> = self.bodies.keys().copied().collect();

        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let (id1, id2) = (ids[i], ids[j]);
                let (Some(b1), Some(b2)) = (self.bodies.get(&id1), self.bodies.get(&id2)) else {
                    continue;
                };

                let offset = b2.position - b1.position;
                let distance = offset.length();
                let min_distance = BODY_RADIUS * 2.0;

                if distance >= min_distance {
                    self.contacts.remove(&(id1, id2));
                    continue;
                }

                if self.contacts.insert((id1, id2)) {
                    let impact_speed = (b1.velocity() - b2.velocity()).length();
                    events.push(BodyEvent::Collision {
                        a: id1,
                        b: id2,
                        impact_speed,
                    });
                }

                // Push both bodies apart along the contact normal
                let normal = if distance > f32::EPSILON {
                    offset / distance
                } else {
                    Vec3::X
                };
                let correction = normal * ((min_distance - distance) / 2.0);

                if let Some(b1) = self.bodies.get_mut(&id1) {
                    b1.position -= correction;
                    b1.speed *= IMPACT_RESTITUTION;
                }
                if let Some(b2) = self.bodies.get_mut(&id2) {
                    b2.position += correction;
                    b2.speed *= IMPACT_RESTITUTION;
                }
            }
        }
    }
}

impl BodyProvider for KinematicWorld {
    fn spawn(&mut self, kind: BodyKind, position: Vec3, rotation: Quat) -> BodyId {
        let id = self.next_body_id;
        self.next_body_id += 1;

        let (yaw, _, _) = rotation.to_euler(EulerRot::YXZ);
        self.bodies.insert(
            id,
            KinematicBody {
                kind,
                position,
                yaw,
                speed: 0.0,
                yaw_rate: 0.0,
                input: DriveInput::default(),
                input_enabled: true,
                inside: HashSet::new(),
            },
        );
        debug!("Spawned {:?} body {} at {:?}", kind, id, position);
        id
    }

    fn destroy(&mut self, body: BodyId) -> bool {
        self.contacts.retain(|(a, b)| *a != body && *b != body);
        let existed = self.bodies.remove(&body).is_some();
        if existed {
            debug!("Destroyed body {}", body);
        }
        existed
    }

    fn read(&self, body: BodyId) -> Option<BodyTransform> {
        self.bodies.get(&body).map(KinematicBody::transform)
    }

    fn set_input_enabled(&mut self, body: BodyId, enabled: bool) {
        if let Some(b) = self.bodies.get_mut(&body) {
            b.input_enabled = enabled;
            if !enabled {
                b.input = DriveInput::default();
            }
        }
    }

    fn drive(&mut self, body: BodyId, input: DriveInput) {
        if let Some(b) = self.bodies.get_mut(&body) {
            if b.input_enabled {
                b.input = input.clamped();
            }
        }
    }

    fn step(&mut self, dt: f32, track: Option<&CheckpointSequence>) -> Vec<BodyEvent> {
        let mut events = Vec::new();
        if dt <= 0.0 {
            return events;
        }

        let substeps = Self::required_substeps(dt);
        let substep_dt = dt / substeps as f32;

        for _ in 0..substeps {
            for body in self.bodies.values_mut() {
                body.simulate(substep_dt);
            }
            self.handle_collisions(&mut events);
            if let Some(track) = track {
                self.detect_checkpoints(track, &mut events);
            }
        }

        events
    }
}
