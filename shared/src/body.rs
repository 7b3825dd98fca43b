//! Physical body samples and remote-body reconciliation
//!
//! The authority pushes a [`BodySample`] for every body each tick. Observers
//! feed those samples into a [`BodyReconciler`], which dead-reckons the
//! authoritative position forward and blends the local body toward it instead
//! of snapping. Velocities are taken verbatim so collision response on the
//! observer matches the authoritative simulation.

use crate::BodyId;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Authoritative state of one body at a point on the session clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySample {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub time: f64,
}

impl BodySample {
    pub fn at_rest(position: Vec3, rotation: Quat, time: f64) -> Self {
        Self {
            position,
            rotation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            time,
        }
    }

    /// Stamps a transform read from the physics provider with the session clock
    pub fn from_transform(transform: BodyTransform, time: f64) -> Self {
        Self {
            position: transform.position,
            rotation: transform.rotation,
            linear_velocity: transform.linear_velocity,
            angular_velocity: transform.angular_velocity,
            time,
        }
    }
}

/// What the physics provider should spawn for a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyKind {
    Car,
    PursuerCar,
}

/// Drive controls for one body, each axis in [-1, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveInput {
    pub throttle: f32,
    pub steer: f32,
}

impl DriveInput {
    pub fn new(throttle: f32, steer: f32) -> Self {
        Self { throttle, steer }.clamped()
    }

    /// Clamps both axes, mapping NaN to zero
    pub fn clamped(self) -> Self {
        let clamp = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(-1.0, 1.0) };
        Self {
            throttle: clamp(self.throttle),
            steer: clamp(self.steer),
        }
    }
}

/// Locally presented transform of a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

impl From<BodySample> for BodyTransform {
    fn from(sample: BodySample) -> Self {
        Self {
            position: sample.position,
            rotation: sample.rotation,
            linear_velocity: sample.linear_velocity,
            angular_velocity: sample.angular_velocity,
        }
    }
}

/// Smooths one remote body toward its authoritative sample stream
#[derive(Debug, Clone)]
pub struct BodyReconciler {
    alpha: f32,
    latest: Option<BodySample>,
    predicted: Vec3,
    local: Option<BodyTransform>,
}

impl BodyReconciler {
    /// `alpha` is the per-tick blend factor; it is not scaled by tick length
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::EPSILON, 1.0),
            latest: None,
            predicted: Vec3::ZERO,
            local: None,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Accepts a new authoritative sample
    ///
    /// Samples older than the latest one are ignored, since datagrams may
    /// arrive out of order. The very first sample snaps the local body.
    pub fn push_sample(&mut self, sample: BodySample) -> bool {
        if let Some(latest) = self.latest {
            if sample.time < latest.time {
                return false;
            }
        }

        match self.local.as_mut() {
            Some(local) => {
                local.linear_velocity = sample.linear_velocity;
                local.angular_velocity = sample.angular_velocity;
            }
            None => self.local = Some(sample.into()),
        }

        self.predicted = sample.position;
        self.latest = Some(sample);
        true
    }

    /// Advances the local body by one fixed tick of `dt` seconds
    pub fn tick(&mut self, dt: f32) -> Option<BodyTransform> {
        let sample = self.latest?;
        let local = self.local.as_mut()?;

        // Dead reckoning runs tick to tick from the newest sample.
        self.predicted += sample.linear_velocity * dt;

        // The body moves under its own velocity before being pulled toward
        // the prediction.
        local.position += local.linear_velocity * dt;
        local.position = local.position.lerp(self.predicted, self.alpha);
        local.rotation = local.rotation.slerp(sample.rotation, self.alpha).normalize();

        local.linear_velocity = sample.linear_velocity;
        local.angular_velocity = sample.angular_velocity;

        Some(*local)
    }

    pub fn transform(&self) -> Option<BodyTransform> {
        self.local
    }

    pub fn predicted_position(&self) -> Option<Vec3> {
        self.latest.map(|_| self.predicted)
    }

    pub fn latest_sample(&self) -> Option<&BodySample> {
        self.latest.as_ref()
    }
}

/// One reconciler per remote body
#[derive(Debug)]
pub struct ReconcilerSet {
    alpha: f32,
    bodies: HashMap<BodyId, BodyReconciler>,
}

impl ReconcilerSet {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            bodies: HashMap::new(),
        }
    }

    pub fn push_sample(&mut self, body: BodyId, sample: BodySample) -> bool {
        let alpha = self.alpha;
        self.bodies
            .entry(body)
            .or_insert_with(|| BodyReconciler::new(alpha))
            .push_sample(sample)
    }

    pub fn remove(&mut self, body: BodyId) -> bool {
        self.bodies.remove(&body).is_some()
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
    }

    pub fn tick(&mut self, dt: f32) {
        for reconciler in self.bodies.values_mut() {
            reconciler.tick(dt);
        }
    }

    pub fn transform(&self, body: BodyId) -> Option<BodyTransform> {
        self.bodies.get(&body).and_then(BodyReconciler::transform)
    }

    pub fn position(&self, body: BodyId) -> Option<Vec3> {
        self.transform(body).map(|t| t.position)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const DT: f32 = 1.0 / 60.0;

    fn moving_sample(position: Vec3, velocity: Vec3, time: f64) -> BodySample {
        BodySample {
            position,
            rotation: Quat::IDENTITY,
            linear_velocity: velocity,
            angular_velocity: Vec3::ZERO,
            time,
        }
    }

    #[test]
    fn test_first_sample_snaps() {
        let mut r = BodyReconciler::new(0.2);
        assert!(r.tick(DT).is_none());

        r.push_sample(BodySample::at_rest(Vec3::new(5.0, 0.0, 5.0), Quat::IDENTITY, 0.0));
        let t = r.transform().unwrap();
        assert_eq!(t.position, Vec3::new(5.0, 0.0, 5.0));
    }

    #[test]
    fn test_stale_sample_ignored() {
        let mut r = BodyReconciler::new(0.2);
        assert!(r.push_sample(BodySample::at_rest(Vec3::X, Quat::IDENTITY, 2.0)));
        assert!(!r.push_sample(BodySample::at_rest(Vec3::Y, Quat::IDENTITY, 1.0)));
        assert_eq!(r.latest_sample().unwrap().position, Vec3::X);
    }

    #[test]
    fn test_blends_instead_of_snapping() {
        let mut r = BodyReconciler::new(0.25);
        r.push_sample(BodySample::at_rest(Vec3::ZERO, Quat::IDENTITY, 0.0));
        r.push_sample(BodySample::at_rest(Vec3::new(8.0, 0.0, 0.0), Quat::IDENTITY, 0.1));

        let t = r.tick(DT).unwrap();
        assert_approx_eq!(t.position.x, 2.0, 1e-5);
    }

    #[test]
    fn test_velocity_applied_directly() {
        let mut r = BodyReconciler::new(0.1);
        r.push_sample(moving_sample(Vec3::ZERO, Vec3::ZERO, 0.0));
        r.push_sample(moving_sample(Vec3::ZERO, Vec3::new(0.0, 0.0, 12.0), 0.1));

        let t = r.tick(DT).unwrap();
        assert_eq!(t.linear_velocity, Vec3::new(0.0, 0.0, 12.0));
    }

    #[test]
    fn test_rotation_slerps_toward_sample() {
        let target = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let mut r = BodyReconciler::new(0.5);
        r.push_sample(BodySample::at_rest(Vec3::ZERO, Quat::IDENTITY, 0.0));
        r.push_sample(BodySample::at_rest(Vec3::ZERO, target, 0.1));

        let first = r.tick(DT).unwrap().rotation;
        assert!(first.angle_between(target) < target.angle_between(Quat::IDENTITY));

        for _ in 0..60 {
            r.tick(DT);
        }
        assert!(r.transform().unwrap().rotation.angle_between(target) < 1e-2);
    }

    #[test]
    fn test_converges_under_steady_motion() {
        let velocity = Vec3::new(10.0, 0.0, -4.0);
        let mut r = BodyReconciler::new(0.2);

        // Start from a badly wrong sample, then stream correct ones every 3 ticks.
        r.push_sample(moving_sample(Vec3::new(6.0, 0.0, 6.0), velocity, 0.0));

        let mut true_position = Vec3::ZERO;
        for tick in 1..=240u32 {
            true_position += velocity * DT;
            if tick % 3 == 0 {
                r.push_sample(moving_sample(true_position, velocity, tick as f64 * DT as f64));
            }
            r.tick(DT);
        }

        // Next tick's extrapolation matches where the body really is.
        let local = r.transform().unwrap().position;
        let predicted = r.predicted_position().unwrap();
        assert!(local.distance(predicted) < 1e-3);
        assert!(predicted.distance(true_position + velocity * DT) < 1e-2);
    }

    #[test]
    fn test_reconciler_set_lifecycle() {
        let mut set = ReconcilerSet::new(0.2);
        assert!(set.push_sample(3, BodySample::at_rest(Vec3::ONE, Quat::IDENTITY, 0.0)));
        assert_eq!(set.len(), 1);
        assert_eq!(set.position(3), Some(Vec3::ONE));

        set.tick(DT);
        assert!(set.remove(3));
        assert!(set.is_empty());
        assert!(set.position(3).is_none());
    }

    #[test]
    fn test_drive_input_clamped() {
        let input = DriveInput::new(3.0, f32::NAN);
        assert_eq!(input, DriveInput::new(1.0, 0.0));
        assert_eq!(DriveInput::new(-2.0, -0.5).throttle, -1.0);
    }
}
