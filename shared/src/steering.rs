//! Arcade steering toward a point, shared by AI agents and the client autopilot

use crate::body::DriveInput;
use glam::{Quat, Vec3};

/// Heading error, in radians, that maps to full steering lock
const FULL_LOCK_ANGLE: f32 = std::f32::consts::FRAC_PI_4;

/// Beyond this heading error the car backs off the throttle to turn tighter
const SLOW_TURN_ANGLE: f32 = 1.5;

/// Forward axis of a body with the given rotation, flattened onto the ground plane
pub fn forward(rotation: Quat) -> Vec3 {
    let f = rotation * Vec3::Z;
    Vec3::new(f.x, 0.0, f.z).normalize_or_zero()
}

/// Signed yaw, in radians, that turns `rotation`'s forward axis toward `target`
///
/// Positive values turn counter-clockwise around +Y.
pub fn heading_error(position: Vec3, rotation: Quat, target: Vec3) -> f32 {
    let to_target = Vec3::new(target.x - position.x, 0.0, target.z - position.z);
    let desired = to_target.normalize_or_zero();
    if desired == Vec3::ZERO {
        return 0.0;
    }

    let f = forward(rotation);
    let cross = f.z * desired.x - f.x * desired.z;
    cross.atan2(f.dot(desired))
}

/// Drive controls that head a body at `position` toward `target`
pub fn steer_towards(position: Vec3, rotation: Quat, target: Vec3) -> DriveInput {
    let error = heading_error(position, rotation, target);
    let steer = error / FULL_LOCK_ANGLE;
    let throttle = if error.abs() > SLOW_TURN_ANGLE { 0.4 } else { 1.0 };
    DriveInput::new(throttle, steer)
}
