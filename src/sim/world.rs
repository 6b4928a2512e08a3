//! Simulation adapter contract
//!
//! The generator never integrates motion itself. It drives a rigid-body
//! engine through [`Simulation`], so the built-in [`super::World`] or any
//! other engine (or a scripted fake in tests) can sit underneath.
//!
//! Calling any method with a handle that was never created or has been
//! destroyed is a programming error; implementations panic.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Opaque identity of a body inside a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyHandle(pub u32);

/// Position and rotation of a body
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub pos: Vec2,
    /// Rotation (radians, counter-clockwise)
    pub angle: f32,
}

impl Pose {
    pub fn new(pos: Vec2, angle: f32) -> Self {
        Self { pos, angle }
    }

    pub fn at(pos: Vec2) -> Self {
        Self { pos, angle: 0.0 }
    }

    pub fn is_finite(&self) -> bool {
        self.pos.is_finite() && self.angle.is_finite()
    }
}

/// Collider geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    /// Box with half extents along its local x and y axes
    Box { half: Vec2 },
}

/// Rigid-body engine operations the generator consumes
pub trait Simulation {
    /// Advance one fixed timestep
    fn step(&mut self);

    fn create_static_body(&mut self, pose: Pose, shape: Shape) -> BodyHandle;

    fn create_dynamic_body(&mut self, pose: Pose, velocity: Vec2, shape: Shape) -> BodyHandle;

    fn transform(&self, body: BodyHandle) -> Pose;

    fn set_transform(&mut self, body: BodyHandle, pose: Pose);

    fn velocity(&self, body: BodyHandle) -> Vec2;

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2);

    /// Enabled bodies whose colliders currently overlap `body`'s collider,
    /// sensors included
    fn query_overlapping(&self, body: BodyHandle) -> Vec<BodyHandle>;

    /// Bodies `body` touched with a physical response during the last step
    fn query_contacts(&self, body: BodyHandle) -> Vec<BodyHandle>;

    fn destroy_body(&mut self, body: BodyHandle);

    fn set_enabled(&mut self, body: BodyHandle, enabled: bool);

    /// A sensor reports overlaps but never exerts a collision response
    fn set_sensor(&mut self, body: BodyHandle, sensor: bool);

    fn set_restitution(&mut self, body: BodyHandle, restitution: f32);
}
