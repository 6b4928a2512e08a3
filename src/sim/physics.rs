//! Built-in fixed-step 2-D world
//!
//! A deliberately small engine: dynamic bodies are treated as circles and
//! collide only against static bodies. Each step integrates gravity, then
//! moves every dynamic body in sub-steps and resolves penetrations using
//! signed distance fields. Iteration is by body handle, so runs are
//! deterministic for a given sequence of calls.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::sdf::{bounce, boxes_overlap, check_sdf_collision, sd_box, sd_circle};
use super::world::{BodyHandle, Pose, Shape, Simulation};
use crate::settings::WorldSettings;

/// Maximum sub-steps per body per step
const MAX_SUBSTEPS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyKind {
    Static,
    Dynamic,
}

/// A rigid body in the world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub kind: BodyKind,
    pub pose: Pose,
    pub vel: Vec2,
    pub shape: Shape,
    pub restitution: f32,
    pub enabled: bool,
    pub sensor: bool,
}

impl Body {
    fn solid(&self) -> bool {
        self.enabled && !self.sensor
    }
}

impl Shape {
    /// Radius of the smallest circle around the shape's center
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Shape::Circle { radius } => radius,
            Shape::Box { half } => half.length(),
        }
    }

    /// Signed distance from `p` to this shape placed at `pose`
    pub fn distance(&self, pose: &Pose, p: Vec2) -> f32 {
        match *self {
            Shape::Circle { radius } => sd_circle(p, pose.pos, radius),
            Shape::Box { half } => sd_box(p, pose.pos, pose.angle, half),
        }
    }
}

/// Overlap test between two placed shapes
pub fn shapes_overlap(a: (&Pose, &Shape), b: (&Pose, &Shape)) -> bool {
    match (*a.1, *b.1) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            a.0.pos.distance(b.0.pos) < ra + rb
        }
        (Shape::Circle { radius }, shape @ Shape::Box { .. }) => {
            shape.distance(b.0, a.0.pos) < radius
        }
        (shape @ Shape::Box { .. }, Shape::Circle { radius }) => {
            shape.distance(a.0, b.0.pos) < radius
        }
        (Shape::Box { half: ha }, Shape::Box { half: hb }) => {
            boxes_overlap((a.0.pos, a.0.angle, ha), (b.0.pos, b.0.angle, hb))
        }
    }
}

/// Deterministic 2-D world implementing [`Simulation`]
#[derive(Debug, Clone)]
pub struct World {
    pub gravity: Vec2,
    pub dt: f32,
    bodies: BTreeMap<BodyHandle, Body>,
    /// Contact pairs (dynamic, static) from the last step
    contacts: Vec<(BodyHandle, BodyHandle)>,
    next_id: u32,
    time_ticks: u64,
}

impl World {
    pub fn new(settings: &WorldSettings) -> Self {
        Self {
            gravity: settings.gravity,
            dt: settings.dt,
            bodies: BTreeMap::new(),
            contacts: Vec::new(),
            next_id: 1,
            time_ticks: 0,
        }
    }

    /// Steps taken since creation
    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    pub fn get(&self, body: BodyHandle) -> Option<&Body> {
        self.bodies.get(&body)
    }

    pub fn contains(&self, body: BodyHandle) -> bool {
        self.bodies.contains_key(&body)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// All bodies in handle order
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> {
        self.bodies.iter().map(|(h, b)| (*h, b))
    }

    fn insert(&mut self, body: Body) -> BodyHandle {
        let handle = BodyHandle(self.next_id);
        self.next_id += 1;
        self.bodies.insert(handle, body);
        handle
    }

    fn body(&self, body: BodyHandle) -> &Body {
        self.bodies
            .get(&body)
            .unwrap_or_else(|| panic!("unknown body handle {:?}", body))
    }

    fn body_mut(&mut self, body: BodyHandle) -> &mut Body {
        self.bodies
            .get_mut(&body)
            .unwrap_or_else(|| panic!("unknown body handle {:?}", body))
    }
}

impl Simulation for World {
    fn step(&mut self) {
        self.time_ticks += 1;
        self.contacts.clear();

        let dt = self.dt;
        let gravity = self.gravity;

        // Static colliders are fixed for the whole step
        let solids: Vec<(BodyHandle, Pose, Shape, f32)> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.kind == BodyKind::Static && b.solid())
            .map(|(h, b)| (*h, b.pose, b.shape, b.restitution))
            .collect();

        let movers: Vec<BodyHandle> = self
            .bodies
            .iter()
            .filter(|(_, b)| b.kind == BodyKind::Dynamic && b.solid())
            .map(|(h, _)| *h)
            .collect();

        for id in movers {
            let Some(body) = self.bodies.get_mut(&id) else {
                continue;
            };
            let radius = body.shape.bounding_radius();
            body.vel += gravity * dt;

            let move_dist = body.vel.length() * dt;
            let step_size = radius * 0.3; // Small steps for accuracy
            let num_steps = ((move_dist / step_size).ceil() as usize).clamp(1, MAX_SUBSTEPS);
            let step_dt = dt / num_steps as f32;

            for _ in 0..num_steps {
                body.pose.pos += body.vel * step_dt;

                for (other, pose, shape, restitution) in &solids {
                    let hit = check_sdf_collision(body.pose.pos, radius, |p| shape.distance(pose, p));
                    if !hit.hit || hit.normal == Vec2::ZERO {
                        continue;
                    }
                    body.pose.pos += hit.normal * hit.penetration;
                    body.vel = bounce(body.vel, hit.normal, body.restitution.max(*restitution));
                    if !self.contacts.contains(&(id, *other)) {
                        self.contacts.push((id, *other));
                    }
                }
            }
        }
    }

    fn create_static_body(&mut self, pose: Pose, shape: Shape) -> BodyHandle {
        self.insert(Body {
            kind: BodyKind::Static,
            pose,
            vel: Vec2::ZERO,
            shape,
            restitution: 0.0,
            enabled: true,
            sensor: false,
        })
    }

    fn create_dynamic_body(&mut self, pose: Pose, velocity: Vec2, shape: Shape) -> BodyHandle {
        self.insert(Body {
            kind: BodyKind::Dynamic,
            pose,
            vel: velocity,
            shape,
            restitution: 0.0,
            enabled: true,
            sensor: false,
        })
    }

    fn transform(&self, body: BodyHandle) -> Pose {
        self.body(body).pose
    }

    fn set_transform(&mut self, body: BodyHandle, pose: Pose) {
        self.body_mut(body).pose = pose;
    }

    fn velocity(&self, body: BodyHandle) -> Vec2 {
        self.body(body).vel
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        self.body_mut(body).vel = velocity;
    }

    fn query_overlapping(&self, body: BodyHandle) -> Vec<BodyHandle> {
        let target = self.body(body);
        if !target.enabled {
            return Vec::new();
        }
        self.bodies
            .iter()
            .filter(|(h, b)| **h != body && b.enabled)
            .filter(|(_, b)| shapes_overlap((&target.pose, &target.shape), (&b.pose, &b.shape)))
            .map(|(h, _)| *h)
            .collect()
    }

    fn query_contacts(&self, body: BodyHandle) -> Vec<BodyHandle> {
        // Contract check only
        let _ = self.body(body);
        let mut touching: Vec<BodyHandle> = self
            .contacts
            .iter()
            .filter_map(|&(a, b)| {
                if a == body {
                    Some(b)
                } else if b == body {
                    Some(a)
                } else {
                    None
                }
            })
            .collect();
        touching.sort();
        touching.dedup();
        touching
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        if self.bodies.remove(&body).is_none() {
            panic!("destroy of unknown body handle {:?}", body);
        }
        self.contacts.retain(|&(a, b)| a != body && b != body);
    }

    fn set_enabled(&mut self, body: BodyHandle, enabled: bool) {
        self.body_mut(body).enabled = enabled;
    }

    fn set_sensor(&mut self, body: BodyHandle, sensor: bool) {
        self.body_mut(body).sensor = sensor;
    }

    fn set_restitution(&mut self, body: BodyHandle, restitution: f32) {
        self.body_mut(body).restitution = restitution;
    }
}
