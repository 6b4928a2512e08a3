//! Scripted simulation for search tests
//!
//! The ball coasts in a straight line. Whether a newly created static body
//! overlaps the ball is decided by a rule over the number of armed planks
//! already in the world, which makes it easy to build searches that dead-end
//! at a chosen note. A second optional rule makes the ball touch the oldest
//! armed plank.
//!
//! Arming a body that overlaps the ball panics.

use std::collections::BTreeMap;

use glam::Vec2;

use super::world::{BodyHandle, Pose, Shape, Simulation};

struct FakeBody {
    pose: Pose,
    vel: Vec2,
    dynamic: bool,
    enabled: bool,
    sensor: bool,
    overlaps_ball: bool,
}

pub(crate) struct FakeSim {
    bodies: BTreeMap<BodyHandle, FakeBody>,
    next_id: u32,
    dt: f32,
    overlap_when: Box<dyn Fn(usize) -> bool>,
    touch_oldest_when: Option<Box<dyn Fn(usize) -> bool>>,
}

impl FakeSim {
    /// `overlap_when(armed)` is asked for every created static body, with the
    /// number of armed (enabled, non-sensor) static bodies at that moment
    pub(crate) fn new(overlap_when: impl Fn(usize) -> bool + 'static) -> Self {
        Self {
            bodies: BTreeMap::new(),
            next_id: 1,
            dt: crate::consts::SIM_DT,
            overlap_when: Box::new(overlap_when),
            touch_oldest_when: None,
        }
    }

    /// Report a contact between the ball and the oldest armed plank whenever
    /// `rule(armed)` holds
    pub(crate) fn touching_oldest_when(mut self, rule: impl Fn(usize) -> bool + 'static) -> Self {
        self.touch_oldest_when = Some(Box::new(rule));
        self
    }

    pub(crate) fn armed_count(&self) -> usize {
        self.bodies
            .values()
            .filter(|b| !b.dynamic && b.enabled && !b.sensor)
            .count()
    }

    pub(crate) fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn ball(&self) -> Option<BodyHandle> {
        self.bodies.iter().find(|(_, b)| b.dynamic).map(|(h, _)| *h)
    }

    fn get(&self, body: BodyHandle) -> &FakeBody {
        self.bodies
            .get(&body)
            .unwrap_or_else(|| panic!("unknown body handle {:?}", body))
    }

    fn get_mut(&mut self, body: BodyHandle) -> &mut FakeBody {
        self.bodies
            .get_mut(&body)
            .unwrap_or_else(|| panic!("unknown body handle {:?}", body))
    }

    fn insert(&mut self, body: FakeBody) -> BodyHandle {
        let handle = BodyHandle(self.next_id);
        self.next_id += 1;
        self.bodies.insert(handle, body);
        handle
    }
}

impl Simulation for FakeSim {
    fn step(&mut self) {
        let dt = self.dt;
        for body in self.bodies.values_mut().filter(|b| b.dynamic) {
            body.pose.pos += body.vel * dt;
        }
    }

    fn create_static_body(&mut self, pose: Pose, _shape: Shape) -> BodyHandle {
        let overlaps_ball = (self.overlap_when)(self.armed_count());
        self.insert(FakeBody {
            pose,
            vel: Vec2::ZERO,
            dynamic: false,
            enabled: true,
            sensor: false,
            overlaps_ball,
        })
    }

    fn create_dynamic_body(&mut self, pose: Pose, velocity: Vec2, _shape: Shape) -> BodyHandle {
        self.insert(FakeBody {
            pose,
            vel: velocity,
            dynamic: true,
            enabled: true,
            sensor: false,
            overlaps_ball: false,
        })
    }

    fn transform(&self, body: BodyHandle) -> Pose {
        self.get(body).pose
    }

    fn set_transform(&mut self, body: BodyHandle, pose: Pose) {
        self.get_mut(body).pose = pose;
    }

    fn velocity(&self, body: BodyHandle) -> Vec2 {
        self.get(body).vel
    }

    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        self.get_mut(body).vel = velocity;
    }

    fn query_overlapping(&self, body: BodyHandle) -> Vec<BodyHandle> {
        let target = self.get(body);
        if !target.enabled {
            return Vec::new();
        }
        if target.dynamic {
            return self
                .bodies
                .iter()
                .filter(|(_, b)| b.enabled && b.overlaps_ball)
                .map(|(h, _)| *h)
                .collect();
        }
        match self.ball() {
            Some(ball) if target.overlaps_ball => vec![ball],
            _ => Vec::new(),
        }
    }

    fn query_contacts(&self, body: BodyHandle) -> Vec<BodyHandle> {
        if !self.get(body).dynamic {
            return Vec::new();
        }
        let Some(rule) = &self.touch_oldest_when else {
            return Vec::new();
        };
        if !rule(self.armed_count()) {
            return Vec::new();
        }
        self.bodies
            .iter()
            .find(|(_, b)| !b.dynamic && b.enabled && !b.sensor)
            .map(|(h, _)| vec![*h])
            .unwrap_or_default()
    }

    fn destroy_body(&mut self, body: BodyHandle) {
        if self.bodies.remove(&body).is_none() {
            panic!("destroy of unknown body handle {:?}", body);
        }
    }

    fn set_enabled(&mut self, body: BodyHandle, enabled: bool) {
        self.get_mut(body).enabled = enabled;
    }

    fn set_sensor(&mut self, body: BodyHandle, sensor: bool) {
        let target = self.get_mut(body);
        assert!(
            sensor || !target.overlaps_ball,
            "armed body {:?} overlaps the ball",
            body
        );
        target.sensor = sensor;
    }

    fn set_restitution(&mut self, body: BodyHandle, _restitution: f32) {
        let _ = self.get(body);
    }
}
