//! Ball and plank types
//!
//! The ball lives in the simulation; the generator only keeps its handle and
//! fixed properties. Planks are owned by whoever created them (search engine
//! or playback) and mirror a static body in the simulation.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::world::{BodyHandle, Pose, Shape, Simulation};
use crate::settings::{BallSettings, PlankSettings};

/// Kinematic state of the ball
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallState {
    pub pos: Vec2,
    pub vel: Vec2,
}

impl BallState {
    pub fn is_finite(&self) -> bool {
        self.pos.is_finite() && self.vel.is_finite()
    }
}

/// The single bouncing ball
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ball {
    pub handle: BodyHandle,
    pub radius: f32,
    pub restitution: f32,
}

impl Ball {
    /// Create the ball body at its configured start state
    pub fn spawn<S: Simulation>(sim: &mut S, settings: &BallSettings) -> Self {
        let handle = sim.create_dynamic_body(
            Pose::at(settings.start),
            settings.velocity,
            Shape::Circle {
                radius: settings.radius,
            },
        );
        sim.set_restitution(handle, settings.restitution);
        Self {
            handle,
            radius: settings.radius,
            restitution: settings.restitution,
        }
    }

    /// Read the ball's current position and velocity
    pub fn state<S: Simulation>(&self, sim: &S) -> BallState {
        BallState {
            pos: sim.transform(self.handle).pos,
            vel: sim.velocity(self.handle),
        }
    }

    /// Put the ball back to a captured state
    pub fn set_state<S: Simulation>(&self, sim: &mut S, state: &BallState) {
        let angle = sim.transform(self.handle).angle;
        sim.set_transform(self.handle, Pose::new(state.pos, angle));
        sim.set_velocity(self.handle, state.vel);
    }
}

/// A static plank placed for one note
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plank {
    pub id: BodyHandle,
    pub pose: Pose,
    pub half_length: f32,
    pub half_width: f32,
    pub restitution: f32,
    /// False once the body has been destroyed
    pub alive: bool,
    /// Creation order, strictly increasing
    pub ordinal: u32,
    /// Index of the note this plank serves
    pub note_index: usize,
    /// Index into the orientation offset set that produced this plank
    pub offset: usize,
}

impl Plank {
    pub fn shape(&self) -> Shape {
        Shape::Box {
            half: Vec2::new(self.half_length, self.half_width),
        }
    }

    /// World-space end points of the plank's long axis
    pub fn ends(&self) -> [Vec2; 2] {
        let axis = crate::direction(self.pose.angle) * self.half_length;
        [self.pose.pos - axis, self.pose.pos + axis]
    }

    pub fn from_settings(
        id: BodyHandle,
        pose: Pose,
        settings: &PlankSettings,
        ordinal: u32,
        note_index: usize,
        offset: usize,
    ) -> Self {
        Self {
            id,
            pose,
            half_length: settings.half_length,
            half_width: settings.half_width,
            restitution: settings.restitution,
            alive: true,
            ordinal,
            note_index,
            offset,
        }
    }

    /// Disable and destroy the plank's body
    pub fn destroy<S: Simulation>(&mut self, sim: &mut S) {
        if self.alive {
            sim.set_enabled(self.id, false);
            sim.destroy_body(self.id);
            self.alive = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::WorldSettings;
    use crate::sim::World;

    #[test]
    fn test_ball_state_round_trip() {
        let mut world = World::new(&WorldSettings::default());
        let ball = Ball::spawn(&mut world, &BallSettings::default());
        let target = BallState {
            pos: Vec2::new(12.0, -3.0),
            vel: Vec2::new(-40.0, 90.0),
        };
        ball.set_state(&mut world, &target);
        assert_eq!(ball.state(&world), target);
    }

    #[test]
    fn test_plank_ends() {
        let plank = Plank::from_settings(
            BodyHandle(1),
            Pose::new(Vec2::new(10.0, 0.0), std::f32::consts::FRAC_PI_2),
            &PlankSettings::default(),
            0,
            0,
            0,
        );
        let [a, b] = plank.ends();
        assert!((a - Vec2::new(10.0, -plank.half_length)).length() < 1e-4);
        assert!((b - Vec2::new(10.0, plank.half_length)).length() < 1e-4);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut world = World::new(&WorldSettings::default());
        let settings = PlankSettings::default();
        let id = world.create_static_body(Pose::at(Vec2::ZERO), Shape::Box { half: Vec2::ONE });
        let mut plank = Plank::from_settings(id, Pose::at(Vec2::ZERO), &settings, 0, 0, 0);
        plank.destroy(&mut world);
        plank.destroy(&mut world);
        assert!(!plank.alive);
        assert!(!world.contains(id));
    }
}
