//! Plankfall - plank placement for a bouncing ball, timed to music
//!
//! Core modules:
//! - `sim`: Simulation adapter trait plus a small deterministic 2-D world
//! - `search`: Snapshot codec, history, candidate generation and the backtracking engine
//! - `playback`: Fixed-level playback once generation is done
//! - `schedule`: Note targets the ball must meet
//! - `settings`: Data-driven tuning

pub mod error;
pub mod playback;
pub mod schedule;
pub mod search;
pub mod settings;
pub mod sim;

pub use error::{Error, Result};
pub use playback::{NoteHit, Playback};
pub use schedule::{NoteSchedule, NoteTarget};
pub use search::{Level, Outcome, Placement, SearchEngine, TickStatus};
pub use settings::Settings;

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz for smooth physics)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Gravity (pixels/s², y up)
    pub const GRAVITY: f32 = -980.0;

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 8.0;
    pub const BALL_RESTITUTION: f32 = 0.8;

    /// Plank defaults
    pub const PLANK_HALF_LENGTH: f32 = 30.0;
    pub const PLANK_HALF_WIDTH: f32 = 4.0;
    pub const PLANK_RESTITUTION: f32 = 0.9;
    /// Gap between ball surface and plank surface at placement
    pub const PLANK_CLEARANCE: f32 = 0.5;

    /// Search defaults
    pub const STEP_CAP: u32 = 200;
    pub const TICK_BUDGET: u32 = 20;
    pub const STAGNATION_THRESHOLD: u32 = 2000;
    pub const STAGNATION_MARGIN: f32 = 0.1;
    pub const STAGNATION_REWIND_FRAMES: usize = 3;
    pub const HISTORY_CAPACITY: usize = 1000;

    /// Orientation offsets (radians) tried around the ball's heading
    pub const ORIENTATION_OFFSETS: [f32; 11] =
        [0.0, 0.15, -0.15, 0.3, -0.3, 0.6, -0.6, 0.9, -0.9, 1.1, -1.1];
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Unit vector for an angle (radians, counter-clockwise from +x)
#[inline]
pub fn direction(theta: f32) -> Vec2 {
    Vec2::new(theta.cos(), theta.sin())
}

/// Rotate a vector by `theta` radians
#[inline]
pub fn rotate(v: Vec2, theta: f32) -> Vec2 {
    direction(theta).rotate(v)
}
