//! Simulation module
//!
//! The generator's view of physics:
//! - `world`: the adapter trait every engine implements
//! - `physics`: a small built-in deterministic engine
//! - `sdf`: signed distance helpers used for contacts and overlaps
//! - `state`: ball and plank types

pub mod physics;
pub mod sdf;
pub mod state;
pub mod world;

#[cfg(test)]
pub(crate) mod fake;

pub use physics::{Body, BodyKind, World, shapes_overlap};
pub use sdf::{bounce, check_sdf_collision, reflect, sd_box, sd_circle};
pub use state::{Ball, BallState, Plank};
pub use world::{BodyHandle, Pose, Shape, Simulation};
