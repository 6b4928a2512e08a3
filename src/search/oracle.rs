//! Validity oracle
//!
//! A candidate plank is first created as an inert sensor so it can be tested
//! against the ball without pushing it. If it overlaps the ball it is
//! discarded; otherwise it is armed and becomes a real collider.

use crate::settings::PlankSettings;
use crate::sim::{Ball, BodyHandle, Shape, Simulation};
use glam::Vec2;

use super::candidate::Candidate;

/// Outcome of testing one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Armed and live in the simulation
    Armed(BodyHandle),
    /// Overlapped the ball; the body is gone
    Overlapping,
}

/// Create, test and arm (or discard) a candidate plank
pub fn try_arm<S: Simulation>(
    sim: &mut S,
    ball: &Ball,
    candidate: &Candidate,
    plank: &PlankSettings,
) -> Verdict {
    let shape = Shape::Box {
        half: Vec2::new(plank.half_length, plank.half_width),
    };
    let body = sim.create_static_body(candidate.pose, shape);
    sim.set_sensor(body, true);

    if sim.query_overlapping(body).contains(&ball.handle) {
        log::trace!("Candidate offset {} overlaps the ball", candidate.offset);
        sim.set_enabled(body, false);
        sim.destroy_body(body);
        return Verdict::Overlapping;
    }

    sim.set_sensor(body, false);
    sim.set_restitution(body, plank.restitution);
    sim.set_enabled(body, true);
    Verdict::Armed(body)
}
