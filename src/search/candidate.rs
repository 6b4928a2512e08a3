//! Candidate generation
//!
//! Planks are tried at a fixed set of orientation offsets around the ball's
//! heading. The order is a seeded shuffle so runs are reproducible.

use std::collections::BTreeSet;
use std::f32::consts::FRAC_PI_2;

use glam::Vec2;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;

use crate::normalize_angle;
use crate::settings::PlankSettings;
use crate::sim::Pose;

/// Heading used when the ball is at rest
const REST_HEADING: Vec2 = Vec2::NEG_Y;

/// A plank pose derived from one orientation offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// Index into the offset set
    pub offset: usize,
    /// Collider pose; its angle runs along the end-offset axis
    pub pose: Pose,
    /// Plank rotation, equal to the offset angle
    pub rotation: f32,
    /// End points relative to the center
    pub ends: [Vec2; 2],
}

#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    offsets: Vec<f32>,
}

impl CandidateGenerator {
    pub fn new(offsets: Vec<f32>) -> Self {
        Self { offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset angle (radians) for an index
    pub fn angle(&self, offset: usize) -> f32 {
        self.offsets[offset]
    }

    /// Random order of the offset indices that are not excluded
    pub fn permutation(&self, rng: &mut Pcg32, excluded: &BTreeSet<usize>) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.offsets.len())
            .filter(|i| !excluded.contains(i))
            .collect();
        order.shuffle(rng);
        order
    }

    /// Plank pose for `offset` given the ball's position and velocity
    ///
    /// The plank sits just clear of the ball along the heading rotated by the
    /// offset, with its long axis perpendicular to that direction.
    pub fn candidate(
        &self,
        offset: usize,
        ball_pos: Vec2,
        ball_vel: Vec2,
        ball_radius: f32,
        plank: &PlankSettings,
    ) -> Candidate {
        let heading = ball_vel.try_normalize().unwrap_or(REST_HEADING);
        let dir = crate::rotate(heading, self.angle(offset));
        let center = ball_pos + dir * (ball_radius + plank.half_width + plank.clearance);

        let ends = [
            crate::rotate(dir, -FRAC_PI_2) * plank.half_length,
            crate::rotate(dir, FRAC_PI_2) * plank.half_length,
        ];
        let angle = normalize_angle(ends[1].to_angle());

        Candidate {
            offset,
            pose: Pose::new(center, angle),
            rotation: self.angle(offset),
            ends,
        }
    }
}
