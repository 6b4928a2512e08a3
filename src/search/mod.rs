//! Level generation by backtracking search
//!
//! - `snapshot`: capture and restore of ball and plank state
//! - `history`: bounded FIFO of snapshots for coarse undo
//! - `candidate`: seeded orientation order and plank poses
//! - `oracle`: sensor-first overlap test before arming a plank
//! - `engine`: the frame stack state machine

pub mod candidate;
pub mod engine;
pub mod history;
pub mod oracle;
pub mod snapshot;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use candidate::{Candidate, CandidateGenerator};
pub use engine::{
    Arrival, BacktrackReason, FailureReason, Phase, SearchEngine, SearchEvent, SearchStats,
    TickStatus,
};
pub use history::History;
pub use oracle::{Verdict, try_arm};
pub use snapshot::{RestoreOutcome, Snapshot, SnapshotError};

use crate::sim::{BodyHandle, Pose};

/// One committed plank of a level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub plank: BodyHandle,
    pub pose: Pose,
    /// Plank rotation (radians): the orientation offset it was placed with.
    /// `pose.angle` is the collider's angle along `ends`.
    pub rotation: f32,
    pub note_index: usize,
    /// Index into the orientation offsets
    pub offset: usize,
    /// World-space end points
    pub ends: [Vec2; 2],
    /// Note payload, passed through untouched
    pub payload: serde_json::Value,
    pub arrival: Arrival,
}

/// A finished level: one plank per note, in note order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub placements: Vec<Placement>,
    /// Planks placed after the step cap ran out rather than on time
    pub step_cap_arrivals: usize,
}

/// Terminal result of a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Done(Level),
    Failed {
        reason: FailureReason,
        /// Deepest path seen during the search
        partial: Vec<Placement>,
    },
}

impl Outcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn placements(&self) -> &[Placement] {
        match self {
            Outcome::Done(level) => &level.placements,
            Outcome::Failed { partial, .. } => partial,
        }
    }
}
