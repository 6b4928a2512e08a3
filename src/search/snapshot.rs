//! Snapshot codec
//!
//! A [`Snapshot`] is an owned copy of the ball's kinematic state and the set
//! of live planks at one instant of simulated time. Restoring it puts the
//! ball back and destroys every plank created since; planks that survive are
//! left untouched so their identities stay stable.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::{Ball, BallState, BodyHandle, Plank, Pose, Simulation};

/// Immutable capture of ball and plank state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ball: BallState,
    /// Live planks at capture time, in creation order
    pub planks: Vec<(BodyHandle, Pose)>,
    /// Simulated time (fixed steps since the start)
    pub time_ticks: u64,
    /// Capture order
    pub ordinal: u64,
}

/// Why a snapshot cannot be restored
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    #[error("ball state is not finite")]
    NonFiniteBall,

    #[error("plank {0:?} has a non-finite pose")]
    NonFinitePose(BodyHandle),

    #[error("plank {0:?} listed more than once")]
    DuplicatePlank(BodyHandle),

    #[error("plank {0:?} is no longer live")]
    MissingPlank(BodyHandle),
}

impl Snapshot {
    /// Number of planks captured
    pub fn plank_count(&self) -> usize {
        self.planks.len()
    }

    pub fn contains(&self, id: BodyHandle) -> bool {
        self.planks.iter().any(|(h, _)| *h == id)
    }

    /// Check the snapshot's own fields
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !self.ball.is_finite() {
            return Err(SnapshotError::NonFiniteBall);
        }
        let mut seen = BTreeSet::new();
        for (id, pose) in &self.planks {
            if !pose.is_finite() {
                return Err(SnapshotError::NonFinitePose(*id));
            }
            if !seen.insert(*id) {
                return Err(SnapshotError::DuplicatePlank(*id));
            }
        }
        Ok(())
    }
}

/// Result of a restore
#[derive(Debug, Clone)]
pub enum RestoreOutcome {
    /// Ball reset, planks reconciled
    Applied {
        time_ticks: u64,
        /// Planks destroyed by the restore, in creation order
        removed: Vec<Plank>,
    },
    /// The snapshot was unusable and nothing was touched
    NoOp,
}

impl RestoreOutcome {
    /// Restored time; 0 for a no-op
    pub fn time_ticks(&self) -> u64 {
        match self {
            RestoreOutcome::Applied { time_ticks, .. } => *time_ticks,
            RestoreOutcome::NoOp => 0,
        }
    }

    pub fn removed(&self) -> &[Plank] {
        match self {
            RestoreOutcome::Applied { removed, .. } => removed,
            RestoreOutcome::NoOp => &[],
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, RestoreOutcome::NoOp)
    }
}

/// Capture the ball and live planks
pub fn capture<S: Simulation>(
    sim: &S,
    ball: &Ball,
    planks: &[Plank],
    time_ticks: u64,
    ordinal: u64,
) -> Snapshot {
    Snapshot {
        ball: ball.state(sim),
        planks: planks
            .iter()
            .filter(|p| p.alive)
            .map(|p| (p.id, p.pose))
            .collect(),
        time_ticks,
        ordinal,
    }
}

/// Restore the ball and reconcile `planks` with the snapshot
///
/// Planks absent from the snapshot are disabled and destroyed. A malformed
/// snapshot, or one naming planks that no longer exist, leaves everything
/// as it was and yields [`RestoreOutcome::NoOp`].
pub fn restore<S: Simulation>(
    sim: &mut S,
    ball: &Ball,
    planks: &mut Vec<Plank>,
    snapshot: &Snapshot,
) -> RestoreOutcome {
    if let Err(err) = check(planks, snapshot) {
        log::warn!("Ignoring snapshot #{}: {}", snapshot.ordinal, err);
        return RestoreOutcome::NoOp;
    }

    ball.set_state(sim, &snapshot.ball);

    let (kept, mut removed): (Vec<Plank>, Vec<Plank>) = planks
        .drain(..)
        .partition(|p| snapshot.contains(p.id));
    debug_assert!(
        removed
            .iter()
            .all(|r| kept.iter().all(|k| k.ordinal < r.ordinal)),
        "restore must only remove trailing planks"
    );
    for plank in &mut removed {
        plank.destroy(sim);
    }
    *planks = kept;

    RestoreOutcome::Applied {
        time_ticks: snapshot.time_ticks,
        removed,
    }
}

fn check(planks: &[Plank], snapshot: &Snapshot) -> Result<(), SnapshotError> {
    snapshot.validate()?;
    for (id, _) in &snapshot.planks {
        if !planks.iter().any(|p| p.id == *id && p.alive) {
            return Err(SnapshotError::MissingPlank(*id));
        }
    }
    Ok(())
}
