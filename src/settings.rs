//! Generator settings
//!
//! Every tunable of the world, the plank geometry and the search lives here.
//! Settings load from JSON; missing fields fall back to the defaults below.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{Error, Result};

/// What the forward simulation does when the step cap runs out before the
/// note time is reached, without a collision and without leaving bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StepCapPolicy {
    /// Stop waiting and place the plank wherever the ball is
    #[default]
    PlaceAnyway,
    /// Treat the missed note as a dead end
    Backtrack,
}

impl StepCapPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepCapPolicy::PlaceAnyway => "place-anyway",
            StepCapPolicy::Backtrack => "backtrack",
        }
    }
}

/// How far a stagnation escape rewinds the search stack
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RewindDepth {
    /// Pop a fixed number of frames
    Frames(usize),
    /// Pop a fraction (0-1] of the current stack
    Fraction(f32),
}

impl Default for RewindDepth {
    fn default() -> Self {
        RewindDepth::Frames(STAGNATION_REWIND_FRAMES)
    }
}

impl RewindDepth {
    /// Number of frames to pop for a stack of `depth` frames (at least one)
    pub fn frames_for(&self, depth: usize) -> usize {
        let frames = match *self {
            RewindDepth::Frames(n) => n,
            RewindDepth::Fraction(f) => (depth as f32 * f).ceil() as usize,
        };
        frames.max(1)
    }
}

/// Axis-aligned region the ball must stay inside while searching
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: Vec2::new(-2000.0, -20000.0),
            max: Vec2::new(2000.0, 2000.0),
        }
    }
}

impl Bounds {
    pub fn contains(&self, p: Vec2) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Gravity acceleration (pixels/s²)
    pub gravity: Vec2,
    /// Fixed timestep (seconds)
    pub dt: f32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, GRAVITY),
            dt: SIM_DT,
        }
    }
}

impl WorldSettings {
    /// Milliseconds of simulated time per step
    pub fn step_ms(&self) -> f64 {
        self.dt as f64 * 1000.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BallSettings {
    pub start: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub restitution: f32,
}

impl Default for BallSettings {
    fn default() -> Self {
        Self {
            start: Vec2::ZERO,
            velocity: Vec2::ZERO,
            radius: BALL_RADIUS,
            restitution: BALL_RESTITUTION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlankSettings {
    pub half_length: f32,
    pub half_width: f32,
    pub restitution: f32,
    /// Extra gap (ε) between ball and plank surfaces at placement
    pub clearance: f32,
}

impl Default for PlankSettings {
    fn default() -> Self {
        Self {
            half_length: PLANK_HALF_LENGTH,
            half_width: PLANK_HALF_WIDTH,
            restitution: PLANK_RESTITUTION,
            clearance: PLANK_CLEARANCE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Orientation offsets (radians) around the ball's heading
    pub offsets: Vec<f32>,
    /// Maximum simulation steps while advancing toward one note
    pub step_cap: u32,
    pub step_cap_policy: StepCapPolicy,
    /// Search iterations per `tick()` call
    pub tick_budget: u32,
    /// Seed for the orientation shuffle
    pub seed: u64,
    pub bounds: Bounds,
    /// Record a `SearchEvent` trace (tests and analytics)
    pub trace: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            offsets: ORIENTATION_OFFSETS.to_vec(),
            step_cap: STEP_CAP,
            step_cap_policy: StepCapPolicy::default(),
            tick_budget: TICK_BUDGET,
            seed: 0,
            bounds: Bounds::default(),
            trace: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagnationSettings {
    /// Iterations without a new high-water mark before the escape policy runs
    pub threshold: u32,
    /// Fraction of the note count that still counts as "near" the high-water mark
    pub margin: f32,
    pub rewind: RewindDepth,
}

impl Default for StagnationSettings {
    fn default() -> Self {
        Self {
            threshold: STAGNATION_THRESHOLD,
            margin: STAGNATION_MARGIN,
            rewind: RewindDepth::default(),
        }
    }
}

impl StagnationSettings {
    /// Margin in planks for a schedule of `note_count` notes
    pub fn margin_for(&self, note_count: usize) -> usize {
        (note_count as f32 * self.margin).ceil() as usize
    }
}

/// Complete generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub world: WorldSettings,
    pub ball: BallSettings,
    pub plank: PlankSettings,
    pub search: SearchSettings,
    pub stagnation: StagnationSettings,
    /// Capacity of the playback rewind history
    pub history_capacity: usize,
}

impl Settings {
    /// Parse settings from JSON (missing fields use defaults)
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the search cannot work with
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| -> Result<()> { Err(Error::InvalidSettings(msg.to_string())) };

        if !(self.world.dt > 0.0) || !self.world.gravity.is_finite() {
            return bad("world.dt must be positive and gravity finite");
        }
        if !(self.ball.radius > 0.0) || !self.ball.start.is_finite() || !self.ball.velocity.is_finite() {
            return bad("ball radius must be positive and start state finite");
        }
        if !(self.plank.half_length > 0.0) || !(self.plank.half_width > 0.0) {
            return bad("plank half extents must be positive");
        }
        if self.search.offsets.is_empty() {
            return bad("search.offsets must not be empty");
        }
        if self.search.offsets.iter().any(|o| !o.is_finite()) {
            return bad("search.offsets must be finite");
        }
        if self.search.tick_budget == 0 || self.search.step_cap == 0 {
            return bad("search.tick_budget and search.step_cap must be non-zero");
        }
        if !self.search.bounds.contains(self.ball.start) {
            return bad("ball.start must lie inside search.bounds");
        }
        if self.stagnation.threshold == 0 {
            return bad("stagnation.threshold must be non-zero");
        }
        if let RewindDepth::Fraction(f) = self.stagnation.rewind {
            if !(f > 0.0 && f <= 1.0) {
                return bad("stagnation.rewind fraction must be in (0, 1]");
            }
        }
        if self.history_capacity == 0 {
            return bad("history_capacity must be non-zero");
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            world: WorldSettings::default(),
            ball: BallSettings::default(),
            plank: PlankSettings::default(),
            search: SearchSettings::default(),
            stagnation: StagnationSettings::default(),
            history_capacity: HISTORY_CAPACITY,
        }
    }
}
