//! Backtracking search engine
//!
//! The engine keeps one frame per note on an explicit stack. The top frame
//! first simulates forward until its note is due, then tries candidate
//! planks in a shuffled order until one can be armed. A committed plank
//! pushes a frame for the next note; a dead end pops the frame and rolls the
//! world back to the snapshot held by the frame below.
//!
//! Work is cooperative: [`SearchEngine::tick`] runs at most a fixed number
//! of iterations and returns, so a host loop can interleave it with other
//! work and stop it between ticks.

use std::collections::BTreeSet;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::candidate::{Candidate, CandidateGenerator};
use super::oracle::{self, Verdict};
use super::snapshot::{self, RestoreOutcome, Snapshot};
use super::{Level, Outcome, Placement};
use crate::error::Result;
use crate::playback::Playback;
use crate::schedule::NoteSchedule;
use crate::settings::{Settings, StepCapPolicy};
use crate::sim::{Ball, BodyHandle, Plank, Simulation};

/// Search state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Stepping the world toward the top frame's note
    Simulate,
    /// Trying candidate planks for the top frame's note
    TryPlacement,
    Done,
    Failed,
}

/// Result of one `tick()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Running,
    Done,
    Failed,
}

/// How a frame's forward simulation reached its note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Arrival {
    /// Simulated time reached the note's scheduled time
    #[default]
    OnTime,
    /// The step cap ran out first and the policy placed the plank anyway
    StepCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BacktrackReason {
    /// The ball touched a plank other than the one it is bouncing off
    Collision,
    /// The ball left the configured bounds
    OutOfBounds,
    /// The step cap ran out under `StepCapPolicy::Backtrack`
    StepCap,
    /// Every orientation for the frame was rejected
    Exhausted,
}

/// Why generation stopped without a full level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The root frame was abandoned
    Exhausted {
        /// Why the root frame was abandoned
        last: BacktrackReason,
        /// Offsets excluded at the root when it was abandoned
        root_excluded: usize,
    },
    /// A rollback snapshot could not be restored
    CorruptSnapshot { note_index: usize },
}

/// Trace of search decisions, recorded when `search.trace` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SearchEvent {
    Arrived {
        note: usize,
        steps: u32,
        arrival: Arrival,
    },
    Rejected {
        note: usize,
        offset: usize,
    },
    Placed {
        note: usize,
        plank: BodyHandle,
        offset: usize,
    },
    Backtracked {
        /// Note of the discarded frame
        note: usize,
        reason: BacktrackReason,
        removed: Vec<BodyHandle>,
        /// Live planks after the rollback
        live: usize,
    },
    DeepRewind {
        iteration: u64,
        frames: usize,
        removed: Vec<BodyHandle>,
        live: usize,
    },
}

/// Counters over the whole search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStats {
    pub iterations: u64,
    pub backtracks: u64,
    pub rejections: u64,
    pub deep_rewinds: u64,
    pub step_cap_arrivals: u64,
    /// Most planks ever live at once
    pub high_water: usize,
    /// Iteration at which the current stagnation baseline was last raised
    pub baseline_iteration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    NeedsSimulation,
    At(usize),
}

/// One level of the search stack
#[derive(Debug, Clone)]
struct SearchFrame {
    note_index: usize,
    permutation: Vec<usize>,
    cursor: Cursor,
    /// Taken before any plank of this frame existed
    snapshot: Snapshot,
    steps: u32,
    excluded: BTreeSet<usize>,
    /// Offset of the plank this frame committed, if any
    committed: Option<usize>,
    arrival: Arrival,
}

impl SearchFrame {
    fn new(note_index: usize, snapshot: Snapshot) -> Self {
        Self {
            note_index,
            permutation: Vec::new(),
            cursor: Cursor::NeedsSimulation,
            snapshot,
            steps: 0,
            excluded: BTreeSet::new(),
            committed: None,
            arrival: Arrival::OnTime,
        }
    }

    /// Back to "needs simulation" after the world was rolled back to this frame
    fn rewind(&mut self) {
        if let Some(offset) = self.committed.take() {
            self.excluded.insert(offset);
        }
        self.permutation.clear();
        self.cursor = Cursor::NeedsSimulation;
        self.steps = 0;
        self.arrival = Arrival::OnTime;
    }
}

/// Stack-based plank placement search over a [`Simulation`]
pub struct SearchEngine<S: Simulation> {
    sim: S,
    settings: Settings,
    schedule: NoteSchedule,
    generator: CandidateGenerator,
    rng: Pcg32,
    ball: Ball,
    planks: Vec<Plank>,
    stack: Vec<SearchFrame>,
    phase: Phase,
    /// Simulated time in fixed steps
    time_ticks: u64,
    next_plank_ordinal: u32,
    next_snapshot_ordinal: u64,
    /// World state before the first step
    start: Snapshot,
    /// Stagnation baseline (planks) and iterations since it last rose
    baseline: usize,
    since_baseline: u32,
    best_partial: Vec<Placement>,
    failure: Option<FailureReason>,
    removed: Vec<BodyHandle>,
    events: Vec<SearchEvent>,
    stats: SearchStats,
}

impl<S: Simulation> SearchEngine<S> {
    /// Spawn the ball in `sim` and set up the root frame
    pub fn new(mut sim: S, schedule: NoteSchedule, settings: Settings) -> Result<Self> {
        settings.validate()?;

        let ball = Ball::spawn(&mut sim, &settings.ball);
        let generator = CandidateGenerator::new(settings.search.offsets.clone());
        let rng = Pcg32::seed_from_u64(settings.search.seed);
        let start = snapshot::capture(&sim, &ball, &[], 0, 0);

        let mut engine = Self {
            sim,
            settings,
            schedule,
            generator,
            rng,
            ball,
            planks: Vec::new(),
            stack: Vec::new(),
            phase: Phase::Simulate,
            time_ticks: 0,
            next_plank_ordinal: 0,
            next_snapshot_ordinal: 1,
            start: start.clone(),
            baseline: 0,
            since_baseline: 0,
            best_partial: Vec::new(),
            failure: None,
            removed: Vec::new(),
            events: Vec::new(),
            stats: SearchStats::default(),
        };

        if engine.schedule.is_empty() {
            log::info!("Empty note schedule, nothing to place");
            engine.phase = Phase::Done;
        } else {
            engine.stack.push(SearchFrame::new(0, start));
            log::info!(
                "Searching plank layout for {} notes (seed {})",
                engine.schedule.len(),
                engine.settings.search.seed
            );
        }
        Ok(engine)
    }

    /// Run up to the configured tick budget of iterations
    pub fn tick(&mut self) -> TickStatus {
        self.tick_with_budget(self.settings.search.tick_budget)
    }

    /// Run up to `budget` iterations
    pub fn tick_with_budget(&mut self, budget: u32) -> TickStatus {
        for _ in 0..budget {
            if self.is_finished() {
                break;
            }
            self.iterate();
        }
        self.status()
    }

    /// Tick until the search finishes
    pub fn run(&mut self) -> Outcome {
        loop {
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            self.tick();
        }
    }

    pub fn status(&self) -> TickStatus {
        match self.phase {
            Phase::Done => TickStatus::Done,
            Phase::Failed => TickStatus::Failed,
            Phase::Simulate | Phase::TryPlacement => TickStatus::Running,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done | Phase::Failed)
    }

    /// Terminal result, once there is one
    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            Phase::Done => {
                let placements = self.placements();
                let step_cap_arrivals = placements
                    .iter()
                    .filter(|p| p.arrival == Arrival::StepCap)
                    .count();
                Some(Outcome::Done(Level {
                    placements,
                    step_cap_arrivals,
                }))
            }
            Phase::Failed => Some(Outcome::Failed {
                reason: self.failure.clone().unwrap_or(FailureReason::Exhausted {
                    last: BacktrackReason::Exhausted,
                    root_excluded: 0,
                }),
                partial: self.best_partial.clone(),
            }),
            Phase::Simulate | Phase::TryPlacement => None,
        }
    }

    /// Committed planks along the current path, in note order
    pub fn placements(&self) -> Vec<Placement> {
        self.planks
            .iter()
            .map(|plank| {
                let arrival = self
                    .stack
                    .get(plank.note_index)
                    .map(|f| f.arrival)
                    .unwrap_or_default();
                let payload = self
                    .schedule
                    .get(plank.note_index)
                    .map(|n| n.payload.clone())
                    .unwrap_or_default();
                Placement {
                    plank: plank.id,
                    pose: plank.pose,
                    rotation: self.generator.angle(plank.offset),
                    note_index: plank.note_index,
                    offset: plank.offset,
                    ends: plank.ends(),
                    payload,
                    arrival,
                }
            })
            .collect()
    }

    /// Plank bodies destroyed by rollbacks since the last call
    pub fn drain_removed(&mut self) -> Vec<BodyHandle> {
        std::mem::take(&mut self.removed)
    }

    /// Recorded trace since the last call (empty unless `search.trace` is set)
    pub fn drain_events(&mut self) -> Vec<SearchEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn planks(&self) -> &[Plank] {
        &self.planks
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn simulation(&self) -> &S {
        &self.sim
    }

    pub fn schedule(&self) -> &NoteSchedule {
        &self.schedule
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Frames on the search stack
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Note the top frame is working on
    pub fn current_note(&self) -> Option<usize> {
        self.stack.last().map(|f| f.note_index)
    }

    /// Simulated time in milliseconds
    pub fn time_ms(&self) -> f64 {
        self.time_ticks as f64 * self.settings.world.step_ms()
    }

    /// Hand the finished level to regular playback
    ///
    /// The ball goes back to its start state and the clock to zero; the
    /// committed planks stay as the fixed level. Returns the engine unchanged
    /// if the search has not finished successfully.
    #[allow(clippy::result_large_err)]
    pub fn into_playback(mut self) -> std::result::Result<Playback<S>, Self> {
        if self.phase != Phase::Done {
            return Err(self);
        }
        let placements = self.placements();
        self.ball.set_state(&mut self.sim, &self.start.ball);
        log::info!("Handing {} planks to playback", placements.len());
        Ok(Playback::new(
            self.sim,
            self.ball,
            self.planks,
            placements,
            self.schedule,
            &self.settings,
        ))
    }

    /// Stop the search and clean up
    ///
    /// Every plank the engine created is disabled and destroyed, and the
    /// ball is put back to its start state.
    pub fn cancel(mut self) -> S {
        for plank in &mut self.planks {
            plank.destroy(&mut self.sim);
        }
        self.ball.set_state(&mut self.sim, &self.start.ball);
        log::info!(
            "Search cancelled after {} iterations, removed {} planks",
            self.stats.iterations,
            self.planks.len()
        );
        self.sim
    }

    fn iterate(&mut self) {
        self.stats.iterations += 1;
        match self.phase {
            Phase::Simulate => self.simulate_forward(),
            Phase::TryPlacement => self.try_placement(),
            Phase::Done | Phase::Failed => return,
        }
        self.track_progress();
    }

    fn simulate_forward(&mut self) {
        let Some(note_index) = self.current_note() else {
            return;
        };
        let note_time = self.schedule.get(note_index).map(|n| n.time).unwrap_or(0.0);
        // The ball is meant to bounce off the newest plank
        let bouncing_off = self.planks.last().map(|p| p.id);
        let step_cap = self.settings.search.step_cap;

        loop {
            if self.time_ms() >= note_time {
                self.arrive(Arrival::OnTime);
                return;
            }

            let steps = self.stack.last().map(|f| f.steps).unwrap_or(0);
            if steps >= step_cap {
                match self.settings.search.step_cap_policy {
                    StepCapPolicy::PlaceAnyway => self.arrive(Arrival::StepCap),
                    StepCapPolicy::Backtrack => self.backtrack(BacktrackReason::StepCap),
                }
                return;
            }

            self.sim.step();
            self.time_ticks += 1;
            if let Some(frame) = self.stack.last_mut() {
                frame.steps += 1;
            }

            let hit_other = self
                .sim
                .query_contacts(self.ball.handle)
                .into_iter()
                .any(|h| Some(h) != bouncing_off && self.planks.iter().any(|p| p.id == h));
            if hit_other {
                self.backtrack(BacktrackReason::Collision);
                return;
            }

            let pos = self.sim.transform(self.ball.handle).pos;
            if !self.settings.search.bounds.contains(pos) {
                self.backtrack(BacktrackReason::OutOfBounds);
                return;
            }
        }
    }

    fn arrive(&mut self, arrival: Arrival) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        frame.permutation = self.generator.permutation(&mut self.rng, &frame.excluded);
        frame.cursor = Cursor::At(0);
        frame.arrival = arrival;
        let (note, steps) = (frame.note_index, frame.steps);

        if arrival == Arrival::StepCap {
            self.stats.step_cap_arrivals += 1;
            log::debug!(
                "Note {} not reached within {} steps, placing anyway ({})",
                note,
                steps,
                StepCapPolicy::PlaceAnyway.as_str()
            );
        }
        self.record(SearchEvent::Arrived {
            note,
            steps,
            arrival,
        });
        self.phase = Phase::TryPlacement;
    }

    fn try_placement(&mut self) {
        let Some(frame) = self.stack.last_mut() else {
            return;
        };
        let Cursor::At(cursor) = frame.cursor else {
            self.phase = Phase::Simulate;
            return;
        };
        let next = frame.permutation[cursor.min(frame.permutation.len())..]
            .iter()
            .position(|o| !frame.excluded.contains(o))
            .map(|i| cursor + i);
        let Some(slot) = next else {
            self.backtrack(BacktrackReason::Exhausted);
            return;
        };
        frame.cursor = Cursor::At(slot + 1);
        let note = frame.note_index;
        let offset = frame.permutation[slot];

        let state = self.ball.state(&self.sim);
        let candidate = self.generator.candidate(
            offset,
            state.pos,
            state.vel,
            self.ball.radius,
            &self.settings.plank,
        );

        match oracle::try_arm(&mut self.sim, &self.ball, &candidate, &self.settings.plank) {
            Verdict::Armed(body) => self.commit(note, body, &candidate),
            Verdict::Overlapping => {
                if let Some(frame) = self.stack.last_mut() {
                    frame.excluded.insert(offset);
                }
                self.stats.rejections += 1;
                self.record(SearchEvent::Rejected { note, offset });
            }
        }
    }

    fn commit(&mut self, note: usize, body: BodyHandle, candidate: &Candidate) {
        let plank = Plank::from_settings(
            body,
            candidate.pose,
            &self.settings.plank,
            self.next_plank_ordinal,
            note,
            candidate.offset,
        );
        self.next_plank_ordinal += 1;
        self.planks.push(plank);
        if let Some(frame) = self.stack.last_mut() {
            frame.committed = Some(candidate.offset);
        }
        self.record(SearchEvent::Placed {
            note,
            plank: body,
            offset: candidate.offset,
        });
        self.advance(note);
    }

    fn advance(&mut self, note: usize) {
        let next = note + 1;
        if next >= self.schedule.len() {
            self.phase = Phase::Done;
            log::info!(
                "Placed {} planks in {} iterations ({} backtracks, {} step-cap arrivals)",
                self.planks.len(),
                self.stats.iterations,
                self.stats.backtracks,
                self.stats.step_cap_arrivals
            );
            return;
        }

        let ordinal = self.next_snapshot_ordinal;
        self.next_snapshot_ordinal += 1;
        let snapshot = snapshot::capture(&self.sim, &self.ball, &self.planks, self.time_ticks, ordinal);
        self.stack.push(SearchFrame::new(next, snapshot));
        debug_assert!(self.stack.len() <= self.schedule.len());
        self.phase = Phase::Simulate;
    }

    fn backtrack(&mut self, reason: BacktrackReason) {
        let Some(discarded) = self.stack.pop() else {
            return;
        };
        self.stats.backtracks += 1;
        log::debug!("Backtracking from note {}: {:?}", discarded.note_index, reason);

        if self.stack.is_empty() {
            // Leave the world as it was before the search
            self.roll_back(&discarded.snapshot);
            self.fail(FailureReason::Exhausted {
                last: reason,
                root_excluded: discarded.excluded.len(),
            });
            return;
        }

        let Some(removed) = self.roll_back_to_top() else {
            return;
        };
        let live = self.planks.len();
        self.record(SearchEvent::Backtracked {
            note: discarded.note_index,
            reason,
            removed,
            live,
        });
    }

    /// Pop several frames at once to leave a plateau
    fn deep_rewind(&mut self, frames: usize) {
        let pop = frames.min(self.stack.len().saturating_sub(1));
        if pop == 0 {
            return;
        }
        self.stack.truncate(self.stack.len() - pop);
        self.stats.deep_rewinds += 1;
        log::debug!(
            "Stagnated after {} iterations, rewinding {} frames to note {}",
            self.stats.iterations,
            pop,
            self.current_note().unwrap_or(0)
        );

        let Some(removed) = self.roll_back_to_top() else {
            return;
        };
        let live = self.planks.len();
        self.record(SearchEvent::DeepRewind {
            iteration: self.stats.iterations,
            frames: pop,
            removed,
            live,
        });
    }

    /// Restore the top frame's snapshot and get the frame ready to simulate again
    fn roll_back_to_top(&mut self) -> Option<Vec<BodyHandle>> {
        let (snapshot, note_index) = {
            let top = self.stack.last()?;
            (top.snapshot.clone(), top.note_index)
        };
        let Some(removed) = self.roll_back(&snapshot) else {
            self.fail(FailureReason::CorruptSnapshot { note_index });
            return None;
        };
        if let Some(top) = self.stack.last_mut() {
            top.rewind();
        }
        self.phase = Phase::Simulate;
        Some(removed)
    }

    fn roll_back(&mut self, snapshot: &Snapshot) -> Option<Vec<BodyHandle>> {
        match snapshot::restore(&mut self.sim, &self.ball, &mut self.planks, snapshot) {
            RestoreOutcome::Applied {
                time_ticks,
                removed,
            } => {
                self.time_ticks = time_ticks;
                let ids: Vec<BodyHandle> = removed.iter().map(|p| p.id).collect();
                self.removed.extend(ids.iter().copied());
                Some(ids)
            }
            RestoreOutcome::NoOp => None,
        }
    }

    fn fail(&mut self, reason: FailureReason) {
        log::info!(
            "Search failed after {} iterations: {:?} (best path {} of {} notes)",
            self.stats.iterations,
            reason,
            self.best_partial.len(),
            self.schedule.len()
        );
        self.failure = Some(reason);
        self.phase = Phase::Failed;
    }

    /// High-water bookkeeping and the stagnation escape
    fn track_progress(&mut self) {
        let progress = self.planks.len();
        if progress > self.stats.high_water {
            self.stats.high_water = progress;
            self.best_partial = self.placements();
        }
        if progress > self.baseline {
            self.baseline = progress;
            self.since_baseline = 0;
            self.stats.baseline_iteration = self.stats.iterations;
            return;
        }
        if self.is_finished() {
            return;
        }

        self.since_baseline += 1;
        let stagnation = &self.settings.stagnation;
        if self.since_baseline < stagnation.threshold {
            return;
        }
        self.since_baseline = 0;

        let margin = stagnation.margin_for(self.schedule.len());
        if self.baseline - progress <= margin {
            let frames = stagnation.rewind.frames_for(self.stack.len());
            self.deep_rewind(frames);
        } else {
            self.baseline = progress;
            self.stats.baseline_iteration = self.stats.iterations;
        }
    }

    fn record(&mut self, event: SearchEvent) {
        if self.settings.search.trace {
            self.events.push(event);
        }
    }
}
