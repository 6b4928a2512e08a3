//! Regular playback of a generated level
//!
//! Once the search is done the planks stay fixed and the ball is replayed
//! from its start state. Each plank the ball starts touching is a note hit.
//! Snapshots taken at the start and after every hit allow stepping back.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::schedule::NoteSchedule;
use crate::search::snapshot::{self, RestoreOutcome, Snapshot};
use crate::search::{History, Placement};
use crate::settings::Settings;
use crate::sim::{Ball, BodyHandle, Plank, Simulation};

/// The ball meeting a plank during playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteHit {
    pub note_index: usize,
    pub plank: BodyHandle,
    pub payload: serde_json::Value,
    /// When the note was meant to sound (ms)
    pub scheduled_ms: f64,
    /// When the ball actually touched the plank (ms)
    pub actual_ms: f64,
    pub tick: u64,
}

impl NoteHit {
    /// Actual minus scheduled time (ms)
    pub fn error_ms(&self) -> f64 {
        self.actual_ms - self.scheduled_ms
    }
}

pub struct Playback<S: Simulation> {
    sim: S,
    ball: Ball,
    planks: Vec<Plank>,
    placements: Vec<Placement>,
    schedule: NoteSchedule,
    step_ms: f64,
    time_ticks: u64,
    /// Planks in contact with the ball on the previous tick
    touching: BTreeSet<BodyHandle>,
    hits: Vec<NoteHit>,
    history: History,
    start: Snapshot,
    next_ordinal: u64,
}

impl<S: Simulation> Playback<S> {
    /// Start playback with the ball in its current state at time 0
    pub fn new(
        sim: S,
        ball: Ball,
        planks: Vec<Plank>,
        placements: Vec<Placement>,
        schedule: NoteSchedule,
        settings: &Settings,
    ) -> Self {
        let start = snapshot::capture(&sim, &ball, &planks, 0, 0);
        let mut history = History::new(settings.history_capacity);
        history.push(start.clone());
        Self {
            sim,
            ball,
            planks,
            placements,
            schedule,
            step_ms: settings.world.step_ms(),
            time_ticks: 0,
            touching: BTreeSet::new(),
            hits: Vec::new(),
            history,
            start,
            next_ordinal: 1,
        }
    }

    /// Advance one fixed step, returning the hits that began on it
    pub fn tick(&mut self) -> Vec<NoteHit> {
        self.sim.step();
        self.time_ticks += 1;

        let contacts: BTreeSet<BodyHandle> = self
            .sim
            .query_contacts(self.ball.handle)
            .into_iter()
            .filter(|h| self.planks.iter().any(|p| p.id == *h))
            .collect();

        let mut new_hits = Vec::new();
        for id in contacts.difference(&self.touching) {
            let Some(plank) = self.planks.iter().find(|p| p.id == *id) else {
                continue;
            };
            let note = self.schedule.get(plank.note_index);
            let hit = NoteHit {
                note_index: plank.note_index,
                plank: plank.id,
                payload: note.map(|n| n.payload.clone()).unwrap_or_default(),
                scheduled_ms: note.map(|n| n.time).unwrap_or(0.0),
                actual_ms: self.time_ms(),
                tick: self.time_ticks,
            };
            log::debug!(
                "Note {} hit at {:.1} ms ({:+.1} ms)",
                hit.note_index,
                hit.actual_ms,
                hit.error_ms()
            );
            new_hits.push(hit);
        }
        self.touching = contacts;

        if !new_hits.is_empty() {
            let ordinal = self.next_ordinal;
            self.next_ordinal += 1;
            self.history.push(snapshot::capture(
                &self.sim,
                &self.ball,
                &self.planks,
                self.time_ticks,
                ordinal,
            ));
            self.hits.extend(new_hits.iter().cloned());
        }
        new_hits
    }

    /// Tick until `ms` of simulated time have passed
    pub fn run_until(&mut self, ms: f64) -> Vec<NoteHit> {
        let mut hits = Vec::new();
        while self.time_ms() < ms {
            hits.extend(self.tick());
        }
        hits
    }

    /// Step back to the latest snapshot strictly before the current time
    ///
    /// Hits after that point are forgotten. Returns false if there is
    /// nothing earlier to go back to.
    pub fn rewind(&mut self) -> bool {
        let now = self.time_ticks;
        let Some(target) = self.history.pop_while(|s| s.time_ticks >= now) else {
            self.history.push(self.start.clone());
            return false;
        };

        match snapshot::restore(&mut self.sim, &self.ball, &mut self.planks, &target) {
            RestoreOutcome::Applied { time_ticks, .. } => {
                self.time_ticks = time_ticks;
                self.hits.retain(|h| h.tick <= time_ticks);
                self.touching.clear();
                log::info!("Rewound playback to {:.1} ms", self.time_ms());
                self.history.push(target);
                true
            }
            RestoreOutcome::NoOp => {
                self.history.push(target);
                false
            }
        }
    }

    pub fn time_ms(&self) -> f64 {
        self.time_ticks as f64 * self.step_ms
    }

    /// Every hit so far, oldest first
    pub fn hits(&self) -> &[NoteHit] {
        &self.hits
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn planks(&self) -> &[Plank] {
        &self.planks
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn schedule(&self) -> &NoteSchedule {
        &self.schedule
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn simulation(&self) -> &S {
        &self.sim
    }

    pub fn into_simulation(self) -> S {
        self.sim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Outcome, SearchEngine};
    use crate::settings::PlankSettings;
    use crate::sim::{Pose, Shape, World};
    use glam::Vec2;

    /// Ball at rest above one flat plank serving note 0
    fn single_plank(settings: &Settings, note_ms: f64) -> Playback<World> {
        let mut world = World::new(&settings.world);
        let ball = Ball::spawn(&mut world, &settings.ball);
        let pose = Pose::at(Vec2::new(0.0, -100.0));
        let plank_settings = PlankSettings::default();
        let id = world.create_static_body(
            pose,
            Shape::Box {
                half: Vec2::new(plank_settings.half_length, plank_settings.half_width),
            },
        );
        world.set_restitution(id, plank_settings.restitution);
        let planks = vec![Plank::from_settings(id, pose, &plank_settings, 0, 0, 0)];
        Playback::new(
            world,
            ball,
            planks,
            Vec::new(),
            NoteSchedule::from_times(&[note_ms]),
            settings,
        )
    }

    #[test]
    fn test_first_contact_is_a_hit() {
        let settings = Settings::default();
        let mut playback = single_plank(&settings, 420.0);

        let hits = playback.run_until(600.0);
        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.note_index, 0);
        assert_eq!(hit.plank, playback.planks()[0].id);
        // Free fall of ~88 px under 980 px/s² takes ~424 ms
        assert!((hit.actual_ms - 424.0).abs() < 25.0, "hit at {}", hit.actual_ms);
        assert!(hit.error_ms().abs() < 30.0);
        assert_eq!(playback.hits().len(), 1);
        assert_eq!(playback.history().len(), 2);
    }

    #[test]
    fn test_rewind_forgets_later_hits_and_replays() {
        let settings = Settings::default();
        let mut playback = single_plank(&settings, 420.0);

        let first = playback.run_until(600.0);
        assert!(playback.rewind());
        // Back to the hit itself
        assert_eq!(playback.time_ms(), first[0].actual_ms);
        assert_eq!(playback.hits().len(), 1);

        assert!(playback.rewind());
        assert_eq!(playback.time_ms(), 0.0);
        assert!(playback.hits().is_empty());

        // Nothing earlier than the start
        assert!(!playback.rewind());
        assert_eq!(playback.time_ms(), 0.0);

        let replay = playback.run_until(600.0);
        assert_eq!(replay, first);
    }

    #[test]
    fn test_failed_rewind_keeps_undo_point() {
        let settings = Settings::default();
        let mut playback = single_plank(&settings, 420.0);
        playback.run_until(600.0);
        let now = playback.time_ms();
        assert_eq!(playback.history().len(), 2);

        // A plank vanishing behind playback's back makes the snapshot unusable
        playback.planks[0].destroy(&mut playback.sim);
        assert!(!playback.rewind());
        assert_eq!(playback.history().len(), 2);
        assert_eq!(playback.time_ms(), now);
        assert_eq!(playback.hits().len(), 1);
    }

    #[test]
    fn test_generated_level_plays_back() {
        let settings = Settings::default();
        let world = World::new(&settings.world);
        let schedule = NoteSchedule::from_times(&[0.0, 500.0]);
        let mut engine = SearchEngine::new(world, schedule, settings).unwrap();

        if let Outcome::Done(level) = engine.run() {
            let mut playback = engine.into_playback().ok().unwrap();
            assert_eq!(playback.time_ms(), 0.0);
            assert_eq!(playback.placements(), &level.placements[..]);
            assert_eq!(playback.planks().len(), 2);
            let hits = playback.run_until(600.0);
            assert!(hits.iter().any(|h| h.note_index == 0));
        }
    }
}
