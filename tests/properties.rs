//! Property-based tests for snapshots, history and search output.
//!
//! Run with: cargo test --test properties

use glam::Vec2;
use plankfall::search::snapshot::{self, RestoreOutcome, Snapshot};
use plankfall::search::History;
use plankfall::settings::{BallSettings, PlankSettings, WorldSettings};
use plankfall::sim::{Ball, BallState, Plank, Pose, Shape, Simulation, World};
use plankfall::{NoteSchedule, Outcome, SearchEngine, Settings};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_vec2(range: f32) -> impl Strategy<Value = Vec2> {
    (-range..range, -range..range).prop_map(|(x, y)| Vec2::new(x, y))
}

fn arb_ball_state() -> impl Strategy<Value = BallState> {
    (arb_vec2(500.0), arb_vec2(800.0)).prop_map(|(pos, vel)| BallState { pos, vel })
}

/// Ascending note times starting at 0 with 250..700 ms gaps
fn arb_times(max_notes: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(250.0..700.0f64, 0..max_notes).prop_map(|gaps| {
        let mut t = 0.0;
        let mut times = vec![0.0];
        for gap in gaps {
            t += gap;
            times.push(t);
        }
        times
    })
}

fn empty_snapshot(ordinal: u64) -> Snapshot {
    Snapshot {
        ball: BallState {
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
        },
        planks: Vec::new(),
        time_ticks: ordinal,
        ordinal,
    }
}

fn add_plank(world: &mut World, planks: &mut Vec<Plank>, pos: Vec2, angle: f32) {
    let settings = PlankSettings::default();
    let pose = Pose::new(pos, angle);
    let id = world.create_static_body(
        pose,
        Shape::Box {
            half: Vec2::new(settings.half_length, settings.half_width),
        },
    );
    let ordinal = planks.len() as u32;
    planks.push(Plank::from_settings(id, pose, &settings, ordinal, planks.len(), 0));
}

// =============================================================================
// History
// =============================================================================

proptest! {
    #[test]
    fn proptest_history_never_exceeds_capacity(capacity in 1usize..50, pushes in 0u64..200) {
        let mut history = History::new(capacity);
        for i in 0..pushes {
            history.push(empty_snapshot(i));
            prop_assert!(history.len() <= capacity);
        }

        let expected = (pushes as usize).min(capacity);
        prop_assert_eq!(history.len(), expected);

        // Oldest entries were evicted first
        let ordinals: Vec<u64> = history.iter().map(|s| s.ordinal).collect();
        let first = pushes - expected as u64;
        prop_assert_eq!(ordinals, (first..pushes).collect::<Vec<_>>());
    }

    #[test]
    fn proptest_pop_while_finds_latest_earlier(pushes in 1u64..40, cut in 0u64..40) {
        let mut history = History::new(64);
        for i in 0..pushes {
            history.push(empty_snapshot(i));
        }

        let found = history.pop_while(|s| s.time_ticks >= cut);
        if cut == 0 {
            prop_assert!(found.is_none());
            prop_assert!(history.is_empty());
        } else {
            let expected = cut.min(pushes) - 1;
            prop_assert_eq!(found.map(|s| s.ordinal), Some(expected));
            prop_assert_eq!(history.len() as u64, expected);
        }
    }
}

// =============================================================================
// Snapshot round trip
// =============================================================================

proptest! {
    #[test]
    fn proptest_restore_returns_to_capture(
        start in arb_ball_state(),
        kept in prop::collection::vec((arb_vec2(400.0), -1.5f32..1.5), 0..5),
        added in prop::collection::vec((arb_vec2(400.0), -1.5f32..1.5), 0..5),
        steps in 0usize..60,
    ) {
        let mut world = World::new(&WorldSettings::default());
        let ball = Ball::spawn(&mut world, &BallSettings::default());
        ball.set_state(&mut world, &start);

        let mut planks = Vec::new();
        for (pos, angle) in &kept {
            add_plank(&mut world, &mut planks, *pos, *angle);
        }
        let snap = snapshot::capture(&world, &ball, &planks, 7, 1);
        let kept_ids: Vec<_> = planks.iter().map(|p| p.id).collect();

        for _ in 0..steps {
            world.step();
        }
        for (pos, angle) in &added {
            add_plank(&mut world, &mut planks, *pos, *angle);
        }

        let outcome = snapshot::restore(&mut world, &ball, &mut planks, &snap);
        let RestoreOutcome::Applied { time_ticks, removed } = outcome else {
            return Err(TestCaseError::fail("restore of a valid snapshot was a no-op"));
        };
        prop_assert_eq!(time_ticks, 7);
        prop_assert_eq!(removed.len(), added.len());
        prop_assert_eq!(ball.state(&world), start);
        prop_assert_eq!(planks.iter().map(|p| p.id).collect::<Vec<_>>(), kept_ids);
        prop_assert_eq!(world.body_count(), 1 + kept.len());

        // Capturing again reproduces the same state
        let again = snapshot::capture(&world, &ball, &planks, 7, 1);
        prop_assert_eq!(again, snap);
    }
}

// =============================================================================
// Search output
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn proptest_placements_follow_note_order(seed in any::<u64>(), times in arb_times(3)) {
        let mut settings = Settings::default();
        settings.search.seed = seed;
        let note_count = times.len();
        let world = World::new(&settings.world);
        let mut engine = SearchEngine::new(world, NoteSchedule::from_times(&times), settings).unwrap();

        let outcome = engine.run();
        let notes: Vec<usize> = outcome.placements().iter().map(|p| p.note_index).collect();
        prop_assert_eq!(&notes, &(0..notes.len()).collect::<Vec<_>>());

        match outcome {
            Outcome::Done(level) => {
                prop_assert_eq!(level.placements.len(), note_count);
                prop_assert_eq!(engine.simulation().body_count(), 1 + note_count);
            }
            Outcome::Failed { partial, .. } => {
                prop_assert!(partial.len() < note_count);
                prop_assert_eq!(engine.simulation().body_count(), 1);
            }
        }
    }
}
