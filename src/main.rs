//! Plankfall entry point
//!
//! Loads a note schedule, runs the plank search to completion and writes the
//! resulting level as JSON. `play` then replays the level and prints how
//! closely each bounce lands on its note.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use plankfall::search::SearchEvent;
use plankfall::sim::World;
use plankfall::{NoteSchedule, Outcome, SearchEngine, Settings, TickStatus};

/// Places planks so a bouncing ball hits every note on time.
#[derive(Parser)]
#[command(name = "plankfall")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search for a level and write it as JSON.
    Generate(GenerateArgs),
    /// Search for a level, then play it back and print note timing.
    Play {
        #[command(flatten)]
        generate: GenerateArgs,
        /// Keep playing this long after the last note (ms).
        #[arg(long, default_value_t = 500.0)]
        tail_ms: f64,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Note schedule (JSON array of {time, payload})
    schedule: PathBuf,
    /// Settings file (JSON, missing fields use defaults)
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Override the search seed
    #[arg(long)]
    seed: Option<u64>,
    /// Override the per-tick iteration budget
    #[arg(long)]
    budget: Option<u32>,
    /// Write the outcome here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
    /// Log every search decision at debug level
    #[arg(long)]
    trace: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Generate(args) => run_generate(&args).map(|_| ()),
        Command::Play { generate, tail_ms } => run_play(&generate, tail_ms),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("plankfall: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_settings(args: &GenerateArgs) -> plankfall::Result<Settings> {
    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(seed) = args.seed {
        settings.search.seed = seed;
    }
    if let Some(budget) = args.budget {
        settings.search.tick_budget = budget;
    }
    settings.search.trace |= args.trace;
    settings.validate()?;
    Ok(settings)
}

/// Run the search to a terminal outcome and write it out
fn run_generate(args: &GenerateArgs) -> plankfall::Result<SearchEngine<World>> {
    let settings = load_settings(args)?;
    let schedule = NoteSchedule::load(&args.schedule)?;
    log::info!(
        "Loaded {} notes ending at {:.0} ms from {}",
        schedule.len(),
        schedule.end_time(),
        args.schedule.display()
    );

    let world = World::new(&settings.world);
    let mut engine = SearchEngine::new(world, schedule, settings)?;

    let mut ticks = 0u64;
    while engine.tick() == TickStatus::Running {
        ticks += 1;
        for event in engine.drain_events() {
            log_event(&event);
        }
        let removed = engine.drain_removed();
        if !removed.is_empty() {
            log::trace!("Rolled back planks {:?}", removed);
        }
        if ticks % 1000 == 0 {
            log::info!(
                "tick {}: note {} of {}, {} planks live, {} backtracks",
                ticks,
                engine.current_note().unwrap_or(0),
                engine.schedule().len(),
                engine.planks().len(),
                engine.stats().backtracks
            );
        }
    }
    for event in engine.drain_events() {
        log_event(&event);
    }
    engine.drain_removed();

    let Some(outcome) = engine.outcome() else {
        return Ok(engine);
    };
    match &outcome {
        Outcome::Done(level) => println!(
            "Placed {} planks ({} after the step cap) in {} iterations",
            level.placements.len(),
            level.step_cap_arrivals,
            engine.stats().iterations
        ),
        Outcome::Failed { reason, partial } => println!(
            "No level found: {:?}; best path covered {} of {} notes",
            reason,
            partial.len(),
            engine.schedule().len()
        ),
    }

    let json = serde_json::to_string_pretty(&outcome)?;
    match &args.output {
        Some(path) => {
            fs::write(path, json)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(engine)
}

fn run_play(args: &GenerateArgs, tail_ms: f64) -> plankfall::Result<()> {
    let engine = run_generate(args)?;
    let end = engine.schedule().end_time() + tail_ms;
    let Ok(mut playback) = engine.into_playback() else {
        eprintln!("Nothing to play: the search did not finish a level");
        return Ok(());
    };

    playback.run_until(end);

    println!("{:>5}  {:>10}  {:>10}  {:>8}", "note", "scheduled", "actual", "error");
    for hit in playback.hits() {
        println!(
            "{:>5}  {:>10.1}  {:>10.1}  {:>+8.1}",
            hit.note_index,
            hit.scheduled_ms,
            hit.actual_ms,
            hit.error_ms()
        );
    }
    Ok(())
}

fn log_event(event: &SearchEvent) {
    log::debug!("{:?}", event);
}
