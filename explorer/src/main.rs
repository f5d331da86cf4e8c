//! Exhaustive possibility-space explorer for *All Things Devours*.
//!
//! Plays the game through a dfrotz-style interpreter subprocess, trying
//! every admissible command sequence and archiving each winning one. The
//! run checkpoints itself continuously and resumes from the freshest
//! checkpoint on restart, so it can be left unattended for weeks.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use explorer::atd;
use explorer::control::{self, RunControl};
use explorer::core::counters::RunCounters;
use explorer::core::progress::ProgressStore;
use explorer::exit_codes;
use explorer::io::checkpoint::{self, CheckpointTarget, CheckpointWriter};
use explorer::io::config::load_config;
use explorer::io::paths::WorkPaths;
use explorer::io::terp::FrotzSession;
use explorer::logging;
use explorer::search::{Explorer, SearchOptions, StopReason};

#[derive(Parser)]
#[command(
    name = "explorer",
    version,
    about = "Exhaustively explore the possibility space of All Things Devours"
)]
struct Cli {
    /// Increase how chatty the run is about its progress (repeatable).
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease how chatty the run is about its progress (repeatable).
    #[arg(short = 'q', long, action = clap::ArgAction::Count)]
    quiet: u8,

    /// Path to the dfrotz-compatible interpreter binary.
    #[arg(short = 'i', long, default_value = "dfrotz")]
    interpreter: PathBuf,

    /// Path to the story file the interpreter should play.
    #[arg(short = 's', long, default_value = "devours.z5")]
    story: PathBuf,

    /// Working directory for saves, logs, checkpoints, and archives.
    #[arg(long, default_value = "working")]
    work_dir: PathBuf,

    /// Ignore any existing checkpoint and start cold.
    #[arg(long)]
    fresh: bool,
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(stop) => {
            if stop == StopReason::Interrupted {
                println!("Interrupted; progress checkpointed.");
            }
            std::process::exit(exit_codes::OK);
        }
        Err(err) => {
            // Full context: the failing command and every layer under it.
            eprintln!("{err:#}");
            std::process::exit(exit_codes::FATAL);
        }
    }
}

fn run(cli: &Cli) -> Result<StopReason> {
    let verbosity = Arc::new(logging::init(i32::from(cli.verbose) - i32::from(cli.quiet)));

    let paths = WorkPaths::new(&cli.work_dir);
    paths.ensure_layout()?;
    let cfg = load_config(&paths.config_path)?;
    let target = CheckpointTarget {
        path: paths.checkpoint_path.clone(),
        backup_path: paths.checkpoint_backup_path.clone(),
    };

    // Resume from the freshest readable checkpoint unless told otherwise.
    // The run start is back-dated so elapsed-time reporting is continuous
    // across restarts; an unreadable checkpoint means a cold start, never a
    // refusal to run.
    let (store, counters) = if cli.fresh {
        info!("--fresh: ignoring any existing checkpoint");
        (ProgressStore::new(cfg.retain_strand_len), RunCounters::new())
    } else {
        match checkpoint::load_latest(&target) {
            Some(snapshot) => {
                let store = ProgressStore::from_strands(snapshot.strands, cfg.retain_strand_len);
                let primed = snapshot.counters.reconciled(store.resume_maxima());
                info!(
                    strands = store.len(),
                    moves = primed.moves,
                    successes = primed.successes,
                    "resuming from checkpoint"
                );
                (store, RunCounters::resumed(primed))
            }
            None => {
                if paths.checkpoint_path.exists() || paths.checkpoint_backup_path.exists() {
                    warn!("no readable checkpoint; starting from scratch");
                } else {
                    info!("no previous checkpoint; starting from scratch");
                }
                (ProgressStore::new(cfg.retain_strand_len), RunCounters::new())
            }
        }
    };
    let counters = Arc::new(counters);

    let run_control = RunControl::new();
    control::install_signal_handlers(
        run_control.clone(),
        Arc::clone(&verbosity),
        Arc::clone(&counters),
    )?;

    let mut spec = atd::game_spec(cli.interpreter.clone(), cli.story.clone())?;
    spec.save_every_turn = cfg.save_every_turn;
    spec.inventory_every_turn = cfg.inventory_every_turn;
    spec.keep_transcript = cfg.keep_transcript;

    let session = FrotzSession::spawn(spec, &paths)?;
    let writer = CheckpointWriter::spawn(target, cfg.snapshot_queue_capacity)?;
    let explorer = Explorer::new(
        session,
        atd::rule_table(),
        store,
        Arc::clone(&counters),
        writer,
        run_control,
        SearchOptions::from_config(&cfg),
        &paths.successes_dir,
    );

    let (summary, _session) = explorer.run()?;
    println!(
        "DONE: {} solutions and {} dead ends in {} moves ({:.3} hours).",
        summary.successes,
        summary.dead_ends,
        summary.moves,
        summary.elapsed.as_secs_f64() / 3600.0,
    );
    Ok(summary.stop)
}
