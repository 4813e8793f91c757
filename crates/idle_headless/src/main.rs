//! Headless idle-economy runner.
//!
//! This binary runs a game session without a UI, controlled via JSON on
//! stdin/stdout, and hosts the autoplay balance tools.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p idle_headless
//!
//! # Interactive mode with a save file and simulated time
//! cargo run -p idle_headless -- run --save save.json --simulated
//!
//! # Autoplay one strategy
//! cargo run -p idle_headless -- simulate --strategy clicker --minutes 30
//!
//! # Run every built-in strategy in parallel
//! cargo run -p idle_headless -- batch --minutes 120 --output results/
//!
//! # Print a save file
//! cargo run -p idle_headless -- inspect --save save.json
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for command/response format.

use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use idle_core::engine::Engine;
use idle_core::persistence::{MemoryStore, SnapshotStore};
use idle_core::report::StateReport;
use idle_headless::{
    batch::{minutes_to_millis, run_autoplay, run_batch, verify_determinism, BatchConfig},
    catalog_loader::resolve_catalog,
    clock::{Clock, SystemClock},
    runner::{HeadlessConfig, HeadlessRunner},
    store::FileStore,
    strategies::Strategy,
};

#[derive(Parser)]
#[command(name = "idle_headless")]
#[command(about = "Headless idle-economy runner for scripted play and balance testing")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Upgrade catalog RON file (default: data/upgrades.ron or built-in)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive JSON-lines session
    Run {
        /// Save file (.json or .bin); without it nothing is persisted
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Only move time on `advance` commands
        #[arg(long)]
        simulated: bool,
    },

    /// Autoplay one strategy in simulated time
    Simulate {
        /// Built-in strategy name or RON file path
        #[arg(short, long, default_value = "payback")]
        strategy: String,

        /// Simulated minutes to play
        #[arg(short, long, default_value = "30")]
        minutes: f64,
    },

    /// Run every built-in strategy for balance testing
    Batch {
        /// Simulated minutes per run
        #[arg(short, long, default_value = "30")]
        minutes: f64,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,
    },

    /// Verify that repeated autoplay runs end in the same state
    Verify {
        /// Built-in strategy name or RON file path
        #[arg(short, long, default_value = "payback")]
        strategy: String,

        /// Number of runs
        #[arg(short, long, default_value = "4")]
        runs: u32,

        /// Simulated minutes per run
        #[arg(short, long, default_value = "10")]
        minutes: f64,
    },

    /// Print the state stored in a save file
    Inspect {
        /// Save file (.json or .bin)
        #[arg(short, long)]
        save: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let engine = match resolve_catalog(cli.catalog.as_deref()) {
        Ok(catalog) => Engine::new(catalog),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load upgrade catalog");
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Run { save, simulated }) => cmd_run(engine, save, simulated),
        Some(Commands::Simulate { strategy, minutes }) => cmd_simulate(&engine, &strategy, minutes),
        Some(Commands::Batch {
            minutes,
            output,
            parallel,
        }) => cmd_batch(&engine, minutes, output, parallel),
        Some(Commands::Verify {
            strategy,
            runs,
            minutes,
        }) => cmd_verify(&engine, &strategy, runs, minutes),
        Some(Commands::Inspect { save }) => cmd_inspect(&engine, &save),
        None => {
            // Default: interactive mode, nothing persisted
            cmd_run(engine, None, false);
        }
    }
}

/// Run an interactive session
fn cmd_run(engine: Engine, save: Option<PathBuf>, simulated: bool) {
    tracing::info!(save = ?save, simulated, "Starting interactive session");
    let config = HeadlessConfig {
        simulated,
        start_millis: 0,
    };

    let result = match save {
        Some(path) => run_session(engine, FileStore::new(path), &config),
        None => run_session(engine, MemoryStore::new(), &config),
    };
    if let Err(e) = result {
        tracing::error!(error = %e, "Session IO failed");
        std::process::exit(1);
    }
}

fn run_session<S: SnapshotStore>(engine: Engine, store: S, config: &HeadlessConfig) -> io::Result<()> {
    let mut runner = HeadlessRunner::start(engine, store, config);
    let stdin = io::stdin();
    runner.run(stdin.lock(), io::stdout().lock())
}

fn load_strategy(name_or_path: &str) -> Strategy {
    match Strategy::resolve(name_or_path) {
        Ok(strategy) => strategy,
        Err(e) => {
            tracing::error!(error = %e, strategy = name_or_path, "Failed to load strategy");
            std::process::exit(1);
        }
    }
}

/// Autoplay one strategy and print a summary
fn cmd_simulate(engine: &Engine, strategy: &str, minutes: f64) {
    let strategy = load_strategy(strategy);
    tracing::info!(strategy = %strategy.name, minutes, "Simulating");

    let metrics = run_autoplay(engine, &strategy, minutes_to_millis(minutes), "simulate");

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("SIMULATION COMPLETE: {}", strategy.name);
    eprintln!("{}", "=".repeat(50));
    eprintln!("Simulated: {:.1} min", metrics.simulated_ms as f64 / 60_000.0);
    eprintln!("Final currency: {:.2}", metrics.final_currency);
    eprintln!("Production rate: {:.2}/s", metrics.final_production_rate);
    eprintln!("Total earnings: {:.2}", metrics.total_earnings);
    eprintln!(
        "Clicks: {} ({:.1}% of earnings)",
        metrics.total_clicks,
        metrics.manual_share() * 100.0
    );
    eprintln!(
        "Purchases: {} ({} levels)",
        metrics.purchases, metrics.levels_bought
    );
    eprintln!("Prestige: {} points", metrics.prestige_points);
    for (name, level) in &metrics.final_levels {
        eprintln!("  {name}: level {level}");
    }
    for (milestone, ms) in &metrics.milestones {
        eprintln!("  {milestone} earned at {:.1} min", *ms as f64 / 60_000.0);
    }

    match serde_json::to_string_pretty(&metrics) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize metrics");
            std::process::exit(1);
        }
    }
}

/// Run every built-in strategy and save batch.json
fn cmd_batch(engine: &Engine, minutes: f64, output: PathBuf, parallel: u32) {
    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    tracing::info!(
        minutes,
        parallel,
        output = %output.display(),
        cpus_available = num_cpus,
        "Batch configuration"
    );

    let config = BatchConfig::new(minutes)
        .with_output(output)
        .with_parallel(parallel);
    let results_path = config.results_path();
    let results = run_batch(config, engine);

    if let Err(e) = results.save(&results_path) {
        tracing::error!(error = %e, path = %results_path.display(), "Failed to save results");
        std::process::exit(1);
    }

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Runs: {}", results.runs.len());
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!("\nAverage total earnings:");
    for (name, summary) in &results.summary.by_strategy {
        eprintln!("  {name}: {:.2}", summary.avg_total_earnings);
    }
    if let Some(best) = &results.summary.best_strategy {
        eprintln!("\nBest strategy: {best}");
    }
    for error in &results.errors {
        eprintln!("  Run {} ({}) skipped: {}", error.run_index, error.strategy, error.message);
    }
    eprintln!("\nResults saved to: {}", results_path.display());
}

/// Verify determinism
fn cmd_verify(engine: &Engine, strategy: &str, runs: u32, minutes: f64) {
    let strategy = load_strategy(strategy);
    tracing::info!(strategy = %strategy.name, runs, minutes, "Verifying determinism");

    let check = verify_determinism(engine, &strategy, runs, minutes_to_millis(minutes));

    if check.deterministic {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected! Hashes: {:?}", check.hashes);
        std::process::exit(1);
    }
}

/// Print the state stored in a save file
fn cmd_inspect(engine: &Engine, path: &Path) {
    let store = FileStore::new(path);
    let snapshot = match store.load() {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            tracing::error!(path = %path.display(), "Save file not found");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to read save file");
            std::process::exit(1);
        }
    };

    let now = SystemClock.now();
    let state = match snapshot.restore(engine, now) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Save file is unusable");
            std::process::exit(1);
        }
    };

    let report = StateReport::new(engine, &state, now);
    for line in report.summary_lines() {
        eprintln!("{line}");
    }
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize report");
            std::process::exit(1);
        }
    }
}
