//! Simulated-time autoplay and batch runs for balance testing.
//!
//! Every run owns its own session, memory store, and manual clock, so runs
//! share nothing and rayon can spread them across threads freely.

use std::path::{Path, PathBuf};
use std::time::Instant;

use idle_core::engine::Engine;
use idle_core::persistence::MemoryStore;
use idle_core::session::{Session, TICK_INTERVAL_MS};
use idle_core::state::Timestamp;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, ManualClock};
use crate::metrics::{BatchSummary, MetricsCollector, RunMetrics};
use crate::strategies::{Autoplayer, Strategy};

/// Convert a duration in minutes to whole milliseconds.
///
/// Negative or non-finite input gives zero.
pub fn minutes_to_millis(minutes: f64) -> u64 {
    if minutes.is_finite() && minutes > 0.0 {
        (minutes * 60_000.0).round() as u64
    } else {
        0
    }
}

/// Play one strategy from a fresh game for `duration_ms` of simulated time.
///
/// The session ticks at the live cadence and the autoplayer acts after each
/// tick, so a run follows the same code path as interactive play.
pub fn run_autoplay(
    engine: &Engine,
    strategy: &Strategy,
    duration_ms: u64,
    run_id: &str,
) -> RunMetrics {
    let mut clock = ManualClock::starting_at(Timestamp::ZERO);
    let (mut session, _) = Session::start(engine.clone(), MemoryStore::new(), clock.now());
    let mut player = Autoplayer::new(strategy.clone());
    let mut collector = MetricsCollector::new(run_id, &strategy.name);

    let mut elapsed = 0;
    while elapsed < duration_ms {
        let step = TICK_INTERVAL_MS.min(duration_ms - elapsed);
        clock.advance_millis(step);
        elapsed += step;

        session.tick(clock.now());
        let actions = player.act(&mut session, step as f64 / 1000.0);
        collector.record_tick(elapsed, &actions, session.state());
    }

    let metrics = collector.finalize(elapsed, session.state(), engine.catalog());
    debug!(
        run_id,
        strategy = %strategy.name,
        total_earnings = metrics.total_earnings,
        hash = metrics.final_state_hash,
        "Autoplay run finished"
    );
    metrics
}

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Strategies to run, one run each.
    pub strategies: Vec<Strategy>,
    /// Simulated minutes per run.
    pub minutes: f64,
    /// Maximum parallel runs (0 = use rayon default).
    pub parallel_runs: u32,
    /// Output directory for results.
    pub output_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            strategies: Strategy::builtins(),
            minutes: 30.0,
            parallel_runs: 0,
            output_dir: PathBuf::from("results"),
        }
    }
}

impl BatchConfig {
    /// Every built-in strategy for `minutes` of simulated play.
    pub fn new(minutes: f64) -> Self {
        Self {
            minutes,
            ..Default::default()
        }
    }

    /// Set output directory.
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set parallelism.
    pub fn with_parallel(mut self, runs: u32) -> Self {
        self.parallel_runs = runs;
        self
    }

    /// Replace the strategy list.
    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Where [`BatchResults::save`] writes by default.
    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join("batch.json")
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// Individual run metrics, in strategy order.
    pub runs: Vec<RunMetrics>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total wall-clock runtime.
    pub duration_seconds: f64,
    /// Runs that could not start.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// A run that was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Run index.
    pub run_index: u32,
    /// Strategy name.
    pub strategy: String,
    /// Error message.
    pub message: String,
}

/// Run every configured strategy in parallel.
pub fn run_batch(config: BatchConfig, engine: &Engine) -> BatchResults {
    let start = Instant::now();
    let duration_ms = minutes_to_millis(config.minutes);

    info!(
        runs = config.strategies.len(),
        minutes = config.minutes,
        "Starting batch run"
    );

    let run_all = || -> Vec<Result<RunMetrics, BatchError>> {
        config
            .strategies
            .par_iter()
            .enumerate()
            .map(|(i, strategy)| -> Result<RunMetrics, BatchError> {
                let run_index = i as u32;
                strategy.validate().map_err(|e| {
                    warn!(run_index, strategy = %strategy.name, error = %e, "Skipping run");
                    BatchError {
                        run_index,
                        strategy: strategy.name.clone(),
                        message: e.to_string(),
                    }
                })?;
                let run_id = format!("{}_{run_index}", strategy.name.to_lowercase());
                Ok(run_autoplay(engine, strategy, duration_ms, &run_id))
            })
            .collect()
    };

    let results = if config.parallel_runs > 0 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_runs as usize)
            .build()
        {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                warn!(error = %e, "Could not build thread pool, using the global one");
                run_all()
            }
        }
    } else {
        run_all()
    };

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunMetrics> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_runs(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        runs = runs.len(),
        errors = errors.len(),
        duration_seconds,
        best = summary.best_strategy.as_deref().unwrap_or("-"),
        "Batch complete"
    );

    BatchResults {
        config,
        runs,
        summary,
        duration_seconds,
        errors,
    }
}

/// Outcome of running the same autoplay several times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeterminismCheck {
    /// Final state hash of each run.
    pub hashes: Vec<u64>,
    /// Whether every hash matched.
    pub deterministic: bool,
}

/// Run the same strategy `runs` times in parallel and compare final hashes.
pub fn verify_determinism(
    engine: &Engine,
    strategy: &Strategy,
    runs: u32,
    duration_ms: u64,
) -> DeterminismCheck {
    let hashes: Vec<u64> = (0..runs)
        .into_par_iter()
        .map(|i| {
            run_autoplay(engine, strategy, duration_ms, &format!("verify_{i}")).final_state_hash
        })
        .collect();
    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    if deterministic {
        info!(runs, strategy = %strategy.name, "Determinism verified");
    } else {
        warn!(runs, strategy = %strategy.name, ?hashes, "Runs diverged");
    }
    DeterminismCheck {
        hashes,
        deterministic,
    }
}
