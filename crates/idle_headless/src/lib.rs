//! Headless idle-economy driver for scripted play and CI verification.
//!
//! This crate wraps an `idle_core` session in a process that can be
//! controlled via JSON commands on stdin, with responses on stdout. This
//! enables:
//!
//! - **Scripted play**: A controller can play the game without a UI
//! - **Balance testing**: Autoplay strategies run in simulated time, in parallel
//! - **CI verification**: Repeated runs must end in identical state hashes
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (advance, click, purchase, etc.)
//! - **stdout**: Responses (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See the [`protocol`] module for every command and response shape.
//!
//! # Example
//!
//! ```bash
//! # Play interactively against a save file
//! echo '{"cmd":"click"}' | cargo run -p idle_headless -- run --save save.json
//!
//! # Autoplay a strategy for an hour of simulated time
//! cargo run -p idle_headless -- simulate --strategy payback --minutes 60
//!
//! # Verify determinism
//! cargo run -p idle_headless -- verify --strategy prestiger --runs 8 --minutes 30
//! ```

pub mod batch;
pub mod catalog_loader;
pub mod clock;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod store;
pub mod strategies;

pub use batch::{run_autoplay, run_batch, verify_determinism, BatchConfig, BatchResults};
pub use catalog_loader::resolve_catalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use metrics::{BatchSummary, MetricsCollector, RunMetrics};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use store::FileStore;
pub use strategies::{Autoplayer, Strategy, StrategyError};
