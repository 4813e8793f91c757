//! JSON-lines protocol for driving a session from another process.
//!
//! One JSON object per line in each direction:
//!
//! **Input (stdin):** commands from the controller
//! **Output (stdout):** one response per command
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `ready` (and `offline` if time away was credited)
//! 2. Controller sends commands as JSON lines
//! 3. Runner answers each command with exactly one line
//! 4. `quit` (or end of input) saves and outputs `goodbye`
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","last_update":0,"simulated":true}
//! -> {"cmd":"click"}
//! <- {"type":"state","report":{"currency":1.0,...}}
//! -> {"cmd":"purchase","upgrade_id":2,"quantity":"max"}
//! <- {"type":"rejected","reason":"insufficient_funds","message":"Insufficient funds: need 100, have 1"}
//! -> {"cmd":"advance","seconds":60}
//! <- {"type":"state","report":{"currency":7.0,...}}
//! -> {"cmd":"hash"}
//! <- {"type":"hash","last_update":60000,"hash":1234567890}
//! ```

use idle_core::engine::{OfflineReport, PurchaseQuantity};
use idle_core::error::Rejection;
use idle_core::report::StateReport;
use serde::{Deserialize, Serialize};

/// Protocol version announced in `ready`.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Accrue production for a number of seconds (simulated clock only).
    Advance { seconds: f64 },

    /// Catch up after a gap, crediting it as offline time if long enough
    /// (simulated clock only).
    Reconcile { seconds: f64 },

    /// Buy levels of an upgrade.
    Purchase {
        upgrade_id: u32,
        #[serde(default)]
        quantity: QuantityArg,
    },

    /// One manual action.
    Click,

    /// Trade the run for prestige points.
    Prestige,

    /// Wipe everything, prestige included, and clear the save.
    Reset,

    /// Report the current state without changing it.
    Query,

    /// Write the save now.
    Save,

    /// State hash for determinism checks.
    Hash,

    /// Save and shut down.
    Quit,
}

/// Purchase quantity as written on the wire: a number or `"max"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityArg {
    /// Explicit count; negative values are rejected as invalid.
    Count(i64),
    /// Keyword form.
    Keyword(QuantityKeyword),
}

/// Keyword quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityKeyword {
    /// Everything affordable.
    Max,
}

impl Default for QuantityArg {
    fn default() -> Self {
        Self::Count(1)
    }
}

impl From<QuantityArg> for PurchaseQuantity {
    fn from(arg: QuantityArg) -> Self {
        match arg {
            QuantityArg::Count(n) => PurchaseQuantity::from_requested(n),
            QuantityArg::Keyword(QuantityKeyword::Max) => PurchaseQuantity::Max,
        }
    }
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        version: String,
        last_update: u64,
        simulated: bool,
    },

    /// Current state after a command.
    State { report: Box<StateReport> },

    /// Time away was credited.
    Offline {
        elapsed_seconds: f64,
        earnings: f64,
    },

    /// Command refused; state unchanged.
    Rejected { reason: String, message: String },

    /// Save written.
    Saved { last_update: u64 },

    /// State hash for determinism verification.
    Hash { last_update: u64, hash: u64 },

    /// Error processing a command.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },

    /// Goodbye message before shutdown.
    Goodbye,
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    pub fn ready(last_update: u64, simulated: bool) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            last_update,
            simulated,
        }
    }

    /// Wrap a report.
    pub fn state(report: StateReport) -> Self {
        Self::State {
            report: Box::new(report),
        }
    }

    /// Create a rejection response.
    pub fn rejected(rejection: &Rejection) -> Self {
        Self::Rejected {
            reason: rejection.reason().to_string(),
            message: rejection.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl From<OfflineReport> for Response {
    fn from(report: OfflineReport) -> Self {
        Self::Offline {
            elapsed_seconds: report.elapsed_seconds,
            earnings: report.earnings,
        }
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for error reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Reconcile { .. } => "reconcile",
            Self::Purchase { .. } => "purchase",
            Self::Click => "click",
            Self::Prestige => "prestige",
            Self::Reset => "reset",
            Self::Query => "query",
            Self::Save => "save",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}
