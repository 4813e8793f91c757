//! Error types for the idle economy engine.
//!
//! Two families live here:
//!
//! - [`Rejection`]: an expected game-logic outcome. A transition that
//!   rejects leaves the input state untouched and hands the reason back
//!   to the caller for messaging.
//! - [`GameError`]: infrastructure failures (catalog data, snapshots,
//!   storage). None of them abort the engine; the session layer recovers
//!   from the persistence ones by falling back to defaults.

use thiserror::Error;

use crate::data::UpgradeId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for catalog, snapshot, and storage failures.
#[derive(Debug, Error)]
pub enum GameError {
    /// Snapshot failed structural validation at load time.
    #[error("Corrupt persisted state: {0}")]
    CorruptPersistedState(String),

    /// Upgrade catalog violates a catalog invariant.
    #[error("Invalid upgrade catalog: {0}")]
    InvalidCatalog(String),

    /// Data text could not be parsed.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name of the document that failed to parse.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// Snapshot store could not be read or written.
    #[error("Snapshot storage error: {0}")]
    Storage(String),

    /// State could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Reason a purchase or prestige command was refused.
///
/// Rejections are values, not failures: the state they were computed from
/// is unchanged and the caller decides how to surface them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    /// Not enough currency for the purchase cost or prestige threshold.
    #[error("Insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Currency the command needed.
        required: f64,
        /// Currency available at the time of the command.
        available: f64,
    },

    /// Purchase quantity resolved to zero.
    #[error("Invalid quantity {requested} for upgrade {upgrade}")]
    InvalidQuantity {
        /// Upgrade the purchase targeted.
        upgrade: UpgradeId,
        /// Quantity that was requested.
        requested: u32,
    },

    /// Purchase named an upgrade id outside the catalog.
    #[error("Unknown upgrade id {0}")]
    UnknownUpgrade(UpgradeId),
}

impl Rejection {
    /// Stable snake_case tag for protocol output and logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InvalidQuantity { .. } | Self::UnknownUpgrade(_) => "invalid_quantity",
        }
    }
}
