//! Error types for the battle simulation.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for all battle simulation errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// Grid constructed with a non-positive cell size, width or height.
    #[error("Invalid grid dimensions: cell size {cell_size}, width {width}, height {height}")]
    InvalidGridDimensions {
        /// Requested cell size.
        cell_size: f64,
        /// Requested battlefield width.
        width: f64,
        /// Requested battlefield height.
        height: f64,
    },

    /// Invalid dot identifier.
    #[error("Dot not found: {0}")]
    DotNotFound(u64),

    /// Invalid squad identifier.
    #[error("Squad not found: {0}")]
    SquadNotFound(u64),

    /// Slot index outside the squad's slots.
    #[error("Squad {squad} has no slot {slot}")]
    SlotNotFound {
        /// Squad that was addressed.
        squad: u64,
        /// Requested slot index.
        slot: usize,
    },

    /// Invalid building identifier.
    #[error("Building not found: {0}")]
    BuildingNotFound(u64),

    /// Invalid team identifier.
    #[error("Team not found: {0}")]
    TeamNotFound(u32),

    /// Internal state desynchronized from reality. This is a defect, never
    /// a recoverable runtime condition; the current tick is aborted.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration rejected or unparseable.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Snapshot (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}
