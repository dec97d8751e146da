//! Error types for the simulation harness.

use thiserror::Error;

/// Top-level error type for rasch-sim.
#[derive(Debug, Error)]
pub enum RaschSimError {
    #[error("{what}: expected length {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} must be positive")]
    InvalidCount { what: &'static str },

    #[error("item index {index} out of range for {k_items} items")]
    ItemIndexOutOfRange { index: usize, k_items: usize },

    #[error("duplicate item index {index}")]
    DuplicateItemIndex { index: usize },

    #[error("group {group} is empty")]
    EmptyGroup { group: usize },

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("item {item} has all-identical responses; its difficulty is not estimable")]
    DegenerateItem { item: usize },

    #[error("estimation did not converge within {iterations} iterations")]
    NonConvergence { iterations: usize },
}

/// Result type alias for rasch-sim.
pub type Result<T> = std::result::Result<T, RaschSimError>;
