//! Framework error type.
//!
//! Sub-crates define their own error enums and wrap `EpiError` as one
//! variant via `#[from]`.

use thiserror::Error;

use crate::CompartmentId;

/// The top-level error type for `epi-core` and a common base for sub-crates.
#[derive(Debug, Error)]
pub enum EpiError {
    #[error("compartment {index} out of range for a state with {count} compartments")]
    CompartmentOutOfRange {
        index: CompartmentId,
        count: usize,
    },

    #[error("state length {got} does not match compartment count {expected}")]
    StateLengthMismatch { expected: usize, got: usize },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Shorthand result type for all `epi-*` crates.
pub type EpiResult<T> = Result<T, EpiError>;
