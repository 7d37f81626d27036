use epi_core::{CellId, EpiError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model needs at least one {0}")]
    Empty(&'static str),

    #[error("invalid stoichiometry ({source_raw}, {destination_raw}): use -1 for \"no compartment\"")]
    InvalidStoichiometry {
        source_raw:      i32,
        destination_raw: i32,
    },

    #[error("invalid reaction function details {details:?}: {reason}")]
    InvalidReactionFunction {
        details: Vec<i32>,
        reason:  &'static str,
    },

    #[error("reaction {reaction} references compartment {index}, but the model has {count}")]
    CompartmentOutOfRange {
        reaction: usize,
        index:    usize,
        count:    usize,
    },

    #[error("reaction {reaction} references parameter {index}, but the model has {count}")]
    ParameterOutOfRange {
        reaction: usize,
        index:    usize,
        count:    usize,
    },

    #[error("parameter {index} = {value} is not a finite, non-negative rate")]
    InvalidParameter { index: usize, value: f64 },

    #[error("movement model covers {got} cells but the model has {expected}")]
    MovementCellMismatch { expected: usize, got: usize },

    #[error("cell index {cell} out of range for {count} cells")]
    CellOutOfRange { cell: usize, count: usize },

    #[error("connectivity rate {0} is not finite and non-negative")]
    InvalidConnectivity(f64),

    #[error("algorithm setup failed: {0}")]
    Algorithm(#[from] AlgorithmError),

    #[error(transparent)]
    Core(#[from] EpiError),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by an [`Algorithm`][crate::Algorithm] at setup or dispatch.
#[derive(Debug, Error)]
pub enum AlgorithmError {
    /// The algorithm does not implement the requested operation.  The engine
    /// logs this and leaves the cell unchanged for the tick.
    #[error("algorithm `{algorithm}` does not support `{operation}`")]
    Unsupported {
        algorithm: &'static str,
        operation: &'static str,
    },

    #[error("algorithm configuration error: {0}")]
    Config(String),

    /// Per-cell data was requested for a cell the algorithm was not set up for.
    #[error("{0} has no per-cell data (was on_model_create called for this cell count?)")]
    UnknownCell(CellId),

    #[error("numerical error: {0}")]
    Numerical(String),
}

pub type AlgorithmResult<T> = Result<T, AlgorithmError>;
