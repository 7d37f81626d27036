use epi_core::EpiError;
use epi_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The operation is only allowed between ticks.
    #[error("`{0}` is not allowed while a tick is in flight")]
    TickInProgress(&'static str),

    #[error("worker count must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("time step {0} is not finite and positive")]
    InvalidTimeStep(f64),

    #[error("{what} length {got} does not match cell count {expected}")]
    CellCountMismatch {
        expected: usize,
        got:      usize,
        what:     &'static str,
    },

    #[error("cell {cell} has {got} compartments, the model has {expected}")]
    CompartmentMismatch {
        cell:     usize,
        expected: usize,
        got:      usize,
    },

    #[error("cell index {cell} out of range for {count} cells")]
    CellOutOfRange { cell: usize, count: usize },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] EpiError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type EngineResult<T> = Result<T, EngineError>;
