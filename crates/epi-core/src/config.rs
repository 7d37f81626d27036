//! Engine configuration.

use std::num::NonZeroUsize;
use std::thread;

use crate::{EpiError, EpiResult};

/// Top-level tick-engine configuration.
///
/// Typically built by the application crate and handed to the engine
/// builder.  Algorithm-specific knobs (rejection bound margin, tau-leap
/// size, ODE substeps) live on the algorithm values themselves.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Worker thread count.  `None` uses the host's available parallelism.
    pub worker_count: Option<usize>,

    /// Master RNG seed.  The same seed and worker count always produce
    /// identical results.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { worker_count: None, seed: 42 }
    }
}

impl EngineConfig {
    /// Resolve the configured worker count, falling back to
    /// `std::thread::available_parallelism()` (or 1 if that is unknown).
    pub fn resolved_worker_count(&self) -> EpiResult<usize> {
        match self.worker_count {
            Some(0) => Err(EpiError::Config("worker_count must be at least 1".into())),
            Some(n) => Ok(n),
            None => Ok(thread::available_parallelism().map_or(1, NonZeroUsize::get)),
        }
    }
}
