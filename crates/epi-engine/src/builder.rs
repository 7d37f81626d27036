//! Fluent builder for constructing a [`TickEngine`].

use std::sync::Arc;

use epi_core::{DiseaseState, EngineConfig, SimRng};
use epi_model::ModelDefinition;

use crate::{EngineError, EngineResult, TickEngine, TickObserver};

/// Fluent builder for [`TickEngine`].
///
/// # Optional inputs (have defaults)
///
/// | Method                | Default                                   |
/// |-----------------------|-------------------------------------------|
/// | `.config(c)`          | `EngineConfig::default()`                 |
/// | `.worker_count(n)`    | available parallelism                     |
/// | `.seed(s)`            | `42`                                      |
/// | `.initial_cells(v)`   | every cell all-zero at time 0             |
/// | `.observer(o)`        | none                                      |
///
/// # Example
///
/// ```rust,ignore
/// let mut engine = TickEngineBuilder::new(model)
///     .worker_count(4)
///     .initial_cells(cells)
///     .build()?;
/// engine.tick(0.3)?;
/// ```
pub struct TickEngineBuilder {
    model:     ModelDefinition,
    config:    EngineConfig,
    cells:     Option<Vec<DiseaseState>>,
    observers: Vec<Arc<dyn TickObserver>>,
}

impl TickEngineBuilder {
    pub fn new(model: ModelDefinition) -> Self {
        Self {
            model,
            config:    EngineConfig::default(),
            cells:     None,
            observers: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker_count = Some(count);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Supply the initial state of every cell (must be length `cell_count`,
    /// each with the model's compartment count).
    pub fn initial_cells(mut self, cells: Vec<DiseaseState>) -> Self {
        self.cells = Some(cells);
        self
    }

    /// Register an observer before the pool starts, so it also sees the
    /// initial `on_worker_count_changed`.
    pub fn observer(mut self, observer: Arc<dyn TickObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Validate inputs, allocate both buffers and spawn the worker pool.
    pub fn build(self) -> EngineResult<TickEngine> {
        let worker_count = self.config.resolved_worker_count()?;
        let cell_count = self.model.cell_count();
        let compartments = self.model.properties().compartment_count();

        let cells = match self.cells {
            Some(cells) => {
                if cells.len() != cell_count {
                    return Err(EngineError::CellCountMismatch {
                        expected: cell_count,
                        got:      cells.len(),
                        what:     "initial cells",
                    });
                }
                if let Some((cell, bad)) =
                    cells.iter().enumerate().find(|(_, s)| s.compartment_count() != compartments)
                {
                    return Err(EngineError::CompartmentMismatch {
                        cell,
                        expected: compartments,
                        got:      bad.compartment_count(),
                    });
                }
                cells
            }
            None => vec![self.model.properties().empty_state(); cell_count],
        };

        log::debug!(
            "building tick engine: {cell_count} cells, {worker_count} workers, seed {}",
            self.config.seed
        );

        let mut engine = TickEngine::new(self.model, cells, SimRng::new(self.config.seed));
        for o in self.observers {
            engine.add_observer(o);
        }
        engine.set_worker_count(worker_count)?;
        Ok(engine)
    }
}
