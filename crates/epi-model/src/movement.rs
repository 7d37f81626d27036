//! Movement models: pairwise connectivity between cells.
//!
//! The core only needs the rate lookup; spatial propensities
//! ([`Propensity::Spatial`][crate::Propensity::Spatial]) fold it into the
//! coupling term of a cell.

use epi_core::CellId;

use crate::{ModelError, ModelResult};

/// Inter-cell connectivity used by spatial propensity functions.
///
/// Implementations are shared by every worker thread, so they must be
/// `Send + Sync` and must not mutate during a tick.
pub trait MovementModel: Send + Sync + 'static {
    /// Migration/contact rate from `a` to `b`.  Zero means "not connected".
    fn connectivity(&self, a: CellId, b: CellId) -> f64;

    /// Number of cells the model was built for, if it is bounded.
    ///
    /// Used to validate the model against the model's cell count; `None`
    /// means "any cell count".
    fn cell_count(&self) -> Option<usize> {
        None
    }

    /// `false` if no pair of cells is ever connected, letting spatial
    /// propensities skip the neighbour scan.
    fn is_coupled(&self) -> bool {
        true
    }
}

/// No coupling: every cell evolves independently.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoMovement;

impl MovementModel for NoMovement {
    #[inline]
    fn connectivity(&self, _a: CellId, _b: CellId) -> f64 {
        0.0
    }

    fn is_coupled(&self) -> bool {
        false
    }
}

/// Dense, fully connectable movement model with a per-pair rate.
///
/// All pairs start disconnected (rate 0).  Rates are symmetric:
/// [`set_connectivity`][Self::set_connectivity] writes both directions.
#[derive(Clone, Debug)]
pub struct AllConnected {
    cells: usize,
    /// Row-major `cells × cells` rate matrix.
    rates: Vec<f64>,
}

impl AllConnected {
    pub fn new(cells: usize) -> Self {
        Self { cells, rates: vec![0.0; cells * cells] }
    }

    /// A ring: cell `i` connected to `i + 1 (mod cells)` at `rate`.
    pub fn ring(cells: usize, rate: f64) -> ModelResult<Self> {
        let mut model = Self::new(cells);
        if cells > 1 {
            for i in 0..cells {
                model.set_connectivity(cell_id(i)?, cell_id((i + 1) % cells)?, rate)?;
            }
        }
        Ok(model)
    }

    /// Set the rate between `a` and `b` in both directions.
    pub fn set_connectivity(&mut self, a: CellId, b: CellId, rate: f64) -> ModelResult<()> {
        for c in [a, b] {
            if c.index() >= self.cells {
                return Err(ModelError::CellOutOfRange { cell: c.index(), count: self.cells });
            }
        }
        if !rate.is_finite() || rate < 0.0 {
            return Err(ModelError::InvalidConnectivity(rate));
        }
        self.rates[a.index() * self.cells + b.index()] = rate;
        self.rates[b.index() * self.cells + a.index()] = rate;
        Ok(())
    }
}

impl MovementModel for AllConnected {
    #[inline]
    fn connectivity(&self, a: CellId, b: CellId) -> f64 {
        if a.index() >= self.cells || b.index() >= self.cells {
            return 0.0;
        }
        self.rates[a.index() * self.cells + b.index()]
    }

    fn cell_count(&self) -> Option<usize> {
        Some(self.cells)
    }
}

fn cell_id(i: usize) -> ModelResult<CellId> {
    CellId::try_from(i).map_err(|_| ModelError::CellOutOfRange { cell: i, count: u32::MAX as usize })
}
