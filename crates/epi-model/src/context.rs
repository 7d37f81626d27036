//! Read-only view passed to every algorithm call.

use epi_core::{CellId, CompartmentId, DiseaseState, ReactionId};

use crate::{ModelProperties, MovementModel, Propensity};

/// Everything an [`Algorithm`][crate::Algorithm] may read while advancing one
/// cell.
///
/// Built by the tick engine once per cell update.  `cells` is the engine's
/// current (read) buffer, which is never mutated during a tick, so spatial
/// propensities can look at neighbouring cells without synchronisation.
///
/// # Lifetimes
///
/// All borrows live for one cell update; the engine never allows mutable
/// access to the read buffer while a `StepContext` is live.
pub struct StepContext<'a> {
    /// The cell being advanced.
    pub cell: CellId,

    /// The caller's time step for this tick.
    pub dt: f64,

    pub model: &'a ModelProperties,

    pub movement: &'a dyn MovementModel,

    /// Point-in-time states of every cell (the read buffer).
    pub cells: &'a [DiseaseState],
}

impl<'a> StepContext<'a> {
    #[inline]
    pub fn new(
        cell:     CellId,
        dt:       f64,
        model:    &'a ModelProperties,
        movement: &'a dyn MovementModel,
        cells:    &'a [DiseaseState],
    ) -> Self {
        Self { cell, dt, model, movement, cells }
    }

    /// Exact propensity of reaction `r` in `state`.
    pub fn propensity(&self, r: ReactionId, state: &DiseaseState) -> f64 {
        let propensity = self.model.reaction(r).propensity;
        let k = self.model.parameter(propensity.rate());
        match propensity {
            Propensity::FirstOrder { a, .. } => k * state[a],
            Propensity::FrequencyDependent { a, b, .. } => {
                let n = state.total();
                if n > 0.0 { k * state[a] * state[b] / n } else { 0.0 }
            }
            Propensity::Spatial { a, b, .. } => k * state[a] * self.coupling(b),
            Propensity::MassAction { a, b, .. } => k * state[a] * state[b],
        }
    }

    /// Lower and upper bounds of reaction `r`'s propensity over every state
    /// inside the box `[lower, upper]`.
    ///
    /// All catalogue propensities are monotone non-decreasing in their
    /// operands, so the bounds come from the box corners; the population
    /// divisor of frequency-dependent terms takes the opposite corner.
    pub fn propensity_bounds(
        &self,
        r:     ReactionId,
        lower: &DiseaseState,
        upper: &DiseaseState,
    ) -> (f64, f64) {
        let propensity = self.model.reaction(r).propensity;
        let k = self.model.parameter(propensity.rate());
        match propensity {
            Propensity::FirstOrder { a, .. } => (k * lower[a], k * upper[a]),
            Propensity::FrequencyDependent { a, b, .. } => {
                let (n_lo, n_hi) = (lower.total(), upper.total());
                let lo = if n_hi > 0.0 { k * lower[a] * lower[b] / n_hi } else { 0.0 };
                let hi = if n_lo > 0.0 { k * upper[a] * upper[b] / n_lo } else { 0.0 };
                (lo, hi)
            }
            Propensity::Spatial { a, b, .. } => {
                let coupling = self.coupling(b);
                (k * lower[a] * coupling, k * upper[a] * coupling)
            }
            Propensity::MassAction { a, b, .. } => {
                (k * lower[a] * lower[b], k * upper[a] * upper[b])
            }
        }
    }

    /// Fill `out[r]` with every reaction's exact propensity and return the sum.
    pub fn propensities(&self, state: &DiseaseState, out: &mut [f64]) -> f64 {
        let mut total = 0.0;
        for (r, slot) in out.iter_mut().enumerate() {
            *slot = self.propensity(ReactionId(r as u32), state);
            total += *slot;
        }
        total
    }

    /// `Σⱼ w(cell, j) · xⱼ[b] / Nⱼ` over every other cell `j`.
    fn coupling(&self, b: CompartmentId) -> f64 {
        if !self.movement.is_coupled() {
            return 0.0;
        }
        self.cells
            .iter()
            .enumerate()
            .filter(|&(j, _)| j != self.cell.index())
            .map(|(j, other)| {
                let w = self.movement.connectivity(self.cell, CellId(j as u32));
                let n = other.total();
                if w > 0.0 && n > 0.0 { w * other[b] / n } else { 0.0 }
            })
            .sum()
    }
}
