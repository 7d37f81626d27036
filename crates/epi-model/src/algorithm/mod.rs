//! The `Algorithm` trait: the per-cell update strategy of a model.
//!
//! | Variant                | Kind                                              |
//! |------------------------|---------------------------------------------------|
//! | [`Gillespie`]          | exact stochastic simulation (direct method)       |
//! | [`TauLeaping`]         | approximate stochastic, Poisson leaps             |
//! | [`Deterministic`]      | mean-field ODE, explicit Euler                    |
//! | [`RejectionAlgorithm`] | exact-in-distribution rejection sampling over cached propensity bounds |

mod deterministic;
mod gillespie;
mod rejection;
mod tau_leaping;

pub use deterministic::Deterministic;
pub use gillespie::Gillespie;
pub use rejection::{DEFAULT_RANGE_PERCENTAGE, RejectionAlgorithm, RejectionCellData};
pub use tau_leaping::TauLeaping;

use epi_core::{DiseaseState, ReactionId, SimRng};

use crate::{AlgorithmError, AlgorithmResult, ModelProperties, StepContext};

/// Pluggable reaction-kinetics algorithm.
///
/// One value is attached to a model at build time (which calls
/// [`on_model_create`][Self::on_model_create]) and is then shared by every
/// worker thread.
///
/// # Contract for `perform_step`
///
/// `write` must end up holding the complete next state of the cell:
/// compartment values after all reactions fired during `(t, t + ctx.dt]` and
/// `time_simulated = read.time_simulated + ctx.dt`.  `read` is an immutable
/// copy of the cell's current state.
///
/// # Thread safety
///
/// Workers call these methods concurrently for disjoint cells, so
/// implementations must be `Send + Sync`.  Per-cell mutable data must be
/// keyed by `ctx.cell` and guarded (see [`RejectionAlgorithm`]).
pub trait Algorithm: Send + Sync + 'static {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// One-time setup when the algorithm is attached to a model.
    fn on_model_create(&mut self, _model: &ModelProperties) -> AlgorithmResult<()> {
        Ok(())
    }

    /// Advance one cell by `ctx.dt`.
    fn perform_step(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        rng:   &mut SimRng,
    ) -> AlgorithmResult<()>;

    /// Sample the waiting time until the cell's next reaction
    /// (`f64::INFINITY` if nothing can happen).
    ///
    /// Used by [`Schedule::GlobalNextReaction`][crate::Schedule::GlobalNextReaction].
    fn next_reaction_time(
        &self,
        _ctx:  &StepContext<'_>,
        _read: &DiseaseState,
        _rng:  &mut SimRng,
    ) -> AlgorithmResult<f64> {
        Err(AlgorithmError::Unsupported {
            algorithm: self.name(),
            operation: "next_reaction_time",
        })
    }

    /// Fire exactly one reaction in the cell.  `write` receives the new
    /// compartment values; the caller owns the time bookkeeping.
    fn perform_single_reaction(
        &self,
        _ctx:   &StepContext<'_>,
        _read:  &DiseaseState,
        _write: &mut DiseaseState,
        _rng:   &mut SimRng,
    ) -> AlgorithmResult<()> {
        Err(AlgorithmError::Unsupported {
            algorithm: self.name(),
            operation: "perform_single_reaction",
        })
    }
}

/// Index of the first weight whose running sum exceeds `target`.
///
/// Falls back to the last positive weight when rounding leaves `target` at
/// or above the total; `None` if every weight is zero.
pub(crate) fn select_reaction(weights: &[f64], target: f64) -> Option<ReactionId> {
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (r, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        cumulative += w;
        last_positive = Some(r);
        if cumulative > target {
            return Some(ReactionId(r as u32));
        }
    }
    last_positive.map(|r| ReactionId(r as u32))
}
