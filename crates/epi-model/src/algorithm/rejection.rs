//! Rejection-based stochastic simulation over cached propensity bounds.
//!
//! # Algorithm
//!
//! Each cell keeps a box `[state_mins, state_maxs]` around its live state and,
//! for every reaction, the propensity bounds over that box.  An event is
//! drawn as follows:
//!
//! 1. Pick a candidate reaction proportionally to the *upper* bounds.
//! 2. Accept cheaply if `r2 ≤ min / max`; otherwise evaluate the exact
//!    propensity and accept if `r2 ≤ exact / max`; otherwise redraw.
//! 3. The waiting time is `-ln(Π r3) / Σ max` over every trial of the draw.
//!
//! Exact propensities are only evaluated for the rare "squeeze" misses, and
//! bounds are only regenerated when the live state leaves its box, which is
//! what makes the method cheap for many-cell spatial models.
//!
//! # References
//!
//! - Thanh, Priami, Zunino. "Efficient rejection-based simulation of
//!   biochemical reactions with stochastic noise and delays."
//!   *J. Chem. Phys.* 141, 134116 (2014). doi:10.1063/1.4896985

use epi_core::{CellId, CompartmentId, DiseaseState, ReactionId, SimRng};
use parking_lot::Mutex;

use super::{Algorithm, select_reaction};
use crate::{AlgorithmError, AlgorithmResult, ModelProperties, StepContext};

/// Default fractional margin of the state box around the live value.
pub const DEFAULT_RANGE_PERCENTAGE: f64 = 0.15;

// ── Per-cell cache ────────────────────────────────────────────────────────────

/// Bound cache for one cell.
///
/// Whenever the cache is valid:
/// `state_mins[c] ≤ live[c] ≤ state_maxs[c]` for every compartment and
/// `propensity_mins[r] ≤ exact(r) ≤ propensity_maxs[r]` for every reaction.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectionCellData {
    pub state_mins:         DiseaseState,
    pub state_maxs:         DiseaseState,
    pub propensity_mins:    Vec<f64>,
    pub propensity_maxs:    Vec<f64>,
    /// Cached `Σ propensity_maxs`.
    pub propensity_sum_max: f64,
    /// Reactions whose bounds must be recomputed in the current pass.
    stale: Vec<bool>,
}

impl RejectionCellData {
    /// Zero-width bounds: the first pass regenerates every non-empty
    /// compartment.
    fn new(compartments: usize, reactions: usize) -> Self {
        Self {
            state_mins:         DiseaseState::new(compartments),
            state_maxs:         DiseaseState::new(compartments),
            propensity_mins:    vec![0.0; reactions],
            propensity_maxs:    vec![0.0; reactions],
            propensity_sum_max: 0.0,
            stale:              vec![false; reactions],
        }
    }
}

// ── RejectionAlgorithm ────────────────────────────────────────────────────────

/// Rejection-sampling variant (see module docs).
///
/// Advances a cell over the whole tick, drawing events until the next one
/// would fall past `t + dt`.
pub struct RejectionAlgorithm {
    range_percentage: f64,
    /// One cache per cell.  Workers own disjoint cells, so these locks are
    /// never contended.
    cells: Vec<Mutex<RejectionCellData>>,
    /// Compartment → reactions whose stoichiometry touches it or whose
    /// propensity reads it.
    dependents: Vec<Vec<ReactionId>>,
    /// Reactions whose propensity reads neighbouring cells; refreshed on
    /// every pass since the dependency graph cannot see remote changes.
    nonlocal: Vec<ReactionId>,
}

impl Default for RejectionAlgorithm {
    fn default() -> Self {
        Self::new()
    }
}

impl RejectionAlgorithm {
    pub fn new() -> Self {
        Self {
            range_percentage: DEFAULT_RANGE_PERCENTAGE,
            cells:            Vec::new(),
            dependents:       Vec::new(),
            nonlocal:         Vec::new(),
        }
    }

    /// Set the fractional box margin; must lie in `[0, 1)`, checked when the
    /// model is built.
    pub fn with_range_percentage(mut self, range_percentage: f64) -> Self {
        self.range_percentage = range_percentage;
        self
    }

    #[inline]
    pub fn range_percentage(&self) -> f64 {
        self.range_percentage
    }

    /// Reactions that depend on compartment `c`.
    pub fn dependents(&self, c: CompartmentId) -> &[ReactionId] {
        self.dependents.get(c.index()).map_or(&[], Vec::as_slice)
    }

    /// A copy of `cell`'s current cache, for inspection.
    pub fn cell_data(&self, cell: CellId) -> Option<RejectionCellData> {
        self.cells.get(cell.index()).map(|m| m.lock().clone())
    }

    fn cache(&self, cell: CellId) -> AlgorithmResult<&Mutex<RejectionCellData>> {
        self.cells.get(cell.index()).ok_or(AlgorithmError::UnknownCell(cell))
    }

    /// Re-box every compartment whose live value left its bounds, then
    /// recompute each affected reaction's bounds once and the cached sum.
    pub(crate) fn maintain_bounds(
        &self,
        ctx:  &StepContext<'_>,
        data: &mut RejectionCellData,
        live: &DiseaseState,
    ) {
        let p = self.range_percentage;
        for (c, reactions) in self.dependents.iter().enumerate() {
            let c = CompartmentId(c as u16);
            let v = live[c];
            if v < data.state_mins[c] || v > data.state_maxs[c] {
                data.state_mins[c] = (1.0 - p) * v;
                data.state_maxs[c] = (1.0 + p) * v;
                for r in reactions {
                    data.stale[r.index()] = true;
                }
            }
        }
        for r in &self.nonlocal {
            data.stale[r.index()] = true;
        }

        for r in ctx.model.reaction_ids() {
            if std::mem::take(&mut data.stale[r.index()]) {
                let (lo, hi) = ctx.propensity_bounds(r, &data.state_mins, &data.state_maxs);
                data.propensity_mins[r.index()] = lo;
                data.propensity_maxs[r.index()] = hi;
            }
        }
        data.propensity_sum_max = data.propensity_maxs.iter().sum();
    }

    /// Draw one accepted reaction and its waiting time.
    ///
    /// `None` when every upper bound is zero: nothing can happen in this cell.
    pub(crate) fn sample_event(
        &self,
        ctx:  &StepContext<'_>,
        data: &RejectionCellData,
        live: &DiseaseState,
        rng:  &mut SimRng,
    ) -> Option<(ReactionId, f64)> {
        let sum_max = data.propensity_sum_max;
        if sum_max <= 0.0 {
            return None;
        }

        let mut log_u = 0.0;
        loop {
            let r1 = rng.open01();
            let r2 = rng.open01();
            let r3 = rng.open01();
            log_u += r3.ln();

            let candidate = select_reaction(&data.propensity_maxs, r1 * sum_max)?;
            let max = data.propensity_maxs[candidate.index()];
            let accepted = r2 <= data.propensity_mins[candidate.index()] / max
                || r2 <= ctx.propensity(candidate, live) / max;
            if accepted {
                return Some((candidate, -log_u / sum_max));
            }
        }
    }
}

impl Algorithm for RejectionAlgorithm {
    fn name(&self) -> &'static str {
        "rejection"
    }

    fn on_model_create(&mut self, model: &ModelProperties) -> AlgorithmResult<()> {
        let p = self.range_percentage;
        if !(0.0..1.0).contains(&p) {
            return Err(AlgorithmError::Config(format!(
                "range_percentage must lie in [0, 1), got {p}"
            )));
        }

        let (compartments, reactions) = (model.compartment_count(), model.reaction_count());
        self.cells = (0..model.cell_count())
            .map(|_| Mutex::new(RejectionCellData::new(compartments, reactions)))
            .collect();

        self.dependents = (0..compartments)
            .map(|c| {
                let c = CompartmentId(c as u16);
                model
                    .reaction_ids()
                    .filter(|&r| {
                        let reaction = model.reaction(r);
                        reaction.stoichiometry.touches(c) || reaction.propensity.reads(c)
                    })
                    .collect()
            })
            .collect();

        self.nonlocal = model
            .reaction_ids()
            .filter(|&r| !model.reaction(r).propensity.is_local())
            .collect();

        log::debug!(
            "rejection algorithm attached: {} cells, range ±{:.0}%, {} non-local reactions",
            self.cells.len(),
            p * 100.0,
            self.nonlocal.len(),
        );
        Ok(())
    }

    fn perform_step(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        rng:   &mut SimRng,
    ) -> AlgorithmResult<()> {
        write.set_to(read);
        let mut data = self.cache(ctx.cell)?.lock();
        let mut elapsed = 0.0;

        loop {
            self.maintain_bounds(ctx, &mut data, write);
            let Some((r, tau)) = self.sample_event(ctx, &data, write, rng) else {
                break;
            };
            if elapsed + tau > ctx.dt {
                break;
            }
            elapsed += tau;
            ctx.model.reaction(r).stoichiometry.try_fire(write);
        }

        write.time_simulated = read.time_simulated + ctx.dt;
        Ok(())
    }

    /// Exact waiting-time sample `-ln(r) / a₀` at the live state.
    fn next_reaction_time(
        &self,
        ctx:  &StepContext<'_>,
        read: &DiseaseState,
        rng:  &mut SimRng,
    ) -> AlgorithmResult<f64> {
        let mut propensities = vec![0.0; ctx.model.reaction_count()];
        let total = ctx.propensities(read, &mut propensities);
        Ok(rng.exp_time(total))
    }

    fn perform_single_reaction(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        rng:   &mut SimRng,
    ) -> AlgorithmResult<()> {
        write.set_to(read);
        let mut data = self.cache(ctx.cell)?.lock();
        self.maintain_bounds(ctx, &mut data, write);
        if let Some((r, _)) = self.sample_event(ctx, &data, write, rng) {
            ctx.model.reaction(r).stoichiometry.try_fire(write);
        }
        Ok(())
    }
}
