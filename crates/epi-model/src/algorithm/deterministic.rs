//! Deterministic mean-field stepping.

use epi_core::{DiseaseState, SimRng};

use super::Algorithm;
use crate::{AlgorithmError, AlgorithmResult, ModelProperties, StepContext};

/// Explicit Euler integration of the mean-field ODE
/// `dx/dt = Σ_r a_r(x) · ν_r`, with `substeps` Euler steps per tick.
///
/// Each flux is clamped to its source population so compartments stay
/// non-negative at large step sizes.  Populations become fractional.
#[derive(Copy, Clone, Debug)]
pub struct Deterministic {
    substeps: usize,
}

impl Default for Deterministic {
    fn default() -> Self {
        Self { substeps: 10 }
    }
}

impl Deterministic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_substeps(mut self, substeps: usize) -> Self {
        self.substeps = substeps;
        self
    }
}

impl Algorithm for Deterministic {
    fn name(&self) -> &'static str {
        "deterministic"
    }

    fn on_model_create(&mut self, _model: &ModelProperties) -> AlgorithmResult<()> {
        if self.substeps == 0 {
            return Err(AlgorithmError::Config("substeps must be at least 1".into()));
        }
        Ok(())
    }

    fn perform_step(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        _rng:  &mut SimRng,
    ) -> AlgorithmResult<()> {
        write.set_to(read);
        let h = ctx.dt / self.substeps as f64;
        let mut propensities = vec![0.0; ctx.model.reaction_count()];

        for _ in 0..self.substeps {
            ctx.propensities(write, &mut propensities);
            for (reaction, &a) in ctx.model.reactions().iter().zip(&propensities) {
                let s = reaction.stoichiometry;
                let available = s.source.map_or(f64::INFINITY, |c| write[c].max(0.0));
                s.apply(write, (a * h).min(available));
            }
        }

        write.time_simulated = read.time_simulated + ctx.dt;
        Ok(())
    }
}
