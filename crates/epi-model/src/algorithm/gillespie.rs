//! Gillespie direct method.

use epi_core::{DiseaseState, SimRng};

use super::{Algorithm, select_reaction};
use crate::{AlgorithmResult, StepContext};

/// Exact stochastic simulation (Gillespie 1977, direct method).
///
/// Each tick fires reactions until the next sampled event would fall past
/// `t + dt`; that event is discarded (the process is memoryless) and the
/// cell's time is set to `t + dt`.
#[derive(Copy, Clone, Debug, Default)]
pub struct Gillespie;

impl Algorithm for Gillespie {
    fn name(&self) -> &'static str {
        "gillespie"
    }

    fn perform_step(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        rng:   &mut SimRng,
    ) -> AlgorithmResult<()> {
        write.set_to(read);
        let mut propensities = vec![0.0; ctx.model.reaction_count()];
        let mut elapsed = 0.0;

        loop {
            let total = ctx.propensities(write, &mut propensities);
            let tau = rng.exp_time(total);
            if elapsed + tau > ctx.dt {
                break;
            }
            elapsed += tau;
            if let Some(r) = select_reaction(&propensities, rng.open01() * total) {
                ctx.model.reaction(r).stoichiometry.try_fire(write);
            }
        }

        write.time_simulated = read.time_simulated + ctx.dt;
        Ok(())
    }

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
        let mut propensities = vec![0.0; ctx.model.reaction_count()];
        let total = ctx.propensities(read, &mut propensities);
        if let Some(r) = select_reaction(&propensities, rng.open01() * total) {
            ctx.model.reaction(r).stoichiometry.try_fire(write);
        }
        Ok(())
    }
}
