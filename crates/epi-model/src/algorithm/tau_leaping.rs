//! Fixed-step tau-leaping.

use epi_core::{DiseaseState, SimRng};
use rand_distr::{Distribution, Poisson};

use super::Algorithm;
use crate::{AlgorithmError, AlgorithmResult, ModelProperties, StepContext};

/// Approximate stochastic simulation by Poisson leaps.
///
/// The tick is split into `ceil(dt / max_leap)` equal leaps (one leap when
/// `max_leap` is unset).  In each leap reaction `r` fires
/// `Poisson(a_r · h)` times, clamped to what its source compartment holds so
/// populations never go negative.
#[derive(Copy, Clone, Debug, Default)]
pub struct TauLeaping {
    max_leap: Option<f64>,
}

impl TauLeaping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the leap length; validated when the model is built.
    pub fn with_max_leap(mut self, max_leap: f64) -> Self {
        self.max_leap = Some(max_leap);
        self
    }

    fn leap_count(&self, dt: f64) -> usize {
        match self.max_leap {
            Some(h) => (dt / h).ceil().max(1.0) as usize,
            None => 1,
        }
    }
}

impl Algorithm for TauLeaping {
    fn name(&self) -> &'static str {
        "tau-leaping"
    }

    fn on_model_create(&mut self, _model: &ModelProperties) -> AlgorithmResult<()> {
        match self.max_leap {
            Some(h) if !(h.is_finite() && h > 0.0) => {
                Err(AlgorithmError::Config(format!("max_leap must be positive, got {h}")))
            }
            _ => Ok(()),
        }
    }

    fn perform_step(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        rng:   &mut SimRng,
    ) -> AlgorithmResult<()> {
        write.set_to(read);
        let leaps = self.leap_count(ctx.dt);
        let h = ctx.dt / leaps as f64;
        let mut propensities = vec![0.0; ctx.model.reaction_count()];

        for _ in 0..leaps {
            if ctx.propensities(write, &mut propensities) <= 0.0 {
                break;
            }
            for (reaction, &a) in ctx.model.reactions().iter().zip(&propensities) {
                let mean = a * h;
                if mean <= 0.0 {
                    continue;
                }
                let poisson = Poisson::new(mean)
                    .map_err(|e| AlgorithmError::Numerical(format!("Poisson({mean}): {e}")))?;
                let firings: f64 = poisson.sample(rng.inner());
                let firings = firings.min(reaction.stoichiometry.max_firings(write));
                reaction.stoichiometry.apply(write, firings);
            }
        }

        write.time_simulated = read.time_simulated + ctx.dt;
        Ok(())
    }
}
