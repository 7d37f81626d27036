//! Per-cell disease state.
//!
//! A `DiseaseState` is the unit the tick engine reads and writes: one
//! population value per compartment plus the simulated time the cell has
//! reached.  Values are `f64` so the same type serves the stochastic
//! variants (whole individuals) and the deterministic ODE variant
//! (fractional populations).

use std::fmt;
use std::ops::{Index, IndexMut};

use crate::{CompartmentId, EpiError, EpiResult};

/// Compartment populations and elapsed simulated time for one cell.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DiseaseState {
    values: Vec<f64>,
    /// Simulated time this cell has been advanced to.
    pub time_simulated: f64,
}

impl DiseaseState {
    /// An all-zero state with `compartments` entries at time 0.
    pub fn new(compartments: usize) -> Self {
        Self {
            values: vec![0.0; compartments],
            time_simulated: 0.0,
        }
    }

    /// Build a state at time 0 from explicit compartment values.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values, time_simulated: 0.0 }
    }

    #[inline]
    pub fn compartment_count(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Checked read of one compartment.
    pub fn get(&self, c: CompartmentId) -> EpiResult<f64> {
        self.values
            .get(c.index())
            .copied()
            .ok_or(EpiError::CompartmentOutOfRange { index: c, count: self.values.len() })
    }

    /// Checked write of one compartment.
    pub fn set(&mut self, c: CompartmentId, value: f64) -> EpiResult<()> {
        let count = self.values.len();
        match self.values.get_mut(c.index()) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(EpiError::CompartmentOutOfRange { index: c, count }),
        }
    }

    /// Total population of the cell (sum over all compartments).
    #[inline]
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Copy-assign every compartment and the simulated time from `other`,
    /// reusing this state's allocation.
    #[inline]
    pub fn set_to(&mut self, other: &DiseaseState) {
        self.values.clone_from(&other.values);
        self.time_simulated = other.time_simulated;
    }

    /// Overwrite the compartment values from a slice of matching length.
    pub fn assign(&mut self, values: &[f64]) -> EpiResult<()> {
        if values.len() != self.values.len() {
            return Err(EpiError::StateLengthMismatch {
                expected: self.values.len(),
                got:      values.len(),
            });
        }
        self.values.copy_from_slice(values);
        Ok(())
    }
}

impl Index<CompartmentId> for DiseaseState {
    type Output = f64;

    #[inline]
    fn index(&self, c: CompartmentId) -> &f64 {
        &self.values[c.index()]
    }
}

impl IndexMut<CompartmentId> for DiseaseState {
    #[inline]
    fn index_mut(&mut self, c: CompartmentId) -> &mut f64 {
        &mut self.values[c.index()]
    }
}

/// Textual dump: the simulated time followed by one line per compartment.
impl fmt::Display for DiseaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t = {:.4}", self.time_simulated)?;
        for (i, v) in self.values.iter().enumerate() {
            write!(f, "\n  [{i}] {v}")?;
        }
        Ok(())
    }
}
