//! Reactions: which compartments a reaction moves individuals between, and
//! the propensity function governing how often it fires.

use epi_core::{CompartmentId, DiseaseState, ParamId};

use crate::{ModelError, ModelResult};

// ── Stoichiometry ─────────────────────────────────────────────────────────────

/// The (source, destination) pair a reaction affects.
///
/// One firing moves one individual from `source` to `destination`.  `None`
/// on either side means "no compartment": a `None` source creates an
/// individual, a `None` destination destroys one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stoichiometry {
    pub source:      Option<CompartmentId>,
    pub destination: Option<CompartmentId>,
}

impl Stoichiometry {
    /// A transfer from `source` to `destination`.
    pub fn transfer(source: CompartmentId, destination: CompartmentId) -> Self {
        Self { source: Some(source), destination: Some(destination) }
    }

    /// Parse an integer pair where `-1` stands for "no compartment".
    pub fn from_raw(source: i32, destination: i32) -> ModelResult<Self> {
        let parse = |raw: i32| -> ModelResult<Option<CompartmentId>> {
            match raw {
                -1 => Ok(None),
                n => u16::try_from(n).map(|c| Some(CompartmentId(c))).map_err(|_| {
                    ModelError::InvalidStoichiometry {
                        source_raw:      source,
                        destination_raw: destination,
                    }
                }),
            }
        };
        Ok(Self { source: parse(source)?, destination: parse(destination)? })
    }

    /// `true` if `c` is the source or the destination.
    #[inline]
    pub fn touches(&self, c: CompartmentId) -> bool {
        self.source == Some(c) || self.destination == Some(c)
    }

    /// `true` if firing neither creates nor destroys individuals.
    #[inline]
    pub fn is_conserving(&self) -> bool {
        self.source.is_some() && self.destination.is_some()
    }

    /// How many whole firings the source population can supply
    /// (`f64::INFINITY` for creation reactions).
    #[inline]
    pub fn max_firings(&self, state: &DiseaseState) -> f64 {
        match self.source {
            Some(s) => state[s].max(0.0).floor(),
            None => f64::INFINITY,
        }
    }

    /// Move `amount` individuals (may be fractional for the ODE variant).
    #[inline]
    pub fn apply(&self, state: &mut DiseaseState, amount: f64) {
        if let Some(s) = self.source {
            state[s] -= amount;
        }
        if let Some(d) = self.destination {
            state[d] += amount;
        }
    }

    /// Fire once if the source holds at least one individual.
    ///
    /// Returns `false` (and leaves `state` untouched) otherwise, so counts
    /// never go negative.
    #[inline]
    pub fn try_fire(&self, state: &mut DiseaseState) -> bool {
        if self.max_firings(state) < 1.0 {
            return false;
        }
        self.apply(state, 1.0);
        true
    }
}

// ── Propensity ────────────────────────────────────────────────────────────────

/// Propensity function selector with its operands.
///
/// Built from a reaction-function detail array
/// `[selector, parameter, operands…]`:
///
/// | selector | detail array   | propensity                                   |
/// |----------|----------------|----------------------------------------------|
/// | 0        | `[0, k, a]`    | `p[k]·x[a]`                                  |
/// | 1        | `[1, k, a, b]` | `p[k]·x[a]·x[b] / N` (N = cell population)   |
/// | 2        | `[2, k, a, b]` | `p[k]·x[a]·Σⱼ w(c,j)·xⱼ[b] / Nⱼ`             |
/// | 3        | `[3, k, a, b]` | `p[k]·x[a]·x[b]`                             |
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Propensity {
    /// Linear in one compartment, e.g. recovery `γ·I`.
    FirstOrder { rate: ParamId, a: CompartmentId },
    /// Frequency-dependent contact, e.g. infection `β·S·I / N`.
    FrequencyDependent { rate: ParamId, a: CompartmentId, b: CompartmentId },
    /// Contact with neighbouring cells, weighted by the movement model:
    /// local compartment `a` meets remote compartment `b`.
    Spatial { rate: ParamId, a: CompartmentId, b: CompartmentId },
    /// Density-dependent mass action `k·x[a]·x[b]`.
    MassAction { rate: ParamId, a: CompartmentId, b: CompartmentId },
}

impl Propensity {
    /// Parse a reaction-function detail array.
    pub fn from_details(details: &[i32]) -> ModelResult<Self> {
        let invalid = |reason: &'static str| ModelError::InvalidReactionFunction { details: details.to_vec(), reason };

        let (&selector, rest) = details.split_first().ok_or_else(|| invalid("empty detail array"))?;
        let operands = rest
            .iter()
            .map(|&v| u16::try_from(v).map_err(|_| invalid("negative or oversized operand")))
            .collect::<ModelResult<Vec<u16>>>()?;

        match (selector, operands.as_slice()) {
            (0, &[k, a]) => Ok(Self::FirstOrder { rate: ParamId(k), a: CompartmentId(a) }),
            (1, &[k, a, b]) => Ok(Self::FrequencyDependent {
                rate: ParamId(k),
                a:    CompartmentId(a),
                b:    CompartmentId(b),
            }),
            (2, &[k, a, b]) => Ok(Self::Spatial { rate: ParamId(k), a: CompartmentId(a), b: CompartmentId(b) }),
            (3, &[k, a, b]) => Ok(Self::MassAction { rate: ParamId(k), a: CompartmentId(a), b: CompartmentId(b) }),
            (0..=3, _) => Err(invalid("wrong operand count for selector")),
            _ => Err(invalid("unknown propensity selector")),
        }
    }

    #[inline]
    pub fn rate(&self) -> ParamId {
        match *self {
            Self::FirstOrder { rate, .. }
            | Self::FrequencyDependent { rate, .. }
            | Self::Spatial { rate, .. }
            | Self::MassAction { rate, .. } => rate,
        }
    }

    /// Compartments named as operands (for index validation).
    pub fn operands(&self) -> Vec<CompartmentId> {
        match *self {
            Self::FirstOrder { a, .. } => vec![a],
            Self::FrequencyDependent { a, b, .. }
            | Self::Spatial { a, b, .. }
            | Self::MassAction { a, b, .. } => vec![a, b],
        }
    }

    /// `true` if the value of this cell's compartment `c` influences the
    /// propensity.  Frequency dependence reads every compartment through the
    /// population total.
    pub fn reads(&self, c: CompartmentId) -> bool {
        match *self {
            Self::FirstOrder { a, .. } => a == c,
            Self::FrequencyDependent { .. } => true,
            Self::Spatial { a, .. } => a == c,
            Self::MassAction { a, b, .. } => a == c || b == c,
        }
    }

    /// `false` if the propensity also depends on other cells' states.
    #[inline]
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Spatial { .. })
    }
}

/// One reaction: its stoichiometry and its propensity function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reaction {
    pub stoichiometry: Stoichiometry,
    pub propensity:    Propensity,
}
