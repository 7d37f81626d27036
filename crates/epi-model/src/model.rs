//! Model definition and its fluent builder.

use epi_core::{CellId, DiseaseState, ParamId, ReactionId};

use crate::{
    Algorithm, ModelError, ModelResult, MovementModel, Propensity, Reaction, StepContext,
    Stoichiometry,
};

// ── Schedule ──────────────────────────────────────────────────────────────────

/// How a worker advances its partition each tick.  Chosen once per model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Every cell is advanced independently by `Algorithm::perform_step`.
    #[default]
    PerCell,

    /// The worker finds the cell with the earliest next reaction over its
    /// whole partition, fires exactly one reaction there, and advances every
    /// cell of the partition by that waiting time.
    ///
    /// Only correct when one worker's partition spans the whole spatial
    /// domain (worker count 1).  Running it with more workers is misuse; the
    /// engine warns but does not prevent it.
    GlobalNextReaction,
}

// ── ModelProperties ───────────────────────────────────────────────────────────

/// Immutable numeric description of a model: counts, reactions, rates.
#[derive(Clone, Debug)]
pub struct ModelProperties {
    compartment_count: usize,
    cell_count:        usize,
    reactions:         Vec<Reaction>,
    parameters:        Vec<f64>,
}

impl ModelProperties {
    #[inline]
    pub fn compartment_count(&self) -> usize {
        self.compartment_count
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    #[inline]
    pub fn reaction_count(&self) -> usize {
        self.reactions.len()
    }

    #[inline]
    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    #[inline]
    pub fn reaction(&self, r: ReactionId) -> &Reaction {
        &self.reactions[r.index()]
    }

    #[inline]
    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    #[inline]
    pub fn parameter(&self, p: ParamId) -> f64 {
        self.parameters[p.index()]
    }

    /// An all-zero state sized for this model.
    pub fn empty_state(&self) -> DiseaseState {
        DiseaseState::new(self.compartment_count)
    }

    /// Iterator over every reaction id.
    pub fn reaction_ids(&self) -> impl Iterator<Item = ReactionId> {
        (0..self.reactions.len() as u32).map(ReactionId)
    }
}

// ── ModelDefinition ───────────────────────────────────────────────────────────

/// A fully built model: properties plus the chosen algorithm, movement model
/// and schedule.
///
/// Create via [`ModelBuilder`].  The algorithm has already had
/// `on_model_create` called by the time a `ModelDefinition` exists.
pub struct ModelDefinition {
    properties: ModelProperties,
    algorithm:  Box<dyn Algorithm>,
    movement:   Box<dyn MovementModel>,
    schedule:   Schedule,
}

impl ModelDefinition {
    #[inline]
    pub fn properties(&self) -> &ModelProperties {
        &self.properties
    }

    #[inline]
    pub fn algorithm(&self) -> &dyn Algorithm {
        self.algorithm.as_ref()
    }

    #[inline]
    pub fn movement(&self) -> &dyn MovementModel {
        self.movement.as_ref()
    }

    #[inline]
    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.properties.cell_count
    }

    /// Build the read-only context for advancing `cell` against `cells`.
    #[inline]
    pub fn step_context<'a>(&'a self, cell: CellId, dt: f64, cells: &'a [DiseaseState]) -> StepContext<'a> {
        StepContext::new(cell, dt, &self.properties, self.movement.as_ref(), cells)
    }
}

impl std::fmt::Debug for ModelDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDefinition")
            .field("properties", &self.properties)
            .field("algorithm", &self.algorithm.name())
            .field("schedule", &self.schedule)
            .finish()
    }
}

// ── ModelBuilder ──────────────────────────────────────────────────────────────

/// Fluent builder for [`ModelDefinition`].
///
/// # Example: single-cell SIR
///
/// ```rust,ignore
/// let model = ModelBuilder::new(3, 1)
///     .parameters(&[1.0, 0.1])                 // β, γ
///     .reaction_raw((0, 1), &[1, 0, 1, 0])?    // S → I at β·I·S/N
///     .reaction_raw((1, 2), &[0, 1, 1])?       // I → R at γ·I
///     .build(Gillespie, NoMovement)?;
/// ```
#[derive(Clone, Debug)]
pub struct ModelBuilder {
    compartment_count: usize,
    cell_count:        usize,
    reactions:         Vec<Reaction>,
    parameters:        Vec<f64>,
    schedule:          Schedule,
}

impl ModelBuilder {
    pub fn new(compartment_count: usize, cell_count: usize) -> Self {
        Self {
            compartment_count,
            cell_count,
            reactions:  Vec::new(),
            parameters: Vec::new(),
            schedule:   Schedule::default(),
        }
    }

    /// Append one rate constant.
    pub fn parameter(mut self, value: f64) -> Self {
        self.parameters.push(value);
        self
    }

    /// Append several rate constants in order.
    pub fn parameters(mut self, values: &[f64]) -> Self {
        self.parameters.extend_from_slice(values);
        self
    }

    /// Append a reaction.
    pub fn reaction(mut self, stoichiometry: Stoichiometry, propensity: Propensity) -> Self {
        self.reactions.push(Reaction { stoichiometry, propensity });
        self
    }

    /// Append a reaction from raw integers: a `(source, destination)` pair
    /// (`-1` = no compartment) and a reaction-function detail array.
    pub fn reaction_raw(self, stoichiometry: (i32, i32), details: &[i32]) -> ModelResult<Self> {
        let stoichiometry = Stoichiometry::from_raw(stoichiometry.0, stoichiometry.1)?;
        let propensity = Propensity::from_details(details)?;
        Ok(self.reaction(stoichiometry, propensity))
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Validate the model, attach `algorithm` (calling its
    /// `on_model_create`) and return a ready-to-run [`ModelDefinition`].
    pub fn build<A, M>(self, mut algorithm: A, movement: M) -> ModelResult<ModelDefinition>
    where
        A: Algorithm,
        M: MovementModel,
    {
        if self.compartment_count == 0 {
            return Err(ModelError::Empty("compartment"));
        }
        if self.cell_count == 0 {
            return Err(ModelError::Empty("cell"));
        }
        if self.reactions.is_empty() {
            return Err(ModelError::Empty("reaction"));
        }

        for (index, &value) in self.parameters.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidParameter { index, value });
            }
        }

        for (r, reaction) in self.reactions.iter().enumerate() {
            let s = reaction.stoichiometry;
            let compartments = s
                .source
                .into_iter()
                .chain(s.destination)
                .chain(reaction.propensity.operands());
            for c in compartments {
                if c.index() >= self.compartment_count {
                    return Err(ModelError::CompartmentOutOfRange {
                        reaction: r,
                        index:    c.index(),
                        count:    self.compartment_count,
                    });
                }
            }
            let p = reaction.propensity.rate();
            if p.index() >= self.parameters.len() {
                return Err(ModelError::ParameterOutOfRange {
                    reaction: r,
                    index:    p.index(),
                    count:    self.parameters.len(),
                });
            }
        }

        if let Some(got) = movement.cell_count() {
            if got != self.cell_count {
                return Err(ModelError::MovementCellMismatch { expected: self.cell_count, got });
            }
        }

        let properties = ModelProperties {
            compartment_count: self.compartment_count,
            cell_count:        self.cell_count,
            reactions:         self.reactions,
            parameters:        self.parameters,
        };

        algorithm.on_model_create(&properties)?;
        log::debug!(
            "model built: {} compartments, {} reactions, {} cells, algorithm `{}`, {:?}",
            properties.compartment_count,
            properties.reactions.len(),
            properties.cell_count,
            algorithm.name(),
            self.schedule,
        );

        Ok(ModelDefinition {
            properties,
            algorithm: Box::new(algorithm),
            movement:  Box::new(movement),
            schedule:  self.schedule,
        })
    }
}
