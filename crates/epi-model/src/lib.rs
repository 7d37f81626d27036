//! `epi-model`: model definition and reaction-kinetics algorithms.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                        |
//! |---------------|-----------------------------------------------------------------|
//! | [`reaction`]  | `Stoichiometry`, `Propensity`, `Reaction`                       |
//! | [`movement`]  | `MovementModel` trait, `NoMovement`, `AllConnected`             |
//! | [`model`]     | `ModelProperties`, `ModelDefinition`, `ModelBuilder`, `Schedule` |
//! | [`context`]   | `StepContext<'a>`, the read-only view for algorithm calls |
//! | [`algorithm`] | `Algorithm` trait + `Gillespie`, `TauLeaping`, `Deterministic`, `RejectionAlgorithm` |
//! | [`error`]     | `ModelError`, `AlgorithmError` and their result aliases          |
//!
//! # Design notes
//!
//! A model is built once, before the engine starts, and is logically
//! immutable afterwards.  The algorithm is chosen once per model (a trait
//! object), never re-selected per cell.  The only state that mutates across
//! ticks is the rejection algorithm's per-cell bound cache, which lives
//! behind one lock per cell; since worker partitions are disjoint those locks
//! are never contended.

pub mod algorithm;
pub mod context;
pub mod error;
pub mod model;
pub mod movement;
pub mod reaction;


pub use algorithm::{Algorithm, Deterministic, Gillespie, RejectionAlgorithm, RejectionCellData, TauLeaping};
pub use context::StepContext;
pub use error::{AlgorithmError, AlgorithmResult, ModelError, ModelResult};
pub use model::{ModelBuilder, ModelDefinition, ModelProperties, Schedule};
pub use movement::{AllConnected, MovementModel, NoMovement};
pub use reaction::{Propensity, Reaction, Stoichiometry};
