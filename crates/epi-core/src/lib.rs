//! `epi-core`: foundational types for the `rust_epi` simulation engine.
//!
//! This crate is a dependency of every other `epi-*` crate.  It intentionally
//! has no `epi-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `CellId`, `CompartmentId`, `ReactionId`, `ParamId`, `WorkerId` |
//! | [`state`]       | `DiseaseState`: per-cell compartment vector + time   |
//! | [`rng`]         | `SimRng` (per-worker streams)                         |
//! | [`config`]      | `EngineConfig`                                        |
//! | [`error`]       | `EpiError`, `EpiResult`                               |

pub mod config;
pub mod error;
pub mod ids;
pub mod rng;
pub mod state;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::EngineConfig;
pub use error::{EpiError, EpiResult};
pub use ids::{CellId, CompartmentId, ParamId, ReactionId, WorkerId};
pub use rng::SimRng;
pub use state::DiseaseState;
