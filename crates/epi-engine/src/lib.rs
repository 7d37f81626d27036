//! `epi-engine`: concurrent tick engine for the rust_epi workspace.
//!
//! # Tick protocol
//!
//! ```text
//! begin_tick(dt):
//!   ① store dt, notify on_tick_start
//!   ② clear every worker's finished flag, then set every start flag
//! each worker (own OS thread, fixed contiguous partition of cells):
//!   ③ wait start → clear start
//!   ④ for cell in partition: copy read[cell] → algorithm → scratch
//!   ⑤ copy scratch into its partition of the write buffer → set finished
//! try_end_tick / force_end_tick:
//!   ⑥ all finished? → swap buffers (O(1) index toggle) → notify on_tick_end
//! ```
//!
//! The pool is fixed: threads are created once and reused every tick, and
//! only recreated by [`TickEngine::set_worker_count`], which is rejected
//! while a tick is in flight.  Shutdown is cooperative (a flag polled
//! between cells, then join).
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use epi_engine::TickEngineBuilder;
//! use epi_model::{Gillespie, ModelBuilder, NoMovement};
//!
//! let model = ModelBuilder::new(3, 1)
//!     .parameters(&[1.0, 0.1])
//!     .reaction_raw((0, 1), &[1, 0, 1, 0])?
//!     .reaction_raw((1, 2), &[0, 1, 1])?
//!     .build(Gillespie, NoMovement)?;
//! let mut engine = TickEngineBuilder::new(model).initial_cells(cells).build()?;
//! while engine.cell(CellId(0))?.time_simulated < 50.0 {
//!     engine.tick(0.3)?;
//! }
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod observer;
pub mod partition;
mod signal;
mod worker;

#[cfg(test)]
mod tests;

pub use builder::TickEngineBuilder;
pub use engine::{MAX_WORKERS, TickEngine};
pub use error::{EngineError, EngineResult};
pub use observer::{NoopObserver, TickObserver};
pub use partition::partition;
