//! Tick observer trait for progress reporting and data collection.

use epi_core::{CellId, DiseaseState, WorkerId};

/// Callbacks invoked by the [`TickEngine`][crate::TickEngine] around each
/// tick.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Thread context
///
/// | Callback                  | Runs on                                 |
/// |---------------------------|-----------------------------------------|
/// | `on_tick_start`           | the driver thread, in `begin_tick`      |
/// | `on_cell_start/end`       | the worker thread advancing that cell   |
/// | `on_tick_end`             | the driver thread, right after the swap |
/// | `on_worker_count_changed` | the driver thread                       |
///
/// Cell callbacks run concurrently on several workers, hence `&self` and the
/// `Send + Sync` bound; use atomics or a lock for any state.
///
/// # Example: progress printer
///
/// ```rust,ignore
/// struct Progress;
///
/// impl TickObserver for Progress {
///     fn on_tick_end(&self, cells: &[DiseaseState]) {
///         println!("t = {:.2}", cells[0].time_simulated);
///     }
/// }
/// ```
pub trait TickObserver: Send + Sync {
    /// Called before the workers are released for a tick of length `dt`.
    fn on_tick_start(&self, _dt: f64) {}

    /// Called before `worker` advances `cell`.
    fn on_cell_start(&self, _worker: WorkerId, _cell: CellId) {}

    /// Called after `worker` has advanced `cell`.
    fn on_cell_end(&self, _worker: WorkerId, _cell: CellId) {}

    /// Called after the buffers were swapped; `cells` is the new current
    /// buffer.
    fn on_tick_end(&self, _cells: &[DiseaseState]) {}

    /// Called after the worker pool was (re)created with `count` workers.
    fn on_worker_count_changed(&self, _count: usize) {}
}

/// A [`TickObserver`] that does nothing.
pub struct NoopObserver;

impl TickObserver for NoopObserver {}
