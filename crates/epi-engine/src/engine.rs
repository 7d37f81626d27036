//! The `TickEngine`: a fixed worker pool over two state buffers.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

use epi_core::{CellId, DiseaseState, SimRng, WorkerId};
use epi_model::{ModelDefinition, Schedule};

use crate::partition::partition;
use crate::worker::{Shared, Worker, WorkerSync};
use crate::{EngineError, EngineResult, TickObserver};

/// Largest pool size: worker ids are `u16`.
pub const MAX_WORKERS: usize = u16::MAX as usize + 1;

/// Driver-side handle to one pool thread.
struct WorkerHandle {
    sync:   Arc<WorkerSync>,
    thread: JoinHandle<()>,
}

// ── TickEngine ────────────────────────────────────────────────────────────────

/// Concurrent, double-buffered tick engine.
///
/// Holds two equal-length buffers of cell states.  During a tick every worker
/// reads the *current* buffer and writes its own contiguous partition of the
/// other one; once all workers have finished the buffers swap in O(1) and the
/// written buffer becomes current.
///
/// ```text
/// begin_tick(dt) ──► workers: for cell in partition { read → algorithm → write }
///                                  │
/// force_end_tick / try_end_tick ◄──┘ all finished → swap → on_tick_end
/// ```
///
/// The engine is driven from one thread (`&mut self`); the read accessors
/// may be called at any time, including while a tick is in flight, and see
/// the state as of the last completed tick.
///
/// Create via [`TickEngineBuilder`][crate::TickEngineBuilder].
pub struct TickEngine {
    shared:    Arc<Shared>,
    workers:   Vec<WorkerHandle>,
    /// Root stream; each new worker gets a child of it.
    rng:       SimRng,
    in_flight: bool,
    ticks:     u64,
}

impl TickEngine {
    /// Construct with no workers; the builder spawns the pool.
    pub(crate) fn new(model: ModelDefinition, cells: Vec<DiseaseState>, rng: SimRng) -> Self {
        Self {
            shared: Arc::new(Shared::new(model, cells)),
            workers: Vec::new(),
            rng,
            in_flight: false,
            ticks: 0,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn model(&self) -> &ModelDefinition {
        &self.shared.model
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.shared.model.cell_count()
    }

    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Number of ticks completed (buffer swaps) since construction.
    #[inline]
    pub fn ticks_completed(&self) -> u64 {
        self.ticks
    }

    /// `true` from `begin_tick` until every worker has finished the tick.
    ///
    /// A finished but not yet ended tick reports `false`; call
    /// [`try_end_tick`][Self::try_end_tick] to publish it.
    pub fn is_running(&self) -> bool {
        self.in_flight && !self.all_finished()
    }

    /// `true` between `begin_tick` and the matching end call.
    #[inline]
    pub fn tick_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn add_observer(&self, observer: Arc<dyn TickObserver>) {
        self.shared.observers.write().push(observer);
    }

    // ── Worker pool ───────────────────────────────────────────────────────

    /// Replace the worker pool with `count` workers.
    ///
    /// Fails without any change while a tick is in flight, for a count outside
    /// `1..=MAX_WORKERS`, or if a thread cannot be spawned.  Otherwise `count`
    /// new workers are spawned over a fresh balanced partition of the cells,
    /// then the old ones are stopped cooperatively and joined.  Asking for the
    /// current count does nothing.
    pub fn set_worker_count(&mut self, count: usize) -> EngineResult<()> {
        if self.in_flight {
            return Err(EngineError::TickInProgress("set_worker_count"));
        }
        if count == 0 || count > MAX_WORKERS {
            return Err(EngineError::InvalidWorkerCount(count));
        }
        if count == self.workers.len() {
            return Ok(());
        }

        let replacement = self.spawn_workers(count)?;
        self.stop_workers();
        self.workers = replacement;

        if count > 1 && self.shared.model.schedule() == Schedule::GlobalNextReaction {
            log::warn!(
                "global next-reaction schedule with {count} workers: each worker only sees its own partition"
            );
        }
        for o in self.shared.observers() {
            o.on_worker_count_changed(count);
        }
        Ok(())
    }

    /// Spawn a complete pool of `count` idle workers.  On failure every
    /// worker spawned so far is stopped again and the current pool is left
    /// untouched.
    fn spawn_workers(&mut self, count: usize) -> EngineResult<Vec<WorkerHandle>> {
        let mut spawned_pool = Vec::with_capacity(count);
        let ranges = partition(self.cell_count(), count);
        for (i, range) in ranges.into_iter().enumerate() {
            let Ok(id) = WorkerId::try_from(i) else {
                shutdown_pool(spawned_pool);
                return Err(EngineError::InvalidWorkerCount(count));
            };
            let sync = Arc::new(WorkerSync::default());
            let worker = Worker::new(
                id,
                range,
                Arc::clone(&self.shared),
                Arc::clone(&sync),
                self.rng.child(i as u64),
            );
            let spawned = thread::Builder::new()
                .name(format!("epi-worker-{i}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(thread) => spawned_pool.push(WorkerHandle { sync, thread }),
                Err(e) => {
                    shutdown_pool(spawned_pool);
                    return Err(e.into());
                }
            }
        }
        log::debug!("spawned {count} workers over {} cells", self.cell_count());
        Ok(spawned_pool)
    }

    fn stop_workers(&mut self) {
        shutdown_pool(std::mem::take(&mut self.workers));
    }

    fn all_finished(&self) -> bool {
        self.workers.iter().all(|w| w.sync.finished.is_set())
    }

    // ── Tick protocol ─────────────────────────────────────────────────────

    /// Store `dt`, release every worker and return immediately.
    pub fn begin_tick(&mut self, dt: f64) -> EngineResult<()> {
        if self.in_flight {
            return Err(EngineError::TickInProgress("begin_tick"));
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(EngineError::InvalidTimeStep(dt));
        }
        if self.workers.is_empty() {
            return Err(EngineError::InvalidWorkerCount(0));
        }

        self.shared.set_dt(dt);
        for o in self.shared.observers() {
            o.on_tick_start(dt);
        }
        // Every finished flag is cleared before any start flag is set.
        for w in &self.workers {
            w.sync.finished.reset();
        }
        for w in &self.workers {
            w.sync.start.set();
        }
        self.in_flight = true;
        log::trace!("tick {} started, dt = {dt}", self.ticks);
        Ok(())
    }

    /// Non-blocking end: if every worker has finished, swap the buffers and
    /// notify observers.  Returns `true` if this call completed the tick.
    pub fn try_end_tick(&mut self) -> bool {
        if !self.in_flight || !self.all_finished() {
            return false;
        }
        self.complete_tick();
        true
    }

    /// Block until every worker has finished, then swap and notify.
    ///
    /// No-op when no tick is in flight.  There is no timeout; callers that
    /// need bounded latency poll [`try_end_tick`][Self::try_end_tick].
    pub fn force_end_tick(&mut self) {
        if !self.in_flight {
            return;
        }
        for w in &self.workers {
            w.sync.finished.wait();
        }
        self.complete_tick();
    }

    /// `begin_tick(dt)` followed by `force_end_tick()`.
    pub fn tick(&mut self, dt: f64) -> EngineResult<()> {
        self.begin_tick(dt)?;
        self.force_end_tick();
        Ok(())
    }

    fn complete_tick(&mut self) {
        self.shared.swap();
        self.in_flight = false;
        self.ticks += 1;
        log::trace!("tick {} complete", self.ticks);

        let observers = self.shared.observers();
        if !observers.is_empty() {
            let cells = self.shared.buffers[self.shared.current()].read();
            for o in &observers {
                o.on_tick_end(&cells);
            }
        }
    }

    // ── Reading and seeding ───────────────────────────────────────────────

    /// A copy of one cell's current state.
    pub fn cell(&self, cell: CellId) -> EngineResult<DiseaseState> {
        self.with_cells(|cells| {
            cells.get(cell.index()).cloned().ok_or(EngineError::CellOutOfRange {
                cell:  cell.index(),
                count: cells.len(),
            })
        })
    }

    /// A copy of every cell's current state.
    pub fn snapshot(&self) -> Vec<DiseaseState> {
        self.with_cells(<[DiseaseState]>::to_vec)
    }

    /// Run `f` over the current buffer without copying it.
    pub fn with_cells<R>(&self, f: impl FnOnce(&[DiseaseState]) -> R) -> R {
        let cells = self.shared.buffers[self.shared.current()].read();
        f(&cells)
    }

    /// Textual dump of every cell of the current buffer.
    pub fn dump(&self) -> String {
        self.with_cells(|cells| {
            let mut out = String::new();
            for (i, state) in cells.iter().enumerate() {
                let _ = writeln!(out, "cell {i}: {state}");
            }
            out
        })
    }

    /// Overwrite one cell of the current buffer.  Not allowed mid-tick.
    pub fn seed_cell(&mut self, cell: CellId, state: DiseaseState) -> EngineResult<()> {
        if self.in_flight {
            return Err(EngineError::TickInProgress("seed_cell"));
        }
        let expected = self.shared.model.properties().compartment_count();
        if state.compartment_count() != expected {
            return Err(EngineError::CompartmentMismatch {
                cell: cell.index(),
                expected,
                got: state.compartment_count(),
            });
        }
        self.with_cells_mut(|cells| {
            let count = cells.len();
            let slot = cells
                .get_mut(cell.index())
                .ok_or(EngineError::CellOutOfRange { cell: cell.index(), count })?;
            *slot = state;
            Ok(())
        })?
    }

    /// Run `f` with mutable access to the current buffer.  Not allowed
    /// mid-tick.
    ///
    /// Every cell must still have the model's compartment count when `f`
    /// returns; otherwise the buffer is restored to its previous contents and
    /// `CompartmentMismatch` names the first offending cell.
    pub fn with_cells_mut<R>(&mut self, f: impl FnOnce(&mut [DiseaseState]) -> R) -> EngineResult<R> {
        if self.in_flight {
            return Err(EngineError::TickInProgress("with_cells_mut"));
        }
        let expected = self.shared.model.properties().compartment_count();
        let mut cells = self.shared.buffers[self.shared.current()].write();
        let previous = cells.clone();
        let result = f(&mut cells);

        let bad = cells.iter().enumerate().find(|(_, s)| s.compartment_count() != expected);
        if let Some((cell, state)) = bad {
            let got = state.compartment_count();
            *cells = previous;
            return Err(EngineError::CompartmentMismatch { cell, expected, got });
        }
        Ok(result)
    }
}

/// Cooperative shutdown: raise every worker's flag, wake it, join it.
fn shutdown_pool(pool: Vec<WorkerHandle>) {
    for w in &pool {
        w.sync.shutdown.store(true, Ordering::Release);
        w.sync.start.set();
    }
    for w in pool {
        if w.thread.join().is_err() {
            log::error!("a worker thread panicked");
        }
    }
}

impl Drop for TickEngine {
    fn drop(&mut self) {
        self.stop_workers();
    }
}
