//! Worker threads and the state they share with the engine.

use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use epi_core::{CellId, DiseaseState, SimRng, WorkerId};
use epi_model::{ModelDefinition, Schedule};
use parking_lot::RwLock;

use crate::TickObserver;
use crate::signal::Signal;

// ── Shared engine state ───────────────────────────────────────────────────────

/// State shared by the engine and every worker.
///
/// `buffers[current]` is the read buffer and is never written during a
/// tick; `buffers[1 - current]` is the write buffer, of which each worker
/// only touches its own partition.  `current` only changes on the driver
/// thread, after every worker has finished.
pub(crate) struct Shared {
    pub(crate) model:     ModelDefinition,
    pub(crate) buffers:   [RwLock<Vec<DiseaseState>>; 2],
    pub(crate) current:   AtomicUsize,
    dt_bits:              AtomicU64,
    pub(crate) observers: RwLock<Vec<Arc<dyn TickObserver>>>,
}

impl Shared {
    pub(crate) fn new(model: ModelDefinition, cells: Vec<DiseaseState>) -> Self {
        Self {
            model,
            buffers:   [RwLock::new(cells.clone()), RwLock::new(cells)],
            current:   AtomicUsize::new(0),
            dt_bits:   AtomicU64::new(0),
            observers: RwLock::new(Vec::new()),
        }
    }

    #[inline]
    pub(crate) fn current(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    /// O(1) swap: the write buffer becomes the read buffer.
    #[inline]
    pub(crate) fn swap(&self) {
        self.current.fetch_xor(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn dt(&self) -> f64 {
        f64::from_bits(self.dt_bits.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_dt(&self, dt: f64) {
        self.dt_bits.store(dt.to_bits(), Ordering::Release);
    }

    pub(crate) fn observers(&self) -> Vec<Arc<dyn TickObserver>> {
        self.observers.read().clone()
    }
}

/// Per-worker rendezvous: the driver sets `start`, the worker sets
/// `finished`.  `shutdown` is polled between cells.
#[derive(Default)]
pub(crate) struct WorkerSync {
    pub(crate) start:    Signal,
    pub(crate) finished: Signal,
    pub(crate) shutdown: AtomicBool,
}

impl WorkerSync {
    #[inline]
    fn shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

/// One pool thread's owned data.  Moved into the thread by
/// [`run`][Self::run].
pub(crate) struct Worker {
    id:      WorkerId,
    range:   Range<usize>,
    shared:  Arc<Shared>,
    sync:    Arc<WorkerSync>,
    rng:     SimRng,
    /// Private copy of the cell being advanced; never aliases the read buffer.
    input:   DiseaseState,
    /// Next states for the partition, reused across ticks.
    scratch: Vec<DiseaseState>,
}

impl Worker {
    pub(crate) fn new(
        id:     WorkerId,
        range:  Range<usize>,
        shared: Arc<Shared>,
        sync:   Arc<WorkerSync>,
        rng:    SimRng,
    ) -> Self {
        let empty = shared.model.properties().empty_state();
        Self {
            id,
            scratch: vec![empty.clone(); range.len()],
            input: empty,
            range,
            shared,
            sync,
            rng,
        }
    }

    /// Thread body: wait for start, advance the partition, signal finished.
    pub(crate) fn run(mut self) {
        log::debug!("worker {} started on cells {:?}", self.id, self.range);
        loop {
            self.sync.start.wait();
            self.sync.start.reset();
            if self.sync.shutting_down() {
                break;
            }
            if panic::catch_unwind(AssertUnwindSafe(|| self.pass())).is_err() {
                log::error!("worker {} panicked; its cells keep their state this tick", self.id);
                self.publish_unchanged();
            }
            self.sync.finished.set();
        }
        log::debug!("worker {} stopped", self.id);
    }

    /// One tick over the partition: compute into `scratch` from the read
    /// buffer, then publish into the write buffer.
    fn pass(&mut self) {
        let shared = Arc::clone(&self.shared);
        let dt = shared.dt();
        let current = shared.current();
        let observers = shared.observers();

        let completed = {
            let read = shared.buffers[current].read();
            match shared.model.schedule() {
                Schedule::PerCell => self.per_cell(&read, dt, &observers),
                Schedule::GlobalNextReaction => self.global_next_reaction(&read, dt, &observers),
            }
        };
        if !completed {
            return;
        }

        let mut write = shared.buffers[1 - current].write();
        for (slot, next) in write[self.range.clone()].iter_mut().zip(&self.scratch) {
            slot.set_to(next);
        }
    }

    fn publish_unchanged(&self) {
        let current = self.shared.current();
        let read = self.shared.buffers[current].read();
        let mut write = self.shared.buffers[1 - current].write();
        for i in self.range.clone() {
            write[i].set_to(&read[i]);
        }
    }

    /// Advance every cell independently.  Returns `false` if shutdown was
    /// requested mid-pass.
    fn per_cell(&mut self, read: &[DiseaseState], dt: f64, observers: &[Arc<dyn TickObserver>]) -> bool {
        let model = &self.shared.model;
        for (offset, i) in self.range.clone().enumerate() {
            if self.sync.shutting_down() {
                return false;
            }
            let cell = CellId(i as u32);
            for o in observers {
                o.on_cell_start(self.id, cell);
            }

            self.input.set_to(&read[i]);
            let ctx = model.step_context(cell, dt, read);
            let out = &mut self.scratch[offset];
            if let Err(e) = model.algorithm().perform_step(&ctx, &self.input, out, &mut self.rng) {
                log::warn!("{cell} left unchanged this tick: {e}");
                out.set_to(&self.input);
            }

            for o in observers {
                o.on_cell_end(self.id, cell);
            }
        }
        true
    }

    /// Fire one reaction at the partition's earliest-reacting cell and
    /// advance every cell of the partition by that waiting time (or by `dt`
    /// if nothing can react).
    fn global_next_reaction(
        &mut self,
        read:      &[DiseaseState],
        dt:        f64,
        observers: &[Arc<dyn TickObserver>],
    ) -> bool {
        let model = &self.shared.model;
        let algorithm = model.algorithm();
        for (slot, i) in self.scratch.iter_mut().zip(self.range.clone()) {
            slot.set_to(&read[i]);
        }

        let mut earliest: Option<(usize, f64)> = None;
        for (offset, i) in self.range.clone().enumerate() {
            if self.sync.shutting_down() {
                return false;
            }
            let ctx = model.step_context(CellId(i as u32), dt, read);
            match algorithm.next_reaction_time(&ctx, &read[i], &mut self.rng) {
                Ok(tau) if tau.is_finite() && earliest.is_none_or(|(_, best)| tau < best) => {
                    earliest = Some((offset, tau));
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("worker {}: partition left unchanged this tick: {e}", self.id);
                    return true;
                }
            }
        }

        let advance = match earliest {
            Some((offset, tau)) => {
                let i = self.range.start + offset;
                let cell = CellId(i as u32);
                for o in observers {
                    o.on_cell_start(self.id, cell);
                }
                self.input.set_to(&read[i]);
                let ctx = model.step_context(cell, dt, read);
                let out = &mut self.scratch[offset];
                let fired = algorithm.perform_single_reaction(&ctx, &self.input, out, &mut self.rng);
                for o in observers {
                    o.on_cell_end(self.id, cell);
                }
                if let Err(e) = fired {
                    log::warn!("worker {}: partition left unchanged this tick: {e}", self.id);
                    for (slot, i) in self.scratch.iter_mut().zip(self.range.clone()) {
                        slot.set_to(&read[i]);
                    }
                    return true;
                }
                tau
            }
            None => dt,
        };

        for (slot, i) in self.scratch.iter_mut().zip(self.range.clone()) {
            slot.time_simulated = read[i].time_simulated + advance;
        }
        true
    }
}
