//! Integration tests for epi-engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use epi_core::{CellId, CompartmentId, DiseaseState, EngineConfig, EpiError, SimRng, WorkerId};
use epi_model::{
    Algorithm, AlgorithmResult, AllConnected, Deterministic, Gillespie, ModelBuilder,
    ModelDefinition, NoMovement, RejectionAlgorithm, Schedule, StepContext, TauLeaping,
};

use crate::{EngineError, MAX_WORKERS, TickEngine, TickEngineBuilder, TickObserver, partition};

// ── Helpers ───────────────────────────────────────────────────────────────────

const S: CompartmentId = CompartmentId(0);
const I: CompartmentId = CompartmentId(1);
const R: CompartmentId = CompartmentId(2);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Moves one individual from compartment 0 to compartment 1 per step.
struct Drip;

impl Algorithm for Drip {
    fn name(&self) -> &'static str {
        "drip"
    }

    fn perform_step(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        _rng:  &mut SimRng,
    ) -> AlgorithmResult<()> {
        write.set_to(read);
        if write[S] >= 1.0 {
            write[S] -= 1.0;
            write[I] += 1.0;
        }
        write.time_simulated = read.time_simulated + ctx.dt;
        Ok(())
    }
}

/// Writes the cell index into compartment 0 and counts visits in
/// compartment 1.
struct Stamp;

impl Algorithm for Stamp {
    fn name(&self) -> &'static str {
        "stamp"
    }

    fn perform_step(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        _rng:  &mut SimRng,
    ) -> AlgorithmResult<()> {
        write.set_to(read);
        write[S] = ctx.cell.index() as f64;
        write[I] += 1.0;
        write.time_simulated = read.time_simulated + ctx.dt;
        Ok(())
    }
}

/// `Drip`, but sleeps in every cell so a tick stays in flight for a while.
struct Slow(Duration);

impl Algorithm for Slow {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn perform_step(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        rng:   &mut SimRng,
    ) -> AlgorithmResult<()> {
        thread::sleep(self.0);
        Drip.perform_step(ctx, read, write, rng)
    }
}

/// `Drip`, but panics when asked to advance cell 1.
struct PanicsOnCellOne;

impl Algorithm for PanicsOnCellOne {
    fn name(&self) -> &'static str {
        "panics-on-cell-one"
    }

    fn perform_step(
        &self,
        ctx:   &StepContext<'_>,
        read:  &DiseaseState,
        write: &mut DiseaseState,
        rng:   &mut SimRng,
    ) -> AlgorithmResult<()> {
        assert_ne!(ctx.cell, CellId(1), "cell 1 cannot be advanced");
        Drip.perform_step(ctx, read, write, rng)
    }
}

/// Two-compartment model (only compartments 0 and 1 are used by the test
/// algorithms) over `cells` cells.
fn toy_model<A: Algorithm>(algorithm: A, cells: usize) -> ModelDefinition {
    ModelBuilder::new(2, cells)
        .parameter(0.0)
        .reaction_raw((0, 1), &[0, 0, 0])
        .unwrap()
        .build(algorithm, NoMovement)
        .unwrap()
}

fn toy_cells(cells: usize, s: f64) -> Vec<DiseaseState> {
    vec![DiseaseState::from_values(vec![s, 0.0]); cells]
}

fn toy_engine<A: Algorithm>(algorithm: A, cells: usize, workers: usize) -> TickEngine {
    TickEngineBuilder::new(toy_model(algorithm, cells))
        .worker_count(workers)
        .initial_cells(toy_cells(cells, 10.0))
        .build()
        .unwrap()
}

/// β = 1.0 (local and spatial), γ = 0.1.
fn sir_builder(cells: usize) -> ModelBuilder {
    ModelBuilder::new(3, cells)
        .parameters(&[1.0, 0.1])
        .reaction_raw((0, 1), &[1, 0, 1, 0])
        .unwrap()
        .reaction_raw((1, 2), &[0, 1, 1])
        .unwrap()
}

fn sir_state(s: f64, i: f64, r: f64) -> DiseaseState {
    DiseaseState::from_values(vec![s, i, r])
}

#[derive(Default)]
struct Counter {
    tick_starts:    AtomicUsize,
    cell_starts:    AtomicUsize,
    cell_ends:      AtomicUsize,
    tick_ends:      AtomicUsize,
    resizes:        AtomicUsize,
    last_workers:   AtomicUsize,
    max_worker_id:  AtomicUsize,
}

impl TickObserver for Counter {
    fn on_tick_start(&self, _dt: f64) {
        self.tick_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cell_start(&self, worker: WorkerId, _cell: CellId) {
        self.cell_starts.fetch_add(1, Ordering::SeqCst);
        self.max_worker_id.fetch_max(worker.index(), Ordering::SeqCst);
    }

    fn on_cell_end(&self, _worker: WorkerId, _cell: CellId) {
        self.cell_ends.fetch_add(1, Ordering::SeqCst);
    }

    fn on_tick_end(&self, _cells: &[DiseaseState]) {
        self.tick_ends.fetch_add(1, Ordering::SeqCst);
    }

    fn on_worker_count_changed(&self, count: usize) {
        self.resizes.fetch_add(1, Ordering::SeqCst);
        self.last_workers.store(count, Ordering::SeqCst);
    }
}

// ── Partitioning ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod partition_tests {
    use super::*;

    #[test]
    fn covers_every_cell_exactly_once() {
        for cells in 0..40 {
            for workers in 1..9 {
                let ranges = partition(cells, workers);
                assert_eq!(ranges.len(), workers);
                let flat: Vec<usize> = ranges.iter().cloned().flatten().collect();
                assert_eq!(flat, (0..cells).collect::<Vec<_>>(), "cells={cells} workers={workers}");

                let lens: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
                let (min, max) = (lens.iter().min().unwrap(), lens.iter().max().unwrap());
                assert!(max - min <= 1);
                assert!(lens.windows(2).all(|w| w[0] >= w[1]), "larger blocks come first");
            }
        }
    }

    #[test]
    fn more_workers_than_cells_get_empty_ranges() {
        let lens: Vec<usize> = partition(3, 5).iter().map(|r| r.len()).collect();
        assert_eq!(lens, vec![1, 1, 1, 0, 0]);
    }

    #[test]
    fn zero_workers_yields_nothing() {
        assert!(partition(10, 0).is_empty());
    }
}

// ── Builder validation ────────────────────────────────────────────────────────

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        init_logging();
        let engine = TickEngineBuilder::new(toy_model(Drip, 4)).build().unwrap();
        assert!(engine.worker_count() >= 1);
        assert_eq!(engine.cell_count(), 4);
        assert!(engine.snapshot().iter().all(|c| c.total() == 0.0 && c.time_simulated == 0.0));
        assert!(!engine.is_running());
    }

    #[test]
    fn cell_count_mismatch_errors() {
        let result = TickEngineBuilder::new(toy_model(Drip, 4))
            .initial_cells(toy_cells(3, 1.0))
            .build();
        assert!(matches!(
            result,
            Err(EngineError::CellCountMismatch { expected: 4, got: 3, what: "initial cells" })
        ));
    }

    #[test]
    fn compartment_mismatch_errors() {
        let mut cells = toy_cells(2, 1.0);
        cells[1] = DiseaseState::new(5);
        let result = TickEngineBuilder::new(toy_model(Drip, 2)).initial_cells(cells).build();
        assert!(matches!(
            result,
            Err(EngineError::CompartmentMismatch { cell: 1, expected: 2, got: 5 })
        ));
    }

    #[test]
    fn zero_workers_in_config_errors() {
        let config = EngineConfig { worker_count: Some(0), seed: 1 };
        let result = TickEngineBuilder::new(toy_model(Drip, 2)).config(config).build();
        assert!(matches!(result, Err(EngineError::Core(EpiError::Config(_)))));
    }
}

// ── Tick protocol ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tick_tests {
    use super::*;

    #[test]
    fn buffers_swap_every_tick() {
        init_logging();
        let mut engine = toy_engine(Drip, 5, 3);
        for _ in 0..4 {
            engine.tick(0.5).unwrap();
        }
        assert_eq!(engine.ticks_completed(), 4);
        for cell in engine.snapshot() {
            assert_eq!(cell.values(), &[6.0, 4.0]);
            assert_eq!(cell.time_simulated, 2.0);
        }
    }

    #[test]
    fn every_cell_written_once_into_its_own_slot() {
        let mut engine = toy_engine(Stamp, 17, 4);
        for _ in 0..3 {
            engine.tick(1.0).unwrap();
        }
        for (i, cell) in engine.snapshot().iter().enumerate() {
            assert_eq!(cell[S], i as f64);
            assert_eq!(cell[I], 3.0, "cell {i} visited a wrong number of times");
        }
    }

    #[test]
    fn more_workers_than_cells() {
        let mut engine = toy_engine(Drip, 2, 6);
        engine.tick(1.0).unwrap();
        assert_eq!(engine.worker_count(), 6);
        assert!(engine.snapshot().iter().all(|c| c[I] == 1.0));
    }

    #[test]
    fn begin_tick_validates() {
        let mut engine = toy_engine(Drip, 2, 1);
        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(engine.begin_tick(dt), Err(EngineError::InvalidTimeStep(_))));
        }
        engine.begin_tick(1.0).unwrap();
        assert!(matches!(engine.begin_tick(1.0), Err(EngineError::TickInProgress("begin_tick"))));
        engine.force_end_tick();
        assert_eq!(engine.ticks_completed(), 1);
    }

    #[test]
    fn mid_tick_changes_are_rejected() {
        let mut engine = toy_engine(Slow(Duration::from_millis(30)), 4, 2);
        engine.begin_tick(1.0).unwrap();
        assert!(engine.is_running());
        assert!(!engine.try_end_tick());

        assert!(matches!(engine.set_worker_count(3), Err(EngineError::TickInProgress(_))));
        assert!(matches!(
            engine.seed_cell(CellId(0), DiseaseState::new(2)),
            Err(EngineError::TickInProgress(_))
        ));
        assert!(engine.with_cells_mut(|_| ()).is_err());
        assert_eq!(engine.worker_count(), 2);

        // The read buffer still shows the pre-tick state.
        assert!(engine.snapshot().iter().all(|c| c[S] == 10.0));

        engine.force_end_tick();
        assert!(!engine.is_running());
        assert!(engine.snapshot().iter().all(|c| c[S] == 9.0));
    }

    #[test]
    fn try_end_tick_completes_once() {
        let mut engine = toy_engine(Drip, 8, 2);
        engine.begin_tick(1.0).unwrap();
        let mut polls = 0;
        while !engine.try_end_tick() {
            polls += 1;
            assert!(polls < 10_000, "workers never finished");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!engine.try_end_tick());
        engine.force_end_tick();
        assert_eq!(engine.ticks_completed(), 1);
        assert!(engine.snapshot().iter().all(|c| c[I] == 1.0));
    }

    #[test]
    fn resize_between_ticks() {
        let mut engine = toy_engine(Drip, 10, 2);
        engine.tick(1.0).unwrap();
        assert!(matches!(engine.set_worker_count(0), Err(EngineError::InvalidWorkerCount(0))));
        assert_eq!(engine.worker_count(), 2);

        engine.set_worker_count(3).unwrap();
        assert_eq!(engine.worker_count(), 3);
        engine.tick(1.0).unwrap();
        engine.set_worker_count(1).unwrap();
        engine.tick(1.0).unwrap();
        for cell in engine.snapshot() {
            assert_eq!(cell.values(), &[7.0, 3.0]);
            assert_eq!(cell.time_simulated, 3.0);
        }
    }

    #[test]
    fn seeding_and_reading() {
        let mut engine = toy_engine(Drip, 3, 1);
        engine.seed_cell(CellId(2), DiseaseState::from_values(vec![1.0, 0.0])).unwrap();
        assert!(matches!(
            engine.seed_cell(CellId(3), DiseaseState::new(2)),
            Err(EngineError::CellOutOfRange { cell: 3, count: 3 })
        ));
        assert!(matches!(
            engine.seed_cell(CellId(0), DiseaseState::new(4)),
            Err(EngineError::CompartmentMismatch { .. })
        ));

        engine.tick(1.0).unwrap();
        engine.tick(1.0).unwrap();
        assert_eq!(engine.cell(CellId(2)).unwrap().values(), &[0.0, 1.0]);
        assert!(engine.cell(CellId(9)).is_err());

        engine.with_cells_mut(|cells| cells[0][S] = 100.0).unwrap();
        assert_eq!(engine.with_cells(|cells| cells[0][S]), 100.0);

        let dump = engine.dump();
        assert!(dump.contains("cell 0: t = 2.0000"));
        assert_eq!(dump.lines().filter(|l| l.starts_with("cell ")).count(), 3);
    }

    #[test]
    fn observers_see_every_callback() {
        let counter = Arc::new(Counter::default());
        let mut engine = TickEngineBuilder::new(toy_model(Drip, 6))
            .worker_count(3)
            .initial_cells(toy_cells(6, 10.0))
            .observer(counter.clone())
            .build()
            .unwrap();
        assert_eq!(counter.resizes.load(Ordering::SeqCst), 1);
        assert_eq!(counter.last_workers.load(Ordering::SeqCst), 3);

        for _ in 0..5 {
            engine.tick(0.1).unwrap();
        }
        assert_eq!(counter.tick_starts.load(Ordering::SeqCst), 5);
        assert_eq!(counter.tick_ends.load(Ordering::SeqCst), 5);
        assert_eq!(counter.cell_starts.load(Ordering::SeqCst), 30);
        assert_eq!(counter.cell_ends.load(Ordering::SeqCst), 30);
        assert_eq!(counter.max_worker_id.load(Ordering::SeqCst), 2);

        engine.set_worker_count(2).unwrap();
        assert_eq!(counter.resizes.load(Ordering::SeqCst), 2);
        assert_eq!(counter.last_workers.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn with_cells_mut_rejects_wrong_compartment_count() {
        let mut engine = toy_engine(Drip, 2, 1);
        let result = engine.with_cells_mut(|cells| {
            cells[0][S] = 50.0;
            cells[1] = DiseaseState::new(1);
        });
        assert!(matches!(
            result,
            Err(EngineError::CompartmentMismatch { cell: 1, expected: 2, got: 1 })
        ));

        // Nothing from the rejected edit survives, including the valid part.
        assert_eq!(engine.snapshot(), toy_cells(2, 10.0));

        engine.tick(1.0).unwrap();
        for cell in engine.snapshot() {
            assert_eq!(cell.values(), &[9.0, 1.0]);
            assert_eq!(cell.time_simulated, 1.0);
        }
    }

    #[test]
    fn panicking_worker_keeps_its_cells_and_the_pool_alive() {
        init_logging();
        // One cell per worker: only the panicking worker's cell is held back.
        let mut engine = toy_engine(PanicsOnCellOne, 2, 2);
        engine.tick(1.0).unwrap();
        engine.tick(1.0).unwrap();
        assert_eq!(engine.ticks_completed(), 2);

        let cells = engine.snapshot();
        assert_eq!(cells[0].values(), &[8.0, 2.0]);
        assert_eq!(cells[0].time_simulated, 2.0);
        assert_eq!(cells[1].values(), &[10.0, 0.0]);
        assert_eq!(cells[1].time_simulated, 0.0);
    }

    #[test]
    fn oversized_worker_count_leaves_pool_intact() {
        let mut engine = toy_engine(Drip, 4, 2);
        assert!(matches!(
            engine.set_worker_count(MAX_WORKERS + 1),
            Err(EngineError::InvalidWorkerCount(n)) if n == MAX_WORKERS + 1
        ));
        assert_eq!(engine.worker_count(), 2);

        engine.tick(1.0).unwrap();
        assert!(engine.snapshot().iter().all(|c| c.values() == [9.0, 1.0]));
    }

    #[test]
    fn requesting_the_current_worker_count_keeps_the_pool() {
        let counter = Arc::new(Counter::default());
        let mut engine = TickEngineBuilder::new(toy_model(Drip, 4))
            .worker_count(3)
            .initial_cells(toy_cells(4, 10.0))
            .observer(counter.clone())
            .build()
            .unwrap();
        engine.set_worker_count(3).unwrap();
        assert_eq!(counter.resizes.load(Ordering::SeqCst), 1);
        assert_eq!(engine.worker_count(), 3);

        engine.set_worker_count(4).unwrap();
        assert_eq!(counter.resizes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn same_seed_same_result() {
        let run = || {
            let model = sir_builder(4).build(Gillespie, NoMovement).unwrap();
            let mut engine = TickEngineBuilder::new(model)
                .worker_count(2)
                .seed(7)
                .initial_cells(vec![sir_state(500.0, 5.0, 0.0); 4])
                .build()
                .unwrap();
            for _ in 0..20 {
                engine.tick(0.5).unwrap();
            }
            engine.snapshot()
        };
        assert_eq!(run(), run());
    }
}

// ── Schedules ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod schedule_tests {
    use super::*;

    #[test]
    fn global_schedule_fires_one_reaction() {
        init_logging();
        let model = sir_builder(3)
            .schedule(Schedule::GlobalNextReaction)
            .build(Gillespie, NoMovement)
            .unwrap();
        let initial = vec![sir_state(100.0, 5.0, 0.0); 3];
        let mut engine = TickEngineBuilder::new(model)
            .worker_count(1)
            .initial_cells(initial.clone())
            .build()
            .unwrap();
        engine.tick(1.0).unwrap();

        let after = engine.snapshot();
        let moved: f64 = after
            .iter()
            .zip(&initial)
            .flat_map(|(a, b)| a.values().iter().zip(b.values()).map(|(x, y)| (x - y).abs()))
            .sum();
        assert_eq!(moved, 2.0, "exactly one individual changes compartment");

        let t = after[0].time_simulated;
        assert!(t > 0.0 && t.is_finite());
        assert!(after.iter().all(|c| c.time_simulated == t));
    }

    #[test]
    fn global_schedule_with_nothing_to_do_advances_by_dt() {
        let model = sir_builder(2)
            .schedule(Schedule::GlobalNextReaction)
            .build(RejectionAlgorithm::new(), NoMovement)
            .unwrap();
        let mut engine = TickEngineBuilder::new(model)
            .worker_count(1)
            .initial_cells(vec![sir_state(100.0, 0.0, 0.0); 2])
            .build()
            .unwrap();
        engine.tick(0.25).unwrap();
        for cell in engine.snapshot() {
            assert_eq!(cell.values(), &[100.0, 0.0, 0.0]);
            assert_eq!(cell.time_simulated, 0.25);
        }
    }

    #[test]
    fn unsupported_operation_leaves_cells_unchanged() {
        let model = sir_builder(2)
            .schedule(Schedule::GlobalNextReaction)
            .build(Deterministic::new(), NoMovement)
            .unwrap();
        let initial = vec![sir_state(100.0, 5.0, 0.0); 2];
        let mut engine = TickEngineBuilder::new(model)
            .worker_count(1)
            .initial_cells(initial.clone())
            .build()
            .unwrap();
        engine.tick(1.0).unwrap();
        assert_eq!(engine.snapshot(), initial);
    }
}

// ── End-to-end epidemics ──────────────────────────────────────────────────────

#[cfg(test)]
mod epidemic_tests {
    use super::*;

    #[test]
    fn single_cell_sir_with_gillespie() {
        init_logging();
        let model = sir_builder(1).build(Gillespie, NoMovement).unwrap();
        let mut engine = TickEngineBuilder::new(model)
            .worker_count(1)
            .initial_cells(vec![sir_state(100_000.0, 10.0, 0.0)])
            .build()
            .unwrap();

        let mut history = vec![engine.cell(CellId(0)).unwrap()];
        while history.last().unwrap().time_simulated < 50.0 {
            engine.tick(0.3).unwrap();
            history.push(engine.cell(CellId(0)).unwrap());
        }

        for pair in history.windows(2) {
            assert!(pair[1][S] <= pair[0][S], "S increased");
            assert!(pair[1][R] >= pair[0][R], "R decreased");
            assert!(pair[1].time_simulated > pair[0].time_simulated, "time went backwards");
        }
        for state in &history {
            assert_eq!(state.total(), 100_010.0);
        }

        let (peak_at, peak) = history
            .iter()
            .enumerate()
            .map(|(k, s)| (k, s[I]))
            .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        assert!(peak > 10.0, "infection never grew");
        assert!(peak_at < history.len() - 1, "I still rising at t = 50");
        assert!(history.last().unwrap()[I] < peak);
    }

    #[test]
    fn ring_spreads_with_rejection() {
        init_logging();
        let mut movement = AllConnected::new(4);
        for (a, b) in [(0, 1), (1, 3), (3, 2), (2, 0)] {
            movement.set_connectivity(CellId(a), CellId(b), 0.01).unwrap();
        }
        let model = sir_builder(4)
            .reaction_raw((0, 1), &[2, 0, 0, 1])
            .unwrap()
            .build(RejectionAlgorithm::new(), movement)
            .unwrap();

        // Every cell as in the single-cell run; only cell 0 starts infected.
        let mut cells = vec![sir_state(100_000.0, 0.0, 0.0); 4];
        cells[0][I] = 10.0;
        let mut engine = TickEngineBuilder::new(model)
            .worker_count(2)
            .initial_cells(cells)
            .build()
            .unwrap();

        let mut ever_infected = [false; 4];
        for _ in 0..40 {
            engine.tick(0.5).unwrap();
            engine.with_cells(|cells| {
                for (seen, cell) in ever_infected.iter_mut().zip(cells) {
                    *seen |= cell[I] > 0.0;
                }
            });
        }

        let cells = engine.snapshot();
        assert_eq!(cells[0].total(), 100_010.0);
        for cell in &cells[1..] {
            assert_eq!(cell.total(), 100_000.0);
        }
        assert!(cells.iter().all(|c| (c.time_simulated - 20.0).abs() < 1e-9));
        assert!(
            ever_infected[1..].iter().all(|&seen| seen),
            "infection never reached every other cell: {ever_infected:?}"
        );
    }

    #[test]
    fn spatial_tau_leaping_conserves_per_cell() {
        let model = sir_builder(6)
            .reaction_raw((0, 1), &[2, 0, 0, 1])
            .unwrap()
            .build(TauLeaping::new().with_max_leap(0.1), AllConnected::ring(6, 0.05).unwrap())
            .unwrap();
        let mut cells = vec![sir_state(1000.0, 0.0, 0.0); 6];
        cells[3][I] = 20.0;
        let mut engine = TickEngineBuilder::new(model)
            .worker_count(3)
            .initial_cells(cells.clone())
            .build()
            .unwrap();

        for _ in 0..40 {
            engine.tick(0.5).unwrap();
        }
        for (now, before) in engine.snapshot().iter().zip(&cells) {
            assert_eq!(now.total(), before.total());
            assert!(now.values().iter().all(|&v| v >= 0.0));
            assert!((now.time_simulated - 20.0).abs() < 1e-9);
        }
    }
}
