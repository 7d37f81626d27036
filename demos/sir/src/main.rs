//! sir: single-cell SIR outbreak with the exact Gillespie variant.
//!
//! 100 000 susceptible, 10 infected, β = 1.0, γ = 0.1, ticks of 0.3 until
//! t ≥ 50.  The trajectory is written to `output/sir/trajectory.csv` by a
//! tick observer.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use parking_lot::Mutex;

use epi_core::{CellId, DiseaseState};
use epi_engine::{TickEngineBuilder, TickObserver};
use epi_model::{Gillespie, ModelBuilder, NoMovement};

// ── Constants ─────────────────────────────────────────────────────────────────

const SUSCEPTIBLE: f64 = 100_000.0;
const INFECTED:    f64 = 10.0;
const BETA:        f64 = 1.0;
const GAMMA:       f64 = 0.1;
const DT:          f64 = 0.3;
const END_TIME:    f64 = 50.0;
const SEED:        u64 = 42;

// ── CSV observer ──────────────────────────────────────────────────────────────

/// Appends one row per tick: time, S, I, R of cell 0.
struct CsvTrajectory {
    writer: Mutex<csv::Writer<File>>,
    error:  Mutex<Option<csv::Error>>,
}

impl CsvTrajectory {
    fn new(path: &Path) -> Result<Self> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["time", "susceptible", "infected", "recovered"])?;
        Ok(Self { writer: Mutex::new(writer), error: Mutex::new(None) })
    }

    fn write_row(&self, state: &DiseaseState) -> csv::Result<()> {
        let mut row = vec![state.time_simulated.to_string()];
        row.extend(state.values().iter().map(f64::to_string));
        self.writer.lock().write_record(&row)
    }

    /// Flush and return the first write error, if any.
    fn finish(&self) -> Result<()> {
        if let Some(e) = self.error.lock().take() {
            return Err(e.into());
        }
        self.writer.lock().flush()?;
        Ok(())
    }
}

impl TickObserver for CsvTrajectory {
    fn on_tick_end(&self, cells: &[DiseaseState]) {
        let Some(state) = cells.first() else { return };
        if let Err(e) = self.write_row(state) {
            let mut slot = self.error.lock();
            if slot.is_none() {
                *slot = Some(e);
            }
        }
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let model = ModelBuilder::new(3, 1)
        .parameters(&[BETA, GAMMA])
        .reaction_raw((0, 1), &[1, 0, 1, 0])? // S → I at β·S·I/N
        .reaction_raw((1, 2), &[0, 1, 1])?    // I → R at γ·I
        .build(Gillespie, NoMovement)?;

    std::fs::create_dir_all("output/sir")?;
    let trajectory = Arc::new(CsvTrajectory::new(Path::new("output/sir/trajectory.csv"))?);

    let initial = DiseaseState::from_values(vec![SUSCEPTIBLE, INFECTED, 0.0]);
    let mut engine = TickEngineBuilder::new(model)
        .worker_count(1)
        .seed(SEED)
        .initial_cells(vec![initial.clone()])
        .observer(trajectory.clone())
        .build()?;
    trajectory.write_row(&initial)?;

    log::info!("S = {SUSCEPTIBLE}, I = {INFECTED}, β = {BETA}, γ = {GAMMA}, dt = {DT}");

    let t0 = Instant::now();
    let mut peak = (0.0, INFECTED);
    loop {
        let state = engine.cell(CellId(0))?;
        if state.values()[1] > peak.1 {
            peak = (state.time_simulated, state.values()[1]);
        }
        if state.time_simulated >= END_TIME {
            break;
        }
        engine.tick(DT)?;
    }
    trajectory.finish()?;

    log::info!(
        "{} ticks in {:.3} s; infection peaked at I = {} (t = {:.1})",
        engine.ticks_completed(),
        t0.elapsed().as_secs_f64(),
        peak.1,
        peak.0,
    );
    println!("{}", engine.dump());
    Ok(())
}
