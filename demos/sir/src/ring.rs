//! ring: four cells coupled in a ring, advanced with the rejection variant.
//!
//! Every cell holds 100 susceptibles; cell 0 also starts with 10 infected.
//! Cells are connected 0–1, 1–3, 3–2, 2–0 at rate 0.01, so infection can
//! only reach the other cells through the spatial contact reaction.

use anyhow::Result;

use epi_core::{CellId, DiseaseState};
use epi_engine::TickEngineBuilder;
use epi_model::{AllConnected, ModelBuilder, RejectionAlgorithm};

const CELLS:     usize = 4;
const RING_RATE: f64   = 0.01;
const DT:        f64   = 0.5;
const TICKS:     usize = 100;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut movement = AllConnected::new(CELLS);
    for (a, b) in [(0, 1), (1, 3), (3, 2), (2, 0)] {
        movement.set_connectivity(CellId(a), CellId(b), RING_RATE)?;
    }

    let model = ModelBuilder::new(3, CELLS)
        .parameters(&[1.0, 0.1])
        .reaction_raw((0, 1), &[1, 0, 1, 0])? // local infection
        .reaction_raw((1, 2), &[0, 1, 1])?    // recovery
        .reaction_raw((0, 1), &[2, 0, 0, 1])? // infection from neighbouring cells
        .build(RejectionAlgorithm::new(), movement)?;

    let mut cells = vec![DiseaseState::from_values(vec![100.0, 0.0, 0.0]); CELLS];
    cells[0].values_mut()[1] = 10.0;

    let mut engine = TickEngineBuilder::new(model).initial_cells(cells).build()?;
    log::info!("{CELLS} cells on {} workers", engine.worker_count());

    for tick in 1..=TICKS {
        engine.tick(DT)?;
        if tick % 20 == 0 {
            log::info!("after tick {tick}:\n{}", engine.dump());
        }
    }

    let reached = engine.with_cells(|cells| cells[1..].iter().filter(|c| c.values()[0] < 100.0).count());
    println!("infection reached {reached} of {} other cells", CELLS - 1);
    Ok(())
}
