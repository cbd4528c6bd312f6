//! Surgery Sim - command line entry point
//!
//! `demo` runs a scripted operation through the tick loop and prints the
//! resulting health scanner report. `check-catalog` validates a surgery
//! catalog file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use surgery_sim::body::graph::{find_part, give, spawn_humanoid, spawn_item};
use surgery_sim::body::item::Item;
use surgery_sim::body::part::{PartType, Symmetry};
use surgery_sim::core::config::SurgeryConfig;
use surgery_sim::core::error::Result;
use surgery_sim::core::types::{EntityId, Species, Vec2};
use surgery_sim::integrity::examine::{examine_integrity, scan};
use surgery_sim::simulation::{run_simulation_tick, Simulation, SimulationEvent};
use surgery_sim::surgery::catalog::SurgeryCatalog;
use surgery_sim::surgery::eligibility::MethodKind;
use surgery_sim::surgery::execution::StepRequest;

#[derive(Parser, Debug)]
#[command(name = "surgery-sim")]
#[command(about = "Layered surgery and bio-integrity simulation")]
struct Args {
    /// Config TOML overriding the default tuning
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Surgery catalog TOML replacing the built-in one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a patient's chest and saw the sternum with an improvised tool
    Demo {
        /// Give up on a step after this many ticks
        #[arg(long, default_value_t = 10_000)]
        max_ticks: u64,
    },
    /// Validate a catalog file and print a summary
    CheckCatalog { path: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("surgery_sim=info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => SurgeryConfig::load(path)?,
        None => SurgeryConfig::default(),
    };

    match args.command {
        Command::CheckCatalog { path } => {
            let catalog = SurgeryCatalog::load_file(&path)?;
            println!(
                "{}: {} operations, {} steps, sequences: {}",
                path.display(),
                catalog.operations().len(),
                catalog.steps().len(),
                catalog.sequence_ids().into_iter().collect::<Vec<_>>().join(", ")
            );
            Ok(())
        }
        Command::Demo { max_ticks } => {
            let catalog = match &args.catalog {
                Some(path) => SurgeryCatalog::load_file(path)?,
                None => SurgeryCatalog::with_defaults()?,
            };
            run_demo(Simulation::new(catalog, config), max_ticks)
        }
    }
}

fn run_demo(mut sim: Simulation, max_ticks: u64) -> Result<()> {
    let surgeon = spawn_humanoid(&mut sim.world, Species::Human, "surgeon");
    let patient = spawn_humanoid(&mut sim.world, Species::Human, "patient");
    sim.world.positions.insert(patient, Vec2::new(1.0, 0.0));

    let master = sim.config().master_tool_quality.clone();
    let omnitool = spawn_item(
        &mut sim.world,
        Item::new("omnitool", "omnitool").with_quality(&master),
        Vec2::default(),
    );
    let toolbox = spawn_item(
        &mut sim.world,
        Item::new("toolbox", "toolbox").with_blunt(12.0),
        Vec2::default(),
    );
    give(&mut sim.world, surgeon, omnitool);
    give(&mut sim.world, surgeon, toolbox);

    let Some(torso) = find_part(&sim.world, patient, PartType::Torso, Symmetry::None) else {
        tracing::error!("Patient has no torso");
        return Ok(());
    };

    let plan = [
        ("make-incision", None),
        ("clamp-vessels", None),
        ("retract-skin", None),
        ("cut-tissue", None),
        ("retract-tissue", None),
        ("saw-bone", Some(MethodKind::Secondary)),
    ];
    for (step, method) in plan {
        let mut request = StepRequest::new(surgeon, patient, torso, step);
        if let Some(method) = method {
            request = request.with_method(method);
        }
        if !perform(&mut sim, request, max_ticks) {
            break;
        }
    }

    report(&sim, patient)
}

/// Request one step and tick until it resolves; false if it did not complete
fn perform(sim: &mut Simulation, request: StepRequest, max_ticks: u64) -> bool {
    let step = request.step.clone();
    let id = match sim.request_step(request) {
        Ok(id) => id,
        Err(reason) => {
            println!("{}: rejected ({})", step, reason);
            return false;
        }
    };

    for _ in 0..max_ticks {
        for event in run_simulation_tick(sim) {
            match event {
                SimulationEvent::StepCompleted { id: done, .. } if done == id => {
                    println!("{}: done", step);
                    return true;
                }
                SimulationEvent::StepRejected { id: done, reason, .. } if done == id => {
                    println!("{}: rejected at completion ({})", step, reason);
                    return false;
                }
                SimulationEvent::StepCancelled { id: done, reason } if done == id => {
                    println!("{}: cancelled ({:?})", step, reason);
                    return false;
                }
                _ => {}
            }
        }
    }
    sim.abort_step(id);
    println!("{}: timed out", step);
    false
}

fn report(sim: &Simulation, patient: EntityId) -> Result<()> {
    for line in examine_integrity(&sim.world, sim.config(), patient) {
        println!("{}", line);
    }
    println!("{}", scan(&sim.world, sim.config(), patient)?.to_json()?);
    Ok(())
}
