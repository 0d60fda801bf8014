//! Relax cubic crystals under hydrostatic pressure and report energy, forces and stress.

use clap::Parser;
use colored::Colorize;
use mineral_phase_rust::config::RelaxationJob;
use mineral_phase_rust::constants::EV_PER_A3_TO_GPA;
use mineral_phase_rust::error::RelaxResult;
use mineral_phase_rust::logging;
use mineral_phase_rust::relax::relax_under_pressure;
use std::path::PathBuf;
use std::process::ExitCode;

/// Relax crystal structures under a target pressure
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON job file
    job: PathBuf,

    /// Override the target pressure (GPa)
    #[arg(short, long)]
    pressure: Option<f64>,

    /// Override the force convergence threshold (eV/Å)
    #[arg(long)]
    fmax: Option<f64>,

    /// Log optimizer progress
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: &Args) -> RelaxResult<()> {
    let mut job = RelaxationJob::load(&args.job)?;
    if let Some(pressure) = args.pressure {
        job.pressure = pressure;
    }
    if let Some(fmax) = args.fmax {
        job.relax.fmax = fmax;
    }

    for crystal in &job.crystals {
        let structure = crystal.structure()?;
        let report = relax_under_pressure(&structure, &job.potential, job.pressure, &job.relax)?;
        let stress = report.stress;

        println!(
            "{}",
            format!("{} ({}) at {} GPa", crystal.symbol, crystal.crystal, job.pressure).bold()
        );
        println!("Energy (eV)                 = {}", report.energy);
        println!("Energy per atom (eV/atom)   = {}", report.energy_per_atom);
        println!("Forces on first atom (eV/A) = {:?}", report.forces[0].to_array());
        println!("Stress[0][0] (eV/A^3)       = {}", stress.x_axis.x);
        println!("Stress[0][0] (GPa)          = {}", stress.x_axis.x * EV_PER_A3_TO_GPA);
        println!("Volume per atom (A^3)       = {:.4}", report.volume_per_atom());
        println!(
            "Pressure (GPa)              = {} after {} steps",
            format!("{:.3}", report.pressure).green(),
            report.iterations
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
