//! Trace a two-phase boundary from a JSON job file and write it as CSV.

use clap::Parser;
use colored::Colorize;
use log::error;
use mineral_phase_rust::boundary::{BoundaryCsvWriter, PhaseBoundary};
use mineral_phase_rust::config::PhaseDiagramJob;
use mineral_phase_rust::error::TracerResult;
use mineral_phase_rust::logging;
use std::path::PathBuf;
use std::process::ExitCode;

/// Trace phase boundaries outward from their anchor point
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON job file
    job: PathBuf,

    /// Override the CSV output path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override the number of sweep steps per branch
    #[arg(long)]
    steps: Option<usize>,

    /// Solve the steps of each branch in parallel
    #[arg(long)]
    parallel: bool,

    /// Log dropped sweep steps
    #[arg(short, long)]
    verbose: bool,
}

fn print_summary(boundary: &PhaseBoundary) {
    let anchor = &boundary.anchor;
    println!("{}", "Anchor".bold());
    println!(
        "  {} fixed, {} = {:.3}",
        anchor.fixed,
        anchor.fixed.free_variable_name(),
        anchor.free_value()
    );
    for phase in &anchor.state.phases {
        println!("  {:<12} x = {:.4}", phase.name, phase.minor_fraction());
    }
    let tie = boundary.tie_line();
    println!("  tie line {:.4} .. {:.4}", tie.low, tie.high);

    println!("{}", "Branches".bold());
    for curve in &boundary.curves {
        let status = format!("{}/{}", curve.len(), curve.attempted);
        let status = if curve.failed() == 0 { status.green() } else { status.yellow() };
        println!("  {:<24} {} points", curve.label(), status);
    }
}

fn run(args: &Args) -> TracerResult<()> {
    let mut job = PhaseDiagramJob::load(&args.job)?;
    if let Some(steps) = args.steps {
        job.tracer.steps = steps;
    }
    if args.parallel {
        job.tracer.parallel = true;
    }

    let tracer = job.tracer()?;
    let assemblage = job.assemblage()?;
    let boundary = match &job.branches {
        Some(branches) => tracer.trace_boundary_with(&job.bulk, &assemblage, job.fixed, branches)?,
        None => tracer.trace_boundary(&job.bulk, &assemblage, job.fixed)?,
    };
    print_summary(&boundary);

    if let Some(path) = args.output.as_ref().or(job.output.as_ref()) {
        let rows = BoundaryCsvWriter::new(path).write_boundary(&boundary)?;
        println!("wrote {} rows to {}", rows, path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
