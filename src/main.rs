use std::{error::Error as _, path::PathBuf, process::ExitCode};

use clap::Parser;
use gasflow::{
    sim::Resolution, CaseConfig, ConfigError, Driver, Float, Logger, SimError, SnapshotWriter,
};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "gasflow")]
#[command(about = "Compressible gas flow through a porous medium on a rectangular mesh", long_about = None)]
struct Cli {
    /// Number of cells along x
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    size_x: u32,
    /// Number of cells along y
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    size_y: u32,
    /// Base time step in seconds
    #[arg(long)]
    time_step: Float,
    /// The time step is scaled by min(hx, hy)^order
    #[arg(long, default_value_t = 0.0)]
    time_step_order: Float,
    /// Snapshots are written to <prefix><index>.dat
    #[arg(long)]
    output_prefix: String,
    /// End time in seconds
    #[arg(long)]
    final_time: Option<Float>,
    /// Simulated time between two snapshots
    #[arg(long)]
    snapshot_period: Option<Float>,
    /// JSON case file, overridden by the flags above
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sim(#[from] SimError),
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut case = match &cli.config {
        Some(path) => CaseConfig::from_json_file(path)?,
        None => CaseConfig::default(),
    };
    case.time.time_step = cli.time_step;
    case.time.time_step_order = cli.time_step_order;
    if let Some(t) = cli.final_time {
        case.time.final_time = t;
    }
    if let Some(period) = cli.snapshot_period {
        case.time.snapshot_period = Resolution::Delta(period);
    }

    let sim = case.build(cli.size_y as usize, cli.size_x as usize)?;
    println!("{sim}");

    Driver::new(sim)
        .with_observer(Logger)
        .with_observer(SnapshotWriter::new(cli.output_prefix))
        .run()?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = e.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
