//! `mcml-run` - multi-layer photon transport from the command line
//!
//! Reads an MCI deck (or a JSON list of descriptors), runs every simulation
//! on the requested number of CPU devices and appends one summary line per
//! completed simulation to the output file.

mod mci;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;
use photon_transport_core_rs::results::append_summaries;
use photon_transport_core_rs::{run_simulations, SimulationDescriptor, SimulationOutcome};
use std::fs;
use std::path::{Path, PathBuf};

/// Monte Carlo photon transport in multi-layered media
#[derive(Parser, Debug)]
#[command(name = "mcml-run")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Monte Carlo multi-layer (MCML) photon transport", long_about = None)]
struct Cli {
    /// Input deck: an .mci file or a .json array of descriptors
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Summary file; one CSV line per completed simulation is appended
    #[arg(short = 'O', long)]
    output: PathBuf,

    /// Run seed
    #[arg(short = 'S', long, default_value_t = 0)]
    seed: u64,

    /// Number of compute devices
    #[arg(short = 'G', long = "n-devices", default_value_t = 1)]
    n_devices: usize,

    /// Skip the absorption grid (faster; no penetration depth)
    #[arg(short = 'A', long)]
    ignore_absorption: bool,

    /// Also write full results as JSON
    #[arg(long)]
    json_output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); falls back to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let level = level
        .and_then(|l| l.parse::<LevelFilter>().ok())
        .or_else(|| std::env::var("RUST_LOG").ok().and_then(|v| v.parse().ok()))
        .unwrap_or(LevelFilter::Info);

    env_logger::Builder::new().filter_level(level).format_timestamp_millis().init();
}

fn load_descriptors(path: &Path) -> Result<Vec<SimulationDescriptor>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&text).with_context(|| format!("parsing {} as JSON", path.display()))
    } else {
        mci::parse_mci(&text, &path.display().to_string())
            .with_context(|| format!("parsing {} as MCI", path.display()))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let mut descriptors = load_descriptors(&cli.input)?;
    if cli.ignore_absorption {
        for descriptor in &mut descriptors {
            descriptor.record_absorption = false;
        }
    }
    log::info!(
        "Loaded {} simulation(s) from {}",
        descriptors.len(),
        cli.input.display()
    );

    let outcomes = run_simulations(&descriptors, cli.n_devices, cli.seed);

    let written = append_summaries(&cli.output, outcomes.iter().filter_map(SimulationOutcome::result))
        .with_context(|| format!("writing {}", cli.output.display()))?;
    log::info!("Appended {} summary line(s) to {}", written, cli.output.display());

    if let Some(path) = &cli.json_output {
        let results: Vec<_> = outcomes.iter().filter_map(SimulationOutcome::result).collect();
        let json = serde_json::to_string_pretty(&results)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    let mut failed = 0;
    for outcome in &outcomes {
        match outcome {
            SimulationOutcome::Completed(result) => {
                let s = &result.summary;
                println!(
                    "{}: Rsp={:.6} Rd={:.6} A={:.6} T={:.6}",
                    result.label, s.specular_reflectance, s.diffuse_reflectance, s.absorption, s.transmittance
                );
            }
            SimulationOutcome::Cancelled(partial) => {
                println!("{}: cancelled after {} photons", partial.label, partial.photons_completed);
            }
            SimulationOutcome::Failed(failure) => {
                log::error!("{}: {}", failure.label, failure.error);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} simulation(s) failed", failed, outcomes.len());
    }
    Ok(())
}
