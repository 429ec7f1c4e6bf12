//! response-builder
//!
//! Learns multiple-Compton response matrices from a simulated event file and
//! its reconstruction, both in JSON lines format.

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser};

use compton_response::{
    GeometryDescription, JsonlReconstructionSource, JsonlSimulationSource, ResponseBuilder,
    ResponseConfig,
};

#[derive(Parser)]
#[command(name = "response-builder")]
#[command(about = "Learn Compton sequence response matrices from simulated events", long_about = None)]
struct Cli {
    /// Simulated events (JSON lines)
    #[arg(short, long)]
    simulation: PathBuf,

    /// Reconstructed event lists (JSON lines)
    #[arg(short, long)]
    reconstruction: PathBuf,

    /// Detector geometry description (JSON)
    #[arg(short, long)]
    geometry: PathBuf,

    /// Response configuration (JSON); defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Option string applied on top of the configuration, e.g. emin=200:emax=5000:maxia=5
    #[arg(long, default_value = "")]
    options: String,

    /// Output prefix; files are written as {prefix}.mc.{name}.rsp
    #[arg(short, long)]
    prefix: Option<PathBuf>,

    /// Stop after this many matched events
    #[arg(long)]
    max_events: Option<u64>,

    /// Write intermediate files every N matched events
    #[arg(long)]
    save_after: Option<u64>,

    /// Print the run summary as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_millis()
        .init();

    let mut config = match &cli.config {
        Some(path) => ResponseConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => ResponseConfig::default(),
    };
    if let Some(prefix) = cli.prefix {
        config.output_prefix = prefix;
    }
    if cli.max_events.is_some() {
        config.max_events = cli.max_events;
    }
    if let Some(save_after) = cli.save_after {
        config.save_after = save_after;
    }
    config
        .apply_options(&cli.options)
        .with_context(|| format!("applying options '{}'", cli.options))?;

    let geometry = GeometryDescription::from_json_file(&cli.geometry)
        .and_then(GeometryDescription::build)
        .with_context(|| format!("loading geometry {}", cli.geometry.display()))?;
    let simulation = JsonlSimulationSource::open(&cli.simulation)
        .with_context(|| format!("opening simulation {}", cli.simulation.display()))?;
    let reconstruction = JsonlReconstructionSource::open(&cli.reconstruction)
        .with_context(|| format!("opening reconstruction {}", cli.reconstruction.display()))?;

    let mut builder = ResponseBuilder::new(config, Box::new(simulation), Box::new(reconstruction), geometry)
        .context("initializing response builder")?;
    let summary = builder.run().context("building responses")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", summary.describe());
        println!(
            "responses written to {}.mc.*.rsp",
            builder.config().output_prefix.display()
        );
    }
    Ok(())
}
