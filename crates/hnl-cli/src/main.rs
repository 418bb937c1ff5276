//! hnlsel CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hnl_calib::MemoryCalibrationStore;
use hnl_select::{AnalysisConfig, EventProcessor};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

mod jsonl;

use jsonl::{JsonLinesSink, JsonLinesSource};

#[derive(Parser)]
#[command(name = "hnlsel")]
#[command(about = "hnlsel - object selection and scale-factor weights for HNL searches")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select objects and compute weights for every event of a JSON-lines file
    Run {
        /// Analysis configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Calibration tables (JSON). Not needed for data-only configurations.
        #[arg(short, long)]
        tables: Option<PathBuf>,

        /// Input events, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (one JSON object per event). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build the processor without reading events and print its outputs
    Validate {
        /// Analysis configuration (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Calibration tables (JSON)
        #[arg(short, long)]
        tables: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Run { config, tables, input, output } => {
            cmd_run(&config, tables.as_deref(), &input, output.as_deref())
        }
        Commands::Validate { config, tables } => cmd_validate(&config, tables.as_deref()),
    }
}

fn build_processor(
    config: &Path,
    tables: Option<&Path>,
) -> Result<(AnalysisConfig, EventProcessor)> {
    tracing::info!(path = %config.display(), "loading configuration");
    let analysis = AnalysisConfig::load(config)
        .with_context(|| format!("reading configuration {}", config.display()))?;

    let store = match tables {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading calibration tables");
            MemoryCalibrationStore::load_json(path)
                .with_context(|| format!("reading calibration tables {}", path.display()))?
        }
        None => MemoryCalibrationStore::new(),
    };
    tracing::info!(tables = store.len(), "calibration tables loaded");

    let processor = EventProcessor::new(&analysis, &store).context("invalid configuration")?;
    Ok((analysis, processor))
}

fn cmd_run(
    config: &Path,
    tables: Option<&Path>,
    input: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let (_, processor) = build_processor(config, tables)?;

    let file = File::open(input).with_context(|| format!("opening events {}", input.display()))?;
    let mut source = JsonLinesSource::new(BufReader::new(file));

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut sink = JsonLinesSink::new(BufWriter::new(writer));

    let start = std::time::Instant::now();
    let n_events = processor.run(&mut source, &mut sink)?;
    sink.finish()?;
    tracing::info!(
        events = n_events,
        elapsed_s = start.elapsed().as_secs_f64(),
        "processing complete"
    );
    Ok(())
}

fn cmd_validate(config: &Path, tables: Option<&Path>) -> Result<()> {
    let (analysis, processor) = build_processor(config, tables)?;
    let options = &analysis.global_options;
    let summary = serde_json::json!({
        "year": options.year,
        "is_data": options.is_data,
        "is_signal": options.is_signal,
        "outputs": processor.output_names(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
