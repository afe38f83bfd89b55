//! histeq - histogram equalization on CPU and GPU
//!
//! Equalizes 8-bit images through the histogram / cumulate / remap pipeline.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use histeq_compute::{Backend, Normalization, ScanStrategy};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

#[derive(Parser)]
#[command(name = "histeq")]
#[command(author, version, about = "Histogram equalization on CPU and GPU")]
#[command(long_about = "
Equalizes the per-channel intensity distribution of 8-bit images.
Runs on the CPU (rayon) or on a GPU through wgpu (Vulkan/Metal/DX12).

Examples:
  histeq equalize photo.png -o out.png          # Auto-select backend
  histeq equalize photo.png -o out.png -b cpu --report
  histeq equalize scan.jpg -o out.png -d 1 --scan direct
  histeq histogram photo.png --json             # Per-channel bin counts
  histeq histogram photo.png --cumulative
  histeq devices                                # List backends and adapters
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Number of threads (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Pipeline configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Equalize an image
    #[command(visible_alias = "eq")]
    Equalize(EqualizeArgs),

    /// Print per-channel histograms
    #[command(visible_alias = "hist")]
    Histogram(HistogramArgs),

    /// List compute backends and GPU adapters
    #[command(visible_alias = "ls")]
    Devices,
}

/// Options shared by every command that runs the pipeline.
#[derive(Args)]
struct PipelineArgs {
    /// Backend: auto, cpu, wgpu
    #[arg(short, long)]
    backend: Option<Backend>,

    /// GPU adapter index (see `histeq devices`)
    #[arg(short, long)]
    device: Option<usize>,

    /// Prefer a low-power adapter
    #[arg(long)]
    low_power: bool,

    /// Normalization: min-non-zero, linear
    #[arg(short, long)]
    normalization: Option<Normalization>,

    /// Prefix-sum strategy: blelloch, direct
    #[arg(short, long)]
    scan: Option<ScanStrategy>,

    /// Convert the input to this many channels (1-4) before processing
    #[arg(short, long)]
    channels: Option<u32>,
}

#[derive(Args)]
struct EqualizeArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    #[arg(short, long)]
    output: PathBuf,

    /// Print per-stage timings
    #[arg(short, long)]
    report: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args)]
struct HistogramArgs {
    /// Input image
    input: PathBuf,

    /// Print the cumulative histogram instead
    #[arg(long)]
    cumulative: bool,

    /// Machine-readable output (JSON)
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

/// Install the tracing subscriber. `RUST_LOG` overrides the `-v` level.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,histeq={level},histeq_compute={level},histeq_core={level}"))
    });
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("Invalid log file: {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            registry
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .context("Failed to initialize logging")?;
            Ok(Some(guard))
        }
        None => {
            registry
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .context("Failed to initialize logging")?;
            Ok(None)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log.as_deref())?;

    // Configure thread pool
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Equalize(args) => commands::equalize::run(args, config, cli.verbose),
        Commands::Histogram(args) => commands::histogram::run(args, config, cli.verbose),
        Commands::Devices => commands::devices::run(cli.verbose),
    }
}
