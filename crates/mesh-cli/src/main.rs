//! mesh-split: split a mesh into parts that fit a 3-D printer bed.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_split=info` - Attempts, layouts, validation
//! - `RUST_LOG=mesh_split=debug` - Per-cell and per-cut detail
//! - `RUST_LOG=mesh_kernel::timing=info` - Stage timing
//!
//! Without `RUST_LOG`, `-v`/`-vv`/`-vvv` select info/debug/trace and `-q`
//! shows errors only.
//!
//! # Example
//!
//! ```bash
//! # Six-foot statue on a 256 mm bed, with connectors
//! mesh-split split statue.stl -o parts --height 6 --unit feet --bed 256 --connectors
//!
//! # Preview the cut plan
//! mesh-split plan statue.stl --height 1800 --unit mm
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use miette::Diagnostic;
use mesh_split::{Axis, Config, ConfigError, DecomposeError, RepairFailure, Strategy, Unit};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{check, plan, repair, split};

/// mesh-split - decompose large meshes into printable parts.
///
/// Scales a closed mesh to a physical height and cuts it into pieces that
/// each fit the printer bed, preferring cuts through thin cross-sections.
#[derive(Parser)]
#[command(name = "mesh-split")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Only show errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose a mesh and write the parts
    Split {
        /// Input mesh file (STL or OBJ)
        input: PathBuf,

        /// Output directory for the parts
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Show the scale factor and cut plans without writing anything
    Plan {
        /// Input mesh file (STL or OBJ)
        input: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Report mesh problems that affect decomposition
    Check {
        /// Input mesh file (STL or OBJ)
        input: PathBuf,
    },

    /// Run the repair sequence and save the result
    Repair {
        /// Input mesh file (STL or OBJ)
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Vertex merge distance (mm)
        #[arg(long, default_value = "1e-6")]
        tolerance: f64,
    },
}

/// Configuration file plus per-field overrides.
#[derive(Args, Clone)]
pub struct ConfigArgs {
    /// TOML or JSON configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Target height, in --unit
    #[arg(long)]
    height: Option<f64>,

    /// Unit of --height (feet, inches, mm, m)
    #[arg(long)]
    unit: Option<Unit>,

    /// Axis scaled to the target height (x, y or z)
    #[arg(long)]
    axis: Option<Axis>,

    /// Printer bed edge length (mm)
    #[arg(long)]
    bed: Option<f64>,

    /// Subtracted from the bed to get the largest piece (mm)
    #[arg(long)]
    margin: Option<f64>,

    /// grid, recursive or auto
    #[arg(long)]
    strategy: Option<Strategy>,

    /// Add dovetail connectors between stacked parts
    #[arg(long)]
    connectors: bool,

    /// Repair the mesh before decomposing
    #[arg(long)]
    repair: bool,

    /// Split grid cells on one thread
    #[arg(long)]
    serial: bool,

    /// Wall-clock budget in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl ConfigArgs {
    /// Build the configuration: file (or defaults), then flags.
    pub fn resolve(&self, output_dir: Option<&Path>) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))?,
            None => Config::builder("parts").build()?,
        };

        if let Some(dir) = output_dir {
            config.output_dir = dir.to_path_buf();
        }
        if let Some(height) = self.height {
            config.target_height = height;
        }
        if let Some(unit) = self.unit {
            config.unit = unit;
        }
        if let Some(axis) = self.axis {
            config.height_axis = axis;
        }
        if let Some(bed) = self.bed {
            config.bed_size = bed;
        }
        if let Some(margin) = self.margin {
            config.safety_margin = margin;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        config.connectors.enabled |= self.connectors;
        config.repair |= self.repair;
        config.parallel &= !self.serial;

        config.validate()?;
        Ok(config)
    }
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    // RUST_LOG wins over the flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match (quiet, verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "mesh_split=info,mesh_kernel=info",
            (false, 2) => "mesh_split=debug,mesh_kernel=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

/// Print an error, with code and help text from the outermost error in the
/// chain that carries them.
fn report_error(error: &anyhow::Error) {
    eprintln!("{}: {}", "Error".red().bold(), error);
    for cause in error.chain().skip(1) {
        eprintln!("  {}: {}", "Caused by".yellow(), cause);
    }

    for cause in error.chain() {
        if let Some(mesh_err) = cause.downcast_ref::<mesh_kernel::MeshError>() {
            eprintln!("  {}: {}", "Code".cyan(), mesh_err.code());
            eprintln!(
                "  {}: {}",
                "Suggestion".green(),
                mesh_err.recovery_suggestion()
            );
            if let Some(location) = mesh_err.location() {
                eprintln!("  {}: {}", "Location".yellow(), location);
            }
            return;
        }

        let diagnostic = if let Some(e) = cause.downcast_ref::<DecomposeError>() {
            e as &dyn Diagnostic
        } else if let Some(e) = cause.downcast_ref::<ConfigError>() {
            e as &dyn Diagnostic
        } else if let Some(e) = cause.downcast_ref::<RepairFailure>() {
            e as &dyn Diagnostic
        } else {
            continue;
        };
        if let Some(code) = diagnostic.code() {
            eprintln!("  {}: {}", "Code".cyan(), code);
        }
        if let Some(help) = diagnostic.help() {
            eprintln!("  {}: {}", "Suggestion".green(), help);
        }
        return;
    }
}

fn main() -> Result<()> {
    // Nicer panic reports in development
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Split {
            input,
            output,
            config,
        } => config
            .resolve(output.as_deref())
            .and_then(|config| split::run(input, &config, &cli)),
        Commands::Plan { input, config } => config
            .resolve(None)
            .and_then(|config| plan::run(input, &config, &cli)),
        Commands::Check { input } => check::run(input, &cli),
        Commands::Repair {
            input,
            output,
            tolerance,
        } => repair::run(input, output, *tolerance, &cli),
    };

    if let Err(e) = &result {
        report_error(e);
        std::process::exit(1);
    }

    Ok(())
}
