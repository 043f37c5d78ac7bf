//! mesh-split split command - decompose and export.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_split::{Config, Decomposition, MeshSource, NativeKernel, decompose};
use serde::Serialize;
use tracing::info;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct SplitResult<'a> {
    input: String,
    output_dir: String,
    strategy: String,
    attempts: usize,
    scale_factor: f64,
    volume_ratio: f64,
    parts: &'a [mesh_split::ExportedPart],
    warnings: &'a [mesh_split::Warning],
}

pub fn run(input: &Path, config: &Config, cli: &Cli) -> Result<()> {
    info!(input = ?input, output = ?config.output_dir, bed = config.bed_size, "Splitting");

    let result: Decomposition = decompose(
        &NativeKernel,
        MeshSource::Path(input.to_path_buf()),
        config,
    )
    .with_context(|| format!("Failed to decompose {:?}", input))?;

    match cli.format {
        OutputFormat::Json => {
            let summary = SplitResult {
                input: input.display().to_string(),
                output_dir: result.output_dir.display().to_string(),
                strategy: result.strategy_used.to_string(),
                attempts: result.attempts,
                scale_factor: result.scale_factor,
                volume_ratio: result.volume_ratio,
                parts: &result.parts,
                warnings: &result.warnings,
            };
            output::print(&summary, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            output::success(
                &format!(
                    "{} parts written to {}",
                    result.parts.len(),
                    result.output_dir.display()
                ),
                cli.format,
                cli.quiet,
            );
            println!(
                "  {}: {} ({} attempt(s))",
                "Strategy".cyan(),
                result.strategy_used,
                result.attempts
            );
            println!("  {}: {:.6}", "Scale factor".cyan(), result.scale_factor);
            println!("  {}: {:.4}", "Volume ratio".cyan(), result.volume_ratio);

            let connectors: usize = result.parts.iter().map(|p| p.connectors.len()).sum();
            if connectors > 0 {
                println!("  {}: {}", "Connector features".cyan(), connectors);
            }

            for part in &result.parts {
                let e = part.bounds.extents();
                println!(
                    "    {} {} {:.1} x {:.1} x {:.1} mm{}",
                    part.file,
                    part.grid_index.to_string().dimmed(),
                    e.x,
                    e.y,
                    e.z,
                    if part.has_extremity { " (extremity)" } else { "" }
                );
            }

            if !result.warnings.is_empty() {
                println!("{}", "Warnings".yellow().bold());
                for w in &result.warnings {
                    output::warning(w.kind.as_str(), &w.details, &w.suggestion);
                }
            }
        }
    }

    Ok(())
}
