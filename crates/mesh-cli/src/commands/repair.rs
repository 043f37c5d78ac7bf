//! mesh-split repair command - run the repair sequence.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_kernel::{load_mesh, save_mesh};
use mesh_split::{NativeKernel, RepairReport, repair};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct RepairResult {
    input: String,
    output: String,
    #[serde(flatten)]
    report: RepairReport,
}

pub fn run(input: &Path, output_path: &Path, tolerance: f64, cli: &Cli) -> Result<()> {
    let mesh = load_mesh(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let (repaired, report) =
        repair(&NativeKernel, &mesh, tolerance).with_context(|| "Repair operation failed")?;

    save_mesh(&repaired, output_path)
        .with_context(|| format!("Failed to save repaired mesh to {:?}", output_path))?;

    let result = RepairResult {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        report,
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            output::success(
                &format!("Repaired mesh saved to {}", output_path.display()),
                cli.format,
                cli.quiet,
            );
            let r = &result.report;
            println!("  {}: {} → {}", "Faces".cyan(), r.faces_before, r.faces_after);
            if r.is_noop() {
                println!("  {}", "Nothing to repair".dimmed());
            }
            for (label, count) in [
                ("Vertices merged", r.vertices_merged),
                ("Degenerate faces removed", r.degenerate_removed),
                ("Duplicate faces removed", r.duplicates_removed),
                ("Holes filled", r.holes_filled),
                ("Faces flipped", r.faces_flipped),
                ("Components dropped", r.components_dropped),
            ] {
                if count > 0 {
                    println!("  {}: {}", label.green(), count);
                }
            }
        }
    }

    Ok(())
}
