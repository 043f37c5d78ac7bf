//! mesh-split check command - report mesh problems without decomposing.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_kernel::{MeshReport, load_mesh, validate_mesh};
use mesh_split::{NativeKernel, Warning, assess};
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Serialize)]
struct CheckResult {
    path: String,
    ready: bool,
    report: MeshReport,
    warnings: Vec<Warning>,
}

pub fn run(input: &Path, cli: &Cli) -> Result<()> {
    let mesh = load_mesh(input).with_context(|| format!("Failed to load mesh from {:?}", input))?;

    let report = validate_mesh(&mesh);
    let warnings = assess(&NativeKernel, &mesh);
    let result = CheckResult {
        path: input.display().to_string(),
        ready: warnings.is_empty(),
        report,
        warnings,
    };

    match cli.format {
        OutputFormat::Json => output::print(&result, cli.format, cli.quiet),
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            let r = &result.report;
            println!("{}", "Mesh Check".bold().underline());
            println!("  {}: {}", "File".cyan(), input.display());
            println!("  {}: {}", "Vertices".cyan(), r.vertex_count);
            println!("  {}: {}", "Faces".cyan(), r.face_count);
            println!("  {}: {}", "Components".cyan(), r.component_count);
            if let Some((min, max)) = r.bounds {
                let d = max - min;
                println!(
                    "  {}: {:.2} x {:.2} x {:.2}",
                    "Dimensions".cyan(),
                    d.x,
                    d.y,
                    d.z
                );
            }
            println!("  {}: {:.2}", "Signed volume".cyan(), r.signed_volume);

            if result.ready {
                output::success("Mesh is a closed, consistently oriented solid", cli.format, cli.quiet);
            } else {
                println!("{}", "Problems".yellow().bold());
                for w in &result.warnings {
                    output::warning(w.kind.as_str(), &w.details, &w.suggestion);
                }
            }
        }
    }

    Ok(())
}
