//! mesh-split plan command - preview scale and cuts.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mesh_split::{Config, MeshSource, NativeKernel, plan};

use crate::{Cli, OutputFormat, output};

pub fn run(input: &Path, config: &Config, cli: &Cli) -> Result<()> {
    let preview = plan(
        &NativeKernel,
        MeshSource::Path(input.to_path_buf()),
        config,
    )
    .with_context(|| format!("Failed to plan {:?}", input))?;

    match cli.format {
        OutputFormat::Json => output::print(&preview, cli.format, cli.quiet),
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            println!("{}", "Decomposition Plan".bold().underline());
            println!("  {}: {}", "File".cyan(), input.display());
            println!("  {}: {:.6}", "Scale factor".cyan(), preview.scale_factor);
            println!(
                "  {}: {:.1} x {:.1} x {:.1} mm",
                "Scaled size".cyan(),
                preview.extents.x,
                preview.extents.y,
                preview.extents.z
            );
            println!("  {}: {:.1} mm", "Largest piece".cyan(), preview.max_piece_size);
            println!("  {}: {}", "Pieces".cyan(), preview.piece_count());

            for (plan, profile) in preview.plans.iter().zip(&preview.profiles) {
                let cuts: Vec<String> = plan.cuts().iter().map(|c| format!("{c:.1}")).collect();
                println!(
                    "  {} {}: {} piece(s), cuts at [{}]",
                    "Axis".cyan(),
                    plan.axis,
                    plan.pieces(),
                    cuts.join(", ")
                );
                if let Some(thin) = profile.thinnest() {
                    println!(
                        "    thinnest section {:.1} mm² at {:.1}",
                        thin.area,
                        thin.position - profile.min
                    );
                }
            }

            for w in &preview.warnings {
                output::warning(w.kind.as_str(), &w.details, &w.suggestion);
            }
        }
    }

    Ok(())
}
