//! Top-level decomposition.
//!
//! [`decompose`] runs the whole pipeline for one request: load, assess,
//! optionally repair, scale, analyze, then split with retries until an
//! attempt passes validation, and finally export. Nothing is written to the
//! output directory until an attempt has been accepted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mesh_kernel::{Aabb, OperationTimer};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::advisor;
use crate::analysis::{AxisProfile, analyze};
use crate::config::{Config, Strategy};
use crate::connector::{ConnectorSpec, add_connectors};
use crate::deadline::Deadline;
use crate::error::{DecomposeError, GeometryError, SplitResult, ValidationFailure};
use crate::extremity::ExtremityRegion;
use crate::fragment::{Fragment, GridIndex};
use crate::grid::{GridLayout, KeepThresholds, split_grid};
use crate::kernel::GeometryKernel;
use crate::plan::{CutPlan, plan_axis};
use crate::recursive::split_recursive;
use crate::scale::normalize;
use crate::volume::{VolumeCheck, accept_gaps, check_volume, find_gaps};
use crate::warning::{Warning, WarningKind, write_warnings};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const WARNINGS_FILE: &str = "warnings.json";

/// Input of a decomposition: a file to load, or a mesh already in memory.
#[derive(Debug, Clone)]
pub enum MeshSource<M> {
    Path(PathBuf),
    Mesh(M),
}

impl<M> From<PathBuf> for MeshSource<M> {
    fn from(path: PathBuf) -> Self {
        MeshSource::Path(path)
    }
}

impl<M> From<&Path> for MeshSource<M> {
    fn from(path: &Path) -> Self {
        MeshSource::Path(path.to_path_buf())
    }
}

/// One exported fragment, as listed in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedPart {
    pub index: usize,
    pub file: String,
    pub grid_index: GridIndex,
    pub bounds: Aabb,
    /// Volume before connectors.
    pub volume: f64,
    pub has_extremity: bool,
    pub connectors: Vec<ConnectorSpec>,
    /// Closed shells in the exported file. A peg is its own shell touching
    /// the part across the cut, and a carved socket leaves the part as
    /// touching slabs; slicers union them when printing.
    #[serde(default)]
    pub shells: usize,
}

/// Contents of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub strategy: Strategy,
    pub scale_factor: f64,
    pub attempts: usize,
    pub original_volume: f64,
    pub volume_ratio: f64,
    pub parts: Vec<ExportedPart>,
}

/// Result of a successful [`decompose`].
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub output_dir: PathBuf,
    pub parts: Vec<ExportedPart>,
    pub warnings: Vec<Warning>,
    /// Attempts made, the accepted one included.
    pub attempts: usize,
    pub volume_ratio: f64,
    /// `Grid` or `Recursive`; never `Auto`.
    pub strategy_used: Strategy,
    pub scale_factor: f64,
}

impl Decomposition {
    pub fn part_paths(&self) -> Vec<PathBuf> {
        self.parts
            .iter()
            .map(|p| self.output_dir.join(&p.file))
            .collect()
    }
}

/// Scale and first-attempt cut plans, computed without splitting.
#[derive(Debug, Clone, Serialize)]
pub struct DecompositionPlan {
    pub scale_factor: f64,
    pub extents: Vector3<f64>,
    pub volume: f64,
    pub max_piece_size: f64,
    pub profiles: [AxisProfile; 3],
    pub plans: [CutPlan; 3],
    pub warnings: Vec<Warning>,
}

impl DecompositionPlan {
    pub fn piece_count(&self) -> usize {
        self.plans.iter().map(CutPlan::pieces).product()
    }
}

/// Mesh ready for splitting.
struct Prepared<M> {
    mesh: M,
    scale_factor: f64,
    extents: Vector3<f64>,
    volume: f64,
    warnings: Vec<Warning>,
}

/// An accepted attempt.
struct Accepted<M> {
    fragments: Vec<Fragment<M>>,
    layout: Option<GridLayout>,
    check: VolumeCheck,
    strategy: Strategy,
    warnings: Vec<Warning>,
}

/// Decompose a mesh into bed-sized parts and write them to `config.output_dir`.
///
/// Parts are `part_{n}.stl` in grid-index order, with a `manifest.json` and,
/// when there is something to report, a `warnings.json`.
///
/// # Errors
///
/// - [`DecomposeError::Config`] before any geometry work
/// - [`DecomposeError::Geometry`] when the mesh cannot be loaded, scaled or exported
/// - [`DecomposeError::NoValidDecomposition`] when every attempt is rejected
/// - [`DecomposeError::Timeout`] when the budget runs out; parts already
///   exported stay on disk
#[instrument(skip_all, fields(strategy = %config.strategy, output_dir = %config.output_dir.display()))]
pub fn decompose<K: GeometryKernel>(
    kernel: &K,
    source: MeshSource<K::Mesh>,
    config: &Config,
) -> SplitResult<Decomposition> {
    config.validate()?;
    let deadline = Deadline::start(Duration::from_secs(config.timeout_secs));

    let mut prepared = prepare(kernel, source, config)?;
    let mut warnings = std::mem::take(&mut prepared.warnings);
    deadline.check(0)?;

    let extremity = ExtremityRegion::detect(
        &kernel.vertex_positions(&prepared.mesh),
        config.height_axis,
        config.extremity_percentile,
    );
    debug!(
        threshold = extremity.threshold,
        points = extremity.len(),
        "Extremity region"
    );

    let profiles = {
        let _timer = OperationTimer::new("analysis");
        analyze(kernel, &prepared.mesh, config.cross_section_samples)
    };
    deadline.check(0)?;

    let (accepted, attempts) =
        run_attempts(kernel, &prepared, &profiles, &extremity, config, &deadline)?;
    warnings.extend(accepted.warnings);
    let mut fragments = accepted.fragments;

    if config.connectors.enabled {
        match &accepted.layout {
            Some(layout) => {
                let _timer = OperationTimer::new("connectors");
                warnings.extend(add_connectors(kernel, &mut fragments, layout, config));
            }
            None => warnings.push(Warning::new(
                WarningKind::ConnectorSkipped,
                "connectors need grid cuts; the recursive strategy was used",
                "Use the grid strategy or add alignment features manually",
            )),
        }
    }

    let parts = export(kernel, &fragments, &config.output_dir, &deadline)?;

    let manifest = Manifest {
        strategy: accepted.strategy,
        scale_factor: prepared.scale_factor,
        attempts,
        original_volume: prepared.volume,
        volume_ratio: accepted.check.ratio,
        parts,
    };
    write_manifest(&manifest, &config.output_dir.join(MANIFEST_FILE))?;
    if !warnings.is_empty() {
        write_warnings(&warnings, &config.output_dir.join(WARNINGS_FILE))?;
    }

    info!(
        parts = manifest.parts.len(),
        attempts,
        strategy = %accepted.strategy,
        ratio = format!("{:.4}", accepted.check.ratio),
        warnings = warnings.len(),
        elapsed_ms = deadline.elapsed().as_millis() as u64,
        "Decomposition complete"
    );

    Ok(Decomposition {
        output_dir: config.output_dir.clone(),
        parts: manifest.parts,
        warnings,
        attempts,
        volume_ratio: accepted.check.ratio,
        strategy_used: accepted.strategy,
        scale_factor: prepared.scale_factor,
    })
}

/// Compute the scale factor and first-attempt cut plans. Writes nothing.
#[instrument(skip_all)]
pub fn plan<K: GeometryKernel>(
    kernel: &K,
    source: MeshSource<K::Mesh>,
    config: &Config,
) -> SplitResult<DecompositionPlan> {
    config.validate()?;
    let prepared = prepare(kernel, source, config)?;
    let profiles = analyze(kernel, &prepared.mesh, config.cross_section_samples);
    let max_piece_size = config.max_piece_size();
    let plans = [0, 1, 2].map(|a| plan_axis(&profiles[a], max_piece_size));

    Ok(DecompositionPlan {
        scale_factor: prepared.scale_factor,
        extents: prepared.extents,
        volume: prepared.volume,
        max_piece_size,
        profiles,
        plans,
        warnings: prepared.warnings,
    })
}

/// Load, assess, repair if asked, then normalize.
fn prepare<K: GeometryKernel>(
    kernel: &K,
    source: MeshSource<K::Mesh>,
    config: &Config,
) -> SplitResult<Prepared<K::Mesh>> {
    let mesh = match source {
        MeshSource::Mesh(mesh) => mesh,
        MeshSource::Path(path) => {
            let _timer = OperationTimer::new("load");
            kernel.load(&path).map_err(|e| GeometryError::Load {
                path: path.clone(),
                source: Box::new(e),
            })?
        }
    };
    info!(faces = kernel.face_count(&mesh), "Mesh loaded");

    let mut warnings = advisor::assess(kernel, &mesh);

    let mesh = if config.repair {
        let _timer = OperationTimer::new("repair");
        match advisor::repair(kernel, &mesh, config.merge_tolerance) {
            Ok((repaired, _)) => repaired,
            Err(e) => {
                warnings.push(Warning::new(
                    WarningKind::RepairFailed,
                    e.to_string(),
                    "Continuing with the unrepaired mesh",
                ));
                mesh
            }
        }
    } else {
        mesh
    };

    let scaled = {
        let _timer = OperationTimer::new("scale");
        normalize(kernel, &mesh, config.target_height_mm(), config.height_axis)?
    };

    let volume = kernel.volume(&scaled.mesh);
    if !(volume.is_finite() && volume > 0.0) {
        return Err(GeometryError::EmptyMesh { volume }.into());
    }

    Ok(Prepared {
        mesh: scaled.mesh,
        scale_factor: scaled.factor,
        extents: scaled.extents,
        volume,
        warnings,
    })
}

/// Grid attempts on a shrinking bed, then one recursive attempt if allowed.
fn run_attempts<K: GeometryKernel>(
    kernel: &K,
    prepared: &Prepared<K::Mesh>,
    profiles: &[AxisProfile; 3],
    extremity: &ExtremityRegion,
    config: &Config,
    deadline: &Deadline,
) -> SplitResult<(Accepted<K::Mesh>, usize)> {
    let grid_attempts = match config.strategy {
        Strategy::Grid | Strategy::Auto => config.max_attempts,
        Strategy::Recursive => 0,
    };
    let mut attempts = 0;
    let mut last = ValidationFailure::NoFragments;

    for attempt in 0..grid_attempts {
        let bed = config.bed_size * config.bed_shrink_factor.powi(attempt as i32);
        let max_size = bed - config.safety_margin;
        if max_size <= 0.0 {
            break;
        }
        attempts += 1;
        info!(attempt = attempts, bed = format!("{:.1}", bed), "Grid attempt");

        match grid_attempt(kernel, prepared, profiles, extremity, max_size, config, deadline) {
            Ok(accepted) => return Ok((accepted, attempts)),
            Err(DecomposeError::Validation(failure)) => {
                warn!(attempt = attempts, reason = %failure, "Attempt rejected");
                last = failure;
            }
            Err(e) => return Err(e),
        }
    }

    if config.strategy != Strategy::Grid {
        attempts += 1;
        info!(attempt = attempts, "Recursive attempt");
        match recursive_attempt(kernel, prepared, extremity, config, deadline) {
            Ok(accepted) => return Ok((accepted, attempts)),
            Err(DecomposeError::Validation(failure)) => {
                warn!(attempt = attempts, reason = %failure, "Attempt rejected");
                last = failure;
            }
            Err(e) => return Err(e),
        }
    }

    Err(DecomposeError::NoValidDecomposition { attempts, last })
}

fn grid_attempt<K: GeometryKernel>(
    kernel: &K,
    prepared: &Prepared<K::Mesh>,
    profiles: &[AxisProfile; 3],
    extremity: &ExtremityRegion,
    max_size: f64,
    config: &Config,
    deadline: &Deadline,
) -> SplitResult<Accepted<K::Mesh>> {
    let plans = [0, 1, 2].map(|a| plan_axis(&profiles[a], max_size));
    for plan in &plans {
        plan.check(max_size)?;
    }
    let layout = GridLayout::new(plans);
    info!(dims = ?layout.dims(), max_size = format!("{:.1}", max_size), "Grid layout");

    let thresholds = KeepThresholds::from_fractions(
        prepared.volume,
        config.min_volume_fraction,
        config.extremity_volume_fraction,
    );
    let outcome = {
        let _timer = OperationTimer::new("grid split");
        split_grid(
            kernel,
            &prepared.mesh,
            &layout,
            extremity,
            thresholds,
            config.parallel,
            deadline,
        )?
    };

    let _timer = OperationTimer::new("validation");
    let check = check_volume(prepared.volume, &outcome.fragments, config.volume_tolerance)?;
    accept_gaps(&find_gaps(kernel, &prepared.mesh, &layout, &outcome.fragments))?;

    let warnings = outcome
        .failures
        .iter()
        .map(|f| {
            Warning::new(
                WarningKind::CellFailed,
                format!("{}: {}", f.index, f.error),
                "The cell was skipped; repairing the mesh may recover it",
            )
        })
        .collect();

    Ok(Accepted {
        fragments: outcome.fragments,
        layout: Some(layout),
        check,
        strategy: Strategy::Grid,
        warnings,
    })
}

fn recursive_attempt<K: GeometryKernel>(
    kernel: &K,
    prepared: &Prepared<K::Mesh>,
    extremity: &ExtremityRegion,
    config: &Config,
    deadline: &Deadline,
) -> SplitResult<Accepted<K::Mesh>> {
    let outcome = {
        let _timer = OperationTimer::new("recursive split");
        split_recursive(
            kernel,
            &prepared.mesh,
            config.max_piece_size(),
            extremity,
            deadline,
        )?
    };
    let check = check_volume(prepared.volume, &outcome.fragments, config.volume_tolerance)?;

    Ok(Accepted {
        fragments: outcome.fragments,
        layout: None,
        check,
        strategy: Strategy::Recursive,
        warnings: outcome.warnings,
    })
}

/// Write every fragment as `part_{n}.stl`, checking the deadline between parts.
fn export<K: GeometryKernel>(
    kernel: &K,
    fragments: &[Fragment<K::Mesh>],
    output_dir: &Path,
    deadline: &Deadline,
) -> SplitResult<Vec<ExportedPart>> {
    let _timer = OperationTimer::new("export");
    std::fs::create_dir_all(output_dir).map_err(|e| DecomposeError::io(output_dir, e))?;

    let mut parts = Vec::with_capacity(fragments.len());
    for (n, fragment) in fragments.iter().enumerate() {
        deadline.check(n)?;
        let file = format!("part_{n}.stl");
        let path = output_dir.join(&file);
        kernel
            .export(&fragment.mesh, &path)
            .map_err(|e| GeometryError::Export {
                path: path.clone(),
                source: Box::new(e),
            })?;
        debug!(part = n, index = %fragment.index, path = %path.display(), "Exported part");

        parts.push(ExportedPart {
            index: n,
            file,
            grid_index: fragment.index,
            bounds: kernel.bounds(&fragment.mesh).unwrap_or(fragment.bounds),
            volume: fragment.volume,
            has_extremity: fragment.has_extremity,
            connectors: fragment.connectors.clone(),
            shells: kernel.topology(&fragment.mesh).components,
        });
    }
    Ok(parts)
}

fn write_manifest(manifest: &Manifest, path: &Path) -> SplitResult<()> {
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| DecomposeError::io(path, std::io::Error::other(e)))?;
    std::fs::write(path, json).map_err(|e| DecomposeError::io(path, e))
}

/// Read a manifest written by [`decompose`].
pub fn read_manifest(path: &Path) -> SplitResult<Manifest> {
    let text = std::fs::read_to_string(path).map_err(|e| DecomposeError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| DecomposeError::io(path, std::io::Error::other(e)))
}
