//! Acceptance checks for a decomposition attempt.

use hashbrown::HashSet;
use nalgebra::Point3;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ValidationFailure;
use crate::fragment::{Fragment, GridIndex};
use crate::grid::GridLayout;
use crate::kernel::GeometryKernel;

/// Fragment volume total against the original.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeCheck {
    pub original: f64,
    pub total: f64,
    pub ratio: f64,
}

impl VolumeCheck {
    pub fn new(original: f64, total: f64) -> Self {
        let ratio = if original > 0.0 { total / original } else { 0.0 };
        Self {
            original,
            total,
            ratio,
        }
    }

    pub fn deviation(&self) -> f64 {
        (1.0 - self.ratio).abs()
    }

    pub fn accept(&self, tolerance: f64) -> Result<(), ValidationFailure> {
        if self.deviation() <= tolerance {
            Ok(())
        } else {
            Err(ValidationFailure::VolumeMismatch {
                original: self.original,
                total: self.total,
                ratio: self.ratio,
                tolerance,
            })
        }
    }
}

/// Sum the fragment volumes and accept if within `tolerance` of `original`.
pub fn check_volume<M>(
    original: f64,
    fragments: &[Fragment<M>],
    tolerance: f64,
) -> Result<VolumeCheck, ValidationFailure> {
    if fragments.is_empty() {
        return Err(ValidationFailure::NoFragments);
    }
    let total = fragments.iter().map(|f| f.volume).sum();
    let check = VolumeCheck::new(original, total);
    info!(
        original = format!("{:.3}", original),
        total = format!("{:.3}", total),
        ratio = format!("{:.4}", check.ratio),
        "Volume check"
    );
    check.accept(tolerance)?;
    Ok(check)
}

/// A grid cell missing from the fragment set although material reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gap {
    pub from: GridIndex,
    pub missing: GridIndex,
    /// Sample point on the shared cell face.
    pub point: Point3<f64>,
}

/// Look for missing neighbours.
///
/// For every fragment and each of its six neighbours inside the grid: if the
/// neighbour has no fragment but the mesh contains the centre of the shared
/// cell face, that is a gap. One containment test per direction; this is a
/// heuristic, not a topological adjacency check.
pub fn find_gaps<K: GeometryKernel>(
    kernel: &K,
    mesh: &K::Mesh,
    layout: &GridLayout,
    fragments: &[Fragment<K::Mesh>],
) -> Vec<Gap> {
    let present: HashSet<GridIndex> = fragments.iter().map(|f| f.index).collect();
    let mut reported: HashSet<GridIndex> = HashSet::new();
    let mut gaps = Vec::new();

    for fragment in fragments {
        let Some(cell) = layout.cell(&fragment.index) else {
            continue;
        };
        for axis in 0..3 {
            for delta in [-1isize, 1] {
                let Some(neighbour) = fragment.index.offset(axis, delta) else {
                    continue;
                };
                if !layout.contains(&neighbour) || present.contains(&neighbour) {
                    continue;
                }
                let mut point = cell.center();
                point[axis] = if delta < 0 { cell.min[axis] } else { cell.max[axis] };

                if kernel.contains_point(mesh, &point) && reported.insert(neighbour) {
                    debug!(from = %fragment.index, missing = %neighbour, "Gap detected");
                    gaps.push(Gap {
                        from: fragment.index,
                        missing: neighbour,
                        point,
                    });
                }
            }
        }
    }

    gaps
}

/// `Err(GapsDetected)` if `gaps` is not empty.
pub fn accept_gaps(gaps: &[Gap]) -> Result<(), ValidationFailure> {
    match gaps.first() {
        None => Ok(()),
        Some(first) => Err(ValidationFailure::GapsDetected {
            count: gaps.len(),
            from: first.from,
            missing: first.missing,
        }),
    }
}
