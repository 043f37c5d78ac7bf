//! Grid splitting.
//!
//! The per-axis cut plans define a 3-D grid of boxes. Each box is intersected
//! with the mesh independently, so cells run in parallel when the kernel
//! allows it. Results are sorted by grid index before anyone numbers them.

use mesh_kernel::Aabb;
use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::deadline::Deadline;
use crate::error::{DecomposeError, GeometryError};
use crate::extremity::ExtremityRegion;
use crate::fragment::{Fragment, GridIndex};
use crate::kernel::GeometryKernel;
use crate::plan::CutPlan;

/// Cartesian product of three cut plans.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub plans: [CutPlan; 3],
}

impl GridLayout {
    pub fn new(plans: [CutPlan; 3]) -> Self {
        Self { plans }
    }

    /// Number of cells along each axis.
    pub fn dims(&self) -> [usize; 3] {
        [
            self.plans[0].pieces(),
            self.plans[1].pieces(),
            self.plans[2].pieces(),
        ]
    }

    pub fn cell_count(&self) -> usize {
        self.dims().iter().product()
    }

    pub fn contains(&self, index: &GridIndex) -> bool {
        let dims = self.dims();
        index.i < dims[0] && index.j < dims[1] && index.k < dims[2]
    }

    /// Box of one cell.
    pub fn cell(&self, index: &GridIndex) -> Option<Aabb> {
        if !self.contains(index) {
            return None;
        }
        let [x, y, z] = &self.plans;
        Some(Aabb::new(
            Point3::new(x.positions[index.i], y.positions[index.j], z.positions[index.k]),
            Point3::new(
                x.positions[index.i + 1],
                y.positions[index.j + 1],
                z.positions[index.k + 1],
            ),
        ))
    }

    /// Every cell in index order.
    pub fn cells(&self) -> Vec<(GridIndex, Aabb)> {
        let [ni, nj, nk] = self.dims();
        let mut cells = Vec::with_capacity(ni * nj * nk);
        for i in 0..ni {
            for j in 0..nj {
                for k in 0..nk {
                    let index = GridIndex::new(i, j, k);
                    if let Some(aabb) = self.cell(&index) {
                        cells.push((index, aabb));
                    }
                }
            }
        }
        cells
    }

    /// Position of the cut between cell `index` and its upper neighbour along `axis`.
    pub fn cut_above(&self, index: &GridIndex, axis: usize) -> Option<f64> {
        let plan = &self.plans[axis];
        let next = index.get(axis) + 1;
        (next < plan.pieces()).then(|| plan.positions[next])
    }
}

/// Volume thresholds as absolute values.
#[derive(Debug, Clone, Copy)]
pub struct KeepThresholds {
    pub general: f64,
    pub extremity: f64,
}

impl KeepThresholds {
    pub fn from_fractions(total_volume: f64, general: f64, extremity: f64) -> Self {
        Self {
            general: total_volume * general,
            extremity: total_volume * extremity,
        }
    }

    /// Extremity cells are kept whenever they hold material; others must
    /// exceed the general threshold.
    pub fn keeps(&self, volume: f64, has_extremity: bool) -> bool {
        volume > 0.0 && (has_extremity || volume > self.general)
    }

    /// Extremity cell small enough that only its extremity flag keeps it.
    pub fn is_extremity_sliver(&self, volume: f64, has_extremity: bool) -> bool {
        has_extremity && volume <= self.extremity
    }
}

/// A cell whose intersection failed. The cell is skipped.
#[derive(Debug)]
pub struct CellFailure {
    pub index: GridIndex,
    pub error: GeometryError,
}

/// A non-empty cell dropped by the volume threshold.
#[derive(Debug, Clone, Copy)]
pub struct DroppedCell {
    pub index: GridIndex,
    pub volume: f64,
    pub has_extremity: bool,
}

#[derive(Debug)]
pub struct GridOutcome<M> {
    pub fragments: Vec<Fragment<M>>,
    pub dropped: Vec<DroppedCell>,
    pub failures: Vec<CellFailure>,
}

enum CellResult<M> {
    Kept(Fragment<M>),
    Dropped(DroppedCell),
    Empty,
    Failed(CellFailure),
}

/// Intersect the mesh with every cell of `layout`.
///
/// Cell failures are recorded and skipped; volume validation decides whether
/// the result is still acceptable. Only an expired deadline aborts.
#[instrument(skip_all, fields(cells = layout.cell_count(), parallel = tracing::field::Empty))]
pub fn split_grid<K: GeometryKernel>(
    kernel: &K,
    mesh: &K::Mesh,
    layout: &GridLayout,
    extremity: &ExtremityRegion,
    thresholds: KeepThresholds,
    parallel: bool,
    deadline: &Deadline,
) -> Result<GridOutcome<K::Mesh>, DecomposeError> {
    let cells = layout.cells();
    let run_parallel = parallel && kernel.is_reentrant();
    tracing::Span::current().record("parallel", run_parallel);

    let process = |(index, aabb): &(GridIndex, Aabb)| -> Result<CellResult<K::Mesh>, DecomposeError> {
        deadline.check(0)?;
        Ok(split_cell(kernel, mesh, *index, aabb, extremity, &thresholds))
    };

    let results: Vec<CellResult<K::Mesh>> = if run_parallel {
        cells.par_iter().map(process).collect::<Result<_, _>>()?
    } else {
        cells.iter().map(process).collect::<Result<_, _>>()?
    };

    let mut outcome = GridOutcome {
        fragments: Vec::new(),
        dropped: Vec::new(),
        failures: Vec::new(),
    };
    for result in results {
        match result {
            CellResult::Kept(fragment) => outcome.fragments.push(fragment),
            CellResult::Dropped(cell) => outcome.dropped.push(cell),
            CellResult::Failed(failure) => outcome.failures.push(failure),
            CellResult::Empty => {}
        }
    }
    outcome.fragments.sort_by_key(|f| f.index);

    info!(
        kept = outcome.fragments.len(),
        dropped = outcome.dropped.len(),
        failed = outcome.failures.len(),
        "Grid split complete"
    );

    Ok(outcome)
}

fn split_cell<K: GeometryKernel>(
    kernel: &K,
    mesh: &K::Mesh,
    index: GridIndex,
    cell: &Aabb,
    extremity: &ExtremityRegion,
    thresholds: &KeepThresholds,
) -> CellResult<K::Mesh> {
    let piece = match kernel.intersect_box(mesh, cell) {
        Ok(Some(piece)) => piece,
        Ok(None) => return CellResult::Empty,
        Err(e) => {
            warn!(%index, error = %e, "Cell intersection failed");
            return CellResult::Failed(CellFailure {
                index,
                error: GeometryError::Intersect {
                    index,
                    source: Box::new(e),
                },
            });
        }
    };

    let volume = kernel.volume(&piece);
    let Some(bounds) = kernel.bounds(&piece) else {
        return CellResult::Empty;
    };
    if volume <= 0.0 {
        return CellResult::Empty;
    }

    let has_extremity = extremity.intersects(cell);
    if !thresholds.keeps(volume, has_extremity) {
        debug!(%index, volume, has_extremity, "Dropping sliver");
        return CellResult::Dropped(DroppedCell {
            index,
            volume,
            has_extremity,
        });
    }

    if thresholds.is_extremity_sliver(volume, has_extremity) {
        debug!(%index, volume, "Keeping extremity sliver below threshold");
    }
    debug!(%index, volume, has_extremity, "Kept cell");
    CellResult::Kept(Fragment {
        mesh: piece,
        index,
        bounds,
        cell: Some(*cell),
        has_extremity,
        volume,
        connectors: Vec::new(),
    })
}
