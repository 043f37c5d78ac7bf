//! Recursive bisection.
//!
//! While a piece is larger than the bed envelope, cut it in half across its
//! largest dimension. Pending pieces live on an explicit stack, so depth is
//! bounded and the deadline is checked between steps.

use mesh_kernel::Plane;
use tracing::{debug, info, instrument, warn};

use crate::config::Axis;
use crate::deadline::Deadline;
use crate::error::{DecomposeError, GeometryError};
use crate::extremity::ExtremityRegion;
use crate::fragment::{Fragment, GridIndex};
use crate::kernel::GeometryKernel;
use crate::warning::{Warning, WarningKind};

/// Bisection depth at which a piece is exported as is.
pub const MAX_DEPTH: usize = 32;

#[derive(Debug)]
pub struct RecursiveOutcome<M> {
    pub fragments: Vec<Fragment<M>>,
    pub warnings: Vec<Warning>,
}

struct Pending<M> {
    mesh: M,
    depth: usize,
}

/// Bisect until every piece fits `max_size` on every axis.
///
/// A failed cut does not abort: the piece is exported as a best-effort
/// fragment and a warning is recorded. Leaves are numbered in the order they
/// are finished, lower halves first.
#[instrument(skip_all, fields(max_size = max_size))]
pub fn split_recursive<K: GeometryKernel>(
    kernel: &K,
    mesh: &K::Mesh,
    max_size: f64,
    extremity: &ExtremityRegion,
    deadline: &Deadline,
) -> Result<RecursiveOutcome<K::Mesh>, DecomposeError> {
    let mut stack = vec![Pending {
        mesh: mesh.clone(),
        depth: 0,
    }];
    let mut outcome = RecursiveOutcome {
        fragments: Vec::new(),
        warnings: Vec::new(),
    };

    while let Some(Pending { mesh, depth }) = stack.pop() {
        deadline.check(0)?;

        let Some(bounds) = kernel.bounds(&mesh) else {
            continue;
        };
        let extents = bounds.extents();
        let Some(axis) = Axis::ALL
            .into_iter()
            .filter(|a| extents[a.index()] > max_size * (1.0 + 1e-9))
            .max_by(|a, b| extents[a.index()].total_cmp(&extents[b.index()]))
        else {
            push_leaf(kernel, mesh, extremity, &mut outcome);
            continue;
        };

        if depth >= MAX_DEPTH {
            outcome.warnings.push(Warning::new(
                WarningKind::OversizedFragment,
                format!("bisection stopped at depth {depth} with a {:.1} mm piece", extents.max()),
                "Check the mesh for stray geometry far from the model",
            ));
            push_leaf(kernel, mesh, extremity, &mut outcome);
            continue;
        }

        let mid = bounds.center()[axis.index()];
        match bisect(kernel, &mesh, axis, mid) {
            Ok((Some(lower), Some(upper))) => {
                debug!(axis = %axis, position = mid, depth, "Bisected");
                stack.push(Pending {
                    mesh: upper,
                    depth: depth + 1,
                });
                stack.push(Pending {
                    mesh: lower,
                    depth: depth + 1,
                });
            }
            Ok(_) => {
                // One side empty: the plane missed the piece
                outcome.warnings.push(Warning::new(
                    WarningKind::SplitFailed,
                    format!("cut along {axis} at {mid:.3} left one side empty"),
                    "The piece is exported oversized",
                ));
                push_leaf(kernel, mesh, extremity, &mut outcome);
            }
            Err(e) => {
                warn!(axis = %axis, position = mid, error = %e, "Bisection failed");
                outcome.warnings.push(Warning::new(
                    WarningKind::SplitFailed,
                    e.to_string(),
                    "The piece is exported oversized; try repairing the mesh",
                ));
                push_leaf(kernel, mesh, extremity, &mut outcome);
            }
        }
    }

    info!(pieces = outcome.fragments.len(), "Recursive split complete");
    Ok(outcome)
}

/// Capped halves below and above `position`.
fn bisect<K: GeometryKernel>(
    kernel: &K,
    mesh: &K::Mesh,
    axis: Axis,
    position: f64,
) -> Result<(Option<K::Mesh>, Option<K::Mesh>), GeometryError> {
    let upper_plane = Plane::axis_aligned(axis.index(), position, true);
    let slice = |plane: &Plane| {
        kernel
            .slice_by_plane(mesh, plane, true)
            .map_err(|e| GeometryError::Slice {
                axis,
                position,
                source: Box::new(e),
            })
    };
    let lower = slice(&upper_plane.flipped())?;
    let upper = slice(&upper_plane)?;
    Ok((lower, upper))
}

fn push_leaf<K: GeometryKernel>(
    kernel: &K,
    mesh: K::Mesh,
    extremity: &ExtremityRegion,
    outcome: &mut RecursiveOutcome<K::Mesh>,
) {
    let Some(bounds) = kernel.bounds(&mesh) else {
        return;
    };
    let volume = kernel.volume(&mesh);
    let index = GridIndex::new(outcome.fragments.len(), 0, 0);
    outcome.fragments.push(Fragment {
        has_extremity: extremity.intersects(&bounds),
        mesh,
        index,
        bounds,
        cell: None,
        volume,
        connectors: Vec::new(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::NativeKernel;
    use approx::assert_relative_eq;
    use mesh_kernel::{Aabb, Mesh};
    use nalgebra::Point3;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::start(Duration::from_secs(60))
    }

    #[test]
    fn test_small_mesh_is_one_leaf() {
        let mesh = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(10.0, 10.0, 10.0)));
        let outcome =
            split_recursive(&NativeKernel, &mesh, 20.0, &ExtremityRegion::default(), &deadline())
                .unwrap();
        assert_eq!(outcome.fragments.len(), 1);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_bar_is_bisected_until_it_fits() {
        // 100 long: 100 -> 50 -> 25 -> 12.5
        let mesh = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(100.0, 10.0, 10.0)));
        let outcome =
            split_recursive(&NativeKernel, &mesh, 20.0, &ExtremityRegion::default(), &deadline())
                .unwrap();

        assert_eq!(outcome.fragments.len(), 8);
        for fragment in &outcome.fragments {
            assert!(fragment.fits(20.0));
            assert_relative_eq!(fragment.volume, 1250.0, epsilon = 1e-6);
        }
        // Lower halves come first
        let xs: Vec<f64> = outcome.fragments.iter().map(|f| f.bounds.min.x).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(outcome.fragments[3].index, GridIndex::new(3, 0, 0));
    }

    #[test]
    fn test_largest_dimension_is_cut_first() {
        let mesh = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(30.0, 50.0, 10.0)));
        let outcome =
            split_recursive(&NativeKernel, &mesh, 40.0, &ExtremityRegion::default(), &deadline())
                .unwrap();
        // y halves to 25; x = 30 already fits
        assert_eq!(outcome.fragments.len(), 2);
        assert_relative_eq!(outcome.fragments[0].bounds.max.y, 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extremity_flag() {
        let mesh = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(10.0, 10.0, 40.0)));
        let tip = ExtremityRegion {
            threshold: 39.0,
            points: vec![Point3::new(5.0, 5.0, 40.0)],
        };
        let outcome = split_recursive(&NativeKernel, &mesh, 25.0, &tip, &deadline()).unwrap();
        assert_eq!(outcome.fragments.len(), 2);
        assert!(!outcome.fragments[0].has_extremity);
        assert!(outcome.fragments[1].has_extremity);
    }
}
