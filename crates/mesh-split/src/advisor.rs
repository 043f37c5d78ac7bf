//! Mesh quality assessment and the optional repair path.
//!
//! Assessment never fails: every problem becomes a [`Warning`] with a
//! suggested fix. Repair runs a fixed sequence of kernel steps and keeps the
//! largest connected component.

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::RepairFailure;
use crate::kernel::{GeometryKernel, TopologyReport};
use crate::warning::{Warning, WarningKind};

/// Inspect `mesh` and describe what is wrong with it.
///
/// An empty result means the mesh is a clean closed solid.
pub fn assess<K: GeometryKernel>(kernel: &K, mesh: &K::Mesh) -> Vec<Warning> {
    let report = kernel.topology(mesh);
    let warnings = warnings_for(&report);
    debug!(
        boundary_edges = report.boundary_edges,
        non_manifold_edges = report.non_manifold_edges,
        components = report.components,
        warnings = warnings.len(),
        "Assessed mesh"
    );
    warnings
}

fn warnings_for(report: &TopologyReport) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if !report.is_watertight() || !report.is_manifold() {
        warnings.push(Warning::new(
            WarningKind::NonManifoldEdges,
            format!(
                "{} boundary edges, {} edges shared by more than two faces",
                report.boundary_edges, report.non_manifold_edges
            ),
            "Enable repair, or close the mesh in a modeling tool before splitting",
        ));
    }
    if report.inconsistent_edges > 0 {
        warnings.push(Warning::new(
            WarningKind::InconsistentOrientation,
            format!("{} edges with conflicting face winding", report.inconsistent_edges),
            "Enable repair to unify face orientation",
        ));
    }
    if report.signed_volume < 0.0 {
        warnings.push(Warning::new(
            WarningKind::InvertedNormals,
            format!("signed volume is {:.3}", report.signed_volume),
            "Enable repair to flip the normals outward",
        ));
    }
    if report.components > 1 {
        warnings.push(Warning::new(
            WarningKind::MultipleComponents,
            format!("{} disconnected shells", report.components),
            "Repair keeps only the largest shell; separate the parts first if all are needed",
        ));
    }

    warnings
}

/// What the repair path changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairReport {
    pub faces_before: usize,
    pub faces_after: usize,
    pub vertices_merged: usize,
    pub degenerate_removed: usize,
    pub duplicates_removed: usize,
    pub holes_filled: usize,
    pub faces_flipped: usize,
    pub components_dropped: usize,
}

impl RepairReport {
    /// True if the mesh was already clean.
    pub fn is_noop(&self) -> bool {
        self.vertices_merged == 0
            && self.degenerate_removed == 0
            && self.duplicates_removed == 0
            && self.holes_filled == 0
            && self.faces_flipped == 0
            && self.components_dropped == 0
    }
}

/// Run the repair sequence and return the repaired copy.
///
/// Steps: merge close vertices, drop degenerate and duplicate faces, fill
/// holes, make normals consistent and outward, keep the largest component.
/// Running it on its own output changes nothing.
#[instrument(skip_all, fields(tolerance = tolerance))]
pub fn repair<K: GeometryKernel>(
    kernel: &K,
    mesh: &K::Mesh,
    tolerance: f64,
) -> Result<(K::Mesh, RepairReport), RepairFailure> {
    let mut mesh = mesh.clone();
    let mut report = RepairReport {
        faces_before: kernel.face_count(&mesh),
        ..Default::default()
    };

    report.vertices_merged = kernel.merge_vertices(&mut mesh, tolerance);
    report.degenerate_removed = kernel.remove_degenerate_faces(&mut mesh);
    report.duplicates_removed = kernel.remove_duplicate_faces(&mut mesh);
    report.holes_filled = kernel
        .fill_holes(&mut mesh)
        .map_err(|e| kernel_failure("fill holes", e))?;
    report.faces_flipped = kernel
        .fix_normals(&mut mesh)
        .map_err(|e| kernel_failure("fix normals", e))?;

    let mut components = kernel.split_connected_components(&mesh);
    if components.len() > 1 {
        report.components_dropped = components.len() - 1;
        components.sort_by_key(|c| std::cmp::Reverse(kernel.face_count(c)));
        if let Some(largest) = components.into_iter().next() {
            mesh = largest;
        }
    }

    report.faces_after = kernel.face_count(&mesh);
    if report.faces_after == 0 {
        return Err(RepairFailure::EmptyResult {
            faces_before: report.faces_before,
        });
    }

    info!(
        faces_before = report.faces_before,
        faces_after = report.faces_after,
        holes_filled = report.holes_filled,
        faces_flipped = report.faces_flipped,
        components_dropped = report.components_dropped,
        "Repair complete"
    );
    Ok((mesh, report))
}

fn kernel_failure<E>(step: &'static str, error: E) -> RepairFailure
where
    E: std::error::Error + Send + Sync + 'static,
{
    RepairFailure::Kernel {
        step,
        source: Box::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::NativeKernel;
    use approx::assert_relative_eq;
    use mesh_kernel::{Aabb, Mesh};
    use nalgebra::{Point3, Vector3};

    fn cube(min: f64, size: f64) -> Mesh {
        Mesh::cuboid(&Aabb::new(
            Point3::new(min, min, min),
            Point3::new(min + size, min + size, min + size),
        ))
    }

    #[test]
    fn test_clean_cube_has_no_warnings() {
        assert!(assess(&NativeKernel, &cube(0.0, 10.0)).is_empty());
    }

    #[test]
    fn test_open_mesh_is_flagged() {
        let mut mesh = cube(0.0, 10.0);
        mesh.faces.pop();
        let warnings = assess(&NativeKernel, &mesh);
        assert!(warnings.iter().any(|w| w.kind == WarningKind::NonManifoldEdges));
        assert_eq!(warnings[0].kind.as_str(), "non-manifold edges detected");
    }

    #[test]
    fn test_inverted_cube_is_flagged() {
        let mut mesh = cube(0.0, 10.0);
        mesh.flip();
        let kinds: Vec<WarningKind> = assess(&NativeKernel, &mesh).into_iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::InvertedNormals]);
    }

    #[test]
    fn test_two_shells_are_flagged() {
        let mut mesh = cube(0.0, 10.0);
        mesh.append(&cube(20.0, 2.0));
        let kinds: Vec<WarningKind> = assess(&NativeKernel, &mesh).into_iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::MultipleComponents]);
    }

    #[test]
    fn test_repair_closes_hole_and_keeps_largest_shell() {
        let mut mesh = cube(0.0, 10.0);
        mesh.faces.pop();
        mesh.append(&cube(20.0, 2.0));

        let (repaired, report) = repair(&NativeKernel, &mesh, 1e-6).unwrap();
        assert_eq!(report.holes_filled, 1);
        assert_eq!(report.components_dropped, 1);
        assert_eq!(report.faces_after, 12);
        assert!(repaired.is_watertight());
        assert_relative_eq!(repaired.signed_volume(), 1000.0, epsilon = 1e-9);
        assert!(assess(&NativeKernel, &repaired).is_empty());
    }

    #[test]
    fn test_repair_flips_inverted_mesh() {
        let mut mesh = cube(0.0, 10.0);
        mesh.flip();
        let (repaired, report) = repair(&NativeKernel, &mesh, 1e-6).unwrap();
        assert_eq!(report.faces_flipped, 12);
        assert!(repaired.signed_volume() > 0.0);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let mut mesh = cube(0.0, 10.0);
        mesh.faces.pop();
        mesh.translate(Vector3::new(1.0, 2.0, 3.0));

        let (once, _) = repair(&NativeKernel, &mesh, 1e-6).unwrap();
        let (twice, report) = repair(&NativeKernel, &once, 1e-6).unwrap();
        assert!(report.is_noop(), "{report:?}");
        assert_eq!(once.face_count(), twice.face_count());
        assert_eq!(once.vertex_count(), twice.vertex_count());
        assert_relative_eq!(once.signed_volume(), twice.signed_volume(), epsilon = 1e-12);
    }

    #[test]
    fn test_repair_of_empty_mesh_fails() {
        let result = repair(&NativeKernel, &Mesh::new(), 1e-6);
        assert!(matches!(
            result,
            Err(RepairFailure::EmptyResult { faces_before: 0 })
        ));
    }
}
