//! Mesh validation and reporting.

use nalgebra::Point3;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::adjacency::MeshAdjacency;
use crate::components::find_connected_components;
use crate::error::{MeshError, MeshResult};

/// Validation report for a mesh.
#[derive(Debug, Clone, Serialize)]
pub struct MeshReport {
    /// Whether the mesh has no boundary edges.
    pub is_watertight: bool,

    /// Whether all edges have at most 2 adjacent faces.
    pub is_manifold: bool,

    /// Number of boundary edges (edges with 1 adjacent face).
    pub boundary_edge_count: usize,

    /// Number of non-manifold edges (edges with >2 adjacent faces).
    pub non_manifold_edge_count: usize,

    /// Interior edges whose two faces traverse them in the same direction.
    pub inconsistent_edge_count: usize,

    pub vertex_count: usize,
    pub face_count: usize,

    /// Bounding box as (min_corner, max_corner).
    pub bounds: Option<(Point3<f64>, Point3<f64>)>,

    /// Signed volume (positive = outward normals). Only meaningful when watertight.
    pub signed_volume: f64,

    pub volume: f64,
    pub surface_area: f64,

    pub component_count: usize,
}

impl MeshReport {
    /// Check if mesh passes basic validity checks.
    pub fn is_valid(&self) -> bool {
        self.vertex_count > 0 && self.face_count > 0
    }

    /// Whether the mesh appears to be inside-out (negative signed volume).
    pub fn is_inside_out(&self) -> bool {
        self.signed_volume < 0.0
    }

    /// Watertight, manifold, consistently wound, and enclosing positive volume.
    ///
    /// This is the "encloses a solid" test decomposition relies on.
    pub fn is_closed_volume(&self) -> bool {
        self.is_watertight
            && self.is_manifold
            && self.inconsistent_edge_count == 0
            && self.signed_volume > 0.0
    }

    pub fn dimensions(&self) -> Option<(f64, f64, f64)> {
        self.bounds
            .map(|(min, max)| (max.x - min.x, max.y - min.y, max.z - min.z))
    }
}

impl std::fmt::Display for MeshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Mesh Report:")?;
        writeln!(f, "  Vertices: {}", self.vertex_count)?;
        writeln!(f, "  Faces: {}", self.face_count)?;
        writeln!(f, "  Components: {}", self.component_count)?;

        if let Some((min, max)) = &self.bounds {
            writeln!(
                f,
                "  Bounds: [{:.1}, {:.1}, {:.1}] to [{:.1}, {:.1}, {:.1}]",
                min.x, min.y, min.z, max.x, max.y, max.z
            )?;
        }
        if let Some((dx, dy, dz)) = self.dimensions() {
            writeln!(f, "  Dimensions: {:.1} x {:.1} x {:.1}", dx, dy, dz)?;
        }

        writeln!(f, "  Surface Area: {:.2}", self.surface_area)?;
        writeln!(
            f,
            "  Volume: {:.2} (signed: {:.2})",
            self.volume, self.signed_volume
        )?;
        writeln!(
            f,
            "  Watertight: {} (boundary edges: {})",
            if self.is_watertight { "yes" } else { "NO" },
            self.boundary_edge_count
        )?;
        writeln!(
            f,
            "  Manifold: {} (non-manifold edges: {})",
            if self.is_manifold { "yes" } else { "NO" },
            self.non_manifold_edge_count
        )?;
        write!(
            f,
            "  Orientation: {}",
            if self.inconsistent_edge_count > 0 {
                "INCONSISTENT"
            } else if self.is_inside_out() {
                "INSIDE-OUT"
            } else {
                "correct"
            }
        )
    }
}

/// Validate a mesh and return a report.
pub fn validate_mesh(mesh: &Mesh) -> MeshReport {
    let adjacency = MeshAdjacency::build(&mesh.faces);

    let boundary_edge_count = adjacency.boundary_edge_count();
    let non_manifold_edge_count = adjacency.non_manifold_edge_count();
    let signed_volume = mesh.signed_volume();

    let report = MeshReport {
        is_watertight: boundary_edge_count == 0,
        is_manifold: non_manifold_edge_count == 0,
        boundary_edge_count,
        non_manifold_edge_count,
        inconsistent_edge_count: adjacency.inconsistent_edge_count(),
        vertex_count: mesh.vertex_count(),
        face_count: mesh.face_count(),
        bounds: mesh.bounds(),
        signed_volume,
        volume: signed_volume.abs(),
        surface_area: mesh.surface_area(),
        component_count: find_connected_components(mesh).component_count,
    };

    debug!("{}", report);
    report
}

/// Log a one-line summary of a report, with a warning per defect.
pub fn log_validation(report: &MeshReport) {
    let (dx, dy, dz) = report.dimensions().unwrap_or_default();
    info!(
        "Mesh: {} verts, {} faces, {:.1}x{:.1}x{:.1}",
        report.vertex_count, report.face_count, dx, dy, dz
    );

    if report.is_closed_volume() {
        info!("Mesh is watertight and consistently oriented");
        return;
    }
    if !report.is_watertight {
        warn!(
            "Not watertight: {} boundary edges",
            report.boundary_edge_count
        );
    }
    if !report.is_manifold {
        warn!(
            "Not manifold: {} non-manifold edges",
            report.non_manifold_edge_count
        );
    }
    if report.inconsistent_edge_count > 0 {
        warn!(
            "Inconsistent winding on {} edges",
            report.inconsistent_edge_count
        );
    } else if report.is_watertight && report.is_inside_out() {
        warn!("Mesh appears to be inside-out (negative signed volume)");
    }
}

/// Reject meshes with non-finite coordinates or face indices past the vertex array.
///
/// Every other kernel operation indexes vertices without bounds checks, so
/// loaders run this before handing a mesh out.
pub fn check_mesh_data(mesh: &Mesh) -> MeshResult<()> {
    for (vertex_index, vertex) in mesh.vertices.iter().enumerate() {
        for (coordinate, value) in [
            ("x", vertex.position.x),
            ("y", vertex.position.y),
            ("z", vertex.position.z),
        ] {
            if !value.is_finite() {
                return Err(MeshError::InvalidCoordinate {
                    vertex_index,
                    coordinate,
                    value,
                });
            }
        }
    }

    let vertex_count = mesh.vertices.len();
    for (face_index, face) in mesh.faces.iter().enumerate() {
        if let Some(&bad) = face.iter().find(|&&v| v as usize >= vertex_count) {
            return Err(MeshError::invalid_vertex_index(face_index, bad, vertex_count));
        }
    }

    debug!("Mesh data validation passed");
    Ok(())
}
