//! Triangle mesh kernel for bed-constrained decomposition.
//!
//! This crate provides the geometry the `mesh-split` engine is built on:
//! indexed mesh storage, STL/OBJ I/O, topology queries, capped plane
//! clipping, convex intersection and box subtraction, planar cross-sections,
//! point containment, and a repair pipeline.
//!
//! # Units and Scale
//!
//! **All coordinates are millimeters.** Tolerances for clipping scale with
//! the size of the mesh; the default welding tolerance is `1e-6`.
//!
//! # Coordinate System
//!
//! Right-handed. Face winding is **counter-clockwise (CCW) when viewed from
//! outside**, so normals point outward by the right-hand rule and a closed,
//! correctly oriented mesh has positive signed volume.
//!
//! # Thread Safety
//!
//! Every operation either takes `&Mesh` and returns new values or mutates a
//! `&mut Mesh` it exclusively holds. There is no global state, so calls on
//! shared meshes may run concurrently.
//!
//! # Quick Start
//!
//! ```no_run
//! use mesh_kernel::{Mesh, Plane, clip_by_plane};
//!
//! let mut mesh = Mesh::load("model.stl").unwrap();
//!
//! let report = mesh.validate();
//! println!("{}", report);
//! if !report.is_closed_volume() {
//!     mesh.repair().unwrap();
//! }
//!
//! let upper = clip_by_plane(&mesh, &Plane::axis_aligned(2, 100.0, true), true).unwrap();
//! if let Some(upper) = upper {
//!     upper.save("upper.stl").unwrap();
//! }
//! ```

mod error;
mod types;

pub mod adjacency;
pub mod boolean;
pub mod clip;
pub mod components;
pub mod holes;
pub mod io;
pub mod repair;
pub mod section;
pub mod tracing_ext;
pub mod triangulate;
pub mod validate;
pub mod winding;

pub use error::{ErrorCode, MeshError, MeshLocation, MeshResult, RecoverySuggestion};
pub use types::{Aabb, Mesh, Plane, Triangle, Vertex};

pub use adjacency::MeshAdjacency;
pub use boolean::{contains_point, intersect_box, intersect_convex, merge, subtract_box};
pub use clip::{clip_by_plane, split_by_plane};
pub use components::{
    ComponentAnalysis, find_connected_components, keep_largest_component, split_into_components,
};
pub use holes::{BoundaryLoop, detect_holes, fill_holes, fill_holes_with_max_edges};
pub use io::{MeshFormat, load_mesh, save_mesh, save_obj, save_stl};
pub use repair::{
    RepairParams, RepairSummary, remove_degenerate_triangles, remove_duplicate_faces,
    remove_unreferenced_vertices, repair_mesh, repair_mesh_with_config, weld_vertices,
};
pub use section::{CrossSection, cross_section, cross_section_area};
pub use tracing_ext::OperationTimer;
pub use validate::{MeshReport, check_mesh_data, log_validation, validate_mesh};
pub use winding::{fix_winding_order, orient_outward};

impl Mesh {
    /// Load a mesh from file, auto-detecting format from extension.
    pub fn load(path: impl AsRef<std::path::Path>) -> MeshResult<Self> {
        load_mesh(path.as_ref())
    }

    /// Save the mesh, choosing the format from the extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> MeshResult<()> {
        save_mesh(self, path.as_ref())
    }

    /// Validate the mesh and return a report.
    pub fn validate(&self) -> MeshReport {
        validate_mesh(self)
    }

    /// Run the repair pipeline with default parameters.
    pub fn repair(&mut self) -> MeshResult<RepairSummary> {
        repair_mesh(self)
    }

    /// Run the repair pipeline with custom parameters.
    pub fn repair_with_config(&mut self, params: &RepairParams) -> MeshResult<RepairSummary> {
        repair_mesh_with_config(self, params)
    }

    /// Split into separate meshes, one per connected component, largest first.
    pub fn split_components(&self) -> Vec<Mesh> {
        split_into_components(self)
    }

    /// No boundary edges.
    pub fn is_watertight(&self) -> bool {
        MeshAdjacency::build(&self.faces).is_watertight()
    }
}
