//! Mesh repair operations: welding, degenerate and duplicate removal, compaction,
//! and the full repair pipeline.

use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::components::keep_largest_component;
use crate::error::{MeshError, MeshResult};
use crate::holes::fill_holes_with_max_edges;
use crate::winding::{fix_winding_order, orient_outward};
use crate::{Mesh, Triangle};

/// Configuration parameters for the repair pipeline.
///
/// All thresholds are in the same units as the mesh coordinates (typically millimeters).
///
/// # Example
///
/// ```
/// use mesh_kernel::RepairParams;
///
/// let params = RepairParams {
///     weld_epsilon: 0.01,
///     ..Default::default()
/// };
/// assert!(params.fill_holes);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairParams {
    /// Vertices closer than this distance are merged into one.
    ///
    /// Default: `1e-6`
    pub weld_epsilon: f64,

    /// Triangles with area below this threshold are removed.
    ///
    /// Default: `1e-9`
    pub degenerate_area_threshold: f64,

    /// Holes with more edges than this are left open with a warning.
    ///
    /// Default: `500`
    pub max_hole_edges: usize,

    /// Fill boundary loops with ear-clipped patches.
    pub fill_holes: bool,

    /// Make winding consistent and turn inside-out pieces outward.
    pub fix_winding: bool,

    /// Drop every connected component except the largest by face count.
    pub keep_largest_component: bool,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            weld_epsilon: 1e-6,
            degenerate_area_threshold: 1e-9,
            max_hole_edges: 500,
            fill_holes: true,
            fix_winding: true,
            keep_largest_component: true,
        }
    }
}

/// What the repair pipeline changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    pub vertices_welded: usize,
    pub degenerate_removed: usize,
    pub duplicates_removed: usize,
    pub holes_filled: usize,
    pub components_removed: usize,
    pub unreferenced_removed: usize,
    pub final_vertex_count: usize,
    pub final_face_count: usize,
}

impl RepairSummary {
    /// True if the pipeline changed nothing.
    pub fn is_noop(&self) -> bool {
        self.vertices_welded == 0
            && self.degenerate_removed == 0
            && self.duplicates_removed == 0
            && self.holes_filled == 0
            && self.components_removed == 0
            && self.unreferenced_removed == 0
    }
}

impl std::fmt::Display for RepairSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Repair Summary:")?;
        writeln!(f, "  Vertices welded:      {}", self.vertices_welded)?;
        writeln!(f, "  Degenerate removed:   {}", self.degenerate_removed)?;
        writeln!(f, "  Duplicates removed:   {}", self.duplicates_removed)?;
        writeln!(f, "  Holes filled:         {}", self.holes_filled)?;
        writeln!(f, "  Components removed:   {}", self.components_removed)?;
        write!(
            f,
            "  Result: {} vertices, {} faces",
            self.final_vertex_count, self.final_face_count
        )
    }
}

/// Remove triangles with area below threshold, or with repeated vertex indices.
///
/// Returns the number of triangles removed.
pub fn remove_degenerate_triangles(mesh: &mut Mesh, area_threshold: f64) -> usize {
    let original_count = mesh.faces.len();
    let vertices = &mesh.vertices;

    mesh.faces.retain(|&[i0, i1, i2]| {
        if i0 == i1 || i1 == i2 || i0 == i2 {
            return false;
        }
        let tri = Triangle::new(
            vertices[i0 as usize].position,
            vertices[i1 as usize].position,
            vertices[i2 as usize].position,
        );
        tri.area() >= area_threshold
    });

    let removed = original_count - mesh.faces.len();
    if removed > 0 {
        info!(
            "Removed {} degenerate triangles (area < {:.2e})",
            removed, area_threshold
        );
    }
    removed
}

/// Weld vertices that are within epsilon distance of each other.
///
/// Uses a spatial hash with cells of twice the tolerance; each vertex merges
/// into the lowest-indexed representative within reach. Faces that collapse
/// are removed. Returns the number of vertices merged.
pub fn weld_vertices(mesh: &mut Mesh, epsilon: f64) -> usize {
    let original_count = mesh.vertices.len();
    if original_count == 0 || epsilon <= 0.0 {
        return 0;
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        spatial_hash
            .entry(pos_to_cell(&vertex.position, cell_size))
            .or_default()
            .push(idx as u32);
    }

    let mut vertex_remap: Vec<u32> = (0..original_count as u32).collect();
    let mut merged_count = 0;

    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if vertex_remap[idx as usize] != idx {
            continue;
        }

        let cell = pos_to_cell(&vertex.position, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || vertex_remap[other as usize] != other {
                            continue;
                        }
                        let dist = (vertex.position - mesh.vertices[other as usize].position).norm();
                        if dist < epsilon {
                            vertex_remap[other as usize] = idx;
                            merged_count += 1;
                        }
                    }
                }
            }
        }
    }

    if merged_count == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = vertex_remap[*v as usize];
        }
    }
    mesh.faces
        .retain(|&[i0, i1, i2]| i0 != i1 && i1 != i2 && i0 != i2);

    info!(
        "Welded {} vertices (epsilon = {:.2e}): {} -> {}",
        merged_count,
        epsilon,
        original_count,
        original_count - merged_count
    );

    merged_count
}

fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

/// Remove unreferenced vertices and compact the vertex array.
///
/// Returns the number of vertices removed.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let original_count = mesh.vertices.len();

    let mut remap: Vec<Option<u32>> = vec![None; original_count];
    for face in &mesh.faces {
        for &v in face {
            remap[v as usize] = Some(0);
        }
    }

    let mut new_vertices = Vec::with_capacity(original_count);
    for (old_idx, slot) in remap.iter_mut().enumerate() {
        if slot.is_some() {
            *slot = Some(new_vertices.len() as u32);
            new_vertices.push(mesh.vertices[old_idx].clone());
        }
    }

    let removed = original_count - new_vertices.len();
    if removed == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = remap[*v as usize].unwrap_or(*v);
        }
    }
    mesh.vertices = new_vertices;

    debug!("Removed {} unreferenced vertices", removed);
    removed
}

/// Remove duplicate faces from the mesh.
///
/// Faces are duplicates if they use the same three vertices, in either
/// winding. The first occurrence is kept. Returns the number removed.
pub fn remove_duplicate_faces(mesh: &mut Mesh) -> usize {
    let original_count = mesh.faces.len();

    fn sorted(face: [u32; 3]) -> [u32; 3] {
        let mut key = face;
        key.sort_unstable();
        key
    }

    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(original_count);
    mesh.faces.retain(|face| seen.insert(sorted(*face)));

    let removed = original_count - mesh.faces.len();
    if removed > 0 {
        info!("Removed {} duplicate faces", removed);
    }
    removed
}

/// Run the repair pipeline with default parameters.
pub fn repair_mesh(mesh: &mut Mesh) -> MeshResult<RepairSummary> {
    repair_mesh_with_config(mesh, &RepairParams::default())
}

/// Run the full repair pipeline.
///
/// Order: weld vertices, remove degenerate faces, remove duplicate faces,
/// fill holes, fix winding (and turn outward), keep the largest component,
/// drop unreferenced vertices. A result with no faces is an error and leaves
/// `mesh` untouched.
///
/// ```
/// use mesh_kernel::{Aabb, Mesh, repair_mesh};
/// use nalgebra::Point3;
///
/// let mut mesh = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)));
/// let summary = repair_mesh(&mut mesh).unwrap();
/// assert!(summary.is_noop());
/// ```
pub fn repair_mesh_with_config(mesh: &mut Mesh, params: &RepairParams) -> MeshResult<RepairSummary> {
    info!(
        "Starting mesh repair (weld={:.2e}, area={:.2e}, holes<={})",
        params.weld_epsilon, params.degenerate_area_threshold, params.max_hole_edges
    );

    if mesh.faces.is_empty() {
        return Err(MeshError::repair_failed("mesh has no faces to repair"));
    }

    let mut work = mesh.clone();
    let mut summary = RepairSummary {
        vertices_welded: weld_vertices(&mut work, params.weld_epsilon),
        degenerate_removed: remove_degenerate_triangles(&mut work, params.degenerate_area_threshold),
        duplicates_removed: remove_duplicate_faces(&mut work),
        ..Default::default()
    };

    if params.fill_holes {
        match fill_holes_with_max_edges(&mut work, params.max_hole_edges) {
            Ok(filled) => summary.holes_filled = filled,
            Err(e) => warn!("Hole filling failed: {}", e),
        }
    }

    if params.fix_winding {
        fix_winding_order(&mut work)?;
        orient_outward(&mut work);
    }

    if params.keep_largest_component {
        summary.components_removed = keep_largest_component(&mut work);
    }

    summary.unreferenced_removed = remove_unreferenced_vertices(&mut work);

    if work.faces.is_empty() {
        return Err(MeshError::repair_failed(format!(
            "repair removed all {} faces",
            mesh.face_count()
        )));
    }

    summary.final_vertex_count = work.vertex_count();
    summary.final_face_count = work.face_count();
    *mesh = work;

    info!(
        "Repair complete: {} vertices, {} faces",
        summary.final_vertex_count, summary.final_face_count
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;
    use crate::adjacency::MeshAdjacency;
    use crate::types::tests::make_unit_cube;
    use approx::assert_relative_eq;

    /// Unit cube stored as 12 independent triangles (36 vertices), like a raw STL.
    fn triangle_soup_cube() -> Mesh {
        let cube = make_unit_cube();
        let mut soup = Mesh::new();
        for face in &cube.faces {
            let base = soup.vertices.len() as u32;
            for &v in face {
                soup.vertices.push(cube.vertices[v as usize].clone());
            }
            soup.faces.push([base, base + 1, base + 2]);
        }
        soup
    }

    #[test]
    fn test_weld_vertices_closes_soup() {
        let mut mesh = triangle_soup_cube();
        assert_eq!(weld_vertices(&mut mesh, 1e-6), 28);
        remove_unreferenced_vertices(&mut mesh);
        assert_eq!(mesh.vertex_count(), 8);
        assert!(MeshAdjacency::build(&mesh.faces).is_oriented_closed());
    }

    #[test]
    fn test_remove_degenerate() {
        let mut mesh = make_unit_cube();
        mesh.vertices.push(Vertex::from_coords(0.5, 0.0, 0.0));
        mesh.faces.push([0, 1, 8]);
        mesh.faces.push([2, 2, 3]);
        assert_eq!(remove_degenerate_triangles(&mut mesh, 1e-9), 2);
        assert_eq!(mesh.face_count(), 12);
    }

    #[test]
    fn test_remove_duplicate_faces_either_winding() {
        let mut mesh = make_unit_cube();
        mesh.faces.push([2, 0, 1]);
        mesh.faces.push([0, 1, 2]);
        assert_eq!(remove_duplicate_faces(&mut mesh), 2);
        assert_eq!(mesh.face_count(), 12);
    }

    #[test]
    fn test_remove_unreferenced() {
        let mut mesh = make_unit_cube();
        mesh.vertices.insert(0, Vertex::from_coords(9.0, 9.0, 9.0));
        for face in &mut mesh.faces {
            for v in face.iter_mut() {
                *v += 1;
            }
        }
        assert_eq!(remove_unreferenced_vertices(&mut mesh), 1);
        assert_eq!(mesh.faces, make_unit_cube().faces);
    }

    #[test]
    fn test_pipeline_fixes_open_flipped_soup_with_debris() {
        let mut mesh = triangle_soup_cube();
        // Open the top and turn the whole thing inside out
        mesh.faces.drain(2..4);
        mesh.flip();
        // A small closed tetrahedron far away
        let base = mesh.vertices.len() as u32;
        mesh.vertices.push(Vertex::from_coords(10.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(11.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(10.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(10.0, 0.0, 1.0));
        for f in [[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]] {
            mesh.faces.push(f.map(|v| base + v));
        }

        let summary = repair_mesh(&mut mesh).unwrap();

        assert_eq!(summary.holes_filled, 1);
        assert_eq!(summary.components_removed, 1);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
        assert!(MeshAdjacency::build(&mesh.faces).is_oriented_closed());
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let mut mesh = triangle_soup_cube();
        repair_mesh(&mut mesh).unwrap();
        let (v, f) = (mesh.vertex_count(), mesh.face_count());

        let second = repair_mesh(&mut mesh).unwrap();
        assert!(second.is_noop());
        assert_eq!((mesh.vertex_count(), mesh.face_count()), (v, f));
    }

    #[test]
    fn test_repair_that_empties_mesh_fails() {
        let mut mesh = Mesh::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)] {
            mesh.vertices.push(Vertex::from_coords(x, y, 0.0));
        }
        mesh.faces.push([0, 1, 2]);

        let err = repair_mesh(&mut mesh).unwrap_err();
        assert!(matches!(err, MeshError::RepairFailed { .. }));
        assert_eq!(mesh.face_count(), 1);
    }
}
