//! Hole detection and filling.
//!
//! A hole is a closed chain of boundary edges. Loops are returned in the
//! direction a filling surface has to traverse them, so the patch winds
//! consistently with the faces around it.

use hashbrown::HashMap;
use nalgebra::{Point2, Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::adjacency::directed_boundary_edges;
use crate::error::{MeshError, MeshResult};
use crate::triangulate::triangulate_polygon;
use crate::types::Plane;

/// A boundary loop representing a hole in the mesh.
#[derive(Debug, Clone)]
pub struct BoundaryLoop {
    /// Ordered vertex indices; consecutive pairs (and last to first) are the missing edges.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }

    /// Newell normal of the loop; its length is twice the enclosed area.
    pub fn normal(&self, mesh: &Mesh) -> Vector3<f64> {
        let n = self.vertices.len();
        let mut normal = Vector3::zeros();
        for i in 0..n {
            let a = mesh.vertices[self.vertices[i] as usize].position;
            let b = mesh.vertices[self.vertices[(i + 1) % n] as usize].position;
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        normal
    }
}

/// Chain reversed boundary edges into closed loops.
///
/// Open chains (boundaries that pass through non-manifold vertices in a way
/// that cannot be closed) are dropped with a debug log.
pub fn chain_loops(edges: &[(u32, u32)]) -> Vec<Vec<u32>> {
    let mut next: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in edges {
        next.entry(a).or_default().push(b);
    }

    let mut loops = Vec::new();
    for &(start, _) in edges {
        loop {
            let Some(first) = next.get_mut(&start).and_then(Vec::pop) else {
                break;
            };

            let mut ring = vec![start];
            let mut current = first;
            let mut closed = false;
            for _ in 0..=edges.len() {
                if current == start {
                    closed = true;
                    break;
                }
                ring.push(current);
                match next.get_mut(&current).and_then(Vec::pop) {
                    Some(n) => current = n,
                    None => break,
                }
            }

            if closed && ring.len() >= 3 {
                loops.push(ring);
            } else {
                debug!("Dropping open boundary chain of {} vertices", ring.len());
            }
        }
    }
    loops
}

/// Detect all boundary loops (holes) in the mesh.
pub fn detect_holes(mesh: &Mesh) -> Vec<BoundaryLoop> {
    let edges: Vec<(u32, u32)> = directed_boundary_edges(&mesh.faces)
        .into_iter()
        .map(|(a, b)| (b, a))
        .collect();

    if edges.is_empty() {
        return Vec::new();
    }

    debug!("Found {} boundary edges", edges.len());

    chain_loops(&edges)
        .into_iter()
        .map(|vertices| BoundaryLoop { vertices })
        .collect()
}

/// Triangulate one hole by projecting it onto its best-fit plane.
fn fill_loop(mesh: &Mesh, hole: &BoundaryLoop) -> MeshResult<Vec<[u32; 3]>> {
    let normal = hole.normal(mesh);
    if normal.norm() <= f64::EPSILON {
        return Err(MeshError::hole_fill_failed(format!(
            "boundary loop of {} vertices has no area",
            hole.edge_count()
        )));
    }

    let origin: Point3<f64> = mesh.vertices[hole.vertices[0] as usize].position;
    let (u, v) = Plane::new(origin, normal).basis();
    let points: Vec<Point2<f64>> = hole
        .vertices
        .iter()
        .map(|&vi| {
            let d = mesh.vertices[vi as usize].position - origin;
            Point2::new(d.dot(&u), d.dot(&v))
        })
        .collect();

    let ring: Vec<usize> = (0..points.len()).collect();
    let triangles = triangulate_polygon(&points, &ring, &[]);
    if triangles.is_empty() {
        return Err(MeshError::hole_fill_failed(format!(
            "triangulation of a {}-vertex loop produced no faces",
            hole.edge_count()
        )));
    }

    Ok(triangles
        .into_iter()
        .map(|t| t.map(|i| hole.vertices[i]))
        .collect())
}

/// Fill all holes with at most 100 edges. Returns the number of holes filled.
pub fn fill_holes(mesh: &mut Mesh) -> MeshResult<usize> {
    fill_holes_with_max_edges(mesh, 100)
}

/// Fill all holes that are at most `max_hole_edges` long.
///
/// Holes are triangulated independently in parallel, then appended to the
/// mesh in detection order.
pub fn fill_holes_with_max_edges(mesh: &mut Mesh, max_hole_edges: usize) -> MeshResult<usize> {
    let holes = detect_holes(mesh);

    let (fillable, skipped): (Vec<_>, Vec<_>) = holes
        .into_iter()
        .partition(|hole| hole.edge_count() <= max_hole_edges);

    for hole in &skipped {
        warn!(
            "Skipping large hole with {} edges (max: {})",
            hole.edge_count(),
            max_hole_edges
        );
    }

    let patches: Vec<MeshResult<Vec<[u32; 3]>>> = fillable
        .par_iter()
        .map(|hole| fill_loop(mesh, hole))
        .collect();

    let mut filled_count = 0;
    for patch in patches {
        match patch {
            Ok(triangles) => {
                mesh.faces.extend(triangles);
                filled_count += 1;
            }
            Err(e) => warn!("Could not fill hole: {}", e),
        }
    }

    if filled_count > 0 {
        info!("Filled {} holes", filled_count);
    }

    Ok(filled_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjacency::MeshAdjacency;
    use crate::types::tests::make_unit_cube;
    use approx::assert_relative_eq;

    fn open_box_mesh() -> Mesh {
        let mut mesh = make_unit_cube();
        // Faces 2 and 3 of the unit cube are the top
        mesh.faces.drain(2..4);
        mesh
    }

    #[test]
    fn test_detect_holes() {
        let holes = detect_holes(&open_box_mesh());
        assert_eq!(holes.len(), 1);
        assert_eq!(holes[0].edge_count(), 4);
    }

    #[test]
    fn test_closed_mesh_has_no_holes() {
        assert!(detect_holes(&make_unit_cube()).is_empty());
    }

    #[test]
    fn test_hole_normal_points_out_of_the_missing_face() {
        let mesh = open_box_mesh();
        let holes = detect_holes(&mesh);
        let n = holes[0].normal(&mesh).normalize();
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fill_holes_restores_closed_volume() {
        let mut mesh = open_box_mesh();
        let filled = fill_holes(&mut mesh).unwrap();

        assert_eq!(filled, 1);
        assert_eq!(mesh.face_count(), 12);

        let adjacency = MeshAdjacency::build(&mesh.faces);
        assert!(adjacency.is_oriented_closed());
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_large_holes_are_skipped() {
        let mut mesh = open_box_mesh();
        assert_eq!(fill_holes_with_max_edges(&mut mesh, 3).unwrap(), 0);
        assert_eq!(mesh.face_count(), 10);
    }

    #[test]
    fn test_chain_loops_two_rings() {
        let edges = [(0, 1), (1, 2), (2, 0), (5, 6), (6, 7), (7, 8), (8, 5)];
        let mut loops = chain_loops(&edges);
        loops.sort_by_key(Vec::len);
        assert_eq!(loops.len(), 2);
        assert_eq!(loops[0].len(), 3);
        assert_eq!(loops[1].len(), 4);
    }
}
