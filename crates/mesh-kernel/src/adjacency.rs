//! Edge and vertex adjacency for indexed triangle meshes.

use hashbrown::HashMap;

/// Adjacency information for a mesh.
///
/// Answers the topology queries the engine needs: boundary edges (holes),
/// non-manifold edges, and edges whose two faces disagree on winding.
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Maps edge (v0, v1) with v0 < v1 to the faces using it.
    pub(crate) edge_to_faces: HashMap<(u32, u32), Vec<usize>>,
    /// Maps edge (v0, v1) with v0 < v1 to the count of faces traversing it as v0 -> v1.
    forward_uses: HashMap<(u32, u32), usize>,
    /// Maps vertex index to list of face indices.
    vertex_to_faces: HashMap<u32, Vec<usize>>,
}

impl MeshAdjacency {
    /// Build adjacency information from a list of faces.
    ///
    /// ```
    /// use mesh_kernel::MeshAdjacency;
    ///
    /// let faces = vec![[0, 1, 2], [1, 3, 2]];
    /// let adj = MeshAdjacency::build(&faces);
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// ```
    #[must_use]
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        let mut forward_uses: HashMap<(u32, u32), usize> = HashMap::new();
        let mut vertex_to_faces: HashMap<u32, Vec<usize>> = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            for &v in face {
                vertex_to_faces.entry(v).or_default().push(face_idx);
            }

            for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
                let edge = normalize_edge(a, b);
                edge_to_faces.entry(edge).or_default().push(face_idx);
                let forward = forward_uses.entry(edge).or_default();
                if a < b {
                    *forward += 1;
                }
            }
        }

        Self {
            edge_to_faces,
            forward_uses,
            vertex_to_faces,
        }
    }

    /// Faces adjacent to an edge, `None` if the edge doesn't exist.
    #[must_use]
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[usize]> {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map(Vec::as_slice)
    }

    /// Faces adjacent to a vertex.
    #[must_use]
    pub fn faces_for_vertex(&self, v: u32) -> &[usize] {
        self.vertex_to_faces.get(&v).map_or(&[], Vec::as_slice)
    }

    /// Iterate over boundary edges (exactly one adjacent face).
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
    }

    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Iterate over non-manifold edges (more than two adjacent faces).
    pub fn non_manifold_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(&edge, _)| edge)
    }

    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() > 2)
            .count()
    }

    /// Count interior edges whose two faces traverse them in the same direction.
    ///
    /// A consistently oriented manifold uses every interior edge once per direction.
    #[must_use]
    pub fn inconsistent_edge_count(&self) -> usize {
        self.edge_to_faces
            .iter()
            .filter(|(edge, faces)| {
                faces.len() == 2 && self.forward_uses.get(*edge).copied().unwrap_or(0) != 1
            })
            .count()
    }

    /// All edges have at most 2 adjacent faces.
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() <= 2)
    }

    /// No boundary edges.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() >= 2)
    }

    /// Watertight, manifold, and consistently wound.
    #[must_use]
    pub fn is_oriented_closed(&self) -> bool {
        self.is_watertight() && self.is_manifold() && self.inconsistent_edge_count() == 0
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_to_faces.len()
    }
}

/// Boundary edges in the direction their single face traverses them.
///
/// The reversed edges chain into loops that close the surface with matching winding.
pub fn directed_boundary_edges(faces: &[[u32; 3]]) -> Vec<(u32, u32)> {
    let mut counts: HashMap<(u32, u32), (usize, Option<(u32, u32)>)> = HashMap::new();
    for face in faces {
        for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
            let entry = counts.entry(normalize_edge(a, b)).or_insert((0, None));
            entry.0 += 1;
            entry.1 = Some((a, b));
        }
    }
    let mut edges: Vec<(u32, u32)> = counts
        .into_values()
        .filter(|(count, _)| *count == 1)
        .filter_map(|(_, directed)| directed)
        .collect();
    edges.sort_unstable();
    edges
}

/// Normalize edge direction so v0 < v1.
#[inline]
pub(crate) fn normalize_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_triangles_sharing_edge() -> Vec<[u32; 3]> {
        vec![[0, 1, 2], [1, 3, 2]]
    }

    fn tetrahedron_faces() -> Vec<[u32; 3]> {
        vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]]
    }

    #[test]
    fn build_single_triangle() {
        let adj = MeshAdjacency::build(&[[0, 1, 2]]);
        assert_eq!(adj.edge_count(), 3);
        assert_eq!(adj.vertex_count(), 3);
        assert_eq!(adj.boundary_edge_count(), 3);
        assert!(!adj.is_watertight());
    }

    #[test]
    fn faces_for_edge_and_vertex() {
        let adj = MeshAdjacency::build(&two_triangles_sharing_edge());
        assert_eq!(adj.faces_for_edge(2, 1).map(<[usize]>::len), Some(2));
        assert_eq!(adj.faces_for_edge(0, 1).map(<[usize]>::len), Some(1));
        assert!(adj.faces_for_edge(0, 3).is_none());
        assert_eq!(adj.faces_for_vertex(2).len(), 2);
        assert!(adj.faces_for_vertex(42).is_empty());
    }

    #[test]
    fn non_manifold_detection() {
        let adj = MeshAdjacency::build(&[[0, 1, 2], [0, 1, 3], [0, 1, 4]]);
        assert_eq!(adj.non_manifold_edge_count(), 1);
        assert_eq!(adj.non_manifold_edges().next(), Some((0, 1)));
        assert!(!adj.is_manifold());
    }

    #[test]
    fn closed_tetrahedron_is_oriented() {
        let adj = MeshAdjacency::build(&tetrahedron_faces());
        assert!(adj.is_watertight());
        assert!(adj.is_manifold());
        assert_eq!(adj.inconsistent_edge_count(), 0);
        assert!(adj.is_oriented_closed());
    }

    #[test]
    fn flipped_face_is_inconsistent() {
        let mut faces = tetrahedron_faces();
        faces[0] = [0, 1, 2];
        let adj = MeshAdjacency::build(&faces);
        assert!(adj.is_watertight());
        assert_eq!(adj.inconsistent_edge_count(), 3);
        assert!(!adj.is_oriented_closed());
    }

    #[test]
    fn directed_boundary_follows_face_winding() {
        let edges = directed_boundary_edges(&two_triangles_sharing_edge());
        assert_eq!(edges, vec![(0, 1), (1, 3), (2, 0), (3, 2)]);
        assert!(directed_boundary_edges(&tetrahedron_faces()).is_empty());
    }
}
