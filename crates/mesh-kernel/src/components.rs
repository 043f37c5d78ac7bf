//! Connected component analysis.
//!
//! Two faces belong to the same component when they share an edge.

use std::cmp::Reverse;

use hashbrown::HashMap;
use tracing::{debug, info};

use crate::adjacency::MeshAdjacency;
use crate::types::Mesh;

/// Result of connected component analysis.
#[derive(Debug, Clone)]
pub struct ComponentAnalysis {
    pub component_count: usize,
    /// Face indices for each component, largest first.
    pub components: Vec<Vec<u32>>,
    pub largest_component_size: usize,
    pub smallest_component_size: usize,
}

impl ComponentAnalysis {
    pub fn is_connected(&self) -> bool {
        self.component_count == 1
    }

    /// Face indices of the largest component.
    pub fn largest_component(&self) -> &[u32] {
        self.components.first().map(|v| v.as_slice()).unwrap_or(&[])
    }
}

impl std::fmt::Display for ComponentAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Component Analysis:")?;
        writeln!(f, "  Connected components: {}", self.component_count)?;
        if self.component_count > 1 {
            for (i, comp) in self.components.iter().enumerate() {
                writeln!(f, "    Component {}: {} faces", i + 1, comp.len())?;
            }
        }
        Ok(())
    }
}

/// Find all connected components in a mesh by flood fill over shared edges.
///
/// ```
/// use mesh_kernel::{Mesh, Vertex};
/// use mesh_kernel::components::find_connected_components;
///
/// let mut mesh = Mesh::new();
/// for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (10.0, 0.0), (11.0, 0.0), (10.0, 1.0)] {
///     mesh.vertices.push(Vertex::from_coords(x, y, 0.0));
/// }
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([3, 4, 5]);
///
/// assert_eq!(find_connected_components(&mesh).component_count, 2);
/// ```
pub fn find_connected_components(mesh: &Mesh) -> ComponentAnalysis {
    let face_count = mesh.faces.len();
    if face_count == 0 {
        return ComponentAnalysis {
            component_count: 0,
            components: Vec::new(),
            largest_component_size: 0,
            smallest_component_size: 0,
        };
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);

    let mut face_neighbors: Vec<Vec<u32>> = vec![Vec::new(); face_count];
    for faces in adjacency.edge_to_faces.values() {
        for (i, &a) in faces.iter().enumerate() {
            for &b in &faces[i + 1..] {
                face_neighbors[a].push(b as u32);
                face_neighbors[b].push(a as u32);
            }
        }
    }

    let mut visited = vec![false; face_count];
    let mut components: Vec<Vec<u32>> = Vec::new();

    for start_face in 0..face_count {
        if visited[start_face] {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![start_face as u32];
        visited[start_face] = true;

        while let Some(face_idx) = stack.pop() {
            component.push(face_idx);
            for &neighbor in &face_neighbors[face_idx as usize] {
                if !visited[neighbor as usize] {
                    visited[neighbor as usize] = true;
                    stack.push(neighbor);
                }
            }
        }

        component.sort_unstable();
        components.push(component);
    }

    // Stable sort keeps discovery order among equal sizes
    components.sort_by_key(|c| Reverse(c.len()));

    let component_count = components.len();
    let largest_component_size = components.first().map_or(0, Vec::len);
    let smallest_component_size = components.last().map_or(0, Vec::len);

    debug!(
        "Found {} connected component(s) in mesh with {} faces",
        component_count, face_count
    );

    ComponentAnalysis {
        component_count,
        components,
        largest_component_size,
        smallest_component_size,
    }
}

/// Build a standalone mesh from a subset of faces, renumbering vertices by first use.
pub fn extract_faces(mesh: &Mesh, face_indices: &[u32]) -> Mesh {
    let mut old_to_new: HashMap<u32, u32> = HashMap::new();
    let mut out = Mesh::with_capacity(face_indices.len(), face_indices.len());

    for &face_idx in face_indices {
        let face = mesh.faces[face_idx as usize];
        let mut new_face = [0u32; 3];
        for (slot, &old) in new_face.iter_mut().zip(face.iter()) {
            *slot = *old_to_new.entry(old).or_insert_with(|| {
                out.vertices.push(mesh.vertices[old as usize].clone());
                (out.vertices.len() - 1) as u32
            });
        }
        out.faces.push(new_face);
    }

    out
}

/// Split a mesh into separate meshes, one per connected component, largest first.
pub fn split_into_components(mesh: &Mesh) -> Vec<Mesh> {
    let analysis = find_connected_components(mesh);

    if analysis.component_count <= 1 {
        return vec![mesh.clone()];
    }

    info!(
        "Splitting mesh into {} components",
        analysis.component_count
    );

    analysis
        .components
        .iter()
        .map(|faces| extract_faces(mesh, faces))
        .collect()
}

/// Keep only the largest connected component. Returns the number of components removed.
pub fn keep_largest_component(mesh: &mut Mesh) -> usize {
    let analysis = find_connected_components(mesh);

    if analysis.component_count <= 1 {
        return 0;
    }

    let removed = analysis.component_count - 1;
    info!(
        "Keeping largest component ({} faces), removing {} smaller component(s)",
        analysis.largest_component_size, removed
    );

    *mesh = extract_faces(mesh, analysis.largest_component());
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tests::make_unit_cube;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn cube_and_small_cube() -> Mesh {
        let mut mesh = make_unit_cube();
        mesh.scale(4.0);
        let mut small = make_unit_cube();
        small.translate(Vector3::new(10.0, 0.0, 0.0));
        // Drop two faces so the small component has fewer faces
        small.faces.truncate(10);
        mesh.append(&small);
        mesh
    }

    #[test]
    fn test_single_component() {
        let analysis = find_connected_components(&make_unit_cube());
        assert!(analysis.is_connected());
        assert_eq!(analysis.largest_component().len(), 12);
    }

    #[test]
    fn test_empty_mesh_has_no_components() {
        let analysis = find_connected_components(&Mesh::new());
        assert_eq!(analysis.component_count, 0);
        assert!(analysis.largest_component().is_empty());
    }

    #[test]
    fn test_split_orders_largest_first() {
        let parts = split_into_components(&cube_and_small_cube());
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].face_count(), 12);
        assert_eq!(parts[0].vertex_count(), 8);
        assert_eq!(parts[1].face_count(), 10);
        assert_relative_eq!(parts[0].volume(), 64.0, epsilon = 1e-9);
    }

    #[test]
    fn test_keep_largest_component() {
        let mut mesh = cube_and_small_cube();
        assert_eq!(keep_largest_component(&mut mesh), 1);
        assert_eq!(mesh.face_count(), 12);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(keep_largest_component(&mut mesh), 0);
    }

    #[test]
    fn test_extract_faces_renumbers() {
        let cube = make_unit_cube();
        let part = extract_faces(&cube, &[2, 3]);
        assert_eq!(part.vertex_count(), 4);
        assert_eq!(part.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }
}
