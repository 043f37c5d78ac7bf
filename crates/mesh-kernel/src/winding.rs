//! Normal consistency and winding order correction.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::Mesh;
use crate::adjacency::{MeshAdjacency, normalize_edge};
use crate::components::find_connected_components;
use crate::error::MeshResult;

/// Fix winding order so all faces of each connected piece agree.
///
/// Breadth-first flood fill from the lowest unvisited face: a neighbour must
/// traverse the shared edge opposite to the face it was reached from, and is
/// flipped when it doesn't. Non-manifold edges are followed to every neighbour;
/// the first visit decides.
pub fn fix_winding_order(mesh: &mut Mesh) -> MeshResult<()> {
    if mesh.faces.is_empty() {
        return Ok(());
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let face_count = mesh.faces.len();

    let mut visited = vec![false; face_count];
    let mut component_count = 0;
    let mut flipped = 0;

    for start in 0..face_count {
        if visited[start] {
            continue;
        }
        component_count += 1;
        visited[start] = true;

        let mut queue = VecDeque::from([start]);
        while let Some(face_idx) = queue.pop_front() {
            // Faces are flipped in place, so this reads the settled orientation
            let face = mesh.faces[face_idx];

            for i in 0..3 {
                let (a, b) = (face[i], face[(i + 1) % 3]);
                let Some(neighbors) = adjacency.edge_to_faces.get(&normalize_edge(a, b)) else {
                    continue;
                };

                for &neighbor in neighbors {
                    if visited[neighbor] {
                        continue;
                    }
                    visited[neighbor] = true;

                    if traverses(&mesh.faces[neighbor], a, b) {
                        mesh.faces[neighbor].swap(1, 2);
                        flipped += 1;
                    }
                    queue.push_back(neighbor);
                }
            }
        }
    }

    if flipped > 0 {
        info!(
            "Fixed winding order: flipped {} faces across {} component(s)",
            flipped, component_count
        );
    } else {
        debug!(
            "Winding order already consistent across {} component(s)",
            component_count
        );
    }

    Ok(())
}

/// Flip every component whose signed volume is negative.
///
/// Assumes consistent winding within each component. Returns the number of
/// components flipped.
pub fn orient_outward(mesh: &mut Mesh) -> usize {
    let analysis = find_connected_components(mesh);
    let mut flipped = 0;

    for component in &analysis.components {
        let signed: f64 = component
            .iter()
            .filter_map(|&f| mesh.triangle(f as usize))
            .map(|t| t.v0.coords.dot(&t.v1.coords.cross(&t.v2.coords)) / 6.0)
            .sum();

        if signed < 0.0 {
            for &f in component {
                mesh.faces[f as usize].swap(1, 2);
            }
            flipped += 1;
        }
    }

    if flipped > 0 {
        info!("Turned {} inside-out component(s) outward", flipped);
    }
    flipped
}

/// True if `face` traverses the directed edge `a -> b`.
fn traverses(face: &[u32; 3], a: u32, b: u32) -> bool {
    (0..3).any(|i| face[i] == a && face[(i + 1) % 3] == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;
    use crate::types::tests::make_unit_cube;
    use approx::assert_relative_eq;

    fn strip_with_wrong_second_face(offset: f64, base: u32) -> (Vec<Vertex>, Vec<[u32; 3]>) {
        let vertices = vec![
            Vertex::from_coords(offset, 0.0, 0.0),
            Vertex::from_coords(offset + 1.0, 0.0, 0.0),
            Vertex::from_coords(offset + 0.5, 1.0, 0.0),
            Vertex::from_coords(offset + 0.5, -1.0, 0.0),
        ];
        let faces = vec![
            [base, base + 1, base + 2],
            // Should be [base + 1, base, base + 3]
            [base, base + 1, base + 3],
        ];
        (vertices, faces)
    }

    #[test]
    fn test_consistent_cube_is_untouched() {
        let mut mesh = make_unit_cube();
        let before = mesh.faces.clone();
        fix_winding_order(&mut mesh).unwrap();
        assert_eq!(mesh.faces, before);
    }

    #[test]
    fn test_fix_inconsistent_pair() {
        let mut mesh = Mesh::new();
        let (v, f) = strip_with_wrong_second_face(0.0, 0);
        mesh.vertices = v;
        mesh.faces = f;

        fix_winding_order(&mut mesh).unwrap();

        assert!(traverses(&mesh.faces[0], 0, 1));
        assert!(traverses(&mesh.faces[1], 1, 0));
    }

    #[test]
    fn test_fix_disconnected_components() {
        let mut mesh = Mesh::new();
        for (offset, base) in [(0.0, 0), (10.0, 4)] {
            let (v, f) = strip_with_wrong_second_face(offset, base);
            mesh.vertices.extend(v);
            mesh.faces.extend(f);
        }

        fix_winding_order(&mut mesh).unwrap();

        let adjacency = MeshAdjacency::build(&mesh.faces);
        assert_eq!(adjacency.inconsistent_edge_count(), 0);
    }

    #[test]
    fn test_scrambled_cube_becomes_closed_and_outward() {
        let mut mesh = make_unit_cube();
        for f in [0, 3, 4, 9] {
            mesh.faces[f].swap(1, 2);
        }
        assert!(!MeshAdjacency::build(&mesh.faces).is_oriented_closed());

        fix_winding_order(&mut mesh).unwrap();
        orient_outward(&mut mesh);

        assert!(MeshAdjacency::build(&mesh.faces).is_oriented_closed());
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_orient_outward_flips_inside_out_mesh() {
        let mut mesh = make_unit_cube();
        mesh.flip();
        assert_eq!(orient_outward(&mut mesh), 1);
        assert_relative_eq!(mesh.signed_volume(), 1.0, epsilon = 1e-12);
        assert_eq!(orient_outward(&mut mesh), 0);
    }
}
