//! Planar cross-sections.
//!
//! Each triangle that straddles the plane contributes one segment, oriented so
//! the solid lies to its left when viewed down the plane normal. Summing the
//! shoelace terms of those segments gives the enclosed area directly, without
//! first assembling the contours.

use hashbrown::HashMap;
use nalgebra::{Point2, Point3};
use serde::Serialize;

use crate::holes::chain_loops;
use crate::types::{Mesh, Plane};

/// A cross-section of a mesh by a plane.
#[derive(Debug, Clone, Serialize)]
pub struct CrossSection {
    /// Enclosed area; holes are subtracted.
    pub area: f64,
    /// Total length of the section boundary.
    pub perimeter: f64,
    /// Closed boundary loops. Outer boundaries run counter-clockwise around
    /// the plane normal, holes clockwise.
    pub contours: Vec<Vec<Point3<f64>>>,
}

impl CrossSection {
    /// True if the plane misses the mesh.
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    /// Every contour point, in contour order.
    pub fn points(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.contours.iter().flatten()
    }
}

/// Distance below which a vertex counts as lying on a cutting plane.
pub(crate) fn plane_tolerance(mesh: &Mesh) -> f64 {
    let scale = mesh.aabb().map_or(1.0, |b| b.max_extent().max(1.0));
    1e-9 * scale
}

/// Signed vertex distances with near-zero values snapped to exactly zero.
pub(crate) fn vertex_distances(mesh: &Mesh, plane: &Plane) -> Vec<f64> {
    let eps = plane_tolerance(mesh);
    mesh.vertices
        .iter()
        .map(|v| {
            let d = plane.signed_distance(&v.position);
            if d.abs() < eps { 0.0 } else { d }
        })
        .collect()
}

/// Point where edge `a-b` meets the plane.
///
/// Computed from the lower vertex index so that both faces sharing the edge
/// produce bit-identical points.
pub(crate) fn edge_crossing(mesh: &Mesh, dist: &[f64], a: u32, b: u32) -> Point3<f64> {
    let (a, b) = if a < b { (a, b) } else { (b, a) };
    let (da, db) = (dist[a as usize], dist[b as usize]);
    let pa = mesh.vertices[a as usize].position;
    let pb = mesh.vertices[b as usize].position;
    let t = da / (da - db);
    pa + (pb - pa) * t
}

/// Cut a mesh with a plane and measure the section.
///
/// Vertices on the plane count as being on its positive side, so a face
/// lying in the plane contributes nothing and edges in the plane are never
/// counted twice.
///
/// ```
/// use mesh_kernel::{Aabb, Mesh, Plane, cross_section};
/// use nalgebra::Point3;
///
/// let block = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(2.0, 3.0, 4.0)));
/// let section = cross_section(&block, &Plane::axis_aligned(2, 1.5, true));
/// assert!((section.area - 6.0).abs() < 1e-9);
/// assert_eq!(section.contours.len(), 1);
/// ```
pub fn cross_section(mesh: &Mesh, plane: &Plane) -> CrossSection {
    let dist = vertex_distances(mesh, plane);
    let (u, v) = plane.basis();
    let project = |p: &Point3<f64>| {
        let d = p - plane.origin;
        Point2::new(d.dot(&u), d.dot(&v))
    };

    // Segment endpoints are identified by the mesh edge they lie on
    let mut edge_ids: HashMap<(u32, u32), u32> = HashMap::new();
    let mut points: Vec<Point3<f64>> = Vec::new();
    let mut links: Vec<(u32, u32)> = Vec::new();
    let mut twice_area = 0.0;
    let mut perimeter = 0.0;

    for face in &mesh.faces {
        let mut leaving = None;
        let mut entering = None;
        for i in 0..3 {
            let (a, b) = (face[i], face[(i + 1) % 3]);
            let above_a = dist[a as usize] >= 0.0;
            let above_b = dist[b as usize] >= 0.0;
            if above_a == above_b {
                continue;
            }
            let key = if a < b { (a, b) } else { (b, a) };
            let id = *edge_ids.entry(key).or_insert_with(|| {
                points.push(edge_crossing(mesh, &dist, a, b));
                (points.len() - 1) as u32
            });
            if above_a {
                leaving = Some(id);
            } else {
                entering = Some(id);
            }
        }

        if let (Some(start), Some(end)) = (leaving, entering) {
            let (p, q) = (points[start as usize], points[end as usize]);
            let (p2, q2) = (project(&p), project(&q));
            twice_area += p2.x * q2.y - q2.x * p2.y;
            perimeter += (q - p).norm();
            links.push((start, end));
        }
    }

    let contours = chain_loops(&links)
        .into_iter()
        .map(|ring| ring.into_iter().map(|i| points[i as usize]).collect())
        .collect();

    CrossSection {
        area: (twice_area * 0.5).abs(),
        perimeter,
        contours,
    }
}

/// Section area only.
pub fn cross_section_area(mesh: &Mesh, plane: &Plane) -> f64 {
    cross_section(mesh, plane).area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Aabb;
    use crate::types::tests::make_unit_cube;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn block(min: [f64; 3], max: [f64; 3]) -> Mesh {
        Mesh::cuboid(&Aabb::new(Point3::from(min), Point3::from(max)))
    }

    #[test]
    fn test_box_section_along_each_axis() {
        let mesh = block([0.0, 0.0, 0.0], [2.0, 3.0, 4.0]);
        let expected = [12.0, 8.0, 6.0];
        for axis in 0..3 {
            let position = mesh.aabb().map_or(0.0, |b| b.center()[axis]);
            let section = cross_section(&mesh, &Plane::axis_aligned(axis, position, true));
            assert_relative_eq!(section.area, expected[axis], epsilon = 1e-9);
            assert_eq!(section.contours.len(), 1);
        }
    }

    #[test]
    fn test_section_through_vertices_is_not_double_counted() {
        let mesh = make_unit_cube();
        for z in [0.0, 1.0] {
            let section = cross_section(&mesh, &Plane::axis_aligned(2, z, true));
            assert!(section.area <= 1.0 + 1e-9, "area {} at z={}", section.area, z);
        }
    }

    #[test]
    fn test_missing_plane_is_empty() {
        let section = cross_section(&make_unit_cube(), &Plane::axis_aligned(0, 5.0, true));
        assert!(section.is_empty());
        assert_eq!(section.area, 0.0);
    }

    #[test]
    fn test_two_disjoint_blocks_sum() {
        let mut mesh = block([0.0, 0.0, 0.0], [1.0, 1.0, 2.0]);
        mesh.append(&block([3.0, 0.0, 0.0], [5.0, 2.0, 2.0]));
        let section = cross_section(&mesh, &Plane::axis_aligned(2, 1.0, true));
        assert_relative_eq!(section.area, 5.0, epsilon = 1e-9);
        assert_eq!(section.contours.len(), 2);
        assert_relative_eq!(section.perimeter, 4.0 + 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tilted_plane_through_cube() {
        let mesh = make_unit_cube();
        let plane = Plane::new(Point3::new(0.5, 0.5, 0.5), Vector3::new(0.0, 1.0, 1.0));
        // Rectangle 1 x sqrt(2)
        assert_relative_eq!(
            cross_section_area(&mesh, &plane),
            2.0_f64.sqrt(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_outer_contour_is_ccw_around_normal() {
        let mesh = make_unit_cube();
        let plane = Plane::axis_aligned(2, 0.5, true);
        let section = cross_section(&mesh, &plane);
        let ring = &section.contours[0];
        let n = ring.len();
        let signed: f64 = (0..n)
            .map(|i| {
                let (a, b) = (ring[i], ring[(i + 1) % n]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        assert!(signed > 0.0);
    }
}
