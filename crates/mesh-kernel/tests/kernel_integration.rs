//! End-to-end tests for the kernel: I/O, clipping, sections, booleans, repair.
//!
//! Run with: cargo test -p mesh-kernel --test kernel_integration

use approx::assert_relative_eq;
use mesh_kernel::{
    Aabb, Mesh, MeshAdjacency, Plane, Vertex, clip_by_plane, contains_point, cross_section,
    intersect_box, load_mesh, orient_outward, repair_mesh, save_mesh, subtract_box, validate_mesh,
};
use nalgebra::Point3;
use std::collections::HashMap;
use std::f64::consts::PI;
use tempfile::TempDir;

// =============================================================================
// Test Mesh Creation
// =============================================================================

/// Icosphere of the given radius, outward oriented.
fn create_sphere(radius: f64, subdivisions: u32) -> Mesh {
    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let (a, b) = (1.0, 1.0 / phi);
    let ico_verts = [
        [0.0, b, -a],
        [b, a, 0.0],
        [-b, a, 0.0],
        [0.0, b, a],
        [0.0, -b, a],
        [-a, 0.0, b],
        [0.0, -b, -a],
        [a, 0.0, -b],
        [a, 0.0, b],
        [-a, 0.0, -b],
        [b, -a, 0.0],
        [-b, -a, 0.0],
    ];
    let mut mesh = Mesh::new();
    for v in &ico_verts {
        let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        mesh.vertices
            .push(Vertex::from_coords(v[0] / len, v[1] / len, v[2] / len));
    }
    mesh.faces = vec![
        [0, 1, 2],
        [3, 2, 1],
        [3, 4, 5],
        [3, 8, 4],
        [0, 6, 7],
        [0, 9, 6],
        [4, 10, 11],
        [6, 11, 10],
        [2, 5, 9],
        [11, 9, 5],
        [1, 7, 8],
        [10, 8, 7],
        [3, 5, 2],
        [3, 1, 8],
        [0, 2, 9],
        [0, 7, 1],
        [6, 9, 11],
        [6, 10, 7],
        [4, 11, 5],
        [4, 8, 10],
    ];

    for _ in 0..subdivisions {
        let mut next = Mesh::new();
        next.vertices = mesh.vertices.clone();
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut midpoint = |a: u32, b: u32, vertices: &mut Vec<Vertex>| -> u32 {
            let key = if a < b { (a, b) } else { (b, a) };
            *midpoints.entry(key).or_insert_with(|| {
                let m = (vertices[a as usize].position.coords + vertices[b as usize].position.coords)
                    .normalize();
                vertices.push(Vertex::from_coords(m.x, m.y, m.z));
                (vertices.len() - 1) as u32
            })
        };
        for face in &mesh.faces {
            let [v0, v1, v2] = *face;
            let m01 = midpoint(v0, v1, &mut next.vertices);
            let m12 = midpoint(v1, v2, &mut next.vertices);
            let m20 = midpoint(v2, v0, &mut next.vertices);
            next.faces.push([v0, m01, m20]);
            next.faces.push([v1, m12, m01]);
            next.faces.push([v2, m20, m12]);
            next.faces.push([m01, m12, m20]);
        }
        mesh = next;
    }

    orient_outward(&mut mesh);
    mesh.scale(radius);
    mesh
}

/// Torus around the z axis with `rings` vertex rings around the axis and
/// `sides` around the tube. Ring `i` sits at angle `2 pi i / rings`, so
/// rings at quarter turns lie exactly in the x = 0 and y = 0 planes.
fn create_torus(major: f64, minor: f64, rings: u32, sides: u32) -> Mesh {
    let mut mesh = Mesh::new();
    for i in 0..rings {
        let u = 2.0 * PI * f64::from(i) / f64::from(rings);
        for j in 0..sides {
            let v = 2.0 * PI * f64::from(j) / f64::from(sides);
            let r = major + minor * v.cos();
            mesh.vertices
                .push(Vertex::from_coords(r * u.cos(), r * u.sin(), minor * v.sin()));
        }
    }
    let index = |i: u32, j: u32| (i % rings) * sides + (j % sides);
    for i in 0..rings {
        for j in 0..sides {
            let (a, b, c, d) = (index(i, j), index(i + 1, j), index(i + 1, j + 1), index(i, j + 1));
            mesh.faces.push([a, b, c]);
            mesh.faces.push([a, c, d]);
        }
    }
    mesh
}

fn block(min: [f64; 3], max: [f64; 3]) -> Mesh {
    Mesh::cuboid(&Aabb::new(Point3::from(min), Point3::from(max)))
}

// =============================================================================
// Clipping
// =============================================================================

#[test]
fn test_sphere_halves_are_closed_and_conserve_volume() {
    let sphere = create_sphere(50.0, 3);
    let whole = sphere.signed_volume();
    assert!(whole > 0.0);

    for axis in 0..3 {
        let plane = Plane::axis_aligned(axis, 7.5, true);
        let upper = clip_by_plane(&sphere, &plane, true).unwrap().unwrap();
        let lower = clip_by_plane(&sphere, &plane.flipped(), true).unwrap().unwrap();

        assert!(MeshAdjacency::build(&upper.faces).is_oriented_closed());
        assert!(MeshAdjacency::build(&lower.faces).is_oriented_closed());
        assert_relative_eq!(
            upper.signed_volume() + lower.signed_volume(),
            whole,
            max_relative = 1e-9
        );
    }
}

#[test]
fn test_torus_halves_are_closed_through_vertex_rings_and_between() {
    let torus = create_torus(30.0, 10.0, 48, 24);
    let whole = torus.signed_volume();
    assert!(whole > 0.0);

    // The first three cut along whole vertex rings; the rest cross faces
    let planes = [
        Plane::axis_aligned(2, 0.0, true),
        Plane::axis_aligned(0, 0.0, true),
        Plane::axis_aligned(1, 0.0, false),
        Plane::axis_aligned(0, 3.7, true),
        Plane::axis_aligned(2, 3.0, true),
        Plane::axis_aligned(1, -13.0, true),
    ];
    for plane in &planes {
        let a = clip_by_plane(&torus, plane, true).unwrap().unwrap();
        let b = clip_by_plane(&torus, &plane.flipped(), true).unwrap().unwrap();

        assert!(MeshAdjacency::build(&a.faces).is_oriented_closed(), "{plane:?}");
        assert!(MeshAdjacency::build(&b.faces).is_oriented_closed(), "{plane:?}");
        assert_relative_eq!(a.signed_volume() + b.signed_volume(), whole, max_relative = 1e-9);
    }
}

#[test]
fn test_symmetric_grid_cells_of_torus_are_closed() {
    // Cuts at zero run along vertex rings, so every cell meets collinear cap runs
    let torus = create_torus(30.0, 10.0, 48, 24);
    let xy = [-40.0, -25.0, 0.0, 25.0, 40.0];
    let z = [-10.0, 0.0, 10.0];
    let mut total = 0.0;

    for i in 0..4 {
        for j in 0..4 {
            for k in 0..2 {
                let cell = Aabb::new(
                    Point3::new(xy[i], xy[j], z[k]),
                    Point3::new(xy[i + 1], xy[j + 1], z[k + 1]),
                );
                let Some(piece) = intersect_box(&torus, &cell).unwrap() else {
                    continue;
                };
                assert!(
                    MeshAdjacency::build(&piece.faces).is_oriented_closed(),
                    "cell {i} {j} {k} is open"
                );
                let volume = piece.signed_volume();
                assert!(volume > 0.0 && volume <= cell.volume() + 1e-6);
                total += volume;
            }
        }
    }

    assert_relative_eq!(total, torus.signed_volume(), max_relative = 1e-9);
}

#[test]
fn test_grid_cells_of_sphere_sum_to_whole() {
    let sphere = create_sphere(30.0, 2);
    let cuts = [-30.0, -5.0, 12.0, 30.0];
    let mut total = 0.0;

    for i in 0..3 {
        for j in 0..3 {
            for k in 0..3 {
                let cell = Aabb::new(
                    Point3::new(cuts[i], cuts[j], cuts[k]),
                    Point3::new(cuts[i + 1], cuts[j + 1], cuts[k + 1]),
                );
                if let Some(piece) = intersect_box(&sphere, &cell).unwrap() {
                    let aabb = piece.aabb().unwrap();
                    assert!(cell.contains_with_tolerance(&aabb.min, 1e-9));
                    assert!(cell.contains_with_tolerance(&aabb.max, 1e-9));
                    total += piece.signed_volume();
                }
            }
        }
    }

    assert_relative_eq!(total, sphere.signed_volume(), max_relative = 1e-9);
}

// =============================================================================
// Sections and containment
// =============================================================================

#[test]
fn test_sphere_section_approaches_disc_area() {
    let sphere = create_sphere(10.0, 4);
    let section = cross_section(&sphere, &Plane::axis_aligned(2, 0.0, true));
    let disc = PI * 100.0;
    assert!(section.area < disc);
    assert!(section.area > disc * 0.98);
    assert_eq!(section.contours.len(), 1);
}

#[test]
fn test_contains_point_in_sphere() {
    let sphere = create_sphere(10.0, 2);
    assert!(contains_point(&sphere, &Point3::origin()));
    assert!(contains_point(&sphere, &Point3::new(0.0, 0.0, 8.0)));
    assert!(!contains_point(&sphere, &Point3::new(0.0, 0.0, 10.5)));
    assert!(!contains_point(&sphere, &Point3::new(9.0, 9.0, 0.0)));
}

#[test]
fn test_socket_carved_from_block() {
    let part = block([0.0, 0.0, 0.0], [20.0, 20.0, 10.0]);
    let socket = Aabb::new(Point3::new(8.0, 8.0, 7.0), Point3::new(12.0, 12.0, 10.0));
    let carved = subtract_box(&part, &socket).unwrap().unwrap();
    assert_relative_eq!(carved.signed_volume(), 4000.0 - 48.0, epsilon = 1e-6);
    assert!(!contains_point(&carved, &Point3::new(10.0, 10.0, 9.0)));
    assert!(contains_point(&carved, &Point3::new(10.0, 10.0, 6.0)));
}

// =============================================================================
// I/O and repair
// =============================================================================

#[test]
fn test_clipped_piece_survives_stl_roundtrip() {
    let sphere = create_sphere(25.0, 2);
    let piece = clip_by_plane(&sphere, &Plane::axis_aligned(0, 5.0, true), true)
        .unwrap()
        .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("part_0.stl");
    save_mesh(&piece, &path).unwrap();

    let reloaded = load_mesh(&path).unwrap();
    let report = validate_mesh(&reloaded);
    assert!(report.is_watertight);
    assert_relative_eq!(reloaded.volume(), piece.volume(), max_relative = 1e-4);
}

#[test]
fn test_torus_cells_stay_closed_through_stl_roundtrip() {
    // Cell walls at x = -750 and y = 0 run through the tube's center line and
    // along whole vertex rings; caps must not rely on f64-only separation
    let torus = create_torus(750.0, 250.0, 48, 24);
    let cuts: Vec<f64> = (0..=8).map(|i| -1000.0 + 250.0 * f64::from(i)).collect();
    let z = [-250.0, 0.0, 250.0];
    let dir = TempDir::new().unwrap();
    let mut pieces = 0;

    for i in 0..8 {
        for j in 0..8 {
            for k in 0..2 {
                let cell = Aabb::new(
                    Point3::new(cuts[i], cuts[j], z[k]),
                    Point3::new(cuts[i + 1], cuts[j + 1], z[k + 1]),
                );
                let Some(piece) = intersect_box(&torus, &cell).unwrap() else {
                    continue;
                };
                let path = dir.path().join(format!("cell_{i}_{j}_{k}.stl"));
                save_mesh(&piece, &path).unwrap();
                let reloaded = load_mesh(&path).unwrap();
                assert!(
                    MeshAdjacency::build(&reloaded.faces).is_oriented_closed(),
                    "cell {i} {j} {k} opened on reload"
                );
                pieces += 1;
            }
        }
    }
    assert_eq!(pieces, 112);
}

#[test]
fn test_repair_restores_holed_sphere() {
    let mut sphere = create_sphere(10.0, 1);
    let expected_faces = sphere.face_count();
    sphere.faces.swap_remove(7);
    assert!(!validate_mesh(&sphere).is_watertight);

    let summary = repair_mesh(&mut sphere).unwrap();
    assert_eq!(summary.holes_filled, 1);
    assert_eq!(sphere.face_count(), expected_faces);
    assert!(validate_mesh(&sphere).is_closed_volume());
}
