//! Benchmarks for the kernel operations the decomposition engine leans on.
//!
//! Run with: cargo bench -p mesh-kernel
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-kernel -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-kernel -- --baseline main

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_kernel::{Aabb, Mesh, Plane, Vertex};
use nalgebra::Point3;
use std::collections::HashMap;

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Icosphere of radius 50 with the given subdivision level.
fn create_sphere(subdivisions: u32) -> Mesh {
    let mut mesh = Mesh::new();

    let phi = (1.0 + 5.0_f64.sqrt()) / 2.0;
    let a = 1.0;
    let b = 1.0 / phi;

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
        mesh = subdivide_sphere(&mesh);
    }

    mesh_kernel::orient_outward(&mut mesh);
    mesh.scale(50.0);
    mesh
}

fn subdivide_sphere(mesh: &Mesh) -> Mesh {
    let mut new_mesh = Mesh::new();
    new_mesh.vertices = mesh.vertices.clone();

    let mut edge_midpoints: HashMap<(u32, u32), u32> = HashMap::new();

    let mut get_midpoint = |v1: u32, v2: u32, vertices: &mut Vec<Vertex>| -> u32 {
        let key = if v1 < v2 { (v1, v2) } else { (v2, v1) };
        if let Some(&idx) = edge_midpoints.get(&key) {
            return idx;
        }
        let m = (vertices[v1 as usize].position.coords + vertices[v2 as usize].position.coords)
            .normalize();
        let idx = vertices.len() as u32;
        vertices.push(Vertex::from_coords(m.x, m.y, m.z));
        edge_midpoints.insert(key, idx);
        idx
    };

    for face in &mesh.faces {
        let [v0, v1, v2] = *face;
        let m01 = get_midpoint(v0, v1, &mut new_mesh.vertices);
        let m12 = get_midpoint(v1, v2, &mut new_mesh.vertices);
        let m20 = get_midpoint(v2, v0, &mut new_mesh.vertices);

        new_mesh.faces.push([v0, m01, m20]);
        new_mesh.faces.push([v1, m12, m01]);
        new_mesh.faces.push([v2, m20, m12]);
        new_mesh.faces.push([m01, m12, m20]);
    }

    new_mesh
}

fn test_spheres() -> [(&'static str, Mesh); 3] {
    [
        ("sphere_320tri", create_sphere(2)),
        ("sphere_1280tri", create_sphere(3)),
        ("sphere_5120tri", create_sphere(4)),
    ]
}

// =============================================================================
// Cross-section Benchmarks
// =============================================================================

fn bench_cross_section(c: &mut Criterion) {
    let mut group = c.benchmark_group("CrossSection");

    for (name, mesh) in &test_spheres() {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        group.bench_with_input(BenchmarkId::new("single", name), mesh, |b, mesh| {
            let plane = Plane::axis_aligned(2, 3.0, true);
            b.iter(|| mesh_kernel::cross_section(black_box(mesh), &plane))
        });

        // A full sweep as the cut planner runs it
        group.bench_with_input(BenchmarkId::new("sweep_50", name), mesh, |b, mesh| {
            b.iter(|| {
                (0..50)
                    .map(|i| {
                        let plane = Plane::axis_aligned(2, -49.0 + i as f64 * 2.0, true);
                        mesh_kernel::cross_section_area(black_box(mesh), &plane)
                    })
                    .sum::<f64>()
            })
        });
    }

    group.finish();
}

// =============================================================================
// Clipping Benchmarks
// =============================================================================

fn bench_clip(c: &mut Criterion) {
    let mut group = c.benchmark_group("Clip");

    for (name, mesh) in &test_spheres() {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        group.bench_with_input(BenchmarkId::new("capped", name), mesh, |b, mesh| {
            let plane = Plane::axis_aligned(0, 7.0, true);
            b.iter(|| mesh_kernel::clip_by_plane(black_box(mesh), &plane, true))
        });

        group.bench_with_input(BenchmarkId::new("intersect_box", name), mesh, |b, mesh| {
            let cell = Aabb::new(Point3::new(-10.0, -20.0, -5.0), Point3::new(30.0, 25.0, 40.0));
            b.iter(|| mesh_kernel::intersect_box(black_box(mesh), &cell))
        });
    }

    group.finish();
}

// =============================================================================
// Boolean Benchmarks
// =============================================================================

fn bench_boolean(c: &mut Criterion) {
    let mut group = c.benchmark_group("Boolean");
    let socket = Aabb::new(Point3::new(-5.0, -5.0, 30.0), Point3::new(5.0, 5.0, 60.0));
    let query = Point3::new(1.0, 2.0, 3.0);

    for (name, mesh) in &test_spheres() {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        group.bench_with_input(BenchmarkId::new("subtract_box", name), mesh, |b, mesh| {
            b.iter(|| mesh_kernel::subtract_box(black_box(mesh), &socket))
        });

        group.bench_with_input(BenchmarkId::new("contains_point", name), mesh, |b, mesh| {
            b.iter(|| mesh_kernel::contains_point(black_box(mesh), &query))
        });
    }

    group.finish();
}

// =============================================================================
// Repair Benchmarks
// =============================================================================

fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("Repair");

    for (name, mesh) in &test_spheres() {
        group.throughput(Throughput::Elements(mesh.faces.len() as u64));

        let mut holed = mesh.clone();
        holed.faces.truncate(holed.faces.len() - 3);

        group.bench_with_input(BenchmarkId::new("repair_holed", name), &holed, |b, mesh| {
            b.iter(|| {
                let mut m = mesh.clone();
                mesh_kernel::repair_mesh(black_box(&mut m))
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cross_section,
    bench_clip,
    bench_boolean,
    bench_repair,
);

criterion_main!(benches);
