//! Boolean operations built from plane clipping.
//!
//! The decomposition engine only ever intersects a mesh with an axis-aligned
//! box and carves box-shaped sockets, so the operations here restrict the
//! second operand to convex solids and boxes. Within that restriction they
//! are exact up to the clipping tolerance and keep closed inputs closed.
//!
//! # Example
//!
//! ```
//! use mesh_kernel::{Aabb, Mesh, intersect_convex};
//! use nalgebra::Point3;
//!
//! let part = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(10.0, 10.0, 10.0)));
//! let cell = Mesh::cuboid(&Aabb::new(Point3::new(5.0, 5.0, 5.0), Point3::new(20.0, 20.0, 20.0)));
//!
//! let overlap = intersect_convex(&part, &cell).unwrap().unwrap();
//! assert!((overlap.volume() - 125.0).abs() < 1e-9);
//! ```

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::clip::clip_by_plane;
use crate::error::{MeshError, MeshResult};
use crate::section::plane_tolerance;
use crate::types::{Aabb, Mesh, Plane};

/// Inward-facing planes of a convex mesh, one per distinct face plane.
fn convex_planes(convex: &Mesh) -> MeshResult<Vec<Plane>> {
    let eps = plane_tolerance(convex);
    let mut planes: Vec<Plane> = Vec::new();

    for tri in convex.triangles() {
        let Some(normal) = tri.normal() else {
            continue;
        };
        let plane = Plane::new(tri.v0, -normal);
        let duplicate = planes.iter().any(|p| {
            (p.normal - plane.normal).norm() < 1e-9 && p.signed_distance(&plane.origin).abs() < eps
        });
        if duplicate {
            continue;
        }

        let escapes = convex
            .vertices
            .iter()
            .any(|v| plane.signed_distance(&v.position) < -eps * 10.0);
        if escapes {
            return Err(MeshError::boolean_failed(
                "intersection",
                "second operand is not convex",
            ));
        }
        planes.push(plane);
    }

    if planes.len() < 4 {
        return Err(MeshError::boolean_failed(
            "intersection",
            format!("second operand has only {} distinct face planes", planes.len()),
        ));
    }
    Ok(planes)
}

/// Intersect `mesh` with a closed convex solid.
///
/// Clips `mesh` successively by every face plane of `convex`, capping each
/// cut. Planes that `mesh` lies entirely inside are skipped. Returns
/// `Ok(None)` when the two don't overlap.
pub fn intersect_convex(mesh: &Mesh, convex: &Mesh) -> MeshResult<Option<Mesh>> {
    let (Some(a), Some(b)) = (mesh.aabb(), convex.aabb()) else {
        return Ok(None);
    };
    if a.intersection(&b).is_none() {
        return Ok(None);
    }

    let planes = convex_planes(convex)?;
    let mut current = mesh.clone();
    let mut cuts = 0;

    for plane in &planes {
        let eps = plane_tolerance(&current);
        if current
            .vertices
            .iter()
            .all(|v| plane.signed_distance(&v.position) >= -eps)
        {
            continue;
        }
        match clip_by_plane(&current, plane, true)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
        cuts += 1;
    }

    debug!(
        "Convex intersection: {} of {} planes cut, {} faces",
        cuts,
        planes.len(),
        current.face_count()
    );
    Ok(Some(current))
}

/// Intersect `mesh` with an axis-aligned box.
pub fn intersect_box(mesh: &Mesh, aabb: &Aabb) -> MeshResult<Option<Mesh>> {
    intersect_convex(mesh, &Mesh::cuboid(aabb))
}

fn clip_axis(mesh: &Mesh, axis: usize, position: f64, positive: bool) -> MeshResult<Option<Mesh>> {
    clip_by_plane(mesh, &Plane::axis_aligned(axis, position, positive), true)
}

/// Remove an axis-aligned box from `mesh`.
///
/// The material outside the box is cut into up to six slabs (below and above
/// the box in x, then in y within the x range, then in z within the x and y
/// range), each closed on its own, and the slabs are concatenated. Slabs
/// touch but never overlap. Returns `Ok(None)` when the box swallows the
/// whole mesh.
pub fn subtract_box(mesh: &Mesh, aabb: &Aabb) -> MeshResult<Option<Mesh>> {
    let Some(bounds) = mesh.aabb() else {
        return Ok(None);
    };
    if bounds.intersection(aabb).is_none() {
        return Ok(Some(mesh.clone()));
    }

    let mut result = Mesh::new();
    let mut rest = Some(mesh.clone());

    for axis in 0..3 {
        let Some(current) = rest.take() else {
            break;
        };
        let (lo, hi) = (aabb.min[axis], aabb.max[axis]);

        if let Some(below) = clip_axis(&current, axis, lo, false)? {
            result.append(&below);
        }
        if let Some(above) = clip_axis(&current, axis, hi, true)? {
            result.append(&above);
        }

        rest = match clip_axis(&current, axis, lo, true)? {
            Some(inside_lo) => clip_axis(&inside_lo, axis, hi, false)?,
            None => None,
        };
    }

    if result.faces.is_empty() {
        Ok(None)
    } else {
        Ok(Some(result))
    }
}

/// Combine two shells whose interiors don't overlap.
///
/// The result is the concatenation; touching faces are left in place.
pub fn merge(a: &Mesh, b: &Mesh) -> Mesh {
    let mut out = Mesh::with_capacity(a.vertex_count() + b.vertex_count(), a.face_count() + b.face_count());
    out.append(a);
    out.append(b);
    out
}

/// Ray-parity point containment.
///
/// Casts three skewed rays and takes the majority, so a query on a grid line
/// that grazes an edge or vertex along one ray is still classified.
pub fn contains_point(mesh: &Mesh, point: &Point3<f64>) -> bool {
    if let Some(aabb) = mesh.aabb()
        && !aabb.contains(point)
    {
        return false;
    }

    let directions = [
        Vector3::new(1.0, 0.000_137_1, 0.000_071_9),
        Vector3::new(-0.000_093_7, 1.0, 0.000_113_3),
        Vector3::new(0.000_061_1, -0.000_127_3, 1.0),
    ];

    let votes = directions
        .iter()
        .filter(|dir| {
            let hits = mesh
                .triangles()
                .filter(|t| ray_hits_triangle(point, dir, &t.v0, &t.v1, &t.v2))
                .count();
            hits % 2 == 1
        })
        .count();

    votes >= 2
}

/// Möller-Trumbore ray/triangle test for hits strictly in front of the origin.
fn ray_hits_triangle(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> bool {
    let epsilon = 1e-10;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = dir.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < epsilon {
        return false;
    }

    let f = 1.0 / a;
    let s = origin - v0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return false;
    }

    let q = s.cross(&edge1);
    let v = f * dir.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return false;
    }

    f * edge2.dot(&q) > epsilon
}
