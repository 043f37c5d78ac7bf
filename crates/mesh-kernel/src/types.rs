//! Core mesh data types.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A vertex in the mesh.
///
/// Coordinates are millimeters throughout the workspace.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,

    /// Unit normal vector, computed from adjacent faces.
    pub normal: Option<Vector3<f64>>,
}

impl Vertex {
    /// Create a new vertex with only position set.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a box from two corners. Corners are reordered per axis.
    pub fn new(a: Point3<f64>, b: Point3<f64>) -> Self {
        Self {
            min: Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Bounding box of a point set, `None` when empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut aabb = Self {
            min: first,
            max: first,
        };
        for p in iter {
            aabb.include(p);
        }
        Some(aabb)
    }

    /// Grow the box to contain `p`.
    pub fn include(&mut self, p: &Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Edge lengths along x, y, z.
    #[inline]
    pub fn extents(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Edge length along axis index 0, 1 or 2.
    #[inline]
    pub fn extent(&self, axis: usize) -> f64 {
        self.max[axis] - self.min[axis]
    }

    /// Largest edge length.
    pub fn max_extent(&self) -> f64 {
        self.extents().max()
    }

    #[inline]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        let e = self.extents();
        e.x * e.y * e.z
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Inclusive containment test with a tolerance on every side.
    pub fn contains_with_tolerance(&self, p: &Point3<f64>, tolerance: f64) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] - tolerance && p[i] <= self.max[i] + tolerance)
    }

    /// Overlap of two boxes, `None` when they are disjoint.
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        let min = Point3::new(
            self.min.x.max(other.min.x),
            self.min.y.max(other.min.y),
            self.min.z.max(other.min.z),
        );
        let max = Point3::new(
            self.max.x.min(other.max.x),
            self.max.y.min(other.max.y),
            self.max.z.min(other.max.z),
        );
        if (0..3).all(|i| min[i] <= max[i]) {
            Some(Aabb { min, max })
        } else {
            None
        }
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        out.include(&other.min);
        out.include(&other.max);
        out
    }
}

/// An oriented plane. The normal points into the half-space that clipping keeps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub origin: Point3<f64>,
    /// Unit normal.
    pub normal: Vector3<f64>,
}

impl Plane {
    /// Create a plane. The normal is normalized; a zero normal is kept as-is.
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Self {
        let len = normal.norm();
        let normal = if len > f64::EPSILON {
            normal / len
        } else {
            normal
        };
        Self { origin, normal }
    }

    /// Plane orthogonal to a principal axis at `position`, facing `+axis` or `-axis`.
    pub fn axis_aligned(axis: usize, position: f64, positive: bool) -> Self {
        let mut origin = Point3::origin();
        origin[axis] = position;
        let mut normal = Vector3::zeros();
        normal[axis] = if positive { 1.0 } else { -1.0 };
        Self { origin, normal }
    }

    /// Signed distance from `p`, positive on the kept side.
    #[inline]
    pub fn signed_distance(&self, p: &Point3<f64>) -> f64 {
        (p - self.origin).dot(&self.normal)
    }

    /// Same plane, opposite orientation.
    pub fn flipped(&self) -> Self {
        Self {
            origin: self.origin,
            normal: -self.normal,
        }
    }

    /// Orthonormal in-plane basis `(u, v)` with `u × v = normal`.
    pub fn basis(&self) -> (Vector3<f64>, Vector3<f64>) {
        let n = self.normal;
        let helper = if n.x.abs() < 0.9 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let u = helper.cross(&n).normalize();
        let v = n.cross(&u);
        (u, v)
    }
}

/// A triangle mesh with indexed vertices and faces.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    /// Each face is [v0, v1, v2] with counter-clockwise winding seen from outside.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Closed box with 8 vertices and 12 outward-facing triangles.
    pub fn cuboid(aabb: &Aabb) -> Self {
        let (lo, hi) = (aabb.min, aabb.max);
        let mut mesh = Self::with_capacity(8, 12);
        for &(x, y, z) in &[
            (lo.x, lo.y, lo.z),
            (hi.x, lo.y, lo.z),
            (hi.x, hi.y, lo.z),
            (lo.x, hi.y, lo.z),
            (lo.x, lo.y, hi.z),
            (hi.x, lo.y, hi.z),
            (hi.x, hi.y, hi.z),
            (lo.x, hi.y, hi.z),
        ] {
            mesh.vertices.push(Vertex::from_coords(x, y, z));
        }
        mesh.faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        mesh
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces (triangles) in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if mesh is empty.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        self.aabb().map(|b| (b.min, b.max))
    }

    /// Bounding box as an [`Aabb`].
    pub fn aabb(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }

    /// Iterate over triangles, yielding Triangle structs with actual vertex data.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|&[i0, i1, i2]| Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        })
    }

    /// Get a specific triangle by face index.
    pub fn triangle(&self, face_idx: usize) -> Option<Triangle> {
        self.faces.get(face_idx).map(|&[i0, i1, i2]| Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        })
    }

    /// Translate mesh by the given vector.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Scale mesh uniformly around the origin.
    pub fn scale(&mut self, factor: f64) {
        for vertex in &mut self.vertices {
            vertex.position.coords *= factor;
        }
    }

    /// Reverse the winding of every face.
    pub fn flip(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
        for vertex in &mut self.vertices {
            if let Some(n) = vertex.normal.as_mut() {
                *n = -*n;
            }
        }
    }

    /// Append another mesh's vertices and faces.
    pub fn append(&mut self, other: &Mesh) {
        let offset = self.vertices.len() as u32;
        self.vertices.extend(other.vertices.iter().cloned());
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| [f[0] + offset, f[1] + offset, f[2] + offset]),
        );
    }

    /// Compute the signed volume of the mesh.
    ///
    /// Uses the divergence theorem: the signed volume is the sum of signed tetrahedra
    /// volumes formed by each face and the origin. For a closed mesh with outward-facing
    /// normals this returns a positive value; inside-out meshes return a negative value.
    /// Open meshes give a value that is not a meaningful volume.
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;

        for &[i0, i1, i2] in &self.faces {
            let v0 = &self.vertices[i0 as usize].position.coords;
            let v1 = &self.vertices[i1 as usize].position.coords;
            let v2 = &self.vertices[i2 as usize].position.coords;
            volume += v0.dot(&v1.cross(v2));
        }

        volume / 6.0
    }

    /// Absolute enclosed volume, regardless of normal orientation.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// True if the signed volume is negative (normals point inward).
    #[inline]
    pub fn is_inside_out(&self) -> bool {
        self.signed_volume() < 0.0
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// A triangle with concrete vertex positions.
///
/// Winding is counter-clockwise when viewed from the front (normal points toward viewer).
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Compute the (unnormalized) face normal via cross product.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        e1.cross(&e2)
    }

    /// Compute the unit face normal.
    /// Returns None for degenerate triangles (zero area).
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len_sq = n.norm_squared();
        if len_sq > f64::EPSILON {
            Some(n / len_sq.sqrt())
        } else {
            None
        }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// The three vertices in winding order.
    #[inline]
    pub fn points(&self) -> [Point3<f64>; 3] {
        [self.v0, self.v1, self.v2]
    }

    /// Check if the triangle is degenerate (zero or near-zero area).
    pub fn is_degenerate(&self, epsilon: f64) -> bool {
        self.area() < epsilon
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    pub(crate) fn make_unit_cube() -> Mesh {
        Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)))
    }

    #[test]
    fn test_vertex_creation() {
        let v = Vertex::from_coords(1.0, 2.0, 3.0);
        assert_eq!(v.position, Point3::new(1.0, 2.0, 3.0));
        assert!(v.normal.is_none());
    }

    #[test]
    fn test_triangle_normal_and_area() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        let normal = tri.normal().expect("non-degenerate triangle");
        assert_relative_eq!(normal, Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(tri.area(), 0.5);
        assert_relative_eq!(tri.centroid(), Point3::new(1.0 / 3.0, 1.0 / 3.0, 0.0));
    }

    #[test]
    fn test_degenerate_triangle_normal() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(tri.normal().is_none());
        assert!(tri.is_degenerate(1e-12));
    }

    #[test]
    fn test_cuboid_is_outward_closed_box() {
        let aabb = Aabb::new(Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 6.0, 8.0));
        let mesh = Mesh::cuboid(&aabb);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.face_count(), 12);
        assert_relative_eq!(mesh.signed_volume(), 60.0, epsilon = 1e-9);
        assert_eq!(mesh.aabb(), Some(aabb));
    }

    #[test]
    fn test_mesh_bounds() {
        let cube = make_unit_cube();
        let (min, max) = cube.bounds().expect("cube has vertices");
        assert_eq!(min, Point3::origin());
        assert_eq!(max, Point3::new(1.0, 1.0, 1.0));
        assert!(Mesh::new().bounds().is_none());
    }

    #[test]
    fn test_signed_volume_scaled_translated_cube() {
        let mut cube = make_unit_cube();
        cube.scale(2.0);
        cube.translate(Vector3::new(10.0, -5.0, 3.0));
        assert_relative_eq!(cube.signed_volume(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_flip_inverts_volume() {
        let mut cube = make_unit_cube();
        cube.flip();
        assert!(cube.is_inside_out());
        assert_relative_eq!(cube.volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_surface_area_unit_cube() {
        assert_relative_eq!(make_unit_cube().surface_area(), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_append_offsets_indices() {
        let mut a = make_unit_cube();
        let mut b = make_unit_cube();
        b.translate(Vector3::new(5.0, 0.0, 0.0));
        a.append(&b);
        assert_eq!(a.vertex_count(), 16);
        assert_eq!(a.faces[12], [8, 10, 9]);
        assert_relative_eq!(a.volume(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_aabb_intersection_and_contains() {
        let a = Aabb::new(Point3::origin(), Point3::new(2.0, 2.0, 2.0));
        let b = Aabb::new(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0));
        let overlap = a.intersection(&b).expect("boxes overlap");
        assert_relative_eq!(overlap.volume(), 1.0);
        assert!(a.contains(&Point3::new(2.0, 0.0, 1.0)));
        assert!(!a.contains(&Point3::new(2.1, 0.0, 1.0)));
        let far = Aabb::new(Point3::new(5.0, 5.0, 5.0), Point3::new(6.0, 6.0, 6.0));
        assert!(a.intersection(&far).is_none());
    }

    #[test]
    fn test_plane_basis_is_right_handed() {
        for normal in [Vector3::x(), Vector3::y(), -Vector3::z()] {
            let plane = Plane::new(Point3::origin(), normal);
            let (u, v) = plane.basis();
            assert_relative_eq!(u.cross(&v), normal, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_plane_signed_distance() {
        let plane = Plane::axis_aligned(2, 5.0, false);
        assert_relative_eq!(plane.signed_distance(&Point3::new(0.0, 0.0, 2.0)), 3.0);
        assert_relative_eq!(
            plane.flipped().signed_distance(&Point3::new(0.0, 0.0, 2.0)),
            -3.0
        );
    }
}
