//! The geometry capabilities the engine needs, and the native implementation.
//!
//! The engine never touches vertices or faces directly: everything goes
//! through [`GeometryKernel`]. Mesh handles are owned values; fragments are
//! independent copies once split.
//!
//! # Thread Safety
//!
//! A kernel reports through [`GeometryKernel::is_reentrant`] whether its
//! methods may run concurrently on shared meshes. [`NativeKernel`] is
//! reentrant. Wrap a kernel that is not in [`SerializedKernel`], which puts
//! every call behind one process-wide lock.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use mesh_kernel::{Aabb, Mesh, MeshError, Plane};
use nalgebra::{Point3, Vector3};

/// Topology summary used by the repair advisor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TopologyReport {
    pub boundary_edges: usize,
    pub non_manifold_edges: usize,
    pub inconsistent_edges: usize,
    pub components: usize,
    pub signed_volume: f64,
    pub vertex_count: usize,
    pub face_count: usize,
}

impl TopologyReport {
    pub fn is_watertight(&self) -> bool {
        self.boundary_edges == 0
    }

    pub fn is_manifold(&self) -> bool {
        self.non_manifold_edges == 0
    }
}

/// Mesh operations required by the decomposition engine.
pub trait GeometryKernel: Send + Sync {
    type Mesh: Clone + Send + Sync;
    type Error: std::error::Error + Send + Sync + 'static;

    /// True if methods may be called concurrently.
    fn is_reentrant(&self) -> bool {
        true
    }

    fn load(&self, path: &Path) -> Result<Self::Mesh, Self::Error>;
    fn export(&self, mesh: &Self::Mesh, path: &Path) -> Result<(), Self::Error>;

    /// Axis-aligned bounds, `None` for an empty mesh.
    fn bounds(&self, mesh: &Self::Mesh) -> Option<Aabb>;
    fn volume(&self, mesh: &Self::Mesh) -> f64;
    fn face_count(&self, mesh: &Self::Mesh) -> usize;
    fn vertex_positions(&self, mesh: &Self::Mesh) -> Vec<Point3<f64>>;

    fn is_watertight(&self, mesh: &Self::Mesh) -> bool;
    /// Watertight, manifold, consistently wound, positive volume.
    fn is_closed_volume(&self, mesh: &Self::Mesh) -> bool;
    fn topology(&self, mesh: &Self::Mesh) -> TopologyReport;

    fn scale(&self, mesh: &Self::Mesh, factor: f64) -> Self::Mesh;
    fn translate(&self, mesh: &Self::Mesh, offset: Vector3<f64>) -> Self::Mesh;

    /// Keep the part on the positive side of `plane`. `None` if nothing remains.
    fn slice_by_plane(
        &self,
        mesh: &Self::Mesh,
        plane: &Plane,
        cap: bool,
    ) -> Result<Option<Self::Mesh>, Self::Error>;

    /// Boolean intersection. `None` if the operands do not overlap.
    fn intersect(
        &self,
        mesh: &Self::Mesh,
        other: &Self::Mesh,
    ) -> Result<Option<Self::Mesh>, Self::Error>;

    /// Closed box mesh.
    fn cuboid(&self, aabb: &Aabb) -> Self::Mesh;

    fn intersect_box(
        &self,
        mesh: &Self::Mesh,
        aabb: &Aabb,
    ) -> Result<Option<Self::Mesh>, Self::Error> {
        self.intersect(mesh, &self.cuboid(aabb))
    }

    /// Remove a box from the mesh. `None` if nothing remains.
    fn subtract_box(
        &self,
        mesh: &Self::Mesh,
        aabb: &Aabb,
    ) -> Result<Option<Self::Mesh>, Self::Error>;

    /// Combine two interior-disjoint solids. Each stays a separate shell.
    fn merge(&self, a: &Self::Mesh, b: &Self::Mesh) -> Self::Mesh;

    /// Area of the section by `plane`, `None` if the plane misses the mesh.
    fn cross_section_area(&self, mesh: &Self::Mesh, plane: &Plane) -> Option<f64>;
    /// Closed section contours.
    fn section_contours(&self, mesh: &Self::Mesh, plane: &Plane) -> Vec<Vec<Point3<f64>>>;
    fn contains_point(&self, mesh: &Self::Mesh, point: &Point3<f64>) -> bool;

    fn merge_vertices(&self, mesh: &mut Self::Mesh, tolerance: f64) -> usize;
    fn remove_degenerate_faces(&self, mesh: &mut Self::Mesh) -> usize;
    fn remove_duplicate_faces(&self, mesh: &mut Self::Mesh) -> usize;
    fn fill_holes(&self, mesh: &mut Self::Mesh) -> Result<usize, Self::Error>;
    /// Make winding consistent and outward. Returns faces flipped.
    fn fix_normals(&self, mesh: &mut Self::Mesh) -> Result<usize, Self::Error>;
    fn split_connected_components(&self, mesh: &Self::Mesh) -> Vec<Self::Mesh>;
}

/// The kernel backed by `mesh-kernel`. Reentrant.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKernel;

impl GeometryKernel for NativeKernel {
    type Mesh = Mesh;
    type Error = MeshError;

    fn load(&self, path: &Path) -> Result<Mesh, MeshError> {
        mesh_kernel::load_mesh(path)
    }

    fn export(&self, mesh: &Mesh, path: &Path) -> Result<(), MeshError> {
        mesh_kernel::save_mesh(mesh, path)
    }

    fn bounds(&self, mesh: &Mesh) -> Option<Aabb> {
        mesh.aabb()
    }

    fn volume(&self, mesh: &Mesh) -> f64 {
        mesh.volume()
    }

    fn face_count(&self, mesh: &Mesh) -> usize {
        mesh.face_count()
    }

    fn vertex_positions(&self, mesh: &Mesh) -> Vec<Point3<f64>> {
        mesh.vertices.iter().map(|v| v.position).collect()
    }

    fn is_watertight(&self, mesh: &Mesh) -> bool {
        mesh.is_watertight()
    }

    fn is_closed_volume(&self, mesh: &Mesh) -> bool {
        mesh.validate().is_closed_volume()
    }

    fn topology(&self, mesh: &Mesh) -> TopologyReport {
        let report = mesh.validate();
        TopologyReport {
            boundary_edges: report.boundary_edge_count,
            non_manifold_edges: report.non_manifold_edge_count,
            inconsistent_edges: report.inconsistent_edge_count,
            components: report.component_count,
            signed_volume: report.signed_volume,
            vertex_count: report.vertex_count,
            face_count: report.face_count,
        }
    }

    fn scale(&self, mesh: &Mesh, factor: f64) -> Mesh {
        let mut scaled = mesh.clone();
        scaled.scale(factor);
        scaled
    }

    fn translate(&self, mesh: &Mesh, offset: Vector3<f64>) -> Mesh {
        let mut moved = mesh.clone();
        moved.translate(offset);
        moved
    }

    fn slice_by_plane(&self, mesh: &Mesh, plane: &Plane, cap: bool) -> Result<Option<Mesh>, MeshError> {
        mesh_kernel::clip_by_plane(mesh, plane, cap)
    }

    fn intersect(&self, mesh: &Mesh, other: &Mesh) -> Result<Option<Mesh>, MeshError> {
        mesh_kernel::intersect_convex(mesh, other)
    }

    fn cuboid(&self, aabb: &Aabb) -> Mesh {
        Mesh::cuboid(aabb)
    }

    fn intersect_box(&self, mesh: &Mesh, aabb: &Aabb) -> Result<Option<Mesh>, MeshError> {
        mesh_kernel::intersect_box(mesh, aabb)
    }

    fn subtract_box(&self, mesh: &Mesh, aabb: &Aabb) -> Result<Option<Mesh>, MeshError> {
        mesh_kernel::subtract_box(mesh, aabb)
    }

    fn merge(&self, a: &Mesh, b: &Mesh) -> Mesh {
        mesh_kernel::merge(a, b)
    }

    fn cross_section_area(&self, mesh: &Mesh, plane: &Plane) -> Option<f64> {
        let section = mesh_kernel::cross_section(mesh, plane);
        (!section.is_empty()).then_some(section.area)
    }

    fn section_contours(&self, mesh: &Mesh, plane: &Plane) -> Vec<Vec<Point3<f64>>> {
        mesh_kernel::cross_section(mesh, plane).contours
    }

    fn contains_point(&self, mesh: &Mesh, point: &Point3<f64>) -> bool {
        mesh_kernel::contains_point(mesh, point)
    }

    fn merge_vertices(&self, mesh: &mut Mesh, tolerance: f64) -> usize {
        let merged = mesh_kernel::weld_vertices(mesh, tolerance);
        mesh_kernel::remove_unreferenced_vertices(mesh);
        merged
    }

    fn remove_degenerate_faces(&self, mesh: &mut Mesh) -> usize {
        mesh_kernel::remove_degenerate_triangles(mesh, 1e-9)
    }

    fn remove_duplicate_faces(&self, mesh: &mut Mesh) -> usize {
        mesh_kernel::remove_duplicate_faces(mesh)
    }

    fn fill_holes(&self, mesh: &mut Mesh) -> Result<usize, MeshError> {
        mesh_kernel::fill_holes(mesh)
    }

    fn fix_normals(&self, mesh: &mut Mesh) -> Result<usize, MeshError> {
        let before = mesh.faces.clone();
        mesh_kernel::fix_winding_order(mesh)?;
        mesh_kernel::orient_outward(mesh);
        Ok(before.iter().zip(&mesh.faces).filter(|(a, b)| a != b).count())
    }

    fn split_connected_components(&self, mesh: &Mesh) -> Vec<Mesh> {
        mesh.split_components()
    }
}

static KERNEL_LOCK: Mutex<()> = Mutex::new(());

fn kernel_lock() -> MutexGuard<'static, ()> {
    KERNEL_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Serializes every call to the wrapped kernel through a process-wide lock.
#[derive(Debug, Clone, Default)]
pub struct SerializedKernel<K> {
    inner: K,
}

impl<K> SerializedKernel<K> {
    pub fn new(inner: K) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> K {
        self.inner
    }
}

macro_rules! serialized {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {{
        let _guard = kernel_lock();
        $self.inner.$method($($arg),*)
    }};
}

impl<K: GeometryKernel> GeometryKernel for SerializedKernel<K> {
    type Mesh = K::Mesh;
    type Error = K::Error;

    fn is_reentrant(&self) -> bool {
        false
    }

    fn load(&self, path: &Path) -> Result<Self::Mesh, Self::Error> {
        serialized!(self.load(path))
    }

    fn export(&self, mesh: &Self::Mesh, path: &Path) -> Result<(), Self::Error> {
        serialized!(self.export(mesh, path))
    }

    fn bounds(&self, mesh: &Self::Mesh) -> Option<Aabb> {
        serialized!(self.bounds(mesh))
    }

    fn volume(&self, mesh: &Self::Mesh) -> f64 {
        serialized!(self.volume(mesh))
    }

    fn face_count(&self, mesh: &Self::Mesh) -> usize {
        serialized!(self.face_count(mesh))
    }

    fn vertex_positions(&self, mesh: &Self::Mesh) -> Vec<Point3<f64>> {
        serialized!(self.vertex_positions(mesh))
    }

    fn is_watertight(&self, mesh: &Self::Mesh) -> bool {
        serialized!(self.is_watertight(mesh))
    }

    fn is_closed_volume(&self, mesh: &Self::Mesh) -> bool {
        serialized!(self.is_closed_volume(mesh))
    }

    fn topology(&self, mesh: &Self::Mesh) -> TopologyReport {
        serialized!(self.topology(mesh))
    }

    fn scale(&self, mesh: &Self::Mesh, factor: f64) -> Self::Mesh {
        serialized!(self.scale(mesh, factor))
    }

    fn translate(&self, mesh: &Self::Mesh, offset: Vector3<f64>) -> Self::Mesh {
        serialized!(self.translate(mesh, offset))
    }

    fn slice_by_plane(
        &self,
        mesh: &Self::Mesh,
        plane: &Plane,
        cap: bool,
    ) -> Result<Option<Self::Mesh>, Self::Error> {
        serialized!(self.slice_by_plane(mesh, plane, cap))
    }

    fn intersect(
        &self,
        mesh: &Self::Mesh,
        other: &Self::Mesh,
    ) -> Result<Option<Self::Mesh>, Self::Error> {
        serialized!(self.intersect(mesh, other))
    }

    fn cuboid(&self, aabb: &Aabb) -> Self::Mesh {
        serialized!(self.cuboid(aabb))
    }

    fn intersect_box(
        &self,
        mesh: &Self::Mesh,
        aabb: &Aabb,
    ) -> Result<Option<Self::Mesh>, Self::Error> {
        serialized!(self.intersect_box(mesh, aabb))
    }

    fn subtract_box(
        &self,
        mesh: &Self::Mesh,
        aabb: &Aabb,
    ) -> Result<Option<Self::Mesh>, Self::Error> {
        serialized!(self.subtract_box(mesh, aabb))
    }

    fn merge(&self, a: &Self::Mesh, b: &Self::Mesh) -> Self::Mesh {
        serialized!(self.merge(a, b))
    }

    fn cross_section_area(&self, mesh: &Self::Mesh, plane: &Plane) -> Option<f64> {
        serialized!(self.cross_section_area(mesh, plane))
    }

    fn section_contours(&self, mesh: &Self::Mesh, plane: &Plane) -> Vec<Vec<Point3<f64>>> {
        serialized!(self.section_contours(mesh, plane))
    }

    fn contains_point(&self, mesh: &Self::Mesh, point: &Point3<f64>) -> bool {
        serialized!(self.contains_point(mesh, point))
    }

    fn merge_vertices(&self, mesh: &mut Self::Mesh, tolerance: f64) -> usize {
        serialized!(self.merge_vertices(mesh, tolerance))
    }

    fn remove_degenerate_faces(&self, mesh: &mut Self::Mesh) -> usize {
        serialized!(self.remove_degenerate_faces(mesh))
    }

    fn remove_duplicate_faces(&self, mesh: &mut Self::Mesh) -> usize {
        serialized!(self.remove_duplicate_faces(mesh))
    }

    fn fill_holes(&self, mesh: &mut Self::Mesh) -> Result<usize, Self::Error> {
        serialized!(self.fill_holes(mesh))
    }

    fn fix_normals(&self, mesh: &mut Self::Mesh) -> Result<usize, Self::Error> {
        serialized!(self.fix_normals(mesh))
    }

    fn split_connected_components(&self, mesh: &Self::Mesh) -> Vec<Self::Mesh> {
        serialized!(self.split_connected_components(mesh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> Mesh {
        Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(1.0, 2.0, 3.0)))
    }

    #[test]
    fn test_native_kernel_measures() {
        let k = NativeKernel;
        let mesh = unit_box();
        assert_relative_eq!(k.volume(&mesh), 6.0, epsilon = 1e-12);
        assert!(k.is_watertight(&mesh));
        assert!(k.is_closed_volume(&mesh));
        assert_eq!(k.topology(&mesh).components, 1);
        assert_relative_eq!(
            k.cross_section_area(&mesh, &Plane::axis_aligned(2, 1.0, true)).unwrap(),
            2.0,
            epsilon = 1e-12
        );
        assert!(k.cross_section_area(&mesh, &Plane::axis_aligned(2, 9.0, true)).is_none());
    }

    #[test]
    fn test_native_scale_and_translate_copy() {
        let k = NativeKernel;
        let mesh = unit_box();
        let moved = k.translate(&k.scale(&mesh, 2.0), Vector3::new(1.0, 0.0, 0.0));
        let bounds = k.bounds(&moved).unwrap();
        assert_relative_eq!(bounds.min.x, 1.0);
        assert_relative_eq!(bounds.max.z, 6.0);
        // Source untouched
        assert_relative_eq!(k.bounds(&mesh).unwrap().max.z, 3.0);
    }

    #[test]
    fn test_fix_normals_counts_flips() {
        let k = NativeKernel;
        let mut mesh = unit_box();
        mesh.flip();
        assert_eq!(k.fix_normals(&mut mesh).unwrap(), 12);
        assert!(k.is_closed_volume(&mesh));
    }

    #[test]
    fn test_serialized_kernel_delegates() {
        let k = SerializedKernel::new(NativeKernel);
        assert!(!k.is_reentrant());
        let mesh = unit_box();
        let half = k
            .slice_by_plane(&mesh, &Plane::axis_aligned(0, 0.5, true), true)
            .unwrap()
            .unwrap();
        assert_relative_eq!(k.volume(&half), 3.0, epsilon = 1e-9);
    }
}
