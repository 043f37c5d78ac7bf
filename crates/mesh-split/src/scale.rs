//! Uniform scaling to a target height.

use nalgebra::Vector3;
use tracing::{debug, info};

use crate::config::Axis;
use crate::error::GeometryError;
use crate::kernel::GeometryKernel;

/// A mesh moved to the origin and scaled.
#[derive(Debug, Clone)]
pub struct Scaled<M> {
    pub mesh: M,
    pub factor: f64,
    /// Extents after scaling, per axis.
    pub extents: Vector3<f64>,
}

/// Scale factor that brings `extent` to `target_mm`.
pub fn scale_factor(extent: f64, target_mm: f64, axis: Axis) -> Result<f64, GeometryError> {
    if !(extent.is_finite() && extent > 0.0) {
        return Err(GeometryError::ZeroExtent { axis, extent });
    }
    Ok(target_mm / extent)
}

/// Move the bounding-box minimum to the origin, then scale uniformly so the
/// extent along `axis` equals `target_mm`.
pub fn normalize<K: GeometryKernel>(
    kernel: &K,
    mesh: &K::Mesh,
    target_mm: f64,
    axis: Axis,
) -> Result<Scaled<K::Mesh>, GeometryError> {
    let bounds = kernel
        .bounds(mesh)
        .ok_or(GeometryError::EmptyMesh { volume: 0.0 })?;
    let factor = scale_factor(bounds.extent(axis.index()), target_mm, axis)?;

    let at_origin = kernel.translate(mesh, -bounds.min.coords);
    let scaled = kernel.scale(&at_origin, factor);
    let extents = bounds.extents() * factor;

    info!(
        axis = %axis,
        factor = format!("{:.6}", factor),
        extents = format!("{:.1} x {:.1} x {:.1}", extents.x, extents.y, extents.z),
        "Scaled mesh to target height"
    );
    debug!(original = ?bounds.extents(), "Original extents");

    Ok(Scaled {
        mesh: scaled,
        factor,
        extents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::NativeKernel;
    use approx::assert_relative_eq;
    use mesh_kernel::{Aabb, Mesh};
    use nalgebra::Point3;

    #[test]
    fn test_scenario_two_feet_from_900mm() {
        let factor = scale_factor(900.0, 2.0 * 304.8, Axis::Z).unwrap();
        assert_relative_eq!(factor, 0.6773, epsilon = 1e-4);
    }

    #[test]
    fn test_zero_extent_is_error() {
        assert!(matches!(
            scale_factor(0.0, 100.0, Axis::Y),
            Err(GeometryError::ZeroExtent { axis: Axis::Y, .. })
        ));
    }

    #[test]
    fn test_normalize_is_isotropic_and_anchored() {
        let mesh = Mesh::cuboid(&Aabb::new(
            Point3::new(-10.0, 5.0, 100.0),
            Point3::new(10.0, 45.0, 1000.0),
        ));
        let scaled = normalize(&NativeKernel, &mesh, 609.6, Axis::Z).unwrap();
        let bounds = scaled.mesh.aabb().unwrap();

        assert_relative_eq!(bounds.min.coords.norm(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.extent(2), 609.6, max_relative = 1e-6);
        assert_relative_eq!(bounds.extent(0), 20.0 * scaled.factor, max_relative = 1e-9);
        assert_relative_eq!(bounds.extent(1), 40.0 * scaled.factor, max_relative = 1e-9);
        assert_relative_eq!(scaled.extents.z, 609.6, max_relative = 1e-9);
    }

    #[test]
    fn test_normalize_other_axis() {
        let mesh = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(50.0, 10.0, 10.0)));
        let scaled = normalize(&NativeKernel, &mesh, 25.4, Axis::X).unwrap();
        assert_relative_eq!(scaled.factor, 25.4 / 50.0);
        assert_relative_eq!(scaled.extents.y, 5.08, max_relative = 1e-9);
    }
}
