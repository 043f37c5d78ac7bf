//! Extremity detection.
//!
//! The extremity region is the set of vertices lying above a high percentile
//! of all vertex coordinates along the height axis. Grid cells containing one
//! of them skip the volume threshold, so small tips survive.

use mesh_kernel::Aabb;
use nalgebra::Point3;

use crate::config::Axis;

#[derive(Debug, Clone, Default)]
pub struct ExtremityRegion {
    pub threshold: f64,
    pub points: Vec<Point3<f64>>,
}

impl ExtremityRegion {
    /// Vertices strictly above the `percentile` of coordinates along `axis`.
    pub fn detect(vertices: &[Point3<f64>], axis: Axis, percentile: f64) -> Self {
        let mut coords: Vec<f64> = vertices.iter().map(|p| p[axis.index()]).collect();
        coords.sort_by(f64::total_cmp);

        let Some(threshold) = percentile_of_sorted(&coords, percentile) else {
            return Self::default();
        };

        let points = vertices
            .iter()
            .filter(|p| p[axis.index()] > threshold)
            .copied()
            .collect();

        Self { threshold, points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if any extremity point lies inside `aabb` (bounds inclusive).
    pub fn intersects(&self, aabb: &Aabb) -> bool {
        self.points.iter().any(|p| aabb.contains(p))
    }
}

/// Percentile with linear interpolation between closest ranks.
fn percentile_of_sorted(sorted: &[f64], percentile: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (percentile.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let t = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * t)
}
