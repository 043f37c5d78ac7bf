//! Cross-section sampling.
//!
//! Samples the section area at evenly spaced planes along an axis. Low-area
//! positions are where cuts sever the least material.

use mesh_kernel::Plane;
use serde::Serialize;
use tracing::debug;

use crate::config::Axis;
use crate::kernel::GeometryKernel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossSectionSample {
    pub position: f64,
    pub area: f64,
}

/// Section samples along one axis.
#[derive(Debug, Clone, Serialize)]
pub struct AxisProfile {
    pub axis: Axis,
    pub min: f64,
    pub max: f64,
    pub samples: Vec<CrossSectionSample>,
}

impl AxisProfile {
    pub fn extent(&self) -> f64 {
        self.max - self.min
    }

    /// Sample with the smallest area, ties resolved toward the lower position.
    pub fn thinnest(&self) -> Option<&CrossSectionSample> {
        self.samples
            .iter()
            .min_by(|a, b| a.area.total_cmp(&b.area))
    }
}

/// Sample `count` planes from min to max along `axis`, both ends included.
///
/// A plane that misses the mesh records area 0.
pub fn sample_axis<K: GeometryKernel>(
    kernel: &K,
    mesh: &K::Mesh,
    axis: Axis,
    count: usize,
) -> AxisProfile {
    let Some(bounds) = kernel.bounds(mesh) else {
        return AxisProfile {
            axis,
            min: 0.0,
            max: 0.0,
            samples: Vec::new(),
        };
    };
    let (min, max) = (bounds.min[axis.index()], bounds.max[axis.index()]);

    let samples = linspace(min, max, count)
        .map(|position| {
            let plane = Plane::axis_aligned(axis.index(), position, true);
            let area = kernel.cross_section_area(mesh, &plane).unwrap_or(0.0);
            CrossSectionSample { position, area }
        })
        .collect::<Vec<_>>();

    debug!(
        axis = %axis,
        samples = samples.len(),
        min_area = samples.iter().map(|s| s.area).fold(f64::INFINITY, f64::min),
        "Sampled cross-sections"
    );

    AxisProfile {
        axis,
        min,
        max,
        samples,
    }
}

/// Profiles for x, y and z.
pub fn analyze<K: GeometryKernel>(kernel: &K, mesh: &K::Mesh, count: usize) -> [AxisProfile; 3] {
    Axis::ALL.map(|axis| sample_axis(kernel, mesh, axis, count))
}

fn linspace(start: f64, end: f64, count: usize) -> impl Iterator<Item = f64> {
    let step = if count > 1 {
        (end - start) / (count - 1) as f64
    } else {
        0.0
    };
    (0..count).map(move |i| {
        if i + 1 == count && count > 1 {
            end
        } else {
            start + step * i as f64
        }
    })
}
