//! Dovetail connector planning.
//!
//! For two fragments that meet at a grid cut, a rectangular peg is merged
//! onto the upper fragment and a slightly larger socket is carved from the
//! lower one. Both span `[cut - depth, cut]` along the cut axis, so the
//! socket is recessed by exactly its own depth. The peg is not fused: it is
//! written as a separate closed shell whose top face touches the part at the
//! cut, and the manifest counts it in the part's `shells`.
//!
//! Placement is a pure scoring function over a 2-D grid spanning the
//! material both fragments have near the cut:
//!
//! - density: radial, multi-angle sampling around each cell, counting hits
//!   within a tolerance of section material and weighting near hits higher;
//! - balance: the spread of density in eight directions, subtracted;
//! - interior: distance from the grid edge, favoured.

use hashbrown::{HashMap, HashSet};
use kiddo::{KdTree, SquaredEuclidean};
use mesh_kernel::{Aabb, Plane};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Axis, Config, ConnectorConfig};
use crate::fragment::{Fragment, GridIndex};
use crate::grid::GridLayout;
use crate::kernel::GeometryKernel;
use crate::warning::{Warning, WarningKind};

/// Number of directions sampled for the balance term.
const BALANCE_DIRECTIONS: usize = 8;
/// Weight of the distance-from-edge term.
const EDGE_WEIGHT: f64 = 0.1;
/// Lattice rotation; keeps sample points off shared axis coordinates.
const LATTICE_ANGLE: f64 = 0.1;
const MAX_LATTICE_SIDE: f64 = 128.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    Male,
    Female,
}

/// A rectangular peg or socket anchored at a cut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectorSpec {
    pub kind: ConnectorKind,
    pub axis: Axis,
    pub cut_position: f64,
    /// Center in the two in-plane axes, in increasing axis order.
    pub center: [f64; 2],
    pub width: f64,
    pub height: f64,
    pub depth: f64,
}

impl ConnectorSpec {
    /// The socket matching this peg, enlarged by `clearance` on every dimension.
    pub fn female(&self, clearance: f64) -> Self {
        Self {
            kind: ConnectorKind::Female,
            width: self.width * clearance,
            height: self.height * clearance,
            depth: self.depth * clearance,
            ..*self
        }
    }

    /// The 8-vertex block occupied by the connector.
    pub fn block(&self) -> Aabb {
        let (p, q) = self.axis.others();
        let a = self.axis.index();
        let mut min = Point3::origin();
        let mut max = Point3::origin();
        min[p.index()] = self.center[0] - self.width / 2.0;
        max[p.index()] = self.center[0] + self.width / 2.0;
        min[q.index()] = self.center[1] - self.height / 2.0;
        max[q.index()] = self.center[1] + self.height / 2.0;
        min[a] = self.cut_position - self.depth;
        max[a] = self.cut_position;
        Aabb::new(min, max)
    }
}

/// Rectangular 2-D domain split into `resolution x resolution` cells.
#[derive(Debug, Clone, Copy)]
pub struct PlacementGrid {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
    pub resolution: usize,
}

impl PlacementGrid {
    fn cell_size(&self) -> (f64, f64) {
        let n = self.resolution as f64;
        ((self.max.x - self.min.x) / n, (self.max.y - self.min.y) / n)
    }

    fn cell_center(&self, i: usize, j: usize) -> Point2<f64> {
        let (dx, dy) = self.cell_size();
        Point2::new(
            self.min.x + (i as f64 + 0.5) * dx,
            self.min.y + (j as f64 + 0.5) * dy,
        )
    }
}

/// Section material near one side of a cut, as a 2-D point cloud.
///
/// Contour points from flat walls share one coordinate by the hundreds, more
/// than a kd-tree bucket holds. The tree stores them rotated by
/// [`TREE_ANGLE`] with exact duplicates removed; queries are rotated the same
/// way, which leaves distances unchanged.
pub struct MaterialSamples {
    tree: KdTree<f64, 2>,
    pub min: Point2<f64>,
    pub max: Point2<f64>,
    pub len: usize,
}

impl MaterialSamples {
    pub fn from_points(points: &[Point2<f64>]) -> Option<Self> {
        let first = points.first()?;
        let mut tree: KdTree<f64, 2> = KdTree::new();
        let mut seen: HashSet<[u64; 2]> = HashSet::with_capacity(points.len());
        let (mut min, mut max) = (*first, *first);
        for p in points {
            min = min.inf(p);
            max = max.sup(p);
            let key = tree_coords(p);
            if seen.insert(key.map(f64::to_bits)) {
                tree.add(&key, seen.len() as u64);
            }
        }
        if seen.len() < points.len() {
            debug!(points = points.len(), unique = seen.len(), "Merged duplicate section points");
        }
        Some(Self {
            tree,
            min,
            max,
            len: seen.len(),
        })
    }

    /// True if some sample lies within `tolerance` of `p`.
    pub fn has_material_near(&self, p: &Point2<f64>, tolerance: f64) -> bool {
        let nearest = self.tree.nearest_one::<SquaredEuclidean>(&tree_coords(p));
        nearest.distance < tolerance * tolerance
    }
}

/// Rotation of material samples inside the kd-tree.
const TREE_ANGLE: f64 = 0.371;

fn tree_coords(p: &Point2<f64>) -> [f64; 2] {
    let (sin, cos) = TREE_ANGLE.sin_cos();
    [p.x * cos - p.y * sin, p.x * sin + p.y * cos]
}

/// Sampling parameters for the density map.
#[derive(Debug, Clone, Copy)]
pub struct DensitySampling {
    pub max_radius: f64,
    pub radial_samples: usize,
    pub angular_samples: usize,
    pub tolerance: f64,
}

/// Weighted share of radial samples that hit material, per grid cell.
///
/// Indexed `[i * resolution + j]`.
pub fn density_map(
    material: &MaterialSamples,
    grid: &PlacementGrid,
    sampling: &DensitySampling,
) -> Vec<f64> {
    let n = grid.resolution;
    let radial = sampling.radial_samples.max(1);
    let angular = sampling.angular_samples.max(1);
    let radius_step = if radial > 1 {
        sampling.max_radius / (radial - 1) as f64
    } else {
        0.0
    };
    let total = (radial * angular) as f64;

    let mut map = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let center = grid.cell_center(i, j);
            let mut found = 0.0;
            for r in 0..radial {
                let radius = radius_step * r as f64;
                for a in 0..angular {
                    let angle = std::f64::consts::TAU * a as f64 / angular as f64;
                    let sample = Point2::new(
                        center.x + radius * angle.cos(),
                        center.y + radius * angle.sin(),
                    );
                    if material.has_material_near(&sample, sampling.tolerance) {
                        found += 1.0 / (radius + 1.0);
                    }
                }
            }
            map[i * n + j] = found / total;
        }
    }
    map
}

/// Best connector center on `grid` for a `width x height` footprint.
///
/// Returns the center and its score. `None` if the footprint does not fit.
pub fn best_position(
    density: &[f64],
    grid: &PlacementGrid,
    width: f64,
    height: f64,
) -> Option<(Point2<f64>, f64)> {
    let n = grid.resolution;
    if n < 2 || density.len() != n * n {
        return None;
    }
    let span = grid.max - grid.min;
    if span.x <= 0.0 || span.y <= 0.0 {
        return None;
    }
    let wi = ((n as f64 * width / span.x) as usize).clamp(1, n - 1);
    let wj = ((n as f64 * height / span.y) as usize).clamp(1, n - 1);
    let reach = n as f64 / 4.0;

    let mut best: Option<(Point2<f64>, f64)> = None;
    for i in 0..n - wi {
        for j in 0..n - wj {
            let mut sum = 0.0;
            for ii in i..i + wi {
                for jj in j..j + wj {
                    sum += density[ii * n + jj];
                }
            }
            let mean = sum / (wi * wj) as f64;

            let ci = i as f64 + wi as f64 / 2.0;
            let cj = j as f64 + wj as f64 / 2.0;
            let directions: Vec<f64> = (0..BALANCE_DIRECTIONS)
                .filter_map(|d| {
                    let angle = std::f64::consts::TAU * d as f64 / BALANCE_DIRECTIONS as f64;
                    let si = (ci + angle.cos() * reach).floor();
                    let sj = (cj + angle.sin() * reach).floor();
                    let in_grid = si >= 0.0 && sj >= 0.0 && si < n as f64 && sj < n as f64;
                    in_grid.then(|| density[si as usize * n + sj as usize])
                })
                .collect();
            let spread = std_dev(&directions);
            let edge = ci.min(n as f64 - ci).min(cj).min(n as f64 - cj);

            let score = mean - spread + EDGE_WEIGHT * edge;
            if best.is_none_or(|(_, s)| score > s) {
                let (dx, dy) = grid.cell_size();
                let center = Point2::new(grid.min.x + ci * dx, grid.min.y + cj * dy);
                best = Some((center, score));
            }
        }
    }
    best
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Sample the section of `mesh` by `plane` as 2-D points in the axes `(p, q)`.
///
/// Contour vertices plus a rotated lattice of interior points with the given
/// spacing.
pub fn section_samples<K: GeometryKernel>(
    kernel: &K,
    mesh: &K::Mesh,
    plane: &Plane,
    (p, q): (Axis, Axis),
    spacing: f64,
) -> Vec<Point2<f64>> {
    let rings: Vec<Vec<Point2<f64>>> = kernel
        .section_contours(mesh, plane)
        .iter()
        .map(|ring| {
            ring.iter()
                .map(|v| Point2::new(v[p.index()], v[q.index()]))
                .collect()
        })
        .collect();

    let mut points: Vec<Point2<f64>> = rings.iter().flatten().copied().collect();
    let Some(first) = points.first().copied() else {
        return points;
    };
    let (min, max) = points
        .iter()
        .fold((first, first), |(lo, hi), v| (lo.inf(v), hi.sup(v)));
    let extent = (max - min).max();
    let spacing = spacing.max(extent / MAX_LATTICE_SIDE);
    if spacing <= 0.0 {
        return points;
    }

    let center = nalgebra::center(&min, &max);
    let half = (max - min).norm() / 2.0;
    let steps = (half / spacing).ceil() as i64;
    let (sin, cos) = LATTICE_ANGLE.sin_cos();
    for u in -steps..=steps {
        for v in -steps..=steps {
            let (du, dv) = (u as f64 * spacing, v as f64 * spacing);
            let sample = Point2::new(
                center.x + du * cos - dv * sin,
                center.y + du * sin + dv * cos,
            );
            let in_box = sample.x >= min.x
                && sample.x <= max.x
                && sample.y >= min.y
                && sample.y <= max.y;
            if in_box && inside_rings(&sample, &rings) {
                points.push(sample);
            }
        }
    }
    points
}

/// Even-odd containment over all rings.
fn inside_rings(p: &Point2<f64>, rings: &[Vec<Point2<f64>>]) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        for k in 0..n {
            let (a, b) = (ring[k], ring[(k + 1) % n]);
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
    }
    inside
}

/// Connector sizing from the bounds of the two mating fragments.
pub fn connector_size(
    lower: &Aabb,
    upper: &Aabb,
    axis: Axis,
    settings: &ConnectorConfig,
) -> (f64, f64, f64) {
    let (p, q) = axis.others();
    let smaller = |a: Axis| lower.extent(a.index()).min(upper.extent(a.index()));
    (
        settings.size_fraction * smaller(p),
        settings.size_fraction * smaller(q),
        settings.depth_fraction * smaller(axis),
    )
}

/// Choose the peg for two fragments meeting at `cut` along `axis`.
///
/// Returns `Err` with the reason when no supported placement exists.
pub fn place_connector<K: GeometryKernel>(
    kernel: &K,
    lower: &K::Mesh,
    upper: &K::Mesh,
    axis: Axis,
    cut: f64,
    settings: &ConnectorConfig,
) -> Result<ConnectorSpec, String> {
    let (Some(lower_bounds), Some(upper_bounds)) = (kernel.bounds(lower), kernel.bounds(upper))
    else {
        return Err("fragment has no geometry".into());
    };
    let (width, height, depth) = connector_size(&lower_bounds, &upper_bounds, axis, settings);
    if width <= 0.0 || height <= 0.0 || depth <= 0.0 {
        return Err("fragments are too thin for a connector".into());
    }

    let tolerance = (width + height) * 0.1;
    let offset = (tolerance / 2.0).min(depth / 4.0);
    let plane_at = |position: f64| Plane::axis_aligned(axis.index(), position, true);
    let plane_axes = axis.others();

    let below = section_samples(kernel, lower, &plane_at(cut - offset), plane_axes, tolerance);
    let above = section_samples(kernel, upper, &plane_at(cut + offset), plane_axes, tolerance);
    let (Some(below), Some(above)) = (
        MaterialSamples::from_points(&below),
        MaterialSamples::from_points(&above),
    ) else {
        return Err(format!("no material near the cut at {cut:.3}"));
    };

    let min = below.min.sup(&above.min);
    let max = below.max.inf(&above.max);
    if min.x >= max.x || min.y >= max.y {
        return Err("the two sides of the cut do not overlap".into());
    }

    let grid = PlacementGrid {
        min,
        max,
        resolution: settings.grid_resolution,
    };
    let sampling = DensitySampling {
        max_radius: width.max(height) * 2.0,
        radial_samples: settings.radial_samples,
        angular_samples: settings.angular_samples,
        tolerance,
    };
    let lower_density = density_map(&below, &grid, &sampling);
    let upper_density = density_map(&above, &grid, &sampling);
    let density: Vec<f64> = lower_density
        .iter()
        .zip(&upper_density)
        .map(|(a, b)| a.min(*b))
        .collect();

    let (center, score) = best_position(&density, &grid, width, height)
        .ok_or_else(|| "connector footprint larger than the shared section".to_string())?;

    let male = ConnectorSpec {
        kind: ConnectorKind::Male,
        axis,
        cut_position: cut,
        center: [center.x, center.y],
        width,
        height,
        depth,
    };

    // Socket must sit in material below the cut and the peg must attach above it
    let socket_point = axis_point(&male, cut - depth * settings.clearance / 2.0);
    let peg_point = axis_point(&male, cut + offset);
    if !kernel.contains_point(lower, &socket_point) || !kernel.contains_point(upper, &peg_point) {
        return Err(format!(
            "best position ({:.2}, {:.2}) is not supported on both sides",
            center.x, center.y
        ));
    }

    debug!(axis = %axis, cut, x = center.x, y = center.y, score, "Placed connector");
    Ok(male)
}

fn axis_point(spec: &ConnectorSpec, along: f64) -> Point3<f64> {
    let (p, q) = spec.axis.others();
    let mut point = Point3::origin();
    point[p.index()] = spec.center[0];
    point[q.index()] = spec.center[1];
    point[spec.axis.index()] = along;
    point
}

/// Add connectors between every pair of grid neighbours along the configured axes.
///
/// Skipped pairs produce a warning and leave both fragments as they were.
pub fn add_connectors<K: GeometryKernel>(
    kernel: &K,
    fragments: &mut [Fragment<K::Mesh>],
    layout: &GridLayout,
    config: &Config,
) -> Vec<Warning> {
    let settings = &config.connectors;
    let max_size = config.max_piece_size();
    let position: HashMap<GridIndex, usize> = fragments
        .iter()
        .enumerate()
        .map(|(n, f)| (f.index, n))
        .collect();
    let mut warnings = Vec::new();
    let mut added = 0;

    for axis in config.connector_axes() {
        let a = axis.index();
        for lower_at in 0..fragments.len() {
            let lower_index = fragments[lower_at].index;
            let Some(upper_at) = lower_index
                .offset(a, 1)
                .and_then(|idx| position.get(&idx).copied())
            else {
                continue;
            };
            let Some(cut) = layout.cut_above(&lower_index, a) else {
                continue;
            };
            let upper_index = fragments[upper_at].index;
            let skip = |reason: String| {
                Warning::new(
                    WarningKind::ConnectorSkipped,
                    format!("{lower_index} / {upper_index} along {axis}: {reason}"),
                    "Add alignment features manually for this seam",
                )
            };

            let male = match place_connector(
                kernel,
                &fragments[lower_at].mesh,
                &fragments[upper_at].mesh,
                axis,
                cut,
                settings,
            ) {
                Ok(spec) => spec,
                Err(reason) => {
                    warnings.push(skip(reason));
                    continue;
                }
            };
            let female = male.female(settings.clearance);

            let peg_bounds = fragments[upper_at].bounds.union(&male.block());
            if peg_bounds.max_extent() > max_size * (1.0 + 1e-9) {
                warnings.push(skip(format!(
                    "peg would grow the upper part to {:.1} mm",
                    peg_bounds.max_extent()
                )));
                continue;
            }

            let carved = match kernel.subtract_box(&fragments[lower_at].mesh, &female.block()) {
                Ok(Some(mesh)) => mesh,
                Ok(None) => {
                    warnings.push(skip("socket would consume the lower part".into()));
                    continue;
                }
                Err(e) => {
                    warnings.push(skip(format!("socket carving failed: {e}")));
                    continue;
                }
            };
            let peg = kernel.cuboid(&male.block());
            let joined = kernel.merge(&fragments[upper_at].mesh, &peg);

            let lower = &mut fragments[lower_at];
            lower.mesh = carved;
            lower.connectors.push(female);

            let upper = &mut fragments[upper_at];
            upper.mesh = joined;
            upper.bounds = peg_bounds;
            upper.connectors.push(male);
            added += 1;
        }
    }

    info!(added, skipped = warnings.len(), "Connector planning complete");
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::NativeKernel;
    use crate::plan::CutPlan;
    use approx::assert_relative_eq;
    use mesh_kernel::Mesh;

    fn peg() -> ConnectorSpec {
        ConnectorSpec {
            kind: ConnectorKind::Male,
            axis: Axis::Z,
            cut_position: 50.0,
            center: [10.0, 20.0],
            width: 4.0,
            height: 6.0,
            depth: 5.0,
        }
    }

    #[test]
    fn test_block_geometry() {
        let block = peg().block();
        assert_relative_eq!(block.min.x, 8.0);
        assert_relative_eq!(block.max.y, 23.0);
        assert_relative_eq!(block.min.z, 45.0);
        assert_relative_eq!(block.max.z, 50.0);
        assert_eq!(Mesh::cuboid(&block).vertex_count(), 8);
        assert_eq!(Mesh::cuboid(&block).face_count(), 12);
    }

    #[test]
    fn test_female_clearance_and_recess() {
        let male = peg();
        let female = male.female(1.05);
        assert_eq!(female.kind, ConnectorKind::Female);
        let (m, f) = (male.block(), female.block());
        for axis in 0..3 {
            assert!(f.extent(axis) >= m.extent(axis));
        }
        // Recessed by exactly its own depth below the cut
        assert_relative_eq!(f.max.z, 50.0);
        assert_relative_eq!(f.max.z - f.min.z, female.depth, epsilon = 1e-12);
        assert_relative_eq!(female.depth, 5.25, epsilon = 1e-12);
    }

    #[test]
    fn test_block_on_x_axis() {
        let spec = ConnectorSpec {
            axis: Axis::X,
            ..peg()
        };
        let block = spec.block();
        // In-plane axes are (y, z)
        assert_relative_eq!(block.min.y, 8.0);
        assert_relative_eq!(block.max.z, 23.0);
        assert_relative_eq!(block.min.x, 45.0);
    }

    #[test]
    fn test_best_position_prefers_interior_of_uniform_density() {
        let grid = PlacementGrid {
            min: Point2::new(0.0, 0.0),
            max: Point2::new(10.0, 10.0),
            resolution: 20,
        };
        let density = vec![0.5; 400];
        let (center, _) = best_position(&density, &grid, 1.0, 1.0).unwrap();
        assert_relative_eq!(center.x, 5.0, epsilon = 0.5);
        assert_relative_eq!(center.y, 5.0, epsilon = 0.5);
    }

    #[test]
    fn test_density_map_is_higher_over_material() {
        let points: Vec<Point2<f64>> = (0..20)
            .flat_map(|i| (0..20).map(move |j| Point2::new(i as f64 * 0.25, j as f64 * 0.25)))
            .map(|p| Point2::new(p.x + p.y * 1e-3, p.y))
            .collect();
        let material = MaterialSamples::from_points(&points).unwrap();
        let grid = PlacementGrid {
            min: Point2::new(0.0, 0.0),
            max: Point2::new(10.0, 5.0),
            resolution: 4,
        };
        let sampling = DensitySampling {
            max_radius: 1.0,
            radial_samples: 3,
            angular_samples: 8,
            tolerance: 0.3,
        };
        let map = density_map(&material, &grid, &sampling);
        // Cell i = 0 covers the material, i = 3 is empty
        assert!(map[0] > 0.0);
        assert_eq!(map[3 * 4], 0.0);
    }

    #[test]
    fn test_material_on_one_wall_line() {
        // A finely tessellated wall puts hundreds of section points at x = 5
        let mut points: Vec<Point2<f64>> = (0..200)
            .map(|i| Point2::new(5.0, i as f64 * 0.05))
            .collect();
        points.extend((0..40).map(|_| Point2::new(5.0, 2.5)));

        let material = MaterialSamples::from_points(&points).unwrap();

        assert_eq!(material.len, 200);
        assert_relative_eq!(material.min.y, 0.0);
        assert_relative_eq!(material.max.y, 9.95, epsilon = 1e-12);
        assert!(material.has_material_near(&Point2::new(5.01, 3.0), 0.02));
        assert!(material.has_material_near(&Point2::new(5.0, 9.95), 1e-6));
        assert!(!material.has_material_near(&Point2::new(5.5, 3.0), 0.2));
        assert!(!material.has_material_near(&Point2::new(5.0, 10.5), 0.2));
    }

    #[test]
    fn test_inside_rings_with_hole() {
        let square = |s: f64, o: f64| {
            vec![
                Point2::new(o, o),
                Point2::new(o + s, o),
                Point2::new(o + s, o + s),
                Point2::new(o, o + s),
            ]
        };
        let rings = vec![square(10.0, 0.0), square(2.0, 4.0)];
        assert!(inside_rings(&Point2::new(1.0, 1.0), &rings));
        assert!(!inside_rings(&Point2::new(5.0, 5.0), &rings));
        assert!(!inside_rings(&Point2::new(11.0, 5.0), &rings));
    }

    #[test]
    fn test_section_samples_fill_the_section() {
        let mesh = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(20.0, 10.0, 10.0)));
        let plane = Plane::axis_aligned(2, 5.0, true);
        let samples = section_samples(&NativeKernel, &mesh, &plane, Axis::Z.others(), 1.0);
        assert!(samples.len() > 100);
        assert!(samples.iter().all(|p| p.x >= 0.0 && p.x <= 20.0 && p.y >= 0.0 && p.y <= 10.0));
    }

    #[test]
    fn test_add_connector_between_stacked_blocks() {
        let kernel = NativeKernel;
        let lower = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(40.0, 40.0, 50.0)));
        let upper = Mesh::cuboid(&Aabb::new(
            Point3::new(0.0, 0.0, 50.0),
            Point3::new(40.0, 40.0, 100.0),
        ));
        let layout = GridLayout::new([
            CutPlan::trivial(Axis::X, 40.0),
            CutPlan::trivial(Axis::Y, 40.0),
            CutPlan {
                axis: Axis::Z,
                positions: vec![0.0, 50.0, 100.0],
            },
        ]);
        let mut fragments = vec![
            Fragment {
                bounds: lower.aabb().unwrap(),
                mesh: lower,
                index: GridIndex::new(0, 0, 0),
                cell: None,
                has_extremity: false,
                volume: 80_000.0,
                connectors: Vec::new(),
            },
            Fragment {
                bounds: upper.aabb().unwrap(),
                mesh: upper,
                index: GridIndex::new(0, 0, 1),
                cell: None,
                has_extremity: false,
                volume: 80_000.0,
                connectors: Vec::new(),
            },
        ];

        let mut config = Config::builder("out").build().unwrap();
        config.connectors.enabled = true;
        config.connectors.grid_resolution = 12;

        let warnings = add_connectors(&kernel, &mut fragments, &layout, &config);
        assert!(warnings.is_empty(), "{:?}", warnings);

        let male = fragments[1].connectors[0];
        let female = fragments[0].connectors[0];
        assert_eq!(male.kind, ConnectorKind::Male);
        assert_eq!(female.kind, ConnectorKind::Female);
        // 8% of 40 and 10% of 50
        assert_relative_eq!(male.width, 3.2, epsilon = 1e-9);
        assert_relative_eq!(male.depth, 5.0, epsilon = 1e-9);
        // Centered on a uniform section
        assert_relative_eq!(male.center[0], 20.0, epsilon = 4.0);
        assert_relative_eq!(male.center[1], 20.0, epsilon = 4.0);

        let peg_volume = male.width * male.height * male.depth;
        let socket_volume = female.width * female.height * female.depth;
        assert_relative_eq!(
            fragments[1].mesh.signed_volume(),
            80_000.0 + peg_volume,
            max_relative = 1e-9
        );
        assert_relative_eq!(
            fragments[0].mesh.signed_volume(),
            80_000.0 - socket_volume,
            max_relative = 1e-9
        );
        // Recorded volumes stay pre-connector
        assert_eq!(fragments[0].volume, 80_000.0);
        assert_relative_eq!(fragments[1].bounds.min.z, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn test_connector_skipped_when_peg_breaks_bed_fit() {
        let kernel = NativeKernel;
        let lower = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(40.0, 40.0, 50.0)));
        let upper = Mesh::cuboid(&Aabb::new(
            Point3::new(0.0, 0.0, 50.0),
            Point3::new(40.0, 40.0, 100.0),
        ));
        let layout = GridLayout::new([
            CutPlan::trivial(Axis::X, 40.0),
            CutPlan::trivial(Axis::Y, 40.0),
            CutPlan {
                axis: Axis::Z,
                positions: vec![0.0, 50.0, 100.0],
            },
        ]);
        let mut fragments: Vec<Fragment<Mesh>> = [(lower, 0), (upper, 1)]
            .into_iter()
            .map(|(mesh, k)| Fragment {
                bounds: mesh.aabb().unwrap(),
                mesh,
                index: GridIndex::new(0, 0, k),
                cell: None,
                has_extremity: false,
                volume: 80_000.0,
                connectors: Vec::new(),
            })
            .collect();

        // Upper part is 50 tall; the peg adds 5 and the envelope is 52
        let mut config = Config::builder("out")
            .bed_size(54.0)
            .safety_margin(2.0)
            .build()
            .unwrap();
        config.connectors.grid_resolution = 12;

        let warnings = add_connectors(&kernel, &mut fragments, &layout, &config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::ConnectorSkipped);
        assert!(fragments.iter().all(|f| f.connectors.is_empty()));
    }
}
