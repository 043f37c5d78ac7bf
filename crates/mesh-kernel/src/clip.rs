//! Half-space clipping with planar caps.
//!
//! `clip_by_plane` keeps the part of a mesh on the side its plane normal
//! points into. Triangles crossing the plane are cut; the new vertices are
//! shared by both triangles on a cut edge, so a closed input produces an
//! output whose only open boundary lies on the plane. With `cap` set, those
//! boundary loops are closed with ear-clipped faces.

use hashbrown::HashMap;
use nalgebra::Point2;
use tracing::{debug, warn};

use crate::adjacency::directed_boundary_edges;
use crate::error::{MeshError, MeshResult};
use crate::section::{edge_crossing, vertex_distances};
use crate::triangulate::{point_in_polygon, signed_area, triangulate_polygon};
use crate::types::{Mesh, Plane, Triangle, Vertex};

/// Output vertex bookkeeping for a single clip.
struct ClipBuilder<'a> {
    source: &'a Mesh,
    dist: &'a [f64],
    out: Mesh,
    on_plane: Vec<bool>,
    kept: HashMap<u32, u32>,
    crossings: HashMap<(u32, u32), u32>,
}

impl<'a> ClipBuilder<'a> {
    fn new(source: &'a Mesh, dist: &'a [f64]) -> Self {
        Self {
            source,
            dist,
            out: Mesh::new(),
            on_plane: Vec::new(),
            kept: HashMap::new(),
            crossings: HashMap::new(),
        }
    }

    fn push(&mut self, vertex: Vertex, on_plane: bool) -> u32 {
        self.out.vertices.push(vertex);
        self.on_plane.push(on_plane);
        (self.out.vertices.len() - 1) as u32
    }

    fn keep(&mut self, v: u32) -> u32 {
        if let Some(&id) = self.kept.get(&v) {
            return id;
        }
        let vertex = self.source.vertices[v as usize].clone();
        let id = self.push(vertex, self.dist[v as usize] == 0.0);
        self.kept.insert(v, id);
        id
    }

    fn cross(&mut self, a: u32, b: u32) -> u32 {
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&id) = self.crossings.get(&key) {
            return id;
        }
        let p = edge_crossing(self.source, self.dist, a, b);
        let id = self.push(Vertex::new(p), true);
        self.crossings.insert(key, id);
        id
    }
}

/// Clip a mesh to the half-space `plane.signed_distance(p) >= 0`.
///
/// Faces lying in the plane are kept only if they face away from the kept
/// side, so clipping by a plane and by its flip never keeps the same face.
/// Returns `Ok(None)` when nothing remains.
///
/// ```
/// use mesh_kernel::{Aabb, Mesh, Plane, clip_by_plane};
/// use nalgebra::Point3;
///
/// let block = Mesh::cuboid(&Aabb::new(Point3::origin(), Point3::new(4.0, 1.0, 1.0)));
/// let right = clip_by_plane(&block, &Plane::axis_aligned(0, 1.0, true), true)
///     .unwrap()
///     .unwrap();
/// assert!((right.volume() - 3.0).abs() < 1e-9);
/// ```
pub fn clip_by_plane(mesh: &Mesh, plane: &Plane, cap: bool) -> MeshResult<Option<Mesh>> {
    if (plane.normal.norm() - 1.0).abs() > 1e-6 {
        return Err(MeshError::clip_failed(plane, "plane normal is not a unit vector"));
    }

    let dist = vertex_distances(mesh, plane);
    let mut builder = ClipBuilder::new(mesh, &dist);

    for face in &mesh.faces {
        let d = face.map(|v| dist[v as usize]);

        if d.iter().all(|&x| x == 0.0) {
            let facing = Triangle::new(
                mesh.vertices[face[0] as usize].position,
                mesh.vertices[face[1] as usize].position,
                mesh.vertices[face[2] as usize].position,
            )
            .normal_unnormalized()
            .dot(&plane.normal);
            if facing < 0.0 {
                let kept = face.map(|v| builder.keep(v));
                builder.out.faces.push(kept);
            }
            continue;
        }

        if d.iter().all(|&x| x >= 0.0) {
            let kept = face.map(|v| builder.keep(v));
            builder.out.faces.push(kept);
            continue;
        }
        if d.iter().all(|&x| x <= 0.0) {
            continue;
        }

        // Sutherland-Hodgman against one plane yields a convex polygon of 3 or 4 vertices
        let mut polygon: Vec<u32> = Vec::with_capacity(4);
        for i in 0..3 {
            let (a, b) = (face[i], face[(i + 1) % 3]);
            let (da, db) = (d[i], d[(i + 1) % 3]);
            if da >= 0.0 {
                polygon.push(builder.keep(a));
            }
            if (da > 0.0 && db < 0.0) || (da < 0.0 && db > 0.0) {
                polygon.push(builder.cross(a, b));
            }
        }
        for k in 1..polygon.len().saturating_sub(1) {
            builder.out.faces.push([polygon[0], polygon[k], polygon[k + 1]]);
        }
    }

    let ClipBuilder {
        mut out, on_plane, ..
    } = builder;

    if out.faces.is_empty() {
        debug!("Clip at offset {:.4} kept nothing", plane.origin.coords.dot(&plane.normal));
        return Ok(None);
    }

    if cap {
        let added = cap_plane_boundary(&mut out, &on_plane, plane);
        debug!("Capped clip with {} faces", added);
    }

    Ok(Some(out))
}

/// Close the open boundary lying on the plane. Returns the number of faces added.
fn cap_plane_boundary(mesh: &mut Mesh, on_plane: &[bool], plane: &Plane) -> usize {
    let edges: Vec<(u32, u32)> = directed_boundary_edges(&mesh.faces)
        .into_iter()
        .filter(|&(a, b)| on_plane[a as usize] && on_plane[b as usize])
        .map(|(a, b)| (b, a))
        .collect();
    if edges.is_empty() {
        return 0;
    }

    // Caps face out of the kept side; in this basis their outer loops are counter-clockwise
    let (u, v) = Plane::new(plane.origin, -plane.normal).basis();
    let mut local: HashMap<u32, usize> = HashMap::new();
    let mut points: Vec<Point2<f64>> = Vec::new();
    let mut global: Vec<u32> = Vec::new();
    for &(a, b) in &edges {
        for vi in [a, b] {
            local.entry(vi).or_insert_with(|| {
                let d = mesh.vertices[vi as usize].position - plane.origin;
                points.push(Point2::new(d.dot(&u), d.dot(&v)));
                global.push(vi);
                points.len() - 1
            });
        }
    }
    let local_edges: Vec<(usize, usize)> = edges.iter().map(|(a, b)| (local[a], local[b])).collect();
    let rings = trace_loops(&points, &local_edges);

    let (outers, holes): (Vec<&Vec<usize>>, Vec<&Vec<usize>>) = rings
        .iter()
        .partition(|ring| signed_area(&points, ring) > 0.0);

    let mut assigned: Vec<Vec<Vec<usize>>> = vec![Vec::new(); outers.len()];
    let mut orphans: Vec<&Vec<usize>> = Vec::new();
    for hole in holes {
        // An edge midpoint, since hole vertices may touch their outer boundary
        let midpoint = nalgebra::center(&points[hole[0]], &points[hole[1]]);
        let container = outers
            .iter()
            .enumerate()
            .filter(|(_, outer)| point_in_polygon(&points, outer, &midpoint))
            .min_by(|a, b| signed_area(&points, a.1).total_cmp(&signed_area(&points, b.1)));
        match container {
            Some((i, _)) => assigned[i].push(hole.clone()),
            None => orphans.push(hole),
        }
    }

    let before = mesh.faces.len();
    for (outer, holes) in outers.iter().zip(&assigned) {
        for tri in triangulate_polygon(&points, outer, holes) {
            mesh.faces.push(tri.map(|i| global[i]));
        }
    }
    for ring in orphans {
        // Closed in its own winding so every boundary edge gets a partner
        warn!(
            "Cap loop with {} vertices lies in no outer boundary, closing it as traversed",
            ring.len()
        );
        let reversed: Vec<usize> = ring.iter().rev().copied().collect();
        for tri in triangulate_polygon(&points, &reversed, &[]) {
            mesh.faces.push([global[tri[0]], global[tri[2]], global[tri[1]]]);
        }
    }
    mesh.faces.len() - before
}

/// Chain directed plane edges into loops with the cap on their left.
///
/// Where several loops meet at one vertex, each step takes the outgoing edge
/// that turns furthest left, so touching loops come out as separate simple
/// rings instead of one self-touching ring.
fn trace_loops(points: &[Point2<f64>], edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut outgoing: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(a, b) in edges {
        outgoing.entry(a).or_default().push(b);
    }

    let left_turn = |from: usize, at: usize, to: usize| {
        let back = points[from] - points[at];
        let out = points[to] - points[at];
        let angle = (back.x * out.y - back.y * out.x).atan2(back.dot(&out));
        // Counter-clockwise angle from `back` to `out` in (0, 2pi]; larger turns further left
        if angle <= 0.0 { angle + std::f64::consts::TAU } else { angle }
    };

    let mut loops = Vec::new();
    for &(start, _) in edges {
        while let Some(first) = outgoing.get_mut(&start).and_then(Vec::pop) {
            let mut ring = vec![start];
            let (mut prev, mut current) = (start, first);
            let mut closed = false;
            for _ in 0..edges.len() {
                if current == start {
                    closed = true;
                    break;
                }
                ring.push(current);
                let Some(nexts) = outgoing.get_mut(&current).filter(|n| !n.is_empty()) else {
                    break;
                };
                let pick = (0..nexts.len())
                    .max_by(|&x, &y| {
                        left_turn(prev, current, nexts[x]).total_cmp(&left_turn(prev, current, nexts[y]))
                    })
                    .unwrap_or(0);
                let next = nexts.swap_remove(pick);
                prev = current;
                current = next;
            }

            if closed && ring.len() >= 3 {
                loops.push(ring);
            } else {
                debug!("Dropping open cap chain of {} vertices", ring.len());
            }
        }
    }
    loops
}

/// Clip to both sides of a plane: `(positive, negative)`.
pub fn split_by_plane(mesh: &Mesh, plane: &Plane, cap: bool) -> MeshResult<(Option<Mesh>, Option<Mesh>)> {
    let positive = clip_by_plane(mesh, plane, cap)?;
    let negative = clip_by_plane(mesh, &plane.flipped(), cap)?;
    Ok((positive, negative))
}
