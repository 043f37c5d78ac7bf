//! Planar polygon triangulation by ear clipping, with hole bridging.
//!
//! Used to cap plane cuts and to fill boundary loops. Polygons are given as
//! index lists into a shared 2-D point array so the output indexes the same
//! vertices as the caller's mesh.

use nalgebra::Point2;
use tracing::warn;

/// Signed area of a polygon, positive for counter-clockwise order.
pub fn signed_area(points: &[Point2<f64>], ring: &[usize]) -> f64 {
    let n = ring.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = points[ring[i]];
        let b = points[ring[(i + 1) % n]];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

/// Even-odd point-in-polygon test.
pub fn point_in_polygon(points: &[Point2<f64>], ring: &[usize], p: &Point2<f64>) -> bool {
    let n = ring.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = points[ring[i]];
        let b = points[ring[j]];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[inline]
fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Proper intersection of segments `p1p2` and `q1q2`; shared endpoints do not count.
fn segments_cross(p1: &Point2<f64>, p2: &Point2<f64>, q1: &Point2<f64>, q2: &Point2<f64>) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// Triangulate a polygon with holes.
///
/// `outer` may have either orientation; holes must lie inside it. Output
/// triangles are counter-clockwise and index into `points`.
pub fn triangulate_polygon(
    points: &[Point2<f64>],
    outer: &[usize],
    holes: &[Vec<usize>],
) -> Vec<[usize; 3]> {
    if outer.len() < 3 {
        return Vec::new();
    }

    let mut ring: Vec<usize> = outer.to_vec();
    if signed_area(points, &ring) < 0.0 {
        ring.reverse();
    }

    let mut pending: Vec<Vec<usize>> = holes
        .iter()
        .filter(|h| h.len() >= 3)
        .map(|h| {
            let mut h = h.clone();
            if signed_area(points, &h) > 0.0 {
                h.reverse();
            }
            h
        })
        .collect();

    // Bridge holes from the rightmost inward so earlier bridges don't block later ones
    pending.sort_by(|a, b| {
        let ax = a.iter().map(|&i| points[i].x).fold(f64::MIN, f64::max);
        let bx = b.iter().map(|&i| points[i].x).fold(f64::MIN, f64::max);
        bx.total_cmp(&ax)
    });

    for h in 0..pending.len() {
        let (current, rest) = pending.split_at(h + 1);
        ring = bridge_hole(points, &ring, &current[h], rest);
    }

    ear_clip(points, ring)
}

/// Splice a clockwise hole into a counter-clockwise ring through a mutually visible pair.
fn bridge_hole(
    points: &[Point2<f64>],
    ring: &[usize],
    hole: &[usize],
    other_holes: &[Vec<usize>],
) -> Vec<usize> {
    let (m_pos, &m) = hole
        .iter()
        .enumerate()
        .max_by(|a, b| points[*a.1].x.total_cmp(&points[*b.1].x))
        .unwrap_or((0, &hole[0]));
    let pm = points[m];

    let mut candidates: Vec<usize> = (0..ring.len()).collect();
    candidates.sort_by(|&a, &b| {
        let da = (points[ring[a]] - pm).norm_squared();
        let db = (points[ring[b]] - pm).norm_squared();
        da.total_cmp(&db)
    });

    let blocked = |pv: &Point2<f64>| {
        let edges_of = |r: &[usize]| {
            (0..r.len())
                .map(|i| (r[i], r[(i + 1) % r.len()]))
                .collect::<Vec<_>>()
        };
        edges_of(ring)
            .into_iter()
            .chain(edges_of(hole))
            .chain(other_holes.iter().flat_map(|h| edges_of(h.as_slice())))
            .any(|(a, b)| segments_cross(&pm, pv, &points[a], &points[b]))
    };

    let bridge_at = candidates
        .iter()
        .copied()
        .find(|&ci| !blocked(&points[ring[ci]]))
        .unwrap_or(candidates[0]);

    let v = ring[bridge_at];
    let mut merged = Vec::with_capacity(ring.len() + hole.len() + 2);
    merged.extend_from_slice(&ring[..=bridge_at]);
    for k in 0..=hole.len() {
        merged.push(hole[(m_pos + k) % hole.len()]);
    }
    merged.push(v);
    merged.extend_from_slice(&ring[bridge_at + 1..]);
    merged
}

/// Clip ears until three vertices remain.
///
/// Every ring edge ends up in exactly one output triangle, so a cap built
/// from a closed boundary loop closes it. Flat corners (collinear runs and
/// zero-width spikes) are clipped as zero-area triangles instead of being
/// dropped, once no proper ear is left.
fn ear_clip(points: &[Point2<f64>], mut ring: Vec<usize>) -> Vec<[usize; 3]> {
    let mut triangles = Vec::with_capacity(ring.len().saturating_sub(2));

    let scale = ring
        .iter()
        .map(|&i| points[i].coords.amax())
        .fold(0.0, f64::max)
        .max(1.0);
    let eps = 1e-12 * scale * scale;

    while ring.len() > 3 {
        let n = ring.len();
        let corner = (0..n)
            .find(|&i| is_ear(points, &ring, i, eps))
            .or_else(|| (0..n).find(|&i| turn_at(points, &ring, i).abs() <= eps));

        let Some(i) = corner else {
            warn!(
                "Ear clipping stuck with {} vertices remaining, using fan triangulation",
                ring.len()
            );
            for k in 1..ring.len() - 1 {
                triangles.push([ring[0], ring[k], ring[k + 1]]);
            }
            return triangles;
        };

        let (ia, ib, ic) = (ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
        if ia != ic {
            triangles.push([ia, ib, ic]);
        }
        ring.remove(i);

        // A spike `a b a` leaves `a` twice in a row
        if ia == ic {
            let n = ring.len();
            let prev = (i + n - 1) % n;
            ring.remove(prev);
        }
    }

    if ring.len() == 3 && ring[0] != ring[1] && ring[1] != ring[2] && ring[2] != ring[0] {
        triangles.push([ring[0], ring[1], ring[2]]);
    }

    triangles
}

fn turn_at(points: &[Point2<f64>], ring: &[usize], i: usize) -> f64 {
    let n = ring.len();
    cross(
        &points[ring[(i + n - 1) % n]],
        &points[ring[i]],
        &points[ring[(i + 1) % n]],
    )
}

/// Strictly convex corner whose triangle holds no other ring vertex.
///
/// Vertices within `eps` of the triangle's edges count as inside, so a run
/// that is straight up to rounding is never cut off from its far side.
fn is_ear(points: &[Point2<f64>], ring: &[usize], i: usize, eps: f64) -> bool {
    let n = ring.len();
    let (ia, ib, ic) = (ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
    if turn_at(points, ring, i) <= eps {
        return false;
    }
    let (a, b, c) = (points[ia], points[ib], points[ic]);
    !ring.iter().any(|&j| {
        if j == ia || j == ib || j == ic {
            return false;
        }
        let p = points[j];
        if p == a || p == b || p == c {
            return false;
        }
        cross(&a, &b, &p) >= -eps && cross(&b, &c, &p) >= -eps && cross(&c, &a, &p) >= -eps
    })
}
