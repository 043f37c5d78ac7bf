//! Cut planning along one axis.
//!
//! Cuts are spread evenly at `L / ceil(L / M)` and then pulled toward the
//! thinnest sampled cross-section within 20% of that spacing. If that
//! section would close an interval longer than `M`, the cut stays at the
//! even spacing instead.

use serde::Serialize;
use tracing::debug;

use crate::analysis::{AxisProfile, CrossSectionSample};
use crate::config::Axis;
use crate::error::ValidationFailure;

/// Fraction of the target spacing searched on either side of the ideal cut.
pub const SEARCH_WINDOW: f64 = 0.2;

/// Ordered cut positions `0 = c0 < c1 < ... < cn = L` along one axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutPlan {
    pub axis: Axis,
    pub positions: Vec<f64>,
}

impl CutPlan {
    /// The plan that does not cut.
    pub fn trivial(axis: Axis, extent: f64) -> Self {
        Self {
            axis,
            positions: vec![0.0, extent],
        }
    }

    pub fn extent(&self) -> f64 {
        self.positions.last().copied().unwrap_or(0.0)
    }

    pub fn pieces(&self) -> usize {
        self.positions.len().saturating_sub(1)
    }

    /// `(start, end)` of every piece.
    pub fn intervals(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.positions.windows(2).map(|w| (w[0], w[1]))
    }

    /// Interior cut positions, excluding 0 and L.
    pub fn cuts(&self) -> &[f64] {
        match self.positions.len() {
            0..=2 => &[],
            n => &self.positions[1..n - 1],
        }
    }

    pub fn max_interval(&self) -> f64 {
        self.intervals().map(|(a, b)| b - a).fold(0.0, f64::max)
    }

    /// Every interval fits in `max_size` (up to rounding).
    pub fn check(&self, max_size: f64) -> Result<(), ValidationFailure> {
        let slack = 1e-9 * self.extent().max(1.0);
        for (piece, (a, b)) in self.intervals().enumerate() {
            if b - a > max_size + slack {
                return Err(ValidationFailure::OversizedInterval {
                    axis: self.axis,
                    piece,
                    length: b - a,
                    max: max_size,
                });
            }
        }
        Ok(())
    }
}

/// Minimum number of pieces along an axis of length `extent`.
pub fn min_pieces(extent: f64, max_size: f64) -> usize {
    ((extent / max_size).ceil() as usize).max(1)
}

/// Plan cuts over `[0, extent]` so that no piece exceeds `max_size`.
///
/// `samples` are cross-section samples with positions in the same frame.
pub fn plan_cuts(
    axis: Axis,
    samples: &[CrossSectionSample],
    extent: f64,
    max_size: f64,
) -> CutPlan {
    let pieces = min_pieces(extent, max_size);
    if pieces <= 1 {
        return CutPlan::trivial(axis, extent);
    }

    let target = extent / pieces as f64;
    let eps = 1e-9 * extent.max(1.0);
    let mut positions = vec![0.0];
    let mut current = 0.0;

    loop {
        let ideal = (current + target).min(extent);
        let lo = ideal - SEARCH_WINDOW * target;
        let hi = (ideal + SEARCH_WINDOW * target).min(extent);

        let thinnest = samples
            .iter()
            .filter(|s| s.position >= lo && s.position <= hi && s.position > current + eps)
            .min_by(|a, b| {
                a.area
                    .total_cmp(&b.area)
                    .then((a.position - ideal).abs().total_cmp(&(b.position - ideal).abs()))
            });

        // A thinnest section out of reach clamps the cut to the even spacing
        let next = match thinnest {
            Some(s) if s.position - current <= max_size => s.position,
            Some(s) => {
                debug!(axis = %axis, at = s.position, ideal, "Thinnest section out of reach");
                ideal
            }
            None => ideal,
        };

        positions.push(next);
        current = next;
        if extent - current <= eps {
            break;
        }
    }

    // The last cut lands within rounding of the end; pin it there
    if let Some(last) = positions.last_mut() {
        *last = extent;
    }

    debug!(
        axis = %axis,
        pieces = positions.len() - 1,
        target = format!("{:.2}", target),
        cuts = ?positions,
        "Planned cuts"
    );

    CutPlan { axis, positions }
}

/// Plan from a sampled profile. Positions are relative to the profile minimum.
pub fn plan_axis(profile: &AxisProfile, max_size: f64) -> CutPlan {
    let shifted: Vec<CrossSectionSample> = profile
        .samples
        .iter()
        .map(|s| CrossSectionSample {
            position: s.position - profile.min,
            area: s.area,
        })
        .collect();
    plan_cuts(profile.axis, &shifted, profile.extent(), max_size)
}
