//! Fragments produced by the splitters.

use std::fmt;

use mesh_kernel::Aabb;
use serde::{Deserialize, Serialize};

use crate::connector::ConnectorSpec;

/// Position of a fragment in the cut grid.
///
/// Recursive splitting has no grid; its leaves are numbered along `i`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct GridIndex {
    pub i: usize,
    pub j: usize,
    pub k: usize,
}

impl GridIndex {
    pub fn new(i: usize, j: usize, k: usize) -> Self {
        Self { i, j, k }
    }

    pub fn get(&self, axis: usize) -> usize {
        match axis {
            0 => self.i,
            1 => self.j,
            _ => self.k,
        }
    }

    /// The same index moved by `delta` along `axis`, if it stays non-negative.
    pub fn offset(&self, axis: usize, delta: isize) -> Option<GridIndex> {
        let mut out = *self;
        let slot = match axis {
            0 => &mut out.i,
            1 => &mut out.j,
            _ => &mut out.k,
        };
        *slot = slot.checked_add_signed(delta)?;
        Some(out)
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.i, self.j, self.k]
    }
}

impl fmt::Display for GridIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.i, self.j, self.k)
    }
}

/// One piece of the decomposed mesh.
#[derive(Debug, Clone)]
pub struct Fragment<M> {
    pub mesh: M,
    pub index: GridIndex,
    /// Bounds of the fragment geometry.
    pub bounds: Aabb,
    /// Grid cell the fragment was cut from, if any.
    pub cell: Option<Aabb>,
    pub has_extremity: bool,
    /// Volume before any connector geometry was added.
    pub volume: f64,
    pub connectors: Vec<ConnectorSpec>,
}

impl<M> Fragment<M> {
    /// Largest bounding-box dimension.
    pub fn max_dimension(&self) -> f64 {
        self.bounds.max_extent()
    }

    /// True if every dimension is within `max_size` (with a relative tolerance).
    pub fn fits(&self, max_size: f64) -> bool {
        self.max_dimension() <= max_size * (1.0 + 1e-9)
    }
}
