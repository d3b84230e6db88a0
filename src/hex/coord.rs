//! Hex coordinate system for the world map (axial coordinates)
//!
//! Uses axial coordinates (x, y); the implied third cube coordinate is
//! z = -x - y.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type IntT = i32;

/// Axial hex coordinate
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct HexCoord {
    pub x: IntT,
    pub y: IntT,
}

impl HexCoord {
    pub const fn new(x: IntT, y: IntT) -> Self {
        Self { x, y }
    }

    /// Cube coordinate Z (derived from x and y)
    pub fn z(&self) -> i64 {
        -i64::from(self.x) - i64::from(self.y)
    }

    /// Number of single-tile steps between the two coordinates
    ///
    /// Computed in i64 so that any pair of coordinates is valid; the
    /// result saturates at `u32::MAX`.
    pub fn distance_l1(&self, other: &Self) -> u32 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        let dz = self.z() - other.z();
        let sum = dx.unsigned_abs() + dy.unsigned_abs() + dz.unsigned_abs();
        u32::try_from(sum / 2).unwrap_or(u32::MAX)
    }

    /// Neighbouring coordinates, always in the same order
    ///
    /// Neighbours that would fall outside the representable grid are
    /// skipped, so tiles on the edge have fewer than six.
    pub fn neighbours(&self) -> Vec<HexCoord> {
        const OFFSETS: [(IntT, IntT); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];
        OFFSETS
            .iter()
            .filter_map(|&(dx, dy)| {
                Some(HexCoord::new(
                    self.x.checked_add(dx)?,
                    self.y.checked_add(dy)?,
                ))
            })
            .collect()
    }

    pub fn is_neighbour(&self, other: &Self) -> bool {
        self.distance_l1(other) == 1
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
