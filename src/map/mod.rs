//! Static terrain and region geometry
//!
//! The real world map is provided by an external service; the core only
//! sees it through [`BaseMap`]. [`OpenMap`] is a simple implementation with
//! uniform travel cost and square-ish region cells.

use ahash::AHashSet;

use crate::core::error::{GameError, Result};
use crate::hex::{DistanceT, HexCoord, IntT};

/// Identifier of a region cell
pub type RegionId = u64;

/// Base travel cost between two neighbouring open tiles; a character with
/// this speed walks one tile per block
pub const BASE_TILE_COST: DistanceT = 1000;

/// Terrain and region lookup service
pub trait BaseMap {
    /// Cost of moving between two adjacent tiles, or `None` if the
    /// tiles are not connected
    fn edge_weight(&self, from: &HexCoord, to: &HexCoord) -> Option<DistanceT>;

    /// Region containing the given tile
    fn region_id(&self, tile: &HexCoord) -> RegionId;
}

/// Unbounded open terrain split into regions of `region_size` tiles per
/// axis, with optional impassable tiles
#[derive(Debug, Clone)]
pub struct OpenMap {
    tile_cost: DistanceT,
    region_size: IntT,
    impassable: AHashSet<HexCoord>,
}

impl OpenMap {
    pub fn new(tile_cost: DistanceT, region_size: IntT) -> Result<Self> {
        if region_size <= 0 {
            return Err(GameError::Config(format!(
                "region size must be positive, got {region_size}"
            )));
        }
        Ok(Self {
            tile_cost,
            region_size,
            impassable: AHashSet::new(),
        })
    }

    /// Mark a tile as terrain no one can enter or leave
    pub fn set_impassable(&mut self, tile: HexCoord) {
        self.impassable.insert(tile);
    }

    pub fn is_passable(&self, tile: &HexCoord) -> bool {
        !self.impassable.contains(tile)
    }
}

impl Default for OpenMap {
    fn default() -> Self {
        Self {
            tile_cost: BASE_TILE_COST,
            region_size: 10,
            impassable: AHashSet::new(),
        }
    }
}

impl BaseMap for OpenMap {
    fn edge_weight(&self, from: &HexCoord, to: &HexCoord) -> Option<DistanceT> {
        if !from.is_neighbour(to) || !self.is_passable(from) || !self.is_passable(to) {
            return None;
        }
        Some(self.tile_cost)
    }

    fn region_id(&self, tile: &HexCoord) -> RegionId {
        let cx = tile.x.div_euclid(self.region_size);
        let cy = tile.y.div_euclid(self.region_size);
        // Interleave the two signed cell indices into one unsigned key
        let ux = (cx as i64 - i32::MIN as i64) as u64;
        let uy = (cy as i64 - i32::MIN as i64) as u64;
        (ux << 32) | uy
    }
}
