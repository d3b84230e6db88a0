//! Tiles occupied by characters, per faction

use ahash::AHashMap;

use crate::core::types::Faction;
use crate::hex::HexCoord;
use crate::store::CharacterPosition;

/// Occupancy snapshot, updated as characters move within the block
#[derive(Debug, Clone, Default)]
pub struct DynObstacles {
    counts: AHashMap<HexCoord, [u32; 4]>,
}

impl DynObstacles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the current positions of all characters
    pub fn from_positions(positions: &[CharacterPosition]) -> Self {
        let mut obstacles = Self::new();
        for p in positions {
            obstacles.occupy(p.pos, p.faction);
        }
        obstacles
    }

    /// Whether a character of `faction` is kept off `tile`; only
    /// characters of other factions block
    pub fn is_blocked(&self, tile: &HexCoord, faction: Faction) -> bool {
        self.counts.get(tile).map_or(false, |c| {
            Faction::all()
                .iter()
                .any(|&f| f != faction && c[f.index()] > 0)
        })
    }

    pub fn is_occupied(&self, tile: &HexCoord) -> bool {
        self.counts.contains_key(tile)
    }

    pub fn occupy(&mut self, tile: HexCoord, faction: Faction) {
        self.counts.entry(tile).or_insert([0; 4])[faction.index()] += 1;
    }

    pub fn vacate(&mut self, tile: HexCoord, faction: Faction) {
        if let Some(c) = self.counts.get_mut(&tile) {
            let slot = &mut c[faction.index()];
            *slot = slot.saturating_sub(1);
            if c.iter().all(|&n| n == 0) {
                self.counts.remove(&tile);
            }
        }
    }
}
