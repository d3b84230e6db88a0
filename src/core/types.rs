//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Database identifier shared by all id-keyed entity kinds
pub type IdT = u64;

/// Never handed out by the id counter
pub const EMPTY_ID: IdT = 0;

/// Block height (simulation time unit)
pub type Height = u64;

/// Faction a character, account or building belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Faction {
    Red,
    Green,
    Blue,
    /// Neutral owner of ancient buildings; never controls characters
    Ancient,
}

impl Faction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Faction::Red => "r",
            Faction::Green => "g",
            Faction::Blue => "b",
            Faction::Ancient => "a",
        }
    }

    /// Dense index, used for per-faction counters
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn all() -> [Faction; 4] {
        [Faction::Red, Faction::Green, Faction::Blue, Faction::Ancient]
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity kinds held in the store, used for diagnostics and handle tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Account,
    Character,
    Region,
    Building,
    BuildingInventory,
    GroundLoot,
    Ongoing,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Account => "account",
            EntityKind::Character => "character",
            EntityKind::Region => "region",
            EntityKind::Building => "building",
            EntityKind::BuildingInventory => "building inventory",
            EntityKind::GroundLoot => "ground loot",
            EntityKind::Ongoing => "ongoing operation",
        };
        f.write_str(name)
    }
}
