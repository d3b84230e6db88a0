//! Game parameters with documented constants
//!
//! All tunable numbers of the state transition are collected here. The
//! defaults match the live game; tests and the replay tool may load
//! overrides from TOML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::error::{GameError, Result};

/// A resource type that prospecting can discover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    /// Relative chance of being selected
    pub weight: u32,
    pub min_amount: u64,
    pub max_amount: u64,
}

/// A prize tier of the prospecting competition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeConfig {
    pub name: String,
    /// How many of this prize exist in total
    pub number: u64,
    /// Each prospection wins with chance 1 / probability
    pub probability: u32,
}

/// Parameters for the block state transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameParams {
    // === COMBAT ===
    /// Blocks an attacker stays credited for a victim after its last hit
    ///
    /// An entry refreshed at height H is credited up to H + 99 and dropped
    /// at H + 100.
    pub damage_list_blocks: u64,

    /// Fame moved from victim to each credited attacker on a kill
    pub fame_per_kill: i64,

    /// Fame of a freshly touched account
    pub initial_fame: i64,

    // === MOVEMENT ===
    /// Maximum L1 distance between a character and its next waypoint
    ///
    /// Also bounds the pathfinder's search area, so that unreachable
    /// goals are detected in finite time.
    pub max_waypoint_distance: u32,

    /// Consecutive blocks a character may be blocked by another faction
    /// before it gives up moving
    pub blocked_step_retries: u32,

    // === LONG ACTIONS ===
    pub prospecting_blocks: u64,

    /// Blocks after a prospection before a depleted region may be
    /// prospected again
    pub prospection_expiry_blocks: u64,

    pub armour_repair_hp_per_block: u32,

    /// Duration per produced copy
    pub blueprint_copy_blocks: u64,

    /// Duration per constructed item
    pub construction_blocks: u64,

    /// Items consumed from the building inventory per blueprint copy
    pub blueprint_copy_cost: BTreeMap<String, u64>,

    /// Items consumed per constructed item, by output type
    pub construction_recipes: BTreeMap<String, BTreeMap<String, u64>>,

    // === RESOURCES ===
    pub resources: Vec<ResourceConfig>,

    /// Cargo space per unit of an item; unlisted items take one unit
    pub item_space: BTreeMap<String, u64>,

    // === PRIZES ===
    pub prizes: Vec<PrizeConfig>,

    /// Prospecting no longer finds prizes in blocks at or after this time
    pub competition_end_timestamp: i64,

    // === DIAGNOSTICS ===
    /// Cross-check cached columns against payloads and validate the
    /// whole state after every block
    pub slow_asserts: bool,
}

impl Default for GameParams {
    fn default() -> Self {
        Self {
            damage_list_blocks: 100,
            fame_per_kill: 10,
            initial_fame: 100,

            max_waypoint_distance: 100,
            blocked_step_retries: 10,

            prospecting_blocks: 10,
            prospection_expiry_blocks: 100,
            armour_repair_hp_per_block: 100,
            blueprint_copy_blocks: 10,
            construction_blocks: 10,
            blueprint_copy_cost: BTreeMap::new(),
            construction_recipes: BTreeMap::new(),

            resources: vec![
                ResourceConfig {
                    name: "raw a".into(),
                    weight: 3,
                    min_amount: 500,
                    max_amount: 2000,
                },
                ResourceConfig {
                    name: "raw b".into(),
                    weight: 2,
                    min_amount: 500,
                    max_amount: 2000,
                },
                ResourceConfig {
                    name: "raw c".into(),
                    weight: 1,
                    min_amount: 100,
                    max_amount: 500,
                },
            ],
            item_space: BTreeMap::new(),

            prizes: vec![
                PrizeConfig {
                    name: "gold".into(),
                    number: 3,
                    probability: 200,
                },
                PrizeConfig {
                    name: "silver".into(),
                    number: 50,
                    probability: 10,
                },
                PrizeConfig {
                    name: "bronze".into(),
                    number: 1,
                    probability: 1,
                },
            ],
            competition_end_timestamp: 1_580_000_000,

            slow_asserts: cfg!(debug_assertions),
        }
    }
}

impl GameParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse parameters from TOML; missing keys keep their defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let params: GameParams = toml::from_str(contents)
            .map_err(|e| GameError::Config(format!("Failed to parse params TOML: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Cargo space taken by one unit of the given item
    pub fn item_space(&self, item: &str) -> u64 {
        self.item_space.get(item).copied().unwrap_or(1)
    }

    /// Validate parameters for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.damage_list_blocks == 0 {
            return Err(GameError::Config("damage_list_blocks must be positive".into()));
        }
        if self.prospecting_blocks == 0 {
            return Err(GameError::Config("prospecting_blocks must be positive".into()));
        }
        if self.prospecting_blocks > u64::from(u32::MAX) {
            return Err(GameError::Config(format!(
                "prospecting_blocks ({}) exceeds the busy counter range",
                self.prospecting_blocks
            )));
        }
        if self.armour_repair_hp_per_block == 0 {
            return Err(GameError::Config(
                "armour_repair_hp_per_block must be positive".into(),
            ));
        }
        if self.resources.is_empty() || self.resources.iter().all(|r| r.weight == 0) {
            return Err(GameError::Config(
                "at least one resource with positive weight is required".into(),
            ));
        }
        for r in &self.resources {
            if r.min_amount > r.max_amount {
                return Err(GameError::Config(format!(
                    "resource {}: min_amount ({}) exceeds max_amount ({})",
                    r.name, r.min_amount, r.max_amount
                )));
            }
        }
        if let Some(p) = self.prizes.iter().find(|p| p.probability == 0) {
            return Err(GameError::Config(format!("prize {} has zero probability", p.name)));
        }
        if self.item_space.values().any(|&s| s == 0) {
            return Err(GameError::Config("item space must be positive".into()));
        }
        Ok(())
    }
}
