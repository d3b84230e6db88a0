//! Replayable scenarios
//!
//! A scenario is an initial world plus a list of blocks of moves, stored
//! as JSON. It drives the replay binary and the integration tests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::core::config::GameParams;
use crate::core::error::{GameError, Result};
use crate::core::types::{Faction, Height, IdT};
use crate::hex::HexCoord;
use crate::logic::{process_block, BlockContext, BlockReport, FameUpdater, PlayerMove};
use crate::map::{BaseMap, BASE_TILE_COST};
use crate::store::{
    AccountsTable, Attack, BuildingInventoriesTable, BuildingsTable, CharactersTable, Database,
    GroundLootTable, HitPoints, MaxHitPoints, Mining, MiningRate,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSetup {
    pub name: String,
    pub faction: Faction,
}

/// Initial state of one character; its faction is its owner's
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterSetup {
    pub owner: String,
    pub pos: HexCoord,
    pub speed: u32,
    pub hp: HitPoints,
    pub max_hp: MaxHitPoints,
    pub shield_regeneration_mhp: u32,
    pub attacks: Vec<Attack>,
    pub cargo_space: u64,
    pub mining: Option<MiningRate>,
    pub inventory: BTreeMap<String, u64>,
}

impl Default for CharacterSetup {
    fn default() -> Self {
        Self {
            owner: String::new(),
            pos: HexCoord::default(),
            speed: BASE_TILE_COST,
            hp: HitPoints::default(),
            max_hp: MaxHitPoints::default(),
            shield_regeneration_mhp: 0,
            attacks: Vec::new(),
            cargo_space: 0,
            mining: None,
            inventory: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSetup {
    pub building_type: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub faction: Faction,
    #[serde(default)]
    pub centre: HexCoord,
    /// Items per account
    #[serde(default)]
    pub inventories: BTreeMap<String, BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootSetup {
    pub pos: HexCoord,
    pub items: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockSetup {
    pub timestamp: i64,
    pub moves: Vec<PlayerMove>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub seed: u64,
    pub start_height: Height,
    pub accounts: Vec<AccountSetup>,
    pub characters: Vec<CharacterSetup>,
    pub buildings: Vec<BuildingSetup>,
    pub ground_loot: Vec<LootSetup>,
    pub blocks: Vec<BlockSetup>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            seed: 0,
            start_height: 1,
            accounts: Vec::new(),
            characters: Vec::new(),
            buildings: Vec::new(),
            ground_loot: Vec::new(),
            blocks: Vec::new(),
        }
    }
}

impl Scenario {
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Write the initial world into an empty database
    ///
    /// Returns the ids of the created characters, in scenario order.
    pub fn populate(&self, db: &Database, params: &GameParams) -> Result<Vec<IdT>> {
        let accounts = AccountsTable::new(db, params.initial_fame);
        for setup in &self.accounts {
            let mut a = accounts.get_by_name(&setup.name)?;
            a.initialise(setup.faction)?;
            a.close()?;
        }

        let characters = CharactersTable::new(db).with_slow_asserts(params.slow_asserts);
        let mut ids = Vec::with_capacity(self.characters.len());
        for setup in &self.characters {
            let faction = accounts.faction_of(&setup.owner).ok_or_else(|| {
                GameError::Config(format!(
                    "character owner {} is not an initialised account",
                    setup.owner
                ))
            })?;
            let mut c = characters.create_new(&setup.owner, faction)?;
            c.set_pos(setup.pos);
            *c.mutable_hp() = setup.hp;
            let regen = c.mutable_regen_data()?;
            regen.max_hp = setup.max_hp;
            regen.shield_regeneration_mhp = setup.shield_regeneration_mhp;
            let data = c.mutable_data()?;
            data.speed = setup.speed;
            data.cargo_space = setup.cargo_space;
            data.combat.attacks = setup.attacks.clone();
            data.mining = setup.mining.map(|rate| Mining {
                rate,
                active: false,
            });
            for (item, &n) in &setup.inventory {
                data.inventory.add(item, n);
            }
            ids.push(c.id());
            c.close()?;
        }

        let buildings = BuildingsTable::new(db);
        let inventories = BuildingInventoriesTable::new(db);
        for setup in &self.buildings {
            let mut b =
                buildings.create_new(&setup.building_type, setup.owner.as_deref(), setup.faction)?;
            b.set_centre(setup.centre);
            let id = b.id();
            b.close()?;
            for (account, items) in &setup.inventories {
                let mut inv = inventories.get(id, account)?;
                let inv_items = inv.mutable_inventory()?;
                for (item, &n) in items {
                    inv_items.add(item, n);
                }
                inv.close()?;
            }
        }

        let loot = GroundLootTable::new(db);
        for setup in &self.ground_loot {
            let mut l = loot.get_by_coord(setup.pos)?;
            let items = l.mutable_inventory()?;
            for (item, &n) in &setup.items {
                items.add(item, n);
            }
            l.close()?;
        }

        tracing::debug!(
            "Populated {} accounts, {} characters, {} buildings",
            self.accounts.len(),
            ids.len(),
            self.buildings.len()
        );
        Ok(ids)
    }

    /// Metadata of the block at the given index
    pub fn block_context(&self, index: usize) -> BlockContext {
        let height = self.start_height + index as Height;
        BlockContext {
            height,
            timestamp: self.blocks.get(index).map(|b| b.timestamp).unwrap_or(0),
            seed: self.seed.wrapping_add(height),
        }
    }

    /// Process all blocks in order
    pub fn run(
        &self,
        db: &Database,
        params: &GameParams,
        map: &dyn BaseMap,
        fame: &mut dyn FameUpdater,
    ) -> Result<Vec<BlockReport>> {
        let mut reports = Vec::with_capacity(self.blocks.len());
        for (i, block) in self.blocks.iter().enumerate() {
            let ctx = self.block_context(i);
            reports.push(process_block(db, params, map, ctx, &block.moves, fame)?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::FameTransfer;
    use crate::map::OpenMap;

    const SCENARIO: &str = r#"{
        "seed": 7,
        "accounts": [{"name": "domob", "faction": "Red"}],
        "characters": [{"owner": "domob", "pos": {"x": 1, "y": 0}, "cargo_space": 10,
                        "inventory": {"foo": 2}}],
        "ground_loot": [{"pos": {"x": 0, "y": 0}, "items": {"bar": 3}}],
        "blocks": [
            {"moves": [{"name": "domob", "command": {"type": "set_waypoints",
                        "character": 1, "waypoints": [{"x": 0, "y": 0}]}}]},
            {"moves": [{"name": "domob", "command": {"type": "pick_up",
                        "character": 1, "items": {"bar": 3}}}]}
        ]
    }"#;

    #[test]
    fn test_scenario_parses_with_defaults() {
        let s = Scenario::from_json_str(SCENARIO).unwrap();
        assert_eq!(s.start_height, 1);
        assert_eq!(s.characters[0].speed, BASE_TILE_COST);
        assert_eq!(s.block_context(1).height, 2);
    }

    #[test]
    fn test_scenario_runs() {
        let s = Scenario::from_json_str(SCENARIO).unwrap();
        let db = Database::new();
        let params = GameParams::default();
        let ids = s.populate(&db, &params).unwrap();
        assert_eq!(ids, vec![1]);

        let mut fame = FameTransfer::new(&params);
        let reports = s.run(&db, &params, &OpenMap::default(), &mut fame).unwrap();
        assert_eq!(reports.len(), 2);

        let mut c = CharactersTable::new(&db).require(1).unwrap();
        assert_eq!(c.pos(), HexCoord::new(0, 0));
        assert_eq!(c.data().unwrap().inventory.count("bar"), 3);
        assert!(GroundLootTable::new(&db).coords().is_empty());
    }

    #[test]
    fn test_owner_must_be_initialised() {
        let s = Scenario {
            characters: vec![CharacterSetup {
                owner: "nobody".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = s.populate(&Database::new(), &GameParams::default()).unwrap_err();
        assert!(matches!(err, GameError::Config(_)));
    }
}
