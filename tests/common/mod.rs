//! Shared fixture for the pipeline integration tests

#![allow(dead_code)]

use std::collections::BTreeSet;

use hexrealm::core::types::{Faction, Height, IdT};
use hexrealm::logic::{BlockReport, FameTransfer, FameUpdater};
use hexrealm::store::{
    AccountsTable, Attack, CharacterHandle, CharactersTable, Database, RegionHandle, RegionsTable,
};
use hexrealm::{process_block, BlockContext, Command, GameParams, HexCoord, OpenMap, PlayerMove};
use hexrealm::map::BaseMap;

/// Records the credited attackers of every kill
#[derive(Debug, Default)]
pub struct RecordingFame {
    pub kills: Vec<(IdT, BTreeSet<IdT>)>,
}

impl FameUpdater for RecordingFame {
    fn update_for_kill(
        &mut self,
        _db: &Database,
        victim: IdT,
        attackers: &BTreeSet<IdT>,
    ) -> hexrealm::Result<()> {
        self.kills.push((victim, attackers.clone()));
        Ok(())
    }
}

pub struct TestWorld {
    pub db: Database,
    pub params: GameParams,
    pub map: OpenMap,
    pub height: Height,
    pub timestamp: i64,
}

impl TestWorld {
    pub fn new() -> Self {
        let mut params = GameParams::default();
        params.slow_asserts = true;
        Self {
            db: Database::new(),
            params,
            map: OpenMap::default(),
            height: 0,
            timestamp: 0,
        }
    }

    pub fn account(&self, name: &str, faction: Faction) {
        let mut a = AccountsTable::new(&self.db, self.params.initial_fame)
            .get_by_name(name)
            .unwrap();
        a.initialise(faction).unwrap();
        a.close().unwrap();
    }

    /// A character of the owner's faction with walking speed and some
    /// cargo space; the owner must exist already
    pub fn character(&self, owner: &str, pos: HexCoord) -> IdT {
        let faction = AccountsTable::new(&self.db, self.params.initial_fame)
            .faction_of(owner)
            .expect("owner account not initialised");
        let mut c = CharactersTable::new(&self.db)
            .create_new(owner, faction)
            .unwrap();
        c.set_pos(pos);
        let data = c.mutable_data().unwrap();
        data.speed = 1000;
        data.cargo_space = 100;
        let id = c.id();
        c.close().unwrap();
        id
    }

    /// Give a character hit points and a single attack
    pub fn arm(&self, id: IdT, armour: u32, attack: Option<Attack>) {
        self.with_character(id, |c| {
            c.mutable_hp().armour = armour;
            c.mutable_regen_data().unwrap().max_hp.armour = armour;
            if let Some(a) = attack {
                c.mutable_data().unwrap().combat.attacks = vec![a];
            }
        });
    }

    pub fn with_character<T>(&self, id: IdT, f: impl FnOnce(&mut CharacterHandle<'_>) -> T) -> T {
        let mut c = CharactersTable::new(&self.db).require(id).unwrap();
        let res = f(&mut c);
        c.close().unwrap();
        res
    }

    pub fn with_region<T>(&self, pos: HexCoord, f: impl FnOnce(&mut RegionHandle<'_>) -> T) -> T {
        let mut r = RegionsTable::new(&self.db)
            .get_by_id(self.map.region_id(&pos))
            .unwrap();
        let res = f(&mut r);
        r.close().unwrap();
        res
    }

    pub fn exists(&self, id: IdT) -> bool {
        CharactersTable::new(&self.db).exists(id)
    }

    pub fn pos(&self, id: IdT) -> HexCoord {
        self.with_character(id, |c| c.pos())
    }

    /// Process the next block with the given moves
    pub fn block_with(&mut self, moves: &[PlayerMove], fame: &mut dyn FameUpdater) -> BlockReport {
        self.height += 1;
        let ctx = BlockContext {
            height: self.height,
            timestamp: self.timestamp,
            seed: self.height * 7919,
        };
        process_block(&self.db, &self.params, &self.map, ctx, moves, fame).unwrap()
    }

    pub fn block(&mut self, moves: &[PlayerMove]) -> BlockReport {
        let mut fame = FameTransfer::new(&self.params);
        self.block_with(moves, &mut fame)
    }

    pub fn idle(&mut self, blocks: usize) {
        for _ in 0..blocks {
            self.block(&[]);
        }
    }
}

pub fn mv(name: &str, command: Command) -> PlayerMove {
    PlayerMove::new(name, command)
}

pub fn waypoints(character: IdT, wp: &[HexCoord]) -> Command {
    Command::SetWaypoints {
        character,
        waypoints: wp.to_vec(),
    }
}

pub fn fixed_attack(range: u32, damage: u32) -> Attack {
    Attack {
        range,
        min_damage: damage,
        max_damage: damage,
    }
}
