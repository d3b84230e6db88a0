//! Characters: the player-owned mobile units
//!
//! Scalar columns (owner, position, busy, volatile movement, hit points)
//! are loaded eagerly. The two structured payloads are lazy: the
//! regeneration data and the main character data (movement, combat,
//! mining, inventory). Flags derived from the payloads are stored as
//! extra columns so that the per-block queries never need to parse them.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::config::GameParams;
use crate::core::error::{GameError, Result};
use crate::core::types::{EntityKind, Faction, IdT};
use crate::ensure_invariant;
use crate::hex::HexCoord;
use crate::store::database::{Cursor, Database, WriteKind};
use crate::store::inventory::Inventory;
use crate::store::lazy::{Blob, LazyPayload};

// === PAYLOAD TYPES ===

/// Movement state that changes nearly every block while moving
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatileMovement {
    /// Travel budget carried over towards the next step
    pub partial_step: u32,
    /// Consecutive blocks the next step was blocked by another faction
    pub blocked_turns: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub armour: u32,
    pub shield: u32,
    /// Fractional shield in milli-HP, below 1000
    pub mhp_shield: u32,
}

impl HitPoints {
    pub fn is_dead(&self) -> bool {
        self.armour == 0 && self.shield == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxHitPoints {
    pub armour: u32,
    pub shield: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegenData {
    pub max_hp: MaxHitPoints,
    /// Shield regenerated per block in milli-HP
    pub shield_regeneration_mhp: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    /// Maximum L1 distance to the target
    pub range: u32,
    pub min_damage: u32,
    pub max_damage: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatData {
    pub attacks: Vec<Attack>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Remaining waypoints, the next one first
    pub waypoints: VecDeque<HexCoord>,
    /// Planned steps towards the next waypoint
    pub steps: VecDeque<HexCoord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningRate {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mining {
    pub rate: MiningRate,
    pub active: bool,
}

/// The less frequently accessed character attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterData {
    /// Travel budget per block; `BASE_TILE_COST` walks one open tile
    pub speed: u32,
    pub cargo_space: u64,
    pub movement: Option<Movement>,
    pub combat: CombatData,
    pub target: Option<IdT>,
    pub mining: Option<Mining>,
    /// The ongoing operation this character is busy with
    pub ongoing: Option<IdT>,
    pub inventory: Inventory,
}

impl CharacterData {
    /// Largest range of any attack, `None` without attacks
    pub fn attack_range(&self) -> Option<u32> {
        self.combat.attacks.iter().map(|a| a.range).max()
    }
}

/// Columns derived from the payloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct DerivedFlags {
    pub is_moving: bool,
    pub is_mining: bool,
    pub attack_range: Option<u32>,
    pub can_regen: bool,
    pub has_target: bool,
}

fn compute_can_regen(hp: &HitPoints, regen: &RegenData) -> bool {
    regen.shield_regeneration_mhp > 0 && hp.shield < regen.max_hp.shield
}

fn compute_flags(data: &CharacterData, regen: &RegenData, hp: &HitPoints) -> DerivedFlags {
    DerivedFlags {
        is_moving: data.movement.is_some(),
        is_mining: data.mining.map_or(false, |m| m.active),
        attack_range: data.attack_range(),
        can_regen: compute_can_regen(hp, regen),
        has_target: data.target.is_some(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CharacterRow {
    pub owner: String,
    pub faction: Faction,
    pub pos: HexCoord,
    pub busy: u32,
    pub volatile_mv: VolatileMovement,
    pub hp: HitPoints,
    pub regen_data: Blob,
    pub data: Blob,
    pub flags: DerivedFlags,
}

// === HANDLE ===

/// Exclusive in-memory copy of one character
pub struct CharacterHandle<'a> {
    db: &'a Database,
    id: IdT,
    is_new: bool,
    slow_asserts: bool,

    owner: String,
    faction: Faction,
    pos: HexCoord,
    busy: u32,
    volatile_mv: VolatileMovement,
    hp: HitPoints,
    scalars_dirty: bool,

    regen_data: LazyPayload<RegenData>,
    data: LazyPayload<CharacterData>,
    flags: DerivedFlags,

    closed: bool,
}

impl<'a> CharacterHandle<'a> {
    fn open(db: &'a Database, id: IdT, slow_asserts: bool) -> Result<Option<Self>> {
        let row = match db.tables().characters.get(&id) {
            Some(row) => row.clone(),
            None => return Ok(None),
        };
        db.acquire(EntityKind::Character, id.to_string())?;
        Ok(Some(Self {
            db,
            id,
            is_new: false,
            slow_asserts,
            owner: row.owner,
            faction: row.faction,
            pos: row.pos,
            busy: row.busy,
            volatile_mv: row.volatile_mv,
            hp: row.hp,
            scalars_dirty: false,
            regen_data: LazyPayload::from_blob(row.regen_data),
            data: LazyPayload::from_blob(row.data),
            flags: row.flags,
            closed: false,
        }))
    }

    pub fn id(&self) -> IdT {
        self.id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn set_owner(&mut self, owner: impl Into<String>) {
        self.scalars_dirty = true;
        self.owner = owner.into();
    }

    pub fn faction(&self) -> Faction {
        self.faction
    }

    pub fn pos(&self) -> HexCoord {
        self.pos
    }

    pub fn set_pos(&mut self, pos: HexCoord) {
        self.scalars_dirty = true;
        self.pos = pos;
    }

    pub fn busy(&self) -> u32 {
        self.busy
    }

    pub fn set_busy(&mut self, busy: u32) {
        self.scalars_dirty = true;
        self.busy = busy;
    }

    pub fn volatile_mv(&self) -> &VolatileMovement {
        &self.volatile_mv
    }

    pub fn mutable_volatile_mv(&mut self) -> &mut VolatileMovement {
        self.scalars_dirty = true;
        &mut self.volatile_mv
    }

    pub fn hp(&self) -> &HitPoints {
        &self.hp
    }

    pub fn mutable_hp(&mut self) -> &mut HitPoints {
        self.scalars_dirty = true;
        &mut self.hp
    }

    pub fn regen_data(&mut self) -> Result<&RegenData> {
        self.regen_data.get()
    }

    pub fn mutable_regen_data(&mut self) -> Result<&mut RegenData> {
        self.regen_data.get_mut()
    }

    pub fn data(&mut self) -> Result<&CharacterData> {
        self.data.get()
    }

    pub fn mutable_data(&mut self) -> Result<&mut CharacterData> {
        self.data.get_mut()
    }

    // Cached columns are only trusted while the payload is untouched

    pub fn is_moving(&mut self) -> Result<bool> {
        if self.data.is_dirty() {
            return Ok(self.data.get()?.movement.is_some());
        }
        Ok(self.flags.is_moving)
    }

    pub fn attack_range(&mut self) -> Result<Option<u32>> {
        if self.data.is_dirty() {
            return Ok(self.data.get()?.attack_range());
        }
        Ok(self.flags.attack_range)
    }

    pub fn has_target(&mut self) -> Result<bool> {
        if self.data.is_dirty() {
            return Ok(self.data.get()?.target.is_some());
        }
        Ok(self.flags.has_target)
    }

    /// Cargo space not taken by the inventory
    pub fn free_cargo_space(&mut self, params: &GameParams) -> Result<u64> {
        let data = self.data.get()?;
        Ok(data
            .cargo_space
            .saturating_sub(data.inventory.used_space(params)))
    }

    /// Write back without consuming the handle, so `Drop` can share it
    fn flush(&mut self) -> Result<()> {
        let full = self.is_new || self.data.is_dirty() || self.regen_data.is_dirty();
        if full {
            let flags = compute_flags(self.data.get()?, self.regen_data.get()?, &self.hp);
            ensure_invariant!(
                self.busy == 0 || !flags.is_moving,
                "character {} is busy and moving",
                self.id
            );
            let row = CharacterRow {
                owner: self.owner.clone(),
                faction: self.faction,
                pos: self.pos,
                busy: self.busy,
                volatile_mv: self.volatile_mv,
                hp: self.hp,
                regen_data: self.regen_data.to_blob()?,
                data: self.data.to_blob()?,
                flags,
            };
            tracing::trace!("Full upsert of character {}", self.id);
            self.db.tables_mut().characters.insert(self.id, row);
            self.db.record_write(WriteKind::Full);
            self.flags = flags;
            self.is_new = false;
            self.scalars_dirty = false;
            return Ok(());
        }

        self.check_cached_flags()?;

        if self.scalars_dirty {
            ensure_invariant!(
                self.busy == 0 || !self.flags.is_moving,
                "character {} is busy and moving",
                self.id
            );
            let can_regen = compute_can_regen(&self.hp, self.regen_data.get()?);
            let mut tables = self.db.tables_mut();
            let row = tables
                .characters
                .get_mut(&self.id)
                .ok_or(GameError::EntityNotFound {
                    kind: EntityKind::Character,
                    id: self.id,
                })?;
            row.owner = self.owner.clone();
            row.pos = self.pos;
            row.busy = self.busy;
            row.volatile_mv = self.volatile_mv;
            row.hp = self.hp;
            row.flags.can_regen = can_regen;
            drop(tables);
            tracing::trace!("Scalar update of character {}", self.id);
            self.db.record_write(WriteKind::Scalar);
            self.flags.can_regen = can_regen;
            self.scalars_dirty = false;
        }
        Ok(())
    }

    fn check_cached_flags(&mut self) -> Result<()> {
        if !self.slow_asserts {
            return Ok(());
        }
        let expected = compute_flags(self.data.get()?, self.regen_data.get()?, &self.hp);
        let mut cached = self.flags;
        // can_regen follows hp, which the scalar path refreshes
        if self.scalars_dirty {
            cached.can_regen = expected.can_regen;
        }
        ensure_invariant!(
            cached == expected,
            "cached columns of character {} do not match its payload",
            self.id
        );
        Ok(())
    }

    /// Write back any changes and release the handle
    pub fn close(mut self) -> Result<()> {
        let res = self.flush();
        self.closed = true;
        res
    }
}

impl Drop for CharacterHandle<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.flush() {
                tracing::error!("Write-back of character {} failed: {}", self.id, e);
                self.db.poison(format!("character {}: {}", self.id, e));
            }
        }
        self.db.release(EntityKind::Character, &self.id.to_string());
    }
}

impl std::fmt::Debug for CharacterHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharacterHandle")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("faction", &self.faction)
            .field("pos", &self.pos)
            .field("busy", &self.busy)
            .finish_non_exhaustive()
    }
}

// === TABLE ===

/// Position and faction of a character, read without opening a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterPosition {
    pub id: IdT,
    pub pos: HexCoord,
    pub faction: Faction,
}

#[derive(Clone, Copy)]
pub struct CharactersTable<'a> {
    db: &'a Database,
    slow_asserts: bool,
}

impl<'a> CharactersTable<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            slow_asserts: false,
        }
    }

    /// Cross-check cached columns against payloads on every release
    pub fn with_slow_asserts(mut self, enabled: bool) -> Self {
        self.slow_asserts = enabled;
        self
    }

    /// Create a character with fresh id and default payloads
    pub fn create_new(&self, owner: &str, faction: Faction) -> Result<CharacterHandle<'a>> {
        let id = self.db.next_id();
        self.db.acquire(EntityKind::Character, id.to_string())?;
        tracing::debug!("Creating character {} for {} ({})", id, owner, faction);
        Ok(CharacterHandle {
            db: self.db,
            id,
            is_new: true,
            slow_asserts: self.slow_asserts,
            owner: owner.to_string(),
            faction,
            pos: HexCoord::default(),
            busy: 0,
            volatile_mv: VolatileMovement::default(),
            hp: HitPoints::default(),
            scalars_dirty: false,
            regen_data: LazyPayload::new_default(),
            data: LazyPayload::new_default(),
            flags: DerivedFlags::default(),
            closed: false,
        })
    }

    pub fn get_by_id(&self, id: IdT) -> Result<Option<CharacterHandle<'a>>> {
        CharacterHandle::open(self.db, id, self.slow_asserts)
    }

    /// Like `get_by_id`, for characters that must exist
    pub fn require(&self, id: IdT) -> Result<CharacterHandle<'a>> {
        self.get_by_id(id)?.ok_or(GameError::EntityNotFound {
            kind: EntityKind::Character,
            id,
        })
    }

    pub fn exists(&self, id: IdT) -> bool {
        self.db.tables().characters.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.db.tables().characters.len()
    }

    /// Owner of a character without opening a handle
    pub fn owner_of(&self, id: IdT) -> Option<String> {
        self.db
            .tables()
            .characters
            .get(&id)
            .map(|row| row.owner.clone())
    }

    fn query<P>(&self, pred: P) -> Cursor<'a, IdT, CharacterHandle<'a>>
    where
        P: Fn(&CharacterRow) -> bool,
    {
        let keys: Vec<IdT> = self
            .db
            .tables()
            .characters
            .iter()
            .filter(|(_, row)| pred(row))
            .map(|(&id, _)| id)
            .collect();
        let table = *self;
        Cursor::new(keys, move |id| table.get_by_id(id))
    }

    pub fn query_all(&self) -> Cursor<'a, IdT, CharacterHandle<'a>> {
        self.query(|_| true)
    }

    pub fn query_for_owner(&self, owner: &str) -> Cursor<'a, IdT, CharacterHandle<'a>> {
        let owner = owner.to_string();
        self.query(move |row| row.owner == owner)
    }

    pub fn query_moving(&self) -> Cursor<'a, IdT, CharacterHandle<'a>> {
        self.query(|row| row.flags.is_moving)
    }

    pub fn query_mining(&self) -> Cursor<'a, IdT, CharacterHandle<'a>> {
        self.query(|row| row.flags.is_mining)
    }

    pub fn query_with_attacks(&self) -> Cursor<'a, IdT, CharacterHandle<'a>> {
        self.query(|row| row.flags.attack_range.is_some())
    }

    pub fn query_with_target(&self) -> Cursor<'a, IdT, CharacterHandle<'a>> {
        self.query(|row| row.flags.has_target)
    }

    pub fn query_for_regen(&self) -> Cursor<'a, IdT, CharacterHandle<'a>> {
        self.query(|row| row.flags.can_regen)
    }

    /// Characters whose long action should complete this block
    pub fn query_busy_done(&self) -> Cursor<'a, IdT, CharacterHandle<'a>> {
        self.query(|row| row.busy == 1)
    }

    /// Positions of all characters in id order
    pub fn positions(&self) -> Vec<CharacterPosition> {
        self.db
            .tables()
            .characters
            .iter()
            .map(|(&id, row)| CharacterPosition {
                id,
                pos: row.pos,
                faction: row.faction,
            })
            .collect()
    }

    /// Characters with attacks, with their cached range, in id order
    pub fn attackers(&self) -> Vec<(CharacterPosition, u32)> {
        self.db
            .tables()
            .characters
            .iter()
            .filter_map(|(&id, row)| {
                row.flags.attack_range.map(|range| {
                    (
                        CharacterPosition {
                            id,
                            pos: row.pos,
                            faction: row.faction,
                        },
                        range,
                    )
                })
            })
            .collect()
    }

    pub fn delete_by_id(&self, id: IdT) -> Result<()> {
        ensure_invariant!(
            !self.db.is_open(EntityKind::Character, &id.to_string()),
            "deleting character {} with an open handle",
            id
        );
        if self.db.tables_mut().characters.remove(&id).is_some() {
            tracing::trace!("Deleted character {}", id);
            self.db.record_write(WriteKind::Delete);
        }
        Ok(())
    }

    /// Count down every positive busy counter by one
    pub fn decrement_busy(&self) -> Result<()> {
        let mut tables = self.db.tables_mut();
        let mut updated = 0;
        for (id, row) in tables.characters.iter_mut() {
            if row.busy == 0 {
                continue;
            }
            ensure_invariant!(
                !self.db.is_open(EntityKind::Character, &id.to_string()),
                "decrementing busy of character {} with an open handle",
                id
            );
            row.busy -= 1;
            updated += 1;
        }
        drop(tables);
        for _ in 0..updated {
            self.db.record_write(WriteKind::Scalar);
        }
        Ok(())
    }
}
