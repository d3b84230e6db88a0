//! Ownerless item piles on the ground and per-account building storage
//!
//! Both are just an inventory under a key. A row exists only while the
//! inventory is non-empty.

use std::collections::BTreeMap;

use crate::core::error::Result;
use crate::core::types::{EntityKind, IdT};
use crate::hex::HexCoord;
use crate::store::database::{Database, Tables, WriteKind};
use crate::store::inventory::Inventory;
use crate::store::lazy::{Blob, LazyPayload};

/// Key types of inventory tables
pub trait HoldingKey: Clone + Ord {
    const KIND: EntityKind;

    fn table(tables: &Tables) -> &BTreeMap<Self, Blob>;
    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Self, Blob>;
}

impl HoldingKey for HexCoord {
    const KIND: EntityKind = EntityKind::GroundLoot;

    fn table(tables: &Tables) -> &BTreeMap<Self, Blob> {
        &tables.ground_loot
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Self, Blob> {
        &mut tables.ground_loot
    }
}

impl HoldingKey for (IdT, String) {
    const KIND: EntityKind = EntityKind::BuildingInventory;

    fn table(tables: &Tables) -> &BTreeMap<Self, Blob> {
        &tables.building_inventories
    }

    fn table_mut(tables: &mut Tables) -> &mut BTreeMap<Self, Blob> {
        &mut tables.building_inventories
    }
}

pub struct HoldingHandle<'a, K: HoldingKey> {
    db: &'a Database,
    key: K,
    label: String,
    inventory: LazyPayload<Inventory>,
    closed: bool,
}

impl<'a, K: HoldingKey> HoldingHandle<'a, K> {
    fn open(db: &'a Database, key: K, label: String) -> Result<Self> {
        db.acquire(K::KIND, label.clone())?;
        let blob = K::table(&db.tables()).get(&key).cloned();
        let inventory = match blob {
            Some(b) => LazyPayload::from_blob(b),
            None => LazyPayload::new_default(),
        };
        Ok(Self {
            db,
            key,
            label,
            inventory,
            closed: false,
        })
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn inventory(&mut self) -> Result<&Inventory> {
        self.inventory.get()
    }

    pub fn mutable_inventory(&mut self) -> Result<&mut Inventory> {
        self.inventory.get_mut()
    }

    fn flush(&mut self) -> Result<()> {
        if !self.inventory.is_dirty() {
            return Ok(());
        }
        if self.inventory.get()?.is_empty() {
            let removed = K::table_mut(&mut self.db.tables_mut())
                .remove(&self.key)
                .is_some();
            if removed {
                tracing::trace!("Deleting empty {} {}", K::KIND, self.label);
                self.db.record_write(WriteKind::Delete);
            }
        } else {
            let blob = self.inventory.to_blob()?;
            K::table_mut(&mut self.db.tables_mut()).insert(self.key.clone(), blob);
            tracing::trace!("Upserting {} {}", K::KIND, self.label);
            self.db.record_write(WriteKind::Full);
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        let res = self.flush();
        self.closed = true;
        res
    }
}

impl<K: HoldingKey> Drop for HoldingHandle<'_, K> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.flush() {
                tracing::error!("Write-back of {} {} failed: {}", K::KIND, self.label, e);
                self.db.poison(format!("{} {}: {}", K::KIND, self.label, e));
            }
        }
        self.db.release(K::KIND, &self.label);
    }
}

pub type GroundLootHandle<'a> = HoldingHandle<'a, HexCoord>;
pub type BuildingInventoryHandle<'a> = HoldingHandle<'a, (IdT, String)>;

#[derive(Clone, Copy)]
pub struct GroundLootTable<'a> {
    db: &'a Database,
}

impl<'a> GroundLootTable<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Loot at a tile; empty if nothing lies there
    pub fn get_by_coord(&self, coord: HexCoord) -> Result<GroundLootHandle<'a>> {
        HoldingHandle::open(self.db, coord, coord.to_string())
    }

    /// Tiles with loot, in coordinate order
    pub fn coords(&self) -> Vec<HexCoord> {
        self.db.tables().ground_loot.keys().copied().collect()
    }
}

#[derive(Clone, Copy)]
pub struct BuildingInventoriesTable<'a> {
    db: &'a Database,
}

impl<'a> BuildingInventoriesTable<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get(&self, building: IdT, account: &str) -> Result<BuildingInventoryHandle<'a>> {
        let label = format!("{}/{}", building, account);
        HoldingHandle::open(self.db, (building, account.to_string()), label)
    }

    /// Accounts holding items in a building, in name order
    pub fn accounts_in(&self, building: IdT) -> Vec<String> {
        self.db
            .tables()
            .building_inventories
            .keys()
            .filter(|(b, _)| *b == building)
            .map(|(_, a)| a.clone())
            .collect()
    }

    /// All stored (building, account) pairs
    pub fn keys(&self) -> Vec<(IdT, String)> {
        self.db
            .tables()
            .building_inventories
            .keys()
            .cloned()
            .collect()
    }
}
