//! Embedded in-memory backing store
//!
//! One ordered table per entity kind. Rows are only ever touched through
//! the table modules; this file owns identifiers, transactions, the
//! live-handle registry and write statistics.

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};

use crate::core::error::{GameError, Result};
use crate::core::types::{EntityKind, Height, IdT, EMPTY_ID};
use crate::hex::HexCoord;
use crate::map::RegionId;
use crate::store::account::AccountRow;
use crate::store::building::BuildingRow;
use crate::store::character::CharacterRow;
use crate::store::lazy::Blob;
use crate::store::ongoing::OngoingRow;
use crate::store::region::RegionRow;

/// Serialise a map as a sequence of `[key, value]` pairs, so that
/// non-string keys survive a JSON dump
fn as_pairs<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    K: Serialize,
    V: Serialize,
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(map.len()))?;
    for entry in map {
        seq.serialize_element(&entry)?;
    }
    seq.end()
}

/// All tables of the game state
#[derive(Debug, Clone, Default, Serialize)]
pub struct Tables {
    pub(crate) next_id: IdT,
    pub(crate) accounts: BTreeMap<String, AccountRow>,
    pub(crate) characters: BTreeMap<IdT, CharacterRow>,
    pub(crate) regions: BTreeMap<RegionId, RegionRow>,
    pub(crate) buildings: BTreeMap<IdT, BuildingRow>,
    #[serde(serialize_with = "as_pairs")]
    pub(crate) building_inventories: BTreeMap<(IdT, String), Blob>,
    #[serde(serialize_with = "as_pairs")]
    pub(crate) ground_loot: BTreeMap<HexCoord, Blob>,
    pub(crate) ongoings: BTreeMap<IdT, OngoingRow>,
    /// (victim, attacker) -> height of the last hit
    #[serde(serialize_with = "as_pairs")]
    pub(crate) damage_lists: BTreeMap<(IdT, IdT), Height>,
    /// Prize name -> number found so far
    pub(crate) prizes: BTreeMap<String, u64>,
}

/// Counters of row writes, for checking which write path was taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub full_upserts: u64,
    pub scalar_updates: u64,
    pub deletes: u64,
}

pub(crate) enum WriteKind {
    Full,
    Scalar,
    Delete,
}

/// The backing store
///
/// Block processing is single-threaded; interior mutability lets any
/// number of table views and handles share one `&Database`.
pub struct Database {
    tables: RefCell<Tables>,
    snapshot: RefCell<Option<Tables>>,
    poison: RefCell<Option<String>>,
    open_handles: RefCell<BTreeSet<(EntityKind, String)>>,
    stats: Cell<WriteStats>,
}

impl Database {
    pub fn new() -> Self {
        Self {
            tables: RefCell::new(Tables {
                next_id: EMPTY_ID + 1,
                ..Tables::default()
            }),
            snapshot: RefCell::new(None),
            poison: RefCell::new(None),
            open_handles: RefCell::new(BTreeSet::new()),
            stats: Cell::new(WriteStats::default()),
        }
    }

    pub(crate) fn tables(&self) -> Ref<'_, Tables> {
        self.tables.borrow()
    }

    pub(crate) fn tables_mut(&self) -> RefMut<'_, Tables> {
        self.tables.borrow_mut()
    }

    /// Allocate a fresh identifier, shared across all id-keyed tables
    pub fn next_id(&self) -> IdT {
        let mut t = self.tables.borrow_mut();
        let id = t.next_id;
        t.next_id += 1;
        id
    }

    /// Preview the next identifier without allocating it
    pub fn peek_next_id(&self) -> IdT {
        self.tables.borrow().next_id
    }

    pub(crate) fn record_write(&self, kind: WriteKind) {
        let mut s = self.stats.get();
        match kind {
            WriteKind::Full => s.full_upserts += 1,
            WriteKind::Scalar => s.scalar_updates += 1,
            WriteKind::Delete => s.deletes += 1,
        }
        self.stats.set(s);
    }

    pub fn write_stats(&self) -> WriteStats {
        self.stats.get()
    }

    pub fn reset_write_stats(&self) {
        self.stats.set(WriteStats::default());
    }

    // === HANDLE REGISTRY ===

    /// Register a live handle; a second handle to the same entity is
    /// a violation of the single-writer discipline
    pub(crate) fn acquire(&self, kind: EntityKind, key: String) -> Result<()> {
        let mut open = self.open_handles.borrow_mut();
        if open.contains(&(kind, key.clone())) {
            return Err(GameError::HandleAlreadyOpen { kind, key });
        }
        open.insert((kind, key));
        Ok(())
    }

    pub(crate) fn release(&self, kind: EntityKind, key: &str) {
        self.open_handles
            .borrow_mut()
            .remove(&(kind, key.to_string()));
    }

    pub(crate) fn is_open(&self, kind: EntityKind, key: &str) -> bool {
        self.open_handles
            .borrow()
            .contains(&(kind, key.to_string()))
    }

    pub fn open_handle_count(&self) -> usize {
        self.open_handles.borrow().len()
    }

    /// Record a write-back failure that could not be returned to anyone;
    /// the enclosing transaction will roll back
    pub(crate) fn poison(&self, msg: String) {
        if self.snapshot.borrow().is_none() {
            tracing::error!("Write-back failed outside of a transaction: {}", msg);
            return;
        }
        let mut poison = self.poison.borrow_mut();
        if poison.is_none() {
            *poison = Some(msg);
        }
    }

    // === TRANSACTIONS ===

    pub fn in_transaction(&self) -> bool {
        self.snapshot.borrow().is_some()
    }

    /// Run `f` atomically: either all its writes become visible, or
    /// (on any error) none of them do
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T>,
    {
        if self.in_transaction() {
            return Err(GameError::Transaction("nested transaction".into()));
        }
        let snapshot = self.tables.borrow().clone();
        *self.snapshot.borrow_mut() = Some(snapshot);
        *self.poison.borrow_mut() = None;

        let mut result = f(self);

        if result.is_ok() {
            if let Some(msg) = self.poison.borrow_mut().take() {
                result = Err(GameError::Transaction(msg));
            } else if self.open_handle_count() > 0 {
                result = Err(GameError::Transaction(format!(
                    "{} handles still open at commit",
                    self.open_handle_count()
                )));
            }
        }

        let snapshot = self.snapshot.borrow_mut().take();
        match (&result, snapshot) {
            (Err(e), Some(snapshot)) => {
                tracing::warn!("Rolling back transaction: {}", e);
                *self.tables.borrow_mut() = snapshot;
            }
            _ => tracing::trace!("Transaction committed"),
        }
        *self.poison.borrow_mut() = None;

        result
    }

    /// Canonical JSON of the full state, for comparing runs
    pub fn dump(&self) -> Result<String> {
        Ok(serde_json::to_string(&*self.tables.borrow())?)
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered forward cursor over query results
///
/// The set of matching keys is fixed when the query runs; every row is
/// re-read when the cursor reaches it, so it reflects writes made by
/// earlier steps. Rows deleted in the meantime are skipped.
pub struct Cursor<'a, K, H> {
    keys: std::vec::IntoIter<K>,
    fetch: Box<dyn FnMut(K) -> Result<Option<H>> + 'a>,
}

impl<'a, K, H> Cursor<'a, K, H> {
    pub(crate) fn new<F>(keys: Vec<K>, fetch: F) -> Self
    where
        F: FnMut(K) -> Result<Option<H>> + 'a,
    {
        Self {
            keys: keys.into_iter(),
            fetch: Box::new(fetch),
        }
    }

    /// Number of keys not yet visited
    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl<'a, K, H> Iterator for Cursor<'a, K, H> {
    type Item = Result<H>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            match (self.fetch)(key) {
                Ok(Some(h)) => return Some(Ok(h)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
