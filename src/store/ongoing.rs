//! Deferred effects scheduled for a future block height

use serde::{Deserialize, Serialize};

use crate::core::error::{GameError, Result};
use crate::core::types::{EntityKind, Height, IdT};
use crate::ensure_invariant;
use crate::store::database::{Cursor, Database, WriteKind};
use crate::store::lazy::{Blob, LazyPayload};

/// What happens when the operation fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OngoingOp {
    /// Finish prospecting the region the character stands in
    Prospection,
    /// Restore the character's armour to its maximum
    ArmourRepair,
    /// Return the blueprint original with fresh copies
    BlueprintCopy {
        account: String,
        original_type: String,
        copy_type: String,
        num_copies: u64,
    },
    /// Deliver constructed items, and the original blueprint if one
    /// was used
    ItemConstruction {
        account: String,
        output_type: String,
        num_items: u64,
        original_type: Option<String>,
    },
}

impl OngoingOp {
    pub fn name(&self) -> &'static str {
        match self {
            OngoingOp::Prospection => "prospection",
            OngoingOp::ArmourRepair => "armour repair",
            OngoingOp::BlueprintCopy { .. } => "blueprint copy",
            OngoingOp::ItemConstruction { .. } => "item construction",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OngoingRow {
    pub height: Height,
    pub character_id: Option<IdT>,
    pub building_id: Option<IdT>,
    pub data: Blob,
}

pub struct OngoingHandle<'a> {
    db: &'a Database,
    id: IdT,
    height: Height,
    character_id: Option<IdT>,
    building_id: Option<IdT>,
    data: LazyPayload<Option<OngoingOp>>,
    is_new: bool,
    scalars_dirty: bool,
    closed: bool,
}

impl<'a> OngoingHandle<'a> {
    pub fn id(&self) -> IdT {
        self.id
    }

    /// Height at which the operation fires
    pub fn height(&self) -> Height {
        self.height
    }

    pub fn set_height(&mut self, height: Height) {
        self.height = height;
        self.scalars_dirty = true;
    }

    pub fn character_id(&self) -> Option<IdT> {
        self.character_id
    }

    pub fn set_character_id(&mut self, id: IdT) {
        self.character_id = Some(id);
        self.scalars_dirty = true;
    }

    pub fn building_id(&self) -> Option<IdT> {
        self.building_id
    }

    pub fn set_building_id(&mut self, id: IdT) {
        self.building_id = Some(id);
        self.scalars_dirty = true;
    }

    pub fn op(&mut self) -> Result<Option<&OngoingOp>> {
        Ok(self.data.get()?.as_ref())
    }

    pub fn set_op(&mut self, op: OngoingOp) {
        self.data.set(Some(op));
    }

    fn flush(&mut self) -> Result<()> {
        if !self.is_new && !self.scalars_dirty && !self.data.is_dirty() {
            return Ok(());
        }
        ensure_invariant!(
            self.character_id.is_some() != self.building_id.is_some(),
            "ongoing operation {} must belong to exactly one character or building",
            self.id
        );
        let row = OngoingRow {
            height: self.height,
            character_id: self.character_id,
            building_id: self.building_id,
            data: self.data.to_blob()?,
        };
        tracing::trace!("Upserting ongoing operation {}", self.id);
        self.db.tables_mut().ongoings.insert(self.id, row);
        self.db.record_write(WriteKind::Full);
        self.is_new = false;
        self.scalars_dirty = false;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        let res = self.flush();
        self.closed = true;
        res
    }
}

impl Drop for OngoingHandle<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.flush() {
                tracing::error!("Write-back of ongoing operation {} failed: {}", self.id, e);
                self.db.poison(format!("ongoing {}: {}", self.id, e));
            }
        }
        self.db.release(EntityKind::Ongoing, &self.id.to_string());
    }
}

#[derive(Clone, Copy)]
pub struct OngoingsTable<'a> {
    db: &'a Database,
}

impl<'a> OngoingsTable<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// New operation firing at `height`; the caller attaches it to its
    /// character or building and sets the effect
    pub fn create_new(&self, height: Height) -> Result<OngoingHandle<'a>> {
        let id = self.db.next_id();
        self.db.acquire(EntityKind::Ongoing, id.to_string())?;
        Ok(OngoingHandle {
            db: self.db,
            id,
            height,
            character_id: None,
            building_id: None,
            data: LazyPayload::new_default(),
            is_new: true,
            scalars_dirty: false,
            closed: false,
        })
    }

    pub fn get_by_id(&self, id: IdT) -> Result<Option<OngoingHandle<'a>>> {
        let row = match self.db.tables().ongoings.get(&id) {
            Some(row) => row.clone(),
            None => return Ok(None),
        };
        self.db.acquire(EntityKind::Ongoing, id.to_string())?;
        Ok(Some(OngoingHandle {
            db: self.db,
            id,
            height: row.height,
            character_id: row.character_id,
            building_id: row.building_id,
            data: LazyPayload::from_blob(row.data),
            is_new: false,
            scalars_dirty: false,
            closed: false,
        }))
    }

    pub fn require(&self, id: IdT) -> Result<OngoingHandle<'a>> {
        self.get_by_id(id)?.ok_or(GameError::EntityNotFound {
            kind: EntityKind::Ongoing,
            id,
        })
    }

    pub fn exists(&self, id: IdT) -> bool {
        self.db.tables().ongoings.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.db.tables().ongoings.len()
    }

    /// Operations due at `height`, by target height and then id
    pub fn query_to_process(&self, height: Height) -> Cursor<'a, IdT, OngoingHandle<'a>> {
        let mut due: Vec<(Height, IdT)> = self
            .db
            .tables()
            .ongoings
            .iter()
            .filter(|(_, row)| row.height <= height)
            .map(|(&id, row)| (row.height, id))
            .collect();
        due.sort_unstable();
        let keys = due.into_iter().map(|(_, id)| id).collect();
        let table = *self;
        Cursor::new(keys, move |id| table.get_by_id(id))
    }

    /// Ids of all operations in id order
    pub fn ids(&self) -> Vec<IdT> {
        self.db.tables().ongoings.keys().copied().collect()
    }

    pub fn ids_for_character(&self, character: IdT) -> Vec<IdT> {
        self.db
            .tables()
            .ongoings
            .iter()
            .filter(|(_, row)| row.character_id == Some(character))
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn delete_by_id(&self, id: IdT) -> Result<()> {
        ensure_invariant!(
            !self.db.is_open(EntityKind::Ongoing, &id.to_string()),
            "deleting ongoing operation {} with an open handle",
            id
        );
        if self.db.tables_mut().ongoings.remove(&id).is_some() {
            tracing::trace!("Deleted ongoing operation {}", id);
            self.db.record_write(WriteKind::Delete);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(table: &OngoingsTable<'_>, height: Height, character: IdT) -> IdT {
        let mut op = table.create_new(height).unwrap();
        op.set_character_id(character);
        op.set_op(OngoingOp::ArmourRepair);
        let id = op.id();
        op.close().unwrap();
        id
    }

    #[test]
    fn test_processed_by_height_then_id() {
        let db = Database::new();
        let table = OngoingsTable::new(&db);
        let a = schedule(&table, 5, 100);
        let b = schedule(&table, 3, 100);
        let c = schedule(&table, 5, 100);
        let _later = schedule(&table, 6, 100);

        let order: Vec<IdT> = table
            .query_to_process(5)
            .map(|op| op.unwrap().id())
            .collect();
        assert_eq!(order, vec![b, a, c]);
    }

    #[test]
    fn test_payload_survives_reload() {
        let db = Database::new();
        let table = OngoingsTable::new(&db);
        let mut op = table.create_new(10).unwrap();
        op.set_building_id(7);
        op.set_op(OngoingOp::BlueprintCopy {
            account: "domob".into(),
            original_type: "bow bpo".into(),
            copy_type: "bow bpc".into(),
            num_copies: 2,
        });
        let id = op.id();
        op.close().unwrap();

        let mut op = table.require(id).unwrap();
        assert_eq!(op.building_id(), Some(7));
        assert_eq!(op.op().unwrap().unwrap().name(), "blueprint copy");
    }

    #[test]
    fn test_unattached_operation_rejected() {
        let db = Database::new();
        let table = OngoingsTable::new(&db);
        let op = table.create_new(1).unwrap();
        assert!(op.close().is_err());
    }

    #[test]
    fn test_delete() {
        let db = Database::new();
        let table = OngoingsTable::new(&db);
        let id = schedule(&table, 1, 100);
        assert_eq!(table.ids_for_character(100), vec![id]);
        table.delete_by_id(id).unwrap();
        assert!(!table.exists(id));
    }
}
