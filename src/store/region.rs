//! Dynamic state of map regions
//!
//! Every region exists implicitly; only those with non-default state ever
//! get a row. The resource counter is a scalar column because mining
//! updates it every block.

use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::{EntityKind, Height, IdT};
use crate::map::RegionId;
use crate::store::database::{Cursor, Database, WriteKind};
use crate::store::inventory::Quantity;
use crate::store::lazy::{Blob, LazyPayload};

/// Result of a completed prospection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prospection {
    /// Account of the prospecting character
    pub name: String,
    pub height: Height,
    pub resource: String,
    /// Prize tier found with this prospection
    pub prize: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionData {
    /// Character currently prospecting the region
    pub prospecting_character: Option<IdT>,
    pub prospection: Option<Prospection>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct RegionRow {
    pub resource_left: Quantity,
    pub data: Blob,
}

pub struct RegionHandle<'a> {
    db: &'a Database,
    id: RegionId,
    exists: bool,
    resource_left: Quantity,
    resource_dirty: bool,
    data: LazyPayload<RegionData>,
    closed: bool,
}

impl<'a> RegionHandle<'a> {
    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn resource_left(&self) -> Quantity {
        self.resource_left
    }

    pub fn set_resource_left(&mut self, amount: Quantity) {
        self.resource_left = amount;
        self.resource_dirty = true;
    }

    pub fn data(&mut self) -> Result<&RegionData> {
        self.data.get()
    }

    pub fn mutable_data(&mut self) -> Result<&mut RegionData> {
        self.data.get_mut()
    }

    fn flush(&mut self) -> Result<()> {
        if !self.exists || self.data.is_dirty() {
            if !self.data.is_dirty() && !self.resource_dirty {
                return Ok(());
            }
            let row = RegionRow {
                resource_left: self.resource_left,
                data: self.data.to_blob()?,
            };
            tracing::trace!("Full upsert of region {}", self.id);
            self.db.tables_mut().regions.insert(self.id, row);
            self.db.record_write(WriteKind::Full);
            self.exists = true;
        } else if self.resource_dirty {
            if let Some(row) = self.db.tables_mut().regions.get_mut(&self.id) {
                row.resource_left = self.resource_left;
            }
            tracing::trace!("Updating resource of region {}", self.id);
            self.db.record_write(WriteKind::Scalar);
        }
        self.resource_dirty = false;
        Ok(())
    }

    pub fn close(mut self) -> Result<()> {
        let res = self.flush();
        self.closed = true;
        res
    }
}

impl Drop for RegionHandle<'_> {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.flush() {
                tracing::error!("Write-back of region {} failed: {}", self.id, e);
                self.db.poison(format!("region {}: {}", self.id, e));
            }
        }
        self.db.release(EntityKind::Region, &self.id.to_string());
    }
}

#[derive(Clone, Copy)]
pub struct RegionsTable<'a> {
    db: &'a Database,
}

impl<'a> RegionsTable<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get_by_id(&self, id: RegionId) -> Result<RegionHandle<'a>> {
        self.db.acquire(EntityKind::Region, id.to_string())?;
        let row = self.db.tables().regions.get(&id).cloned();
        let (exists, resource_left, data) = match row {
            Some(r) => (true, r.resource_left, LazyPayload::from_blob(r.data)),
            None => (false, 0, LazyPayload::new_default()),
        };
        Ok(RegionHandle {
            db: self.db,
            id,
            exists,
            resource_left,
            resource_dirty: false,
            data,
            closed: false,
        })
    }

    /// All regions that have a row, in id order
    pub fn query_stored(&self) -> Cursor<'a, RegionId, RegionHandle<'a>> {
        let keys: Vec<RegionId> = self.db.tables().regions.keys().copied().collect();
        let table = *self;
        Cursor::new(keys, move |id| table.get_by_id(id).map(Some))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_region_not_stored() {
        let db = Database::new();
        let table = RegionsTable::new(&db);
        let mut r = table.get_by_id(42).unwrap();
        assert_eq!(r.data().unwrap(), &RegionData::default());
        r.close().unwrap();
        assert_eq!(table.query_stored().count(), 0);
    }

    #[test]
    fn test_prospection_round_trip() {
        let db = Database::new();
        let table = RegionsTable::new(&db);
        let mut r = table.get_by_id(42).unwrap();
        r.mutable_data().unwrap().prospection = Some(Prospection {
            name: "domob".into(),
            height: 10,
            resource: "raw a".into(),
            prize: None,
        });
        r.set_resource_left(100);
        r.close().unwrap();

        let mut r = table.get_by_id(42).unwrap();
        assert_eq!(r.resource_left(), 100);
        assert_eq!(
            r.data().unwrap().prospection.as_ref().unwrap().resource,
            "raw a"
        );
    }

    #[test]
    fn test_resource_update_is_scalar() {
        let db = Database::new();
        let table = RegionsTable::new(&db);
        let mut r = table.get_by_id(7).unwrap();
        r.mutable_data().unwrap().prospecting_character = Some(1);
        r.close().unwrap();
        db.reset_write_stats();

        let mut r = table.get_by_id(7).unwrap();
        r.set_resource_left(5);
        r.close().unwrap();
        assert_eq!(db.write_stats().scalar_updates, 1);
        assert_eq!(table.get_by_id(7).unwrap().resource_left(), 5);
    }
}
