//! Stationary structures

use serde::Serialize;

use crate::core::error::{GameError, Result};
use crate::core::types::{EntityKind, Faction, IdT};
use crate::hex::HexCoord;
use crate::store::database::{Database, WriteKind};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BuildingRow {
    pub building_type: String,
    /// Owning account; ancient buildings have none
    pub owner: Option<String>,
    pub faction: Faction,
    pub centre: HexCoord,
}

pub struct BuildingHandle<'a> {
    db: &'a Database,
    id: IdT,
    row: BuildingRow,
    is_new: bool,
    dirty: bool,
    closed: bool,
}

impl<'a> BuildingHandle<'a> {
    pub fn id(&self) -> IdT {
        self.id
    }

    pub fn building_type(&self) -> &str {
        &self.row.building_type
    }

    pub fn owner(&self) -> Option<&str> {
        self.row.owner.as_deref()
    }

    pub fn set_owner(&mut self, owner: Option<String>) {
        self.row.owner = owner;
        self.dirty = true;
    }

    pub fn faction(&self) -> Faction {
        self.row.faction
    }

    pub fn centre(&self) -> HexCoord {
        self.row.centre
    }

    pub fn set_centre(&mut self, centre: HexCoord) {
        self.row.centre = centre;
        self.dirty = true;
    }

    fn flush(&mut self) {
        if !self.is_new && !self.dirty {
            return;
        }
        tracing::trace!("Upserting building {}", self.id);
        self.db
            .tables_mut()
            .buildings
            .insert(self.id, self.row.clone());
        self.db.record_write(WriteKind::Full);
        self.is_new = false;
        self.dirty = false;
    }

    pub fn close(mut self) -> Result<()> {
        self.flush();
        self.closed = true;
        Ok(())
    }
}

impl Drop for BuildingHandle<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.flush();
        }
        self.db.release(EntityKind::Building, &self.id.to_string());
    }
}

#[derive(Clone, Copy)]
pub struct BuildingsTable<'a> {
    db: &'a Database,
}

impl<'a> BuildingsTable<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create_new(
        &self,
        building_type: &str,
        owner: Option<&str>,
        faction: Faction,
    ) -> Result<BuildingHandle<'a>> {
        let id = self.db.next_id();
        self.db.acquire(EntityKind::Building, id.to_string())?;
        tracing::debug!("Creating building {} of type {}", id, building_type);
        Ok(BuildingHandle {
            db: self.db,
            id,
            row: BuildingRow {
                building_type: building_type.to_string(),
                owner: owner.map(str::to_string),
                faction,
                centre: HexCoord::default(),
            },
            is_new: true,
            dirty: false,
            closed: false,
        })
    }

    pub fn get_by_id(&self, id: IdT) -> Result<Option<BuildingHandle<'a>>> {
        let row = match self.db.tables().buildings.get(&id) {
            Some(row) => row.clone(),
            None => return Ok(None),
        };
        self.db.acquire(EntityKind::Building, id.to_string())?;
        Ok(Some(BuildingHandle {
            db: self.db,
            id,
            row,
            is_new: false,
            dirty: false,
            closed: false,
        }))
    }

    pub fn require(&self, id: IdT) -> Result<BuildingHandle<'a>> {
        self.get_by_id(id)?.ok_or(GameError::EntityNotFound {
            kind: EntityKind::Building,
            id,
        })
    }

    pub fn exists(&self, id: IdT) -> bool {
        self.db.tables().buildings.contains_key(&id)
    }

    /// Building ids in order
    pub fn ids(&self) -> Vec<IdT> {
        self.db.tables().buildings.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_update() {
        let db = Database::new();
        let table = BuildingsTable::new(&db);
        let mut b = table.create_new("workshop", Some("domob"), Faction::Red).unwrap();
        b.set_centre(HexCoord::new(3, -1));
        let id = b.id();
        b.close().unwrap();

        let mut b = table.require(id).unwrap();
        assert_eq!(b.building_type(), "workshop");
        assert_eq!(b.owner(), Some("domob"));
        assert_eq!(b.centre(), HexCoord::new(3, -1));
        b.set_owner(None);
        b.close().unwrap();
        assert_eq!(table.require(id).unwrap().owner(), None);
        assert!(table.get_by_id(id + 1).unwrap().is_none());
    }
}
