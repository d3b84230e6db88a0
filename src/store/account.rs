//! Player accounts
//!
//! An account springs into existence the first time it is touched, with
//! default counters. It is only stored once something about it changes.

use serde::Serialize;

use crate::core::error::Result;
use crate::core::types::{EntityKind, Faction};
use crate::ensure_invariant;
use crate::store::database::{Database, WriteKind};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct AccountRow {
    pub faction: Option<Faction>,
    pub kills: u32,
    pub fame: i64,
}

pub struct AccountHandle<'a> {
    db: &'a Database,
    name: String,
    faction: Option<Faction>,
    kills: u32,
    fame: i64,
    dirty: bool,
    closed: bool,
}

impl<'a> AccountHandle<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Faction chosen at initialisation, `None` before that
    pub fn faction(&self) -> Option<Faction> {
        self.faction
    }

    pub fn is_initialised(&self) -> bool {
        self.faction.is_some()
    }

    /// Fix the account's faction; can only happen once
    pub fn initialise(&mut self, faction: Faction) -> Result<()> {
        ensure_invariant!(
            self.faction.is_none(),
            "account {} is already initialised",
            self.name
        );
        self.faction = Some(faction);
        self.dirty = true;
        Ok(())
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn add_kill(&mut self) {
        self.kills += 1;
        self.dirty = true;
    }

    pub fn fame(&self) -> i64 {
        self.fame
    }

    pub fn set_fame(&mut self, fame: i64) {
        self.fame = fame;
        self.dirty = true;
    }

    fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        tracing::trace!("Upserting account {}", self.name);
        self.db.tables_mut().accounts.insert(
            self.name.clone(),
            AccountRow {
                faction: self.faction,
                kills: self.kills,
                fame: self.fame,
            },
        );
        self.db.record_write(WriteKind::Full);
        self.dirty = false;
    }

    pub fn close(mut self) -> Result<()> {
        self.flush();
        self.closed = true;
        Ok(())
    }
}

impl Drop for AccountHandle<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.flush();
        }
        self.db.release(EntityKind::Account, &self.name);
    }
}

#[derive(Clone, Copy)]
pub struct AccountsTable<'a> {
    db: &'a Database,
    initial_fame: i64,
}

impl<'a> AccountsTable<'a> {
    pub fn new(db: &'a Database, initial_fame: i64) -> Self {
        Self { db, initial_fame }
    }

    /// Handle to the named account, default-initialised if never stored
    pub fn get_by_name(&self, name: &str) -> Result<AccountHandle<'a>> {
        self.db.acquire(EntityKind::Account, name.to_string())?;
        let row = self.db.tables().accounts.get(name).cloned();
        let (faction, kills, fame) = match row {
            Some(r) => (r.faction, r.kills, r.fame),
            None => (None, 0, self.initial_fame),
        };
        Ok(AccountHandle {
            db: self.db,
            name: name.to_string(),
            faction,
            kills,
            fame,
            dirty: false,
            closed: false,
        })
    }

    /// Faction of a stored account without opening a handle
    pub fn faction_of(&self, name: &str) -> Option<Faction> {
        self.db
            .tables()
            .accounts
            .get(name)
            .and_then(|r| r.faction)
    }

    /// Names of all stored accounts in order
    pub fn names(&self) -> Vec<String> {
        self.db.tables().accounts.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_account_not_stored() {
        let db = Database::new();
        let table = AccountsTable::new(&db, 100);
        let a = table.get_by_name("domob").unwrap();
        assert_eq!(a.fame(), 100);
        assert_eq!(a.kills(), 0);
        assert!(!a.is_initialised());
        a.close().unwrap();
        assert!(table.names().is_empty());
    }

    #[test]
    fn test_modified_account_stored() {
        let db = Database::new();
        let table = AccountsTable::new(&db, 100);
        let mut a = table.get_by_name("domob").unwrap();
        a.initialise(Faction::Green).unwrap();
        a.add_kill();
        a.set_fame(90);
        a.close().unwrap();

        let a = table.get_by_name("domob").unwrap();
        assert_eq!(a.faction(), Some(Faction::Green));
        assert_eq!(a.kills(), 1);
        assert_eq!(a.fame(), 90);
        assert_eq!(table.faction_of("domob"), Some(Faction::Green));
    }

    #[test]
    fn test_initialise_only_once() {
        let db = Database::new();
        let table = AccountsTable::new(&db, 100);
        let mut a = table.get_by_name("domob").unwrap();
        a.initialise(Faction::Red).unwrap();
        assert!(a.initialise(Faction::Blue).is_err());
    }
}
