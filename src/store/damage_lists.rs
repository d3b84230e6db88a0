//! Attackers recently credited for damage to each victim

use std::collections::BTreeSet;

use crate::core::types::{Height, IdT};
use crate::store::database::{Database, WriteKind};

/// View of the damage lists at a given block height
///
/// An entry refreshed at height `h` is live while `height < h + window`.
pub struct DamageLists<'a> {
    db: &'a Database,
    height: Height,
    window: u64,
}

impl<'a> DamageLists<'a> {
    pub fn new(db: &'a Database, height: Height, window: u64) -> Self {
        Self { db, height, window }
    }

    fn is_live(&self, last_hit: Height) -> bool {
        self.height < last_hit.saturating_add(self.window)
    }

    /// Record (or refresh) a hit of `attacker` on `victim`
    pub fn add_entry(&self, victim: IdT, attacker: IdT) {
        self.db
            .tables_mut()
            .damage_lists
            .insert((victim, attacker), self.height);
        self.db.record_write(WriteKind::Full);
    }

    /// Drop all expired entries
    pub fn remove_old(&self) {
        let mut tables = self.db.tables_mut();
        let before = tables.damage_lists.len();
        tables.damage_lists.retain(|_, &mut h| self.is_live(h));
        let removed = before - tables.damage_lists.len();
        drop(tables);
        if removed > 0 {
            tracing::trace!("Removed {} expired damage list entries", removed);
        }
    }

    /// Live attackers of `victim` in id order
    pub fn get_attackers(&self, victim: IdT) -> BTreeSet<IdT> {
        self.db
            .tables()
            .damage_lists
            .range((victim, IdT::MIN)..=(victim, IdT::MAX))
            .filter(|(_, &h)| self.is_live(h))
            .map(|(&(_, attacker), _)| attacker)
            .collect()
    }

    /// Forget a character both as victim and as attacker
    pub fn remove_character(&self, id: IdT) {
        self.db
            .tables_mut()
            .damage_lists
            .retain(|&(victim, attacker), _| victim != id && attacker != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_window() {
        let db = Database::new();
        DamageLists::new(&db, 100, 100).add_entry(1, 2);

        assert_eq!(
            DamageLists::new(&db, 199, 100).get_attackers(1),
            BTreeSet::from([2])
        );
        let at_expiry = DamageLists::new(&db, 200, 100);
        assert!(at_expiry.get_attackers(1).is_empty());
        at_expiry.remove_old();
        assert!(db.tables().damage_lists.is_empty());
    }

    #[test]
    fn test_refresh_extends_credit() {
        let db = Database::new();
        DamageLists::new(&db, 100, 100).add_entry(1, 2);
        DamageLists::new(&db, 150, 100).add_entry(1, 2);
        let later = DamageLists::new(&db, 220, 100);
        later.remove_old();
        assert_eq!(later.get_attackers(1), BTreeSet::from([2]));
    }

    #[test]
    fn test_attackers_per_victim() {
        let db = Database::new();
        let dl = DamageLists::new(&db, 10, 100);
        dl.add_entry(1, 3);
        dl.add_entry(1, 2);
        dl.add_entry(2, 1);
        assert_eq!(dl.get_attackers(1), BTreeSet::from([2, 3]));

        dl.remove_character(1);
        assert!(dl.get_attackers(1).is_empty());
        assert!(dl.get_attackers(2).is_empty());
    }
}
