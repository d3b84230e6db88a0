//! Fungible item counts

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::config::GameParams;
use crate::core::error::{GameError, Result};

/// Quantity of a single item type
pub type Quantity = u64;

/// Item counts keyed by item type; entries with zero count are never kept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    items: BTreeMap<String, Quantity>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, item: &str) -> Quantity {
        self.items.get(item).copied().unwrap_or(0)
    }

    /// All items in name order
    pub fn items(&self) -> impl Iterator<Item = (&str, Quantity)> {
        self.items.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn add(&mut self, item: &str, amount: Quantity) {
        if amount == 0 {
            return;
        }
        let held = self.items.entry(item.to_string()).or_insert(0);
        *held = held.saturating_add(amount);
    }

    /// Remove exactly `amount`; taking more than is held is an error
    pub fn remove(&mut self, item: &str, amount: Quantity) -> Result<()> {
        let have = self.count(item);
        if have < amount {
            return Err(GameError::invariant(format!(
                "removing {} of {} but only {} held",
                amount, item, have
            )));
        }
        if have == amount {
            self.items.remove(item);
        } else if let Some(c) = self.items.get_mut(item) {
            *c -= amount;
        }
        Ok(())
    }

    /// Move everything from `other` into this inventory
    pub fn merge(&mut self, other: &Inventory) {
        for (item, &amount) in &other.items {
            self.add(item, amount);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total cargo space taken by all items
    pub fn used_space(&self, params: &GameParams) -> Quantity {
        self.items
            .iter()
            .map(|(item, &n)| n.saturating_mul(params.item_space(item)))
            .fold(0, Quantity::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_remove() {
        let mut inv = Inventory::new();
        inv.add("foo", 5);
        inv.add("foo", 3);
        inv.add("bar", 0);
        assert_eq!(inv.count("foo"), 8);
        assert_eq!(inv.count("bar"), 0);
        assert_eq!(inv.items().count(), 1);

        inv.remove("foo", 8).unwrap();
        assert!(inv.is_empty());
        assert!(inv.remove("foo", 1).is_err());
    }

    #[test]
    fn test_add_saturates() {
        let mut inv = Inventory::new();
        inv.add("foo", Quantity::MAX - 1);
        inv.add("foo", 5);
        assert_eq!(inv.count("foo"), Quantity::MAX);
    }

    #[test]
    fn test_used_space_respects_item_sizes() {
        let mut params = GameParams::default();
        params.item_space.insert("heavy".into(), 10);

        let mut inv = Inventory::new();
        inv.add("heavy", 2);
        inv.add("light", 3);
        assert_eq!(inv.used_space(&params), 23);
    }

    #[test]
    fn test_merge() {
        let mut a = Inventory::new();
        a.add("foo", 1);
        let mut b = Inventory::new();
        b.add("foo", 2);
        b.add("bar", 4);
        a.merge(&b);
        assert_eq!(a.count("foo"), 3);
        assert_eq!(a.count("bar"), 4);
    }
}
