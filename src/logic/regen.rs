//! Shield regeneration

use crate::core::error::Result;
use crate::logic::context::Context;
use crate::store::{CharacterHandle, CharactersTable, Database};

const MHP_PER_HP: u32 = 1000;

/// Regenerate one block's worth of shield; returns whether anything changed
pub fn regenerate_character(c: &mut CharacterHandle<'_>) -> Result<bool> {
    let regen = c.regen_data()?.clone();
    let hp = *c.hp();
    if regen.shield_regeneration_mhp == 0 || hp.shield >= regen.max_hp.shield {
        return Ok(false);
    }

    let total = hp.mhp_shield + regen.shield_regeneration_mhp;
    let mut shield = hp.shield.saturating_add(total / MHP_PER_HP);
    let mut mhp = total % MHP_PER_HP;
    if shield >= regen.max_hp.shield {
        shield = regen.max_hp.shield;
        mhp = 0;
    }

    let new_hp = c.mutable_hp();
    new_hp.shield = shield;
    new_hp.mhp_shield = mhp;
    Ok(true)
}

pub fn regenerate_all(db: &Database, ctx: &Context<'_>) -> Result<()> {
    let table = CharactersTable::new(db).with_slow_asserts(ctx.params.slow_asserts);
    let mut count = 0;
    for c in table.query_for_regen() {
        let mut c = c?;
        if regenerate_character(&mut c)? {
            count += 1;
        }
        c.close()?;
    }
    tracing::debug!("Regenerated shields of {} characters", count);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Faction;

    fn regen_test_character(db: &Database, rate: u32, max: u32, shield: u32) -> u64 {
        let mut c = CharactersTable::new(db).create_new("domob", Faction::Red).unwrap();
        let regen = c.mutable_regen_data().unwrap();
        regen.shield_regeneration_mhp = rate;
        regen.max_hp.shield = max;
        c.mutable_hp().shield = shield;
        let id = c.id();
        c.close().unwrap();
        id
    }

    #[test]
    fn test_fractional_regeneration_carries() {
        let db = Database::new();
        let id = regen_test_character(&db, 600, 10, 5);
        let table = CharactersTable::new(&db);

        let mut c = table.require(id).unwrap();
        regenerate_character(&mut c).unwrap();
        assert_eq!((c.hp().shield, c.hp().mhp_shield), (5, 600));
        regenerate_character(&mut c).unwrap();
        assert_eq!((c.hp().shield, c.hp().mhp_shield), (6, 200));
    }

    #[test]
    fn test_capped_at_maximum() {
        let db = Database::new();
        let id = regen_test_character(&db, 2500, 10, 9);
        let mut c = CharactersTable::new(&db).require(id).unwrap();
        assert!(regenerate_character(&mut c).unwrap());
        assert_eq!((c.hp().shield, c.hp().mhp_shield), (10, 0));
        assert!(!regenerate_character(&mut c).unwrap());
    }

    #[test]
    fn test_full_shield_drops_out_of_regen_query() {
        let db = Database::new();
        let id = regen_test_character(&db, 2000, 10, 9);
        let table = CharactersTable::new(&db);
        assert_eq!(table.query_for_regen().count(), 1);

        let mut c = table.require(id).unwrap();
        regenerate_character(&mut c).unwrap();
        c.close().unwrap();
        assert_eq!(table.query_for_regen().count(), 0);
    }
}
