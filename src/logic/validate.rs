//! Whole-state consistency checks
//!
//! These are expensive and only run when slow asserts are enabled. Any
//! failure is a bug in the state transition, never a player error.

use crate::core::config::GameParams;
use crate::core::error::{GameError, Result};
use crate::ensure_invariant;
use crate::store::{
    AccountsTable, BuildingInventoriesTable, BuildingsTable, CharactersTable, Database,
    OngoingsTable, RegionsTable,
};

fn validate_characters(db: &Database, params: &GameParams) -> Result<()> {
    let accounts = AccountsTable::new(db, params.initial_fame);
    let ongoings = OngoingsTable::new(db);

    for c in CharactersTable::new(db).query_all() {
        let mut c = c?;
        let id = c.id();
        let faction = accounts.faction_of(c.owner()).ok_or_else(|| {
            GameError::invariant(format!(
                "Character {} owned by uninitialised account {}",
                id,
                c.owner()
            ))
        })?;
        ensure_invariant!(
            faction == c.faction(),
            "Faction mismatch between character {} ({}) and its owner {} ({})",
            id,
            c.faction(),
            c.owner(),
            faction
        );

        let busy = c.busy();
        let moving = c.is_moving()?;
        ensure_invariant!(!(busy > 0 && moving), "Busy character {} is moving", id);

        let ongoing = c.data()?.ongoing;
        match ongoing {
            Some(op) => {
                let mut op = ongoings.get_by_id(op)?.ok_or_else(|| {
                    GameError::invariant(format!(
                        "Character {} refers to missing operation {}",
                        id, op
                    ))
                })?;
                let owner = op.character_id();
                let op_id = op.id();
                op.close()?;
                ensure_invariant!(
                    owner == Some(id),
                    "Operation {} of character {} belongs to {:?}",
                    op_id,
                    id,
                    owner
                );
                ensure_invariant!(busy > 0, "Character {} has an operation but is idle", id);
            }
            None => ensure_invariant!(busy == 0, "Character {} is busy without operation", id),
        }
        c.close()?;
    }
    Ok(())
}

fn validate_ongoings(db: &Database) -> Result<()> {
    let ongoings = OngoingsTable::new(db);
    let characters = CharactersTable::new(db);
    let buildings = BuildingsTable::new(db);

    for id in ongoings.ids() {
        let op = ongoings.require(id)?;
        let character = op.character_id();
        let building = op.building_id();
        op.close()?;
        match (character, building) {
            (Some(c), None) => {
                ensure_invariant!(
                    characters.exists(c),
                    "Operation {} refers to missing character {}",
                    id,
                    c
                );
            }
            (None, Some(b)) => {
                ensure_invariant!(
                    buildings.exists(b),
                    "Operation {} refers to missing building {}",
                    id,
                    b
                );
            }
            _ => {
                return Err(GameError::invariant(format!(
                    "Operation {} does not have exactly one owner",
                    id
                )))
            }
        }
    }
    Ok(())
}

fn validate_regions(db: &Database) -> Result<()> {
    let characters = CharactersTable::new(db);
    for r in RegionsTable::new(db).query_stored() {
        let mut r = r?;
        let id = r.id();
        let marker = r.data()?.prospecting_character;
        if let Some(c) = marker {
            ensure_invariant!(
                characters.exists(c),
                "Region {} is prospected by missing character {}",
                id,
                c
            );
            ensure_invariant!(
                r.data()?.prospection.is_none(),
                "Region {} is being prospected but has a prospection",
                id
            );
        }
        r.close()?;
    }
    Ok(())
}

fn validate_building_inventories(db: &Database) -> Result<()> {
    let buildings = BuildingsTable::new(db);
    for (building, account) in BuildingInventoriesTable::new(db).keys() {
        ensure_invariant!(
            buildings.exists(building),
            "Inventory of {} in missing building {}",
            account,
            building
        );
    }
    Ok(())
}

/// Check cross-entity invariants of the whole state
pub fn validate_state_slow(db: &Database, params: &GameParams) -> Result<()> {
    validate_characters(db, params)?;
    validate_ongoings(db)?;
    validate_regions(db)?;
    validate_building_inventories(db)?;
    tracing::trace!("State validated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Faction;

    fn setup() -> (Database, GameParams) {
        (Database::new(), GameParams::default())
    }

    fn init_account(db: &Database, name: &str, faction: Faction) {
        let mut a = AccountsTable::new(db, 100).get_by_name(name).unwrap();
        a.initialise(faction).unwrap();
        a.close().unwrap();
    }

    fn error_of(db: &Database, params: &GameParams) -> String {
        validate_state_slow(db, params).unwrap_err().to_string()
    }

    #[test]
    fn test_valid_state_passes() {
        let (db, params) = setup();
        init_account(&db, "domob", Faction::Red);
        CharactersTable::new(&db)
            .create_new("domob", Faction::Red)
            .unwrap()
            .close()
            .unwrap();
        validate_state_slow(&db, &params).unwrap();
    }

    #[test]
    fn test_character_factions() {
        let (db, params) = setup();
        CharactersTable::new(&db)
            .create_new("domob", Faction::Red)
            .unwrap()
            .close()
            .unwrap();
        assert!(error_of(&db, &params).contains("owned by uninitialised account"));

        init_account(&db, "domob", Faction::Green);
        assert!(error_of(&db, &params).contains("Faction mismatch"));
    }

    #[test]
    fn test_busy_without_operation() {
        let (db, params) = setup();
        init_account(&db, "domob", Faction::Red);
        let mut c = CharactersTable::new(&db)
            .create_new("domob", Faction::Red)
            .unwrap();
        c.set_busy(3);
        c.close().unwrap();
        assert!(error_of(&db, &params).contains("busy without operation"));
    }

    #[test]
    fn test_operation_of_missing_character() {
        let (db, params) = setup();
        let mut op = OngoingsTable::new(&db).create_new(5).unwrap();
        op.set_character_id(42);
        op.set_op(crate::store::OngoingOp::ArmourRepair);
        op.close().unwrap();
        assert!(error_of(&db, &params).contains("missing character 42"));
    }

    #[test]
    fn test_region_marker_of_missing_character() {
        let (db, params) = setup();
        let mut r = RegionsTable::new(&db).get_by_id(7).unwrap();
        r.mutable_data().unwrap().prospecting_character = Some(9);
        r.close().unwrap();
        assert!(error_of(&db, &params).contains("missing character 9"));
    }
}
