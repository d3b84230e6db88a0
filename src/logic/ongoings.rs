//! Firing scheduled operations
//!
//! Long actions put an operation into the schedule when they start and
//! mark their character busy. The operation fires at the first block
//! whose height reaches its target height, applies its effect and is
//! deleted. Busy counters are counted down once per block afterwards.

use serde::Serialize;

use crate::core::error::{GameError, Result};
use crate::core::types::IdT;
use crate::logic::context::{Context, RngStream};
use crate::logic::prospecting::finish_prospecting;
use crate::store::{
    BuildingInventoriesTable, CharacterHandle, CharactersTable, Database, OngoingOp,
    OngoingsTable,
};

/// An operation that fired in this block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiredOperation {
    pub id: IdT,
    pub op: OngoingOp,
    /// Prize found, for prospections
    pub prize: Option<String>,
}

fn apply_to_character(
    db: &Database,
    ctx: &Context<'_>,
    c: &mut CharacterHandle<'_>,
    op_id: IdT,
    op: &OngoingOp,
    rng: &mut rand_chacha::ChaCha8Rng,
) -> Result<Option<String>> {
    let prize = match op {
        OngoingOp::Prospection => finish_prospecting(db, ctx, c, rng)?,
        OngoingOp::ArmourRepair => {
            let max = c.regen_data()?.max_hp.armour;
            tracing::debug!("Character {} armour repaired to {}", c.id(), max);
            c.mutable_hp().armour = max;
            None
        }
        OngoingOp::BlueprintCopy { .. } | OngoingOp::ItemConstruction { .. } => {
            return Err(GameError::invariant(format!(
                "{} operation {} attached to character {}",
                op.name(),
                op_id,
                c.id()
            )));
        }
    };

    if c.data()?.ongoing == Some(op_id) {
        c.mutable_data()?.ongoing = None;
    }
    c.set_busy(0);
    Ok(prize)
}

fn apply_to_building(db: &Database, building: IdT, op: &OngoingOp) -> Result<()> {
    let inventories = BuildingInventoriesTable::new(db);
    match op {
        OngoingOp::BlueprintCopy {
            account,
            original_type,
            copy_type,
            num_copies,
        } => {
            let mut inv = inventories.get(building, account)?;
            let items = inv.mutable_inventory()?;
            items.add(original_type, 1);
            items.add(copy_type, *num_copies);
            inv.close()?;
            tracing::debug!(
                "{} copies of {} delivered to {} in building {}",
                num_copies,
                original_type,
                account,
                building
            );
        }
        OngoingOp::ItemConstruction {
            account,
            output_type,
            num_items,
            original_type,
        } => {
            let mut inv = inventories.get(building, account)?;
            let items = inv.mutable_inventory()?;
            items.add(output_type, *num_items);
            if let Some(original) = original_type {
                items.add(original, 1);
            }
            inv.close()?;
            tracing::debug!(
                "{} x {} constructed for {} in building {}",
                num_items,
                output_type,
                account,
                building
            );
        }
        OngoingOp::Prospection | OngoingOp::ArmourRepair => {
            return Err(GameError::invariant(format!(
                "{} operation attached to building {}",
                op.name(),
                building
            )));
        }
    }
    Ok(())
}

/// Fire every operation due at the current height, by target height and id
pub fn process_all_ongoings(db: &Database, ctx: &Context<'_>) -> Result<Vec<FiredOperation>> {
    let ongoings = OngoingsTable::new(db);
    let characters = CharactersTable::new(db).with_slow_asserts(ctx.params.slow_asserts);
    let mut rng = ctx.rng(RngStream::Prospecting);
    let mut fired = Vec::new();

    for handle in ongoings.query_to_process(ctx.height()) {
        let mut handle = handle?;
        let id = handle.id();
        let op = handle
            .op()?
            .cloned()
            .ok_or_else(|| GameError::invariant(format!("ongoing operation {} has no effect", id)))?;
        let character_id = handle.character_id();
        let building_id = handle.building_id();
        handle.close()?;

        let prize = match (character_id, building_id) {
            (Some(cid), None) => {
                let mut c = characters.require(cid)?;
                let prize = apply_to_character(db, ctx, &mut c, id, &op, &mut rng)?;
                c.close()?;
                prize
            }
            (None, Some(bid)) => {
                apply_to_building(db, bid, &op)?;
                None
            }
            _ => {
                return Err(GameError::invariant(format!(
                    "ongoing operation {} has no single owner",
                    id
                )))
            }
        };

        ongoings.delete_by_id(id)?;
        tracing::debug!("Fired {} operation {}", op.name(), id);
        fired.push(FiredOperation { id, op, prize });
    }
    Ok(fired)
}

/// Count down busy characters after this block's operations fired
///
/// A character still at busy 1 here missed its operation.
pub fn process_busy(db: &Database) -> Result<()> {
    let characters = CharactersTable::new(db);
    if let Some(c) = characters.query_busy_done().next() {
        let c = c?;
        let id = c.id();
        c.close()?;
        return Err(GameError::invariant(format!(
            "character {} is about to finish being busy without an operation",
            id
        )));
    }
    characters.decrement_busy()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GameParams;
    use crate::core::types::{Faction, Height};
    use crate::logic::context::BlockContext;
    use crate::map::OpenMap;

    fn ctx<'a>(params: &'a GameParams, map: &'a OpenMap, height: Height) -> Context<'a> {
        Context::new(
            params,
            map,
            BlockContext {
                height,
                timestamp: 0,
                seed: 0,
            },
        )
    }

    fn busy_character(db: &Database, busy: u32) -> IdT {
        let mut c = CharactersTable::new(db).create_new("domob", Faction::Red).unwrap();
        c.set_busy(busy);
        let id = c.id();
        c.close().unwrap();
        id
    }

    fn schedule(db: &Database, height: Height, character: IdT, op: OngoingOp) -> IdT {
        let mut h = OngoingsTable::new(db).create_new(height).unwrap();
        h.set_character_id(character);
        h.set_op(op);
        let id = h.id();
        h.close().unwrap();
        let mut c = CharactersTable::new(db).require(character).unwrap();
        c.mutable_data().unwrap().ongoing = Some(id);
        c.close().unwrap();
        id
    }

    #[test]
    fn test_fires_once_at_target_height() {
        let db = Database::new();
        let params = GameParams::default();
        let map = OpenMap::default();
        let c = busy_character(&db, 2);
        let op = schedule(&db, 10, c, OngoingOp::ArmourRepair);

        assert!(process_all_ongoings(&db, &ctx(&params, &map, 9)).unwrap().is_empty());
        let fired = process_all_ongoings(&db, &ctx(&params, &map, 10)).unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, op);
        assert!(process_all_ongoings(&db, &ctx(&params, &map, 11)).unwrap().is_empty());
        assert!(!OngoingsTable::new(&db).exists(op));

        let mut ch = CharactersTable::new(&db).require(c).unwrap();
        assert_eq!(ch.busy(), 0);
        assert_eq!(ch.data().unwrap().ongoing, None);
    }

    #[test]
    fn test_late_block_still_fires() {
        let db = Database::new();
        let params = GameParams::default();
        let map = OpenMap::default();
        let c = busy_character(&db, 1);
        let op = schedule(&db, 10, c, OngoingOp::ArmourRepair);
        let fired = process_all_ongoings(&db, &ctx(&params, &map, 15)).unwrap();
        assert_eq!(fired[0].id, op);
    }

    #[test]
    fn test_armour_repair_restores_max() {
        let db = Database::new();
        let params = GameParams::default();
        let map = OpenMap::default();
        let id = busy_character(&db, 1);
        {
            let mut c = CharactersTable::new(&db).require(id).unwrap();
            c.mutable_regen_data().unwrap().max_hp.armour = 100;
            c.mutable_hp().armour = 42;
        }
        schedule(&db, 3, id, OngoingOp::ArmourRepair);
        process_all_ongoings(&db, &ctx(&params, &map, 3)).unwrap();
        assert_eq!(CharactersTable::new(&db).require(id).unwrap().hp().armour, 100);
    }

    #[test]
    fn test_blueprint_copy_delivers_to_building() {
        let db = Database::new();
        let params = GameParams::default();
        let map = OpenMap::default();
        let mut op = OngoingsTable::new(&db).create_new(5).unwrap();
        op.set_building_id(100);
        op.set_op(OngoingOp::BlueprintCopy {
            account: "domob".into(),
            original_type: "bow bpo".into(),
            copy_type: "bow bpc".into(),
            num_copies: 3,
        });
        op.close().unwrap();

        process_all_ongoings(&db, &ctx(&params, &map, 5)).unwrap();
        let mut inv = BuildingInventoriesTable::new(&db).get(100, "domob").unwrap();
        assert_eq!(inv.inventory().unwrap().count("bow bpo"), 1);
        assert_eq!(inv.inventory().unwrap().count("bow bpc"), 3);
    }

    #[test]
    fn test_busy_countdown() {
        let db = Database::new();
        let id = busy_character(&db, 3);
        process_busy(&db).unwrap();
        assert_eq!(CharactersTable::new(&db).require(id).unwrap().busy(), 2);
        process_busy(&db).unwrap();
        assert!(matches!(
            process_busy(&db),
            Err(GameError::InvariantViolation(_))
        ));
    }
}
