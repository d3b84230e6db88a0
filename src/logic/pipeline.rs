//! Per-block state transition
//!
//! The phases run in a fixed order inside one database transaction. A
//! failing phase rolls the whole block back.

use serde::Serialize;

use crate::core::config::GameParams;
use crate::core::error::Result;
use crate::core::types::{Height, IdT};
use crate::logic::combat::{deal_damage, find_targets, process_kills};
use crate::logic::commands::{apply_all_moves, PlayerMove};
use crate::logic::context::{BlockContext, Context};
use crate::logic::fame::FameUpdater;
use crate::logic::mining::process_all_mining;
use crate::logic::movement::process_all_movement;
use crate::logic::obstacles::DynObstacles;
use crate::logic::ongoings::{process_all_ongoings, process_busy, FiredOperation};
use crate::logic::regen::regenerate_all;
use crate::logic::validate::validate_state_slow;
use crate::map::BaseMap;
use crate::store::{CharactersTable, DamageLists, Database};

/// What happened in one block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockReport {
    pub height: Height,
    /// Characters killed by damage from the previous block's targets
    pub kills: Vec<IdT>,
    pub operations_fired: Vec<FiredOperation>,
    /// Prizes found by completed prospections
    pub prizes: Vec<String>,
    pub commands_ignored: usize,
    pub characters_moved: usize,
    /// Total amount mined over all characters
    pub mined: u64,
}

fn run_phases(
    db: &Database,
    ctx: &Context<'_>,
    moves: &[PlayerMove],
    fame: &mut dyn FameUpdater,
) -> Result<BlockReport> {
    let mut report = BlockReport {
        height: ctx.height(),
        ..Default::default()
    };

    // Damage and kills
    let damage_lists = DamageLists::new(db, ctx.height(), ctx.params.damage_list_blocks);
    damage_lists.remove_old();
    let kills = deal_damage(db, ctx, &damage_lists)?;
    process_kills(db, ctx, &damage_lists, fame, &kills)?;
    report.kills = kills.into_iter().collect();
    regenerate_all(db, ctx)?;

    // Scheduled operations
    report.operations_fired = process_all_ongoings(db, ctx)?;
    report.prizes = report
        .operations_fired
        .iter()
        .filter_map(|f| f.prize.clone())
        .collect();
    process_busy(db)?;

    report.commands_ignored = apply_all_moves(db, ctx, moves)?;

    let positions = CharactersTable::new(db).positions();
    let mut obstacles = DynObstacles::from_positions(&positions);
    report.characters_moved = process_all_movement(db, ctx, &mut obstacles)?;

    report.mined = process_all_mining(db, ctx)?;

    find_targets(db, ctx)?;

    if ctx.params.slow_asserts {
        validate_state_slow(db, ctx.params)?;
    }
    Ok(report)
}

/// Process one block of moves on top of the current state
///
/// Either every phase succeeds and its writes are kept, or the database
/// is left exactly as it was.
pub fn process_block(
    db: &Database,
    params: &GameParams,
    map: &dyn BaseMap,
    block: BlockContext,
    moves: &[PlayerMove],
    fame: &mut dyn FameUpdater,
) -> Result<BlockReport> {
    let ctx = Context::new(params, map, block);
    let report = db.transaction(|db| run_phases(db, &ctx, moves, fame))?;
    tracing::debug!(
        "Block {}: {} kills, {} operations, {} moved, {} ignored moves",
        report.height,
        report.kills.len(),
        report.operations_fired.len(),
        report.characters_moved,
        report.commands_ignored
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Faction;
    use crate::hex::HexCoord;
    use crate::logic::commands::Command;
    use crate::logic::fame::FameTransfer;
    use crate::map::OpenMap;
    use crate::store::AccountsTable;

    fn block(height: Height) -> BlockContext {
        BlockContext {
            height,
            timestamp: 0,
            seed: 42,
        }
    }

    fn setup() -> (Database, GameParams, OpenMap, IdT) {
        let db = Database::new();
        let params = GameParams::default();
        let mut a = AccountsTable::new(&db, params.initial_fame)
            .get_by_name("domob")
            .unwrap();
        a.initialise(Faction::Red).unwrap();
        a.close().unwrap();
        let mut c = CharactersTable::new(&db)
            .create_new("domob", Faction::Red)
            .unwrap();
        c.mutable_data().unwrap().speed = 1000;
        let id = c.id();
        c.close().unwrap();
        (db, params, OpenMap::default(), id)
    }

    #[test]
    fn test_block_moves_character() {
        let (db, params, map, id) = setup();
        let mut fame = FameTransfer::new(&params);
        let moves = vec![PlayerMove::new(
            "domob",
            Command::SetWaypoints {
                character: id,
                waypoints: vec![HexCoord::new(2, 0)],
            },
        )];
        let report = process_block(&db, &params, &map, block(1), &moves, &mut fame).unwrap();
        assert_eq!(report.characters_moved, 1);
        assert_eq!(report.commands_ignored, 0);

        process_block(&db, &params, &map, block(2), &[], &mut fame).unwrap();
        let mut c = CharactersTable::new(&db).require(id).unwrap();
        assert_eq!(c.pos(), HexCoord::new(2, 0));
        assert!(!c.is_moving().unwrap());
        assert_eq!(db.open_handle_count(), 1);
    }

    #[test]
    fn test_failed_block_leaves_no_writes() {
        let (db, params, map, id) = setup();
        {
            let mut c = CharactersTable::new(&db).require(id).unwrap();
            // Busy 1 without an operation is caught after operations fire
            c.set_busy(1);
        }
        let before = db.dump().unwrap();
        let mut fame = FameTransfer::new(&params);
        let moves = vec![PlayerMove::new(
            "domob",
            Command::InitAccount {
                faction: Faction::Blue,
            },
        )];
        assert!(process_block(&db, &params, &map, block(1), &moves, &mut fame).is_err());
        assert_eq!(db.dump().unwrap(), before);
        assert!(!db.in_transaction());
    }
}
