//! Player commands
//!
//! Commands reach the engine already parsed and authenticated. Whether
//! they can be applied is only known here: a command that does not fit
//! the current state (moving a busy character, prospecting a taken
//! region) is skipped without failing the block.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::error::Result;
use crate::core::types::{Faction, IdT};
use crate::hex::HexCoord;
use crate::logic::context::Context;
use crate::logic::mining::{can_start_mining, start_mining};
use crate::logic::movement::stop_character;
use crate::logic::prospecting::{start_prospecting, stop_mining};
use crate::store::{
    AccountsTable, BuildingInventoriesTable, BuildingsTable, CharacterHandle, CharactersTable,
    Database, GroundLootTable, Inventory, Movement, OngoingOp, OngoingsTable, VolatileMovement,
};

/// Suffix of blueprint originals
pub const ORIGINAL_SUFFIX: &str = " bpo";
/// Suffix of blueprint copies
pub const COPY_SUFFIX: &str = " bpc";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Choose the account's faction
    InitAccount { faction: Faction },
    /// Replace the character's waypoints; an empty list stops it
    SetWaypoints {
        character: IdT,
        waypoints: Vec<HexCoord>,
    },
    PickUp {
        character: IdT,
        items: BTreeMap<String, u64>,
    },
    Drop {
        character: IdT,
        items: BTreeMap<String, u64>,
    },
    Prospect { character: IdT },
    Mine { character: IdT },
    RepairArmour { character: IdT },
    /// Copy a blueprint original held in a building
    CopyBlueprint {
        building: IdT,
        original: String,
        num_copies: u64,
    },
    /// Construct items from a blueprint original or copies
    ConstructItem {
        building: IdT,
        blueprint: String,
        num_items: u64,
    },
}

/// A command issued by a named account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerMove {
    pub name: String,
    pub command: Command,
}

impl PlayerMove {
    pub fn new(name: impl Into<String>, command: Command) -> Self {
        Self {
            name: name.into(),
            command,
        }
    }
}

// === CHARACTER COMMANDS ===

fn set_waypoints(c: &mut CharacterHandle<'_>, waypoints: &[HexCoord]) -> Result<bool> {
    if c.busy() > 0 {
        return Ok(false);
    }
    if waypoints.is_empty() {
        stop_character(c)?;
        return Ok(true);
    }
    stop_mining(c)?;
    c.mutable_data()?.movement = Some(Movement {
        waypoints: waypoints.iter().copied().collect(),
        steps: Default::default(),
    });
    *c.mutable_volatile_mv() = VolatileMovement::default();
    Ok(true)
}

fn pick_up(
    db: &Database,
    ctx: &Context<'_>,
    c: &mut CharacterHandle<'_>,
    items: &BTreeMap<String, u64>,
) -> Result<bool> {
    let mut loot = GroundLootTable::new(db).get_by_coord(c.pos())?;
    let mut changed = false;
    for (item, &wanted) in items {
        let available = loot.inventory()?.count(item);
        let fits = c.free_cargo_space(ctx.params)? / ctx.params.item_space(item);
        let amount = wanted.min(available).min(fits);
        if amount == 0 {
            continue;
        }
        loot.mutable_inventory()?.remove(item, amount)?;
        c.mutable_data()?.inventory.add(item, amount);
        changed = true;
        tracing::trace!("Character {} picked up {} {}", c.id(), amount, item);
    }
    loot.close()?;
    Ok(changed)
}

fn drop_items(
    db: &Database,
    c: &mut CharacterHandle<'_>,
    items: &BTreeMap<String, u64>,
) -> Result<bool> {
    let mut loot = GroundLootTable::new(db).get_by_coord(c.pos())?;
    let mut changed = false;
    for (item, &wanted) in items {
        let amount = wanted.min(c.data()?.inventory.count(item));
        if amount == 0 {
            continue;
        }
        c.mutable_data()?.inventory.remove(item, amount)?;
        loot.mutable_inventory()?.add(item, amount);
        changed = true;
        tracing::trace!("Character {} dropped {} {}", c.id(), amount, item);
    }
    loot.close()?;
    Ok(changed)
}

fn repair_armour(db: &Database, ctx: &Context<'_>, c: &mut CharacterHandle<'_>) -> Result<bool> {
    if c.busy() > 0 {
        return Ok(false);
    }
    let max = c.regen_data()?.max_hp.armour;
    let missing = max.saturating_sub(c.hp().armour);
    if missing == 0 {
        return Ok(false);
    }
    let per_block = ctx.params.armour_repair_hp_per_block;
    let duration = missing.div_ceil(per_block.max(1));
    let Some(target) = ctx.height().checked_add(u64::from(duration)) else {
        return Ok(false);
    };

    stop_character(c)?;
    stop_mining(c)?;
    let mut op = OngoingsTable::new(db).create_new(target)?;
    op.set_character_id(c.id());
    op.set_op(OngoingOp::ArmourRepair);
    c.mutable_data()?.ongoing = Some(op.id());
    c.set_busy(duration);
    op.close()?;
    tracing::debug!("Character {} repairs armour for {} blocks", c.id(), duration);
    Ok(true)
}

fn apply_character_command(
    db: &Database,
    ctx: &Context<'_>,
    name: &str,
    id: IdT,
    command: &Command,
) -> Result<bool> {
    let table = CharactersTable::new(db).with_slow_asserts(ctx.params.slow_asserts);
    let Some(mut c) = table.get_by_id(id)? else {
        return Ok(false);
    };
    if c.owner() != name {
        c.close()?;
        return Ok(false);
    }

    let applied = match command {
        Command::SetWaypoints { waypoints, .. } => set_waypoints(&mut c, waypoints)?,
        Command::PickUp { items, .. } => pick_up(db, ctx, &mut c, items)?,
        Command::Drop { items, .. } => drop_items(db, &mut c, items)?,
        Command::Prospect { .. } => c.busy() == 0 && start_prospecting(db, ctx, &mut c)?,
        Command::Mine { .. } => {
            if can_start_mining(db, ctx, &mut c)? {
                start_mining(&mut c)?;
                true
            } else {
                false
            }
        }
        Command::RepairArmour { .. } => repair_armour(db, ctx, &mut c)?,
        _ => false,
    };
    c.close()?;
    Ok(applied)
}

// === BUILDING COMMANDS ===

/// Take `per_unit` times `units` of every listed item, if all of it is
/// there; leaves the inventory untouched otherwise
fn take_costs(inv: &mut Inventory, per_unit: &BTreeMap<String, u64>, units: u64) -> Result<bool> {
    let mut total = Vec::with_capacity(per_unit.len());
    for (item, &n) in per_unit {
        let Some(needed) = n.checked_mul(units) else {
            return Ok(false);
        };
        if inv.count(item) < needed {
            return Ok(false);
        }
        total.push((item, needed));
    }
    for (item, needed) in total {
        inv.remove(item, needed)?;
    }
    Ok(true)
}

fn copy_blueprint(
    db: &Database,
    ctx: &Context<'_>,
    name: &str,
    building: IdT,
    original: &str,
    num_copies: u64,
) -> Result<bool> {
    let Some(base) = original.strip_suffix(ORIGINAL_SUFFIX) else {
        return Ok(false);
    };
    if num_copies == 0 || !BuildingsTable::new(db).exists(building) {
        return Ok(false);
    }
    let Some(target) = ctx
        .params
        .blueprint_copy_blocks.checked_mul(num_copies)
        .and_then(|d| ctx.height().checked_add(d))
    else {
        return Ok(false);
    };

    let mut inv = BuildingInventoriesTable::new(db).get(building, name)?;
    if inv.inventory()?.count(original) == 0 {
        inv.close()?;
        return Ok(false);
    }
    let mut items = inv.inventory()?.clone();
    if !take_costs(&mut items, &ctx.params.blueprint_copy_cost, num_copies)? {
        inv.close()?;
        return Ok(false);
    }
    items.remove(original, 1)?;
    *inv.mutable_inventory()? = items;
    inv.close()?;

    let mut op = OngoingsTable::new(db).create_new(target)?;
    op.set_building_id(building);
    op.set_op(OngoingOp::BlueprintCopy {
        account: name.to_string(),
        original_type: original.to_string(),
        copy_type: format!("{}{}", base, COPY_SUFFIX),
        num_copies,
    });
    tracing::debug!(
        "{} copies {} x {} in building {} until {}",
        name,
        num_copies,
        original,
        building,
        op.height()
    );
    op.close()?;
    Ok(true)
}

fn construct_item(
    db: &Database,
    ctx: &Context<'_>,
    name: &str,
    building: IdT,
    blueprint: &str,
    num_items: u64,
) -> Result<bool> {
    let (output, from_original) = if let Some(base) = blueprint.strip_suffix(ORIGINAL_SUFFIX) {
        (base, true)
    } else if let Some(base) = blueprint.strip_suffix(COPY_SUFFIX) {
        (base, false)
    } else {
        return Ok(false);
    };
    if num_items == 0 || !BuildingsTable::new(db).exists(building) {
        return Ok(false);
    }
    let Some(target) = ctx
        .params
        .construction_blocks.checked_mul(num_items)
        .and_then(|d| ctx.height().checked_add(d))
    else {
        return Ok(false);
    };

    let mut inv = BuildingInventoriesTable::new(db).get(building, name)?;
    let blueprints_needed = if from_original { 1 } else { num_items };
    let mut items = inv.inventory()?.clone();
    let recipe = ctx
        .params
        .construction_recipes
        .get(output)
        .cloned()
        .unwrap_or_default();
    if items.count(blueprint) < blueprints_needed || !take_costs(&mut items, &recipe, num_items)? {
        inv.close()?;
        return Ok(false);
    }
    items.remove(blueprint, blueprints_needed)?;
    *inv.mutable_inventory()? = items;
    inv.close()?;

    let mut op = OngoingsTable::new(db).create_new(target)?;
    op.set_building_id(building);
    op.set_op(OngoingOp::ItemConstruction {
        account: name.to_string(),
        output_type: output.to_string(),
        num_items,
        original_type: from_original.then(|| blueprint.to_string()),
    });
    tracing::debug!(
        "{} constructs {} x {} in building {} until {}",
        name,
        num_items,
        output,
        building,
        op.height()
    );
    op.close()?;
    Ok(true)
}

// === DISPATCH ===

/// Apply one move; returns false if it was ignored
pub fn apply_move(db: &Database, ctx: &Context<'_>, mv: &PlayerMove) -> Result<bool> {
    let name = mv.name.as_str();
    match &mv.command {
        Command::InitAccount { faction } => {
            let accounts = AccountsTable::new(db, ctx.params.initial_fame);
            let mut a = accounts.get_by_name(name)?;
            if a.is_initialised() {
                a.close()?;
                return Ok(false);
            }
            a.initialise(*faction)?;
            a.close()?;
            tracing::debug!("Account {} joins faction {}", name, faction);
            Ok(true)
        }
        Command::SetWaypoints { character, .. }
        | Command::PickUp { character, .. }
        | Command::Drop { character, .. }
        | Command::Prospect { character }
        | Command::Mine { character }
        | Command::RepairArmour { character } => {
            apply_character_command(db, ctx, name, *character, &mv.command)
        }
        Command::CopyBlueprint {
            building,
            original,
            num_copies,
        } => copy_blueprint(db, ctx, name, *building, original, *num_copies),
        Command::ConstructItem {
            building,
            blueprint,
            num_items,
        } => construct_item(db, ctx, name, *building, blueprint, *num_items),
    }
}

/// Apply all moves in order; returns how many were ignored
pub fn apply_all_moves(db: &Database, ctx: &Context<'_>, moves: &[PlayerMove]) -> Result<usize> {
    let mut ignored = 0;
    for mv in moves {
        if !apply_move(db, ctx, mv)? {
            tracing::debug!("Ignoring inapplicable move of {}: {:?}", mv.name, mv.command);
            ignored += 1;
        }
    }
    Ok(ignored)
}
