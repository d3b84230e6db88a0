//! Targeting, damage and kills
//!
//! Targets are chosen at the end of a block from post-movement positions.
//! The damage against them is dealt at the start of the next block, and
//! all resulting kills are resolved before anything else happens.

use rand::Rng;
use std::collections::BTreeSet;

use crate::core::error::Result;
use crate::core::types::IdT;
use crate::ensure_invariant;
use crate::logic::context::{Context, RngStream};
use crate::logic::fame::FameUpdater;
use crate::store::{
    CharacterHandle, CharactersTable, DamageLists, Database, GroundLootTable, OngoingsTable,
    RegionsTable,
};

// === TARGETING ===

/// Pick the closest character of another faction within range for every
/// character with attacks; ties go to the lowest id
pub fn find_targets(db: &Database, ctx: &Context<'_>) -> Result<()> {
    let table = CharactersTable::new(db).with_slow_asserts(ctx.params.slow_asserts);
    let positions = table.positions();

    for (me, range) in table.attackers() {
        let best = positions
            .iter()
            .filter(|p| p.faction != me.faction)
            .map(|p| (p.pos.distance_l1(&me.pos), p.id))
            .filter(|&(dist, _)| dist <= range)
            .min()
            .map(|(_, id)| id);

        let mut c = table.require(me.id)?;
        if c.data()?.target != best {
            tracing::trace!("Character {} now targets {:?}", me.id, best);
            c.mutable_data()?.target = best;
        }
        c.close()?;
    }

    // Characters that lost all their attacks drop their target
    for c in table.query_with_target() {
        let mut c = c?;
        if c.attack_range()?.is_none() {
            c.mutable_data()?.target = None;
        }
        c.close()?;
    }
    Ok(())
}

// === DAMAGE ===

/// Apply `dmg` to the target's shield first and then its armour;
/// returns whether the target is dead afterwards
fn apply_damage(target: &mut CharacterHandle<'_>, dmg: u32) -> bool {
    let hp = target.mutable_hp();
    let to_shield = dmg.min(hp.shield);
    hp.shield -= to_shield;
    if hp.shield == 0 {
        hp.mhp_shield = 0;
    }
    hp.armour = hp.armour.saturating_sub(dmg - to_shield);
    hp.is_dead()
}

/// Deal the damage of all targets chosen in the previous block
///
/// Returns the ids of killed characters.
pub fn deal_damage(
    db: &Database,
    ctx: &Context<'_>,
    damage_lists: &DamageLists<'_>,
) -> Result<BTreeSet<IdT>> {
    let table = CharactersTable::new(db).with_slow_asserts(ctx.params.slow_asserts);
    let mut rng = ctx.rng(RngStream::Damage);
    let mut kills = BTreeSet::new();

    for attacker in table.query_with_target() {
        let mut attacker = attacker?;
        let (target_id, attacks) = {
            let data = attacker.data()?;
            (data.target, data.combat.attacks.clone())
        };
        let pos = attacker.pos();
        let attacker_id = attacker.id();
        attacker.close()?;

        let Some(target_id) = target_id else {
            continue;
        };
        let Some(mut target) = table.get_by_id(target_id)? else {
            continue;
        };

        let dist = pos.distance_l1(&target.pos());
        let mut dmg: u32 = 0;
        for a in attacks.iter().filter(|a| a.range >= dist) {
            ensure_invariant!(
                a.min_damage <= a.max_damage,
                "character {} has attack with min damage above max",
                attacker_id
            );
            dmg = dmg.saturating_add(rng.gen_range(a.min_damage..=a.max_damage));
        }
        if dmg == 0 {
            target.close()?;
            continue;
        }

        tracing::trace!("Character {} deals {} damage to {}", attacker_id, dmg, target_id);
        damage_lists.add_entry(target_id, attacker_id);
        if apply_damage(&mut target, dmg) && kills.insert(target_id) {
            tracing::debug!("Character {} killed by {}", target_id, attacker_id);
        }
        target.close()?;
    }
    Ok(kills)
}

// === KILLS ===

/// Resolve all kills of the block in id order
///
/// Fame is settled for every victim first, so that characters killing
/// each other are both credited.
pub fn process_kills(
    db: &Database,
    ctx: &Context<'_>,
    damage_lists: &DamageLists<'_>,
    fame: &mut dyn FameUpdater,
    kills: &BTreeSet<IdT>,
) -> Result<()> {
    for &victim in kills {
        let attackers = damage_lists.get_attackers(victim);
        fame.update_for_kill(db, victim, &attackers)?;
    }

    let characters = CharactersTable::new(db).with_slow_asserts(ctx.params.slow_asserts);
    let loot = GroundLootTable::new(db);
    let regions = RegionsTable::new(db);
    let ongoings = OngoingsTable::new(db);

    for &victim in kills {
        let mut c = characters.require(victim)?;
        let pos = c.pos();
        let inventory = c.data()?.inventory.clone();
        c.close()?;

        if !inventory.is_empty() {
            let mut l = loot.get_by_coord(pos)?;
            l.mutable_inventory()?.merge(&inventory);
            l.close()?;
        }

        let mut r = regions.get_by_id(ctx.map.region_id(&pos))?;
        if r.data()?.prospecting_character == Some(victim) {
            tracing::debug!("Region {} released by killed character {}", r.id(), victim);
            r.mutable_data()?.prospecting_character = None;
        }
        r.close()?;

        for op in ongoings.ids_for_character(victim) {
            ongoings.delete_by_id(op)?;
        }
        damage_lists.remove_character(victim);
        characters.delete_by_id(victim)?;
        tracing::info!("Character {} was killed at {}", victim, pos);
    }
    Ok(())
}
