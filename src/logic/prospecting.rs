//! Prospecting regions for resources and prizes

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::core::config::GameParams;
use crate::core::error::{GameError, Result};
use crate::core::types::Height;
use crate::ensure_invariant;
use crate::logic::context::Context;
use crate::logic::movement::stop_character;
use crate::store::{
    CharacterHandle, Database, OngoingOp, OngoingsTable, Prizes, Prospection, RegionHandle,
    RegionsTable,
};

/// Whether the region may be prospected at `height`
///
/// A region is free unless someone is prospecting it. Once prospected,
/// it stays taken until its resource is used up and the result has
/// expired.
pub fn can_prospect_region(
    region: &mut RegionHandle<'_>,
    params: &GameParams,
    height: Height,
) -> Result<bool> {
    let resource_left = region.resource_left();
    let data = region.data()?;
    if data.prospecting_character.is_some() {
        return Ok(false);
    }
    match &data.prospection {
        None => Ok(true),
        Some(p) => {
            let expiry = p.height.saturating_add(params.prospection_expiry_blocks);
            Ok(resource_left == 0 && height >= expiry)
        }
    }
}

/// Stop mining, if the character is
pub fn stop_mining(c: &mut CharacterHandle<'_>) -> Result<()> {
    let active = c.data()?.mining.map_or(false, |m| m.active);
    if active {
        if let Some(m) = c.mutable_data()?.mining.as_mut() {
            m.active = false;
        }
    }
    Ok(())
}

/// Start prospecting the character's current region
///
/// Returns false without changing anything if the region cannot be
/// prospected right now.
pub fn start_prospecting(
    db: &Database,
    ctx: &Context<'_>,
    c: &mut CharacterHandle<'_>,
) -> Result<bool> {
    let duration = ctx.params.prospecting_blocks;
    let (Some(target), Ok(busy)) = (ctx.height().checked_add(duration), u32::try_from(duration))
    else {
        tracing::debug!("Prospecting for {} blocks is out of range", duration);
        return Ok(false);
    };

    let region_id = ctx.map.region_id(&c.pos());
    let mut region = RegionsTable::new(db).get_by_id(region_id)?;
    if !can_prospect_region(&mut region, ctx.params, ctx.height())? {
        tracing::debug!("Region {} cannot be prospected by {}", region_id, c.id());
        return Ok(false);
    }

    stop_character(c)?;
    stop_mining(c)?;

    let data = region.mutable_data()?;
    data.prospecting_character = Some(c.id());
    data.prospection = None;
    region.set_resource_left(0);
    region.close()?;

    let mut op = OngoingsTable::new(db).create_new(target)?;
    op.set_character_id(c.id());
    op.set_op(OngoingOp::Prospection);
    c.mutable_data()?.ongoing = Some(op.id());
    c.set_busy(busy);
    tracing::debug!(
        "Character {} starts prospecting region {} until {}",
        c.id(),
        region_id,
        op.height()
    );
    op.close()?;
    Ok(true)
}

/// Weighted choice of the resource type and its amount
fn pick_resource(params: &GameParams, rng: &mut ChaCha8Rng) -> Result<(String, u64)> {
    let total: u32 = params.resources.iter().map(|r| r.weight).sum();
    ensure_invariant!(total > 0, "no resources configured");
    let mut roll = rng.gen_range(0..total);
    for r in &params.resources {
        if roll < r.weight {
            let amount = rng.gen_range(r.min_amount..=r.max_amount);
            return Ok((r.name.clone(), amount));
        }
        roll -= r.weight;
    }
    Err(GameError::invariant("resource roll out of range"))
}

/// Draw the prize tiers in order; at most one prize per prospection
fn pick_prize(db: &Database, ctx: &Context<'_>, rng: &mut ChaCha8Rng) -> Option<String> {
    if ctx.block.timestamp >= ctx.params.competition_end_timestamp {
        return None;
    }
    let prizes = Prizes::new(db);
    for p in &ctx.params.prizes {
        if prizes.get_found(&p.name) >= p.number {
            continue;
        }
        if rng.gen_range(0..p.probability) == 0 {
            prizes.increment_found(&p.name);
            return Some(p.name.clone());
        }
    }
    None
}

/// Complete the prospection of the character's region
///
/// Returns the prize found, if any.
pub fn finish_prospecting(
    db: &Database,
    ctx: &Context<'_>,
    c: &mut CharacterHandle<'_>,
    rng: &mut ChaCha8Rng,
) -> Result<Option<String>> {
    let region_id = ctx.map.region_id(&c.pos());
    let mut region = RegionsTable::new(db).get_by_id(region_id)?;
    ensure_invariant!(
        region.data()?.prospecting_character == Some(c.id()),
        "character {} finishes prospecting region {} it does not hold",
        c.id(),
        region_id
    );

    let (resource, amount) = pick_resource(ctx.params, rng)?;
    let prize = pick_prize(db, ctx, rng);
    if let Some(p) = &prize {
        tracing::info!("Character {} found a {} prize", c.id(), p);
        c.mutable_data()?.inventory.add(&format!("{} prize", p), 1);
    }

    let data = region.mutable_data()?;
    data.prospecting_character = None;
    data.prospection = Some(Prospection {
        name: c.owner().to_string(),
        height: ctx.height(),
        resource: resource.clone(),
        prize: prize.clone(),
    });
    region.set_resource_left(amount);
    region.close()?;

    tracing::debug!(
        "Region {} prospected by {}: {} x {}",
        region_id,
        c.id(),
        amount,
        resource
    );
    Ok(prize)
}
