//! Passive resource extraction

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::core::error::Result;
use crate::ensure_invariant;
use crate::logic::context::{Context, RngStream};
use crate::store::{CharacterHandle, CharactersTable, Database, RegionsTable};

/// Whether the character could start mining where it stands
pub fn can_start_mining(
    db: &Database,
    ctx: &Context<'_>,
    c: &mut CharacterHandle<'_>,
) -> Result<bool> {
    if c.busy() > 0 || c.is_moving()? {
        return Ok(false);
    }
    match c.data()?.mining {
        None => return Ok(false),
        Some(m) if m.active => return Ok(false),
        Some(_) => {}
    }
    let mut region = RegionsTable::new(db).get_by_id(ctx.map.region_id(&c.pos()))?;
    let left = region.resource_left();
    Ok(region.data()?.prospection.is_some() && left > 0)
}

fn set_mining_active(c: &mut CharacterHandle<'_>, active: bool) -> Result<()> {
    if let Some(m) = c.mutable_data()?.mining.as_mut() {
        m.active = active;
    }
    Ok(())
}

pub fn start_mining(c: &mut CharacterHandle<'_>) -> Result<()> {
    tracing::debug!("Character {} starts mining", c.id());
    set_mining_active(c, true)
}

/// Mine for one block; returns the amount extracted
///
/// Extraction is capped by the region's resources and the character's
/// free cargo space. Mining stops as soon as nothing can be extracted.
pub fn mine_character(
    db: &Database,
    ctx: &Context<'_>,
    c: &mut CharacterHandle<'_>,
    rng: &mut ChaCha8Rng,
) -> Result<u64> {
    let Some(mining) = c.data()?.mining else {
        return Ok(0);
    };
    ensure_invariant!(
        c.busy() == 0,
        "busy character {} is mining",
        c.id()
    );
    ensure_invariant!(
        mining.rate.min <= mining.rate.max,
        "character {} has invalid mining rate",
        c.id()
    );

    let mut region = RegionsTable::new(db).get_by_id(ctx.map.region_id(&c.pos()))?;
    let left = region.resource_left();
    let resource = region
        .data()?
        .prospection
        .as_ref()
        .map(|p| p.resource.clone());

    let amount = match &resource {
        None => 0,
        Some(resource) => {
            let rolled = rng.gen_range(mining.rate.min..=mining.rate.max);
            let fits = c.free_cargo_space(ctx.params)? / ctx.params.item_space(resource);
            rolled.min(left).min(fits)
        }
    };

    match resource {
        Some(resource) if amount > 0 => {
            c.mutable_data()?.inventory.add(&resource, amount);
            region.set_resource_left(left - amount);
            tracing::trace!("Character {} mined {} {}", c.id(), amount, resource);
        }
        _ => {
            tracing::debug!("Character {} stops mining", c.id());
            set_mining_active(c, false)?;
        }
    }
    region.close()?;
    Ok(amount)
}

pub fn process_all_mining(db: &Database, ctx: &Context<'_>) -> Result<u64> {
    let table = CharactersTable::new(db).with_slow_asserts(ctx.params.slow_asserts);
    let mut rng = ctx.rng(RngStream::Mining);
    let mut total = 0;
    for c in table.query_mining() {
        let mut c = c?;
        total += mine_character(db, ctx, &mut c, &mut rng)?;
        c.close()?;
    }
    Ok(total)
}
