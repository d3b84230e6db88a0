//! Per-block character movement
//!
//! Characters travel along planned steps towards their next waypoint.
//! Each block adds the character's speed to its partial step; a step is
//! taken whenever the accumulated budget covers the edge weight. Steps
//! are planned lazily, when none are left but waypoints remain.

use crate::core::error::Result;
use crate::core::types::Faction;
use crate::hex::{DistanceT, HexCoord, PathFinder};
use crate::logic::context::Context;
use crate::logic::obstacles::DynObstacles;
use crate::map::BaseMap;
use crate::store::{CharacterHandle, CharactersTable, Database, Movement, VolatileMovement};

/// Edge weight for path planning: the base weight, unless the target
/// tile is held by another faction
pub fn movement_edge_weight(
    map: &dyn BaseMap,
    obstacles: &DynObstacles,
    faction: Faction,
    from: &HexCoord,
    to: &HexCoord,
) -> Option<DistanceT> {
    if obstacles.is_blocked(to, faction) {
        return None;
    }
    map.edge_weight(from, to)
}

/// How a character's movement for the block ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Still travelling; budget carried over to the next block
    Waiting,
    /// Next tile is held by another faction
    Blocked,
    /// Reached the last waypoint
    Finished,
    /// Gave up: unreachable waypoint or lost connection
    Abandoned,
}

/// Clear all movement of a character, if it has any
pub fn stop_character(c: &mut CharacterHandle<'_>) -> Result<()> {
    if c.is_moving()? {
        c.mutable_data()?.movement = None;
    }
    if *c.volatile_mv() != VolatileMovement::default() {
        *c.mutable_volatile_mv() = VolatileMovement::default();
    }
    Ok(())
}

/// Move one character for this block
///
/// The payload is only written if the movement actually changed, so a
/// character accumulating partial steps costs a scalar update only.
pub fn process_character_movement(
    c: &mut CharacterHandle<'_>,
    ctx: &Context<'_>,
    obstacles: &mut DynObstacles,
) -> Result<StepOutcome> {
    let (speed, original) = {
        let data = c.data()?;
        (data.speed, data.movement.clone())
    };
    let Some(mut mv) = original.clone() else {
        return Ok(StepOutcome::Finished);
    };

    let faction = c.faction();
    let start = c.pos();
    let mut pos = start;
    let mut vol = *c.volatile_mv();
    vol.partial_step = vol.partial_step.saturating_add(speed);
    let max_distance = ctx.params.max_waypoint_distance;

    let outcome = loop {
        if mv.steps.is_empty() {
            while mv.waypoints.front() == Some(&pos) {
                mv.waypoints.pop_front();
            }
            let Some(&waypoint) = mv.waypoints.front() else {
                break StepOutcome::Finished;
            };
            if pos.distance_l1(&waypoint) > max_distance {
                tracing::debug!("Character {}: waypoint {} too far", c.id(), waypoint);
                break StepOutcome::Abandoned;
            }
            let finder = PathFinder::new(waypoint, max_distance);
            let current: &DynObstacles = obstacles;
            let path = finder.find(pos, |from, to| {
                movement_edge_weight(ctx.map, current, faction, from, to)
            });
            match path {
                Some(path) => mv.steps = path.steps.into(),
                None => {
                    tracing::debug!("Character {}: no path to {}", c.id(), waypoint);
                    break StepOutcome::Abandoned;
                }
            }
        }

        let Some(&next) = mv.steps.front() else {
            break StepOutcome::Finished;
        };
        let Some(cost) = ctx.map.edge_weight(&pos, &next) else {
            tracing::debug!("Character {}: step {} -> {} disconnected", c.id(), pos, next);
            break StepOutcome::Abandoned;
        };
        if obstacles.is_blocked(&next, faction) {
            break StepOutcome::Blocked;
        }
        if vol.partial_step < cost {
            break StepOutcome::Waiting;
        }

        vol.partial_step -= cost;
        vol.blocked_turns = 0;
        obstacles.vacate(pos, faction);
        obstacles.occupy(next, faction);
        pos = next;
        mv.steps.pop_front();
        tracing::trace!("Character {} stepped to {}", c.id(), pos);
    };

    let outcome = match outcome {
        StepOutcome::Blocked => {
            vol.partial_step = 0;
            vol.blocked_turns += 1;
            if vol.blocked_turns >= ctx.params.blocked_step_retries {
                tracing::debug!("Character {}: blocked too long, stopping", c.id());
                StepOutcome::Abandoned
            } else {
                StepOutcome::Blocked
            }
        }
        other => other,
    };

    let movement: Option<Movement> = match outcome {
        StepOutcome::Finished | StepOutcome::Abandoned => {
            vol = VolatileMovement::default();
            None
        }
        StepOutcome::Waiting | StepOutcome::Blocked => Some(mv),
    };

    if movement != original {
        c.mutable_data()?.movement = movement;
    }
    if pos != start {
        c.set_pos(pos);
    }
    if vol != *c.volatile_mv() {
        *c.mutable_volatile_mv() = vol;
    }
    Ok(outcome)
}

/// Move all moving characters, by ascending id
///
/// Returns the number of characters that changed position.
pub fn process_all_movement(
    db: &Database,
    ctx: &Context<'_>,
    obstacles: &mut DynObstacles,
) -> Result<usize> {
    let table = CharactersTable::new(db).with_slow_asserts(ctx.params.slow_asserts);
    let mut moved = 0;
    for c in table.query_moving() {
        let mut c = c?;
        let before = c.pos();
        process_character_movement(&mut c, ctx, obstacles)?;
        if c.pos() != before {
            moved += 1;
        }
        c.close()?;
    }
    tracing::debug!("Movement: {} characters changed position", moved);
    Ok(moved)
}
