//! Fame bookkeeping on kills
//!
//! The scoring itself is game policy behind [`FameUpdater`]; the combat
//! code only decides which attackers are credited and when.

use std::collections::BTreeSet;

use crate::core::config::GameParams;
use crate::core::error::{GameError, Result};
use crate::core::types::{EntityKind, IdT};
use crate::store::{AccountsTable, CharactersTable, Database};

pub trait FameUpdater {
    /// Called once per killed character, while all victims of the block
    /// and their attackers are still in the database
    fn update_for_kill(
        &mut self,
        db: &Database,
        victim: IdT,
        attackers: &BTreeSet<IdT>,
    ) -> Result<()>;
}

/// Every credited attacker account gains a kill and a fixed amount of
/// fame; the victim's account loses the same total
#[derive(Debug, Clone)]
pub struct FameTransfer {
    fame_per_kill: i64,
    initial_fame: i64,
}

impl FameTransfer {
    pub fn new(params: &GameParams) -> Self {
        Self {
            fame_per_kill: params.fame_per_kill,
            initial_fame: params.initial_fame,
        }
    }
}

impl FameUpdater for FameTransfer {
    fn update_for_kill(
        &mut self,
        db: &Database,
        victim: IdT,
        attackers: &BTreeSet<IdT>,
    ) -> Result<()> {
        let characters = CharactersTable::new(db);
        let victim_owner = characters.owner_of(victim).ok_or(GameError::EntityNotFound {
            kind: EntityKind::Character,
            id: victim,
        })?;

        // Several characters of one account earn it a single kill
        let credited: BTreeSet<String> = attackers
            .iter()
            .filter_map(|&id| characters.owner_of(id))
            .filter(|owner| *owner != victim_owner)
            .collect();
        if credited.is_empty() {
            return Ok(());
        }

        let accounts = AccountsTable::new(db, self.initial_fame);
        for name in &credited {
            let mut a = accounts.get_by_name(name)?;
            a.add_kill();
            let fame = a.fame() + self.fame_per_kill;
            a.set_fame(fame);
            a.close()?;
        }

        let loss = self.fame_per_kill * credited.len() as i64;
        let mut v = accounts.get_by_name(&victim_owner)?;
        let fame = (v.fame() - loss).max(0);
        v.set_fame(fame);
        v.close()?;

        tracing::debug!(
            "Fame for killing character {} of {} credited to {:?}",
            victim,
            victim_owner,
            credited
        );
        Ok(())
    }
}
