//! Entity store: lazily loaded, dirty-tracked handles over the backing
//! database
//!
//! Every table hands out handles that exclusively own a copy of one
//! entity. Changes are written back when the handle is closed (or
//! dropped), choosing the cheapest write that captures them.

pub mod account;
pub mod building;
pub mod character;
pub mod damage_lists;
pub mod database;
pub mod holdings;
pub mod inventory;
pub mod lazy;
pub mod ongoing;
pub mod prizes;
pub mod region;

pub use account::{AccountHandle, AccountsTable};
pub use building::{BuildingHandle, BuildingsTable};
pub use character::{
    Attack, CharacterData, CharacterHandle, CharacterPosition, CharactersTable, CombatData,
    HitPoints, MaxHitPoints, Mining, MiningRate, Movement, RegenData, VolatileMovement,
};
pub use damage_lists::DamageLists;
pub use database::{Cursor, Database, WriteStats};
pub use holdings::{
    BuildingInventoriesTable, BuildingInventoryHandle, GroundLootHandle, GroundLootTable,
};
pub use inventory::{Inventory, Quantity};
pub use lazy::{Blob, LazyPayload};
pub use ongoing::{OngoingHandle, OngoingOp, OngoingsTable};
pub use prizes::Prizes;
pub use region::{Prospection, RegionData, RegionHandle, RegionsTable};
