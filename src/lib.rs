//! Hexrealm - deterministic state transition for a hex-grid world
//!
//! Each block applies queued damage, fires scheduled operations, applies
//! player moves, moves characters, mines and picks new targets, in that
//! order and inside one store transaction.

pub mod core;
pub mod hex;
pub mod logic;
pub mod map;
pub mod scenario;
pub mod store;

pub use crate::core::{Faction, GameError, GameParams, Height, IdT, Result};
pub use crate::hex::HexCoord;
pub use crate::logic::{process_block, BlockContext, BlockReport, Command, PlayerMove};
pub use crate::map::{BaseMap, OpenMap};
pub use crate::store::Database;
pub use crate::scenario::Scenario;
