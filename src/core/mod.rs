pub mod config;
pub mod error;
pub mod types;

pub use config::{GameParams, PrizeConfig, ResourceConfig};
pub use error::{GameError, Result};
pub use types::{EntityKind, Faction, Height, IdT, EMPTY_ID};
