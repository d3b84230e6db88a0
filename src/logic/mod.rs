//! Game rules: the phases of the per-block state transition

pub mod combat;
pub mod commands;
pub mod context;
pub mod fame;
pub mod mining;
pub mod movement;
pub mod obstacles;
pub mod ongoings;
pub mod pipeline;
pub mod prospecting;
pub mod regen;
pub mod validate;

pub use commands::{Command, PlayerMove};
pub use context::{BlockContext, Context, RngStream};
pub use fame::{FameTransfer, FameUpdater};
pub use obstacles::DynObstacles;
pub use ongoings::FiredOperation;
pub use pipeline::{process_block, BlockReport};
pub use validate::validate_state_slow;
