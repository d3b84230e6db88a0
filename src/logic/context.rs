//! Everything a block's state transition reads besides the database

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::core::config::GameParams;
use crate::core::types::Height;
use crate::map::BaseMap;

/// Metadata of the block being processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub height: Height,
    pub timestamp: i64,
    /// Stands in for the block hash; seeds all randomness of the block
    pub seed: u64,
}

/// Independent random streams, one per consumer within a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RngStream {
    Damage = 1,
    Prospecting = 2,
    Mining = 3,
}

pub struct Context<'a> {
    pub params: &'a GameParams,
    pub map: &'a dyn BaseMap,
    pub block: BlockContext,
}

impl<'a> Context<'a> {
    pub fn new(params: &'a GameParams, map: &'a dyn BaseMap, block: BlockContext) -> Self {
        Self { params, map, block }
    }

    pub fn height(&self) -> Height {
        self.block.height
    }

    /// Deterministic generator for one stream of this block
    pub fn rng(&self, stream: RngStream) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.block.seed);
        rng.set_stream(stream as u64);
        rng
    }
}
