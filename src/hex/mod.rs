//! Hex grid geometry and pathfinding

pub mod coord;
pub mod pathfinder;

pub use coord::{HexCoord, IntT};
pub use pathfinder::{DistanceT, Path, PathFinder};
