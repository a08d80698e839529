//! Grid decomposition: row partitions and the local blocks built from them.

pub mod block;
pub mod partition;

pub use block::{Block, BlockPair, HeatSource};
pub use partition::{HaloEdges, Partition};
