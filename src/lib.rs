//! relaxa: distributed stencil relaxation with halo exchange
//!
//! This crate partitions a grid by rows across a group of workers (threads or MPI processes),
//! relaxes each worker's block with a fixed stencil, exchanges halo rows with a deadlock-free
//! parity schedule and stops once every worker is stable in the same generation.

pub mod parallel;

pub mod config;
pub mod context;
pub mod error;
pub mod grid;
pub mod halo;
pub mod report;
pub mod stencil;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use error::*;
pub use grid::*;
pub use halo::*;
pub use stencil::*;

// Re-export RelaxStats at the crate root for convenience
pub use utils::convergence::RelaxStats;
