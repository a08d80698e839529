//! Run contexts for distributed relaxation.
//!
//! Modules:
//! - [`relax_context`]: `RelaxContext`, the per-worker driver of one run, together with the
//!   `run_relaxation` entry point and `gather_grid` for assembling the final grid.
//!
//! # Example
//! ```rust
//! use relaxa::config::RelaxOptions;
//! use relaxa::context::run_relaxation;
//! use relaxa::parallel::run_threads;
//!
//! let options = RelaxOptions { n: 40, ..Default::default() };
//! let outcomes = run_threads(2, |comm| run_relaxation(&comm, &options));
//! let first = outcomes[0].as_ref().unwrap();
//! assert!(first.stats.converged);
//! ```

pub mod relax_context;
pub use relax_context::{gather_grid, run_relaxation, RelaxContext, RelaxOutcome};
