pub mod convergence;

pub use convergence::{Convergence, RelaxStats, Verdict};
