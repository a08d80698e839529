pub mod options;

pub use options::{ExecutionMode, Layout, RelaxOptions, SweepOptions};
