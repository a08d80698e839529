//! Command-line or API options for relaxation runs.
//!
//! `RelaxOptions` describes one run: problem size, heat value, convergence epsilon, grid
//! layout and how each worker executes its kernel. `SweepOptions` describes an experiment
//! sweep over growing problem sizes. The worker count is not configured here; it comes from
//! the launch environment (MPI world size or the thread group size).

use crate::error::RelaxError;
use crate::grid::HeatSource;
use crate::stencil::Execution;

/// Shape of the global grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// `n × n` grid relaxed with the five-point rule; heat at row 0, column `n / 2`.
    Plane,
    /// Line of `n` cells relaxed with the three-point rule; heat at cell 0.
    Line,
}

impl Layout {
    /// Values per grid row.
    pub fn width(&self, n: usize) -> usize {
        match self {
            Layout::Plane => n,
            Layout::Line => 1,
        }
    }

    pub fn heat_source(&self, n: usize, value: f64) -> HeatSource {
        match self {
            Layout::Plane => HeatSource { row: 0, col: n / 2, value },
            Layout::Line => HeatSource { row: 0, col: 0, value },
        }
    }

    /// Size of the global grid in whole MiB.
    pub fn size_mb(&self, n: usize) -> usize {
        n * self.width(n) * std::mem::size_of::<f64>() / (1024 * 1024)
    }
}

/// Kernel execution inside one worker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Serial,
    /// Row-parallel kernel; `None` splits the machine's cores between co-located workers.
    Parallel { threads: Option<usize> },
}

impl ExecutionMode {
    pub fn build(&self, workers: usize) -> Result<Execution, RelaxError> {
        match *self {
            ExecutionMode::Serial => Ok(Execution::Serial),
            #[cfg(feature = "rayon")]
            ExecutionMode::Parallel { threads: Some(t) } => Execution::parallel(t),
            #[cfg(feature = "rayon")]
            ExecutionMode::Parallel { threads: None } => Execution::parallel_for_workers(workers),
            #[cfg(not(feature = "rayon"))]
            ExecutionMode::Parallel { .. } => {
                let _ = workers;
                Err(RelaxError::InvalidConfig(
                    "parallel kernels need the `rayon` feature".to_string(),
                ))
            }
        }
    }
}

/// Parameters of one relaxation run.
#[derive(Clone, Debug, PartialEq)]
pub struct RelaxOptions {
    /// Global dimension (rows of the grid; also columns for [`Layout::Plane`]).
    pub n: usize,
    /// Value seeded at the heat source.
    pub heat: f64,
    /// Largest per-cell change still considered stable.
    pub eps: f64,
    pub layout: Layout,
    pub execution: ExecutionMode,
    /// Optional cap on generations; `None` runs until convergence.
    pub max_generations: Option<usize>,
}

impl Default for RelaxOptions {
    fn default() -> Self {
        RelaxOptions {
            n: 100,
            heat: 400.0,
            eps: 0.05,
            layout: Layout::Plane,
            execution: ExecutionMode::Serial,
            max_generations: None,
        }
    }
}

impl RelaxOptions {
    /// Defaults of the 1-D line experiments.
    pub fn line(n: usize) -> Self {
        RelaxOptions { n, heat: 100.0, eps: 0.1, layout: Layout::Line, ..Default::default() }
    }

    pub fn with_n(&self, n: usize) -> Self {
        RelaxOptions { n, ..self.clone() }
    }

    pub fn validate(&self) -> Result<(), RelaxError> {
        if self.n == 0 {
            return Err(RelaxError::InvalidConfig("grid dimension must be positive".to_string()));
        }
        if !self.heat.is_finite() {
            return Err(RelaxError::InvalidConfig(format!("heat {} is not finite", self.heat)));
        }
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(RelaxError::InvalidConfig(format!(
                "epsilon {} must be finite and non-negative",
                self.eps
            )));
        }
        if self.max_generations == Some(0) {
            return Err(RelaxError::InvalidConfig("generation cap must be positive".to_string()));
        }
        Ok(())
    }
}

/// Experiment sweep: sizes `base_n * i` for `i in 1..=steps`, each run `repeats` times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepOptions {
    pub base_n: usize,
    pub steps: usize,
    pub repeats: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        SweepOptions { base_n: 100, steps: 50, repeats: 10 }
    }
}

impl SweepOptions {
    /// Problem sizes in run order, repeats included.
    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        (1..=self.steps).flat_map(move |i| std::iter::repeat(self.base_n * i).take(self.repeats))
    }
}
