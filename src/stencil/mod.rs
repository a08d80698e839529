//! Stencil kernels for one relaxation step over a worker's interior rows.
//!
//! A [`Stencil`] only knows how to compute a single cell from the rows above, at and below
//! it. [`Kernel`] drives a stencil over a row range of a local block, writing into the output
//! block and reporting whether every updated cell moved by at most `eps`.

use std::ops::Range;

use crate::error::RelaxError;
use crate::grid::Block;

pub mod five_point;
pub mod three_point;

pub use five_point::FivePoint;
pub use three_point::ThreePoint;

/// Local update rule of a relaxation step.
pub trait Stencil: Sync {
    /// Columns updated in a row of `width` cells.
    fn columns(&self, width: usize) -> Range<usize>;
    /// New value of column `c` of `mid`, given its neighbouring rows.
    fn apply(&self, up: &[f64], mid: &[f64], down: &[f64], c: usize) -> f64;
}

/// How a worker spreads the kernel over its own rows.
pub enum Execution {
    Serial,
    #[cfg(feature = "rayon")]
    Parallel(rayon::ThreadPool),
}

impl Execution {
    /// Row-parallel execution on a dedicated pool of `threads` threads.
    #[cfg(feature = "rayon")]
    pub fn parallel(threads: usize) -> Result<Self, RelaxError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .map(Execution::Parallel)
            .map_err(|e| RelaxError::InvalidConfig(format!("kernel thread pool: {e}")))
    }

    /// Splits the machine's cores evenly between `workers` co-located workers.
    #[cfg(feature = "rayon")]
    pub fn parallel_for_workers(workers: usize) -> Result<Self, RelaxError> {
        Self::parallel(num_cpus::get() / workers.max(1))
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Execution::Serial => write!(f, "Serial"),
            #[cfg(feature = "rayon")]
            Execution::Parallel(pool) => write!(f, "Parallel({})", pool.current_num_threads()),
        }
    }
}

/// A stencil bound to a convergence epsilon and an execution strategy.
#[derive(Debug)]
pub struct Kernel<S> {
    pub stencil: S,
    pub eps: f64,
    pub exec: Execution,
}

impl<S: Stencil> Kernel<S> {
    pub fn new(stencil: S, eps: f64) -> Self {
        Kernel { stencil, eps, exec: Execution::Serial }
    }

    pub fn with_execution(mut self, exec: Execution) -> Self {
        self.exec = exec;
        self
    }

    /// Relax local rows `rows` of `input` into `output`.
    ///
    /// Rows `rows.start - 1` and `rows.end` are read but never written, so halo rows and
    /// global boundary rows keep their values. `input` is never mutated. Returns `true` iff no
    /// updated cell changed by more than `eps`.
    pub fn relax(&self, input: &Block, output: &mut Block, rows: Range<usize>) -> bool {
        assert_eq!(
            (input.rows(), input.width()),
            (output.rows(), output.width()),
            "input and output blocks differ in shape"
        );
        if rows.is_empty() {
            return true;
        }
        assert!(rows.start >= 1 && rows.end < input.rows(), "rows {rows:?} lack neighbours");
        match &self.exec {
            Execution::Serial => {
                let mut stable = true;
                for r in rows {
                    // `&=` keeps evaluating every row once stability is lost
                    stable &= relax_row(&self.stencil, input, r, output.row_mut(r), self.eps);
                }
                stable
            }
            #[cfg(feature = "rayon")]
            Execution::Parallel(pool) => {
                use rayon::prelude::*;
                let width = output.width();
                let lo = rows.start;
                let chunk = output.rows_mut(rows.start, rows.end);
                pool.install(|| {
                    chunk
                        .par_chunks_mut(width)
                        .enumerate()
                        .map(|(i, out)| relax_row(&self.stencil, input, lo + i, out, self.eps))
                        .reduce(|| true, |a, b| a & b)
                })
            }
        }
    }
}

fn relax_row<S: Stencil>(stencil: &S, input: &Block, r: usize, out: &mut [f64], eps: f64) -> bool {
    let (up, mid, down) = (input.row(r - 1), input.row(r), input.row(r + 1));
    let mut stable = true;
    for c in stencil.columns(mid.len()) {
        out[c] = stencil.apply(up, mid, down, c);
        if stable && (out[c] - mid[c]).abs() > eps {
            stable = false;
        }
    }
    stable
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, width: usize) -> Block {
        let mut b = Block::zeroed(rows, width).unwrap();
        for r in 0..rows {
            for c in 0..width {
                b.set(r, c, (r * width + c) as f64 * 0.5);
            }
        }
        b
    }

    #[test]
    fn input_is_left_untouched() {
        let input = ramp(5, 5);
        let snapshot = input.clone();
        let mut output = Block::zeroed(5, 5).unwrap();
        Kernel::new(FivePoint, 0.01).relax(&input, &mut output, 1..4);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn every_cell_is_computed_after_instability() {
        // The first row is unstable, later rows must still be written.
        let mut input = Block::zeroed(5, 5).unwrap();
        input.set(1, 2, 100.0);
        let mut output = Block::zeroed(5, 5).unwrap();
        let stable = Kernel::new(FivePoint, 0.05).relax(&input, &mut output, 1..4);
        assert!(!stable);
        assert_eq!(output.get(2, 2), 0.25 * 100.0);
        assert_eq!(output.get(3, 2), 0.0);
    }

    #[test]
    fn halo_and_boundary_rows_are_not_written() {
        let input = ramp(4, 4);
        let mut output = Block::zeroed(4, 4).unwrap();
        output.row_mut(0).fill(-1.0);
        output.row_mut(3).fill(-1.0);
        Kernel::new(FivePoint, 0.05).relax(&input, &mut output, 1..3);
        assert!(output.row(0).iter().all(|&v| v == -1.0));
        assert!(output.row(3).iter().all(|&v| v == -1.0));
    }

    #[test]
    fn stable_buffers_report_stable_on_first_call() {
        let input = Block::zeroed(6, 6).unwrap();
        let mut output = input.clone();
        assert!(Kernel::new(FivePoint, 0.05).relax(&input, &mut output, 1..5));
        let line = Block::zeroed(6, 1).unwrap();
        let mut out_line = line.clone();
        assert!(Kernel::new(ThreePoint, 0.05).relax(&line, &mut out_line, 1..5));
    }

    #[test]
    fn converged_pair_stays_stable() {
        let kernel = Kernel::new(FivePoint, 0.05);
        let mut current = Block::zeroed(8, 8).unwrap();
        current.set(0, 4, 400.0);
        let mut next = current.clone();
        let mut generations = 0;
        while !kernel.relax(&current, &mut next, 1..7) {
            std::mem::swap(&mut current, &mut next);
            generations += 1;
            assert!(generations < 10_000, "no convergence");
        }
        assert!(generations > 0);

        let mut again = current.clone();
        let mut once_more = current.clone();
        assert!(kernel.relax(&current, &mut again, 1..7));
        assert!(kernel.relax(&current, &mut once_more, 1..7));
        assert_eq!(again, next);
        assert_eq!(once_more, next);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_execution_matches_serial() {
        let mut input = ramp(9, 7);
        input.set(0, 3, 400.0);
        let mut serial = Block::zeroed(9, 7).unwrap();
        let mut parallel = Block::zeroed(9, 7).unwrap();
        let s = Kernel::new(FivePoint, 0.05).relax(&input, &mut serial, 1..8);
        let p = Kernel::new(FivePoint, 0.05)
            .with_execution(Execution::parallel(3).unwrap())
            .relax(&input, &mut parallel, 1..8);
        assert_eq!(s, p);
        assert_eq!(serial, parallel);
    }
}
