//! Run context and driver of a distributed relaxation.
//!
//! A [`RelaxContext`] owns everything one worker needs for one run: its partition, both
//! buffers, the halo exchanger, the kernel and the run clock. It is created in `Init`,
//! advanced one generation at a time by [`RelaxContext::step`], and consumed in `Done`.
//!
//! Per generation, on every worker:
//! 1. relax `current → next` over the worker's interior rows;
//! 2. join the group vote on global stability, stopping if every worker was stable;
//! 3. exchange halo rows of `next` with the neighbours;
//! 4. swap `current`/`next` and advance the generation counter.
//!
//! The vote doubles as the barrier that keeps generation `k + 1` from starting anywhere
//! before every halo row of generation `k` has been delivered.

use std::ops::Range;
use std::time::Instant;

use faer::Mat;
use tracing::{debug, info, trace};

use crate::config::{Layout, RelaxOptions};
use crate::error::RelaxError;
use crate::grid::{Block, BlockPair, Partition};
use crate::halo::HaloExchanger;
use crate::parallel::Comm;
use crate::stencil::{FivePoint, Kernel, Stencil, ThreePoint};
use crate::utils::convergence::{Convergence, RelaxStats, Verdict};

/// Result of one worker's run.
#[derive(Debug)]
pub struct RelaxOutcome {
    pub stats: RelaxStats,
    pub partition: Partition,
    /// Final local block; owned rows hold the last computed generation.
    pub block: Block,
}

impl RelaxOutcome {
    /// Owned rows of the final block, top to bottom.
    pub fn owned_rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        let first = self.partition.first_owned_local();
        (first..first + self.partition.owned_rows).map(move |r| self.block.row(r))
    }
}

pub struct RelaxContext<'c, C: Comm, S: Stencil> {
    comm: &'c C,
    partition: Partition,
    exchanger: HaloExchanger,
    kernel: Kernel<S>,
    convergence: Convergence,
    buffers: BlockPair,
    interior: Range<usize>,
    generation: usize,
    started: Instant,
}

impl<'c, C: Comm, S: Stencil> RelaxContext<'c, C, S> {
    /// `Init`: partition, allocate and seed both buffers, prime the halo rows.
    pub fn init(comm: &'c C, options: &RelaxOptions, stencil: S) -> Result<Self, RelaxError> {
        options.validate()?;
        let started = Instant::now();
        let partition = Partition::new(options.n, comm.size(), comm.rank())?;
        debug!(
            rank = partition.rank,
            offset = partition.offset,
            rows = partition.owned_rows,
            "partitioned"
        );
        let width = options.layout.width(options.n);
        let heat = options.layout.heat_source(options.n, options.heat);
        let mut buffers = BlockPair::allocate(&partition, width, &heat)?;
        let exchanger = HaloExchanger::new(&partition);
        // halo slots start as copies of their owners' initial rows
        exchanger.exchange(comm, buffers.current_mut())?;
        let kernel = Kernel::new(stencil, options.eps)
            .with_execution(options.execution.build(comm.size())?);
        Ok(RelaxContext {
            comm,
            interior: partition.interior_local(),
            partition,
            exchanger,
            kernel,
            convergence: Convergence { max_generations: options.max_generations },
            buffers,
            generation: 1,
            started,
        })
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Buffer the next kernel step reads from.
    pub fn current(&self) -> &Block {
        self.buffers.current()
    }

    /// `Step`: one full generation. The generation counter only advances on
    /// [`Verdict::Continue`].
    pub fn step(&mut self) -> Result<Verdict, RelaxError> {
        let (input, output) = self.buffers.split();
        let local_stable = self.kernel.relax(input, output, self.interior.clone());
        let verdict = self.convergence.check(self.comm, local_stable, self.generation)?;
        trace!(rank = self.partition.rank, generation = self.generation, local_stable, ?verdict);
        if verdict == Verdict::Continue {
            self.exchanger.exchange(self.comm, self.buffers.next_mut())?;
            self.buffers.swap();
            self.generation += 1;
        }
        Ok(verdict)
    }

    /// Steps until the group stops, then reports (`Done`).
    pub fn run(mut self) -> Result<RelaxOutcome, RelaxError> {
        loop {
            match self.step()? {
                Verdict::Continue => {}
                verdict => return Ok(self.finish(verdict == Verdict::Converged)),
            }
        }
    }

    fn finish(self, converged: bool) -> RelaxOutcome {
        let stats = RelaxStats {
            generations: self.generation,
            elapsed: self.started.elapsed(),
            converged,
        };
        info!(
            rank = self.partition.rank,
            generations = stats.generations,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            converged,
            "relaxation finished"
        );
        RelaxOutcome { stats, partition: self.partition, block: self.buffers.into_next() }
    }
}

/// Runs one relaxation on this worker with the stencil matching `options.layout`.
///
/// Collective: every worker of `comm` must call it with the same options.
pub fn run_relaxation<C: Comm>(
    comm: &C,
    options: &RelaxOptions,
) -> Result<RelaxOutcome, RelaxError> {
    if comm.rank() == 0 {
        info!(
            workers = comm.size(),
            n = options.n,
            heat = options.heat,
            eps = options.eps,
            layout = ?options.layout,
            "starting relaxation"
        );
    }
    match options.layout {
        Layout::Plane => RelaxContext::init(comm, options, FivePoint)?.run(),
        Layout::Line => RelaxContext::init(comm, options, ThreePoint)?.run(),
    }
}

/// Assembles the final global grid on rank 0; other ranks get `None`.
///
/// Collective. Each worker ships its owned rows to rank 0 in a single message.
pub fn gather_grid<C: Comm>(
    comm: &C,
    outcome: &RelaxOutcome,
) -> Result<Option<Mat<f64>>, RelaxError> {
    let part = &outcome.partition;
    let width = outcome.block.width();
    let owned: Vec<f64> = outcome.owned_rows().flatten().copied().collect();
    if comm.rank() != 0 {
        comm.send_row(0, &owned)?;
        return Ok(None);
    }
    let mut flat = owned;
    flat.reserve((part.n - part.owned_rows) * width);
    for src in 1..comm.size() {
        let peer = Partition::new(part.n, comm.size(), src)?;
        let start = flat.len();
        flat.resize(start + peer.owned_rows * width, 0.0);
        comm.recv_row(src, &mut flat[start..])?;
    }
    Ok(Some(Mat::from_fn(part.n, width, |i, j| flat[i * width + j])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{run_threads, ThreadComm};

    fn solo() -> ThreadComm {
        ThreadComm::world(1).pop().unwrap()
    }

    #[test]
    fn generation_starts_at_one_with_heat_in_place() {
        let comm = solo();
        let options = RelaxOptions { n: 10, ..Default::default() };
        let ctx = RelaxContext::init(&comm, &options, FivePoint).unwrap();
        assert_eq!(ctx.generation(), 1);
        assert_eq!(ctx.current().get(0, 5), 400.0);
    }

    #[test]
    fn step_advances_until_stable() {
        let comm = solo();
        let options = RelaxOptions { n: 12, ..Default::default() };
        let mut ctx = RelaxContext::init(&comm, &options, FivePoint).unwrap();
        assert_eq!(ctx.step().unwrap(), Verdict::Continue);
        assert_eq!(ctx.generation(), 2);
        let outcome = ctx.run().unwrap();
        assert!(outcome.stats.converged);
        assert!(outcome.stats.generations > 2);
    }

    #[test]
    fn already_flat_grid_stops_in_generation_one() {
        let comm = solo();
        let options = RelaxOptions { n: 8, heat: 0.0, ..Default::default() };
        let outcome = run_relaxation(&comm, &options).unwrap();
        assert_eq!(outcome.stats.generations, 1);
        assert!(outcome.stats.converged);
    }

    #[test]
    fn generation_cap_stops_unconverged() {
        let comm = solo();
        let options =
            RelaxOptions { n: 30, eps: 0.0, max_generations: Some(4), ..Default::default() };
        let outcome = run_relaxation(&comm, &options).unwrap();
        assert_eq!(outcome.stats.generations, 4);
        assert!(!outcome.stats.converged);
    }

    #[test]
    fn too_many_workers_fail_before_the_loop() {
        let options = RelaxOptions { n: 3, ..Default::default() };
        let results = run_threads(4, |comm| run_relaxation(&comm, &options).map(|_| ()));
        for r in results {
            assert!(matches!(r, Err(RelaxError::InvalidPartition { .. })));
        }
    }

    #[test]
    fn gathered_grid_matches_owned_rows() {
        let options = RelaxOptions { n: 9, ..Default::default() };
        let results = run_threads(3, |comm| {
            let outcome = run_relaxation(&comm, &options)?;
            gather_grid(&comm, &outcome)
        });
        let grids: Vec<_> = results.into_iter().map(Result::unwrap).collect();
        let grid = grids[0].as_ref().unwrap();
        assert_eq!((grid.nrows(), grid.ncols()), (9, 9));
        assert_eq!(grid[(0, 4)], 400.0);
        assert!(grids[1..].iter().all(Option::is_none));
    }
}
