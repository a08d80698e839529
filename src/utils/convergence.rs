//! Global convergence decisions for the relaxation loop.

use std::time::Duration;

use crate::error::RelaxError;
use crate::parallel::Comm;

/// Stopping criteria.
///
/// The run stops when every worker reports a stable step in the same generation. An optional
/// generation cap ends runs that never settle; it is off by default.
#[derive(Clone, Copy, Debug, Default)]
pub struct Convergence {
    pub max_generations: Option<usize>,
}

/// Outcome of one convergence check, identical on every worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Converged,
    Exhausted,
}

#[derive(Clone, Debug)]
pub struct RelaxStats {
    pub generations: usize,
    pub elapsed: Duration,
    pub converged: bool,
}

impl Convergence {
    /// Combines this worker's `local_stable` with every other worker's.
    ///
    /// Collective: every worker must call this once per generation, whatever its own flag,
    /// since the decision is only known once all flags are in.
    pub fn check<C: Comm>(
        &self,
        comm: &C,
        local_stable: bool,
        generation: usize,
    ) -> Result<Verdict, RelaxError> {
        if comm.all_reduce_and(local_stable)? {
            return Ok(Verdict::Converged);
        }
        match self.max_generations {
            Some(cap) if generation >= cap => Ok(Verdict::Exhausted),
            _ => Ok(Verdict::Continue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{run_threads, ThreadComm};

    #[test]
    fn one_unstable_worker_keeps_the_group_running() {
        let conv = Convergence::default();
        let verdicts = run_threads(4, |comm| conv.check(&comm, comm.rank() != 2, 1));
        for v in verdicts {
            assert_eq!(v.unwrap(), Verdict::Continue);
        }
    }

    #[test]
    fn cap_ends_unsettled_runs() {
        let conv = Convergence { max_generations: Some(3) };
        let comm = ThreadComm::world(1).pop().unwrap();
        assert_eq!(conv.check(&comm, false, 2).unwrap(), Verdict::Continue);
        assert_eq!(conv.check(&comm, false, 3).unwrap(), Verdict::Exhausted);
        assert_eq!(conv.check(&comm, true, 3).unwrap(), Verdict::Converged);
    }
}
