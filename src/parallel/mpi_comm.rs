//! MPI-based communicator.
//!
//! One worker per MPI process. Point-to-point traffic uses synchronous-mode sends
//! (`MPI_Ssend`) so the halo schedule is exercised under the same rendezvous semantics as
//! the thread backend, and the convergence vote is a single `MPI_Allreduce` with
//! `MPI_LAND`.
//!
//! MPI's default error handler aborts the job on a failed call; the `Result`s returned here
//! only carry failures detected on the Rust side.
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "mpi")] {
//! use relaxa::parallel::{Comm, MpiComm};
//! let comm = MpiComm::new().unwrap();
//! println!("Rank: {} / {}", comm.rank(), comm.size());
//! comm.barrier().unwrap();
//! # }
//! ```

use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::error::RelaxError;

/// MPI world communicator together with the universe that keeps MPI initialised.
pub struct MpiComm {
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
    // finalizes MPI on drop, so it must outlive `world`
    _universe: Universe,
}

impl MpiComm {
    /// Initializes MPI and wraps the world communicator.
    pub fn new() -> Result<Self, RelaxError> {
        let universe = mpi::initialize().ok_or_else(|| {
            RelaxError::CommunicationFailure("MPI was already initialized".to_string())
        })?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(MpiComm { world, rank, size, _universe: universe })
    }

    /// Tears down every process of the job.
    pub fn abort(&self, code: i32) -> ! {
        self.world.abort(code)
    }

    fn peer(&self, rank: usize) -> Result<i32, RelaxError> {
        if rank < self.size {
            Ok(rank as i32)
        } else {
            Err(RelaxError::CommunicationFailure(format!(
                "rank {rank} outside a world of {}",
                self.size
            )))
        }
    }
}

impl super::Comm for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send_row(&self, dest: usize, row: &[f64]) -> Result<(), RelaxError> {
        let dest = self.peer(dest)?;
        self.world.process_at_rank(dest).synchronous_send(row);
        Ok(())
    }

    fn recv_row(&self, src: usize, row: &mut [f64]) -> Result<(), RelaxError> {
        let src = self.peer(src)?;
        let status = self.world.process_at_rank(src).receive_into(row);
        let count = status.count(f64::equivalent_datatype()) as usize;
        if count != row.len() {
            return Err(RelaxError::CommunicationFailure(format!(
                "rank {} <- {src}: expected {} values, got {count}",
                self.rank,
                row.len()
            )));
        }
        Ok(())
    }

    fn all_reduce_and(&self, flag: bool) -> Result<bool, RelaxError> {
        let local = i32::from(flag);
        let mut global = 0i32;
        self.world
            .all_reduce_into(&local, &mut global, SystemOperation::logical_and());
        Ok(global != 0)
    }

    fn barrier(&self) -> Result<(), RelaxError> {
        self.world.barrier();
        Ok(())
    }
}
