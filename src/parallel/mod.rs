//! Messaging substrate shared by the halo exchanger and the convergence coordinator.
//!
//! The core needs exactly three operations from its transport: a blocking point-to-point
//! `send_row`/`recv_row` and a group-wide logical-AND reduction. Everything is fallible; any
//! error is a [`RelaxError::CommunicationFailure`] and ends the run.

use crate::error::RelaxError;

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    /// Synchronous send: returns once `dest` has posted the matching receive.
    fn send_row(&self, dest: usize, row: &[f64]) -> Result<(), RelaxError>;
    /// Blocks until a row from `src` arrives; its length must match `row`.
    fn recv_row(&self, src: usize, row: &mut [f64]) -> Result<(), RelaxError>;
    /// Logical AND of `flag` over every worker; identical result on all of them.
    fn all_reduce_and(&self, flag: bool) -> Result<bool, RelaxError>;
    fn barrier(&self) -> Result<(), RelaxError> {
        self.all_reduce_and(true).map(|_| ())
    }
}

pub mod thread_comm;
pub use thread_comm::{run_threads, ThreadComm};

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

pub enum UniverseComm {
    Threads(ThreadComm),
    #[cfg(feature = "mpi")]
    Mpi(MpiComm),
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        match self {
            UniverseComm::Threads(comm) => comm.rank(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.rank(),
        }
    }
    fn size(&self) -> usize {
        match self {
            UniverseComm::Threads(comm) => comm.size(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.size(),
        }
    }
    fn send_row(&self, dest: usize, row: &[f64]) -> Result<(), RelaxError> {
        match self {
            UniverseComm::Threads(comm) => comm.send_row(dest, row),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.send_row(dest, row),
        }
    }
    fn recv_row(&self, src: usize, row: &mut [f64]) -> Result<(), RelaxError> {
        match self {
            UniverseComm::Threads(comm) => comm.recv_row(src, row),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.recv_row(src, row),
        }
    }
    fn all_reduce_and(&self, flag: bool) -> Result<bool, RelaxError> {
        match self {
            UniverseComm::Threads(comm) => comm.all_reduce_and(flag),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.all_reduce_and(flag),
        }
    }
    fn barrier(&self) -> Result<(), RelaxError> {
        match self {
            UniverseComm::Threads(comm) => comm.barrier(),
            #[cfg(feature = "mpi")]
            UniverseComm::Mpi(comm) => comm.barrier(),
        }
    }
}
