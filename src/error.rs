use thiserror::Error;

// Unified error type for relaxa

#[derive(Error, Debug)]
pub enum RelaxError {
    #[error("cannot split {n} rows across {workers} workers (rank {rank})")]
    InvalidPartition { n: usize, workers: usize, rank: usize },
    #[error("communication failure: {0}")]
    CommunicationFailure(String),
    #[error("failed to allocate a {rows}x{width} block")]
    AllocationFailure { rows: usize, width: usize },
    #[error("output write failure: {0}")]
    OutputWriteFailure(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RelaxError {
    /// True for errors that leave the numerical result intact.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RelaxError::OutputWriteFailure(_))
    }
}
