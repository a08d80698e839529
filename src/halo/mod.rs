//! Halo exchange between row-adjacent workers.

use tracing::trace;

use crate::error::RelaxError;
use crate::grid::{Block, Partition};
use crate::parallel::Comm;

pub mod schedule;
pub use schedule::{CommSchedule, HaloAction};

/// Executes a worker's [`CommSchedule`] against a local block.
///
/// After [`HaloExchanger::exchange`] returns, the block's halo rows hold copies of the
/// neighbours' outermost owned rows, and the neighbours hold copies of this worker's.
#[derive(Clone, Debug)]
pub struct HaloExchanger {
    schedule: CommSchedule,
    first_owned: usize,
    last_owned: usize,
    bottom_halo: usize,
}

impl HaloExchanger {
    pub fn new(part: &Partition) -> Self {
        HaloExchanger {
            schedule: CommSchedule::for_rank(part),
            first_owned: part.first_owned_local(),
            last_owned: part.last_owned_local(),
            bottom_halo: part.local_rows() - 1,
        }
    }

    pub fn exchange<C: Comm>(&self, comm: &C, block: &mut Block) -> Result<(), RelaxError> {
        for action in &self.schedule.actions {
            trace!(rank = comm.rank(), ?action, "halo");
            match *action {
                HaloAction::SendLastOwned { to } => comm.send_row(to, block.row(self.last_owned))?,
                HaloAction::RecvBottomHalo { from } => {
                    comm.recv_row(from, block.row_mut(self.bottom_halo))?
                }
                HaloAction::RecvTopHalo { from } => comm.recv_row(from, block.row_mut(0))?,
                HaloAction::SendFirstOwned { to } => {
                    comm.send_row(to, block.row(self.first_owned))?
                }
            }
        }
        Ok(())
    }
}
