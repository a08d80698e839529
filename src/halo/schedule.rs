//! Per-worker halo communication schedule.
//!
//! With blocking synchronous sends, two neighbours that both send before receiving wait on
//! each other forever. The schedule breaks the cycle by rank parity:
//!
//! | rank | first half (with)        | second half (with)       |
//! |------|--------------------------|--------------------------|
//! | even | send, recv (`rank + 1`)  | recv, send (`rank - 1`)  |
//! | odd  | recv, send (`rank - 1`)  | send, recv (`rank + 1`)  |
//!
//! so every pair `(even, even + 1)` completes first, then every pair `(odd, odd + 1)`.
//! Halves towards a missing neighbour are dropped.

use crate::grid::{HaloEdges, Partition};

/// One blocking step of the exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaloAction {
    /// Send the last owned row to the worker below.
    SendLastOwned { to: usize },
    /// Receive the row below into the bottom halo slot.
    RecvBottomHalo { from: usize },
    /// Receive the row above into the top halo slot.
    RecvTopHalo { from: usize },
    /// Send the first owned row to the worker above.
    SendFirstOwned { to: usize },
}

impl HaloAction {
    /// Peer rank of this action.
    pub fn peer(&self) -> usize {
        match *self {
            HaloAction::SendLastOwned { to } | HaloAction::SendFirstOwned { to } => to,
            HaloAction::RecvBottomHalo { from } | HaloAction::RecvTopHalo { from } => from,
        }
    }

    pub fn is_send(&self) -> bool {
        matches!(self, HaloAction::SendLastOwned { .. } | HaloAction::SendFirstOwned { .. })
    }
}

/// Ordered list of halo actions of one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommSchedule {
    pub actions: Vec<HaloAction>,
}

impl CommSchedule {
    pub fn for_rank(part: &Partition) -> Self {
        let edges = part.halo_edges();
        let rank = part.rank;
        let mut below = Vec::with_capacity(2);
        if edges.contains(HaloEdges::BOTTOM) {
            below.push(HaloAction::SendLastOwned { to: rank + 1 });
            below.push(HaloAction::RecvBottomHalo { from: rank + 1 });
        }
        let mut above = Vec::with_capacity(2);
        if edges.contains(HaloEdges::TOP) {
            above.push(HaloAction::RecvTopHalo { from: rank - 1 });
            above.push(HaloAction::SendFirstOwned { to: rank - 1 });
        }
        let actions = if rank % 2 == 0 {
            below.into_iter().chain(above).collect()
        } else {
            above.into_iter().chain(below).collect()
        };
        CommSchedule { actions }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
