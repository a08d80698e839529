//! Row decomposition of the global grid.
//!
//! Rows are split as evenly as possible across the worker group; the last worker absorbs the
//! `n % size` remainder rows on top of its even share. Each worker additionally reserves one
//! halo row per neighbour: above its first owned row if `rank > 0`, below its last owned row
//! if `rank < size - 1`.

use std::ops::Range;

use bitflags::bitflags;

use crate::error::RelaxError;

bitflags! {
    /// Edges of a local block that carry a halo row.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct HaloEdges: u8 {
        const TOP    = 0b01; // copy of rank - 1's last owned row
        const BOTTOM = 0b10; // copy of rank + 1's first owned row
        const BOTH   = Self::TOP.bits() | Self::BOTTOM.bits();
    }
}

/// One worker's share of the global rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    /// Global number of rows.
    pub n: usize,
    /// Number of workers in the group.
    pub size: usize,
    /// This worker's rank.
    pub rank: usize,
    /// Global index of the first owned row.
    pub offset: usize,
    /// Number of owned (authoritative) rows.
    pub owned_rows: usize,
}

impl Partition {
    /// Computes the row range of `rank` in a group of `size` workers.
    ///
    /// Fails with [`RelaxError::InvalidPartition`] when some worker would own no rows.
    pub fn new(n: usize, size: usize, rank: usize) -> Result<Self, RelaxError> {
        if size == 0 || n < size || rank >= size {
            return Err(RelaxError::InvalidPartition { n, workers: size, rank });
        }
        let share = n / size;
        let owned_rows = if rank == size - 1 { share + n % size } else { share };
        Ok(Partition { n, size, rank, offset: rank * share, owned_rows })
    }

    /// Partitions of every rank, in rank order.
    pub fn all(n: usize, size: usize) -> Result<Vec<Self>, RelaxError> {
        (0..size).map(|rank| Partition::new(n, size, rank)).collect()
    }

    /// Global rows owned by this worker.
    pub fn owned_range(&self) -> Range<usize> {
        self.offset..self.offset + self.owned_rows
    }

    pub fn halo_edges(&self) -> HaloEdges {
        let mut edges = HaloEdges::empty();
        if self.rank > 0 {
            edges |= HaloEdges::TOP;
        }
        if self.rank + 1 < self.size {
            edges |= HaloEdges::BOTTOM;
        }
        edges
    }

    pub fn halo_rows(&self) -> usize {
        self.halo_edges().bits().count_ones() as usize
    }

    /// Rows in the local block: owned rows plus halo rows.
    pub fn local_rows(&self) -> usize {
        self.owned_rows + self.halo_rows()
    }

    /// Local row index of the first owned row.
    pub fn first_owned_local(&self) -> usize {
        usize::from(self.halo_edges().contains(HaloEdges::TOP))
    }

    /// Local row index of the last owned row.
    pub fn last_owned_local(&self) -> usize {
        self.first_owned_local() + self.owned_rows - 1
    }

    pub fn contains_row(&self, global: usize) -> bool {
        self.owned_range().contains(&global)
    }

    /// Local index of an owned global row.
    pub fn to_local(&self, global: usize) -> Option<usize> {
        self.contains_row(global)
            .then(|| global - self.offset + self.first_owned_local())
    }

    /// Local rows the stencil updates: owned rows excluding the global boundary rows.
    pub fn interior_local(&self) -> Range<usize> {
        let lo = self.offset.max(1);
        let hi = (self.offset + self.owned_rows).min(self.n.saturating_sub(1));
        if lo >= hi {
            return 0..0;
        }
        let base = self.first_owned_local();
        (lo - self.offset + base)..(hi - self.offset + base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remainder_goes_to_last_worker() {
        let parts = Partition::all(10, 3).unwrap();
        let owned: Vec<_> = parts.iter().map(|p| p.owned_rows).collect();
        assert_eq!(owned, vec![3, 3, 4]);
        assert_eq!(parts[2].owned_range(), 6..10);
    }

    #[test]
    fn halo_edges_follow_rank_position() {
        let parts = Partition::all(12, 3).unwrap();
        assert_eq!(parts[0].halo_edges(), HaloEdges::BOTTOM);
        assert_eq!(parts[1].halo_edges(), HaloEdges::BOTH);
        assert_eq!(parts[2].halo_edges(), HaloEdges::TOP);
        assert_eq!(parts[1].local_rows(), 6);
        let solo = Partition::new(5, 1, 0).unwrap();
        assert!(solo.halo_edges().is_empty());
        assert_eq!(solo.local_rows(), 5);
    }

    #[test]
    fn too_many_workers_is_rejected() {
        let err = Partition::new(3, 4, 0).unwrap_err();
        assert!(matches!(err, RelaxError::InvalidPartition { n: 3, workers: 4, .. }));
        assert!(Partition::new(4, 0, 0).is_err());
        assert!(Partition::new(8, 2, 2).is_err());
    }

    #[test]
    fn interior_skips_global_boundary_rows() {
        let parts = Partition::all(8, 2).unwrap();
        // rank 0 owns global 0..4, local rows 0..4 plus a bottom halo at 4
        assert_eq!(parts[0].interior_local(), 1..4);
        // rank 1 owns global 4..8 at local rows 1..5, global row 7 is the boundary
        assert_eq!(parts[1].interior_local(), 1..4);
        assert_eq!(parts[1].to_local(7), Some(4));
        assert_eq!(parts[1].to_local(3), None);
    }

    #[test]
    fn single_row_owner_on_the_boundary_updates_nothing() {
        let p = Partition::new(4, 4, 0).unwrap();
        assert!(p.interior_local().is_empty());
    }
}
