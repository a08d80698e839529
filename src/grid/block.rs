//! Local blocks: one contiguous row-major allocation per buffer.
//!
//! A block stores `rows × width` values, where `rows` counts the owned rows plus the halo
//! rows reserved by the [`Partition`]. All access goes through bounds-checked row/cell
//! accessors; nothing outside this module computes flat offsets.

use tracing::debug;

use crate::error::RelaxError;
use crate::grid::partition::Partition;

/// Dense row-major block of `f64` values.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    rows: usize,
    width: usize,
    data: Vec<f64>,
}

impl Block {
    /// Allocates a zero-initialised block.
    ///
    /// Reports [`RelaxError::AllocationFailure`] instead of aborting when the allocation
    /// cannot be satisfied.
    pub fn zeroed(rows: usize, width: usize) -> Result<Self, RelaxError> {
        let fail = || RelaxError::AllocationFailure { rows, width };
        let len = rows.checked_mul(width).ok_or_else(fail)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| fail())?;
        data.resize(len, 0.0);
        Ok(Block { rows, width, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Row `r` as a slice. Panics if `r` is out of bounds.
    pub fn row(&self, r: usize) -> &[f64] {
        assert!(r < self.rows, "row {r} out of bounds ({} rows)", self.rows);
        &self.data[r * self.width..(r + 1) * self.width]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        assert!(r < self.rows, "row {r} out of bounds ({} rows)", self.rows);
        &mut self.data[r * self.width..(r + 1) * self.width]
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.row(r)[c]
    }

    pub fn set(&mut self, r: usize, c: usize, value: f64) {
        self.row_mut(r)[c] = value;
    }

    /// Mutable rows `lo..hi` as one contiguous slice, for kernels that split work by row.
    pub fn rows_mut(&mut self, lo: usize, hi: usize) -> &mut [f64] {
        assert!(lo <= hi && hi <= self.rows, "rows {lo}..{hi} out of bounds ({} rows)", self.rows);
        &mut self.data[lo * self.width..hi * self.width]
    }
}

/// The single cell that carries the boundary heat value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeatSource {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

/// Current/next buffers of one worker.
///
/// The driver reads from [`BlockPair::current`] and writes into [`BlockPair::next`]; the
/// two are distinct allocations and only their labels are swapped between generations.
#[derive(Debug)]
pub struct BlockPair {
    blocks: [Block; 2],
    current: usize,
}

impl BlockPair {
    /// Allocates both buffers for `part` and seeds the heat source if this worker owns it.
    pub fn allocate(part: &Partition, width: usize, heat: &HeatSource) -> Result<Self, RelaxError> {
        let rows = part.local_rows();
        let mut blocks = [Block::zeroed(rows, width)?, Block::zeroed(rows, width)?];
        if let Some(local) = part.to_local(heat.row) {
            if heat.col >= width {
                return Err(RelaxError::InvalidConfig(format!(
                    "heat column {} outside a grid of width {width}",
                    heat.col
                )));
            }
            for block in &mut blocks {
                block.set(local, heat.col, heat.value);
            }
            debug!(rank = part.rank, row = heat.row, col = heat.col, "seeded heat source");
        }
        Ok(BlockPair { blocks, current: 0 })
    }

    pub fn current(&self) -> &Block {
        &self.blocks[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Block {
        &mut self.blocks[self.current]
    }

    pub fn next(&self) -> &Block {
        &self.blocks[1 - self.current]
    }

    pub fn next_mut(&mut self) -> &mut Block {
        &mut self.blocks[1 - self.current]
    }

    /// Borrow the current buffer for reading and the next one for writing.
    pub fn split(&mut self) -> (&Block, &mut Block) {
        let (a, b) = self.blocks.split_at_mut(1);
        if self.current == 0 { (&a[0], &mut b[0]) } else { (&b[0], &mut a[0]) }
    }

    /// Flip which buffer is current.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Consume the pair, keeping the buffer written by the latest kernel step.
    pub fn into_next(self) -> Block {
        let [a, b] = self.blocks;
        if self.current == 0 { b } else { a }
    }
}
