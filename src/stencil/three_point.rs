//! Three-point smoothing along a 1-D line stored as an `N × 1` block.

use std::ops::Range;

use super::Stencil;

pub const CENTER: f64 = 0.5;
pub const SIDE: f64 = 0.25;

/// `out[i] = 0.25·in[i-1] + 0.5·in[i] + 0.25·in[i+1]`; neighbours are the adjacent rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreePoint;

impl Stencil for ThreePoint {
    fn columns(&self, width: usize) -> Range<usize> {
        0..width
    }

    #[inline]
    fn apply(&self, up: &[f64], mid: &[f64], down: &[f64], c: usize) -> f64 {
        SIDE * up[c] + CENTER * mid[c] + SIDE * down[c]
    }
}
