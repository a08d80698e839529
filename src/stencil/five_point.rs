//! Biased five-point diffusion on a 2-D grid.

use std::ops::Range;

use super::Stencil;

/// Weights of the five-point rule. They are asymmetric (a biased diffusion) and must not be
/// normalised or reordered.
pub const CENTER: f64 = 0.25;
pub const UP: f64 = 0.250;
pub const DOWN: f64 = 0.125;
pub const LEFT: f64 = 0.175;
pub const RIGHT: f64 = 0.200;

/// `out = 0.25·c + 0.250·up + 0.125·down + 0.175·left + 0.200·right`,
/// applied to every column except the first and last.
#[derive(Clone, Copy, Debug, Default)]
pub struct FivePoint;

impl Stencil for FivePoint {
    fn columns(&self, width: usize) -> Range<usize> {
        1..width.saturating_sub(1).max(1)
    }

    #[inline]
    fn apply(&self, up: &[f64], mid: &[f64], down: &[f64], c: usize) -> f64 {
        CENTER * mid[c] + UP * up[c] + DOWN * down[c] + LEFT * mid[c - 1] + RIGHT * mid[c + 1]
    }
}
