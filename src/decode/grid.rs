//! Memoized grid offsets per detection scale.
//!
//! Grid geometry depends only on the scale's grid size and `xy_scale`, never
//! on image content, so each scale's offset table is built once and stored in
//! a `OnceLock` for lock-free reuse across images and worker threads.

use std::sync::OnceLock;

/// Per-cell additive terms of the center decode for one scale.
///
/// For cell `(gy, gx)` the table holds `gx - 0.5 * (xy_scale - 1)` and
/// `gy - 0.5 * (xy_scale - 1)`, in row-major cell order.
#[derive(Clone, Debug)]
pub struct GridOffsets {
    grid_h: usize,
    grid_w: usize,
    offsets: Vec<(f64, f64)>,
}

impl GridOffsets {
    /// Builds the offset table for a `grid_h x grid_w` grid.
    pub fn build(grid_h: usize, grid_w: usize, xy_scale: f32) -> Self {
        let bias = 0.5 * (xy_scale as f64 - 1.0);
        let mut offsets = Vec::with_capacity(grid_h * grid_w);
        for gy in 0..grid_h {
            for gx in 0..grid_w {
                offsets.push((gx as f64 - bias, gy as f64 - bias));
            }
        }
        Self {
            grid_h,
            grid_w,
            offsets,
        }
    }

    /// Returns the grid height.
    pub fn grid_h(&self) -> usize {
        self.grid_h
    }

    /// Returns the grid width.
    pub fn grid_w(&self) -> usize {
        self.grid_w
    }

    /// Returns the offset pair for the cell at row-major index `cell`.
    #[inline]
    pub fn at(&self, cell: usize) -> (f64, f64) {
        self.offsets[cell]
    }
}

/// Lazily populated offset tables, one slot per scale.
pub(crate) struct GridBank {
    slots: Vec<OnceLock<GridOffsets>>,
}

impl GridBank {
    pub(crate) fn new(num_scales: usize) -> Self {
        Self {
            slots: (0..num_scales).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Returns the cached table for `scale`, building it on first use.
    ///
    /// Callers validate the grid size against the model geometry first, so
    /// every call for a given scale passes the same dimensions.
    pub(crate) fn get(
        &self,
        scale: usize,
        grid_h: usize,
        grid_w: usize,
        xy_scale: f32,
    ) -> Option<&GridOffsets> {
        let slot = self.slots.get(scale)?;
        let grid = slot.get_or_init(|| GridOffsets::build(grid_h, grid_w, xy_scale));
        debug_assert_eq!((grid.grid_h, grid.grid_w), (grid_h, grid_w));
        Some(grid)
    }
}
