//! Periodic five-point Laplacian.
//!
//! `lap[r][c] = g[r-1][c] + g[r+1][c] + g[r][c-1] + g[r][c+1] - 4 g[r][c]`
//! with neighbour indices taken modulo the grid dimensions.

use rayon::prelude::*;

use super::Grid;

/// Grids with at least this many cells are processed row-parallel.
pub const PARALLEL_THRESHOLD: usize = 128 * 128;

/// Compute the periodic Laplacian of `grid` into a new grid.
pub fn laplacian(grid: &Grid) -> Grid {
    let mut out = Grid::filled(grid.rows(), grid.cols(), 0.0);
    laplacian_into(grid, &mut out);
    out
}

/// Compute the periodic Laplacian of `grid` into a pre-allocated output of
/// the same shape.
pub fn laplacian_into(grid: &Grid, out: &mut Grid) {
    debug_assert!(grid.same_shape(out));
    let cols = grid.cols();

    if grid.len() >= PARALLEL_THRESHOLD {
        out.as_mut_slice()
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(row, out_row)| laplacian_row(grid, row, out_row));
    } else {
        for (row, out_row) in out.as_mut_slice().chunks_mut(cols).enumerate() {
            laplacian_row(grid, row, out_row);
        }
    }
}

/// Laplacian of a single row.
#[inline]
pub fn laplacian_row(grid: &Grid, row: usize, out: &mut [f32]) {
    let rows = grid.rows();
    let cols = grid.cols();

    let above = grid.row((row + rows - 1) % rows);
    let below = grid.row((row + 1) % rows);
    let here = grid.row(row);

    for (col, o) in out.iter_mut().enumerate().take(cols) {
        let left = here[(col + cols - 1) % cols];
        let right = here[(col + 1) % cols];
        *o = above[col] + below[col] + left + right - 4.0 * here[col];
    }
}
