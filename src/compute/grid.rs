//! Dense toroidal grids and the two-species field.
//!
//! Data is stored row-major as a flat `Vec<f32>`: cell `(row, col)` lives at
//! `row * cols + col`. Every cell has exactly four neighbours; indices wrap
//! modulo `rows`/`cols`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chemical species tracked by a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    /// Species A, fed from the reservoir and consumed by the reaction.
    Activator,
    /// Species B, produced by the reaction and removed at rate `F + k`.
    Inhibitor,
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Species::Activator => f.write_str("activator"),
            Species::Inhibitor => f.write_str("inhibitor"),
        }
    }
}

/// A `rows x cols` grid of concentrations with periodic topology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Grid {
    /// Create a grid with every cell set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
        debug_assert!(rows > 0 && cols > 0, "grid dimensions must be non-zero");
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` if the length does not
    /// match `rows * cols` or a dimension is zero.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Option<Self> {
        if rows == 0 || cols == 0 || data.len() != rows * cols {
            return None;
        }
        Some(Self { rows, cols, data })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Convert `(row, col)` to a flat index. No wrapping.
    #[inline]
    pub fn idx(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Flat index of a possibly out-of-range coordinate, wrapped onto the torus.
    #[inline]
    pub fn wrapped_idx(&self, row: i64, col: i64) -> usize {
        let r = row.rem_euclid(self.rows as i64) as usize;
        let c = col.rem_euclid(self.cols as i64) as usize;
        self.idx(r, c)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[self.idx(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        let i = self.idx(row, col);
        self.data[i] = value;
    }

    /// Row-major cell values.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// One row of the grid.
    #[inline]
    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }

    /// Nested `rows x cols` copy, for collaborators that exchange nested sequences.
    pub fn to_nested(&self) -> Vec<Vec<f32>> {
        self.data.chunks(self.cols).map(<[f32]>::to_vec).collect()
    }

    /// True if both grids have identical dimensions.
    #[inline]
    pub fn same_shape(&self, other: &Grid) -> bool {
        self.shape() == other.shape()
    }

    /// Flat index of the first NaN cell in row-major order.
    pub fn first_nan(&self) -> Option<usize> {
        self.data.iter().position(|v| v.is_nan())
    }

    /// Clamp every cell to `[0, 1]`. Infinities map to the nearest bound;
    /// NaN is left untouched so callers can detect it.
    pub fn clamp_unit(&mut self) {
        for v in &mut self.data {
            *v = v.clamp(0.0, 1.0);
        }
    }
}

/// The two concentration grids `(A, B)` of identical shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub activator: Grid,
    pub inhibitor: Grid,
}

impl Field {
    /// Uniform field with `A = a` and `B = b` everywhere.
    pub fn uniform(rows: usize, cols: usize, a: f32, b: f32) -> Self {
        Self {
            activator: Grid::filled(rows, cols, a),
            inhibitor: Grid::filled(rows, cols, b),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.activator.rows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.activator.cols()
    }

    pub fn grid(&self, species: Species) -> &Grid {
        match species {
            Species::Activator => &self.activator,
            Species::Inhibitor => &self.inhibitor,
        }
    }

    /// Set `A = 0, B = 1` on every cell with `dx² + dy² <= radius²` around
    /// `(x, y)`, where `x` is the column and `y` the row. The disk wraps
    /// across edges.
    pub fn paint_disk(&mut self, x: i64, y: i64, radius: u32) {
        // No cell is farther than half the grid along either axis.
        let reach = (self.rows() as f64 / 2.0).hypot(self.cols() as f64 / 2.0).ceil() as i64;
        let r = (radius as i64).min(reach);
        let r_sq = r * r;
        let x = x.rem_euclid(self.cols() as i64);
        let y = y.rem_euclid(self.rows() as i64);
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r_sq {
                    continue;
                }
                let i = self.activator.wrapped_idx(y + dy, x + dx);
                self.activator.data[i] = 0.0;
                self.inhibitor.data[i] = 1.0;
            }
        }
    }

    /// Clamp both grids to `[0, 1]`.
    pub fn clamp_unit(&mut self) {
        self.activator.clamp_unit();
        self.inhibitor.clamp_unit();
    }
}
