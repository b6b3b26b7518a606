//! Explicit-Euler Gray-Scott integrator.
//!
//! One step computes, per cell,
//!
//! ```text
//! A' = A + dt * (Da * lap(A) - A*B*B + F * (1 - A))
//! B' = B + dt * (Db * lap(B) + A*B*B - (F + k) * B)
//! ```
//!
//! optionally adds Gaussian noise, then clamps both species to `[0, 1]`.

use rand::prelude::*;
use rand_distr::Normal;
use rayon::prelude::*;

use super::{Field, Grid, PARALLEL_THRESHOLD, Species, laplacian_into};
use crate::schema::Parameters;

/// The closed set of per-cell inputs the update rule consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    /// Neighbour exchange through the Laplacian.
    Diffusion,
    /// Feed (activator) or decay (inhibitor) driven by the cell's own value.
    SelfValue,
    /// Same-site reaction `A * B * B` between the two species.
    Coupling,
}

impl Interaction {
    /// Evaluation order of the rate terms.
    pub const ALL: [Interaction; 3] = [
        Interaction::Diffusion,
        Interaction::Coupling,
        Interaction::SelfValue,
    ];

    /// Contribution of this interaction to `d(species)/dt` at one cell.
    #[inline]
    pub fn rate(self, species: Species, params: &Parameters, cell: &CellInputs) -> f32 {
        match (self, species) {
            (Interaction::Diffusion, Species::Activator) => params.da * cell.lap_a,
            (Interaction::Diffusion, Species::Inhibitor) => params.db * cell.lap_b,
            (Interaction::Coupling, Species::Activator) => -cell.reaction(),
            (Interaction::Coupling, Species::Inhibitor) => cell.reaction(),
            (Interaction::SelfValue, Species::Activator) => params.f * (1.0 - cell.a),
            (Interaction::SelfValue, Species::Inhibitor) => -(params.f + params.k) * cell.b,
        }
    }
}

/// Values gathered for one cell before the update.
#[derive(Debug, Clone, Copy)]
pub struct CellInputs {
    pub a: f32,
    pub b: f32,
    pub lap_a: f32,
    pub lap_b: f32,
}

impl CellInputs {
    /// Coupling term `q = A * B * B`.
    #[inline]
    pub fn reaction(&self) -> f32 {
        self.a * self.b * self.b
    }

    /// Total time derivative of `species`.
    #[inline]
    pub fn derivative(&self, species: Species, params: &Parameters) -> f32 {
        Interaction::ALL
            .iter()
            .fold(0.0, |acc, term| acc + term.rate(species, params, self))
    }
}

/// A step that could not be clamped into a finite field.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NumericalFault {
    #[error("{species} concentration became NaN at row {row}, column {col}")]
    NotANumber {
        species: Species,
        row: usize,
        col: usize,
    },
    #[error("noise amplitude must be finite (got {0})")]
    InvalidNoise(f32),
}

/// Per-step Gaussian noise stream.
///
/// The stream is a pure function of `(seed, step)`, so re-running a session
/// from the same seed reproduces the same trajectory.
pub struct NoiseSource {
    rng: StdRng,
    normal: Normal<f32>,
}

impl NoiseSource {
    /// Noise stream for producing `step`. Returns `Ok(None)` when the
    /// amplitude is zero.
    pub fn for_step(
        seed: u64,
        step: u64,
        amplitude: f32,
    ) -> Result<Option<Self>, NumericalFault> {
        if amplitude == 0.0 {
            return Ok(None);
        }
        if !amplitude.is_finite() {
            return Err(NumericalFault::InvalidNoise(amplitude));
        }
        let normal =
            Normal::new(0.0, amplitude.abs()).map_err(|_| NumericalFault::InvalidNoise(amplitude))?;

        Ok(Some(Self {
            rng: StdRng::seed_from_u64(stream_seed(seed, step)),
            normal,
        }))
    }

    #[inline]
    pub fn sample(&mut self) -> f32 {
        self.normal.sample(&mut self.rng)
    }

    fn perturb(&mut self, grid: &mut Grid) {
        for v in grid.as_mut_slice() {
            *v += self.sample();
        }
    }
}

/// SplitMix64 finaliser over `seed` and `step`.
fn stream_seed(seed: u64, step: u64) -> u64 {
    let mut z = seed ^ step.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Gray-Scott stepper with reusable Laplacian scratch buffers.
pub struct Integrator {
    lap_a: Grid,
    lap_b: Grid,
}

impl Integrator {
    /// Create an integrator for `rows x cols` fields.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            lap_a: Grid::filled(rows, cols, 0.0),
            lap_b: Grid::filled(rows, cols, 0.0),
        }
    }

    /// Compute the field after one step. `field` is not modified.
    pub fn step(
        &mut self,
        field: &Field,
        params: &Parameters,
        noise: Option<&mut NoiseSource>,
    ) -> Result<Field, NumericalFault> {
        let rows = field.rows();
        let cols = field.cols();
        if self.lap_a.shape() != (rows, cols) {
            *self = Self::new(rows, cols);
        }

        // 1. Diffusion stencils.
        laplacian_into(&field.activator, &mut self.lap_a);
        laplacian_into(&field.inhibitor, &mut self.lap_b);

        // 2. Reaction-diffusion update.
        let mut next = Field::uniform(rows, cols, 0.0, 0.0);
        let inputs = (
            field.activator.as_slice(),
            field.inhibitor.as_slice(),
            self.lap_a.as_slice(),
            self.lap_b.as_slice(),
        );

        let next_a = next.activator.as_mut_slice();
        let next_b = next.inhibitor.as_mut_slice();
        if rows * cols >= PARALLEL_THRESHOLD {
            next_a
                .par_chunks_mut(cols)
                .zip(next_b.par_chunks_mut(cols))
                .enumerate()
                .for_each(|(row, (out_a, out_b))| {
                    update_row(inputs, params, row * cols, out_a, out_b);
                });
        } else {
            for (row, (out_a, out_b)) in next_a
                .chunks_mut(cols)
                .zip(next_b.chunks_mut(cols))
                .enumerate()
            {
                update_row(inputs, params, row * cols, out_a, out_b);
            }
        }

        // 3. Noise, drawn sequentially so the result is independent of threading.
        if let Some(noise) = noise {
            noise.perturb(&mut next.activator);
            noise.perturb(&mut next.inhibitor);
        }

        // 4. Clamp; NaN survives clamping and is reported instead.
        next.clamp_unit();
        for species in [Species::Activator, Species::Inhibitor] {
            let grid = next.grid(species);
            if let Some(i) = grid.first_nan() {
                return Err(NumericalFault::NotANumber {
                    species,
                    row: i / cols,
                    col: i % cols,
                });
            }
        }

        Ok(next)
    }

    /// Step `field` in place. On error `field` is left unchanged.
    pub fn advance(
        &mut self,
        field: &mut Field,
        params: &Parameters,
        noise: Option<&mut NoiseSource>,
    ) -> Result<(), NumericalFault> {
        *field = self.step(field, params, noise)?;
        Ok(())
    }
}

type RowInputs<'a> = (&'a [f32], &'a [f32], &'a [f32], &'a [f32]);

#[inline]
fn update_row(
    (a, b, lap_a, lap_b): RowInputs<'_>,
    params: &Parameters,
    offset: usize,
    out_a: &mut [f32],
    out_b: &mut [f32],
) {
    let dt = params.dt;
    for (j, (oa, ob)) in out_a.iter_mut().zip(out_b.iter_mut()).enumerate() {
        let i = offset + j;
        let cell = CellInputs {
            a: a[i],
            b: b[i],
            lap_a: lap_a[i],
            lap_b: lap_b[i],
        };
        *oa = cell.a + dt * cell.derivative(Species::Activator, params);
        *ob = cell.b + dt * cell.derivative(Species::Inhibitor, params);
    }
}
