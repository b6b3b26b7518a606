//! Named initial-condition generators.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::Field;

/// Columns between stripe starts.
const STRIPE_PERIOD: usize = 20;
/// Width of each stripe in columns.
const STRIPE_WIDTH: usize = 3;
/// Half-width of the centred square.
const CENTER_HALF_SIZE: usize = 5;
/// Amplitude of the uniform perturbation added to both species.
const PERTURBATION: f32 = 0.01;

/// Initial-condition pattern. Every pattern starts from `A = 1, B = 0`,
/// seeds some regions with `A = 0, B = 1`, then adds a small uniform
/// perturbation from a fixed seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Vertical bands of width 3 at every 20th column.
    #[default]
    Stripes,
    /// One square of side 10 at the grid centre. Along an axis of 10 cells
    /// or fewer it saturates to the whole axis rather than seeding nothing,
    /// which a negative slice start would do.
    CenterSquare,
    /// `rows * cols / 20` squares of random size (half-width 2..6) at random
    /// positions. Squares wrap across edges like the rest of the torus,
    /// unlike a plain slice fill, which would cut them at the border.
    Random,
}

impl Pattern {
    /// Parse a pattern name. Accepts `stripes`, `center_square` and `random`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "stripes" => Some(Pattern::Stripes),
            "center_square" | "center" | "square" => Some(Pattern::CenterSquare),
            "random" => Some(Pattern::Random),
            _ => None,
        }
    }

    /// Parse a pattern name, falling back to [`Pattern::Stripes`] for unknown
    /// names.
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            log::warn!("unknown pattern {name:?}, falling back to stripes");
            Pattern::Stripes
        })
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Stripes => "stripes",
            Pattern::CenterSquare => "center_square",
            Pattern::Random => "random",
        }
    }

    /// Generate the initial field. Deterministic in `(rows, cols, seed)`.
    pub fn generate(&self, rows: usize, cols: usize, seed: u64) -> Field {
        let mut field = Field::uniform(rows, cols, 1.0, 0.0);
        let mut rng = StdRng::seed_from_u64(seed);

        match self {
            Pattern::Stripes => {
                for start in (0..cols).step_by(STRIPE_PERIOD) {
                    for col in start..(start + STRIPE_WIDTH).min(cols) {
                        for row in 0..rows {
                            seed_cell(&mut field, row, col);
                        }
                    }
                }
            }
            Pattern::CenterSquare => {
                let (cr, cc) = (rows / 2, cols / 2);
                let row_range =
                    cr.saturating_sub(CENTER_HALF_SIZE)..(cr + CENTER_HALF_SIZE).min(rows);
                let col_range =
                    cc.saturating_sub(CENTER_HALF_SIZE)..(cc + CENTER_HALF_SIZE).min(cols);
                for row in row_range {
                    for col in col_range.clone() {
                        seed_cell(&mut field, row, col);
                    }
                }
            }
            Pattern::Random => {
                let count = (rows * cols) / 20;
                for _ in 0..count {
                    let r = rng.gen_range(0..rows) as i64;
                    let c = rng.gen_range(0..cols) as i64;
                    let size = rng.gen_range(2..6) as i64;
                    for dr in -size..size {
                        for dc in -size..size {
                            let i = field.activator.wrapped_idx(r + dr, c + dc);
                            field.activator.as_mut_slice()[i] = 0.0;
                            field.inhibitor.as_mut_slice()[i] = 1.0;
                        }
                    }
                }
            }
        }

        for v in field.activator.as_mut_slice() {
            *v += rng.gen_range(-PERTURBATION..PERTURBATION);
        }
        for v in field.inhibitor.as_mut_slice() {
            *v += rng.gen_range(-PERTURBATION..PERTURBATION);
        }
        field.clamp_unit();

        field
    }
}

#[inline]
fn seed_cell(field: &mut Field, row: usize, col: usize) {
    field.activator.set(row, col, 0.0);
    field.inhibitor.set(row, col, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_falls_back_to_stripes() {
        assert_eq!(Pattern::from_name("random"), Pattern::Random);
        assert_eq!(Pattern::from_name("center_square"), Pattern::CenterSquare);
        // Lenient default: unknown names are not an error.
        assert_eq!(Pattern::from_name("spirals"), Pattern::Stripes);
        assert_eq!(Pattern::parse("spirals"), None);
    }

    #[test]
    fn test_stripes_layout() {
        let field = Pattern::Stripes.generate(8, 45, 42);

        for col in [0, 1, 2, 20, 21, 22, 40, 41, 42] {
            for row in 0..8 {
                assert!(field.inhibitor.get(row, col) > 0.98);
                assert!(field.activator.get(row, col) < 0.02);
            }
        }
        for col in [3, 10, 19, 23, 39, 43, 44] {
            for row in 0..8 {
                assert!(field.inhibitor.get(row, col) < 0.02);
                assert!(field.activator.get(row, col) > 0.98);
            }
        }
    }

    #[test]
    fn test_center_square_layout() {
        let field = Pattern::CenterSquare.generate(32, 32, 42);
        assert!(field.inhibitor.get(16, 16) > 0.98);
        assert!(field.inhibitor.get(11, 11) > 0.98);
        assert!(field.inhibitor.get(20, 20) > 0.98);
        assert!(field.inhibitor.get(21, 21) < 0.02);
        assert!(field.inhibitor.get(0, 0) < 0.02);
    }

    #[test]
    fn test_center_square_small_grid_does_not_panic() {
        let field = Pattern::CenterSquare.generate(3, 4, 1);
        assert!(field.inhibitor.as_slice().iter().all(|&v| v > 0.98));
    }

    #[test]
    fn test_random_is_deterministic_per_seed() {
        let a = Pattern::Random.generate(24, 24, 7);
        let b = Pattern::Random.generate(24, 24, 7);
        let c = Pattern::Random.generate(24, 24, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_generated_values_in_unit_range() {
        for pattern in [Pattern::Stripes, Pattern::CenterSquare, Pattern::Random] {
            let field = pattern.generate(20, 30, 3);
            for &v in field
                .activator
                .as_slice()
                .iter()
                .chain(field.inhibitor.as_slice())
            {
                assert!((0.0..=1.0).contains(&v), "{} produced {}", pattern.name(), v);
            }
        }
    }

    #[test]
    fn test_pattern_serde_names() {
        let json = serde_json::to_string(&Pattern::CenterSquare).unwrap();
        assert_eq!(json, "\"center_square\"");
    }
}
