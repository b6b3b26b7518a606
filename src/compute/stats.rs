//! Summary statistics for monitoring a field.

use serde::{Deserialize, Serialize};

use super::{Field, Grid};

/// Inhibitor level above which a cell counts as part of a pattern.
pub const ACTIVE_THRESHOLD: f32 = 0.1;

/// Statistics of one species grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeciesStats {
    pub total: f32,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl SpeciesStats {
    pub fn from_grid(grid: &Grid) -> Self {
        let mut total = 0.0f32;
        let mut max = f32::NEG_INFINITY;
        let mut min = f32::INFINITY;

        for &v in grid.as_slice() {
            total += v;
            max = max.max(v);
            min = min.min(v);
        }

        Self {
            total,
            min,
            max,
            mean: total / grid.len() as f32,
        }
    }
}

/// Field statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub activator: SpeciesStats,
    pub inhibitor: SpeciesStats,
    /// Cells whose inhibitor exceeds [`ACTIVE_THRESHOLD`].
    pub active_cells: usize,
}

impl FieldStats {
    /// Compute statistics from a field.
    pub fn from_field(field: &Field) -> Self {
        Self {
            activator: SpeciesStats::from_grid(&field.activator),
            inhibitor: SpeciesStats::from_grid(&field.inhibitor),
            active_cells: field
                .inhibitor
                .as_slice()
                .iter()
                .filter(|&&v| v > ACTIVE_THRESHOLD)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_field_stats() {
        let field = Field::uniform(4, 5, 1.0, 0.0);
        let stats = FieldStats::from_field(&field);

        assert_eq!(stats.activator.total, 20.0);
        assert_eq!(stats.activator.mean, 1.0);
        assert_eq!(stats.inhibitor.max, 0.0);
        assert_eq!(stats.active_cells, 0);
    }

    #[test]
    fn test_painted_cells_are_active() {
        let mut field = Field::uniform(8, 8, 1.0, 0.0);
        field.paint_disk(4, 4, 1);
        let stats = FieldStats::from_field(&field);

        assert_eq!(stats.active_cells, 5);
        assert_eq!(stats.inhibitor.max, 1.0);
        assert_eq!(stats.activator.min, 0.0);
    }
}
