//! Configuration types for Gray-Scott sessions.

use serde::{Deserialize, Serialize};

use super::Pattern;

fn default_seed() -> u64 {
    42
}

fn default_tick_rate() -> f64 {
    30.0
}

fn default_true() -> bool {
    true
}

fn default_brush_radius() -> u32 {
    10
}

/// Reaction-diffusion coefficients.
///
/// Values are not range-checked: any finite value is accepted and simply
/// produces different (possibly unstable, still clamped) dynamics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Diffusion rate of the activator.
    #[serde(rename = "Da", alias = "Du")]
    pub da: f32,
    /// Diffusion rate of the inhibitor.
    #[serde(rename = "Db", alias = "Dv")]
    pub db: f32,
    /// Feed rate.
    #[serde(rename = "F")]
    pub f: f32,
    /// Kill rate.
    pub k: f32,
    /// Time step.
    pub dt: f32,
    /// Standard deviation of per-cell Gaussian noise (0 disables noise).
    #[serde(alias = "noise_level")]
    pub noise: f32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            da: 0.16,
            db: 0.08,
            f: 0.055,
            k: 0.062,
            dt: 1.0,
            noise: 0.0,
        }
    }
}

impl Parameters {
    /// Merge the fields present in `update`; absent fields keep their value.
    pub fn apply(&mut self, update: &ParamUpdate) {
        if let Some(v) = update.da {
            self.da = v;
        }
        if let Some(v) = update.db {
            self.db = v;
        }
        if let Some(v) = update.f {
            self.f = v;
        }
        if let Some(v) = update.k {
            self.k = v;
        }
        if let Some(v) = update.dt {
            self.dt = v;
        }
        if let Some(v) = update.noise {
            self.noise = v;
        }
    }
}

/// Partial parameter update. `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamUpdate {
    #[serde(rename = "Da", alias = "Du", default, skip_serializing_if = "Option::is_none")]
    pub da: Option<f32>,
    #[serde(rename = "Db", alias = "Dv", default, skip_serializing_if = "Option::is_none")]
    pub db: Option<f32>,
    #[serde(rename = "F", default, skip_serializing_if = "Option::is_none")]
    pub f: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dt: Option<f32>,
    #[serde(alias = "noise_level", default, skip_serializing_if = "Option::is_none")]
    pub noise: Option<f32>,
}

impl ParamUpdate {
    /// Build an update from an arbitrary JSON object.
    ///
    /// Recognised keys with numeric values are taken; unknown keys, non-numeric
    /// values and non-object inputs are ignored.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut update = Self::default();
        let Some(map) = value.as_object() else {
            return update;
        };

        for (key, raw) in map {
            let Some(v) = raw.as_f64() else {
                log::debug!("ignoring non-numeric parameter {key}={raw}");
                continue;
            };
            let v = v as f32;
            match key.as_str() {
                "Da" | "Du" => update.da = Some(v),
                "Db" | "Dv" => update.db = Some(v),
                "F" => update.f = Some(v),
                "k" => update.k = Some(v),
                "dt" => update.dt = Some(v),
                "noise" | "noise_level" => update.noise = Some(v),
                _ => log::debug!("ignoring unknown parameter {key}"),
            }
        }

        update
    }

    /// True if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything needed to build a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Grid height in cells.
    pub rows: usize,
    /// Grid width in cells.
    pub cols: usize,
    /// Initial coefficients.
    #[serde(default)]
    pub params: Parameters,
    /// Initial-condition generator used by `init`.
    #[serde(default)]
    pub pattern: Pattern,
    /// Seed for initial-condition perturbation and step noise.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Background stepping rate in steps per second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f64,
    /// Keep activator grids in history as well as inhibitor grids.
    #[serde(default = "default_true")]
    pub retain_activator: bool,
    /// Brush radius used when `interact` is called without one.
    #[serde(default = "default_brush_radius")]
    pub brush_radius: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rows: 256,
            cols: 256,
            params: Parameters::default(),
            pattern: Pattern::default(),
            seed: default_seed(),
            tick_rate_hz: default_tick_rate(),
            retain_activator: true,
            brush_radius: default_brush_radius(),
        }
    }
}

impl SessionConfig {
    /// Same settings with different grid dimensions.
    pub fn with_dimensions(&self, rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ..self.clone()
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::InvalidDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz <= 0.0 {
            return Err(ConfigError::InvalidTickRate(self.tick_rate_hz));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Grid dimensions must be non-zero (got {rows}x{cols})")]
    InvalidDimensions { rows: usize, cols: usize },
    #[error("Tick rate must be positive and finite (got {0})")]
    InvalidTickRate(f64),
}
