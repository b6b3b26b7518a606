//! Session errors.

use crate::compute::NumericalFault;
use crate::schema::ConfigError;

/// Failures reported by session operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("No active session")]
    NoActiveSession,
    #[error("Invalid step {step} (max step is {max_step})")]
    InvalidStep { step: i64, max_step: u64 },
    #[error("A batch simulation is already running")]
    BatchAlreadyRunning,
    #[error("Grid dimensions must be positive (got {rows}x{cols})")]
    InvalidDimensions { rows: usize, cols: usize },
    #[error("Numerical fault while computing step {step}: {fault}")]
    NumericalFault {
        step: u64,
        #[source]
        fault: NumericalFault,
    },
    #[error("Invalid configuration: {0}")]
    Config(ConfigError),
    #[error("Failed to spawn {0} thread")]
    Spawn(&'static str),
    #[error("The {0} thread panicked")]
    Panicked(&'static str),
}

impl From<ConfigError> for SessionError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidDimensions { rows, cols } => {
                SessionError::InvalidDimensions { rows, cols }
            }
            other => SessionError::Config(other),
        }
    }
}
