//! Schema module - Configuration and initial-condition types for Gray-Scott sessions.

mod config;
mod pattern;

pub use config::*;
pub use pattern::*;
