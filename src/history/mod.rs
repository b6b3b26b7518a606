//! History module - Append-only record of every committed step.

mod store;

pub use store::*;
