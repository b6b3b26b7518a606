//! Simulation sessions and the threads that drive them.
//!
//! - [`Session`]: single-owner state (current field, coefficients, history)
//! - [`SessionHost`]: lock-guarded session shared with a background tick
//!   thread and a single-flight batch worker

mod batch;
mod error;
mod host;
mod scheduler;
mod shared;
mod state;

pub use batch::{BatchPlan, BatchReport, BatchRunner, BatchStatus, CHUNK_STEPS};
pub use error::SessionError;
pub use host::{RunState, SessionHost};
pub use scheduler::BackgroundScheduler;
pub use state::{HistoryFrame, Session, StateSnapshot};
