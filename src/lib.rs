//! Gray-Scott reaction-diffusion with full step history.
//!
//! This crate simulates the Gray-Scott model on a toroidal grid and records
//! every step, so any earlier state can be played back while the simulation
//! keeps running in the background and users paint new inhibitor into it.
//!
//! # Architecture
//!
//! - `compute`: grids, the periodic Laplacian, the explicit-Euler integrator
//!   and field statistics
//! - `schema`: coefficients, session configuration and initial patterns
//! - `history`: the append-only step history
//! - `session`: the session state machine, background stepping and batches
//! - `archive`: binary export of a session's history
//!
//! # Example
//!
//! ```rust,no_run
//! use gray_scott::{ParamUpdate, SessionConfig, SessionHost};
//!
//! let host = SessionHost::new(SessionConfig::default())?;
//! host.init(128, 128)?;
//!
//! // Tweak the feed rate, then run 500 steps on the calling thread.
//! host.update_params(&ParamUpdate {
//!     f: Some(0.04),
//!     ..Default::default()
//! })?;
//! host.simulate_steps(500)?;
//!
//! // Paint, then look back at an earlier step.
//! host.interact(64, 64, Some(8))?;
//! let earlier = host.get_state(Some(250))?;
//! println!("step {} of {}", earlier.step, earlier.max_step);
//! # Ok::<(), gray_scott::SessionError>(())
//! ```

pub mod archive;
pub mod compute;
pub mod history;
pub mod schema;
pub mod session;

// Re-export commonly used types
pub use compute::{Field, FieldStats, Grid, Integrator};
pub use history::{HistoryEntry, HistoryStore};
pub use schema::{ParamUpdate, Parameters, Pattern, SessionConfig};
pub use session::{RunState, Session, SessionError, SessionHost, StateSnapshot};
