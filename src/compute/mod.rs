//! Compute module - Numerical kernels for Gray-Scott reaction-diffusion.

mod grid;
mod integrator;
mod stats;
mod stencil;

pub use grid::*;
pub use integrator::*;
pub use stats::*;
pub use stencil::*;
