//! Iterative solvers for linear systems
//!
//! - [`gmres`]: GMRES(m) with restart, the method used for the volume
//!   integral equation

mod gmres;

pub use gmres::{GmresConfig, GmresSolution, SolverStatus, gmres, gmres_with_guess};
