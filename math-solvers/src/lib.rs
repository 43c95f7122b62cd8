//! Krylov solvers for matrix-free volume-integral operators
//!
//! This crate provides the iterative solver consumed by the voxel
//! volume-integral engine. The solver only needs a matrix-vector product,
//! exposed through the [`LinearOperator`] trait, so FFT-accelerated operators
//! plug in without ever forming a matrix.
//!
//! # Features
//!
//! - **GMRES(m)** with restarts, an iteration budget and an optional
//!   wall-clock budget
//! - **Residual history** returned by the call itself, one entry per inner
//!   iteration
//! - **Generic Scalar Types**: works with `Complex64` and `f64`
//!
//! # Example
//!
//! ```ignore
//! use math_audio_solvers::{gmres, GmresConfig};
//!
//! let config = GmresConfig::default().with_tolerance(1e-4);
//! let solution = gmres(&operator, &rhs, &config);
//! println!("{} iterations, status {:?}", solution.iterations, solution.status);
//! for (i, r) in solution.residual_history.iter().enumerate() {
//!     println!("{i}: {r:.3e}");
//! }
//! ```

pub mod blas_helpers;
pub mod iterative;
pub mod traits;

pub use iterative::{GmresConfig, GmresSolution, SolverStatus, gmres, gmres_with_guess};
pub use traits::{ComplexField, DenseOperator, LinearOperator};
