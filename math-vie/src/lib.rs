//! # Volume-integral acoustics on voxel grids
//!
//! Matrix-free volume integral operators for wave propagation through
//! voxelized heterogeneous media, accelerated by circulant embedding and the
//! FFT, plus the sources that drive them.
//!
//! ## Pipeline
//!
//! ```text
//! VoxelGrid + InclusionMask + ContrastFields
//!     -> kernel::assemble_potential / assemble_gradient   (Toeplitz lag tensors)
//!     -> circulant::CirculantEmbedding                    (cached spectra)
//!     -> operator::*                                      (LinearOperator for GMRES)
//!
//! transducer::BowlTransducer -> SourcePointSet -> fundamental field
//!     -> cascade::HarmonicCascade                         (one fresh kernel per harmonic)
//! ```
//!
//! ## Features
//!
//! - `native` (default): rayon parallelism for kernel assembly, FFT lanes
//!   and point-source summation. Without it everything runs sequentially.
//!
//! ## Example
//!
//! ```no_run
//! use math_audio_vie::config::ScatteringConfig;
//!
//! let config = ScatteringConfig::default();
//! let problem = config.problem()?;
//! let solution = problem.solve(&config.solver.gmres())?;
//! println!("GMRES: {:?} after {} iterations", solution.status, solution.iterations);
//! # Ok::<(), math_audio_vie::VieError>(())
//! ```

pub mod cascade;
pub mod circulant;
pub mod config;
pub mod contrast;
pub mod error;
pub mod fft;
pub mod grid;
pub mod hifu;
pub mod kernel;
pub mod operator;
pub mod output;
pub mod parallel;
pub mod scattering;
pub mod transducer;

pub use cascade::{HarmonicCascade, HarmonicStack, MAX_HARMONICS, Medium};
pub use circulant::{CirculantEmbedding, GradientEmbedding};
pub use contrast::{ContrastFields, DensityCoupling};
pub use error::{Result, VieError};
pub use grid::{InclusionMask, VoxelGrid};
pub use kernel::{GradientKernel, ToeplitzKernel, assemble_gradient, assemble_potential};
pub use operator::{
    ContrastOperator, DensityCoupledOperator, FullDomainOperator, GradientOperator,
    ScalarMaskedOperator, VolumeOperator,
};
pub use scattering::{PlaneWave, ScatteringProblem, ScatteringSolution};
pub use transducer::{BowlAxis, BowlTransducer, CancellationToken, SourcePointSet};
