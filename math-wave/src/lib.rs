//! Helmholtz kernels and analytical solutions
//!
//! This crate provides the free-space Helmholtz Green's function (with
//! complex, attenuating wavenumbers), the special functions needed by Mie
//! series, and exact solutions used to validate the volume-integral solver.
//!
//! # Features
//!
//! - **Green's functions**: G = exp(ikr)/(4πr), its gradient, and its
//!   integral over a small sphere (self-patch regularization)
//! - **Special functions**: spherical Bessel jₙ/yₙ, Legendre Pₙ
//! - **Penetrable sphere**: Mie series for a fluid sphere with sound-speed
//!   and density contrast under plane-wave incidence
//!
//! # Example
//!
//! ```rust
//! use math_audio_wave::analytical::{PenetrableSphere, Point};
//!
//! let sphere = PenetrableSphere::new(1.0, 1.0, 1.2, 1.0, 1.0);
//! let p = sphere.total_field(&Point::new(2.0, 0.0, 0.0));
//! assert!(p.norm() > 0.0);
//! ```

pub mod analytical;
pub mod special;

pub use analytical::{Point, ReferenceField};
