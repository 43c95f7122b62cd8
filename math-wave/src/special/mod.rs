//! Special mathematical functions for wave equations
//!
//! - Helmholtz Green's function and gradient (complex wavenumber)
//! - Spherical Bessel functions (jₙ, yₙ) and their derivatives
//! - Legendre polynomials (Pₙ)

pub mod helmholtz;
mod legendre;
pub mod spherical;

pub use helmholtz::*;
pub use legendre::*;
pub use spherical::*;
