//! Helmholtz Green's function and derivatives
//!
//! The 3D Helmholtz Green's function is:
//! ```text
//! G(r) = exp(ik|r|) / (4π|r|)
//! ```
//!
//! The wavenumber is complex throughout: a positive imaginary part models
//! absorption, `exp(ikr) = exp(i Re(k) r) · exp(-Im(k) r)`.

use num_complex::Complex64;
use std::f64::consts::PI;

/// Below this |k·a| the self-patch integral switches to its Taylor series.
const SELF_PATCH_SERIES_LIMIT: f64 = 1e-4;

/// exp(i k r) for complex k
#[inline]
pub fn phase_factor(k: Complex64, r: f64) -> Complex64 {
    (Complex64::i() * k * r).exp()
}

/// 3D Helmholtz Green's function G = exp(ikr)/(4πr)
///
/// # Arguments
/// * `r` - Distance |x - y| (must be > 0)
/// * `k` - Complex wave number
///
/// # Example
/// ```
/// use math_audio_wave::special::helmholtz::greens_function_3d;
/// use num_complex::Complex64;
///
/// let g = greens_function_3d(1.0, Complex64::new(2.0, 0.0));
/// assert!((g.norm() - 1.0 / (4.0 * std::f64::consts::PI)).abs() < 1e-12);
/// ```
#[inline]
pub fn greens_function_3d(r: f64, k: Complex64) -> Complex64 {
    if r < 1e-15 {
        return Complex64::new(f64::INFINITY, 0.0);
    }
    phase_factor(k, r) / (4.0 * PI * r)
}

/// Gradient of G with respect to its argument, evaluated at offset `delta`
///
/// ```text
/// ∇G(Δ) = (ik - 1/r) G(r) Δ/r,   r = |Δ|
/// ```
///
/// The gradient is odd: ∇G(-Δ) = -∇G(Δ). Returns zeros at Δ = 0, the value
/// of its average over any symmetric neighbourhood of the origin.
pub fn greens_function_gradient_3d(delta: [f64; 3], k: Complex64) -> [Complex64; 3] {
    let r = (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt();
    if r < 1e-15 {
        return [Complex64::new(0.0, 0.0); 3];
    }

    let g = greens_function_3d(r, k);
    let factor = (Complex64::i() * k - 1.0 / r) * g / r;

    [factor * delta[0], factor * delta[1], factor * delta[2]]
}

/// Integral of G over a ball of radius `a` centred on the singularity
///
/// ```text
/// ∫_{|r|<a} G dV = ∫₀ᵃ r exp(ikr) dr = (1/k² - ia/k) exp(ika) - 1/k²
/// ```
///
/// Finite for every `k`, including the static limit where it tends to a²/2.
pub fn greens_function_ball_integral(a: f64, k: Complex64) -> Complex64 {
    let ka = k * a;
    if ka.norm() < SELF_PATCH_SERIES_LIMIT {
        // a²/2 + ik a³/3 + O(k² a⁴)
        return Complex64::new(a * a / 2.0, 0.0) + Complex64::i() * k * a.powi(3) / 3.0;
    }
    let inv_k2 = 1.0 / (k * k);
    (inv_k2 - Complex64::i() * a / k) * phase_factor(k, a) - inv_k2
}

/// Radius of the ball with the same volume as a cube of edge `dx`
#[inline]
pub fn equivalent_ball_radius(dx: f64) -> f64 {
    (3.0 / (4.0 * PI) * dx.powi(3)).cbrt()
}
