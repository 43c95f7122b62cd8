//! Plane-wave scattering by a homogeneous fluid sphere
//!
//! Incident field exp(ik₀x) (propagating along +x), sphere of radius `a`
//! centred at the origin with interior wavenumber k₁ = n·k₀ and density ρ₁
//! in a medium of density ρ₀. With θ the angle from the +x axis:
//!
//! ```text
//! u_inc = Σ (2n+1) iⁿ jₙ(k₀r) Pₙ(cos θ)
//! u_sca = Σ (2n+1) iⁿ Aₙ hₙ⁽¹⁾(k₀r) Pₙ(cos θ)        r > a
//! u_int = Σ (2n+1) iⁿ Bₙ jₙ(k₁r) Pₙ(cos θ)          r < a
//! ```
//!
//! Pressure and normal velocity (1/ρ ∂u/∂r) are continuous on r = a. With
//! γ = (k₁ ρ₀)/(k₀ ρ₁):
//!
//! ```text
//! Aₙ = (γ jₙ(k₀a) jₙ'(k₁a) - jₙ'(k₀a) jₙ(k₁a)) / (hₙ'(k₀a) jₙ(k₁a) - γ hₙ(k₀a) jₙ'(k₁a))
//! Bₙ = (jₙ(k₀a) hₙ'(k₀a) - jₙ'(k₀a) hₙ(k₀a)) / (hₙ'(k₀a) jₙ(k₁a) - γ hₙ(k₀a) jₙ'(k₁a))
//! ```
//!
//! Bₙ is written with the exterior Wronskian so that it stays finite where
//! jₙ(k₁a) vanishes.

use super::{Point, ReferenceField};
use crate::special::{
    legendre_polynomials, spherical_bessel_j, spherical_bessel_j_derivative,
    spherical_hankel_first_kind, spherical_hankel_first_kind_derivative,
};
use num_complex::Complex64;

/// Fluid sphere under unit plane-wave incidence along +x
#[derive(Debug, Clone)]
pub struct PenetrableSphere {
    radius: f64,
    wave_number: f64,
    refractive_index: f64,
    density_interior: f64,
    density_exterior: f64,
    scattered: Vec<Complex64>,
    interior: Vec<Complex64>,
}

impl PenetrableSphere {
    /// Build the Mie coefficients
    ///
    /// # Arguments
    /// * `radius` - Sphere radius a
    /// * `wave_number` - Exterior wavenumber k₀
    /// * `refractive_index` - n = c₀/c₁ (real)
    /// * `density_interior` - ρ₁
    /// * `density_exterior` - ρ₀
    pub fn new(
        radius: f64,
        wave_number: f64,
        refractive_index: f64,
        density_interior: f64,
        density_exterior: f64,
    ) -> Self {
        let k1a = wave_number * refractive_index.max(1.0) * radius;
        let num_terms = k1a.ceil() as usize + 15;
        Self::with_terms(
            radius,
            wave_number,
            refractive_index,
            density_interior,
            density_exterior,
            num_terms,
        )
    }

    /// Build the Mie coefficients with an explicit truncation order
    pub fn with_terms(
        radius: f64,
        wave_number: f64,
        refractive_index: f64,
        density_interior: f64,
        density_exterior: f64,
        num_terms: usize,
    ) -> Self {
        let num_terms = num_terms.max(2);
        let x0 = wave_number * radius;
        let x1 = wave_number * refractive_index * radius;
        let gamma = refractive_index * density_exterior / density_interior;

        let j0 = spherical_bessel_j(num_terms, x0);
        let j0p = spherical_bessel_j_derivative(num_terms, x0);
        let j1 = spherical_bessel_j(num_terms, x1);
        let j1p = spherical_bessel_j_derivative(num_terms, x1);
        let h0 = spherical_hankel_first_kind(num_terms, x0);
        let h0p = spherical_hankel_first_kind_derivative(num_terms, x0);

        let mut scattered = Vec::with_capacity(num_terms);
        let mut interior = Vec::with_capacity(num_terms);
        for n in 0..num_terms {
            let numerator = Complex64::new(gamma * j0[n] * j1p[n] - j0p[n] * j1[n], 0.0);
            let denominator = h0p[n] * j1[n] - gamma * h0[n] * j1p[n];
            let a_n = numerator / denominator;
            let b_n = (j0[n] * h0p[n] - j0p[n] * h0[n]) / denominator;
            scattered.push(a_n);
            interior.push(b_n);
        }

        Self {
            radius,
            wave_number,
            refractive_index,
            density_interior,
            density_exterior,
            scattered,
            interior,
        }
    }

    /// Number of series terms retained
    pub fn num_terms(&self) -> usize {
        self.scattered.len()
    }

    /// Scattering coefficients Aₙ
    pub fn scattering_coefficients(&self) -> &[Complex64] {
        &self.scattered
    }

    /// Total field (incident + scattered outside, transmitted inside)
    pub fn total_field(&self, point: &Point) -> Complex64 {
        let r = point.norm();
        let cos_theta = if r < 1e-15 { 1.0 } else { point.x / r };
        let order = self.num_terms();
        let legendre = legendre_polynomials(order, cos_theta);

        if r <= self.radius {
            let jn = spherical_bessel_j(order, self.wave_number * self.refractive_index * r);
            self.interior
                .iter()
                .enumerate()
                .map(|(n, b_n)| mode_weight(n) * b_n * jn[n] * legendre[n])
                .sum()
        } else {
            let phase = self.wave_number * point.x;
            let incident = Complex64::new(phase.cos(), phase.sin());
            let hn = spherical_hankel_first_kind(order, self.wave_number * r);
            let scattered: Complex64 = self
                .scattered
                .iter()
                .enumerate()
                .map(|(n, a_n)| mode_weight(n) * a_n * hn[n] * legendre[n])
                .sum();
            incident + scattered
        }
    }

    /// Sample the total field at a set of points
    pub fn evaluate(&self, points: Vec<Point>) -> ReferenceField {
        let pressure = points.iter().map(|p| self.total_field(p)).collect();
        ReferenceField {
            label: format!(
                "Penetrable sphere (ka={:.2}, n={:.2})",
                self.wave_number * self.radius,
                self.refractive_index
            ),
            positions: points,
            pressure,
            wave_number: self.wave_number,
            parameters: serde_json::json!({
                "radius": self.radius,
                "refractive_index": self.refractive_index,
                "density_interior": self.density_interior,
                "density_exterior": self.density_exterior,
                "num_terms": self.num_terms(),
            }),
        }
    }
}

/// (2n+1) iⁿ
fn mode_weight(n: usize) -> Complex64 {
    let i_pow = match n % 4 {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, 1.0),
        2 => Complex64::new(-1.0, 0.0),
        _ => Complex64::new(0.0, -1.0),
    };
    i_pow * (2 * n + 1) as f64
}
