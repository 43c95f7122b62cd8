//! Forward cascade of nonlinear harmonics
//!
//! Starting from the fundamental pressure P₀ at frequency f₁, harmonic h
//! (frequency (h+1)f₁) is radiated by a quadratic source built from lower
//! harmonics:
//!
//! ```text
//! F_h = -C_h · β ω₁² / (ρ c⁴) · Q_h
//!
//! h = 1:  C =  2,  Q = P₀²
//! h = 2:  C =  9,  Q = P₀ P₁
//! h = 3:  C =  8,  Q = P₁² + 2 P₀ P₂
//! h = 4:  C = 25,  Q = P₀ P₃ + P₁ P₂
//! ```
//!
//! and `P_h = S_h(F_h)` where `S_h` is the volume potential at
//! `k_h = 2π(h+1)f₁/c + i·α((h+1)f₁)`. Each step builds its own kernel and
//! embedding and drops them before the next one.

use crate::circulant::CirculantEmbedding;
use crate::error::{Result, VieError};
use crate::grid::VoxelGrid;
use crate::kernel::assemble_potential;
use crate::operator::{ContrastOperator, VolumeOperator};
use ndarray::Array3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Instant;

/// Fundamental plus four generated harmonics
pub const MAX_HARMONICS: usize = 5;

/// Propagation medium with power-law absorption
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Medium {
    /// Sound speed c (m/s)
    pub speed_of_sound: f64,
    /// Density ρ (kg/m³)
    pub density: f64,
    /// Absorption prefactor α₀ (Np/m/MHz^η)
    pub alpha0: f64,
    /// Absorption power law exponent η
    pub eta: f64,
    /// Nonlinearity coefficient β
    pub nonlinearity: f64,
}

impl Default for Medium {
    /// Water
    fn default() -> Self {
        Self {
            speed_of_sound: 1487.0,
            density: 998.0,
            alpha0: 0.217,
            eta: 2.0,
            nonlinearity: 3.5,
        }
    }
}

impl Medium {
    pub fn validate(&self) -> Result<()> {
        if !(self.speed_of_sound.is_finite() && self.speed_of_sound > 0.0) {
            return Err(VieError::invalid("speed_of_sound", "must be positive"));
        }
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(VieError::invalid("density", "must be positive"));
        }
        if !(self.alpha0 >= 0.0 && self.eta.is_finite()) {
            return Err(VieError::invalid("alpha0", "absorption must be non-negative"));
        }
        Ok(())
    }

    /// α(f) = α₀ (f / 1 MHz)^η in Np/m
    pub fn attenuation(&self, frequency: f64) -> f64 {
        self.alpha0 * (frequency * 1e-6).powf(self.eta)
    }

    /// 2πf/c + i α(f)
    pub fn wavenumber(&self, frequency: f64) -> Complex64 {
        Complex64::new(
            2.0 * PI * frequency / self.speed_of_sound,
            self.attenuation(frequency),
        )
    }

    /// Wavelength at `frequency`
    pub fn wavelength(&self, frequency: f64) -> f64 {
        self.speed_of_sound / frequency
    }
}

/// Harmonic fields in order, fundamental first
#[derive(Debug, Clone)]
pub struct HarmonicStack {
    fundamental_frequency: f64,
    fields: Vec<Array3<Complex64>>,
}

impl HarmonicStack {
    /// Stack holding only the fundamental
    pub fn new(fundamental_frequency: f64, fundamental: Array3<Complex64>) -> Self {
        Self {
            fundamental_frequency,
            fields: vec![fundamental],
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, harmonic: usize) -> Option<&Array3<Complex64>> {
        self.fields.get(harmonic)
    }

    pub fn fields(&self) -> &[Array3<Complex64>] {
        &self.fields
    }

    /// Frequency of harmonic index `h`, (h+1)·f₁
    pub fn frequency(&self, harmonic: usize) -> f64 {
        (harmonic + 1) as f64 * self.fundamental_frequency
    }

    fn push(&mut self, field: Array3<Complex64>) {
        self.fields.push(field);
    }
}

/// Driver for the harmonic cascade on one grid
#[derive(Debug, Clone)]
pub struct HarmonicCascade {
    medium: Medium,
    grid: VoxelGrid,
    fundamental_frequency: f64,
}

impl HarmonicCascade {
    pub fn new(medium: Medium, grid: VoxelGrid, fundamental_frequency: f64) -> Result<Self> {
        medium.validate()?;
        if !(fundamental_frequency.is_finite() && fundamental_frequency > 0.0) {
            return Err(VieError::invalid(
                "frequency",
                format!("must be positive, got {fundamental_frequency}"),
            ));
        }
        Ok(Self {
            medium,
            grid,
            fundamental_frequency,
        })
    }

    pub fn medium(&self) -> &Medium {
        &self.medium
    }

    /// Source term for harmonic `harmonic` (1..MAX_HARMONICS) from the lower
    /// harmonics already in `stack`
    pub fn forcing(&self, harmonic: usize, stack: &HarmonicStack) -> Result<Array3<Complex64>> {
        if harmonic == 0 || harmonic >= MAX_HARMONICS {
            return Err(VieError::invalid(
                "harmonic",
                format!("forcing defined for 1..{MAX_HARMONICS}, got {harmonic}"),
            ));
        }
        if stack.len() < harmonic {
            return Err(VieError::invalid(
                "harmonic",
                format!("needs {harmonic} lower harmonics, stack holds {}", stack.len()),
            ));
        }
        let p = stack.fields();
        for field in &p[..harmonic] {
            self.grid.check_field(field, "harmonic field")?;
        }

        let (coefficient, quadratic) = match harmonic {
            1 => (2.0, &p[0] * &p[0]),
            2 => (9.0, &p[0] * &p[1]),
            3 => (8.0, &p[1] * &p[1] + &(&p[0] * &p[2]).mapv(|v| v * 2.0)),
            _ => (25.0, &p[0] * &p[3] + &(&p[1] * &p[2])),
        };

        let omega = 2.0 * PI * self.fundamental_frequency;
        let c = self.medium.speed_of_sound;
        let prefactor = -coefficient * self.medium.nonlinearity * omega * omega
            / (self.medium.density * c.powi(4));
        Ok(quadratic.mapv(|q| q * prefactor))
    }

    /// Append the next harmonic to `stack`
    pub fn step(&self, stack: &mut HarmonicStack) -> Result<()> {
        let harmonic = stack.len();
        let started = Instant::now();
        let forcing = self.forcing(harmonic, stack)?;

        let k = self
            .medium
            .wavenumber((harmonic + 1) as f64 * self.fundamental_frequency);
        let kernel = assemble_potential(k, &self.grid)?;
        let embedding = Arc::new(CirculantEmbedding::new(&kernel));
        let operator = ContrastOperator::unit(self.grid, embedding)?;
        let field = operator.apply_field(&forcing)?;

        log::info!(
            "Harmonic {} (k = {:.2}): max |p| = {:.4e}, {:.2?}",
            harmonic + 1,
            k,
            field.iter().map(|v| v.norm()).fold(0.0, f64::max),
            started.elapsed()
        );
        stack.push(field);
        Ok(())
    }

    /// Run the cascade from `fundamental` up to `num_harmonics` fields
    pub fn run(&self, fundamental: Array3<Complex64>, num_harmonics: usize) -> Result<HarmonicStack> {
        if num_harmonics == 0 || num_harmonics > MAX_HARMONICS {
            return Err(VieError::invalid(
                "num_harmonics",
                format!("must lie in 1..={MAX_HARMONICS}, got {num_harmonics}"),
            ));
        }
        self.grid.check_field(&fundamental, "fundamental")?;
        let mut stack = HarmonicStack::new(self.fundamental_frequency, fundamental);
        while stack.len() < num_harmonics {
            self.step(&mut stack)?;
        }
        Ok(stack)
    }
}
