//! Exact reference fields for validating the volume-integral solver
//!
//! Only the penetrable sphere is provided: a homogeneous fluid sphere with
//! sound-speed and density contrast under plane-wave incidence.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

mod penetrable_sphere;

pub use penetrable_sphere::*;

/// Cartesian observation point
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Distance to the origin
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y).hypot(self.z)
    }
}

impl From<[f64; 3]> for Point {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Exact pressure sampled at a list of points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceField {
    /// Human-readable description of the configuration
    pub label: String,
    pub positions: Vec<Point>,
    pub pressure: Vec<Complex64>,
    /// Exterior wavenumber
    pub wave_number: f64,
    /// Parameters that produced the field
    pub parameters: serde_json::Value,
}

impl ReferenceField {
    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty()
    }

    /// `‖values − p‖₂ / ‖p‖₂`, or the absolute error if the reference is zero
    ///
    /// # Panics
    /// If `values` and the reference differ in length.
    pub fn relative_l2_error(&self, values: &[Complex64]) -> f64 {
        assert_eq!(values.len(), self.len(), "sample count mismatch");
        let (err_sq, ref_sq) = values
            .iter()
            .zip(&self.pressure)
            .fold((0.0, 0.0), |(e, r), (v, p)| {
                (e + (v - p).norm_sqr(), r + p.norm_sqr())
            });
        if ref_sq < 1e-30 {
            err_sq.sqrt()
        } else {
            (err_sq / ref_sq).sqrt()
        }
    }
}
