//! Bowl transducer as a set of equal-area monopole sources
//!
//! The spherical cap between polar angles θ₁ = asin(inner/F) and
//! θ₂ = asin(outer/F) is cut into latitude bands of equal angular height and
//! each band into azimuthal cells of near-equal area (Deserno's equidistributed
//! sphere points restricted to a cap). Every cell becomes one point source
//! carrying the cell area as weight, so the synthesized field
//!
//! ```text
//! p(x) = Σ_s w · exp(ik|x - y_s|) / (4π|x - y_s|)
//! ```
//!
//! approximates the Rayleigh integral of a uniform bowl. Pairs closer than
//! [`MIN_SOURCE_DISTANCE`] are left out of the sum.

use crate::error::{Result, VieError};
use crate::parallel::{parallel_map, parallel_map_indexed};
use math_audio_wave::special::helmholtz::phase_factor;
use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Source-observation pairs at or below this distance (m) are skipped
pub const MIN_SOURCE_DISTANCE: f64 = 1e-3;

/// Radial samples on the power-calibration disk
pub const CALIBRATION_SAMPLES: usize = 500;

/// Fraction of the bowl depth at which the calibration disk sits
const CALIBRATION_DEPTH_FACTOR: f64 = 0.98;

/// Default half-width of the near-surface guard band (m)
pub const NEAR_SURFACE_TOLERANCE: f64 = 5e-4;

/// Observation points per cancellation check
const CANCELLATION_CHUNK: usize = 1024;

/// Principal axis the bowl faces along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BowlAxis {
    /// Apex on the -x side of the focus, beam along +x
    #[default]
    X,
    /// Apex on the -z side of the focus, beam along +z
    Z,
}

impl BowlAxis {
    /// Unit vector from apex towards focus
    pub fn direction(&self) -> [f64; 3] {
        match self {
            BowlAxis::X => [1.0, 0.0, 0.0],
            BowlAxis::Z => [0.0, 0.0, 1.0],
        }
    }

    /// A unit vector perpendicular to the beam
    pub fn radial(&self) -> [f64; 3] {
        match self {
            BowlAxis::X => [0.0, 0.0, 1.0],
            BowlAxis::Z => [1.0, 0.0, 0.0],
        }
    }

    /// Map a cap point in its local frame (apex on -z below the origin-centred
    /// sphere, focus at the origin) to world coordinates
    fn orient(&self, local: [f64; 3], focus: [f64; 3]) -> [f64; 3] {
        let [x, y, z] = local;
        match self {
            BowlAxis::Z => [focus[0] + x, focus[1] + y, focus[2] - z],
            BowlAxis::X => [focus[0] - z, focus[1] - x, focus[2] - y],
        }
    }
}

/// Spherical-cap transducer geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BowlTransducer {
    /// Radius of curvature F (m)
    pub focal_length: f64,
    /// Outer aperture radius (m)
    pub outer_radius: f64,
    /// Inner aperture radius, 0 for a closed bowl (m)
    #[serde(default)]
    pub inner_radius: f64,
    /// Geometric focus (m)
    pub focus: [f64; 3],
    /// Beam axis
    #[serde(default)]
    pub axis: BowlAxis,
    /// Requested number of point sources
    pub source_count: usize,
}

/// Tiled point sources with one common area weight
#[derive(Debug, Clone)]
pub struct SourcePointSet {
    positions: Vec<[f64; 3]>,
    weight: f64,
}

/// Shared flag polled by long-running source summations
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl BowlTransducer {
    /// Check the aperture and focal geometry
    pub fn validate(&self) -> Result<()> {
        let f = self.focal_length;
        if !(f.is_finite() && f > 0.0) {
            return Err(VieError::invalid("focal_length", format!("must be positive, got {f}")));
        }
        if !(self.outer_radius > 0.0 && self.outer_radius <= f) {
            return Err(VieError::invalid(
                "outer_radius",
                format!("must lie in (0, {f}], got {}", self.outer_radius),
            ));
        }
        if !(self.inner_radius >= 0.0 && self.inner_radius < self.outer_radius) {
            return Err(VieError::invalid(
                "inner_radius",
                format!("must lie in [0, {}), got {}", self.outer_radius, self.inner_radius),
            ));
        }
        if self.source_count == 0 {
            return Err(VieError::invalid("source_count", "must be positive"));
        }
        if self.focus.iter().any(|c| !c.is_finite()) {
            return Err(VieError::invalid("focus", "not finite"));
        }
        Ok(())
    }

    /// Deepest point of the bowl
    pub fn apex(&self) -> [f64; 3] {
        let d = self.axis.direction();
        let f = self.focal_length;
        [
            self.focus[0] - f * d[0],
            self.focus[1] - f * d[1],
            self.focus[2] - f * d[2],
        ]
    }

    /// Equal-area tiling of the cap
    pub fn tile(&self) -> Result<SourcePointSet> {
        self.validate()?;
        let f = self.focal_length;
        let theta1 = (self.inner_radius / f).asin();
        let theta2 = (self.outer_radius / f).asin();
        let span = theta2 - theta1;

        // Unit-sphere area per source and the matching angular cell size
        let area = 2.0 * PI * (theta1.cos() - theta2.cos()) / self.source_count as f64;
        let cell = area.sqrt();
        let bands = ((span / cell).round() as usize).max(1);
        let d_theta = span / bands as f64;
        let d_phi = area / d_theta;

        let mut positions = Vec::with_capacity(self.source_count + bands);
        for m in 0..bands {
            let theta = theta1 + span * (m as f64 + 0.5) / bands as f64;
            let count = (2.0 * PI * theta.sin() / d_phi).round() as usize;
            for n in 0..count {
                let phi = 2.0 * PI * n as f64 / count as f64;
                let local = [
                    f * theta.sin() * phi.cos(),
                    f * theta.sin() * phi.sin(),
                    f * theta.cos(),
                ];
                positions.push(self.axis.orient(local, self.focus));
            }
        }

        log::info!(
            "Bowl tiled into {} sources ({} requested, {} bands)",
            positions.len(),
            self.source_count,
            bands
        );

        Ok(SourcePointSet {
            positions,
            weight: area * f * f,
        })
    }

    /// Observation points of the calibration disk, centre outwards
    ///
    /// The disk is normal to the beam at axial distance
    /// `F - 0.98·√(F² - outer²)` from the apex, just in front of the rim.
    pub fn calibration_disk(&self) -> (Vec<f64>, Vec<[f64; 3]>) {
        let f = self.focal_length;
        let r_max = self.outer_radius;
        let depth = f - CALIBRATION_DEPTH_FACTOR * (f * f - r_max * r_max).sqrt();
        let apex = self.apex();
        let d = self.axis.direction();
        let e = self.axis.radial();
        let centre = [
            apex[0] + depth * d[0],
            apex[1] + depth * d[1],
            apex[2] + depth * d[2],
        ];
        let radii = linspace(0.0, r_max, CALIBRATION_SAMPLES);
        let points = radii
            .iter()
            .map(|r| [centre[0] + r * e[0], centre[1] + r * e[1], centre[2] + r * e[2]])
            .collect();
        (radii, points)
    }

    /// `∫|p|² dA` over the calibration disk for a unit-amplitude source set
    ///
    /// Rectangle rule on [`CALIBRATION_SAMPLES`] equally spaced radii.
    pub fn calibration_integral(&self, sources: &SourcePointSet, wavenumber: f64) -> f64 {
        let (radii, points) = self.calibration_disk();
        let field = sources.evaluate(Complex64::new(wavenumber, 0.0), &points);
        let step = self.outer_radius / CALIBRATION_SAMPLES as f64;
        2.0 * PI
            * field
                .iter()
                .zip(radii.iter())
                .map(|(p, r)| p.norm_sqr() * r)
                .sum::<f64>()
            * step
    }

    /// Amplitude p₀ that makes the bowl radiate `power` watts
    ///
    /// `p₀ = √(2ρc₀P / ∫|p|² dA)`, evaluated at the real wavenumber.
    pub fn calibrate_power(
        &self,
        sources: &SourcePointSet,
        power: f64,
        density: f64,
        sound_speed: f64,
        wavenumber: f64,
    ) -> Result<f64> {
        if !(power.is_finite() && power >= 0.0) {
            return Err(VieError::invalid("power", format!("must be non-negative, got {power}")));
        }
        if !(density > 0.0 && sound_speed > 0.0) {
            return Err(VieError::invalid("medium", "density and sound speed must be positive"));
        }
        let integral = self.calibration_integral(sources, wavenumber);
        if !(integral.is_finite() && integral > 0.0) {
            return Err(VieError::invalid(
                "power",
                format!("calibration disk sees no field (integral = {integral})"),
            ));
        }
        let p0 = (2.0 * density * sound_speed * power / integral).sqrt();
        log::info!("Power calibration: {power} W -> p0 = {p0:.4e}");
        Ok(p0)
    }

    /// Zero `field` at points within `tolerance` of the bowl's sphere
    ///
    /// Returns the number of points cleared.
    pub fn mask_near_surface(
        &self,
        points: &[[f64; 3]],
        field: &mut Array1<Complex64>,
        tolerance: f64,
    ) -> Result<usize> {
        if points.len() != field.len() {
            return Err(VieError::mismatch("field", points.len(), field.len()));
        }
        let mut cleared = 0;
        for (p, value) in points.iter().zip(field.iter_mut()) {
            let d = distance(p, &self.focus);
            if (d - self.focal_length).abs() < tolerance {
                *value = Complex64::new(0.0, 0.0);
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

impl SourcePointSet {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[[f64; 3]] {
        &self.positions
    }

    /// Area element carried by every source (m²)
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Pressure at one point
    #[inline]
    pub fn pressure_at(&self, k: Complex64, point: &[f64; 3]) -> Complex64 {
        let mut sum = Complex64::new(0.0, 0.0);
        for source in &self.positions {
            let d = distance(point, source);
            if d > MIN_SOURCE_DISTANCE {
                sum += phase_factor(k, d) / d;
            }
        }
        sum * (self.weight / (4.0 * PI))
    }

    /// Pressure at every point, parallel over points
    pub fn evaluate(&self, k: Complex64, points: &[[f64; 3]]) -> Array1<Complex64> {
        Array1::from(parallel_map(points, |p| self.pressure_at(k, p)))
    }

    /// Like [`SourcePointSet::evaluate`], polling `token` between chunks
    pub fn evaluate_cancellable(
        &self,
        k: Complex64,
        points: &[[f64; 3]],
        token: &CancellationToken,
    ) -> Result<Array1<Complex64>> {
        let chunks = points.len().div_ceil(CANCELLATION_CHUNK);
        let parts = parallel_map_indexed(chunks, |c| {
            if token.is_cancelled() {
                return None;
            }
            let start = c * CANCELLATION_CHUNK;
            let end = (start + CANCELLATION_CHUNK).min(points.len());
            Some(
                points[start..end]
                    .iter()
                    .map(|p| self.pressure_at(k, p))
                    .collect::<Vec<_>>(),
            )
        });

        let mut field = Vec::with_capacity(points.len());
        for part in parts {
            match part {
                Some(values) => field.extend(values),
                None => return Err(VieError::Cancelled),
            }
        }
        Ok(Array1::from(field))
    }
}

#[inline]
fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// `count` equally spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            (0..count).map(|i| start + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn h101(axis: BowlAxis, source_count: usize) -> BowlTransducer {
        BowlTransducer {
            focal_length: 0.0632,
            outer_radius: 0.032,
            inner_radius: 0.0,
            focus: match axis {
                BowlAxis::X => [0.0632, 0.0, 0.0],
                BowlAxis::Z => [0.0, 0.0, 0.0632],
            },
            axis,
            source_count,
        }
    }

    #[test]
    fn test_sources_lie_on_bowl() {
        for axis in [BowlAxis::X, BowlAxis::Z] {
            let bowl = h101(axis, 1000);
            let sources = bowl.tile().unwrap();
            let d = axis.direction();
            for s in sources.positions() {
                assert_relative_eq!(distance(s, &bowl.focus), bowl.focal_length, epsilon = 1e-12);
                // Concave side faces the focus
                let along = (bowl.focus[0] - s[0]) * d[0]
                    + (bowl.focus[1] - s[1]) * d[1]
                    + (bowl.focus[2] - s[2]) * d[2];
                assert!(along > 0.0);
            }
        }
    }

    #[test]
    fn test_tiled_count_near_request() {
        let sources = h101(BowlAxis::X, 4096).tile().unwrap();
        let ratio = sources.len() as f64 / 4096.0;
        assert!((ratio - 1.0).abs() < 0.05, "ratio = {ratio}");
    }

    #[test]
    fn test_weight_is_physical_area() {
        let bowl = h101(BowlAxis::Z, 2000);
        let sources = bowl.tile().unwrap();
        let theta2 = (bowl.outer_radius / bowl.focal_length).asin();
        let cap = 2.0 * PI * bowl.focal_length.powi(2) * (1.0 - theta2.cos());
        assert_relative_eq!(sources.weight() * 2000.0, cap, max_relative = 1e-12);
    }

    #[test]
    fn test_annular_bowl_leaves_hole() {
        let mut bowl = h101(BowlAxis::X, 2000);
        bowl.inner_radius = 0.01;
        let sources = bowl.tile().unwrap();
        for s in sources.positions() {
            let off_axis = (s[1] * s[1] + s[2] * s[2]).sqrt();
            assert!(off_axis > 0.0099);
        }
    }

    #[test]
    fn test_invalid_geometry() {
        let mut bowl = h101(BowlAxis::X, 100);
        bowl.inner_radius = 0.04;
        assert!(bowl.tile().is_err());
        let mut bowl = h101(BowlAxis::X, 100);
        bowl.outer_radius = 0.07;
        assert!(bowl.tile().is_err());
        let bowl = h101(BowlAxis::X, 0);
        assert!(matches!(bowl.tile(), Err(VieError::InvalidParameter { .. })));
    }

    #[test]
    fn test_coincident_points_are_skipped() {
        let sources = SourcePointSet {
            positions: vec![[0.0, 0.0, 0.0], [0.01, 0.0, 0.0]],
            weight: 1.0,
        };
        let k = Complex64::new(100.0, 0.0);
        let p = sources.pressure_at(k, &[0.0, 0.0, 0.0]);
        let expected = phase_factor(k, 0.01) / (4.0 * PI * 0.01);
        assert_relative_eq!(p.re, expected.re, epsilon = 1e-12);
        assert_relative_eq!(p.im, expected.im, epsilon = 1e-12);
    }

    #[test]
    fn test_focal_gain() {
        let bowl = h101(BowlAxis::X, 2048);
        let sources = bowl.tile().unwrap();
        let k = 2.0 * PI * 1.1e6 / 1487.0;
        let field = sources.evaluate(
            Complex64::new(k, 0.0),
            &[bowl.focus, [0.03, 0.0, 0.0], [bowl.focus[0], 0.005, 0.0]],
        );
        assert!(field[0].norm() > field[1].norm());
        assert!(field[0].norm() > 5.0 * field[2].norm());
    }

    #[test]
    fn test_cancellation() {
        let sources = h101(BowlAxis::X, 256).tile().unwrap();
        let points: Vec<[f64; 3]> = (0..3000).map(|i| [0.02 + 1e-5 * i as f64, 0.0, 0.0]).collect();
        let k = Complex64::new(4000.0, 1.0);
        let token = CancellationToken::new();
        let live = sources.evaluate_cancellable(k, &points, &token).unwrap();
        assert_eq!(live, sources.evaluate(k, &points));

        token.cancel();
        let err = sources.evaluate_cancellable(k, &points, &token).unwrap_err();
        assert!(matches!(err, VieError::Cancelled));
    }

    #[test]
    fn test_near_surface_mask() {
        let bowl = h101(BowlAxis::X, 100);
        let points = vec![[0.0, 0.0, 0.0], [0.0002, 0.0, 0.0], [0.01, 0.0, 0.0]];
        let mut field = Array1::from_elem(3, Complex64::new(1.0, 1.0));
        let cleared = bowl
            .mask_near_surface(&points, &mut field, NEAR_SURFACE_TOLERANCE)
            .unwrap();
        assert_eq!(cleared, 2);
        assert_eq!(field[2], Complex64::new(1.0, 1.0));
    }

    #[test]
    fn test_linspace() {
        let v = linspace(0.0, 1.0, 5);
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }
}
