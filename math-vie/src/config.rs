//! JSON configuration for the HIFU and sphere-scattering runs
//!
//! Every field has a default, so `{}` is a valid configuration for both
//! simulations (the Sonic Concepts H101 bowl in water, and a 2.5 mm sphere of
//! index 1.2 under 1.5 mm plane-wave illumination).

use crate::cascade::{MAX_HARMONICS, Medium};
use crate::error::{Result, VieError};
use crate::grid::VoxelGrid;
use crate::scattering::{PlaneWave, ScatteringProblem};
use crate::transducer::{BowlAxis, BowlTransducer, NEAR_SURFACE_TOLERANCE};
use math_audio_solvers::GmresConfig;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Focused-ultrasound harmonic simulation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HifuConfig {
    /// Propagation medium
    #[serde(default)]
    pub medium: Medium,
    /// Operating (fundamental) frequency (Hz)
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    /// Bowl geometry
    #[serde(default)]
    pub transducer: TransducerConfig,
    /// Total acoustic power (W)
    #[serde(default = "default_power")]
    pub power: f64,
    /// Voxels per fundamental wavelength
    #[serde(default = "default_hifu_resolution")]
    pub points_per_wavelength: f64,
    /// Computational box
    #[serde(default)]
    pub domain: DomainConfig,
    /// Number of harmonics including the fundamental
    #[serde(default = "default_num_harmonics")]
    pub num_harmonics: usize,
    /// Field is zeroed within this distance of the bowl surface (m)
    #[serde(default = "default_near_surface")]
    pub near_surface_tolerance: f64,
}

/// Bowl transducer description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransducerConfig {
    /// Radius of curvature (m)
    #[serde(default = "default_focal_length")]
    pub focal_length: f64,
    /// Outer aperture diameter (m)
    #[serde(default = "default_outer_diameter")]
    pub outer_diameter: f64,
    /// Inner (hole) diameter (m)
    #[serde(default)]
    pub inner_diameter: f64,
    /// Requested number of point sources
    #[serde(default = "default_source_count")]
    pub source_count: usize,
}

/// Axial/lateral extent of the HIFU box
///
/// The box starts `x_start` in front of the apex and ends `x_margin` beyond
/// the focus. Lateral widths default to a quarter of the outer diameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    #[serde(default = "default_x_start")]
    pub x_start: f64,
    #[serde(default = "default_x_margin")]
    pub x_margin: f64,
    #[serde(default)]
    pub y_width: Option<f64>,
    #[serde(default)]
    pub z_width: Option<f64>,
}

/// Plane-wave scattering by a homogeneous sphere
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatteringConfig {
    /// Sphere radius (m)
    #[serde(default = "default_sphere_radius")]
    pub radius: f64,
    /// Real part of the refractive index
    #[serde(default = "default_refractive_index")]
    pub refractive_index: f64,
    /// Imaginary part of the refractive index (absorption)
    #[serde(default)]
    pub refractive_index_imag: f64,
    /// Sphere density
    #[serde(default = "default_unit")]
    pub density_interior: f64,
    /// Background density
    #[serde(default = "default_unit")]
    pub density_exterior: f64,
    /// Exterior wavelength (m)
    #[serde(default = "default_wavelength")]
    pub wavelength: f64,
    /// Voxels per interior wavelength
    #[serde(default = "default_sphere_resolution")]
    pub points_per_wavelength: f64,
    /// Propagation direction of the incident wave
    #[serde(default = "default_direction")]
    pub direction: [f64; 3],
    /// GMRES settings
    #[serde(default)]
    pub solver: SolverConfig,
}

/// GMRES settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_restart")]
    pub restart: usize,
    /// Maximum number of restarts
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,
    /// Wall-clock budget (s)
    #[serde(default)]
    pub time_budget: Option<f64>,
}

fn default_frequency() -> f64 {
    1.1e6
}

fn default_power() -> f64 {
    44.0
}

fn default_hifu_resolution() -> f64 {
    4.0
}

fn default_num_harmonics() -> usize {
    2
}

fn default_near_surface() -> f64 {
    NEAR_SURFACE_TOLERANCE
}

fn default_focal_length() -> f64 {
    0.0632
}

fn default_outer_diameter() -> f64 {
    0.064
}

fn default_source_count() -> usize {
    1 << 12
}

fn default_x_start() -> f64 {
    0.01
}

fn default_x_margin() -> f64 {
    0.01
}

fn default_sphere_radius() -> f64 {
    2.5e-3
}

fn default_refractive_index() -> f64 {
    1.2
}

fn default_unit() -> f64 {
    1.0
}

fn default_wavelength() -> f64 {
    1.5e-3
}

fn default_sphere_resolution() -> f64 {
    10.0
}

fn default_direction() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_restart() -> usize {
    50
}

fn default_max_restarts() -> usize {
    20
}

impl Default for HifuConfig {
    fn default() -> Self {
        Self {
            medium: Medium::default(),
            frequency: default_frequency(),
            transducer: TransducerConfig::default(),
            power: default_power(),
            points_per_wavelength: default_hifu_resolution(),
            domain: DomainConfig::default(),
            num_harmonics: default_num_harmonics(),
            near_surface_tolerance: default_near_surface(),
        }
    }
}

impl Default for TransducerConfig {
    fn default() -> Self {
        Self {
            focal_length: default_focal_length(),
            outer_diameter: default_outer_diameter(),
            inner_diameter: 0.0,
            source_count: default_source_count(),
        }
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            x_start: default_x_start(),
            x_margin: default_x_margin(),
            y_width: None,
            z_width: None,
        }
    }
}

impl Default for ScatteringConfig {
    fn default() -> Self {
        Self {
            radius: default_sphere_radius(),
            refractive_index: default_refractive_index(),
            refractive_index_imag: 0.0,
            density_interior: default_unit(),
            density_exterior: default_unit(),
            wavelength: default_wavelength(),
            points_per_wavelength: default_sphere_resolution(),
            direction: default_direction(),
            solver: SolverConfig::default(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            restart: default_restart(),
            max_restarts: default_max_restarts(),
            time_budget: None,
        }
    }
}

fn load<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn save<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

impl HifuConfig {
    /// Load configuration from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load(path.as_ref())
    }

    /// Save configuration to JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save(self, path.as_ref())
    }

    pub fn validate(&self) -> Result<()> {
        self.medium.validate()?;
        if !(self.frequency.is_finite() && self.frequency > 0.0) {
            return Err(VieError::invalid("frequency", "must be positive"));
        }
        if !(self.points_per_wavelength > 0.0) {
            return Err(VieError::invalid("points_per_wavelength", "must be positive"));
        }
        if self.num_harmonics == 0 || self.num_harmonics > MAX_HARMONICS {
            return Err(VieError::invalid(
                "num_harmonics",
                format!("must lie in 1..={MAX_HARMONICS}"),
            ));
        }
        self.bowl().validate()
    }

    /// Bowl facing +x with its focus at (F, 0, 0)
    pub fn bowl(&self) -> BowlTransducer {
        let t = &self.transducer;
        BowlTransducer {
            focal_length: t.focal_length,
            outer_radius: t.outer_diameter / 2.0,
            inner_radius: t.inner_diameter / 2.0,
            focus: [t.focal_length, 0.0, 0.0],
            axis: BowlAxis::X,
            source_count: t.source_count,
        }
    }

    /// Voxel pitch, fundamental wavelength over points per wavelength
    pub fn pitch(&self) -> f64 {
        self.medium.wavelength(self.frequency) / self.points_per_wavelength
    }

    /// Box from `x_start` to `F + x_margin`, laterally centred on the axis
    pub fn grid(&self) -> Result<VoxelGrid> {
        let d = &self.domain;
        let f = self.transducer.focal_length;
        let lateral = self.transducer.outer_diameter / 4.0;
        let extent = [
            f + d.x_margin - d.x_start,
            d.y_width.unwrap_or(lateral),
            d.z_width.unwrap_or(lateral),
        ];
        let grid = VoxelGrid::from_extent(extent, self.pitch(), [0.0; 3])?;
        Ok(grid.shifted([d.x_start - grid.origin()[0], 0.0, 0.0]))
    }
}

impl ScatteringConfig {
    /// Load configuration from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load(path.as_ref())
    }

    /// Save configuration to JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save(self, path.as_ref())
    }

    pub fn refractive_index(&self) -> Complex64 {
        Complex64::new(self.refractive_index, self.refractive_index_imag)
    }

    /// Exterior wavenumber 2π/λ
    pub fn wavenumber(&self) -> f64 {
        2.0 * PI / self.wavelength
    }

    /// Pitch from the interior wavelength λ/Re(n)
    pub fn pitch(&self) -> Result<f64> {
        if !(self.wavelength > 0.0 && self.points_per_wavelength > 0.0) {
            return Err(VieError::invalid("wavelength", "wavelength and resolution must be positive"));
        }
        if !(self.refractive_index > 0.0) {
            return Err(VieError::invalid("refractive_index", "real part must be positive"));
        }
        Ok(self.wavelength / self.refractive_index.max(1.0) / self.points_per_wavelength)
    }

    /// Bounding box of the sphere, centred on the origin
    pub fn grid(&self) -> Result<VoxelGrid> {
        if !(self.radius > 0.0) {
            return Err(VieError::invalid("radius", "must be positive"));
        }
        let w = 2.0 * self.radius;
        VoxelGrid::from_extent([w, w, w], self.pitch()?, [0.0; 3])
    }

    pub fn problem(&self) -> Result<ScatteringProblem> {
        let incident = PlaneWave::new(self.wavenumber(), self.direction)?;
        ScatteringProblem::sphere(
            self.grid()?,
            [0.0; 3],
            self.radius,
            self.refractive_index(),
            self.density_interior,
            self.density_exterior,
            incident,
        )
    }
}

impl SolverConfig {
    pub fn gmres(&self) -> GmresConfig<f64> {
        let config = GmresConfig::default()
            .with_tolerance(self.tolerance)
            .with_restart(self.restart)
            .with_max_iterations(self.max_restarts);
        match self.time_budget {
            Some(secs) if secs > 0.0 => config.with_time_budget(Duration::from_secs_f64(secs)),
            _ => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_json_gives_defaults() {
        let hifu: HifuConfig = serde_json::from_str("{}").unwrap();
        assert_relative_eq!(hifu.frequency, 1.1e6);
        assert_eq!(hifu.transducer.source_count, 4096);
        assert_eq!(hifu.num_harmonics, 2);
        assert!(hifu.validate().is_ok());

        let sphere: ScatteringConfig = serde_json::from_str("{}").unwrap();
        assert_relative_eq!(sphere.radius, 2.5e-3);
        assert_relative_eq!(sphere.solver.tolerance, 1e-4);
    }

    #[test]
    fn test_hifu_grid_starts_at_x_start() {
        let config = HifuConfig::default();
        let grid = config.grid().unwrap();
        assert_relative_eq!(grid.origin()[0], 0.01, epsilon = 1e-12);
        let (l, m, n) = grid.shape();
        assert_eq!(m, n);
        let length = grid.dx() * l as f64;
        assert_relative_eq!(length, 0.0632, max_relative = 0.05);
        // Laterally centred
        assert_relative_eq!(grid.origin()[1], -grid.dx() * (m - 1) as f64 / 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_sphere_grid_resolution() {
        let config = ScatteringConfig::default();
        let grid = config.grid().unwrap();
        assert_eq!(grid.shape(), (40, 40, 40));
        assert_relative_eq!(grid.dx(), 1.25e-4, max_relative = 1e-12);
    }

    #[test]
    fn test_partial_json_and_round_trip() {
        let config: ScatteringConfig =
            serde_json::from_str(r#"{ "density_interior": 1.5, "solver": { "tolerance": 1e-6 } }"#).unwrap();
        assert_relative_eq!(config.density_interior, 1.5);
        assert_relative_eq!(config.solver.tolerance, 1e-6);
        assert_eq!(config.solver.restart, 50);

        let path = std::env::temp_dir().join("vie_scattering_config_test.json");
        config.to_file(&path).unwrap();
        let loaded = ScatteringConfig::from_file(&path).unwrap();
        assert_relative_eq!(loaded.density_interior, 1.5);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_bundled_h101_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/h101.json");
        let config = HifuConfig::from_file(&path).unwrap();
        assert!(config.validate().is_ok());
        let default = HifuConfig::default();
        assert_relative_eq!(config.frequency, default.frequency);
        assert_relative_eq!(config.transducer.focal_length, default.transducer.focal_length);
        assert_relative_eq!(config.transducer.outer_diameter, default.transducer.outer_diameter);
        assert_eq!(config.medium, default.medium);
        assert_eq!(config.num_harmonics, 3);
        assert!(config.domain.y_width.is_none());
        assert_eq!(config.grid().unwrap().shape(), default.grid().unwrap().shape());
    }

    #[test]
    fn test_invalid_harmonic_count() {
        let config = HifuConfig {
            num_harmonics: 6,
            ..HifuConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
