//! Nonlinear field of a focused bowl transducer
//!
//! 1. box grid around the beam axis
//! 2. equal-area tiling of the bowl
//! 3. fundamental on every voxel at the attenuated wavenumber
//! 4. zero the voxels hugging the bowl surface
//! 5. scale to the requested acoustic power
//! 6. harmonic cascade

use crate::cascade::{HarmonicCascade, HarmonicStack};
use crate::config::HifuConfig;
use crate::error::Result;
use crate::grid::VoxelGrid;
use crate::transducer::CancellationToken;
use std::time::Instant;

/// Fields and calibration of a HIFU run
#[derive(Debug, Clone)]
pub struct HifuResult {
    pub grid: VoxelGrid,
    pub harmonics: HarmonicStack,
    /// Source amplitude giving the requested power (Pa)
    pub amplitude: f64,
    /// Number of point sources actually tiled
    pub source_count: usize,
    /// Geometric focus (m)
    pub focus: [f64; 3],
}

/// Run the full pipeline
pub fn simulate(config: &HifuConfig) -> Result<HifuResult> {
    simulate_with_token(config, &CancellationToken::new())
}

/// Run the full pipeline, abandoning the source summation when `token` fires
pub fn simulate_with_token(config: &HifuConfig, token: &CancellationToken) -> Result<HifuResult> {
    config.validate()?;
    let started = Instant::now();
    let medium = config.medium;
    let grid = config.grid()?;
    let bowl = config.bowl();
    let sources = bowl.tile()?;

    log::info!(
        "HIFU grid {:?} at dx = {:.3e} m ({} voxels)",
        grid.shape(),
        grid.dx(),
        grid.num_voxels()
    );

    let k1 = medium.wavenumber(config.frequency);
    let points = grid.points();
    let mut field = sources.evaluate_cancellable(k1, &points, token)?;
    let cleared = bowl.mask_near_surface(&points, &mut field, config.near_surface_tolerance)?;
    log::debug!("Cleared {cleared} voxels next to the bowl surface");

    let amplitude = bowl.calibrate_power(
        &sources,
        config.power,
        medium.density,
        medium.speed_of_sound,
        k1.re,
    )?;
    field.mapv_inplace(|p| p * amplitude);
    log::info!("Fundamental field ready in {:.2?}", started.elapsed());

    let fundamental = grid.unflatten(&field)?;
    let cascade = HarmonicCascade::new(medium, grid, config.frequency)?;
    let harmonics = cascade.run(fundamental, config.num_harmonics)?;

    log::info!("HIFU simulation finished in {:.2?}", started.elapsed());
    Ok(HifuResult {
        grid,
        harmonics,
        amplitude,
        source_count: sources.len(),
        focus: bowl.focus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DomainConfig, TransducerConfig};
    use crate::error::VieError;

    fn coarse() -> HifuConfig {
        HifuConfig {
            transducer: TransducerConfig {
                source_count: 256,
                ..TransducerConfig::default()
            },
            points_per_wavelength: 1.0,
            domain: DomainConfig {
                y_width: Some(0.004),
                z_width: Some(0.004),
                ..DomainConfig::default()
            },
            ..HifuConfig::default()
        }
    }

    #[test]
    fn test_coarse_run_produces_harmonics() {
        let result = simulate(&coarse()).unwrap();
        assert_eq!(result.harmonics.len(), 2);
        assert!(result.amplitude > 0.0);
        let p0 = &result.harmonics.fields()[0];
        let p1 = &result.harmonics.fields()[1];
        assert!(p0.iter().any(|v| v.norm() > 0.0));
        assert!(p1.iter().any(|v| v.norm() > 0.0));
    }

    #[test]
    fn test_cancelled_run() {
        let token = CancellationToken::new();
        token.cancel();
        let err = simulate_with_token(&coarse(), &token).unwrap_err();
        assert!(matches!(err, VieError::Cancelled));
    }
}
