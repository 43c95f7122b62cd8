//! Plane-wave scattering by a voxelized inclusion
//!
//! Solves the volume integral equation on the contrast support with GMRES,
//! then reconstructs the total field on the whole grid:
//!
//! ```text
//! u = u_inc + S(m_ρ ⊙ (supp ⊙ u)) + Σ_j D_j(χ ⊙ ∂_j u)
//! ```
//!
//! The flux term is only assembled when the density varies.

use crate::circulant::{CirculantEmbedding, GradientEmbedding};
use crate::contrast::ContrastFields;
use crate::error::{Result, VieError};
use crate::grid::{InclusionMask, VoxelGrid};
use crate::kernel::{assemble_gradient, assemble_potential};
use crate::operator::{DensityCoupledOperator, ScalarMaskedOperator, VolumeOperator};
use math_audio_solvers::{GmresConfig, GmresSolution, SolverStatus, gmres};
use ndarray::Array3;
use num_complex::Complex64;
use std::sync::Arc;
use std::time::Instant;

/// Unit plane wave exp(ik d·x)
#[derive(Debug, Clone, Copy)]
pub struct PlaneWave {
    pub wavenumber: f64,
    pub direction: [f64; 3],
}

impl PlaneWave {
    /// Plane wave along `direction`, normalised to unit length
    pub fn new(wavenumber: f64, direction: [f64; 3]) -> Result<Self> {
        let norm = (direction[0].powi(2) + direction[1].powi(2) + direction[2].powi(2)).sqrt();
        if !(norm.is_finite() && norm > 0.0) {
            return Err(VieError::invalid("direction", "must be a non-zero vector"));
        }
        if !(wavenumber.is_finite() && wavenumber > 0.0) {
            return Err(VieError::invalid("wavenumber", format!("must be positive, got {wavenumber}")));
        }
        Ok(Self {
            wavenumber,
            direction: direction.map(|d| d / norm),
        })
    }

    /// Sample on every voxel centre
    pub fn evaluate(&self, grid: &VoxelGrid) -> Array3<Complex64> {
        let d = self.direction;
        Array3::from_shape_fn(grid.shape(), |(i, j, k)| {
            let p = grid.position(i, j, k);
            let phase = self.wavenumber * (d[0] * p[0] + d[1] * p[1] + d[2] * p[2]);
            Complex64::new(phase.cos(), phase.sin())
        })
    }
}

/// Scatterer, background wavenumber and incident field
#[derive(Debug, Clone)]
pub struct ScatteringProblem {
    grid: VoxelGrid,
    contrast: ContrastFields,
    incident: PlaneWave,
}

/// Result of [`ScatteringProblem::solve`]
#[derive(Debug, Clone)]
pub struct ScatteringSolution {
    /// Total field on the whole grid
    pub total_field: Array3<Complex64>,
    /// Incident field on the whole grid
    pub incident_field: Array3<Complex64>,
    /// Why GMRES stopped
    pub status: SolverStatus,
    /// GMRES inner iterations
    pub iterations: usize,
    /// Final relative residual
    pub residual: f64,
    /// Relative residual per inner iteration
    pub residual_history: Vec<f64>,
}

impl ScatteringSolution {
    pub fn converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }

    /// Total minus incident field
    pub fn scattered_field(&self) -> Array3<Complex64> {
        &self.total_field - &self.incident_field
    }
}

impl ScatteringProblem {
    pub fn new(grid: VoxelGrid, contrast: ContrastFields, incident: PlaneWave) -> Result<Self> {
        grid.check_field(contrast.index_contrast(), "index contrast")?;
        Ok(Self {
            grid,
            contrast,
            incident,
        })
    }

    /// Homogeneous sphere of `radius` centred at `centre`
    pub fn sphere(
        grid: VoxelGrid,
        centre: [f64; 3],
        radius: f64,
        refractive_index: Complex64,
        density_interior: f64,
        density_exterior: f64,
        incident: PlaneWave,
    ) -> Result<Self> {
        let mask = InclusionMask::from_predicate(&grid, |p| {
            let d = [p[0] - centre[0], p[1] - centre[1], p[2] - centre[2]];
            d[0] * d[0] + d[1] * d[1] + d[2] * d[2] <= radius * radius
        });
        if mask.count() == 0 {
            return Err(VieError::geometry("sphere contains no voxel centre"));
        }
        let contrast = ContrastFields::homogeneous(
            &grid,
            mask,
            refractive_index,
            density_interior,
            density_exterior,
        )?;
        Self::new(grid, contrast, incident)
    }

    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    pub fn contrast(&self) -> &ContrastFields {
        &self.contrast
    }

    /// Solve with GMRES and reconstruct the total field
    pub fn solve(&self, config: &GmresConfig<f64>) -> Result<ScatteringSolution> {
        let started = Instant::now();
        let k0 = Complex64::new(self.incident.wavenumber, 0.0);
        let potential = assemble_potential(k0, &self.grid)?.scaled(k0 * k0);
        let potential = Arc::new(CirculantEmbedding::new(&potential));
        let incident_field = self.incident.evaluate(&self.grid);

        log::info!(
            "Scattering: grid {:?}, {} inclusion voxels, operators built in {:.2?}",
            self.grid.shape(),
            self.contrast.mask().count(),
            started.elapsed()
        );

        let (solution, total_field) = if self.contrast.has_density_contrast() {
            let gradient = assemble_gradient(k0, &self.grid)?;
            let gradient = Arc::new(GradientEmbedding::with_plan(&gradient, potential.fft().clone()));
            let operator =
                DensityCoupledOperator::new(self.grid, potential, gradient, &self.contrast)?;
            let rhs = &incident_field * operator.support();
            let solution = gmres(&operator, &self.grid.flatten(&rhs)?, config);
            let field = self.grid.unflatten(&solution.x)?;
            let (full, correction) = operator.reconstruction();
            let total = &incident_field + &full.apply_field(&field)? + correction.apply_field(&field)?;
            (solution, total)
        } else {
            let operator = ScalarMaskedOperator::new(self.grid, potential, &self.contrast)?;
            let rhs = &incident_field * &self.contrast.mask().indicator();
            let solution = gmres(&operator, &self.grid.flatten(&rhs)?, config);
            let field = self.grid.unflatten(&solution.x)?;
            let total = &incident_field + &operator.reconstruction().apply_field(&field)?;
            (solution, total)
        };

        report(&solution, started);
        Ok(ScatteringSolution {
            total_field,
            incident_field,
            status: solution.status,
            iterations: solution.iterations,
            residual: solution.residual,
            residual_history: solution.residual_history,
        })
    }
}

fn report(solution: &GmresSolution<Complex64>, started: Instant) {
    match solution.status {
        SolverStatus::Converged => log::info!(
            "GMRES converged in {} iterations (residual {:.2e}), total {:.2?}",
            solution.iterations,
            solution.residual,
            started.elapsed()
        ),
        status => log::warn!(
            "GMRES stopped ({status:?}) after {} iterations, residual {:.2e}",
            solution.iterations,
            solution.residual
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_plane_wave_normalises_direction() {
        let pw = PlaneWave::new(2.0, [0.0, 3.0, 4.0]).unwrap();
        assert_relative_eq!(pw.direction[1], 0.6);
        assert_relative_eq!(pw.direction[2], 0.8);
        assert!(PlaneWave::new(2.0, [0.0; 3]).is_err());
    }

    #[test]
    fn test_no_contrast_returns_incident_field() {
        let grid = VoxelGrid::new((6, 6, 6), 0.1, [-0.25; 3]).unwrap();
        let pw = PlaneWave::new(5.0, [1.0, 0.0, 0.0]).unwrap();
        let problem = ScatteringProblem::sphere(
            grid,
            [0.0; 3],
            0.2,
            Complex64::new(1.0, 0.0),
            1.0,
            1.0,
            pw,
        )
        .unwrap();
        let solution = problem.solve(&GmresConfig::default()).unwrap();
        assert!(solution.converged());
        for (u, v) in solution.total_field.iter().zip(solution.incident_field.iter()) {
            assert!((u - v).norm() < 1e-10);
        }
    }

    #[test]
    fn test_small_sphere_converges() {
        let grid = VoxelGrid::new((8, 8, 8), 0.1, [-0.35; 3]).unwrap();
        let pw = PlaneWave::new(6.0, [0.0, 0.0, 1.0]).unwrap();
        let problem = ScatteringProblem::sphere(
            grid,
            [0.0; 3],
            0.3,
            Complex64::new(1.1, 0.0),
            1.3,
            1.0,
            pw,
        )
        .unwrap();
        let solution = problem
            .solve(&GmresConfig::default().with_tolerance(1e-8))
            .unwrap();
        assert!(solution.converged());
        assert!(!solution.residual_history.is_empty());
        assert!(solution.scattered_field().iter().any(|v| v.norm() > 1e-6));
    }
}
