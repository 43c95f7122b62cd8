//! Material contrast fields over a voxel grid
//!
//! For a medium of exterior density ρ₀ containing a scatterer with
//! refractive index n and density ρ:
//!
//! ```text
//! index contrast      m = n² - 1              (0 outside the mask)
//! density ratio       κ = ρ₀/ρ                (1 outside the mask)
//! density contrast    χ = κ - 1               (0 outside the mask)
//! effective contrast  m_ρ = κ(1 + m) - 1      (0 outside the mask)
//! ```
//!
//! Density variation couples to the field through the flux `χ ∇u`, which
//! stays bounded across a density jump. The field gradient is taken with
//! central differences (one-sided on the grid boundary), so the coupled
//! problem is solved on the mask plus the one-voxel neighbourhood of χ.

use crate::error::{Result, VieError};
use crate::grid::{InclusionMask, VoxelGrid};
use ndarray::{Array3, Axis, Zip};
use num_complex::Complex64;
use num_traits::Zero;
use std::ops::{Div, Sub};

/// Per-voxel material description restricted to an inclusion mask
#[derive(Debug, Clone)]
pub struct ContrastFields {
    mask: InclusionMask,
    index_contrast: Array3<Complex64>,
    density: Array3<f64>,
    exterior_density: f64,
}

/// Density coupling terms derived from [`ContrastFields`]
#[derive(Debug, Clone)]
pub struct DensityCoupling {
    /// χ = ρ₀/ρ - 1, weight of the field gradient
    pub density_contrast: Array3<f64>,
    /// m_ρ = (ρ₀/ρ)(1 + m) - 1
    pub effective_contrast: Array3<Complex64>,
    /// Voxels whose field enters the coupled operator
    pub support: InclusionMask,
}

impl ContrastFields {
    /// Homogeneous scatterer occupying `mask`
    pub fn homogeneous(
        grid: &VoxelGrid,
        mask: InclusionMask,
        refractive_index: Complex64,
        density_interior: f64,
        density_exterior: f64,
    ) -> Result<Self> {
        check_density("density_interior", density_interior)?;
        check_density("density_exterior", density_exterior)?;
        if mask.dim() != grid.shape() {
            return Err(VieError::mismatch("mask", grid.shape(), mask.dim()));
        }
        let m = refractive_index * refractive_index - 1.0;
        let index_contrast = mask
            .cells()
            .mapv(|inside| if inside { m } else { Complex64::new(0.0, 0.0) });
        let density = mask.cells().mapv(|inside| {
            if inside {
                density_interior
            } else {
                density_exterior
            }
        });
        Ok(Self {
            mask,
            index_contrast,
            density,
            exterior_density: density_exterior,
        })
    }

    /// Heterogeneous scatterer from explicit per-voxel arrays
    ///
    /// Values outside `mask` are discarded: the index contrast is set to zero
    /// and the density to `density_exterior`.
    pub fn from_arrays(
        grid: &VoxelGrid,
        mask: InclusionMask,
        index_contrast: Array3<Complex64>,
        density: Array3<f64>,
        density_exterior: f64,
    ) -> Result<Self> {
        check_density("density_exterior", density_exterior)?;
        grid.check_field(&index_contrast, "index contrast")?;
        grid.check_field(&density, "density")?;
        if mask.dim() != grid.shape() {
            return Err(VieError::mismatch("mask", grid.shape(), mask.dim()));
        }

        let mut index_contrast = index_contrast;
        let mut density = density;
        Zip::from(&mut index_contrast)
            .and(&mut density)
            .and(mask.cells())
            .for_each(|m, rho, &inside| {
                if !inside {
                    *m = Complex64::new(0.0, 0.0);
                    *rho = density_exterior;
                }
            });
        if let Some(rho) = density.iter().find(|rho| !(rho.is_finite() && **rho > 0.0)) {
            return Err(VieError::invalid("density", format!("must be positive, got {rho}")));
        }

        Ok(Self {
            mask,
            index_contrast,
            density,
            exterior_density: density_exterior,
        })
    }

    /// No scatterer: every field at its background value
    pub fn none(grid: &VoxelGrid, density_exterior: f64) -> Self {
        Self {
            mask: InclusionMask::empty(grid),
            index_contrast: Array3::zeros(grid.shape()),
            density: Array3::from_elem(grid.shape(), density_exterior),
            exterior_density: density_exterior,
        }
    }

    pub fn mask(&self) -> &InclusionMask {
        &self.mask
    }

    /// n² - 1
    pub fn index_contrast(&self) -> &Array3<Complex64> {
        &self.index_contrast
    }

    /// Absolute density ρ
    pub fn density(&self) -> &Array3<f64> {
        &self.density
    }

    pub fn exterior_density(&self) -> f64 {
        self.exterior_density
    }

    /// ρ₀/ρ
    pub fn density_ratio(&self) -> Array3<f64> {
        let rho0 = self.exterior_density;
        self.density.mapv(|rho| rho0 / rho)
    }

    /// ρ₀/ρ - 1
    pub fn density_contrast(&self) -> Array3<f64> {
        self.density_ratio().mapv(|r| r - 1.0)
    }

    /// Whether any voxel differs from the exterior density
    pub fn has_density_contrast(&self) -> bool {
        let rho0 = self.exterior_density;
        self.density
            .iter()
            .any(|rho| (rho - rho0).abs() > 1e-12 * rho0)
    }

    /// Flux weight, effective contrast and support on `grid`
    ///
    /// The support is the mask united with every voxel within one step of a
    /// non-zero density contrast, where the difference stencil reaches.
    pub fn density_coupling(&self, grid: &VoxelGrid) -> Result<DensityCoupling> {
        grid.check_field(&self.density, "density")?;
        let ratio = self.density_ratio();
        let density_contrast = ratio.mapv(|r| r - 1.0);

        let mut effective_contrast = self.index_contrast.clone();
        effective_contrast.zip_mut_with(&ratio, |m, r| *m = (*m + 1.0) * *r - 1.0);

        let jump = InclusionMask::new(grid, density_contrast.mapv(|chi| chi != 0.0))?;
        let support = self.mask.union(&jump.dilated())?;

        Ok(DensityCoupling {
            density_contrast,
            effective_contrast,
            support,
        })
    }
}

fn check_density(name: &'static str, rho: f64) -> Result<()> {
    if !(rho.is_finite() && rho > 0.0) {
        return Err(VieError::invalid(name, format!("must be positive, got {rho}")));
    }
    Ok(())
}

/// ∂f/∂x_axis: central differences inside, one-sided on the two end voxels
pub fn partial_derivative<T>(field: &Array3<T>, axis: usize, dx: f64) -> Array3<T>
where
    T: Copy + Zero + Sub<Output = T> + Div<f64, Output = T>,
{
    let mut out = Array3::zeros(field.dim());
    let len = field.len_of(Axis(axis));
    if len < 2 {
        return out;
    }
    Zip::from(out.lanes_mut(Axis(axis)))
        .and(field.lanes(Axis(axis)))
        .for_each(|mut d, f| {
            d[0] = (f[1] - f[0]) / dx;
            d[len - 1] = (f[len - 1] - f[len - 2]) / dx;
            for i in 1..len - 1 {
                d[i] = (f[i + 1] - f[i - 1]) / (2.0 * dx);
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cube_grid() -> VoxelGrid {
        VoxelGrid::new((6, 6, 6), 0.5, [0.0; 3]).unwrap()
    }

    #[test]
    fn test_homogeneous_fields_are_restricted_to_mask() {
        let grid = cube_grid();
        let mask = InclusionMask::from_predicate(&grid, |p| p[0] < 1.4);
        let c = ContrastFields::homogeneous(&grid, mask, Complex64::new(1.2, 0.0), 2.0, 1.0).unwrap();
        assert_relative_eq!(c.index_contrast()[(0, 0, 0)].re, 0.44, epsilon = 1e-12);
        assert_eq!(c.index_contrast()[(5, 0, 0)], Complex64::new(0.0, 0.0));
        assert_relative_eq!(c.density_ratio()[(0, 1, 1)], 0.5);
        assert_relative_eq!(c.density_contrast()[(5, 1, 1)], 0.0);
        assert!(c.has_density_contrast());
    }

    #[test]
    fn test_partial_derivative_of_linear_field() {
        let grid = cube_grid();
        let f = Array3::from_shape_fn(grid.shape(), |(i, j, k)| {
            let p = grid.position(i, j, k);
            3.0 * p[0] - 2.0 * p[1] + 0.5 * p[2]
        });
        let dfx = partial_derivative(&f, 0, grid.dx());
        let dfy = partial_derivative(&f, 1, grid.dx());
        let dfz = partial_derivative(&f, 2, grid.dx());
        for ((x, y), z) in dfx.iter().zip(dfy.iter()).zip(dfz.iter()) {
            assert_relative_eq!(*x, 3.0, epsilon = 1e-12);
            assert_relative_eq!(*y, -2.0, epsilon = 1e-12);
            assert_relative_eq!(*z, 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_partial_derivative_of_complex_field() {
        let grid = cube_grid();
        let f = Array3::from_shape_fn(grid.shape(), |(i, j, k)| {
            let p = grid.position(i, j, k);
            Complex64::new(p[0], -2.0 * p[2]) + Complex64::new(0.0, p[1])
        });
        let dfz = partial_derivative(&f, 2, grid.dx());
        for v in dfz.iter() {
            assert_relative_eq!(v.re, 0.0, epsilon = 1e-12);
            assert_relative_eq!(v.im, -2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_no_density_contrast_keeps_mask_support() {
        let grid = cube_grid();
        let mask = InclusionMask::from_predicate(&grid, |p| p[1] > 1.0);
        let c = ContrastFields::homogeneous(&grid, mask, Complex64::new(1.5, 0.1), 1.0, 1.0).unwrap();
        assert!(!c.has_density_contrast());
        let coupling = c.density_coupling(&grid).unwrap();
        assert_eq!(coupling.support.cells(), c.mask().cells());
        assert!(coupling.density_contrast.iter().all(|chi| *chi == 0.0));
        for (a, b) in coupling.effective_contrast.iter().zip(c.index_contrast().iter()) {
            assert_relative_eq!(a.re, b.re, epsilon = 1e-14);
            assert_relative_eq!(a.im, b.im, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_coupling_support_reaches_one_voxel_outside() {
        let grid = cube_grid();
        let mask = InclusionMask::from_predicate(&grid, |p| p[0] >= 1.4);
        let c = ContrastFields::homogeneous(&grid, mask, Complex64::new(1.1, 0.0), 4.0, 1.0).unwrap();
        let coupling = c.density_coupling(&grid).unwrap();
        // Mask starts at i = 3
        for ((i, _, _), inside) in coupling.support.cells().indexed_iter() {
            assert_eq!(*inside, i >= 2, "voxel row {i}");
        }
        assert_relative_eq!(coupling.density_contrast[(4, 0, 0)], -0.75);
        assert_relative_eq!(coupling.density_contrast[(2, 0, 0)], 0.0);
        // κ(1 + m) - 1 = 0.25 · 1.21 - 1
        assert_relative_eq!(coupling.effective_contrast[(4, 0, 0)].re, -0.6975, epsilon = 1e-12);
        assert_eq!(coupling.effective_contrast[(2, 0, 0)], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_from_arrays_discards_exterior_values() {
        let grid = cube_grid();
        let mask = InclusionMask::from_predicate(&grid, |p| p[2] < 0.6);
        let m = Array3::from_elem(grid.shape(), Complex64::new(0.3, 0.0));
        let rho = Array3::from_elem(grid.shape(), 3.0);
        let c = ContrastFields::from_arrays(&grid, mask, m, rho, 1.0).unwrap();
        assert_eq!(c.index_contrast()[(0, 0, 5)], Complex64::new(0.0, 0.0));
        assert_relative_eq!(c.density()[(0, 0, 5)], 1.0);
        assert_relative_eq!(c.density()[(0, 0, 0)], 3.0);

        let wrong = Array3::from_elem((2, 2, 2), 1.0);
        let mask = InclusionMask::full(&grid);
        let m = Array3::zeros(grid.shape());
        assert!(ContrastFields::from_arrays(&grid, mask, m, wrong, 1.0).is_err());
    }
}
