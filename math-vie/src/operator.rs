//! Matrix-free volume-integral operators
//!
//! Every operator is an immutable value built once from shared embeddings
//! (`Arc`) and per-voxel fields, and applied any number of times. Each one
//! exposes `apply_field` on grid-shaped arrays and implements
//! [`LinearOperator`] on flat vectors for the Krylov solver; both go through
//! [`VoxelGrid::flatten`] / [`VoxelGrid::unflatten`].
//!
//! Notation: `S` is convolution with the scalar kernel scaled by k₀², `D_j`
//! convolution with component `j` of the (unscaled) gradient kernel, `∂_j`
//! the central difference along axis `j`, `m` the index contrast n² - 1,
//! `χ = ρ₀/ρ - 1` and `m_ρ = (ρ₀/ρ)(1 + m) - 1`.
//!
//! | operator | y |
//! |---|---|
//! | [`ScalarMaskedOperator`] | `x - mask ⊙ S(m ⊙ x)` |
//! | [`DensityCoupledOperator`] | `x - supp ⊙ [S(m_ρ ⊙ x) + Σ D_j(χ ⊙ ∂_j x)]` |
//! | [`FullDomainOperator`] | `S(m_ρ ⊙ (supp ⊙ x))` |
//! | [`GradientOperator`] | `Σ D_j(w ⊙ ∂_j x)` |
//! | [`ContrastOperator`] | `S(c ⊙ x)` |
//!
//! The density form rewrites `∇·(ρ⁻¹∇u) + k²ρ⁻¹u = 0` as
//! `Δu + k₀²u = -k₀² m_ρ u - ∇·(χ∇u)` and moves the divergence onto the
//! kernel: `∫ G ∇·F = Σ_j ∂_j ∫ G F_j`. Only the flux `χ∇u` is discretized,
//! never a derivative of the density, so a density jump at the scatterer
//! surface is handled like any other contrast edge.

use crate::circulant::{CirculantEmbedding, GradientEmbedding};
use crate::contrast::{partial_derivative, ContrastFields};
use crate::error::{Result, VieError};
use crate::grid::VoxelGrid;
use math_audio_solvers::LinearOperator;
use ndarray::{Array1, Array3, Zip};
use num_complex::Complex64;
use std::sync::Arc;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Common surface of the volume operators
pub trait VolumeOperator {
    /// Grid the operator acts on
    fn grid(&self) -> &VoxelGrid;

    /// Apply to a grid-shaped field
    fn apply_field(&self, x: &Array3<Complex64>) -> Result<Array3<Complex64>>;

    /// Apply to a flat vector in the grid's flattening order
    fn matvec(&self, x: &Array1<Complex64>) -> Result<Array1<Complex64>> {
        let field = self.grid().unflatten(x)?;
        let y = self.apply_field(&field)?;
        self.grid().flatten(&y)
    }
}

macro_rules! impl_linear_operator {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl LinearOperator<Complex64> for $ty {
                fn num_rows(&self) -> usize {
                    self.grid().num_voxels()
                }

                fn num_cols(&self) -> usize {
                    self.grid().num_voxels()
                }

                /// # Panics
                /// If `x.len()` differs from the number of voxels.
                fn apply(&self, x: &Array1<Complex64>) -> Array1<Complex64> {
                    match self.matvec(x) {
                        Ok(y) => y,
                        Err(e) => panic!("{}: {e}", stringify!($ty)),
                    }
                }
            }
        )+
    };
}

fn indicator(cells: &Array3<bool>) -> Array3<Complex64> {
    cells.mapv(|inside| if inside { ONE } else { ZERO })
}

fn check_embedding(grid: &VoxelGrid, shape: (usize, usize, usize)) -> Result<()> {
    if shape != grid.shape() {
        return Err(VieError::mismatch("embedding", grid.shape(), shape));
    }
    Ok(())
}

/// `a ⊙ b`
fn product(a: &Array3<Complex64>, b: &Array3<Complex64>) -> Array3<Complex64> {
    let mut out = a.clone();
    out.zip_mut_with(b, |x, y| *x *= *y);
    out
}

/// Index-contrast scattering operator: `y = x - mask ⊙ S(m ⊙ x)`
///
/// Identity outside the mask. `potential` must embed the kernel already
/// scaled by k₀².
#[derive(Debug, Clone)]
pub struct ScalarMaskedOperator {
    grid: VoxelGrid,
    potential: Arc<CirculantEmbedding>,
    mask: Array3<Complex64>,
    contrast: Array3<Complex64>,
}

impl ScalarMaskedOperator {
    pub fn new(
        grid: VoxelGrid,
        potential: Arc<CirculantEmbedding>,
        contrast: &ContrastFields,
    ) -> Result<Self> {
        check_embedding(&grid, potential.grid_shape())?;
        grid.check_field(contrast.index_contrast(), "index contrast")?;
        let mask = indicator(contrast.mask().cells());
        let contrast = product(contrast.index_contrast(), &mask);
        Ok(Self {
            grid,
            potential,
            mask,
            contrast,
        })
    }

    /// Reconstruction operator `S(m ⊙ (mask ⊙ x))` over the whole grid
    pub fn reconstruction(&self) -> FullDomainOperator {
        FullDomainOperator {
            grid: self.grid,
            potential: self.potential.clone(),
            support: self.mask.clone(),
            contrast: self.contrast.clone(),
        }
    }
}

impl VolumeOperator for ScalarMaskedOperator {
    fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    fn apply_field(&self, x: &Array3<Complex64>) -> Result<Array3<Complex64>> {
        self.grid.check_field(x, "field")?;
        let scattered = self.potential.convolve(&product(&self.contrast, x))?;
        let mut y = x.clone();
        Zip::from(&mut y)
            .and(&scattered)
            .and(&self.mask)
            .for_each(|y, s, m| *y -= m * s);
        Ok(y)
    }
}

/// Index- and density-contrast scattering operator
///
/// `y = x - supp ⊙ [S(m_ρ ⊙ x) + Σ_j D_j(χ ⊙ ∂_j x)]`, identity outside
/// `supp`, the mask grown by one voxel around the density contrast. Without
/// density contrast this is exactly [`ScalarMaskedOperator`].
#[derive(Debug, Clone)]
pub struct DensityCoupledOperator {
    grid: VoxelGrid,
    potential: Arc<CirculantEmbedding>,
    gradient: Arc<GradientEmbedding>,
    support: Array3<Complex64>,
    effective_contrast: Array3<Complex64>,
    density_contrast: Array3<Complex64>,
}

impl DensityCoupledOperator {
    pub fn new(
        grid: VoxelGrid,
        potential: Arc<CirculantEmbedding>,
        gradient: Arc<GradientEmbedding>,
        contrast: &ContrastFields,
    ) -> Result<Self> {
        check_embedding(&grid, potential.grid_shape())?;
        check_embedding(&grid, gradient.grid_shape())?;
        grid.check_field(contrast.index_contrast(), "index contrast")?;

        let coupling = contrast.density_coupling(&grid)?;
        let support = indicator(coupling.support.cells());

        log::debug!(
            "Density-coupled operator: {} support voxels of {} ({} in mask)",
            coupling.support.count(),
            grid.num_voxels(),
            contrast.mask().count()
        );

        Ok(Self {
            grid,
            potential,
            gradient,
            support,
            effective_contrast: coupling.effective_contrast,
            density_contrast: coupling.density_contrast.mapv(|chi| Complex64::new(chi, 0.0)),
        })
    }

    /// m_ρ = (ρ₀/ρ)(1 + m) - 1
    pub fn effective_contrast(&self) -> &Array3<Complex64> {
        &self.effective_contrast
    }

    /// Support indicator (1 inside, 0 outside)
    pub fn support(&self) -> &Array3<Complex64> {
        &self.support
    }

    /// Reconstruction operators: scalar part and flux correction
    ///
    /// Both read the field on the support only.
    pub fn reconstruction(&self) -> (FullDomainOperator, GradientOperator) {
        (
            FullDomainOperator {
                grid: self.grid,
                potential: self.potential.clone(),
                support: self.support.clone(),
                contrast: self.effective_contrast.clone(),
            },
            GradientOperator {
                grid: self.grid,
                gradient: self.gradient.clone(),
                weight: self.density_contrast.clone(),
            },
        )
    }
}

impl VolumeOperator for DensityCoupledOperator {
    fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    fn apply_field(&self, x: &Array3<Complex64>) -> Result<Array3<Complex64>> {
        self.grid.check_field(x, "field")?;
        let scalar = self
            .potential
            .convolve(&product(&self.effective_contrast, x))?;
        let flux = weighted_gradient(&self.grid, &self.density_contrast, x);
        let gradient = self.gradient.convolve_sum([&flux[0], &flux[1], &flux[2]])?;
        let mut y = x.clone();
        Zip::from(&mut y)
            .and(&scalar)
            .and(&gradient)
            .and(&self.support)
            .for_each(|y, s, g, m| *y -= m * (s + g));
        Ok(y)
    }
}

/// `w ⊙ ∂_j x` for the three axes
fn weighted_gradient(
    grid: &VoxelGrid,
    weight: &Array3<Complex64>,
    x: &Array3<Complex64>,
) -> [Array3<Complex64>; 3] {
    [0, 1, 2].map(|axis| {
        let mut d = partial_derivative(x, axis, grid.dx());
        d.zip_mut_with(weight, |d, w| *d *= *w);
        d
    })
}

/// Scattered field everywhere from a solution on the support:
/// `y = S(c ⊙ (supp ⊙ x))`
#[derive(Debug, Clone)]
pub struct FullDomainOperator {
    grid: VoxelGrid,
    potential: Arc<CirculantEmbedding>,
    support: Array3<Complex64>,
    contrast: Array3<Complex64>,
}

impl FullDomainOperator {
    /// Operator for an arbitrary contrast restricted to `support`
    pub fn new(
        grid: VoxelGrid,
        potential: Arc<CirculantEmbedding>,
        support: &Array3<bool>,
        contrast: Array3<Complex64>,
    ) -> Result<Self> {
        check_embedding(&grid, potential.grid_shape())?;
        grid.check_field(support, "support")?;
        grid.check_field(&contrast, "contrast")?;
        Ok(Self {
            grid,
            potential,
            support: indicator(support),
            contrast,
        })
    }
}

impl VolumeOperator for FullDomainOperator {
    fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    fn apply_field(&self, x: &Array3<Complex64>) -> Result<Array3<Complex64>> {
        self.grid.check_field(x, "field")?;
        let mut source = product(&self.support, x);
        source.zip_mut_with(&self.contrast, |s, m| *s *= *m);
        self.potential.convolve(&source)
    }
}

/// Flux correction `y = Σ_j D_j(w ⊙ ∂_j x)` over the whole grid
///
/// With `w = 1` this is `∫ G Δx`, i.e. `-x - k₀² ∫ G x` for a field that
/// vanishes on the grid boundary.
#[derive(Debug, Clone)]
pub struct GradientOperator {
    grid: VoxelGrid,
    gradient: Arc<GradientEmbedding>,
    weight: Array3<Complex64>,
}

impl GradientOperator {
    pub fn new(
        grid: VoxelGrid,
        gradient: Arc<GradientEmbedding>,
        weight: Array3<Complex64>,
    ) -> Result<Self> {
        check_embedding(&grid, gradient.grid_shape())?;
        grid.check_field(&weight, "weight")?;
        Ok(Self {
            grid,
            gradient,
            weight,
        })
    }
}

impl VolumeOperator for GradientOperator {
    fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    fn apply_field(&self, x: &Array3<Complex64>) -> Result<Array3<Complex64>> {
        self.grid.check_field(x, "field")?;
        let flux = weighted_gradient(&self.grid, &self.weight, x);
        self.gradient.convolve_sum([&flux[0], &flux[1], &flux[2]])
    }
}

/// Unmasked convolution with an arbitrary contrast: `y = S(c ⊙ x)`
#[derive(Debug, Clone)]
pub struct ContrastOperator {
    grid: VoxelGrid,
    potential: Arc<CirculantEmbedding>,
    contrast: Array3<Complex64>,
}

impl ContrastOperator {
    pub fn new(
        grid: VoxelGrid,
        potential: Arc<CirculantEmbedding>,
        contrast: Array3<Complex64>,
    ) -> Result<Self> {
        check_embedding(&grid, potential.grid_shape())?;
        grid.check_field(&contrast, "contrast")?;
        Ok(Self {
            grid,
            potential,
            contrast,
        })
    }

    /// Unit contrast: plain convolution
    pub fn unit(grid: VoxelGrid, potential: Arc<CirculantEmbedding>) -> Result<Self> {
        let contrast = Array3::from_elem(grid.shape(), ONE);
        Self::new(grid, potential, contrast)
    }
}

impl VolumeOperator for ContrastOperator {
    fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    fn apply_field(&self, x: &Array3<Complex64>) -> Result<Array3<Complex64>> {
        self.grid.check_field(x, "field")?;
        self.potential.convolve(&product(&self.contrast, x))
    }
}

impl_linear_operator!(
    ScalarMaskedOperator,
    DensityCoupledOperator,
    FullDomainOperator,
    GradientOperator,
    ContrastOperator,
);
