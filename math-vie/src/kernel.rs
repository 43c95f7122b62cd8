//! Toeplitz interaction kernels on a voxel grid
//!
//! On a regular grid the interaction between voxels `i` and `j` depends only
//! on the lag `i - j`, so the full L·M·N × L·M·N matrix is described by one
//! tensor over the lag range. Lags run over `-(L-1)..=(L-1)` on the first axis
//! (likewise M, N) and lag `p` is stored at index `p + L - 1`.
//!
//! Scalar kernel, collocated at voxel centres:
//! ```text
//! K(Δ) = dx³ · exp(ikR) / (4πR),   R = dx·|Δ|
//! K(0) = ∫_{|r|<a} exp(ikr)/(4πr) dV,   a = (3dx³/4π)^{1/3}
//! ```
//!
//! Gradient kernel, component j:
//! ```text
//! K_j(Δ) = dx³ · (Δ_j/R) · (ikR - 1) · exp(ikR) / (4πR²),   K_j(0) = 0
//! ```

use crate::error::{Result, VieError};
use crate::grid::VoxelGrid;
use crate::parallel::parallel_map_indexed;
use math_audio_wave::special::helmholtz::{
    equivalent_ball_radius, greens_function_3d, greens_function_ball_integral,
    greens_function_gradient_3d,
};
use ndarray::Array3;
use num_complex::Complex64;

/// Scalar interaction kernel over the full lag range
#[derive(Debug, Clone)]
pub struct ToeplitzKernel {
    grid_shape: (usize, usize, usize),
    wavenumber: Complex64,
    values: Array3<Complex64>,
}

/// Gradient interaction kernel, one lag tensor per axis
#[derive(Debug, Clone)]
pub struct GradientKernel {
    grid_shape: (usize, usize, usize),
    wavenumber: Complex64,
    components: [Array3<Complex64>; 3],
}

impl ToeplitzKernel {
    /// Wrap an explicit lag tensor for a grid of `grid_shape`
    pub fn from_values(
        grid_shape: (usize, usize, usize),
        wavenumber: Complex64,
        values: Array3<Complex64>,
    ) -> Result<Self> {
        let expected = lag_shape(grid_shape);
        if values.dim() != expected {
            return Err(VieError::mismatch("kernel", expected, values.dim()));
        }
        Ok(Self {
            grid_shape,
            wavenumber,
            values,
        })
    }

    pub fn grid_shape(&self) -> (usize, usize, usize) {
        self.grid_shape
    }

    pub fn wavenumber(&self) -> Complex64 {
        self.wavenumber
    }

    /// Lag tensor, shape (2L-1, 2M-1, 2N-1)
    pub fn values(&self) -> &Array3<Complex64> {
        &self.values
    }

    /// Kernel value at signed lag `(p, q, r)`
    pub fn lag(&self, p: isize, q: isize, r: isize) -> Complex64 {
        let (l, m, n) = self.grid_shape;
        self.values[(
            (p + l as isize - 1) as usize,
            (q + m as isize - 1) as usize,
            (r + n as isize - 1) as usize,
        )]
    }

    /// Same kernel multiplied by a constant
    pub fn scaled(&self, factor: Complex64) -> Self {
        Self {
            grid_shape: self.grid_shape,
            wavenumber: self.wavenumber,
            values: self.values.mapv(|v| v * factor),
        }
    }
}

impl GradientKernel {
    pub fn grid_shape(&self) -> (usize, usize, usize) {
        self.grid_shape
    }

    pub fn wavenumber(&self) -> Complex64 {
        self.wavenumber
    }

    /// Component along `axis` as a scalar Toeplitz kernel
    pub fn component(&self, axis: usize) -> ToeplitzKernel {
        ToeplitzKernel {
            grid_shape: self.grid_shape,
            wavenumber: self.wavenumber,
            values: self.components[axis].clone(),
        }
    }

    pub fn components(&self) -> &[Array3<Complex64>; 3] {
        &self.components
    }
}

/// (2L-1, 2M-1, 2N-1)
pub fn lag_shape(grid_shape: (usize, usize, usize)) -> (usize, usize, usize) {
    (2 * grid_shape.0 - 1, 2 * grid_shape.1 - 1, 2 * grid_shape.2 - 1)
}

fn check_inputs(k: Complex64, grid: &VoxelGrid) -> Result<()> {
    let dx = grid.dx();
    if !(dx.is_finite() && dx > 0.0) {
        return Err(VieError::geometry(format!("pitch must be positive, got {dx}")));
    }
    if !(k.re.is_finite() && k.im.is_finite()) {
        return Err(VieError::invalid("wavenumber", format!("not finite: {k}")));
    }
    if k.im < 0.0 {
        return Err(VieError::invalid(
            "wavenumber",
            format!("imaginary part must be non-negative, got {}", k.im),
        ));
    }
    Ok(())
}

/// Map a flat lag-tensor index back to signed lags
#[inline]
fn signed_lag(flat: usize, grid_shape: (usize, usize, usize)) -> [isize; 3] {
    let (_, m2, n2) = lag_shape(grid_shape);
    let a = flat / (m2 * n2);
    let b = (flat / n2) % m2;
    let c = flat % n2;
    [
        a as isize - (grid_shape.0 as isize - 1),
        b as isize - (grid_shape.1 as isize - 1),
        c as isize - (grid_shape.2 as isize - 1),
    ]
}

/// Assemble the scalar Helmholtz kernel at wavenumber `k`
///
/// A positive imaginary part of `k` models absorption.
pub fn assemble_potential(k: Complex64, grid: &VoxelGrid) -> Result<ToeplitzKernel> {
    check_inputs(k, grid)?;
    let shape = grid.shape();
    let dims = lag_shape(shape);
    let dx = grid.dx();
    let vol = grid.voxel_volume();
    let self_term = greens_function_ball_integral(equivalent_ball_radius(dx), k);

    log::debug!(
        "Assembling potential kernel: lag shape {:?}, k = {:.4}",
        dims,
        k
    );

    let values = parallel_map_indexed(dims.0 * dims.1 * dims.2, |flat| {
        let [p, q, r] = signed_lag(flat, shape);
        if p == 0 && q == 0 && r == 0 {
            return self_term;
        }
        let distance = dx * ((p * p + q * q + r * r) as f64).sqrt();
        vol * greens_function_3d(distance, k)
    });

    let values = Array3::from_shape_vec(dims, values)
        .map_err(|e| VieError::geometry(e.to_string()))?;
    Ok(ToeplitzKernel {
        grid_shape: shape,
        wavenumber: k,
        values,
    })
}

/// Assemble the three components of the Helmholtz kernel gradient
pub fn assemble_gradient(k: Complex64, grid: &VoxelGrid) -> Result<GradientKernel> {
    check_inputs(k, grid)?;
    let shape = grid.shape();
    let dims = lag_shape(shape);
    let dx = grid.dx();
    let vol = grid.voxel_volume();

    log::debug!(
        "Assembling gradient kernel: lag shape {:?}, k = {:.4}",
        dims,
        k
    );

    let entries = parallel_map_indexed(dims.0 * dims.1 * dims.2, |flat| {
        let [p, q, r] = signed_lag(flat, shape);
        let delta = [dx * p as f64, dx * q as f64, dx * r as f64];
        let grad = greens_function_gradient_3d(delta, k);
        [vol * grad[0], vol * grad[1], vol * grad[2]]
    });

    let mut components = [
        Array3::zeros(dims),
        Array3::zeros(dims),
        Array3::zeros(dims),
    ];
    for (axis, component) in components.iter_mut().enumerate() {
        for (dst, src) in component.iter_mut().zip(entries.iter()) {
            *dst = src[axis];
        }
    }

    Ok(GradientKernel {
        grid_shape: shape,
        wavenumber: k,
        components,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn grid(shape: (usize, usize, usize)) -> VoxelGrid {
        VoxelGrid::new(shape, 0.01, [0.0; 3]).unwrap()
    }

    #[test]
    fn test_potential_shape_and_symmetry() {
        let g = grid((3, 4, 2));
        let kernel = assemble_potential(Complex64::new(50.0, 1.0), &g).unwrap();
        assert_eq!(kernel.values().dim(), (5, 7, 3));
        for p in -2..=2isize {
            for q in -3..=3isize {
                for r in -1..=1isize {
                    let a = kernel.lag(p, q, r);
                    let b = kernel.lag(-p, -q, -r);
                    assert_relative_eq!(a.re, b.re, epsilon = 1e-15);
                    assert_relative_eq!(a.im, b.im, epsilon = 1e-15);
                }
            }
        }
    }

    #[test]
    fn test_potential_values() {
        let g = grid((3, 3, 3));
        let k = Complex64::new(80.0, 0.0);
        let kernel = assemble_potential(k, &g).unwrap();
        let dx = g.dx();
        let r = dx * 2.0f64.sqrt();
        let expected = dx.powi(3) * (Complex64::i() * k * r).exp() / (4.0 * PI * r);
        let got = kernel.lag(1, -1, 0);
        assert_relative_eq!(got.re, expected.re, epsilon = 1e-15);
        assert_relative_eq!(got.im, expected.im, epsilon = 1e-15);

        // Static self term: a²/2 with a the equal-volume radius
        let a = equivalent_ball_radius(dx);
        let small = assemble_potential(Complex64::new(1e-3, 0.0), &g).unwrap();
        assert_relative_eq!(small.lag(0, 0, 0).re, a * a / 2.0, max_relative = 1e-6);
    }

    #[test]
    fn test_gradient_is_odd_and_zero_at_origin() {
        let g = grid((3, 3, 4));
        let kernel = assemble_gradient(Complex64::new(60.0, 0.5), &g).unwrap();
        for axis in 0..3 {
            let c = kernel.component(axis);
            assert_eq!(c.lag(0, 0, 0), Complex64::new(0.0, 0.0));
            let s = c.lag(1, 2, -3) + c.lag(-1, -2, 3);
            assert!(s.norm() < 1e-18);
        }
        // x-component vanishes on the x = 0 lag plane
        assert_eq!(kernel.component(0).lag(0, 1, 2), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_scaled() {
        let g = grid((2, 2, 2));
        let kernel = assemble_potential(Complex64::new(10.0, 0.0), &g).unwrap();
        let scaled = kernel.scaled(Complex64::new(100.0, 0.0));
        assert_relative_eq!(scaled.lag(1, 0, 0).re, 100.0 * kernel.lag(1, 0, 0).re);
    }

    #[test]
    fn test_rejects_bad_wavenumber() {
        let g = grid((2, 2, 2));
        let err = assemble_potential(Complex64::new(f64::NAN, 0.0), &g).unwrap_err();
        assert!(err.is_validation_error());
        assert!(assemble_gradient(Complex64::new(1.0, -1.0), &g).is_err());
    }
}
