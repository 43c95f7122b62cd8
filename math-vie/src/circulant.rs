//! Circulant embedding of Toeplitz kernels
//!
//! A 3-level Toeplitz kernel over lags `-(L-1)..=(L-1)` is placed in a
//! periodic tensor of shape `(2L, 2M, 2N)`: lag `p` goes to index `p mod 2L`
//! and index `L` (the unused wrap-around slot) stays zero. Convolving the
//! zero-padded field with this tensor through the FFT reproduces the linear
//! Toeplitz product exactly on the first `L×M×N` entries.
//!
//! The full lag range is stored on both sides, so an odd kernel (a gradient
//! component) embeds as `c[2L - p] = -c[p]` without any sign bookkeeping.

use crate::error::{Result, VieError};
use crate::fft::Fft3d;
use crate::kernel::{GradientKernel, ToeplitzKernel};
use crate::parallel::zip_apply;
use ndarray::{Array3, s};
use num_complex::Complex64;
use std::sync::Arc;

/// Spectrum of one embedded kernel, ready for FFT convolution
#[derive(Debug, Clone)]
pub struct CirculantEmbedding {
    grid_shape: (usize, usize, usize),
    wavenumber: Complex64,
    spectrum: Array3<Complex64>,
    fft: Arc<Fft3d>,
}

/// Embeddings of the three gradient-kernel components
#[derive(Debug, Clone)]
pub struct GradientEmbedding {
    components: [CirculantEmbedding; 3],
}

/// Place a lag tensor in its periodic `(2L, 2M, 2N)` layout
pub fn embed(kernel: &ToeplitzKernel) -> Array3<Complex64> {
    let (l, m, n) = kernel.grid_shape();
    let mut padded = Array3::zeros((2 * l, 2 * m, 2 * n));
    for ((a, b, c), value) in kernel.values().indexed_iter() {
        let i = wrap(a, l);
        let j = wrap(b, m);
        let k = wrap(c, n);
        padded[(i, j, k)] = *value;
    }
    padded
}

/// Padded index of lag-tensor index `a` on an axis of length `len`
#[inline]
fn wrap(a: usize, len: usize) -> usize {
    // lag p = a - (len - 1); p mod 2len
    if a + 1 >= len {
        a + 1 - len
    } else {
        a + 1 + len
    }
}

impl CirculantEmbedding {
    /// Embed `kernel` and cache its forward spectrum
    pub fn new(kernel: &ToeplitzKernel) -> Self {
        let (l, m, n) = kernel.grid_shape();
        let fft = Arc::new(Fft3d::new((2 * l, 2 * m, 2 * n)));
        Self::with_plan(kernel, fft)
    }

    /// Embed `kernel` reusing existing FFT plans for the padded shape
    pub fn with_plan(kernel: &ToeplitzKernel, fft: Arc<Fft3d>) -> Self {
        let mut spectrum = embed(kernel);
        debug_assert_eq!(spectrum.dim(), fft.shape());
        fft.forward(&mut spectrum);
        Self {
            grid_shape: kernel.grid_shape(),
            wavenumber: kernel.wavenumber(),
            spectrum,
            fft,
        }
    }

    pub fn grid_shape(&self) -> (usize, usize, usize) {
        self.grid_shape
    }

    pub fn padded_shape(&self) -> (usize, usize, usize) {
        self.spectrum.dim()
    }

    pub fn wavenumber(&self) -> Complex64 {
        self.wavenumber
    }

    pub fn spectrum(&self) -> &Array3<Complex64> {
        &self.spectrum
    }

    pub fn fft(&self) -> &Arc<Fft3d> {
        &self.fft
    }

    /// Toeplitz convolution `y_i = Σ_j K(i - j) x_j` over the grid
    pub fn convolve(&self, field: &Array3<Complex64>) -> Result<Array3<Complex64>> {
        let mut padded = self.pad(field)?;
        self.fft.forward(&mut padded);
        zip_apply(&mut padded, &self.spectrum, |v, k| *v *= *k);
        self.fft.inverse(&mut padded);
        Ok(self.truncate(&padded))
    }

    /// Zero-pad a grid field to the embedding shape
    fn pad(&self, field: &Array3<Complex64>) -> Result<Array3<Complex64>> {
        if field.dim() != self.grid_shape {
            return Err(VieError::mismatch("field", self.grid_shape, field.dim()));
        }
        let (l, m, n) = self.grid_shape;
        let mut padded = Array3::zeros(self.spectrum.dim());
        padded.slice_mut(s![..l, ..m, ..n]).assign(field);
        Ok(padded)
    }

    fn truncate(&self, padded: &Array3<Complex64>) -> Array3<Complex64> {
        let (l, m, n) = self.grid_shape;
        padded.slice(s![..l, ..m, ..n]).to_owned()
    }
}

impl GradientEmbedding {
    /// Embed the three gradient components with one shared set of FFT plans
    pub fn new(kernel: &GradientKernel) -> Self {
        let (l, m, n) = kernel.grid_shape();
        let fft = Arc::new(Fft3d::new((2 * l, 2 * m, 2 * n)));
        Self::with_plan(kernel, fft)
    }

    pub fn with_plan(kernel: &GradientKernel, fft: Arc<Fft3d>) -> Self {
        let components =
            [0, 1, 2].map(|axis| CirculantEmbedding::with_plan(&kernel.component(axis), fft.clone()));
        Self { components }
    }

    pub fn grid_shape(&self) -> (usize, usize, usize) {
        self.components[0].grid_shape()
    }

    pub fn wavenumber(&self) -> Complex64 {
        self.components[0].wavenumber()
    }

    pub fn component(&self, axis: usize) -> &CirculantEmbedding {
        &self.components[axis]
    }

    /// Convolution with one gradient component
    pub fn convolve(&self, axis: usize, field: &Array3<Complex64>) -> Result<Array3<Complex64>> {
        self.components[axis].convolve(field)
    }

    /// `Σ_j D_j(f_j)`, accumulated in the spectral domain with one inverse FFT
    pub fn convolve_sum(&self, fields: [&Array3<Complex64>; 3]) -> Result<Array3<Complex64>> {
        let first = &self.components[0];
        let mut total = Array3::<Complex64>::zeros(first.padded_shape());
        for (embedding, field) in self.components.iter().zip(fields) {
            let mut padded = embedding.pad(field)?;
            embedding.fft.forward(&mut padded);
            zip_apply(&mut padded, &embedding.spectrum, |v, k| *v *= *k);
            total += &padded;
        }
        first.fft.inverse(&mut total);
        Ok(first.truncate(&total))
    }
}
