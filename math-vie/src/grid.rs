//! Regular voxel grid and inclusion masks
//!
//! Voxel `(i, j, k)` sits at `origin + dx·(i, j, k)`. Every conversion between
//! 3-D fields and the flat vectors handed to the Krylov solver goes through
//! [`VoxelGrid::flatten`] / [`VoxelGrid::unflatten`], which use row-major
//! order: flat index `(i·M + j)·N + k`.

use crate::error::{Result, VieError};
use ndarray::{Array1, Array3};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Relative tolerance on pitch uniformity when reading coordinates
pub const PITCH_TOLERANCE: f64 = 1e-9;

/// Uniform Cartesian voxel grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoxelGrid {
    shape: (usize, usize, usize),
    dx: f64,
    origin: [f64; 3],
}

impl VoxelGrid {
    /// Grid with explicit shape, pitch and origin (centre of voxel `(0,0,0)`)
    pub fn new(shape: (usize, usize, usize), dx: f64, origin: [f64; 3]) -> Result<Self> {
        if !(dx.is_finite() && dx > 0.0) {
            return Err(VieError::geometry(format!("pitch must be positive, got {dx}")));
        }
        if shape.0 == 0 || shape.1 == 0 || shape.2 == 0 {
            return Err(VieError::geometry(format!("empty grid shape {shape:?}")));
        }
        if origin.iter().any(|c| !c.is_finite()) {
            return Err(VieError::geometry("origin is not finite"));
        }
        Ok(Self { shape, dx, origin })
    }

    /// Box of physical size `extent` at pitch `dx`, centred on `centre`
    ///
    /// Each axis holds `round(w/dx)` voxels (at least one).
    pub fn from_extent(extent: [f64; 3], dx: f64, centre: [f64; 3]) -> Result<Self> {
        if extent.iter().any(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(VieError::geometry(format!("invalid extent {extent:?}")));
        }
        if !(dx.is_finite() && dx > 0.0) {
            return Err(VieError::geometry(format!("pitch must be positive, got {dx}")));
        }
        let count = |w: f64| ((w / dx).round() as usize).max(1);
        let shape = (count(extent[0]), count(extent[1]), count(extent[2]));
        let dims = [shape.0, shape.1, shape.2];
        let mut origin = [0.0; 3];
        for axis in 0..3 {
            origin[axis] = centre[axis] - 0.5 * dx * (dims[axis] - 1) as f64;
        }
        Self::new(shape, dx, origin)
    }

    /// Grid from per-axis voxel centre coordinates
    ///
    /// Fails with [`VieError::Geometry`] unless every axis is strictly
    /// increasing with one common pitch.
    pub fn from_coordinates(x: &[f64], y: &[f64], z: &[f64]) -> Result<Self> {
        let mut pitch: Option<f64> = None;
        for (name, axis) in [("x", x), ("y", y), ("z", z)] {
            if axis.is_empty() {
                return Err(VieError::geometry(format!("{name} axis has no coordinates")));
            }
            for pair in axis.windows(2) {
                let step = pair[1] - pair[0];
                if !(step.is_finite() && step > 0.0) {
                    return Err(VieError::geometry(format!(
                        "{name} axis is not strictly increasing"
                    )));
                }
                match pitch {
                    None => pitch = Some(step),
                    Some(dx) if (step - dx).abs() > PITCH_TOLERANCE * dx => {
                        return Err(VieError::geometry(format!(
                            "non-uniform pitch on {name} axis: {step} vs {dx}"
                        )));
                    }
                    Some(_) => {}
                }
            }
        }
        let dx = pitch.ok_or_else(|| VieError::geometry("cannot infer pitch from a single voxel"))?;
        Self::new((x.len(), y.len(), z.len()), dx, [x[0], y[0], z[0]])
    }

    /// Same grid moved by `offset`
    pub fn shifted(&self, offset: [f64; 3]) -> Self {
        Self {
            origin: [
                self.origin[0] + offset[0],
                self.origin[1] + offset[1],
                self.origin[2] + offset[2],
            ],
            ..*self
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// L·M·N
    pub fn num_voxels(&self) -> usize {
        self.shape.0 * self.shape.1 * self.shape.2
    }

    /// dx³
    pub fn voxel_volume(&self) -> f64 {
        self.dx.powi(3)
    }

    /// Shape of the Toeplitz lag tensor, (2L-1, 2M-1, 2N-1)
    pub fn lag_shape(&self) -> (usize, usize, usize) {
        (2 * self.shape.0 - 1, 2 * self.shape.1 - 1, 2 * self.shape.2 - 1)
    }

    /// Shape of the circulant embedding, (2L, 2M, 2N)
    pub fn padded_shape(&self) -> (usize, usize, usize) {
        (2 * self.shape.0, 2 * self.shape.1, 2 * self.shape.2)
    }

    /// Voxel centre coordinates along one axis (0 = x, 1 = y, 2 = z)
    pub fn axis_coordinates(&self, axis: usize) -> Vec<f64> {
        let len = [self.shape.0, self.shape.1, self.shape.2][axis];
        (0..len)
            .map(|i| self.origin[axis] + self.dx * i as f64)
            .collect()
    }

    /// Centre of voxel `(i, j, k)`
    #[inline]
    pub fn position(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [
            self.origin[0] + self.dx * i as f64,
            self.origin[1] + self.dx * j as f64,
            self.origin[2] + self.dx * k as f64,
        ]
    }

    /// All voxel centres in flat (row-major) order
    pub fn points(&self) -> Vec<[f64; 3]> {
        let (l, m, n) = self.shape;
        let mut pts = Vec::with_capacity(self.num_voxels());
        for i in 0..l {
            for j in 0..m {
                for k in 0..n {
                    pts.push(self.position(i, j, k));
                }
            }
        }
        pts
    }

    /// Voxel index of the grid centre, `(L/2, M/2, N/2)` rounded down
    pub fn centre_index(&self) -> (usize, usize, usize) {
        (self.shape.0 / 2, self.shape.1 / 2, self.shape.2 / 2)
    }

    /// Fail unless `field` has this grid's shape
    pub fn check_field<T>(&self, field: &Array3<T>, what: &'static str) -> Result<()> {
        if field.dim() != self.shape {
            return Err(VieError::mismatch(what, self.shape, field.dim()));
        }
        Ok(())
    }

    /// Grid field to flat vector
    pub fn flatten<T: Clone>(&self, field: &Array3<T>) -> Result<Array1<T>> {
        self.check_field(field, "field")?;
        Ok(field.iter().cloned().collect())
    }

    /// Flat vector to grid field
    pub fn unflatten<T: Clone>(&self, vector: &Array1<T>) -> Result<Array3<T>> {
        if vector.len() != self.num_voxels() {
            return Err(VieError::mismatch("vector", self.num_voxels(), vector.len()));
        }
        Array3::from_shape_vec(self.shape, vector.to_vec())
            .map_err(|e| VieError::geometry(e.to_string()))
    }
}

/// Boolean voxel field marking the scatterer
#[derive(Debug, Clone, PartialEq)]
pub struct InclusionMask {
    cells: Array3<bool>,
}

impl InclusionMask {
    /// Wrap an explicit mask, checked against `grid`
    pub fn new(grid: &VoxelGrid, cells: Array3<bool>) -> Result<Self> {
        grid.check_field(&cells, "mask")?;
        Ok(Self { cells })
    }

    /// Every voxel inside
    pub fn full(grid: &VoxelGrid) -> Self {
        Self {
            cells: Array3::from_elem(grid.shape(), true),
        }
    }

    /// No voxel inside
    pub fn empty(grid: &VoxelGrid) -> Self {
        Self {
            cells: Array3::from_elem(grid.shape(), false),
        }
    }

    /// Mark voxels whose centre satisfies `inside`
    pub fn from_predicate<F>(grid: &VoxelGrid, inside: F) -> Self
    where
        F: Fn([f64; 3]) -> bool,
    {
        let cells = Array3::from_shape_fn(grid.shape(), |(i, j, k)| inside(grid.position(i, j, k)));
        Self { cells }
    }

    pub fn cells(&self) -> &Array3<bool> {
        &self.cells
    }

    pub fn dim(&self) -> (usize, usize, usize) {
        self.cells.dim()
    }

    #[inline]
    pub fn contains(&self, index: (usize, usize, usize)) -> bool {
        self.cells[index]
    }

    /// Number of voxels inside
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Voxels inside either mask
    pub fn union(&self, other: &Self) -> Result<Self> {
        if self.dim() != other.dim() {
            return Err(VieError::mismatch("mask", self.dim(), other.dim()));
        }
        let mut cells = self.cells.clone();
        cells.zip_mut_with(&other.cells, |a, b| *a = *a || *b);
        Ok(Self { cells })
    }

    /// Mask grown by one voxel along each of the six face directions
    pub fn dilated(&self) -> Self {
        let (l, m, n) = self.dim();
        let cells = Array3::from_shape_fn((l, m, n), |(i, j, k)| {
            self.cells[(i, j, k)]
                || (i > 0 && self.cells[(i - 1, j, k)])
                || (i + 1 < l && self.cells[(i + 1, j, k)])
                || (j > 0 && self.cells[(i, j - 1, k)])
                || (j + 1 < m && self.cells[(i, j + 1, k)])
                || (k > 0 && self.cells[(i, j, k - 1)])
                || (k + 1 < n && self.cells[(i, j, k + 1)])
        });
        Self { cells }
    }

    /// 1 inside, 0 outside
    pub fn indicator(&self) -> Array3<Complex64> {
        self.cells.mapv(|c| {
            if c {
                Complex64::new(1.0, 0.0)
            } else {
                Complex64::new(0.0, 0.0)
            }
        })
    }
}
