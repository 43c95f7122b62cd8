//! JSON output: axial lines and central slices of computed fields

use crate::error::Result;
use crate::grid::VoxelGrid;
use crate::hifu::HifuResult;
use crate::scattering::ScatteringSolution;
use ndarray::{Array2, Array3, Axis};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Grid description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridInfo {
    pub shape: [usize; 3],
    pub dx: f64,
    pub origin: [f64; 3],
}

/// Field magnitudes along the x axis through the grid centre
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisLine {
    /// x coordinates
    pub x: Vec<f64>,
    /// |p| per harmonic
    pub magnitude: Vec<Vec<f64>>,
}

/// Field data on the central z = const slice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceData {
    /// x coordinates
    pub x: Vec<f64>,
    /// y coordinates
    pub y: Vec<f64>,
    /// z of the slice
    pub z: f64,
    /// |p| on the slice, one array per field
    pub magnitude: Vec<Array2<f64>>,
}

/// HIFU run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HifuOutput {
    pub grid: GridInfo,
    pub frequencies: Vec<f64>,
    pub amplitude: f64,
    pub source_count: usize,
    pub focus: [f64; 3],
    pub axis: AxisLine,
    pub slice: SliceData,
}

/// Scattering run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatteringOutput {
    pub grid: GridInfo,
    pub status: String,
    pub iterations: usize,
    pub residual: f64,
    pub residual_history: Vec<f64>,
    /// Relative L2 error on the central slice against the Mie series
    pub slice_error: Option<f64>,
    pub slice: SliceData,
    /// Re(u) on the central slice
    pub slice_real: Array2<f64>,
}

impl From<&VoxelGrid> for GridInfo {
    fn from(grid: &VoxelGrid) -> Self {
        let (l, m, n) = grid.shape();
        Self {
            shape: [l, m, n],
            dx: grid.dx(),
            origin: grid.origin(),
        }
    }
}

/// z index of the central slice
pub fn central_index(grid: &VoxelGrid) -> usize {
    grid.centre_index().2
}

/// Values on the central z = const slice
pub fn central_slice<T: Clone>(grid: &VoxelGrid, field: &Array3<T>) -> Array2<T> {
    field.index_axis(Axis(2), central_index(grid)).to_owned()
}

/// Voxel centres of the central slice, row-major over (i, j)
pub fn central_slice_points(grid: &VoxelGrid) -> Vec<[f64; 3]> {
    let (l, m, _) = grid.shape();
    let k = central_index(grid);
    let mut points = Vec::with_capacity(l * m);
    for i in 0..l {
        for j in 0..m {
            points.push(grid.position(i, j, k));
        }
    }
    points
}

/// Values along x through the grid centre
pub fn axis_line<T: Clone>(grid: &VoxelGrid, field: &Array3<T>) -> Vec<T> {
    let (_, j, k) = grid.centre_index();
    field
        .index_axis(Axis(2), k)
        .index_axis(Axis(1), j)
        .to_vec()
}

fn magnitude_slice(grid: &VoxelGrid, field: &Array3<Complex64>) -> Array2<f64> {
    central_slice(grid, field).mapv(|v| v.norm())
}

fn slice_data(grid: &VoxelGrid, fields: &[Array3<Complex64>]) -> SliceData {
    SliceData {
        x: grid.axis_coordinates(0),
        y: grid.axis_coordinates(1),
        z: grid.axis_coordinates(2)[central_index(grid)],
        magnitude: fields.iter().map(|f| magnitude_slice(grid, f)).collect(),
    }
}

impl HifuOutput {
    pub fn new(result: &HifuResult) -> Self {
        let grid = &result.grid;
        let fields = result.harmonics.fields();
        Self {
            grid: grid.into(),
            frequencies: (0..fields.len())
                .map(|h| result.harmonics.frequency(h))
                .collect(),
            amplitude: result.amplitude,
            source_count: result.source_count,
            focus: result.focus,
            axis: AxisLine {
                x: grid.axis_coordinates(0),
                magnitude: fields
                    .iter()
                    .map(|f| axis_line(grid, f).iter().map(|v| v.norm()).collect())
                    .collect(),
            },
            slice: slice_data(grid, fields),
        }
    }
}

impl ScatteringOutput {
    pub fn new(grid: &VoxelGrid, solution: &ScatteringSolution, slice_error: Option<f64>) -> Self {
        Self {
            grid: grid.into(),
            status: format!("{:?}", solution.status),
            iterations: solution.iterations,
            residual: solution.residual,
            residual_history: solution.residual_history.clone(),
            slice_error,
            slice: slice_data(grid, std::slice::from_ref(&solution.total_field)),
            slice_real: central_slice(grid, &solution.total_field).mapv(|v| v.re),
        }
    }
}

/// Write any output record as pretty JSON
pub fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_and_line_indices() {
        let grid = VoxelGrid::new((4, 3, 5), 1.0, [0.0; 3]).unwrap();
        let field = Array3::from_shape_fn((4, 3, 5), |(i, j, k)| (100 * i + 10 * j + k) as f64);
        let slice = central_slice(&grid, &field);
        assert_eq!(slice.dim(), (4, 3));
        assert_eq!(slice[(2, 1)], 212.0);
        assert_eq!(axis_line(&grid, &field), vec![12.0, 112.0, 212.0, 312.0]);

        let points = central_slice_points(&grid);
        assert_eq!(points.len(), 12);
        assert_eq!(points[4], [1.0, 1.0, 2.0]);
    }
}
