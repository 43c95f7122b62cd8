//! 3-D complex FFT built from 1-D rustfft plans
//!
//! A 3-D transform is three passes of 1-D transforms, one per axis, each pass
//! running over all lanes of that axis in parallel. Plans are created once per
//! shape and shared between threads; lane and scratch buffers are allocated
//! once per worker and reused across lanes.

use crate::parallel::for_each_lane_mut_init;
use ndarray::{Array3, Axis};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Forward/inverse plans for one 3-D shape
#[derive(Clone)]
pub struct Fft3d {
    shape: (usize, usize, usize),
    forward: [Arc<dyn Fft<f64>>; 3],
    inverse: [Arc<dyn Fft<f64>>; 3],
}

impl std::fmt::Debug for Fft3d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fft3d").field("shape", &self.shape).finish()
    }
}

impl Fft3d {
    pub fn new(shape: (usize, usize, usize)) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let lens = [shape.0, shape.1, shape.2];
        let forward = lens.map(|n| planner.plan_fft_forward(n));
        let inverse = lens.map(|n| planner.plan_fft_inverse(n));
        Self {
            shape,
            forward,
            inverse,
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    /// In-place forward transform (no scaling)
    pub fn forward(&self, data: &mut Array3<Complex64>) {
        debug_assert_eq!(data.dim(), self.shape);
        for (axis, plan) in self.forward.iter().enumerate() {
            transform_axis(data, axis, plan.as_ref());
        }
    }

    /// In-place inverse transform, scaled by 1/(n₀·n₁·n₂)
    pub fn inverse(&self, data: &mut Array3<Complex64>) {
        debug_assert_eq!(data.dim(), self.shape);
        for (axis, plan) in self.inverse.iter().enumerate() {
            transform_axis(data, axis, plan.as_ref());
        }
        let scale = 1.0 / data.len() as f64;
        data.mapv_inplace(|v| v * scale);
    }
}

fn transform_axis(data: &mut Array3<Complex64>, axis: usize, plan: &dyn Fft<f64>) {
    let len = data.len_of(Axis(axis));
    if len < 2 {
        return;
    }
    let zero = Complex64::new(0.0, 0.0);
    let scratch_len = plan.get_inplace_scratch_len();
    for_each_lane_mut_init(
        data,
        Axis(axis),
        || (vec![zero; len], vec![zero; scratch_len]),
        |(buffer, scratch): &mut (Vec<Complex64>, Vec<Complex64>), mut lane| {
            for (dst, src) in buffer.iter_mut().zip(lane.iter()) {
                *dst = *src;
            }
            plan.process_with_scratch(buffer, scratch);
            for (dst, src) in lane.iter_mut().zip(buffer.iter()) {
                *dst = *src;
            }
        },
    );
}
