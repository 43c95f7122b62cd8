//! Portable parallel iteration
//!
//! - `native` feature: rayon (and ndarray's rayon producers)
//! - otherwise: sequential iteration with the same signatures
//!
//! Voxel-wise work (kernel entries, FFT lanes, spectral products, point
//! sources) goes through these helpers so the crate builds with or without
//! rayon.

use ndarray::{Array3, ArrayViewMut1, Axis, Zip};

/// Threads the helpers below spread work over
pub fn worker_count() -> usize {
    #[cfg(feature = "native")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "native"))]
    {
        1
    }
}

/// `f(0), …, f(count-1)` in index order
#[cfg(feature = "native")]
pub fn parallel_map_indexed<U, F>(count: usize, f: F) -> Vec<U>
where
    U: Send,
    F: Fn(usize) -> U + Sync + Send,
{
    use rayon::prelude::*;
    (0..count).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "native"))]
pub fn parallel_map_indexed<U, F>(count: usize, f: F) -> Vec<U>
where
    F: Fn(usize) -> U,
{
    (0..count).map(f).collect()
}

/// `f` over a slice, order preserved
#[cfg(feature = "native")]
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    use rayon::prelude::*;
    data.par_iter().map(f).collect()
}

#[cfg(not(feature = "native"))]
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    F: Fn(&T) -> U,
{
    data.iter().map(f).collect()
}

/// Visit every 1-D lane of `array` along `axis`, in parallel when available
///
/// `f` gets mutable state built by `init`, which runs once per rayon job
/// split rather than once per lane.
#[cfg(feature = "native")]
pub fn for_each_lane_mut_init<T, S, I, F>(array: &mut Array3<T>, axis: Axis, init: I, f: F)
where
    T: Send + Sync,
    I: Fn() -> S + Sync + Send,
    F: Fn(&mut S, ArrayViewMut1<'_, T>) + Sync + Send,
{
    use rayon::prelude::*;
    Zip::from(array.lanes_mut(axis))
        .into_par_iter()
        .for_each_init(init, |state, (lane,)| f(state, lane));
}

#[cfg(not(feature = "native"))]
pub fn for_each_lane_mut_init<T, S, I, F>(array: &mut Array3<T>, axis: Axis, init: I, f: F)
where
    I: Fn() -> S,
    F: Fn(&mut S, ArrayViewMut1<'_, T>),
{
    let mut state = init();
    Zip::from(array.lanes_mut(axis)).for_each(|lane| f(&mut state, lane));
}

/// Parallel elementwise update of `target` from `source`
#[cfg(feature = "native")]
pub fn zip_apply<T, S, F>(target: &mut Array3<T>, source: &Array3<S>, f: F)
where
    T: Send + Sync,
    S: Send + Sync,
    F: Fn(&mut T, &S) + Sync + Send,
{
    Zip::from(target).and(source).par_for_each(f);
}

#[cfg(not(feature = "native"))]
pub fn zip_apply<T, S, F>(target: &mut Array3<T>, source: &Array3<S>, f: F)
where
    F: Fn(&mut T, &S),
{
    Zip::from(target).and(source).for_each(f);
}
