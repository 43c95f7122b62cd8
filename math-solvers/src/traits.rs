//! Scalar and operator abstractions for the Krylov solvers
//!
//! - [`ComplexField`]: scalars the recurrences run over (`f64`, `Complex64`)
//! - [`LinearOperator`]: a matrix-vector product, nothing more

use ndarray::{Array1, Array2};
use num_complex::{Complex64, ComplexFloat};
use num_traits::{FromPrimitive, NumAssign};
use std::fmt::Debug;

/// Scalar field for the Krylov recurrences
///
/// Builds on [`ComplexFloat`] (conjugation, modulus, reciprocal) and adds the
/// two operations the solvers need that it lacks.
pub trait ComplexField:
    ComplexFloat<Real: NumAssign + FromPrimitive + Send + Sync + Debug + 'static>
    + NumAssign
    + Send
    + Sync
    + Debug
    + 'static
{
    /// Embed a real value
    fn from_real(r: Self::Real) -> Self;

    /// |z|² without the square root
    #[inline]
    fn norm_sqr(&self) -> Self::Real {
        let (re, im) = (self.re(), self.im());
        re * re + im * im
    }
}

impl ComplexField for Complex64 {
    #[inline]
    fn from_real(r: f64) -> Self {
        Complex64::new(r, 0.0)
    }
}

impl ComplexField for f64 {
    #[inline]
    fn from_real(r: f64) -> Self {
        r
    }
}

/// Matrix-vector product `y = A x`
///
/// GMRES only calls [`LinearOperator::apply`], possibly many times with
/// different vectors; implementors must be linear and keep no state between
/// calls.
pub trait LinearOperator<T: ComplexField>: Send + Sync {
    fn num_rows(&self) -> usize;

    fn num_cols(&self) -> usize;

    /// `y = A x`
    fn apply(&self, x: &Array1<T>) -> Array1<T>;

    fn is_square(&self) -> bool {
        self.num_rows() == self.num_cols()
    }
}

/// Explicit matrix as a [`LinearOperator`], for small reference systems and
/// brute-force checks of matrix-free operators
#[derive(Debug, Clone)]
pub struct DenseOperator<T: ComplexField> {
    matrix: Array2<T>,
}

impl<T: ComplexField> DenseOperator<T> {
    pub fn new(matrix: Array2<T>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Array2<T> {
        &self.matrix
    }
}

impl<T: ComplexField> LinearOperator<T> for DenseOperator<T> {
    fn num_rows(&self) -> usize {
        self.matrix.nrows()
    }

    fn num_cols(&self) -> usize {
        self.matrix.ncols()
    }

    fn apply(&self, x: &Array1<T>) -> Array1<T> {
        self.matrix
            .rows()
            .into_iter()
            .map(|row| {
                row.iter()
                    .zip(x.iter())
                    .fold(T::zero(), |acc, (a, xj)| acc + *a * *xj)
            })
            .collect()
    }
}
