//! Vector kernels shared by the Krylov solvers

use crate::traits::ComplexField;
use ndarray::{Array1, Zip};
use num_traits::{Float, One, Zero};

/// `(x, y) = Σ conj(x_i) y_i`, conjugate-linear in the first argument
#[inline]
pub fn inner_product<T: ComplexField>(x: &Array1<T>, y: &Array1<T>) -> T {
    debug_assert_eq!(x.len(), y.len(), "vector lengths must match");
    Zip::from(x)
        .and(y)
        .fold(T::zero(), |acc, xi, yi| acc + xi.conj() * *yi)
}

/// Euclidean norm
#[inline]
pub fn vector_norm<T: ComplexField>(x: &Array1<T>) -> T::Real
where
    T::Real: Float,
{
    Float::sqrt(x.fold(T::Real::zero(), |acc, xi| acc + xi.norm_sqr()))
}

/// `y += α x`
#[inline]
pub fn axpy<T: ComplexField>(alpha: T, x: &Array1<T>, y: &mut Array1<T>) {
    Zip::from(y).and(x).for_each(|yi, &xi| *yi += alpha * xi);
}

/// `x / norm` as a new vector
#[inline]
pub fn normalized<T: ComplexField>(x: &Array1<T>, norm: T::Real) -> Array1<T> {
    let inv = T::from_real(T::Real::one() / norm);
    x.mapv(|xi| xi * inv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use num_complex::Complex64;

    #[test]
    fn test_inner_product_conjugates_left() {
        let x = array![Complex64::new(0.0, 1.0)];
        let y = array![Complex64::new(0.0, 1.0)];
        let ip = inner_product(&x, &y);
        assert_relative_eq!(ip.re, 1.0);
        assert_relative_eq!(ip.im, 0.0);
    }

    #[test]
    fn test_norm_and_axpy() {
        let x = array![3.0, 4.0];
        assert_relative_eq!(vector_norm(&x), 5.0);

        let mut y = array![1.0, 1.0];
        axpy(2.0, &x, &mut y);
        assert_relative_eq!(y[0], 7.0);
        assert_relative_eq!(y[1], 9.0);

        let unit = normalized(&x, 5.0);
        assert_relative_eq!(vector_norm(&unit), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_complex_norm() {
        let z = array![Complex64::new(1.0, 2.0), Complex64::new(-2.0, 4.0)];
        assert_relative_eq!(vector_norm(&z), 5.0, epsilon = 1e-14);
        let unit = normalized(&z, vector_norm(&z));
        assert_relative_eq!(inner_product(&unit, &unit).re, 1.0, epsilon = 1e-14);
    }
}
