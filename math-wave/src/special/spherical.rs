//! Spherical Bessel and Hankel functions of real argument
//!
//! ```text
//! j_n(x) = √(π/2x) J_{n+1/2}(x)
//! y_n(x) = √(π/2x) Y_{n+1/2}(x)
//! h_n^(1)(x) = j_n(x) + i y_n(x)
//! ```

use num_complex::Complex64;

/// Rescale threshold for the downward recurrence.
const RECURRENCE_OVERFLOW: f64 = 1e250;

/// Compute spherical Bessel functions j_n(x) for n = 0, 1, ..., order-1
///
/// Miller's downward recurrence:
/// ```text
/// j_{n-1}(x) = (2n+1)/x j_n(x) - j_{n+1}(x)
/// ```
/// Stable for n > x, where upward recurrence loses all digits. The sequence
/// is normalized against whichever of the closed forms
/// `j_0 = sin x / x` and `j_1 = sin x / x² - cos x / x` is larger, since
/// either one vanishes at some x.
///
/// # Example
/// ```
/// use math_audio_wave::special::spherical::spherical_bessel_j;
/// let j = spherical_bessel_j(3, 1.0);
/// assert!((j[0] - 1.0f64.sin()).abs() < 1e-12);
/// ```
pub fn spherical_bessel_j(order: usize, x: f64) -> Vec<f64> {
    let order = order.max(1);
    let mut result = vec![0.0; order.max(2)];

    if x.abs() < 1e-12 {
        result[0] = 1.0;
        result.truncate(order);
        return result;
    }

    let start = result.len() + x.abs() as usize + 25;
    let mut next = 0.0; // j_{n+1}
    let mut current = 1e-30; // j_n
    for n in (1..=start).rev() {
        let previous = (2 * n + 1) as f64 / x * current - next;
        next = current;
        current = previous;
        if n - 1 < result.len() {
            result[n - 1] = current;
        }
        if current.abs() > RECURRENCE_OVERFLOW {
            let scale = 1.0 / current.abs();
            current *= scale;
            next *= scale;
            for value in result.iter_mut() {
                *value *= scale;
            }
        }
    }

    let (s, c) = x.sin_cos();
    let j0 = s / x;
    let j1 = s / (x * x) - c / x;
    let scale = if j0.abs() >= j1.abs() {
        j0 / result[0]
    } else {
        j1 / result[1]
    };
    for value in result.iter_mut() {
        *value *= scale;
    }
    result.truncate(order);
    result
}

/// Compute spherical Bessel functions y_n(x) for n = 0, 1, ..., order-1
///
/// Upward recurrence, stable for y_n:
/// ```text
/// y_{n+1}(x) = (2n+1)/x y_n(x) - y_{n-1}(x)
/// y_0(x) = -cos(x)/x,  y_1(x) = -cos(x)/x² - sin(x)/x
/// ```
pub fn spherical_bessel_y(order: usize, x: f64) -> Vec<f64> {
    let order = order.max(1);
    let mut result = vec![f64::NEG_INFINITY; order];
    if x.abs() < 1e-15 {
        return result;
    }

    result[0] = -x.cos() / x;
    if order > 1 {
        result[1] = -x.cos() / (x * x) - x.sin() / x;
    }
    for n in 2..order {
        result[n] = (2 * n - 1) as f64 / x * result[n - 1] - result[n - 2];
    }
    result
}

/// Derivatives j_n'(x) for n = 0..order-1
///
/// ```text
/// j_0' = -j_1,   j_n' = j_{n-1} - (n+1)/x j_n
/// ```
pub fn spherical_bessel_j_derivative(order: usize, x: f64) -> Vec<f64> {
    let j = spherical_bessel_j(order + 1, x);
    derivative_from_values(&j, order, x)
}

/// Derivatives y_n'(x) for n = 0..order-1
pub fn spherical_bessel_y_derivative(order: usize, x: f64) -> Vec<f64> {
    let y = spherical_bessel_y(order + 1, x);
    derivative_from_values(&y, order, x)
}

fn derivative_from_values(values: &[f64], order: usize, x: f64) -> Vec<f64> {
    (0..order)
        .map(|n| {
            if n == 0 {
                -values[1]
            } else {
                values[n - 1] - (n + 1) as f64 / x * values[n]
            }
        })
        .collect()
}

/// Spherical Hankel functions of the first kind h_n^(1)(x), n = 0..order-1
pub fn spherical_hankel_first_kind(order: usize, x: f64) -> Vec<Complex64> {
    spherical_bessel_j(order, x)
        .into_iter()
        .zip(spherical_bessel_y(order, x))
        .map(|(j, y)| Complex64::new(j, y))
        .collect()
}

/// Derivatives of h_n^(1)(x), n = 0..order-1
pub fn spherical_hankel_first_kind_derivative(order: usize, x: f64) -> Vec<Complex64> {
    spherical_bessel_j_derivative(order, x)
        .into_iter()
        .zip(spherical_bessel_y_derivative(order, x))
        .map(|(j, y)| Complex64::new(j, y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_low_orders_closed_form() {
        let x = 2.3;
        let j = spherical_bessel_j(3, x);
        let (s, c) = (x.sin(), x.cos());
        assert_relative_eq!(j[0], s / x, epsilon = 1e-12);
        assert_relative_eq!(j[1], s / (x * x) - c / x, epsilon = 1e-12);
        assert_relative_eq!(
            j[2],
            (3.0 / (x * x) - 1.0) * s / x - 3.0 * c / (x * x),
            epsilon = 1e-12
        );

        let y = spherical_bessel_y(2, x);
        assert_relative_eq!(y[0], -c / x, epsilon = 1e-12);
        assert_relative_eq!(y[1], -c / (x * x) - s / x, epsilon = 1e-12);
    }

    #[test]
    fn test_wronskian() {
        // j_n y_n' - j_n' y_n = 1/x²
        for &x in &[0.5, 3.0, 12.5] {
            let order = 20;
            let j = spherical_bessel_j(order, x);
            let y = spherical_bessel_y(order, x);
            let jp = spherical_bessel_j_derivative(order, x);
            let yp = spherical_bessel_y_derivative(order, x);
            for n in 0..order.min(12) {
                let w = j[n] * yp[n] - jp[n] * y[n];
                assert_relative_eq!(w, 1.0 / (x * x), max_relative = 1e-8);
            }
        }
    }

    #[test]
    fn test_values_at_zeros_of_j0() {
        // j_0(mπ) = 0, j_1(mπ) = (-1)^{m+1} / (mπ)
        for m in [1, 4] {
            let x = m as f64 * std::f64::consts::PI;
            let j = spherical_bessel_j(6, x);
            let sign = if m % 2 == 1 { 1.0 } else { -1.0 };
            assert!(j[0].abs() < 1e-12);
            assert_relative_eq!(j[1], sign / x, max_relative = 1e-10);
            // j_2 = 3/x j_1 - j_0
            assert_relative_eq!(j[2], 3.0 / x * j[1], max_relative = 1e-10);

            let y = spherical_bessel_y(6, x);
            let jp = spherical_bessel_j_derivative(6, x);
            let yp = spherical_bessel_y_derivative(6, x);
            for n in 0..6 {
                let w = j[n] * yp[n] - jp[n] * y[n];
                assert_relative_eq!(w, 1.0 / (x * x), max_relative = 1e-8);
            }
        }
    }

    #[test]
    fn test_single_order_at_zero_of_j0() {
        let j = spherical_bessel_j(1, std::f64::consts::PI);
        assert_eq!(j.len(), 1);
        assert!(j[0].abs() < 1e-12);
    }

    #[test]
    fn test_small_argument_high_order_does_not_overflow() {
        let j = spherical_bessel_j(40, 0.01);
        assert!(j.iter().all(|v| v.is_finite()));
        assert_relative_eq!(j[0], 0.01f64.sin() / 0.01, epsilon = 1e-14);
        assert!(j[39].abs() < 1e-100);
    }
}
