//! Legendre polynomials for axisymmetric series expansions

/// `[P_0(x), …, P_{count-1}(x)]` (at least one value)
///
/// Bonnet recursion, `n P_n = (2n−1) x P_{n−1} − (n−1) P_{n−2}`.
///
/// ```
/// use math_audio_wave::special::legendre_polynomials;
/// let p = legendre_polynomials(3, 0.5);
/// assert!((p[2] + 0.125).abs() < 1e-12);
/// ```
pub fn legendre_polynomials(count: usize, x: f64) -> Vec<f64> {
    let mut values = Vec::with_capacity(count.max(1));
    let (mut previous, mut current) = (0.0, 1.0);
    for n in 0..count.max(1) {
        values.push(current);
        let k = (n + 1) as f64;
        let next = ((2.0 * k - 1.0) * x * current - (k - 1.0) * previous) / k;
        previous = current;
        current = next;
    }
    values
}
