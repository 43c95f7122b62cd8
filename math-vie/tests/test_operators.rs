//! FFT-accelerated operators against direct evaluation
//!
//! - circulant products equal the brute-force Toeplitz sums
//! - every operator is linear
//! - the gradient kernel is the derivative of the scalar kernel
//! - the flux operator with unit weight reproduces `∫ G Δf`
//! - an empty scatterer leaves the operators as the identity

use math_audio_vie::circulant::{CirculantEmbedding, GradientEmbedding};
use math_audio_vie::kernel::{ToeplitzKernel, assemble_gradient, assemble_potential};
use math_audio_vie::{
    ContrastFields, ContrastOperator, DensityCoupledOperator, GradientOperator,
    InclusionMask, ScalarMaskedOperator, VolumeOperator, VoxelGrid,
};
use ndarray::{Array1, Array3};
use num_complex::Complex64;
use rand::Rng;
use std::sync::Arc;

fn random_field(shape: (usize, usize, usize)) -> Array3<Complex64> {
    let mut rng = rand::rng();
    Array3::from_shape_fn(shape, |_| {
        Complex64::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5)
    })
}

fn max_norm(field: &Array3<Complex64>) -> f64 {
    field.iter().map(|v| v.norm()).fold(0.0, f64::max)
}

fn max_difference(a: &Array3<Complex64>, b: &Array3<Complex64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).norm())
        .fold(0.0, f64::max)
}

/// `y_i = Σ_j K(i - j) x_j` by explicit summation
fn brute_force(kernel: &ToeplitzKernel, x: &Array3<Complex64>) -> Array3<Complex64> {
    let (l, m, n) = x.dim();
    Array3::from_shape_fn((l, m, n), |(i, j, k)| {
        let mut sum = Complex64::new(0.0, 0.0);
        for ((a, b, c), value) in x.indexed_iter() {
            let lag = kernel.lag(
                i as isize - a as isize,
                j as isize - b as isize,
                k as isize - c as isize,
            );
            sum += lag * value;
        }
        sum
    })
}

#[test]
fn test_embedding_matches_brute_force() {
    let grid = VoxelGrid::new((4, 4, 4), 2e-4, [0.0; 3]).unwrap();
    let k = Complex64::new(4188.8, 12.0);
    let x = random_field(grid.shape());

    println!("\n=== Circulant embedding vs direct Toeplitz product (4x4x4) ===");

    let potential = assemble_potential(k, &grid).unwrap();
    let fast = CirculantEmbedding::new(&potential).convolve(&x).unwrap();
    let direct = brute_force(&potential, &x);
    let error = max_difference(&fast, &direct) / max_norm(&direct);
    println!("Scalar kernel: relative max error {error:.3e}");
    assert!(error < 1e-10);

    let gradient = assemble_gradient(k, &grid).unwrap();
    let embedding = GradientEmbedding::new(&gradient);
    for axis in 0..3 {
        let fast = embedding.convolve(axis, &x).unwrap();
        let direct = brute_force(&gradient.component(axis), &x);
        let error = max_difference(&fast, &direct) / max_norm(&direct);
        println!("Gradient component {axis}: relative max error {error:.3e}");
        assert!(error < 1e-10);
    }
}

#[test]
fn test_embedding_on_elongated_grid() {
    let grid = VoxelGrid::new((5, 2, 3), 1e-3, [0.0; 3]).unwrap();
    let potential = assemble_potential(Complex64::new(900.0, 0.0), &grid).unwrap();
    let x = random_field(grid.shape());
    let fast = CirculantEmbedding::new(&potential).convolve(&x).unwrap();
    let direct = brute_force(&potential, &x);
    assert!(max_difference(&fast, &direct) / max_norm(&direct) < 1e-10);
}

struct Fixture {
    grid: VoxelGrid,
    potential: Arc<CirculantEmbedding>,
    gradient: Arc<GradientEmbedding>,
    contrast: ContrastFields,
}

fn fixture() -> Fixture {
    let grid = VoxelGrid::from_extent([3e-3; 3], 2.5e-4, [0.0; 3]).unwrap();
    let k0 = Complex64::new(4188.8, 0.0);
    let mask = InclusionMask::from_predicate(&grid, |p| {
        p[0] * p[0] + p[1] * p[1] + p[2] * p[2] <= 1e-3 * 1e-3
    });
    let contrast =
        ContrastFields::homogeneous(&grid, mask, Complex64::new(1.2, 0.01), 1.5, 1.0).unwrap();
    let potential = assemble_potential(k0, &grid).unwrap().scaled(k0 * k0);
    let potential = Arc::new(CirculantEmbedding::new(&potential));
    let gradient = assemble_gradient(k0, &grid).unwrap();
    let gradient = Arc::new(GradientEmbedding::with_plan(&gradient, potential.fft().clone()));
    Fixture {
        grid,
        potential,
        gradient,
        contrast,
    }
}

fn check_linear(name: &str, operator: &dyn VolumeOperator) {
    let shape = operator.grid().shape();
    let x = random_field(shape);
    let y = random_field(shape);
    let alpha = Complex64::new(0.7, -1.3);
    let beta = Complex64::new(-2.1, 0.4);

    let combined = x.mapv(|v| v * alpha) + y.mapv(|v| v * beta);
    let lhs = operator.apply_field(&combined).unwrap();
    let ax = operator.apply_field(&x).unwrap();
    let ay = operator.apply_field(&y).unwrap();
    let rhs = ax.mapv(|v| v * alpha) + ay.mapv(|v| v * beta);

    let error = max_difference(&lhs, &rhs) / max_norm(&rhs).max(1e-300);
    println!("{name:>16}: linearity error {error:.3e}");
    assert!(error < 1e-10, "{name} is not linear: {error}");
}

#[test]
fn test_all_operators_are_linear() {
    let f = fixture();
    println!("\n=== Operator linearity on {:?} ===", f.grid.shape());

    let scalar = ScalarMaskedOperator::new(f.grid, f.potential.clone(), &f.contrast).unwrap();
    let coupled =
        DensityCoupledOperator::new(f.grid, f.potential.clone(), f.gradient.clone(), &f.contrast)
            .unwrap();
    let (full, correction) = coupled.reconstruction();
    let contrast_op =
        ContrastOperator::new(f.grid, f.potential.clone(), f.contrast.index_contrast().clone())
            .unwrap();

    check_linear("scalar masked", &scalar);
    check_linear("density coupled", &coupled);
    check_linear("full domain", &full);
    check_linear("gradient", &correction);
    check_linear("contrast", &contrast_op);
}

#[test]
fn test_matvec_agrees_with_field_application() {
    let f = fixture();
    let operator = ScalarMaskedOperator::new(f.grid, f.potential.clone(), &f.contrast).unwrap();
    let x = random_field(f.grid.shape());
    let flat = f.grid.flatten(&x).unwrap();

    let from_vector = operator.matvec(&flat).unwrap();
    let from_field = f.grid.flatten(&operator.apply_field(&x).unwrap()).unwrap();
    let error = (&from_vector - &from_field)
        .iter()
        .map(|v| v.norm())
        .fold(0.0, f64::max);
    assert!(error < 1e-14);

    let wrong = Array1::<Complex64>::zeros(f.grid.num_voxels() + 1);
    assert!(operator.matvec(&wrong).is_err());
}

#[test]
fn test_empty_scatterer_gives_identity() {
    let f = fixture();
    let none = ContrastFields::none(&f.grid, 1.0);
    let x = random_field(f.grid.shape());

    let scalar = ScalarMaskedOperator::new(f.grid, f.potential.clone(), &none).unwrap();
    assert!(max_difference(&scalar.apply_field(&x).unwrap(), &x) < 1e-15);

    let coupled =
        DensityCoupledOperator::new(f.grid, f.potential.clone(), f.gradient.clone(), &none)
            .unwrap();
    assert!(max_difference(&coupled.apply_field(&x).unwrap(), &x) < 1e-15);

    let (full, correction) = coupled.reconstruction();
    assert_eq!(max_norm(&full.apply_field(&x).unwrap()), 0.0);
    assert_eq!(max_norm(&correction.apply_field(&x).unwrap()), 0.0);
}

/// Gaussian bump of width 0.12 centred at (0.15, 0, 0)
fn gaussian(grid: &VoxelGrid) -> Array3<Complex64> {
    let sigma = 0.12;
    Array3::from_shape_fn(grid.shape(), |(i, j, k)| {
        let p = grid.position(i, j, k);
        let r2 = (p[0] - 0.15).powi(2) + p[1] * p[1] + p[2] * p[2];
        Complex64::new((-r2 / (2.0 * sigma * sigma)).exp(), 0.0)
    })
}

/// Relative error between D_x(f) and the central difference of S(f) at the
/// grid centre, for a smooth Gaussian source on a unit box
fn gradient_consistency_error(n: usize) -> f64 {
    let dx = 1.0 / n as f64;
    let grid = VoxelGrid::from_extent([1.0; 3], dx, [0.0; 3]).unwrap();
    let k = Complex64::new(2.0, 0.0);
    let source = gaussian(&grid);

    let potential = Arc::new(CirculantEmbedding::new(&assemble_potential(k, &grid).unwrap()));
    let gradient = GradientEmbedding::new(&assemble_gradient(k, &grid).unwrap());

    let scalar = ContrastOperator::unit(grid, potential).unwrap();
    let s = scalar.apply_field(&source).unwrap();
    let d = gradient.convolve(0, &source).unwrap();

    let (i, j, k) = grid.centre_index();
    let difference = (s[(i + 1, j, k)] - s[(i - 1, j, k)]) / (2.0 * dx);
    let error = (difference - d[(i, j, k)]).norm() / d[(i, j, k)].norm();
    println!(
        "dx = {dx:.4}: FD = {difference:.6e}, gradient = {:.6e}, error {:.3e}",
        d[(i, j, k)],
        error
    );
    error
}

#[test]
fn test_gradient_kernel_differentiates_potential() {
    println!("\n=== Gradient kernel vs finite difference of potential ===");
    let coarse = gradient_consistency_error(11);
    let fine = gradient_consistency_error(21);
    assert!(fine < coarse, "error should shrink with dx: {coarse} -> {fine}");
    assert!(fine < 0.1, "fine-grid error {fine}");
}

/// Relative error of `Σ_j D_j(∂_j f) = -f - k²∫G f` at two voxels near the
/// centre of the Gaussian
fn flux_identity_error(n: usize) -> f64 {
    let dx = 1.0 / n as f64;
    let grid = VoxelGrid::from_extent([1.0; 3], dx, [0.0; 3]).unwrap();
    let k = Complex64::new(2.0, 0.0);
    let source = gaussian(&grid);

    let potential = Arc::new(CirculantEmbedding::new(&assemble_potential(k, &grid).unwrap()));
    let gradient = Arc::new(GradientEmbedding::new(&assemble_gradient(k, &grid).unwrap()));
    let unit = Array3::from_elem(grid.shape(), Complex64::new(1.0, 0.0));
    let flux = GradientOperator::new(grid, gradient, unit).unwrap();
    let scalar = ContrastOperator::unit(grid, potential).unwrap();

    let lhs = flux.apply_field(&source).unwrap();
    let s = scalar.apply_field(&source).unwrap();

    let (i, j, k0) = grid.centre_index();
    let mut worst: f64 = 0.0;
    for idx in [(i, j, k0), (i + 2, j + 1, k0)] {
        let expected = -source[idx] - k * k * s[idx];
        let error = (lhs[idx] - expected).norm() / expected.norm();
        println!("dx = {dx:.4} at {idx:?}: flux = {:.6e}, expected = {expected:.6e}, error {error:.3e}", lhs[idx]);
        worst = worst.max(error);
    }
    worst
}

#[test]
fn test_unit_flux_reproduces_laplacian_potential() {
    println!("\n=== Flux operator with unit weight vs -f - k²∫G f ===");
    let coarse = flux_identity_error(11);
    let fine = flux_identity_error(21);
    assert!(fine < coarse, "error should shrink with dx: {coarse} -> {fine}");
    assert!(fine < 0.1, "fine-grid error {fine}");
}
