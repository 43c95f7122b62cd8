//! Restarted GMRES(m)
//!
//! Restarted GMRES after Saad & Schultz (1986), written against the
//! [`LinearOperator`] trait so that FFT-accelerated volume operators can be
//! solved without assembling a matrix.
//!
//! Every inner iteration appends the current relative residual to
//! [`GmresSolution::residual_history`]. The history is owned by the returned
//! value; callers never observe it through a captured accumulator.
//!
//! The solve is bounded by `max_iterations` restarts and, optionally, by a
//! wall-clock budget. Running out of either budget is not an error: the best
//! iterate is returned together with a [`SolverStatus`] describing why the
//! solve stopped.

use crate::blas_helpers::{axpy, inner_product, normalized, vector_norm};
use crate::traits::{ComplexField, LinearOperator};
use ndarray::{Array1, Array2};
use num_traits::{Float, FromPrimitive, One, ToPrimitive, Zero};
use std::time::{Duration, Instant};

/// Stopping rules and cycle length
#[derive(Debug, Clone)]
pub struct GmresConfig<R> {
    /// Restart cycles allowed
    pub max_iterations: usize,
    /// Krylov vectors per cycle
    pub restart: usize,
    /// Target for ‖b − Ax‖ / ‖b‖
    pub tolerance: R,
    /// Log progress every N iterations (0 = no output)
    pub print_interval: usize,
    /// Optional wall-clock budget for the whole solve
    pub time_budget: Option<Duration>,
}

impl Default for GmresConfig<f64> {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            restart: 30,
            tolerance: 1e-6,
            print_interval: 0,
            time_budget: None,
        }
    }
}

impl<R: Float + FromPrimitive> GmresConfig<R> {
    /// Set the relative tolerance
    pub fn with_tolerance(mut self, tolerance: R) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the restart length
    pub fn with_restart(mut self, restart: usize) -> Self {
        self.restart = restart.max(1);
        self
    }

    /// Set the maximum number of restarts
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Bound the solve by wall-clock time
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// Why a GMRES solve stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// Relative residual dropped below the tolerance
    Converged,
    /// All restarts were used without reaching the tolerance
    MaxIterations,
    /// The wall-clock budget ran out
    TimeBudgetExceeded,
}

/// Iterate and convergence record
#[derive(Debug)]
pub struct GmresSolution<T: ComplexField> {
    /// Solution vector (best available iterate when not converged)
    pub x: Array1<T>,
    /// Total number of inner iterations (matrix-vector products in Arnoldi)
    pub iterations: usize,
    /// Cycles completed before the one that stopped
    pub restarts: usize,
    /// Relative residual at exit
    pub residual: T::Real,
    /// Why the solve stopped
    pub status: SolverStatus,
    /// Relative residual after each inner iteration, in order
    pub residual_history: Vec<T::Real>,
}

impl<T: ComplexField> GmresSolution<T> {
    pub fn converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

/// Solve `Ax = b` from a zero initial guess
pub fn gmres<T, A>(operator: &A, b: &Array1<T>, config: &GmresConfig<T::Real>) -> GmresSolution<T>
where
    T: ComplexField,
    A: LinearOperator<T>,
{
    gmres_with_guess(operator, b, None, config)
}

/// Solve `Ax = b` starting from `x0`
pub fn gmres_with_guess<T, A>(
    operator: &A,
    b: &Array1<T>,
    x0: Option<&Array1<T>>,
    config: &GmresConfig<T::Real>,
) -> GmresSolution<T>
where
    T: ComplexField,
    A: LinearOperator<T>,
{
    let n = b.len();
    let started = Instant::now();
    let mut history: Vec<T::Real> = Vec::new();

    let b_norm = vector_norm(b);
    if b_norm < real::<T>(1e-15) {
        return GmresSolution {
            x: Array1::from_elem(n, T::zero()),
            iterations: 0,
            restarts: 0,
            residual: T::Real::zero(),
            status: SolverStatus::Converged,
            residual_history: history,
        };
    }

    let mut x = x0
        .cloned()
        .unwrap_or_else(|| Array1::from_elem(n, T::zero()));
    let mut iterations = 0;

    for restarts in 0..config.max_iterations {
        let r: Array1<T> = b - &operator.apply(&x);
        let beta = vector_norm(&r);
        if beta / b_norm < config.tolerance {
            return GmresSolution {
                x,
                iterations,
                restarts,
                residual: beta / b_norm,
                status: SolverStatus::Converged,
                residual_history: history,
            };
        }

        let mut cycle = Cycle::new(&r, beta, config.restart.max(1));
        let mut stop = None;
        while !cycle.is_full() {
            iterations += 1;
            let (estimate, breakdown) = cycle.extend(operator);
            let relative = estimate / b_norm;
            history.push(relative);

            if config.print_interval > 0 && iterations % config.print_interval == 0 {
                log::info!(
                    "GMRES iteration {} (restart {}): relative residual = {:.6e}",
                    iterations,
                    restarts,
                    relative.to_f64().unwrap_or(0.0)
                );
            }

            if relative < config.tolerance || breakdown {
                stop = Some(SolverStatus::Converged);
            } else if config
                .time_budget
                .is_some_and(|budget| started.elapsed() >= budget)
            {
                stop = Some(SolverStatus::TimeBudgetExceeded);
            }
            if stop.is_some() {
                break;
            }
        }
        cycle.update(&mut x);

        if let Some(status) = stop {
            let residual = history.last().copied().unwrap_or_else(T::Real::zero);
            if status != SolverStatus::Converged {
                log::warn!(
                    "GMRES stopped after {} iterations: {:?} (relative residual {:.3e})",
                    iterations,
                    status,
                    residual.to_f64().unwrap_or(f64::NAN)
                );
            }
            return GmresSolution {
                x,
                iterations,
                restarts,
                residual,
                status,
                residual_history: history,
            };
        }
    }

    // Restarts exhausted: report the true residual of the last iterate
    let r: Array1<T> = b - &operator.apply(&x);
    let residual = vector_norm(&r) / b_norm;
    let status = if residual < config.tolerance {
        SolverStatus::Converged
    } else {
        log::warn!(
            "GMRES exhausted {} restarts, relative residual {:.3e}",
            config.max_iterations,
            residual.to_f64().unwrap_or(f64::NAN)
        );
        SolverStatus::MaxIterations
    };

    GmresSolution {
        x,
        iterations,
        restarts: config.max_iterations,
        residual,
        status,
        residual_history: history,
    }
}

fn real<T: ComplexField>(value: f64) -> T::Real {
    T::Real::from_f64(value).unwrap_or_else(T::Real::zero)
}

/// Complex Givens rotation `[c̄ s̄; -s c]` zeroing the second entry of a pair
#[derive(Clone, Copy)]
struct Rotation<T> {
    c: T,
    s: T,
}

impl<T: ComplexField> Rotation<T> {
    /// Rotation mapping `(a, b)` onto `(r, 0)`
    fn annihilating(a: T, b: T) -> Self {
        let tol = real::<T>(1e-30);
        if b.abs() < tol {
            return Self { c: T::one(), s: T::zero() };
        }
        if a.abs() < tol {
            return Self { c: T::zero(), s: T::one() };
        }
        let scale = T::from_real(T::Real::one() / Float::sqrt(a.norm_sqr() + b.norm_sqr()));
        Self {
            c: a * scale,
            s: b * scale,
        }
    }

    fn apply(&self, a: T, b: T) -> (T, T) {
        (
            self.c.conj() * a + self.s.conj() * b,
            self.c * b - self.s * a,
        )
    }
}

/// One restart cycle: Arnoldi basis, rotated Hessenberg matrix and the
/// rotated right-hand side `g = Qᴴ β e₁`
struct Cycle<T: ComplexField> {
    basis: Vec<Array1<T>>,
    hessenberg: Array2<T>,
    rotations: Vec<Rotation<T>>,
    g: Array1<T>,
    capacity: usize,
}

impl<T: ComplexField> Cycle<T> {
    fn new(residual: &Array1<T>, beta: T::Real, capacity: usize) -> Self {
        let mut g = Array1::from_elem(capacity + 1, T::zero());
        g[0] = T::from_real(beta);
        let mut basis = Vec::with_capacity(capacity + 1);
        basis.push(normalized(residual, beta));
        Self {
            basis,
            hessenberg: Array2::from_elem((capacity + 1, capacity), T::zero()),
            rotations: Vec::with_capacity(capacity),
            g,
            capacity,
        }
    }

    fn steps(&self) -> usize {
        self.rotations.len()
    }

    fn is_full(&self) -> bool {
        self.steps() == self.capacity
    }

    /// Add one Krylov vector; returns the residual norm estimate and whether
    /// the Krylov space stopped growing
    fn extend<A: LinearOperator<T>>(&mut self, operator: &A) -> (T::Real, bool) {
        let j = self.steps();
        let mut w = operator.apply(&self.basis[j]);

        // Modified Gram-Schmidt
        for (i, v) in self.basis.iter().enumerate() {
            let h = inner_product(v, &w);
            self.hessenberg[[i, j]] = h;
            axpy(-h, v, &mut w);
        }
        let w_norm = vector_norm(&w);
        let breakdown = w_norm < real::<T>(1e-14);
        if !breakdown {
            self.basis.push(normalized(&w, w_norm));
        }

        let mut column: Vec<T> = (0..=j).map(|i| self.hessenberg[[i, j]]).collect();
        column.push(T::from_real(w_norm));
        for (i, rotation) in self.rotations.iter().enumerate() {
            let (upper, lower) = rotation.apply(column[i], column[i + 1]);
            column[i] = upper;
            column[i + 1] = lower;
        }

        let rotation = Rotation::annihilating(column[j], column[j + 1]);
        let (diagonal, _) = rotation.apply(column[j], column[j + 1]);
        column[j] = diagonal;
        column[j + 1] = T::zero();
        for (i, value) in column.into_iter().enumerate() {
            self.hessenberg[[i, j]] = value;
        }

        let (gj, gj1) = rotation.apply(self.g[j], self.g[j + 1]);
        self.g[j] = gj;
        self.g[j + 1] = gj1;
        self.rotations.push(rotation);

        (gj1.abs(), breakdown)
    }

    /// `x += V y` with `y` from back substitution on the triangular block
    fn update(&self, x: &mut Array1<T>) {
        let k = self.steps();
        let tol = real::<T>(1e-30);
        let mut y = vec![T::zero(); k];
        for i in (0..k).rev() {
            let mut sum = self.g[i];
            for (j, yj) in y.iter().enumerate().skip(i + 1) {
                sum -= self.hessenberg[[i, j]] * *yj;
            }
            let pivot = self.hessenberg[[i, i]];
            if pivot.abs() > tol {
                y[i] = sum * pivot.recip();
            }
        }
        for (yi, v) in y.iter().zip(self.basis.iter()) {
            axpy(*yi, v, x);
        }
    }
}
