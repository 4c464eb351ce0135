//! Successive over-relaxation for small dense systems.

use faer::{Col, Mat};
use thiserror::Error;

use crate::Float;

pub const MAX_ITERATIONS: usize = 100_000;

#[derive(Error, Debug, PartialEq)]
pub enum RelaxationError {
    #[error("matrix is not square ({rows}x{cols})")]
    NotSquare { rows: usize, cols: usize },
    #[error("vector of length {found}, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("zero on the diagonal at row {0}")]
    ZeroDiagonal(usize),
    #[error("no convergence after {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: Float },
}

fn residual(a: &Mat<Float>, b: &Col<Float>, x: &Col<Float>) -> Float {
    let n = a.nrows();
    (0..n)
        .map(|i| {
            let ax: Float = (0..n).map(|j| a[(i, j)] * x[j]).sum();
            (ax - b[i]) * (ax - b[i])
        })
        .sum::<Float>()
        .sqrt()
}

/// Solves `a x = b` in place, starting from the current `x`, until the
/// relative residual `‖a x - b‖ / ‖b‖` drops to `eps` (the absolute residual
/// when `b` is zero). Returns the number of sweeps.
pub fn sor(
    a: &Mat<Float>,
    b: &Col<Float>,
    x: &mut Col<Float>,
    eps: Float,
    omega: Float,
) -> Result<usize, RelaxationError> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(RelaxationError::NotSquare {
            rows: n,
            cols: a.ncols(),
        });
    }
    for found in [b.nrows(), x.nrows()] {
        if found != n {
            return Err(RelaxationError::DimensionMismatch { expected: n, found });
        }
    }
    if let Some(i) = (0..n).find(|&i| a[(i, i)] == 0.0) {
        return Err(RelaxationError::ZeroDiagonal(i));
    }

    let norm_b = (0..n).map(|i| b[i] * b[i]).sum::<Float>().sqrt();
    let scale = if norm_b > 0.0 { norm_b } else { 1.0 };

    let mut r = residual(a, b, x) / scale;
    let mut iterations = 0;
    while r > eps || r.is_nan() {
        if iterations == MAX_ITERATIONS || !r.is_finite() {
            return Err(RelaxationError::NotConverged {
                iterations,
                residual: r,
            });
        }
        for i in 0..n {
            let s: Float = (0..n).map(|j| a[(i, j)] * x[j]).sum();
            x[i] += omega * (b[i] - s) / a[(i, i)];
        }
        r = residual(a, b, x) / scale;
        iterations += 1;
    }

    tracing::trace!(iterations, residual = r, "relaxation converged");
    Ok(iterations)
}
