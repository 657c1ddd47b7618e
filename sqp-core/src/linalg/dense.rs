//! Dense Cholesky factorization for small symmetric positive definite
//! systems, used by the reference QP subsolver.

use thiserror::Error;

/// Factorization failure.
#[derive(Debug, Error)]
pub enum DenseError {
    /// A pivot was non-positive or non-finite.
    #[error("matrix is not positive definite (pivot {pivot:.3e} at row {row})")]
    NotPositiveDefinite {
        /// Offending pivot value
        pivot: f64,
        /// Row at which factorization broke down
        row: usize,
    },
}

/// Factor a row-major symmetric positive definite `a` (n x n) into a
/// lower-triangular `l` with `a = l l'`. Only the lower triangle of `a`
/// is read; `l` is fully overwritten.
pub fn cholesky_factor(a: &[f64], n: usize, l: &mut [f64]) -> Result<(), DenseError> {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(l.len(), n * n);
    l.fill(0.0);
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                if !(sum > 0.0) || !sum.is_finite() {
                    return Err(DenseError::NotPositiveDefinite { pivot: sum, row: i });
                }
                l[i * n + j] = sum.sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    Ok(())
}

/// Solve `l l' x = b` in place, with `l` from [`cholesky_factor`].
pub fn cholesky_solve(l: &[f64], n: usize, b: &mut [f64]) {
    debug_assert_eq!(l.len(), n * n);
    debug_assert_eq!(b.len(), n);
    // Forward: L y = b
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[i * n + k] * b[k];
        }
        b[i] = sum / l[i * n + i];
    }
    // Backward: L' x = y
    for i in (0..n).rev() {
        let mut sum = b[i];
        for k in i + 1..n {
            sum -= l[k * n + i] * b[k];
        }
        b[i] = sum / l[i * n + i];
    }
}
