//! Least squares solvers.
//!
//! Every estimator in this crate reduces to small dense linear systems: the
//! design has one column per day bin (typically 3 to 15), while the number of
//! rows is every county-day in the dataset.
//!
//! Implementation choices:
//! - `solve_least_squares` uses SVD on the full design, robust to tall and
//!   rank-deficient matrices (nalgebra's `QR::solve` is intended for square
//!   systems and will panic for non-square matrices).
//! - `pseudo_inverse` is used on the small `p × p` Gram matrix when we need
//!   `(XᵀX)⁻¹` for standard errors or a ridge solve.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Moore-Penrose pseudo-inverse of a small symmetric matrix.
pub fn pseudo_inverse(m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let inv = m.clone().pseudo_inverse(1e-10).ok()?;
    if inv.iter().all(|v| v.is_finite()) {
        Some(inv)
    } else {
        None
    }
}

/// Prepend a column of ones to `x`.
pub fn with_intercept(x: &DMatrix<f64>) -> DMatrix<f64> {
    x.clone().insert_column(0, 1.0)
}

/// Column means of `x`.
pub fn column_means(x: &DMatrix<f64>) -> DVector<f64> {
    let n = x.nrows().max(1) as f64;
    DVector::from_iterator(x.ncols(), x.column_iter().map(|c| c.sum() / n))
}

/// Centered Gram matrix `XcᵀXc` and cross-product `Xcᵀyc`.
pub fn centered_cross_products(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
) -> (DMatrix<f64>, DVector<f64>, DVector<f64>, f64) {
    let x_mean = column_means(x);
    let y_mean = y.mean();
    let mut xc = x.clone();
    for (j, mut col) in xc.column_iter_mut().enumerate() {
        col.add_scalar_mut(-x_mean[j]);
    }
    let yc = y.add_scalar(-y_mean);
    let gram = xc.tr_mul(&xc);
    let xty = xc.tr_mul(&yc);
    (gram, xty, x_mean, y_mean)
}
