//! Lasso regression via cyclic coordinate descent.
//!
//! Objective (scikit-learn convention, intercept unpenalized):
//!
//! ```text
//! minimize (1 / 2n) ||y - b0 - X b||² + alpha ||b||₁
//! ```
//!
//! We work on the centered Gram matrix so each sweep costs `O(p²)` regardless
//! of how many county-days are in the design.

use crate::domain::ModelKind;
use crate::error::AppError;
use crate::math::centered_cross_products;
use crate::models::design::Design;
use crate::models::model::FittedModel;

/// Fit lasso; returns the model and logs a warning if it did not converge.
pub fn fit_lasso(design: &Design, alpha: f64, max_iter: usize, tol: f64) -> Result<FittedModel, AppError> {
    if !(alpha.is_finite() && alpha >= 0.0) {
        return Err(AppError::usage(format!("Lasso alpha must be finite and >= 0 (got {alpha}).")));
    }
    if max_iter == 0 {
        return Err(AppError::usage("Lasso max_iter must be >= 1."));
    }
    let n = design.n_obs();
    if n == 0 {
        return Err(AppError::data("No observations to fit."));
    }

    let (gram, xty, x_mean, y_mean) = centered_cross_products(&design.x, &design.y);
    let p = gram.nrows();
    let threshold = alpha * n as f64;
    let mut beta = vec![0.0; p];
    let mut iterations = 0;
    let mut converged = p == 0;

    while !converged && iterations < max_iter {
        iterations += 1;
        let mut max_delta = 0.0_f64;
        let mut max_beta = 0.0_f64;

        for j in 0..p {
            let g_jj = gram[(j, j)];
            let old = beta[j];
            if g_jj <= 0.0 {
                beta[j] = 0.0;
                continue;
            }
            let mut rho = xty[j];
            for k in 0..p {
                if k != j {
                    rho -= gram[(j, k)] * beta[k];
                }
            }
            let new = soft_threshold(rho, threshold) / g_jj;
            beta[j] = new;
            max_delta = max_delta.max((new - old).abs());
            max_beta = max_beta.max(new.abs());
        }

        if max_delta <= tol * max_beta.max(1.0) {
            converged = true;
        }
    }

    if !converged {
        log::warn!("Lasso (alpha={alpha}) did not converge within {max_iter} iterations.");
    }
    if beta.iter().any(|v| !v.is_finite()) {
        return Err(AppError::runtime("Lasso produced non-finite coefficients."));
    }

    let intercept = y_mean - x_mean.iter().zip(beta.iter()).map(|(m, b)| m * b).sum::<f64>();
    Ok(FittedModel {
        kind: ModelKind::Lasso,
        names: design.names.clone(),
        intercept,
        coefficients: beta,
        alpha: Some(alpha),
        iterations: Some(iterations),
        summary: None,
    })
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::linear::fit_ols;

    fn design() -> Design {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..400 {
            let a = if i % 4 == 1 { 1.0 } else { 0.0 };
            let b = if i % 4 == 2 { 1.0 } else { 0.0 };
            let jitter = if (i / 4) % 2 == 0 { 0.1 } else { -0.1 };
            rows.push(vec![a, b]);
            y.push(2.0 + 4.0 * a + 0.05 * b + jitter);
        }
        Design::from_rows(vec!["a".into(), "b".into()], &rows, y).unwrap()
    }

    #[test]
    fn zero_alpha_matches_ols() {
        let d = design();
        let ols = fit_ols(&d).unwrap();
        let lasso = fit_lasso(&d, 0.0, 10_000, 1e-12).unwrap();
        for (a, b) in lasso.coefficients.iter().zip(ols.coefficients.iter()) {
            assert!((a - b).abs() < 1e-6, "lasso {a} vs ols {b}");
        }
        assert!((lasso.intercept - ols.intercept).abs() < 1e-6);
    }

    #[test]
    fn penalty_zeroes_weak_effect_and_keeps_strong_one() {
        let lasso = fit_lasso(&design(), 0.05, 1000, 1e-9).unwrap();
        assert_eq!(lasso.coefficients[1], 0.0, "weak effect should be shrunk to zero");
        assert!(lasso.coefficients[0] > 3.0, "strong effect should survive: {}", lasso.coefficients[0]);
        assert!(lasso.iterations.unwrap() >= 1);
    }

    #[test]
    fn huge_penalty_gives_intercept_only() {
        let d = design();
        let lasso = fit_lasso(&d, 1e6, 100, 1e-9).unwrap();
        assert!(lasso.coefficients.iter().all(|&c| c == 0.0));
        assert!((lasso.intercept - d.y.mean()).abs() < 1e-12);
    }

    #[test]
    fn soft_threshold_shrinks_toward_zero() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
    }
}
