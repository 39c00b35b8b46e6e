//! Ordinary least squares (with full inference) and ridge regression.

use nalgebra::{DMatrix, DVector};

use crate::domain::{CoefficientStats, ModelKind, OlsSummary};
use crate::error::AppError;
use crate::math::{
    centered_cross_products, f_survival, pseudo_inverse, solve_least_squares, student_t_quantile,
    student_t_two_sided_p, with_intercept,
};
use crate::models::design::Design;
use crate::models::model::FittedModel;

/// Name used for the intercept row of the coefficient table.
pub const INTERCEPT_NAME: &str = "const";

/// Fit OLS with an intercept and compute the full summary.
pub fn fit_ols(design: &Design) -> Result<FittedModel, AppError> {
    let n = design.n_obs();
    let k = design.n_features() + 1;
    if n <= k {
        return Err(AppError::runtime(format!(
            "Underdetermined OLS: n={n} observations for k={k} parameters."
        )));
    }

    let x1 = with_intercept(&design.x);
    let beta = solve_least_squares(&x1, &design.y)
        .ok_or_else(|| AppError::runtime("OLS solve failed (design is too ill-conditioned)."))?;

    let fitted = &x1 * &beta;
    let resid = &design.y - &fitted;
    let sse = resid.norm_squared();
    let y_mean = design.y.mean();
    let tss: f64 = design.y.iter().map(|v| (v - y_mean).powi(2)).sum();

    let xtx_inv = pseudo_inverse(&x1.tr_mul(&x1))
        .ok_or_else(|| AppError::runtime("Failed to invert XᵀX for standard errors."))?;

    let summary = ols_summary(design, &beta, &xtx_inv, sse, tss);

    Ok(FittedModel {
        kind: ModelKind::Ols,
        names: design.names.clone(),
        intercept: beta[0],
        coefficients: beta.iter().skip(1).copied().collect(),
        alpha: None,
        iterations: None,
        summary: Some(summary),
    })
}

fn ols_summary(design: &Design, beta: &DVector<f64>, xtx_inv: &DMatrix<f64>, sse: f64, tss: f64) -> OlsSummary {
    let n = design.n_obs();
    let k = beta.len();
    let df_resid = n - k;
    let df_model = k - 1;
    let nf = n as f64;
    let dfr = df_resid as f64;

    let sigma2 = sse / dfr;
    let t_crit = student_t_quantile(0.975, dfr);

    let names = std::iter::once(INTERCEPT_NAME.to_string()).chain(design.names.iter().cloned());
    let coefficients = names
        .enumerate()
        .map(|(j, name)| {
            let coef = beta[j];
            let std_err = (sigma2 * xtx_inv[(j, j)]).max(0.0).sqrt();
            let t_value = coef / std_err;
            CoefficientStats {
                name,
                coef,
                std_err,
                t_value,
                p_value: student_t_two_sided_p(t_value, dfr),
                ci_low: coef - t_crit * std_err,
                ci_high: coef + t_crit * std_err,
            }
        })
        .collect();

    let r2 = if tss > 0.0 { 1.0 - sse / tss } else { f64::NAN };
    let adj_r2 = 1.0 - (1.0 - r2) * (nf - 1.0) / dfr;
    let (f_stat, f_pvalue) = if df_model > 0 && sse > 0.0 {
        let f = ((tss - sse) / df_model as f64) / sigma2;
        (f, f_survival(f, df_model as f64, dfr))
    } else {
        (f64::NAN, f64::NAN)
    };

    // Gaussian log-likelihood at the MLE of the error variance.
    let log_likelihood = -0.5 * nf * ((2.0 * std::f64::consts::PI).ln() + (sse / nf).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * k as f64;
    let bic = -2.0 * log_likelihood + k as f64 * nf.ln();

    OlsSummary {
        n_obs: n,
        df_model,
        df_resid,
        r2,
        adj_r2,
        f_stat,
        f_pvalue,
        log_likelihood,
        aic,
        bic,
        coefficients,
    }
}

/// Ridge regression with an unpenalized intercept.
///
/// Minimizes `||y - b0 - Xb||² + alpha ||b||²` by solving the centered normal
/// equations `(XcᵀXc + alpha I) b = Xcᵀyc`.
pub fn fit_ridge(design: &Design, alpha: f64) -> Result<FittedModel, AppError> {
    if !(alpha.is_finite() && alpha >= 0.0) {
        return Err(AppError::usage(format!("Ridge alpha must be finite and >= 0 (got {alpha}).")));
    }
    if design.n_obs() == 0 {
        return Err(AppError::data("No observations to fit."));
    }
    let (intercept, coefficients) = ridge_coefficients(&design.x, &design.y, alpha)?;
    Ok(FittedModel {
        kind: ModelKind::Ridge,
        names: design.names.clone(),
        intercept,
        coefficients,
        alpha: Some(alpha),
        iterations: None,
        summary: None,
    })
}

/// Raw ridge solve shared by `fit_ridge` and the cross-validated variant.
pub fn ridge_coefficients(x: &DMatrix<f64>, y: &DVector<f64>, alpha: f64) -> Result<(f64, Vec<f64>), AppError> {
    let (gram, xty, x_mean, y_mean) = centered_cross_products(x, y);
    let p = gram.nrows();
    let lhs = gram + DMatrix::<f64>::identity(p, p) * alpha;

    let beta = match lhs.clone().cholesky() {
        Some(chol) => chol.solve(&xty),
        None => {
            let inv = pseudo_inverse(&lhs).ok_or_else(|| AppError::runtime("Ridge system is singular."))?;
            inv * &xty
        }
    };
    if beta.iter().any(|v| !v.is_finite()) {
        return Err(AppError::runtime("Ridge solve produced non-finite coefficients."));
    }

    let intercept = y_mean - x_mean.dot(&beta);
    Ok((intercept, beta.iter().copied().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = 10 + 5*a - 3*b + noise-free jitter around a known truth.
    fn planted(n: usize) -> Design {
        let mut rows = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let a = if i % 3 == 1 { 1.0 } else { 0.0 };
            let b = if i % 3 == 2 { 1.0 } else { 0.0 };
            // Deterministic, zero-mean-per-group jitter.
            let jitter = if i % 2 == 0 { 0.5 } else { -0.5 };
            rows.push(vec![a, b]);
            y.push(10.0 + 5.0 * a - 3.0 * b + jitter);
        }
        Design::from_rows(vec!["a".into(), "b".into()], &rows, y).unwrap()
    }

    #[test]
    fn ols_recovers_planted_effects_with_inference() {
        let design = planted(600);
        let fit = fit_ols(&design).unwrap();
        assert!((fit.intercept - 10.0).abs() < 0.05, "intercept {}", fit.intercept);
        assert!((fit.coefficients[0] - 5.0).abs() < 0.05);
        assert!((fit.coefficients[1] + 3.0).abs() < 0.05);

        let s = fit.summary.unwrap();
        assert_eq!(s.n_obs, 600);
        assert_eq!(s.df_model, 2);
        assert_eq!(s.df_resid, 597);
        assert_eq!(s.coefficients[0].name, INTERCEPT_NAME);
        assert!(s.r2 > 0.9);
        assert!(s.f_pvalue < 1e-6);
        for c in &s.coefficients {
            assert!(c.p_value < 1e-6, "{} should be significant", c.name);
            assert!(c.ci_low < c.coef && c.coef < c.ci_high);
        }
        assert_eq!(s.significant(0.05), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn ols_matches_closed_form_simple_regression() {
        // y = 1 + 2x exactly on 4 points plus one perturbation.
        let design = Design::from_rows(
            vec!["x".into()],
            &[vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            vec![1.0, 3.0, 5.0, 8.0],
        )
        .unwrap();
        let fit = fit_ols(&design).unwrap();
        // Closed form: slope = Sxy/Sxx = 11.5/5 = 2.3, intercept = 4.25 - 2.3*1.5 = 0.8
        assert!((fit.coefficients[0] - 2.3).abs() < 1e-10);
        assert!((fit.intercept - 0.8).abs() < 1e-10);
    }

    #[test]
    fn ols_rejects_underdetermined() {
        let design = Design::from_rows(vec!["x".into()], &[vec![0.0], vec![1.0]], vec![1.0, 2.0]).unwrap();
        assert!(fit_ols(&design).is_err());
    }

    #[test]
    fn ridge_zero_alpha_matches_ols_and_shrinks_with_alpha() {
        let design = planted(300);
        let ols = fit_ols(&design).unwrap();
        let r0 = fit_ridge(&design, 0.0).unwrap();
        for (a, b) in r0.coefficients.iter().zip(ols.coefficients.iter()) {
            assert!((a - b).abs() < 1e-8);
        }
        assert!((r0.intercept - ols.intercept).abs() < 1e-8);

        let r_big = fit_ridge(&design, 1e4).unwrap();
        let norm_small: f64 = r0.coefficients.iter().map(|c| c * c).sum();
        let norm_big: f64 = r_big.coefficients.iter().map(|c| c * c).sum();
        assert!(norm_big < norm_small);
        assert_eq!(r_big.alpha, Some(1e4));
    }

    #[test]
    fn ridge_rejects_negative_alpha() {
        assert!(fit_ridge(&planted(30), -1.0).is_err());
    }
}
