//! Estimator dispatch.
//!
//! The batch code only deals in `ModelSpec` (a dictionary entry) and
//! `FittedModel` (what came out). This module maps one to the other and
//! provides prediction for metric evaluation.

use nalgebra::{DMatrix, DVector};

use crate::domain::{ModelKind, ModelSpec, OlsSummary};
use crate::error::AppError;
use crate::fit::cross_val::fit_ridge_cv;
use crate::models::design::Design;
use crate::models::lasso::fit_lasso;
use crate::models::linear::{fit_ols, fit_ridge};

/// Options that are not part of a model's identity but affect fitting.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Seed for cross-validation fold assignment.
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

/// A fitted linear model over named design columns.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub kind: ModelKind,
    pub names: Vec<String>,
    pub intercept: f64,
    /// Aligned with `names`.
    pub coefficients: Vec<f64>,
    /// Penalty strength actually used (chosen by CV for `ridge_cv`).
    pub alpha: Option<f64>,
    /// Coordinate descent sweeps (lasso only).
    pub iterations: Option<usize>,
    /// Inference statistics (OLS only).
    pub summary: Option<OlsSummary>,
}

impl FittedModel {
    /// Predict for every row of `x` (columns must match `names`).
    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        let beta = DVector::from_column_slice(&self.coefficients);
        (x * beta).add_scalar(self.intercept)
    }
}

/// Fit the model described by `spec` on `design`.
pub fn fit_model(spec: &ModelSpec, design: &Design, opts: &FitOptions) -> Result<FittedModel, AppError> {
    if design.n_obs() == 0 {
        return Err(AppError::data("No observations to fit."));
    }
    match spec {
        ModelSpec::Ols => fit_ols(design),
        ModelSpec::Ridge { alpha } => fit_ridge(design, *alpha),
        ModelSpec::Lasso { alpha, max_iter, tol } => fit_lasso(design, *alpha, *max_iter, *tol),
        ModelSpec::RidgeCv {
            alpha_min,
            alpha_max,
            alpha_steps,
            folds,
        } => fit_ridge_cv(design, *alpha_min, *alpha_max, *alpha_steps, *folds, opts.seed),
    }
}
