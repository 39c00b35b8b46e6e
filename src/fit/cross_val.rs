//! Seeded row splits and cross-validated ridge.
//!
//! For each candidate alpha we run k-fold cross-validation and record the mean
//! validation MSE. Candidates are independent, so they are evaluated in
//! parallel; selection is deterministic (lowest MSE, ties broken by grid index).

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::domain::ModelKind;
use crate::error::AppError;
use crate::fit::alpha_grid::log_space;
use crate::models::design::Design;
use crate::models::linear::ridge_coefficients;
use crate::models::model::FittedModel;

/// Row indices `0..n` in a seeded random order.
pub fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    idx.shuffle(&mut rng);
    idx
}

/// Split rows into `(train, eval)` holding out `fraction` of them.
///
/// `fraction == 0` means in-sample evaluation: both sides are every row.
pub fn holdout_split(n: usize, fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>), AppError> {
    if !(0.0..1.0).contains(&fraction) {
        return Err(AppError::usage(format!("Holdout fraction must be in [0, 1) (got {fraction}).")));
    }
    if fraction == 0.0 {
        let all: Vec<usize> = (0..n).collect();
        return Ok((all.clone(), all));
    }
    let idx = shuffled_indices(n, seed);
    let n_eval = ((n as f64) * fraction).round() as usize;
    if n_eval == 0 || n_eval >= n {
        return Err(AppError::data(format!(
            "Holdout fraction {fraction} leaves no rows on one side of the split (n={n})."
        )));
    }
    let mut eval = idx[..n_eval].to_vec();
    let mut train = idx[n_eval..].to_vec();
    // Keep original row order inside each side for readable diagnostics.
    eval.sort_unstable();
    train.sort_unstable();
    Ok((train, eval))
}

/// Assign shuffled rows to `k` folds of near-equal size.
pub fn k_folds(n: usize, k: usize, seed: u64) -> Result<Vec<Vec<usize>>, AppError> {
    if k < 2 {
        return Err(AppError::usage("Cross-validation needs at least 2 folds."));
    }
    if n < k {
        return Err(AppError::data(format!("Cannot split n={n} rows into {k} folds.")));
    }
    let idx = shuffled_indices(n, seed);
    let mut folds = vec![Vec::with_capacity(n / k + 1); k];
    for (pos, row) in idx.into_iter().enumerate() {
        folds[pos % k].push(row);
    }
    Ok(folds)
}

#[derive(Debug, Clone)]
struct Candidate {
    idx: usize,
    alpha: f64,
    mse: f64,
}

/// Ridge with alpha chosen by k-fold cross-validation, refit on all rows.
pub fn fit_ridge_cv(
    design: &Design,
    alpha_min: f64,
    alpha_max: f64,
    alpha_steps: usize,
    folds: usize,
    seed: u64,
) -> Result<FittedModel, AppError> {
    let grid = log_space(alpha_min, alpha_max, alpha_steps)?;
    let fold_rows = k_folds(design.n_obs(), folds, seed)?;

    // Materialize each fold's train/validation designs once; every alpha reuses them.
    let splits: Vec<(Design, Design)> = (0..fold_rows.len())
        .map(|f| {
            let train: Vec<usize> = fold_rows
                .iter()
                .enumerate()
                .filter(|(g, _)| *g != f)
                .flat_map(|(_, rows)| rows.iter().copied())
                .collect();
            (design.select_rows(&train), design.select_rows(&fold_rows[f]))
        })
        .collect();

    let candidates: Vec<Candidate> = grid
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &alpha)| {
            let mut total = 0.0;
            for (train, valid) in &splits {
                let (b0, beta) = ridge_coefficients(&train.x, &train.y, alpha).ok()?;
                let fitted = FittedModel {
                    kind: ModelKind::Ridge,
                    names: train.names.clone(),
                    intercept: b0,
                    coefficients: beta,
                    alpha: Some(alpha),
                    iterations: None,
                    summary: None,
                };
                let pred = fitted.predict(&valid.x);
                total += (&valid.y - pred).norm_squared() / valid.n_obs() as f64;
            }
            let mse = total / splits.len() as f64;
            mse.is_finite().then_some(Candidate { idx, alpha, mse })
        })
        .collect();

    if candidates.is_empty() {
        return Err(AppError::runtime("No valid ridge CV candidates."));
    }

    // Deterministic selection: pick the minimum MSE; break ties by original grid index.
    let mut best = &candidates[0];
    for c in &candidates[1..] {
        if c.mse < best.mse || (c.mse == best.mse && c.idx < best.idx) {
            best = c;
        }
    }
    log::debug!("ridge_cv selected alpha={:.4e} (cv mse={:.6})", best.alpha, best.mse);

    let (intercept, coefficients) = ridge_coefficients(&design.x, &design.y, best.alpha)?;
    Ok(FittedModel {
        kind: ModelKind::RidgeCv,
        names: design.names.clone(),
        intercept,
        coefficients,
        alpha: Some(best.alpha),
        iterations: None,
        summary: None,
    })
}
