//! Named scoring functions (the metric dictionary).
//!
//! Conventions follow scikit-learn: `r2` can be negative on held-out data,
//! and is `NaN` when the target is constant.

use std::collections::BTreeMap;

use crate::domain::MetricKind;

/// Compute one metric. `n_features` excludes the intercept (used by `adj_r2`).
pub fn compute_metric(kind: MetricKind, y_true: &[f64], y_pred: &[f64], n_features: usize) -> f64 {
    let n = y_true.len().min(y_pred.len());
    if n == 0 {
        return f64::NAN;
    }
    let nf = n as f64;
    let resid = || y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p);

    match kind {
        MetricKind::Mse => resid().map(|r| r * r).sum::<f64>() / nf,
        MetricKind::Rmse => (resid().map(|r| r * r).sum::<f64>() / nf).sqrt(),
        MetricKind::Mae => resid().map(f64::abs).sum::<f64>() / nf,
        MetricKind::MaxError => resid().map(f64::abs).fold(0.0, f64::max),
        MetricKind::R2 => r2(y_true, y_pred),
        MetricKind::AdjR2 => {
            let dof = nf - n_features as f64 - 1.0;
            if dof <= 0.0 {
                return f64::NAN;
            }
            1.0 - (1.0 - r2(y_true, y_pred)) * (nf - 1.0) / dof
        }
        MetricKind::ExplainedVariance => {
            let var_y = variance(y_true);
            if var_y == 0.0 {
                return f64::NAN;
            }
            let r: Vec<f64> = resid().collect();
            1.0 - variance(&r) / var_y
        }
    }
}

/// Evaluate every requested metric, keyed by metric name.
pub fn compute_metrics(
    kinds: &[MetricKind],
    y_true: &[f64],
    y_pred: &[f64],
    n_features: usize,
) -> BTreeMap<String, f64> {
    kinds
        .iter()
        .map(|&k| (k.name().to_string(), compute_metric(k, y_true, y_pred, n_features)))
        .collect()
}

fn r2(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let tss: f64 = y_true.iter().map(|v| (v - mean).powi(2)).sum();
    if tss == 0.0 {
        return f64::NAN;
    }
    let sse: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    1.0 - sse / tss
}

fn variance(v: &[f64]) -> f64 {
    let n = v.len() as f64;
    let mean = v.iter().sum::<f64>() / n;
    v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_metrics() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let p = [1.0, 2.0, 2.0, 6.0];
        assert!((compute_metric(MetricKind::Mse, &y, &p, 1) - 1.25).abs() < 1e-12);
        assert!((compute_metric(MetricKind::Rmse, &y, &p, 1) - 1.25f64.sqrt()).abs() < 1e-12);
        assert!((compute_metric(MetricKind::Mae, &y, &p, 1) - 0.75).abs() < 1e-12);
        assert_eq!(compute_metric(MetricKind::MaxError, &y, &p, 1), 2.0);
    }

    #[test]
    fn r2_family() {
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(compute_metric(MetricKind::R2, &y, &y, 1), 1.0);

        let mean = [3.0; 5];
        assert!(compute_metric(MetricKind::R2, &y, &mean, 1).abs() < 1e-12);

        // sse = 1, tss = 10 -> r2 = 0.9; adj = 1 - 0.1 * 4 / 3
        let p = [1.0, 2.0, 3.0, 4.0, 6.0];
        assert!((compute_metric(MetricKind::R2, &y, &p, 1) - 0.9).abs() < 1e-12);
        assert!((compute_metric(MetricKind::AdjR2, &y, &p, 1) - (1.0 - 0.4 / 3.0)).abs() < 1e-12);

        // A constant offset is fully "explained" but still penalized by r2.
        let shifted = [2.0, 3.0, 4.0, 5.0, 6.0];
        assert!((compute_metric(MetricKind::ExplainedVariance, &y, &shifted, 1) - 1.0).abs() < 1e-12);
        assert!(compute_metric(MetricKind::R2, &y, &shifted, 1) < 1.0);

        assert!(compute_metric(MetricKind::R2, &[2.0, 2.0], &[2.0, 2.0], 1).is_nan());
    }

    #[test]
    fn metrics_map_is_keyed_by_name() {
        let m = compute_metrics(&[MetricKind::Mse, MetricKind::R2], &[1.0, 2.0], &[1.0, 2.0], 1);
        assert_eq!(m.len(), 2);
        assert_eq!(m["mse"], 0.0);
        assert_eq!(m["r2"], 1.0);
    }
}
