//! Human-readable text output.
//!
//! Formatting lives in one place so the fitting code stays free of layout
//! concerns and output changes stay localized.

use crate::data::inspect::ColumnProfile;
use crate::domain::{CombinationRecord, EntryStatus, OlsSummary};
use crate::fit::batch::BatchReport;
use crate::fit::single_policy::SweepReport;

const RULE_WIDTH: usize = 78;

/// statsmodels-style OLS summary block.
pub fn format_ols_summary(summary: &OlsSummary) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);

    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!(
        "{:<22}{:>16}   {:<22}{:>14}\n",
        "No. Observations:",
        summary.n_obs,
        "R-squared:",
        fmt_num(summary.r2, 3)
    ));
    out.push_str(&format!(
        "{:<22}{:>16}   {:<22}{:>14}\n",
        "Df Residuals:",
        summary.df_resid,
        "Adj. R-squared:",
        fmt_num(summary.adj_r2, 3)
    ));
    out.push_str(&format!(
        "{:<22}{:>16}   {:<22}{:>14}\n",
        "Df Model:",
        summary.df_model,
        "F-statistic:",
        fmt_num(summary.f_stat, 3)
    ));
    out.push_str(&format!(
        "{:<22}{:>16}   {:<22}{:>14}\n",
        "Log-Likelihood:",
        fmt_num(summary.log_likelihood, 2),
        "Prob (F-statistic):",
        fmt_p(summary.f_pvalue)
    ));
    out.push_str(&format!(
        "{:<22}{:>16}   {:<22}{:>14}\n",
        "AIC:",
        fmt_num(summary.aic, 1),
        "BIC:",
        fmt_num(summary.bic, 1)
    ));
    out.push_str(&rule);
    out.push('\n');

    out.push_str(&format!(
        "{:<18} {:>10} {:>10} {:>8} {:>8} {:>10} {:>10}\n",
        "", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"
    ));
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');
    for c in &summary.coefficients {
        out.push_str(&format!(
            "{:<18} {:>10} {:>10} {:>8} {:>8} {:>10} {:>10}\n",
            truncate(&c.name, 18),
            fmt_num(c.coef, 4),
            fmt_num(c.std_err, 3),
            fmt_num(c.t_value, 3),
            fmt_p(c.p_value),
            fmt_num(c.ci_low, 3),
            fmt_num(c.ci_high, 3),
        ));
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

/// Text file written next to each batch combination's JSON record.
pub fn format_combination(record: &CombinationRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("policy:    {}\n", record.policy));
    out.push_str(&format!("layout:    {} [{}]\n", record.layout, record.bins.join(", ")));
    out.push_str(&format!("dependent: {}\n", record.dependent));
    out.push_str(&format!("model:     {} ({})\n", record.model, record.model_spec.kind().display_name()));
    if let Some(alpha) = record.alpha {
        out.push_str(&format!("alpha:     {alpha:.6e}\n"));
    }
    out.push_str(&format!(
        "rows:      {} (train {}, eval {}) | enacted counties: {}\n",
        record.n_obs, record.n_train, record.n_eval, record.n_enacted_locations
    ));
    if !record.dropped_columns.is_empty() {
        out.push_str(&format!("dropped:   {} (no variation)\n", record.dropped_columns.join(", ")));
    }
    out.push('\n');

    match &record.summary {
        Some(summary) => out.push_str(&format_ols_summary(summary)),
        None => {
            out.push_str(&format!("{:<18} {:>14}\n", "term", "coef"));
            out.push_str(&format!("{:-<18} {:-<14}\n", "", ""));
            out.push_str(&format!("{:<18} {:>14}\n", "const", fmt_num(record.intercept, 6)));
            for (name, coef) in &record.coefficients {
                out.push_str(&format!("{:<18} {:>14}\n", truncate(name, 18), fmt_num(*coef, 6)));
            }
        }
    }

    out.push_str("\nmetrics:\n");
    for (name, value) in &record.metrics {
        out.push_str(&format!("  {name:<20} {}\n", fmt_num(*value, 6)));
    }
    if record.summary.is_some() {
        let flagged = if record.significant_bins.is_empty() {
            "none".to_string()
        } else {
            record.significant_bins.join(", ")
        };
        out.push_str(&format!("\nsignificant bins: {flagged}\n"));
    }
    out
}

/// End-of-run summary for `pim batch`.
pub fn format_batch_report(report: &BatchReport) -> String {
    let mut out = String::new();
    out.push_str("=== pim - batch sweep ===\n");
    out.push_str(&format!(
        "Combinations: {} ok, {} failed ({} policies)\n",
        report.n_ok,
        report.n_failed,
        report.policies.len()
    ));
    out.push_str(&format!("Summary: {}\n", report.summary_path.display()));

    let flagged: Vec<_> = report
        .entries
        .iter()
        .filter(|e| e.status == EntryStatus::Ok && !e.significant_bins.is_empty())
        .collect();
    if !flagged.is_empty() {
        out.push_str("\nSignificant bins:\n");
        out.push_str(&format!(
            "{:<10} {:<34} {:<20} {:<10} {}\n",
            "layout", "policy", "dependent", "model", "bins"
        ));
        for e in flagged {
            out.push_str(
                format!(
                    "{:<10} {:<34} {:<20} {:<10} {}\n",
                    truncate(&e.layout, 10),
                    truncate(&e.policy, 34),
                    e.dependent.column_name(),
                    truncate(&e.model, 10),
                    e.significant_bins.join(", ")
                )
                .trim_end(),
            );
            out.push('\n');
        }
    }

    let failures: Vec<_> = report.entries.iter().filter(|e| e.status == EntryStatus::Failed).collect();
    if !failures.is_empty() {
        out.push_str("\nFailures:\n");
        for e in failures {
            out.push_str(&format!(
                "- {}/{}/{}/{}: {}\n",
                e.layout,
                e.policy,
                e.dependent,
                e.model,
                e.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    out
}

/// End-of-run summary for `pim sweep`.
pub fn format_sweep_report(report: &SweepReport) -> String {
    let mut out = String::new();
    out.push_str("=== pim - single-policy sweep ===\n");
    for file in &report.files {
        out.push_str(&format!(
            "{} / {}: {} fitted, {} skipped -> {}\n",
            file.layout,
            file.dependent,
            file.n_fitted,
            file.n_skipped,
            file.path.display()
        ));
        for (policy, bins) in &file.significant {
            out.push_str(&format!("    {:<40} {}\n", truncate(policy, 40), bins.join(", ")));
        }
    }
    out
}

/// Column profile table for `pim inspect`.
pub fn format_column_profiles(rows_read: usize, profiles: &[ColumnProfile]) -> String {
    let mut out = String::new();
    out.push_str(&format!("rows: {rows_read}\n"));
    out.push_str(
        format!(
            "{:<28} {:>10} {:<22} {:>10} {:<8}\n",
            "field", "num_nulls", "datatypes", "negatives", "integral"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!("{:-<28} {:-<10} {:-<22} {:-<10} {:-<8}\n", "", "", "", "", "").trim_end(),
    );
    out.push('\n');
    for p in profiles {
        let types: Vec<&str> = p.types.iter().copied().collect();
        out.push_str(
            format!(
                "{:<28} {:>10} {:<22} {:>10} {:<8}\n",
                truncate(&p.name, 28),
                p.nulls,
                types.join(","),
                p.negatives.map(|n| n.to_string()).unwrap_or_default(),
                p.all_integral.map(|b| b.to_string()).unwrap_or_default(),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn fmt_num(v: f64, decimals: usize) -> String {
    if v.is_finite() {
        format!("{v:.decimals$}")
    } else {
        "nan".to_string()
    }
}

fn fmt_p(p: f64) -> String {
    if !p.is_finite() {
        "nan".to_string()
    } else if p < 0.001 {
        "0.000".to_string()
    } else {
        format!("{p:.3}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::{CoefficientStats, DependentVar, ModelSpec};

    fn summary() -> OlsSummary {
        let coef = |name: &str, p: f64| CoefficientStats {
            name: name.to_string(),
            coef: 1.5,
            std_err: 0.5,
            t_value: 3.0,
            p_value: p,
            ci_low: 0.5,
            ci_high: 2.5,
        };
        OlsSummary {
            n_obs: 100,
            df_model: 2,
            df_resid: 97,
            r2: 0.42,
            adj_r2: 0.41,
            f_stat: 35.0,
            f_pvalue: 1e-9,
            log_likelihood: -120.5,
            aic: 247.0,
            bic: 254.8,
            coefficients: vec![coef("const", 0.2), coef("days_0_6", 0.003), coef("days_7_inf", f64::NAN)],
        }
    }

    #[test]
    fn ols_summary_has_statsmodels_fields() {
        let text = format_ols_summary(&summary());
        for needle in ["No. Observations:", "R-squared:", "Prob (F-statistic):", "P>|t|", "days_0_6", "AIC:"] {
            assert!(text.contains(needle), "missing {needle}");
        }
        assert!(text.contains("0.003"));
        assert!(text.contains("nan"));
    }

    #[test]
    fn combination_text_lists_metrics_and_flags() {
        let mut metrics = BTreeMap::new();
        metrics.insert("r2".to_string(), 0.42);
        let record = CombinationRecord {
            layout: "weekly".into(),
            bins: vec!["0-6".into(), "7-inf".into()],
            policy: "mask mandate".into(),
            dependent: DependentVar::NewCases,
            model: "ols".into(),
            model_spec: ModelSpec::Ols,
            n_obs: 100,
            n_train: 100,
            n_eval: 100,
            n_enacted_locations: 3,
            dropped_columns: vec![],
            intercept: 1.0,
            coefficients: BTreeMap::new(),
            alpha: None,
            metrics,
            summary: Some(summary()),
            significant_bins: vec!["days_0_6".into()],
        };
        let text = format_combination(&record);
        assert!(text.contains("policy:    mask mandate"));
        assert!(text.contains("r2"));
        assert!(text.contains("significant bins: days_0_6"));
    }

    #[test]
    fn truncates_long_names() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
