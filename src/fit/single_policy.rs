//! Single-policy sweep over the processed per-policy files.
//!
//! For every (layout, dependent) pair, each candidate policy's processed CSV is
//! loaded and fitted with OLS. Results are collected by policy and written as
//! one JSON file per pair. A policy whose file cannot be loaded is logged and
//! skipped.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::SweepPlan;
use crate::data::prepare::{ProcessedPolicy, load_processed, processed_path};
use crate::domain::{BinLayout, DependentVar, PolicyFitRecord};
use crate::error::AppError;
use crate::io::export::{single_policy_path, write_json};
use crate::models::{Design, fit_ols};

/// One written sweep file.
#[derive(Debug, Clone)]
pub struct SweepFile {
    pub layout: String,
    pub dependent: DependentVar,
    pub path: PathBuf,
    pub n_fitted: usize,
    pub n_skipped: usize,
    /// Policy -> flagged bins, for policies with at least one flag.
    pub significant: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub files: Vec<SweepFile>,
}

/// OLS fit of one loaded policy frame.
pub fn fit_policy(
    layout: &BinLayout,
    dependent: DependentVar,
    frame: ProcessedPolicy,
    significance: f64,
) -> Result<PolicyFitRecord, AppError> {
    let mut design = Design::from_offsets(layout, &frame.days, frame.y)?;
    let dropped_columns = design.drop_constant_columns();
    if design.n_features() == 0 {
        return Err(AppError::data(format!("No bin of layout '{}' varies.", layout.name())));
    }
    let fitted = fit_ols(&design)?;
    let summary = fitted
        .summary
        .ok_or_else(|| AppError::runtime("OLS fit returned no summary."))?;
    Ok(PolicyFitRecord {
        layout: layout.name().to_string(),
        dependent,
        n_enacted_locations: frame.n_enacted_locations,
        dropped_columns,
        significant_bins: summary.significant(significance),
        summary,
    })
}

/// Run the sweep for every layout and dependent in `plan` over `policies`.
pub fn run_single_policy_sweep(plan: &SweepPlan, policies: &[String]) -> Result<SweepReport, AppError> {
    if policies.is_empty() {
        return Err(AppError::usage("No policies to sweep."));
    }
    let mut report = SweepReport::default();

    for layout in &plan.layouts {
        for &dependent in &plan.dependents {
            let mut results: BTreeMap<String, PolicyFitRecord> = BTreeMap::new();
            let mut n_skipped = 0usize;

            for policy in policies {
                let path = processed_path(&plan.paths.processed, layout.name(), policy);
                let frame = match load_processed(&path, layout, dependent) {
                    Ok(frame) => frame,
                    Err(err) => {
                        log::error!("Error loading processed data for policy '{policy}': {err}");
                        n_skipped += 1;
                        continue;
                    }
                };
                if frame.n_enacted_locations < plan.min_enacted_locations {
                    log::warn!(
                        "Skipping policy '{policy}': enacted in {} counties (need {}).",
                        frame.n_enacted_locations,
                        plan.min_enacted_locations
                    );
                    n_skipped += 1;
                    continue;
                }
                match fit_policy(layout, dependent, frame, plan.significance) {
                    Ok(record) => {
                        results.insert(policy.clone(), record);
                    }
                    Err(err) => {
                        log::warn!("Skipping policy '{policy}' ({} / {dependent}): {err}", layout.name());
                        n_skipped += 1;
                    }
                }
            }

            let path = single_policy_path(&plan.paths.results, layout.name(), dependent.column_name());
            write_json(&path, &results)?;
            log::info!(
                "{} / {dependent}: {} policies fitted, {n_skipped} skipped -> {}",
                layout.name(),
                results.len(),
                path.display()
            );

            let significant = results
                .iter()
                .filter(|(_, r)| !r.significant_bins.is_empty())
                .map(|(p, r)| (p.clone(), r.significant_bins.clone()))
                .collect();
            report.files.push(SweepFile {
                layout: layout.name().to_string(),
                dependent,
                path,
                n_fitted: results.len(),
                n_skipped,
                significant,
            });
        }
    }
    Ok(report)
}
