//! Shared workflows behind the subcommands.
//!
//! Each function does the file-to-file work for one step so the CLI layer
//! only has to build options and print summaries.

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::config::{Paths, SweepPlan};
use crate::data::clean::{clean_cases, clean_policies};
use crate::data::sample::{SynthOptions, generate_synthetic};
use crate::data::{Dataset, prepare_processed};
use crate::error::AppError;
use crate::fit::anchor::policy_types;
use crate::fit::batch::{BatchReport, run_batch};
use crate::fit::single_policy::{SweepReport, run_single_policy_sweep};
use crate::io::ingest::{read_policies, read_raw_cases, read_raw_policies, write_cases, write_policies};

/// Row counts written by `clean`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOutput {
    pub n_cases: usize,
    pub n_policies: usize,
}

/// Raw downloads -> cleaned case and policy CSVs.
pub fn run_clean(paths: &Paths, max_date: NaiveDate) -> Result<CleanOutput, AppError> {
    let raw = read_raw_cases(&paths.raw_cases)?;
    raw.log_row_errors("case timeseries");
    let (cases, case_stats) = clean_cases(raw.rows, max_date)?;
    case_stats.log("case timeseries");
    if cases.is_empty() {
        return Err(AppError::data("Cleaning left no case rows."));
    }
    write_cases(&paths.cases, &cases)?;

    let raw_policies = read_raw_policies(&paths.raw_policies)?;
    let (policies, policy_stats, row_errors) = clean_policies(raw_policies, &cases)?;
    policy_stats.log("policies");
    for e in row_errors.iter().take(5) {
        log::warn!("policy record {}: {}", e.line, e.message);
    }
    write_policies(&paths.policies, &policies)?;

    log::info!(
        "Wrote {} and {}",
        paths.cases.display(),
        paths.policies.display()
    );
    Ok(CleanOutput {
        n_cases: cases.len(),
        n_policies: policies.len(),
    })
}

/// Synthetic dataset written where `clean` would put the real one.
pub fn run_synth(paths: &Paths, opts: &SynthOptions) -> Result<CleanOutput, AppError> {
    let synth = generate_synthetic(opts)?;
    write_cases(&paths.cases, &synth.cases)?;
    write_policies(&paths.policies, &synth.policies)?;
    Ok(CleanOutput {
        n_cases: synth.cases.len(),
        n_policies: synth.policies.len(),
    })
}

pub fn run_prepare(plan: &SweepPlan, policies: &[String]) -> Result<Vec<PathBuf>, AppError> {
    let dataset = Dataset::load(&plan.paths)?;
    prepare_processed(&dataset, plan, policies)
}

pub fn run_batch_from_disk(plan: &SweepPlan) -> Result<BatchReport, AppError> {
    let dataset = Dataset::load(&plan.paths)?;
    run_batch(&dataset, plan)
}

/// Sweep the plan's policies, or every policy type in the cleaned table.
pub fn run_sweep_from_disk(plan: &SweepPlan) -> Result<SweepReport, AppError> {
    let policies = if plan.policies.is_empty() {
        policy_types(&read_policies(&plan.paths.policies)?)
    } else {
        plan.policies.clone()
    };
    run_single_policy_sweep(plan, &policies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweepConfig;
    use crate::io::ingest::read_cases;

    #[test]
    fn synth_then_prepare_then_sweep() {
        let root = std::env::temp_dir().join(format!("pim-pipeline-{}", std::process::id()));
        let mut cfg = SweepConfig::default();
        cfg.paths.cases = root.join("clean/cases.csv");
        cfg.paths.policies = root.join("clean/policies.csv");
        cfg.paths.processed = root.join("processed");
        cfg.paths.results = root.join("results");
        cfg.layouts.retain(|name, _| name == "early_late");
        cfg.sweep.dependents = vec![crate::domain::DependentVar::NewCases1e6];
        let plan = cfg.plan().unwrap();

        let written = run_synth(
            &plan.paths,
            &SynthOptions {
                n_states: 2,
                counties_per_state: 2,
                n_days: 40,
                ..SynthOptions::default()
            },
        )
        .unwrap();
        assert_eq!(read_cases(&plan.paths.cases).unwrap().len(), written.n_cases);

        let files = run_prepare(&plan, &[]).unwrap();
        assert_eq!(files.len(), 2);

        let report = run_sweep_from_disk(&plan).unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].n_fitted, 2);

        std::fs::remove_dir_all(&root).ok();
    }
}
