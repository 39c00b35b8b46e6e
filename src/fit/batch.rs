//! Batch harness: every (layout, policy, dependent, model) combination.
//!
//! For each combination we build the one-hot day-bin design, fit the model,
//! score it with every configured metric, and write a text summary plus a JSON
//! record. A combination that fails is logged and recorded as failed; the batch
//! keeps going. The summary file lists every combination either way.
//!
//! Offsets are computed once per policy and reused for every layout, so the
//! outer loop runs over policies.

use std::borrow::Cow;
use std::io::IsTerminal;
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::config::SweepPlan;
use crate::data::Dataset;
use crate::domain::{
    BatchEntry, BinLayout, CombinationRecord, DependentVar, EntryStatus, MetricKind, ModelSpec,
};
use crate::error::AppError;
use crate::fit::anchor::{PolicyOffsets, policy_offsets, sweepable_policies};
use crate::fit::cross_val::holdout_split;
use crate::fit::metrics::compute_metrics;
use crate::io::export::{batch_summary_path, combination_stem, write_json, write_text};
use crate::models::{Design, FitOptions, fit_model};
use crate::report::format_combination;

/// Outcome of a whole batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub policies: Vec<String>,
    pub entries: Vec<BatchEntry>,
    pub n_ok: usize,
    pub n_failed: usize,
    pub summary_path: PathBuf,
}

/// A design ready to fit: full rows, the train/eval views, and what was dropped.
struct PreparedDesign {
    design: Design,
    dropped: Vec<String>,
    split: Option<(Vec<usize>, Vec<usize>)>,
}

impl PreparedDesign {
    fn train(&self) -> Cow<'_, Design> {
        match &self.split {
            Some((train, _)) => Cow::Owned(self.design.select_rows(train)),
            None => Cow::Borrowed(&self.design),
        }
    }

    fn eval(&self) -> Cow<'_, Design> {
        match &self.split {
            Some((_, eval)) => Cow::Owned(self.design.select_rows(eval)),
            None => Cow::Borrowed(&self.design),
        }
    }
}

/// Build the design for one (policy, layout, dependent) triple.
fn prepare_design(
    dataset: &Dataset,
    offsets: &PolicyOffsets,
    layout: &BinLayout,
    dependent: DependentVar,
    holdout_fraction: f64,
    seed: u64,
) -> Result<PreparedDesign, AppError> {
    let y: Vec<f64> = dataset.cases.iter().map(|row| dependent.value_of(row)).collect();
    if let Some(i) = y.iter().position(|v| !v.is_finite()) {
        return Err(AppError::data(format!("Non-finite {dependent} value in case row {i}.")));
    }
    let mut design = Design::from_offsets(layout, &offsets.days, y)?;
    let dropped = design.drop_constant_columns();
    if !dropped.is_empty() {
        log::debug!(
            "{}/{}/{dependent}: dropped constant columns {:?}",
            layout.name(),
            offsets.policy,
            dropped
        );
    }
    if design.n_features() == 0 {
        return Err(AppError::data(format!(
            "No bin of layout '{}' varies for policy '{}'.",
            layout.name(),
            offsets.policy
        )));
    }
    let split = if holdout_fraction > 0.0 {
        Some(holdout_split(design.n_obs(), holdout_fraction, seed)?)
    } else {
        None
    };
    Ok(PreparedDesign { design, dropped, split })
}

/// Fit one model on a prepared design and score it.
#[allow(clippy::too_many_arguments)]
fn fit_combination(
    prepared: &PreparedDesign,
    layout: &BinLayout,
    policy: &str,
    n_enacted_locations: usize,
    dependent: DependentVar,
    model_name: &str,
    spec: &ModelSpec,
    metrics: &[MetricKind],
    significance: f64,
    seed: u64,
) -> Result<CombinationRecord, AppError> {
    let train = prepared.train();
    let eval = prepared.eval();

    let fitted = fit_model(spec, &train, &FitOptions { seed })?;
    let pred = fitted.predict(&eval.x);
    if pred.iter().any(|v| !v.is_finite()) {
        return Err(AppError::runtime("Non-finite prediction."));
    }
    let scores = compute_metrics(metrics, eval.y.as_slice(), pred.as_slice(), train.n_features());
    let significant_bins = fitted
        .summary
        .as_ref()
        .map(|s| s.significant(significance))
        .unwrap_or_default();

    Ok(CombinationRecord {
        layout: layout.name().to_string(),
        bins: layout.labels(),
        policy: policy.to_string(),
        dependent,
        model: model_name.to_string(),
        model_spec: spec.clone(),
        n_obs: prepared.design.n_obs(),
        n_train: train.n_obs(),
        n_eval: eval.n_obs(),
        n_enacted_locations,
        dropped_columns: prepared.dropped.clone(),
        intercept: fitted.intercept,
        coefficients: fitted.names.iter().cloned().zip(fitted.coefficients.iter().copied()).collect(),
        alpha: fitted.alpha,
        metrics: scores,
        summary: fitted.summary,
        significant_bins,
    })
}

fn write_combination(plan: &SweepPlan, record: &CombinationRecord) -> Result<(), AppError> {
    let stem = combination_stem(
        &plan.paths.results,
        &record.layout,
        &record.policy,
        record.dependent.column_name(),
        &record.model,
    );
    write_text(&stem.with_extension("txt"), &format_combination(record))?;
    write_json(&stem.with_extension("json"), record)
}

fn progress_bar(len: u64) -> ProgressBar {
    let target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(10)
    } else {
        ProgressDrawTarget::hidden()
    };
    let pb = ProgressBar::with_draw_target(Some(len), target);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

/// Run every combination in `plan` against `dataset`.
pub fn run_batch(dataset: &Dataset, plan: &SweepPlan) -> Result<BatchReport, AppError> {
    if dataset.cases.is_empty() {
        return Err(AppError::data("No case rows to fit."));
    }
    let policies = sweepable_policies(
        &dataset.cases,
        &dataset.policies,
        &plan.policies,
        plan.min_enacted_locations,
    );
    if policies.is_empty() {
        return Err(AppError::data("No policy meets the minimum number of enacted locations."));
    }

    let total = plan.combinations(policies.len());
    log::info!(
        "Batch: {} layouts x {} policies x {} dependents x {} models = {total} combinations",
        plan.layouts.len(),
        policies.len(),
        plan.dependents.len(),
        plan.models.len()
    );

    let pb = progress_bar(total as u64);
    let mut entries = Vec::with_capacity(total);

    for policy in &policies {
        pb.set_message(policy.clone());
        let offsets = policy_offsets(&dataset.cases, &dataset.policies, policy);

        for layout in &plan.layouts {
            for &dependent in &plan.dependents {
                let prepared = prepare_design(dataset, &offsets, layout, dependent, plan.holdout_fraction, plan.seed);

                for (model_name, spec) in &plan.models {
                    let outcome = prepared.as_ref().map_err(Clone::clone).and_then(|p| {
                        let record = fit_combination(
                            p,
                            layout,
                            policy,
                            offsets.n_enacted_locations,
                            dependent,
                            model_name,
                            spec,
                            &plan.metrics,
                            plan.significance,
                            plan.seed,
                        )?;
                        write_combination(plan, &record)?;
                        Ok(record)
                    });

                    let entry = match outcome {
                        Ok(record) => BatchEntry {
                            layout: record.layout,
                            policy: record.policy,
                            dependent,
                            model: record.model,
                            status: EntryStatus::Ok,
                            error: None,
                            metrics: record.metrics,
                            significant_bins: record.significant_bins,
                        },
                        Err(err) => {
                            pb.suspend(|| {
                                log::warn!(
                                    "Skipping {}/{policy}/{dependent}/{model_name}: {err}",
                                    layout.name()
                                )
                            });
                            BatchEntry {
                                layout: layout.name().to_string(),
                                policy: policy.clone(),
                                dependent,
                                model: model_name.clone(),
                                status: EntryStatus::Failed,
                                error: Some(err.message().to_string()),
                                metrics: Default::default(),
                                significant_bins: Vec::new(),
                            }
                        }
                    };
                    entries.push(entry);
                    pb.inc(1);
                }
            }
        }
    }
    pb.finish_and_clear();

    let summary_path = batch_summary_path(&plan.paths.results);
    write_json(&summary_path, &entries)?;

    let n_ok = entries.iter().filter(|e| e.status == EntryStatus::Ok).count();
    let n_failed = entries.len() - n_ok;
    log::info!("Batch finished: {n_ok} ok, {n_failed} failed; summary at {}", summary_path.display());

    Ok(BatchReport {
        policies,
        entries,
        n_ok,
        n_failed,
        summary_path,
    })
}
