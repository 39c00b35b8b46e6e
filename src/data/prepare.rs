//! Processed per-policy files.
//!
//! `pim prepare` writes one CSV per (layout, policy) holding the identifying
//! columns, the offset from enactment, every dependent variable and the
//! one-hot bin columns. The single-policy sweep reads them back.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::config::SweepPlan;
use crate::data::Dataset;
use crate::domain::{BinLayout, DayBin, DependentVar};
use crate::error::AppError;
use crate::fit::anchor::{policy_offsets, sweepable_policies};
use crate::io::export::{ensure_parent_dir, slugify};
use crate::io::ingest::build_header_map;
use crate::math::basis::fill_indicator_row;

pub const DAYS_SINCE_COLUMN: &str = "days_since_policy";
const ID_COLUMNS: [&str; 4] = ["fips_code", "state", "county", "date"];

/// `<processed>/<layout>/<policy_slug>.csv`.
pub fn processed_path(processed: &Path, layout: &str, policy: &str) -> PathBuf {
    processed
        .join(slugify(layout))
        .join(format!("{}.csv", slugify(policy)))
}

/// Write processed files for every layout and sweepable policy.
///
/// `policies` overrides the plan's policy list when non-empty.
pub fn prepare_processed(dataset: &Dataset, plan: &SweepPlan, policies: &[String]) -> Result<Vec<PathBuf>, AppError> {
    let requested = if policies.is_empty() { plan.policies.as_slice() } else { policies };
    let selected = sweepable_policies(
        &dataset.cases,
        &dataset.policies,
        requested,
        plan.min_enacted_locations,
    );
    if selected.is_empty() {
        return Err(AppError::data("No policy meets the minimum number of enacted locations."));
    }

    let mut written = Vec::new();
    for policy in &selected {
        let offsets = policy_offsets(&dataset.cases, &dataset.policies, policy);
        for layout in &plan.layouts {
            let path = processed_path(&plan.paths.processed, layout.name(), policy);
            write_processed(&path, dataset, layout, &offsets.days)?;
            log::info!(
                "Prepared '{policy}' / {} ({} enacted counties) -> {}",
                layout.name(),
                offsets.n_enacted_locations,
                path.display()
            );
            written.push(path);
        }
    }
    Ok(written)
}

fn write_processed(path: &Path, dataset: &Dataset, layout: &BinLayout, days: &[Option<i64>]) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let io_err = |e: csv::Error| AppError::usage(format!("Failed to write '{}': {e}", path.display()));
    let mut writer = csv::Writer::from_path(path).map_err(io_err)?;

    let mut header: Vec<String> = ID_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.push(DAYS_SINCE_COLUMN.to_string());
    header.extend(DependentVar::ALL.iter().map(|v| v.column_name().to_string()));
    header.extend(layout.column_names());
    writer.write_record(&header).map_err(io_err)?;

    let mut indicators = vec![0.0; layout.len()];
    let mut record: Vec<String> = Vec::with_capacity(header.len());
    for (row, d) in dataset.cases.iter().zip(days) {
        fill_indicator_row(layout, *d, &mut indicators);
        record.clear();
        record.push(row.fips_code.to_string());
        record.push(row.state.clone());
        record.push(row.county.clone());
        record.push(row.date.to_string());
        record.push(d.map(|v| v.to_string()).unwrap_or_default());
        record.extend(DependentVar::ALL.iter().map(|v| v.value_of(row).to_string()));
        record.extend(indicators.iter().map(|v| (*v as u8).to_string()));
        writer.write_record(&record).map_err(io_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::usage(format!("Failed to write '{}': {e}", path.display())))
}

/// What the sweep needs from one processed file.
#[derive(Debug, Clone)]
pub struct ProcessedPolicy {
    pub days: Vec<Option<i64>>,
    pub y: Vec<f64>,
    pub n_enacted_locations: usize,
}

/// Load one processed file for `dependent`, checking it matches `layout`.
pub fn load_processed(path: &Path, layout: &BinLayout, dependent: DependentVar) -> Result<ProcessedPolicy, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::usage(format!("Failed to open processed file '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));
    let headers = reader
        .headers()
        .map_err(|e| AppError::data(format!("Failed to read headers of '{}': {e}", path.display())))?
        .clone();
    let header_map = build_header_map(&headers);

    let column = |name: &str| {
        header_map
            .get(name)
            .copied()
            .ok_or_else(|| AppError::data(format!("'{}' has no `{name}` column.", path.display())))
    };
    let fips_idx = column("fips_code")?;
    let days_idx = column(DAYS_SINCE_COLUMN)?;
    let y_idx = column(dependent.column_name())?;

    let file_bins: Vec<&str> = headers
        .iter()
        .filter(|h| DayBin::from_column_name(h).is_some())
        .collect();
    let expected = layout.column_names();
    if file_bins != expected {
        return Err(AppError::data(format!(
            "'{}' was prepared with bins [{}], expected [{}] for layout '{}'.",
            path.display(),
            file_bins.join(", "),
            expected.join(", "),
            layout.name()
        )));
    }
    let bin_idx: Vec<usize> = expected.iter().map(|c| column(c.as_str())).collect::<Result<_, _>>()?;

    let mut days = Vec::new();
    let mut y = Vec::new();
    let mut enacted: HashSet<i64> = HashSet::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let bad = |msg: String| AppError::data(format!("'{}' line {line}: {msg}", path.display()));
        let record = result.map_err(|e| bad(format!("CSV parse error: {e}")))?;
        let field = |i: usize| record.get(i).unwrap_or_default();

        let d = match field(days_idx) {
            "" => None,
            s => Some(s.parse::<i64>().map_err(|e| bad(format!("invalid {DAYS_SINCE_COLUMN} '{s}': {e}")))?),
        };
        let value = field(y_idx)
            .parse::<f64>()
            .map_err(|e| bad(format!("invalid {dependent} '{}': {e}", field(y_idx))))?;
        let hot = d.and_then(|d| layout.locate(d));
        for (j, &col) in bin_idx.iter().enumerate() {
            let want = if hot == Some(j) { 1.0 } else { 0.0 };
            let got = field(col).parse::<f64>().ok();
            if got != Some(want) {
                return Err(bad(format!("bin column {} does not match {DAYS_SINCE_COLUMN}", expected[j])));
            }
        }
        if d.is_some() {
            let fips = field(fips_idx)
                .parse::<i64>()
                .map_err(|e| bad(format!("invalid fips_code: {e}")))?;
            enacted.insert(fips);
        }
        days.push(d);
        y.push(value);
    }
    if y.is_empty() {
        return Err(AppError::data(format!("'{}' has no rows.", path.display())));
    }

    Ok(ProcessedPolicy {
        days,
        y,
        n_enacted_locations: enacted.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweepConfig;
    use crate::data::sample::{EFFECT_POLICY, SynthOptions, generate_synthetic};
    use crate::fit::anchor::policy_offsets;

    fn setup(tag: &str) -> (Dataset, SweepPlan, PathBuf) {
        let root = std::env::temp_dir().join(format!("pim-prepare-{tag}-{}", std::process::id()));
        let mut cfg = SweepConfig::default();
        cfg.paths.processed = root.clone();
        cfg.layouts.clear();
        cfg.layouts.insert("weekly".into(), vec!["0-6".into(), "7-13".into(), "14-inf".into()]);
        cfg.layouts.insert("halves".into(), vec!["0-9".into(), "10-inf".into()]);
        let synth = generate_synthetic(&SynthOptions {
            n_states: 2,
            counties_per_state: 2,
            n_days: 30,
            ..SynthOptions::default()
        })
        .unwrap();
        let dataset = Dataset {
            cases: synth.cases,
            policies: synth.policies,
        };
        (dataset, cfg.plan().unwrap(), root)
    }

    #[test]
    fn processed_files_round_trip() {
        let (dataset, plan, root) = setup("rt");
        let written = prepare_processed(&dataset, &plan, &[EFFECT_POLICY.to_string()]).unwrap();
        assert_eq!(written.len(), 2);

        let layout = plan.layouts.iter().find(|l| l.name() == "weekly").unwrap();
        let path = processed_path(&root, "weekly", EFFECT_POLICY);
        let loaded = load_processed(&path, layout, DependentVar::NewCases).unwrap();
        let offsets = policy_offsets(&dataset.cases, &dataset.policies, EFFECT_POLICY);
        assert_eq!(loaded.days, offsets.days);
        assert_eq!(loaded.n_enacted_locations, offsets.n_enacted_locations);
        let y: Vec<f64> = dataset.cases.iter().map(|r| r.new_cases as f64).collect();
        assert_eq!(loaded.y, y);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn layout_mismatch_is_a_data_error() {
        let (dataset, plan, root) = setup("mismatch");
        prepare_processed(&dataset, &plan, &[EFFECT_POLICY.to_string()]).unwrap();
        let halves = plan.layouts.iter().find(|l| l.name() == "halves").unwrap();
        let weekly_file = processed_path(&root, "weekly", EFFECT_POLICY);
        let err = load_processed(&weekly_file, halves, DependentVar::NewCases).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);

        let missing = processed_path(&root, "weekly", "no such policy");
        assert!(load_processed(&missing, halves, DependentVar::NewCases).is_err());
        std::fs::remove_dir_all(&root).ok();
    }
}
