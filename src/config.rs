//! Sweep configuration.
//!
//! A sweep is described by a TOML file: where the data lives, which bin
//! layouts, models, metrics, policies and dependent variables to combine, and a
//! few options. Every section has built-in defaults, so `pim batch` works with
//! no file at all.
//!
//! ```toml
//! [paths]
//! results = "results"
//!
//! [sweep]
//! dependents = ["new_cases_7day_1e6"]
//! metrics = ["r2", "rmse"]
//! holdout_fraction = 0.2
//!
//! [layouts]
//! weekly = ["0-6", "7-13", "14-20", "21-27", "28-inf"]
//!
//! [models.ols]
//! kind = "ols"
//!
//! [models.lasso_small]
//! kind = "lasso"
//! alpha = 0.01
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{BinLayout, DependentVar, MetricKind, ModelSpec};
use crate::error::AppError;
use crate::io::export::slugify;

/// On-disk locations used across subcommands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub raw_cases: PathBuf,
    pub raw_policies: PathBuf,
    pub cases: PathBuf,
    pub policies: PathBuf,
    pub processed: PathBuf,
    pub results: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            raw_cases: PathBuf::from("data/raw/covid_timeseries.csv"),
            raw_policies: PathBuf::from("data/raw/covid_policies.json"),
            cases: PathBuf::from("data/clean/covid_timeseries_cleaned.csv"),
            policies: PathBuf::from("data/clean/covid_policies_cleaned.csv"),
            processed: PathBuf::from("data/processed"),
            results: PathBuf::from("results"),
        }
    }
}

/// Which combinations to run and how to score them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepOptions {
    pub dependents: Vec<DependentVar>,
    pub metrics: Vec<MetricKind>,
    /// Empty means every policy type in the cleaned policy file.
    pub policies: Vec<String>,
    pub min_enacted_locations: usize,
    /// Share of rows held out for metric evaluation; 0 scores in-sample.
    pub holdout_fraction: f64,
    pub seed: u64,
    /// p-value threshold for flagging a bin coefficient.
    pub significance: f64,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            dependents: vec![DependentVar::NewCases7day1e6, DependentVar::NewDeaths7day1e6],
            metrics: vec![
                MetricKind::R2,
                MetricKind::AdjR2,
                MetricKind::Mse,
                MetricKind::Rmse,
                MetricKind::Mae,
            ],
            policies: Vec::new(),
            min_enacted_locations: 1,
            holdout_fraction: 0.0,
            seed: 42,
            significance: 0.05,
        }
    }
}

/// Raw TOML document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub paths: Paths,
    pub sweep: SweepOptions,
    /// Layout name -> bin specs such as `"0-6"` or `"30-inf"`.
    pub layouts: BTreeMap<String, Vec<String>>,
    /// Model name -> estimator settings.
    pub models: BTreeMap<String, ModelSpec>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let layouts = [
            ("weekly", vec!["0-6", "7-13", "14-20", "21-27", "28-inf"]),
            ("biweekly", vec!["0-13", "14-27", "28-41", "42-55", "56-inf"]),
            ("monthly", vec!["0-29", "30-59", "60-89", "90-inf"]),
            ("early_late", vec!["0-13", "14-inf"]),
        ]
        .into_iter()
        .map(|(name, bins)| (name.to_string(), bins.into_iter().map(String::from).collect()))
        .collect();

        let models = [
            ("ols".to_string(), ModelSpec::Ols),
            ("ridge".to_string(), ModelSpec::Ridge { alpha: 1.0 }),
            (
                "lasso".to_string(),
                ModelSpec::Lasso {
                    alpha: 0.1,
                    max_iter: 1000,
                    tol: 1e-6,
                },
            ),
            (
                "ridge_cv".to_string(),
                ModelSpec::RidgeCv {
                    alpha_min: 1e-3,
                    alpha_max: 1e3,
                    alpha_steps: 13,
                    folds: 5,
                },
            ),
        ]
        .into_iter()
        .collect();

        Self {
            paths: Paths::default(),
            sweep: SweepOptions::default(),
            layouts,
            models,
        }
    }
}

impl SweepConfig {
    /// Load a TOML file; sections it omits keep their defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::usage(format!("Failed to read config '{}': {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| AppError::usage(format!("Invalid config '{}': {e}", path.display())))
    }

    /// `load` when a path is given, built-in defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, AppError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Validate everything and resolve it into a runnable plan.
    pub fn plan(&self) -> Result<SweepPlan, AppError> {
        let layouts = self
            .layouts
            .iter()
            .map(|(name, bins)| BinLayout::parse(name.as_str(), bins))
            .collect::<Result<Vec<_>, _>>()?;
        if layouts.is_empty() {
            return Err(AppError::usage("Config defines no bin layouts."));
        }
        if self.models.is_empty() {
            return Err(AppError::usage("Config defines no models."));
        }
        for (name, spec) in &self.models {
            validate_model(name, spec)?;
        }
        let s = &self.sweep;
        reject_slug_collisions("layout", self.layouts.keys())?;
        reject_slug_collisions("model", self.models.keys())?;
        reject_slug_collisions("policy", &s.policies)?;
        if s.dependents.is_empty() {
            return Err(AppError::usage("Config lists no dependent variables."));
        }
        if s.metrics.is_empty() {
            return Err(AppError::usage("Config lists no metrics."));
        }
        if !(0.0..1.0).contains(&s.holdout_fraction) {
            return Err(AppError::usage(format!(
                "holdout_fraction must be in [0, 1) (got {}).",
                s.holdout_fraction
            )));
        }
        if !(s.significance > 0.0 && s.significance < 1.0) {
            return Err(AppError::usage(format!(
                "significance must be in (0, 1) (got {}).",
                s.significance
            )));
        }

        Ok(SweepPlan {
            paths: self.paths.clone(),
            layouts,
            models: self.models.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            metrics: s.metrics.clone(),
            dependents: s.dependents.clone(),
            policies: s.policies.clone(),
            min_enacted_locations: s.min_enacted_locations,
            holdout_fraction: s.holdout_fraction,
            seed: s.seed,
            significance: s.significance,
        })
    }
}

/// Result and processed paths are keyed by slug, so distinct names must not share one.
fn reject_slug_collisions<'a>(kind: &str, names: impl IntoIterator<Item = &'a String>) -> Result<(), AppError> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    for name in names {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::usage(format!("The {kind} name '{name}' has no letters or digits.")));
        }
        if let Some(prev) = seen.insert(slug.clone(), name.as_str()) {
            if prev != name {
                return Err(AppError::usage(format!(
                    "The {kind} names '{prev}' and '{name}' both map to '{slug}' in output paths."
                )));
            }
        }
    }
    Ok(())
}

fn validate_model(name: &str, spec: &ModelSpec) -> Result<(), AppError> {
    let bad = |what: String| Err(AppError::usage(format!("Model '{name}': {what}")));
    match *spec {
        ModelSpec::Ols => Ok(()),
        ModelSpec::Ridge { alpha } if !(alpha.is_finite() && alpha >= 0.0) => bad(format!("alpha must be >= 0 (got {alpha}).")),
        ModelSpec::Ridge { .. } => Ok(()),
        ModelSpec::Lasso { alpha, .. } if !(alpha.is_finite() && alpha >= 0.0) => bad(format!("alpha must be >= 0 (got {alpha}).")),
        ModelSpec::Lasso { max_iter: 0, .. } => bad("max_iter must be >= 1.".to_string()),
        ModelSpec::Lasso { tol, .. } if !(tol > 0.0) => bad(format!("tol must be > 0 (got {tol}).")),
        ModelSpec::Lasso { .. } => Ok(()),
        ModelSpec::RidgeCv {
            alpha_min,
            alpha_max,
            alpha_steps,
            folds,
        } => {
            if !(alpha_min > 0.0 && alpha_max > alpha_min) {
                return bad(format!("need 0 < alpha_min < alpha_max (got {alpha_min}, {alpha_max})."));
            }
            if alpha_steps < 2 {
                return bad("alpha_steps must be >= 2.".to_string());
            }
            if folds < 2 {
                return bad("folds must be >= 2.".to_string());
            }
            Ok(())
        }
    }
}

/// Validated, resolved sweep settings.
#[derive(Debug, Clone)]
pub struct SweepPlan {
    pub paths: Paths,
    pub layouts: Vec<BinLayout>,
    /// Sorted by model name.
    pub models: Vec<(String, ModelSpec)>,
    pub metrics: Vec<MetricKind>,
    pub dependents: Vec<DependentVar>,
    pub policies: Vec<String>,
    pub min_enacted_locations: usize,
    pub holdout_fraction: f64,
    pub seed: u64,
    pub significance: f64,
}

impl SweepPlan {
    /// Number of (layout, policy, dependent, model) combinations for `n_policies`.
    pub fn combinations(&self, n_policies: usize) -> usize {
        self.layouts.len() * n_policies * self.dependents.len() * self.models.len()
    }
}
