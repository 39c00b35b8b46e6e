//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - read from and written to cleaned CSV files
//! - used in-memory while sweeping combinations
//! - exported to JSON result files

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which case/death column is regressed on the policy bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
pub enum DependentVar {
    #[serde(rename = "new_cases")]
    #[value(name = "new_cases")]
    NewCases,
    #[serde(rename = "new_deaths")]
    #[value(name = "new_deaths")]
    NewDeaths,
    #[serde(rename = "new_cases_1e6")]
    #[value(name = "new_cases_1e6")]
    NewCases1e6,
    #[serde(rename = "new_deaths_1e6")]
    #[value(name = "new_deaths_1e6")]
    NewDeaths1e6,
    #[serde(rename = "new_cases_7day")]
    #[value(name = "new_cases_7day")]
    NewCases7day,
    #[serde(rename = "new_deaths_7day")]
    #[value(name = "new_deaths_7day")]
    NewDeaths7day,
    #[serde(rename = "new_cases_7day_1e6")]
    #[value(name = "new_cases_7day_1e6")]
    NewCases7day1e6,
    #[serde(rename = "new_deaths_7day_1e6")]
    #[value(name = "new_deaths_7day_1e6")]
    NewDeaths7day1e6,
}

impl DependentVar {
    pub const ALL: [DependentVar; 8] = [
        DependentVar::NewCases,
        DependentVar::NewDeaths,
        DependentVar::NewCases1e6,
        DependentVar::NewDeaths1e6,
        DependentVar::NewCases7day,
        DependentVar::NewDeaths7day,
        DependentVar::NewCases7day1e6,
        DependentVar::NewDeaths7day1e6,
    ];

    /// Column name in the cleaned timeseries (and in processed policy files).
    pub fn column_name(self) -> &'static str {
        match self {
            DependentVar::NewCases => "new_cases",
            DependentVar::NewDeaths => "new_deaths",
            DependentVar::NewCases1e6 => "new_cases_1e6",
            DependentVar::NewDeaths1e6 => "new_deaths_1e6",
            DependentVar::NewCases7day => "new_cases_7day",
            DependentVar::NewDeaths7day => "new_deaths_7day",
            DependentVar::NewCases7day1e6 => "new_cases_7day_1e6",
            DependentVar::NewDeaths7day1e6 => "new_deaths_7day_1e6",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.column_name() == name)
    }

    /// Pull this variable out of a cleaned case row.
    pub fn value_of(self, row: &CaseRecord) -> f64 {
        match self {
            DependentVar::NewCases => row.new_cases as f64,
            DependentVar::NewDeaths => row.new_deaths as f64,
            DependentVar::NewCases1e6 => row.new_cases_1e6,
            DependentVar::NewDeaths1e6 => row.new_deaths_1e6,
            DependentVar::NewCases7day => row.new_cases_7day,
            DependentVar::NewDeaths7day => row.new_deaths_7day,
            DependentVar::NewCases7day1e6 => row.new_cases_7day_1e6,
            DependentVar::NewDeaths7day1e6 => row.new_deaths_7day_1e6,
        }
    }
}

impl fmt::Display for DependentVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Whether a policy record was issued by a state or by a county.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyLevel {
    State,
    County,
}

impl FromStr for PolicyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "state" => Ok(PolicyLevel::State),
            "county" => Ok(PolicyLevel::County),
            other => Err(format!("unknown policy level '{other}'")),
        }
    }
}

/// Whether a policy record marks the start or the end of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartStop {
    Start,
    Stop,
}

impl FromStr for StartStop {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(StartStop::Start),
            "stop" => Ok(StartStop::Stop),
            other => Err(format!("unknown start/stop marker '{other}'")),
        }
    }
}

/// One cleaned row of the county case/death timeseries.
///
/// Per-capita columns keep their historical `_1e6` names but are per 100,000.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub date: NaiveDate,
    pub state: String,
    pub county: String,
    pub full_loc_name: String,
    pub fips_code: i64,
    pub total_population: i64,
    pub new_cases: i64,
    pub new_deaths: i64,
    pub new_cases_1e6: f64,
    pub new_deaths_1e6: f64,
    pub new_cases_7day: f64,
    pub new_deaths_7day: f64,
    pub new_cases_7day_1e6: f64,
    pub new_deaths_7day_1e6: f64,
}

/// One cleaned policy record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub state: String,
    /// Lowercase county name, or `statewide` for state-level records.
    pub county: String,
    pub fips_code: i64,
    pub policy_level: PolicyLevel,
    pub policy_type: String,
    pub start_stop: StartStop,
    pub date: NaiveDate,
}

impl PolicyRecord {
    /// Does this record govern the given county?
    pub fn applies_to(&self, state: &str, county: &str) -> bool {
        if self.state != state {
            return false;
        }
        match self.policy_level {
            PolicyLevel::State => true,
            PolicyLevel::County => self.county == county,
        }
    }
}

/// Concrete estimator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Ols,
    Ridge,
    Lasso,
    RidgeCv,
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Ols => "OLS",
            ModelKind::Ridge => "Ridge",
            ModelKind::Lasso => "Lasso",
            ModelKind::RidgeCv => "RidgeCV",
        }
    }
}

/// A configured model instance (one entry of the model dictionary).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Ols,
    Ridge {
        alpha: f64,
    },
    Lasso {
        alpha: f64,
        #[serde(default = "default_lasso_max_iter")]
        max_iter: usize,
        #[serde(default = "default_lasso_tol")]
        tol: f64,
    },
    RidgeCv {
        #[serde(default = "default_alpha_min")]
        alpha_min: f64,
        #[serde(default = "default_alpha_max")]
        alpha_max: f64,
        #[serde(default = "default_alpha_steps")]
        alpha_steps: usize,
        #[serde(default = "default_folds")]
        folds: usize,
    },
}

impl ModelSpec {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::Ols => ModelKind::Ols,
            ModelSpec::Ridge { .. } => ModelKind::Ridge,
            ModelSpec::Lasso { .. } => ModelKind::Lasso,
            ModelSpec::RidgeCv { .. } => ModelKind::RidgeCv,
        }
    }
}

fn default_lasso_max_iter() -> usize {
    1000
}

fn default_lasso_tol() -> f64 {
    1e-6
}

fn default_alpha_min() -> f64 {
    1e-3
}

fn default_alpha_max() -> f64 {
    1e3
}

fn default_alpha_steps() -> usize {
    13
}

fn default_folds() -> usize {
    5
}

/// A named scoring function (one entry of the metric dictionary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum MetricKind {
    R2,
    AdjR2,
    Mse,
    Rmse,
    Mae,
    MaxError,
    ExplainedVariance,
}

impl MetricKind {
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::R2 => "r2",
            MetricKind::AdjR2 => "adj_r2",
            MetricKind::Mse => "mse",
            MetricKind::Rmse => "rmse",
            MetricKind::Mae => "mae",
            MetricKind::MaxError => "max_error",
            MetricKind::ExplainedVariance => "explained_variance",
        }
    }
}

/// Inference statistics for one OLS coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientStats {
    pub name: String,
    pub coef: f64,
    pub std_err: f64,
    pub t_value: f64,
    pub p_value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

/// Whole-model OLS diagnostics (statsmodels conventions; `k` counts the intercept).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsSummary {
    pub n_obs: usize,
    pub df_model: usize,
    pub df_resid: usize,
    pub r2: f64,
    pub adj_r2: f64,
    pub f_stat: f64,
    pub f_pvalue: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    /// Intercept first, then one entry per design column.
    pub coefficients: Vec<CoefficientStats>,
}

impl OlsSummary {
    /// Names of non-intercept coefficients whose p-value is below `alpha`.
    pub fn significant(&self, alpha: f64) -> Vec<String> {
        self.coefficients
            .iter()
            .skip(1)
            .filter(|c| c.p_value.is_finite() && c.p_value < alpha)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Machine-readable record of one batch combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationRecord {
    pub layout: String,
    pub bins: Vec<String>,
    pub policy: String,
    pub dependent: DependentVar,
    pub model: String,
    pub model_spec: ModelSpec,
    pub n_obs: usize,
    pub n_train: usize,
    pub n_eval: usize,
    pub n_enacted_locations: usize,
    pub dropped_columns: Vec<String>,
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
    pub alpha: Option<f64>,
    pub metrics: BTreeMap<String, f64>,
    pub summary: Option<OlsSummary>,
    pub significant_bins: Vec<String>,
}

/// Outcome of one batch combination (written to the batch summary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Ok,
    Failed,
}

/// One line of the batch summary file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    pub layout: String,
    pub policy: String,
    pub dependent: DependentVar,
    pub model: String,
    pub status: EntryStatus,
    pub error: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    pub significant_bins: Vec<String>,
}

/// Single-policy OLS result, keyed by policy in the sweep output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFitRecord {
    pub layout: String,
    pub dependent: DependentVar,
    pub n_enacted_locations: usize,
    pub dropped_columns: Vec<String>,
    pub summary: OlsSummary,
    pub significant_bins: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependent_var_column_names_round_trip() {
        for v in DependentVar::ALL {
            assert_eq!(DependentVar::from_column_name(v.column_name()), Some(v));
        }
        assert_eq!(DependentVar::from_column_name("total_population"), None);
    }

    #[test]
    fn model_spec_reads_tagged_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            m: ModelSpec,
        }
        let w: Wrapper = toml::from_str("[m]\nkind = \"lasso\"\nalpha = 0.5\n").unwrap();
        assert_eq!(
            w.m,
            ModelSpec::Lasso {
                alpha: 0.5,
                max_iter: 1000,
                tol: 1e-6
            }
        );
        let w: Wrapper = toml::from_str("[m]\nkind = \"ols\"\n").unwrap();
        assert_eq!(w.m.kind(), ModelKind::Ols);
    }

    #[test]
    fn policy_record_scope() {
        let date = NaiveDate::from_ymd_opt(2020, 4, 1).unwrap();
        let state_rec = PolicyRecord {
            state: "California".to_string(),
            county: "statewide".to_string(),
            fips_code: 6,
            policy_level: PolicyLevel::State,
            policy_type: "shelter in place".to_string(),
            start_stop: StartStop::Start,
            date,
        };
        assert!(state_rec.applies_to("California", "orange"));
        assert!(!state_rec.applies_to("Nevada", "clark"));

        let county_rec = PolicyRecord {
            county: "orange".to_string(),
            policy_level: PolicyLevel::County,
            fips_code: 6059,
            ..state_rec
        };
        assert!(county_rec.applies_to("California", "orange"));
        assert!(!county_rec.applies_to("California", "kern"));
    }

    #[test]
    fn summary_flags_significant_non_intercept_terms() {
        let coef = |name: &str, p: f64| CoefficientStats {
            name: name.to_string(),
            coef: 1.0,
            std_err: 0.1,
            t_value: 10.0,
            p_value: p,
            ci_low: 0.8,
            ci_high: 1.2,
        };
        let summary = OlsSummary {
            n_obs: 10,
            df_model: 2,
            df_resid: 7,
            r2: 0.5,
            adj_r2: 0.4,
            f_stat: 3.0,
            f_pvalue: 0.1,
            log_likelihood: -1.0,
            aic: 8.0,
            bic: 9.0,
            coefficients: vec![coef("const", 0.0), coef("days_0_6", 0.01), coef("days_7_inf", 0.2)],
        };
        assert_eq!(summary.significant(0.05), vec!["days_0_6".to_string()]);
    }
}
