//! Raw data downloads.
//!
//! Cases come from a data.world CSV export; policy records from the Socrata
//! `healthdata.gov` dataset `gyqz-9u7n`. Both URLs and an optional Socrata app
//! token can be overridden through the environment (`.env` is honored).

use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::Paths;
use crate::error::AppError;
use crate::io::export::{ensure_parent_dir, write_json};
use crate::io::ingest::RawPolicyRow;

pub const DEFAULT_CASES_URL: &str = "https://query.data.world/s/cxcvunxyn7ibkeozhdsuxub27abl7p";
pub const DEFAULT_POLICIES_URL: &str = "https://healthdata.gov/resource/gyqz-9u7n.json";
const POLICY_LIMIT: usize = 10000;

const ENV_CASES_URL: &str = "PIM_CASES_URL";
const ENV_POLICIES_URL: &str = "PIM_POLICIES_URL";
const ENV_APP_TOKEN: &str = "SOCRATA_APP_TOKEN";

#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub cases_url: String,
    pub policies_url: String,
    pub app_token: Option<String>,
}

impl FetchConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            cases_url: non_empty(ENV_CASES_URL).unwrap_or_else(|| DEFAULT_CASES_URL.to_string()),
            policies_url: non_empty(ENV_POLICIES_URL).unwrap_or_else(|| DEFAULT_POLICIES_URL.to_string()),
            app_token: non_empty(ENV_APP_TOKEN),
        }
    }
}

/// What happened to each raw file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Downloaded,
    Reused,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub cases: FetchStatus,
    pub policies: FetchStatus,
    pub n_policy_records: Option<usize>,
}

/// Download both raw files into `paths`, reusing existing ones unless `force`.
pub fn fetch_raw(cfg: &FetchConfig, paths: &Paths, force: bool) -> Result<FetchOutcome, AppError> {
    let need_cases = force || !paths.raw_cases.exists();
    let need_policies = force || !paths.raw_policies.exists();
    if !need_cases {
        log::info!("Using existing {}", paths.raw_cases.display());
    }
    if !need_policies {
        log::info!("Using existing {}", paths.raw_policies.display());
    }
    if !need_cases && !need_policies {
        return Ok(FetchOutcome {
            cases: FetchStatus::Reused,
            policies: FetchStatus::Reused,
            n_policy_records: None,
        });
    }

    let client = Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| AppError::runtime(format!("Failed to build HTTP client: {e}")))?;

    let mut outcome = FetchOutcome {
        cases: FetchStatus::Reused,
        policies: FetchStatus::Reused,
        n_policy_records: None,
    };
    if need_cases {
        download_cases(&client, &cfg.cases_url, &paths.raw_cases)?;
        outcome.cases = FetchStatus::Downloaded;
    }
    if need_policies {
        let n = download_policies(&client, cfg, &paths.raw_policies)?;
        outcome.policies = FetchStatus::Downloaded;
        outcome.n_policy_records = Some(n);
    }
    Ok(outcome)
}

fn download_cases(client: &Client, url: &str, dest: &Path) -> Result<(), AppError> {
    log::info!("Downloading case timeseries from {url}");
    let resp = client
        .get(url)
        .send()
        .map_err(|e| AppError::runtime(format!("Case download failed: {e}")))?;
    if !resp.status().is_success() {
        return Err(AppError::runtime(format!("Case download failed with status {}.", resp.status())));
    }
    let body = resp
        .bytes()
        .map_err(|e| AppError::runtime(format!("Failed to read case download: {e}")))?;
    if body.is_empty() {
        return Err(AppError::data("Case download was empty."));
    }
    ensure_parent_dir(dest)?;
    std::fs::write(dest, &body)
        .map_err(|e| AppError::usage(format!("Failed to write '{}': {e}", dest.display())))?;
    log::info!("Wrote {} bytes to {}", body.len(), dest.display());
    Ok(())
}

fn download_policies(client: &Client, cfg: &FetchConfig, dest: &Path) -> Result<usize, AppError> {
    log::info!("Downloading policy records from {}", cfg.policies_url);
    let mut req = client
        .get(&cfg.policies_url)
        .query(&[("$limit", POLICY_LIMIT.to_string())]);
    if let Some(token) = &cfg.app_token {
        req = req.header("X-App-Token", token);
    }
    let resp = req
        .send()
        .map_err(|e| AppError::runtime(format!("Policy download failed: {e}")))?;
    if !resp.status().is_success() {
        return Err(AppError::runtime(format!("Policy download failed with status {}.", resp.status())));
    }
    let rows: Vec<RawPolicyRow> = resp
        .json()
        .map_err(|e| AppError::data(format!("Failed to parse policy response: {e}")))?;
    if rows.len() == POLICY_LIMIT {
        log::warn!("Policy download hit the {POLICY_LIMIT}-record limit; the result may be truncated.");
    }
    write_json(dest, &rows)?;
    log::info!("Wrote {} policy records to {}", rows.len(), dest.display());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_defaults() {
        let cfg = FetchConfig::from_lookup(|_| None);
        assert_eq!(cfg.cases_url, DEFAULT_CASES_URL);
        assert_eq!(cfg.policies_url, DEFAULT_POLICIES_URL);
        assert_eq!(cfg.app_token, None);

        let env: HashMap<&str, &str> = [
            (ENV_CASES_URL, "http://localhost/cases.csv"),
            (ENV_POLICIES_URL, "  "),
            (ENV_APP_TOKEN, "abc"),
        ]
        .into_iter()
        .collect();
        let cfg = FetchConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.cases_url, "http://localhost/cases.csv");
        assert_eq!(cfg.policies_url, DEFAULT_POLICIES_URL);
        assert_eq!(cfg.app_token.as_deref(), Some("abc"));
    }

    #[test]
    fn existing_files_are_reused_without_network() {
        let dir = std::env::temp_dir().join(format!("pim-fetch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let paths = Paths {
            raw_cases: dir.join("cases.csv"),
            raw_policies: dir.join("policies.json"),
            ..Paths::default()
        };
        std::fs::write(&paths.raw_cases, "date\n").unwrap();
        std::fs::write(&paths.raw_policies, "[]").unwrap();

        let cfg = FetchConfig {
            cases_url: "http://127.0.0.1:9/unreachable".into(),
            policies_url: "http://127.0.0.1:9/unreachable".into(),
            app_token: None,
        };
        let outcome = fetch_raw(&cfg, &paths, false).unwrap();
        assert_eq!(outcome.cases, FetchStatus::Reused);
        assert_eq!(outcome.policies, FetchStatus::Reused);
        std::fs::remove_dir_all(&dir).ok();
    }
}
