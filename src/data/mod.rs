//! Data acquisition and preparation.
//!
//! - raw downloads (`fetch`)
//! - cleaning raw case/policy exports (`clean`)
//! - column profiling (`inspect`)
//! - per-policy processed files (`prepare`)
//! - county/state/national lookups (`query`)
//! - synthetic datasets (`sample`)
//! - US state reference table (`states`)

pub mod clean;
pub mod fetch;
pub mod inspect;
pub mod prepare;
pub mod query;
pub mod sample;
pub mod states;

pub use clean::*;
pub use fetch::*;
pub use inspect::*;
pub use prepare::*;
pub use query::*;
pub use sample::*;
pub use states::*;

use crate::config::Paths;
use crate::domain::{CaseRecord, PolicyRecord};
use crate::error::AppError;
use crate::io::ingest::{read_cases, read_policies};

/// Cleaned cases and policies, loaded once per run.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub cases: Vec<CaseRecord>,
    pub policies: Vec<PolicyRecord>,
}

impl Dataset {
    pub fn load(paths: &Paths) -> Result<Self, AppError> {
        let cases = read_cases(&paths.cases)?;
        let policies = read_policies(&paths.policies)?;
        log::info!(
            "Loaded {} case rows from {} and {} policy records from {}",
            cases.len(),
            paths.cases.display(),
            policies.len(),
            paths.policies.display()
        );
        Ok(Self { cases, policies })
    }
}
