//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - cleaned input rows (`CaseRecord`, `PolicyRecord`)
//! - day-bin layouts (`DayBin`, `BinLayout`)
//! - model/metric dictionary entries (`ModelSpec`, `MetricKind`)
//! - fit outputs (`OlsSummary`, `CombinationRecord`, etc.)

pub mod bins;
pub mod types;

pub use bins::*;
pub use types::*;
