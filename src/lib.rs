//! `policy-impact` library crate.
//!
//! The `pim` binary is a thin wrapper around this library so the cleaning,
//! preparation and regression sweeps can be tested without spawning processes.

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
