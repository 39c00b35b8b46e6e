//! Command-line parsing for the policy-impact regression sweep.
//!
//! Argument parsing lives here; `app` turns the parsed commands into calls into
//! the library.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::data::query::Level;
use crate::domain::DependentVar;
use crate::io::ingest::parse_date;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pim", version, about = "COVID-19 policy impact regression sweeps")]
pub struct Cli {
    /// Sweep configuration (TOML). Built-in defaults are used when omitted.
    #[arg(long, global = true, value_name = "TOML")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download the raw case timeseries and policy records.
    Fetch(FetchArgs),
    /// Clean the raw downloads into the case and policy tables.
    Clean(CleanArgs),
    /// Profile the columns of a CSV file.
    Inspect(InspectArgs),
    /// Write a synthetic cleaned dataset with a planted policy effect.
    Synth(SynthArgs),
    /// Write one processed file per (layout, policy).
    Prepare(PolicyArgs),
    /// Fit every layout x policy x dependent x model combination.
    Batch(BatchArgs),
    /// OLS sweep of policies over the processed files.
    Sweep(BatchArgs),
    /// Plot daily cases or deaths per 100k with policy markers.
    Plot(PlotArgs),
    /// Interactive case/death viewer.
    View(ViewArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FetchArgs {
    /// Download even if the raw files already exist.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct CleanArgs {
    /// Keep only rows dated strictly before this day.
    #[arg(long, value_parser = parse_date, default_value = "2021-12-31")]
    pub max_date: NaiveDate,
}

#[derive(Debug, Parser, Clone)]
pub struct InspectArgs {
    /// CSV to profile (defaults to the cleaned case table).
    pub path: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    #[arg(long, default_value_t = 4)]
    pub states: usize,

    #[arg(long, default_value_t = 5)]
    pub counties: usize,

    #[arg(long, default_value_t = 120)]
    pub days: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Daily noise (per 100k).
    #[arg(long, default_value_t = 1.0)]
    pub noise: f64,

    /// Probability that a day is a reporting spike.
    #[arg(long, default_value_t = 0.0)]
    pub spike_prob: f64,

    /// Spike multiplier.
    #[arg(long, default_value_t = 3.0)]
    pub spike_k: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct PolicyArgs {
    /// Policy type to include (repeatable). Overrides the config list.
    #[arg(short = 'p', long = "policy")]
    pub policies: Vec<String>,
}

#[derive(Debug, Parser, Clone)]
pub struct BatchArgs {
    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Dependent variable (repeatable). Overrides the config list.
    #[arg(short = 'd', long = "dependent", value_enum)]
    pub dependents: Vec<DependentVar>,

    /// Results directory. Overrides the config path.
    #[arg(long)]
    pub results: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct LocationArgs {
    #[arg(long, value_enum, default_value_t = Level::County)]
    pub level: Level,

    #[arg(long, default_value = "California")]
    pub state: String,

    #[arg(long, default_value = "orange")]
    pub county: String,
}

#[derive(Debug, Parser, Clone)]
pub struct PlotArgs {
    #[command(flatten)]
    pub location: LocationArgs,

    /// Plot deaths instead of cases.
    #[arg(long)]
    pub deaths: bool,

    #[arg(long, value_parser = parse_date, default_value = "2020-01-01")]
    pub from: NaiveDate,

    #[arg(long, value_parser = parse_date, default_value = "2020-12-31")]
    pub to: NaiveDate,

    /// Only mark these policy types (repeatable).
    #[arg(short = 'p', long = "policy")]
    pub policies: Vec<String>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct ViewArgs {
    #[command(flatten)]
    pub location: LocationArgs,
}
