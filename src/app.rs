//! Top-level application orchestration.
//!
//! `src/main.rs` only maps errors to exit codes; this module parses the CLI,
//! sets up logging and the sweep configuration, and dispatches subcommands.

use clap::Parser;
use env_logger::Env;

use crate::cli::{BatchArgs, CleanArgs, Command, FetchArgs, InspectArgs, PlotArgs, PolicyArgs, SynthArgs, ViewArgs};
use crate::config::{SweepConfig, SweepPlan};
use crate::data::fetch::{FetchConfig, FetchStatus, fetch_raw};
use crate::data::inspect::profile_csv;
use crate::data::query::{Location, get_cases, get_policies, in_date_range};
use crate::data::sample::SynthOptions;
use crate::data::Dataset;
use crate::error::AppError;
use crate::plot::{Measure, render_case_plot};

pub mod pipeline;

/// Entry point for the `pim` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Bare `pim` (optionally with global flags) runs the batch sweep.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);
    let config = SweepConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch(args) => handle_fetch(&config, args),
        Command::Clean(args) => handle_clean(&config, args),
        Command::Inspect(args) => handle_inspect(&config, args),
        Command::Synth(args) => handle_synth(&config, args),
        Command::Prepare(args) => handle_prepare(config, args),
        Command::Batch(args) => handle_batch(config, args),
        Command::Sweep(args) => handle_sweep(config, args),
        Command::Plot(args) => handle_plot(&config, args),
        Command::View(args) => handle_view(&config, args),
    }
}

fn handle_fetch(config: &SweepConfig, args: FetchArgs) -> Result<(), AppError> {
    let outcome = fetch_raw(&FetchConfig::from_env(), &config.paths, args.force)?;
    let word = |s: FetchStatus| match s {
        FetchStatus::Downloaded => "downloaded",
        FetchStatus::Reused => "reused",
    };
    println!("cases:    {} ({})", config.paths.raw_cases.display(), word(outcome.cases));
    println!("policies: {} ({})", config.paths.raw_policies.display(), word(outcome.policies));
    Ok(())
}

fn handle_clean(config: &SweepConfig, args: CleanArgs) -> Result<(), AppError> {
    let out = pipeline::run_clean(&config.paths, args.max_date)?;
    println!("{} case rows -> {}", out.n_cases, config.paths.cases.display());
    println!("{} policy records -> {}", out.n_policies, config.paths.policies.display());
    Ok(())
}

fn handle_inspect(config: &SweepConfig, args: InspectArgs) -> Result<(), AppError> {
    let path = args.path.unwrap_or_else(|| config.paths.cases.clone());
    let (rows, profiles) = profile_csv(&path)?;
    println!("{}", path.display());
    print!("{}", crate::report::format_column_profiles(rows, &profiles));
    Ok(())
}

fn handle_synth(config: &SweepConfig, args: SynthArgs) -> Result<(), AppError> {
    let opts = SynthOptions {
        n_states: args.states,
        counties_per_state: args.counties,
        n_days: args.days,
        seed: args.seed,
        noise_sd: args.noise,
        spike_prob: args.spike_prob,
        spike_k: args.spike_k,
        ..SynthOptions::default()
    };
    let out = pipeline::run_synth(&config.paths, &opts)?;
    println!("{} synthetic case rows -> {}", out.n_cases, config.paths.cases.display());
    println!("{} synthetic policy records -> {}", out.n_policies, config.paths.policies.display());
    Ok(())
}

fn handle_prepare(config: SweepConfig, args: PolicyArgs) -> Result<(), AppError> {
    let plan = config.plan()?;
    let written = pipeline::run_prepare(&plan, &args.policies)?;
    println!("{} processed files under {}", written.len(), plan.paths.processed.display());
    Ok(())
}

fn handle_batch(config: SweepConfig, args: BatchArgs) -> Result<(), AppError> {
    let plan = plan_with_overrides(config, args)?;
    let report = pipeline::run_batch_from_disk(&plan)?;
    print!("{}", crate::report::format_batch_report(&report));
    if report.n_ok == 0 {
        return Err(AppError::runtime("Every combination failed to fit."));
    }
    Ok(())
}

fn handle_sweep(config: SweepConfig, args: BatchArgs) -> Result<(), AppError> {
    let plan = plan_with_overrides(config, args)?;
    let report = pipeline::run_sweep_from_disk(&plan)?;
    print!("{}", crate::report::format_sweep_report(&report));
    Ok(())
}

fn plan_with_overrides(mut config: SweepConfig, args: BatchArgs) -> Result<SweepPlan, AppError> {
    if !args.policy.policies.is_empty() {
        config.sweep.policies = args.policy.policies;
    }
    if !args.dependents.is_empty() {
        config.sweep.dependents = args.dependents;
    }
    if let Some(results) = args.results {
        config.paths.results = results;
    }
    config.plan()
}

fn handle_plot(config: &SweepConfig, args: PlotArgs) -> Result<(), AppError> {
    if args.from > args.to {
        return Err(AppError::usage(format!("--from {} is after --to {}.", args.from, args.to)));
    }
    let dataset = Dataset::load(&config.paths)?;
    let loc = Location::new(args.location.level, &args.location.state, &args.location.county);
    let rows = in_date_range(get_cases(&dataset.cases, &loc)?, Some(args.from), Some(args.to));
    let policies = get_policies(&dataset.policies, &loc, &args.policies);
    let measure = if args.deaths { Measure::Deaths } else { Measure::Cases };
    let title = format!("New COVID-19 {} per 100,000 in {}", measure.label(), loc.title());
    print!("{}", render_case_plot(&title, &rows, &policies, measure, args.width, args.height));
    Ok(())
}

fn handle_view(config: &SweepConfig, args: ViewArgs) -> Result<(), AppError> {
    let dataset = Dataset::load(&config.paths)?;
    let loc = Location::new(args.location.level, &args.location.state, &args.location.county);
    crate::tui::run(dataset, loc)
}

const SUBCOMMANDS: [&str; 9] = [
    "fetch", "clean", "inspect", "synth", "prepare", "batch", "sweep", "plot", "view",
];

/// Rewrite argv so bare `pim` runs `pim batch`.
///
/// - `pim`                          -> `pim batch`
/// - `pim --config f.toml`          -> `pim batch --config f.toml`
/// - `pim --config f.toml sweep`    -> unchanged (global flag before the subcommand)
/// - `pim --help/--version/-h`      -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("batch".to_string());
        return argv;
    };
    if matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help") {
        return argv;
    }
    let is_subcommand = argv[1..].iter().any(|a| SUBCOMMANDS.contains(&a.as_str()));
    if is_subcommand {
        return argv;
    }
    if arg1.starts_with('-') {
        argv.insert(1, "batch".to_string());
    }
    argv
}
