//! Synthetic cleaned datasets with a planted policy effect.
//!
//! Used by `pim synth` for demos and by tests. Every county shares one baseline
//! daily rate (per 100k). One policy, `mask mandate`, lowers that rate by a
//! fixed amount per week-since-enactment bin; the other, `stay at home`, has no
//! effect. Gaussian noise plus occasional reporting spikes (backlogs dumped on
//! a single day) make the series look like the real export.

use chrono::{Duration, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::states::STATES;
use crate::domain::{CaseRecord, PolicyLevel, PolicyRecord, StartStop};
use crate::error::AppError;

pub const EFFECT_POLICY: &str = "mask mandate";
pub const NULL_POLICY: &str = "stay at home";

/// Bins the planted effect is defined on (inclusive day ranges, open tail).
pub const PLANTED_BINS: [&str; 3] = ["0-6", "7-13", "14-inf"];

const COUNTY_NAMES: [&str; 10] = [
    "adams", "baker", "clark", "dawson", "elm", "fulton", "grant", "hayes", "irwin", "jasper",
];

#[derive(Debug, Clone)]
pub struct SynthOptions {
    pub n_states: usize,
    pub counties_per_state: usize,
    pub n_days: usize,
    pub start: NaiveDate,
    pub seed: u64,
    pub pop_min: i64,
    pub pop_max: i64,
    /// Daily new cases per 100k absent any policy.
    pub baseline_rate: f64,
    /// Change in the daily rate for each of `PLANTED_BINS` after `mask mandate`.
    pub effects: [f64; 3],
    pub noise_sd: f64,
    /// Probability that a day's count is a reporting spike.
    pub spike_prob: f64,
    pub spike_k: f64,
    pub death_rate: f64,
}

impl Default for SynthOptions {
    fn default() -> Self {
        Self {
            n_states: 4,
            counties_per_state: 5,
            n_days: 120,
            start: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap_or(NaiveDate::MIN),
            seed: 42,
            pop_min: 100_000,
            pop_max: 800_000,
            baseline_rate: 20.0,
            effects: [-2.0, -4.0, -6.0],
            noise_sd: 1.0,
            spike_prob: 0.0,
            spike_k: 3.0,
            death_rate: 0.015,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthData {
    pub cases: Vec<CaseRecord>,
    pub policies: Vec<PolicyRecord>,
}

pub fn generate_synthetic(opts: &SynthOptions) -> Result<SynthData, AppError> {
    if opts.n_states == 0 || opts.n_states > STATES.len() {
        return Err(AppError::usage(format!("n_states must be in 1..={} (got {}).", STATES.len(), opts.n_states)));
    }
    if opts.counties_per_state == 0 || opts.n_days < 21 {
        return Err(AppError::usage("Need at least one county per state and 21 days."));
    }
    if !(opts.pop_min > 0 && opts.pop_max >= opts.pop_min) {
        return Err(AppError::usage("Invalid population range."));
    }
    if !(0.0..1.0).contains(&opts.spike_prob) {
        return Err(AppError::usage("spike_prob must be in [0, 1)."));
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let noise = Normal::new(0.0, opts.noise_sd)
        .map_err(|e| AppError::usage(format!("Noise distribution error: {e}")))?;

    let policies = synth_policies(opts);
    let mut cases = Vec::with_capacity(opts.n_states * opts.counties_per_state * opts.n_days);

    for (s, state) in STATES.iter().take(opts.n_states).enumerate() {
        for c in 0..opts.counties_per_state {
            let county = county_name(c);
            let population = rng.gen_range(opts.pop_min..=opts.pop_max);
            let per_100k = population as f64 / 1e5;
            let enacted = mask_enactment_day(s, c);

            let mut daily: Vec<i64> = Vec::with_capacity(opts.n_days);
            for day in 0..opts.n_days {
                let effect = enacted
                    .filter(|&e| day >= e)
                    .map(|e| opts.effects[planted_bin(day - e)])
                    .unwrap_or(0.0);
                let mut rate = (opts.baseline_rate + effect + noise.sample(&mut rng)).max(0.0);
                if opts.spike_prob > 0.0 && rng.gen_bool(opts.spike_prob) {
                    rate *= opts.spike_k;
                }
                let new_cases = (rate * per_100k).round() as i64;
                daily.push(new_cases);

                let window = &daily[daily.len().saturating_sub(7)..];
                let cases_7day = window.iter().sum::<i64>() as f64 / 7.0;
                let new_deaths = (new_cases as f64 * opts.death_rate).round() as i64;
                let deaths_7day = cases_7day * opts.death_rate;

                cases.push(CaseRecord {
                    date: opts.start + Duration::days(day as i64),
                    state: state.name.to_string(),
                    county: county.clone(),
                    full_loc_name: format!("{county}, {}", state.name),
                    fips_code: state.fips * 1000 + c as i64 + 1,
                    total_population: population,
                    new_cases,
                    new_deaths,
                    new_cases_1e6: new_cases as f64 / per_100k,
                    new_deaths_1e6: new_deaths as f64 / per_100k,
                    new_cases_7day: cases_7day,
                    new_deaths_7day: deaths_7day,
                    new_cases_7day_1e6: cases_7day / per_100k,
                    new_deaths_7day_1e6: deaths_7day / per_100k,
                });
            }
        }
    }

    Ok(SynthData { cases, policies })
}

fn county_name(c: usize) -> String {
    let base = COUNTY_NAMES[c % COUNTY_NAMES.len()];
    if c < COUNTY_NAMES.len() {
        base.to_string()
    } else {
        format!("{base} {}", c / COUNTY_NAMES.len() + 1)
    }
}

fn planted_bin(days: usize) -> usize {
    match days {
        0..=6 => 0,
        7..=13 => 1,
        _ => 2,
    }
}

/// Even-indexed states mandate masks statewide; odd ones only in their first county.
fn mask_enactment_day(state_idx: usize, county_idx: usize) -> Option<usize> {
    if state_idx % 2 == 0 {
        Some(10 + state_idx % 5)
    } else if county_idx == 0 {
        Some(12)
    } else {
        None
    }
}

fn synth_policies(opts: &SynthOptions) -> Vec<PolicyRecord> {
    let day = |d: usize| opts.start + Duration::days(d as i64);
    let mut out = Vec::new();
    for (s, state) in STATES.iter().take(opts.n_states).enumerate() {
        let statewide = |kind: &str, ss: StartStop, d: usize| PolicyRecord {
            state: state.name.to_string(),
            county: "statewide".to_string(),
            fips_code: state.fips,
            policy_level: PolicyLevel::State,
            policy_type: kind.to_string(),
            start_stop: ss,
            date: day(d),
        };
        out.push(statewide(NULL_POLICY, StartStop::Start, 8));
        out.push(statewide(NULL_POLICY, StartStop::Stop, 8 + opts.n_days / 2));

        match mask_enactment_day(s, 0) {
            Some(d) if s % 2 == 0 => out.push(statewide(EFFECT_POLICY, StartStop::Start, d)),
            Some(d) => out.push(PolicyRecord {
                state: state.name.to_string(),
                county: county_name(0),
                fips_code: state.fips * 1000 + 1,
                policy_level: PolicyLevel::County,
                policy_type: EFFECT_POLICY.to_string(),
                start_stop: StartStop::Start,
                date: day(d),
            }),
            None => {}
        }
    }
    out
}
