//! Lookups over the cleaned tables used by `plot` and `view`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use clap::ValueEnum;

use crate::domain::{CaseRecord, PolicyLevel, PolicyRecord};
use crate::error::AppError;

/// Aggregation level for case series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Level {
    #[default]
    County,
    State,
    National,
}

impl Level {
    pub fn next(self) -> Self {
        match self {
            Level::County => Level::State,
            Level::State => Level::National,
            Level::National => Level::County,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::County => "county",
            Level::State => "state",
            Level::National => "national",
        })
    }
}

/// A county, state, or the whole country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub level: Level,
    pub state: String,
    pub county: String,
}

impl Location {
    pub fn new(level: Level, state: &str, county: &str) -> Self {
        Self {
            level,
            state: state.to_string(),
            county: county.trim().to_lowercase(),
        }
    }

    pub fn title(&self) -> String {
        match self.level {
            Level::County => format!("{} County, {}", self.county, self.state),
            Level::State => self.state.clone(),
            Level::National => "the United States".to_string(),
        }
    }
}

/// Daily rows for `loc`, sorted by date.
///
/// County rows are returned as stored. State and national rows sum counts,
/// 7-day averages and populations per date, then recompute the per-100k
/// columns from the summed population.
pub fn get_cases(cases: &[CaseRecord], loc: &Location) -> Result<Vec<CaseRecord>, AppError> {
    let selected: Vec<&CaseRecord> = cases
        .iter()
        .filter(|r| match loc.level {
            Level::County => r.state == loc.state && r.county == loc.county,
            Level::State => r.state == loc.state,
            Level::National => true,
        })
        .collect();
    if selected.is_empty() {
        return Err(AppError::usage(format!("No case data for {}.", loc.title())));
    }

    if loc.level == Level::County {
        let mut rows: Vec<CaseRecord> = selected.into_iter().cloned().collect();
        rows.sort_by_key(|r| r.date);
        return Ok(rows);
    }

    let (state, label) = match loc.level {
        Level::State => (loc.state.clone(), loc.state.clone()),
        _ => ("United States".to_string(), "United States".to_string()),
    };
    let mut by_date: BTreeMap<NaiveDate, CaseRecord> = BTreeMap::new();
    for r in selected {
        let acc = by_date.entry(r.date).or_insert_with(|| CaseRecord {
            date: r.date,
            state: state.clone(),
            county: "all".to_string(),
            full_loc_name: label.clone(),
            fips_code: 0,
            total_population: 0,
            new_cases: 0,
            new_deaths: 0,
            new_cases_1e6: 0.0,
            new_deaths_1e6: 0.0,
            new_cases_7day: 0.0,
            new_deaths_7day: 0.0,
            new_cases_7day_1e6: 0.0,
            new_deaths_7day_1e6: 0.0,
        });
        acc.total_population += r.total_population;
        acc.new_cases += r.new_cases;
        acc.new_deaths += r.new_deaths;
        acc.new_cases_7day += r.new_cases_7day;
        acc.new_deaths_7day += r.new_deaths_7day;
    }

    Ok(by_date
        .into_values()
        .map(|mut r| {
            let per = r.total_population as f64 / 1e5;
            if per > 0.0 {
                r.new_cases_1e6 = (r.new_cases as f64 / per).max(0.0);
                r.new_deaths_1e6 = (r.new_deaths as f64 / per).max(0.0);
                r.new_cases_7day_1e6 = r.new_cases_7day / per;
                r.new_deaths_7day_1e6 = r.new_deaths_7day / per;
            }
            r
        })
        .collect())
}

/// Keep rows with `from <= date <= to`.
pub fn in_date_range(rows: Vec<CaseRecord>, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Vec<CaseRecord> {
    rows.into_iter()
        .filter(|r| from.is_none_or(|d| r.date >= d) && to.is_none_or(|d| r.date <= d))
        .collect()
}

/// Policy records relevant to `loc`, sorted by date then type.
///
/// Counties see their own and their state's records, states see only
/// state-level records, and the national view has none.
pub fn get_policies<'a>(policies: &'a [PolicyRecord], loc: &Location, types: &[String]) -> Vec<&'a PolicyRecord> {
    let mut out: Vec<&PolicyRecord> = policies
        .iter()
        .filter(|p| types.is_empty() || types.contains(&p.policy_type))
        .filter(|p| match loc.level {
            Level::County => p.applies_to(&loc.state, &loc.county),
            Level::State => p.state == loc.state && p.policy_level == PolicyLevel::State,
            Level::National => false,
        })
        .collect();
    out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.policy_type.cmp(&b.policy_type)));
    out
}

/// Every (state, county) pair present in the timeseries, sorted.
pub fn list_counties(cases: &[CaseRecord]) -> Vec<(String, String)> {
    cases
        .iter()
        .map(|r| (r.state.clone(), r.county.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{EFFECT_POLICY, NULL_POLICY, SynthOptions, generate_synthetic};

    fn synth() -> crate::data::sample::SynthData {
        generate_synthetic(&SynthOptions {
            n_states: 2,
            counties_per_state: 3,
            n_days: 30,
            ..SynthOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn state_level_sums_counts_and_recomputes_rates() {
        let data = synth();
        let loc = Location::new(Level::State, "Alabama", "");
        let rows = get_cases(&data.cases, &loc).unwrap();
        assert_eq!(rows.len(), 30);

        let day0: Vec<&CaseRecord> = data
            .cases
            .iter()
            .filter(|r| r.state == "Alabama" && r.date == rows[0].date)
            .collect();
        let pop: i64 = day0.iter().map(|r| r.total_population).sum();
        let cases: i64 = day0.iter().map(|r| r.new_cases).sum();
        assert_eq!(rows[0].total_population, pop);
        assert_eq!(rows[0].new_cases, cases);
        assert!((rows[0].new_cases_1e6 - cases as f64 / (pop as f64 / 1e5)).abs() < 1e-9);
    }

    #[test]
    fn national_level_covers_every_county() {
        let data = synth();
        let rows = get_cases(&data.cases, &Location::new(Level::National, "", "")).unwrap();
        let total: i64 = data.cases.iter().map(|r| r.new_cases).sum();
        assert_eq!(rows.iter().map(|r| r.new_cases).sum::<i64>(), total);
    }

    #[test]
    fn county_lookup_and_policies() {
        let data = synth();
        let loc = Location::new(Level::County, "Alaska", "Adams");
        let rows = get_cases(&data.cases, &loc).unwrap();
        assert_eq!(rows.len(), 30);
        assert!(rows.windows(2).all(|w| w[0].date < w[1].date));

        let types: Vec<String> = Vec::new();
        let policies = get_policies(&data.policies, &loc, &types);
        // Statewide stay-at-home start/stop plus the county-level mask mandate.
        assert_eq!(policies.len(), 3);
        assert!(policies.iter().any(|p| p.policy_type == EFFECT_POLICY));

        let state_only = get_policies(&data.policies, &Location::new(Level::State, "Alaska", ""), &types);
        assert!(state_only.iter().all(|p| p.policy_type == NULL_POLICY));

        let missing = Location::new(Level::County, "Alaska", "nowhere");
        assert!(get_cases(&data.cases, &missing).is_err());
    }

    #[test]
    fn date_range_is_inclusive() {
        let data = synth();
        let rows = get_cases(&data.cases, &Location::new(Level::County, "Alabama", "adams")).unwrap();
        let from = rows[5].date;
        let to = rows[9].date;
        assert_eq!(in_date_range(rows, Some(from), Some(to)).len(), 5);
    }

    #[test]
    fn counties_are_listed_once() {
        let data = synth();
        let list = list_counties(&data.cases);
        assert_eq!(list.len(), 6);
        assert_eq!(list[0], ("Alabama".to_string(), "adams".to_string()));
    }
}
