//! Cleaning of the raw case timeseries and policy records.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Duration, NaiveDate};

use crate::data::states;
use crate::domain::{CaseRecord, PolicyLevel, PolicyRecord, StartStop};
use crate::error::AppError;
use crate::io::ingest::{RawCaseRow, RawPolicyRow, RowError, parse_date};

/// Rows on or after this date are dropped.
pub fn default_max_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Missing 7-day averages before this date are zero rather than recomputed.
fn rolling_avg_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 30).unwrap_or(NaiveDate::MIN)
}

const EXCLUDED_STATES: [&str; 2] = ["Puerto Rico", "District of Columbia"];

/// Census counts for counties the source leaves without a population.
const KNOWN_POPULATIONS: [(&str, &str, i64); 2] = [("Alaska", "chugach", 7102), ("Alaska", "copper river", 2617)];

const COUNTY_SUFFIXES: [&str; 4] = [" county", " municipality", " city", " borough"];

const POLICY_RENAMES: [(&str, &str); 9] = [
    (
        "Stop Initiation Of Evictions Overall Or Due To Covid Related Issues",
        "Stop Initiation Of Evictions",
    ),
    (
        "Modify Medicaid Requirements With 1135 Waivers Date Of CMS Approval",
        "Modify Medicaid Requirements",
    ),
    (
        "Stop Enforcement Of Evictions Overall Or Due To Covid Related Issues",
        "Stop Enforcement Of Evictions",
    ),
    (
        "Mandate Face Mask Use By All Individuals In Public Facing Businesses",
        "Mandate Face Masks In Businesses",
    ),
    (
        "Mandate Face Mask Use By All Individuals In Public Spaces",
        "Mandate Face Masks In Public Spaces",
    ),
    (
        "Reopened ACA Enrollment Using a Special Enrollment Period",
        "ACA Special Enrollment Period",
    ),
    (
        "Suspended Elective Medical Dental Procedures",
        "Suspend Elective Dental Procedures",
    ),
    (
        "Allow Expand Medicaid Telehealth Coverage",
        "Expand Medicaid Telehealth Coverage",
    ),
    (
        "Renter Grace Period Or Use Of Security Deposit To Pay Rent",
        "Grace Period / Security Deposit for Rent",
    ),
];

const PHASE_POLICIES: [&str; 6] = ["phase 1", "phase 2", "phase 3", "phase 4", "phase 5", "new phase"];

/// Counts of what the cleaning step dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub rows_in: usize,
    pub rows_out: usize,
    /// Reason -> number of rows dropped for it.
    pub dropped: BTreeMap<&'static str, usize>,
    pub recomputed_7day: usize,
}

impl CleanStats {
    fn skip(&mut self, reason: &'static str) {
        *self.dropped.entry(reason).or_default() += 1;
    }

    pub fn log(&self, what: &str) {
        log::info!("{what}: kept {} of {} rows", self.rows_out, self.rows_in);
        for (reason, n) in &self.dropped {
            log::info!("  dropped {n}: {reason}");
        }
        if self.recomputed_7day > 0 {
            log::info!("  recomputed {} missing 7-day averages", self.recomputed_7day);
        }
    }
}

/// Clean the raw case timeseries.
pub fn clean_cases(raw: Vec<RawCaseRow>, max_date: NaiveDate) -> Result<(Vec<CaseRecord>, CleanStats), AppError> {
    let mut stats = CleanStats {
        rows_in: raw.len(),
        ..CleanStats::default()
    };

    // 7-day values stay optional until the gaps are filled per location.
    let mut rows: Vec<(CaseRecord, Option<f64>, Option<f64>)> = Vec::with_capacity(raw.len());
    for r in raw {
        if r.date >= max_date {
            stats.skip("after max date");
            continue;
        }
        if r.location_type != "county" {
            stats.skip("not a county");
            continue;
        }
        if EXCLUDED_STATES.contains(&r.state.as_str()) {
            stats.skip("Puerto Rico / District of Columbia");
            continue;
        }
        let county = r.location_name.to_lowercase();
        let known = KNOWN_POPULATIONS
            .iter()
            .find(|(s, c, _)| *s == r.state && *c == county)
            .map(|(_, _, p)| *p);
        let Some(total_population) = known.or(r.total_population.map(|p| p.round() as i64)).filter(|p| *p > 0) else {
            stats.skip("missing population");
            continue;
        };
        let Some(fips_code) = r.fips_code.map(|f| f.round() as i64) else {
            stats.skip("missing fips code");
            continue;
        };

        let record = CaseRecord {
            date: r.date,
            full_loc_name: format!("{county}, {}", r.state),
            state: r.state,
            county,
            fips_code,
            total_population,
            new_cases: r.new_cases.map(|v| v.round() as i64).unwrap_or(0),
            new_deaths: r.new_deaths.map(|v| v.round() as i64).unwrap_or(0),
            new_cases_1e6: r.new_cases_per_100k.unwrap_or(0.0).max(0.0),
            new_deaths_1e6: r.new_deaths_per_100k.unwrap_or(0.0).max(0.0),
            new_cases_7day: 0.0,
            new_deaths_7day: 0.0,
            new_cases_7day_1e6: 0.0,
            new_deaths_7day_1e6: 0.0,
        };
        let early = r.date < rolling_avg_start();
        let fill = |v: Option<f64>| if early { Some(v.unwrap_or(0.0)) } else { v };
        rows.push((record, fill(r.new_cases_7day), fill(r.new_deaths_7day)));
    }

    rows.sort_by(|a, b| (&a.0.full_loc_name, a.0.date).cmp(&(&b.0.full_loc_name, b.0.date)));

    // Recompute missing 7-day averages as the trailing (date - 7, date] sum / 7.
    let mut start = 0;
    while start < rows.len() {
        let mut end = start + 1;
        while end < rows.len() && rows[end].0.full_loc_name == rows[start].0.full_loc_name {
            end += 1;
        }
        for i in start..end {
            if rows[i].1.is_some() && rows[i].2.is_some() {
                continue;
            }
            let date = rows[i].0.date;
            let (mut cases, mut deaths) = (0i64, 0i64);
            for j in (start..=i).rev() {
                if rows[j].0.date <= date - Duration::days(7) {
                    break;
                }
                cases += rows[j].0.new_cases;
                deaths += rows[j].0.new_deaths;
            }
            if rows[i].1.is_none() {
                rows[i].1 = Some(cases as f64 / 7.0);
                stats.recomputed_7day += 1;
            }
            if rows[i].2.is_none() {
                rows[i].2 = Some(deaths as f64 / 7.0);
                stats.recomputed_7day += 1;
            }
        }
        start = end;
    }

    let out: Vec<CaseRecord> = rows
        .into_iter()
        .map(|(mut rec, cases_7day, deaths_7day)| {
            let per_100k = rec.total_population as f64 / 1e5;
            rec.new_cases_7day = cases_7day.unwrap_or(0.0);
            rec.new_deaths_7day = deaths_7day.unwrap_or(0.0);
            rec.new_cases_7day_1e6 = rec.new_cases_7day / per_100k;
            rec.new_deaths_7day_1e6 = rec.new_deaths_7day / per_100k;
            rec
        })
        .collect();

    if out.is_empty() {
        return Err(AppError::data("No county rows remain after cleaning the case timeseries."));
    }
    stats.rows_out = out.len();
    Ok((out, stats))
}

/// Normalize a raw county name to the timeseries convention.
pub fn normalize_county(raw: Option<&str>) -> String {
    let mut county = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("statewide")
        .to_lowercase();
    for suffix in COUNTY_SUFFIXES {
        if let Some(stripped) = county.strip_suffix(suffix) {
            county = stripped.to_string();
        }
    }
    county
}

/// Shorten a raw policy name and lowercase it.
pub fn normalize_policy_type(raw: &str) -> String {
    let raw = raw.trim();
    let renamed = POLICY_RENAMES
        .iter()
        .find(|(from, _)| *from == raw)
        .map(|(_, to)| *to)
        .unwrap_or(raw);
    renamed.to_lowercase()
}

/// Repair the `0020-` year typo present in some source dates.
fn fix_year_typo(date: &str) -> String {
    match date.strip_prefix("0020") {
        Some(rest) => format!("2020{rest}"),
        None => date.to_string(),
    }
}

/// Clean raw policy records against an already cleaned case timeseries.
///
/// Fails if a county-level record names a county that the timeseries lacks.
pub fn clean_policies(
    raw: Vec<RawPolicyRow>,
    cases: &[CaseRecord],
) -> Result<(Vec<PolicyRecord>, CleanStats, Vec<RowError>), AppError> {
    let (Some(min_date), Some(max_date)) = (
        cases.iter().map(|c| c.date).min(),
        cases.iter().map(|c| c.date).max(),
    ) else {
        return Err(AppError::data("Cannot clean policies against an empty case timeseries."));
    };
    let known_counties: BTreeSet<&str> = cases.iter().map(|c| c.county.as_str()).collect();

    let mut stats = CleanStats {
        rows_in: raw.len(),
        ..CleanStats::default()
    };
    let mut row_errors = Vec::new();
    let mut mismatches = BTreeSet::new();
    let mut out = Vec::new();

    for (idx, r) in raw.into_iter().enumerate() {
        let Some(state) = r.state_id.as_deref().and_then(states::by_abbr) else {
            stats.skip("not one of the 50 states");
            continue;
        };
        let county = normalize_county(r.county.as_deref());
        if county != "statewide" && !known_counties.contains(county.as_str()) {
            mismatches.insert(county);
            continue;
        }

        let parsed = parse_policy_fields(&r, state.fips);
        let (policy_level, start_stop, date, fips_code) = match parsed {
            Ok(v) => v,
            Err(message) => {
                row_errors.push(RowError { line: idx + 1, message });
                stats.skip("unparseable record");
                continue;
            }
        };
        if date < min_date || date > max_date {
            stats.skip("outside the timeseries date range");
            continue;
        }
        let policy_type = normalize_policy_type(r.policy_type.as_deref().unwrap_or_default());
        if policy_type.is_empty() {
            stats.skip("missing policy type");
            continue;
        }
        if PHASE_POLICIES.contains(&policy_type.as_str()) {
            stats.skip("phase policy");
            continue;
        }

        out.push(PolicyRecord {
            state: state.name.to_string(),
            county,
            fips_code,
            policy_level,
            policy_type,
            start_stop,
            date,
        });
    }

    if !mismatches.is_empty() {
        let list: Vec<String> = mismatches.into_iter().collect();
        return Err(AppError::data(format!(
            "Found counties in the policy data that the timeseries lacks: {}",
            list.join(", ")
        )));
    }

    out.sort_by(|a, b| {
        (&a.policy_type, &a.state, &a.county, a.date).cmp(&(&b.policy_type, &b.state, &b.county, b.date))
    });
    stats.rows_out = out.len();
    Ok((out, stats, row_errors))
}

fn parse_policy_fields(r: &RawPolicyRow, state_fips: i64) -> Result<(PolicyLevel, StartStop, NaiveDate, i64), String> {
    let policy_level: PolicyLevel = r
        .policy_level
        .as_deref()
        .ok_or("missing policy_level")?
        .parse()?;
    let start_stop: StartStop = r.start_stop.as_deref().ok_or("missing start_stop")?.parse()?;
    let date = parse_date(&fix_year_typo(r.date.as_deref().ok_or("missing date")?))?;
    let fips_code = match policy_level {
        PolicyLevel::State => state_fips,
        PolicyLevel::County => r
            .fips_code
            .as_deref()
            .and_then(|f| f.trim().parse::<f64>().ok())
            .map(|f| f.round() as i64)
            .ok_or("missing county fips_code")?,
    };
    Ok((policy_level, start_stop, date, fips_code))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw_case(d: NaiveDate, name: &str, state: &str, cases: Option<f64>, avg: Option<f64>) -> RawCaseRow {
        RawCaseRow {
            date: d,
            location_type: "county".to_string(),
            location_name: name.to_string(),
            state: state.to_string(),
            fips_code: Some(1001.0),
            total_population: Some(200_000.0),
            new_cases: cases,
            new_deaths: Some(0.0),
            new_cases_per_100k: Some(-1.0),
            new_deaths_per_100k: None,
            new_cases_7day: avg,
            new_deaths_7day: Some(0.0),
        }
    }

    #[test]
    fn cases_are_filtered_and_normalized() {
        let mut dc = raw_case(date(2020, 5, 1), "Washington", "District of Columbia", Some(1.0), Some(1.0));
        dc.location_type = "county".into();
        let mut state_row = raw_case(date(2020, 5, 1), "Ohio", "Ohio", Some(1.0), Some(1.0));
        state_row.location_type = "state".into();
        let mut chugach = raw_case(date(2020, 5, 1), "Chugach", "Alaska", None, Some(7.0));
        chugach.total_population = None;
        let raw = vec![
            raw_case(date(2020, 5, 1), "Franklin", "Ohio", Some(14.0), Some(7.0)),
            raw_case(date(2022, 1, 5), "Franklin", "Ohio", Some(1.0), Some(1.0)),
            dc,
            state_row,
            chugach,
        ];
        let (rows, stats) = clean_cases(raw, default_max_date()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(stats.dropped.values().sum::<usize>(), 3);

        let chugach = rows.iter().find(|r| r.county == "chugach").unwrap();
        assert_eq!(chugach.total_population, 7102);
        assert_eq!(chugach.new_cases, 0);
        assert_eq!(chugach.full_loc_name, "chugach, Alaska");

        let franklin = rows.iter().find(|r| r.county == "franklin").unwrap();
        assert_eq!(franklin.new_cases_1e6, 0.0);
        assert!((franklin.new_cases_7day_1e6 - 7.0 / 2.0).abs() < 1e-12);
    }

    #[test]
    fn missing_rolling_averages_are_recomputed() {
        let raw = vec![
            raw_case(date(2020, 1, 28), "Kern", "California", Some(70.0), None),
            raw_case(date(2020, 3, 1), "Kern", "California", Some(7.0), Some(1.0)),
            raw_case(date(2020, 3, 5), "Kern", "California", Some(14.0), None),
            raw_case(date(2020, 3, 8), "Kern", "California", Some(21.0), None),
        ];
        let (rows, stats) = clean_cases(raw, default_max_date()).unwrap();
        // Before the cutoff a missing average is zero, not recomputed.
        assert_eq!(rows[0].new_cases_7day, 0.0);
        assert_eq!(rows[1].new_cases_7day, 1.0);
        // (Feb 27, Mar 5] holds Mar 1 and Mar 5.
        assert!((rows[2].new_cases_7day - 21.0 / 7.0).abs() < 1e-12);
        // (Mar 1, Mar 8] excludes Mar 1.
        assert!((rows[3].new_cases_7day - 35.0 / 7.0).abs() < 1e-12);
        assert_eq!(stats.recomputed_7day, 2);
    }

    #[test]
    fn county_and_policy_names_normalize() {
        assert_eq!(normalize_county(Some("Franklin County")), "franklin");
        assert_eq!(normalize_county(Some("Juneau City and Borough")), "juneau city and");
        assert_eq!(normalize_county(Some("Anchorage Municipality")), "anchorage");
        assert_eq!(normalize_county(None), "statewide");
        assert_eq!(
            normalize_policy_type("Mandate Face Mask Use By All Individuals In Public Spaces"),
            "mandate face masks in public spaces"
        );
        assert_eq!(normalize_policy_type("Shelter in Place"), "shelter in place");
    }

    fn case_row(county: &str, state: &str, d: NaiveDate) -> CaseRecord {
        CaseRecord {
            date: d,
            state: state.to_string(),
            county: county.to_string(),
            full_loc_name: format!("{county}, {state}"),
            fips_code: 39049,
            total_population: 100,
            new_cases: 0,
            new_deaths: 0,
            new_cases_1e6: 0.0,
            new_deaths_1e6: 0.0,
            new_cases_7day: 0.0,
            new_deaths_7day: 0.0,
            new_cases_7day_1e6: 0.0,
            new_deaths_7day_1e6: 0.0,
        }
    }

    fn raw_policy(state: &str, county: Option<&str>, level: &str, kind: &str, d: &str) -> RawPolicyRow {
        RawPolicyRow {
            state_id: Some(state.to_string()),
            county: county.map(String::from),
            fips_code: Some("39049".to_string()),
            policy_level: Some(level.to_string()),
            date: Some(d.to_string()),
            policy_type: Some(kind.to_string()),
            start_stop: Some("start".to_string()),
        }
    }

    #[test]
    fn policies_are_cleaned_against_timeseries() {
        let cases = vec![
            case_row("franklin", "Ohio", date(2020, 3, 1)),
            case_row("franklin", "Ohio", date(2020, 12, 31)),
        ];
        let raw = vec![
            raw_policy("OH", Some("Franklin County"), "county", "Shelter in Place", "0020-04-01T00:00:00.000"),
            raw_policy("OH", None, "state", "Phase 2", "2020-05-01"),
            raw_policy("OH", None, "state", "Mandate Face Mask Use By All Individuals In Public Spaces", "2020-07-23"),
            raw_policy("OH", None, "state", "Curfew", "2019-01-01"),
            raw_policy("PR", None, "state", "Curfew", "2020-04-01"),
            raw_policy("OH", None, "bogus", "Curfew", "2020-04-01"),
        ];
        let (rows, stats, errors) = clean_policies(raw, &cases).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(errors.len(), 1);
        assert_eq!(stats.rows_out, 2);

        let mask = rows.iter().find(|r| r.policy_level == PolicyLevel::State).unwrap();
        assert_eq!(mask.policy_type, "mandate face masks in public spaces");
        assert_eq!(mask.fips_code, 39);
        assert_eq!(mask.county, "statewide");
        assert_eq!(mask.state, "Ohio");

        let sip = rows.iter().find(|r| r.policy_level == PolicyLevel::County).unwrap();
        assert_eq!(sip.date, date(2020, 4, 1));
        assert_eq!(sip.county, "franklin");
        assert_eq!(sip.fips_code, 39049);
    }

    #[test]
    fn unknown_counties_are_an_error() {
        let cases = vec![case_row("franklin", "Ohio", date(2020, 3, 1))];
        let raw = vec![raw_policy("OH", Some("Atlantis County"), "county", "Curfew", "2020-03-01")];
        let err = clean_policies(raw, &cases).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_DATA);
        assert!(err.message().contains("atlantis"));
    }
}
