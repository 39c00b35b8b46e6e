//! CSV/JSON ingest.
//!
//! Raw downloads are read leniently: required columns are checked up front
//! (clear error, exit code 2), then each row is parsed on its own so one bad
//! row is reported and skipped instead of aborting the run. Cleaned files are
//! our own output and are read strictly through serde.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{CaseRecord, PolicyRecord};
use crate::error::AppError;
use crate::io::export::ensure_parent_dir;

/// A row-level problem encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Parsed rows plus what had to be skipped.
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub rows: Vec<T>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl<T> Ingested<T> {
    /// Log a short report of skipped rows.
    pub fn log_row_errors(&self, what: &str) {
        if self.row_errors.is_empty() {
            return;
        }
        log::warn!(
            "{what}: skipped {} of {} rows",
            self.row_errors.len(),
            self.rows_read
        );
        for e in self.row_errors.iter().take(5) {
            log::warn!("  line {}: {}", e.line, e.message);
        }
    }
}

/// One row of the raw county case/death timeseries export.
///
/// Numeric columns are read as floats: the export writes integers as `12.0`
/// and leaves gaps where values are unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCaseRow {
    pub date: NaiveDate,
    pub location_type: String,
    pub location_name: String,
    pub state: String,
    pub fips_code: Option<f64>,
    pub total_population: Option<f64>,
    pub new_cases: Option<f64>,
    pub new_deaths: Option<f64>,
    pub new_cases_per_100k: Option<f64>,
    pub new_deaths_per_100k: Option<f64>,
    pub new_cases_7day: Option<f64>,
    pub new_deaths_7day: Option<f64>,
}

const RAW_CASE_COLUMNS: [&str; 12] = [
    "date",
    "location_type",
    "location_name",
    "state",
    "fips_code",
    "total_population",
    "new_cases",
    "new_deaths",
    "new_cases_per_100_000",
    "new_deaths_per_100_000",
    "new_cases_7_day_rolling_avg",
    "new_deaths_7_day_rolling_avg",
];

/// One raw policy record as served by the Socrata API (every field is text).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPolicyRow {
    pub state_id: Option<String>,
    pub county: Option<String>,
    pub fips_code: Option<String>,
    pub policy_level: Option<String>,
    pub date: Option<String>,
    pub policy_type: Option<String>,
    pub start_stop: Option<String>,
}

/// Read the raw case timeseries CSV.
pub fn read_raw_cases(path: &Path) -> Result<Ingested<RawCaseRow>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::usage(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|e| AppError::usage(format!("Failed to read CSV headers of '{}': {e}", path.display())))?
        .clone();
    let header_map = build_header_map(&headers);
    let missing: Vec<&str> = RAW_CASE_COLUMNS
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::usage(format!(
            "'{}' is missing required columns: {}",
            path.display(),
            missing.join(", ")
        )));
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;
        let parsed = result
            .map_err(|e| format!("CSV parse error: {e}"))
            .and_then(|record| parse_raw_case(&record, &header_map));
        match parsed {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    Ok(Ingested {
        rows,
        row_errors,
        rows_read,
    })
}

fn parse_raw_case(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<RawCaseRow, String> {
    let num = |name: &str| parse_opt_f64(get_optional(record, header_map, name));
    Ok(RawCaseRow {
        date: parse_date(get_required(record, header_map, "date")?)?,
        location_type: get_required(record, header_map, "location_type")?.to_ascii_lowercase(),
        location_name: get_optional(record, header_map, "location_name")
            .unwrap_or_default()
            .to_string(),
        state: get_required(record, header_map, "state")?.to_string(),
        fips_code: num("fips_code"),
        total_population: num("total_population"),
        new_cases: num("new_cases"),
        new_deaths: num("new_deaths"),
        new_cases_per_100k: num("new_cases_per_100_000"),
        new_deaths_per_100k: num("new_deaths_per_100_000"),
        new_cases_7day: num("new_cases_7_day_rolling_avg"),
        new_deaths_7day: num("new_deaths_7_day_rolling_avg"),
    })
}

/// Read raw policy records (a JSON array of objects).
pub fn read_raw_policies(path: &Path) -> Result<Vec<RawPolicyRow>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::usage(format!("Failed to open JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::data(format!("Invalid policy JSON '{}': {e}", path.display())))
}

/// Read a cleaned case timeseries CSV.
pub fn read_cases(path: &Path) -> Result<Vec<CaseRecord>, AppError> {
    read_records(path, "case timeseries")
}

/// Read a cleaned policy CSV.
pub fn read_policies(path: &Path) -> Result<Vec<PolicyRecord>, AppError> {
    read_records(path, "policy")
}

pub fn write_cases(path: &Path, rows: &[CaseRecord]) -> Result<(), AppError> {
    write_records(path, rows)
}

pub fn write_policies(path: &Path, rows: &[PolicyRecord]) -> Result<(), AppError> {
    write_records(path, rows)
}

fn read_records<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::usage(format!(
            "Failed to open {what} CSV '{}': {e} (run `pim clean` first?)",
            path.display()
        ))
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));
    let mut out = Vec::new();
    for (idx, result) in reader.deserialize().enumerate() {
        let row: T = result.map_err(|e| {
            AppError::data(format!("Invalid {what} row at line {} of '{}': {e}", idx + 2, path.display()))
        })?;
        out.push(row);
    }
    if out.is_empty() {
        return Err(AppError::data(format!("{what} CSV '{}' has no rows.", path.display())));
    }
    Ok(out)
}

fn write_records<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::usage(format!("Failed to create CSV '{}': {e}", path.display())))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::usage(format!("Failed to write CSV '{}': {e}", path.display())))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::usage(format!("Failed to write CSV '{}': {e}", path.display())))
}

pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn get_required<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Result<&'a str, String> {
    get_optional(record, header_map, name).ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a date that may carry a time suffix (`2020-03-13T00:00:00.000`).
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    let day = s.trim().get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| format!("Invalid date '{s}' (expected YYYY-MM-DD)."))
}

pub(crate) fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("pim-ingest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn dates_accept_time_suffix() {
        let d = NaiveDate::from_ymd_opt(2020, 3, 13).unwrap();
        assert_eq!(parse_date("2020-03-13"), Ok(d));
        assert_eq!(parse_date("2020-03-13T00:00:00.000"), Ok(d));
        assert!(parse_date("13/03/2020").is_err());
    }

    #[test]
    fn raw_cases_skip_bad_rows() {
        let header = RAW_CASE_COLUMNS.join(",");
        let text = format!(
            "\u{feff}{header}\n\
             2020-04-01,county,Autauga,Alabama,1001.0,55869.0,3.0,,5.3,,1.5,0.0\n\
             not-a-date,county,Autauga,Alabama,1001,55869,3,0,5.3,0,1.5,0\n"
        );
        let path = temp_file("raw_cases.csv", &text);
        let ingested = read_raw_cases(&path).unwrap();
        assert_eq!(ingested.rows_read, 2);
        assert_eq!(ingested.rows.len(), 1);
        assert_eq!(ingested.row_errors[0].line, 3);
        let row = &ingested.rows[0];
        assert_eq!(row.fips_code, Some(1001.0));
        assert_eq!(row.new_deaths, None);
        assert_eq!(row.new_cases_7day, Some(1.5));
    }

    #[test]
    fn raw_cases_require_columns() {
        let path = temp_file("bad_header.csv", "date,state\n2020-01-01,Ohio\n");
        let err = read_raw_cases(&path).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
        assert!(err.message().contains("location_type"));
    }

    #[test]
    fn raw_policies_ignore_extra_fields() {
        let path = temp_file(
            "raw_policies.json",
            r#"[{"state_id":"OH","county":"Franklin County","policy_level":"county",
                 "date":"2020-04-01T00:00:00.000","policy_type":"Shelter in Place",
                 "start_stop":"start","comments":"x","fips_code":"39049"}]"#,
        );
        let rows = read_raw_policies(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state_id.as_deref(), Some("OH"));
        assert_eq!(rows[0].fips_code.as_deref(), Some("39049"));
    }
}
