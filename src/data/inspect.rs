//! Column profiling for `pim inspect`.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::AppError;
use crate::io::ingest::parse_date;

/// What was observed in one CSV column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub name: String,
    pub nulls: usize,
    /// Any of `int`, `float`, `date`, `str`.
    pub types: BTreeSet<&'static str>,
    /// Only set for purely numeric columns.
    pub negatives: Option<usize>,
    pub all_integral: Option<bool>,
}

#[derive(Default)]
struct Tally {
    nulls: usize,
    types: BTreeSet<&'static str>,
    negatives: usize,
    all_integral: bool,
}

fn classify(value: &str) -> (&'static str, Option<f64>) {
    if let Ok(v) = value.parse::<i64>() {
        return ("int", Some(v as f64));
    }
    if let Ok(v) = value.parse::<f64>() {
        return ("float", Some(v));
    }
    if parse_date(value).is_ok() {
        return ("date", None);
    }
    ("str", None)
}

/// Profile every column of a CSV; returns `(rows_read, profiles)`.
pub fn profile_csv(path: &Path) -> Result<(usize, Vec<ColumnProfile>), AppError> {
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

    let mut tallies: Vec<Tally> = headers
        .iter()
        .map(|_| Tally {
            all_integral: true,
            ..Tally::default()
        })
        .collect();

    let mut rows_read = 0usize;
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            AppError::data(format!("CSV parse error at line {} of '{}': {e}", idx + 2, path.display()))
        })?;
        rows_read += 1;
        for (i, tally) in tallies.iter_mut().enumerate() {
            let value = record.get(i).unwrap_or_default();
            if value.is_empty() || value.eq_ignore_ascii_case("nan") {
                tally.nulls += 1;
                continue;
            }
            let (kind, number) = classify(value);
            tally.types.insert(kind);
            if let Some(v) = number {
                if v < 0.0 {
                    tally.negatives += 1;
                }
                if v.fract() != 0.0 {
                    tally.all_integral = false;
                }
            }
        }
    }

    let profiles = headers
        .iter()
        .zip(tallies)
        .map(|(name, t)| {
            let numeric = !t.types.is_empty() && t.types.iter().all(|k| matches!(*k, "int" | "float"));
            ColumnProfile {
                name: name.trim_start_matches('\u{feff}').to_string(),
                nulls: t.nulls,
                negatives: numeric.then_some(t.negatives),
                all_integral: numeric.then_some(t.all_integral),
                types: t.types,
            }
        })
        .collect();
    Ok((rows_read, profiles))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_mixed_columns() {
        let dir = std::env::temp_dir().join(format!("pim-inspect-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("mixed.csv");
        std::fs::write(
            &path,
            "date,county,new_cases,rate\n\
             2020-04-01,adams,3,1.5\n\
             2020-04-02,,-1,2.0\n\
             2020-04-03,baker,,nan\n",
        )
        .unwrap();

        let (rows, profiles) = profile_csv(&path).unwrap();
        assert_eq!(rows, 3);
        let by_name = |n: &str| profiles.iter().find(|p| p.name == n).unwrap();

        let date = by_name("date");
        assert_eq!(date.types.iter().copied().collect::<Vec<_>>(), vec!["date"]);
        assert_eq!(date.negatives, None);

        let county = by_name("county");
        assert_eq!(county.nulls, 1);
        assert!(county.types.contains("str"));

        let cases = by_name("new_cases");
        assert_eq!(cases.nulls, 1);
        assert_eq!(cases.negatives, Some(1));
        assert_eq!(cases.all_integral, Some(true));

        let rate = by_name("rate");
        assert_eq!(rate.nulls, 1);
        assert_eq!(rate.all_integral, Some(false));

        std::fs::remove_dir_all(&dir).ok();
    }
}
