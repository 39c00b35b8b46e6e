//! Day-bin layouts for the "days since policy enacted" axis.
//!
//! A layout partitions `[0, ∞)` into contiguous, inclusive integer ranges. Each
//! range becomes one indicator column in the regression design. Offsets before
//! enactment (negative) fall into no bin and are absorbed by the intercept.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// One inclusive day range. `hi = None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayBin {
    pub lo: i64,
    pub hi: Option<i64>,
}

impl DayBin {
    pub fn contains(&self, days: i64) -> bool {
        days >= self.lo && self.hi.is_none_or(|hi| days <= hi)
    }

    /// Indicator column name, e.g. `days_0_6` or `days_60_inf`.
    pub fn column_name(&self) -> String {
        match self.hi {
            Some(hi) => format!("days_{}_{}", self.lo, hi),
            None => format!("days_{}_inf", self.lo),
        }
    }

    /// Inverse of [`DayBin::column_name`].
    pub fn from_column_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("days_")?;
        let (lo, hi) = rest.split_once('_')?;
        let lo = lo.parse().ok()?;
        let hi = match hi {
            "inf" => None,
            other => Some(other.parse().ok()?),
        };
        Some(Self { lo, hi })
    }
}

impl fmt::Display for DayBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.hi {
            Some(hi) => write!(f, "{}-{}", self.lo, hi),
            None => write!(f, "{}-inf", self.lo),
        }
    }
}

impl FromStr for DayBin {
    type Err = AppError;

    /// Parse `"7-13"` or `"60-inf"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (lo, hi) = trimmed
            .split_once('-')
            .ok_or_else(|| AppError::usage(format!("Invalid bin '{trimmed}': expected '<lo>-<hi>' or '<lo>-inf'.")))?;
        let lo: i64 = lo
            .trim()
            .parse()
            .map_err(|e| AppError::usage(format!("Invalid bin start in '{trimmed}': {e}")))?;
        let hi = match hi.trim().to_ascii_lowercase().as_str() {
            "inf" | "" => None,
            other => Some(
                other
                    .parse::<i64>()
                    .map_err(|e| AppError::usage(format!("Invalid bin end in '{trimmed}': {e}")))?,
            ),
        };
        Ok(DayBin { lo, hi })
    }
}

/// A named, validated partition of `[0, ∞)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinLayout {
    name: String,
    bins: Vec<DayBin>,
}

impl BinLayout {
    /// Build a layout, rejecting anything that does not tile `[0, ∞)` exactly.
    pub fn new(name: impl Into<String>, bins: Vec<DayBin>) -> Result<Self, AppError> {
        let name = name.into();
        if bins.is_empty() {
            return Err(AppError::usage(format!("Bin layout '{name}' has no bins.")));
        }
        if bins[0].lo != 0 {
            return Err(AppError::usage(format!(
                "Bin layout '{name}' must start at day 0 (starts at {}).",
                bins[0].lo
            )));
        }
        for (i, bin) in bins.iter().enumerate() {
            let is_last = i + 1 == bins.len();
            match bin.hi {
                Some(hi) if hi < bin.lo => {
                    return Err(AppError::usage(format!("Bin layout '{name}': bin {bin} ends before it starts.")));
                }
                Some(hi) => {
                    if is_last {
                        return Err(AppError::usage(format!(
                            "Bin layout '{name}': last bin {bin} must be open-ended (use '{}-inf').",
                            bin.lo
                        )));
                    }
                    let next = bins[i + 1];
                    if hi.checked_add(1) != Some(next.lo) {
                        let problem = if next.lo <= hi { "overlaps" } else { "leaves a gap before" };
                        return Err(AppError::usage(format!("Bin layout '{name}': bin {bin} {problem} bin {next}.")));
                    }
                }
                None => {
                    if !is_last {
                        return Err(AppError::usage(format!(
                            "Bin layout '{name}': open-ended bin {bin} must be the last bin."
                        )));
                    }
                }
            }
        }
        Ok(Self { name, bins })
    }

    /// Parse a layout from its text form, e.g. `["0-6", "7-13", "14-inf"]`.
    pub fn parse<S: AsRef<str>>(name: impl Into<String>, specs: &[S]) -> Result<Self, AppError> {
        let bins = specs
            .iter()
            .map(|s| s.as_ref().parse::<DayBin>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(name, bins)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bins(&self) -> &[DayBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Index of the unique bin containing `days`, or `None` before enactment.
    pub fn locate(&self, days: i64) -> Option<usize> {
        if days < 0 {
            return None;
        }
        // Bins are sorted and contiguous, so the first bin whose end is >= days wins.
        self.bins.iter().position(|b| b.contains(days))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.bins.iter().map(DayBin::column_name).collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.bins.iter().map(DayBin::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_locates() {
        let layout = BinLayout::parse("weekly", &["0-6", "7-13", "14-inf"]).unwrap();
        assert_eq!(layout.len(), 3);
        assert_eq!(layout.locate(-1), None);
        assert_eq!(layout.locate(0), Some(0));
        assert_eq!(layout.locate(6), Some(0));
        assert_eq!(layout.locate(7), Some(1));
        assert_eq!(layout.locate(13), Some(1));
        assert_eq!(layout.locate(14), Some(2));
        assert_eq!(layout.locate(10_000), Some(2));
        assert_eq!(layout.column_names(), vec!["days_0_6", "days_7_13", "days_14_inf"]);
        assert_eq!(layout.labels(), vec!["0-6", "7-13", "14-inf"]);
    }

    #[test]
    fn rejects_overlap_gap_and_closed_tail() {
        assert!(BinLayout::parse("overlap", &["0-6", "6-inf"]).is_err());
        assert!(BinLayout::parse("gap", &["0-6", "8-inf"]).is_err());
        assert!(BinLayout::parse("closed", &["0-6", "7-13"]).is_err());
        assert!(BinLayout::parse("late_start", &["1-6", "7-inf"]).is_err());
        assert!(BinLayout::parse("open_middle", &["0-inf", "7-inf"]).is_err());
        assert!(BinLayout::parse("backwards", &["0-6", "7-3", "4-inf"]).is_err());
        assert!(BinLayout::parse::<&str>("empty", &[]).is_err());
        assert!(BinLayout::parse("garbage", &["zero-six"]).is_err());
    }

    #[test]
    fn column_names_parse_back() {
        assert_eq!(DayBin::from_column_name("days_7_13"), Some(DayBin { lo: 7, hi: Some(13) }));
        assert_eq!(DayBin::from_column_name("days_60_inf"), Some(DayBin { lo: 60, hi: None }));
        assert_eq!(DayBin::from_column_name("days_since_policy"), None);
        assert_eq!(DayBin::from_column_name("new_cases"), None);
    }

    #[test]
    fn single_open_bin_is_valid() {
        let layout = BinLayout::parse("ever", &["0-inf"]).unwrap();
        assert_eq!(layout.locate(0), Some(0));
        assert_eq!(layout.column_names(), vec!["days_0_inf"]);
    }

    #[test]
    fn bin_ending_at_the_largest_day_is_rejected() {
        let max = i64::MAX;
        let err = BinLayout::parse("huge", &[format!("0-{max}"), format!("{max}-inf")]).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
        assert!(BinLayout::parse("huge_tail", &[format!("0-{max}")]).is_err());
    }
}
