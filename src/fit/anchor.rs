//! Policy anchoring: "days since policy enacted" for every case row.
//!
//! A county's enactment date for a policy type is the earliest `start` record
//! that governs it, whether issued by the county itself or by its state.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::domain::{CaseRecord, PolicyLevel, PolicyRecord, StartStop};

/// Earliest start dates for one policy type, by issuing jurisdiction.
#[derive(Debug, Clone, Default)]
pub struct Enactments {
    by_state: HashMap<String, NaiveDate>,
    by_county: HashMap<(String, String), NaiveDate>,
}

impl Enactments {
    pub fn for_policy(policies: &[PolicyRecord], policy_type: &str) -> Self {
        let mut out = Self::default();
        for rec in policies
            .iter()
            .filter(|p| p.policy_type == policy_type && p.start_stop == StartStop::Start)
        {
            let slot = match rec.policy_level {
                PolicyLevel::State => out.by_state.entry(rec.state.clone()).or_insert(rec.date),
                PolicyLevel::County => out
                    .by_county
                    .entry((rec.state.clone(), rec.county.clone()))
                    .or_insert(rec.date),
            };
            *slot = (*slot).min(rec.date);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.by_state.is_empty() && self.by_county.is_empty()
    }

    /// Enactment date for a county, if the policy ever applied to it.
    pub fn enactment(&self, state: &str, county: &str) -> Option<NaiveDate> {
        let state_date = self.by_state.get(state).copied();
        let county_date = self.by_county.get(&(state.to_string(), county.to_string())).copied();
        match (state_date, county_date) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Per-row offsets for one policy, aligned with the case rows they came from.
#[derive(Debug, Clone)]
pub struct PolicyOffsets {
    pub policy: String,
    /// `None` where the policy was never enacted for that county.
    pub days: Vec<Option<i64>>,
    pub n_enacted_locations: usize,
}

/// Whole days between enactment and `date` (negative before enactment).
pub fn days_since(date: NaiveDate, enacted: NaiveDate) -> i64 {
    (date - enacted).num_days()
}

/// Compute the offset of every case row relative to `policy`'s enactment.
pub fn policy_offsets(cases: &[CaseRecord], policies: &[PolicyRecord], policy: &str) -> PolicyOffsets {
    let enactments = Enactments::for_policy(policies, policy);
    let mut cache: HashMap<(&str, &str), Option<NaiveDate>> = HashMap::new();
    let days = cases
        .iter()
        .map(|row| {
            let enacted = *cache
                .entry((row.state.as_str(), row.county.as_str()))
                .or_insert_with(|| enactments.enactment(&row.state, &row.county));
            enacted.map(|d| days_since(row.date, d))
        })
        .collect();
    let n_enacted_locations = cache.values().filter(|d| d.is_some()).count();
    PolicyOffsets {
        policy: policy.to_string(),
        days,
        n_enacted_locations,
    }
}

/// Distinct policy types, sorted.
pub fn policy_types(policies: &[PolicyRecord]) -> Vec<String> {
    policies
        .iter()
        .map(|p| p.policy_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Number of distinct counties in `cases` that `policy` was ever enacted for.
pub fn enacted_location_count(cases: &[CaseRecord], policies: &[PolicyRecord], policy: &str) -> usize {
    let enactments = Enactments::for_policy(policies, policy);
    if enactments.is_empty() {
        return 0;
    }
    cases
        .iter()
        .map(|r| (r.state.as_str(), r.county.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter(|(s, c)| enactments.enactment(s, c).is_some())
        .count()
}

/// Resolve the policies to sweep.
///
/// An empty `requested` list means every policy type present. Policies enacted
/// in fewer than `min_enacted_locations` counties are skipped with a warning.
pub fn sweepable_policies(
    cases: &[CaseRecord],
    policies: &[PolicyRecord],
    requested: &[String],
    min_enacted_locations: usize,
) -> Vec<String> {
    let candidates = if requested.is_empty() {
        policy_types(policies)
    } else {
        requested.to_vec()
    };
    candidates
        .into_iter()
        .filter(|policy| {
            let n = enacted_location_count(cases, policies, policy);
            if n < min_enacted_locations {
                log::warn!("Skipping policy '{policy}': enacted in {n} counties (need {min_enacted_locations}).");
                return false;
            }
            true
        })
        .collect()
}
