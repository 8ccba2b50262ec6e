//! Job display filters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::job::Job;
use crate::store::keys;

/// Tiers shown when no tier filter is given.
pub const DEFAULT_TIERS: [i32; 2] = [1, 2];

/// Every status a job can display as.
pub const ALL_RESULT_STATUSES: [&str; 10] = [
    "testfailed",
    "busted",
    "exception",
    "success",
    "retry",
    "usercancel",
    "superseded",
    "running",
    "pending",
    "unknown",
];

/// Predicate collaborator used by the store to compute derived counters.
///
/// Implementations must be pure: the store recomputes its counters whenever
/// it is told the filter changed, not when the predicate's answer drifts.
pub trait JobFilter: Send + Sync {
    /// Whether jobs of this tier count at all.
    fn is_tier_shown(&self, tier: i32) -> bool;

    /// Whether the job passes every active display filter.
    fn show_job(&self, job: &Job) -> bool;
}

/// Job field a [`FieldFilter`] inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Platform,
    JobGroupName,
    JobGroupSymbol,
    JobTypeName,
    JobTypeSymbol,
    Tier,
}

/// How a [`FieldFilter`] compares its values against the job field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Field contains any of the values.
    Substr,
    /// Field equals one of the values.
    Exact,
}

/// A filter on one job field. Values are compared lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: FilterField,
    pub match_type: MatchType,
    pub values: Vec<String>,
}

impl FieldFilter {
    fn field_value(&self, job: &Job) -> String {
        match self.field {
            FilterField::Platform => format!(
                "{} {}",
                keys::platform_display_name(&job.platform),
                job.platform_option
            ),
            FilterField::JobGroupName => job.job_group_name.clone(),
            FilterField::JobGroupSymbol => job.job_group_symbol.clone(),
            FilterField::JobTypeName => job.job_type_name.clone(),
            FilterField::JobTypeSymbol => job.job_type_symbol.clone(),
            FilterField::Tier => job.tier.to_string(),
        }
        .to_lowercase()
    }

    pub fn matches(&self, job: &Job) -> bool {
        let value = self.field_value(job);
        match self.match_type {
            MatchType::Substr => self
                .values
                .iter()
                .any(|v| value.contains(&v.to_lowercase())),
            MatchType::Exact => self.values.iter().any(|v| value == v.to_lowercase()),
        }
    }
}

/// The concrete filter set driven by the dashboard's filter controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub tiers: BTreeSet<i32>,
    pub result_statuses: BTreeSet<String>,
    pub show_classified: bool,
    pub show_unclassified: bool,
    #[serde(default)]
    pub fields: Vec<FieldFilter>,
    /// Whitespace-separated terms that must all appear in the job's search string.
    #[serde(default)]
    pub search: Option<String>,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_TIERS.into_iter().collect(),
            result_statuses: ALL_RESULT_STATUSES.iter().map(|s| s.to_string()).collect(),
            show_classified: true,
            show_unclassified: true,
            fields: Vec::new(),
            search: None,
        }
    }
}

impl FilterSet {
    /// Only unclassified failures: the "unclassified failures" toggle.
    pub fn unclassified_failures() -> Self {
        Self {
            result_statuses: ["testfailed", "busted", "exception"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            show_classified: false,
            ..Self::default()
        }
    }

    pub fn with_tiers(mut self, tiers: impl IntoIterator<Item = i32>) -> Self {
        self.tiers = tiers.into_iter().collect();
        self
    }

    pub fn with_field(mut self, field: FilterField, match_type: MatchType, values: &[&str]) -> Self {
        self.fields.push(FieldFilter {
            field,
            match_type,
            values: values.iter().map(|v| v.to_lowercase()).collect(),
        });
        self
    }

    pub fn with_search(mut self, search: &str) -> Self {
        self.search = Some(search.to_lowercase());
        self
    }

    fn check_classified_state(&self, job: &Job) -> bool {
        if job.is_classified() {
            self.show_classified
        } else {
            self.show_unclassified
        }
    }

    fn check_search(&self, job: &Job) -> bool {
        let Some(search) = self.search.as_deref() else {
            return true;
        };
        let haystack = job.search_str();
        search
            .split_whitespace()
            .all(|term| haystack.contains(&term.to_lowercase()))
    }
}

impl JobFilter for FilterSet {
    fn is_tier_shown(&self, tier: i32) -> bool {
        self.tiers.contains(&tier)
    }

    fn show_job(&self, job: &Job) -> bool {
        self.is_tier_shown(job.tier)
            && self.result_statuses.contains(job.result_status())
            && self.check_classified_state(job)
            && self.fields.iter().all(|f| f.matches(job))
            && self.check_search(job)
    }
}
