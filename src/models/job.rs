//! Job domain models.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::push::PushId;
use crate::store::keys;

/// Backend-assigned job identifier (unique within a repository).
pub type JobId = i64;

/// Failure classification ids that still count as "not yet classified".
pub const UNCLASSIFIED_IDS: [i64; 2] = [1, 7];

/// Default classification for freshly reported jobs ("not classified").
pub const NOT_CLASSIFIED: i64 = 1;

/// Execution state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a completed job. Anything the backend reports that is not
/// listed here is read as `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobResult {
    Success,
    Testfailed,
    Busted,
    Exception,
    Retry,
    Usercancel,
    Superseded,
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Testfailed => "testfailed",
            Self::Busted => "busted",
            Self::Exception => "exception",
            Self::Retry => "retry",
            Self::Usercancel => "usercancel",
            Self::Superseded => "superseded",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "testfailed" => Some(Self::Testfailed),
            "busted" => Some(Self::Busted),
            "exception" => Some(Self::Exception),
            "retry" => Some(Self::Retry),
            "usercancel" => Some(Self::Usercancel),
            "superseded" => Some(Self::Superseded),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Results that count as failures for classification purposes.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Testfailed | Self::Busted | Self::Exception)
    }
}

impl std::fmt::Display for JobResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_group_name() -> String {
    "unknown".to_string()
}

fn default_group_symbol() -> String {
    "?".to_string()
}

fn default_tier() -> i32 {
    1
}

fn default_classification() -> i64 {
    NOT_CLASSIFIED
}

/// One CI task execution, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_guid: String,
    /// Owning push.
    #[serde(alias = "push_id")]
    pub result_set_id: PushId,
    pub platform: String,
    #[serde(default)]
    pub platform_option: String,
    #[serde(default = "default_group_name")]
    pub job_group_name: String,
    #[serde(default = "default_group_symbol")]
    pub job_group_symbol: String,
    pub job_type_name: String,
    pub job_type_symbol: String,
    #[serde(default = "default_tier")]
    pub tier: i32,
    pub state: JobState,
    #[serde(default)]
    pub result: JobResult,
    #[serde(default = "default_classification")]
    pub failure_classification_id: i64,
    /// Backend modification time (UTC, serialized without offset).
    pub last_modified: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_id: Option<u32>,
}

impl Job {
    /// Whether a human or the autoclassifier has assigned a classification.
    pub fn is_classified(&self) -> bool {
        !UNCLASSIFIED_IDS.contains(&self.failure_classification_id)
    }

    /// A failing job nobody has classified yet.
    pub fn is_unclassified_failure(&self) -> bool {
        self.result.is_failure() && !self.is_classified()
    }

    /// The status shown for the job: its result once completed, its state before.
    pub fn result_status(&self) -> &'static str {
        match self.state {
            JobState::Completed => self.result.as_str(),
            state => state.as_str(),
        }
    }

    pub fn last_modified_utc(&self) -> DateTime<Utc> {
        self.last_modified.and_utc()
    }

    /// Lower-cased text used by free-form job searches.
    pub fn search_str(&self) -> String {
        let symbol_info = if self.job_group_symbol == "?" {
            ""
        } else {
            self.job_group_symbol.as_str()
        };

        let mut parts = vec![
            keys::platform_display_name(&self.platform).to_string(),
            self.platform_option.clone(),
        ];
        if self.job_group_name != "unknown" {
            parts.push(self.job_group_name.clone());
        }
        parts.push(self.job_type_name.clone());
        parts.push(format!("{}({})", symbol_info, self.job_type_symbol));

        parts.join(" ").to_lowercase()
    }

    /// Whether this is a successful decision task for its push.
    pub fn is_decision_task(&self) -> bool {
        self.job_type_name.contains("Decision Task")
            && self.result == JobResult::Success
            && self.job_type_symbol == "D"
    }

    /// Copy every field of `update` onto this job in place.
    ///
    /// Returns true if any field changed. The job keeps its slot in the store,
    /// so holders of its id keep seeing the latest values.
    pub fn patch(&mut self, update: &Job) -> bool {
        if self == update {
            return false;
        }

        self.job_guid.clone_from(&update.job_guid);
        self.result_set_id = update.result_set_id;
        self.platform.clone_from(&update.platform);
        self.platform_option.clone_from(&update.platform_option);
        self.job_group_name.clone_from(&update.job_group_name);
        self.job_group_symbol.clone_from(&update.job_group_symbol);
        self.job_type_name.clone_from(&update.job_type_name);
        self.job_type_symbol.clone_from(&update.job_type_symbol);
        self.tier = update.tier;
        self.state = update.state;
        self.result = update.result;
        self.failure_classification_id = update.failure_classification_id;
        self.last_modified = update.last_modified;
        self.task_id.clone_from(&update.task_id);
        self.retry_id = update.retry_id;

        true
    }
}

/// Latest `last_modified` across a job list.
pub fn latest_modification(jobs: &[Job]) -> Option<DateTime<Utc>> {
    jobs.iter().map(Job::last_modified_utc).max()
}

/// Job totals for a push, by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
}

impl JobCounts {
    pub fn add(&mut self, state: JobState) {
        match state {
            JobState::Pending => self.pending += 1,
            JobState::Running => self.running += 1,
            JobState::Completed => self.completed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed
    }
}
