//! Domain models for the push/job store.

pub mod event;
pub mod filter;
pub mod job;
pub mod push;

// Re-export commonly used types
pub use event::{Severity, StoreEvent, StoreEventMessage};
pub use filter::{FieldFilter, FilterField, FilterSet, JobFilter, MatchType};
pub use job::{Job, JobCounts, JobId, JobResult, JobState, latest_modification};
pub use push::{Push, PushId, PushListResponse, PushRangeMeta, Revision, RevisionTip};

/// Paged job listing response.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct JobListResponse {
    pub results: Vec<Job>,
    /// Absolute URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
}
