//! Access to the CI backend.
//!
//! [`PushBackend`] is the only way the sync service talks to the source of
//! truth. [`HttpBackend`] speaks the dashboard REST API; [`InMemoryBackend`]
//! serves fixtures and backs the tests.

mod http;
mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::{Job, JobId, PushId, PushListResponse};

pub use http::HttpBackend;
pub use memory::{BackendRequest, InMemoryBackend};

/// Push filters coming from the dashboard's URL (revision range, author, dates).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fromchange: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tochange: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startdate: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enddate: Option<String>,
}

impl PushFilters {
    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }

    /// Set filters as query-string pairs, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("revision", &self.revision),
            ("author", &self.author),
            ("fromchange", &self.fromchange),
            ("tochange", &self.tochange),
            ("startdate", &self.startdate),
            ("enddate", &self.enddate),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }

    /// Filters that survive polling for newer pushes.
    ///
    /// A `tochange` or `enddate` bound is enforced through the first
    /// listing's range metadata instead.
    pub fn for_polling(&self) -> Self {
        Self {
            revision: self.revision.clone(),
            author: self.author.clone(),
            ..Self::default()
        }
    }
}

/// Parameters of one push listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushQuery {
    /// Page size; `None` asks for everything matching.
    pub count: Option<usize>,
    /// Only pushes strictly older than this timestamp.
    pub older_than: Option<i64>,
    /// Only pushes at or after this timestamp.
    pub newer_than: Option<i64>,
    pub filters: PushFilters,
}

/// The four backend operations the store consumes.
#[async_trait]
pub trait PushBackend: Send + Sync {
    /// Pushes newest first, with the range metadata the listing was computed for.
    async fn list_pushes(&self, repo: &str, query: &PushQuery) -> AppResult<PushListResponse>;

    /// Every job of the given pushes.
    async fn list_jobs_for_pushes(&self, repo: &str, push_ids: &[PushId]) -> AppResult<Vec<Job>>;

    /// Jobs of the given pushes modified strictly after `since`.
    async fn list_jobs_modified_since(
        &self,
        repo: &str,
        push_ids: &[PushId],
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Job>>;

    /// Jobs by id. Ids the backend cannot serve yet are simply absent.
    async fn get_jobs_by_ids(&self, repo: &str, job_ids: &[JobId]) -> AppResult<Vec<Job>>;
}
