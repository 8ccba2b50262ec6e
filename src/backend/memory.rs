//! In-memory backend serving pushes and jobs from a fixture.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{PushBackend, PushFilters, PushQuery};
use crate::error::{AppError, AppResult};
use crate::models::{Job, JobId, Push, PushId, PushListResponse, PushRangeMeta};

/// A request as seen by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRequest {
    ListPushes(PushQuery),
    JobsForPushes(Vec<PushId>),
    JobsModifiedSince {
        push_ids: Vec<PushId>,
        since: DateTime<Utc>,
    },
    JobsByIds(Vec<JobId>),
}

/// On-disk fixture layout.
#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    pushes: Vec<Push>,
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Default)]
struct MemoryState {
    pushes: BTreeMap<PushId, Push>,
    jobs: BTreeMap<JobId, Job>,
    requests: Vec<BackendRequest>,
    /// Ids left out of the next by-id response that asks for them.
    withheld: HashSet<JobId>,
    failures_pending: usize,
    /// Delay before every response.
    latency: Duration,
}

impl MemoryState {
    fn record(&mut self, request: BackendRequest) -> AppResult<()> {
        self.requests.push(request);
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(AppError::Transport("simulated backend outage".to_string()));
        }
        Ok(())
    }

    fn revision_timestamp(&self, revision: &str) -> Option<i64> {
        self.pushes
            .values()
            .find(|p| p.revision == revision)
            .map(|p| p.push_timestamp)
    }
}

/// [`PushBackend`] over in-memory data.
///
/// Besides serving a fixture, it records every request and can be told to
/// withhold ids or fail requests.
#[derive(Default)]
pub struct InMemoryBackend {
    state: RwLock<MemoryState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(pushes: Vec<Push>, jobs: Vec<Job>) -> Self {
        let state = MemoryState {
            pushes: pushes.into_iter().map(|p| (p.id, p)).collect(),
            jobs: jobs.into_iter().map(|j| (j.id, j)).collect(),
            ..Default::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }

    /// Load `{"pushes": [...], "jobs": [...]}` from a JSON file.
    pub async fn from_fixture(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let fixture: Fixture = serde_json::from_str(&raw)?;
        info!(
            "Loaded fixture {} ({} pushes, {} jobs)",
            path.display(),
            fixture.pushes.len(),
            fixture.jobs.len()
        );
        Ok(Self::with_data(fixture.pushes, fixture.jobs))
    }

    pub async fn add_pushes(&self, pushes: Vec<Push>) {
        let mut state = self.state.write().await;
        for push in pushes {
            state.pushes.insert(push.id, push);
        }
    }

    /// Insert or replace a job.
    pub async fn upsert_job(&self, job: Job) {
        self.state.write().await.jobs.insert(job.id, job);
    }

    /// Leave these ids out of the next by-id response that asks for them.
    pub async fn withhold_once(&self, ids: impl IntoIterator<Item = JobId>) {
        self.state.write().await.withheld.extend(ids);
    }

    /// Fail the next `n` requests of any kind.
    pub async fn fail_next_requests(&self, n: usize) {
        self.state.write().await.failures_pending = n;
    }

    /// Delay every later response by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = latency;
    }

    /// Every request received so far, oldest first.
    pub async fn requests(&self) -> Vec<BackendRequest> {
        self.state.read().await.requests.clone()
    }

    pub async fn clear_requests(&self) {
        self.state.write().await.requests.clear();
    }

    /// Record `request` and wait out the configured latency.
    async fn receive(&self, request: BackendRequest) -> AppResult<()> {
        let latency = {
            let mut state = self.state.write().await;
            state.record(request)?;
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

fn date_bounds(filters: &PushFilters) -> AppResult<(Option<i64>, Option<i64>)> {
    let parse = |value: &str| {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| AppError::InvalidInput(format!("Invalid date '{}'", value)))
    };

    let start = match filters.startdate.as_deref() {
        Some(value) => parse(value)?
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp()),
        None => None,
    };
    let end = match filters.enddate.as_deref() {
        Some(value) => parse(value)?
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp()),
        None => None,
    };
    Ok((start, end))
}

#[async_trait]
impl PushBackend for InMemoryBackend {
    async fn list_pushes(&self, repo: &str, query: &PushQuery) -> AppResult<PushListResponse> {
        self.receive(BackendRequest::ListPushes(query.clone())).await?;
        let state = self.state.read().await;
        debug!(repo, ?query, "Listing pushes from memory");

        let filters = &query.filters;
        let (start, end) = date_bounds(filters)?;
        let from_ts = match filters.fromchange.as_deref() {
            Some(rev) => Some(
                state
                    .revision_timestamp(rev)
                    .ok_or_else(|| AppError::NotFound(format!("Revision {}", rev)))?,
            ),
            None => None,
        };
        let to_ts = match filters.tochange.as_deref() {
            Some(rev) => Some(
                state
                    .revision_timestamp(rev)
                    .ok_or_else(|| AppError::NotFound(format!("Revision {}", rev)))?,
            ),
            None => None,
        };

        let lower = [query.newer_than, from_ts, start].into_iter().flatten().max();
        let upper = [to_ts, end].into_iter().flatten().min();
        let meta = PushRangeMeta {
            timestamp_gte: lower,
            timestamp_lte: upper,
            timestamp_lt: query.older_than,
        };

        let mut results: Vec<Push> = state
            .pushes
            .values()
            .filter(|p| meta.contains(p.push_timestamp))
            .filter(|p| filters.revision.as_ref().is_none_or(|r| &p.revision == r))
            .filter(|p| filters.author.as_ref().is_none_or(|a| &p.author == a))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.push_timestamp.cmp(&a.push_timestamp));
        if let Some(count) = query.count {
            results.truncate(count);
        }

        Ok(PushListResponse { results, meta })
    }

    async fn list_jobs_for_pushes(&self, _repo: &str, push_ids: &[PushId]) -> AppResult<Vec<Job>> {
        self.receive(BackendRequest::JobsForPushes(push_ids.to_vec()))
            .await?;
        let state = self.state.read().await;

        Ok(state
            .jobs
            .values()
            .filter(|j| push_ids.contains(&j.result_set_id))
            .cloned()
            .collect())
    }

    async fn list_jobs_modified_since(
        &self,
        _repo: &str,
        push_ids: &[PushId],
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Job>> {
        self.receive(BackendRequest::JobsModifiedSince {
            push_ids: push_ids.to_vec(),
            since,
        })
        .await?;
        let state = self.state.read().await;

        Ok(state
            .jobs
            .values()
            .filter(|j| push_ids.contains(&j.result_set_id) && j.last_modified_utc() > since)
            .cloned()
            .collect())
    }

    async fn get_jobs_by_ids(&self, _repo: &str, job_ids: &[JobId]) -> AppResult<Vec<Job>> {
        self.receive(BackendRequest::JobsByIds(job_ids.to_vec()))
            .await?;
        let mut state = self.state.write().await;

        let mut found = Vec::new();
        for id in job_ids {
            if state.withheld.remove(id) {
                continue;
            }
            if let Some(job) = state.jobs.get(id) {
                found.push(job.clone());
            }
        }
        Ok(found)
    }
}
