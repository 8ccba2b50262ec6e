//! REST client for the CI dashboard API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{PushBackend, PushQuery};
use crate::error::{AppError, AppResult};
use crate::models::{Job, JobId, JobListResponse, PushId, PushListResponse};

/// Page size requested for job listings; further pages come via `next`.
const JOB_PAGE_SIZE: usize = 2000;

/// Upper bound on `next` links followed for one listing.
const MAX_JOB_PAGES: usize = 100;

/// Connect timeout for backend requests.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP implementation of [`PushBackend`].
#[derive(Clone)]
pub struct HttpBackend {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Build a client for `base_url`.
    ///
    /// `request_timeout` bounds whole requests; `None` leaves them unbounded
    /// and relies on the next poll tick to issue a fresh request.
    pub fn new(base_url: &str, request_timeout: Option<Duration>) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(HTTP_CONNECT_TIMEOUT);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn project_url(&self, repo: &str, resource: &str) -> String {
        format!(
            "{}/api/project/{}/{}/",
            self.base_url,
            urlencoding::encode(repo),
            resource
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        debug!("GET {}", url);

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Backend returned {} for {}", status, url);
            return Err(AppError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Fetch a job listing and every page after it.
    async fn get_job_pages(&self, first_url: String) -> AppResult<Vec<Job>> {
        let mut jobs = Vec::new();
        let mut next = Some(first_url);
        let mut pages = 0;

        while let Some(url) = next {
            let page: JobListResponse = self.get_json(&url).await?;
            jobs.extend(page.results);
            next = page.next;

            pages += 1;
            if pages >= MAX_JOB_PAGES && next.is_some() {
                warn!("Stopping job listing after {} pages", pages);
                break;
            }
        }

        Ok(jobs)
    }
}

/// Append percent-encoded query pairs to `url`.
pub(crate) fn with_query(url: &str, pairs: &[(&str, String)]) -> String {
    if pairs.is_empty() {
        return url.to_string();
    }
    let query = pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", url, query)
}

fn join_ids<T: ToString>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Format a watermark the way the backend compares `last_modified`.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

pub(crate) fn push_query_pairs(query: &PushQuery) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(count) = query.count {
        pairs.push(("count", count.to_string()));
    }
    if let Some(older_than) = query.older_than {
        pairs.push(("push_timestamp__lt", older_than.to_string()));
    }
    if let Some(newer_than) = query.newer_than {
        pairs.push(("push_timestamp__gte", newer_than.to_string()));
    }
    for (name, value) in query.filters.query_pairs() {
        pairs.push((name, value.to_string()));
    }
    pairs
}

#[async_trait]
impl PushBackend for HttpBackend {
    async fn list_pushes(&self, repo: &str, query: &PushQuery) -> AppResult<PushListResponse> {
        let url = with_query(&self.project_url(repo, "push"), &push_query_pairs(query));
        self.get_json(&url).await
    }

    async fn list_jobs_for_pushes(&self, repo: &str, push_ids: &[PushId]) -> AppResult<Vec<Job>> {
        if push_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = with_query(
            &self.project_url(repo, "jobs"),
            &[
                ("push_id__in", join_ids(push_ids)),
                ("count", JOB_PAGE_SIZE.to_string()),
            ],
        );
        self.get_job_pages(url).await
    }

    async fn list_jobs_modified_since(
        &self,
        repo: &str,
        push_ids: &[PushId],
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Job>> {
        if push_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = with_query(
            &self.project_url(repo, "jobs"),
            &[
                ("push_id__in", join_ids(push_ids)),
                ("last_modified__gt", format_timestamp(since)),
                ("count", JOB_PAGE_SIZE.to_string()),
            ],
        );
        self.get_job_pages(url).await
    }

    async fn get_jobs_by_ids(&self, repo: &str, job_ids: &[JobId]) -> AppResult<Vec<Job>> {
        if job_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = with_query(
            &self.project_url(repo, "jobs"),
            &[
                ("id__in", join_ids(job_ids)),
                ("count", job_ids.len().to_string()),
            ],
        );
        self.get_job_pages(url).await
    }
}
