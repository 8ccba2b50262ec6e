//! Fetch jobs by id in chunks, retrying ids the backend has not served yet.

use std::collections::HashSet;

use futures_util::future::join_all;
use tracing::{info, warn};

use super::sync::SyncService;
use crate::error::{AppError, AppResult};
use crate::models::{Job, JobId, Severity, StoreEvent};

/// Totals for one [`SyncService::fetch_jobs_by_ids`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Request rounds, the first one included.
    pub rounds: usize,
    /// Jobs received across all rounds.
    pub received: usize,
    /// Jobs that changed the index.
    pub changed: usize,
}

impl SyncService {
    /// Fetch `ids` in chunks and merge the results.
    ///
    /// Ids missing from a response, and every id of a chunk whose request
    /// failed, are retried after `job_retry_delay` until all have been
    /// served. Shutdown or a repository switch ends the loop early.
    pub async fn fetch_jobs_by_ids(&self, ids: Vec<JobId>) -> AppResult<FetchReport> {
        let mut seen = HashSet::new();
        let mut pending: Vec<JobId> = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        let mut report = FetchReport::default();
        let repo = self.store.read().await.repo().to_string();
        let chunk_size = self.settings.job_chunk_size.max(1);

        while !pending.is_empty() {
            report.rounds += 1;

            let chunks: Vec<&[JobId]> = pending.chunks(chunk_size).collect();
            let responses = join_all(
                chunks
                    .iter()
                    .map(|chunk| self.backend.get_jobs_by_ids(&repo, chunk)),
            )
            .await;

            let mut fetched: Vec<Job> = Vec::new();
            let mut unfetched: Vec<JobId> = Vec::new();
            let mut failed_chunks = 0;
            for (chunk, response) in chunks.iter().zip(responses) {
                match response {
                    Ok(jobs) => {
                        let served: HashSet<JobId> = jobs.iter().map(|j| j.id).collect();
                        unfetched.extend(chunk.iter().filter(|id| !served.contains(*id)));
                        fetched.extend(jobs);
                    }
                    Err(e) => {
                        warn!("Failed to fetch {} jobs: {}", chunk.len(), e);
                        failed_chunks += 1;
                        unfetched.extend_from_slice(chunk);
                    }
                }
            }

            report.received += fetched.len();
            let summary = self.apply_jobs(&repo, fetched).await?;
            report.changed += summary.changed.len();

            if failed_chunks > 0 {
                self.store.read().await.emit(StoreEvent::notification(
                    format!(
                        "Failed to fetch {} of {} job chunks, retrying",
                        failed_chunks,
                        chunks.len()
                    ),
                    Severity::Warning,
                    false,
                ));
            }

            if unfetched.is_empty() {
                break;
            }

            info!(
                count = unfetched.len(),
                delay_secs = self.settings.job_retry_delay.as_secs(),
                "Jobs not yet available, retrying"
            );
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Err(AppError::Cancelled("job fetch interrupted by shutdown".to_string()));
                }
                _ = tokio::time::sleep(self.settings.job_retry_delay) => {}
            }
            pending = unfetched;
        }

        Ok(report)
    }
}
