//! Job polling: delta queries against a watermark, with periodic full refetch.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::sync::{SyncService, to_delta};
use crate::error::{AppError, AppResult};
use crate::models::latest_modification;

/// What kind of job query a poll issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    /// Only jobs modified after the watermark.
    Delta,
    /// Every job of every loaded push.
    FullRefetch,
}

/// Result of one job poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing loaded yet, or another poll was in flight.
    Skipped,
    Applied {
        kind: PollKind,
        received: usize,
        changed: usize,
    },
}

fn poll_reset(repo: &str) -> AppError {
    debug!(repo, "Discarding job poll started before a reset");
    AppError::Cancelled(format!("poll state for {} was reset", repo))
}

impl SyncService {
    pub async fn poll_jobs(&self) -> AppResult<PollOutcome> {
        self.poll_jobs_at(Utc::now()).await
    }

    /// Poll jobs as of `now`.
    ///
    /// Without a watermark, or when the last poll is older than the
    /// staleness ceiling, every job of the loaded pushes is refetched.
    /// Otherwise only jobs modified after the watermark are asked for.
    pub async fn poll_jobs_at(&self, now: DateTime<Utc>) -> AppResult<PollOutcome> {
        if self.settings.no_jobs {
            return Ok(PollOutcome::Skipped);
        }

        let (repo, push_ids) = self.loaded_pushes().await;
        if push_ids.is_empty() {
            return Ok(PollOutcome::Skipped);
        }

        let (kind, since, generation, in_flight) = {
            let mut poll = self.poll.lock().await;
            if poll.in_flight.is_set() {
                debug!("Job poll already in flight");
                return Ok(PollOutcome::Skipped);
            }

            let stale = poll
                .last_poll_time
                .is_some_and(|last| now - last > to_delta(self.settings.staleness_ceiling()));
            if stale {
                info!("Job data is stale, refetching all jobs");
            }

            let (kind, since) = match poll.last_job_update {
                Some(since) if !stale => (PollKind::Delta, Some(since)),
                _ => (PollKind::FullRefetch, None),
            };
            poll.last_poll_time = Some(now);
            (kind, since, poll.generation, poll.in_flight.begin())
        };

        let result = match since {
            Some(since) => {
                self.backend
                    .list_jobs_modified_since(&repo, &push_ids, since)
                    .await
            }
            None => self.backend.list_jobs_for_pushes(&repo, &push_ids).await,
        };
        let jobs = result.inspect_err(|e| warn!("Job poll failed for {}: {}", repo, e))?;

        if self.poll_generation().await != generation {
            return Err(poll_reset(&repo));
        }
        let latest = latest_modification(&jobs);
        let received = jobs.len();
        let summary = self.apply_jobs(&repo, jobs).await?;

        {
            let mut poll = self.poll.lock().await;
            if poll.generation != generation {
                return Err(poll_reset(&repo));
            }
            poll.last_job_update = Some(match latest {
                Some(latest) => latest - to_delta(self.settings.watermark_slack),
                None => {
                    let floor = now - to_delta(self.settings.quiet_window());
                    poll.last_job_update.map_or(floor, |w| w.max(floor))
                }
            });
        }
        drop(in_flight);

        if received > 0 {
            debug!(
                ?kind,
                received,
                changed = summary.changed.len(),
                "Applied job poll"
            );
        }

        Ok(PollOutcome::Applied {
            kind,
            received,
            changed: summary.changed.len(),
        })
    }
}
