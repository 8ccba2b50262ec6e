//! Sync service: owns a store and keeps it in step with the backend.
//!
//! The service's `impl` is split across files:
//! - `push_loader`: paging pushes in either direction
//! - `job_poller`: delta polling and full refetch
//! - `job_fetcher`: chunked fetch-by-id with retry
//! - `selection`: the selected job

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{PushBackend, PushFilters};
use crate::config::SyncSettings;
use crate::error::{AppError, AppResult};
use crate::models::{Job, JobFilter, PushId, Severity, StoreEvent, StoreEventMessage};
use crate::store::{InFlight, MergeSummary, PushStore, UnclassifiedCounts};

/// Phase of the job poller's state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollPhase {
    #[default]
    Idle,
    Polling,
}

/// Job poll bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    pub phase: PollPhase,
    /// Lower bound for the next delta query.
    pub last_job_update: Option<DateTime<Utc>>,
    /// When the last poll was issued.
    pub last_poll_time: Option<DateTime<Utc>>,
}

/// Poll state as the service tracks it.
#[derive(Debug, Default)]
pub(crate) struct PollTracker {
    /// Bumped on every reset. Work started under an older generation must
    /// not write back.
    pub generation: u64,
    pub in_flight: InFlight,
    pub last_job_update: Option<DateTime<Utc>>,
    pub last_poll_time: Option<DateTime<Utc>>,
}

impl PollTracker {
    fn snapshot(&self) -> PollState {
        PollState {
            phase: if self.in_flight.is_set() {
                PollPhase::Polling
            } else {
                PollPhase::Idle
            },
            last_job_update: self.last_job_update,
            last_poll_time: self.last_poll_time,
        }
    }
}

/// Keeps one [`PushStore`] synchronized with a [`PushBackend`].
///
/// Cheap to clone; clones share the same store and state.
#[derive(Clone)]
pub struct SyncService {
    pub(crate) store: Arc<RwLock<PushStore>>,
    pub(crate) backend: Arc<dyn PushBackend>,
    pub(crate) settings: SyncSettings,
    pub(crate) filters: Arc<RwLock<PushFilters>>,
    pub(crate) poll: Arc<Mutex<PollTracker>>,
    pub(crate) selection: Arc<Mutex<Option<CancellationToken>>>,
    pub(crate) shutdown: CancellationToken,
}

impl SyncService {
    pub fn new(
        store: PushStore,
        backend: Arc<dyn PushBackend>,
        settings: SyncSettings,
        filters: PushFilters,
    ) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            backend,
            settings,
            filters: Arc::new(RwLock::new(filters)),
            poll: Arc::new(Mutex::new(PollTracker::default())),
            selection: Arc::new(Mutex::new(None)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Shared handle to the store for read access.
    pub fn store(&self) -> Arc<RwLock<PushStore>> {
        Arc::clone(&self.store)
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<StoreEventMessage> {
        self.store.read().await.subscribe()
    }

    pub async fn filters(&self) -> PushFilters {
        self.filters.read().await.clone()
    }

    pub async fn poll_state(&self) -> PollState {
        self.poll.lock().await.snapshot()
    }

    /// Current delta-poll watermark.
    pub async fn watermark(&self) -> Option<DateTime<Utc>> {
        self.poll.lock().await.last_job_update
    }

    /// Token cancelled when the service shuts down. Poller tokens are its children.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Stop pollers, retries and in-flight selections.
    pub fn shutdown(&self) {
        info!("Shutting down sync service");
        self.shutdown.cancel();
    }

    /// Replace the display filter and recompute the unclassified counters.
    pub async fn set_filter(&self, filter: Arc<dyn JobFilter>) -> UnclassifiedCounts {
        self.store.write().await.set_filter(filter)
    }

    /// Up to `limit` jobs passing the active filter, newest push first.
    ///
    /// A list cut short raises a warning notification.
    pub async fn shown_jobs(&self, limit: usize, push_id: Option<PushId>) -> Vec<Job> {
        let store = self.store.read().await;
        let shown = store.shown_jobs(push_id);
        if shown.len() > limit {
            warn!(matched = shown.len(), limit, "Too many shown jobs, truncating");
            store.emit(StoreEvent::notification(
                format!(
                    "{} jobs match the current filters; only the first {} were taken",
                    shown.len(),
                    limit
                ),
                Severity::Warning,
                false,
            ));
        }
        shown.into_iter().take(limit).cloned().collect()
    }

    /// Merge jobs unless the store moved to another repository meanwhile.
    pub(crate) async fn apply_jobs(&self, repo: &str, jobs: Vec<Job>) -> AppResult<MergeSummary> {
        let mut store = self.store.write().await;
        if store.repo() != repo {
            return Err(AppError::Cancelled(format!(
                "repository changed from {} to {}",
                repo,
                store.repo()
            )));
        }
        Ok(store.merge_jobs(jobs))
    }

    /// Repository name and loaded push ids, newest first.
    pub(crate) async fn loaded_pushes(&self) -> (String, Vec<PushId>) {
        let store = self.store.read().await;
        (store.repo().to_string(), store.push_ids().to_vec())
    }

    /// Forget the watermark and any poll in flight.
    pub(crate) async fn reset_poll_state(&self) {
        let mut poll = self.poll.lock().await;
        *poll = PollTracker {
            generation: poll.generation.wrapping_add(1),
            ..Default::default()
        };
    }

    pub(crate) async fn poll_generation(&self) -> u64 {
        self.poll.lock().await.generation
    }

    async fn cancel_selection(&self) {
        if let Some(token) = self.selection.lock().await.take() {
            token.cancel();
        }
    }

    /// Narrow the view to one revision, or clear the revision pin with `None`.
    ///
    /// A revision that is already loaded narrows the index in place; any
    /// other change resets the index and loads a fresh page.
    pub async fn set_revision(&self, revision: Option<String>) -> AppResult<()> {
        self.filters.write().await.revision = revision.clone();

        let narrowed = match revision.as_deref() {
            Some(rev) => {
                let mut store = self.store.write().await;
                match store.push_by_revision(rev).map(|p| p.id) {
                    Some(push_id) => {
                        store.retain_push(push_id);
                        store.set_has_more(false);
                        info!(revision = rev, push_id, "Narrowed view to loaded revision");
                        true
                    }
                    None => false,
                }
            }
            None => false,
        };

        self.store
            .read()
            .await
            .emit(StoreEvent::revision_range_changed(revision));

        if narrowed {
            return Ok(());
        }

        let repo = self.store.read().await.repo().to_string();
        self.reload(repo).await
    }

    /// Drop everything and view another repository.
    pub async fn switch_repository(&self, repo: &str) -> AppResult<()> {
        info!(repo, "Switching repository");
        *self.filters.write().await = PushFilters::default();
        self.reload(repo.to_string()).await
    }

    async fn reload(&self, repo: String) -> AppResult<()> {
        self.cancel_selection().await;
        self.reset_poll_state().await;
        self.store.write().await.reset(repo);
        self.load_next_pushes(self.settings.push_count).await?;
        Ok(())
    }
}

/// `std` durations to chrono, saturating.
pub(crate) fn to_delta(duration: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
