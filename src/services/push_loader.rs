//! Push paging: older pages on demand, newer pushes on poll.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::sync::{SyncService, to_delta};
use crate::backend::PushQuery;
use crate::error::AppResult;
use crate::models::{PushId, Severity, StoreEvent, latest_modification};

const PUSH_FETCH_ERROR: &str = "Error retrieving resultset data!";

impl SyncService {
    /// Load up to `count` pushes older than the oldest one loaded.
    ///
    /// Returns the ids that were added. A load already in flight makes this
    /// a no-op.
    pub async fn load_next_pushes(&self, count: usize) -> AppResult<Vec<PushId>> {
        let (repo, older_than, appending) = {
            let mut store = self.store.write().await;
            if store.loading().appending {
                debug!("Older pushes already loading");
                return Ok(Vec::new());
            }
            let appending = store.begin_append();
            (store.repo().to_string(), store.oldest_push_timestamp(), appending)
        };

        let query = PushQuery {
            count: Some(count),
            older_than,
            newer_than: None,
            filters: self.filters.read().await.clone(),
        };
        let result = self.backend.list_pushes(&repo, &query).await;

        let added = {
            let mut store = self.store.write().await;
            if store.repo() != repo {
                debug!(repo, "Dropping push page for previous repository");
                return Ok(Vec::new());
            }
            drop(appending);

            let list = match result {
                Ok(list) => list,
                Err(e) => {
                    error!("Failed to load pushes for {}: {}", repo, e);
                    store.emit(StoreEvent::notification(
                        PUSH_FETCH_ERROR,
                        Severity::Danger,
                        true,
                    ));
                    store.emit(StoreEvent::pushes_loaded(Vec::new(), store.push_count()));
                    return Err(e);
                }
            };

            store.set_range_meta_if_unset(list.meta);
            let returned = list.results.len();
            let added = store.append_pushes(list.results);
            store.set_has_more(returned >= count);
            store.emit(StoreEvent::pushes_loaded(added.clone(), store.push_count()));
            added
        };

        self.hydrate_pushes(&repo, &added).await;
        Ok(added)
    }

    /// Load pushes at or after the oldest loaded push and prepend the new ones.
    pub async fn load_newer_pushes(&self) -> AppResult<Vec<PushId>> {
        let (repo, newer_than, prepending) = {
            let mut store = self.store.write().await;
            if store.loading().prepending {
                debug!("Newer pushes already loading");
                return Ok(Vec::new());
            }
            let Some(oldest) = store.oldest_push_timestamp() else {
                return Ok(Vec::new());
            };
            let prepending = store.begin_prepend();
            (store.repo().to_string(), oldest, prepending)
        };

        let query = PushQuery {
            count: None,
            older_than: None,
            newer_than: Some(newer_than),
            filters: self.filters.read().await.for_polling(),
        };
        let result = self.backend.list_pushes(&repo, &query).await;

        let added = {
            let mut store = self.store.write().await;
            if store.repo() != repo {
                return Ok(Vec::new());
            }
            drop(prepending);

            let list = match result {
                Ok(list) => list,
                Err(e) => {
                    error!("Failed to poll pushes for {}: {}", repo, e);
                    store.emit(StoreEvent::notification(
                        PUSH_FETCH_ERROR,
                        Severity::Danger,
                        true,
                    ));
                    store.emit(StoreEvent::pushes_loaded(Vec::new(), store.push_count()));
                    return Err(e);
                }
            };

            let added = store.prepend_pushes(list.results);
            store.emit(StoreEvent::pushes_loaded(added.clone(), store.push_count()));
            added
        };

        self.hydrate_pushes(&repo, &added).await;
        Ok(added)
    }

    /// One tick of the push poller.
    ///
    /// An empty index gets a fresh first page. Otherwise newer pushes are
    /// fetched, unless the view is pinned to a single revision.
    pub async fn poll_pushes(&self) -> AppResult<Vec<PushId>> {
        let (empty, loading) = {
            let store = self.store.read().await;
            (store.is_empty(), store.loading())
        };

        if empty {
            if loading.is_loading() {
                return Ok(Vec::new());
            }
            return self.load_next_pushes(self.settings.push_count).await;
        }

        if self.filters.read().await.revision.is_some() {
            debug!("View pinned to a revision; not polling for pushes");
            return Ok(Vec::new());
        }
        self.load_newer_pushes().await
    }

    /// Fetch and merge every job of freshly added pushes.
    ///
    /// Failures are not fatal: the watermark is cleared so the next job
    /// poll refetches everything.
    pub(crate) async fn hydrate_pushes(&self, repo: &str, push_ids: &[PushId]) {
        if self.settings.no_jobs || push_ids.is_empty() {
            return;
        }
        let generation = self.poll_generation().await;

        let jobs = match self.backend.list_jobs_for_pushes(repo, push_ids).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Failed to load jobs for pushes {:?}: {}", push_ids, e);
                let mut poll = self.poll.lock().await;
                if poll.generation == generation {
                    poll.last_job_update = None;
                }
                return;
            }
        };

        let latest = latest_modification(&jobs);
        let count = jobs.len();
        if let Err(e) = self.apply_jobs(repo, jobs).await {
            debug!("Discarding job hydration: {}", e);
            return;
        }
        info!(repo, pushes = push_ids.len(), jobs = count, "Hydrated pushes");

        let mut poll = self.poll.lock().await;
        if poll.generation != generation {
            return;
        }
        if poll.last_job_update.is_none()
            && let Some(latest) = latest
        {
            poll.last_job_update = Some(latest - to_delta(self.settings.watermark_slack));
        }
        if poll.last_poll_time.is_none() {
            poll.last_poll_time = Some(Utc::now());
        }
    }
}
