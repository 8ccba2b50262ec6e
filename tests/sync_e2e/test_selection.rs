//! E2E tests: job selection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use push_sync_lib::backend::{InMemoryBackend, PushBackend, PushQuery};
use push_sync_lib::config::SyncSettings;
use push_sync_lib::error::{AppError, AppResult};
use push_sync_lib::models::{Job, JobId, PushId, PushListResponse};
use tokio_test::assert_ok;

use super::helpers::*;

/// Delegates to an in-memory backend but answers by-id requests slowly.
struct SlowByIdBackend {
    inner: InMemoryBackend,
    delay: Duration,
}

#[async_trait]
impl PushBackend for SlowByIdBackend {
    async fn list_pushes(&self, repo: &str, query: &PushQuery) -> AppResult<PushListResponse> {
        self.inner.list_pushes(repo, query).await
    }

    async fn list_jobs_for_pushes(&self, repo: &str, push_ids: &[PushId]) -> AppResult<Vec<Job>> {
        self.inner.list_jobs_for_pushes(repo, push_ids).await
    }

    async fn list_jobs_modified_since(
        &self,
        repo: &str,
        push_ids: &[PushId],
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Job>> {
        self.inner.list_jobs_modified_since(repo, push_ids, since).await
    }

    async fn get_jobs_by_ids(&self, repo: &str, job_ids: &[JobId]) -> AppResult<Vec<Job>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_jobs_by_ids(repo, job_ids).await
    }
}

/// (1) A second selection cancels the first one's pending request.
#[tokio::test(start_paused = true)]
async fn test_new_selection_supersedes_pending_one() {
    let backend = Arc::new(SlowByIdBackend {
        inner: InMemoryBackend::with_data(pushes(1), vec![job(10, 1), job(11, 1)]),
        delay: Duration::from_secs(5),
    });
    let service = service_with(backend, SyncSettings::default());
    assert_ok!(service.load_next_pushes(10).await);

    let first = tokio::spawn({
        let service = service.clone();
        async move { service.select_job(10).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;

    let second = assert_ok!(service.select_job(11).await);
    assert_eq!(second.map(|j| j.id), Some(11));

    let first = first.await.unwrap_or_else(|e| panic!("selection task failed: {e}"));
    assert!(matches!(first, Err(AppError::Cancelled(_))));
    assert_eq!(service.store().read().await.selected_job(), Some(11));
}

/// (2) Shutdown cancels a pending selection.
#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_selection() {
    let backend = Arc::new(SlowByIdBackend {
        inner: InMemoryBackend::with_data(pushes(1), vec![job(10, 1)]),
        delay: Duration::from_secs(5),
    });
    let service = service_with(backend, SyncSettings::default());
    assert_ok!(service.load_next_pushes(10).await);

    let pending = tokio::spawn({
        let service = service.clone();
        async move { service.select_job(10).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    service.shutdown();

    let result = pending.await.unwrap_or_else(|e| panic!("selection task failed: {e}"));
    assert!(matches!(result, Err(AppError::Cancelled(_))));
}
