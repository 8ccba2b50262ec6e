//! E2E tests: chunked fetch-by-id with retry.

use std::sync::Arc;
use std::time::Duration;

use push_sync_lib::backend::{BackendRequest, InMemoryBackend};
use push_sync_lib::config::SyncSettings;
use push_sync_lib::models::{JobId, StoreEvent};
use push_sync_lib::services::FetchReport;
use tokio::time::Instant;
use tokio_test::assert_ok;

use super::helpers::*;

fn by_id_requests(requests: Vec<BackendRequest>) -> Vec<Vec<JobId>> {
    requests
        .into_iter()
        .filter_map(|r| match r {
            BackendRequest::JobsByIds(ids) => Some(ids),
            _ => None,
        })
        .collect()
}

/// (1) 100 ids with 41-50 not yet available: three chunks, then one retry for exactly those ten.
#[tokio::test(start_paused = true)]
async fn test_unserved_ids_retried_once_after_delay() {
    let backend = Arc::new(InMemoryBackend::with_data(
        pushes(1),
        (1..=100).map(|id| job(id, 1)).collect(),
    ));
    let service = service_with(
        backend.clone(),
        SyncSettings {
            no_jobs: true,
            ..Default::default()
        },
    );
    assert_ok!(service.load_next_pushes(10).await);
    backend.withhold_once(41..=50).await;
    let mut rx = service.subscribe().await;

    let started = Instant::now();
    let report = assert_ok!(service.fetch_jobs_by_ids((1..=100).collect()).await);
    assert_eq!(
        report,
        FetchReport {
            rounds: 2,
            received: 100,
            changed: 100
        }
    );
    assert!(started.elapsed() >= Duration::from_secs(10));

    let requests = by_id_requests(backend.requests().await);
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0], (1..=40).collect::<Vec<_>>());
    assert_eq!(requests[1], (41..=80).collect::<Vec<_>>());
    assert_eq!(requests[2], (81..=100).collect::<Vec<_>>());
    assert_eq!(requests[3], (41..=50).collect::<Vec<_>>());

    // Every job is announced exactly once.
    let mut announced: Vec<JobId> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            StoreEvent::JobsLoaded(payload) => Some(payload.job_ids),
            _ => None,
        })
        .flatten()
        .collect();
    announced.sort_unstable();
    assert_eq!(announced, (1..=100).collect::<Vec<_>>());

    assert_eq!(service.store().read().await.job_count(), 100);
}

/// (2) Jobs whose push is not loaded are served but not merged, and not retried.
#[tokio::test]
async fn test_jobs_of_unloaded_pushes_are_dropped() {
    let backend = Arc::new(InMemoryBackend::with_data(
        pushes(2),
        vec![job(1, 1), job(2, 2)],
    ));
    let service = service_with(
        backend.clone(),
        SyncSettings {
            push_count: 1,
            no_jobs: true,
            ..Default::default()
        },
    );
    assert_ok!(service.load_next_pushes(1).await);

    let report = assert_ok!(service.fetch_jobs_by_ids(vec![1, 2]).await);
    assert_eq!(report.rounds, 1);
    assert_eq!(report.received, 2);
    assert_eq!(report.changed, 1);

    let store = service.store();
    let store = store.read().await;
    assert!(store.job(1).is_none());
    assert!(store.job(2).is_some());
}

/// (3) An empty id list makes no requests.
#[tokio::test]
async fn test_empty_fetch_is_noop() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(1), Vec::new()));
    let service = service(backend.clone());
    backend.clear_requests().await;

    let report = assert_ok!(service.fetch_jobs_by_ids(Vec::new()).await);
    assert_eq!(report, FetchReport::default());
    assert!(backend.requests().await.is_empty());
}
