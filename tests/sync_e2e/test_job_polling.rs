//! E2E tests: job polling, watermark movement and the background pollers.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use push_sync_lib::backend::{BackendRequest, InMemoryBackend};
use push_sync_lib::models::{JobResult, JobState, StoreEvent};
use push_sync_lib::services::{PollKind, PollOutcome, start_job_poller, start_push_poller};
use tokio_test::assert_ok;

use super::helpers::*;

/// (1) After a full fetch, a delta poll that returns nothing moves the watermark to now − 5 min.
#[tokio::test]
async fn test_quiet_delta_clamps_watermark() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(2), Vec::new()));
    let service = service(backend.clone());
    assert_ok!(service.load_next_pushes(10).await);
    assert_eq!(service.watermark().await, None);

    let full = assert_ok!(service.poll_jobs_at(now()).await);
    assert!(matches!(
        full,
        PollOutcome::Applied {
            kind: PollKind::FullRefetch,
            ..
        }
    ));

    let later = now() + TimeDelta::minutes(1);
    let delta = assert_ok!(service.poll_jobs_at(later).await);
    assert_eq!(
        delta,
        PollOutcome::Applied {
            kind: PollKind::Delta,
            received: 0,
            changed: 0
        }
    );
    assert_eq!(service.watermark().await, Some(later - TimeDelta::minutes(5)));
}

/// (2) Sixteen minutes without a poll turns the next delta into a full refetch.
#[tokio::test]
async fn test_stale_poll_refetches_everything() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(2), vec![job(10, 1)]));
    let service = service(backend.clone());
    assert_ok!(service.load_next_pushes(10).await);

    let first = now();
    assert_ok!(service.poll_jobs_at(first).await);
    backend.clear_requests().await;

    let outcome = assert_ok!(service.poll_jobs_at(first + TimeDelta::minutes(16)).await);
    assert!(matches!(
        outcome,
        PollOutcome::Applied {
            kind: PollKind::FullRefetch,
            received: 1,
            ..
        }
    ));
    assert_eq!(
        backend.requests().await,
        vec![BackendRequest::JobsForPushes(vec![2, 1])]
    );
}

/// (3) Fourteen minutes is still within the ceiling: delta query.
#[tokio::test]
async fn test_recent_poll_stays_delta() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(2), vec![job(10, 1)]));
    let service = service(backend.clone());
    assert_ok!(service.load_next_pushes(10).await);

    let first = now();
    assert_ok!(service.poll_jobs_at(first).await);
    let outcome = assert_ok!(service.poll_jobs_at(first + TimeDelta::minutes(14)).await);
    assert!(matches!(
        outcome,
        PollOutcome::Applied {
            kind: PollKind::Delta,
            ..
        }
    ));
}

/// (4) A job state change is merged in place and announced once for its push.
#[tokio::test]
async fn test_delta_updates_job_in_place() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(2), vec![job(10, 1), job(20, 2)]));
    let service = service(backend.clone());
    assert_ok!(service.load_next_pushes(10).await);
    let mut rx = service.subscribe().await;

    let mut running = job(20, 2);
    running.state = JobState::Running;
    running.result = JobResult::Unknown;
    running.last_modified = at(BASE_TS + 1_000);
    backend.upsert_job(running).await;

    assert_ok!(service.poll_jobs_at(now()).await);

    let jobs_loaded: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, StoreEvent::JobsLoaded(_)))
        .collect();
    assert_eq!(jobs_loaded, vec![StoreEvent::jobs_loaded(2, vec![20])]);

    let store = service.store();
    let store = store.read().await;
    assert_eq!(store.job(20).map(|j| j.state), Some(JobState::Running));
    assert_eq!(store.job_counts(2).running, 1);
    assert_eq!(store.job_count(), 2);
}

/// (5) The background pollers pick up new pushes and job changes on their own.
#[tokio::test(start_paused = true)]
async fn test_pollers_keep_store_current() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(2), vec![job(10, 1)]));
    let service = service(backend.clone());
    assert_ok!(service.load_next_pushes(10).await);

    let job_poller = start_job_poller(service.clone());
    let push_poller = start_push_poller(service.clone());

    backend.add_pushes(vec![push(3, BASE_TS + 3_600)]).await;
    let mut busted = job(10, 1);
    busted.result = JobResult::Busted;
    busted.last_modified = at(BASE_TS + 2_000);
    backend.upsert_job(busted).await;

    tokio::time::sleep(Duration::from_secs(61)).await;

    {
        let store = service.store();
        let store = store.read().await;
        assert_eq!(store.push_ids(), &[3, 2, 1]);
        assert_eq!(store.job(10).map(|j| j.result), Some(JobResult::Busted));
        assert_eq!(store.unclassified_counts().all, 1);
    }

    service.shutdown();
    job_poller.stop().await;
    push_poller.stop().await;
}
