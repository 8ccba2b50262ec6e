//! E2E tests: push paging, prepending and failures.

use std::sync::Arc;

use push_sync_lib::backend::{BackendRequest, InMemoryBackend, PushFilters};
use push_sync_lib::config::SyncSettings;
use push_sync_lib::models::{Severity, StoreEvent};
use push_sync_lib::services::SyncService;
use push_sync_lib::store::PushStore;
use tokio_test::{assert_err, assert_ok};

use super::helpers::*;

/// (1) 15 pushes: the first page is the 10 newest, the second the remaining 5.
#[tokio::test]
async fn test_initial_load_then_next_page() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(15), Vec::new()));
    let service = service(backend.clone());
    let mut rx = service.subscribe().await;

    let first = assert_ok!(service.load_next_pushes(10).await);
    assert_eq!(first, (6..=15).rev().collect::<Vec<_>>());
    {
        let store = service.store();
        let store = store.read().await;
        assert!(store.has_more());
        assert_eq!(store.oldest_push_timestamp(), Some(BASE_TS + 6 * 60));
    }

    let second = assert_ok!(service.load_next_pushes(10).await);
    assert_eq!(second, (1..=5).rev().collect::<Vec<_>>());

    let store = service.store();
    let store = store.read().await;
    assert!(!store.has_more());
    assert_eq!(store.push_ids(), (1..=15).rev().collect::<Vec<_>>().as_slice());

    let loaded: Vec<_> = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, StoreEvent::PushesLoaded(_)))
        .collect();
    assert_eq!(
        loaded,
        vec![
            StoreEvent::pushes_loaded((6..=15).rev().collect(), 10),
            StoreEvent::pushes_loaded((1..=5).rev().collect(), 15),
        ]
    );
}

/// (2) A push created after the first load is prepended on the next push poll.
#[tokio::test]
async fn test_push_poll_prepends_new_push() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(3), vec![job(10, 1)]));
    let service = service(backend.clone());
    assert_ok!(service.load_next_pushes(10).await);

    backend.add_pushes(vec![push(4, BASE_TS + 3_600)]).await;
    backend.upsert_job(failed(40, 4)).await;

    let added = assert_ok!(service.poll_pushes().await);
    assert_eq!(added, vec![4]);

    let store = service.store();
    let store = store.read().await;
    assert_eq!(store.push_ids(), &[4, 3, 2, 1]);
    assert!(store.job(40).is_some());
    assert_eq!(store.unclassified_counts().all, 1);
}

/// (3) With a `tochange` bound, newer pushes past the bound never get in.
#[tokio::test]
async fn test_prepend_respects_revision_range() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(5), Vec::new()));
    let service = SyncService::new(
        PushStore::new(REPO),
        backend.clone(),
        SyncSettings::default(),
        PushFilters {
            fromchange: Some("rev2".to_string()),
            tochange: Some("rev4".to_string()),
            ..Default::default()
        },
    );

    assert_eq!(assert_ok!(service.load_next_pushes(10).await), vec![4, 3, 2]);
    {
        let store = service.store();
        let store = store.read().await;
        let meta = store.range_meta().cloned().unwrap_or_default();
        assert_eq!(meta.timestamp_lte, Some(BASE_TS + 4 * 60));
    }

    // Push 5 already exists beyond the bound; the poll must not pull it in.
    let added = assert_ok!(service.poll_pushes().await);
    assert!(added.is_empty());
    assert_eq!(service.store().read().await.push_ids(), &[4, 3, 2]);

    let polled = backend
        .requests()
        .await
        .into_iter()
        .filter_map(|r| match r {
            BackendRequest::ListPushes(q) => Some(q),
            _ => None,
        })
        .last();
    let polled = polled.unwrap_or_default();
    assert_eq!(polled.newer_than, Some(BASE_TS + 2 * 60));
    assert!(polled.filters.tochange.is_none());
}

/// (4) A failed push fetch leaves the index alone and raises a sticky danger notification.
#[tokio::test]
async fn test_push_failure_notifies_and_keeps_index() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(12), Vec::new()));
    let service = service(backend.clone());
    assert_ok!(service.load_next_pushes(10).await);
    let mut rx = service.subscribe().await;

    backend.fail_next_requests(1).await;
    let err = assert_err!(service.load_next_pushes(10).await);
    assert!(err.is_transient());

    let events = drain(&mut rx);
    assert_eq!(
        events[0],
        StoreEvent::notification("Error retrieving resultset data!", Severity::Danger, true)
    );

    let store = service.store();
    let store = store.read().await;
    assert_eq!(store.push_count(), 10);
    assert!(store.has_more());
    assert!(!store.loading().is_loading());
    drop(store);

    // The loader recovers on the next attempt.
    assert_eq!(assert_ok!(service.load_next_pushes(10).await), vec![2, 1]);
}

/// (5) Pushes are ordered by timestamp, not by id.
#[tokio::test]
async fn test_pushes_sorted_by_timestamp() {
    let backend = Arc::new(InMemoryBackend::with_data(
        vec![push(1, BASE_TS + 300), push(2, BASE_TS + 100), push(3, BASE_TS + 200)],
        Vec::new(),
    ));
    let service = service(backend);
    assert_ok!(service.load_next_pushes(10).await);

    let store = service.store();
    let store = store.read().await;
    assert_eq!(store.push_ids(), &[1, 3, 2]);
    let tips: Vec<_> = store.revision_tips().into_iter().map(|t| t.revision).collect();
    assert_eq!(tips, vec!["rev1", "rev3", "rev2"]);
}

/// (6) Switching repository drops every push and job of the previous one.
#[tokio::test]
async fn test_switch_repository_starts_over() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(3), vec![failed(10, 1)]));
    let service = service_with(
        backend,
        SyncSettings {
            push_count: 2,
            ..Default::default()
        },
    );
    assert_ok!(service.load_next_pushes(3).await);
    assert_eq!(service.store().read().await.unclassified_counts().all, 1);
    let mut rx = service.subscribe().await;

    assert_ok!(service.switch_repository("try").await);

    let events = drain(&mut rx);
    assert_eq!(events[0], StoreEvent::unclassified_counts(0, 0));

    let store = service.store();
    let store = store.read().await;
    assert_eq!(store.repo(), "try");
    assert_eq!(store.push_ids(), &[3, 2]);
    assert_eq!(store.unclassified_counts().all, 0);
}
