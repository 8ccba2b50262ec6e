//! E2E tests: classification and filter changes against the unclassified counters.

use std::sync::Arc;

use push_sync_lib::backend::InMemoryBackend;
use push_sync_lib::models::{FilterField, FilterSet, MatchType, StoreEvent};
use push_sync_lib::store::UnclassifiedCounts;
use tokio_test::assert_ok;

use super::helpers::*;

/// (1) Classifying a failure (1 → 2) removes it and decrements both counters.
#[tokio::test]
async fn test_classification_decrements_counters() {
    let backend = Arc::new(InMemoryBackend::with_data(
        pushes(1),
        vec![failed(10, 1), failed(11, 1), job(12, 1)],
    ));
    let service = service(backend);
    assert_ok!(service.load_next_pushes(10).await);
    assert_eq!(
        service.store().read().await.unclassified_counts(),
        UnclassifiedCounts { all: 2, filtered: 2 }
    );
    let mut rx = service.subscribe().await;

    let store = service.store();
    let mut store = store.write().await;
    let changed = store.classify_jobs(&[10], 2);
    assert_eq!(changed, vec![10]);
    assert_eq!(store.unclassified_counts(), UnclassifiedCounts { all: 1, filtered: 1 });
    assert!(store.unclassified_failures().all(|j| j.job_guid != "guid-10"));
    assert_eq!(store.audit_unclassified(), store.unclassified_counts());
    drop(store);

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            StoreEvent::jobs_loaded(1, vec![10]),
            StoreEvent::unclassified_counts(1, 1),
        ]
    );
}

/// (2) Autoclassified-intermittent (7) still counts as unclassified.
#[tokio::test]
async fn test_intermittent_classification_still_counts() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(1), vec![failed(10, 1)]));
    let service = service(backend);
    assert_ok!(service.load_next_pushes(10).await);

    let store = service.store();
    let mut store = store.write().await;
    assert_eq!(store.classify_jobs(&[10], 7), vec![10]);
    assert_eq!(store.unclassified_counts().all, 1);
}

/// (3) A failure reclassified by a later poll leaves the counters.
#[tokio::test]
async fn test_polled_classification_updates_counters() {
    let backend = Arc::new(InMemoryBackend::with_data(pushes(1), vec![failed(10, 1)]));
    let service = service(backend.clone());
    assert_ok!(service.load_next_pushes(10).await);

    let mut classified = failed(10, 1);
    classified.failure_classification_id = 4;
    classified.last_modified = at(BASE_TS + 500);
    backend.upsert_job(classified).await;
    assert_ok!(service.poll_jobs_at(now()).await);

    let store = service.store();
    let store = store.read().await;
    assert_eq!(store.unclassified_counts(), UnclassifiedCounts::default());
    assert_eq!(store.unclassified_failures().count(), 0);
}

/// (4) Narrowing the filter recomputes only the filtered counter.
#[tokio::test]
async fn test_filter_change_recomputes_filtered() {
    let mut windows = failed(11, 1);
    windows.platform = "windows10-64".to_string();
    let backend = Arc::new(InMemoryBackend::with_data(pushes(1), vec![failed(10, 1), windows]));
    let service = service(backend);
    assert_ok!(service.load_next_pushes(10).await);

    let counts = service
        .set_filter(Arc::new(FilterSet::default().with_field(
            FilterField::Platform,
            MatchType::Substr,
            &["windows 10"],
        )))
        .await;
    assert_eq!(counts, UnclassifiedCounts { all: 2, filtered: 1 });

    let counts = service
        .set_filter(Arc::new(FilterSet::default().with_tiers([2])))
        .await;
    assert_eq!(counts, UnclassifiedCounts { all: 0, filtered: 0 });
}
