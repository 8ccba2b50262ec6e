//! Shared fixtures for the sync E2E tests.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use push_sync_lib::backend::{InMemoryBackend, PushBackend, PushFilters};
use push_sync_lib::config::SyncSettings;
use push_sync_lib::models::{Job, JobResult, JobState, Push, PushId, StoreEvent, StoreEventMessage};
use push_sync_lib::services::SyncService;
use push_sync_lib::store::PushStore;
use tokio::sync::broadcast;

/// Push timestamps start here; push `n` lands `n` minutes later.
pub const BASE_TS: i64 = 1_700_000_000;

pub const REPO: &str = "autoland";

pub fn push(id: PushId, ts: i64) -> Push {
    Push {
        id,
        revision: format!("rev{}", id),
        author: format!("dev{}@example.com", id),
        push_timestamp: ts,
        revisions: Vec::new(),
        revision_count: None,
    }
}

/// Pushes `1..=n`, each one minute newer than the last.
pub fn pushes(n: i64) -> Vec<Push> {
    (1..=n).map(|id| push(id, BASE_TS + id * 60)).collect()
}

pub fn at(secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

pub fn job(id: i64, push_id: PushId) -> Job {
    Job {
        id,
        job_guid: format!("guid-{}", id),
        result_set_id: push_id,
        platform: "linux64".to_string(),
        platform_option: "opt".to_string(),
        job_group_name: "Mochitests".to_string(),
        job_group_symbol: "M".to_string(),
        job_type_name: format!("mochitest-{}", id),
        job_type_symbol: id.to_string(),
        tier: 1,
        state: JobState::Completed,
        result: JobResult::Success,
        failure_classification_id: 1,
        last_modified: at(BASE_TS + id),
        task_id: None,
        retry_id: None,
    }
}

pub fn failed(id: i64, push_id: PushId) -> Job {
    Job {
        result: JobResult::Testfailed,
        ..job(id, push_id)
    }
}

/// A clock well past every fixture timestamp.
pub fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(BASE_TS + 86_400, 0).unwrap_or_default()
}

pub fn service_with(backend: Arc<dyn PushBackend>, settings: SyncSettings) -> SyncService {
    SyncService::new(PushStore::new(REPO), backend, settings, PushFilters::default())
}

pub fn service(backend: Arc<InMemoryBackend>) -> SyncService {
    service_with(backend, SyncSettings::default())
}

/// Every event received so far.
pub fn drain(rx: &mut broadcast::Receiver<StoreEventMessage>) -> Vec<StoreEvent> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .map(|msg| msg.event)
        .collect()
}
