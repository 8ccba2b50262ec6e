//! Change notifications published by a push store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::JobId;
use super::push::PushId;

/// Event sent to store subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "snake_case")]
pub enum StoreEvent {
    /// An append or prepend finished, whether or not it added pushes.
    PushesLoaded(PushesLoadedPayload),
    /// A merge batch changed jobs of one push.
    JobsLoaded(JobsLoadedPayload),
    /// The derived unclassified-failure counters were recomputed.
    UnclassifiedCountsChanged(UnclassifiedCountsPayload),
    /// A message for the user.
    Notification(NotificationPayload),
    /// The view was narrowed to, or reset from, a single revision.
    RevisionRangeChanged(RevisionRangePayload),
}

/// Payload for pushes_loaded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushesLoadedPayload {
    pub added: Vec<PushId>,
    pub total: usize,
}

/// Payload for jobs_loaded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsLoadedPayload {
    pub push_id: PushId,
    pub job_ids: Vec<JobId>,
}

/// Payload for unclassified_counts_changed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnclassifiedCountsPayload {
    pub all: usize,
    pub filtered: usize,
}

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Danger,
}

/// Payload for notification event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub message: String,
    pub severity: Severity,
    /// Sticky notifications stay until dismissed.
    pub sticky: bool,
}

/// Payload for revision_range_changed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRangePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// Wrapper that includes timestamp with every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEventMessage {
    #[serde(flatten)]
    pub event: StoreEvent,
    pub timestamp: DateTime<Utc>,
}

impl StoreEventMessage {
    /// Create a new event message with the current timestamp.
    pub fn new(event: StoreEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}

impl StoreEvent {
    pub fn pushes_loaded(added: Vec<PushId>, total: usize) -> Self {
        StoreEvent::PushesLoaded(PushesLoadedPayload { added, total })
    }

    pub fn jobs_loaded(push_id: PushId, job_ids: Vec<JobId>) -> Self {
        StoreEvent::JobsLoaded(JobsLoadedPayload { push_id, job_ids })
    }

    pub fn unclassified_counts(all: usize, filtered: usize) -> Self {
        StoreEvent::UnclassifiedCountsChanged(UnclassifiedCountsPayload { all, filtered })
    }

    pub fn notification(message: impl Into<String>, severity: Severity, sticky: bool) -> Self {
        StoreEvent::Notification(NotificationPayload {
            message: message.into(),
            severity,
            sticky,
        })
    }

    pub fn revision_range_changed(revision: Option<String>) -> Self {
        StoreEvent::RevisionRangeChanged(RevisionRangePayload { revision })
    }
}
