//! In-memory push/job index.
//!
//! A [`PushStore`] holds one repository view: pushes sorted newest first, the
//! platform → group → job tree under each push, and the derived
//! unclassified-failure indices. The tree is stored as flat tables keyed by
//! composite keys, with every node carrying its parent's key.
//!
//! The `impl PushStore` is split by concern:
//! - `index`: node tables, push insertion and ordering
//! - `merge`: job merge and classification updates
//! - `aggregates`: unclassified-failure counters
//! - `views`: read accessors for consumers

mod aggregates;
mod index;
pub mod keys;
mod merge;
mod views;

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use tokio::sync::broadcast;

use crate::models::{
    FilterSet, Job, JobFilter, JobId, PushId, PushRangeMeta, StoreEvent, StoreEventMessage,
};
use crate::services::EventBroadcaster;

pub use aggregates::UnclassifiedCounts;
pub use index::{GroupKey, GroupNode, PlatformKey, PlatformNode, PushNode};
pub use merge::MergeSummary;
pub use views::{GroupView, PlatformView, PushView};

/// Which push loads are currently in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct LoadingState {
    /// Loading older pushes (append).
    pub appending: bool,
    /// Loading newer pushes (prepend).
    pub prepending: bool,
}

impl LoadingState {
    pub fn is_loading(&self) -> bool {
        self.appending || self.prepending
    }
}

/// An in-flight mark that is set for as long as its guard lives.
///
/// The guard travels with the request future, so dropping that future
/// (timeout, `select!`, task abort) clears the mark as well.
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlight(Weak<()>);

impl InFlight {
    pub(crate) fn is_set(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub(crate) fn begin(&mut self) -> InFlightGuard {
        let token = Arc::new(());
        self.0 = Arc::downgrade(&token);
        InFlightGuard { _token: token }
    }
}

/// Keeps an [`InFlight`] mark set until dropped.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    _token: Arc<()>,
}

#[derive(Debug, Clone)]
pub(crate) struct JobEntry {
    /// Position in the job arena. Never reassigned.
    pub slot: usize,
    pub group: GroupKey,
}

/// The entity index for one repository.
pub struct PushStore {
    repo: String,

    /// Push ids sorted by `push_timestamp` descending.
    pushes: Vec<PushId>,
    push_nodes: HashMap<PushId, PushNode>,
    platforms: HashMap<PlatformKey, PlatformNode>,
    groups: HashMap<GroupKey, GroupNode>,
    group_map: HashMap<String, GroupKey>,

    /// Job arena; a job keeps its slot for the lifetime of the store.
    jobs: Vec<Job>,
    job_map: HashMap<JobId, JobEntry>,

    /// job_guid → job id for unclassified failures.
    unclassified_failures: HashMap<String, JobId>,
    counts: UnclassifiedCounts,
    filter: Arc<dyn JobFilter>,

    oldest_push_timestamp: Option<i64>,
    range_meta: Option<PushRangeMeta>,
    has_more: bool,
    appending: InFlight,
    prepending: InFlight,
    selected_job: Option<JobId>,

    events: EventBroadcaster,
}

impl PushStore {
    /// Create an empty store for `repo` with the default filter set.
    pub fn new(repo: impl Into<String>) -> Self {
        Self::with_filter(repo, Arc::new(FilterSet::default()))
    }

    pub fn with_filter(repo: impl Into<String>, filter: Arc<dyn JobFilter>) -> Self {
        Self {
            repo: repo.into(),
            pushes: Vec::new(),
            push_nodes: HashMap::new(),
            platforms: HashMap::new(),
            groups: HashMap::new(),
            group_map: HashMap::new(),
            jobs: Vec::new(),
            job_map: HashMap::new(),
            unclassified_failures: HashMap::new(),
            counts: UnclassifiedCounts::default(),
            filter,
            oldest_push_timestamp: None,
            range_meta: None,
            has_more: true,
            appending: InFlight::default(),
            prepending: InFlight::default(),
            selected_job: None,
            events: EventBroadcaster::new(),
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEventMessage> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: StoreEvent) {
        self.events.emit(event);
    }

    /// Discard the whole index and start over for `repo`.
    ///
    /// Subscribers and the filter survive; everything derived from the
    /// backend does not.
    pub fn reset(&mut self, repo: impl Into<String>) {
        let filter = Arc::clone(&self.filter);
        let events = self.events.clone();
        *self = Self::with_filter(repo, filter);
        self.events = events;
        self.emit(StoreEvent::unclassified_counts(0, 0));
    }

    pub fn loading(&self) -> LoadingState {
        LoadingState {
            appending: self.appending.is_set(),
            prepending: self.prepending.is_set(),
        }
    }

    /// Mark an older-push load in flight until the guard is dropped.
    pub(crate) fn begin_append(&mut self) -> InFlightGuard {
        self.appending.begin()
    }

    /// Mark a newer-push load in flight until the guard is dropped.
    pub(crate) fn begin_prepend(&mut self) -> InFlightGuard {
        self.prepending.begin()
    }

    /// Whether older pushes may still be available.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub(crate) fn set_has_more(&mut self, has_more: bool) {
        self.has_more = has_more;
    }

    /// Timestamp of the oldest loaded push: the paging watermark.
    pub fn oldest_push_timestamp(&self) -> Option<i64> {
        self.oldest_push_timestamp
    }

    pub fn range_meta(&self) -> Option<&PushRangeMeta> {
        self.range_meta.as_ref()
    }

    /// Keep the range metadata of the first listing only.
    pub(crate) fn set_range_meta_if_unset(&mut self, meta: PushRangeMeta) {
        if self.range_meta.is_none() {
            self.range_meta = Some(meta);
        }
    }

    pub fn selected_job(&self) -> Option<JobId> {
        self.selected_job
    }

    pub(crate) fn set_selected_job(&mut self, job_id: Option<JobId>) {
        self.selected_job = job_id;
    }

    pub fn filter(&self) -> &Arc<dyn JobFilter> {
        &self.filter
    }
}

impl std::fmt::Debug for PushStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushStore")
            .field("repo", &self.repo)
            .field("pushes", &self.pushes.len())
            .field("jobs", &self.jobs.len())
            .field("unclassified", &self.unclassified_failures.len())
            .field("counts", &self.counts)
            .finish()
    }
}
