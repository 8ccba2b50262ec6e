//! Unclassified-failure counters.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::PushStore;
use crate::models::{Job, JobFilter, StoreEvent};

/// The two derived unclassified-failure counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnclassifiedCounts {
    /// Unclassified failures in enabled tiers.
    pub all: usize,
    /// Of those, the ones passing the active display filters.
    pub filtered: usize,
}

impl PushStore {
    pub fn unclassified_counts(&self) -> UnclassifiedCounts {
        self.counts
    }

    /// Jobs currently in the unclassified-failure map.
    pub fn unclassified_failures(&self) -> impl Iterator<Item = &Job> {
        self.unclassified_failures
            .values()
            .filter_map(|id| self.job_map.get(id))
            .map(|entry| &self.jobs[entry.slot])
    }

    /// Count over the unclassified-failure map.
    fn compute_counts(&self) -> UnclassifiedCounts {
        let filter = &self.filter;
        let mut counts = UnclassifiedCounts::default();
        for job in self.unclassified_failures() {
            if !filter.is_tier_shown(job.tier) {
                continue;
            }
            counts.all += 1;
            if filter.show_job(job) {
                counts.filtered += 1;
            }
        }
        counts
    }

    /// Recompute the counters, notifying only if they moved.
    pub(super) fn refresh_counts(&mut self) {
        let counts = self.compute_counts();
        if counts != self.counts {
            debug!(all = counts.all, filtered = counts.filtered, "Unclassified counts changed");
            self.counts = counts;
            self.emit(StoreEvent::unclassified_counts(counts.all, counts.filtered));
        }
    }

    /// Recompute both counters and always notify.
    pub fn recalculate_unclassified_counts(&mut self) -> UnclassifiedCounts {
        self.counts = self.compute_counts();
        self.emit(StoreEvent::unclassified_counts(
            self.counts.all,
            self.counts.filtered,
        ));
        self.counts
    }

    /// Entry point for the classification collaborator.
    pub fn jobs_classified(&mut self) -> UnclassifiedCounts {
        self.recalculate_unclassified_counts()
    }

    /// Entry point for the filter collaborator.
    pub fn set_filter(&mut self, filter: Arc<dyn JobFilter>) -> UnclassifiedCounts {
        self.filter = filter;
        self.recalculate_unclassified_counts()
    }

    /// Counters derived from a full scan of every indexed job.
    ///
    /// Independent of the unclassified-failure map; must always agree with
    /// [`PushStore::unclassified_counts`].
    pub fn audit_unclassified(&self) -> UnclassifiedCounts {
        let mut counts = UnclassifiedCounts::default();
        for job in self.jobs.iter().filter(|j| j.is_unclassified_failure()) {
            if !self.filter.is_tier_shown(job.tier) {
                continue;
            }
            counts.all += 1;
            if self.filter.show_job(job) {
                counts.filtered += 1;
            }
        }
        counts
    }
}
