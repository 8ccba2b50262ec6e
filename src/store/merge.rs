//! Job merge engine.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::index::GroupKey;
use super::{JobEntry, PushStore};
use crate::models::{Job, JobId, PushId, StoreEvent};

/// Outcome of merging a batch of jobs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Jobs inserted or changed, in arrival order.
    pub changed: Vec<JobId>,
    /// Jobs dropped because their push is not loaded.
    pub missing_parent: Vec<JobId>,
}

impl MergeSummary {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

#[derive(Debug, Default)]
struct MergeResult {
    changed: bool,
    /// The job was or is an unclassified failure.
    unclassified_touched: bool,
}

impl PushStore {
    /// Merge one job into the index.
    ///
    /// Returns false when the job's push is not loaded (nothing changes) or
    /// when the payload matches what is already stored.
    pub fn merge_job(&mut self, job: Job) -> bool {
        !self.merge_jobs(vec![job]).is_empty()
    }

    /// Merge a batch of jobs, notifying once per affected push.
    pub fn merge_jobs(&mut self, jobs: Vec<Job>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let mut by_push: BTreeMap<PushId, Vec<JobId>> = BTreeMap::new();
        let mut recount = false;

        for job in jobs {
            let job_id = job.id;
            let push_id = job.result_set_id;
            match self.merge_one(job) {
                None => summary.missing_parent.push(job_id),
                Some(result) => {
                    recount |= result.unclassified_touched;
                    if result.changed {
                        summary.changed.push(job_id);
                        by_push.entry(push_id).or_default().push(job_id);
                    }
                }
            }
        }

        if !summary.missing_parent.is_empty() {
            debug!(
                count = summary.missing_parent.len(),
                "Skipped jobs whose push is not loaded"
            );
        }

        for (push_id, job_ids) in by_push {
            self.emit(StoreEvent::jobs_loaded(push_id, job_ids));
        }
        if recount {
            self.refresh_counts();
        }
        summary
    }

    fn merge_one(&mut self, job: Job) -> Option<MergeResult> {
        if !self.push_nodes.contains_key(&job.result_set_id) {
            return None;
        }

        let group_key = GroupKey::of(&job);
        let job_id = job.id;

        let (slot, was_member, changed) = match self.job_map.get(&job_id).cloned() {
            Some(entry) => {
                let existing = &mut self.jobs[entry.slot];
                let was_member = existing.is_unclassified_failure();
                let old_guid = existing.job_guid.clone();
                let old_symbol = existing.job_type_symbol.clone();

                if !existing.patch(&job) {
                    return Some(MergeResult {
                        changed: false,
                        unclassified_touched: false,
                    });
                }

                if was_member && old_guid != job.job_guid {
                    self.unclassified_failures.remove(&old_guid);
                }

                if entry.group != group_key {
                    self.ensure_group(&group_key, &job.job_group_name);
                    self.remove_job_from_group(job_id, &entry.group);
                    self.add_job_to_group(job_id, &group_key);
                    if let Some(entry) = self.job_map.get_mut(&job_id) {
                        entry.group = group_key;
                    }
                } else if old_symbol != job.job_type_symbol {
                    self.sort_group_jobs(&group_key);
                }

                (entry.slot, was_member, true)
            }
            None => {
                self.ensure_group(&group_key, &job.job_group_name);
                let slot = self.jobs.len();
                self.jobs.push(job);
                self.job_map.insert(
                    job_id,
                    JobEntry {
                        slot,
                        group: group_key.clone(),
                    },
                );
                self.add_job_to_group(job_id, &group_key);
                (slot, false, true)
            }
        };

        let is_member = self.update_unclassified(slot);
        Some(MergeResult {
            changed,
            unclassified_touched: was_member || is_member,
        })
    }

    /// Bring the unclassified-failure map in line with the job at `slot`.
    fn update_unclassified(&mut self, slot: usize) -> bool {
        let job = &self.jobs[slot];
        if job.is_unclassified_failure() {
            self.unclassified_failures
                .insert(job.job_guid.clone(), job.id);
            true
        } else {
            if self.unclassified_failures.get(&job.job_guid) == Some(&job.id) {
                self.unclassified_failures.remove(&job.job_guid);
            }
            false
        }
    }

    /// Apply a classification to loaded jobs.
    ///
    /// Unknown ids are ignored. Returns the ids whose classification changed.
    pub fn classify_jobs(&mut self, job_ids: &[JobId], classification_id: i64) -> Vec<JobId> {
        let mut changed = Vec::new();
        let mut by_push: BTreeMap<PushId, Vec<JobId>> = BTreeMap::new();

        for &job_id in job_ids {
            let Some(entry) = self.job_map.get(&job_id) else {
                warn!(job_id, "Cannot classify job that is not loaded");
                continue;
            };
            let slot = entry.slot;
            let job = &mut self.jobs[slot];
            if job.failure_classification_id == classification_id {
                continue;
            }
            job.failure_classification_id = classification_id;
            let push_id = job.result_set_id;
            self.update_unclassified(slot);
            changed.push(job_id);
            by_push.entry(push_id).or_default().push(job_id);
        }

        for (push_id, job_ids) in by_push {
            self.emit(StoreEvent::jobs_loaded(push_id, job_ids));
        }
        if !changed.is_empty() {
            self.jobs_classified();
        }
        changed
    }
}
