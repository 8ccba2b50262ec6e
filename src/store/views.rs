//! Read accessors for consumers of the store.

use serde::Serialize;

use super::PushStore;
use super::index::{GroupKey, GroupNode, PlatformKey, PlatformNode};
use crate::models::{Job, JobCounts, JobId, Push, PushId, RevisionTip};

/// A push with its full platform/group/job tree, in display order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushView {
    pub push: Push,
    pub platforms: Vec<PlatformView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformView {
    pub name: String,
    pub option: String,
    pub row_id: String,
    pub groups: Vec<GroupView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub symbol: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<i32>,
    pub map_key: String,
    pub jobs: Vec<Job>,
}

impl PushStore {
    pub fn is_empty(&self) -> bool {
        self.pushes.is_empty()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.len()
    }

    /// Loaded push ids, newest first.
    pub fn push_ids(&self) -> &[PushId] {
        &self.pushes
    }

    /// Loaded pushes, newest first.
    pub fn pushes(&self) -> impl Iterator<Item = &Push> {
        self.pushes
            .iter()
            .filter_map(|id| self.push_nodes.get(id))
            .map(|node| &node.push)
    }

    pub fn push(&self, push_id: PushId) -> Option<&Push> {
        self.push_nodes.get(&push_id).map(|node| &node.push)
    }

    pub fn push_by_revision(&self, revision: &str) -> Option<&Push> {
        self.pushes().find(|p| p.revision == revision)
    }

    pub fn job(&self, job_id: JobId) -> Option<&Job> {
        self.job_map.get(&job_id).map(|entry| &self.jobs[entry.slot])
    }

    /// The group a job currently belongs to.
    pub fn job_parent(&self, job_id: JobId) -> Option<&GroupNode> {
        self.job_map
            .get(&job_id)
            .and_then(|entry| self.groups.get(&entry.group))
    }

    pub fn job_count(&self) -> usize {
        self.job_map.len()
    }

    pub fn platform(&self, key: &PlatformKey) -> Option<&PlatformNode> {
        self.platforms.get(key)
    }

    pub fn group(&self, key: &GroupKey) -> Option<&GroupNode> {
        self.groups.get(key)
    }

    pub fn group_by_map_key(&self, map_key: &str) -> Option<&GroupNode> {
        self.group_map
            .get(map_key)
            .and_then(|key| self.groups.get(key))
    }

    /// Platform rows of a push in display order.
    pub fn platforms_for(&self, push_id: PushId) -> Vec<&PlatformNode> {
        self.push_nodes
            .get(&push_id)
            .map(|node| {
                node.platforms
                    .iter()
                    .filter_map(|key| self.platforms.get(key))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Jobs of a push in display order.
    pub fn jobs_for(&self, push_id: PushId) -> Vec<&Job> {
        self.platforms_for(push_id)
            .into_iter()
            .flat_map(|platform| platform.groups.iter())
            .filter_map(|key| self.groups.get(key))
            .flat_map(|group| group.jobs.iter())
            .filter_map(|id| self.job(*id))
            .collect()
    }

    /// Job totals by state for one push.
    pub fn job_counts(&self, push_id: PushId) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in self.jobs_for(push_id) {
            counts.add(job.state);
        }
        counts
    }

    /// Task id of the push's successful decision task, if loaded.
    pub fn decision_task_id(&self, push_id: PushId) -> Option<&str> {
        self.jobs_for(push_id)
            .into_iter()
            .find(|job| job.is_decision_task())
            .and_then(|job| job.task_id.as_deref())
    }

    /// Tip revision of every loaded push, newest first.
    pub fn revision_tips(&self) -> Vec<RevisionTip> {
        self.pushes().map(Push::revision_tip).collect()
    }

    /// Jobs passing the active filter in display order, optionally limited
    /// to one push.
    pub fn shown_jobs(&self, push_id: Option<PushId>) -> Vec<&Job> {
        let push_ids: Vec<PushId> = match push_id {
            Some(id) => vec![id],
            None => self.pushes.clone(),
        };

        push_ids
            .into_iter()
            .flat_map(|id| self.jobs_for(id))
            .filter(|job| self.filter.show_job(job))
            .collect()
    }

    /// Snapshot of the whole tree in display order.
    pub fn tree(&self) -> Vec<PushView> {
        self.pushes
            .iter()
            .filter_map(|id| self.push_view(*id))
            .collect()
    }

    pub fn push_view(&self, push_id: PushId) -> Option<PushView> {
        let node = self.push_nodes.get(&push_id)?;
        let platforms = self
            .platforms_for(push_id)
            .into_iter()
            .map(|platform| PlatformView {
                name: platform.name.clone(),
                option: platform.option.clone(),
                row_id: platform.row_id.clone(),
                groups: platform
                    .groups
                    .iter()
                    .filter_map(|key| self.groups.get(key))
                    .map(|group| GroupView {
                        symbol: group.symbol.clone(),
                        name: group.name.clone(),
                        tier: group.tier,
                        map_key: group.map_key.clone(),
                        jobs: group
                            .jobs
                            .iter()
                            .filter_map(|id| self.job(*id))
                            .cloned()
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Some(PushView {
            push: node.push.clone(),
            platforms,
        })
    }
}
