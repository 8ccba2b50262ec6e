//! Node tables and push insertion.

use std::cmp::Ordering;

use tracing::{debug, info};

use super::PushStore;
use super::keys;
use crate::models::{Job, JobId, Push, PushId};

/// Key of a platform row: (push, platform name, build option).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformKey {
    pub push_id: PushId,
    pub name: String,
    pub option: String,
}

impl PlatformKey {
    pub fn of(job: &Job) -> Self {
        Self {
            push_id: job.result_set_id,
            name: job.platform.clone(),
            option: job.platform_option.clone(),
        }
    }
}

/// Key of a job group: its platform plus (symbol, tier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub platform: PlatformKey,
    pub symbol: String,
    /// `None` for tier 1.
    pub tier: Option<i32>,
}

impl GroupKey {
    pub fn of(job: &Job) -> Self {
        Self {
            platform: PlatformKey::of(job),
            symbol: job.job_group_symbol.clone(),
            tier: keys::group_tier(job.tier),
        }
    }

    pub fn map_key(&self) -> String {
        keys::group_map_key(
            self.platform.push_id,
            &self.symbol,
            self.tier,
            &self.platform.name,
            &self.platform.option,
        )
    }
}

/// A loaded push and its platform rows in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct PushNode {
    pub push: Push,
    pub platforms: Vec<PlatformKey>,
}

/// A platform row under one push.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformNode {
    pub push_id: PushId,
    pub name: String,
    pub option: String,
    pub row_id: String,
    pub groups: Vec<GroupKey>,
}

/// A job group under one platform.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub platform: PlatformKey,
    pub symbol: String,
    pub name: String,
    pub tier: Option<i32>,
    pub map_key: String,
    /// Jobs in natural `job_type_symbol` order.
    pub jobs: Vec<JobId>,
}

impl PushStore {
    /// Add older pushes. Returns the ids that were not already loaded.
    pub fn append_pushes(&mut self, pushes: Vec<Push>) -> Vec<PushId> {
        let added = self.insert_pushes(pushes);
        if !added.is_empty() {
            info!(repo = %self.repo, count = added.len(), "Appended pushes");
        }
        added
    }

    /// Add newer pushes.
    ///
    /// Only pushes no older than the oldest loaded push and inside the first
    /// listing's range are kept.
    pub fn prepend_pushes(&mut self, pushes: Vec<Push>) -> Vec<PushId> {
        let oldest = self.oldest_push_timestamp;
        let meta = self.range_meta.clone().unwrap_or_default();
        let in_range: Vec<Push> = pushes
            .into_iter()
            .filter(|p| {
                let keep = oldest.is_none_or(|ts| p.push_timestamp >= ts)
                    && meta.contains(p.push_timestamp);
                if !keep {
                    debug!(push_id = p.id, "Skipping push outside loaded range");
                }
                keep
            })
            .collect();

        let added = self.insert_pushes(in_range);
        if !added.is_empty() {
            info!(repo = %self.repo, count = added.len(), "Prepended pushes");
        }
        added
    }

    fn insert_pushes(&mut self, pushes: Vec<Push>) -> Vec<PushId> {
        let mut added = Vec::new();

        for push in pushes {
            if self.push_nodes.contains_key(&push.id) {
                continue;
            }
            let id = push.id;
            self.oldest_push_timestamp = Some(match self.oldest_push_timestamp {
                Some(oldest) => oldest.min(push.push_timestamp),
                None => push.push_timestamp,
            });
            self.push_nodes.insert(
                id,
                PushNode {
                    push,
                    platforms: Vec::new(),
                },
            );
            self.pushes.push(id);
            added.push(id);
        }

        if !added.is_empty() {
            self.sort_pushes();
        }
        added
    }

    /// Backend creation order does not follow timestamps, so always re-sort.
    fn sort_pushes(&mut self) {
        let nodes = &self.push_nodes;
        let timestamp = |id: &PushId| nodes.get(id).map(|n| n.push.push_timestamp);
        self.pushes.sort_by(|a, b| timestamp(b).cmp(&timestamp(a)));
    }

    /// Keep only `push_id` and everything under it.
    ///
    /// Returns false when the push is not loaded.
    pub(crate) fn retain_push(&mut self, push_id: PushId) -> bool {
        let Some(node) = self.push_nodes.remove(&push_id) else {
            return false;
        };

        let kept_jobs: Vec<Job> = self
            .job_map
            .values()
            .filter(|entry| entry.group.platform.push_id == push_id)
            .map(|entry| self.jobs[entry.slot].clone())
            .collect();
        let range_meta = self.range_meta.take();
        let has_more = self.has_more;
        let selected = self.selected_job;

        self.reset(self.repo.clone());
        self.range_meta = range_meta;
        self.has_more = has_more;
        self.insert_pushes(vec![node.push]);
        self.merge_jobs(kept_jobs);
        if let Some(id) = selected
            && self.job_map.contains_key(&id)
        {
            self.selected_job = Some(id);
        }
        true
    }

    /// Find or create the platform row for `key`. Returns true if created.
    pub(super) fn ensure_platform(&mut self, key: &PlatformKey) -> bool {
        if self.platforms.contains_key(key) {
            return false;
        }

        let node = PlatformNode {
            push_id: key.push_id,
            name: key.name.clone(),
            option: key.option.clone(),
            row_id: keys::platform_row_id(&self.repo, key.push_id, &key.name, &key.option),
            groups: Vec::new(),
        };
        self.platforms.insert(key.clone(), node);

        if let Some(push) = self.push_nodes.get_mut(&key.push_id) {
            push.platforms.push(key.clone());
            push.platforms.sort_by(|a, b| {
                keys::compare_platforms((&a.name, &a.option), (&b.name, &b.option))
            });
        }
        debug!(push_id = key.push_id, platform = %key.name, option = %key.option, "Created platform");
        true
    }

    /// Find or create the group for `key`. Returns true if created.
    pub(super) fn ensure_group(&mut self, key: &GroupKey, name: &str) -> bool {
        if self.groups.contains_key(key) {
            return false;
        }
        self.ensure_platform(&key.platform);

        let map_key = key.map_key();
        let node = GroupNode {
            platform: key.platform.clone(),
            symbol: key.symbol.clone(),
            name: name.to_string(),
            tier: key.tier,
            map_key: map_key.clone(),
            jobs: Vec::new(),
        };
        self.groups.insert(key.clone(), node);
        self.group_map.insert(map_key, key.clone());

        if let Some(platform) = self.platforms.get_mut(&key.platform) {
            platform.groups.push(key.clone());
            platform.groups.sort_by(compare_groups);
        }
        debug!(push_id = key.platform.push_id, symbol = %key.symbol, "Created group");
        true
    }

    pub(super) fn add_job_to_group(&mut self, job_id: JobId, key: &GroupKey) {
        if let Some(group) = self.groups.get_mut(key) {
            if !group.jobs.contains(&job_id) {
                group.jobs.push(job_id);
            }
        }
        self.sort_group_jobs(key);
    }

    pub(super) fn remove_job_from_group(&mut self, job_id: JobId, key: &GroupKey) {
        if let Some(group) = self.groups.get_mut(key) {
            group.jobs.retain(|id| *id != job_id);
        }
    }

    pub(super) fn sort_group_jobs(&mut self, key: &GroupKey) {
        let jobs = &self.jobs;
        let job_map = &self.job_map;
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        let symbol = |id: &JobId| {
            job_map
                .get(id)
                .map(|entry| jobs[entry.slot].job_type_symbol.as_str())
                .unwrap_or_default()
        };
        group
            .jobs
            .sort_by(|a, b| keys::natural_cmp(symbol(a), symbol(b)).then_with(|| a.cmp(b)));
    }
}

fn compare_groups(a: &GroupKey, b: &GroupKey) -> Ordering {
    keys::natural_cmp(&a.symbol, &b.symbol).then_with(|| a.tier.cmp(&b.tier))
}
