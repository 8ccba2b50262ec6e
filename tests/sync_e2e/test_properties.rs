//! Property tests: derived counters and merge idempotence.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use push_sync_lib::models::{FilterSet, Job, JobResult, JobState};
use push_sync_lib::store::PushStore;

use super::helpers::*;

#[derive(Debug, Clone)]
enum Op {
    Merge(Vec<Job>),
    Classify(Vec<i64>, i64),
    Filter(bool),
}

fn arb_job() -> impl Strategy<Value = Job> {
    (
        1i64..30,
        1i64..4,
        prop::sample::select(vec![
            JobResult::Success,
            JobResult::Testfailed,
            JobResult::Busted,
            JobResult::Exception,
            JobResult::Retry,
            JobResult::Unknown,
        ]),
        prop::sample::select(vec![1i64, 2, 4, 7]),
        1i32..4,
        prop::sample::select(vec!["M", "R", "X"]),
        0i64..1_000,
    )
        .prop_map(|(id, push_id, result, fcid, tier, group, modified)| Job {
            result,
            failure_classification_id: fcid,
            tier,
            state: if result == JobResult::Unknown {
                JobState::Running
            } else {
                JobState::Completed
            },
            job_group_symbol: group.to_string(),
            last_modified: at(BASE_TS + modified),
            ..job(id, push_id)
        })
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => prop::collection::vec(arb_job(), 1..10).prop_map(Op::Merge),
        1 => (prop::collection::vec(1i64..30, 1..5), prop::sample::select(vec![1i64, 2, 7]))
            .prop_map(|(ids, fcid)| Op::Classify(ids, fcid)),
        1 => any::<bool>().prop_map(Op::Filter),
    ]
}

fn loaded_store() -> PushStore {
    let mut store = PushStore::new(REPO);
    // Push 3 stays unloaded so some merges hit a missing parent.
    store.append_pushes(vec![push(2, BASE_TS + 120), push(1, BASE_TS + 60)]);
    store
}

proptest! {
    /// The incrementally maintained counters always match a full rescan.
    #[test]
    fn test_counters_match_full_scan(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut store = loaded_store();
        for op in ops {
            match op {
                Op::Merge(jobs) => {
                    store.merge_jobs(jobs);
                }
                Op::Classify(ids, fcid) => {
                    store.classify_jobs(&ids, fcid);
                }
                Op::Filter(unclassified_only) => {
                    let filter = if unclassified_only {
                        FilterSet::unclassified_failures()
                    } else {
                        FilterSet::default().with_tiers([1])
                    };
                    store.set_filter(Arc::new(filter));
                }
            }
            prop_assert_eq!(store.unclassified_counts(), store.audit_unclassified());
            prop_assert!(store.unclassified_failures().all(|j| j.is_unclassified_failure()));
        }
    }

    /// Merging the same batch twice changes nothing the second time.
    #[test]
    fn test_merge_is_idempotent(batch in prop::collection::vec(arb_job(), 1..30)) {
        // One payload per id; a batch carrying two versions of a job is not a fixed point.
        let jobs: Vec<Job> = batch
            .into_iter()
            .map(|j| (j.id, j))
            .collect::<BTreeMap<_, _>>()
            .into_values()
            .collect();
        let mut store = loaded_store();
        store.merge_jobs(jobs.clone());
        let tree = store.tree();
        let counts = store.unclassified_counts();
        let job_count = store.job_count();

        let mut rx = store.subscribe();
        let summary = store.merge_jobs(jobs);
        prop_assert!(summary.is_empty());
        prop_assert!(rx.try_recv().is_err());
        prop_assert_eq!(store.tree(), tree);
        prop_assert_eq!(store.unclassified_counts(), counts);
        prop_assert_eq!(store.job_count(), job_count);
    }
}
