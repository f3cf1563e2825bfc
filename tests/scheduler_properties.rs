//! Property-based and scenario-level tests for the scheduler core.
//!
//! Inline `#[cfg(test)]` modules next to each source file exercise unit
//! behavior; this file exercises the cross-module invariants (P1-P4),
//! the round-trip laws (R1-R2), and the worked scenarios from the
//! scheduler's testable-properties section that need more than one
//! module to set up.

use std::sync::Arc;

use cfs_core::config::{LATENCY, MIN_GRANULARITY, NPROC};
use cfs_core::rbtree::RunQueue;
use cfs_core::task::{Task, TaskId, TaskState};
use cfs_core::time::delta_vruntime;
use cfs_core::preempt::should_preempt;
use proptest::prelude::*;

fn make_runnable(id: usize, nice: i32, vruntime: u64) -> Arc<Task> {
    let t = Arc::new(Task::new(TaskId(id), nice).unwrap());
    t.set_state(TaskState::Runnable);
    t.set_vruntime(vruntime);
    t
}

#[derive(Debug, Clone)]
enum Op {
    Insert { nice: i32, vruntime: u64 },
    ExtractMin,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..=30i32, 0u64..500).prop_map(|(nice, vruntime)| Op::Insert { nice, vruntime }),
        Just(Op::ExtractMin),
    ]
}

proptest! {
    /// P1-P4: after any sequence of inserts/extracts, the tree's order,
    /// red-black balance, count/weight bookkeeping, and min-cache all
    /// hold.
    #[test]
    fn invariants_hold_after_random_operations(ops in proptest::collection::vec(op_strategy(), 0..200)) {
        let mut rq = RunQueue::new();
        let mut next_id = 0usize;
        for op in ops {
            match op {
                Op::Insert { nice, vruntime } => {
                    next_id += 1;
                    let t = make_runnable(next_id, nice, vruntime);
                    rq.insert(t);
                }
                Op::ExtractMin => {
                    rq.extract_min();
                }
            }
            prop_assert!(rq.debug_validate().is_ok());
        }
    }

    /// R2: regardless of insertion order, extracting until empty yields
    /// vruntimes in non-decreasing order.
    #[test]
    fn extraction_order_is_non_decreasing_regardless_of_insertion_order(
        mut vruntimes in proptest::collection::vec(0u64..1000, 1..(NPROC - 1))
    ) {
        let mut rq = RunQueue::new();
        for (i, v) in vruntimes.iter().enumerate() {
            rq.insert(make_runnable(i, 0, *v));
        }
        vruntimes.sort_unstable();
        let mut observed = Vec::new();
        while let Some(t) = rq.extract_min() {
            observed.push(t.vruntime());
        }
        prop_assert_eq!(observed, vruntimes);
    }
}

/// R1: a single inserted task with a strictly smallest vruntime comes
/// back out unchanged when nothing else intervenes.
#[test]
fn round_trip_single_task() {
    let mut rq = RunQueue::new();
    let peer = make_runnable(0, 0, 50);
    rq.insert(peer);
    let t = make_runnable(1, 0, 5);
    let id = t.id();
    rq.insert(t);
    let out = rq.extract_min().unwrap();
    assert_eq!(out.id(), id);
    assert_eq!(out.vruntime(), 5);
}

/// Scenario 3: nice skew should produce roughly proportional selection
/// counts over many rounds.
#[test]
fn nice_skew_produces_proportional_share() {
    let mut rq = RunQueue::new();
    let a = make_runnable(0, 0, 0); // weight 1024
    let b = make_runnable(1, 5, 0); // weight 335
    let a_weight = a.weight() as u64;
    let b_weight = b.weight() as u64;
    rq.insert(a.clone());
    rq.insert(b.clone());

    let mut a_runs = 0u64;
    let mut b_runs = 0u64;
    for _ in 0..400 {
        let picked = rq.extract_min().unwrap();
        if picked.id() == a.id() {
            a_runs += 1;
        } else {
            b_runs += 1;
        }
        // Charge one burst's worth of ticks as if the task ran its slice.
        let ticks = picked.max_exec_time().max(1);
        let delta = delta_vruntime(ticks, picked.weight());
        picked.set_vruntime(picked.vruntime() + delta);
        picked.set_current_runtime(0);
        rq.insert(picked);
    }

    let observed_ratio = a_runs as f64 / b_runs as f64;
    let expected_ratio = a_weight as f64 / b_weight as f64;
    assert!(
        (observed_ratio - expected_ratio).abs() / expected_ratio < 0.35,
        "observed {} vs expected {}",
        observed_ratio,
        expected_ratio
    );
}

/// Scenario 5: a task waking after a long sleep has its vruntime raised
/// to the tree minimum rather than starving whoever kept running.
#[test]
fn sleep_wake_does_not_starve_the_runnable_peer() {
    let mut rq = RunQueue::new();
    let a = make_runnable(0, 0, 100);
    rq.insert(a.clone());

    let b = Arc::new(Task::new(TaskId(1), 0).unwrap());
    b.set_state(TaskState::Sleeping);
    b.set_vruntime(0);

    let floor = rq.peek_min().map(|t| t.vruntime());
    assert_eq!(floor, Some(100));
    cfs_core::time::apply_wakeup_floor(&b, floor);
    b.set_state(TaskState::Runnable);
    rq.insert(b.clone());

    // From here on, neither task should run twice in a row before the
    // other gets a turn, since they are now at the same vruntime.
    let first = rq.extract_min().unwrap();
    assert_eq!(first.id(), a.id());
}

/// Scenario 6: the preemption floor blocks eviction before
/// `min_granularity` ticks have run, and allows it once reached.
#[test]
fn preemption_floor_matches_worked_scenario() {
    let current = Task::new(TaskId(0), 0).unwrap();
    current.set_state(TaskState::Running);
    current.set_vruntime(10);
    current.set_max_exec_time(LATENCY);
    current.set_current_runtime(1);

    let candidate = Task::new(TaskId(1), 0).unwrap();
    candidate.set_state(TaskState::Runnable);
    candidate.set_vruntime(5);

    assert!(!should_preempt(&current, Some(&candidate)));
    current.set_current_runtime(MIN_GRANULARITY);
    assert!(should_preempt(&current, Some(&candidate)));
}
