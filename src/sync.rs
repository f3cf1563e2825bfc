//! The single lock the scheduler core acquires.
//!
//! The concurrency model calls for exactly one spinlock shared by every
//! CPU, protecting the run queue tree and its aggregates. That does not
//! need a bespoke guard type on top of it - a plain `spin::Mutex`, the
//! same primitive the embedding kernel uses for its own per-CPU and
//! global singletons, is the lock itself.

use spin::Mutex;

use crate::rbtree::RunQueue;

/// The scheduler core's one lock. Held across `extract_min`/`insert` and,
/// by convention, across the context-switch instruction itself: the
/// task switched to is responsible for releasing it once it no longer
/// needs the run queue.
pub type RunQueueLock = Mutex<RunQueue>;

pub fn new_run_queue_lock() -> RunQueueLock {
    Mutex::new(RunQueue::new())
}
