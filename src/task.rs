//! The task record fields consumed by the scheduler core.
//!
//! Everything else about a task (page tables, kernel stack, open files,
//! trap frame, ...) belongs to external collaborators and is opaque here.
//! Mutable scalar fields live in one `TaskInner` guarded by a `spin::Mutex`,
//! the same shape the embedding kernel uses for its own task control block
//! (`TaskControlBlock { inner: Mutex<TaskControlBlockInner>, .. }`,
//! accessed through `acquire_inner_lock()`); accessor methods here play
//! the role its `state()`/`set_state()` pair does.

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::config::{NICE_MAX, NICE_MIN};
use crate::error::{SchedError, SchedResult};
use crate::weight::weight_of;

/// Lifecycle state of a task, as observed by the scheduler core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Unused = 0,
    Embryo = 1,
    Sleeping = 2,
    Runnable = 3,
    Running = 4,
    Zombie = 5,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Unused => "UNUSED",
            TaskState::Embryo => "EMBRYO",
            TaskState::Sleeping => "SLEEPING",
            TaskState::Runnable => "RUNNABLE",
            TaskState::Running => "RUNNING",
            TaskState::Zombie => "ZOMBIE",
        };
        f.write_str(s)
    }
}

/// Opaque index into the run queue's task arena.
///
/// Red-black links are stored as a side table of these indices inside the
/// run queue itself, not as pointers embedded in `Task` - see
/// `rbtree::RunQueue` for why.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub usize);

struct TaskInner {
    state: TaskState,
    nice: i32,
    weight: u32,
    vruntime: u64,
    current_runtime: u64,
    max_exec_time: u64,
}

/// The scheduler's view of a task.
///
/// Mutable fields are private behind accessor methods and live in a
/// single `Mutex<TaskInner>`, so no `unsafe impl Send`/`Sync` is needed:
/// `spin::Mutex<T>` is already `Send + Sync` for any `Send` `T`.
pub struct Task {
    id: TaskId,
    inner: Mutex<TaskInner>,
    /// Whether the task currently occupies a slot in some `RunQueue`.
    /// Checked (not just asserted) by `RunQueue::insert` to catch a
    /// double-enqueue before it corrupts the tree - see `rbtree.rs`.
    queued: AtomicBool,
    killed: AtomicBool,
}

impl Task {
    /// Construct a new task in the `EMBRYO` state with the given nice
    /// value. Returns an error if `nice` is out of `[NICE_MIN, NICE_MAX]`;
    /// unlike the internal weight lookup, this is a caller-facing
    /// constructor and a bad nice value from a syscall is not a
    /// programmer bug, so it is rejected rather than silently clamped.
    pub fn new(id: TaskId, nice: i32) -> SchedResult<Self> {
        if !(NICE_MIN..=NICE_MAX).contains(&nice) {
            return Err(SchedError::NiceOutOfRange(nice));
        }
        Ok(Task {
            id,
            inner: Mutex::new(TaskInner {
                state: TaskState::Embryo,
                nice,
                weight: weight_of(nice),
                vruntime: 0,
                current_runtime: 0,
                max_exec_time: 0,
            }),
            queued: AtomicBool::new(false),
            killed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    pub fn set_state(&self, s: TaskState) {
        self.inner.lock().state = s;
    }

    pub fn nice(&self) -> i32 {
        self.inner.lock().nice
    }

    /// Re-nice the task, recomputing its cached weight to match.
    pub fn set_nice(&self, nice: i32) -> SchedResult<()> {
        if !(NICE_MIN..=NICE_MAX).contains(&nice) {
            return Err(SchedError::NiceOutOfRange(nice));
        }
        let mut inner = self.inner.lock();
        inner.nice = nice;
        inner.weight = weight_of(nice);
        Ok(())
    }

    pub fn weight(&self) -> u32 {
        self.inner.lock().weight
    }

    pub fn vruntime(&self) -> u64 {
        self.inner.lock().vruntime
    }

    pub fn set_vruntime(&self, v: u64) {
        self.inner.lock().vruntime = v;
    }

    pub fn current_runtime(&self) -> u64 {
        self.inner.lock().current_runtime
    }

    pub fn set_current_runtime(&self, r: u64) {
        self.inner.lock().current_runtime = r;
    }

    pub fn max_exec_time(&self) -> u64 {
        self.inner.lock().max_exec_time
    }

    pub fn set_max_exec_time(&self, t: u64) {
        self.inner.lock().max_exec_time = t;
    }

    /// Whether this task currently occupies a slot in a `RunQueue`.
    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::Acquire)
    }

    /// Claim tree membership, returning `false` if it was already
    /// claimed (a double-insert attempt).
    pub(crate) fn mark_queued(&self) -> bool {
        !self.queued.swap(true, Ordering::AcqRel)
    }

    /// Release tree membership on extraction.
    pub(crate) fn mark_dequeued(&self) {
        self.queued.store(false, Ordering::Release);
    }

    /// Observed by the scheduler loop on return to user mode; the rest of
    /// `kill(pid)` (signal delivery, exit status, ...) is external.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    pub fn mark_killed(&self) {
        self.killed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_nice() {
        assert_eq!(Task::new(TaskId(0), -1).unwrap_err(), SchedError::NiceOutOfRange(-1));
        assert_eq!(Task::new(TaskId(0), 31).unwrap_err(), SchedError::NiceOutOfRange(31));
    }

    #[test]
    fn new_task_starts_embryo_with_matching_weight() {
        let t = Task::new(TaskId(3), 5).unwrap();
        assert_eq!(t.state(), TaskState::Embryo);
        assert_eq!(t.weight(), weight_of(5));
        assert_eq!(t.vruntime(), 0);
    }

    #[test]
    fn renice_updates_cached_weight() {
        let t = Task::new(TaskId(0), 0).unwrap();
        assert_eq!(t.weight(), 1024);
        t.set_nice(10).unwrap();
        assert_eq!(t.nice(), 10);
        assert_eq!(t.weight(), weight_of(10));
    }

    #[test]
    fn killed_flag_is_observable() {
        let t = Task::new(TaskId(0), 0).unwrap();
        assert!(!t.is_killed());
        t.mark_killed();
        assert!(t.is_killed());
    }

    #[test]
    fn queued_flag_rejects_double_claim() {
        let t = Task::new(TaskId(0), 0).unwrap();
        assert!(!t.is_queued());
        assert!(t.mark_queued());
        assert!(t.is_queued());
        assert!(!t.mark_queued(), "a second claim must fail");
        t.mark_dequeued();
        assert!(!t.is_queued());
        assert!(t.mark_queued());
    }
}
