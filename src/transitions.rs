//! Run-queue adapter (component C6): maps the external task-lifecycle
//! transitions onto `RunQueue::insert` / `RunQueue::extract_min`.
//!
//! None of these functions perform the transition's external side
//! effects (address space teardown, signal delivery, wait-channel
//! bookkeeping, ...) - only the piece that touches the run queue.

use alloc::sync::Arc;

use crate::rbtree::RunQueue;
use crate::task::{Task, TaskState};
use crate::time::apply_wakeup_floor;

/// EMBRYO -> RUNNABLE: a freshly forked task becomes schedulable.
pub fn on_fork_complete(rq: &mut RunQueue, task: Arc<Task>) -> bool {
    debug_assert_eq!(task.state(), TaskState::Embryo);
    task.set_state(TaskState::Runnable);
    rq.insert(task)
}

/// SLEEPING -> RUNNABLE: a woken task rejoins the tree with its
/// vruntime raised to the current minimum, so it cannot starve whatever
/// was already running while it slept.
pub fn on_wakeup(rq: &mut RunQueue, task: Arc<Task>) -> bool {
    debug_assert_eq!(task.state(), TaskState::Sleeping);
    let floor = rq.peek_min().map(|t| t.vruntime());
    apply_wakeup_floor(&task, floor);
    task.set_state(TaskState::Runnable);
    rq.insert(task)
}

/// RUNNING -> RUNNABLE: a task gives up the CPU (explicit yield or a
/// preemption decision) while still runnable. Its accumulated vruntime
/// is kept; `current_runtime` resets for the next burst.
pub fn on_preempted_or_yielded(rq: &mut RunQueue, task: Arc<Task>) -> bool {
    debug_assert_eq!(task.state(), TaskState::Running);
    task.set_current_runtime(0);
    task.set_state(TaskState::Runnable);
    rq.insert(task)
}

/// RUNNING -> SLEEPING: the task was not in the tree while running, so
/// there is nothing to remove; only the state changes.
pub fn on_sleep(task: &Task) {
    debug_assert_eq!(task.state(), TaskState::Running);
    task.set_state(TaskState::Sleeping);
}

/// RUNNING -> ZOMBIE: terminal; nothing to do to the run queue.
pub fn on_exit(task: &Task) {
    debug_assert_eq!(task.state(), TaskState::Running);
    task.set_state(TaskState::Zombie);
}

/// `kill(pid)` delivered to a SLEEPING task: force it back to RUNNABLE
/// so it can observe its own kill flag at its next reschedule point,
/// using the same wakeup vruntime floor as a normal wakeup.
pub fn on_kill_sleeping(rq: &mut RunQueue, task: Arc<Task>) -> bool {
    task.mark_killed();
    on_wakeup(rq, task)
}
