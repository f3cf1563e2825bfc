//! Per-CPU scheduler loop (component C5).
//!
//! The actual context switch, address-space install, and trap-frame
//! plumbing are external collaborators; this module only owns the
//! decision points - extract, stamp, switch - behind the `Cpu` trait, so
//! the loop's control flow (and its tests) stay free of any
//! architecture dependency.

use alloc::sync::Arc;
use log::info;

use crate::sync::RunQueueLock;
use crate::task::{Task, TaskState};

/// What an embedding kernel supplies to actually run a task. Everything
/// below `switch_to` - the `swtch` primitive, trap frame setup, address
/// space install - is out of scope for the core.
pub trait Cpu {
    /// Switch execution to `task`. Returns once `task` has yielded,
    /// blocked, exited, or been preempted and control has returned to
    /// the scheduler.
    fn switch_to(&mut self, task: &Arc<Task>);
}

/// One iteration of the scheduler loop: extract the tree's minimum,
/// install it as `RUNNING`, and switch to it.
///
/// Returns `false` if the run queue was empty (the caller should idle
/// and retry). The lock is held only across `extract_min`, not across
/// `switch_to` itself: holding it across the real architecture-level
/// `swtch` instruction is a property of that opaque primitive (and its
/// assembly-level lock release), not of this loop - see DESIGN.md.
pub fn schedule_once(lock: &RunQueueLock, cpu: &mut dyn Cpu) -> bool {
    let task = {
        let mut rq = lock.lock();
        match rq.extract_min() {
            Some(t) => t,
            None => return false,
        }
    };

    info!("scheduling task {:?}: installing as RUNNING", task.id());
    task.set_state(TaskState::Running);
    task.set_current_runtime(0);
    cpu.switch_to(&task);
    info!("task {:?} returned control to the scheduler", task.id());
    true
}

/// The steady-state per-CPU loop: repeatedly call `schedule_once`,
/// letting the caller decide what idling between empty iterations means
/// on its hardware. Not exercised by the test suite - it never returns
/// on a real CPU, so it is a thin wrapper over the tested primitive
/// above.
pub fn run_forever(lock: &RunQueueLock, cpu: &mut dyn Cpu, idle: impl Fn()) -> ! {
    loop {
        if !schedule_once(lock, cpu) {
            idle();
        }
    }
}
