//! Preemption decision function (component C4).

use crate::config::MIN_GRANULARITY;
use crate::task::{Task, TaskState};

/// Decide whether the currently `RUNNING` task should be preempted in
/// favor of `candidate`, the tree's current minimum (or `None` if the
/// tree is empty).
///
/// The `min_granularity` floor on both branches exists to stop two tasks
/// with nearly equal vruntimes from thrashing the CPU back and forth.
pub fn should_preempt(current: &Task, candidate: Option<&Task>) -> bool {
    let r = current.current_runtime();
    let s = current.max_exec_time();
    let g = MIN_GRANULARITY;

    if r >= s && r >= g {
        return true;
    }

    if let Some(c) = candidate {
        if c.state() == TaskState::Runnable && current.vruntime() > c.vruntime() {
            if r == 0 {
                return true;
            }
            if r >= g {
                return true;
            }
        }
    }

    false
}
