//! Per-tick time accounting (component C3).

use alloc::sync::Arc;

use crate::config::NICE_0_WEIGHT;
use crate::task::Task;

/// Called once per timer tick for the currently `RUNNING` task.
/// Advances both the real tick counter and the virtual runtime; the
/// latter grows slower for heavier (lower-nice) tasks, which is the
/// entire mechanism behind proportional-share scheduling.
pub fn on_tick(task: &Task) {
    task.set_current_runtime(task.current_runtime() + 1);
    let delta = delta_vruntime(1, task.weight());
    task.set_vruntime(task.vruntime() + delta);
}

/// Virtual runtime charged for `real_ticks` real ticks at the given
/// weight, scaled against the `nice = 0` reference weight and rounded up
/// so vruntime is always strictly increasing.
pub fn delta_vruntime(real_ticks: u64, weight: u32) -> u64 {
    let weight = weight.max(1) as u64;
    let numerator = real_ticks * NICE_0_WEIGHT as u64;
    (numerator + weight - 1) / weight
}

/// Raise a waking task's vruntime to the tree's current minimum so a
/// long-sleeping task cannot monopolize the CPU the instant it wakes.
/// `tree_min_vruntime` is `None` when the tree is empty, in which case
/// the task's own vruntime is left untouched.
pub fn apply_wakeup_floor(task: &Arc<Task>, tree_min_vruntime: Option<u64>) {
    if let Some(floor) = tree_min_vruntime {
        if task.vruntime() < floor {
            task.set_vruntime(floor);
        }
    }
}
