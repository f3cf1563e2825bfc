//! Compile-time tuning constants for the scheduler core.

/// Maximum number of tasks the run queue can hold at once.
pub const NPROC: usize = 64;

/// Scheduling latency target for one full epoch, in ticks.
///
/// When fewer than `NPROC` tasks are runnable the epoch is stretched to at
/// least this many ticks so that a small number of tasks each get a
/// reasonably sized slice instead of being starved by rounding.
pub const LATENCY: u64 = (NPROC as u64) / 2;

/// Floor on how long a task must run before it can be preempted again.
pub const MIN_GRANULARITY: u64 = 2;

/// Lowest (highest-priority) nice value accepted.
pub const NICE_MIN: i32 = 0;

/// Highest (lowest-priority) nice value accepted.
pub const NICE_MAX: i32 = 30;

/// Weight assigned to a `nice = 0` task; the reference point every other
/// weight is scaled from.
pub const NICE_0_WEIGHT: u32 = 1024;
