//! Core of a CFS-style process scheduler: a red-black tree of runnable
//! tasks ordered by virtual runtime, the weight/time-slice arithmetic
//! that turns niceness into proportional CPU share, the preemption
//! oracle, and the per-CPU scheduling loop that ties them together.
//!
//! Everything about process lifecycle, address spaces, file tables, and
//! the actual context-switch primitive lives outside this crate; it is
//! consumed here only through the small [`processor::Cpu`] trait and the
//! task fields listed on [`task::Task`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod preempt;
pub mod processor;
pub mod rbtree;
pub mod sync;
pub mod task;
pub mod time;
pub mod transitions;
pub mod weight;

pub use error::{SchedError, SchedResult};
pub use preempt::should_preempt;
pub use processor::Cpu;
pub use rbtree::RunQueue;
pub use sync::RunQueueLock;
pub use task::{Task, TaskId, TaskState};
pub use weight::weight_of;

lazy_static::lazy_static! {
    /// The kernel-wide run queue. Mirrors the teacher's own global
    /// singletons (`PROCESSORS`, `PID_ALLOCATOR`): one lazily-initialized
    /// `Mutex`-guarded instance rather than a value the embedder has to
    /// thread through every call site.
    pub static ref RUN_QUEUE: RunQueueLock = sync::new_run_queue_lock();
}
