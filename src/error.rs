//! Error types for the few genuinely fallible, externally observable
//! operations in the scheduler core.
//!
//! Everything else reports through sentinels (`Option`, `bool`) as laid out
//! in the core's error-handling design; wrong-nesting and wrong-state
//! conditions are programmer errors and panic rather than returning a
//! `Result`.

use core::fmt;

/// Failure constructing or reconfiguring a [`crate::task::Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// A `nice` value fell outside `[NICE_MIN, NICE_MAX]`.
    NiceOutOfRange(i32),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::NiceOutOfRange(n) => write!(f, "nice value {} out of range", n),
        }
    }
}

pub type SchedResult<T> = Result<T, SchedError>;
