//! # Error Taxonomy
//!
//! Every failure in this crate is either locally checkable (returned as
//! a [`KernelError`] or [`SemError`]) or unrecoverable (the process is
//! aborted, because the scheduler invariants can no longer hold). There
//! are no retries anywhere: this subsystem sits below anything that
//! could meaningfully retry.
//!
//! Invariant violations inside the semaphore (`value >= 0`, `value <= 1`
//! in mutual-exclusion use) are enforced with assertions, not error
//! values — they indicate a logic bug in the core, not a runtime
//! condition a caller could handle.

use thiserror::Error;

/// Errors reported by the kernel's thread-management surface.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The thread table already holds [`MAX_THREADS`] entries.
    ///
    /// [`MAX_THREADS`]: crate::config::MAX_THREADS
    #[error("thread table is full ({max} threads)")]
    TableFull {
        /// The fixed table capacity.
        max: usize,
    },

    /// `run()` was called with an empty thread table.
    #[error("no threads have been spawned")]
    NoThreads,

    /// The requested stack cannot hold a signal frame plus the
    /// scheduler frames that run on a preempted thread's stack.
    #[error("stack size {requested} below minimum {min}")]
    StackTooSmall {
        /// The rejected size.
        requested: usize,
        /// The enforced lower bound.
        min: usize,
    },

    /// Installing the signal handler or arming the interval timer
    /// failed. Carries the OS error from `sigaction`/`setitimer`.
    #[error("timer setup failed: {0}")]
    Timer(#[from] std::io::Error),
}

/// Errors reported by [`SpinSemaphore::init`].
///
/// [`SpinSemaphore::init`]: crate::sem::SpinSemaphore::init
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SemError {
    /// A semaphore cannot start with a negative value.
    #[error("invalid initial semaphore value {0}")]
    InvalidValue(i32),

    /// The semaphore still has threads queued on it; re-initializing
    /// now would strand them forever.
    #[error("semaphore has {0} blocked threads")]
    Busy(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render() {
        let e = KernelError::StackTooSmall {
            requested: 4096,
            min: 16 * 1024,
        };
        assert!(e.to_string().contains("4096"));

        let e = SemError::InvalidValue(-3);
        assert!(e.to_string().contains("-3"));
    }
}
