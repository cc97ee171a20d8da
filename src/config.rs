//! # Configuration
//!
//! Compile-time constants governing the scheduler and the semaphore.
//! All limits are fixed at compile time — the thread table and the
//! semaphore wait queue are sized by `MAX_THREADS` and never grow.

/// Maximum number of logical threads the scheduler can manage.
/// This bounds the thread table and the semaphore wait queue. A
/// semaphore can never hold more waiters than the table holds threads,
/// so a full wait queue indicates a misconfigured system.
pub const MAX_THREADS: usize = 16;

/// Default per-thread stack size in bytes.
///
/// Each logical thread owns a private heap-allocated stack. The timer
/// signal is delivered on whatever stack the preempted thread is using,
/// so a stack must hold the deepest call chain of the workload *plus*
/// a full signal frame (including the FPU save area) and the scheduler
/// frames that run on top of it.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Smallest stack size accepted at spawn time. Below this there is no
/// room for the signal frame, and a preemption would silently corrupt
/// adjacent memory.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Stack size for the dedicated cleanup context. Cleanup only marks a
/// thread dead and reschedules, so it needs far less room than a
/// workload stack, but it must still survive a timer frame.
pub const CLEANUP_STACK_SIZE: usize = 32 * 1024;

/// Default preemption quantum in microseconds. The interval timer
/// fires at this fixed period while the scheduler is running. A value
/// of `0` disables the timer entirely, leaving only cooperative
/// scheduling points (semaphore blocking and explicit yields).
pub const DEFAULT_QUANTUM_US: u32 = 2_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_bounds_are_sane() {
        assert!(MIN_STACK_SIZE <= DEFAULT_STACK_SIZE);
        assert!(MIN_STACK_SIZE <= CLEANUP_STACK_SIZE);
    }
}
