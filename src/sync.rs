//! # Synchronization Primitives
//!
//! Two building blocks keep shared scheduler and semaphore state
//! consistent under asynchronous preemption:
//!
//! - [`RawSpinLock`] — a busy-wait lock acquired with an atomic
//!   exchange. The semaphore's internals are protected by this lock
//!   *instead of* signal masking, on purpose: the timer may preempt a
//!   logical thread while it holds the lock, and any other thread that
//!   then attempts the same semaphore operation must observe the lock
//!   held and keep spinning until the holder is rescheduled and
//!   releases it. That interaction is part of the concurrency model,
//!   not an accident. A holder starved indefinitely by round-robin
//!   would starve its contenders too; that is an accepted limitation
//!   of the design.
//!
//! - [`block_preemption`] / [`restore_preemption`] — the critical
//!   section for *scheduler* state. Every thread-table mutation and
//!   every context switch runs with `SIGALRM` masked. The timer
//!   handler is entered with the signal masked automatically; voluntary
//!   paths mask it explicitly first. A switched-out thread's saved mask
//!   is reinstalled by whichever path resumes it: `restore_preemption`
//!   after its own `switch_context` call returns, the entry trampoline
//!   for a fresh thread, or `sigreturn` for a preempted signal frame.

use core::sync::atomic::{AtomicBool, Ordering};
use std::mem;
use std::ptr;

// ---------------------------------------------------------------------------
// Raw spin-lock
// ---------------------------------------------------------------------------

/// A busy-wait mutual-exclusion word.
///
/// `acquire` loops on an atomic exchange until it observes the lock
/// free; it never blocks and never touches the scheduler. `release` is
/// a plain store. No poisoning, no guards — the semaphore needs to
/// release the lock *before* it context-switches away, which an RAII
/// guard cannot express.
pub struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    /// A new, unheld lock.
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Spin until the exchange observes the lock free, then hold it.
    #[inline]
    pub fn acquire(&self) {
        while self.locked.swap(true, Ordering::Acquire) {
            core::hint::spin_loop();
        }
    }

    /// Release the lock. The caller must hold it.
    #[inline]
    pub fn release(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Whether the lock is currently held. Advisory only.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Preemption masking
// ---------------------------------------------------------------------------

/// The signal mask in force before [`block_preemption`].
///
/// Opaque wrapper so callers cannot forget where the set came from.
#[derive(Clone, Copy)]
pub struct PreemptGuard {
    prev: libc::sigset_t,
}

fn alarm_set() -> libc::sigset_t {
    unsafe {
        let mut set = mem::zeroed::<libc::sigset_t>();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGALRM);
        set
    }
}

/// Mask `SIGALRM` on the calling OS thread and return the previous
/// mask. Pair with [`restore_preemption`]; the pairing may straddle a
/// context switch, in which case the restore runs only when this
/// logical thread is resumed.
pub fn block_preemption() -> PreemptGuard {
    let set = alarm_set();
    let mut prev = unsafe { mem::zeroed::<libc::sigset_t>() };
    unsafe {
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut prev);
    }
    PreemptGuard { prev }
}

/// Reinstall the mask captured by [`block_preemption`].
pub fn restore_preemption(guard: &PreemptGuard) {
    unsafe {
        libc::pthread_sigmask(libc::SIG_SETMASK, &guard.prev, ptr::null_mut());
    }
}

/// Unconditionally unmask `SIGALRM`. Used by the entry trampoline: a
/// fresh logical thread is always switched to with the signal masked
/// and has no saved mask of its own to restore.
pub fn unblock_preemption() {
    let set = alarm_set();
    unsafe {
        libc::pthread_sigmask(libc::SIG_UNBLOCK, &set, ptr::null_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_lock_exchange_semantics() {
        let lock = RawSpinLock::new();
        assert!(!lock.is_locked());
        lock.acquire();
        assert!(lock.is_locked());
        lock.release();
        assert!(!lock.is_locked());
        // Re-acquirable after release.
        lock.acquire();
        lock.release();
    }

    #[test]
    fn mask_round_trip() {
        let guard = block_preemption();
        // SIGALRM is now blocked on this thread.
        let mut cur = unsafe { mem::zeroed::<libc::sigset_t>() };
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, ptr::null(), &mut cur);
            assert_eq!(libc::sigismember(&cur, libc::SIGALRM), 1);
        }
        restore_preemption(&guard);
    }
}
