//! # Spin-Lock Semaphore
//!
//! A blocking semaphore built directly on the scheduler. Its critical
//! section is a raw busy-wait lock — not an OS primitive and not
//! signal masking — and its blocked waiters are held in a bounded FIFO
//! queue of thread ids.
//!
//! ## Why a spin-lock
//!
//! Exactly one logical thread executes at any instant, but the timer
//! can preempt a thread *while it holds the lock*. Another thread then
//! scheduled into the same semaphore operation observes the lock held
//! and spins until the original holder is rescheduled and releases it.
//! The timer handler itself never touches semaphore state, so the lock
//! is always eventually released. A holder starved indefinitely by
//! round-robin would stall its contenders; that is a known, accepted
//! property of the design.
//!
//! ## Wake ordering
//!
//! `wait` on an unavailable semaphore queues the caller and yields via
//! the scheduler's round-robin scan (the successor is unknown). `post`
//! with waiters dequeues the FIFO front and performs a *direct* switch
//! to it — the woken thread must run next to preserve strict
//! first-blocked-first-woken order, independent of round-robin
//! position.
//!
//! ```text
//!   Runnable ──wait, value == 0──► Blocked-queued
//!      ▲                                │
//!      └──────dequeued by a post────────┘
//! ```
//!
//! A thread never leaves the queue on its own; only a `post` elsewhere
//! can unblock it.

use core::cell::UnsafeCell;

use crate::config::MAX_THREADS;
use crate::error::SemError;
use crate::sync::{self, RawSpinLock};
use crate::task::ThreadState;

/// State behind the spin-lock. Touched only while the lock is held,
/// except for the advisory [`SpinSemaphore::value`] snapshot.
struct SemState {
    /// Current semaphore value. Always ≥ 0; ≤ 1 in mutual-exclusion
    /// use (both assertion-enforced).
    value: i32,
    /// Number of queued waiters.
    blocked: usize,
    /// Circular FIFO of blocked thread ids.
    queue: [usize; MAX_THREADS],
    /// Dequeue position.
    front: usize,
    /// Enqueue position.
    back: usize,
}

/// Counting/binary semaphore whose waiters block by yielding the
/// logical CPU to the scheduler.
///
/// Const-constructible so workloads can share it through a `static`,
/// which is also the only way a plain `fn(usize)` task entry can reach
/// it.
pub struct SpinSemaphore {
    lock: RawSpinLock,
    inner: UnsafeCell<SemState>,
}

// The inner state is only mutated under the spin-lock, and only ever
// from the single OS thread that runs the logical-thread pool.
unsafe impl Sync for SpinSemaphore {}

impl SpinSemaphore {
    /// A semaphore with the given initial value. Use `1` for a binary
    /// mutex.
    pub const fn new(value: i32) -> Self {
        Self {
            lock: RawSpinLock::new(),
            inner: UnsafeCell::new(SemState {
                value,
                blocked: 0,
                queue: [0; MAX_THREADS],
                front: 0,
                back: 0,
            }),
        }
    }

    /// Re-initialize to `value`, emptying the queue and clearing the
    /// lock.
    ///
    /// Fails without side effects if `value` is negative, or if
    /// threads are still queued — re-initializing under them would
    /// strand them blocked forever. Both failures are local and
    /// checkable; neither aborts anything.
    pub fn init(&self, value: i32) -> Result<(), SemError> {
        if value < 0 {
            return Err(SemError::InvalidValue(value));
        }
        self.lock.acquire();
        let state = unsafe { &mut *self.inner.get() };
        if state.blocked > 0 {
            let blocked = state.blocked;
            self.lock.release();
            return Err(SemError::Busy(blocked));
        }
        state.value = value;
        state.front = 0;
        state.back = 0;
        self.lock.release();
        Ok(())
    }

    /// Down operation. Returns immediately with the semaphore consumed
    /// if it was available; otherwise queues the calling logical
    /// thread and yields until a [`post`](Self::post) dequeues it.
    ///
    /// # Panics
    /// Asserts `value >= 0` on entry — a violation is a logic bug in
    /// this module, not a runtime condition.
    ///
    /// # Aborts
    /// A full wait queue means more concurrent waiters than the system
    /// was sized for ([`MAX_THREADS`]); that configuration error is
    /// unrecoverable and aborts the process.
    pub fn wait(&self) {
        self.lock.acquire();
        let state = unsafe { &mut *self.inner.get() };
        assert!(state.value >= 0, "semaphore value went negative");

        if state.value > 0 {
            // Binary-semaphore boundary semantics: an available
            // semaphore is consumed straight to zero. A counting
            // generalization would decrement by one instead.
            state.value = 0;
            self.lock.release();
            return;
        }

        if state.blocked == MAX_THREADS {
            self.lock.release();
            log::error!(
                "semaphore wait queue overflow: more than {MAX_THREADS} concurrent waiters"
            );
            std::process::abort();
        }

        // Unavailable: queue ourselves and give up the CPU. The
        // scheduler bookkeeping below (status change and hand-off)
        // runs with the timer masked so a tick cannot strand a thread
        // that is marked blocked but still holds the lock.
        let guard = sync::block_preemption();
        let sched = unsafe { crate::kernel::scheduler() }
            .expect("semaphore wait outside a running scheduler");
        let me = sched.current;

        state.queue[state.back] = me;
        state.back = (state.back + 1) % MAX_THREADS;
        state.blocked += 1;
        sched.threads[me].state = ThreadState::Blocked;
        self.lock.release();

        // Scan-based hand-off: the next runnable thread is unknown
        // here. We resume at this point when a post direct-switches
        // back to us; re-entering the critical section is not needed —
        // being dequeued *is* the grant.
        sched.preempt(me);
        sync::restore_preemption(&guard);
    }

    /// Up operation. Wakes the longest-blocked waiter with a direct
    /// switch, or makes the semaphore available if nobody is queued.
    ///
    /// # Panics
    /// Asserts `value <= 1` on entry: this variant is restricted to
    /// mutual-exclusion use, where `post` only ever follows a matching
    /// `wait`. A counting semaphore would relax this bound.
    pub fn post(&self) {
        self.lock.acquire();
        let state = unsafe { &mut *self.inner.get() };
        assert!(state.value <= 1, "semaphore posted above mutual-exclusion bound");

        if state.value == 0 && state.blocked > 0 {
            let guard = sync::block_preemption();
            let woken = state.queue[state.front];
            state.front = (state.front + 1) % MAX_THREADS;
            state.blocked -= 1;
            self.lock.release();

            // Deterministic wake path: the dequeued thread must run
            // next to preserve FIFO order, so bypass the round-robin
            // scan entirely. The value stays 0 — being woken hands the
            // semaphore straight to the waiter.
            let sched = unsafe { crate::kernel::scheduler() }
                .expect("semaphore post outside a running scheduler");
            let me = sched.current;
            sched.direct_switch(me, woken);
            sync::restore_preemption(&guard);
            return;
        }

        if state.value == 0 {
            state.value = 1;
        }
        self.lock.release();
    }

    /// Advisory snapshot of the current value, read without the lock.
    /// Not safe to base synchronization decisions on.
    pub fn value(&self) -> i32 {
        unsafe { (*self.inner.get()).value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Blocking paths need a running scheduler and are covered by the
    // integration tests; these exercise the lock-protected fast paths.

    #[test]
    fn available_wait_consumes_to_zero() {
        let sem = SpinSemaphore::new(1);
        sem.wait();
        assert_eq!(sem.value(), 0);
        assert!(!sem.lock.is_locked());
    }

    #[test]
    fn post_without_waiters_restores_one() {
        let sem = SpinSemaphore::new(1);
        sem.wait();
        sem.post();
        assert_eq!(sem.value(), 1);
        // Reusable as a mutex.
        sem.wait();
        assert_eq!(sem.value(), 0);
    }

    #[test]
    fn init_rejects_negative_value() {
        let sem = SpinSemaphore::new(1);
        assert_eq!(sem.init(-1), Err(SemError::InvalidValue(-1)));
        // Untouched on failure.
        assert_eq!(sem.value(), 1);
    }

    #[test]
    fn init_resets_value() {
        let sem = SpinSemaphore::new(0);
        sem.init(1).unwrap();
        assert_eq!(sem.value(), 1);
        sem.wait();
        assert_eq!(sem.value(), 0);
    }

    #[test]
    #[should_panic(expected = "mutual-exclusion bound")]
    fn post_above_bound_asserts() {
        let sem = SpinSemaphore::new(2);
        // value is already 2 > 1: the mutual-exclusion bound check
        // fires before any state is touched.
        sem.post();
    }
}
