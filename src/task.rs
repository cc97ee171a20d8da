//! # Thread Control Block
//!
//! Defines the logical-thread model. A logical thread is one scheduled
//! unit of execution managed entirely in user space: an integer id, an
//! owned stack buffer, a saved execution context, and a status the
//! scheduler consults on every selection.

use crate::arch::Context;

// ---------------------------------------------------------------------------
// Thread state machine
// ---------------------------------------------------------------------------

/// Execution state of a logical thread.
///
/// ```text
///   ┌─────────┐      selected       ┌─────────┐
///   │  Ready  │ ──────────────────► │ Running │
///   └─────────┘                     └─────────┘
///        ▲        preempt / yield        │
///        └───────────────────────────────┤
///        ▲                               │ sem wait, value == 0
///        │ direct switch on post    ┌────▼────┐
///        └───────────────────────── │ Blocked │
///                                   └─────────┘
///                                        │ task returns
///                                   ┌────▼────┐
///                                   │  Dead   │  (terminal)
///                                   └─────────┘
/// ```
///
/// `Dead` is terminal: the round-robin scan skips it unconditionally.
/// `Blocked` is also skipped by the scan; only a semaphore `post` ever
/// moves a thread out of `Blocked`, via a direct switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Runnable and waiting to be selected.
    Ready,
    /// Currently executing. At most one thread is `Running` at any
    /// instant.
    Running,
    /// Queued on a semaphore; invisible to the round-robin scan.
    Blocked,
    /// Finished. Never selected again; its slot is kept so ids stay
    /// stable.
    Dead,
}

// ---------------------------------------------------------------------------
// Thread control block
// ---------------------------------------------------------------------------

/// Per-thread bookkeeping: identity, status, entry point, saved
/// context, and the exclusively owned stack the context runs on.
///
/// The stack buffer lives as long as the TCB; it is released when the
/// scheduler is torn down or re-initialized, never while the thread
/// could still be resumed.
pub struct ThreadControlBlock {
    /// Index in the scheduler's thread table.
    pub id: usize,

    /// Current execution state.
    pub state: ThreadState,

    /// The workload function. Called exactly once with `id`; the
    /// thread dies when it returns.
    pub entry: fn(usize),

    /// Saved execution context. Valid whenever the thread is not
    /// `Running` (filled by the switch that suspended it, or by the
    /// fresh-context initialization before first activation).
    pub(crate) ctx: Context,

    /// Owned stack buffer the context executes on.
    #[allow(dead_code)]
    stack: Box<[u8]>,
}

impl ThreadControlBlock {
    /// Build a ready-to-run TCB whose context enters `trampoline` on a
    /// freshly allocated stack of `stack_size` bytes.
    ///
    /// The trampoline (not `entry` itself) is planted as the context
    /// entry point: it fetches `id` and `entry` from the scheduler,
    /// unmasks the timer signal, runs the workload, and falls through
    /// into the cleanup context when the workload returns.
    pub fn new(
        id: usize,
        entry: fn(usize),
        stack_size: usize,
        trampoline: extern "C" fn() -> !,
    ) -> Self {
        let mut stack = vec![0u8; stack_size].into_boxed_slice();
        let ctx = crate::arch::init_context(&mut stack, trampoline);
        Self {
            id,
            state: ThreadState::Ready,
            entry,
            ctx,
            stack,
        }
    }

    /// Whether the round-robin scan may select this thread.
    #[inline]
    pub fn is_runnable(&self) -> bool {
        self.state == ThreadState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn noop_trampoline() -> ! {
        unreachable!("never activated in tests")
    }

    fn nop(_id: usize) {}

    #[test]
    fn fresh_tcb_is_ready() {
        let tcb = ThreadControlBlock::new(3, nop, 32 * 1024, noop_trampoline);
        assert_eq!(tcb.id, 3);
        assert_eq!(tcb.state, ThreadState::Ready);
        assert!(tcb.is_runnable());
    }

    #[test]
    fn only_ready_is_runnable() {
        let mut tcb = ThreadControlBlock::new(0, nop, 32 * 1024, noop_trampoline);
        for state in [ThreadState::Running, ThreadState::Blocked, ThreadState::Dead] {
            tcb.state = state;
            assert!(!tcb.is_runnable());
        }
    }
}
