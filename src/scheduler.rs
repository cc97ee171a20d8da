//! # Scheduler
//!
//! Round-robin scheduling over a fixed pool of logical threads, with
//! timer-driven preemption and a direct hand-off path for semaphore
//! wakeups.
//!
//! ## Selection
//!
//! On every preemption (timer tick or voluntary), the scan starts
//! strictly after the preempted thread and walks forward with
//! wraparound, at most one full lap, taking the first `Ready` thread.
//! `Dead` and `Blocked` slots are skipped unconditionally. Ascending-id
//! order with wraparound is the sole fairness guarantee: no priorities,
//! no recency weighting.
//!
//! ## Hand-off paths
//!
//! - [`Scheduler::preempt`] — scan-based; used by the timer handler and
//!   by a thread blocking on a semaphore, where the next runnable
//!   thread is not known in advance.
//! - [`Scheduler::direct_switch`] — used by the semaphore wake path,
//!   where the FIFO queue names the exact thread that must run next.
//!
//! ## Cleanup
//!
//! A worker's entry trampoline never returns; when the workload
//! function comes back, the trampoline enters the dedicated cleanup
//! context instead. Cleanup marks the thread `Dead`, decrements the
//! active count, and either hands off to a survivor or resumes the
//! bootstrap context, which terminates [`Scheduler::run`]. The cleanup
//! context is re-initialized before every entry; the mid-cleanup state
//! a hand-off saves into the dead thread's slot is never resumed,
//! because the scan skips `Dead`.
//!
//! Every mutation of the table and every context switch here runs with
//! the timer signal masked (see `sync`); whichever path resumes a
//! thread reinstalls that thread's own mask.

use crate::arch::{self, Context};
use crate::config::{CLEANUP_STACK_SIZE, DEFAULT_QUANTUM_US, DEFAULT_STACK_SIZE, MAX_THREADS, MIN_STACK_SIZE};
use crate::error::KernelError;
use crate::sync;
use crate::task::{ThreadControlBlock, ThreadState};
use crate::timer;

/// The scheduler state: thread table, current slot, active count, and
/// the two non-worker contexts (bootstrap and cleanup).
///
/// One instance lives for the whole process as the kernel's global
/// (`kernel::SCHEDULER`); it is const-constructed empty and filled in
/// by `reset`/`spawn`.
pub struct Scheduler {
    /// Thread table. Size fixed between `reset` and teardown; slot
    /// index is the thread id.
    pub threads: Vec<ThreadControlBlock>,

    /// Index of the running thread. Undefined only during the terminal
    /// transition back to bootstrap, when nothing is runnable.
    pub current: usize,

    /// Threads not yet `Dead`. `run` returns when this reaches zero.
    pub active: usize,

    /// True between `run`'s first switch and its return. Gates the
    /// timer handler and `yield_now`: neither may switch contexts
    /// while the pool is not executing.
    running: bool,

    /// Preemption quantum in microseconds; `0` disables the timer.
    quantum_us: u32,

    /// Stack size for threads spawned into this table.
    stack_size: usize,

    /// Saved state of `run`'s caller while the pool executes.
    bootstrap_ctx: Context,

    /// The dedicated context every finishing worker enters.
    cleanup_ctx: Context,

    /// Stack for the cleanup context.
    cleanup_stack: Vec<u8>,
}

impl Scheduler {
    /// An empty scheduler. Const so the kernel can hold it in a
    /// `static`; allocation happens in [`Scheduler::reset`].
    pub const fn new() -> Self {
        Self {
            threads: Vec::new(),
            current: 0,
            active: 0,
            running: false,
            quantum_us: DEFAULT_QUANTUM_US,
            stack_size: DEFAULT_STACK_SIZE,
            bootstrap_ctx: Context::new(),
            cleanup_ctx: Context::new(),
            cleanup_stack: Vec::new(),
        }
    }

    /// Tear down any previous pool (releasing its stacks) and prepare
    /// an empty table with the given per-thread stack size and quantum.
    pub fn reset(&mut self, stack_size: usize, quantum_us: u32) -> Result<(), KernelError> {
        if stack_size < MIN_STACK_SIZE {
            return Err(KernelError::StackTooSmall {
                requested: stack_size,
                min: MIN_STACK_SIZE,
            });
        }
        self.threads = Vec::new();
        self.current = 0;
        self.active = 0;
        self.running = false;
        self.quantum_us = quantum_us;
        self.stack_size = stack_size;
        self.bootstrap_ctx = Context::new();
        self.cleanup_ctx = Context::new();
        self.cleanup_stack = vec![0u8; CLEANUP_STACK_SIZE];
        Ok(())
    }

    /// Register one logical thread. Its context is built to enter the
    /// kernel trampoline, which runs `entry(id)` and falls through to
    /// cleanup on return.
    pub fn spawn(&mut self, entry: fn(usize)) -> Result<usize, KernelError> {
        if self.threads.len() >= MAX_THREADS {
            return Err(KernelError::TableFull { max: MAX_THREADS });
        }
        let id = self.threads.len();
        self.threads.push(ThreadControlBlock::new(
            id,
            entry,
            self.stack_size,
            crate::kernel::thread_trampoline,
        ));
        self.active += 1;
        log::debug!("spawned thread {id} (stack {} bytes)", self.stack_size);
        Ok(id)
    }

    /// First `Ready` thread strictly after `from`, wrapping, at most
    /// one full lap. The lap includes `from` itself as the final
    /// candidate: a thread that was just demoted to `Ready` with no
    /// other runnable thread is simply re-selected.
    pub fn next_ready(&self, from: usize) -> Option<usize> {
        let n = self.threads.len();
        (1..=n)
            .map(|step| (from + step) % n)
            .find(|&idx| self.threads[idx].is_runnable())
    }

    /// Timer-driven or voluntary hand-off from `from` to the next
    /// `Ready` thread in round-robin order.
    ///
    /// `from` is demoted to `Ready` only if it was `Running`: a
    /// `Blocked` thread yielding after queuing on a semaphore stays
    /// blocked, and a `Dead` thread stays dead. If nothing is `Ready`,
    /// no switch occurs and control returns to the caller — reached
    /// transiently, or when every surviving thread is blocked (a
    /// workload deadlock this scheduler does not remedy).
    pub fn preempt(&mut self, from: usize) {
        let guard = sync::block_preemption();
        if self.threads[from].state == ThreadState::Running {
            self.threads[from].state = ThreadState::Ready;
        }
        if let Some(next) = self.next_ready(from) {
            self.threads[next].state = ThreadState::Running;
            self.current = next;
            if next != from {
                self.switch(from, &raw const self.threads[next].ctx);
            }
        }
        sync::restore_preemption(&guard);
    }

    /// Unconditional hand-off to a known target, used by the semaphore
    /// wake path. The caller guarantees `to` was blocked and has just
    /// been dequeued; it must run next to preserve FIFO wake order, so
    /// no scan happens.
    pub fn direct_switch(&mut self, from: usize, to: usize) {
        let guard = sync::block_preemption();
        if self.threads[from].state == ThreadState::Running {
            self.threads[from].state = ThreadState::Ready;
        }
        self.threads[to].state = ThreadState::Running;
        self.current = to;
        self.switch(from, &raw const self.threads[to].ctx);
        sync::restore_preemption(&guard);
    }

    /// Transfer control into the thread pool and block (from the
    /// caller's perspective) until every thread is `Dead`.
    ///
    /// Arms the interval timer for the configured quantum, switches
    /// from the bootstrap context into thread 0, and on resumption
    /// disarms the timer. Stacks are released at the next `reset` (or
    /// when the scheduler is dropped), never here — a caller-observable
    /// guarantee that no context outlives its stack.
    pub fn run(&mut self) -> Result<(), KernelError> {
        if self.threads.is_empty() || self.active == 0 {
            return Err(KernelError::NoThreads);
        }
        log::info!(
            "running {} threads, quantum {} us",
            self.threads.len(),
            self.quantum_us
        );

        let guard = sync::block_preemption();
        if let Err(e) = timer::arm(self.quantum_us) {
            sync::restore_preemption(&guard);
            return Err(e);
        }

        self.current = 0;
        self.threads[0].state = ThreadState::Running;
        self.running = true;
        let root: *mut Context = &raw mut self.bootstrap_ctx;
        let first: *const Context = &raw const self.threads[0].ctx;
        // Fresh thread 0 unmasks SIGALRM in its trampoline; the first
        // tick cannot arrive before that.
        unsafe { arch::switch_context(root, first) };

        // Back from the pool: cleanup resumed us.
        self.running = false;
        timer::disarm();
        sync::restore_preemption(&guard);

        if self.active > 0 {
            log::warn!(
                "run() returned with {} threads still blocked (workload deadlock)",
                self.active
            );
        } else {
            log::info!("all threads finished");
        }
        Ok(())
    }

    /// Body of the cleanup context. Marks the finishing thread `Dead`,
    /// then hands off to a survivor or resumes bootstrap. Entered only
    /// via [`Scheduler::enter_cleanup`], always with the timer signal
    /// masked.
    pub(crate) fn finalize_current(&mut self) -> ! {
        let dead = self.current;
        self.threads[dead].state = ThreadState::Dead;
        self.active -= 1;

        if self.active > 0 {
            // The saved mid-cleanup state goes into the dead slot and
            // is never resumed: the scan skips Dead.
            self.preempt(dead);
        }
        // Nothing runnable is left (all dead, or survivors all
        // blocked): terminal transition back to run()'s caller.
        self.switch(dead, &raw const self.bootstrap_ctx);
        unreachable!("dead thread context resumed");
    }

    /// Re-initialize the cleanup context and switch the finishing
    /// thread into it. Each death restarts cleanup from the top of its
    /// dedicated stack; the previous entry's frames there are garbage
    /// belonging to an earlier dead thread.
    pub(crate) fn enter_cleanup(&mut self) -> ! {
        self.cleanup_ctx =
            arch::init_context(&mut self.cleanup_stack, crate::kernel::cleanup_trampoline);
        self.switch(self.current, &raw const self.cleanup_ctx);
        unreachable!("finished thread context resumed");
    }

    /// Whether the pool is currently executing (between `run`'s first
    /// switch and its return).
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Full context switch out of `from`'s slot. Returns when (if
    /// ever) some later hand-off resumes `from`.
    fn switch(&mut self, from: usize, to: *const Context) {
        let from_ctx: *mut Context = &raw mut self.threads[from].ctx;
        unsafe { arch::switch_context(from_ctx, to) };
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_id: usize) {}

    fn pool(n: usize) -> Scheduler {
        let mut s = Scheduler::new();
        s.reset(MIN_STACK_SIZE, 0).unwrap();
        for _ in 0..n {
            s.spawn(nop).unwrap();
        }
        s
    }

    #[test]
    fn reset_rejects_tiny_stacks() {
        let mut s = Scheduler::new();
        assert!(matches!(
            s.reset(1024, 0),
            Err(KernelError::StackTooSmall { .. })
        ));
    }

    #[test]
    fn spawn_bounded_by_table() {
        let mut s = pool(MAX_THREADS);
        assert!(matches!(s.spawn(nop), Err(KernelError::TableFull { .. })));
        assert_eq!(s.active, MAX_THREADS);
    }

    #[test]
    fn scan_starts_strictly_after_from() {
        let s = pool(4);
        assert_eq!(s.next_ready(0), Some(1));
        assert_eq!(s.next_ready(3), Some(0));
    }

    #[test]
    fn scan_skips_dead_and_blocked() {
        let mut s = pool(4);
        s.threads[1].state = ThreadState::Dead;
        s.threads[2].state = ThreadState::Blocked;
        assert_eq!(s.next_ready(0), Some(3));
        // Wraparound past a dead slot.
        s.threads[3].state = ThreadState::Dead;
        assert_eq!(s.next_ready(2), Some(0));
    }

    #[test]
    fn scan_may_reselect_from_itself() {
        let mut s = pool(3);
        s.threads[1].state = ThreadState::Dead;
        s.threads[2].state = ThreadState::Dead;
        // Only the preempted thread itself is still ready.
        assert_eq!(s.next_ready(0), Some(0));
    }

    #[test]
    fn scan_finds_nothing_when_all_unrunnable() {
        let mut s = pool(3);
        for t in &mut s.threads {
            t.state = ThreadState::Blocked;
        }
        assert_eq!(s.next_ready(0), None);
    }

    #[test]
    fn round_robin_is_fair_over_one_lap() {
        // With every thread permanently ready, each id is selected
        // exactly once per lap of successive preempt decisions.
        let mut s = pool(5);
        let mut seen = Vec::new();
        let mut from = 0;
        for _ in 0..5 {
            let next = s.next_ready(from).unwrap();
            seen.push(next);
            // Emulate the bookkeeping of a timer hand-off.
            s.threads[from].state = ThreadState::Ready;
            s.threads[next].state = ThreadState::Running;
            from = next;
        }
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }
}
