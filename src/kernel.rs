//! # Kernel
//!
//! The global scheduler instance and the public API around it.
//!
//! ## Startup sequence
//!
//! ```text
//! main()
//!   ├─► kernel::init(config)   ← reset the global scheduler
//!   ├─► kernel::spawn(entry)   ← register logical threads (×N)
//!   └─► kernel::run()          ← arm timer, enter thread 0
//!         │                       ... pool executes ...
//!         └─◄ returns when every thread is Dead
//! ```
//!
//! ## Global instance
//!
//! The scheduler is process-wide state with a single lifecycle: the
//! signal handler has to reach it, and logical threads have to reach
//! it from arbitrary stacks, so it lives in a `static` accessed
//! through a raw pointer that `init` publishes. Everything that
//! mutates it does so with the timer signal masked (or from the
//! handler, where the signal is masked automatically), which is what
//! makes the single-writer story hold.

use crate::error::KernelError;
use crate::scheduler::Scheduler;
use crate::sync;

// ---------------------------------------------------------------------------
// Global scheduler instance
// ---------------------------------------------------------------------------

static mut SCHEDULER: Scheduler = Scheduler::new();

/// Published by [`init`]; null until then. The timer handler and the
/// semaphore reach the scheduler through this pointer.
static mut SCHEDULER_PTR: *mut Scheduler = core::ptr::null_mut();

/// The global scheduler, if [`init`] has run.
///
/// # Safety
/// The returned reference aliases every other access to the global;
/// callers must hold the preemption mask (or run inside the signal
/// handler) while mutating through it.
pub(crate) unsafe fn scheduler() -> Option<&'static mut Scheduler> {
    let ptr = core::ptr::addr_of!(SCHEDULER_PTR).read();
    if ptr.is_null() {
        None
    } else {
        Some(&mut *ptr)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Pool-wide parameters, fixed at [`init`] time.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Per-thread stack size in bytes. Rejected below
    /// [`MIN_STACK_SIZE`](crate::config::MIN_STACK_SIZE).
    pub stack_size: usize,
    /// Preemption quantum in microseconds; `0` disables the timer and
    /// leaves only cooperative scheduling points.
    pub quantum_us: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            stack_size: crate::config::DEFAULT_STACK_SIZE,
            quantum_us: crate::config::DEFAULT_QUANTUM_US,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Initialize (or re-initialize) the global scheduler. Any previous
/// pool is torn down and its stacks released.
///
/// Must be called from the OS thread that will later call [`run`], and
/// never while a previous pool is still executing.
pub fn init(config: KernelConfig) -> Result<(), KernelError> {
    unsafe {
        let ptr = core::ptr::addr_of_mut!(SCHEDULER);
        (*ptr).reset(config.stack_size, config.quantum_us)?;
        core::ptr::addr_of_mut!(SCHEDULER_PTR).write(ptr);
    }
    Ok(())
}

/// Register one logical thread running `entry(id)`. Returns the new
/// thread's id.
pub fn spawn(entry: fn(usize)) -> Result<usize, KernelError> {
    match unsafe { scheduler() } {
        Some(sched) => sched.spawn(entry),
        None => Err(KernelError::NoThreads),
    }
}

/// Run the pool to completion: arms the timer, enters thread 0, and
/// returns once every thread is `Dead` (or only blocked threads
/// remain, which is reported as a warning — see `Scheduler::run`).
pub fn run() -> Result<(), KernelError> {
    match unsafe { scheduler() } {
        Some(sched) => sched.run(),
        None => Err(KernelError::NoThreads),
    }
}

/// Id of the logical thread currently executing. Meaningful only when
/// called from inside a workload function.
pub fn current_id() -> usize {
    unsafe { scheduler() }.map(|s| s.current).unwrap_or(0)
}

/// Voluntarily give up the rest of the quantum. Equivalent to a timer
/// preemption at this exact point: round-robin picks the next `Ready`
/// thread, and the caller resumes when its turn comes around again.
pub fn yield_now() {
    if let Some(sched) = unsafe { scheduler() } {
        if sched.is_running() {
            sched.preempt(sched.current);
        }
    }
}

// ---------------------------------------------------------------------------
// Handler and trampoline entry points
// ---------------------------------------------------------------------------

/// Body of the timer tick: preempt whatever is running. Called by the
/// `SIGALRM` handler with the signal masked; this is the only
/// asynchronous entry into the scheduler, and it never touches
/// semaphore state.
pub(crate) fn preempt_from_timer() {
    if let Some(sched) = unsafe { scheduler() } {
        if sched.is_running() {
            sched.preempt(sched.current);
        }
    }
}

/// First activation point of every worker context.
///
/// Runs the workload with the timer signal unmasked, then enters the
/// cleanup context. A panicking workload is caught and treated as a
/// normal return so the scheduler's lifecycle is preserved; unwinding
/// off the bottom of a context's planted stack would abort the
/// process.
pub(crate) extern "C" fn thread_trampoline() -> ! {
    // The scheduler exists: this context can only be activated by it.
    let (id, entry) = {
        let sched = unsafe { scheduler() }.expect("trampoline outside a running scheduler");
        (sched.current, sched.threads[sched.current].entry)
    };

    sync::unblock_preemption();
    let result = std::panic::catch_unwind(|| entry(id));

    // Mask again for the hand-off into cleanup. The guard is dropped
    // deliberately: this context is never resumed, so there is nothing
    // to restore.
    let _ = sync::block_preemption();
    if result.is_err() {
        log::error!("thread {id} panicked; marking it dead");
    }
    unsafe { scheduler() }
        .expect("trampoline outside a running scheduler")
        .enter_cleanup()
}

/// Entry point of the dedicated cleanup context. Always entered with
/// the timer signal masked, on the cleanup stack.
pub(crate) extern "C" fn cleanup_trampoline() -> ! {
    let sched = unsafe { scheduler() }.expect("cleanup outside a running scheduler");
    sched.finalize_current()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The scheduler global is process-wide; serialize the tests that
    // touch it.
    static KERNEL_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn api_is_inert_outside_a_pool() {
        let _guard = KERNEL_LOCK.lock().unwrap();
        // No pool is executing: yielding must be a no-op, not a switch
        // into a stale or empty table.
        yield_now();
        preempt_from_timer();
    }

    #[test]
    fn init_spawn_counts() {
        let _guard = KERNEL_LOCK.lock().unwrap();
        init(KernelConfig {
            stack_size: crate::config::MIN_STACK_SIZE,
            quantum_us: 0,
        })
        .unwrap();
        fn nop(_id: usize) {}
        assert_eq!(spawn(nop).unwrap(), 0);
        assert_eq!(spawn(nop).unwrap(), 1);
        let sched = unsafe { scheduler() }.unwrap();
        assert_eq!(sched.active, 2);
        assert_eq!(current_id(), 0);
    }
}
