//! # Preemption Timer
//!
//! The single asynchronous entry point into the scheduler. A periodic
//! interval timer (`setitimer`, `ITIMER_REAL`) delivers `SIGALRM` at a
//! fixed quantum; the handler delegates to the scheduler's
//! `preempt(current)`, interrupting the running logical thread at an
//! arbitrary program point.
//!
//! ## Delivery discipline
//!
//! - The handler runs on the preempted logical thread's own stack —
//!   no `sigaltstack`. When the scheduler later resumes that thread,
//!   it finishes the handler and `sigreturn` carries it back into the
//!   interrupted code with the pre-signal mask.
//! - `sigaction` is installed without `SA_NODEFER`, so `SIGALRM` is
//!   masked for the duration of the handler: the handler is never
//!   re-entered, and a tick that fires during handling (or during any
//!   voluntary switch, which masks the signal explicitly) coalesces
//!   into a single pending delivery.
//! - `ITIMER_REAL` signals the whole process. If the kernel delivers
//!   the tick to an OS thread other than the one running the
//!   scheduler, the handler forwards it with `pthread_kill` and
//!   returns.

use core::sync::atomic::{AtomicBool, Ordering};
use std::io;
use std::mem;
use std::ptr;

use crate::error::KernelError;

/// Whether the interval timer is currently armed. Checked by the
/// handler so that a late tick delivered after [`disarm`] is ignored.
static ARMED: AtomicBool = AtomicBool::new(false);

/// The OS thread that owns the scheduler while the timer is armed.
/// Written before arming, read only by the handler.
static mut OWNER: libc::pthread_t = 0 as libc::pthread_t;

extern "C" fn alarm_handler(_signal: libc::c_int) {
    if !ARMED.load(Ordering::Acquire) {
        return;
    }
    unsafe {
        let owner = ptr::addr_of!(OWNER).read();
        if libc::pthread_equal(libc::pthread_self(), owner) == 0 {
            // Tick landed on a foreign OS thread; bounce it to the
            // one running the logical threads.
            libc::pthread_kill(owner, libc::SIGALRM);
            return;
        }
    }
    crate::kernel::preempt_from_timer();
}

/// Install the `SIGALRM` handler and start the periodic timer at
/// `quantum_us` microseconds. A quantum of `0` arms nothing; the
/// scheduler then runs purely cooperatively.
///
/// Must be called with `SIGALRM` masked on the calling thread (the
/// bootstrap path masks it before the first switch); the first tick
/// can then only be delivered once the first logical thread unmasks.
pub fn arm(quantum_us: u32) -> Result<(), KernelError> {
    if quantum_us == 0 {
        return Ok(());
    }
    unsafe {
        ptr::addr_of_mut!(OWNER).write(libc::pthread_self());

        let mut action = mem::zeroed::<libc::sigaction>();
        action.sa_sigaction = alarm_handler as extern "C" fn(libc::c_int) as usize;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGALRM, &action, ptr::null_mut()) != 0 {
            return Err(KernelError::Timer(io::Error::last_os_error()));
        }

        ARMED.store(true, Ordering::Release);

        let tick = libc::timeval {
            tv_sec: (quantum_us / 1_000_000) as _,
            tv_usec: (quantum_us % 1_000_000) as _,
        };
        let interval = libc::itimerval {
            it_interval: tick,
            it_value: tick,
        };
        if libc::setitimer(libc::ITIMER_REAL, &interval, ptr::null_mut()) != 0 {
            ARMED.store(false, Ordering::Release);
            return Err(KernelError::Timer(io::Error::last_os_error()));
        }
    }
    Ok(())
}

/// Stop the periodic timer. Ticks already pending are swallowed by the
/// handler's `ARMED` check.
pub fn disarm() {
    unsafe {
        let zero = libc::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        let interval = libc::itimerval {
            it_interval: zero,
            it_value: zero,
        };
        libc::setitimer(libc::ITIMER_REAL, &interval, ptr::null_mut());
    }
    ARMED.store(false, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // ARMED and the interval timer are process-wide; the harness runs
    // tests on parallel threads, so serialize them.
    static TIMER_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn zero_quantum_arms_nothing() {
        let _guard = TIMER_LOCK.lock().unwrap();
        assert!(arm(0).is_ok());
        assert!(!ARMED.load(Ordering::Acquire));
    }

    #[test]
    fn arm_and_disarm() {
        let _serial = TIMER_LOCK.lock().unwrap();
        // Keep SIGALRM masked so the tick cannot interrupt the test
        // harness; pending deliveries are dropped by the ARMED check.
        let guard = crate::sync::block_preemption();
        arm(50_000).expect("setitimer");
        assert!(ARMED.load(Ordering::Acquire));
        disarm();
        assert!(!ARMED.load(Ordering::Acquire));
        crate::sync::restore_preemption(&guard);
    }
}
