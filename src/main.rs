//! # Demo Workload
//!
//! Twelve logical threads contend on one shared counter: even-id
//! threads increment, odd-id threads decrement, each for a fixed
//! iteration bound with a short busy delay per iteration to widen the
//! read-modify-write window. With a correctly synchronized counter the
//! final value is exactly zero on every run; without synchronization
//! the timer-driven interleaving may (and in practice does) lose
//! updates.
//!
//! The synchronization mode is selected at compile time, mirroring a
//! build-system `#define` switch:
//!
//! | Cargo features       | Counter protection                    |
//! |----------------------|---------------------------------------|
//! | (none)               | this crate's [`SpinSemaphore`]        |
//! | `--features posix-sem` | reference POSIX semaphore (`sem_t`) |
//! | `--features no-sync` | none — demonstrates the race          |
//!
//! Run order and interleavings legitimately differ between runs; only
//! the final counter value is deterministic (in the synchronized
//! modes).

use timeslice::kernel::{self, KernelConfig};

#[cfg(all(feature = "no-sync", feature = "posix-sem"))]
compile_error!("features `no-sync` and `posix-sem` are mutually exclusive");

/// Threads in the pool; half increment, half decrement.
const THREADS: usize = 12;
/// Protected updates performed by each thread.
const BOUND: u32 = 100_000;
/// Busy-delay iterations before each update, widening the race window.
const DELAY: u32 = 500;
/// Progress is logged every this many iterations.
const PRINT: u32 = 10_000;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// The contended counter. Deliberately not atomic: making the
/// read-modify-write tear-able is the whole point of the demo.
static mut SHARED_COUNTER: i64 = 0;

#[cfg(not(any(feature = "no-sync", feature = "posix-sem")))]
static MUTEX: timeslice::SpinSemaphore = timeslice::SpinSemaphore::new(1);

#[cfg(feature = "posix-sem")]
mod posix {
    //! Reference semaphore: the platform's `sem_t`, initialized to 1.
    //! A `sem_wait` that would block parks the whole OS thread until
    //! the timer tick interrupts it and reschedules; once the holder
    //! posts, the retried `sem_wait` succeeds.

    use core::cell::UnsafeCell;
    use std::mem::MaybeUninit;

    pub struct PosixSem(UnsafeCell<MaybeUninit<libc::sem_t>>);
    unsafe impl Sync for PosixSem {}

    pub static MUTEX: PosixSem = PosixSem(UnsafeCell::new(MaybeUninit::uninit()));

    pub fn init(value: u32) {
        unsafe {
            let rc = libc::sem_init((*MUTEX.0.get()).as_mut_ptr(), 0, value);
            assert_eq!(rc, 0, "sem_init failed");
        }
    }

    pub fn wait() {
        unsafe {
            while libc::sem_wait((*MUTEX.0.get()).as_mut_ptr()) != 0 {}
        }
    }

    pub fn post() {
        unsafe {
            libc::sem_post((*MUTEX.0.get()).as_mut_ptr());
        }
    }
}

// ---------------------------------------------------------------------------
// Workload tasks
// ---------------------------------------------------------------------------

/// Spin long enough for a timer tick to be able to land between the
/// counter read and the counter write.
#[inline]
fn delay() {
    let mut sink = 0u32;
    for i in 0..DELAY {
        // Volatile keeps the loop from being optimized away.
        unsafe { core::ptr::write_volatile(&mut sink, i) };
    }
}

fn update_counter(delta: i64) {
    #[cfg(not(any(feature = "no-sync", feature = "posix-sem")))]
    MUTEX.wait();
    #[cfg(feature = "posix-sem")]
    posix::wait();

    unsafe {
        let cur = core::ptr::read_volatile(core::ptr::addr_of!(SHARED_COUNTER));
        delay();
        core::ptr::write_volatile(core::ptr::addr_of_mut!(SHARED_COUNTER), cur + delta);
    }

    #[cfg(not(any(feature = "no-sync", feature = "posix-sem")))]
    MUTEX.post();
    #[cfg(feature = "posix-sem")]
    posix::post();
}

/// Even-id threads: add one, `BOUND` times.
fn incrementer(id: usize) {
    for count in 1..=BOUND {
        update_counter(1);
        if count % PRINT == 0 {
            log::debug!("incrementer {id}: {count} updates");
        }
    }
}

/// Odd-id threads: subtract one, `BOUND` times.
fn decrementer(id: usize) {
    for count in 1..=BOUND {
        update_counter(-1);
        if count % PRINT == 0 {
            log::debug!("decrementer {id}: {count} updates");
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();

    #[cfg(feature = "posix-sem")]
    posix::init(1);

    kernel::init(KernelConfig::default()).expect("kernel init");
    for i in 0..THREADS {
        let entry = if i % 2 == 0 { incrementer } else { decrementer };
        kernel::spawn(entry).expect("spawn");
    }

    kernel::run().expect("run");

    let counter = unsafe { core::ptr::read_volatile(core::ptr::addr_of!(SHARED_COUNTER)) };
    println!("==========================");
    println!("shared counter = {counter}");
    println!("==========================");
    if cfg!(feature = "no-sync") {
        println!("(unsynchronized: a nonzero value demonstrates the race)");
    } else {
        assert_eq!(counter, 0, "synchronized counter must balance out");
        println!("(synchronized: balances to zero on every run)");
    }
}
