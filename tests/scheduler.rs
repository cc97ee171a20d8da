//! Whole-pool scheduler behavior: termination, round-robin fairness,
//! and the observable race when a shared counter is updated without
//! synchronization.
//!
//! The kernel instance and the timer signal are process-wide, so every
//! test takes `POOL_LOCK` first; tests in this file are effectively
//! serial even though the harness runs them on separate OS threads.

use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use timeslice::config::MIN_STACK_SIZE;
use timeslice::kernel::{self, KernelConfig};
use timeslice::KernelError;

static POOL_LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    POOL_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn config(quantum_us: u32) -> KernelConfig {
    KernelConfig {
        stack_size: 64 * 1024,
        quantum_us,
    }
}

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

static DONE: [AtomicBool; 4] = [const { AtomicBool::new(false) }; 4];

fn busy_worker(id: usize) {
    let mut sink = 0u32;
    for i in 0..200_000u32 {
        unsafe { ptr::write_volatile(&mut sink, i) };
    }
    DONE[id].store(true, Ordering::SeqCst);
}

#[test]
fn preempted_pool_terminates() {
    let _guard = serial();
    for flag in &DONE {
        flag.store(false, Ordering::SeqCst);
    }

    kernel::init(config(1_000)).unwrap();
    for _ in 0..4 {
        kernel::spawn(busy_worker).unwrap();
    }
    kernel::run().unwrap();

    for (id, flag) in DONE.iter().enumerate() {
        assert!(flag.load(Ordering::SeqCst), "thread {id} never finished");
    }
}

#[test]
fn single_thread_pool_terminates() {
    let _guard = serial();
    DONE[0].store(false, Ordering::SeqCst);

    kernel::init(config(1_000)).unwrap();
    kernel::spawn(busy_worker).unwrap();
    kernel::run().unwrap();

    assert!(DONE[0].load(Ordering::SeqCst));
}

// ---------------------------------------------------------------------------
// Round-robin fairness
// ---------------------------------------------------------------------------

static SELECTIONS: Mutex<Vec<usize>> = Mutex::new(Vec::new());

fn yielding_worker(id: usize) {
    for _ in 0..10 {
        SELECTIONS.lock().unwrap().push(id);
        kernel::yield_now();
    }
}

#[test]
fn every_thread_selected_within_one_lap() {
    let _guard = serial();
    SELECTIONS.lock().unwrap().clear();

    const K: usize = 5;
    // Cooperative only: yields are the sole scheduling points, so the
    // selection sequence is exact.
    kernel::init(config(0)).unwrap();
    for _ in 0..K {
        kernel::spawn(yielding_worker).unwrap();
    }
    kernel::run().unwrap();

    let seq = SELECTIONS.lock().unwrap();
    assert_eq!(seq.len(), K * 10);
    for window in seq.windows(K) {
        let mut ids: Vec<usize> = window.to_vec();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), K, "window {window:?} starved a thread");
    }
}

// ---------------------------------------------------------------------------
// Race exposure without synchronization
// ---------------------------------------------------------------------------

static mut RACY_COUNTER: i64 = 0;

fn racy_update(delta: i64) {
    unsafe {
        let cur = ptr::read_volatile(ptr::addr_of!(RACY_COUNTER));
        // Widen the read-modify-write window so a timer tick can land
        // inside it.
        let mut sink = 0u32;
        for i in 0..500u32 {
            ptr::write_volatile(&mut sink, i);
        }
        ptr::write_volatile(ptr::addr_of_mut!(RACY_COUNTER), cur + delta);
    }
}

fn racy_incrementer(_id: usize) {
    for _ in 0..2_000 {
        racy_update(1);
    }
}

fn racy_decrementer(_id: usize) {
    for _ in 0..2_000 {
        racy_update(-1);
    }
}

#[test]
fn unsynchronized_counter_can_diverge() {
    let _guard = serial();

    // Divergence is a possibility per run, not a certainty; repeat
    // until observed. With a 1 ms quantum and a wide update window,
    // the first few trials all balancing to zero would be
    // extraordinary.
    let mut diverged = false;
    for _trial in 0..40 {
        unsafe { ptr::write_volatile(ptr::addr_of_mut!(RACY_COUNTER), 0) };

        kernel::init(config(1_000)).unwrap();
        for i in 0..12 {
            let entry = if i % 2 == 0 {
                racy_incrementer
            } else {
                racy_decrementer
            };
            kernel::spawn(entry).unwrap();
        }
        kernel::run().unwrap();

        let counter = unsafe { ptr::read_volatile(ptr::addr_of!(RACY_COUNTER)) };
        if counter != 0 {
            diverged = true;
            break;
        }
    }
    assert!(
        diverged,
        "40 unsynchronized trials all balanced to zero; lost updates never observed"
    );
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[test]
fn run_requires_spawned_threads() {
    let _guard = serial();
    kernel::init(config(0)).unwrap();
    assert!(matches!(kernel::run(), Err(KernelError::NoThreads)));
}

#[test]
fn init_rejects_undersized_stacks() {
    let _guard = serial();
    let err = kernel::init(KernelConfig {
        stack_size: MIN_STACK_SIZE - 1,
        quantum_us: 0,
    });
    assert!(matches!(err, Err(KernelError::StackTooSmall { .. })));
}
