//! # timeslice — preemptive user-level green threads
//!
//! A user-level cooperative thread scheduler with timer-driven
//! preemption, plus a blocking semaphore built directly on top of it.
//! Exactly one logical thread executes at any instant: concurrency is
//! simulated on a single OS thread, never parallel.
//!
//! ## Overview
//!
//! - **Round-robin scheduling** over a fixed pool of logical threads:
//!   ascending id with wraparound, starting strictly after the
//!   preempted thread. That ordering is the sole fairness guarantee —
//!   no priorities, no recency weighting.
//! - **Timer preemption**: a periodic `SIGALRM` from an interval timer
//!   interrupts the running thread at an arbitrary point and hands the
//!   CPU to the next ready thread.
//! - **Spin-lock semaphore**: a counting/binary semaphore whose
//!   critical section is a raw busy-wait lock and whose blocked
//!   waiters are held in a bounded FIFO queue, woken in strict
//!   first-blocked-first-woken order via direct context hand-off.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Workload Tasks (fn(usize))            │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │        init() · spawn() · run() · yield_now()           │
//! ├───────────────────┬─────────────────────────────────────┤
//! │    Scheduler      │        Spin-Lock Semaphore          │
//! │    scheduler.rs   │        sem.rs                       │
//! │    ─ preempt()    │        ─ wait() / post()            │
//! │    ─ direct_switch│        ─ bounded FIFO wait queue    │
//! │    ─ cleanup ctx  │        ─ busy-wait lock (sync.rs)   │
//! ├───────────────────┴─────────────────────────────────────┤
//! │          Thread Model (task.rs) · TCB · ThreadState     │
//! ├─────────────────────────────────────────────────────────┤
//! │   Timer (timer.rs)          Arch Port (arch/…)          │
//! │   SIGALRM · setitimer       Context · switch · init     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! ```no_run
//! use timeslice::kernel::{self, KernelConfig};
//!
//! fn worker(id: usize) {
//!     for _ in 0..1_000 {
//!         // ... do work, contend on a shared SpinSemaphore ...
//!         let _ = id;
//!     }
//! }
//!
//! kernel::init(KernelConfig::default()).unwrap();
//! for _ in 0..4 {
//!     kernel::spawn(worker).unwrap();
//! }
//! kernel::run().unwrap(); // returns once every thread finished
//! ```
//!
//! ## Memory model
//!
//! - Fixed-capacity thread table, sized by [`config::MAX_THREADS`]
//! - One exclusively owned heap stack per logical thread, released at
//!   teardown, never while the thread could still be resumed
//! - All scheduler mutation runs with the timer signal masked; the
//!   semaphore's state is guarded by its spin-lock *instead*, so that
//!   preemption while the lock is held stays observable (see `sync`)

pub mod arch;
pub mod config;
pub mod error;
pub mod kernel;
pub mod scheduler;
pub mod sem;
pub mod sync;
pub mod task;
pub mod timer;

pub use error::{KernelError, SemError};
pub use kernel::KernelConfig;
pub use sem::SpinSemaphore;
