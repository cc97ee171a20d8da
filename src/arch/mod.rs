//! # Architecture Port Layer
//!
//! Provides the execution-context primitive the scheduler switches
//! between: an opaque snapshot of the callee-saved register state plus
//! a stack pointer. Each port supplies three things:
//!
//! - `Context` — the saved register set, `#[repr(C)]` so the switch
//!   assembly can address fields by fixed offsets
//! - `switch_context(old, new)` — save the caller's registers into
//!   `old`, restore `new`, and resume there; returns only when some
//!   other context switches back to `old`
//! - `init_context(stack, entry)` — build a fresh context that enters
//!   `entry` on its own stack the first time it is switched to
//!
//! Only the callee-saved set is stored. Everything else is dead across
//! the `switch_context` call boundary by the C ABI, and a preempted
//! thread's full register state lives in the signal frame the kernel
//! pushed onto its stack, not here.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use x86_64::{Context, init_context, switch_context};
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        pub use aarch64::{Context, init_context, switch_context};
    } else {
        compile_error!("unsupported architecture: ports exist for x86_64 and aarch64");
    }
}

#[cfg(not(unix))]
compile_error!("timer preemption requires a unix target (sigaction/setitimer)");

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static HOPS: Cell<u32> = const { Cell::new(0) };
        static BACK: Cell<*mut Context> = const { Cell::new(std::ptr::null_mut()) };
        static SELF: Cell<*mut Context> = const { Cell::new(std::ptr::null_mut()) };
    }

    extern "C" fn bouncer() -> ! {
        // Bounce back and forth with the test context a few times,
        // proving that both directions preserve execution state.
        let mut local = 0u32;
        loop {
            local += 1;
            HOPS.with(|h| h.set(h.get() + local));
            let back = BACK.with(|b| b.get());
            let me = SELF.with(|s| s.get());
            unsafe { switch_context(&mut *me, &*back) };
        }
    }

    #[test]
    fn context_round_trips() {
        let mut stack = vec![0u8; 64 * 1024].into_boxed_slice();
        let mut main_ctx = Context::new();
        let mut task_ctx = init_context(&mut stack, bouncer);

        HOPS.with(|h| h.set(0));
        BACK.with(|b| b.set(&mut main_ctx));
        SELF.with(|s| s.set(&mut task_ctx));

        for _ in 0..3 {
            unsafe { switch_context(&mut main_ctx, &task_ctx) };
        }
        // local counts 1, 2, 3 across suspensions: 1 + 2 + 3
        assert_eq!(HOPS.with(|h| h.get()), 6);
    }
}
