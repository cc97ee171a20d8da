//! # x86_64 Port
//!
//! Context switching for the System V AMD64 ABI. The switch is an
//! ordinary `extern "C"` call, so only the callee-saved registers need
//! to be preserved: `rsp`, `rbp`, `rbx`, `r12`–`r15`. Caller-saved
//! registers are dead across the call by contract, and the FPU/SSE
//! state is caller-saved in this ABI.
//!
//! ## Fresh-context stack layout
//!
//! `init_context` plants the entry address at the top of the new stack
//! so that the `ret` at the end of the switch "returns" into the entry
//! function on its first activation:
//!
//! ```text
//! high ┌────────────────┐ ← stack top, 16-byte aligned
//!      │   (unused)     │
//!      │ entry address  │ ← saved rsp; `ret` pops this
//! low  │      ...       │    and leaves rsp ≡ 8 (mod 16),
//!      └────────────────┘    as at any function entry
//! ```

use core::arch::naked_asm;

/// Callee-saved register snapshot for one execution context.
///
/// Field order is load-bearing: the switch assembly addresses this
/// struct by fixed byte offsets.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct Context {
    rsp: u64, // 0x00
    rbp: u64, // 0x08
    rbx: u64, // 0x10
    r12: u64, // 0x18
    r13: u64, // 0x20
    r14: u64, // 0x28
    r15: u64, // 0x30
}

impl Context {
    /// An empty context. Switching *from* it fills it in; switching
    /// *to* it before that is undefined.
    pub const fn new() -> Self {
        Self {
            rsp: 0,
            rbp: 0,
            rbx: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Save the current execution state into `old` and resume `new`.
///
/// Returns when another context switches back into `old`. The final
/// `ret` either resumes a suspended context just after its own
/// `switch_context` call, or enters a fresh context at the address
/// planted by [`init_context`].
///
/// # Safety
/// Both pointers must be valid; `new` must have been produced by
/// [`init_context`] or a previous save. The caller is responsible for
/// masking the preemption signal around the switch — this function
/// does not touch the signal mask.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_old: *mut Context, _new: *const Context) {
    naked_asm!(
        // rdi = old, rsi = new
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r13",
        "mov [rdi + 0x28], r14",
        "mov [rdi + 0x30], r15",
        "mov rsp, [rsi + 0x00]",
        "mov rbp, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov r13, [rsi + 0x20]",
        "mov r14, [rsi + 0x28]",
        "mov r15, [rsi + 0x30]",
        "ret",
    );
}

/// Build a fresh context that enters `entry` on `stack` when first
/// switched to.
///
/// The entry function must never return: a context has nothing to
/// return *to* once its planted entry address has been popped.
pub fn init_context(stack: &mut [u8], entry: extern "C" fn() -> !) -> Context {
    let top = (stack.as_mut_ptr() as usize + stack.len()) & !0xF;
    // One slot for the entry address, one of padding to keep the
    // alignment rule (rsp ≡ 8 mod 16 at function entry) after `ret`.
    let rsp = (top - 16) as *mut u64;
    unsafe {
        rsp.write(entry as usize as u64);
        rsp.add(1).write(0);
    }
    let mut ctx = Context::new();
    ctx.rsp = rsp as u64;
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_stack_is_aligned() {
        let mut stack = vec![0u8; 4096].into_boxed_slice();
        extern "C" fn entry() -> ! {
            unreachable!()
        }
        let ctx = init_context(&mut stack, entry);
        // rsp is 16-aligned before `ret`; after popping the entry
        // address it sits at entry alignment.
        assert_eq!(ctx.rsp % 16, 0);
        let planted = unsafe { *(ctx.rsp as *const u64) };
        assert_eq!(planted, entry as usize as u64);
    }
}
