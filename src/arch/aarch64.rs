//! # AArch64 Port
//!
//! Context switching for the AAPCS64 ABI. Callee-saved state is
//! `x19`–`x28`, the frame pointer `x29`, the link register `x30`, the
//! stack pointer, and the low halves of `v8`–`v15` (`d8`–`d15`).
//!
//! A fresh context is entered through the saved link register: the
//! final `ret` of the switch branches to `x30`, which `init_context`
//! points at the entry function.

use core::arch::naked_asm;

/// Callee-saved register snapshot for one execution context.
///
/// Field order is load-bearing: the switch assembly addresses this
/// struct by fixed byte offsets.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct Context {
    sp: u64,        // 0x00
    lr: u64,        // 0x08
    fp: u64,        // 0x10
    x19_28: [u64; 10], // 0x18..0x68
    d8_15: [u64; 8],   // 0x68..0xA8
}

impl Context {
    /// An empty context. Switching *from* it fills it in; switching
    /// *to* it before that is undefined.
    pub const fn new() -> Self {
        Self {
            sp: 0,
            lr: 0,
            fp: 0,
            x19_28: [0; 10],
            d8_15: [0; 8],
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
/// # Safety
/// Both pointers must be valid; `new` must have been produced by
/// [`init_context`] or a previous save. The caller is responsible for
/// masking the preemption signal around the switch.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_old: *mut Context, _new: *const Context) {
    naked_asm!(
        // x0 = old, x1 = new
        "mov x9, sp",
        "str x9, [x0, #0x00]",
        "stp x30, x29, [x0, #0x08]",
        "stp x19, x20, [x0, #0x18]",
        "stp x21, x22, [x0, #0x28]",
        "stp x23, x24, [x0, #0x38]",
        "stp x25, x26, [x0, #0x48]",
        "stp x27, x28, [x0, #0x58]",
        "stp d8, d9, [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        "ldr x9, [x1, #0x00]",
        "mov sp, x9",
        "ldp x30, x29, [x1, #0x08]",
        "ldp x19, x20, [x1, #0x18]",
        "ldp x21, x22, [x1, #0x28]",
        "ldp x23, x24, [x1, #0x38]",
        "ldp x25, x26, [x1, #0x48]",
        "ldp x27, x28, [x1, #0x58]",
        "ldp d8, d9, [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        "ret",
    );
}

/// Build a fresh context that enters `entry` on `stack` when first
/// switched to. The entry function must never return.
pub fn init_context(stack: &mut [u8], entry: extern "C" fn() -> !) -> Context {
    // AAPCS64 requires sp to stay 16-byte aligned at all times.
    let top = (stack.as_mut_ptr() as usize + stack.len()) & !0xF;
    let mut ctx = Context::new();
    ctx.sp = top as u64;
    ctx.lr = entry as usize as u64;
    ctx
}
