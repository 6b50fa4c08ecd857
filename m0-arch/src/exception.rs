//! Exception frames and the context-switch trampolines.
//!
//! # Frame layout
//!
//! On exception entry the Cortex-M0 stacks eight words (r0-r3, r12, lr, pc,
//! xPSR) on the interrupted stack. The trampolines below stack the eight
//! callee-saved registers (r4-r11) beneath that, so a suspended process is
//! always represented by a 16-word [`SavedContext`] at its stack pointer:
//!
//! | Word  | Contents          | Saved by  |
//! |-------|-------------------|-----------|
//! | 0-7   | r4-r11            | software  |
//! | 8-11  | r0-r3             | hardware  |
//! | 12    | r12               | hardware  |
//! | 13    | lr                | hardware  |
//! | 14    | pc                | hardware  |
//! | 15    | xPSR              | hardware  |
//!
//! The kernel primes this exact shape onto fresh stacks so that the first
//! restore of a new process is indistinguishable from a return to a
//! suspended one.

/// Register frame stacked by the hardware on exception entry.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExceptionFrame {
    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r12: u32,
    pub lr: u32,
    pub pc: u32,
    pub psr: u32,
}

/// Full saved context of a suspended process: the callee-saved registers
/// stored by the trampolines, followed by the hardware frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SavedContext {
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
    pub frame: ExceptionFrame,
}

// Compile-time layout verification: the trampolines and the hardware both
// count on these sizes.
const _: () = assert!(core::mem::size_of::<ExceptionFrame>() == 32);
const _: () = assert!(core::mem::size_of::<SavedContext>() == 64);

/// Initial xPSR for a fresh process: just the Thumb bit.
pub const INIT_PSR: u32 = 0x0100_0000;

impl SavedContext {
    /// A zeroed context, the starting point for priming a new stack.
    #[inline]
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            r4: 0,
            r5: 0,
            r6: 0,
            r7: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            frame: ExceptionFrame {
                r0: 0,
                r1: 0,
                r2: 0,
                r3: 0,
                r12: 0,
                lr: 0,
                pc: 0,
                psr: 0,
            },
        }
    }
}

// -- Trampolines
//
// SVCall and PendSV share one shape: finish the hardware's half-saved
// context on the process stack, hand the kernel a pointer to it, and
// resume whatever context the kernel hands back. The kernel entry points
// are `system_call` and `cxt_switch` in m0-kernel, both
// `extern "C" fn(*mut SavedContext) -> *mut SavedContext`.
//
// ARMv6-M notes: stm/ldm only reach r0-r7, so r8-r11 go through low
// registers, and the EXC_RETURN value in lr is preserved across the call
// with a push/pop on the main stack.

#[cfg(all(target_arch = "arm", target_os = "none"))]
core::arch::global_asm!(
    r#"
    .section .text.SVCall, "ax"
    .global SVCall
    .type SVCall, %function
    .thumb_func
SVCall:
    mrs r0, psp
    subs r0, #32
    stmia r0!, {r4-r7}
    mov r4, r8
    mov r5, r9
    mov r6, r10
    mov r7, r11
    stmia r0!, {r4-r7}
    subs r0, #32
    push {lr}
    bl system_call
    mov r1, r0
    adds r1, #16
    ldmia r1!, {r4-r7}
    mov r8, r4
    mov r9, r5
    mov r10, r6
    mov r11, r7
    msr psp, r1
    ldmia r0!, {r4-r7}
    pop {pc}

    .section .text.PendSV, "ax"
    .global PendSV
    .type PendSV, %function
    .thumb_func
PendSV:
    mrs r0, psp
    subs r0, #32
    stmia r0!, {r4-r7}
    mov r4, r8
    mov r5, r9
    mov r6, r10
    mov r7, r11
    stmia r0!, {r4-r7}
    subs r0, #32
    push {lr}
    bl cxt_switch
    mov r1, r0
    adds r1, #16
    ldmia r1!, {r4-r7}
    mov r8, r4
    mov r9, r5
    mov r10, r6
    mov r11, r7
    msr psp, r1
    ldmia r0!, {r4-r7}
    pop {pc}
"#,
    options(raw)
);

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn test_hardware_frame_offsets() {
        // The hardware defines these positions; nothing may move them.
        assert_eq!(offset_of!(ExceptionFrame, r0), 0);
        assert_eq!(offset_of!(ExceptionFrame, r12), 16);
        assert_eq!(offset_of!(ExceptionFrame, lr), 20);
        assert_eq!(offset_of!(ExceptionFrame, pc), 24);
        assert_eq!(offset_of!(ExceptionFrame, psr), 28);
    }

    #[test]
    fn test_saved_context_places_hardware_frame_at_word_8() {
        assert_eq!(offset_of!(SavedContext, frame), 32);
        assert_eq!(core::mem::size_of::<SavedContext>(), 64);
    }

    #[test]
    fn test_init_psr_has_thumb_bit() {
        assert_ne!(INIT_PSR & (1 << 24), 0);
    }
}
