//! CPU control.
//!
//! Low-level Cortex-M0 operations. ARMv6-M has a single global interrupt
//! mask (PRIMASK); the save/restore pair below is the critical-section
//! primitive everything else is built on.
//!
//! On non-embedded targets the masking pair degenerates to no-ops so that
//! the kernel's state machine can be unit tested on the host; the
//! instructions that make no sense off-target are left unimplemented.

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod imp {
    use cortex_m::asm;
    use cortex_m::register::primask;

    /// Disable all maskable interrupts and return whether they were
    /// enabled.
    ///
    /// Pass the result to [`restore_interrupts`] to undo the effect; this
    /// makes the pair safe to nest.
    #[must_use]
    #[inline]
    pub fn disable_interrupts() -> bool {
        let was_enabled = primask::read().is_inactive();
        cortex_m::interrupt::disable();
        was_enabled
    }

    /// Restore the interrupt state saved by [`disable_interrupts`].
    #[inline]
    pub fn restore_interrupts(was_enabled: bool) {
        if was_enabled {
            // SAFETY: only re-enables interrupts that were enabled before
            // the matching disable_interrupts call.
            unsafe { cortex_m::interrupt::enable() };
        }
    }

    /// Wait for interrupt (WFI instruction). The idle process lives here.
    #[inline]
    pub fn wait_for_interrupt() {
        asm::wfi();
    }

    /// Instruction synchronisation barrier.
    #[inline]
    pub fn isb() {
        asm::isb();
    }

    /// No-operation, for timing loops.
    #[inline]
    pub fn nop() {
        asm::nop();
    }

    /// Switch thread mode onto the process stack pointer.
    ///
    /// Loads PSP with `sp` and flips CONTROL.SPSEL so that thread mode
    /// runs on the process stack from here on; handler mode keeps the main
    /// stack.
    ///
    /// # Safety
    ///
    /// `sp` must point at the top of a valid, 8-byte-aligned stack region,
    /// and the caller must be privileged thread mode code still running on
    /// the main stack.
    pub unsafe fn set_process_stack(sp: u32) {
        // SAFETY: caller guarantees sp is a valid stack top; the ISB makes
        // the stack switch visible before the next instruction fetch.
        unsafe {
            core::arch::asm!(
                "msr psp, {sp}",
                "movs {tmp}, #2",
                "msr control, {tmp}",
                "isb",
                sp = in(reg) sp,
                tmp = out(reg) _,
                options(nomem, nostack)
            );
        }
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod imp {
    /// Host stand-in: interrupts do not exist, report them as masked.
    #[must_use]
    #[inline]
    pub fn disable_interrupts() -> bool {
        false
    }

    #[inline]
    pub fn restore_interrupts(_was_enabled: bool) {}

    pub fn wait_for_interrupt() {
        unimplemented!("WFI requires the thumbv6m target");
    }

    #[inline]
    pub fn isb() {}

    #[inline]
    pub fn nop() {}

    pub unsafe fn set_process_stack(_sp: u32) {
        unimplemented!("stack switching requires the thumbv6m target");
    }
}

pub use imp::{
    disable_interrupts, isb, nop, restore_interrupts, set_process_stack, wait_for_interrupt,
};
