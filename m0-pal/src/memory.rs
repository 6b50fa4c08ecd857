//! RAM layout.
//!
//! The linker script exports two symbols bracketing the RAM the kernel may
//! carve up: `__end` (first byte after .bss) and `__stack_limit` (lowest
//! byte the boot stack may grow down to). Everything in between belongs to
//! the kernel's allocator.

/// Bounds of the free RAM arena as `(start, end)` addresses.
#[cfg(all(target_arch = "arm", target_os = "none"))]
#[must_use]
pub fn arena_bounds() -> (usize, usize) {
    unsafe extern "C" {
        static __end: u8;
        static __stack_limit: u8;
    }
    // SAFETY: the symbols are provided by the linker script; only their
    // addresses are taken, never their contents.
    unsafe {
        (
            core::ptr::addr_of!(__end) as usize,
            core::ptr::addr_of!(__stack_limit) as usize,
        )
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
#[must_use]
pub fn arena_bounds() -> (usize, usize) {
    unimplemented!("the RAM arena only exists on the target; tests supply their own buffers");
}
