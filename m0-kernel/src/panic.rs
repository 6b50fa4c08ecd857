//! Panics and faults.
//!
//! There are three error classes and they all end here: programming
//! errors (bad destination, bad priority, unknown syscall), resource
//! exhaustion, and CPU faults. None of them is recoverable; the handler
//! masks interrupts, says what happened and to whom, and spins.

/// HardFault entry; wire the vector here. Nothing survives one.
#[unsafe(no_mangle)]
pub extern "C" fn hardfault_handler() -> ! {
    panic!("HardFault");
}

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod handler {
    use core::fmt::Write;
    use core::panic::PanicInfo;

    use m0_pal::console;

    use crate::kernel::KERNEL;
    use crate::proc::NPROCS;

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        let _ = m0_arch::cpu::disable_interrupts();

        // SAFETY: interrupts are masked and this context never yields, so
        // bypassing the console lock cannot interleave with anyone who
        // will ever run again.
        let mut uart = unsafe { console::emergency() };
        let _ = write!(uart, "\r\npanic: {}", info.message());

        // Best-effort blame line. Everything is checked by hand: a second
        // panic in here would recurse forever.
        // SAFETY: read-only peek past the kernel lock; same argument as
        // for the console.
        let kernel = unsafe { &*KERNEL.as_mut_ptr() };
        if let Some(pid) = kernel.current {
            let idx = pid.index() as usize;
            if idx < NPROCS {
                if let Some(p) = kernel.ptable[idx] {
                    // SAFETY: descriptors live in the arena forever.
                    let name = unsafe { (*p.as_ptr()).name_str() };
                    let _ = write!(uart, " in process {}", name);
                }
            }
        }
        let _ = uart.write_str("\r\n");

        loop {}
    }
}
