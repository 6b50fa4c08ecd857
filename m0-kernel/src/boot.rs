//! Startup.
//!
//! `os_init` builds the idle process, `start` creates the application
//! processes, and `os_start` morphs the boot thread into the idle process
//! and hands the CPU to the scheduler. Every process is created before the
//! scheduler starts; there is no dynamic creation afterwards.

use m0_arch::cpu;
use m0_arch::exception::{INIT_PSR, SavedContext};
use m0_pal::{console, memory, nvic};
use m0_syscall::{Pid, invoke};

use crate::alloc::Arena;
use crate::kernel::{KERNEL, Kernel, make_idle};
use crate::logging;

/// Stack for the idle process. It only ever holds one saved context and a
/// wait-for-interrupt loop.
const IDLE_STACK: usize = 256;

/// Initialise the kernel: console, logging, exception priorities, the RAM
/// arena, and the idle process as PID 0.
///
/// Call once from the reset path, before any [`start`].
pub fn os_init() {
    console::init();
    logging::init();
    nvic::init_exception_priorities();

    let (lo, hi) = memory::arena_bounds();
    let mut kernel = KERNEL.lock();
    // SAFETY: the linker script reserves [lo, hi) for the kernel arena.
    kernel.arena = unsafe { Arena::new(lo as *mut u8, hi as *mut u8) };

    let idle = kernel.init_proc("idle", IDLE_STACK);
    make_idle(&mut kernel, idle);
    log::debug!("kernel initialised, arena {:#010x}..{:#010x}", lo, hi);
}

/// Prime a fresh stack so the first context restore enters `body_addr`.
///
/// Builds a synthetic 16-word frame at the top of the stack: PSR with the
/// Thumb bit, pc at the body (interworking bit cleared), lr at the exit
/// stub so a returning body terminates cleanly, r0 carrying the argument.
pub(crate) fn prime(kernel: &mut Kernel, pid: Pid, body_addr: u32, arg: i32, ret_addr: u32) {
    let p = kernel.proc_mut(pid);
    // SAFETY: sp is the top of this process's freshly painted stack,
    // which comfortably holds one SavedContext.
    let ctx = unsafe { p.sp.sub(1) };

    let mut init = SavedContext::zeroed();
    init.frame.psr = INIT_PSR;
    init.frame.pc = body_addr & !1;
    init.frame.lr = ret_addr;
    init.frame.r0 = arg as u32;
    // SAFETY: ctx is in-bounds and exclusively ours until the process
    // first runs.
    unsafe { ctx.write(init) };

    p.sp = ctx;
}

/// Create a process that will run `body(arg)` on a `stksize`-byte stack
/// once the scheduler starts. Returns its PID.
///
/// # Panics
///
/// Panics after [`os_start`], when the process table is full, or when the
/// arena cannot hold the stack.
pub fn start(name: &str, body: extern "C" fn(i32), arg: i32, stksize: usize) -> Pid {
    let mut kernel = KERNEL.lock();
    if kernel.started {
        panic!("start() called after os_start()");
    }

    let pid = kernel.init_proc(name, stksize);
    prime(
        &mut kernel,
        pid,
        body as usize as u32,
        arg,
        invoke::exit as usize as u32,
    );

    let prio = kernel.proc(pid).priority;
    kernel.make_ready(pid, prio);
    pid
}

/// Start the scheduler. Never returns.
///
/// The boot thread becomes the idle process: thread mode switches onto
/// idle's small stack, a yield picks the first real process, and from then
/// on this loop only runs when nothing else can, waiting for interrupts.
pub fn os_start() -> ! {
    let idle_sp = {
        let mut kernel = KERNEL.lock();
        kernel.started = true;
        kernel.set_current(Pid::IDLE);
        kernel.proc(Pid::IDLE).sp as u32
    };

    // SAFETY: idle's stack was allocated and painted by os_init; we are
    // the boot thread on the main stack.
    unsafe { cpu::set_process_stack(idle_sp) };

    invoke::yield_now();

    loop {
        cpu::wait_for_interrupt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::testing::TestKernel;
    use crate::proc::BLANK;

    extern "C" fn body(_arg: i32) {}
    extern "C" fn fake_exit() {}

    #[test]
    fn test_primed_frame_matches_the_hardware_layout() {
        let mut h = TestKernel::new();
        let pid = h.k.init_proc("p", 256);
        let top = h.k.proc(pid).sp;

        let body_addr = body as usize as u32;
        let ret_addr = fake_exit as usize as u32;
        prime(&mut h.k, pid, body_addr | 1, 42, ret_addr);

        let sp = h.k.proc(pid).sp;
        assert_eq!(sp as usize, top as usize - 64);

        let words: [u32; 16] = unsafe { core::ptr::read(sp.cast()) };
        assert_eq!(words[8], 42); // r0 carries the argument
        assert_eq!(words[13], ret_addr); // lr returns into exit
        assert_eq!(words[14], body_addr & !1); // pc, thumb bit cleared
        assert_eq!(words[15], INIT_PSR); // psr has the thumb bit
        assert_eq!(words[..8], [0; 8]); // callee-saved registers clear
    }

    #[test]
    fn test_primed_stack_keeps_its_paint_below_the_frame() {
        let mut h = TestKernel::new();
        let pid = h.k.init_proc("p", 256);
        prime(&mut h.k, pid, 0x1001, 0, 0x2001);

        let p = h.k.proc(pid);
        // Everything below the synthetic frame is still BLANK.
        let words = (p.stack_size - 64) / 4;
        unsafe {
            for i in 0..words {
                assert_eq!(core::ptr::read(p.stack_base.add(i)), BLANK);
            }
        }
        assert_eq!(p.stack_free_bytes(), p.stack_size - 64);
    }
}
