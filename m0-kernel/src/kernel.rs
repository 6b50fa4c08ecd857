//! Kernel state.
//!
//! All mutable kernel state lives in one aggregate behind one interrupt-
//! masking lock. The SVC and PendSV handlers are serialised by the
//! hardware; the lock makes the same guarantee hold for the configuration
//! calls that run in thread mode (`start`, `connect`, `priority`) and
//! keeps the whole state machine testable on the host.

use core::ptr::NonNull;

use m0_arch::IrqLock;
use m0_pal::nvic::NIRQS;
use m0_syscall::{P_IDLE, Pid};

use crate::alloc::{Arena, round_up};
use crate::proc::{NPROCS, Proc, ProcState};
use crate::sched::{NQUEUES, ReadyQueue};

/// The kernel state aggregate.
pub struct Kernel {
    /// RAM arena stacks and descriptors are carved from.
    pub(crate) arena: Arena,
    /// Descriptors by PID. Slots fill densely from 0 and never empty.
    pub(crate) ptable: [Option<NonNull<Proc>>; NPROCS],
    /// One past the highest allocated PID.
    pub(crate) nprocs: usize,
    /// The running process; the caller, while inside a trap.
    pub(crate) current: Option<Pid>,
    /// One FIFO per non-idle priority level.
    pub(crate) readyq: [ReadyQueue; NQUEUES],
    /// Registered handler process per peripheral interrupt.
    pub(crate) handlers: [Option<Pid>; NIRQS],
    /// Set once `os_start` runs; `start` refuses service afterwards.
    pub(crate) started: bool,
}

// SAFETY: the descriptor pointers all target the arena, which is never
// reclaimed, and every access path goes through the IrqLock below.
unsafe impl Send for Kernel {}

/// The one kernel instance.
pub static KERNEL: IrqLock<Kernel> = IrqLock::new(Kernel::empty());

impl Kernel {
    /// An inert kernel: no arena, no processes. `os_init` fills it in.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            arena: Arena::empty(),
            ptable: [None; NPROCS],
            nprocs: 0,
            current: None,
            readyq: [ReadyQueue::new(); NQUEUES],
            handlers: [None; NIRQS],
            started: false,
        }
    }

    /// Borrow the descriptor for `pid`.
    ///
    /// # Panics
    ///
    /// Panics if the slot was never allocated; PIDs reaching this point
    /// have been validated or were issued by the kernel itself.
    pub(crate) fn proc(&self, pid: Pid) -> &Proc {
        match self.ptable[pid.index() as usize] {
            // SAFETY: descriptors live in the arena for the kernel's
            // lifetime; borrows are serialised by the kernel lock.
            Some(p) => unsafe { &*p.as_ptr() },
            None => panic!("no process {}", pid),
        }
    }

    /// Mutably borrow the descriptor for `pid`. See [`Self::proc`].
    pub(crate) fn proc_mut(&mut self, pid: Pid) -> &mut Proc {
        match self.ptable[pid.index() as usize] {
            // SAFETY: as for proc(); &mut self serialises writers.
            Some(p) => unsafe { &mut *p.as_ptr() },
            None => panic!("no process {}", pid),
        }
    }

    /// The running process.
    ///
    /// # Panics
    ///
    /// Panics before `os_init` has built the idle process.
    pub(crate) fn current(&self) -> Pid {
        match self.current {
            Some(pid) => pid,
            None => panic!("no current process"),
        }
    }

    pub(crate) fn set_current(&mut self, pid: Pid) {
        self.current = Some(pid);
    }

    /// Allocate and initialise a process: descriptor from the top of the
    /// arena, a painted stack from the bottom.
    ///
    /// The new process is Active at the default priority but not yet on a
    /// ready queue; `start` finishes the job.
    pub(crate) fn init_proc(&mut self, name: &str, stksize: usize) -> Pid {
        if self.nprocs >= NPROCS {
            panic!("too many processes");
        }
        let pid = Pid::from_index(self.nprocs as u16);
        let size = round_up(stksize, crate::alloc::STACK_ALIGN);

        let mut desc = self.arena.alloc_descriptor::<Proc>();
        let stack = self.arena.alloc_stack(size).cast::<u32>();

        // SAFETY: the slot was just allocated for exactly this write.
        unsafe {
            desc.as_ptr()
                .write(Proc::new(pid, name, stack.as_ptr(), size));
        }
        self.ptable[pid.index() as usize] = Some(desc);
        self.nprocs += 1;

        log::debug!(
            "process {} '{}' stack {} bytes at {:#010x}",
            pid,
            // SAFETY: just written above.
            unsafe { desc.as_mut().name_str() },
            size,
            stack.as_ptr() as usize,
        );
        pid
    }

    /// The handler registered for a peripheral interrupt, if any.
    #[inline]
    pub(crate) fn handler_for(&self, irq: usize) -> Option<Pid> {
        self.handlers[irq]
    }

    /// Print one line per process: pid, state, stack placement and usage,
    /// name. Runs on the kernel stack from the dispatcher.
    pub(crate) fn dump_processes(&self) {
        m0_pal::println!();
        m0_pal::println!("PROCESS DUMP");
        for idx in 0..self.nprocs {
            let p = self.proc(Pid::from_index(idx as u16));
            let free = p.stack_free_bytes();
            m0_pal::println!(
                "{:2}: {} {:#010x} stk={}/{} {}",
                p.pid,
                p.state.tag(),
                p.stack_base as usize,
                p.stack_size - free,
                p.stack_size,
                p.name_str(),
            );
        }
    }
}

/// Mark the idle slot: PID 0, IDLING, the sentinel priority, never queued.
pub(crate) fn make_idle(kernel: &mut Kernel, pid: Pid) {
    let p = kernel.proc_mut(pid);
    p.state = ProcState::Idling;
    p.priority = P_IDLE;
}

#[cfg(test)]
pub(crate) mod testing {
    //! A kernel over a host-allocated arena, for unit tests.

    use super::*;
    use m0_syscall::Message;
    use std::boxed::Box;

    /// Arena size for test kernels.
    const TEST_RAM: usize = 16 * 1024;

    pub(crate) struct TestKernel {
        // Keeps the arena memory alive; the kernel points into it.
        _ram: Box<[u64; TEST_RAM / 8]>,
        pub k: Kernel,
    }

    impl TestKernel {
        /// A kernel with an idle process, mirroring the state after
        /// `os_init`.
        pub fn new() -> Self {
            let mut ram = Box::new([0u64; TEST_RAM / 8]);
            let start = ram.as_mut_ptr() as *mut u8;
            let end = unsafe { start.add(TEST_RAM) };

            let mut k = Kernel::empty();
            k.arena = unsafe { Arena::new(start, end) };
            let idle = k.init_proc("idle", 256);
            make_idle(&mut k, idle);

            Self { _ram: ram, k }
        }

        /// Create a process the way `start` does: descriptor, stack and a
        /// place in the ready queue, at the default priority.
        pub fn spawn(&mut self, name: &str) -> Pid {
            let pid = self.k.init_proc(name, 256);
            let prio = self.k.proc(pid).priority;
            self.k.make_ready(pid, prio);
            pid
        }

        /// Pick the next process and pretend to run it.
        pub fn schedule(&mut self) -> Pid {
            self.k.choose_proc();
            self.k.current()
        }

        /// Force `pid` to be the running process, dequeueing it the way a
        /// real dispatch would.
        pub fn run(&mut self, pid: Pid) {
            self.k.take_from_ready(pid);
            self.k.set_current(pid);
        }

        /// State shorthand.
        pub fn state(&self, pid: Pid) -> ProcState {
            self.k.proc(pid).state
        }
    }

    /// A message buffer whose address stays put for the duration of a
    /// blocked operation.
    pub(crate) fn msg_buf() -> Box<Message> {
        Box::new(Message::new())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::TestKernel;
    use super::*;

    #[test]
    fn test_pids_are_dense_table_indices() {
        let mut h = TestKernel::new();
        let a = h.spawn("a");
        let b = h.spawn("b");
        assert_eq!(a.index(), 1);
        assert_eq!(b.index(), 2);
        assert_eq!(h.k.nprocs, 3);
        assert_eq!(h.k.proc(a).pid, a);
    }

    #[test]
    fn test_idle_is_pid_zero_and_idling() {
        let h = TestKernel::new();
        assert_eq!(h.k.proc(Pid::IDLE).state, ProcState::Idling);
        assert_eq!(h.k.proc(Pid::IDLE).priority, P_IDLE);
    }

    #[test]
    fn test_descriptors_sit_above_all_stacks() {
        let mut h = TestKernel::new();
        let a = h.spawn("a");
        let idle_desc = h.k.ptable[0].unwrap().as_ptr() as usize;
        let a_desc = h.k.ptable[1].unwrap().as_ptr() as usize;
        let p = h.k.proc(a);
        let stack_end = p.stack_base as usize + p.stack_size;
        assert!(stack_end <= a_desc);
        assert!(a_desc <= idle_desc);
    }

    #[test]
    #[should_panic(expected = "too many processes")]
    fn test_table_capacity_is_enforced() {
        let mut h = TestKernel::new();
        for _ in 0..NPROCS {
            let _ = h.k.init_proc("p", 64);
        }
    }
}
