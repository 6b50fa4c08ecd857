//! Syscall invocation stubs for processes.
//!
//! Each stub pins its arguments to r0-r2 and executes an SVC instruction
//! whose immediate is the syscall number. The hardware stacks r0-r3 on the
//! process stack, so the dispatcher finds the arguments in the exception
//! frame regardless of what the compiler did around the call site.
//!
//! On non-embedded targets (host unit tests) the stubs panic when invoked;
//! taking their address is still fine, which is what the kernel does when
//! it primes a new process stack.

use crate::types::MsgType;

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod imp {
    use core::arch::asm;

    use crate::message::Message;
    use crate::types::{MsgType, Pid};

    /// Give up the CPU. The caller is re-queued behind its priority peers.
    #[inline]
    pub extern "C" fn yield_now() {
        // SAFETY: SVC traps to the kernel dispatcher; no memory is touched.
        unsafe {
            asm!("svc 0", options(nomem, nostack));
        }
    }

    /// Send `msg` to `dest`, blocking until it is received.
    #[inline]
    pub extern "C" fn send(dest: Pid, mtype: MsgType, msg: &mut Message) {
        // SAFETY: the kernel reads the message buffer before the call
        // returns; the pinned registers match the dispatcher's frame layout.
        unsafe {
            asm!(
                "svc 1",
                in("r0") dest.index() as u32,
                in("r1") mtype as u32,
                in("r2") msg as *mut Message,
                options(nostack)
            );
        }
    }

    /// Receive a message matching `mtype` into `msg`, blocking until one
    /// arrives.
    #[inline]
    pub extern "C" fn receive(mtype: MsgType, msg: &mut Message) {
        // SAFETY: the kernel writes the message buffer before the call
        // returns.
        unsafe {
            asm!(
                "svc 2",
                in("r0") mtype as u32,
                in("r1") msg as *mut Message,
                options(nostack)
            );
        }
    }

    /// Send `msg` to `dest` and block until a [`REPLY`](crate::types::REPLY)
    /// arrives in the same buffer.
    #[inline]
    pub extern "C" fn sendrec(dest: Pid, mtype: MsgType, msg: &mut Message) {
        // SAFETY: as for `send`, plus the reply phase writes the buffer.
        unsafe {
            asm!(
                "svc 3",
                in("r0") dest.index() as u32,
                in("r1") mtype as u32,
                in("r2") msg as *mut Message,
                options(nostack)
            );
        }
    }

    /// Terminate the calling process. New processes return here when their
    /// body falls off the end.
    pub extern "C" fn exit() -> ! {
        // SAFETY: the kernel marks the caller DEAD and never resumes it.
        unsafe {
            asm!("svc 4", options(nomem, nostack, noreturn));
        }
    }

    /// Print the state of every process to the console.
    #[inline]
    pub extern "C" fn dump() {
        // SAFETY: diagnostics only; runs on the kernel stack.
        unsafe {
            asm!("svc 5", options(nomem, nostack));
        }
    }
}

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
mod imp {
    use crate::message::Message;
    use crate::types::{MsgType, Pid};

    pub extern "C" fn yield_now() {
        unimplemented!("syscall stubs require the thumbv6m target");
    }

    pub extern "C" fn send(_dest: Pid, _mtype: MsgType, _msg: &mut Message) {
        unimplemented!("syscall stubs require the thumbv6m target");
    }

    pub extern "C" fn receive(_mtype: MsgType, _msg: &mut Message) {
        unimplemented!("syscall stubs require the thumbv6m target");
    }

    pub extern "C" fn sendrec(_dest: Pid, _mtype: MsgType, _msg: &mut Message) {
        unimplemented!("syscall stubs require the thumbv6m target");
    }

    pub extern "C" fn exit() -> ! {
        unimplemented!("syscall stubs require the thumbv6m target");
    }

    pub extern "C" fn dump() {
        unimplemented!("syscall stubs require the thumbv6m target");
    }
}

pub use imp::{dump, exit, receive, send, sendrec, yield_now};

/// Panic with an unexpected message type.
///
/// The default arm for `match` statements over request types in server
/// processes.
pub fn badmesg(mtype: MsgType) -> ! {
    panic!("bad message type {}", mtype);
}
