//! # m0-kernel
//!
//! A preemptive message-passing microkernel for single-core Cortex-M0
//! class devices: no MMU, a few KB of RAM, and a fixed set of processes
//! that talk exclusively by synchronous rendezvous.
//!
//! # Model
//!
//! - Every process is created with [`start`] before [`os_start`]; there is
//!   no creation or reclamation afterwards
//! - Three priority levels with round-robin inside each; the idle process
//!   (PID 0) runs a wait-for-interrupt loop when everything is blocked
//! - [`send`], [`receive`] and [`sendrec`] block until the rendezvous
//!   completes; message buffers are copied by value and stamped with the
//!   sender and type on delivery
//! - A driver process claims a peripheral interrupt with [`connect`];
//!   each firing becomes an INTERRUPT message from [`HARDWARE`], or a
//!   pending flag if the driver is mid-service
//!
//! # Boot contract
//!
//! The board's reset path calls [`os_init`], then [`start`] for each
//! process, then [`os_start`]. The vector table routes SVCall and PendSV
//! to the trampolines exported by `m0-arch`, every connected peripheral
//! interrupt to [`irq_dispatch`](irq::irq_dispatch), and HardFault to
//! [`hardfault_handler`](panic::hardfault_handler).
//!
//! # Errors
//!
//! The IPC API has no error channel. Bad destinations, bad priorities,
//! exhaustion and faults all panic: print and stop. Processes that want
//! to model failure put it in the message payload.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod alloc;
pub mod boot;
pub mod ipc;
pub mod irq;
pub mod kernel;
pub mod logging;
pub mod panic;
pub mod proc;
pub mod sched;
pub mod syscall;

pub use boot::{os_init, os_start, start};
pub use irq::{connect, interrupt, priority};

// The process-side API: syscall stubs and the ABI types they traffic in.
pub use m0_syscall::invoke::{badmesg, dump, exit, receive, send, sendrec, yield_now};
pub use m0_syscall::{
    ANY, HARDWARE, INTERRUPT, Message, MsgType, P_HANDLER, P_HIGH, P_IDLE, P_LOW, Pid, Priority,
    REPLY,
};
