//! # m0-arch
//!
//! ARMv6-M CPU support for the m0 kernel.
//!
//! This crate owns everything that knows about the Cortex-M0 execution
//! model: interrupt masking, the WFI idle primitive, the exception frame
//! layout shared with the hardware, and the assembly trampolines that carry
//! a process's registers across SVCall and PendSV.
//!
//! Nothing in here knows about processes or messages; the kernel crate
//! builds those on top.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cpu;
pub mod exception;
pub mod sync;

pub use cpu::{disable_interrupts, restore_interrupts, wait_for_interrupt};
pub use exception::{ExceptionFrame, INIT_PSR, SavedContext};
pub use sync::IrqLock;
