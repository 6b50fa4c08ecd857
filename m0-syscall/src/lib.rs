//! # m0-syscall
//!
//! Syscall ABI shared by the m0 kernel and its processes.
//!
//! This crate defines everything both sides of the SVC boundary must agree
//! on: process identifiers, message layout, reserved type tags, priority
//! levels, syscall numbers and the SVC invocation stubs.
//!
//! # ABI
//!
//! - The SVC immediate byte carries the syscall number
//! - r0-r2: arguments (destination, type tag, message pointer)
//! - Message payloads are transferred by value between process-owned buffers
//!
//! # no_std
//!
//! This crate is `#![no_std]` and has zero dependencies, making it suitable
//! as a foundation crate that all other m0 crates can depend on.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod invoke;
pub mod message;
pub mod numbers;
pub mod types;

// Re-export commonly used items
pub use message::Message;
pub use numbers::Syscall;
pub use types::{
    ANY, HARDWARE, INTERRUPT, MsgType, P_HANDLER, P_HIGH, P_IDLE, P_LOW, Pid, Priority, REPLY,
};
