//! # m0-pal
//!
//! Platform access layer for the m0 kernel.
//!
//! Targets the nRF51 family (BBC micro:bit class boards): a polled UART
//! console for logging and diagnostics, the NVIC operations the interrupt
//! bridge needs, and the RAM bounds the allocator carves up.
//!
//! Everything here is deliberately dumb. Interrupt-driven device drivers
//! are ordinary processes built on top of the kernel, not part of the
//! platform layer.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod console;
pub mod memory;
pub mod nvic;
pub mod uart;
