//! NVIC and system-exception plumbing.
//!
//! The interrupt bridge in the kernel is built from four operations:
//! enable or disable a peripheral interrupt, discover which vector is
//! active from inside a handler, and request a PendSV reschedule. All of
//! them live here, next to the one-time exception priority setup.

use core::ptr;

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::{NVIC, SCB};

/// Number of peripheral interrupt lines on the nRF51.
pub const NIRQS: usize = 32;

// System handler priority registers (ARMv6-M: word access only).
const SHPR2: usize = 0xE000_ED1C;
const SHPR3: usize = 0xE000_ED20;

/// A peripheral interrupt number (0..=31).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Irq(u8);

impl Irq {
    /// Create an interrupt number.
    ///
    /// # Panics
    ///
    /// Panics if `n` is outside the peripheral range.
    #[must_use]
    pub fn new(n: u8) -> Self {
        assert!((n as usize) < NIRQS, "bad irq {}", n);
        Self(n)
    }

    /// Get the raw interrupt number.
    #[inline]
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }
}

// SAFETY: Irq::new bounds-checks against the vector table size.
unsafe impl InterruptNumber for Irq {
    fn number(self) -> u16 {
        self.0 as u16
    }
}

/// Enable a peripheral interrupt at the NVIC.
pub fn enable_irq(irq: Irq) {
    // SAFETY: the kernel routes every enabled interrupt to a registered
    // handler process; there are no mask-based critical sections to break.
    unsafe { NVIC::unmask(irq) };
}

/// Disable a peripheral interrupt at the NVIC.
pub fn disable_irq(irq: Irq) {
    NVIC::mask(irq);
}

/// The vector number currently being serviced, as a peripheral interrupt
/// number. CPU exceptions come back negative, matching their architected
/// numbering.
#[must_use]
pub fn active_irq() -> i32 {
    // SAFETY: ICSR is always readable; VECTACTIVE is its low 9 bits.
    let vectactive = unsafe { (*SCB::PTR).icsr.read() } & 0x1FF;
    vectactive as i32 - 16
}

/// Request a PendSV, the deferred reschedule exception.
///
/// Fires once every handler of higher priority has finished, which is how
/// an interrupt-woken handler process preempts the interrupted one.
#[inline]
pub fn request_reschedule() {
    SCB::set_pendsv();
}

/// Set the fixed exception priorities the kernel relies on: SVCall above
/// everything the bridge uses, PendSV below everything, so a reschedule
/// request is always the last exception to run.
pub fn init_exception_priorities() {
    // SVCall priority 0 (SHPR2[31:24]), PendSV priority 3 (SHPR3[23:16]).
    // ARMv6-M implements two priority bits, [7:6] of each field.
    // SAFETY: word-sized writes to the architected SHPR registers.
    unsafe {
        ptr::write_volatile(SHPR2 as *mut u32, 0x0000_0000);
        ptr::write_volatile(SHPR3 as *mut u32, 0x00C0_0000);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irq_number_round_trip() {
        assert_eq!(Irq::new(7).number(), 7);
    }

    #[test]
    #[should_panic(expected = "bad irq")]
    fn test_irq_out_of_range_panics() {
        let _ = Irq::new(32);
    }
}
