//! nRF51 UART driver (polled).
//!
//! Transmit-only in practice: the console and the panic path write through
//! this block by busy-waiting on TXDRDY. Receive is started so that a UART
//! driver process can take the RXDRDY interrupt over later.

use core::fmt;
use core::ptr;

/// UART0 peripheral base address.
pub const UART0_BASE: usize = 0x4000_2000;

/// UART0 interrupt number at the NVIC.
pub const UART0_IRQ: u8 = 2;

// Register offsets
const TASKS_STARTRX: usize = 0x000;
const TASKS_STARTTX: usize = 0x008;
const EVENTS_RXDRDY: usize = 0x108;
const EVENTS_TXDRDY: usize = 0x11C;
const ENABLE: usize = 0x500;
const PSELTXD: usize = 0x50C;
const PSELRXD: usize = 0x514;
const RXD: usize = 0x518;
const TXD: usize = 0x51C;
const BAUDRATE: usize = 0x524;
const CONFIG: usize = 0x56C;

const ENABLE_DISABLED: u32 = 0;
const ENABLE_ENABLED: u32 = 4;
const BAUD_115200: u32 = 0x01D7_E000;

/// TX pin routed to the USB serial bridge on micro:bit class boards.
pub const USB_TX: u32 = 24;
/// RX pin routed to the USB serial bridge on micro:bit class boards.
pub const USB_RX: u32 = 25;

/// A UART peripheral instance.
#[derive(Clone, Copy)]
pub struct Uart {
    base: usize,
}

impl Uart {
    /// Create a handle for the UART at `base`.
    #[must_use]
    pub const fn new(base: usize) -> Self {
        Self { base }
    }

    #[inline]
    fn reg_read(&self, offset: usize) -> u32 {
        // SAFETY: offset is one of the register constants above, inside
        // the peripheral's MMIO window.
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn reg_write(&self, offset: usize, value: u32) {
        // SAFETY: as for reg_read.
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }

    /// Configure the UART: 115200 baud, 8N1, pins routed to the USB
    /// bridge. Safe to call again at any time; the panic path does.
    pub fn init(&self) {
        self.reg_write(ENABLE, ENABLE_DISABLED);
        self.reg_write(PSELTXD, USB_TX);
        self.reg_write(PSELRXD, USB_RX);
        self.reg_write(BAUDRATE, BAUD_115200);
        self.reg_write(CONFIG, 0); // 8N1, no flow control
        self.reg_write(ENABLE, ENABLE_ENABLED);
        self.reg_write(TASKS_STARTTX, 1);
        self.reg_write(TASKS_STARTRX, 1);
        self.reg_write(EVENTS_TXDRDY, 0);
        self.reg_write(EVENTS_RXDRDY, 0);
    }

    /// Transmit one byte, busy-waiting until the shifter takes it.
    pub fn putc(&self, byte: u8) {
        self.reg_write(TXD, byte as u32);
        while self.reg_read(EVENTS_TXDRDY) == 0 {
            core::hint::spin_loop();
        }
        self.reg_write(EVENTS_TXDRDY, 0);
    }

    /// Read a received byte if one is ready.
    #[must_use]
    pub fn getc(&self) -> Option<u8> {
        if self.reg_read(EVENTS_RXDRDY) == 0 {
            return None;
        }
        self.reg_write(EVENTS_RXDRDY, 0);
        Some(self.reg_read(RXD) as u8)
    }
}

impl fmt::Write for Uart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.putc(byte);
        }
        Ok(())
    }
}
