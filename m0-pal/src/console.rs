//! Console output.
//!
//! A single shared [`Uart`] behind an [`IrqLock`]: console output masks
//! interrupts for its duration, which is exactly the discipline the kernel
//! promises for debug printing. Newlines are expanded to CRLF for the
//! benefit of terminal emulators on the other end of the USB bridge.

use core::fmt::{self, Write};

use m0_arch::IrqLock;

use crate::uart::{UART0_BASE, Uart};

struct Console {
    uart: Uart,
    initialised: bool,
}

impl Console {
    const fn new() -> Self {
        Self {
            uart: Uart::new(UART0_BASE),
            initialised: false,
        }
    }

    fn putc(&self, c: u8) {
        if !self.initialised {
            return;
        }
        if c == b'\n' {
            self.uart.putc(b'\r');
        }
        self.uart.putc(c);
    }

    fn puts(&self, s: &str) {
        for c in s.bytes() {
            self.putc(c);
        }
    }
}

/// Global console instance
static CONSOLE: IrqLock<Console> = IrqLock::new(Console::new());

/// Initialise the console UART. Output before this call is dropped.
pub fn init() {
    let mut console = CONSOLE.lock();
    console.uart.init();
    console.initialised = true;
}

/// Print a string to the console.
pub fn puts(s: &str) {
    CONSOLE.lock().puts(s);
}

/// Print a character to the console.
pub fn putc(c: u8) {
    CONSOLE.lock().putc(c);
}

/// Console writer for `fmt::Write`
pub struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        puts(s);
        Ok(())
    }
}

/// Reclaim the console for a context that can never block or unwind.
///
/// Reconfigures the UART from scratch and returns a writer that bypasses
/// the lock, so a panic mid-print still gets its message out.
///
/// # Safety
///
/// Only callable with interrupts masked and no intention of ever releasing
/// the CPU again: it ignores any holder of the console lock.
#[must_use]
pub unsafe fn emergency() -> Uart {
    let uart = Uart::new(UART0_BASE);
    uart.init();
    uart
}

/// Print formatted output to the console
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::console::ConsoleWriter, $($arg)*);
    }};
}

/// Print formatted output with newline to the console
#[macro_export]
macro_rules! println {
    () => {
        $crate::console::puts("\n")
    };
    ($($arg:tt)*) => {{
        use core::fmt::Write;
        let _ = write!($crate::console::ConsoleWriter, $($arg)*);
        $crate::console::puts("\n");
    }};
}
