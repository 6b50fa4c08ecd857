//! Kernel logging.
//!
//! Backs the `log` crate facade with the pal console. Records are
//! formatted into a fixed stack buffer and written out in one piece under
//! the console lock, so concurrent trap-context logging cannot interleave
//! mid-line. There is no buffering layer: with no userspace to drain a
//! ring, every record goes straight to the UART, which is slow and
//! therefore kept at `Debug` and above by default.

use core::fmt::Write;

use log::{Level, LevelFilter, Log, Metadata, Record};
use m0_pal::console;

/// Formatting buffer for one record.
const MSG_BUF: usize = 128;

/// Stack buffer the record is formatted into before printing.
struct MessageBuffer {
    data: [u8; MSG_BUF],
    len: usize,
}

impl MessageBuffer {
    const fn new() -> Self {
        Self {
            data: [0; MSG_BUF],
            len: 0,
        }
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.data[..self.len]).unwrap_or("<invalid>")
    }
}

impl Write for MessageBuffer {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = MSG_BUF - self.len;
        let to_copy = bytes.len().min(remaining);
        self.data[self.len..self.len + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.len += to_copy;
        Ok(())
    }
}

/// Kernel logger implementation
struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let level_str = match record.level() {
                Level::Error => "ERROR",
                Level::Warn => " WARN",
                Level::Info => " INFO",
                Level::Debug => "DEBUG",
                Level::Trace => "TRACE",
            };

            let mut buf = MessageBuffer::new();
            let _ = write!(buf, "{} {}: {}\n", level_str, record.target(), record.args());
            console::puts(buf.as_str());
        }
    }

    fn flush(&self) {}
}

/// Global logger instance
static LOGGER: KernelLogger = KernelLogger;

/// Initialise the logging system.
pub fn init() {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Debug))
        .ok();
}
