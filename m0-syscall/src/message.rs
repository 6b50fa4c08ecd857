//! IPC message layout.
//!
//! Messages are fixed-size value carriers. The kernel stamps the two header
//! fields on delivery; the payload words are opaque to it and copied
//! verbatim between the sender's and the receiver's buffers.

use crate::types::{MsgType, Pid};

/// Number of payload words in a message.
pub const MSG_WORDS: usize = 4;

/// A rendezvous message.
///
/// 24 bytes: small enough to copy by value in a few instructions, and the
/// whole structure fits in a single cache line on any target that has one.
///
/// # Invariants
///
/// - `mtype` and `sender` are overwritten by the kernel on every delivery;
///   values placed there by the sender are ignored
/// - `words` is never interpreted by the kernel
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Message {
    /// Type tag. Stamped by the kernel on delivery.
    pub mtype: MsgType,
    /// Sending process. Stamped by the kernel on delivery.
    pub sender: Pid,
    _reserved: u16,
    /// Payload words, opaque to the kernel.
    pub words: [u32; MSG_WORDS],
}

// Compile-time size verification
const _: () = assert!(core::mem::size_of::<Message>() == 24);
const _: () = assert!(core::mem::align_of::<Message>() == 4);

impl Message {
    /// Create an empty message.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mtype: 0,
            sender: Pid::IDLE,
            _reserved: 0,
            words: [0; MSG_WORDS],
        }
    }

    /// Get a payload word by index.
    #[inline]
    #[must_use]
    pub const fn word(&self, index: usize) -> Option<u32> {
        if index < MSG_WORDS {
            Some(self.words[index])
        } else {
            None
        }
    }

    /// Set a payload word by index. Returns `false` if out of range.
    #[inline]
    pub fn set_word(&mut self, index: usize, value: u32) -> bool {
        if index < MSG_WORDS {
            self.words[index] = value;
            true
        } else {
            false
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}
