//! Syscall numbers.
//!
//! The number is encoded in the 8-bit immediate of the SVC instruction, so
//! the dispatcher recovers it from the instruction preceding the stacked
//! return address rather than from a register.

/// Syscall numbers.
///
/// Low numbers are given to the high-frequency scheduling and IPC
/// operations.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syscall {
    /// Give up the CPU; the caller stays runnable.
    Yield = 0,
    /// Send a message (blocks until the destination receives it).
    Send = 1,
    /// Receive a message (blocks until one matches the filter).
    Receive = 2,
    /// Combined send + wait for a [`REPLY`](crate::types::REPLY).
    SendRec = 3,
    /// Terminate the calling process.
    Exit = 4,
    /// Print the process table on the kernel stack.
    Dump = 5,
}

impl Syscall {
    /// Decode a syscall number. Returns `None` for unknown operands.
    #[must_use]
    pub const fn from_number(num: u8) -> Option<Self> {
        match num {
            0 => Some(Self::Yield),
            1 => Some(Self::Send),
            2 => Some(Self::Receive),
            3 => Some(Self::SendRec),
            4 => Some(Self::Exit),
            5 => Some(Self::Dump),
            _ => None,
        }
    }

    /// Get the human-readable name for this syscall.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Yield => "Yield",
            Self::Send => "Send",
            Self::Receive => "Receive",
            Self::SendRec => "SendRec",
            Self::Exit => "Exit",
            Self::Dump => "Dump",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_number_round_trip() {
        for sc in [
            Syscall::Yield,
            Syscall::Send,
            Syscall::Receive,
            Syscall::SendRec,
            Syscall::Exit,
            Syscall::Dump,
        ] {
            assert_eq!(Syscall::from_number(sc as u8), Some(sc));
        }
    }

    #[test]
    fn test_from_number_rejects_unknown() {
        assert_eq!(Syscall::from_number(6), None);
        assert_eq!(Syscall::from_number(0xFF), None);
    }
}
