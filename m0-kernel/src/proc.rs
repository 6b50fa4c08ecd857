//! Process descriptors.
//!
//! A descriptor carries everything the kernel knows about one process:
//! identity, state, the saved stack pointer, the stack region, scheduling
//! priority, and the IPC bookkeeping (sender queue head, pending interrupt
//! flag, the type filter and buffer of an in-flight operation).
//!
//! Descriptors are allocated from the high end of the RAM arena and
//! referenced by PID everywhere else; list membership is threaded through
//! the `next` field, so a descriptor is on at most one list at a time.

use core::ptr;

use m0_arch::exception::SavedContext;
use m0_syscall::{ANY, Message, MsgType, P_LOW, Pid, Priority};

// -- Constants

/// Process table capacity.
pub const NPROCS: usize = 32;

/// Bytes reserved for the debugging name.
pub const NAME_LEN: usize = 16;

/// Filler painted over fresh stacks, so unused depth can be measured and
/// overflow spotted in a dump.
pub const BLANK: u32 = 0xDEAD_BEEF;

/// Process state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ProcState {
    /// Table slot holds no live process.
    #[default]
    Dead = 0,
    /// Runnable: running now or queued on a ready queue.
    Active = 1,
    /// Blocked on a receiver's sender queue.
    Sending = 2,
    /// Blocked waiting for a matching message.
    Receiving = 3,
    /// Blocked on a receiver's sender queue, with a reply phase to follow.
    SendRec = 4,
    /// The idle process; implicitly runnable, never queued.
    Idling = 5,
}

impl ProcState {
    /// Fixed-width tag for the process dump.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Dead => "[DEAD]   ",
            Self::Active => "[ACTIVE] ",
            Self::Sending => "[SENDING]",
            Self::Receiving => "[RCVING] ",
            Self::SendRec => "[SENDREC]",
            Self::Idling => "[IDLING] ",
        }
    }

    /// Check if a process in this state is waiting on another party.
    #[inline]
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::Sending | Self::Receiving | Self::SendRec)
    }
}

/// A process descriptor.
pub struct Proc {
    /// Process id, equal to this descriptor's table index.
    pub pid: Pid,
    /// Name for debugging.
    pub name: [u8; NAME_LEN],
    /// Current state.
    pub state: ProcState,
    /// Saved stack pointer while suspended.
    pub sp: *mut SavedContext,
    /// Low end of the stack region.
    pub stack_base: *mut u32,
    /// Stack region size in bytes.
    pub stack_size: usize,
    /// Priority; 0 is highest, the idle level never queues.
    pub priority: Priority,
    /// Head of the queue of processes waiting to send here.
    pub waiting: Option<Pid>,
    /// An interrupt arrived while not receiving; deliver at next receive.
    pub pending: bool,
    /// Type being sent, or the receive filter, for the blocked operation.
    pub msgtype: MsgType,
    /// Caller-supplied message buffer for the blocked operation.
    pub message: *mut Message,
    /// Link for the one list this descriptor may be on.
    pub next: Option<Pid>,
}

impl Proc {
    /// Initialise a descriptor over a freshly allocated stack region.
    ///
    /// Paints the whole region with [`BLANK`] and parks the saved stack
    /// pointer at the top.
    pub(crate) fn new(pid: Pid, name: &str, stack_base: *mut u32, stack_size: usize) -> Self {
        debug_assert_eq!(stack_size % 4, 0);
        // SAFETY: the allocator just handed out [stack_base, +stack_size)
        // for this process alone.
        unsafe {
            for i in 0..stack_size / 4 {
                ptr::write(stack_base.add(i), BLANK);
            }
        }
        let mut p = Self {
            pid,
            name: [0; NAME_LEN],
            state: ProcState::Active,
            sp: unsafe { stack_base.add(stack_size / 4) }.cast(),
            stack_base,
            stack_size,
            priority: P_LOW,
            waiting: None,
            pending: false,
            msgtype: ANY,
            message: ptr::null_mut(),
            next: None,
        };
        p.set_name(name);
        p
    }

    /// Set the debugging name, truncating to [`NAME_LEN`] bytes.
    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_LEN);
        self.name[..len].copy_from_slice(&bytes[..len]);
        if len < NAME_LEN {
            self.name[len..].fill(0);
        }
    }

    /// The debugging name as a string slice.
    #[must_use]
    pub fn name_str(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("<invalid>")
    }

    /// Check if this process is receiving and its filter admits `mtype`.
    #[inline]
    #[must_use]
    pub fn accepts(&self, mtype: MsgType) -> bool {
        self.state == ProcState::Receiving && (self.msgtype == ANY || self.msgtype == mtype)
    }

    /// Record a blocked IPC operation: the state, the type being sent or
    /// filtered on, and the caller's buffer.
    #[inline]
    pub(crate) fn set_ipc(&mut self, state: ProcState, mtype: MsgType, msg: *mut Message) {
        self.state = state;
        self.msgtype = mtype;
        self.message = msg;
    }

    /// Bytes of stack never yet written, measured by scanning for the
    /// first word that no longer holds [`BLANK`].
    #[must_use]
    pub fn stack_free_bytes(&self) -> usize {
        let words = self.stack_size / 4;
        let mut free = 0;
        // SAFETY: the region belongs to this process and stays mapped.
        unsafe {
            for i in 0..words {
                if ptr::read(self.stack_base.add(i)) != BLANK {
                    break;
                }
                free += 4;
            }
        }
        free
    }
}
