//! Ready queues and the scheduler.
//!
//! One FIFO per non-idle priority level, threaded through the descriptors'
//! `next` field. Scheduling is strict priority with round-robin inside a
//! level: the first non-empty queue, scanned from priority 0 down, yields
//! the next process; when every queue is empty the idle process runs
//! implicitly.
//!
//! The running process is never kept on a queue. It re-enters one only at
//! the explicit yield points: a syscall that blocks or yields, or the
//! context switch on interrupt return.

use m0_syscall::{P_IDLE, Pid, Priority};

use crate::kernel::Kernel;
use crate::proc::ProcState;

/// Number of ready queues; the idle level has none.
pub(crate) const NQUEUES: usize = P_IDLE as usize;

/// A FIFO of descriptors, linked by PID.
#[derive(Clone, Copy)]
pub struct ReadyQueue {
    head: Option<Pid>,
    tail: Option<Pid>,
}

impl ReadyQueue {
    /// An empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Mark `pid` runnable and append it to the `prio` ready queue.
    ///
    /// The idle level is a sentinel: the idle process is chosen implicitly
    /// when everything else is blocked, so it is never enqueued.
    ///
    /// # Panics
    ///
    /// Panics on a priority with no queue (other than the idle sentinel).
    pub(crate) fn make_ready(&mut self, pid: Pid, prio: Priority) {
        if prio == P_IDLE {
            return;
        }
        if prio as usize >= NQUEUES {
            panic!("bad priority {}", prio);
        }

        {
            let p = self.proc_mut(pid);
            p.state = ProcState::Active;
            p.next = None;
        }

        let q = prio as usize;
        match self.readyq[q].tail {
            Some(tail) => self.proc_mut(tail).next = Some(pid),
            None => self.readyq[q].head = Some(pid),
        }
        self.readyq[q].tail = Some(pid);
    }

    /// The current process has blocked or yielded: pick its replacement.
    ///
    /// Scans the queues from priority 0 and pops the first head found;
    /// with nothing runnable the idle process becomes current.
    pub(crate) fn choose_proc(&mut self) {
        for q in 0..NQUEUES {
            if let Some(head) = self.readyq[q].head {
                let next = self.proc(head).next;
                self.readyq[q].head = next;
                if next.is_none() {
                    self.readyq[q].tail = None;
                }
                self.set_current(head);
                return;
            }
        }
        self.set_current(Pid::IDLE);
    }

    /// Unlink `pid` from whatever ready queue holds it, as dispatching it
    /// would. Test support.
    #[cfg(test)]
    pub(crate) fn take_from_ready(&mut self, pid: Pid) {
        for q in 0..NQUEUES {
            let mut prev: Option<Pid> = None;
            let mut cur = self.readyq[q].head;
            while let Some(p) = cur {
                let after = self.proc(p).next;
                if p == pid {
                    match prev {
                        None => self.readyq[q].head = after,
                        Some(pr) => self.proc_mut(pr).next = after,
                    }
                    if self.readyq[q].tail == Some(pid) {
                        self.readyq[q].tail = prev;
                    }
                    self.proc_mut(pid).next = None;
                    return;
                }
                prev = cur;
                cur = after;
            }
        }
    }

    /// Check if `pid` is queued at `prio`. Test support.
    #[cfg(test)]
    pub(crate) fn in_ready_queue(&self, pid: Pid, prio: Priority) -> bool {
        let mut cur = self.readyq[prio as usize].head;
        while let Some(p) = cur {
            if p == pid {
                return true;
            }
            cur = self.proc(p).next;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::testing::TestKernel;
    use m0_syscall::{P_HANDLER, P_LOW};

    #[test]
    fn test_round_robin_within_a_priority() {
        let mut h = TestKernel::new();
        let a = h.spawn("a");
        let b = h.spawn("b");
        let c = h.spawn("c");

        // Insertion order holds across repeated yields.
        for expected in [a, b, c, a, b, c] {
            let got = h.schedule();
            assert_eq!(got, expected);
            h.k.make_ready(got, P_LOW);
        }
    }

    #[test]
    fn test_higher_priority_runs_first() {
        let mut h = TestKernel::new();
        let low = h.spawn("low");
        let high = h.spawn("high");
        h.k.proc_mut(high).priority = P_HANDLER;

        // Drain the spawn-time queue and re-queue each at its priority.
        h.k.choose_proc();
        h.k.choose_proc();
        h.k.make_ready(low, P_LOW);
        h.k.make_ready(high, P_HANDLER);

        h.k.choose_proc();
        assert_eq!(h.k.current(), high);
        h.k.choose_proc();
        assert_eq!(h.k.current(), low);
    }

    #[test]
    fn test_idle_when_nothing_is_ready() {
        let mut h = TestKernel::new();
        h.k.choose_proc();
        assert_eq!(h.k.current(), Pid::IDLE);
        assert_eq!(h.state(Pid::IDLE), ProcState::Idling);
    }

    #[test]
    fn test_idle_priority_is_never_enqueued() {
        let mut h = TestKernel::new();
        h.k.make_ready(Pid::IDLE, P_IDLE);
        assert!(h.k.readyq.iter().all(ReadyQueue::is_empty));
        assert_eq!(h.state(Pid::IDLE), ProcState::Idling);
    }

    #[test]
    #[should_panic(expected = "bad priority")]
    fn test_out_of_range_priority_panics() {
        let mut h = TestKernel::new();
        let a = h.spawn("a");
        h.k.make_ready(a, 7);
    }
}
