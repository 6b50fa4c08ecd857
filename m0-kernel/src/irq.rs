//! The interrupt bridge.
//!
//! Hardware interrupts become messages. A driver process calls
//! [`connect`] to claim a peripheral interrupt; from then on each firing
//! of that IRQ is disabled at the NVIC and turned into an INTERRUPT
//! message from [`HARDWARE`](m0_syscall::HARDWARE) to the handler, which
//! re-enables the IRQ once the device is drained.
//!
//! If the handler is not in a matching receive when the interrupt fires,
//! a per-process pending flag is set instead and the next receive that
//! admits INTERRUPT consumes it. Repeated interrupts before that receive
//! collapse into the one flag; that is the contract, not a defect, because
//! the IRQ stays disabled until the handler has serviced the device.

use m0_pal::nvic::{self, Irq, NIRQS};
use m0_syscall::{INTERRUPT, P_HANDLER, P_LOW, Pid, Priority};

use crate::ipc::deliver_interrupt;
use crate::kernel::{KERNEL, Kernel};

impl Kernel {
    /// Register the current process as handler for `irq` and promote it
    /// to the handler priority.
    pub(crate) fn connect_current(&mut self, irq: usize) {
        let me = self.current();
        self.proc_mut(me).priority = P_HANDLER;
        self.handlers[irq] = Some(me);
        log::debug!("irq {} -> process {}", irq, me);
    }

    /// Deliver an interrupt notification to `dest`.
    ///
    /// Returns `true` when the woken handler outranks the running process
    /// and the caller should request a reschedule.
    pub(crate) fn interrupt(&mut self, dest: Pid) -> bool {
        if self.proc(dest).accepts(INTERRUPT) {
            // Handler is waiting: synthesise the message and wake it.
            let buf = self.proc(dest).message;
            deliver_interrupt(buf);
            self.make_ready(dest, P_HANDLER);
            self.proc(self.current()).priority > P_HANDLER
        } else {
            // Caught mid-service; note it for the next receive.
            self.proc_mut(dest).pending = true;
            false
        }
    }
}

/// Connect the calling process to a peripheral interrupt.
///
/// # Panics
///
/// Panics on a negative vector (CPU exceptions cannot be claimed) or one
/// past the peripheral range.
pub fn connect(irq: i32) {
    if irq < 0 {
        panic!("can't connect to CPU exceptions");
    }
    let line = Irq::new(irq as u8); // panics past the peripheral range
    KERNEL.lock().connect_current(irq as usize);
    nvic::enable_irq(line);
}

/// Set the calling process's scheduling priority.
///
/// # Panics
///
/// Panics on a level outside `P_HANDLER..=P_LOW`.
pub fn priority(level: Priority) {
    if level > P_LOW {
        panic!("bad priority {}", level);
    }
    let mut kernel = KERNEL.lock();
    let me = kernel.current();
    kernel.proc_mut(me).priority = level;
}

/// Send an interrupt notification to `dest`.
///
/// The bridge's half of the protocol; not for application code.
pub fn interrupt(dest: Pid) {
    let preempt = KERNEL.lock().interrupt(dest);
    if preempt {
        nvic::request_reschedule();
    }
}

/// Common entry for all connected peripheral interrupts.
///
/// Wire the device's vector here (directly, or via the board crate's
/// default handler). Queries the active vector, disables it at the NVIC
/// and notifies the registered handler process; the PendSV requested for
/// a preempting handler fires once this exception unwinds.
#[unsafe(no_mangle)]
pub extern "C" fn irq_dispatch() {
    let irq = nvic::active_irq();
    if irq < 0 || irq as usize >= NIRQS {
        panic!("unexpected interrupt {}", irq);
    }
    nvic::disable_irq(Irq::new(irq as u8));

    let preempt = {
        let mut kernel = KERNEL.lock();
        let Some(handler) = kernel.handler_for(irq as usize) else {
            panic!("unexpected interrupt {}", irq);
        };
        kernel.interrupt(handler)
    };
    if preempt {
        nvic::request_reschedule();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::testing::{TestKernel, msg_buf};
    use crate::proc::ProcState;
    use m0_syscall::{ANY, HARDWARE};

    #[test]
    fn test_interrupt_wakes_matching_receiver() {
        let mut h = TestKernel::new();
        let handler = h.spawn("uart");
        let worker = h.spawn("worker");

        h.run(handler);
        h.k.proc_mut(handler).priority = P_HANDLER;
        let mut buf = msg_buf();
        h.k.receive(ANY, &mut *buf);
        assert_eq!(h.state(handler), ProcState::Receiving);

        // A low-priority process is running when the IRQ arrives.
        h.run(worker);
        let preempt = h.k.interrupt(handler);

        assert!(preempt);
        assert_eq!(buf.sender, HARDWARE);
        assert_eq!(buf.mtype, INTERRUPT);
        assert_eq!(h.state(handler), ProcState::Active);
        assert!(h.k.in_ready_queue(handler, P_HANDLER));
    }

    #[test]
    fn test_interrupt_for_busy_handler_sets_pending() {
        let mut h = TestKernel::new();
        let handler = h.spawn("uart");
        h.run(handler);
        h.k.proc_mut(handler).priority = P_HANDLER;

        // Handler is running user code: nothing to wake, just note it.
        let preempt = h.k.interrupt(handler);
        assert!(!preempt);
        assert!(h.k.proc(handler).pending);

        // Repeats collapse into the one flag.
        let _ = h.k.interrupt(handler);
        assert!(h.k.proc(handler).pending);

        // The deferred notification fires at the next receive.
        let mut buf = msg_buf();
        h.k.receive(INTERRUPT, &mut *buf);
        assert_eq!(buf.sender, HARDWARE);
        assert_eq!(buf.mtype, INTERRUPT);
        assert!(!h.k.proc(handler).pending);
        assert_eq!(h.k.current(), handler);
    }

    #[test]
    fn test_interrupt_delivery_to_equal_priority_does_not_preempt() {
        let mut h = TestKernel::new();
        let handler = h.spawn("h1");
        let other = h.spawn("h2");
        for p in [handler, other] {
            h.k.proc_mut(p).priority = P_HANDLER;
        }

        h.run(handler);
        let mut buf = msg_buf();
        h.k.receive(INTERRUPT, &mut *buf);

        h.run(other);
        let preempt = h.k.interrupt(handler);
        assert!(!preempt);
        assert_eq!(h.state(handler), ProcState::Active);
    }

    #[test]
    fn test_connect_registers_and_promotes() {
        let mut h = TestKernel::new();
        let driver = h.spawn("driver");
        h.run(driver);
        h.k.connect_current(7);
        assert_eq!(h.k.handler_for(7), Some(driver));
        assert_eq!(h.k.proc(driver).priority, P_HANDLER);
    }

    #[test]
    #[should_panic(expected = "bad priority")]
    fn test_priority_rejects_idle_level() {
        priority(3);
    }

    #[test]
    #[should_panic(expected = "CPU exceptions")]
    fn test_connect_rejects_negative_vectors() {
        connect(-2);
    }
}
