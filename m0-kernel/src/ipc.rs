//! Rendezvous IPC.
//!
//! Send, receive and send-receive: synchronous, unbuffered, copied by
//! value. A sender that finds its destination receiving with a matching
//! filter hands the message over and keeps running; otherwise it parks on
//! the destination's sender queue. A receiver drains its pending interrupt
//! first, then its sender queue in arrival order, then blocks.
//!
//! Sender queues are strict FIFO regardless of priority, and a filtered
//! receive preserves FIFO order among the matching subset. That can invert
//! priorities; it is kept that way on purpose, for the simplicity of the
//! arrival-order queue.

use m0_syscall::{ANY, HARDWARE, INTERRUPT, Message, MsgType, Pid, REPLY};

use crate::kernel::Kernel;
use crate::proc::ProcState;

/// Copy a message into a receiver's buffer and stamp the header.
///
/// A null `buf` discards the delivery (the receiver did not want the
/// payload); a null `msg` stamps the header only, which is how interrupt
/// notifications leave the body untouched.
fn deliver(buf: *mut Message, src: Pid, mtype: MsgType, msg: *const Message) {
    if buf.is_null() {
        return;
    }
    // SAFETY: buf and msg are caller-owned buffers recorded at the trap
    // boundary; the owning processes are blocked (or the running caller)
    // for the duration, so the kernel is the only accessor.
    unsafe {
        if !msg.is_null() {
            *buf = *msg;
        }
        (*buf).sender = src;
        (*buf).mtype = mtype;
    }
}

/// Stamp a synthetic interrupt notification into `buf`: sender HARDWARE,
/// type INTERRUPT, body untouched.
pub(crate) fn deliver_interrupt(buf: *mut Message) {
    deliver(buf, HARDWARE, INTERRUPT, core::ptr::null());
}

impl Kernel {
    /// Check a destination PID from a syscall argument: in range and not
    /// DEAD. Panics otherwise; there is no error return channel.
    fn validate_dest(&self, dest: u32) -> Pid {
        if dest as usize >= self.nprocs {
            panic!("sending to non-existent process {}", dest);
        }
        let pid = Pid::from_index(dest as u16);
        if self.proc(pid).state == ProcState::Dead {
            panic!("sending to non-existent process {}", dest);
        }
        pid
    }

    /// Append the current process to `dest`'s sender queue.
    fn enqueue_sender(&mut self, dest: Pid) {
        let src = self.current();
        self.proc_mut(src).next = None;

        match self.proc(dest).waiting {
            None => self.proc_mut(dest).waiting = Some(src),
            Some(head) => {
                let mut tail = head;
                loop {
                    match self.proc(tail).next {
                        Some(next) => tail = next,
                        None => break,
                    }
                }
                self.proc_mut(tail).next = Some(src);
            }
        }
    }

    /// Send `msg` to `dest`, blocking until it is received.
    pub(crate) fn send(&mut self, dest: u32, mtype: MsgType, msg: *mut Message) {
        let src = self.current();
        let dest = self.validate_dest(dest);

        if self.proc(dest).accepts(mtype) {
            // Receiver is waiting for us: hand over and keep the CPU.
            let buf = self.proc(dest).message;
            deliver(buf, src, mtype, msg);
            let prio = self.proc(dest).priority;
            self.make_ready(dest, prio);
        } else {
            // Wait our turn on the receiver's queue.
            self.proc_mut(src).set_ipc(ProcState::Sending, mtype, msg);
            self.enqueue_sender(dest);
            self.choose_proc();
        }
    }

    /// Receive a message matching `mtype` into `msg`, blocking until one
    /// is available.
    pub(crate) fn receive(&mut self, mtype: MsgType, msg: *mut Message) {
        let me = self.current();

        // A pending interrupt outranks queued senders.
        if self.proc(me).pending && (mtype == ANY || mtype == INTERRUPT) {
            self.proc_mut(me).pending = false;
            deliver_interrupt(msg);
            return;
        }

        if mtype != INTERRUPT {
            // First queued sender the filter admits, in arrival order.
            let mut prev: Option<Pid> = None;
            let mut cur = self.proc(me).waiting;
            while let Some(sender) = cur {
                let sender_type = self.proc(sender).msgtype;
                if mtype == ANY || sender_type == mtype {
                    // Splice it out of the queue.
                    let after = self.proc(sender).next;
                    match prev {
                        None => self.proc_mut(me).waiting = after,
                        Some(p) => self.proc_mut(p).next = after,
                    }
                    self.proc_mut(sender).next = None;

                    deliver(msg, sender, sender_type, self.proc(sender).message);

                    match self.proc(sender).state {
                        ProcState::Sending => {
                            let prio = self.proc(sender).priority;
                            self.make_ready(sender, prio);
                        }
                        ProcState::SendRec => {
                            // First phase done; the reply lands in the
                            // sender's original buffer. Off every list
                            // until it arrives.
                            let p = self.proc_mut(sender);
                            p.state = ProcState::Receiving;
                            p.msgtype = REPLY;
                        }
                        state => panic!("queued sender {} in state {:?}", sender, state),
                    }
                    return;
                }
                prev = cur;
                cur = self.proc(sender).next;
            }
        }

        // Nothing matched: wait.
        self.proc_mut(me).set_ipc(ProcState::Receiving, mtype, msg);
        self.choose_proc();
    }

    /// Send `msg` to `dest` and wait for a [`REPLY`] into the same buffer.
    ///
    /// The reply filter is installed in the same trap that completes (or
    /// queues) the request, so no third party can slip a reply in first.
    pub(crate) fn sendrec(&mut self, dest: u32, mtype: MsgType, msg: *mut Message) {
        let src = self.current();
        let dest = self.validate_dest(dest);

        if self.proc(dest).accepts(mtype) {
            // Receiver is waiting for us.
            let buf = self.proc(dest).message;
            deliver(buf, src, mtype, msg);
            let prio = self.proc(dest).priority;
            self.make_ready(dest, prio);

            // Now wait for the reply.
            self.proc_mut(src).set_ipc(ProcState::Receiving, REPLY, msg);
        } else {
            // Wait our turn; the reply phase starts when a receive takes
            // the request off the queue.
            self.proc_mut(src).set_ipc(ProcState::SendRec, mtype, msg);
            self.enqueue_sender(dest);
        }

        self.choose_proc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::testing::{TestKernel, msg_buf};

    const PING: MsgType = 10;
    const PONG: MsgType = 20;

    #[test]
    fn test_send_to_waiting_receiver_delivers_immediately() {
        let mut h = TestKernel::new();
        let a = h.spawn("a");
        let b = h.spawn("b");

        let mut rbuf = msg_buf();
        h.run(b);
        h.k.receive(ANY, &mut *rbuf);
        assert_eq!(h.state(b), ProcState::Receiving);

        let mut sbuf = msg_buf();
        sbuf.words = [1, 2, 3, 4];
        h.run(a);
        h.k.send(b.index() as u32, PING, &mut *sbuf);

        // Rendezvous completeness: payload copied, header stamped.
        assert_eq!(rbuf.words, [1, 2, 3, 4]);
        assert_eq!(rbuf.sender, a);
        assert_eq!(rbuf.mtype, PING);
        // Receiver is runnable again; sender kept the CPU.
        assert_eq!(h.state(b), ProcState::Active);
        assert_eq!(h.k.current(), a);
    }

    #[test]
    fn test_send_to_busy_destination_blocks_in_fifo_order() {
        let mut h = TestKernel::new();
        let s1 = h.spawn("s1");
        let s2 = h.spawn("s2");
        let r = h.spawn("r");

        let mut m1 = msg_buf();
        let mut m2 = msg_buf();
        h.run(s1);
        h.k.send(r.index() as u32, PING, &mut *m1);
        h.run(s2);
        h.k.send(r.index() as u32, PING, &mut *m2);

        assert_eq!(h.state(s1), ProcState::Sending);
        assert_eq!(h.state(s2), ProcState::Sending);
        assert_eq!(h.k.proc(r).waiting, Some(s1));
        assert_eq!(h.k.proc(s1).next, Some(s2));

        // FIFO delivery among queued senders.
        let mut rbuf = msg_buf();
        h.run(r);
        h.k.receive(ANY, &mut *rbuf);
        assert_eq!(rbuf.sender, s1);
        assert_eq!(h.state(s1), ProcState::Active);

        h.k.receive(ANY, &mut *rbuf);
        assert_eq!(rbuf.sender, s2);
    }

    #[test]
    fn test_receive_filter_skips_non_matching_senders() {
        let mut h = TestKernel::new();
        let s1 = h.spawn("s1");
        let s2 = h.spawn("s2");
        let r = h.spawn("r");

        let mut m1 = msg_buf();
        let mut m2 = msg_buf();
        h.run(s1);
        h.k.send(r.index() as u32, PING, &mut *m1);
        h.run(s2);
        h.k.send(r.index() as u32, PONG, &mut *m2);

        // Filtered receive takes s2 despite s1 being at the head.
        let mut rbuf = msg_buf();
        h.run(r);
        h.k.receive(PONG, &mut *rbuf);
        assert_eq!(rbuf.sender, s2);
        assert_eq!(rbuf.mtype, PONG);
        assert_eq!(h.state(s2), ProcState::Active);
        assert_eq!(h.state(s1), ProcState::Sending);

        // The skipped head is intact and delivered next.
        assert_eq!(h.k.proc(r).waiting, Some(s1));
        h.k.receive(ANY, &mut *rbuf);
        assert_eq!(rbuf.sender, s1);
        assert_eq!(h.k.proc(r).waiting, None);
    }

    #[test]
    fn test_splicing_a_middle_sender_keeps_the_queue_linked() {
        let mut h = TestKernel::new();
        let s1 = h.spawn("s1");
        let s2 = h.spawn("s2");
        let s3 = h.spawn("s3");
        let r = h.spawn("r");

        let mut m1 = msg_buf();
        let mut m2 = msg_buf();
        let mut m3 = msg_buf();
        for (s, m, t) in [(s1, &mut m1, PING), (s2, &mut m2, PONG), (s3, &mut m3, PING)] {
            h.run(s);
            h.k.send(r.index() as u32, t, &mut **m);
        }

        let mut rbuf = msg_buf();
        h.run(r);
        h.k.receive(PONG, &mut *rbuf);
        assert_eq!(rbuf.sender, s2);

        // s1 -> s3 after the middle removal.
        assert_eq!(h.k.proc(r).waiting, Some(s1));
        assert_eq!(h.k.proc(s1).next, Some(s3));
        assert_eq!(h.k.proc(s3).next, None);
    }

    #[test]
    fn test_receive_with_no_match_blocks() {
        let mut h = TestKernel::new();
        let s = h.spawn("s");
        let r = h.spawn("r");

        let mut m = msg_buf();
        h.run(s);
        h.k.send(r.index() as u32, PING, &mut *m);

        let mut rbuf = msg_buf();
        h.run(r);
        h.k.receive(PONG, &mut *rbuf);
        assert_eq!(h.state(r), ProcState::Receiving);
        assert_eq!(h.k.proc(r).msgtype, PONG);
        // The mismatched sender stays queued.
        assert_eq!(h.k.proc(r).waiting, Some(s));
    }

    #[test]
    fn test_receive_interrupt_filter_ignores_senders() {
        let mut h = TestKernel::new();
        let s = h.spawn("s");
        let r = h.spawn("r");

        let mut m = msg_buf();
        h.run(s);
        h.k.send(r.index() as u32, PING, &mut *m);

        // An INTERRUPT filter never drains the sender queue.
        let mut rbuf = msg_buf();
        h.run(r);
        h.k.receive(INTERRUPT, &mut *rbuf);
        assert_eq!(h.state(r), ProcState::Receiving);
        assert_eq!(h.k.proc(r).waiting, Some(s));
    }

    #[test]
    fn test_pending_interrupt_beats_queued_senders() {
        let mut h = TestKernel::new();
        let s = h.spawn("s");
        let r = h.spawn("r");

        let mut m = msg_buf();
        h.run(s);
        h.k.send(r.index() as u32, PING, &mut *m);
        h.k.proc_mut(r).pending = true;

        let mut rbuf = msg_buf();
        rbuf.words = [9, 9, 9, 9];
        h.run(r);
        h.k.receive(ANY, &mut *rbuf);

        // Synthetic message: header stamped, body untouched, no block.
        assert_eq!(rbuf.sender, HARDWARE);
        assert_eq!(rbuf.mtype, INTERRUPT);
        assert_eq!(rbuf.words, [9, 9, 9, 9]);
        assert!(!h.k.proc(r).pending);
        assert_eq!(h.k.current(), r);
        assert_eq!(h.k.proc(r).waiting, Some(s));
    }

    #[test]
    fn test_sendrec_immediate_rendezvous_then_reply() {
        let mut h = TestKernel::new();
        let a = h.spawn("a");
        let b = h.spawn("b");

        // B waits for a request.
        let mut bbuf = msg_buf();
        h.run(b);
        h.k.receive(PING, &mut *bbuf);

        // A's request goes straight through; A waits for the reply.
        let mut abuf = msg_buf();
        abuf.words = [5, 0, 0, 0];
        h.run(a);
        h.k.sendrec(b.index() as u32, PING, &mut *abuf);
        assert_eq!(bbuf.sender, a);
        assert_eq!(bbuf.words[0], 5);
        assert_eq!(h.state(a), ProcState::Receiving);
        assert_eq!(h.k.proc(a).msgtype, REPLY);

        // No third party can reply first with a non-REPLY type.
        let x = h.spawn("x");
        let mut xbuf = msg_buf();
        h.run(x);
        h.k.send(a.index() as u32, PING, &mut *xbuf);
        assert_eq!(h.state(x), ProcState::Sending);

        // B replies; A wakes with the reply in its original buffer.
        let mut rep = msg_buf();
        rep.words = [6, 0, 0, 0];
        h.run(b);
        h.k.send(a.index() as u32, REPLY, &mut *rep);
        assert_eq!(abuf.sender, b);
        assert_eq!(abuf.mtype, REPLY);
        assert_eq!(abuf.words[0], 6);
        assert_eq!(h.state(a), ProcState::Active);
    }

    #[test]
    fn test_sendrec_against_busy_receiver_queues_then_awaits_reply() {
        let mut h = TestKernel::new();
        let a = h.spawn("a");
        let b = h.spawn("b");

        // B is off doing something else; A's request queues.
        let mut abuf = msg_buf();
        abuf.words = [7, 0, 0, 0];
        h.run(a);
        h.k.sendrec(b.index() as u32, PING, &mut *abuf);
        assert_eq!(h.state(a), ProcState::SendRec);
        assert_eq!(h.k.proc(b).waiting, Some(a));

        // B's receive completes the first phase; A flips to awaiting the
        // reply in its own buffer, still off every queue.
        let mut bbuf = msg_buf();
        h.run(b);
        h.k.receive(ANY, &mut *bbuf);
        assert_eq!(bbuf.sender, a);
        assert_eq!(bbuf.words[0], 7);
        assert_eq!(h.state(a), ProcState::Receiving);
        assert_eq!(h.k.proc(a).msgtype, REPLY);
        assert_eq!(h.k.proc(a).message, &mut *abuf as *mut Message);
        assert!(!h.k.in_ready_queue(a, h.k.proc(a).priority));
        assert_eq!(h.k.proc(b).waiting, None);

        // The reply completes the exchange.
        let mut rep = msg_buf();
        rep.words = [8, 0, 0, 0];
        h.k.send(a.index() as u32, REPLY, &mut *rep);
        assert_eq!(abuf.words[0], 8);
        assert_eq!(abuf.sender, b);
        assert_eq!(h.state(a), ProcState::Active);
    }

    #[test]
    fn test_ping_reply_round_trip_leaves_server_receiving() {
        let mut h = TestKernel::new();
        let client = h.spawn("client");
        let server = h.spawn("server");

        let mut sbuf = msg_buf();
        h.run(server);
        h.k.receive(PING, &mut *sbuf);

        let mut cbuf = msg_buf();
        h.run(client);
        h.k.sendrec(server.index() as u32, PING, &mut *cbuf);

        let mut rep = msg_buf();
        h.run(server);
        h.k.send(sbuf.sender.index() as u32, REPLY, &mut *rep);
        h.k.receive(PING, &mut *sbuf);

        assert_eq!(cbuf.mtype, REPLY);
        assert_eq!(cbuf.sender, server);
        assert_eq!(h.state(client), ProcState::Active);
        assert_eq!(h.state(server), ProcState::Receiving);
    }

    #[test]
    #[should_panic(expected = "99")]
    fn test_send_to_out_of_range_pid_panics() {
        let mut h = TestKernel::new();
        let a = h.spawn("a");
        let mut m = msg_buf();
        h.run(a);
        h.k.send(99, 0, &mut *m);
    }

    #[test]
    #[should_panic(expected = "non-existent process")]
    fn test_send_to_dead_process_panics() {
        let mut h = TestKernel::new();
        let a = h.spawn("a");
        let b = h.spawn("b");
        h.k.proc_mut(b).state = ProcState::Dead;
        let mut m = msg_buf();
        h.run(a);
        h.k.send(b.index() as u32, 0, &mut *m);
    }
}
