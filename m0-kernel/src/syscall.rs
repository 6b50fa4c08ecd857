//! Syscall dispatch.
//!
//! The SVCall trampoline finishes saving the caller's context on its own
//! stack and calls [`system_call`] with a pointer to the 16-word frame.
//! The operand byte of the SVC instruction (found two bytes before the
//! stacked return address) selects the operation; arguments come from the
//! stacked r0-r2. Whatever stack pointer comes back is the context the
//! trampoline resumes, which is how a blocking call turns into running
//! somebody else.
//!
//! The PendSV trampoline calls [`cxt_switch`] the same way: re-queue the
//! interrupted process, pick the best runnable one, resume it.

use m0_arch::exception::SavedContext;
use m0_syscall::{Message, MsgType, Syscall};

use crate::kernel::KERNEL;
use crate::proc::ProcState;

/// Recover the SVC operand byte given the stacked return address.
///
/// The return address is two bytes past the 16-bit SVC instruction whose
/// low byte is the operand.
fn svc_operand(return_addr: usize) -> u8 {
    let insn_addr = (return_addr - 2) as *const u16;
    // SAFETY: the caller executed an SVC to get here, so the word before
    // the return address is that instruction, in executable memory.
    let insn = unsafe { core::ptr::read(insn_addr) };
    (insn & 0xFF) as u8
}

/// Entry from the SVCall trampoline.
///
/// Returns the stack pointer of whichever process runs next.
#[unsafe(no_mangle)]
pub extern "C" fn system_call(psp: *mut SavedContext) -> *mut SavedContext {
    // SAFETY: the trampoline passes the caller's live frame.
    let frame = unsafe { &mut *psp };
    let op = svc_operand(frame.frame.pc as usize);

    let mut kernel = KERNEL.lock();
    let caller = kernel.current();
    kernel.proc_mut(caller).sp = psp;

    let syscall = match Syscall::from_number(op) {
        Some(s) => s,
        None => panic!("unknown syscall {}", op),
    };
    log::trace!("syscall {} from process {}", syscall.name(), caller);

    match syscall {
        Syscall::Yield => {
            let prio = kernel.proc(caller).priority;
            kernel.make_ready(caller, prio);
            kernel.choose_proc();
        }
        Syscall::Send => {
            kernel.send(
                frame.frame.r0,
                frame.frame.r1 as MsgType,
                frame.frame.r2 as *mut Message,
            );
        }
        Syscall::Receive => {
            kernel.receive(frame.frame.r0 as MsgType, frame.frame.r1 as *mut Message);
        }
        Syscall::SendRec => {
            kernel.sendrec(
                frame.frame.r0,
                frame.frame.r1 as MsgType,
                frame.frame.r2 as *mut Message,
            );
        }
        Syscall::Exit => {
            kernel.proc_mut(caller).state = ProcState::Dead;
            kernel.choose_proc();
        }
        Syscall::Dump => {
            // Runs here, on the kernel stack, not the caller's.
            kernel.dump_processes();
        }
    }

    let next = kernel.current();
    kernel.proc(next).sp
}

/// Entry from the PendSV trampoline: context switch after an interrupt.
///
/// The interrupted process goes back on its ready queue and the scheduler
/// picks again, which lets an interrupt-woken handler preempt it.
#[unsafe(no_mangle)]
pub extern "C" fn cxt_switch(psp: *mut SavedContext) -> *mut SavedContext {
    let mut kernel = KERNEL.lock();
    let interrupted = kernel.current();
    kernel.proc_mut(interrupted).sp = psp;

    let prio = kernel.proc(interrupted).priority;
    kernel.make_ready(interrupted, prio);
    kernel.choose_proc();

    let next = kernel.current();
    kernel.proc(next).sp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_svc_operand_reads_the_byte_before_the_return_address() {
        // A tiny "text segment": svc 3 followed by the return point.
        let text: [u16; 2] = [0xDF03, 0x46C0]; // svc 3; nop
        let return_addr = unsafe { text.as_ptr().add(1) } as usize;

        assert_eq!(svc_operand(return_addr), 3);
        assert_eq!(
            Syscall::from_number(svc_operand(return_addr)),
            Some(Syscall::SendRec)
        );
    }

    #[test]
    fn test_frame_argument_positions_match_the_stub_contract() {
        // The stubs pin dest/type/msg to r0-r2; the dispatcher reads the
        // same slots out of the stacked frame.
        let mut frame = SavedContext::zeroed();
        frame.frame.r0 = 7;
        frame.frame.r1 = -1i32 as u32;
        frame.frame.r2 = 0x2000_0100;

        let words: [u32; 16] = unsafe { core::mem::transmute(frame) };
        assert_eq!(words[8], 7);
        assert_eq!(words[9] as i32, -1);
        assert_eq!(words[10], 0x2000_0100);
    }
}
