//! The actual register-level context switch.
//!
//! Unlike the original C kernel's `save_context`/`load_context` (which
//! zeroed registers and faked `eflags`), this performs a genuine
//! callee-saved-register switch on the kernel stack: push the callee-saved
//! registers, swap stack pointers, pop the other task's callee-saved
//! registers, and return into wherever that task's stack says to resume.
//! Interrupt-frame registers for the *interrupted* task are already saved
//! on its kernel stack by the common ISR stub (`arch::x86::isr`); this
//! routine only needs to preserve the handful of registers the System V
//! calling convention doesn't already save across a call.

use core::arch::{asm, global_asm};

global_asm!(
    ".global ace_switch_context",
    "ace_switch_context:",
    // [esp+4] = *mut u32 (where to stash the outgoing esp)
    // [esp+8] = u32 (incoming esp to switch to)
    "push ebx",
    "push esi",
    "push edi",
    "push ebp",
    "mov eax, [esp + 20]", // old_esp_slot
    "mov [eax], esp",
    "mov esp, [esp + 24]", // new_esp
    "pop ebp",
    "pop edi",
    "pop esi",
    "pop ebx",
    "ret",
);

extern "C" {
    fn ace_switch_context(old_esp_slot: *mut u32, new_esp: u32);
}

/// Switch from the currently running stack to `new_esp`, stashing the
/// outgoing stack pointer into `*old_esp_slot`.
///
/// # Safety
/// `new_esp` must point into a kernel stack previously prepared by
/// [`build_initial_stack`] (or a stack this function has switched away
/// from before), and `old_esp_slot` must be valid to write through.
pub unsafe fn switch_context(old_esp_slot: *mut u32, new_esp: u32) {
    unsafe { ace_switch_context(old_esp_slot, new_esp) };
}

/// Lay out a brand-new kernel stack so that the first [`switch_context`]
/// into it "returns" into `entry` as if resuming from a previous call to
/// `switch_context`, with the same four callee-saved registers popped.
///
/// Returns the initial `esp` to record in the new task's PCB.
///
/// # Safety
/// `stack_top` must be the highest valid address of a stack allocation of
/// at least 32 bytes, 4-byte aligned.
pub unsafe fn build_initial_stack(stack_top: u32, entry: extern "C" fn() -> !) -> u32 {
    // Layout, highest address first: [entry][ebp=0][edi=0][esi=0][ebx=0]
    let mut sp = stack_top;
    sp -= 4;
    unsafe { (sp as *mut u32).write(entry as u32) }; // return address for `ret`
    sp -= 4;
    unsafe { (sp as *mut u32).write(0) }; // ebp
    sp -= 4;
    unsafe { (sp as *mut u32).write(0) }; // edi
    sp -= 4;
    unsafe { (sp as *mut u32).write(0) }; // esi
    sp -= 4;
    unsafe { (sp as *mut u32).write(0) }; // ebx
    sp
}

/// Read the current EIP via a call/pop trick — used only for diagnostics.
#[inline]
pub fn current_eip() -> u32 {
    let eip: u32;
    // SAFETY: the call+pop sequence only reads the return address just
    // pushed by `call`; it has no other side effect.
    unsafe {
        asm!(
            "call 2f",
            "2: pop {0}",
            out(reg) eip,
        );
    }
    eip
}
