//! Everything that talks to the CPU directly: port I/O, descriptor tables,
//! the PIC/PIT, and the register-level context switch. No other module in
//! the crate is allowed to contain inline assembly.

mod boot;
pub mod context;
pub mod gdt;
pub mod idt;
pub mod isr;
pub mod pic;
pub mod pit;
pub mod port;

pub use isr::InterruptFrame;
pub use port::{hlt, without_interrupts};

/// Bring up the CPU-facing substrate: GDT, IDT/PIC, PIT. Does not `sti`;
/// the caller enables interrupts once every subsystem has registered its
/// handlers.
///
/// # Safety
/// Must run exactly once, very early in boot, with interrupts disabled.
pub unsafe fn init(kernel_stack_top: u32) {
    unsafe {
        gdt::init(kernel_stack_top);
        pic::init();
        idt::init();
        pit::init();
    }
}
