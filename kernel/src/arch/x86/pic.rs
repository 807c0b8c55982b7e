//! Intel 8259 PIC pair: remap into a non-overlapping vector range, mask
//! management, and end-of-interrupt signalling.
//!
//! Directly grounded in the classic master/slave remap sequence (ICW1..4)
//! and the "EOI the slave only when the vector actually came from it"
//! rule that every PC kernel repeats.

use super::port::{inb, io_wait, outb};

const PIC1_CMD: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_CMD: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const ICW1_ICW4: u8 = 0x01;
const ICW1_INIT: u8 = 0x10;
const ICW4_8086: u8 = 0x01;
const PIC_EOI: u8 = 0x20;

/// Vector the master PIC's IRQ0 is remapped to.
pub const IRQ_BASE: u8 = 0x20;
const SLAVE_IRQ_BASE: u8 = IRQ_BASE + 8;

static mut MASK_MASTER: u8 = 0xFF;
static mut MASK_SLAVE: u8 = 0xFF;

/// Remap the PIC pair so IRQ0-7 land on vectors 0x20-0x27 and IRQ8-15 on
/// 0x28-0x2F, clear of the CPU-exception range. All lines start masked.
///
/// # Safety
/// Must run once at boot, before `sti`.
pub unsafe fn init() {
    unsafe {
        outb(PIC1_CMD, ICW1_INIT | ICW1_ICW4);
        io_wait();
        outb(PIC2_CMD, ICW1_INIT | ICW1_ICW4);
        io_wait();

        outb(PIC1_DATA, IRQ_BASE);
        io_wait();
        outb(PIC2_DATA, SLAVE_IRQ_BASE);
        io_wait();

        outb(PIC1_DATA, 0b0000_0100); // tell master: slave wired on IRQ2
        io_wait();
        outb(PIC2_DATA, 0b0000_0010); // tell slave: cascade identity is 2
        io_wait();

        outb(PIC1_DATA, ICW4_8086);
        io_wait();
        outb(PIC2_DATA, ICW4_8086);
        io_wait();

        MASK_MASTER = 0xFF;
        MASK_SLAVE = 0xFF;
        outb(PIC1_DATA, MASK_MASTER);
        outb(PIC2_DATA, MASK_SLAVE);
    }
}

/// Unmask a single IRQ line (0-15).
pub fn unmask(irq: u8) {
    // SAFETY: port writes to the PIC's own data registers.
    unsafe {
        if irq < 8 {
            MASK_MASTER &= !(1 << irq);
            outb(PIC1_DATA, MASK_MASTER);
        } else {
            MASK_SLAVE &= !(1 << (irq - 8));
            outb(PIC2_DATA, MASK_SLAVE);
            // The cascade line (master IRQ2) must stay unmasked for any
            // slave IRQ to ever reach the CPU.
            MASK_MASTER &= !(1 << 2);
            outb(PIC1_DATA, MASK_MASTER);
        }
    }
}

/// Mask a single IRQ line (0-15).
pub fn mask(irq: u8) {
    // SAFETY: see [`unmask`].
    unsafe {
        if irq < 8 {
            MASK_MASTER |= 1 << irq;
            outb(PIC1_DATA, MASK_MASTER);
        } else {
            MASK_SLAVE |= 1 << (irq - 8);
            outb(PIC2_DATA, MASK_SLAVE);
        }
    }
}

/// Acknowledge the interrupt at `vector`, sending EOI to the slave PIC
/// only if the vector actually originated there (>= 40).
pub fn send_eoi(vector: u8) {
    // SAFETY: writes EOI to the command ports the CPU just interrupted us
    // through; always safe to issue once per completed ISR.
    unsafe {
        if vector >= SLAVE_IRQ_BASE {
            outb(PIC2_CMD, PIC_EOI);
        }
        outb(PIC1_CMD, PIC_EOI);
    }
}

/// Read the in-service register to disambiguate spurious IRQ7/IRQ15.
pub fn in_service() -> u16 {
    const READ_ISR: u8 = 0x0B;
    // SAFETY: OCW3 read of the ISR is a documented, side-effect-free PIC op.
    unsafe {
        outb(PIC1_CMD, READ_ISR);
        outb(PIC2_CMD, READ_ISR);
        (inb(PIC2_CMD) as u16) << 8 | inb(PIC1_CMD) as u16
    }
}
