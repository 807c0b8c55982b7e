//! Flat Global Descriptor Table.
//!
//! The bootloader hands us protected mode with *some* GDT already active
//! (GRUB's own); we install our own flat map immediately so every later
//! module can rely on fixed selector values (0x08 kernel code, 0x10 kernel
//! data, 0x18 the TSS) regardless of how we were booted.

use core::mem::size_of;

/// Kernel code segment selector.
pub const KERNEL_CODE_SELECTOR: u16 = 0x08;
/// Kernel data segment selector.
pub const KERNEL_DATA_SELECTOR: u16 = 0x10;
/// Task-state segment selector, used only to hold `ss0`/`esp0`.
pub const TSS_SELECTOR: u16 = 0x18;

#[repr(C, packed)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    granularity: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        GdtEntry { limit_low: 0, base_low: 0, base_mid: 0, access: 0, granularity: 0, base_high: 0 }
    }

    const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        GdtEntry {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access,
            granularity: (((limit >> 16) & 0x0F) as u8) | (flags << 4),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

#[repr(C, packed)]
struct GdtDescriptor {
    limit: u16,
    base: u32,
}

/// access byte: present | ring0 | S(code/data) | executable | rw | accessed
const ACCESS_CODE: u8 = 0b1001_1010;
const ACCESS_DATA: u8 = 0b1001_0010;
const ACCESS_TSS: u8 = 0b1000_1001;
/// flags: granularity=4K, size=32-bit
const FLAGS_4K_32BIT: u8 = 0b1100;
const FLAGS_TSS: u8 = 0b0000;

#[repr(C, packed)]
struct Tss {
    prev_tss: u32,
    esp0: u32,
    ss0: u32,
    // The remaining fields are unused in this single-address-space design;
    // they exist only so the descriptor's size matches the CPU's TSS format.
    _rest: [u32; 22],
    iomap_base: u16,
}

static mut GDT: [GdtEntry; 4] = [
    GdtEntry::null(),
    GdtEntry::new(0, 0xFFFFF, ACCESS_CODE, FLAGS_4K_32BIT),
    GdtEntry::new(0, 0xFFFFF, ACCESS_DATA, FLAGS_4K_32BIT),
    GdtEntry::null(), // patched with the TSS descriptor at init time
];

static mut TSS: Tss = Tss { prev_tss: 0, esp0: 0, ss0: 0, _rest: [0; 22], iomap_base: 0 };

/// Install the flat GDT and load segment registers to point at it.
///
/// # Safety
/// Must run with interrupts disabled, before anything relies on a
/// particular selector value, and only once.
pub unsafe fn init(kernel_stack_top: u32) {
    let tss_base = &raw const TSS as u32;
    let tss_limit = (size_of::<Tss>() - 1) as u32;
    unsafe {
        GDT[3] = GdtEntry::new(tss_base, tss_limit, ACCESS_TSS, FLAGS_TSS);
        TSS.ss0 = KERNEL_DATA_SELECTOR as u32;
        TSS.esp0 = kernel_stack_top;

        let descriptor = GdtDescriptor {
            limit: (size_of::<[GdtEntry; 4]>() - 1) as u16,
            base: &raw const GDT as u32,
        };
        load_gdt(&descriptor);
        reload_segments();
        load_tss();
    }
}

/// Update the ring-0 stack pointer recorded in the TSS; called whenever the
/// scheduler switches to a process with a different kernel stack.
pub fn set_kernel_stack(esp0: u32) {
    // SAFETY: a plain field store; no concurrent writer (interrupts are
    // disabled for the whole context-switch window that calls this).
    unsafe { TSS.esp0 = esp0 };
}

unsafe fn load_gdt(descriptor: &GdtDescriptor) {
    unsafe {
        core::arch::asm!("lgdt [{0}]", in(reg) descriptor, options(readonly, nostack, preserves_flags));
    }
}

unsafe fn reload_segments() {
    unsafe {
        core::arch::asm!(
            "push {code_sel}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            "mov ax, {data_sel:x}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            code_sel = const KERNEL_CODE_SELECTOR,
            data_sel = in(reg) KERNEL_DATA_SELECTOR,
            tmp = out(reg) _,
            out("ax") _,
        );
    }
}

unsafe fn load_tss() {
    unsafe {
        core::arch::asm!("ltr {0:x}", in(reg) TSS_SELECTOR, options(nostack, preserves_flags));
    }
}
