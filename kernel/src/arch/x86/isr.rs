//! The common interrupt stub and the vector -> handler dispatch table.
//!
//! Every CPU exception and IRQ funnels through [`dispatch`] with a pointer
//! to the saved [`InterruptFrame`]; the table stores a tagged variant per
//! vector rather than a bare function pointer so EOI and DPL concerns fall
//! out of the variant instead of a numeric vector-range check scattered
//! through the dispatcher.

use core::arch::asm;
use core::arch::global_asm;

use log::{error, warn};

use super::idt::IdtEntry;
use super::pic;

/// Register snapshot pushed by the common stub, in the order it's stored.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptFrame {
    // pushed by `pusha`, in reverse of push order
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp_dummy: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    // pushed by our stub
    pub ds: u32,
    // pushed by the vector-specific stub
    pub int_no: u32,
    pub err_code: u32,
    // pushed by the CPU
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub user_esp: u32,
    pub user_ss: u32,
}

/// What to do with a given vector once its handler returns.
#[derive(Clone, Copy)]
pub enum HandlerEntry {
    Unhandled,
    CpuException(fn(&mut InterruptFrame)),
    Irq(u8, fn(&mut InterruptFrame)),
    Trap(fn(&mut InterruptFrame)),
}

const TABLE_SIZE: usize = 256;
static mut HANDLERS: [HandlerEntry; TABLE_SIZE] = [HandlerEntry::Unhandled; TABLE_SIZE];

/// Register a handler for a CPU exception vector (0-31).
pub fn set_exception_handler(vector: u8, handler: fn(&mut InterruptFrame)) {
    // SAFETY: the table is only mutated during single-threaded init/setup,
    // always before `sti`.
    unsafe { HANDLERS[vector as usize] = HandlerEntry::CpuException(handler) };
}

/// Register a handler for an IRQ line (0-15), installed at its mapped vector.
pub fn set_irq_handler(irq_line: u8, handler: fn(&mut InterruptFrame)) {
    let vector = pic::IRQ_BASE + irq_line;
    // SAFETY: see [`set_exception_handler`].
    unsafe { HANDLERS[vector as usize] = HandlerEntry::Irq(irq_line, handler) };
}

/// Register the syscall trap-gate handler (vector 0x80).
pub fn set_trap_handler(vector: u8, handler: fn(&mut InterruptFrame)) {
    // SAFETY: see [`set_exception_handler`].
    unsafe { HANDLERS[vector as usize] = HandlerEntry::Trap(handler) };
}

/// Called by the common stub with a pointer to the on-stack frame.
#[no_mangle]
extern "C" fn isr_dispatch(frame: *mut InterruptFrame) {
    // SAFETY: `frame` always points at a valid stack-resident frame pushed
    // by our own stub for the duration of this call.
    let frame = unsafe { &mut *frame };
    let vector = frame.int_no as usize;

    // SAFETY: single-core, handlers only ever mutated before `sti`.
    let entry = unsafe { HANDLERS[vector] };
    match entry {
        HandlerEntry::Unhandled => {
            if vector < 32 {
                error!("unhandled CPU exception {vector} at eip={:#x}", frame.eip);
                fatal_halt(frame);
            } else {
                warn!("unhandled interrupt vector {vector}");
            }
        }
        HandlerEntry::CpuException(handler) => handler(frame),
        HandlerEntry::Trap(handler) => handler(frame),
        HandlerEntry::Irq(_, handler) => handler(frame),
    }

    if (32..48).contains(&vector) {
        pic::send_eoi(vector as u8);
    }
}

fn fatal_halt(frame: &InterruptFrame) -> ! {
    error!("fatal fault, halting: {frame:#x?}");
    loop {
        // SAFETY: cli/hlt is always safe; this loop never returns.
        unsafe { super::port::cli() };
        super::port::hlt();
    }
}

/// Fill every IDT entry with its generated stub address.
pub(super) unsafe fn install_stub_table(idt: &mut [IdtEntry; 256], type_attr: u8) {
    for vector in 0..48usize {
        unsafe { idt[vector].install(stub_addr(vector), type_attr) };
    }
}

pub(super) fn syscall_stub_addr() -> u32 {
    isr_syscall_stub as u32
}

macro_rules! isr_no_err {
    ($name:ident, $n:expr) => {
        global_asm!(concat!(
            ".global ", stringify!($name), "\n",
            stringify!($name), ":\n",
            "push 0\n",
            "push ", stringify!($n), "\n",
            "jmp isr_common_stub\n",
        ));
    };
}

macro_rules! isr_err {
    ($name:ident, $n:expr) => {
        global_asm!(concat!(
            ".global ", stringify!($name), "\n",
            stringify!($name), ":\n",
            "push ", stringify!($n), "\n",
            "jmp isr_common_stub\n",
        ));
    };
}

macro_rules! irq_stub {
    ($name:ident, $n:expr) => {
        global_asm!(concat!(
            ".global ", stringify!($name), "\n",
            stringify!($name), ":\n",
            "push 0\n",
            "push ", stringify!($n), "\n",
            "jmp isr_common_stub\n",
        ));
    };
}

global_asm!(
    ".global isr_common_stub",
    "isr_common_stub:",
    "pusha",
    "mov ax, ds",
    "push eax",
    "mov ax, 0x10",
    "mov ds, ax",
    "mov es, ax",
    "mov fs, ax",
    "mov gs, ax",
    "push esp",
    "call isr_dispatch",
    "add esp, 4",
    "pop eax",
    "mov ds, ax",
    "mov es, ax",
    "mov fs, ax",
    "mov gs, ax",
    "popa",
    "add esp, 8",
    "iretd",
);

global_asm!(
    ".global isr_syscall_stub",
    "isr_syscall_stub:",
    "push 0",
    "push 0x80",
    "jmp isr_common_stub",
);

isr_no_err!(isr_0, 0);
isr_no_err!(isr_1, 1);
isr_no_err!(isr_2, 2);
isr_no_err!(isr_3, 3);
isr_no_err!(isr_4, 4);
isr_no_err!(isr_5, 5);
isr_no_err!(isr_6, 6);
isr_no_err!(isr_7, 7);
isr_err!(isr_8, 8);
isr_no_err!(isr_9, 9);
isr_err!(isr_10, 10);
isr_err!(isr_11, 11);
isr_err!(isr_12, 12);
isr_err!(isr_13, 13);
isr_err!(isr_14, 14);
isr_no_err!(isr_15, 15);
isr_no_err!(isr_16, 16);
isr_err!(isr_17, 17);
isr_no_err!(isr_18, 18);
isr_no_err!(isr_19, 19);
isr_no_err!(isr_20, 20);
isr_no_err!(isr_21, 21);
isr_no_err!(isr_22, 22);
isr_no_err!(isr_23, 23);
isr_no_err!(isr_24, 24);
isr_no_err!(isr_25, 25);
isr_no_err!(isr_26, 26);
isr_no_err!(isr_27, 27);
isr_no_err!(isr_28, 28);
isr_no_err!(isr_29, 29);
isr_err!(isr_30, 30);
isr_no_err!(isr_31, 31);

irq_stub!(irq_0, 32);
irq_stub!(irq_1, 33);
irq_stub!(irq_2, 34);
irq_stub!(irq_3, 35);
irq_stub!(irq_4, 36);
irq_stub!(irq_5, 37);
irq_stub!(irq_6, 38);
irq_stub!(irq_7, 39);
irq_stub!(irq_8, 40);
irq_stub!(irq_9, 41);
irq_stub!(irq_10, 42);
irq_stub!(irq_11, 43);
irq_stub!(irq_12, 44);
irq_stub!(irq_13, 45);
irq_stub!(irq_14, 46);
irq_stub!(irq_15, 47);

extern "C" {
    fn isr_0();
    fn isr_1();
    fn isr_2();
    fn isr_3();
    fn isr_4();
    fn isr_5();
    fn isr_6();
    fn isr_7();
    fn isr_8();
    fn isr_9();
    fn isr_10();
    fn isr_11();
    fn isr_12();
    fn isr_13();
    fn isr_14();
    fn isr_15();
    fn isr_16();
    fn isr_17();
    fn isr_18();
    fn isr_19();
    fn isr_20();
    fn isr_21();
    fn isr_22();
    fn isr_23();
    fn isr_24();
    fn isr_25();
    fn isr_26();
    fn isr_27();
    fn isr_28();
    fn isr_29();
    fn isr_30();
    fn isr_31();
    fn irq_0();
    fn irq_1();
    fn irq_2();
    fn irq_3();
    fn irq_4();
    fn irq_5();
    fn irq_6();
    fn irq_7();
    fn irq_8();
    fn irq_9();
    fn irq_10();
    fn irq_11();
    fn irq_12();
    fn irq_13();
    fn irq_14();
    fn irq_15();
    fn isr_syscall_stub();
}

/// Returns the address of the generated stub for a given vector, computed
/// at init time rather than const-evaluated (function addresses are not
/// `const`-foldable across the `extern "C"` boundary).
fn stub_addr(vector: usize) -> u32 {
    // SAFETY: each `isrN`/`irqN` symbol is a valid code address generated
    // by the matching `global_asm!` block above.
    unsafe {
        match vector {
            0 => isr_0 as u32,
            1 => isr_1 as u32,
            2 => isr_2 as u32,
            3 => isr_3 as u32,
            4 => isr_4 as u32,
            5 => isr_5 as u32,
            6 => isr_6 as u32,
            7 => isr_7 as u32,
            8 => isr_8 as u32,
            9 => isr_9 as u32,
            10 => isr_10 as u32,
            11 => isr_11 as u32,
            12 => isr_12 as u32,
            13 => isr_13 as u32,
            14 => isr_14 as u32,
            15 => isr_15 as u32,
            16 => isr_16 as u32,
            17 => isr_17 as u32,
            18 => isr_18 as u32,
            19 => isr_19 as u32,
            20 => isr_20 as u32,
            21 => isr_21 as u32,
            22 => isr_22 as u32,
            23 => isr_23 as u32,
            24 => isr_24 as u32,
            25 => isr_25 as u32,
            26 => isr_26 as u32,
            27 => isr_27 as u32,
            28 => isr_28 as u32,
            29 => isr_29 as u32,
            30 => isr_30 as u32,
            31 => isr_31 as u32,
            32 => irq_0 as u32,
            33 => irq_1 as u32,
            34 => irq_2 as u32,
            35 => irq_3 as u32,
            36 => irq_4 as u32,
            37 => irq_5 as u32,
            38 => irq_6 as u32,
            39 => irq_7 as u32,
            40 => irq_8 as u32,
            41 => irq_9 as u32,
            42 => irq_10 as u32,
            43 => irq_11 as u32,
            44 => irq_12 as u32,
            45 => irq_13 as u32,
            46 => irq_14 as u32,
            47 => irq_15 as u32,
            _ => default_stub_addr(),
        }
    }
}

fn default_stub_addr() -> u32 {
    isr_syscall_stub_default as u32
}

global_asm!(
    ".global isr_syscall_stub_default",
    "isr_syscall_stub_default:",
    "push 0",
    "push 0xff",
    "jmp isr_common_stub",
);

extern "C" {
    fn isr_syscall_stub_default();
}
