#![no_std]
#![no_main]

use core::panic::PanicInfo;

use ace_kernel::{arch, drivers, fs, mm, sched, serial};
#[cfg(target_arch = "x86")]
use ace_kernel::{shell, syscall};

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log::error!("PANIC: {info}");
    arch::halt_forever();
}

/// Ring-0 stack recorded in the TSS's `esp0`. Never actually switched to by
/// a privilege-level change in this single-address-space design, but the
/// CPU expects a plausible value there regardless.
const KERNEL_STACK_SIZE: usize = 16 * 1024;

#[repr(align(16))]
struct KernelStack([u8; KERNEL_STACK_SIZE]);

static mut KERNEL_STACK: KernelStack = KernelStack([0; KERNEL_STACK_SIZE]);

/// Boot sequence, in the order the rest of the kernel depends on: the CPU
/// substrate first (so a fault anywhere after this point at least has an
/// IDT to land in), then memory, then the scheduler's process table, then
/// drivers, then the filesystem they back, then the syscall gate, then
/// interrupts on, then the shell.
///
/// # Safety
/// This is the only call site for every subsystem `init()`; it must run
/// exactly once, in this order, before anything else touches kernel state.
/// Called by the multiboot trampoline in `arch::x86::boot` once paging and
/// segment selectors are live; `_multiboot_magic`/`_multiboot_info` are the
/// values GRUB left in eax/ebx, unused beyond this point.
#[no_mangle]
pub extern "C" fn kernel_main(_multiboot_magic: u32, _multiboot_info: u32) -> ! {
    serial::init_logger();
    log::info!("aceOS kernel {} (git {})", env!("CARGO_PKG_VERSION"), env!("GIT_HASH"));

    // SAFETY: first instruction of kernel boot, interrupts are off, single
    // CPU, nothing else has run yet.
    unsafe {
        let stack_top = (&raw const KERNEL_STACK as *const KernelStack as u32) + KERNEL_STACK_SIZE as u32;
        arch::x86::init(stack_top);
        serial::init();

        mm::init().expect("memory management init failed");
        sched::init();
        drivers::init();
        fs::init();
        #[cfg(target_arch = "x86")]
        syscall::init();

        arch::x86::port::sti();
    }

    log::info!("aceOS ready");

    #[cfg(target_arch = "x86")]
    // SAFETY: every subsystem above is initialized and interrupts are on.
    unsafe {
        shell::run()
    }

    #[cfg(not(target_arch = "x86"))]
    arch::halt_forever();
}
