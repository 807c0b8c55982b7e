//! aceOS kernel library root. Wires every subsystem module together and
//! supplies the handful of crate-wide items (`panic_handler`, test entry
//! point) that only make sense exactly once per final binary.
//!
//! `#![no_std]` is unconditional, matching what the bare-metal boot binary
//! needs; the host test target pulls `std` back in explicitly below so
//! `#[cfg(test)]` unit tests scattered through the pure-logic modules can
//! use `Vec`/`String` and run under the ordinary libtest harness. Only the
//! `target_os = "none"` test pass (booted under QEMU) needs the custom
//! runner in [`test_framework`].

#![no_std]
#![cfg_attr(all(test, target_os = "none"), no_main)]
#![cfg_attr(target_os = "none", feature(alloc_error_handler))]
#![feature(custom_test_frameworks)]
#![cfg_attr(target_os = "none", test_runner(crate::test_framework::test_runner))]
#![cfg_attr(target_os = "none", reexport_test_harness_main = "test_main")]

extern crate alloc;

#[cfg(not(target_os = "none"))]
extern crate std;

#[macro_use]
pub mod print;

mod intrinsics;

pub mod arch;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fs;
pub mod mm;
pub mod sched;
pub mod serial;
#[cfg(target_arch = "x86")]
pub mod shell;
#[cfg(target_arch = "x86")]
pub mod syscall;

#[cfg(test)]
mod test_framework;

/// Entry point the multiboot trampoline in `arch::x86::boot` calls into
/// for a bare-metal test binary; takes the place of `main.rs`'s
/// `kernel_main` when this crate itself is the final linked binary.
#[cfg(all(test, target_os = "none"))]
#[no_mangle]
pub extern "C" fn kernel_main(_multiboot_magic: u32, _multiboot_info: u32) -> ! {
    serial::init_logger();
    test_main();
    arch::halt_forever();
}

#[cfg(all(test, target_os = "none"))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    test_framework::test_panic_handler(info)
}

/// Heap exhaustion in a freestanding kernel has no recovery path; the
/// `alloc_error_handler` ABI requires `-> !`.
#[cfg(target_os = "none")]
#[alloc_error_handler]
fn alloc_error_handler(layout: core::alloc::Layout) -> ! {
    panic!("allocation error: {layout:?}");
}
