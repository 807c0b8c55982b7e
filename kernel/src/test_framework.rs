//! Bare-metal test harness. Plain host `cargo test` links real `std` back
//! in (see `lib.rs`) and runs under the ordinary libtest harness; this
//! module only matters for the `target_os = "none"` pass, where the test
//! binary boots under QEMU and has no libtest to report results through,
//! so results go out over the serial port and the run ends by writing a
//! pass/fail code to QEMU's isa-debug-exit device.

use core::panic::PanicInfo;

use crate::{serial_print, serial_println};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QemuExitCode {
    Success = 0x10,
    Failed = 0x11,
}

pub trait Testable {
    fn run(&self);
}

impl<T: Fn()> Testable for T {
    fn run(&self) {
        serial_print!("{}...\t", core::any::type_name::<T>());
        self();
        serial_println!("[ok]");
    }
}

pub fn test_runner(tests: &[&dyn Testable]) -> ! {
    serial_println!("running {} tests", tests.len());
    for test in tests {
        test.run();
    }
    exit_qemu(QemuExitCode::Success);
}

pub fn test_panic_handler(info: &PanicInfo) -> ! {
    serial_println!("[failed]\n");
    serial_println!("{info}");
    exit_qemu(QemuExitCode::Failed)
}

#[cfg(target_arch = "x86")]
pub fn exit_qemu(exit_code: QemuExitCode) -> ! {
    // SAFETY: port 0xf4 is QEMU's isa-debug-exit device; writing to it
    // always terminates the VM with the written value as the exit code.
    unsafe { crate::arch::x86::port::outb(0xf4, exit_code as u8) };
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(not(target_arch = "x86"))]
pub fn exit_qemu(_exit_code: QemuExitCode) -> ! {
    loop {
        core::hint::spin_loop();
    }
}
