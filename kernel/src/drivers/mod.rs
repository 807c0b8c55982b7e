pub mod ata;
pub mod keyboard;
pub mod vga;

/// # Safety
/// Must run once at boot, after `arch::init()`.
pub unsafe fn init() {
    unsafe {
        keyboard::init();
        ata::init();
    }
}
