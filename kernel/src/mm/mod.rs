//! Memory management: physical frames, paging, and the kernel heap.

pub mod heap;
pub mod pmm;
pub mod vmm;

use crate::config::{HEAP_SIZE, HEAP_START, MEMORY_SIZE, FRAME_SIZE};
use crate::error::MmError;
use vmm::{AddressSpace, PageFlags};

/// Bring up the memory subsystem in the order the rest of boot depends on:
/// frame allocator, kernel page directory, paging itself, then the heap
/// that every later subsystem's `alloc::boxed::Box`/`Vec` usage needs.
///
/// # Safety
/// Must run exactly once, early in `kernel_main`, before any code that
/// allocates or touches paging state.
pub unsafe fn init() -> Result<(), MmError> {
    unsafe {
        pmm::init();
        vmm::init()?;

        let heap_pages = (HEAP_SIZE as u32).div_ceil(FRAME_SIZE);
        let space = vmm::kernel_address_space();
        for page in 0..heap_pages {
            let frame = pmm::alloc_frame()?;
            let va = HEAP_START + page * FRAME_SIZE;
            vmm::map(space, va, frame, PageFlags::PRESENT | PageFlags::WRITABLE)?;
        }

        vmm::enable_paging();
        heap::init(HEAP_START as usize, HEAP_SIZE);
    }
    log::info!(
        "mm: {} MiB managed, {} KiB heap at {:#x}",
        MEMORY_SIZE / (1024 * 1024),
        HEAP_SIZE / 1024,
        HEAP_START
    );
    Ok(())
}

/// Allocate a fresh top-half-sharing address space for a new process.
pub fn new_address_space() -> Result<AddressSpace, MmError> {
    vmm::create_address_space()
}
