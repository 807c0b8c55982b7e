//! 32-bit two-level paging virtual memory manager.
//!
//! Every address space shares the kernel's top-half window
//! (`KERNEL_VIRTUAL_BASE..4G`) via identical page-directory entries, so a
//! `map`/`unmap` of a kernel address performed while any address space is
//! active is visible to all of them. Grounded in the original
//! `vmm_map_page`/`vmm_create_page_directory` flow.

use bitflags::bitflags;

use crate::config::{FRAME_SIZE, IDENTITY_MAP_SIZE, KERNEL_VIRTUAL_BASE};
use crate::error::MmError;
use crate::mm::pmm;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT  = 1 << 0;
        const WRITABLE = 1 << 1;
        const USER     = 1 << 2;
    }
}

const ENTRIES: usize = 1024;

fn pd_index(va: u32) -> usize {
    (va >> 22) as usize
}

fn pt_index(va: u32) -> usize {
    ((va >> 12) & 0x3FF) as usize
}

fn page_align(addr: u32) -> u32 {
    addr & !(FRAME_SIZE - 1)
}

/// An address space is just the physical address of its page directory;
/// the directory and its page tables are themselves PMM-owned frames.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AddressSpace(pub u32);

type Table = [u32; ENTRIES];

fn table_at(phys: u32) -> &'static mut Table {
    // SAFETY: `phys` is always a frame this module allocated from the PMM
    // and zeroed before handing out; the kernel's identity/high-half
    // mapping makes it directly dereferenceable as a `*mut Table`.
    unsafe { &mut *(phys as *mut Table) }
}

static mut KERNEL_DIRECTORY: u32 = 0;

/// Build the canonical kernel page directory: identity-map the low
/// `IDENTITY_MAP_SIZE` window (needed until paging is enabled and for the
/// kernel's own code/data) and mirror the same physical range at
/// `KERNEL_VIRTUAL_BASE`.
///
/// # Safety
/// Must run exactly once at boot, before `enable_paging`.
pub unsafe fn init() -> Result<(), MmError> {
    let dir_phys = pmm::alloc_frame()?;
    let dir = table_at(dir_phys);
    dir.fill(0);

    let identity_tables = (IDENTITY_MAP_SIZE / FRAME_SIZE).div_ceil(ENTRIES as u32);
    for t in 0..identity_tables {
        let pt_phys = pmm::alloc_frame()?;
        let pt = table_at(pt_phys);
        for (i, entry) in pt.iter_mut().enumerate() {
            let frame_addr = (t as usize * ENTRIES + i) as u32 * FRAME_SIZE;
            *entry = frame_addr | (PageFlags::PRESENT | PageFlags::WRITABLE).bits();
        }
        let pde = pt_phys | (PageFlags::PRESENT | PageFlags::WRITABLE).bits();
        dir[t as usize] = pde;
        dir[pd_index(KERNEL_VIRTUAL_BASE) + t as usize] = pde;
    }

    // SAFETY: single-threaded boot-time initialization.
    unsafe { KERNEL_DIRECTORY = dir_phys };
    Ok(())
}

pub fn kernel_address_space() -> AddressSpace {
    // SAFETY: set once by `init`, read-only thereafter.
    AddressSpace(unsafe { KERNEL_DIRECTORY })
}

/// Allocate a fresh page directory that shares every kernel-window entry
/// with the canonical kernel directory.
pub fn create_address_space() -> Result<AddressSpace, MmError> {
    let dir_phys = pmm::alloc_frame()?;
    let dir = table_at(dir_phys);
    dir.fill(0);

    let kernel_dir = table_at(kernel_address_space().0);
    let start = pd_index(KERNEL_VIRTUAL_BASE);
    dir[start..].copy_from_slice(&kernel_dir[start..]);

    Ok(AddressSpace(dir_phys))
}

/// Map a single 4 KiB page. Allocates and zeroes a page-table frame on
/// demand if the covering directory entry is absent.
pub fn map(space: AddressSpace, va: u32, pa: u32, flags: PageFlags) -> Result<(), MmError> {
    let va = page_align(va);
    let pa = page_align(pa);
    let dir = table_at(space.0);
    let pd_idx = pd_index(va);

    if dir[pd_idx] & PageFlags::PRESENT.bits() == 0 {
        let pt_phys = pmm::alloc_frame()?;
        table_at(pt_phys).fill(0);
        let user_bit = if flags.contains(PageFlags::USER) { PageFlags::USER.bits() } else { 0 };
        dir[pd_idx] = pt_phys | PageFlags::PRESENT.bits() | PageFlags::WRITABLE.bits() | user_bit;
    }

    let pt_phys = dir[pd_idx] & !(FRAME_SIZE - 1);
    let pt = table_at(pt_phys);
    let pt_idx = pt_index(va);
    if pt[pt_idx] & PageFlags::PRESENT.bits() != 0 {
        return Err(MmError::AlreadyMapped { virt_addr: va });
    }
    pt[pt_idx] = pa | flags.bits();

    flush_tlb(va);
    Ok(())
}

/// Unmap a single page, freeing the physical frame it pointed at. A no-op
/// if the page was not present.
pub fn unmap(space: AddressSpace, va: u32) -> Result<(), MmError> {
    let va = page_align(va);
    let dir = table_at(space.0);
    let pd_idx = pd_index(va);
    if dir[pd_idx] & PageFlags::PRESENT.bits() == 0 {
        return Ok(());
    }
    let pt_phys = dir[pd_idx] & !(FRAME_SIZE - 1);
    let pt = table_at(pt_phys);
    let pt_idx = pt_index(va);
    if pt[pt_idx] & PageFlags::PRESENT.bits() == 0 {
        return Ok(());
    }
    let frame = pt[pt_idx] & !(FRAME_SIZE - 1);
    pt[pt_idx] = 0;
    pmm::free_frame(frame);
    flush_tlb(va);
    Ok(())
}

/// Resolve a virtual address to its physical mapping, including the
/// sub-page offset. Returns `None` if unmapped.
pub fn resolve(space: AddressSpace, va: u32) -> Option<u32> {
    let dir = table_at(space.0);
    let pd_idx = pd_index(va);
    if dir[pd_idx] & PageFlags::PRESENT.bits() == 0 {
        return None;
    }
    let pt_phys = dir[pd_idx] & !(FRAME_SIZE - 1);
    let pt = table_at(pt_phys);
    let pt_idx = pt_index(va);
    if pt[pt_idx] & PageFlags::PRESENT.bits() == 0 {
        return None;
    }
    let frame = pt[pt_idx] & !(FRAME_SIZE - 1);
    Some(frame | (va & (FRAME_SIZE - 1)))
}

#[cfg(target_arch = "x86")]
pub fn switch_to(space: AddressSpace) {
    // SAFETY: `space.0` is a valid page directory built by this module.
    unsafe { crate::arch::x86::port::load_cr3(space.0) };
}

#[cfg(not(target_arch = "x86"))]
pub fn switch_to(_space: AddressSpace) {}

#[cfg(target_arch = "x86")]
fn flush_tlb(va: u32) {
    // SAFETY: `va`'s mapping was just changed by the caller.
    unsafe { crate::arch::x86::port::invlpg(va) };
}

#[cfg(not(target_arch = "x86"))]
fn flush_tlb(_va: u32) {}

/// # Safety
/// Must run once, after [`init`] and after the low window is identity
/// mapped; every instruction from here on must remain reachable.
#[cfg(target_arch = "x86")]
pub unsafe fn enable_paging() {
    unsafe {
        crate::arch::x86::port::load_cr3(kernel_address_space().0);
        crate::arch::x86::port::enable_paging();
    }
}

#[cfg(not(target_arch = "x86"))]
/// # Safety
/// No-op off-target.
pub unsafe fn enable_paging() {}
