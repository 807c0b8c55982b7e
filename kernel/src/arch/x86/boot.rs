//! Multiboot2 entry trampoline.
//!
//! GRUB hands control to `_start` with paging off and the CPU still running
//! at its load address; every label this file defines is placed by
//! [`link.ld`](../../link.ld) at that low, physical-matching address (never
//! the kernel's usual higher-half link address), so the jump GRUB performs
//! lands somewhere real. The trampoline's job is narrow: load a temporary
//! PSE-mapped page directory that identity-maps the low `IDENTITY_MAP_SIZE`
//! window and aliases the same physical range at `KERNEL_VIRTUAL_BASE`,
//! flip on paging, reload the GDT so `cs`/`ds` hold the selectors the rest
//! of the kernel assumes, and fall into `kernel_main` — which, being
//! ordinary `.text`, is already linked at its higher-half address and only
//! becomes reachable once the jump above is live.
//!
//! [`crate::mm::vmm`] replaces this page directory with the real one as
//! part of `mm::init()`; this one only has to survive that long.

use core::arch::global_asm;

const PAGE_PRESENT: u32 = 1 << 0;
const PAGE_WRITABLE: u32 = 1 << 1;
const PAGE_SIZE_4M: u32 = 1 << 7;

const KERNEL_VIRTUAL_BASE: u32 = crate::config::KERNEL_VIRTUAL_BASE;
const PD_INDEX_HIGH: usize = (KERNEL_VIRTUAL_BASE >> 22) as usize;

/// Temporary boot-time page directory: one 4 MiB PSE entry at index 0
/// (identity) and the same entry mirrored at [`PD_INDEX_HIGH`] (the
/// higher-half alias). Everything else stays unmapped; nothing the
/// trampoline touches lives outside the first 4 MiB.
#[repr(C, align(4096))]
struct BootPageDirectory([u32; 1024]);

#[unsafe(no_mangle)]
#[unsafe(link_section = ".boot.data")]
static mut BOOT_PAGE_DIRECTORY: BootPageDirectory = {
    let entry = PAGE_PRESENT | PAGE_WRITABLE | PAGE_SIZE_4M;
    let mut dir = [0u32; 1024];
    dir[0] = entry;
    dir[PD_INDEX_HIGH] = entry;
    BootPageDirectory(dir)
};

const BOOT_STACK_SIZE: usize = 16 * 1024;

global_asm!(
    r#"
.code32
.section .multiboot_header, "a"
.align 8
mb_header:
    .long 0xe85250d6
    .long 0
    .long (mb_header_end - mb_header)
    .long -(0xe85250d6 + (mb_header_end - mb_header))
.align 8
mb_entry_tag:
    .short 3
    .short 0
    .long (mb_entry_tag_end - mb_entry_tag)
    .long _start
mb_entry_tag_end:
.align 8
    .short 0
    .short 0
    .long 8
mb_header_end:

.section .boot.stack, "aw", @nobits
.align 16
boot_stack_bottom:
    .skip {STACK_SIZE}
boot_stack_top:

.section .boot.data, "aw"
.align 8
boot_gdt:
    .long 0, 0
    .long 0x0000ffff, 0x00cf9a00
    .long 0x0000ffff, 0x00cf9200
boot_gdt_descriptor:
    .word boot_gdt_descriptor - boot_gdt - 1
    .long boot_gdt

.section .boot.text, "ax"
.global _start
.type _start, @function
_start:
    mov esp, offset boot_stack_top
    xor ebp, ebp
    push 0
    popfd

    push ebx
    push eax

    mov eax, offset {PAGE_DIR}
    mov cr3, eax

    mov eax, cr4
    or eax, 0x10
    mov cr4, eax

    mov eax, cr0
    or eax, 0x80000000
    mov cr0, eax

    lgdt [boot_gdt_descriptor]
    push 0x08
    mov eax, offset complete_flush
    push eax
    retf
complete_flush:
    mov ax, 0x10
    mov ds, ax
    mov es, ax
    mov fs, ax
    mov gs, ax
    mov ss, ax

    add esp, {VBASE}

    pop eax
    pop ebx
    push ebx
    push eax
    call kernel_main
    ud2
"#,
    PAGE_DIR = sym BOOT_PAGE_DIRECTORY,
    STACK_SIZE = const BOOT_STACK_SIZE,
    VBASE = const KERNEL_VIRTUAL_BASE,
);
