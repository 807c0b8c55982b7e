//! Tunable constants shared across subsystems. Declared once here instead
//! of being repeated as magic numbers at each call site.

/// Physical memory window the PMM manages; matches the platform's RAM
/// layout below the kernel image and above BIOS/legacy space.
pub const MEMORY_START: u32 = 0x0020_0000;
pub const MEMORY_SIZE: u32 = 0x01E0_0000; // 30 MiB
pub const FRAME_SIZE: u32 = 4096;

/// Kernel heap arena.
pub const HEAP_START: u32 = 0x0080_0000;
pub const HEAP_SIZE: usize = 4 * 1024 * 1024;

/// Top-half kernel virtual base; every address space maps this range
/// identically.
pub const KERNEL_VIRTUAL_BASE: u32 = 0xC000_0000;
/// Size of the identity-mapped low window active before/while enabling
/// paging.
pub const IDENTITY_MAP_SIZE: u32 = 0x0040_0000; // 4 MiB

/// Process limits.
pub const MAX_PROCESSES: usize = 32;
pub const PROCESS_STACK_SIZE: usize = 4096;
pub const MAX_PROCESS_NAME: usize = 32;

/// Scheduler time slices, in PIT ticks (1 tick == 1 ms).
pub const TIME_SLICE_HIGH_MS: u64 = 50;
pub const TIME_SLICE_NORMAL_MS: u64 = 100;
pub const TIME_SLICE_LOW_MS: u64 = 200;

/// Bounded spin count for ATA busy/ready/DRQ waits, guarding against a
/// wedged or absent drive hanging the kernel forever.
pub const ATA_TIMEOUT_SPINS: u32 = 1_000_000;
pub const MAX_ATA_DRIVES: usize = 4;

/// In-RAM file system capacities.
pub const FS_MAX_FILENAME_LEN: usize = 32;
pub const FS_MAX_PATH_LEN: usize = 256;
pub const FS_MAX_FILES_PER_DIR: usize = 64;
pub const FS_MAX_DIRECTORIES: usize = 32;
pub const FS_MAX_FILES: usize = 128;

/// Keyboard/serial ring buffer capacity (power of two).
pub const RING_BUFFER_SIZE: usize = 256;

/// Upper bound on timer callbacks registered via `pit::register_callback`.
pub const MAX_PIT_CALLBACKS: usize = 8;

/// Heap block magic numbers (ground truth constants, not spec-invented).
pub const HEAP_MAGIC_ALLOCATED: u32 = 0xABCD_EF00;
pub const HEAP_MAGIC_FREE: u32 = 0x1234_5678;
pub const HEAP_MIN_ALLOC_SIZE: usize = 32;
