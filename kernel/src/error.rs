//! Crate-wide error taxonomy. Every fallible kernel-internal operation
//! returns `Result<T, KernelError>` (or a subsystem alias that wraps one
//! variant here); only the three boundaries that are inherently
//! C-ABI-shaped — the syscall return slot, the ISR trampoline, and the
//! port-I/O primitives — traffic in bare integers.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    OutOfFrames,
    FrameNotAllocated { phys_addr: u32 },
    OutOfHeap { requested: usize },
    HeapCorrupt,
    NotMapped { virt_addr: u32 },
    AlreadyMapped { virt_addr: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    TableFull,
    DirectoryFull,
    NotFound,
    NotADirectory,
    IsADirectory,
    DirectoryNotEmpty,
    NameExists,
    NameTooLong,
    PathTooLong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtaError {
    InvalidDrive,
    NotPresent,
    BusyTimeout,
    DrqTimeout,
    DeviceError,
    WriteFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    BadNumber,
    BadFileDescriptor,
    NullPointer,
    BadArgument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    ProcessTableFull,
    ProcessNotFound { pid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    Mm(MmError),
    Fs(FsError),
    Ata(AtaError),
    Syscall(SyscallError),
    Sched(SchedError),
}

impl From<MmError> for KernelError {
    fn from(e: MmError) -> Self {
        KernelError::Mm(e)
    }
}
impl From<FsError> for KernelError {
    fn from(e: FsError) -> Self {
        KernelError::Fs(e)
    }
}
impl From<AtaError> for KernelError {
    fn from(e: AtaError) -> Self {
        KernelError::Ata(e)
    }
}
impl From<SyscallError> for KernelError {
    fn from(e: SyscallError) -> Self {
        KernelError::Syscall(e)
    }
}
impl From<SchedError> for KernelError {
    fn from(e: SchedError) -> Self {
        KernelError::Sched(e)
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Mm(MmError::OutOfFrames) => write!(f, "out of physical frames"),
            KernelError::Mm(MmError::FrameNotAllocated { phys_addr }) => {
                write!(f, "frame at {phys_addr:#x} was not allocated")
            }
            KernelError::Mm(MmError::OutOfHeap { requested }) => {
                write!(f, "heap exhausted (requested {requested} bytes)")
            }
            KernelError::Mm(MmError::HeapCorrupt) => write!(f, "heap corruption detected"),
            KernelError::Mm(MmError::NotMapped { virt_addr }) => {
                write!(f, "{virt_addr:#x} is not mapped")
            }
            KernelError::Mm(MmError::AlreadyMapped { virt_addr }) => {
                write!(f, "{virt_addr:#x} is already mapped")
            }
            KernelError::Fs(e) => write!(f, "filesystem error: {e:?}"),
            KernelError::Ata(e) => write!(f, "disk error: {e:?}"),
            KernelError::Syscall(e) => write!(f, "syscall error: {e:?}"),
            KernelError::Sched(e) => write!(f, "scheduler error: {e:?}"),
        }
    }
}

/// POSIX-aligned errno values surfaced across the syscall gate (§6).
pub mod errno {
    pub const ENOENT: i32 = 2;
    pub const EBADF: i32 = 9;
    pub const ENOMEM: i32 = 12;
    pub const EACCES: i32 = 13;
    pub const EFAULT: i32 = 14;
    pub const EEXIST: i32 = 17;
    pub const ENOTDIR: i32 = 20;
    pub const EISDIR: i32 = 21;
    pub const EINVAL: i32 = 22;
    pub const ERANGE: i32 = 34;
}

/// Translate a [`KernelError`] into the errno the syscall dispatcher
/// reports back to the caller; the single place this mapping happens.
pub fn to_errno(err: KernelError) -> i32 {
    use errno::*;
    match err {
        KernelError::Mm(MmError::OutOfFrames | MmError::OutOfHeap { .. }) => ENOMEM,
        KernelError::Mm(MmError::HeapCorrupt) => EFAULT,
        KernelError::Mm(MmError::NotMapped { .. } | MmError::AlreadyMapped { .. })
        | KernelError::Mm(MmError::FrameNotAllocated { .. }) => EFAULT,
        KernelError::Fs(FsError::NotFound) => ENOENT,
        KernelError::Fs(FsError::NotADirectory) => ENOTDIR,
        KernelError::Fs(FsError::IsADirectory) => EISDIR,
        KernelError::Fs(FsError::NameExists) => EEXIST,
        KernelError::Fs(FsError::DirectoryNotEmpty) => EACCES,
        KernelError::Fs(FsError::TableFull | FsError::DirectoryFull) => ENOMEM,
        KernelError::Fs(FsError::NameTooLong | FsError::PathTooLong) => ERANGE,
        KernelError::Ata(_) => EFAULT,
        KernelError::Syscall(SyscallError::BadFileDescriptor) => EBADF,
        KernelError::Syscall(SyscallError::NullPointer) => EFAULT,
        KernelError::Syscall(_) => EINVAL,
        KernelError::Sched(_) => EINVAL,
    }
}
