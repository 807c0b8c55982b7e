//! INT 0x80 syscall gate: argument marshalling and the POSIX-numbered
//! dispatch table, grounded in the original kernel's `syscall_handler`
//! switch and `include/syscall.h` numbering. 9 (`geterrno`) and 10
//! (`realloc`) fill gaps the original numbering left unused; every other
//! number matches it exactly.
//!
//! Arguments travel in `ebx, ecx, edx, esi, edi` and the call number in
//! `eax`, matching the classic Linux/i386 `int 0x80` convention the
//! original kernel itself followed. The result is written back into `eax`
//! before `iretd`: `-1` on failure with the errno stashed in the calling
//! task's PCB (readable via `geterrno`), the non-negative result otherwise.

mod filesystem;
mod memory;
mod process;
mod time;

use crate::arch::x86::idt::SYSCALL_VECTOR;
use crate::arch::x86::isr::InterruptFrame;
use crate::error::KernelError;

pub struct Args {
    pub a0: u32,
    pub a1: u32,
    pub a2: u32,
    pub a3: u32,
    pub a4: u32,
}

pub type SyscallResult = Result<i32, KernelError>;

const SYS_EXIT: u32 = 0;
const SYS_READ: u32 = 1;
const SYS_WRITE: u32 = 2;
const SYS_OPEN: u32 = 3;
const SYS_CLOSE: u32 = 4;
const SYS_MALLOC: u32 = 5;
const SYS_FREE: u32 = 6;
const SYS_GETPID: u32 = 7;
const SYS_SLEEP: u32 = 8;
const SYS_GETERRNO: u32 = 9;
const SYS_REALLOC: u32 = 10;
const SYS_CHDIR: u32 = 13;
const SYS_GETCWD: u32 = 14;
const SYS_MKDIR: u32 = 15;
const SYS_RMDIR: u32 = 16;
const SYS_UNLINK: u32 = 17;
const SYS_STAT: u32 = 18;
const SYS_TIME: u32 = 19;

/// # Safety
/// Must run once at boot, after `arch::init()`.
pub unsafe fn init() {
    crate::arch::x86::isr::set_trap_handler(SYSCALL_VECTOR, entry);
}

fn entry(frame: &mut InterruptFrame) {
    let args = Args { a0: frame.ebx, a1: frame.ecx, a2: frame.edx, a3: frame.esi, a4: frame.edi };
    let result = dispatch(frame.eax, args);
    frame.eax = match result {
        Ok(value) => value as u32,
        Err(e) => {
            crate::sched::set_errno(crate::error::to_errno(e));
            -1i32 as u32
        }
    };
}

fn dispatch(number: u32, args: Args) -> SyscallResult {
    let result = match number {
        SYS_EXIT => process::sys_exit(args),
        SYS_READ => filesystem::sys_read(args),
        SYS_WRITE => filesystem::sys_write(args),
        SYS_OPEN => filesystem::sys_open(args),
        SYS_CLOSE => filesystem::sys_close(args),
        SYS_MALLOC => memory::sys_malloc(args),
        SYS_FREE => memory::sys_free(args),
        SYS_GETPID => process::sys_getpid(args),
        SYS_SLEEP => time::sys_sleep(args),
        SYS_GETERRNO => process::sys_geterrno(args),
        SYS_REALLOC => memory::sys_realloc(args),
        SYS_CHDIR => filesystem::sys_chdir(args),
        SYS_GETCWD => filesystem::sys_getcwd(args),
        SYS_MKDIR => filesystem::sys_mkdir(args),
        SYS_RMDIR => filesystem::sys_rmdir(args),
        SYS_UNLINK => filesystem::sys_unlink(args),
        SYS_STAT => filesystem::sys_stat(args),
        SYS_TIME => time::sys_time(args),
        _ => Err(KernelError::Syscall(crate::error::SyscallError::BadNumber)),
    };
    if let Err(e) = &result {
        log::warn!("syscall {number}: {e}");
    }
    result
}
