//! `sys_exit`/`sys_getpid`/`sys_geterrno`.

use super::{Args, SyscallResult};
use crate::sched;

pub fn sys_exit(args: Args) -> SyscallResult {
    sched::exit(args.a0 as i32);
}

pub fn sys_getpid(_args: Args) -> SyscallResult {
    Ok(sched::current_pid().unwrap_or(0) as i32)
}

/// Read back the errno left by the calling task's most recent failing
/// syscall (§4.6's "thread-local errno byte... read by a dedicated call").
pub fn sys_geterrno(_args: Args) -> SyscallResult {
    Ok(sched::errno())
}
