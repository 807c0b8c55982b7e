//! `sys_sleep`/`sys_time`, both expressed in the PIT's millisecond tick.

use super::{Args, SyscallResult};
use crate::arch::x86::pit;
use crate::sched;

pub fn sys_sleep(args: Args) -> SyscallResult {
    sched::sleep_ms(args.a0 as u64);
    Ok(0)
}

pub fn sys_time(_args: Args) -> SyscallResult {
    Ok(pit::uptime_ms() as i32)
}
