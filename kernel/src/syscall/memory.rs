//! `sys_malloc`/`sys_free`/`sys_realloc`: syscall-visible handles onto the
//! kernel heap.

use super::{Args, SyscallResult};
use crate::mm::heap;

/// `a0 == 0` is a legal request and yields a NULL (0) return, not an error.
pub fn sys_malloc(args: Args) -> SyscallResult {
    match heap::malloc(args.a0 as usize)? {
        Some(ptr) => Ok(ptr.as_ptr() as i32),
        None => Ok(0),
    }
}

pub fn sys_free(args: Args) -> SyscallResult {
    if args.a0 == 0 {
        return Ok(0);
    }
    // SAFETY: the caller is trusted to pass back a pointer this syscall
    // gate itself handed out via `sys_malloc`, per the syscall contract.
    unsafe { heap::free(args.a0 as *mut u8)? };
    Ok(0)
}

/// `a0` = pointer (0 behaves like `sys_malloc`), `a1` = new size (0
/// behaves like `sys_free` and returns 0/NULL).
pub fn sys_realloc(args: Args) -> SyscallResult {
    // SAFETY: the caller is trusted to pass back a pointer this syscall
    // gate itself handed out via `sys_malloc`/`sys_realloc`, per the
    // syscall contract; null is explicitly permitted.
    let result = unsafe { heap::realloc(args.a0 as *mut u8, args.a1 as usize)? };
    Ok(result.map(|p| p.as_ptr() as i32).unwrap_or(0))
}
