//! `sys_open`/`sys_close`/`sys_read`/`sys_write`/`sys_chdir`/`sys_getcwd`/
//! `sys_mkdir`/`sys_rmdir`/`sys_unlink`/`sys_stat`.
//!
//! Descriptor-less by design: a "file descriptor" is either one of the
//! three POSIX-standard low numbers (0 stdin, 1 stdout, 2 stderr, routed
//! to the keyboard/VGA console) or, for a real file, the file's own
//! table id as returned by `sys_open` — there is no separate open-file
//! table to size or exhaust.

use alloc::string::String;

use super::{Args, SyscallResult};
use crate::drivers::{keyboard, vga};
use crate::error::{FsError, SyscallError};
use crate::fs::{self, EntryKind};
use crate::sched;

const FD_STDIN: u32 = 0;
const FD_STDOUT: u32 = 1;
const FD_STDERR: u32 = 2;

const O_CREAT: u32 = 1 << 0;

/// # Safety
/// `ptr` must point to at least `len` readable bytes.
unsafe fn read_user_str(ptr: u32, len: u32) -> Result<String, SyscallError> {
    if ptr == 0 {
        return Err(SyscallError::NullPointer);
    }
    // SAFETY: delegated to the caller's contract above; syscalls in this
    // kernel are issued by trusted in-kernel tasks sharing one address
    // space, not an untrusted ring-3 process.
    let bytes = unsafe { core::slice::from_raw_parts(ptr as *const u8, len as usize) };
    core::str::from_utf8(bytes).map(String::from).map_err(|_| SyscallError::BadArgument)
}

/// # Safety
/// `ptr` must point to at least `len` writable bytes.
unsafe fn write_user_buf(ptr: u32, len: u32, data: &[u8]) -> Result<u32, SyscallError> {
    if ptr == 0 {
        return Err(SyscallError::NullPointer);
    }
    let n = data.len().min(len as usize);
    // SAFETY: delegated to the caller's contract above.
    unsafe { core::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, n) };
    Ok(n as u32)
}

pub fn sys_open(args: Args) -> SyscallResult {
    // SAFETY: (path_ptr, path_len) come from a trusted in-kernel caller.
    let path = unsafe { read_user_str(args.a0, args.a1) }?;
    let flags = args.a2;
    match fs::resolve(sched::cwd(), &path) {
        Ok((EntryKind::File, id)) => Ok(id as i32),
        Ok((EntryKind::Directory, _)) => Err(FsError::IsADirectory.into()),
        Err(FsError::NotFound) if flags & O_CREAT != 0 => {
            let id = fs::create_file(sched::cwd(), &path)?;
            Ok(id as i32)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn sys_close(_args: Args) -> SyscallResult {
    Ok(0)
}

pub fn sys_read(args: Args) -> SyscallResult {
    let (fd, buf_ptr, count) = (args.a0, args.a1, args.a2);
    if fd == FD_STDIN {
        let mut written = 0u32;
        while written < count {
            let Some(byte) = keyboard::read_key() else { break };
            // SAFETY: one in-bounds byte at a time, `buf_ptr` is trusted
            // per the syscall gate's contract.
            unsafe { write_user_buf(buf_ptr + written, 1, &[byte])? };
            written += 1;
        }
        return Ok(written as i32);
    }
    let data = fs::read(fd)?;
    // SAFETY: `buf_ptr` is trusted per the syscall gate's contract.
    let n = unsafe { write_user_buf(buf_ptr, count, &data)? };
    Ok(n as i32)
}

pub fn sys_write(args: Args) -> SyscallResult {
    let (fd, buf_ptr, count) = (args.a0, args.a1, args.a2);
    if buf_ptr == 0 {
        return Err(SyscallError::NullPointer.into());
    }
    // SAFETY: `buf_ptr` is trusted per the syscall gate's contract, and
    // is read-only here.
    let bytes = unsafe { core::slice::from_raw_parts(buf_ptr as *const u8, count as usize) };
    if fd == FD_STDOUT || fd == FD_STDERR {
        let text = core::str::from_utf8(bytes).unwrap_or("\u{FFFD}");
        vga::_print(format_args!("{text}"));
        return Ok(bytes.len() as i32);
    }
    fs::write(fd, bytes)?;
    Ok(bytes.len() as i32)
}

pub fn sys_chdir(args: Args) -> SyscallResult {
    // SAFETY: (path_ptr, path_len) come from a trusted in-kernel caller.
    let path = unsafe { read_user_str(args.a0, args.a1) }?;
    match fs::resolve(sched::cwd(), &path)? {
        (EntryKind::Directory, id) => {
            sched::set_cwd(id);
            Ok(0)
        }
        (EntryKind::File, _) => Err(FsError::NotADirectory.into()),
    }
}

pub fn sys_getcwd(args: Args) -> SyscallResult {
    let path = fs::path_of(sched::cwd());
    // SAFETY: `buf_ptr` is trusted per the syscall gate's contract.
    let n = unsafe { write_user_buf(args.a0, args.a1, path.as_bytes())? };
    Ok(n as i32)
}

pub fn sys_mkdir(args: Args) -> SyscallResult {
    // SAFETY: (path_ptr, path_len) come from a trusted in-kernel caller.
    let path = unsafe { read_user_str(args.a0, args.a1) }?;
    fs::mkdir(sched::cwd(), &path)?;
    Ok(0)
}

pub fn sys_rmdir(args: Args) -> SyscallResult {
    // SAFETY: (path_ptr, path_len) come from a trusted in-kernel caller.
    let path = unsafe { read_user_str(args.a0, args.a1) }?;
    if let (EntryKind::File, _) = fs::resolve(sched::cwd(), &path)? {
        return Err(FsError::NotADirectory.into());
    }
    fs::delete(sched::cwd(), &path)?;
    Ok(0)
}

pub fn sys_unlink(args: Args) -> SyscallResult {
    // SAFETY: (path_ptr, path_len) come from a trusted in-kernel caller.
    let path = unsafe { read_user_str(args.a0, args.a1) }?;
    if let (EntryKind::Directory, _) = fs::resolve(sched::cwd(), &path)? {
        return Err(FsError::IsADirectory.into());
    }
    fs::delete(sched::cwd(), &path)?;
    Ok(0)
}

#[repr(C)]
struct StatBuf {
    size: u32,
    is_dir: u32,
    attrs: u32,
}

pub fn sys_stat(args: Args) -> SyscallResult {
    // SAFETY: (path_ptr, path_len) come from a trusted in-kernel caller.
    let path = unsafe { read_user_str(args.a0, args.a1) }?;
    let stat = fs::stat(sched::cwd(), &path)?;
    let out = StatBuf {
        size: stat.size as u32,
        is_dir: matches!(stat.kind, EntryKind::Directory) as u32,
        attrs: stat.attrs.bits() as u32,
    };
    if args.a2 != 0 {
        // SAFETY: `stat_buf_ptr` is trusted per the syscall gate's
        // contract, and is large enough for one `StatBuf`.
        unsafe { (args.a2 as *mut StatBuf).write(out) };
    }
    Ok(0)
}
