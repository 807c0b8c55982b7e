//! Process table and preemptive round-robin scheduler.
//!
//! The scheduler itself is reached only through `int 0x80`'s timer IRQ
//! and the register-level context switch, so it only exists on the real
//! target; the process-control-block shape in [`process`] stays plain
//! data and compiles everywhere so host tests can exercise it directly.

pub mod process;
#[cfg(target_arch = "x86")]
pub mod scheduler;

pub use process::{Pcb, Priority, ProcessState};

#[cfg(target_arch = "x86")]
pub use scheduler::{
    current_pid, cwd, errno, exit, set_cwd, set_errno, sleep_ms, spawn, stats, tick, yield_now, SchedulerStats,
};

/// # Safety
/// See [`scheduler::init`].
#[cfg(target_arch = "x86")]
pub unsafe fn init() {
    unsafe { scheduler::init() };
}

#[cfg(not(target_arch = "x86"))]
/// # Safety
/// No-op off-target.
pub unsafe fn init() {}

/// Snapshot a process table row for `ps`/`stat`-style reporting, without
/// handing out a reference the scheduler might mutate concurrently.
pub struct ProcessSnapshot {
    pub pid: u32,
    pub parent_pid: u32,
    pub name: alloc::string::String,
    pub state: ProcessState,
    pub priority: Priority,
    pub time_used_ms: u64,
}

#[cfg(target_arch = "x86")]
pub fn snapshot_all() -> alloc::vec::Vec<ProcessSnapshot> {
    scheduler::with_table(|table| {
        table
            .iter()
            .filter(|p| p.state != ProcessState::Unused)
            .map(|p| ProcessSnapshot {
                pid: p.pid,
                parent_pid: p.parent_pid,
                name: alloc::string::String::from(p.name()),
                state: p.state,
                priority: p.priority,
                time_used_ms: p.time_used_ms,
            })
            .collect()
    })
}

#[cfg(not(target_arch = "x86"))]
pub fn snapshot_all() -> alloc::vec::Vec<ProcessSnapshot> {
    alloc::vec::Vec::new()
}
