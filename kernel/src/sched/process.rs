//! Process control block: everything the scheduler needs to suspend and
//! later resume a task, plus the bookkeeping a shell's `ps` command wants
//! to print.

use crate::config::MAX_PROCESS_NAME;
use crate::mm::vmm::AddressSpace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Unused,
    Ready,
    Running,
    Blocked,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn time_slice_ms(self) -> u64 {
        use crate::config::{TIME_SLICE_HIGH_MS, TIME_SLICE_LOW_MS, TIME_SLICE_NORMAL_MS};
        match self {
            Priority::High => TIME_SLICE_HIGH_MS,
            Priority::Normal => TIME_SLICE_NORMAL_MS,
            Priority::Low => TIME_SLICE_LOW_MS,
        }
    }
}

pub struct Pcb {
    pub pid: u32,
    pub parent_pid: u32,
    name: [u8; MAX_PROCESS_NAME],
    name_len: u8,
    pub state: ProcessState,
    pub priority: Priority,
    /// Saved stack pointer; valid only while `state != Running`.
    pub esp: u32,
    pub address_space: AddressSpace,
    /// Base address returned by the heap allocation backing this task's
    /// kernel stack; freed on exit.
    pub stack_base: u32,
    pub kernel_stack_top: u32,
    pub time_used_ms: u64,
    pub slice_remaining_ms: u64,
    /// Directory id of the current working directory (`fs::ROOT_DIR_ID`
    /// until `chdir`).
    pub cwd: u32,
    pub exit_code: i32,
    pub created_tick: u64,
    /// Absolute tick at which a `Blocked` process should become `Ready`;
    /// meaningless for any other state.
    pub wake_tick: u64,
    /// Errno left behind by this task's most recent failing syscall,
    /// readable back via `sys_geterrno` (§4.6's "thread-local errno byte").
    pub errno: i32,
}

impl Pcb {
    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("?")
    }

    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(MAX_PROCESS_NAME);
        self.name[..len].copy_from_slice(&bytes[..len]);
        self.name_len = len as u8;
    }

    pub(super) fn empty() -> Self {
        Pcb {
            pid: 0,
            parent_pid: 0,
            name: [0; MAX_PROCESS_NAME],
            name_len: 0,
            state: ProcessState::Unused,
            priority: Priority::Normal,
            esp: 0,
            address_space: AddressSpace(0),
            stack_base: 0,
            kernel_stack_top: 0,
            time_used_ms: 0,
            slice_remaining_ms: 0,
            cwd: 0,
            exit_code: 0,
            created_tick: 0,
            wake_tick: 0,
            errno: 0,
        }
    }
}
