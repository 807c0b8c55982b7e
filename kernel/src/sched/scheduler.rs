//! Preemptive round-robin scheduler driven by the PIT tick, grounded in
//! the original `schedule()`/`task_sleep()` design but with the sleep
//! path re-architected: a sleeping task is `Blocked` and removed from the
//! ready queue entirely rather than busy-waiting in a `hlt` loop, and
//! `tick()` wakes it by comparing `wake_tick` against the tick counter
//! instead of polling every task every millisecond.

use alloc::collections::VecDeque;

use spin::Mutex;

use crate::arch::x86::context::{build_initial_stack, switch_context};
use crate::arch::x86::isr::InterruptFrame;
use crate::arch::x86::pit;
use crate::config::{MAX_PROCESSES, PROCESS_STACK_SIZE};
use crate::error::SchedError;
use crate::mm::{heap, new_address_space};

use super::process::{Pcb, Priority, ProcessState};

struct Scheduler {
    table: [Pcb; MAX_PROCESSES],
    ready: VecDeque<usize>,
    current: Option<usize>,
    next_pid: u32,
    /// Total completed context switches, voluntary yields, and preemptions
    /// (slice-expiry reschedules), per §8's `context_switches >= yields +
    /// preemptions` invariant.
    context_switches: u64,
    yields: u64,
    preemptions: u64,
}

/// Snapshot of the counters in [`Scheduler`], readable without holding the
/// scheduler lock across a caller's own bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    pub context_switches: u64,
    pub yields: u64,
    pub preemptions: u64,
}

pub fn stats() -> SchedulerStats {
    let guard = SCHEDULER.lock();
    let sched = guard.as_ref().expect("scheduler not initialized");
    SchedulerStats {
        context_switches: sched.context_switches,
        yields: sched.yields,
        preemptions: sched.preemptions,
    }
}

// SAFETY: only ever touched behind the `SCHEDULER` mutex, with interrupts
// disabled for the duration of any access from the tick handler.
unsafe impl Send for Scheduler {}

static SCHEDULER: Mutex<Option<Scheduler>> = Mutex::new(None);

/// # Safety
/// Must run once at boot, after `mm::init()` and after `arch::init()`
/// (the PIT must exist so `schedule_timer_handler` has a vector to hang
/// off), before `sti()`.
pub unsafe fn init() {
    let table = core::array::from_fn(|_| Pcb::empty());
    *SCHEDULER.lock() = Some(Scheduler {
        table,
        ready: VecDeque::new(),
        current: None,
        next_pid: 1,
        context_switches: 0,
        yields: 0,
        preemptions: 0,
    });
    crate::arch::x86::isr::set_irq_handler(0, timer_handler);
    log::info!("sched: round-robin scheduler online ({TICK_HZ} Hz tick)", TICK_HZ = pit::TICK_HZ);
}

fn timer_handler(_frame: &mut InterruptFrame) {
    pit::on_tick();
    tick();
}

/// Spawn a new kernel-mode task. Returns its pid.
pub fn spawn(name: &str, entry: extern "C" fn() -> !, priority: Priority) -> Result<u32, SchedError> {
    let stack = heap::malloc(PROCESS_STACK_SIZE)
        .map_err(|_| SchedError::ProcessTableFull)?
        .ok_or(SchedError::ProcessTableFull)?;
    let stack_base = stack.as_ptr() as u32;
    let stack_top = stack_base + PROCESS_STACK_SIZE as u32;
    // SAFETY: `stack_top` is the top of the allocation above, freshly
    // carved out and at least `PROCESS_STACK_SIZE` (well over 32) bytes.
    let esp = unsafe { build_initial_stack(stack_top, entry) };

    let address_space = new_address_space().map_err(|_| SchedError::ProcessTableFull)?;

    let mut guard = SCHEDULER.lock();
    let sched = guard.as_mut().expect("scheduler not initialized");
    let slot = sched
        .table
        .iter()
        .position(|p| p.state == ProcessState::Unused)
        .ok_or(SchedError::ProcessTableFull)?;

    let pid = sched.next_pid;
    sched.next_pid += 1;
    let created_tick = pit::ticks();

    let pcb = &mut sched.table[slot];
    *pcb = Pcb::empty();
    pcb.pid = pid;
    pcb.parent_pid = sched.current.map(|i| sched.table[i].pid).unwrap_or(0);
    pcb.set_name(name);
    pcb.state = ProcessState::Ready;
    pcb.priority = priority;
    pcb.esp = esp;
    pcb.address_space = address_space;
    pcb.stack_base = stack_base;
    pcb.kernel_stack_top = stack_top;
    pcb.slice_remaining_ms = priority.time_slice_ms();
    pcb.created_tick = created_tick;

    sched.ready.push_back(slot);
    Ok(pid)
}

pub fn current_pid() -> Option<u32> {
    let guard = SCHEDULER.lock();
    let sched = guard.as_ref()?;
    sched.current.map(|i| sched.table[i].pid)
}

/// Run `f` over the live process table under the scheduler lock. Used by
/// `ps`/`stat`-style reporting that needs a consistent snapshot.
pub fn with_table<R>(f: impl FnOnce(&[Pcb; MAX_PROCESSES]) -> R) -> R {
    let guard = SCHEDULER.lock();
    let sched = guard.as_ref().expect("scheduler not initialized");
    f(&sched.table)
}

/// Directory id of the current task's working directory (`fs::ROOT_DIR_ID`
/// if no task is running yet, e.g. during early boot).
pub fn cwd() -> u32 {
    let guard = SCHEDULER.lock();
    let sched = guard.as_ref().expect("scheduler not initialized");
    sched.current.map(|i| sched.table[i].cwd).unwrap_or(crate::fs::ROOT_DIR_ID)
}

pub fn set_cwd(dir_id: u32) {
    let mut guard = SCHEDULER.lock();
    let sched = guard.as_mut().expect("scheduler not initialized");
    if let Some(cur) = sched.current {
        sched.table[cur].cwd = dir_id;
    }
}

/// Errno left behind by the current task's most recent failing syscall
/// (0 outside any task, e.g. during early boot).
pub fn errno() -> i32 {
    let guard = SCHEDULER.lock();
    let sched = guard.as_ref().expect("scheduler not initialized");
    sched.current.map(|i| sched.table[i].errno).unwrap_or(0)
}

/// Record the errno for the current task's most recent failing syscall.
/// A no-op outside any task (e.g. a syscall entered during early boot).
pub fn set_errno(value: i32) {
    let mut guard = SCHEDULER.lock();
    let sched = guard.as_mut().expect("scheduler not initialized");
    if let Some(cur) = sched.current {
        sched.table[cur].errno = value;
    }
}

/// Called on every PIT tick. Wakes due sleepers, then counts down the
/// running task's slice and reschedules once it expires.
pub fn tick() {
    let now = pit::ticks();
    let mut guard = SCHEDULER.lock();
    let Some(sched) = guard.as_mut() else { return };

    for i in 0..sched.table.len() {
        if sched.table[i].state == ProcessState::Blocked && sched.table[i].wake_tick <= now {
            sched.table[i].state = ProcessState::Ready;
            sched.ready.push_back(i);
        }
    }

    let Some(cur) = sched.current else { return };
    sched.table[cur].time_used_ms += 1;
    if sched.table[cur].slice_remaining_ms == 0 {
        return;
    }
    sched.table[cur].slice_remaining_ms -= 1;
    if sched.table[cur].slice_remaining_ms > 0 {
        return;
    }
    sched.preemptions += 1;
    drop(guard);
    reschedule();
}

/// Voluntarily give up the remainder of the current slice.
pub fn yield_now() {
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not initialized");
        sched.yields += 1;
    }
    reschedule();
}

/// Block the current task until `pit::ticks() >= pit::ticks() + ms`.
pub fn sleep_ms(ms: u64) {
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not initialized");
        if let Some(cur) = sched.current {
            sched.table[cur].state = ProcessState::Blocked;
            sched.table[cur].wake_tick = pit::ticks() + ms;
        }
    }
    reschedule();
}

/// Terminate the current task and switch away from it; never returns.
pub fn exit(code: i32) -> ! {
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not initialized");
        if let Some(cur) = sched.current {
            sched.table[cur].state = ProcessState::Terminated;
            sched.table[cur].exit_code = code;
            let stack_base = sched.table[cur].stack_base;
            // SAFETY: `stack_base` is this task's own heap-allocated
            // stack, never touched again after this point since it is
            // about to switch away forever.
            let _ = unsafe { heap::free(stack_base as *mut u8) };
        }
    }
    reschedule();
    unreachable!("exited task was rescheduled");
}

/// Pick the next `Ready` task and perform the actual context switch.
/// A no-op if the ready queue is empty (the current task simply keeps
/// running, or the idle task spins if nothing was ever running).
fn reschedule() {
    let (old_esp_slot, new_esp, switch_needed): (*mut u32, u32, bool);
    {
        let mut guard = SCHEDULER.lock();
        let sched = guard.as_mut().expect("scheduler not initialized");

        let next = loop {
            match sched.ready.pop_front() {
                Some(i) if sched.table[i].state == ProcessState::Ready => break Some(i),
                Some(_) => continue,
                None => break None,
            }
        };
        let Some(next) = next else { return };

        let prev = sched.current;
        if let Some(prev_idx) = prev {
            if sched.table[prev_idx].state == ProcessState::Running {
                sched.table[prev_idx].state = ProcessState::Ready;
                sched.ready.push_back(prev_idx);
            }
        }

        sched.table[next].state = ProcessState::Running;
        sched.table[next].slice_remaining_ms = sched.table[next].priority.time_slice_ms();
        sched.current = Some(next);

        crate::mm::vmm::switch_to(sched.table[next].address_space);

        new_esp = sched.table[next].esp;
        switch_needed = prev != Some(next);
        if switch_needed {
            sched.context_switches += 1;
        }
        old_esp_slot = match prev {
            Some(p) => &mut sched.table[p].esp as *mut u32,
            None => core::ptr::null_mut(),
        };
    }

    if switch_needed && !old_esp_slot.is_null() {
        // SAFETY: `old_esp_slot` points at the outgoing task's own PCB
        // slot, which outlives this call; `new_esp` was built by
        // `build_initial_stack` or saved by a prior `switch_context`.
        unsafe { switch_context(old_esp_slot, new_esp) };
    }
}
