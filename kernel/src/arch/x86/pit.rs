//! 8254 Programmable Interval Timer, channel 0, driving a 1 kHz tick.

use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use super::port::outb;
use crate::config::MAX_PIT_CALLBACKS;

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;
const PIT_BASE_FREQUENCY: u32 = 1_193_182;

/// Ticks per second the scheduler and `sleep()` deadlines are expressed in.
pub const TICK_HZ: u32 = 1000;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Callbacks registered via [`register_callback`], invoked in registration
/// order from `on_tick`. IRQ handlers must not block, so this list is
/// fixed-size and never grows past `MAX_PIT_CALLBACKS`.
static CALLBACKS: Mutex<[Option<fn()>; MAX_PIT_CALLBACKS]> = Mutex::new([None; MAX_PIT_CALLBACKS]);

/// Program channel 0 for a 1 kHz square wave and unmask its IRQ line.
///
/// # Safety
/// Must run once at boot, after the PIC has been remapped.
pub unsafe fn init() {
    let divisor = (PIT_BASE_FREQUENCY / TICK_HZ) as u16;
    // SAFETY: programming our own channel with a mode-3 square wave.
    unsafe {
        outb(PIT_COMMAND, 0b0011_0110); // channel 0, lo/hi byte, mode 3, binary
        outb(PIT_CHANNEL0, (divisor & 0xFF) as u8);
        outb(PIT_CHANNEL0, ((divisor >> 8) & 0xFF) as u8);
    }
    super::pic::unmask(0);
}

/// Called from the IRQ0 handler on every tick. Advances the tick counter,
/// then runs every registered callback in registration order.
pub fn on_tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
    let callbacks = CALLBACKS.lock();
    for cb in callbacks.iter().flatten() {
        cb();
    }
}

/// Register a callback to run on every tick, in registration order. No-op
/// (and logs a warning) if the callback table is already full.
pub fn register_callback(cb: fn()) {
    let mut callbacks = CALLBACKS.lock();
    match callbacks.iter_mut().find(|slot| slot.is_none()) {
        Some(slot) => *slot = Some(cb),
        None => log::warn!("pit: callback table full, dropping registration"),
    }
}

/// Unregister a previously registered callback. No-op if not found.
pub fn unregister_callback(cb: fn()) {
    let mut callbacks = CALLBACKS.lock();
    for slot in callbacks.iter_mut() {
        if *slot == Some(cb) {
            *slot = None;
            break;
        }
    }
}

/// Ticks elapsed since boot (1 tick == 1 ms at the default `TICK_HZ`).
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Milliseconds elapsed since boot.
pub fn uptime_ms() -> u64 {
    ticks() * 1000 / TICK_HZ as u64
}

/// Days/hours/minutes/seconds breakdown of uptime, recomputed from the
/// tick counter on demand (no separately maintained running total to keep
/// in sync).
pub struct Uptime {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

pub fn uptime() -> Uptime {
    let total_seconds = uptime_ms() / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = (total_seconds / 3600) % 24;
    let days = total_seconds / 86400;
    Uptime { days, hours, minutes, seconds }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_tick_is_monotonic() {
        let before = ticks();
        on_tick();
        on_tick();
        assert_eq!(ticks(), before + 2);
    }
}
