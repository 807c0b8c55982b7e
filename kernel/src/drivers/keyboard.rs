//! PS/2 keyboard driver (IRQ1): scancode decode and a ring-buffered ASCII
//! stream the shell reads from. The scancode→ASCII table's *contents* are
//! an external-collaborator concern (§4.9); the ring-buffer discipline and
//! modifier state machine are the tested surface.

use core::sync::atomic::{AtomicU8, Ordering};

use spin::Mutex;

use crate::config::RING_BUFFER_SIZE;

pub const MOD_SHIFT: u8 = 0x01;
pub const MOD_CTRL: u8 = 0x02;
pub const MOD_ALT: u8 = 0x04;
pub const MOD_CAPSLOCK: u8 = 0x08;

static MODIFIER_STATE: AtomicU8 = AtomicU8::new(0);

pub fn modifiers() -> u8 {
    MODIFIER_STATE.load(Ordering::Relaxed)
}

struct KeyBuffer {
    buf: [u8; RING_BUFFER_SIZE],
    head: usize,
    tail: usize,
}

impl KeyBuffer {
    const fn new() -> Self {
        KeyBuffer { buf: [0; RING_BUFFER_SIZE], head: 0, tail: 0 }
    }

    fn push(&mut self, byte: u8) {
        let next = (self.head + 1) % RING_BUFFER_SIZE;
        if next == self.tail {
            return; // full, drop newest key
        }
        self.buf[self.head] = byte;
        self.head = next;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.head == self.tail {
            return None;
        }
        let byte = self.buf[self.tail];
        self.tail = (self.tail + 1) % RING_BUFFER_SIZE;
        Some(byte)
    }
}

static KEY_BUFFER: Mutex<KeyBuffer> = Mutex::new(KeyBuffer::new());

/// Read one decoded ASCII byte, if any is buffered (non-blocking).
pub fn read_key() -> Option<u8> {
    KEY_BUFFER.lock().pop()
}

const SET1_BREAK_BIT: u8 = 0x80;

const LSHIFT: u8 = 0x2A;
const RSHIFT: u8 = 0x36;
const LCTRL: u8 = 0x1D;
const LALT: u8 = 0x38;
const CAPSLOCK: u8 = 0x3A;

/// US QWERTY Scancode Set 1, unshifted, make codes 0x01-0x39.
const UNSHIFTED: [u8; 0x3A] = [
    0, 27, b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'0', b'-', b'=', 0x08, b'\t',
    b'q', b'w', b'e', b'r', b't', b'y', b'u', b'i', b'o', b'p', b'[', b']', b'\n', 0, b'a', b's',
    b'd', b'f', b'g', b'h', b'j', b'k', b'l', b';', b'\'', b'`', 0, b'\\', b'z', b'x', b'c', b'v',
    b'b', b'n', b'm', b',', b'.', b'/', 0, b'*', 0, b' ',
];

/// Shifted variant of the same table.
const SHIFTED: [u8; 0x3A] = [
    0, 27, b'!', b'@', b'#', b'$', b'%', b'^', b'&', b'*', b'(', b')', b'_', b'+', 0x08, b'\t',
    b'Q', b'W', b'E', b'R', b'T', b'Y', b'U', b'I', b'O', b'P', b'{', b'}', b'\n', 0, b'A', b'S',
    b'D', b'F', b'G', b'H', b'J', b'K', b'L', b':', b'"', b'~', 0, b'|', b'Z', b'X', b'C', b'V',
    b'B', b'N', b'M', b'<', b'>', b'?', 0, b'*', 0, b' ',
];

/// Decode a single scancode byte into an ASCII byte, tracking and
/// consulting modifier state. Break codes update modifier state and
/// otherwise decode to `None`.
pub fn decode(scancode: u8, modifiers: &mut u8) -> Option<u8> {
    let is_break = scancode & SET1_BREAK_BIT != 0;
    let code = scancode & !SET1_BREAK_BIT;

    match code {
        LSHIFT | RSHIFT => {
            set_bit(modifiers, MOD_SHIFT, !is_break);
            return None;
        }
        LCTRL => {
            set_bit(modifiers, MOD_CTRL, !is_break);
            return None;
        }
        LALT => {
            set_bit(modifiers, MOD_ALT, !is_break);
            return None;
        }
        CAPSLOCK if !is_break => {
            *modifiers ^= MOD_CAPSLOCK;
            return None;
        }
        _ => {}
    }

    if is_break {
        return None;
    }

    let idx = code as usize;
    if idx >= UNSHIFTED.len() {
        return None;
    }
    let shift_active = (*modifiers & MOD_SHIFT != 0) ^ (*modifiers & MOD_CAPSLOCK != 0);
    let byte = if shift_active { SHIFTED[idx] } else { UNSHIFTED[idx] };
    if byte == 0 {
        None
    } else {
        Some(byte)
    }
}

fn set_bit(modifiers: &mut u8, bit: u8, on: bool) {
    if on {
        *modifiers |= bit;
    } else {
        *modifiers &= !bit;
    }
}

/// IRQ1 handler: read the scancode port, decode it, and push onto the
/// ring buffer. Must not block or allocate.
#[cfg(target_arch = "x86")]
pub fn irq_handler(_frame: &mut crate::arch::x86::InterruptFrame) {
    use crate::arch::x86::port::inb;
    // SAFETY: reading the keyboard controller's own data port in response
    // to its own interrupt.
    let scancode = unsafe { inb(0x60) };
    let mut mods = MODIFIER_STATE.load(Ordering::Relaxed);
    if let Some(byte) = decode(scancode, &mut mods) {
        KEY_BUFFER.lock().push(byte);
    }
    MODIFIER_STATE.store(mods, Ordering::Relaxed);
}

/// # Safety
/// Must run once at boot, after the IDT/PIC are initialized.
#[cfg(target_arch = "x86")]
pub unsafe fn init() {
    crate::arch::x86::isr::set_irq_handler(1, irq_handler);
    crate::arch::x86::pic::unmask(1);
}

#[cfg(not(target_arch = "x86"))]
/// # Safety
/// No-op off-target.
pub unsafe fn init() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_lowercase_letter() {
        let mut mods = 0u8;
        assert_eq!(decode(0x1E, &mut mods), Some(b'a')); // 'a' make code
    }

    #[test]
    fn shift_make_then_letter_is_uppercase() {
        let mut mods = 0u8;
        assert_eq!(decode(LSHIFT, &mut mods), None);
        assert_eq!(mods & MOD_SHIFT, MOD_SHIFT);
        assert_eq!(decode(0x1E, &mut mods), Some(b'A'));
    }

    #[test]
    fn shift_break_clears_modifier() {
        let mut mods = 0u8;
        decode(LSHIFT, &mut mods);
        decode(LSHIFT | SET1_BREAK_BIT, &mut mods);
        assert_eq!(mods & MOD_SHIFT, 0);
    }

    #[test]
    fn break_code_for_normal_key_decodes_to_none() {
        let mut mods = 0u8;
        assert_eq!(decode(0x1E | SET1_BREAK_BIT, &mut mods), None);
    }

    #[test]
    fn key_buffer_full_drops_newest() {
        let mut kb = KeyBuffer::new();
        for i in 0..RING_BUFFER_SIZE {
            kb.push(i as u8);
        }
        kb.push(0xAA);
        let mut count = 0;
        while kb.pop().is_some() {
            count += 1;
        }
        assert_eq!(count, RING_BUFFER_SIZE - 1);
    }

    #[test]
    fn capslock_toggles_without_shift() {
        let mut mods = 0u8;
        decode(CAPSLOCK, &mut mods);
        assert_eq!(decode(0x1E, &mut mods), Some(b'A'));
        decode(CAPSLOCK, &mut mods);
        assert_eq!(decode(0x1E, &mut mods), Some(b'a'));
    }
}
