//! 16550 UART on COM1, used for the `log` backend and the kernel debug
//! console. Polled transmit; receive is interrupt-driven (IRQ4) into a
//! ring buffer the same shape as the keyboard driver's.
//!
//! The ring buffer discipline is architecture-independent and is unit
//! tested on the host target; actually driving the UART only makes sense
//! on real/emulated hardware and lives behind `cfg(target_arch = "x86")`,
//! mirroring how the teacher codebase splits host-testable data structures
//! from bare-metal-only port access.

use core::fmt;

use spin::Mutex;

use crate::config::RING_BUFFER_SIZE;

struct RxRing {
    buf: [u8; RING_BUFFER_SIZE],
    head: usize,
    tail: usize,
}

impl RxRing {
    const fn new() -> Self {
        RxRing { buf: [0; RING_BUFFER_SIZE], head: 0, tail: 0 }
    }

    fn push(&mut self, byte: u8) {
        let next = (self.head + 1) % RING_BUFFER_SIZE;
        if next == self.tail {
            return; // full, drop newest byte
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

static RX_RING: Mutex<RxRing> = Mutex::new(RxRing::new());

/// Non-blocking read of one received byte, if any is buffered.
pub fn read_byte() -> Option<u8> {
    RX_RING.lock().pop()
}

#[cfg(target_arch = "x86")]
mod hw {
    use super::*;
    use crate::arch::x86::port::{inb, outb};

    const COM1: u16 = 0x3F8;

    pub struct SerialPort {
        base: u16,
    }

    impl SerialPort {
        const fn new(base: u16) -> Self {
            SerialPort { base }
        }

        /// # Safety
        /// Must only be called once per physical UART.
        unsafe fn init(&self) {
            unsafe {
                outb(self.base + 1, 0x00);
                outb(self.base + 3, 0x80);
                outb(self.base, 0x03);
                outb(self.base + 1, 0x00);
                outb(self.base + 3, 0x03);
                outb(self.base + 2, 0xC7);
                outb(self.base + 4, 0x0B);
                outb(self.base + 1, 0x01);
            }
        }

        fn transmit_empty(&self) -> bool {
            // SAFETY: reading the UART's own line-status register.
            unsafe { inb(self.base + 5) & 0x20 != 0 }
        }

        fn write_byte(&mut self, byte: u8) {
            while !self.transmit_empty() {
                core::hint::spin_loop();
            }
            // SAFETY: FIFO has room per the poll above.
            unsafe { outb(self.base, byte) };
        }

        fn data_ready(&self) -> bool {
            // SAFETY: reading the UART's own line-status register.
            unsafe { inb(self.base + 5) & 0x01 != 0 }
        }

        fn read_byte_if_ready(&self) -> Option<u8> {
            if self.data_ready() {
                // SAFETY: data-ready was just confirmed.
                Some(unsafe { inb(self.base) })
            } else {
                None
            }
        }
    }

    impl fmt::Write for SerialPort {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            for byte in s.bytes() {
                self.write_byte(byte);
            }
            Ok(())
        }
    }

    pub static SERIAL1: Mutex<SerialPort> = Mutex::new(SerialPort::new(COM1));

    /// # Safety
    /// Must run once at boot.
    pub unsafe fn init() {
        unsafe { SERIAL1.lock().init() };
        crate::arch::x86::isr::set_irq_handler(4, irq_handler);
        crate::arch::x86::pic::unmask(4);
    }

    fn irq_handler(_frame: &mut crate::arch::x86::InterruptFrame) {
        let port = SERIAL1.lock();
        if let Some(byte) = port.read_byte_if_ready() {
            RX_RING.lock().push(byte);
        }
    }

    pub fn _print(args: fmt::Arguments) {
        use fmt::Write;
        crate::arch::without_interrupts(|| {
            SERIAL1.lock().write_fmt(args).expect("serial write_fmt failed");
        });
    }
}

#[cfg(target_arch = "x86")]
pub use hw::{_print, init};

#[cfg(not(target_arch = "x86"))]
pub fn _print(_args: fmt::Arguments) {}
#[cfg(not(target_arch = "x86"))]
/// # Safety
/// No-op off-target; always safe.
pub unsafe fn init() {}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($fmt:expr) => ($crate::serial_print!(concat!($fmt, "\n")));
    ($fmt:expr, $($arg:tt)*) => (
        $crate::serial_print!(concat!($fmt, "\n"), $($arg)*)
    );
}

/// `log::Log` backend that writes leveled records to COM1.
pub struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            serial_println!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Install the serial-backed `log` facade.
pub fn init_logger() {
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(log::LevelFilter::Trace))
        .expect("logger already initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_ring_empty_iff_head_eq_tail() {
        let mut ring = RxRing::new();
        assert_eq!(ring.pop(), None);
        ring.push(b'a');
        assert_eq!(ring.pop(), Some(b'a'));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn rx_ring_drops_newest_when_full() {
        let mut ring = RxRing::new();
        for i in 0..RING_BUFFER_SIZE {
            ring.push(i as u8);
        }
        ring.push(0xFF);
        let mut count = 0;
        while ring.pop().is_some() {
            count += 1;
        }
        assert_eq!(count, RING_BUFFER_SIZE - 1);
    }
}
