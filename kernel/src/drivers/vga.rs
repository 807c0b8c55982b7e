//! 80x25 VGA text-mode console, driven directly through the `0xB8000`
//! framebuffer (not a PMM-managed page — §6 excludes it from the managed
//! physical window). External-collaborator plumbing: the correctness
//! contract here is only "never panics, never writes outside the grid."

use core::fmt;

use spin::Mutex;

const VGA_WIDTH: usize = 80;
const VGA_HEIGHT: usize = 25;
const VGA_BUFFER_ADDR: usize = 0xB8000;

#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(dead_code)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

fn attribute(fg: Color, bg: Color) -> u8 {
    (bg as u8) << 4 | (fg as u8)
}

struct Console {
    row: usize,
    col: usize,
    attr: u8,
}

impl Console {
    const fn new() -> Self {
        Console { row: 0, col: 0, attr: 0x0F } // white on black
    }

    fn buffer(&mut self) -> &'static mut [[u16; VGA_WIDTH]; VGA_HEIGHT] {
        // SAFETY: 0xB8000 is the fixed, architecturally defined location of
        // the VGA text-mode framebuffer whenever text mode is active; this
        // console is the only writer and is always accessed through the
        // `CONSOLE` mutex, so there is no concurrent access.
        unsafe { &mut *(VGA_BUFFER_ADDR as *mut [[u16; VGA_WIDTH]; VGA_HEIGHT]) }
    }

    fn set_color(&mut self, fg: Color, bg: Color) {
        self.attr = attribute(fg, bg);
    }

    fn clear(&mut self) {
        let blank = (self.attr as u16) << 8 | b' ' as u16;
        let buf = self.buffer();
        for row in buf.iter_mut() {
            for cell in row.iter_mut() {
                *cell = blank;
            }
        }
        self.row = 0;
        self.col = 0;
    }

    fn scroll(&mut self) {
        let blank = (self.attr as u16) << 8 | b' ' as u16;
        let buf = self.buffer();
        for row in 1..VGA_HEIGHT {
            buf[row - 1] = buf[row];
        }
        for cell in buf[VGA_HEIGHT - 1].iter_mut() {
            *cell = blank;
        }
        self.row = VGA_HEIGHT - 1;
    }

    fn newline(&mut self) {
        self.col = 0;
        if self.row + 1 >= VGA_HEIGHT {
            self.scroll();
        } else {
            self.row += 1;
        }
    }

    fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.newline(),
            b'\r' => self.col = 0,
            0x08 => {
                // backspace
                if self.col > 0 {
                    self.col -= 1;
                    let attr = self.attr;
                    self.buffer()[self.row][self.col] = (attr as u16) << 8 | b' ' as u16;
                }
            }
            byte => {
                if self.col >= VGA_WIDTH {
                    self.newline();
                }
                let (row, col, attr) = (self.row, self.col, self.attr);
                self.buffer()[row][col] = (attr as u16) << 8 | byte as u16;
                self.col += 1;
            }
        }
    }

    fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            match byte {
                0x20..=0x7E | b'\n' | b'\r' | 0x08 => self.write_byte(byte),
                _ => self.write_byte(0xFE), // unprintable placeholder glyph
            }
        }
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        Console::write_str(self, s);
        Ok(())
    }
}

static CONSOLE: Mutex<Console> = Mutex::new(Console::new());

/// Reset the console to a blank white-on-black screen.
pub fn clear_screen() {
    crate::arch::without_interrupts(|| CONSOLE.lock().clear());
}

/// Change the foreground/background colors used by subsequent writes.
pub fn set_color(fg: Color, bg: Color) {
    crate::arch::without_interrupts(|| CONSOLE.lock().set_color(fg, bg));
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    crate::arch::without_interrupts(|| {
        CONSOLE.lock().write_fmt(args).expect("console write_fmt failed");
    });
}
