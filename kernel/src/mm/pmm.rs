//! Bitmap-based physical frame allocator.
//!
//! One bit per 4 KiB frame over the managed window `[MEMORY_START,
//! MEMORY_START + MEMORY_SIZE)`. The bitmap itself lives at the foot of
//! that window and self-reserves the frames it occupies, exactly as the
//! original allocator does.

use spin::Mutex;

use crate::config::{FRAME_SIZE, MEMORY_SIZE, MEMORY_START};
use crate::error::MmError;

const BITS_PER_WORD: u32 = 32;

struct Pmm {
    bitmap: &'static mut [u32],
    total_frames: u32,
    free_frames: u32,
    first_free: u32,
}

impl Pmm {
    fn word_and_bit(frame: u32) -> (usize, u32) {
        ((frame / BITS_PER_WORD) as usize, frame % BITS_PER_WORD)
    }

    fn is_used(&self, frame: u32) -> bool {
        let (word, bit) = Self::word_and_bit(frame);
        self.bitmap[word] & (1 << bit) != 0
    }

    fn set_used(&mut self, frame: u32) {
        let (word, bit) = Self::word_and_bit(frame);
        self.bitmap[word] |= 1 << bit;
    }

    fn set_free(&mut self, frame: u32) {
        let (word, bit) = Self::word_and_bit(frame);
        self.bitmap[word] &= !(1 << bit);
    }

    fn mark_used(&mut self, frame: u32) {
        if frame < self.total_frames && !self.is_used(frame) {
            self.set_used(frame);
            self.free_frames -= 1;
        }
    }

    fn alloc_frame(&mut self) -> Result<u32, MmError> {
        for frame in self.first_free..self.total_frames {
            if !self.is_used(frame) {
                self.set_used(frame);
                self.free_frames -= 1;
                if frame == self.first_free {
                    self.first_free += 1;
                }
                return Ok(MEMORY_START + frame * FRAME_SIZE);
            }
        }
        for frame in 0..self.first_free {
            if !self.is_used(frame) {
                self.set_used(frame);
                self.free_frames -= 1;
                return Ok(MEMORY_START + frame * FRAME_SIZE);
            }
        }
        Err(MmError::OutOfFrames)
    }

    fn free_frame(&mut self, addr: u32) -> Result<(), MmError> {
        if addr < MEMORY_START {
            return Ok(());
        }
        let frame = (addr - MEMORY_START) / FRAME_SIZE;
        if frame >= self.total_frames {
            return Ok(());
        }
        if self.is_used(frame) {
            self.set_free(frame);
            self.free_frames += 1;
            if frame < self.first_free {
                self.first_free = frame;
            }
        }
        Ok(())
    }
}

// SAFETY: the bitmap slice is carved out of a fixed static array below and
// only ever accessed through the `PMM` mutex.
unsafe impl Send for Pmm {}

const MAX_BITMAP_WORDS: usize = ((MEMORY_SIZE / FRAME_SIZE) / BITS_PER_WORD + 1) as usize;
static mut BITMAP_STORAGE: [u32; MAX_BITMAP_WORDS] = [0; MAX_BITMAP_WORDS];

static PMM: Mutex<Option<Pmm>> = Mutex::new(None);

/// # Safety
/// Must run exactly once at boot, before any `alloc_frame`/`free_frame`.
pub unsafe fn init() {
    let total_frames = MEMORY_SIZE / FRAME_SIZE;
    let bitmap_words = (total_frames + BITS_PER_WORD - 1) / BITS_PER_WORD;
    let bitmap_frames = (bitmap_words * 4 + FRAME_SIZE - 1) / FRAME_SIZE;

    // SAFETY: BITMAP_STORAGE is sized to MAX_BITMAP_WORDS >= bitmap_words
    // for the configured MEMORY_SIZE, and this runs once before any other
    // access to the static.
    let bitmap: &'static mut [u32] =
        unsafe { &mut (*core::ptr::addr_of_mut!(BITMAP_STORAGE))[..bitmap_words as usize] };
    bitmap.fill(0);

    let mut pmm = Pmm { bitmap, total_frames, free_frames: total_frames, first_free: 0 };
    for frame in 0..bitmap_frames {
        pmm.mark_used(frame);
    }

    *PMM.lock() = Some(pmm);
}

/// Allocate one physical frame, returning its base address.
pub fn alloc_frame() -> Result<u32, MmError> {
    PMM.lock().as_mut().expect("pmm not initialized").alloc_frame()
}

/// Release a previously allocated frame. A no-op if `addr` is outside the
/// managed window or was not allocated.
pub fn free_frame(addr: u32) {
    let _ = PMM.lock().as_mut().expect("pmm not initialized").free_frame(addr);
}

/// Reserve a specific frame index (used to carve out the kernel image).
pub fn mark_frame_used(frame: u32) {
    PMM.lock().as_mut().expect("pmm not initialized").mark_used(frame);
}

pub fn free_frames() -> u32 {
    PMM.lock().as_ref().expect("pmm not initialized").free_frames
}

pub fn total_frames() -> u32 {
    PMM.lock().as_ref().expect("pmm not initialized").total_frames
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_pmm(total_frames: u32) -> Pmm {
        static mut TEST_BITMAP: [u32; 64] = [0; 64];
        // SAFETY: test-only static, single-threaded test execution.
        let bitmap = unsafe { &mut (*core::ptr::addr_of_mut!(TEST_BITMAP))[..] };
        bitmap.fill(0);
        Pmm { bitmap, total_frames, free_frames: total_frames, first_free: 0 }
    }

    #[test]
    fn alloc_then_free_restores_free_count() {
        let mut pmm = fresh_pmm(100);
        let before = pmm.free_frames;
        let addr = pmm.alloc_frame().unwrap();
        assert_eq!(pmm.free_frames, before - 1);
        pmm.free_frame(addr).unwrap();
        assert_eq!(pmm.free_frames, before);
    }

    #[test]
    fn double_free_is_a_no_op() {
        let mut pmm = fresh_pmm(10);
        let addr = pmm.alloc_frame().unwrap();
        pmm.free_frame(addr).unwrap();
        let after_first_free = pmm.free_frames;
        pmm.free_frame(addr).unwrap();
        assert_eq!(pmm.free_frames, after_first_free);
    }

    #[test]
    fn exhaustion_returns_out_of_frames() {
        let mut pmm = fresh_pmm(2);
        pmm.alloc_frame().unwrap();
        pmm.alloc_frame().unwrap();
        assert_eq!(pmm.alloc_frame(), Err(MmError::OutOfFrames));
    }

    #[test]
    fn frame_never_double_allocated() {
        let mut pmm = fresh_pmm(4);
        let a = pmm.alloc_frame().unwrap();
        let b = pmm.alloc_frame().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn freeing_below_window_is_a_no_op() {
        let mut pmm = fresh_pmm(4);
        let before = pmm.free_frames;
        pmm.free_frame(0).unwrap();
        assert_eq!(pmm.free_frames, before);
    }
}
