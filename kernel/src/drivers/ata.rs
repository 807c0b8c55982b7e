//! ATA/IDE PIO disk driver: drive identification and 28-bit LBA
//! programmed-I/O sector transfer, grounded in the original kernel's
//! `ata_identify_drive`/`ata_read_sectors`/`ata_write_sectors` state
//! machine. Floppy support is out of scope; only ATA is implemented.

use spin::Mutex;

use crate::config::{ATA_TIMEOUT_SPINS, MAX_ATA_DRIVES};
use crate::error::AtaError;

const PRIMARY_IO: u16 = 0x1F0;
const SECONDARY_IO: u16 = 0x170;

const REG_DATA: u16 = 0;
const REG_SECTOR_COUNT: u16 = 2;
const REG_LBA_LOW: u16 = 3;
const REG_LBA_MID: u16 = 4;
const REG_LBA_HIGH: u16 = 5;
const REG_DRIVE_HEAD: u16 = 6;
const REG_STATUS: u16 = 7;
const REG_COMMAND: u16 = 7;

const STATUS_ERR: u8 = 0x01;
const STATUS_DRQ: u8 = 0x08;
const STATUS_DWF: u8 = 0x20;
const STATUS_RDY: u8 = 0x40;
const STATUS_BSY: u8 = 0x80;

const CMD_READ_SECTORS: u8 = 0x20;
const CMD_WRITE_SECTORS: u8 = 0x30;
const CMD_IDENTIFY: u8 = 0xEC;

pub const SECTOR_SIZE: usize = 512;

#[derive(Clone, Copy)]
pub struct DriveInfo {
    pub present: bool,
    pub total_sectors: u32,
    pub sectors_per_track: u16,
    pub heads: u16,
    pub cylinders: u16,
    /// IDENTIFY words 27-46, byte-swapped per the ATA string convention.
    pub model: [u8; 40],
    /// IDENTIFY words 10-19, byte-swapped per the ATA string convention.
    pub serial: [u8; 20],
}

impl DriveInfo {
    /// `model`, trimmed of trailing spaces/NULs, as a display string.
    /// Falls back to `"?"` on non-UTF-8 bytes (should not happen for a
    /// real drive's ASCII model string).
    pub fn model_str(&self) -> &str {
        let trimmed = self.model.trim_ascii_end();
        core::str::from_utf8(trimmed).unwrap_or("?")
    }
}

// `[u8; 40]`/`[u8; 20]` are past the size std implements `Default` for, so
// this is hand-written rather than `#[derive(Default)]`.
impl Default for DriveInfo {
    fn default() -> Self {
        DriveInfo {
            present: false,
            total_sectors: 0,
            sectors_per_track: 0,
            heads: 0,
            cylinders: 0,
            model: [0; 40],
            serial: [0; 20],
        }
    }
}

static DRIVES: Mutex<[DriveInfo; MAX_ATA_DRIVES]> = Mutex::new(
    [DriveInfo {
        present: false,
        total_sectors: 0,
        sectors_per_track: 0,
        heads: 0,
        cylinders: 0,
        model: [0; 40],
        serial: [0; 20],
    }; MAX_ATA_DRIVES],
);

fn bus_base(drive: usize) -> u16 {
    if drive < 2 {
        PRIMARY_IO
    } else {
        SECONDARY_IO
    }
}

fn is_slave(drive: usize) -> bool {
    drive % 2 == 1
}

/// Convert a 28-bit LBA to CHS given a drive's geometry.
pub fn lba_to_chs(lba: u32, sectors_per_track: u32, heads: u32) -> (u32, u32, u32) {
    let cylinder = lba / (heads * sectors_per_track);
    let temp = lba % (heads * sectors_per_track);
    let head = temp / sectors_per_track;
    let sector = temp % sectors_per_track + 1;
    (cylinder, head, sector)
}

/// Convert CHS back to a 28-bit LBA given the same geometry.
pub fn chs_to_lba(cylinder: u32, head: u32, sector: u32, sectors_per_track: u32, heads: u32) -> u32 {
    (cylinder * heads + head) * sectors_per_track + (sector - 1)
}

/// Byte-swap an IDENTIFY string field (model/serial/firmware) into `out`;
/// each word's high byte precedes its low byte in the ASCII string, per
/// the ATA IDENTIFY convention. `out` must be exactly `2 * words.len()`
/// bytes.
fn words_to_ascii(words: &[u16], out: &mut [u8]) {
    debug_assert_eq!(out.len(), words.len() * 2);
    for (i, word) in words.iter().enumerate() {
        out[i * 2] = (word >> 8) as u8;
        out[i * 2 + 1] = (word & 0xFF) as u8;
    }
}

#[cfg(target_arch = "x86")]
mod hw {
    use super::*;
    use crate::arch::x86::port::{inb, inw, outb, outw};

    fn read_status(io_base: u16) -> u8 {
        // SAFETY: reading the drive's own status register.
        unsafe { inb(io_base + REG_STATUS) }
    }

    fn wait_while(io_base: u16, flag: u8) -> Result<(), AtaError> {
        for _ in 0..ATA_TIMEOUT_SPINS {
            if read_status(io_base) & flag == 0 {
                return Ok(());
            }
        }
        Err(AtaError::BusyTimeout)
    }

    fn wait_until(io_base: u16, flag: u8) -> Result<(), AtaError> {
        for _ in 0..ATA_TIMEOUT_SPINS {
            if read_status(io_base) & flag != 0 {
                return Ok(());
            }
        }
        Err(AtaError::DrqTimeout)
    }

    fn select_drive(io_base: u16, slave: bool, lba_top: u8) {
        let value = if slave { 0xF0 } else { 0xE0 } | (lba_top & 0x0F);
        // SAFETY: selecting one of the two drives on this bus.
        unsafe { outb(io_base + REG_DRIVE_HEAD, value) };
    }

    /// Probe one drive slot with IDENTIFY. Returns `Ok(None)` if no drive
    /// answers (status byte 0), `Err` on a bus/device fault.
    pub fn identify(drive: usize) -> Result<Option<DriveInfo>, AtaError> {
        let io_base = bus_base(drive);
        let slave = is_slave(drive);
        select_drive(io_base, slave, 0);

        // SAFETY: four throwaway status reads, the documented settle delay
        // after selecting a drive.
        unsafe {
            for _ in 0..4 {
                inb(io_base + REG_STATUS);
            }
            outb(io_base + REG_SECTOR_COUNT, 0);
            outb(io_base + REG_LBA_LOW, 0);
            outb(io_base + REG_LBA_MID, 0);
            outb(io_base + REG_LBA_HIGH, 0);
            outb(io_base + REG_COMMAND, CMD_IDENTIFY);
        }

        if read_status(io_base) == 0 {
            return Ok(None);
        }

        wait_while(io_base, STATUS_BSY)?;
        if read_status(io_base) & STATUS_ERR != 0 {
            return Err(AtaError::DeviceError);
        }
        wait_until(io_base, STATUS_DRQ)?;

        let mut words = [0u16; 256];
        // SAFETY: DRQ confirmed set; exactly 256 words are defined by the
        // IDENTIFY response.
        unsafe {
            for word in words.iter_mut() {
                *word = inw(io_base + REG_DATA);
            }
        }

        let total_sectors = (words[60] as u32) | ((words[61] as u32) << 16);
        let sectors_per_track = words[6];
        let heads = words[3];
        let cylinders = words[1];

        let mut serial = [0u8; 20];
        words_to_ascii(&words[10..20], &mut serial);

        let mut model = [0u8; 40];
        words_to_ascii(&words[27..47], &mut model);

        Ok(Some(DriveInfo {
            present: true,
            total_sectors,
            sectors_per_track: if sectors_per_track == 0 { 63 } else { sectors_per_track },
            heads: if heads == 0 { 16 } else { heads },
            cylinders,
            model,
            serial,
        }))
    }

    pub fn read_sectors(drive: usize, lba: u32, count: u8, buf: &mut [u8]) -> Result<(), AtaError> {
        debug_assert!(buf.len() >= count as usize * SECTOR_SIZE);
        let io_base = bus_base(drive);
        let slave = is_slave(drive);
        program_lba(io_base, slave, lba, count);
        // SAFETY: registers programmed above, command is well-formed.
        unsafe { outb(io_base + REG_COMMAND, CMD_READ_SECTORS) };

        for sector in 0..count as usize {
            wait_until(io_base, STATUS_DRQ)?;
            if read_status(io_base) & STATUS_ERR != 0 {
                return Err(AtaError::DeviceError);
            }
            // SAFETY: DRQ confirmed, destination slice sized by the caller
            // contract documented above.
            unsafe {
                for word in 0..256 {
                    let value = inw(io_base + REG_DATA);
                    let offset = sector * SECTOR_SIZE + word * 2;
                    buf[offset] = (value & 0xFF) as u8;
                    buf[offset + 1] = (value >> 8) as u8;
                }
            }
        }
        Ok(())
    }

    pub fn write_sectors(drive: usize, lba: u32, count: u8, buf: &[u8]) -> Result<(), AtaError> {
        debug_assert!(buf.len() >= count as usize * SECTOR_SIZE);
        let io_base = bus_base(drive);
        let slave = is_slave(drive);
        wait_until(io_base, STATUS_RDY)?;
        program_lba(io_base, slave, lba, count);
        // SAFETY: registers programmed above.
        unsafe { outb(io_base + REG_COMMAND, CMD_WRITE_SECTORS) };

        for sector in 0..count as usize {
            wait_until(io_base, STATUS_DRQ)?;
            // SAFETY: DRQ confirmed, source slice sized by caller contract.
            unsafe {
                for word in 0..256 {
                    let offset = sector * SECTOR_SIZE + word * 2;
                    let value = buf[offset] as u16 | (buf[offset + 1] as u16) << 8;
                    outw(io_base + REG_DATA, value);
                }
            }
        }
        wait_while(io_base, STATUS_BSY)?;
        if read_status(io_base) & STATUS_DWF != 0 {
            return Err(AtaError::WriteFault);
        }
        Ok(())
    }

    fn program_lba(io_base: u16, slave: bool, lba: u32, count: u8) {
        let lba_top = ((lba >> 24) & 0x0F) as u8;
        select_drive(io_base, slave, lba_top);
        // SAFETY: writing the drive's own task-file registers.
        unsafe {
            outb(io_base + REG_SECTOR_COUNT, count);
            outb(io_base + REG_LBA_LOW, (lba & 0xFF) as u8);
            outb(io_base + REG_LBA_MID, ((lba >> 8) & 0xFF) as u8);
            outb(io_base + REG_LBA_HIGH, ((lba >> 16) & 0xFF) as u8);
        }
    }
}

/// # Safety
/// Must run once at boot.
#[cfg(target_arch = "x86")]
pub unsafe fn init() {
    let mut drives = DRIVES.lock();
    for drive in 0..MAX_ATA_DRIVES {
        if let Ok(Some(info)) = hw::identify(drive) {
            drives[drive] = info;
            log::info!(
                "ata{drive}: {} ({} sectors, CHS {}/{}/{})",
                info.model_str(),
                info.total_sectors,
                info.cylinders,
                info.heads,
                info.sectors_per_track
            );
        }
    }
}

#[cfg(not(target_arch = "x86"))]
/// # Safety
/// No-op off-target.
pub unsafe fn init() {}

pub fn get_info(drive: usize) -> Option<DriveInfo> {
    DRIVES.lock().get(drive).copied().filter(|d| d.present)
}

#[cfg(target_arch = "x86")]
pub fn read_sectors(drive: usize, lba: u32, count: u8, buf: &mut [u8]) -> Result<(), AtaError> {
    if drive >= MAX_ATA_DRIVES {
        return Err(AtaError::InvalidDrive);
    }
    if get_info(drive).is_none() {
        return Err(AtaError::NotPresent);
    }
    hw::read_sectors(drive, lba, count, buf)
}

#[cfg(target_arch = "x86")]
pub fn write_sectors(drive: usize, lba: u32, count: u8, buf: &[u8]) -> Result<(), AtaError> {
    if drive >= MAX_ATA_DRIVES {
        return Err(AtaError::InvalidDrive);
    }
    if get_info(drive).is_none() {
        return Err(AtaError::NotPresent);
    }
    hw::write_sectors(drive, lba, count, buf)
}

#[cfg(not(target_arch = "x86"))]
pub fn read_sectors(_drive: usize, _lba: u32, _count: u8, _buf: &mut [u8]) -> Result<(), AtaError> {
    Err(AtaError::NotPresent)
}

#[cfg(not(target_arch = "x86"))]
pub fn write_sectors(_drive: usize, _lba: u32, _count: u8, _buf: &[u8]) -> Result<(), AtaError> {
    Err(AtaError::NotPresent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chs_round_trips_through_lba() {
        let sectors_per_track = 63;
        let heads = 16;
        for lba in [0u32, 1, 1000, 100_000, 2_097_151] {
            let (c, h, s) = lba_to_chs(lba, sectors_per_track, heads);
            assert_eq!(chs_to_lba(c, h, s, sectors_per_track, heads), lba);
        }
    }

    #[test]
    fn identify_model_words_byte_swap_to_ascii() {
        // "WD" packed high-byte-first, as IDENTIFY reports it.
        let words = [u16::from_be_bytes(*b"WD")];
        let mut out = [0u8; 2];
        words_to_ascii(&words, &mut out);
        assert_eq!(&out, b"WD");
    }

    #[test]
    fn model_str_trims_trailing_padding() {
        let mut info = DriveInfo::default();
        info.model[..6].copy_from_slice(b"WDC WD");
        assert_eq!(info.model_str(), "WDC WD");
    }
}
