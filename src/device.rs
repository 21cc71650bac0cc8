//! Block device abstraction.
//!
//! FAT32 is read on top of a sector-based device with 512-byte sectors.
//! The driver only ever reads; it never assumes caching or sequential access.

use spin::Mutex;

use crate::error::{Error, Result};

/// Size of one device sector in bytes.
pub const SECTOR_SIZE: usize = 512;

/// A minimal read-only sector device.
///
/// In `no_std`, you typically implement this trait for:
/// - an SD/MMC controller
/// - a memory-mapped disk image
/// - an in-memory image (for tests)
pub trait BlockDevice {
    /// Read the absolute sector `lba` into `buf`.
    fn read_sector(&self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &D {
    fn read_sector(&self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        (**self).read_sector(lba, buf)
    }
}

/// Adapts a plain sector-read function into a [`BlockDevice`].
///
/// Any error returned by the function is reported as [`Error::Io`].
pub struct FnDevice<F> {
    read: F,
}

impl<F> FnDevice<F> {
    pub const fn new(read: F) -> Self {
        Self { read }
    }
}

impl<F, E> BlockDevice for FnDevice<F>
where
    F: Fn(u32, &mut [u8; SECTOR_SIZE]) -> core::result::Result<(), E>,
{
    fn read_sector(&self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        (self.read)(lba, buf).map_err(|_| Error::Io)
    }
}

/// A device shared between several users, one sector read at a time.
///
/// The lock is held for exactly one `read_sector` call.
pub struct SharedDevice<D> {
    inner: Mutex<D>,
}

impl<D> SharedDevice<D> {
    pub const fn new(dev: D) -> Self {
        Self {
            inner: Mutex::new(dev),
        }
    }

    pub fn into_inner(self) -> D {
        self.inner.into_inner()
    }
}

impl<D: BlockDevice> BlockDevice for SharedDevice<D> {
    fn read_sector(&self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        self.inner.lock().read_sector(lba, buf)
    }
}

/// Simple in-memory block device for tests.
///
/// Stores a full disk image inside a `Vec<u8>` (sector-aligned) and records
/// every sector it is asked for.
#[cfg(test)]
pub struct MemDevice {
    data: std::vec::Vec<u8>,
    log: core::cell::RefCell<std::vec::Vec<u32>>,
    fail_at: Option<u32>,
}

#[cfg(test)]
impl MemDevice {
    pub fn new(data: std::vec::Vec<u8>) -> Self {
        assert!(data.len() % SECTOR_SIZE == 0);
        Self {
            data,
            log: core::cell::RefCell::new(std::vec::Vec::new()),
            fail_at: None,
        }
    }

    /// Make every read of `lba` fail with [`Error::Io`].
    pub fn fail_at(mut self, lba: u32) -> Self {
        self.fail_at = Some(lba);
        self
    }

    /// Sectors read so far, in order.
    pub fn reads(&self) -> std::vec::Vec<u32> {
        self.log.borrow().clone()
    }

    /// Number of reads that hit `range`.
    pub fn reads_in(&self, range: core::ops::Range<u32>) -> usize {
        self.log.borrow().iter().filter(|l| range.contains(l)).count()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

#[cfg(test)]
impl BlockDevice for MemDevice {
    fn read_sector(&self, lba: u32, buf: &mut [u8; SECTOR_SIZE]) -> Result<()> {
        self.log.borrow_mut().push(lba);
        if self.fail_at == Some(lba) {
            return Err(Error::Io);
        }
        let off = (lba as usize) * SECTOR_SIZE;
        if off + SECTOR_SIZE > self.data.len() {
            return Err(Error::Io);
        }
        buf.copy_from_slice(&self.data[off..off + SECTOR_SIZE]);
        Ok(())
    }
}
