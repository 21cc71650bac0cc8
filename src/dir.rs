//! Directory entry parsing and directory scans (8.3 names only).
//!
//! Long-name (VFAT) slots are recognized and skipped; lookups match the
//! 11-byte short name exactly.

use core::fmt;

use log::warn;

use crate::bpb::Geometry;
use crate::device::{BlockDevice, SECTOR_SIZE};
use crate::error::{Error, Result};
use crate::fat::{self, Link};

/// Size of one directory slot in bytes.
pub const DIR_ENTRY_SIZE: usize = 32;
/// Length of an on-disk 8.3 name.
pub const SHORT_NAME_LEN: usize = 11;
/// Length of a volume label.
pub const LABEL_LEN: usize = 11;

const SLOTS_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;

/// First name byte of the slot that ends a directory.
const END_OF_DIR: u8 = 0x00;
/// First name byte of a deleted slot.
const DELETED: u8 = 0xE5;

/// Directory entry attributes.
pub mod attr {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;
    pub const LONG_NAME: u8 = 0x0F;
}

fn le_u16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}
fn le_u32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

/// An 11-byte space-padded 8.3 name, as stored on disk.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortName([u8; SHORT_NAME_LEN]);

impl ShortName {
    pub const fn from_raw(raw: [u8; SHORT_NAME_LEN]) -> Self {
        Self(raw)
    }

    /// Format one path component as an 8.3 name.
    ///
    /// The name is split at the last `.`, uppercased, and truncated to 8 name
    /// bytes and 3 extension bytes. `.` and `..` map to the dot entries.
    pub fn from_component(s: &str) -> Self {
        let mut out = [b' '; SHORT_NAME_LEN];
        if s == "." || s == ".." {
            out[..s.len()].fill(b'.');
            return Self(out);
        }

        let (name, ext) = match s.rsplit_once('.') {
            Some((a, b)) => (a, b),
            None => (s, ""),
        };
        for (dst, ch) in out[..8].iter_mut().zip(name.bytes()) {
            *dst = ch.to_ascii_uppercase();
        }
        for (dst, ch) in out[8..].iter_mut().zip(ext.bytes()) {
            *dst = ch.to_ascii_uppercase();
        }
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_NAME_LEN] {
        &self.0
    }

    /// Name part without padding.
    pub fn base(&self) -> &[u8] {
        trim_padding(&self.0[..8])
    }

    /// Extension without padding (may be empty).
    pub fn extension(&self) -> &[u8] {
        trim_padding(&self.0[8..])
    }
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
    &bytes[..end]
}

fn write_bytes(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for &b in bytes {
        let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' };
        fmt::Write::write_char(f, c)?;
    }
    Ok(())
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bytes(f, self.base())?;
        if !self.extension().is_empty() {
            f.write_str(".")?;
            write_bytes(f, self.extension())?;
        }
        Ok(())
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        write_bytes(f, &self.0)?;
        f.write_str("\"")
    }
}

/// A volume label read from the root directory.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VolumeLabel([u8; LABEL_LEN]);

impl VolumeLabel {
    pub fn as_bytes(&self) -> &[u8; LABEL_LEN] {
        &self.0
    }

    /// Label without trailing padding, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(trim_padding(&self.0)).ok()
    }
}

impl fmt::Display for VolumeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_bytes(f, trim_padding(&self.0))
    }
}

impl fmt::Debug for VolumeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        write_bytes(f, &self.0)?;
        f.write_str("\"")
    }
}

/// A parsed 8.3 directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: ShortName,
    pub attr: u8,
    /// Reassembled from the high and low 16-bit halves.
    pub first_cluster: u32,
    pub file_size: u32,
    pub created_time: u16,
    pub created_date: u16,
    pub accessed_date: u16,
    pub modified_time: u16,
    pub modified_date: u16,
}

/// What a 32-byte directory slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// No more entries in this directory.
    End,
    Deleted,
    /// VFAT long-name fragment.
    LongName,
    Entry(DirEntry),
}

impl Slot {
    /// Decode a 32-byte directory record.
    pub fn parse(rec: &[u8; DIR_ENTRY_SIZE]) -> Self {
        match rec[0] {
            END_OF_DIR => return Slot::End,
            DELETED => return Slot::Deleted,
            _ => {}
        }
        let attr = rec[11];
        if attr & 0x3F == attr::LONG_NAME {
            return Slot::LongName;
        }

        let mut raw_name = [0u8; SHORT_NAME_LEN];
        raw_name.copy_from_slice(&rec[0..11]);
        let hi = le_u16(&rec[20..22]) as u32;
        let lo = le_u16(&rec[26..28]) as u32;

        Slot::Entry(DirEntry {
            name: ShortName(raw_name),
            attr,
            first_cluster: (hi << 16) | lo,
            file_size: le_u32(&rec[28..32]),
            created_time: le_u16(&rec[14..16]),
            created_date: le_u16(&rec[16..18]),
            accessed_date: le_u16(&rec[18..20]),
            modified_time: le_u16(&rec[22..24]),
            modified_date: le_u16(&rec[24..26]),
        })
    }
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.attr & attr::DIRECTORY != 0
    }

    pub fn is_volume_label(&self) -> bool {
        self.attr & attr::VOLUME_ID != 0
    }

    /// `.` or `..`.
    pub fn is_dot(&self) -> bool {
        self.name.as_bytes()[0] == b'.'
    }
}

/// Walks every slot of a directory, one sector buffer at a time, across its
/// cluster chain.
struct SlotCursor {
    cluster: u32,
    sector: u32,
    slot: usize,
    buf: [u8; SECTOR_SIZE],
    loaded: bool,
    hops: u32,
    finished: bool,
}

impl SlotCursor {
    fn new(start_cluster: u32) -> Self {
        Self {
            cluster: start_cluster,
            sector: 0,
            slot: 0,
            buf: [0u8; SECTOR_SIZE],
            loaded: false,
            hops: 0,
            finished: false,
        }
    }

    /// Next slot before the end of the directory. Fuses on error.
    fn next<D: BlockDevice>(&mut self, dev: &D, geo: &Geometry) -> Result<Option<Slot>> {
        if self.finished {
            return Ok(None);
        }
        let res = self.advance(dev, geo);
        if !matches!(res, Ok(Some(_))) {
            self.finished = true;
        }
        res
    }

    fn advance<D: BlockDevice>(&mut self, dev: &D, geo: &Geometry) -> Result<Option<Slot>> {
        loop {
            if !self.loaded {
                let base = fat::cluster_to_sector(geo, self.cluster)?;
                dev.read_sector(base + self.sector, &mut self.buf)?;
                self.loaded = true;
                self.slot = 0;
            }

            if self.slot < SLOTS_PER_SECTOR {
                let off = self.slot * DIR_ENTRY_SIZE;
                self.slot += 1;
                let mut rec = [0u8; DIR_ENTRY_SIZE];
                rec.copy_from_slice(&self.buf[off..off + DIR_ENTRY_SIZE]);
                return Ok(match Slot::parse(&rec) {
                    Slot::End => None,
                    slot => Some(slot),
                });
            }

            self.loaded = false;
            self.sector += 1;
            if self.sector < geo.sectors_per_cluster as u32 {
                continue;
            }
            self.sector = 0;
            match fat::next_cluster(dev, geo, self.cluster)? {
                Link::Cluster(next) => {
                    self.hops += 1;
                    if self.hops >= geo.total_clusters {
                        warn!("fat32: directory chain loops");
                        return Err(Error::CorruptedFs);
                    }
                    self.cluster = next;
                }
                Link::EndOfChain => return Ok(None),
            }
        }
    }
}

/// Scan the directory starting at `dir_cluster` for `name`.
///
/// Returns `Ok(None)` when the end of the directory is reached first.
pub fn find_entry<D: BlockDevice>(
    dev: &D,
    geo: &Geometry,
    dir_cluster: u32,
    name: &ShortName,
) -> Result<Option<DirEntry>> {
    let mut cursor = SlotCursor::new(dir_cluster);
    while let Some(slot) = cursor.next(dev, geo)? {
        if let Slot::Entry(e) = slot {
            if !e.is_volume_label() && e.name == *name {
                return Ok(Some(e));
            }
        }
    }
    Ok(None)
}

/// Find the volume label entry in the root directory.
pub fn read_label<D: BlockDevice>(dev: &D, geo: &Geometry) -> Result<VolumeLabel> {
    let mut cursor = SlotCursor::new(geo.root_cluster);
    while let Some(slot) = cursor.next(dev, geo)? {
        if let Slot::Entry(e) = slot {
            if e.is_volume_label() {
                return Ok(VolumeLabel(*e.name.as_bytes()));
            }
        }
    }
    Err(Error::NoLabel)
}

/// Iterator over the live 8.3 entries of one directory.
///
/// Deleted slots, long-name fragments and volume labels are skipped.
/// After the first error the iterator yields `None`.
pub struct Dir<'a, D: BlockDevice> {
    dev: &'a D,
    geo: &'a Geometry,
    start: u32,
    cursor: SlotCursor,
}

impl<'a, D: BlockDevice> Dir<'a, D> {
    pub(crate) fn new(dev: &'a D, geo: &'a Geometry, cluster: u32) -> Self {
        Self {
            dev,
            geo,
            start: cluster,
            cursor: SlotCursor::new(cluster),
        }
    }

    /// Cluster this directory starts at.
    pub fn first_cluster(&self) -> u32 {
        self.start
    }
}

impl<D: BlockDevice> Iterator for Dir<'_, D> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.cursor.next(self.dev, self.geo) {
                Ok(Some(Slot::Entry(e))) if !e.is_volume_label() => return Some(Ok(e)),
                Ok(Some(_)) => continue,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
