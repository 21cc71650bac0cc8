//! MBR partition table decoding.

use crate::device::SECTOR_SIZE;

/// Boot sector / MBR signature, stored little-endian at byte 510.
pub const SIGNATURE: u16 = 0xAA55;

/// Partition type bytes that select a FAT32 volume (CHS and LBA variants).
pub const FAT32_PART_TYPES: [u8; 2] = [0x0B, 0x0C];

const TABLE_OFFSET: usize = 446;
const ENTRY_SIZE: usize = 16;

/// One 16-byte entry of the MBR partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    pub boot_flag: u8,
    pub start_chs: [u8; 3],
    pub partition_type: u8,
    pub end_chs: [u8; 3],
    pub start_sector: u32,
    pub total_sectors: u32,
}

impl PartitionEntry {
    fn parse(rec: &[u8]) -> Self {
        Self {
            boot_flag: rec[0],
            start_chs: [rec[1], rec[2], rec[3]],
            partition_type: rec[4],
            end_chs: [rec[5], rec[6], rec[7]],
            start_sector: u32::from_le_bytes([rec[8], rec[9], rec[10], rec[11]]),
            total_sectors: u32::from_le_bytes([rec[12], rec[13], rec[14], rec[15]]),
        }
    }

    pub fn is_fat32(&self) -> bool {
        FAT32_PART_TYPES.contains(&self.partition_type)
    }
}

/// Whether `sector` ends in the 0xAA55 signature.
pub fn has_signature(sector: &[u8; SECTOR_SIZE]) -> bool {
    u16::from_le_bytes([sector[510], sector[511]]) == SIGNATURE
}

/// Decode the four partition table entries.
pub fn partitions(sector: &[u8; SECTOR_SIZE]) -> [PartitionEntry; 4] {
    core::array::from_fn(|i| {
        let off = TABLE_OFFSET + i * ENTRY_SIZE;
        PartitionEntry::parse(&sector[off..off + ENTRY_SIZE])
    })
}

/// First partition with a FAT32 type byte, if `sector` is a signed MBR.
pub fn find_fat32_partition(sector: &[u8; SECTOR_SIZE]) -> Option<PartitionEntry> {
    if !has_signature(sector) {
        return None;
    }
    partitions(sector).into_iter().find(PartitionEntry::is_fat32)
}
