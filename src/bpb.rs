//! FAT32 BPB / boot sector parsing and volume geometry.

use log::debug;

use crate::device::SECTOR_SIZE;
use crate::error::{Error, Result};
use crate::mbr;

/// Largest cluster count a FAT32 volume can address (28-bit entries,
/// minus the two reserved slots and the bad/EOC sentinels).
pub const MAX_CLUSTERS: u32 = 0x0FFF_FFF5;

/// Decoded FAT32 boot sector (BPB plus the FAT32 extended fields).
#[derive(Debug, Clone, Copy)]
pub struct Bpb {
    pub oem_name: [u8; 8],
    /// Bytes per sector (only 512 is supported).
    pub bytes_per_sector: u16,
    /// Sectors per cluster.
    pub sectors_per_cluster: u8,
    /// Reserved sectors before the FAT region.
    pub reserved_sectors: u16,
    /// Number of FATs (usually 2).
    pub num_fats: u8,
    /// Always 0 on FAT32.
    pub root_entry_count: u16,
    pub total_sectors_16: u16,
    pub media_type: u8,
    /// Unused on FAT32.
    pub fat_size_16: u16,
    pub sectors_per_track: u16,
    pub num_heads: u16,
    pub hidden_sectors: u32,
    pub total_sectors_32: u32,
    /// FAT size in sectors.
    pub fat_size_32: u32,
    pub ext_flags: u16,
    pub fs_version: u16,
    /// Root directory first cluster.
    pub root_cluster: u32,
    pub fsinfo_sector: u16,
    pub backup_boot_sector: u16,
    pub drive_number: u8,
    pub boot_signature: u8,
    pub volume_id: u32,
    /// Label copy kept in the boot sector; the root directory entry wins.
    pub volume_label: [u8; 11],
    /// Informational only, usually `"FAT32   "`.
    pub fs_type: [u8; 8],
}

fn le_u16(x: &[u8]) -> u16 {
    u16::from_le_bytes([x[0], x[1]])
}
fn le_u32(x: &[u8]) -> u32 {
    u32::from_le_bytes([x[0], x[1], x[2], x[3]])
}

/// Cheap probe used on raw sector 0: signature present and a FAT32 FAT size.
pub fn looks_like_boot_sector(sector: &[u8; SECTOR_SIZE]) -> bool {
    mbr::has_signature(sector) && le_u32(&sector[36..40]) != 0
}

impl Bpb {
    /// Parse and validate a FAT32 boot sector.
    pub fn parse(boot: &[u8; SECTOR_SIZE]) -> Result<Self> {
        if !mbr::has_signature(boot) {
            return Err(Error::InvalidBootSector);
        }

        let mut oem_name = [0u8; 8];
        oem_name.copy_from_slice(&boot[3..11]);
        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&boot[71..82]);
        let mut fs_type = [0u8; 8];
        fs_type.copy_from_slice(&boot[82..90]);

        let bpb = Self {
            oem_name,
            bytes_per_sector: le_u16(&boot[11..13]),
            sectors_per_cluster: boot[13],
            reserved_sectors: le_u16(&boot[14..16]),
            num_fats: boot[16],
            root_entry_count: le_u16(&boot[17..19]),
            total_sectors_16: le_u16(&boot[19..21]),
            media_type: boot[21],
            fat_size_16: le_u16(&boot[22..24]),
            sectors_per_track: le_u16(&boot[24..26]),
            num_heads: le_u16(&boot[26..28]),
            hidden_sectors: le_u32(&boot[28..32]),
            total_sectors_32: le_u32(&boot[32..36]),
            fat_size_32: le_u32(&boot[36..40]),
            ext_flags: le_u16(&boot[40..42]),
            fs_version: le_u16(&boot[42..44]),
            root_cluster: le_u32(&boot[44..48]),
            fsinfo_sector: le_u16(&boot[48..50]),
            backup_boot_sector: le_u16(&boot[50..52]),
            drive_number: boot[64],
            boot_signature: boot[66],
            volume_id: le_u32(&boot[67..71]),
            volume_label,
            fs_type,
        };

        if bpb.sectors_per_cluster == 0
            || bpb.reserved_sectors == 0
            || bpb.num_fats == 0
            || bpb.fat_size_32 == 0
        {
            return Err(Error::InvalidBootSector);
        }
        // Reads go through 512-byte sectors only.
        if bpb.bytes_per_sector as usize != SECTOR_SIZE {
            debug!("fat32: unsupported sector size {}", bpb.bytes_per_sector);
            return Err(Error::InvalidBootSector);
        }
        if bpb.root_cluster < 2 {
            return Err(Error::InvalidBootSector);
        }

        Ok(bpb)
    }

    /// 16-bit total if nonzero, else the 32-bit field.
    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 != 0 {
            self.total_sectors_16 as u32
        } else {
            self.total_sectors_32
        }
    }
}

/// Region layout derived from a [`Bpb`] and the volume's absolute start.
///
/// All sector numbers are absolute device sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub volume_start: u32,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub num_fats: u8,
    pub sectors_per_fat: u32,
    pub root_cluster: u32,
    /// Bytes per cluster.
    pub cluster_size: u32,
    pub total_sectors: u32,
    /// Number of data clusters; valid cluster numbers are `2..2 + total_clusters`.
    pub total_clusters: u32,
    /// First sector of FAT #0.
    pub fat_start: u32,
    /// First sector of cluster 2.
    pub data_start: u32,
}

impl Geometry {
    pub fn new(bpb: &Bpb, volume_start: u32) -> Result<Self> {
        let spc = bpb.sectors_per_cluster as u32;
        let fat_start = volume_start
            .checked_add(bpb.reserved_sectors as u32)
            .ok_or(Error::InvalidBootSector)?;
        let fat_sectors = (bpb.num_fats as u32)
            .checked_mul(bpb.fat_size_32)
            .ok_or(Error::InvalidBootSector)?;
        let data_start = fat_start
            .checked_add(fat_sectors)
            .ok_or(Error::InvalidBootSector)?;

        let total_sectors = bpb.total_sectors();
        let meta_sectors = data_start - volume_start;
        let data_clusters = total_sectors
            .checked_sub(meta_sectors)
            .ok_or(Error::InvalidBootSector)?
            / spc;

        // Never hand out a cluster whose FAT slot lies past the first FAT.
        let fat_capacity = bpb
            .fat_size_32
            .saturating_mul((SECTOR_SIZE / 4) as u32)
            .saturating_sub(2);
        // Every sector of the last cluster must stay addressable.
        let addressable = (u32::MAX - data_start) / spc;
        let total_clusters = data_clusters
            .min(fat_capacity)
            .min(MAX_CLUSTERS)
            .min(addressable);
        if total_clusters != data_clusters {
            debug!(
                "fat32: clamping {} data clusters to {}",
                data_clusters, total_clusters
            );
        }

        Ok(Self {
            volume_start,
            sectors_per_cluster: bpb.sectors_per_cluster,
            reserved_sectors: bpb.reserved_sectors,
            num_fats: bpb.num_fats,
            sectors_per_fat: bpb.fat_size_32,
            root_cluster: bpb.root_cluster,
            cluster_size: spc * SECTOR_SIZE as u32,
            total_sectors,
            total_clusters,
            fat_start,
            data_start,
        })
    }

    /// Whether `cluster` addresses a data cluster of this volume.
    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        cluster >= 2 && cluster - 2 < self.total_clusters
    }
}
