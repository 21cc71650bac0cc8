//! FAT table helpers (FAT32): chain walking and cluster/sector mapping.

use log::{trace, warn};

use crate::bpb::Geometry;
use crate::device::{BlockDevice, SECTOR_SIZE};
use crate::error::{Error, Result};

/// FAT32 end-of-chain marker threshold.
pub const EOC_MIN: u32 = 0x0FFF_FFF8;
/// Bad cluster marker.
pub const BAD_CLUSTER: u32 = 0x0FFF_FFF7;
/// The upper 4 bits of a FAT32 slot are reserved.
pub const ENTRY_MASK: u32 = 0x0FFF_FFFF;

/// Where a cluster chain leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// A data cluster.
    Cluster(u32),
    /// The chain ended.
    EndOfChain,
}

/// Classify a raw 32-bit FAT slot.
///
/// Bad clusters are I/O-class errors, reserved values (0 and 1) mean
/// corruption, and pointers past the data region are invalid clusters.
pub fn classify(geo: &Geometry, raw: u32) -> Result<Link> {
    let value = raw & ENTRY_MASK;
    if value >= EOC_MIN {
        Ok(Link::EndOfChain)
    } else if value == BAD_CLUSTER {
        warn!("fat32: chain runs into a bad cluster");
        Err(Error::Io)
    } else if value < 2 {
        warn!("fat32: reserved FAT value {:#x} inside a chain", value);
        Err(Error::CorruptedFs)
    } else if !geo.is_data_cluster(value) {
        warn!("fat32: FAT points past the data region ({})", value);
        Err(Error::InvalidCluster)
    } else {
        Ok(Link::Cluster(value))
    }
}

/// Sector and byte offset holding the FAT slot of `cluster`.
pub fn fat_location(geo: &Geometry, cluster: u32) -> (u32, usize) {
    let fat_offset = cluster * 4;
    let sector = geo.fat_start + fat_offset / SECTOR_SIZE as u32;
    let off = (fat_offset % SECTOR_SIZE as u32) as usize;
    (sector, off)
}

fn check_cluster(geo: &Geometry, cluster: u32) -> Result<()> {
    if cluster < 2 {
        Err(Error::BadParam)
    } else if !geo.is_data_cluster(cluster) {
        Err(Error::InvalidCluster)
    } else {
        Ok(())
    }
}

/// First absolute sector of `cluster`.
pub fn cluster_to_sector(geo: &Geometry, cluster: u32) -> Result<u32> {
    if !geo.is_data_cluster(cluster) {
        return Err(Error::InvalidCluster);
    }
    (cluster - 2)
        .checked_mul(geo.sectors_per_cluster as u32)
        .and_then(|off| off.checked_add(geo.data_start))
        .ok_or(Error::InvalidCluster)
}

/// Read the FAT entry for `cluster`, i.e. the link to the next cluster.
///
/// Exactly one sector is read; nothing is cached between calls.
pub fn next_cluster<D: BlockDevice>(dev: &D, geo: &Geometry, cluster: u32) -> Result<Link> {
    check_cluster(geo, cluster)?;
    let (sector, off) = fat_location(geo, cluster);

    let mut buf = [0u8; SECTOR_SIZE];
    dev.read_sector(sector, &mut buf)?;
    let raw = u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
    trace!("fat32: FAT[{}] = {:#x}", cluster, raw & ENTRY_MASK);
    classify(geo, raw)
}

/// Follow the chain `index` steps from `start`.
///
/// Reaching the end of the chain on the last requested step yields
/// [`Link::EndOfChain`]; reaching it any earlier is corruption.
pub fn cluster_at_index<D: BlockDevice>(
    dev: &D,
    geo: &Geometry,
    start: u32,
    index: u32,
) -> Result<Link> {
    if start < 2 {
        return Err(Error::BadParam);
    }

    let mut cluster = start;
    for step in 0..index {
        match next_cluster(dev, geo, cluster)? {
            Link::Cluster(next) => cluster = next,
            Link::EndOfChain if step + 1 == index => return Ok(Link::EndOfChain),
            Link::EndOfChain => {
                warn!(
                    "fat32: chain from {} ends after {} of {} steps",
                    start,
                    step + 1,
                    index
                );
                return Err(Error::CorruptedFs);
            }
        }
    }
    Ok(Link::Cluster(cluster))
}
