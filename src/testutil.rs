//! Test-only FAT32 image construction.

use std::vec::Vec;

use crate::bpb::{Bpb, Geometry};
use crate::device::{MemDevice, SECTOR_SIZE};
use crate::dir::attr;

const EOC: u32 = 0x0FFF_FFFF;

/// A formatted FAT32 boot sector with the given geometry.
pub fn boot_sector(
    sectors_per_cluster: u8,
    reserved: u16,
    num_fats: u8,
    sectors_per_fat: u32,
    root_cluster: u32,
    total_sectors: u32,
) -> [u8; SECTOR_SIZE] {
    let mut s = [0u8; SECTOR_SIZE];
    s[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
    s[3..11].copy_from_slice(b"MSDOS5.0");
    s[11..13].copy_from_slice(&512u16.to_le_bytes());
    s[13] = sectors_per_cluster;
    s[14..16].copy_from_slice(&reserved.to_le_bytes());
    s[16] = num_fats;
    s[21] = 0xF8;
    s[32..36].copy_from_slice(&total_sectors.to_le_bytes());
    s[36..40].copy_from_slice(&sectors_per_fat.to_le_bytes());
    s[44..48].copy_from_slice(&root_cluster.to_le_bytes());
    s[48..50].copy_from_slice(&1u16.to_le_bytes());
    s[50..52].copy_from_slice(&6u16.to_le_bytes());
    s[66] = 0x29;
    s[71..82].copy_from_slice(b"NO NAME    ");
    s[82..90].copy_from_slice(b"FAT32   ");
    s[510] = 0x55;
    s[511] = 0xAA;
    s
}

/// A 32-byte short-name directory record.
pub fn raw_entry(name: &[u8; 11], attr: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut rec = [0u8; 32];
    rec[0..11].copy_from_slice(name);
    rec[11] = attr;
    rec[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    rec[26..28].copy_from_slice(&((cluster & 0xFFFF) as u16).to_le_bytes());
    rec[28..32].copy_from_slice(&size.to_le_bytes());
    rec
}

/// Mark a record as deleted.
pub fn deleted(mut rec: [u8; 32]) -> [u8; 32] {
    rec[0] = 0xE5;
    rec
}

/// Lays out a small FAT32 volume in memory: optional MBR, boot sector,
/// two FAT copies, then `clusters` data clusters with the root at cluster 2.
pub struct ImageBuilder {
    img: Vec<u8>,
    volume_start: u32,
    sectors_per_cluster: u8,
    reserved: u16,
    num_fats: u8,
    sectors_per_fat: u32,
    clusters: u32,
    next_free: u32,
}

impl ImageBuilder {
    /// Unpartitioned volume starting at sector 0.
    pub fn new(sectors_per_cluster: u8, clusters: u32) -> Self {
        Self::build(0, None, sectors_per_cluster, clusters)
    }

    /// Volume at `start`, described by MBR entry 0 with type `part_type`.
    pub fn partitioned(start: u32, part_type: u8, sectors_per_cluster: u8, clusters: u32) -> Self {
        Self::build(start, Some(part_type), sectors_per_cluster, clusters)
    }

    fn build(volume_start: u32, part_type: Option<u8>, spc: u8, clusters: u32) -> Self {
        let reserved = 32u16;
        let num_fats = 2u8;
        let sectors_per_fat = ((clusters + 2) * 4).div_ceil(SECTOR_SIZE as u32);
        let total = reserved as u32 + num_fats as u32 * sectors_per_fat + clusters * spc as u32;

        let mut b = Self {
            img: vec![0u8; (volume_start + total) as usize * SECTOR_SIZE],
            volume_start,
            sectors_per_cluster: spc,
            reserved,
            num_fats,
            sectors_per_fat,
            clusters,
            next_free: 2,
        };

        let boot = boot_sector(spc, reserved, num_fats, sectors_per_fat, 2, total);
        b.sector_mut(volume_start).copy_from_slice(&boot);

        if let Some(ty) = part_type {
            let mbr = b.sector_mut(0);
            let e = 446;
            mbr[e] = 0x80;
            mbr[e + 4] = ty;
            mbr[e + 8..e + 12].copy_from_slice(&volume_start.to_le_bytes());
            mbr[e + 12..e + 16].copy_from_slice(&total.to_le_bytes());
            mbr[510] = 0x55;
            mbr[511] = 0xAA;
        }

        b.set_fat(0, 0x0FFF_FFF8);
        b.set_fat(1, EOC);
        let root = b.alloc_chain(1);
        assert_eq!(root, [2]);
        b
    }

    pub fn geometry(&self) -> Geometry {
        let mut boot = [0u8; SECTOR_SIZE];
        boot.copy_from_slice(self.sector(self.volume_start));
        Geometry::new(&Bpb::parse(&boot).unwrap(), self.volume_start).unwrap()
    }

    pub fn root_cluster(&self) -> u32 {
        2
    }

    pub fn cluster_size(&self) -> usize {
        self.sectors_per_cluster as usize * SECTOR_SIZE
    }

    fn fat_start(&self) -> u32 {
        self.volume_start + self.reserved as u32
    }

    /// First sector of `cluster`.
    pub fn cluster_sector(&self, cluster: u32) -> u32 {
        self.fat_start()
            + self.num_fats as u32 * self.sectors_per_fat
            + (cluster - 2) * self.sectors_per_cluster as u32
    }

    fn sector(&self, lba: u32) -> &[u8] {
        let off = lba as usize * SECTOR_SIZE;
        &self.img[off..off + SECTOR_SIZE]
    }

    pub fn sector_mut(&mut self, lba: u32) -> &mut [u8] {
        let off = lba as usize * SECTOR_SIZE;
        &mut self.img[off..off + SECTOR_SIZE]
    }

    /// The boot sector of the volume, for corrupting fields.
    pub fn boot_mut(&mut self) -> &mut [u8] {
        self.sector_mut(self.volume_start)
    }

    fn cluster_mut(&mut self, cluster: u32) -> &mut [u8] {
        let off = self.cluster_sector(cluster) as usize * SECTOR_SIZE;
        let len = self.cluster_size();
        &mut self.img[off..off + len]
    }

    /// Write a FAT slot in every FAT copy.
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        for copy in 0..self.num_fats as u32 {
            let byte = (self.fat_start() + copy * self.sectors_per_fat) as usize * SECTOR_SIZE
                + cluster as usize * 4;
            self.img[byte..byte + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    pub fn fat(&self, cluster: u32) -> u32 {
        let byte = self.fat_start() as usize * SECTOR_SIZE + cluster as usize * 4;
        u32::from_le_bytes(self.img[byte..byte + 4].try_into().unwrap()) & 0x0FFF_FFFF
    }

    /// Allocate `n` consecutive clusters linked into one chain.
    pub fn alloc_chain(&mut self, n: u32) -> Vec<u32> {
        assert!(self.next_free + n <= self.clusters + 2, "image full");
        let chain: Vec<u32> = (self.next_free..self.next_free + n).collect();
        self.next_free += n;
        for pair in chain.windows(2) {
            self.set_fat(pair[0], pair[1]);
        }
        if let Some(&last) = chain.last() {
            self.set_fat(last, EOC);
        }
        chain
    }

    /// Copy `data` into the clusters of `chain`, in order.
    pub fn write_chain(&mut self, chain: &[u32], data: &[u8]) {
        let cs = self.cluster_size();
        for (&cluster, chunk) in chain.iter().zip(data.chunks(cs)) {
            self.cluster_mut(cluster)[..chunk.len()].copy_from_slice(chunk);
        }
    }

    /// Store `rec` in the first never-used slot of directory `dir`, growing
    /// the directory chain when it is full.
    pub fn add_raw(&mut self, dir: u32, rec: [u8; 32]) {
        let mut cluster = dir;
        loop {
            let cs = self.cluster_size();
            let data = self.cluster_mut(cluster);
            if let Some(slot) = (0..cs / 32).find(|i| data[i * 32] == 0) {
                data[slot * 32..slot * 32 + 32].copy_from_slice(&rec);
                return;
            }
            let next = self.fat(cluster);
            if next >= 0x0FFF_FFF8 {
                let grown = self.alloc_chain(1)[0];
                self.set_fat(cluster, grown);
                cluster = grown;
            } else {
                cluster = next;
            }
        }
    }

    /// Add a file with `data` to directory `dir`; returns its first cluster.
    pub fn add_file(&mut self, dir: u32, name: &[u8; 11], data: &[u8]) -> u32 {
        let first = if data.is_empty() {
            0
        } else {
            let n = data.len().div_ceil(self.cluster_size()) as u32;
            let chain = self.alloc_chain(n);
            self.write_chain(&chain, data);
            chain[0]
        };
        self.add_raw(dir, raw_entry(name, attr::ARCHIVE, first, data.len() as u32));
        first
    }

    /// Add an empty subdirectory (with dot entries); returns its cluster.
    pub fn add_dir(&mut self, parent: u32, name: &[u8; 11]) -> u32 {
        let cluster = self.alloc_chain(1)[0];
        let up = if parent == self.root_cluster() { 0 } else { parent };
        self.add_raw(cluster, raw_entry(b".          ", attr::DIRECTORY, cluster, 0));
        self.add_raw(cluster, raw_entry(b"..         ", attr::DIRECTORY, up, 0));
        self.add_raw(parent, raw_entry(name, attr::DIRECTORY, cluster, 0));
        cluster
    }

    pub fn into_device(self) -> MemDevice {
        MemDevice::new(self.img)
    }
}
