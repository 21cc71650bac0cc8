//! FAT32 high-level filesystem API: mounting and path resolution.

use log::{debug, info};

use crate::bpb::{self, Bpb, Geometry};
use crate::device::{BlockDevice, SECTOR_SIZE};
use crate::dir::{self, Dir, DirEntry, ShortName, VolumeLabel};
use crate::error::{Error, Result};
use crate::file::File;
use crate::mbr;
use crate::path::Path;

/// A mounted FAT32 volume.
///
/// Geometry is fixed at mount time. Files and directory iterators borrow
/// the volume and cannot outlive it.
pub struct Fat32<D: BlockDevice> {
    dev: D,
    bpb: Bpb,
    geo: Geometry,
}

impl<D: BlockDevice> Fat32<D> {
    /// Mount the FAT32 volume on `dev`.
    ///
    /// Sector 0 is first tried as an MBR: the first partition entry with a
    /// FAT32 type (0x0B/0x0C) selects the volume. Otherwise sector 0 must be
    /// the FAT32 boot sector itself.
    pub fn mount(dev: D) -> Result<Self> {
        let mut sector = [0u8; SECTOR_SIZE];
        dev.read_sector(0, &mut sector)?;

        let volume_start = if let Some(part) = mbr::find_fat32_partition(&sector) {
            debug!(
                "fat32: MBR partition type {:#04x} at sector {}",
                part.partition_type, part.start_sector
            );
            dev.read_sector(part.start_sector, &mut sector)?;
            part.start_sector
        } else if bpb::looks_like_boot_sector(&sector) {
            debug!("fat32: no FAT32 partition entry, using sector 0 as boot sector");
            0
        } else {
            return Err(Error::InvalidBootSector);
        };

        let bpb = Bpb::parse(&sector)?;
        let geo = Geometry::new(&bpb, volume_start)?;
        info!(
            "fat32: mounted at sector {}: {} clusters of {} bytes, FAT at {}, data at {}, root cluster {}",
            volume_start,
            geo.total_clusters,
            geo.cluster_size,
            geo.fat_start,
            geo.data_start,
            geo.root_cluster
        );

        Ok(Self { dev, bpb, geo })
    }

    /// Decoded boot sector.
    pub fn bpb(&self) -> &Bpb {
        &self.bpb
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geo
    }

    pub fn device(&self) -> &D {
        &self.dev
    }

    /// Unmount and return the underlying device.
    pub fn into_device(self) -> D {
        self.dev
    }

    /// Volume label from the root directory.
    pub fn read_label(&self) -> Result<VolumeLabel> {
        dir::read_label(&self.dev, &self.geo)
    }

    /// Look up `name` in `dir`, or in the root directory when `dir` is `None`.
    pub fn lookup(&self, dir: Option<&DirEntry>, name: &str) -> Result<Option<DirEntry>> {
        let cluster = match dir {
            None => self.geo.root_cluster,
            Some(e) if e.is_dir() => self.dir_cluster(e),
            Some(_) => return Err(Error::NotDir),
        };
        dir::find_entry(&self.dev, &self.geo, cluster, &ShortName::from_component(name))
    }

    /// Open the file at `path` for reading.
    pub fn open(&self, path: &str) -> Result<File<'_, D>> {
        let path = Path::parse(path)?;
        // An empty path names the root directory.
        let (target, dirs) = path.split_last().ok_or(Error::IsDir)?;

        let parent = self.walk(dirs)?;
        let name = ShortName::from_component(target);
        let entry = dir::find_entry(&self.dev, &self.geo, parent, &name)?.ok_or(Error::NoFile)?;
        if entry.is_dir() {
            return Err(Error::IsDir);
        }

        debug!(
            "fat32: open {} ({} bytes, cluster {})",
            entry.name, entry.file_size, entry.first_cluster
        );
        Ok(File::new(self, &entry, parent))
    }

    /// Iterate the directory at `path`.
    pub fn open_dir(&self, path: &str) -> Result<Dir<'_, D>> {
        let path = Path::parse(path)?;
        let Some((target, dirs)) = path.split_last() else {
            return Ok(self.root_dir());
        };

        let parent = self.walk(dirs)?;
        let name = ShortName::from_component(target);
        let entry = dir::find_entry(&self.dev, &self.geo, parent, &name)?.ok_or(Error::NoFile)?;
        if !entry.is_dir() {
            return Err(Error::NotDir);
        }
        Ok(Dir::new(&self.dev, &self.geo, self.dir_cluster(&entry)))
    }

    pub fn root_dir(&self) -> Dir<'_, D> {
        Dir::new(&self.dev, &self.geo, self.geo.root_cluster)
    }

    /// Descend through `dirs` from the root; returns the last directory's cluster.
    fn walk(&self, dirs: &[&str]) -> Result<u32> {
        let mut cluster = self.geo.root_cluster;
        for name in dirs {
            let short = ShortName::from_component(name);
            let entry = dir::find_entry(&self.dev, &self.geo, cluster, &short)?
                .ok_or(Error::NoPath)?;
            if !entry.is_dir() {
                return Err(Error::NotDir);
            }
            cluster = self.dir_cluster(&entry);
        }
        Ok(cluster)
    }

    /// `..` entries of first-level directories store cluster 0 for the root.
    fn dir_cluster(&self, entry: &DirEntry) -> u32 {
        if entry.first_cluster == 0 {
            self.geo.root_cluster
        } else {
            entry.first_cluster
        }
    }
}
