//! Open files and the streaming read path.

use log::{trace, warn};

use crate::device::{BlockDevice, SECTOR_SIZE};
use crate::dir::{DirEntry, ShortName};
use crate::error::{Error, Result};
use crate::fat::{self, Link};
use crate::fs::Fat32;

/// Seek target for [`File::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekFrom {
    Start(u32),
    End(i64),
    Current(i64),
}

/// A file opened for reading.
///
/// Every read re-walks the cluster chain from the first cluster up to the
/// cluster holding the current offset; nothing is cached between calls.
pub struct File<'a, D: BlockDevice> {
    fs: &'a Fat32<D>,
    name: ShortName,
    start_cluster: u32,
    /// Last cluster data was read from, and its index in the chain.
    current_cluster: u32,
    current_index: u32,
    size: u32,
    offset: u32,
    parent_cluster: u32,
}

/// Bytes copied so far win over a late error.
fn short_read(done: usize, err: Error) -> Result<usize> {
    if done > 0 {
        Ok(done)
    } else {
        Err(err)
    }
}

impl<'a, D: BlockDevice> File<'a, D> {
    pub(crate) fn new(fs: &'a Fat32<D>, entry: &DirEntry, parent_cluster: u32) -> Self {
        Self {
            fs,
            name: entry.name,
            start_cluster: entry.first_cluster,
            current_cluster: entry.first_cluster,
            current_index: 0,
            size: entry.file_size,
            offset: 0,
            parent_cluster,
        }
    }

    /// Short name the file was opened by.
    pub fn name(&self) -> &ShortName {
        &self.name
    }

    pub fn first_cluster(&self) -> u32 {
        self.start_cluster
    }

    /// Cluster the last read ended in.
    pub fn current_cluster(&self) -> u32 {
        self.current_cluster
    }

    /// Position of [`current_cluster`](Self::current_cluster) in the chain.
    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    /// Cluster of the directory holding this file.
    pub fn parent_cluster(&self) -> u32 {
        self.parent_cluster
    }

    /// Read up to `buf.len()` bytes at the current offset.
    ///
    /// Returns 0 at end of file. If the cluster chain ends or the device
    /// fails after some bytes were copied, the short count is returned and
    /// the error is left for the next call.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.offset >= self.size {
            return Ok(0);
        }

        let dev = self.fs.device();
        let geo = self.fs.geometry();
        let cluster_size = geo.cluster_size;
        let spc = geo.sectors_per_cluster as u32;
        let want = buf.len().min((self.size - self.offset) as usize);
        let mut done = 0usize;

        while done < want {
            let index = self.offset / cluster_size;
            let cluster = match fat::cluster_at_index(dev, geo, self.start_cluster, index) {
                Ok(Link::Cluster(c)) => c,
                Ok(Link::EndOfChain) => {
                    warn!(
                        "fat32: {} is {} bytes but its chain ends at cluster {}",
                        self.name, self.size, index
                    );
                    return short_read(done, Error::InvalidCluster);
                }
                Err(e) => return short_read(done, e),
            };
            let first_sector = match fat::cluster_to_sector(geo, cluster) {
                Ok(s) => s,
                Err(e) => return short_read(done, e),
            };

            let in_cluster = self.offset % cluster_size;
            let mut sector = in_cluster / SECTOR_SIZE as u32;
            let mut in_sector = (in_cluster % SECTOR_SIZE as u32) as usize;
            while sector < spc && done < want {
                let mut scratch = [0u8; SECTOR_SIZE];
                if let Err(e) = dev.read_sector(first_sector + sector, &mut scratch) {
                    return short_read(done, e);
                }
                let n = (SECTOR_SIZE - in_sector).min(want - done);
                buf[done..done + n].copy_from_slice(&scratch[in_sector..in_sector + n]);
                done += n;
                self.offset += n as u32;
                sector += 1;
                in_sector = 0;
            }

            self.current_cluster = cluster;
            self.current_index = index;
            trace!("fat32: {} read up to offset {}", self.name, self.offset);

            if done < want {
                // The file claims more data: the chain must continue.
                match fat::next_cluster(dev, geo, cluster) {
                    Ok(Link::Cluster(_)) => {}
                    Ok(Link::EndOfChain) => break,
                    Err(e) => return short_read(done, e),
                }
            }
        }

        Ok(done)
    }

    /// Read until `buf` is full or the file ends.
    pub fn read_to_fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if total == 0 => return Err(e),
                Err(_) => break,
            }
        }
        Ok(total)
    }

    /// Move the offset. Targets before 0 or past the end are rejected and
    /// leave the offset unchanged; seeking exactly to the end is allowed.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u32> {
        let target = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(d) => (self.size as i64).checked_add(d).ok_or(Error::BadParam)?,
            SeekFrom::Current(d) => (self.offset as i64).checked_add(d).ok_or(Error::BadParam)?,
        };
        if target < 0 || target > self.size as i64 {
            return Err(Error::BadParam);
        }
        self.offset = target as u32;
        Ok(self.offset)
    }

    pub fn tell(&self) -> u32 {
        self.offset
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn eof(&self) -> bool {
        self.offset >= self.size
    }

    /// Close the file. There is nothing to release.
    pub fn close(self) -> Result<()> {
        Ok(())
    }
}
