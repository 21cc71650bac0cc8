//! Read-only FAT32 driver for boot environments.
//!
//! Mount a volume from any [`BlockDevice`], resolve 8.3 paths and stream
//! file contents into caller buffers. No heap is needed.

#![cfg_attr(not(test), no_std)]

pub mod bpb;
pub mod device;
pub mod dir;
pub mod error;
pub mod fat;
pub mod file;
pub mod fs;
pub mod mbr;
pub mod path;

#[cfg(test)]
mod testutil;

pub use crate::device::{BlockDevice, FnDevice, SharedDevice, SECTOR_SIZE};
pub use crate::dir::{Dir, DirEntry, ShortName, VolumeLabel, LABEL_LEN, SHORT_NAME_LEN};
pub use crate::error::{Error, Result};
pub use crate::file::{File, SeekFrom};
pub use crate::fs::Fat32;
pub use crate::path::{MAX_COMPONENTS, MAX_COMPONENT_LEN};
