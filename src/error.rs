//! Errors for the FAT32 driver.

use core::fmt;

/// Result alias used by this crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors returned by the FAT32 driver.
///
/// Every variant maps to a small negative status code (see [`Error::code`])
/// for callers that still speak integer return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Underlying device I/O error, or the FAT marks a cluster as bad.
    Io,
    /// No FAT32 volume found, or a required boot sector field is zero.
    InvalidBootSector,
    /// Argument out of range (seek target, path limits, cluster < 2).
    BadParam,
    /// The final path component was not found.
    NoFile,
    /// An intermediate path component was not found.
    NoPath,
    /// The path names a directory where a file was expected.
    IsDir,
    /// An intermediate path component names a file, not a directory.
    NotDir,
    /// Internal corruption (reserved FAT values, chain shorter than expected).
    CorruptedFs,
    /// The root directory holds no volume label entry.
    NoLabel,
    /// A cluster number outside the data region.
    InvalidCluster,
}

impl Error {
    /// Negative status code for this error.
    pub const fn code(self) -> i32 {
        match self {
            Error::Io => -1,
            Error::InvalidBootSector => -2,
            Error::NoFile => -3,
            Error::BadParam => -4,
            Error::CorruptedFs => -5,
            Error::NoPath => -8,
            Error::IsDir => -9,
            Error::NotDir => -10,
            Error::NoLabel => -12,
            Error::InvalidCluster => -13,
        }
    }

    /// Inverse of [`Error::code`].
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Error::Io,
            -2 => Error::InvalidBootSector,
            -3 => Error::NoFile,
            -4 => Error::BadParam,
            -5 => Error::CorruptedFs,
            -8 => Error::NoPath,
            -9 => Error::IsDir,
            -10 => Error::NotDir,
            -12 => Error::NoLabel,
            -13 => Error::InvalidCluster,
            _ => return None,
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Io => "I/O error",
            Error::InvalidBootSector => "invalid boot sector",
            Error::BadParam => "bad parameter",
            Error::NoFile => "no such file",
            Error::NoPath => "no such path",
            Error::IsDir => "is a directory",
            Error::NotDir => "not a directory",
            Error::CorruptedFs => "corrupted filesystem",
            Error::NoLabel => "no volume label",
            Error::InvalidCluster => "invalid cluster",
        };
        f.write_str(msg)
    }
}
