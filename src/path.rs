//! Path splitting.

use crate::error::{Error, Result};

/// Maximum number of components in a path.
pub const MAX_COMPONENTS: usize = 16;
/// Maximum length of one component in bytes.
pub const MAX_COMPONENT_LEN: usize = 64;

/// A slash-separated path split into its non-empty components.
///
/// Empty segments and `.` segments are dropped, so `"./boot//kernel.bin"`
/// and `"/boot/kernel.bin"` are the same path.
#[derive(Debug, Clone, Copy)]
pub struct Path<'a> {
    parts: [&'a str; MAX_COMPONENTS],
    len: usize,
}

impl<'a> Path<'a> {
    /// Split `path`; more than [`MAX_COMPONENTS`] components or a component
    /// longer than [`MAX_COMPONENT_LEN`] is a bad parameter.
    pub fn parse(path: &'a str) -> Result<Self> {
        let mut parts = [""; MAX_COMPONENTS];
        let mut len = 0;
        for part in path.split('/').filter(|p| !p.is_empty() && *p != ".") {
            if len == MAX_COMPONENTS || part.len() > MAX_COMPONENT_LEN {
                return Err(Error::BadParam);
            }
            parts[len] = part;
            len += 1;
        }
        Ok(Self { parts, len })
    }

    pub fn components(&self) -> &[&'a str] {
        &self.parts[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The final component and the directories leading to it.
    pub fn split_last(&self) -> Option<(&'a str, &[&'a str])> {
        self.components()
            .split_last()
            .map(|(last, dirs)| (*last, dirs))
    }
}
