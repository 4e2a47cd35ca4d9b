//! Extraction path checks and output size limits.
//!
//! [`validate_extract_path`] keeps extracted entries inside the destination
//! directory. [`LimitedWriter`] caps how many bytes a rewritten container may
//! occupy; hitting the cap fails the write the same way a full disk would.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Validates an entry path for extraction and returns the target path.
///
/// Entries are rejected with [`Error::PathTraversal`] when they are absolute,
/// carry a drive or UNC prefix, contain `..` segments, or would resolve
/// (through existing symlinks) outside of `dest_root`.
///
/// `dest_root` must exist.
pub fn validate_extract_path(entry_path: &str, dest_root: &Path) -> Result<PathBuf> {
    let traversal = || Error::PathTraversal {
        path: entry_path.to_string(),
    };

    let normalized = entry_path.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(traversal());
    }
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(traversal());
    }

    let relative = Path::new(normalized.trim_end_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(traversal());
    }

    let full_path = dest_root.join(relative);
    let canonical_dest = dest_root.canonicalize()?;

    // Canonicalize the deepest existing ancestor, then re-append the rest.
    let mut ancestor = full_path.as_path();
    let mut missing = Vec::new();
    while !ancestor.exists() {
        match (ancestor.file_name(), ancestor.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                ancestor = parent;
            }
            _ => return Err(traversal()),
        }
    }
    let mut resolved = ancestor.canonicalize()?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }

    if !resolved.starts_with(&canonical_dest) {
        return Err(traversal());
    }
    Ok(full_path)
}

/// A writer wrapper that refuses to grow its output past a byte limit.
///
/// The limit applies to the highest offset ever written, so writers that
/// seek back to patch headers are measured by final size, not by the total
/// number of bytes passed to `write`. Exceeding it fails with
/// [`io::ErrorKind::StorageFull`].
pub struct LimitedWriter<W> {
    inner: W,
    max_bytes: u64,
    position: u64,
    high_water: u64,
}

impl<W> LimitedWriter<W> {
    /// Creates a writer with no limit.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            max_bytes: u64::MAX,
            position: 0,
            high_water: 0,
        }
    }

    /// Sets the maximum output size in bytes.
    pub fn max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = max;
        self
    }

    /// Returns the largest offset written so far.
    pub fn bytes_written(&self) -> u64 {
        self.high_water
    }

    /// Returns a mutable reference to the inner writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwraps the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for LimitedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let end = self.position.saturating_add(buf.len() as u64);
        if end > self.max_bytes {
            return Err(io::Error::new(
                io::ErrorKind::StorageFull,
                format!("output would exceed limit of {} bytes", self.max_bytes),
            ));
        }
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        self.high_water = self.high_water.max(self.position);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// Reads are passed through so a staged container can be reopened for append.
impl<W: Read> Read for LimitedWriter<W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<W: Seek> Seek for LimitedWriter<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.position = self.inner.seek(pos)?;
        Ok(self.position)
    }
}

impl<W> std::fmt::Debug for LimitedWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedWriter")
            .field("max_bytes", &self.max_bytes)
            .field("position", &self.position)
            .field("high_water", &self.high_water)
            .finish_non_exhaustive()
    }
}
