//! Backing-file access for archive containers.
//!
//! An [`ArchiveHandle`] records which container format a path holds and
//! whether its bytes are obfuscated. Every operation opens the backing file
//! through [`ArchiveHandle::open`], works on the returned [`Backing`] stream
//! and drops it before returning; handles never keep a file open.
//!
//! | Extension | Format | Obfuscated | Compression |
//! |-----------|--------|------------|-------------|
//! | `.zip` | ZIP | no | deflate |
//! | `.arc` | ZIP | yes ([`XorStream`]) | zstd level 1, or deflate |
//! | `.tar` | TAR | no | none |

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;

use crate::cipher::XorStream;
use crate::format::FormatKind;
use crate::{Error, Result};

/// How the backing file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read only; the file must exist.
    Read,
    /// Create or truncate, read-write.
    Write,
    /// Open existing or create, read-write, without truncating.
    Append,
}

/// Returns true if this build writes zstd-compressed `.arc` entries.
pub const fn zstd_supported() -> bool {
    cfg!(feature = "zstd")
}

/// A backing path with its detected container format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    path: PathBuf,
    format: FormatKind,
    obfuscated: bool,
}

impl ArchiveHandle {
    /// Detects the container format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for extensions other than
    /// `.zip`, `.arc` and `.tar` (compared case-insensitively).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let (format, obfuscated) = match ext.as_deref() {
            Some("zip") => (FormatKind::Zip, false),
            Some("arc") => (FormatKind::Zip, true),
            Some("tar") => (FormatKind::Tar, false),
            _ => {
                return Err(Error::UnsupportedFormat {
                    format: None,
                    operation: format!("opening '{}'", path.display()),
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            format,
            obfuscated,
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the container format.
    pub fn format(&self) -> FormatKind {
        self.format
    }

    /// Returns true if the container bytes are XOR-obfuscated.
    pub fn is_obfuscated(&self) -> bool {
        self.obfuscated
    }

    /// Opens the backing file in `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ContainerOpen`] if the file cannot be opened.
    pub fn open(&self, mode: OpenMode) -> Result<Backing<File>> {
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.read(true).write(true).create(true).truncate(true),
            OpenMode::Append => options.read(true).write(true).create(true).truncate(false),
        };
        let file = options.open(&self.path).map_err(|source| Error::ContainerOpen {
            path: self.path.clone(),
            source,
        })?;
        log::trace!("opened {} ({mode:?})", self.path.display());
        Ok(self.wrap(file))
    }

    /// Wraps an arbitrary stream with this container's byte transform.
    pub fn wrap<S>(&self, stream: S) -> Backing<S> {
        if self.obfuscated {
            Backing::Obfuscated(XorStream::new(stream))
        } else {
            Backing::Plain(stream)
        }
    }

    /// Returns the compression method for newly written entries.
    pub fn compression(&self) -> CompressionMethod {
        compression_for(self)
    }
}

/// Selects the entry compression method for a container.
///
/// Obfuscated containers use zstd at level 1 when the `zstd` feature is
/// enabled; everything else uses deflate.
pub fn compression_for(handle: &ArchiveHandle) -> CompressionMethod {
    match block_compression() {
        Some(method) if handle.is_obfuscated() => method,
        _ => CompressionMethod::Deflated,
    }
}

#[cfg(feature = "zstd")]
fn block_compression() -> Option<CompressionMethod> {
    Some(CompressionMethod::Zstd)
}

#[cfg(not(feature = "zstd"))]
fn block_compression() -> Option<CompressionMethod> {
    None
}

/// Compression level matching [`compression_for`].
pub(crate) fn compression_level_for(handle: &ArchiveHandle) -> Option<i64> {
    match compression_for(handle) {
        CompressionMethod::Deflated => None,
        _ => Some(1),
    }
}

/// A backing stream, transformed or not.
#[derive(Debug)]
pub enum Backing<S> {
    /// Bytes pass through unchanged.
    Plain(S),
    /// Bytes pass through [`XorStream`].
    Obfuscated(XorStream<S>),
}

impl<S> Backing<S> {
    /// Returns the raw stream underneath any transform.
    pub fn get_mut(&mut self) -> &mut S {
        match self {
            Backing::Plain(s) => s,
            Backing::Obfuscated(x) => x.get_mut(),
        }
    }

    /// Unwraps the raw stream.
    pub fn into_inner(self) -> S {
        match self {
            Backing::Plain(s) => s,
            Backing::Obfuscated(x) => x.into_inner(),
        }
    }
}

impl Backing<File> {
    /// Truncates the file at the current stream position.
    ///
    /// Used after an in-place append whose new end lies before the old one.
    pub(crate) fn truncate_here(&mut self) -> io::Result<()> {
        let end = self.stream_position()?;
        let file = self.get_mut();
        file.set_len(end)?;
        file.sync_all()
    }
}

impl<S: Read> Read for Backing<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Backing::Plain(s) => s.read(buf),
            Backing::Obfuscated(x) => x.read(buf),
        }
    }
}

impl<S: Write> Write for Backing<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Backing::Plain(s) => s.write(buf),
            Backing::Obfuscated(x) => x.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Backing::Plain(s) => s.flush(),
            Backing::Obfuscated(x) => x.flush(),
        }
    }
}

impl<S: Seek> Seek for Backing<S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Backing::Plain(s) => s.seek(pos),
            Backing::Obfuscated(x) => x.seek(pos),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::ARC_KEY;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_format_detection() {
        let zip = ArchiveHandle::from_path("a/b.ZIP").unwrap();
        assert_eq!(zip.format(), FormatKind::Zip);
        assert!(!zip.is_obfuscated());

        let arc = ArchiveHandle::from_path("b.arc").unwrap();
        assert_eq!(arc.format(), FormatKind::Zip);
        assert!(arc.is_obfuscated());

        let tar = ArchiveHandle::from_path("c.tar").unwrap();
        assert_eq!(tar.format(), FormatKind::Tar);
    }

    #[test]
    fn test_unknown_extension() {
        for bad in ["notes.txt", "archive.tar.gz", "noext"] {
            let err = ArchiveHandle::from_path(bad).unwrap_err();
            assert!(matches!(err, Error::UnsupportedFormat { format: None, .. }));
        }
    }

    #[test]
    fn test_compression_selection() {
        let zip = ArchiveHandle::from_path("a.zip").unwrap();
        assert_eq!(compression_for(&zip), CompressionMethod::Deflated);
        assert_eq!(compression_level_for(&zip), None);

        let arc = ArchiveHandle::from_path("a.arc").unwrap();
        if zstd_supported() {
            assert_ne!(compression_for(&arc), CompressionMethod::Deflated);
            assert_eq!(compression_level_for(&arc), Some(1));
        } else {
            assert_eq!(compression_for(&arc), CompressionMethod::Deflated);
        }
    }

    #[test]
    fn test_open_missing_file_for_read() {
        let dir = TempDir::new().unwrap();
        let handle = ArchiveHandle::from_path(dir.path().join("missing.zip")).unwrap();
        let err = handle.open(OpenMode::Read).unwrap_err();
        assert!(matches!(err, Error::ContainerOpen { .. }));
    }

    #[test]
    fn test_append_creates_without_truncating() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.zip");
        std::fs::write(&path, b"existing").unwrap();

        let handle = ArchiveHandle::from_path(&path).unwrap();
        drop(handle.open(OpenMode::Append).unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"existing");

        drop(handle.open(OpenMode::Write).unwrap());
        assert!(std::fs::read(&path).unwrap().is_empty());
    }

    #[test]
    fn test_obfuscated_wrap_transforms_bytes() {
        let handle = ArchiveHandle::from_path("x.arc").unwrap();
        let mut backing = handle.wrap(Cursor::new(Vec::new()));
        backing.write_all(b"PK").unwrap();
        let raw = backing.into_inner().into_inner();
        assert_eq!(raw, vec![b'P' ^ ARC_KEY, b'K' ^ ARC_KEY]);
    }

    #[test]
    fn test_truncate_here() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.zip");
        std::fs::write(&path, b"0123456789").unwrap();
        let handle = ArchiveHandle::from_path(&path).unwrap();
        let mut backing = handle.open(OpenMode::Append).unwrap();
        backing.seek(SeekFrom::Start(4)).unwrap();
        backing.truncate_here().unwrap();
        drop(backing);
        assert_eq!(std::fs::read(&path).unwrap(), b"0123");
    }
}
