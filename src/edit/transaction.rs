//! Read-all / rewrite-all / atomic-replace protocol.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use filetime::FileTime;
use log::{debug, info, warn};

use crate::container::Backing;
use crate::crypto::{Password, Protection};
use crate::edit::{EditOptions, EditResult, Operation};
use crate::format::ArchiveFormat;
use crate::safety::LimitedWriter;
use crate::{Error, Result};

/// The stream a rewrite writes its new container into.
///
/// It applies the container's byte transform and the configured output cap
/// on top of the temporary file.
pub type StagingStream = Backing<LimitedWriter<File>>;

/// Identity of the backing file's on-disk state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: FileTime,
}

impl Fingerprint {
    fn of(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|source| Error::ContainerOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            len: meta.len(),
            modified: FileTime::from_last_modification_time(&meta),
        })
    }
}

/// A single rewrite of one archive.
///
/// The transaction borrows the format variant, which supplies the read
/// phase ([`ArchiveFormat::read_all`]) and the write phase
/// ([`ArchiveFormat::write_all`]). The transaction owns staging, the
/// fingerprint check and the final replace.
pub struct MutationTransaction<'a, F: ArchiveFormat + ?Sized> {
    format: &'a F,
    options: &'a EditOptions,
}

impl<'a, F: ArchiveFormat + ?Sized> MutationTransaction<'a, F> {
    /// Creates a transaction over `format`.
    pub fn new(format: &'a F, options: &'a EditOptions) -> Self {
        Self { format, options }
    }

    /// Reads every entry, applies `operations` and rewrites the archive
    /// under `protection`.
    ///
    /// # Errors
    ///
    /// Read-phase failures (wrong password, corrupt container) and
    /// validation failures ([`Error::EntryNotFound`], [`Error::DuplicatePath`])
    /// are returned as they are. Failures while writing or committing are
    /// wrapped in [`Error::PartialWriteFailure`]. The original file is
    /// unchanged in every case.
    pub fn run(
        &self,
        operations: &[Operation],
        password: Option<&Password>,
        protection: &Protection,
    ) -> Result<EditResult> {
        let path = self.format.handle().path();
        let before = Fingerprint::of(path)?;

        debug!("read phase: {}", path.display());
        let mut snapshot = self.format.read_all(password)?;
        let original_count = snapshot.entries.len();

        let mut result = EditResult::default();
        for op in operations {
            debug!("apply {} to {}", op.operation_type(), path.display());
            op.apply(&mut snapshot, &mut result)?;
        }
        debug_assert_eq!(original_count, snapshot.entries.len() + result.entries_deleted);
        result.entries_kept = snapshot.entries.len() - result.entries_renamed;
        result.total_bytes = snapshot.total_bytes();

        result.archive_bytes = self.commit(before, |stream| {
            self.format.write_all(stream, &snapshot, protection)
        })?;

        info!(
            "rewrote {}: {} kept, {} renamed, {} deleted",
            path.display(),
            result.entries_kept,
            result.entries_renamed,
            result.entries_deleted
        );
        Ok(result)
    }

    /// Copies the container byte-for-byte into staging, lets `patch` modify
    /// the copy, then commits it.
    ///
    /// Used for changes that touch only container metadata, so entries are
    /// neither decoded nor recompressed.
    pub fn patch(&self, patch: impl FnOnce(&mut StagingStream) -> Result<()>) -> Result<EditResult> {
        let path = self.format.handle().path();
        let before = Fingerprint::of(path)?;
        let entries = self.format.list_entries()?.len();

        let archive_bytes = self.commit(before, |stream| {
            let mut original = File::open(path)?;
            io::copy(&mut original, stream.get_mut())?;
            stream.seek(SeekFrom::Start(0))?;
            patch(stream)
        })?;

        info!("patched {}", path.display());
        Ok(EditResult {
            entries_kept: entries,
            archive_bytes,
            ..Default::default()
        })
    }

    /// Stages the new container and atomically replaces the original.
    fn commit(
        &self,
        before: Fingerprint,
        write: impl FnOnce(&mut StagingStream) -> Result<()>,
    ) -> Result<u64> {
        let handle = self.format.handle();
        let path = handle.path();
        let aborted = |source: Error| Error::PartialWriteFailure {
            path: path.to_path_buf(),
            source: Box::new(source),
        };

        let staging_dir = self.options.staging_dir_for(path);
        let temp = tempfile::Builder::new()
            .prefix(".zipup-")
            .suffix(".tmp")
            .tempfile_in(&staging_dir)
            .map_err(|e| aborted(e.into()))?;
        debug!("write phase: staging into {}", temp.path().display());

        let file = temp.reopen().map_err(|e| aborted(e.into()))?;
        let limit = self.options.output_limit().unwrap_or(u64::MAX);
        let mut stream = handle.wrap(LimitedWriter::new(file).max_bytes(limit));

        write(&mut stream).map_err(aborted)?;
        stream.flush().map_err(|e| aborted(e.into()))?;
        let file = stream.into_inner().into_inner();
        file.sync_all().map_err(|e| aborted(e.into()))?;
        let written = file.metadata().map_err(|e| aborted(e.into()))?.len();
        drop(file);

        if let Ok(meta) = fs::metadata(path) {
            if let Err(e) = fs::set_permissions(temp.path(), meta.permissions()) {
                warn!("could not copy permissions of {}: {e}", path.display());
            }
        }

        if self.options.detects_concurrent_modification() {
            let now = Fingerprint::of(path).map_err(aborted)?;
            if now != before {
                warn!("{} changed during rewrite, discarding staged copy", path.display());
                return Err(Error::ConcurrentModification {
                    path: path.to_path_buf(),
                });
            }
        }

        debug!("commit: replacing {}", path.display());
        temp.persist(path).map_err(|e| aborted(e.error.into()))?;
        Ok(written)
    }
}
