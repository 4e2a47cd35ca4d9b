//! Atomic archive mutation.
//!
//! ZIP and TAR cannot delete or rename entries in place. Every such change
//! is therefore performed by a [`MutationTransaction`]:
//!
//! 1. Fingerprint the backing file and read every entry into a
//!    [`Snapshot`](crate::entry::Snapshot), decoding protected entries with
//!    the current password.
//! 2. Apply the requested [`Operation`]s to the snapshot. Missing targets and
//!    path collisions are reported here, before any output exists.
//! 3. Write the new container into a temporary file next to the original.
//! 4. Check the fingerprint again and atomically rename the temporary file
//!    over the original.
//!
//! A failure at any step leaves the original file byte-for-byte unchanged;
//! the temporary file is removed when the transaction is dropped.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipup::edit::{EditOptions, Operation};
//! use zipup::format::open_format;
//!
//! let format = open_format("photos.zip")?;
//! let result = format.delete_entries(&["old/".to_string()], None, &EditOptions::default())?;
//! println!("deleted {} entries, kept {}", result.entries_deleted, result.entries_kept);
//! # Ok::<(), zipup::Error>(())
//! ```

mod operation;
mod transaction;

pub use operation::Operation;
pub use transaction::{MutationTransaction, StagingStream};

use std::path::{Path, PathBuf};

/// Outcome of a committed mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditResult {
    /// Entries carried over without a path change.
    pub entries_kept: usize,
    /// Entries whose path changed.
    pub entries_renamed: usize,
    /// Entries removed.
    pub entries_deleted: usize,
    /// Entries added.
    pub entries_added: usize,
    /// Uncompressed payload bytes in the new archive.
    pub total_bytes: u64,
    /// Size of the new backing file.
    pub archive_bytes: u64,
    /// Capability fallbacks and other notices the caller should surface.
    pub warnings: Vec<String>,
}

impl EditResult {
    /// Returns the number of entries in the resulting archive.
    pub fn total_entries(&self) -> usize {
        self.entries_kept + self.entries_renamed + self.entries_added
    }
}

/// Settings for rewrites.
///
/// ```rust
/// use zipup::edit::EditOptions;
///
/// let options = EditOptions::new()
///     .max_output_bytes(64 * 1024 * 1024)
///     .detect_concurrent_modification(false);
/// assert_eq!(options.output_limit(), Some(64 * 1024 * 1024));
/// ```
#[derive(Debug, Clone)]
pub struct EditOptions {
    staging_dir: Option<PathBuf>,
    max_output_bytes: Option<u64>,
    detect_concurrent_modification: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            staging_dir: None,
            max_output_bytes: None,
            detect_concurrent_modification: true,
        }
    }
}

impl EditOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the directory for the temporary rewrite file.
    ///
    /// Defaults to the backing file's directory. A directory on another file
    /// system makes the final replace a copy instead of an atomic rename, and
    /// the commit fails.
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Caps the size of the rewritten container.
    ///
    /// Exceeding the cap aborts the rewrite with
    /// [`Error::PartialWriteFailure`](crate::Error::PartialWriteFailure).
    pub fn max_output_bytes(mut self, max: u64) -> Self {
        self.max_output_bytes = Some(max);
        self
    }

    /// Enables or disables the pre-commit check for external modification.
    pub fn detect_concurrent_modification(mut self, enabled: bool) -> Self {
        self.detect_concurrent_modification = enabled;
        self
    }

    /// Returns the configured output cap.
    pub fn output_limit(&self) -> Option<u64> {
        self.max_output_bytes
    }

    /// Returns the directory used for the temporary file of `backing`.
    pub fn staging_dir_for(&self, backing: &Path) -> PathBuf {
        match &self.staging_dir {
            Some(dir) => dir.clone(),
            None => match backing.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }

    /// Returns true if the pre-commit fingerprint check is enabled.
    pub fn detects_concurrent_modification(&self) -> bool {
        self.detect_concurrent_modification
    }
}
