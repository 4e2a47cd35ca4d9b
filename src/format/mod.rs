//! Container format variants behind one capability set.
//!
//! [`ArchiveFormat`] is implemented by [`ZipFormat`](zip::ZipFormat) (plain
//! `.zip` and obfuscated `.arc`) and [`TarFormat`](tar::TarFormat). The
//! variant is chosen once, from the file extension, by [`open_format`];
//! nothing above this module branches on the container type.
//!
//! Operations that remove or move committed bytes (delete, rename, TAR
//! comments, password changes) are provided methods that run a
//! [`MutationTransaction`]. The variants only supply the read phase
//! ([`read_all`](ArchiveFormat::read_all)) and the write phase
//! ([`write_all`](ArchiveFormat::write_all)).

pub mod tar;
pub mod zip;

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use filetime::FileTime;

use crate::container::ArchiveHandle;
use crate::crypto::{CipherScheme, Password, PasswordState, Protection};
use crate::edit::{EditOptions, EditResult, MutationTransaction, Operation};
use crate::entry::{Entry, Snapshot, StagedEntry, is_comment_sentinel};
use crate::safety::validate_extract_path;
use crate::{Error, Result};

/// Container format family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// ZIP structure, plain or obfuscated.
    Zip,
    /// POSIX/GNU tar.
    Tar,
}

impl FormatKind {
    /// Short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::Zip => "zip",
            FormatKind::Tar => "tar",
        }
    }

    /// Returns true if entries of this format can be password protected.
    pub fn supports_password(&self) -> bool {
        matches!(self, FormatKind::Zip)
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Object-safe `Write + Seek`, the sink type of [`ArchiveFormat::write_all`].
pub trait WriteSeek: Write + Seek {}

impl<T: Write + Seek> WriteSeek for T {}

/// Callback receiving each visited entry and a reader over its decoded bytes.
pub type EntryVisitor<'v> = dyn FnMut(&Entry, &mut dyn Read) -> Result<()> + 'v;

/// Uniform operations over one archive file.
///
/// Implementations open the backing file inside every call and close it
/// before returning.
pub trait ArchiveFormat {
    /// Returns the backing file handle.
    fn handle(&self) -> &ArchiveHandle;

    /// Returns the container format.
    fn kind(&self) -> FormatKind {
        self.handle().format()
    }

    /// Creates (or truncates to) an empty container.
    fn create(&self) -> Result<()>;

    /// Lists entries in stored order. The TAR comment entry is not listed.
    fn list_entries(&self) -> Result<Vec<Entry>>;

    /// Reads one entry's decoded bytes.
    ///
    /// # Errors
    ///
    /// [`Error::EntryNotFound`] if no entry has exactly this path;
    /// [`Error::PasswordRequired`] or [`Error::WrongPassword`] for protected
    /// entries without a working password.
    fn read_entry(&self, path: &str, password: Option<&Password>) -> Result<Vec<u8>>;

    /// Appends entries in place.
    ///
    /// Callers are expected to pre-filter paths that already exist.
    fn write_entries(&self, entries: &[StagedEntry], protection: &Protection) -> Result<()>;

    /// Appends one file entry in place.
    fn write_entry(&self, path: &str, data: Vec<u8>, protection: &Protection) -> Result<()> {
        self.write_entries(&[StagedEntry::file(path, data)], protection)
    }

    /// Streams the selected entries to `visitor`, in stored order.
    fn visit_entries(
        &self,
        password: Option<&Password>,
        select: &dyn Fn(&Entry) -> bool,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<()>;

    /// Reads the whole archive into memory: the read phase of a rewrite.
    fn read_all(&self, password: Option<&Password>) -> Result<Snapshot>;

    /// Writes `snapshot` as a complete new container: the write phase.
    fn write_all(
        &self,
        sink: &mut dyn WriteSeek,
        snapshot: &Snapshot,
        protection: &Protection,
    ) -> Result<()>;

    /// Returns the archive comment, or an empty string.
    fn comment(&self) -> Result<String>;

    /// Replaces the archive comment. An empty text removes it.
    fn set_comment(
        &self,
        text: &str,
        password: Option<&Password>,
        options: &EditOptions,
    ) -> Result<EditResult> {
        let protection = self.rewrite_protection(password)?;
        MutationTransaction::new(self, options).run(
            &[Operation::SetComment {
                text: text.to_string(),
            }],
            password,
            &protection,
        )
    }

    /// Infers the archive's protection from its entries.
    fn password_state(&self) -> Result<PasswordState> {
        Ok(PasswordState::UNPROTECTED)
    }

    /// Protection that keeps a rewritten archive as protected as it is now.
    fn rewrite_protection(&self, _password: Option<&Password>) -> Result<Protection> {
        Ok(Protection::None)
    }

    /// Re-encodes every entry: decode with `old`, encode with `new` under
    /// `scheme`. `new = None` removes protection.
    fn set_password(
        &self,
        _old: Option<&Password>,
        _new: Option<&Password>,
        _scheme: CipherScheme,
        _options: &EditOptions,
    ) -> Result<EditResult> {
        Err(Error::unsupported(self.kind(), "password protection"))
    }

    /// Decodes every entry with `password` without writing anything.
    fn verify_password(&self, password: Option<&Password>) -> Result<()> {
        self.visit_entries(password, &|_| true, &mut |_, reader| {
            io::copy(reader, &mut io::sink())?;
            Ok(())
        })
    }

    /// Deletes files, or folders with their whole subtree.
    fn delete_entries(
        &self,
        paths: &[String],
        password: Option<&Password>,
        options: &EditOptions,
    ) -> Result<EditResult> {
        let protection = self.rewrite_protection(password)?;
        MutationTransaction::new(self, options).run(
            &[Operation::Delete {
                paths: paths.to_vec(),
            }],
            password,
            &protection,
        )
    }

    /// Renames a file, or moves a folder prefix and everything below it.
    fn rename_entry(
        &self,
        from: &str,
        to: &str,
        password: Option<&Password>,
        options: &EditOptions,
    ) -> Result<EditResult> {
        let protection = self.rewrite_protection(password)?;
        MutationTransaction::new(self, options).run(
            &[Operation::Rename {
                from: from.to_string(),
                to: to.to_string(),
            }],
            password,
            &protection,
        )
    }

    /// Extracts every entry below `dest`, returning the number written.
    ///
    /// The comment entry is never written out.
    fn extract_all(&self, dest: &Path, password: Option<&Password>) -> Result<usize> {
        extract_matching(self, dest, password, &|_| true)
    }

    /// Extracts the given files and folder subtrees below `dest`.
    ///
    /// # Errors
    ///
    /// [`Error::EntryNotFound`] if a selected path matches nothing; checked
    /// before anything is written.
    fn extract_selected(
        &self,
        paths: &[String],
        dest: &Path,
        password: Option<&Password>,
    ) -> Result<usize> {
        let entries = self.list_entries()?;
        for path in paths {
            if !entries.iter().any(|e| path_covers(path, &e.path)) {
                return Err(Error::EntryNotFound { path: path.clone() });
            }
        }
        extract_matching(self, dest, password, &|entry| {
            paths.iter().any(|p| path_covers(p, &entry.path))
        })
    }
}

/// Returns true if `selected` names `path` itself or a folder containing it.
pub(crate) fn path_covers(selected: &str, path: &str) -> bool {
    if selected.ends_with('/') {
        path.starts_with(selected)
    } else {
        path == selected
    }
}

fn extract_matching<F: ArchiveFormat + ?Sized>(
    format: &F,
    dest: &Path,
    password: Option<&Password>,
    select: &dyn Fn(&Entry) -> bool,
) -> Result<usize> {
    fs::create_dir_all(dest)?;
    let mut count = 0usize;
    let select = |entry: &Entry| !is_comment_sentinel(&entry.path) && select(entry);
    format.visit_entries(password, &select, &mut |entry, reader| {
        let target = validate_extract_path(&entry.path, dest)?;
        if entry.is_directory {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(reader, &mut out)?;
            drop(out);
            if let Some(modified) = entry.modified {
                let mtime = FileTime::from_unix_time(modified.as_unix_secs(), 0);
                if let Err(e) = filetime::set_file_mtime(&target, mtime) {
                    log::debug!("could not set mtime of {}: {e}", target.display());
                }
            }
        }
        count += 1;
        Ok(())
    })?;
    log::info!(
        "extracted {count} entries from {} to {}",
        format.handle().path().display(),
        dest.display()
    );
    Ok(count)
}

/// Opens the format variant matching the file extension.
///
/// Nothing is read yet; the backing file does not need to exist.
///
/// # Errors
///
/// [`Error::UnsupportedFormat`] for extensions other than `.zip`, `.arc`
/// and `.tar`.
pub fn open_format(path: impl AsRef<Path>) -> Result<Box<dyn ArchiveFormat>> {
    let handle = ArchiveHandle::from_path(path)?;
    Ok(match handle.format() {
        FormatKind::Zip => Box::new(self::zip::ZipFormat::new(handle)),
        FormatKind::Tar => Box::new(self::tar::TarFormat::new(handle)),
    })
}
