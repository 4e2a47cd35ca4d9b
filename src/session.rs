//! The state a front end keeps between user actions.
//!
//! A [`Session`] holds the open archive, the virtual folder being browsed and
//! the password the user last supplied. The backing file itself is only open
//! for the duration of each call.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipup::{Password, Session};
//!
//! fn main() -> zipup::Result<()> {
//!     let mut session = Session::create("backup.zip")?;
//!     session.add_files(&["notes.txt"])?;
//!     session.create_folder("photos")?;
//!     session.enter("photos/")?;
//!     session.add_files(&["cat.jpg"])?;
//!
//!     session.set_password(None, Some(Password::new("secret")), zipup::CipherScheme::Aes)?;
//!     for row in &session.view().rows {
//!         println!("{} {}", row.display_name, row.size_label);
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use log::{info, warn};
use tempfile::TempPath;
use walkdir::WalkDir;

use crate::archive_path::{EntryPath, join_prefix};
use crate::crypto::{CipherScheme, Password, PasswordState, Protection};
use crate::edit::{EditOptions, EditResult};
use crate::entry::{Entry, StagedEntry};
use crate::format::{ArchiveFormat, FormatKind, open_format};
use crate::view::{DirectoryProjector, SearchHit, VirtualFolderView, parent_prefix, search};
use crate::{Error, Result, Timestamp};

/// An open archive plus browsing state.
pub struct Session {
    format: Box<dyn ArchiveFormat>,
    prefix: String,
    password: Option<Password>,
    options: EditOptions,
    view: VirtualFolderView,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.format.handle().path())
            .field("format", &self.format.kind())
            .field("prefix", &self.prefix)
            .field("has_session_password", &self.password.is_some())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Opens an existing archive and projects its root.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedFormat`] for unknown extensions,
    /// [`Error::ContainerOpen`] if the file cannot be read and
    /// [`Error::CorruptContainer`] if it does not parse.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let format = open_format(path)?;
        let mut session = Self {
            format,
            prefix: String::new(),
            password: None,
            options: EditOptions::default(),
            view: VirtualFolderView::default(),
        };
        session.refresh()?;
        info!(
            "opened {} ({}, {} entries)",
            session.path().display(),
            session.format.kind(),
            session.view.len()
        );
        Ok(session)
    }

    /// Creates an empty archive, replacing any existing file, and opens it.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        open_format(path.as_ref())?.create()?;
        Self::open(path)
    }

    /// Sets the options used by rewriting operations.
    pub fn with_options(mut self, options: EditOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        self.format.handle().path()
    }

    /// Returns the container format.
    pub fn format_kind(&self) -> FormatKind {
        self.format.kind()
    }

    /// Returns the format variant, for operations not wrapped here.
    pub fn format(&self) -> &dyn ArchiveFormat {
        self.format.as_ref()
    }

    /// Returns the folder currently browsed, `""` for the root.
    pub fn current_prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the view of the current folder as of the last refresh.
    pub fn view(&self) -> &VirtualFolderView {
        &self.view
    }

    /// Re-reads the entry list and rebuilds the current view.
    pub fn refresh(&mut self) -> Result<&VirtualFolderView> {
        let entries = self.format.list_entries()?;
        self.view = DirectoryProjector::project(&entries, &self.prefix);
        Ok(&self.view)
    }

    /// Projects an arbitrary folder without changing the current one.
    pub fn list(&self, prefix: &str) -> Result<VirtualFolderView> {
        let entries = self.format.list_entries()?;
        Ok(DirectoryProjector::project(&entries, prefix))
    }

    /// Lists every entry in stored order.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        self.format.list_entries()
    }

    // Navigation

    /// Enters a folder row of the current view; `..` goes up.
    ///
    /// # Errors
    ///
    /// [`Error::EntryNotFound`] if the view has no such row and
    /// [`Error::InvalidEntryPath`] if the row is a file.
    pub fn enter(&mut self, display_name: &str) -> Result<&VirtualFolderView> {
        let row = self
            .view
            .row(display_name)
            .ok_or_else(|| Error::EntryNotFound {
                path: join_prefix(&self.prefix, display_name),
            })?;
        if !row.is_directory {
            return Err(Error::InvalidEntryPath(format!(
                "'{display_name}' is not a folder"
            )));
        }
        self.prefix = row.full_path(&self.prefix);
        self.refresh()
    }

    /// Moves to the parent folder. Does nothing at the root.
    pub fn up(&mut self) -> Result<&VirtualFolderView> {
        self.prefix = parent_prefix(&self.prefix);
        self.refresh()
    }

    /// Returns to the root folder.
    pub fn reset(&mut self) -> Result<&VirtualFolderView> {
        self.prefix.clear();
        self.refresh()
    }

    /// Jumps to a folder prefix (`""` or ending with `/`).
    pub fn set_prefix(&mut self, prefix: &str) -> Result<&VirtualFolderView> {
        if !prefix.is_empty() {
            EntryPath::directory(prefix)?;
        }
        self.prefix = match prefix {
            "" => String::new(),
            p if p.ends_with('/') => p.to_string(),
            p => format!("{p}/"),
        };
        self.refresh()
    }

    // Passwords

    /// Sets the password used for reading and for rewriting protected entries.
    pub fn set_session_password(&mut self, password: Option<Password>) {
        self.password = password.filter(|p| !p.is_empty());
    }

    /// Returns the password set for this session.
    pub fn session_password(&self) -> Option<&Password> {
        self.password.as_ref()
    }

    /// Inspects per-entry encryption flags.
    pub fn password_state(&self) -> Result<PasswordState> {
        self.format.password_state()
    }

    /// Returns true if any entry is encrypted.
    pub fn has_password(&self) -> Result<bool> {
        Ok(self.password_state()?.has_password)
    }

    /// Decodes every entry with `password`, or the session password when
    /// `None`, without changing anything.
    pub fn verify_password(&self, password: Option<&Password>) -> Result<()> {
        self.format
            .verify_password(password.or(self.password.as_ref()))
    }

    /// Re-encodes the archive under a new password.
    ///
    /// `old` defaults to the session password. `new = None` removes
    /// protection. On success the session password becomes `new`.
    pub fn set_password(
        &mut self,
        old: Option<Password>,
        new: Option<Password>,
        scheme: CipherScheme,
    ) -> Result<EditResult> {
        let old = old.or_else(|| self.password.clone());
        let result =
            self.format
                .set_password(old.as_ref(), new.as_ref(), scheme, &self.options)?;
        self.set_session_password(new);
        self.refresh()?;
        Ok(result)
    }

    // Reading

    /// Reads one entry's bytes with the session password.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.format.read_entry(path, self.password.as_ref())
    }

    /// Writes one entry to a temporary file that keeps the entry's
    /// extension, for handing to an external viewer.
    ///
    /// The file is removed when the returned path is dropped.
    pub fn materialize_entry(&self, path: &str) -> Result<TempPath> {
        let data = self.read(path)?;
        let entry_path = EntryPath::new(path)?;
        let suffix = entry_path
            .extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("zipup-view-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&data)?;
        file.flush()?;
        Ok(file.into_temp_path())
    }

    /// Searches full entry paths for `needle`, ignoring case.
    pub fn search(&self, needle: &str) -> Result<Vec<SearchHit>> {
        let entries = self.format.list_entries()?;
        Ok(search(&entries, needle, &self.prefix))
    }

    /// Returns the archive comment.
    pub fn comment(&self) -> Result<String> {
        self.format.comment()
    }

    // Mutations

    /// Adds one entry at a full path.
    pub fn add(&mut self, path: &str, data: Vec<u8>) -> Result<EditResult> {
        EntryPath::new(path)?;
        self.append(vec![StagedEntry::file(path, data)])
    }

    /// Adds disk files into the current folder under their file names.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicatePath`] if a target path already exists; nothing is
    /// written in that case. [`Error::InvalidEntryPath`] for directories, which
    /// go through [`add_directory_tree`](Self::add_directory_tree).
    pub fn add_files<P: AsRef<Path>>(&mut self, files: &[P]) -> Result<EditResult> {
        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            let file = file.as_ref();
            let meta = fs::metadata(file)?;
            if meta.is_dir() {
                return Err(Error::InvalidEntryPath(format!(
                    "{} is a directory",
                    file.display()
                )));
            }
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::InvalidEntryPath(file.display().to_string()))?;
            let path = join_prefix(&self.prefix, &name);
            EntryPath::new(&path)?;
            staged.push(stage_file(file, path, &meta)?);
        }
        self.append(staged)
    }

    /// Adds every file below `dir`, keeping paths relative to `dir`, into
    /// the current folder.
    ///
    /// Directories are not written as markers; they stay implicit.
    pub fn add_directory_tree(&mut self, dir: impl AsRef<Path>) -> Result<EditResult> {
        let dir = dir.as_ref();
        let mut staged = Vec::new();
        for item in WalkDir::new(dir).sort_by_file_name() {
            let item = item.map_err(std::io::Error::from)?;
            if !item.file_type().is_file() {
                continue;
            }
            let relative = item
                .path()
                .strip_prefix(dir)
                .map_err(|_| Error::InvalidEntryPath(item.path().display().to_string()))?;
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let path = join_prefix(&self.prefix, &relative.join("/"));
            EntryPath::new(&path)?;
            let meta = item.metadata().map_err(std::io::Error::from)?;
            staged.push(stage_file(item.path(), path, &meta)?);
        }
        self.append(staged)
    }

    /// Adds an explicit empty folder `name/` to the current folder.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicatePath`] if the folder already exists, explicitly or
    /// as the prefix of other entries.
    pub fn create_folder(&mut self, name: &str) -> Result<EditResult> {
        let name = name.trim_end_matches('/');
        let path = EntryPath::directory(&join_prefix(&self.prefix, name))?.into_string();
        let entries = self.format.list_entries()?;
        if entries.iter().any(|e| e.path.starts_with(&path)) {
            return Err(Error::DuplicatePath { path });
        }
        self.append(vec![StagedEntry::directory(path)])
    }

    /// Deletes files, or folders (paths ending in `/`) with their contents.
    pub fn delete(&mut self, paths: &[String]) -> Result<EditResult> {
        let result = self
            .format
            .delete_entries(paths, self.password.as_ref(), &self.options)?;
        self.refresh()?;
        Ok(result)
    }

    /// Renames a file, or a folder together with everything below it.
    ///
    /// If the current folder lies inside a renamed folder, the session
    /// follows it to its new location.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<EditResult> {
        EntryPath::new(to)?;
        let result =
            self.format
                .rename_entry(from, to, self.password.as_ref(), &self.options)?;
        if from.ends_with('/') {
            if let Some(rest) = self.prefix.strip_prefix(from) {
                self.prefix = format!("{to}{rest}");
            }
        }
        self.refresh()?;
        Ok(result)
    }

    /// Replaces the archive comment; an empty text removes it.
    pub fn set_comment(&mut self, text: &str) -> Result<EditResult> {
        let result = self
            .format
            .set_comment(text, self.password.as_ref(), &self.options)?;
        self.refresh()?;
        Ok(result)
    }

    // Extraction

    /// Extracts the whole archive below `dest`.
    pub fn extract_all(&self, dest: impl AsRef<Path>) -> Result<usize> {
        self.format
            .extract_all(dest.as_ref(), self.password.as_ref())
    }

    /// Extracts the given files and folders below `dest`.
    pub fn extract_selected(&self, paths: &[String], dest: impl AsRef<Path>) -> Result<usize> {
        self.format
            .extract_selected(paths, dest.as_ref(), self.password.as_ref())
    }

    /// Protection for entries appended to the archive as it is now.
    fn append_protection(&self) -> Result<Protection> {
        let state = self.format.password_state()?;
        if !state.has_password {
            return Ok(Protection::None);
        }
        match &self.password {
            Some(password) => Ok(Protection::for_scheme(state.scheme, Some(password.clone())).0),
            None => {
                warn!(
                    "{} is password protected but no password is set; new entries are stored unencrypted",
                    self.path().display()
                );
                Ok(Protection::None)
            }
        }
    }

    fn append(&mut self, staged: Vec<StagedEntry>) -> Result<EditResult> {
        let existing: HashSet<String> = self
            .format
            .list_entries()?
            .into_iter()
            .map(|e| e.path)
            .collect();
        let mut batch = HashSet::new();
        for entry in &staged {
            if existing.contains(&entry.path) || !batch.insert(entry.path.as_str()) {
                return Err(Error::DuplicatePath {
                    path: entry.path.clone(),
                });
            }
        }

        let protection = self.append_protection()?;
        self.format.write_entries(&staged, &protection)?;
        info!("added {} entries to {}", staged.len(), self.path().display());

        let result = EditResult {
            entries_kept: existing.len(),
            entries_added: staged.len(),
            total_bytes: staged.iter().map(|e| e.data.len() as u64).sum(),
            archive_bytes: fs::metadata(self.path()).map(|m| m.len()).unwrap_or(0),
            ..Default::default()
        };
        self.refresh()?;
        Ok(result)
    }
}

fn stage_file(source: &Path, path: String, meta: &fs::Metadata) -> Result<StagedEntry> {
    let data = fs::read(source)?;
    let modified = meta.modified().ok().map(Timestamp::from_system_time);
    Ok(StagedEntry::file(path, data).with_modified(modified))
}
