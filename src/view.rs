//! Virtual folder browsing over the flat entry namespace.
//!
//! ZIP and TAR store entries under full path strings. This module
//! reconstructs one directory level at a time from those strings, so folders
//! exist whenever some path runs through them, whether or not the archive has
//! an explicit marker entry.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipup::view::DirectoryProjector;
//!
//! # fn show(entries: &[zipup::Entry]) {
//! let view = DirectoryProjector::project(entries, "docs/");
//! for row in &view.rows {
//!     println!("{:<30} {:>10}", row.display_name, row.size_label);
//! }
//! # }
//! ```
//!
//! # Path Handling
//!
//! Prefixes are either `""` for the root or end with `/`.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::Timestamp;
use crate::entry::{Entry, is_comment_sentinel};

/// Display name of the synthetic row that navigates one level up.
pub const UP_ROW: &str = "..";

/// One row of a [`VirtualFolderView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRow {
    /// Name relative to the current prefix; folders end with `/`.
    pub display_name: String,
    /// Human-readable size, empty for folders and the up row.
    pub size_label: String,
    /// Size in bytes, zero for folders.
    pub size: u64,
    /// Modification time of file rows.
    pub modified: Option<Timestamp>,
    /// True for folders and the up row.
    pub is_directory: bool,
}

impl FolderRow {
    fn up() -> Self {
        Self {
            display_name: UP_ROW.to_string(),
            size_label: String::new(),
            size: 0,
            modified: None,
            is_directory: true,
        }
    }

    fn folder(name: String) -> Self {
        Self {
            display_name: name,
            size_label: String::new(),
            size: 0,
            modified: None,
            is_directory: true,
        }
    }

    fn file(name: String, entry: &Entry) -> Self {
        Self {
            display_name: name,
            size_label: format_size(entry.size),
            size: entry.size,
            modified: entry.modified,
            is_directory: false,
        }
    }

    /// Returns true for the synthetic `..` row.
    pub fn is_up(&self) -> bool {
        self.display_name == UP_ROW
    }

    /// Full entry path of this row below `prefix`.
    ///
    /// For the up row this is the parent prefix.
    pub fn full_path(&self, prefix: &str) -> String {
        if self.is_up() {
            parent_prefix(prefix)
        } else {
            format!("{prefix}{}", self.display_name)
        }
    }
}

/// One projected directory level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualFolderView {
    /// The projected prefix, `""` for the root.
    pub current_prefix: String,
    /// Rows in display order: the up row, folders, then files.
    pub rows: Vec<FolderRow>,
}

impl VirtualFolderView {
    /// Returns true if this view shows the archive root.
    pub fn is_root(&self) -> bool {
        self.current_prefix.is_empty()
    }

    /// Finds a row by display name.
    pub fn row(&self, display_name: &str) -> Option<&FolderRow> {
        self.rows.iter().find(|r| r.display_name == display_name)
    }

    /// Folder rows, without the up row.
    pub fn folders(&self) -> impl Iterator<Item = &FolderRow> {
        self.rows.iter().filter(|r| r.is_directory && !r.is_up())
    }

    /// File rows.
    pub fn files(&self) -> impl Iterator<Item = &FolderRow> {
        self.rows.iter().filter(|r| !r.is_directory)
    }

    /// Number of rows other than the up row.
    pub fn len(&self) -> usize {
        self.rows.iter().filter(|r| !r.is_up()).count()
    }

    /// Returns true if the folder has no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds [`VirtualFolderView`]s from entry lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryProjector;

impl DirectoryProjector {
    /// Projects the direct children of `prefix`.
    ///
    /// Entries outside `prefix`, the entry equal to `prefix` itself and the
    /// TAR comment entry are skipped. When several entries map to the same
    /// row, the first one in stored order wins.
    pub fn project(entries: &[Entry], prefix: &str) -> VirtualFolderView {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut rows = Vec::new();

        for entry in entries {
            let Some(rel) = entry.path.strip_prefix(prefix) else {
                continue;
            };
            if rel.is_empty() || is_comment_sentinel(rel) {
                continue;
            }
            match rel.split_once('/') {
                None => {
                    if seen.insert(rel) {
                        rows.push(FolderRow::file(rel.to_string(), entry));
                    }
                }
                Some((segment, _)) => {
                    // Key includes the slash so a file and a folder of the
                    // same name are distinct rows.
                    let key = &rel[..segment.len() + 1];
                    if seen.insert(key) {
                        rows.push(FolderRow::folder(key.to_string()));
                    }
                }
            }
        }

        rows.sort_by(compare_rows);
        if !prefix.is_empty() {
            rows.insert(0, FolderRow::up());
        }

        VirtualFolderView {
            current_prefix: prefix.to_string(),
            rows,
        }
    }
}

fn compare_rows(a: &FolderRow, b: &FolderRow) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
        })
        .then_with(|| a.display_name.cmp(&b.display_name))
}

/// One result of [`search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Full entry path.
    pub path: String,
    /// Path relative to the search prefix when it lies below it, otherwise
    /// the full path.
    pub display_name: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification time.
    pub modified: Option<Timestamp>,
}

/// Case-insensitive substring search over full entry paths.
///
/// Results keep stored order. The TAR comment entry never matches.
pub fn search(entries: &[Entry], needle: &str, prefix: &str) -> Vec<SearchHit> {
    let needle = needle.to_lowercase();
    entries
        .iter()
        .filter(|e| !is_comment_sentinel(&e.path))
        .filter(|e| e.path.to_lowercase().contains(&needle))
        .map(|e| SearchHit {
            path: e.path.clone(),
            display_name: e
                .path
                .strip_prefix(prefix)
                .filter(|rel| !rel.is_empty())
                .unwrap_or(&e.path)
                .to_string(),
            size: e.size,
            modified: e.modified,
        })
        .collect()
}

/// Formats a byte count with binary units and one decimal above bytes.
///
/// # Example
///
/// ```
/// assert_eq!(zipup::view::format_size(512), "512 B");
/// assert_eq!(zipup::view::format_size(1536), "1.5 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{b} B"),
    }
}

/// Strips the last folder segment from a prefix.
///
/// `"a/b/"` becomes `"a/"`, `"a/"` becomes `""`, and the root stays `""`.
pub fn parent_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => trimmed[..=idx].to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, size: u64) -> Entry {
        Entry {
            path: path.to_string(),
            is_directory: path.ends_with('/'),
            size,
            modified: Some(Timestamp::from_unix_secs(1_700_000_000)),
            is_encrypted: false,
        }
    }

    fn names(view: &VirtualFolderView) -> Vec<&str> {
        view.rows.iter().map(|r| r.display_name.as_str()).collect()
    }

    #[test]
    fn test_project_root() {
        let entries = [file("a/b.txt", 1), file("a/c/d.txt", 2), file("e.txt", 3)];
        let view = DirectoryProjector::project(&entries, "");
        assert_eq!(names(&view), ["a/", "e.txt"]);
        assert!(view.rows[0].is_directory);
        assert!(!view.rows[1].is_directory);
        assert!(view.is_root());
    }

    #[test]
    fn test_project_subfolder() {
        let entries = [file("a/b.txt", 1), file("a/c/d.txt", 2), file("e.txt", 3)];
        let view = DirectoryProjector::project(&entries, "a/");
        assert_eq!(names(&view), ["..", "c/", "b.txt"]);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn test_project_explicit_directory_marker() {
        let entries = [file("docs/", 0), file("docs/x.md", 5)];
        let root = DirectoryProjector::project(&entries, "");
        assert_eq!(names(&root), ["docs/"]);
        let inner = DirectoryProjector::project(&entries, "docs/");
        assert_eq!(names(&inner), ["..", "x.md"]);
    }

    #[test]
    fn test_project_empty_folder() {
        let entries = [file("empty/", 0)];
        let view = DirectoryProjector::project(&entries, "empty/");
        assert_eq!(names(&view), [".."]);
        assert!(view.is_empty());
    }

    #[test]
    fn test_project_sorting() {
        let entries = [
            file("b.txt", 1),
            file("A.txt", 1),
            file("zeta/x", 1),
            file("Alpha/y", 1),
            file("c.txt", 1),
        ];
        let view = DirectoryProjector::project(&entries, "");
        assert_eq!(names(&view), ["Alpha/", "zeta/", "A.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_project_first_occurrence_wins() {
        let mut first = file("dup.txt", 1);
        first.size = 10;
        let entries = [first, file("dup.txt", 20)];
        let view = DirectoryProjector::project(&entries, "");
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].size, 10);
    }

    #[test]
    fn test_project_hides_comment_entry() {
        let entries = [file(".archivator_comment.txt", 4), file("a.txt", 1)];
        let view = DirectoryProjector::project(&entries, "");
        assert_eq!(names(&view), ["a.txt"]);
    }

    #[test]
    fn test_row_full_path() {
        let entries = [file("a/b/c.txt", 1)];
        let view = DirectoryProjector::project(&entries, "a/");
        assert_eq!(view.rows[0].full_path("a/"), "");
        assert_eq!(view.row("b/").unwrap().full_path("a/"), "a/b/");
    }

    #[test]
    fn test_search() {
        let entries = [
            file("docs/Readme.md", 1),
            file("src/readme.rs", 2),
            file(".archivator_comment.txt", 3),
            file("other.txt", 4),
        ];
        let hits = search(&entries, "README", "docs/");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].display_name, "Readme.md");
        assert_eq!(hits[1].display_name, "src/readme.rs");
        assert!(search(&entries, "archivator", "").is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
    }

    #[test]
    fn test_parent_prefix() {
        assert_eq!(parent_prefix("a/b/"), "a/");
        assert_eq!(parent_prefix("a/"), "");
        assert_eq!(parent_prefix(""), "");
    }
}
