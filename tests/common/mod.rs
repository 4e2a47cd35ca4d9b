//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zipup::{ArchiveFormat, Protection, StagedEntry, open_format};

/// Extensions of every supported container, used to run a test over each.
pub const ALL_EXTENSIONS: [&str; 3] = ["zip", "arc", "tar"];

/// Creates `name` inside `dir` holding `entries`, in order.
///
/// Paths ending in '/' become directory markers.
pub fn create_archive(dir: &TempDir, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.path().join(name);
    let format = open_format(&path).expect("supported extension");
    format.create().expect("create archive");
    if !entries.is_empty() {
        let staged: Vec<StagedEntry> = entries
            .iter()
            .map(|(p, data)| {
                if p.ends_with('/') {
                    StagedEntry::directory(*p)
                } else {
                    StagedEntry::file(*p, data.to_vec())
                }
            })
            .collect();
        format
            .write_entries(&staged, &Protection::None)
            .expect("write entries");
    }
    path
}

/// Opens the format variant for `path`.
pub fn open(path: &Path) -> Box<dyn ArchiveFormat> {
    open_format(path).expect("supported extension")
}

/// Entry paths in stored order.
pub fn paths_of(path: &Path) -> Vec<String> {
    open(path)
        .list_entries()
        .expect("list entries")
        .into_iter()
        .map(|e| e.path)
        .collect()
}

/// Sorted entry paths.
pub fn sorted_paths(path: &Path) -> Vec<String> {
    let mut paths = paths_of(path);
    paths.sort();
    paths
}

/// Sorted (path, bytes) pairs of every file entry.
pub fn contents_of(path: &Path, password: Option<&zipup::Password>) -> Vec<(String, Vec<u8>)> {
    let snapshot = open(path).read_all(password).expect("read archive");
    let mut contents: Vec<_> = snapshot
        .entries
        .into_iter()
        .filter(|e| !e.is_directory)
        .map(|e| (e.path, e.data))
        .collect();
    contents.sort();
    contents
}
