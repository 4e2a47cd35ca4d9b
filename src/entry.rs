//! Entry metadata and in-memory archive snapshots.

use crate::Timestamp;

/// Reserved entry path that stores the archive comment inside TAR containers.
///
/// It never appears in listings, search results or extraction output.
pub const COMMENT_SENTINEL: &str = ".archivator_comment.txt";

/// Returns true if `path` is the reserved comment entry.
#[inline]
pub fn is_comment_sentinel(path: &str) -> bool {
    path == COMMENT_SENTINEL
}

/// Metadata of one stored entry.
///
/// Paths use '/' separators. Directory entries end with '/' and carry no
/// data; directories that only exist as a prefix of other paths have no
/// entry at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Full path inside the archive.
    pub path: String,
    /// True for explicit directory markers.
    pub is_directory: bool,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Modification time, when the container records a usable one.
    pub modified: Option<Timestamp>,
    /// True if the entry is encrypted.
    pub is_encrypted: bool,
}

impl Entry {
    /// Returns the last path segment, without a directory slash.
    pub fn name(&self) -> &str {
        let body = self.path.strip_suffix('/').unwrap_or(&self.path);
        body.rsplit('/').next().unwrap_or(body)
    }
}

/// An entry with its payload loaded, ready to be written into a container.
#[derive(Clone, PartialEq, Eq)]
pub struct StagedEntry {
    /// Full path inside the archive.
    pub path: String,
    /// True for explicit directory markers.
    pub is_directory: bool,
    /// Modification time to record.
    pub modified: Option<Timestamp>,
    /// Uncompressed payload; empty for directories.
    pub data: Vec<u8>,
}

impl StagedEntry {
    /// Creates a file entry stamped with the current time.
    pub fn file(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            modified: Some(Timestamp::now()),
            data,
        }
    }

    /// Creates a directory marker stamped with the current time.
    pub fn directory(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            path,
            is_directory: true,
            modified: Some(Timestamp::now()),
            data: Vec::new(),
        }
    }

    /// Sets the modification time.
    pub fn with_modified(mut self, modified: Option<Timestamp>) -> Self {
        self.modified = modified;
        self
    }
}

impl std::fmt::Debug for StagedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedEntry")
            .field("path", &self.path)
            .field("is_directory", &self.is_directory)
            .field("modified", &self.modified)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Full in-memory copy of an archive, produced by the read phase of a rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Entries in stored order. The TAR comment sentinel is not included.
    pub entries: Vec<StagedEntry>,
    /// Archive comment; empty when there is none.
    pub comment: String,
}

impl Snapshot {
    /// Returns the index of the entry with exactly this path.
    pub fn position(&self, path: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.path == path)
    }

    /// Returns true if an entry with exactly this path exists.
    pub fn contains(&self, path: &str) -> bool {
        self.position(path).is_some()
    }

    /// Returns true if `prefix` names a directory, explicit or implicit.
    pub fn has_directory(&self, prefix: &str) -> bool {
        debug_assert!(prefix.ends_with('/'));
        self.entries.iter().any(|e| e.path.starts_with(prefix))
    }

    /// Total payload size in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.data.len() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name() {
        let e = Entry {
            path: "a/b/c.txt".into(),
            is_directory: false,
            size: 1,
            modified: None,
            is_encrypted: false,
        };
        assert_eq!(e.name(), "c.txt");

        let d = Entry {
            path: "a/b/".into(),
            is_directory: true,
            ..e
        };
        assert_eq!(d.name(), "b");
    }

    #[test]
    fn test_staged_directory_gets_slash() {
        let d = StagedEntry::directory("photos");
        assert_eq!(d.path, "photos/");
        assert!(d.is_directory);
        assert!(d.data.is_empty());
    }

    #[test]
    fn test_snapshot_lookup() {
        let snapshot = Snapshot {
            entries: vec![
                StagedEntry::file("a/b.txt", b"hi".to_vec()),
                StagedEntry::file("c.txt", b"there".to_vec()),
            ],
            comment: String::new(),
        };
        assert_eq!(snapshot.position("c.txt"), Some(1));
        assert!(!snapshot.contains("a/"));
        assert!(snapshot.has_directory("a/"));
        assert!(!snapshot.has_directory("b/"));
        assert_eq!(snapshot.total_bytes(), 7);
    }

    #[test]
    fn test_sentinel() {
        assert!(is_comment_sentinel(".archivator_comment.txt"));
        assert!(!is_comment_sentinel("dir/.archivator_comment.txt"));
    }
}
