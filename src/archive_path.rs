//! Validated entry paths for names supplied by callers.
//!
//! Entry paths read out of an existing container are taken as stored. Paths
//! that this crate is asked to *create* (add, rename, create folder) go
//! through [`EntryPath`] first, so a caller cannot introduce absolute paths,
//! traversal segments or names that break the flat namespace.

use crate::entry::is_comment_sentinel;
use crate::{Error, Result};
use std::fmt;

/// Maximum length for entry paths, in bytes.
const MAX_PATH_LENGTH: usize = 32768;

/// A validated, '/'-separated entry path.
///
/// A single trailing `/` is allowed and marks a directory entry. Everything
/// else follows the usual rules:
/// - no NUL bytes and no backslashes
/// - not absolute
/// - no empty, `.` or `..` segments
/// - not the reserved TAR comment entry
///
/// # Examples
///
/// ```
/// use zipup::EntryPath;
///
/// let file = EntryPath::new("docs/readme.txt").unwrap();
/// assert!(!file.is_directory());
/// assert_eq!(file.file_name(), "readme.txt");
///
/// let dir = EntryPath::new("docs/").unwrap();
/// assert!(dir.is_directory());
///
/// assert!(EntryPath::new("../secret").is_err());
/// assert!(EntryPath::new("/etc/passwd").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryPath(String);

impl EntryPath {
    /// Creates a new `EntryPath`, validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEntryPath`] if the path is empty, absolute,
    /// contains NUL or backslash characters, has empty, `.` or `..`
    /// segments, or names the reserved comment entry.
    pub fn new(s: &str) -> Result<Self> {
        Self::validate(s)?;
        Ok(Self(s.to_string()))
    }

    /// Creates a directory path, appending the trailing `/` if missing.
    pub fn directory(s: &str) -> Result<Self> {
        if s.ends_with('/') {
            Self::new(s)
        } else {
            Self::new(&format!("{s}/"))
        }
    }

    fn validate(s: &str) -> Result<()> {
        if s.contains('\0') {
            return Err(Error::InvalidEntryPath("contains NUL byte".into()));
        }
        if s.is_empty() || s == "/" {
            return Err(Error::InvalidEntryPath("empty path".into()));
        }
        if s.len() > MAX_PATH_LENGTH {
            return Err(Error::InvalidEntryPath(format!(
                "path exceeds maximum length of {MAX_PATH_LENGTH} bytes"
            )));
        }
        if s.starts_with('/') {
            return Err(Error::InvalidEntryPath("absolute path not allowed".into()));
        }
        if s.contains('\\') {
            return Err(Error::InvalidEntryPath(
                "backslash not allowed, use '/' as separator".into(),
            ));
        }

        let body = s.strip_suffix('/').unwrap_or(s);
        for segment in body.split('/') {
            match segment {
                "" => {
                    return Err(Error::InvalidEntryPath(
                        "empty segment (consecutive slashes)".into(),
                    ));
                }
                "." => return Err(Error::InvalidEntryPath("'.' segment not allowed".into())),
                ".." => {
                    return Err(Error::InvalidEntryPath(
                        "'..' segment not allowed (path traversal)".into(),
                    ));
                }
                _ => {}
            }
        }
        if is_comment_sentinel(s) {
            return Err(Error::InvalidEntryPath(format!("'{s}' is reserved")));
        }
        Ok(())
    }

    /// Returns the path as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the path names a directory entry.
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Returns the last segment, without the directory slash.
    pub fn file_name(&self) -> &str {
        let body = self.0.strip_suffix('/').unwrap_or(&self.0);
        body.rsplit('/').next().unwrap_or(body)
    }

    /// Returns the extension of the last segment, if any.
    ///
    /// Dot-files such as `.gitignore` have no extension.
    pub fn extension(&self) -> Option<&str> {
        if self.is_directory() {
            return None;
        }
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(&name[pos + 1..]),
        }
    }

    /// Consumes the path and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntryPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for EntryPath {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntryPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

/// Joins a virtual folder prefix (`""` or ending in `/`) with a relative name.
pub(crate) fn join_prefix(prefix: &str, name: &str) -> String {
    debug_assert!(prefix.is_empty() || prefix.ends_with('/'));
    format!("{prefix}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_paths() {
        assert!(EntryPath::new("file.txt").is_ok());
        assert!(EntryPath::new("dir/file.txt").is_ok());
        assert!(EntryPath::new("a/b/c/").is_ok());
        assert!(EntryPath::new(".archive_hidden").is_ok());
    }

    #[test]
    fn test_invalid_paths() {
        assert!(EntryPath::new("").is_err());
        assert!(EntryPath::new("/").is_err());
        assert!(EntryPath::new("/abs").is_err());
        assert!(EntryPath::new("a//b").is_err());
        assert!(EntryPath::new("a/b//").is_err());
        assert!(EntryPath::new("./a").is_err());
        assert!(EntryPath::new("a/../b").is_err());
        assert!(EntryPath::new("a\\b").is_err());
        assert!(EntryPath::new("nul\0byte").is_err());
    }

    #[test]
    fn test_device_like_names_are_plain_names() {
        assert!(EntryPath::new("src/aux.c").is_ok());
        assert!(EntryPath::new("include/con.h").is_ok());
        assert!(EntryPath::new("NUL").is_ok());
    }

    #[test]
    fn test_comment_entry_is_reserved() {
        let err = EntryPath::new(crate::COMMENT_SENTINEL).unwrap_err();
        assert!(matches!(err, Error::InvalidEntryPath(_)));
        assert!(EntryPath::new(&format!("docs/{}", crate::COMMENT_SENTINEL)).is_ok());
    }

    #[test]
    fn test_directory_constructor() {
        let dir = EntryPath::directory("photos").unwrap();
        assert_eq!(dir.as_str(), "photos/");
        assert!(dir.is_directory());
        assert_eq!(EntryPath::directory("photos/").unwrap(), dir);
    }

    #[test]
    fn test_file_name_and_extension() {
        let p = EntryPath::new("a/b/report.final.pdf").unwrap();
        assert_eq!(p.file_name(), "report.final.pdf");
        assert_eq!(p.extension(), Some("pdf"));

        let d = EntryPath::new("a/b/").unwrap();
        assert_eq!(d.file_name(), "b");
        assert_eq!(d.extension(), None);

        assert_eq!(EntryPath::new("x/.env").unwrap().extension(), None);
    }

    #[test]
    fn test_error_message() {
        let err = EntryPath::new("../etc").unwrap_err();
        assert!(matches!(err, Error::InvalidEntryPath(_)));
        assert!(err.to_string().contains("path traversal"));
    }

    #[test]
    fn test_join_prefix() {
        assert_eq!(join_prefix("", "a.txt"), "a.txt");
        assert_eq!(join_prefix("dir/", "a.txt"), "dir/a.txt");
    }
}
