//! Snapshot transforms applied by a rewrite.

use std::collections::HashSet;

use crate::edit::EditResult;
use crate::entry::{Snapshot, is_comment_sentinel};
use crate::format::path_covers;
use crate::{Error, Result};

/// One change applied to the in-memory snapshot of an archive.
///
/// A path ending in `/` names a folder: the operation then covers the
/// explicit directory marker (if any) and every entry below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Remove entries.
    Delete {
        /// Files or folders to remove.
        paths: Vec<String>,
    },
    /// Move an entry, or a folder with everything below it.
    Rename {
        /// Current path.
        from: String,
        /// New path. Must be a folder path exactly when `from` is.
        to: String,
    },
    /// Replace the archive comment. An empty text removes it.
    SetComment {
        /// New comment.
        text: String,
    },
    /// Keep every entry and write it again under new protection.
    Reencrypt,
}

impl Operation {
    /// Returns the operation type as a string.
    pub fn operation_type(&self) -> &'static str {
        match self {
            Operation::Delete { .. } => "delete",
            Operation::Rename { .. } => "rename",
            Operation::SetComment { .. } => "comment",
            Operation::Reencrypt => "reencrypt",
        }
    }

    /// Applies the operation to `snapshot`, recording counts in `result`.
    ///
    /// Validation happens before any change, so on error the snapshot is
    /// left as it was.
    pub fn apply(&self, snapshot: &mut Snapshot, result: &mut EditResult) -> Result<()> {
        match self {
            Operation::Delete { paths } => apply_delete(snapshot, paths, result),
            Operation::Rename { from, to } => apply_rename(snapshot, from, to, result),
            Operation::SetComment { text } => {
                snapshot.comment = text.clone();
                Ok(())
            }
            Operation::Reencrypt => Ok(()),
        }
    }
}

fn apply_delete(snapshot: &mut Snapshot, paths: &[String], result: &mut EditResult) -> Result<()> {
    for target in paths {
        if !snapshot.entries.iter().any(|e| path_covers(target, &e.path)) {
            return Err(Error::EntryNotFound {
                path: target.clone(),
            });
        }
    }

    let before = snapshot.entries.len();
    snapshot
        .entries
        .retain(|e| !paths.iter().any(|target| path_covers(target, &e.path)));
    result.entries_deleted += before - snapshot.entries.len();
    Ok(())
}

fn apply_rename(snapshot: &mut Snapshot, from: &str, to: &str, result: &mut EditResult) -> Result<()> {
    let is_folder = from.ends_with('/');
    if is_folder != to.ends_with('/') {
        return Err(Error::InvalidEntryPath(format!(
            "cannot rename '{from}' to '{to}': a folder must stay a folder and a file a file"
        )));
    }

    let moved: Vec<usize> = snapshot
        .entries
        .iter()
        .enumerate()
        .filter(|(_, e)| path_covers(from, &e.path))
        .map(|(i, _)| i)
        .collect();
    if moved.is_empty() {
        return Err(Error::EntryNotFound {
            path: from.to_string(),
        });
    }
    if from == to {
        return Ok(());
    }
    if is_folder && to.starts_with(from) {
        return Err(Error::InvalidEntryPath(format!(
            "cannot move folder '{from}' into itself"
        )));
    }

    let renamed: Vec<String> = moved
        .iter()
        .map(|&i| format!("{to}{}", &snapshot.entries[i].path[from.len()..]))
        .collect();
    if let Some(reserved) = renamed.iter().find(|p| is_comment_sentinel(p)) {
        return Err(Error::InvalidEntryPath(format!("'{reserved}' is reserved")));
    }

    let staying: HashSet<&str> = snapshot
        .entries
        .iter()
        .filter(|e| !path_covers(from, &e.path))
        .map(|e| e.path.as_str())
        .collect();
    if let Some(clash) = renamed.iter().find(|p| staying.contains(p.as_str())) {
        return Err(Error::DuplicatePath { path: clash.clone() });
    }
    // A folder target must be unused; a file target must not shadow a folder.
    let occupied_prefix = if is_folder {
        to.to_string()
    } else {
        format!("{to}/")
    };
    if staying.iter().any(|p| p.starts_with(&occupied_prefix)) {
        return Err(Error::DuplicatePath { path: to.to_string() });
    }

    for (i, path) in moved.into_iter().zip(renamed) {
        log::trace!("rename {} -> {path}", snapshot.entries[i].path);
        snapshot.entries[i].path = path;
        result.entries_renamed += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::StagedEntry;

    fn snapshot(paths: &[&str]) -> Snapshot {
        Snapshot {
            entries: paths
                .iter()
                .map(|p| {
                    if p.ends_with('/') {
                        StagedEntry::directory(*p)
                    } else {
                        StagedEntry::file(*p, p.as_bytes().to_vec())
                    }
                })
                .collect(),
            comment: String::new(),
        }
    }

    fn paths(s: &Snapshot) -> Vec<&str> {
        s.entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_delete_file() {
        let mut s = snapshot(&["a.txt", "b.txt"]);
        let mut r = EditResult::default();
        Operation::Delete {
            paths: vec!["a.txt".into()],
        }
        .apply(&mut s, &mut r)
        .unwrap();
        assert_eq!(paths(&s), ["b.txt"]);
        assert_eq!(r.entries_deleted, 1);
    }

    #[test]
    fn test_delete_folder_removes_subtree() {
        let mut s = snapshot(&["a/", "a/b.txt", "a/c/d.txt", "ab.txt"]);
        let mut r = EditResult::default();
        Operation::Delete {
            paths: vec!["a/".into()],
        }
        .apply(&mut s, &mut r)
        .unwrap();
        assert_eq!(paths(&s), ["ab.txt"]);
        assert_eq!(r.entries_deleted, 3);
    }

    #[test]
    fn test_delete_missing_leaves_snapshot() {
        let mut s = snapshot(&["a.txt", "b.txt"]);
        let err = Operation::Delete {
            paths: vec!["a.txt".into(), "zzz".into()],
        }
        .apply(&mut s, &mut EditResult::default())
        .unwrap_err();
        assert!(matches!(err, Error::EntryNotFound { ref path } if path == "zzz"));
        assert_eq!(paths(&s), ["a.txt", "b.txt"]);
    }

    #[test]
    fn test_rename_folder_substitutes_prefix() {
        let mut s = snapshot(&["a/", "a/b.txt", "keep.txt"]);
        let mut r = EditResult::default();
        Operation::Rename {
            from: "a/".into(),
            to: "z/".into(),
        }
        .apply(&mut s, &mut r)
        .unwrap();
        assert_eq!(paths(&s), ["z/", "z/b.txt", "keep.txt"]);
        assert_eq!(s.entries[1].data, b"a/b.txt");
        assert_eq!(r.entries_renamed, 2);
    }

    #[test]
    fn test_rename_implicit_folder() {
        let mut s = snapshot(&["docs/x.txt", "docs/y/z.txt"]);
        Operation::Rename {
            from: "docs/".into(),
            to: "papers/".into(),
        }
        .apply(&mut s, &mut EditResult::default())
        .unwrap();
        assert_eq!(paths(&s), ["papers/x.txt", "papers/y/z.txt"]);
    }

    #[test]
    fn test_rename_collision() {
        let mut s = snapshot(&["a.txt", "b.txt"]);
        let err = Operation::Rename {
            from: "a.txt".into(),
            to: "b.txt".into(),
        }
        .apply(&mut s, &mut EditResult::default())
        .unwrap_err();
        assert!(matches!(err, Error::DuplicatePath { .. }));
        assert_eq!(paths(&s), ["a.txt", "b.txt"]);
    }

    #[test]
    fn test_rename_folder_onto_existing_folder() {
        let mut s = snapshot(&["a/x.txt", "b/y.txt"]);
        let err = Operation::Rename {
            from: "a/".into(),
            to: "b/".into(),
        }
        .apply(&mut s, &mut EditResult::default())
        .unwrap_err();
        assert!(matches!(err, Error::DuplicatePath { .. }));
    }

    #[test]
    fn test_rename_missing() {
        let mut s = snapshot(&["a.txt"]);
        let err = Operation::Rename {
            from: "nope.txt".into(),
            to: "b.txt".into(),
        }
        .apply(&mut s, &mut EditResult::default())
        .unwrap_err();
        assert!(matches!(err, Error::EntryNotFound { .. }));
    }

    #[test]
    fn test_rename_missing_onto_itself() {
        let mut s = snapshot(&["a.txt"]);
        let err = Operation::Rename {
            from: "ghost.txt".into(),
            to: "ghost.txt".into(),
        }
        .apply(&mut s, &mut EditResult::default())
        .unwrap_err();
        assert!(matches!(err, Error::EntryNotFound { ref path } if path == "ghost.txt"));

        let mut r = EditResult::default();
        Operation::Rename {
            from: "a.txt".into(),
            to: "a.txt".into(),
        }
        .apply(&mut s, &mut r)
        .unwrap();
        assert_eq!(paths(&s), ["a.txt"]);
        assert_eq!(r.entries_renamed, 0);
    }

    #[test]
    fn test_rename_onto_comment_entry() {
        let mut s = snapshot(&["a.txt"]);
        let err = Operation::Rename {
            from: "a.txt".into(),
            to: crate::COMMENT_SENTINEL.into(),
        }
        .apply(&mut s, &mut EditResult::default())
        .unwrap_err();
        assert!(matches!(err, Error::InvalidEntryPath(_)));
        assert_eq!(paths(&s), ["a.txt"]);
    }

    #[test]
    fn test_rename_kind_mismatch_and_self_nesting() {
        let mut s = snapshot(&["a/b.txt"]);
        assert!(matches!(
            Operation::Rename {
                from: "a/".into(),
                to: "b.txt".into()
            }
            .apply(&mut s, &mut EditResult::default()),
            Err(Error::InvalidEntryPath(_))
        ));
        assert!(matches!(
            Operation::Rename {
                from: "a/".into(),
                to: "a/inner/".into()
            }
            .apply(&mut s, &mut EditResult::default()),
            Err(Error::InvalidEntryPath(_))
        ));
    }

    #[test]
    fn test_set_comment() {
        let mut s = snapshot(&["a.txt"]);
        Operation::SetComment {
            text: "hello".into(),
        }
        .apply(&mut s, &mut EditResult::default())
        .unwrap();
        assert_eq!(s.comment, "hello");
        assert_eq!(Operation::Reencrypt.operation_type(), "reencrypt");
    }
}
