//! Property-based tests using proptest.
//!
//! These tests verify invariants of the cipher, the folder projection and
//! container round trips using randomly generated inputs.

mod common;

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use proptest::prelude::*;
use tempfile::TempDir;
use zipup::cipher::{XorStream, apply_key};
use zipup::{DirectoryProjector, Entry, EntryPath, Protection, StagedEntry};

use common::{contents_of, open};

/// Strategy for one path segment that `EntryPath` accepts.
fn segment_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

/// Strategy for file paths of 1-3 segments ending in a file name.
fn file_path_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(segment_strategy(), 1..4).prop_map(|parts| {
        let mut path = parts.join("/");
        path.push_str(".txt");
        path
    })
}

/// Unique file paths with payloads.
fn entry_set_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    proptest::collection::btree_map(
        file_path_strategy(),
        proptest::collection::vec(any::<u8>(), 0..256),
        0..8,
    )
}

fn entries_from(paths: &[String]) -> Vec<Entry> {
    paths
        .iter()
        .map(|p| Entry {
            path: p.clone(),
            is_directory: p.ends_with('/'),
            size: 1,
            modified: None,
            is_encrypted: false,
        })
        .collect()
}

proptest! {
    /// Applying the key twice is the identity.
    #[test]
    fn cipher_is_an_involution(data in proptest::collection::vec(any::<u8>(), 0..1024), key in any::<u8>()) {
        let mut buf = data.clone();
        apply_key(&mut buf, key);
        apply_key(&mut buf, key);
        prop_assert_eq!(buf, data);
    }

    /// Transforming slices separately equals transforming the whole.
    #[test]
    fn cipher_is_position_independent(
        data in proptest::collection::vec(any::<u8>(), 1..1024),
        split in any::<prop::sample::Index>(),
        key in any::<u8>(),
    ) {
        let at = split.index(data.len());
        let mut whole = data.clone();
        apply_key(&mut whole, key);

        let (head, tail) = data.split_at(at);
        let mut head = head.to_vec();
        let mut tail = tail.to_vec();
        apply_key(&mut head, key);
        apply_key(&mut tail, key);
        head.extend(tail);
        prop_assert_eq!(head, whole);
    }

    /// Writing through the stream and reading back at any offset yields the plain bytes.
    #[test]
    fn xor_stream_seek_and_read(
        data in proptest::collection::vec(any::<u8>(), 1..2048),
        offset in any::<prop::sample::Index>(),
        key in any::<u8>(),
    ) {
        let mut stream = XorStream::with_key(Cursor::new(Vec::new()), key);
        stream.write_all(&data).unwrap();

        let at = offset.index(data.len());
        stream.seek(SeekFrom::Start(at as u64)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        prop_assert_eq!(&rest[..], &data[at..]);
    }

    /// Every projected row corresponds to some entry below the prefix,
    /// rows are unique and folders come before files.
    #[test]
    fn projection_rows_are_consistent(
        paths in proptest::collection::vec(file_path_strategy(), 0..20),
        depth in 0usize..2,
    ) {
        let entries = entries_from(&paths);
        let prefix = paths
            .first()
            .map(|p| {
                let segments: Vec<_> = p.split('/').collect();
                if segments.len() > depth + 1 {
                    format!("{}/", segments[..=depth].join("/"))
                } else {
                    String::new()
                }
            })
            .unwrap_or_default();

        let view = DirectoryProjector::project(&entries, &prefix);
        let rows: Vec<_> = view.rows.iter().filter(|r| !r.is_up()).collect();

        let names: BTreeSet<_> = rows.iter().map(|r| r.display_name.clone()).collect();
        prop_assert_eq!(names.len(), rows.len());

        let first_file = rows.iter().position(|r| !r.is_directory).unwrap_or(rows.len());
        prop_assert!(rows[first_file..].iter().all(|r| !r.is_directory));

        for row in &rows {
            let full = format!("{prefix}{}", row.display_name);
            if row.is_directory {
                prop_assert!(paths.iter().any(|p| p.starts_with(&full)));
            } else {
                prop_assert!(paths.contains(&full));
            }
        }
        for path in &paths {
            if let Some(rel) = path.strip_prefix(&prefix) {
                let key = match rel.split_once('/') {
                    Some((segment, _)) => format!("{segment}/"),
                    None => rel.to_string(),
                };
                prop_assert!(names.contains(&key));
            }
        }
        prop_assert_eq!(view.rows.first().map(|r| r.is_up()).unwrap_or(false), !prefix.is_empty());
    }

    /// Generated paths are valid entry paths.
    #[test]
    fn generated_paths_are_valid(path in file_path_strategy()) {
        prop_assert!(EntryPath::new(&path).is_ok());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Entries written to a fresh container read back unchanged.
    #[test]
    fn container_round_trip(entries in entry_set_strategy(), ext_index in 0usize..3) {
        let ext = common::ALL_EXTENSIONS[ext_index];
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(format!("rt.{ext}"));
        let format = open(&path);
        format.create().unwrap();

        let mut staged: Vec<StagedEntry> = entries
            .iter()
            .map(|(p, d)| StagedEntry::file(p.clone(), d.clone()))
            .collect();
        staged.push(StagedEntry::directory("explicit"));
        format.write_entries(&staged, &Protection::None).unwrap();

        let expected: Vec<(String, Vec<u8>)> = entries.into_iter().collect();
        prop_assert_eq!(contents_of(&path, None), expected);

        let listed = format.list_entries().unwrap();
        let dir_entry = listed.iter().find(|e| e.path == "explicit/");
        prop_assert!(dir_entry.map(|e| e.is_directory).unwrap_or(false));
    }
}
