//! Extraction, disk imports and the obfuscated container layout.

mod common;

use std::fs;

use tempfile::TempDir;
use zipup::cipher::{ARC_KEY, apply_key};
use zipup::{EditOptions, Error, Protection, Session, StagedEntry};

use common::{ALL_EXTENSIONS, create_archive, open, sorted_paths};

const TREE: &[(&str, &[u8])] = &[
    ("docs/", b""),
    ("docs/guide.txt", b"guide"),
    ("docs/img/logo.png", b"\x89PNG"),
    ("top.txt", b"top"),
];

#[test]
fn test_extract_all_recreates_tree() {
    for ext in ALL_EXTENSIONS {
        let dir = TempDir::new().unwrap();
        let path = create_archive(&dir, &format!("x.{ext}"), TREE);
        let out = TempDir::new().unwrap();

        let count = Session::open(&path).unwrap().extract_all(out.path()).unwrap();
        assert_eq!(count, 4, "{ext}");
        assert!(out.path().join("docs").is_dir());
        assert_eq!(fs::read(out.path().join("docs/guide.txt")).unwrap(), b"guide");
        assert_eq!(fs::read(out.path().join("docs/img/logo.png")).unwrap(), b"\x89PNG");
        assert_eq!(fs::read(out.path().join("top.txt")).unwrap(), b"top");
    }
}

#[test]
fn test_extract_selected_folder_subtree() {
    for ext in ALL_EXTENSIONS {
        let dir = TempDir::new().unwrap();
        let path = create_archive(&dir, &format!("x.{ext}"), TREE);
        let out = TempDir::new().unwrap();

        let count = Session::open(&path)
            .unwrap()
            .extract_selected(&["docs/img/".to_string()], out.path())
            .unwrap();
        assert_eq!(count, 1, "{ext}");
        assert!(out.path().join("docs/img/logo.png").is_file());
        assert!(!out.path().join("docs/guide.txt").exists());
        assert!(!out.path().join("top.txt").exists());
    }
}

#[test]
fn test_extract_selected_unknown_path_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = create_archive(&dir, "x.zip", TREE);
    let out = TempDir::new().unwrap();

    let err = Session::open(&path)
        .unwrap()
        .extract_selected(
            &["top.txt".to_string(), "nope.txt".to_string()],
            out.path(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::EntryNotFound { ref path } if path == "nope.txt"));
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn test_extract_rejects_path_traversal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("evil.zip");
    let format = open(&path);
    format.create().unwrap();
    format
        .write_entries(
            &[StagedEntry::file("../evil.txt", b"gotcha".to_vec())],
            &Protection::None,
        )
        .unwrap();

    let out = dir.path().join("out");
    let err = Session::open(&path).unwrap().extract_all(&out).unwrap_err();
    assert!(matches!(err, Error::PathTraversal { .. }), "{err}");
    assert!(!dir.path().join("evil.txt").exists());
}

#[test]
fn test_extract_encrypted_needs_password() {
    let dir = TempDir::new().unwrap();
    let path = create_archive(&dir, "x.arc", TREE);
    let pw = zipup::Password::new("s3cret");
    open(&path)
        .set_password(None, Some(&pw), zipup::CipherScheme::Aes, &EditOptions::default())
        .unwrap();

    let mut session = Session::open(&path).unwrap();
    let out = TempDir::new().unwrap();
    assert!(session.extract_all(out.path()).unwrap_err().is_password_error());

    session.set_session_password(Some(pw));
    assert_eq!(session.extract_all(out.path()).unwrap(), 4);
    assert_eq!(fs::read(out.path().join("top.txt")).unwrap(), b"top");
}

#[test]
fn test_add_files_and_directory_tree() {
    for ext in ALL_EXTENSIONS {
        let dir = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("one.txt"), b"1").unwrap();
        fs::create_dir_all(source.path().join("tree/sub")).unwrap();
        fs::write(source.path().join("tree/a.txt"), b"a").unwrap();
        fs::write(source.path().join("tree/sub/b.txt"), b"b").unwrap();

        let path = dir.path().join(format!("new.{ext}"));
        let mut session = Session::create(&path).unwrap();
        session.add_files(&[source.path().join("one.txt")]).unwrap();

        session.create_folder("imported").unwrap();
        session.enter("imported/").unwrap();
        let result = session.add_directory_tree(source.path().join("tree")).unwrap();
        assert_eq!(result.entries_added, 2, "{ext}");

        assert_eq!(
            sorted_paths(&path),
            ["imported/", "imported/a.txt", "imported/sub/b.txt", "one.txt"],
            "{ext}"
        );
        assert_eq!(session.read("imported/sub/b.txt").unwrap(), b"b");

        let err = session
            .add_files(&[source.path().join("tree/a.txt")])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicatePath { .. }), "{ext}: {err}");
    }
}

#[test]
fn test_directory_tree_with_device_like_names() {
    let dir = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    fs::create_dir_all(source.path().join("src")).unwrap();
    fs::write(source.path().join("src/aux.c"), b"int main;").unwrap();
    fs::write(source.path().join("src/con.h"), b"#pragma once").unwrap();

    let path = dir.path().join("code.tar");
    let mut session = Session::create(&path).unwrap();
    let result = session.add_directory_tree(source.path()).unwrap();
    assert_eq!(result.entries_added, 2);
    assert_eq!(sorted_paths(&path), ["src/aux.c", "src/con.h"]);
}

#[test]
fn test_arc_container_is_obfuscated_zip() {
    let dir = TempDir::new().unwrap();
    let path = create_archive(&dir, "o.arc", &[("hello.txt", b"hello hello hello")]);

    let mut raw = fs::read(&path).unwrap();
    assert!(!raw.starts_with(b"PK\x03\x04"));
    apply_key(&mut raw, ARC_KEY);
    assert!(raw.starts_with(b"PK\x03\x04"));

    // The decoded bytes are a plain ZIP that the `.zip` variant reads.
    let plain = dir.path().join("plain.zip");
    fs::write(&plain, &raw).unwrap();
    assert_eq!(
        open(&plain).read_entry("hello.txt", None).unwrap(),
        b"hello hello hello"
    );
}

#[test]
fn test_materialized_entry_keeps_extension() {
    let dir = TempDir::new().unwrap();
    let path = create_archive(&dir, "m.tar", TREE);
    let session = Session::open(&path).unwrap();

    let temp = session.materialize_entry("docs/guide.txt").unwrap();
    assert_eq!(temp.extension().and_then(|e| e.to_str()), Some("txt"));
    assert_eq!(fs::read(&temp).unwrap(), b"guide");
    let kept = temp.to_path_buf();
    drop(temp);
    assert!(!kept.exists());
}
