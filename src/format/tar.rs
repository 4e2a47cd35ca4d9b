//! TAR variant.
//!
//! TAR has no archive-level comment and no encryption. The comment is kept
//! in the hidden member [`COMMENT_SENTINEL`]; password operations report
//! [`Error::UnsupportedFormat`].
//!
//! Appends are done in place: the end-of-archive zero blocks are cut off
//! after the last member and new members are written from there.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};

use log::debug;
use tar::{Archive, Builder, EntryType, Header};

use crate::container::{ArchiveHandle, Backing, OpenMode};
use crate::crypto::{Password, Protection};
use crate::entry::{COMMENT_SENTINEL, Entry, Snapshot, StagedEntry, is_comment_sentinel};
use crate::format::{ArchiveFormat, EntryVisitor, FormatKind, WriteSeek};
use crate::{Error, Result, Timestamp};

const BLOCK_SIZE: u64 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    File,
    Directory,
    // Links, devices, fifos, sparse files.
    Special,
}

struct Member {
    entry: Entry,
    kind: MemberKind,
    data_end: u64,
}

fn classify(entry_type: EntryType) -> Option<MemberKind> {
    if entry_type.is_file() || entry_type.is_contiguous() {
        Some(MemberKind::File)
    } else if entry_type.is_dir() {
        Some(MemberKind::Directory)
    } else if entry_type.is_pax_global_extensions()
        || entry_type.is_pax_local_extensions()
        || entry_type.is_gnu_longname()
        || entry_type.is_gnu_longlink()
    {
        None
    } else {
        Some(MemberKind::Special)
    }
}

/// A TAR archive.
#[derive(Debug, Clone)]
pub struct TarFormat {
    handle: ArchiveHandle,
}

impl TarFormat {
    /// Wraps a handle whose format is TAR.
    pub fn new(handle: ArchiveHandle) -> Self {
        debug_assert_eq!(handle.format(), FormatKind::Tar);
        Self { handle }
    }

    /// Calls `f` for every member except extension headers, in stored order.
    fn for_each_member(
        &self,
        f: &mut dyn FnMut(&Member, &mut dyn Read) -> Result<()>,
    ) -> Result<()> {
        let path = self.handle.path();
        let backing = self.handle.open(OpenMode::Read)?;
        let mut archive = Archive::new(backing);
        let members = archive
            .entries()
            .map_err(|e| Error::corrupt(path, e))?;

        for item in members {
            let mut raw = item.map_err(|e| Error::corrupt(path, e))?;
            let Some(kind) = classify(raw.header().entry_type()) else {
                continue;
            };

            let mut name = String::from_utf8_lossy(&raw.path_bytes()).into_owned();
            if kind == MemberKind::Directory && !name.ends_with('/') {
                name.push('/');
            }
            let size = raw.size();
            let member = Member {
                entry: Entry {
                    path: name,
                    is_directory: kind == MemberKind::Directory,
                    size: if kind == MemberKind::File { size } else { 0 },
                    modified: raw
                        .header()
                        .mtime()
                        .ok()
                        .map(|secs| Timestamp::from_unix_secs(secs as i64)),
                    is_encrypted: false,
                },
                kind,
                data_end: raw.raw_file_position() + size,
            };
            f(&member, &mut raw)?;
        }
        Ok(())
    }

    /// Offset just past the last member's padded data.
    fn data_end(&self) -> Result<u64> {
        let mut end = 0;
        self.for_each_member(&mut |member, _| {
            end = member.data_end.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
            Ok(())
        })?;
        Ok(end)
    }

    fn special_member(path: &str) -> Error {
        Error::UnsupportedFormat {
            format: Some(FormatKind::Tar),
            operation: format!("link or special member '{path}'"),
        }
    }
}

fn append_staged<W: std::io::Write>(builder: &mut Builder<W>, entry: &StagedEntry) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(entry.data.len() as u64);
    header.set_mtime(
        entry
            .modified
            .map(|t| t.as_unix_secs().max(0) as u64)
            .unwrap_or(0),
    );
    if entry.is_directory {
        header.set_entry_type(EntryType::Directory);
        header.set_mode(0o755);
    } else {
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
    }
    builder.append_data(&mut header, &entry.path, entry.data.as_slice())?;
    Ok(())
}

impl ArchiveFormat for TarFormat {
    fn handle(&self) -> &ArchiveHandle {
        &self.handle
    }

    fn create(&self) -> Result<()> {
        let backing = self.handle.open(OpenMode::Write)?;
        Builder::new(backing).into_inner()?;
        debug!("created empty tar {}", self.handle.path().display());
        Ok(())
    }

    fn list_entries(&self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        self.for_each_member(&mut |member, _| {
            if !is_comment_sentinel(&member.entry.path) {
                entries.push(member.entry.clone());
            }
            Ok(())
        })?;
        Ok(entries)
    }

    fn read_entry(&self, path: &str, _password: Option<&Password>) -> Result<Vec<u8>> {
        let mut found = None;
        self.for_each_member(&mut |member, reader| {
            if member.entry.path != path || is_comment_sentinel(path) {
                return Ok(());
            }
            if member.kind == MemberKind::Special {
                return Err(Self::special_member(path));
            }
            // Later members shadow earlier ones with the same name.
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            found = Some(data);
            Ok(())
        })?;
        found.ok_or_else(|| Error::EntryNotFound {
            path: path.to_string(),
        })
    }

    fn write_entries(&self, entries: &[StagedEntry], _protection: &Protection) -> Result<()> {
        if let Some(reserved) = entries.iter().find(|e| is_comment_sentinel(&e.path)) {
            return Err(Error::InvalidEntryPath(format!("'{}' is reserved", reserved.path)));
        }
        let path = self.handle.path();
        let existing_len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let end = if existing_len > 0 { self.data_end()? } else { 0 };

        let mut backing: Backing<File> = self.handle.open(OpenMode::Append)?;
        backing.seek(SeekFrom::Start(end))?;
        backing.get_mut().set_len(end)?;

        let mut builder = Builder::new(backing);
        for entry in entries {
            append_staged(&mut builder, entry)?;
        }
        let backing = builder.into_inner()?;
        backing.into_inner().sync_all()?;
        debug!("appended {} members to {}", entries.len(), path.display());
        Ok(())
    }

    fn visit_entries(
        &self,
        _password: Option<&Password>,
        select: &dyn Fn(&Entry) -> bool,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<()> {
        self.for_each_member(&mut |member, reader| {
            if is_comment_sentinel(&member.entry.path) || !select(&member.entry) {
                return Ok(());
            }
            if member.kind == MemberKind::Special {
                return Err(Self::special_member(&member.entry.path));
            }
            visitor(&member.entry, reader)
        })
    }

    fn read_all(&self, _password: Option<&Password>) -> Result<Snapshot> {
        let mut snapshot = Snapshot::default();
        self.for_each_member(&mut |member, reader| {
            if member.kind == MemberKind::Special {
                return Err(Self::special_member(&member.entry.path));
            }
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            if is_comment_sentinel(&member.entry.path) {
                snapshot.comment = String::from_utf8_lossy(&data).into_owned();
                return Ok(());
            }
            snapshot.entries.push(StagedEntry {
                path: member.entry.path.clone(),
                is_directory: member.entry.is_directory,
                modified: member.entry.modified,
                data,
            });
            Ok(())
        })?;
        Ok(snapshot)
    }

    fn write_all(
        &self,
        sink: &mut dyn WriteSeek,
        snapshot: &Snapshot,
        protection: &Protection,
    ) -> Result<()> {
        if protection.is_protected() {
            return Err(Error::unsupported(FormatKind::Tar, "password protection"));
        }
        let mut builder = Builder::new(sink);
        for entry in &snapshot.entries {
            append_staged(&mut builder, entry)?;
        }
        if !snapshot.comment.is_empty() {
            let sentinel = StagedEntry::file(COMMENT_SENTINEL, snapshot.comment.as_bytes().to_vec());
            append_staged(&mut builder, &sentinel)?;
        }
        builder.into_inner()?;
        Ok(())
    }

    fn comment(&self) -> Result<String> {
        let mut comment = String::new();
        self.for_each_member(&mut |member, reader| {
            if is_comment_sentinel(&member.entry.path) {
                comment.clear();
                reader.read_to_string(&mut comment)?;
            }
            Ok(())
        })?;
        Ok(comment)
    }
}
