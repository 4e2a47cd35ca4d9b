//! ZIP-family variant: plain `.zip` and obfuscated `.arc` containers.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};

use log::{debug, warn};
use zip::result::ZipError;
use zip::unstable::write::FileOptionsExt;
use zip::write::{FileOptions, SimpleFileOptions};
use zip::{ZipArchive, ZipWriter};

use crate::container::{ArchiveHandle, Backing, OpenMode, compression_level_for};
use crate::crypto::{CipherScheme, Password, PasswordState, Protection};
use crate::edit::{EditOptions, EditResult, MutationTransaction, Operation};
use crate::entry::{Entry, Snapshot, StagedEntry};
use crate::format::{ArchiveFormat, EntryVisitor, WriteSeek};
use crate::{Error, Result, Timestamp};

/// A ZIP-structured archive, plain or behind the `.arc` byte transform.
#[derive(Debug, Clone)]
pub struct ZipFormat {
    handle: ArchiveHandle,
}

impl ZipFormat {
    /// Wraps a handle whose format is ZIP.
    pub fn new(handle: ArchiveHandle) -> Self {
        debug_assert_eq!(handle.format(), crate::format::FormatKind::Zip);
        Self { handle }
    }

    fn open_archive(&self) -> Result<ZipArchive<Backing<File>>> {
        let backing = self.handle.open(OpenMode::Read)?;
        ZipArchive::new(backing).map_err(|e| self.open_error(e))
    }

    fn open_error(&self, e: ZipError) -> Error {
        match e {
            ZipError::Io(io) if io.kind() != io::ErrorKind::UnexpectedEof => Error::Io(io),
            other => Error::corrupt(self.handle.path(), other),
        }
    }

    fn entry_error(&self, e: ZipError, path: &str) -> Error {
        match e {
            ZipError::UnsupportedArchive(detail) if detail == ZipError::PASSWORD_REQUIRED => {
                Error::PasswordRequired {
                    path: path.to_string(),
                }
            }
            ZipError::InvalidPassword => Error::WrongPassword {
                entry_name: path.to_string(),
            },
            ZipError::FileNotFound => Error::EntryNotFound {
                path: path.to_string(),
            },
            ZipError::Io(io) => Error::Io(io),
            other => Error::corrupt(self.handle.path(), format!("{path}: {other}")),
        }
    }

    fn entry_at(&self, archive: &mut ZipArchive<Backing<File>>, index: usize) -> Result<Entry> {
        let raw = archive
            .by_index_raw(index)
            .map_err(|e| self.open_error(e))?;
        Ok(Entry {
            path: raw.name().to_string(),
            is_directory: raw.is_dir(),
            size: raw.size(),
            modified: raw.last_modified().and_then(Timestamp::from_zip),
            is_encrypted: raw.encrypted(),
        })
    }

    fn options_for<'k>(&self, entry: &StagedEntry, protection: &'k Protection) -> FileOptions<'k, ()> {
        let mut options: FileOptions<'k, ()> = SimpleFileOptions::default()
            .compression_method(self.handle.compression())
            .compression_level(compression_level_for(&self.handle))
            .unix_permissions(if entry.is_directory { 0o755 } else { 0o644 })
            .large_file(entry.data.len() as u64 >= u64::from(u32::MAX));
        if let Some(modified) = entry.modified {
            options = options.last_modified_time(modified.to_zip());
        }
        if entry.is_directory {
            return options;
        }
        match protection {
            Protection::None => options,
            Protection::ZipCrypto(password) => options.with_deprecated_encryption(password.as_bytes()),
            #[cfg(feature = "aes")]
            Protection::Aes(password) => {
                options.with_aes_encryption(zip::AesMode::Aes256, password.as_str())
            }
            #[cfg(not(feature = "aes"))]
            Protection::Aes(password) => options.with_deprecated_encryption(password.as_bytes()),
        }
    }

    fn write_staged<W: Write + Seek>(
        &self,
        writer: &mut ZipWriter<W>,
        entries: &[StagedEntry],
        protection: &Protection,
    ) -> Result<()> {
        for entry in entries {
            let options = self.options_for(entry, protection);
            if entry.is_directory {
                writer
                    .add_directory(entry.path.clone(), options)
                    .map_err(write_error)?;
            } else {
                writer
                    .start_file(entry.path.clone(), options)
                    .map_err(write_error)?;
                writer.write_all(&entry.data)?;
            }
        }
        Ok(())
    }

    fn classify_read_error(&self, e: Error, entry: &Entry, password: Option<&Password>) -> Error {
        // ZipCrypto's one-byte check lets about 1 in 256 wrong passwords
        // through; the CRC check then fails while reading.
        match e {
            Error::Io(io)
                if entry.is_encrypted
                    && password.is_some()
                    && matches!(io.kind(), io::ErrorKind::InvalidData | io::ErrorKind::Other) =>
            {
                Error::WrongPassword {
                    entry_name: entry.path.clone(),
                }
            }
            other => other,
        }
    }
}

#[cfg(feature = "aes")]
fn is_aes_entry(archive: &mut ZipArchive<Backing<File>>, index: usize) -> zip::result::ZipResult<bool> {
    Ok(archive.get_aes_verification_key_and_salt(index)?.is_some())
}

// Without AES support the extra field is not decoded; encrypted entries are
// reported as ZipCrypto.
#[cfg(not(feature = "aes"))]
fn is_aes_entry(_archive: &mut ZipArchive<Backing<File>>, _index: usize) -> zip::result::ZipResult<bool> {
    Ok(false)
}

fn write_error(e: ZipError) -> Error {
    match e {
        ZipError::Io(io) => Error::Io(io),
        other => Error::Io(io::Error::other(other)),
    }
}

impl ArchiveFormat for ZipFormat {
    fn handle(&self) -> &ArchiveHandle {
        &self.handle
    }

    fn create(&self) -> Result<()> {
        let backing = self.handle.open(OpenMode::Write)?;
        ZipWriter::new(backing).finish().map_err(write_error)?;
        debug!("created empty zip {}", self.handle.path().display());
        Ok(())
    }

    fn list_entries(&self) -> Result<Vec<Entry>> {
        let mut archive = self.open_archive()?;
        (0..archive.len())
            .map(|i| self.entry_at(&mut archive, i))
            .collect()
    }

    fn read_entry(&self, path: &str, password: Option<&Password>) -> Result<Vec<u8>> {
        let mut archive = self.open_archive()?;
        let index = archive.index_for_name(path).ok_or_else(|| Error::EntryNotFound {
            path: path.to_string(),
        })?;
        let entry = self.entry_at(&mut archive, index)?;

        let opened = match (entry.is_encrypted, password) {
            (true, None) => {
                return Err(Error::PasswordRequired {
                    path: path.to_string(),
                });
            }
            (true, Some(pw)) => archive.by_index_decrypt(index, pw.as_bytes()),
            (false, _) => archive.by_index(index),
        };
        let mut file = opened.map_err(|e| self.entry_error(e, path))?;

        let mut data = Vec::with_capacity(entry.size.min(64 * 1024 * 1024) as usize);
        file.read_to_end(&mut data)
            .map_err(|e| self.classify_read_error(e.into(), &entry, password))?;
        Ok(data)
    }

    fn write_entries(&self, entries: &[StagedEntry], protection: &Protection) -> Result<()> {
        let path = self.handle.path();
        let existing_len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        // zip refuses duplicate names mid-write, so reject them up front.
        let mut names: HashSet<String> = if existing_len > 0 {
            self.list_entries()?.into_iter().map(|e| e.path).collect()
        } else {
            HashSet::new()
        };
        for entry in entries {
            if !names.insert(entry.path.clone()) {
                return Err(Error::DuplicatePath {
                    path: entry.path.clone(),
                });
            }
        }

        let backing = self.handle.open(OpenMode::Append)?;
        let mut writer = if existing_len > 0 {
            ZipWriter::new_append(backing).map_err(|e| self.open_error(e))?
        } else {
            ZipWriter::new(backing)
        };
        self.write_staged(&mut writer, entries, protection)?;
        let mut backing = writer.finish().map_err(write_error)?;
        backing.truncate_here()?;
        debug!("appended {} entries to {}", entries.len(), path.display());
        Ok(())
    }

    fn visit_entries(
        &self,
        password: Option<&Password>,
        select: &dyn Fn(&Entry) -> bool,
        visitor: &mut EntryVisitor<'_>,
    ) -> Result<()> {
        let mut archive = self.open_archive()?;
        for index in 0..archive.len() {
            let entry = self.entry_at(&mut archive, index)?;
            if !select(&entry) {
                continue;
            }
            let opened = match (entry.is_encrypted, password) {
                (true, None) => {
                    return Err(Error::PasswordRequired {
                        path: entry.path.clone(),
                    });
                }
                (true, Some(pw)) => archive.by_index_decrypt(index, pw.as_bytes()),
                (false, _) => archive.by_index(index),
            };
            let mut file = opened.map_err(|e| self.entry_error(e, &entry.path))?;
            visitor(&entry, &mut file)
                .map_err(|e| self.classify_read_error(e, &entry, password))?;
        }
        Ok(())
    }

    fn read_all(&self, password: Option<&Password>) -> Result<Snapshot> {
        let mut entries = Vec::new();
        self.visit_entries(password, &|_| true, &mut |entry, reader| {
            let mut data = Vec::with_capacity(entry.size.min(64 * 1024 * 1024) as usize);
            if !entry.is_directory {
                reader.read_to_end(&mut data)?;
            }
            entries.push(StagedEntry {
                path: entry.path.clone(),
                is_directory: entry.is_directory,
                modified: entry.modified,
                data,
            });
            Ok(())
        })?;
        Ok(Snapshot {
            entries,
            comment: self.comment()?,
        })
    }

    fn write_all(
        &self,
        sink: &mut dyn WriteSeek,
        snapshot: &Snapshot,
        protection: &Protection,
    ) -> Result<()> {
        let mut writer = ZipWriter::new(sink);
        if !snapshot.comment.is_empty() {
            writer.set_comment(snapshot.comment.clone());
        }
        self.write_staged(&mut writer, &snapshot.entries, protection)?;
        writer.finish().map_err(write_error)?;
        Ok(())
    }

    fn comment(&self) -> Result<String> {
        let archive = self.open_archive()?;
        Ok(String::from_utf8_lossy(archive.comment()).into_owned())
    }

    /// Rewrites only the end-of-central-directory record, so entries keep
    /// their compressed bytes and no password is needed.
    fn set_comment(
        &self,
        text: &str,
        _password: Option<&Password>,
        options: &EditOptions,
    ) -> Result<EditResult> {
        let text = text.to_string();
        MutationTransaction::new(self, options).patch(|stream| {
            let mut writer = ZipWriter::new_append(&mut *stream).map_err(|e| self.open_error(e))?;
            writer.set_comment(text);
            let end = writer.finish().map_err(write_error)?.stream_position()?;
            // A shorter comment leaves stale bytes past the new end.
            stream.get_mut().get_mut().set_len(end)?;
            Ok(())
        })
    }

    fn password_state(&self) -> Result<PasswordState> {
        let mut archive = self.open_archive()?;
        let mut state = PasswordState::UNPROTECTED;
        for index in 0..archive.len() {
            let entry = self.entry_at(&mut archive, index)?;
            if !entry.is_encrypted {
                continue;
            }
            let scheme = if is_aes_entry(&mut archive, index).map_err(|e| self.open_error(e))? {
                CipherScheme::Aes
            } else {
                CipherScheme::LegacyZipCrypto
            };
            state.observe(scheme);
        }
        Ok(state)
    }

    fn rewrite_protection(&self, password: Option<&Password>) -> Result<Protection> {
        let state = self.password_state()?;
        if !state.has_password {
            return Ok(Protection::None);
        }
        let (protection, _) = Protection::for_scheme(state.scheme, password.cloned());
        Ok(protection)
    }

    fn set_password(
        &self,
        old: Option<&Password>,
        new: Option<&Password>,
        scheme: CipherScheme,
        options: &EditOptions,
    ) -> Result<EditResult> {
        let (protection, warning) = Protection::for_scheme(scheme, new.cloned());
        if new.is_some() && !protection.is_protected() {
            warn!("empty password given, removing protection instead");
        }
        let mut result =
            MutationTransaction::new(self, options).run(&[Operation::Reencrypt], old, &protection)?;
        result.warnings.extend(warning);
        Ok(result)
    }
}
