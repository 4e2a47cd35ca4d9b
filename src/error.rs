//! Error types for archive operations.
//!
//! This module provides the [`Error`] enum which represents every failure an
//! archive operation can report, along with a convenient [`Result<T>`] alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. None of
//! them are retried automatically: a corrupt container or a wrong password is
//! not a transient condition. The caller decides what to do, typically by
//! prompting for a password and repeating the same logical operation:
//!
//! ```rust,no_run
//! use zipup::{Error, Password, Session};
//!
//! fn read_with_retry(session: &mut Session, path: &str) -> zipup::Result<Vec<u8>> {
//!     match session.read(path) {
//!         Err(e) if e.is_password_error() => {
//!             session.set_session_password(Some(Password::new("prompted")));
//!             session.read(path)
//!         }
//!         other => other,
//!     }
//! }
//! ```
//!
//! ## Mutation guarantees
//!
//! A mutation that fails with any variant leaves the backing file byte-for-byte
//! unchanged. [`Error::PartialWriteFailure`] is reported when the rewrite phase
//! itself failed after the existing entries were read; the temporary output is
//! discarded in that case.

use std::io;
use std::path::PathBuf;

use crate::format::FormatKind;

/// The main error type for archive operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io], [`ContainerOpen`][Self::ContainerOpen] | File system operations |
/// | Format | [`CorruptContainer`][Self::CorruptContainer], [`UnsupportedFormat`][Self::UnsupportedFormat] | Invalid or unexpected container |
/// | Namespace | [`EntryNotFound`][Self::EntryNotFound], [`DuplicatePath`][Self::DuplicatePath], [`InvalidEntryPath`][Self::InvalidEntryPath] | Bad entry paths |
/// | Security | [`PasswordRequired`][Self::PasswordRequired], [`WrongPassword`][Self::WrongPassword], [`PathTraversal`][Self::PathTraversal] | Protection and extraction checks |
/// | Transaction | [`PartialWriteFailure`][Self::PartialWriteFailure], [`ConcurrentModification`][Self::ConcurrentModification] | Aborted rewrites |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred outside of opening the backing container.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backing file could not be opened in the requested mode.
    ///
    /// Covers permission problems, a missing file on read/append, or a full
    /// disk when creating.
    #[error("cannot open archive '{}': {source}", .path.display())]
    ContainerOpen {
        /// Path of the backing file.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The existing bytes do not parse as the declared container format.
    #[error("archive '{}' is corrupt: {reason}", .path.display())]
    CorruptContainer {
        /// Path of the backing file.
        path: PathBuf,
        /// Description of what failed to parse.
        reason: String,
    },

    /// No entry with the given path exists.
    #[error("entry not found: {path}")]
    EntryNotFound {
        /// The missing entry path.
        path: String,
    },

    /// An entry with the given path already exists.
    #[error("entry already exists: {path}")]
    DuplicatePath {
        /// The colliding entry path.
        path: String,
    },

    /// A read was attempted on an encrypted entry without a password.
    #[error("password required for encrypted entry: {path}")]
    PasswordRequired {
        /// The encrypted entry.
        path: String,
    },

    /// The supplied password failed to decode at least one entry.
    #[error("wrong password for entry: {entry_name}")]
    WrongPassword {
        /// The first entry that failed to decode.
        entry_name: String,
    },

    /// The operation is not available for this container format.
    #[error("{operation} is not supported for {} archives", format_label(.format))]
    UnsupportedFormat {
        /// The container format, if one could be determined.
        format: Option<FormatKind>,
        /// The rejected operation.
        operation: String,
    },

    /// A rewrite aborted after the existing entries were read.
    ///
    /// The original archive has not been touched.
    #[error("rewrite of '{}' aborted, archive left unchanged: {source}", .path.display())]
    PartialWriteFailure {
        /// Path of the backing file that was being rewritten.
        path: PathBuf,
        /// What went wrong while writing or committing.
        #[source]
        source: Box<Error>,
    },

    /// The backing file changed on disk between the read phase and the commit.
    #[error("archive '{}' was modified by another process during the operation", .path.display())]
    ConcurrentModification {
        /// Path of the backing file.
        path: PathBuf,
    },

    /// A caller-supplied entry path is not acceptable.
    #[error("invalid entry path: {0}")]
    InvalidEntryPath(String),

    /// An entry would be extracted outside of the destination directory.
    #[error("path traversal detected in entry: {path}")]
    PathTraversal {
        /// The offending entry path.
        path: String,
    },

    /// A settings file could not be read or written.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true for the errors a UI answers by prompting for a password.
    pub fn is_password_error(&self) -> bool {
        match self {
            Error::PasswordRequired { .. } | Error::WrongPassword { .. } => true,
            Error::PartialWriteFailure { source, .. } => source.is_password_error(),
            _ => false,
        }
    }

    /// Returns true if the error came out of an aborted rewrite.
    pub fn is_aborted_rewrite(&self) -> bool {
        matches!(
            self,
            Error::PartialWriteFailure { .. } | Error::ConcurrentModification { .. }
        )
    }

    pub(crate) fn unsupported(format: FormatKind, operation: &str) -> Self {
        Error::UnsupportedFormat {
            format: Some(format),
            operation: operation.to_string(),
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::CorruptContainer {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

fn format_label(format: &Option<FormatKind>) -> &'static str {
    match format {
        Some(kind) => kind.name(),
        None => "unrecognized",
    }
}

/// A specialized Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
