//! Exit codes for the CLI tool.

use zipup::Error;

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Operation completed with warnings
pub const WARNING: i32 = 1;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Archive format error
pub const BAD_ARCHIVE: i32 = 3;
/// Missing or wrong password
pub const WRONG_PASSWORD: i32 = 4;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Invalid command line arguments
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Warning,
    FatalError,
    BadArchive,
    WrongPassword,
    IoError,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::Warning => WARNING,
            Self::FatalError => FATAL_ERROR,
            Self::BadArchive => BAD_ARCHIVE,
            Self::WrongPassword => WRONG_PASSWORD,
            Self::IoError => IO_ERROR,
            Self::BadArgs => BAD_ARGS,
        }
    }

    /// Success, or Warning when `warnings` is non-empty
    pub fn from_warnings(warnings: &[String]) -> Self {
        if warnings.is_empty() {
            Self::Success
        } else {
            Self::Warning
        }
    }
}

/// Converts a zipup error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::Io(_) | Error::ContainerOpen { .. } => ExitCode::IoError,
        Error::CorruptContainer { .. } | Error::UnsupportedFormat { .. } => ExitCode::BadArchive,
        Error::PasswordRequired { .. } | Error::WrongPassword { .. } => ExitCode::WrongPassword,
        Error::EntryNotFound { .. }
        | Error::DuplicatePath { .. }
        | Error::InvalidEntryPath(_)
        | Error::Config(_) => ExitCode::BadArgs,
        Error::PartialWriteFailure { source, .. } => error_to_exit_code(source),
        Error::PathTraversal { .. } | Error::ConcurrentModification { .. } => ExitCode::FatalError,
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::FatalError,
    }
}
