//! # zipup
//!
//! Browse, edit and protect ZIP, TAR and obfuscated ARC archives.
//!
//! ZIP and TAR cannot delete or rename entries in place. Every operation
//! that removes or moves committed bytes reads the whole archive, applies the
//! change in memory, writes a new container next to the original and
//! atomically replaces it. A failure at any point leaves the original file
//! byte-for-byte unchanged.
//!
//! ## Quick Start
//!
//! ### Browsing an Archive
//!
//! ```rust,no_run
//! use zipup::{Result, Session};
//!
//! fn main() -> Result<()> {
//!     let mut session = Session::open("photos.zip")?;
//!
//!     for row in &session.view().rows {
//!         let kind = if row.is_directory { "DIR" } else { "" };
//!         println!("{:<4} {:<40} {:>10}", kind, row.display_name, row.size_label);
//!     }
//!
//!     session.enter("2024/")?;
//!     let bytes = session.read("2024/beach.jpg")?;
//!     println!("{} bytes", bytes.len());
//!     Ok(())
//! }
//! ```
//!
//! ### Editing
//!
//! ```rust,no_run
//! use zipup::{EditOptions, Result, Session};
//!
//! fn main() -> Result<()> {
//!     let mut session = Session::open("project.tar")?
//!         .with_options(EditOptions::new().max_output_bytes(64 * 1024 * 1024));
//!
//!     session.rename("draft/", "final/")?;
//!     session.delete(&["scratch.txt".to_string()])?;
//!     session.set_comment("release candidate")?;
//!     Ok(())
//! }
//! ```
//!
//! ### Password Protection
//!
//! ```rust,no_run
//! use zipup::{CipherScheme, Password, Result, Session};
//!
//! fn main() -> Result<()> {
//!     let mut session = Session::open("secret.zip")?;
//!     let result = session.set_password(None, Some(Password::new("hunter2")), CipherScheme::Aes)?;
//!     for warning in &result.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Container Formats
//!
//! | Extension | Structure | Notes |
//! |-----------|-----------|-------|
//! | `.zip` | ZIP | deflate; ZipCrypto or AES-256 entries |
//! | `.arc` | ZIP | every byte XOR-obfuscated, zstd when available |
//! | `.tar` | TAR | comment stored in a hidden member, no passwords |
//!
//! The `.arc` transform is obfuscation, not encryption. Use a password for
//! confidentiality.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `aes` | Yes | Write WinZip AES-256 entries |
//! | `zstd` | Yes | Zstandard compression inside `.arc` |
//! | `cli` | No | The `zipup` command-line tool |

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod archive_path;
pub mod cipher;
pub mod container;
pub mod crypto;
pub mod edit;
pub mod entry;
pub mod error;
pub mod format;
pub mod safety;
pub mod session;
pub mod timestamp;
pub mod view;

pub use archive_path::EntryPath;
pub use crypto::{CipherScheme, Password, PasswordState, Protection, aes_supported};
pub use error::{Error, Result};
pub use timestamp::Timestamp;

// Archive model
pub use container::{ArchiveHandle, OpenMode, zstd_supported};
pub use entry::{COMMENT_SENTINEL, Entry, Snapshot, StagedEntry};
pub use format::{ArchiveFormat, FormatKind, open_format};

// Editing
pub use edit::{EditOptions, EditResult, MutationTransaction, Operation};

// Browsing
pub use session::Session;
pub use view::{DirectoryProjector, FolderRow, SearchHit, VirtualFolderView, format_size};

pub use safety::validate_extract_path;
