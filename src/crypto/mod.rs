//! Password protection for ZIP-family archives.
//!
//! ZIP encrypts each entry independently, so an archive's protection is
//! inferred from its entries:
//!
//! - bit 0 of the general purpose flag marks an encrypted entry
//! - an AES extra field (header id `0x9901`) marks WinZip AES, otherwise the
//!   entry uses the legacy ZipCrypto stream cipher
//!
//! [`PasswordState`] summarizes that inspection. [`Protection`] describes how
//! entries are encoded when a container is written, and is what a
//! password change switches between.
//!
//! # Capability fallback
//!
//! AES writing requires the `aes` cargo feature. Without it
//! [`Protection::for_scheme`] downgrades an AES request to ZipCrypto and
//! returns a warning for the caller to surface.

mod password;

pub use password::Password;

use std::fmt;

/// Header id of the WinZip AES extra field.
pub const AES_EXTRA_FIELD_ID: u16 = 0x9901;

/// General purpose flag bit marking an encrypted entry.
pub const ENCRYPTED_FLAG: u16 = 0x0001;

/// Returns true if this build can write AES-encrypted entries.
pub const fn aes_supported() -> bool {
    cfg!(feature = "aes")
}

/// Entry encryption scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CipherScheme {
    /// Entries are stored without encryption.
    #[default]
    None,
    /// Traditional PKWARE encryption. Weak, but universally readable.
    LegacyZipCrypto,
    /// WinZip AES-256.
    Aes,
}

impl CipherScheme {
    /// Short lowercase name used in listings and settings files.
    pub fn name(&self) -> &'static str {
        match self {
            CipherScheme::None => "none",
            CipherScheme::LegacyZipCrypto => "zipcrypto",
            CipherScheme::Aes => "aes",
        }
    }

    /// Parses a scheme name as produced by [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" => Some(CipherScheme::None),
            "zipcrypto" | "legacy" => Some(CipherScheme::LegacyZipCrypto),
            "aes" | "aes256" => Some(CipherScheme::Aes),
            _ => None,
        }
    }
}

impl fmt::Display for CipherScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Protection summary of an archive, inferred from its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PasswordState {
    /// True if at least one entry is encrypted.
    pub has_password: bool,
    /// The strongest scheme found. `None` when nothing is encrypted.
    pub scheme: CipherScheme,
}

impl PasswordState {
    /// State of an archive without encrypted entries.
    pub const UNPROTECTED: PasswordState = PasswordState {
        has_password: false,
        scheme: CipherScheme::None,
    };

    /// Folds one entry's scheme into the summary.
    pub fn observe(&mut self, scheme: CipherScheme) {
        match scheme {
            CipherScheme::None => {}
            CipherScheme::LegacyZipCrypto => {
                self.has_password = true;
                if self.scheme == CipherScheme::None {
                    self.scheme = CipherScheme::LegacyZipCrypto;
                }
            }
            CipherScheme::Aes => {
                self.has_password = true;
                self.scheme = CipherScheme::Aes;
            }
        }
    }
}

/// How entries are encoded when written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Protection {
    /// No encryption.
    #[default]
    None,
    /// Legacy ZipCrypto with the given password.
    ZipCrypto(Password),
    /// WinZip AES-256 with the given password.
    Aes(Password),
}

impl Protection {
    /// Builds the protection for `scheme`, applying the AES capability fallback.
    ///
    /// A missing password, or an empty one, yields [`Protection::None`].
    /// The second value carries a warning when AES was requested but this
    /// build cannot write it.
    pub fn for_scheme(scheme: CipherScheme, password: Option<Password>) -> (Self, Option<String>) {
        let password = match password {
            Some(p) if !p.is_empty() => p,
            _ => return (Protection::None, None),
        };
        match scheme {
            CipherScheme::None => (Protection::None, None),
            CipherScheme::LegacyZipCrypto => (Protection::ZipCrypto(password), None),
            CipherScheme::Aes if aes_supported() => (Protection::Aes(password), None),
            CipherScheme::Aes => {
                let warning =
                    "AES encryption is not available in this build; entries were protected with ZipCrypto"
                        .to_string();
                log::warn!("{warning}");
                (Protection::ZipCrypto(password), Some(warning))
            }
        }
    }

    /// Returns the scheme written by this protection.
    pub fn scheme(&self) -> CipherScheme {
        match self {
            Protection::None => CipherScheme::None,
            Protection::ZipCrypto(_) => CipherScheme::LegacyZipCrypto,
            Protection::Aes(_) => CipherScheme::Aes,
        }
    }

    /// Returns the password, if any.
    pub fn password(&self) -> Option<&Password> {
        match self {
            Protection::None => None,
            Protection::ZipCrypto(p) | Protection::Aes(p) => Some(p),
        }
    }

    /// Returns true if entries are encrypted.
    pub fn is_protected(&self) -> bool {
        !matches!(self, Protection::None)
    }
}
