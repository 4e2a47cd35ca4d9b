//! Persisted CLI settings (`~/.zipup/config.json`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zipup::{CipherScheme, Error, Result};

/// Overrides the settings file location.
pub const CONFIG_ENV: &str = "ZIPUP_CONFIG";

/// Keys accepted by `zipup config`.
pub const KEYS: [&str; 2] = ["language", "encryption"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// UI language preference
    pub language: String,
    /// Default scheme for `passwd`
    pub encryption: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            encryption: CipherScheme::Aes.name().to_string(),
        }
    }
}

impl Settings {
    /// Location of the settings file
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::home_dir().map(|home| home.join(".zipup").join("config.json"))
    }

    /// Loads settings; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Writes settings, creating the parent directory
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "language" => Some(self.language.as_str()),
            "encryption" => Some(self.encryption.as_str()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "language" => self.language = value.to_string(),
            "encryption" => match CipherScheme::from_name(value) {
                Some(scheme @ (CipherScheme::Aes | CipherScheme::LegacyZipCrypto)) => {
                    self.encryption = scheme.name().to_string();
                }
                _ => {
                    return Err(Error::Config(format!(
                        "encryption must be 'aes' or 'zipcrypto', got '{value}'"
                    )));
                }
            },
            _ => {
                return Err(Error::Config(format!(
                    "unknown key '{key}', expected one of: {}",
                    KEYS.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Scheme used when `passwd` is not given one
    pub fn scheme(&self) -> CipherScheme {
        match CipherScheme::from_name(&self.encryption) {
            Some(CipherScheme::LegacyZipCrypto) => CipherScheme::LegacyZipCrypto,
            _ => CipherScheme::Aes,
        }
    }
}
