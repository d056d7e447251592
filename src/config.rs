//! Configuration file handling.
//!
//! The configuration file is stored at `$GIRO_HOME/config.json`. Besides the app name and
//! version it holds a map of sections, each a map of string keys to string values. The codecs
//! look values up by `(section, key)`, e.g. `("bankgiro", "signer_lock")`.

use crate::giro::KeyMode;
use crate::{fs, Result};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "giro";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";

pub const BANKGIRO: &str = "bankgiro";
pub const PLUSGIRO: &str = "plusgiro";
pub const DEFAULT_SIGNER_DEVICE: &str = "/dev/bgsigner";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$GIRO_HOME` and from there it loads `$GIRO_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory and writes a default `config.json` into it. An existing config
    /// file is never overwritten.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = dir.into();
        fs::create_dir_all(&maybe_relative).context("Unable to create the giro home directory")?;
        let root = fs::canonicalize(&maybe_relative)?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!("The config file already exists '{}'", config_path.display())
        }
        let config_file = ConfigFile::default();
        config_file.save(&config_path)?;

        Ok(Self {
            root,
            config_path,
            config_file,
        })
    }

    /// Validates that `giro_home` and its config file exist and loads the config file.
    pub fn load(giro_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = giro_home.into();
        let root = fs::canonicalize(&maybe_relative).context("Giro Home is missing")?;
        ensure!(root.is_dir(), "Giro Home is not a directory '{}'", root.display());

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path)?;
        Ok(Self {
            root,
            config_path,
            config_file,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The value of `key` in `section`. Empty values count as unset.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.config_file
            .sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, section: &str, key: &str) -> Result<&str> {
        self.get(section, key).with_context(|| {
            format!(
                "'{section}.{key}' is not set in {}",
                self.config_path.display()
            )
        })
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.config_file
            .sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn save(&self) -> Result<()> {
        self.config_file.save(&self.config_path)
    }

    /// The passphrase that unlocks the key of the signing device.
    pub fn signer_lock(&self) -> Result<&str> {
        self.require(BANKGIRO, "signer_lock")
    }

    /// The seal key as hex, for the software signer.
    pub fn test_key(&self) -> Result<&str> {
        self.require(BANKGIRO, "test_key")
    }

    /// The key slot of the signing device, `128` unless set to `256`.
    pub fn signer_key_mode(&self) -> KeyMode {
        match self.get(BANKGIRO, "signer_key_mode") {
            Some("256") => KeyMode::Key256,
            _ => KeyMode::Key128,
        }
    }

    pub fn signer_device(&self) -> &str {
        self.get(BANKGIRO, "signer_device")
            .unwrap_or(DEFAULT_SIGNER_DEVICE)
    }

    /// Text for the fixed information record of payment orders.
    pub fn fixed_information(&self) -> Option<&str> {
        self.get(BANKGIRO, "fixed_information")
    }

    pub fn service_bureau_number(&self) -> Result<&str> {
        self.require(BANKGIRO, "service_bureau_number")
    }

    pub fn sending_bank_account(&self) -> Result<&str> {
        self.require(PLUSGIRO, "sending_bank_account")
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "giro",
///   "config_version": 1,
///   "sections": {
///     "bankgiro": {
///       "signer_device": "/dev/bgsigner",
///       "signer_lock": "secret",
///       "fixed_information": "VID SIGILLFEL KONTAKTA 0708562650."
///     },
///     "plusgiro": {
///       "sending_bank_account": "12345678"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "giro"
    app_name: String,

    config_version: u8,

    #[serde(default)]
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let mut bankgiro = BTreeMap::new();
        bankgiro.insert(
            "signer_device".to_string(),
            DEFAULT_SIGNER_DEVICE.to_string(),
        );
        let mut sections = BTreeMap::new();
        sections.insert(BANKGIRO.to_string(), bankgiro);
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sections,
        }
    }
}

impl ConfigFile {
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        ensure!(
            config.config_version <= CONFIG_VERSION,
            "Config file version {} is newer than this program supports ({})",
            config.config_version,
            CONFIG_VERSION
        );
        Ok(config)
    }

    fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        fs::write_all(path, data.into_bytes()).context("Unable to write config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("giro_home");

        let config = Config::create(&home).unwrap();
        assert!(config.config_path().is_file());
        assert_eq!(config.signer_device(), DEFAULT_SIGNER_DEVICE);
        assert!(config.signer_lock().is_err());
        assert_eq!(config.signer_key_mode(), KeyMode::Key128);

        let loaded = Config::load(&home).unwrap();
        assert_eq!(loaded.root(), config.root());
        assert_eq!(loaded.config_file, config.config_file);
    }

    #[test]
    fn test_config_create_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path()).unwrap();
        assert!(Config::create(dir.path()).is_err());
    }

    #[test]
    fn test_config_set_and_save() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::create(dir.path()).unwrap();
        config.set(BANKGIRO, "signer_lock", "hemligt");
        config.set(BANKGIRO, "signer_key_mode", "256");
        config.set(PLUSGIRO, "sending_bank_account", "");
        config.save().unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.signer_lock().unwrap(), "hemligt");
        assert_eq!(loaded.signer_key_mode(), KeyMode::Key256);
        assert_eq!(loaded.get(PLUSGIRO, "sending_bank_account"), None);
        let err = loaded.sending_bank_account().unwrap_err();
        assert!(err.to_string().contains("plusgiro.sending_bank_account"));
    }

    #[test]
    fn test_config_file_load_minimal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        std::fs::write(&path, r#"{"app_name": "giro", "config_version": 1}"#).unwrap();
        let config = ConfigFile::load(&path).unwrap();
        assert!(config.sections.is_empty());
    }

    #[test]
    fn test_config_file_load_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);

        std::fs::write(&path, r#"{"app_name": "bankgiro", "config_version": 1}"#).unwrap();
        let err = ConfigFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid app_name"));

        std::fs::write(&path, r#"{"app_name": "giro", "config_version": 9}"#).unwrap();
        assert!(ConfigFile::load(&path).is_err());
    }

    #[test]
    fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).is_err());
        assert!(Config::load(dir.path()).is_err());
    }
}
