//! Project configuration (`rig.toml`) and its discovery.

use std::path::{Path, PathBuf};

use rig_schema::PackageDescriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::PolicyRule;

/// File name searched for from the working directory upwards.
pub const CONFIG_FILE_NAME: &str = "rig.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No rig.toml found from {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// `[checksum]` section.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChecksumSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub require_checksum: bool,
    /// Platforms checksums are collected for. Empty means the default matrix.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_envs: Vec<String>,
}

/// One `[[registries]]` entry: a local registry file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySpec {
    pub name: String,
    /// Relative paths are resolved against the config file's directory.
    pub path: PathBuf,
}

/// A parsed `rig.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub checksum: ChecksumSettings,
    #[serde(default)]
    pub registries: Vec<RegistrySpec>,
    #[serde(default)]
    pub packages: Vec<PackageDescriptor>,
    #[serde(default)]
    pub policy: Vec<PolicyRule>,
}

/// Loads configuration files.
pub trait ConfigReader: Send + Sync {
    /// # Errors
    ///
    /// [`ConfigError::Read`] or [`ConfigError::Parse`].
    fn read(&self, path: &Path) -> Result<Config, ConfigError>;
}

/// Reads `rig.toml` with the toml crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlConfigReader;

impl ConfigReader for TomlConfigReader {
    fn read(&self, path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.packages = config
            .packages
            .into_iter()
            .map(PackageDescriptor::normalized)
            .collect();
        Ok(config)
    }
}

/// Walk up from `start` to the first directory holding a `rig.toml`.
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}

/// The config file to use: `explicit` if given, otherwise the nearest one.
///
/// # Errors
///
/// [`ConfigError::NotFound`] when nothing is found.
pub fn resolve_config(cwd: &Path, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(ConfigError::NotFound(path.to_path_buf())),
        None => find_config(cwd).ok_or_else(|| ConfigError::NotFound(cwd.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_config_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_config(&nested), Some(dir.path().join(CONFIG_FILE_NAME)));
        assert!(resolve_config(&nested, Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn parses_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
            [checksum]
            enabled = true
            supported_envs = ["darwin", "linux/amd64"]

            [[registries]]
            name = "standard"
            path = "registry.toml"

            [[packages]]
            name = "cli/cli@v2.40.0"
            tags = ["ci"]

            [[policy]]
            name = "cli/*"
            "#,
        )
        .unwrap();

        let cfg = TomlConfigReader.read(&path).unwrap();
        assert!(cfg.checksum.enabled);
        assert!(!cfg.checksum.require_checksum);
        assert_eq!(cfg.packages[0].name, "cli/cli");
        assert_eq!(cfg.packages[0].version, "v2.40.0");
        assert_eq!(cfg.packages[0].registry, "standard");
        assert_eq!(cfg.policy.len(), 1);
    }

    #[test]
    fn malformed_config_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[[packages]\n").unwrap();
        assert!(matches!(
            TomlConfigReader.read(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
