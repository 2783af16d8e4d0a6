//! Registries: where package metadata comes from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rig_schema::{Package, PackageDescriptor, PackageInfo};
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read registry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse registry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    packages: Vec<PackageInfo>,
}

/// Installed registries, indexed by registry name then package name.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    registries: HashMap<String, HashMap<String, PackageInfo>>,
}

impl Registries {
    /// Register `packages` under `registry`. Entries without a name are ignored.
    pub fn insert(&mut self, registry: impl Into<String>, packages: Vec<PackageInfo>) {
        let index = self.registries.entry(registry.into()).or_default();
        for info in packages {
            if let Some(name) = info.registry_name() {
                index.insert(name, info);
            }
        }
    }

    pub fn lookup(&self, registry: &str, name: &str) -> Option<&PackageInfo> {
        self.registries.get(registry)?.get(name)
    }
}

/// Packages of a config joined with registry metadata.
#[derive(Debug, Clone, Default)]
pub struct ListedPackages {
    pub packages: Vec<Package>,
    /// Descriptors whose registry or package entry does not exist.
    pub unresolved: Vec<PackageDescriptor>,
}

/// Join every configured package with its registry entry.
///
/// Packages whose version is empty are left out entirely.
pub fn list_packages(config: &Config, registries: &Registries) -> ListedPackages {
    let mut out = ListedPackages::default();
    for desc in &config.packages {
        if desc.version.is_empty() {
            tracing::debug!(package_name = %desc.name, "package has no version, skipping");
            continue;
        }
        match registries.lookup(&desc.registry, &desc.name) {
            Some(info) => out.packages.push(Package::new(desc.clone(), info.clone())),
            None => {
                tracing::error!(
                    package_name = %desc.name,
                    registry = %desc.registry,
                    "package isn't found in the registry"
                );
                out.unresolved.push(desc.clone());
            }
        }
    }
    out
}

/// Makes a config's registries available.
#[async_trait]
pub trait RegistryInstaller: Send + Sync {
    async fn install_registries(
        &self,
        config: &Config,
        config_path: &Path,
    ) -> Result<Registries, RegistryError>;
}

/// Reads registry files from disk, relative to the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRegistryInstaller;

#[async_trait]
impl RegistryInstaller for LocalRegistryInstaller {
    async fn install_registries(
        &self,
        config: &Config,
        config_path: &Path,
    ) -> Result<Registries, RegistryError> {
        let base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let mut registries = Registries::default();

        for spec in &config.registries {
            let path = base.join(&spec.path);
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| RegistryError::Read {
                    path: path.clone(),
                    source,
                })?;
            let file: RegistryFile =
                toml::from_str(&content).map_err(|source| RegistryError::Parse {
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(
                registry = %spec.name,
                packages = file.packages.len(),
                "registry loaded"
            );
            registries.insert(spec.name.clone(), file.packages);
        }

        Ok(registries)
    }
}
