//! `update-checksum`: make sure every package has a checksum record for
//! every platform it supports.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use rig_schema::{
    Algorithm, ChecksumRecord, Package, PackageError, Runtime, RuntimeError, runtimes_from_envs,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::checksum::{ChecksumStore, FetchError, StoreError, checksum_file_path, fetch_checksums};
use crate::config::{ConfigError, ConfigReader, TomlConfigReader, resolve_config};
use crate::io::download::{
    ChecksumDownloader, DownloadError, HttpDownloader, PackageDownloader, hash_stream,
};
use crate::registry::{LocalRegistryInstaller, RegistryError, RegistryInstaller, list_packages};

#[derive(Error, Debug)]
pub enum BackfillError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Checksum(#[from] FetchError),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Cancelled")]
    Cancelled,

    #[error("Failed to update checksums")]
    Failed,
}

/// Flags of one `rig update-checksum` run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillOptions {
    /// Hash the real asset when a package declares no checksum file.
    pub deep: bool,
    /// Include the global config files.
    pub all: bool,
}

/// Fills the checksum manifest of one or more config files.
#[derive(Clone)]
pub struct ChecksumBackfillController {
    config_reader: Arc<dyn ConfigReader>,
    registry_installer: Arc<dyn RegistryInstaller>,
    downloader: Arc<dyn PackageDownloader>,
    checksum_downloader: Arc<dyn ChecksumDownloader>,
    global_configs: Vec<PathBuf>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ChecksumBackfillController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumBackfillController")
            .field("global_configs", &self.global_configs)
            .finish_non_exhaustive()
    }
}

impl Default for ChecksumBackfillController {
    fn default() -> Self {
        Self::new()
    }
}

impl ChecksumBackfillController {
    /// A controller wired to the real network and local registries.
    pub fn new() -> Self {
        let http = Arc::new(HttpDownloader::new(Client::new()));
        Self {
            config_reader: Arc::new(TomlConfigReader),
            registry_installer: Arc::new(LocalRegistryInstaller),
            downloader: http.clone(),
            checksum_downloader: http,
            global_configs: crate::paths::global_config_files(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config_reader(mut self, reader: Arc<dyn ConfigReader>) -> Self {
        self.config_reader = reader;
        self
    }

    pub fn with_registry_installer(mut self, installer: Arc<dyn RegistryInstaller>) -> Self {
        self.registry_installer = installer;
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn PackageDownloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_checksum_downloader(mut self, downloader: Arc<dyn ChecksumDownloader>) -> Self {
        self.checksum_downloader = downloader;
        self
    }

    pub fn with_global_configs(mut self, configs: Vec<PathBuf>) -> Self {
        self.global_configs = configs;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Update the manifest of the config found from `cwd` (or `explicit`),
    /// plus every existing global config when `opts.all` is set.
    ///
    /// # Errors
    ///
    /// [`BackfillError::Config`] when no config file is found, otherwise
    /// [`BackfillError::Failed`] if any config could not be fully updated.
    pub async fn update_checksum(
        &self,
        cwd: &Path,
        explicit: Option<&Path>,
        opts: BackfillOptions,
    ) -> Result<(), BackfillError> {
        let mut configs = vec![resolve_config(cwd, explicit)?];
        if opts.all {
            for global in &self.global_configs {
                if !global.is_file() {
                    tracing::debug!(
                        config_file_path = %global.display(),
                        "global config is missing"
                    );
                    continue;
                }
                if !configs.contains(global) {
                    configs.push(global.clone());
                }
            }
        }

        let mut failed = false;
        for config in &configs {
            if let Err(e) = self.update_config(config, opts.deep).await {
                tracing::error!(
                    config_file_path = %config.display(),
                    error = %e,
                    "update checksums"
                );
                failed = true;
            }
        }

        if failed { Err(BackfillError::Failed) } else { Ok(()) }
    }

    /// Update the manifest next to one config file.
    ///
    /// The manifest is written even when some packages fail.
    ///
    /// # Errors
    ///
    /// Unreadable config, registry or manifest; [`BackfillError::Failed`]
    /// once every package has been attempted and at least one failed.
    pub async fn update_config(&self, config_path: &Path, deep: bool) -> Result<(), BackfillError> {
        let config = self.config_reader.read(config_path)?;
        let registries = self
            .registry_installer
            .install_registries(&config, config_path)
            .await?;
        let listed = list_packages(&config, &registries);

        let manifest = checksum_file_path(config_path);
        let store = Arc::new(ChecksumStore::new());
        store.read_file(&manifest).await?;
        let guard = store.flush_guard(&manifest);

        let allowed: BTreeSet<Runtime> = runtimes_from_envs(&config.checksum.supported_envs)?
            .into_iter()
            .collect();

        let mut failed = !listed.unresolved.is_empty();
        let mut fetched = HashSet::new();

        for pkg in &listed.packages {
            if self.cancel.is_cancelled() {
                failed = true;
                break;
            }
            if let Err(e) = self
                .update_package(pkg, &allowed, &store, &mut fetched, deep)
                .await
            {
                tracing::error!(
                    package_name = %pkg.name(),
                    package_version = %pkg.version(),
                    registry = %pkg.registry(),
                    error = %e,
                    "update checksums"
                );
                failed = true;
            }
        }

        guard.finish().await?;

        if failed { Err(BackfillError::Failed) } else { Ok(()) }
    }

    async fn update_package(
        &self,
        pkg: &Package,
        allowed: &BTreeSet<Runtime>,
        store: &ChecksumStore,
        fetched: &mut HashSet<String>,
        deep: bool,
    ) -> Result<(), BackfillError> {
        let runtimes = runtimes_from_envs(&pkg.info.supported_envs)?;
        for rt in runtimes.into_iter().filter(|rt| allowed.contains(rt)) {
            let resolved = pkg.resolve(rt);
            self.update_runtime(&resolved, rt, store, fetched, deep)
                .await?;
        }
        Ok(())
    }

    async fn update_runtime(
        &self,
        pkg: &Package,
        rt: Runtime,
        store: &ChecksumStore,
        fetched: &mut HashSet<String>,
        deep: bool,
    ) -> Result<(), BackfillError> {
        if !pkg.source().map_err(PackageError::from)?.supports_checksum() {
            tracing::debug!(package_name = %pkg.name(), "built from source, no checksum");
            return Ok(());
        }

        let id = pkg.checksum_id(rt)?;
        if store.contains(&id) {
            tracing::debug!(checksum_id = %id, checksum_env = %rt, "checksum is already recorded");
            return Ok(());
        }

        let file = match pkg.info.active_checksum() {
            Some(_) => pkg.checksum_file(rt)?,
            None => None,
        };

        let Some(file) = file else {
            if !deep {
                tracing::debug!(
                    package_name = %pkg.name(),
                    checksum_env = %rt,
                    "checksum isn't supported"
                );
                return Ok(());
            }
            return self.record_by_download(pkg, rt, &id, store).await;
        };

        if !fetched.insert(file.id.clone()) {
            return Ok(());
        }
        tracing::info!(
            package_name = %pkg.name(),
            checksum_env = %rt,
            checksum_id = %file.id,
            "downloading checksum file"
        );
        fetch_checksums(pkg, rt, &file, store, self.checksum_downloader.as_ref()).await?;
        Ok(())
    }

    /// Deep mode: hash the asset itself.
    async fn record_by_download(
        &self,
        pkg: &Package,
        rt: Runtime,
        id: &str,
        store: &ChecksumStore,
    ) -> Result<(), BackfillError> {
        if self.cancel.is_cancelled() {
            return Err(BackfillError::Cancelled);
        }
        tracing::info!(
            package_name = %pkg.name(),
            checksum_env = %rt,
            checksum_id = %id,
            "downloading the asset to compute its checksum"
        );
        let stream = self.downloader.get_stream(pkg, rt).await?;
        let got = hash_stream(stream, Algorithm::Sha512, &self.cancel).await?;
        store.set(id, ChecksumRecord::new(id, got.digest, Algorithm::Sha512));
        Ok(())
    }
}
