//! The per-package install pipeline: policy, validation, download with
//! verification, extraction, and executable fix-up.

use std::path::Path;
use std::sync::Arc;

use rig_schema::{Algorithm, ChecksumRecord, Package, PackageSource, PackageType};

use super::{InstallError, InstallOptions, Installer};
use crate::checksum::{ChecksumStore, fetch_checksums};
use crate::io::download::write_stream;
use crate::link::expose_command;

/// Extra attempts after a checksum mismatch.
pub const MAX_RETRY_DOWNLOAD: usize = 1;

/// Checksum handling for one run.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumPolicy<'a> {
    pub store: &'a ChecksumStore,
    /// Fail instead of trusting the first download when no digest is known.
    pub require: bool,
}

impl Installer {
    /// Install one package for this installer's runtime.
    ///
    /// Links are not created here; see [`Installer::link_package`]. With
    /// `checksums` set, downloads are verified against (and recorded into)
    /// the store.
    ///
    /// # Errors
    ///
    /// Policy denial, invalid metadata, `go_install` with `latest`, a missing
    /// required checksum, download or extraction failures. A file that
    /// cannot be located is only an error in test mode.
    pub async fn install_package(
        &self,
        pkg: &Package,
        checksums: Option<ChecksumPolicy<'_>>,
        opts: &InstallOptions,
    ) -> Result<(), InstallError> {
        self.policy.validate_package(&pkg.descriptor)?;

        let rt = self.runtime;
        let pkg = pkg.resolve(rt);
        let source = pkg.source()?;
        if source.kind() == PackageType::GoInstall && pkg.version() == "latest" {
            return Err(InstallError::GoInstallLatestForbidden);
        }

        let install_dir = pkg.install_dir(&self.root, rt)?;
        if tokio::fs::try_exists(&install_dir).await? {
            tracing::debug!(
                package_name = %pkg.name(),
                path = %install_dir.display(),
                "package is already installed"
            );
        } else {
            self.download_with_retry(&pkg, &source, &install_dir, checksums)
                .await?;
        }

        self.reporter.installing(pkg.name(), pkg.version());
        for file in pkg.info.files() {
            let result = async {
                let exe = self
                    .locate_executable(&pkg, &source, &file, &install_dir)
                    .await?;
                super::locate::check_file_src(&exe).await?;
                Ok::<_, InstallError>(exe)
            }
            .await;

            let exe = match result {
                Ok(exe) => exe,
                Err(e) if opts.test => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        package_name = %pkg.name(),
                        file_name = %file.name,
                        error = %e,
                        "check file_src is correct"
                    );
                    self.reporter
                        .warning(&format!("{}: {} is unusable: {e}", pkg.name(), file.name));
                    continue;
                }
            };

            if let Some(copy_dir) = &opts.copy_dir {
                let name = pkg.executable_name(&file.name, rt);
                super::locate::copy_executable(&exe, copy_dir, &name).await?;
            }
        }

        self.reporter.done(pkg.name(), pkg.version(), "installed");
        Ok(())
    }

    /// Expose every command of `pkg` in `<root>/bin`.
    ///
    /// # Errors
    ///
    /// Invalid metadata or a path that is in the way of a link.
    pub fn link_package(&self, pkg: &Package) -> Result<(), InstallError> {
        let pkg = pkg.resolve(self.runtime);
        for file in pkg.info.files() {
            expose_command(self.linker.as_ref(), &self.root, &file.name, self.runtime)?;
        }
        Ok(())
    }

    async fn download_with_retry(
        &self,
        pkg: &Package,
        source: &PackageSource,
        install_dir: &Path,
        checksums: Option<ChecksumPolicy<'_>>,
    ) -> Result<(), InstallError> {
        let mut attempt = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(InstallError::Cancelled);
            }
            match self.download_once(pkg, source, install_dir, checksums).await {
                Err(e) if e.is_retryable() && attempt < MAX_RETRY_DOWNLOAD => {
                    attempt += 1;
                    tracing::warn!(
                        package_name = %pkg.name(),
                        package_version = %pkg.version(),
                        error = %e,
                        "retry the download"
                    );
                }
                result => return result,
            }
        }
    }

    /// The checksum ID and, if known, the expected record. Consults the
    /// upstream checksum file when the store has nothing.
    async fn expected_checksum(
        &self,
        pkg: &Package,
        policy: ChecksumPolicy<'_>,
    ) -> Result<(String, Option<ChecksumRecord>), InstallError> {
        let rt = self.runtime;
        let id = pkg.checksum_id(rt)?;
        if let Some(record) = policy.store.get(&id) {
            return Ok((id, Some(record)));
        }

        if let Some(file) = pkg.checksum_file(rt)? {
            if self.cancel.is_cancelled() {
                return Err(InstallError::Cancelled);
            }
            fetch_checksums(
                pkg,
                rt,
                &file,
                policy.store,
                self.checksum_downloader.as_ref(),
            )
            .await?;
        }

        match policy.store.get(&id) {
            Some(record) => Ok((id, Some(record))),
            None if policy.require => Err(InstallError::ChecksumRequired { id }),
            None => Ok((id, None)),
        }
    }

    async fn download_once(
        &self,
        pkg: &Package,
        source: &PackageSource,
        install_dir: &Path,
        checksums: Option<ChecksumPolicy<'_>>,
    ) -> Result<(), InstallError> {
        let rt = self.runtime;

        if let PackageSource::GoInstall { path } = source {
            tokio::fs::create_dir_all(install_dir).await?;
            self.executor
                .go_install(path, pkg.version(), install_dir)
                .await?;
            return Ok(());
        }

        let verify = match checksums {
            Some(policy) if source.supports_checksum() => {
                Some((policy, self.expected_checksum(pkg, policy).await?))
            }
            _ => None,
        };
        let algorithm = verify
            .as_ref()
            .and_then(|(_, (_, record))| record.as_ref().map(|r| r.algorithm))
            .unwrap_or(Algorithm::Sha512);

        let parent = install_dir
            .parent()
            .ok_or_else(|| InstallError::context("Invalid install path", install_dir.display()))?;
        tokio::fs::create_dir_all(parent).await?;
        let staging = tempfile::Builder::new()
            .prefix(".rig-")
            .tempdir_in(parent)?;
        let artifact = staging.path().join("artifact");
        let file_name = pkg.download_file_name(rt)?;

        if self.cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        tracing::info!(
            package_name = %pkg.name(),
            package_version = %pkg.version(),
            asset_name = %file_name,
            "download and unarchive the package"
        );
        let name = pkg.name().to_string();
        let version = pkg.version().to_string();
        self.reporter.downloading(&name, &version, 0, None);
        let stream = self.downloader.get_stream(pkg, rt).await?;
        let reporter = Arc::clone(&self.reporter);
        let got = write_stream(stream, &artifact, algorithm, &self.cancel, |n| {
            reporter.downloading(&name, &version, n, None);
        })
        .await?;

        if let Some((policy, (id, record))) = verify {
            match record {
                Some(record) if !record.matches(&got.digest) => {
                    return Err(InstallError::ChecksumMismatch {
                        id,
                        expected: record.checksum,
                        actual: got.digest,
                    });
                }
                Some(_) => {}
                None => {
                    tracing::debug!(
                        checksum_id = %id,
                        "recording the checksum of the first download"
                    );
                    let record = ChecksumRecord::new(id.clone(), got.digest, Algorithm::Sha512);
                    policy.store.set(id, record);
                }
            }
        }

        self.reporter.extracting(pkg.name(), pkg.version());
        let format = pkg.format(rt)?;
        let extracted = staging.path().join("extracted");
        let unarchiver = Arc::clone(&self.unarchiver);
        let dest = extracted.clone();
        tokio::task::spawn_blocking(move || {
            unarchiver.unarchive(&artifact, &dest, format, &file_name)
        })
        .await
            .map_err(|e| InstallError::context("Extraction task panicked", e))??;

        if let Err(e) = tokio::fs::rename(&extracted, install_dir).await {
            // Another task installed the same artifact first.
            if !tokio::fs::try_exists(install_dir).await.unwrap_or(false) {
                return Err(e.into());
            }
        }
        Ok(())
    }
}
