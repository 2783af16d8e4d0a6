//! Installing many packages at once.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rig_schema::{Package, PackageDescriptor};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::pipeline::ChecksumPolicy;
use super::{InstallError, InstallOptions, Installer};
use crate::checksum::ChecksumStore;
use crate::config::ChecksumSettings;

/// Whether `pkg` survives the `--tags` / `--exclude-tags` filter.
///
/// Untagged packages are only selected when no include tags are given. Any
/// excluded tag wins over an included one.
pub fn matches_tags(pkg: &PackageDescriptor, tags: &[String], exclude: &[String]) -> bool {
    if tags.is_empty() && exclude.is_empty() {
        return true;
    }
    if pkg.tags.is_empty() {
        return tags.is_empty();
    }
    if pkg.tags.iter().any(|t| exclude.contains(t)) {
        return false;
    }
    if tags.is_empty() {
        return true;
    }
    pkg.tags.iter().any(|t| tags.contains(t))
}

fn mark_failed(flag: &Mutex<bool>) {
    *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
}

impl Installer {
    /// Install `packages` with at most `opts.max_parallelism` in flight.
    ///
    /// Links for every selected package are created first, one at a time.
    /// With checksums enabled, `checksum_file` is loaded once before any
    /// install starts and written once after all of them finish, whatever
    /// their outcome. A failing package never stops its siblings.
    ///
    /// # Errors
    ///
    /// [`InstallError::Failed`] if any package or link failed; a checksum
    /// manifest that cannot be read is returned as is.
    pub async fn install_packages(
        &self,
        packages: Vec<Package>,
        settings: &ChecksumSettings,
        checksum_file: &Path,
        opts: &InstallOptions,
    ) -> Result<(), InstallError> {
        let packages: Vec<Package> = packages
            .into_iter()
            .filter(|pkg| {
                let keep = matches_tags(&pkg.descriptor, &opts.tags, &opts.exclude_tags);
                if !keep {
                    tracing::debug!(package_name = %pkg.name(), "skipped by tag filter");
                }
                keep
            })
            .collect();

        let failed = Arc::new(Mutex::new(false));

        if !opts.skip_link {
            for pkg in &packages {
                if let Err(e) = self.link_package(pkg) {
                    tracing::error!(
                        package_name = %pkg.name(),
                        package_version = %pkg.version(),
                        registry = %pkg.registry(),
                        error = %e,
                        "failed to create links"
                    );
                    mark_failed(&failed);
                }
            }
        }

        if opts.only_link {
            return if *failed.lock().unwrap_or_else(PoisonError::into_inner) {
                Err(InstallError::Failed)
            } else {
                Ok(())
            };
        }

        let store = if settings.enabled {
            let store = Arc::new(ChecksumStore::new());
            store.read_file(checksum_file).await?;
            Some(store)
        } else {
            None
        };
        let guard = store.as_ref().map(|s| s.flush_guard(checksum_file));

        let semaphore = Arc::new(Semaphore::new(opts.max_parallelism.max(1)));
        let mut set = JoinSet::new();

        for pkg in packages {
            let installer = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let failed = Arc::clone(&failed);
            let store = store.clone();
            let opts = opts.clone();
            let require = settings.require_checksum;

            set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    mark_failed(&failed);
                    return;
                };
                let policy = store.as_deref().map(|store| ChecksumPolicy { store, require });
                if let Err(e) = installer.install_package(&pkg, policy, &opts).await {
                    tracing::error!(
                        package_name = %pkg.name(),
                        package_version = %pkg.version(),
                        registry = %pkg.registry(),
                        error = %e,
                        "install the package"
                    );
                    installer.reporter.failed(pkg.name(), pkg.version(), &e.to_string());
                    mark_failed(&failed);
                }
            });
        }

        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                tracing::error!(error = %e, "install task panicked");
                mark_failed(&failed);
            }
        }

        if let Some(guard) = guard {
            if let Err(e) = guard.finish().await {
                tracing::error!(error = %e, "failed to update the checksum manifest");
                mark_failed(&failed);
            }
        }

        if *failed.lock().unwrap_or_else(PoisonError::into_inner) {
            Err(InstallError::Failed)
        } else {
            Ok(())
        }
    }
}
