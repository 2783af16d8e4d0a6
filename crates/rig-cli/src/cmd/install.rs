//! `rig install`

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use rig_core::checksum::checksum_file_path;
use rig_core::config::resolve_config;
use rig_core::policy::GlobPolicy;
use rig_core::registry::{LocalRegistryInstaller, RegistryInstaller, list_packages};
use rig_core::{ConfigReader, InstallOptions, Installer, TomlConfigReader, TracingReporter};
use rig_schema::Runtime;

/// Install every package of the resolved config for the current platform.
pub async fn install(
    config: Option<&Path>,
    root_dir: Option<&Path>,
    opts: InstallOptions,
) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let config_path = resolve_config(&cwd, config)?;
    let config = TomlConfigReader.read(&config_path)?;

    let root = match root_dir {
        Some(dir) => dir.to_path_buf(),
        None => rig_core::try_root_dir().context("Could not determine the rig root directory")?,
    };
    let runtime = Runtime::from_env()?;

    let registries = LocalRegistryInstaller
        .install_registries(&config, &config_path)
        .await?;
    let listed = list_packages(&config, &registries);

    let installer = Installer::new(&root, runtime)
        .with_policy(Arc::new(GlobPolicy::new(&config.policy)?))
        .with_reporter(Arc::new(TracingReporter))
        .with_cancellation(super::cancel_on_ctrl_c());

    tracing::debug!(
        config_file_path = %config_path.display(),
        root_dir = %root.display(),
        runtime = %runtime,
        packages = listed.packages.len(),
        "install packages"
    );
    let result = installer
        .install_packages(
            listed.packages,
            &config.checksum,
            &checksum_file_path(&config_path),
            &opts,
        )
        .await;

    if !listed.unresolved.is_empty() {
        bail!(
            "{} package(s) not found in any registry",
            listed.unresolved.len()
        );
    }
    result?;
    Ok(())
}
