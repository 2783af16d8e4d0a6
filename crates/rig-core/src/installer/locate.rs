//! Finding each command's executable inside an installed package.

use std::path::{Path, PathBuf};

use rig_schema::source::go_root;
use rig_schema::{File, Package, PackageSource};

use super::{InstallError, Installer};

impl Installer {
    /// Absolute path of `file`'s executable.
    ///
    /// `go` packages are built from their source tree on first use; every
    /// other type points into the extracted artifact.
    pub(crate) async fn locate_executable(
        &self,
        pkg: &Package,
        source: &PackageSource,
        file: &File,
        install_dir: &Path,
    ) -> Result<PathBuf, InstallError> {
        let rt = self.runtime;
        match source {
            PackageSource::Go { owner, repo } => {
                let exe = go_root(&self.root, owner, repo, pkg.version())
                    .join("bin")
                    .join(pkg.executable_name(&file.name, rt));
                if !tokio::fs::try_exists(&exe).await? {
                    let dir = pkg.file_dir(file, rt)?;
                    let build_dir = if dir.is_empty() {
                        install_dir.to_path_buf()
                    } else {
                        install_dir.join(dir)
                    };
                    let src = pkg.go_build_src(file, rt)?;
                    tracing::info!(
                        package_name = %pkg.name(),
                        file_name = %file.name,
                        exe_path = %exe.display(),
                        go_src = %src,
                        go_build_dir = %build_dir.display(),
                        "building Go tool"
                    );
                    self.executor.go_build(&build_dir, &src, &exe).await?;
                }
                Ok(exe)
            }
            PackageSource::GoInstall { .. } => {
                Ok(install_dir.join(pkg.executable_name(&file.name, rt)))
            }
            _ => Ok(install_dir.join(pkg.file_src(file, rt)?)),
        }
    }
}

/// The executable must exist and not be a directory; a missing owner exec
/// bit is added.
///
/// # Errors
///
/// [`InstallError::FileNotFound`], [`InstallError::IsDirectory`] or
/// [`InstallError::Chmod`].
pub async fn check_file_src(path: &Path) -> Result<(), InstallError> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(InstallError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    if meta.is_dir() {
        return Err(InstallError::IsDirectory(path.to_path_buf()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = meta.permissions().mode();
        if mode & 0o100 == 0 {
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o100))
                .await
                .map_err(|source| InstallError::Chmod {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
    }
    Ok(())
}

/// Copy `exe` to `<dir>/<name>` with mode 0755.
///
/// # Errors
///
/// Any I/O failure.
pub async fn copy_executable(
    exe: &Path,
    dir: &Path,
    name: &str,
) -> Result<PathBuf, InstallError> {
    tokio::fs::create_dir_all(dir).await?;
    let dest = dir.join(name);
    tokio::fs::copy(exe, &dest).await.map_err(|e| {
        InstallError::context("Failed to copy executable", format!("{}: {e}", dest.display()))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755)).await?;
    }
    tracing::info!(exe_path = %dest.display(), "copied executable");
    Ok(dest)
}
