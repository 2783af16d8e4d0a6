//! Where a package comes from, one variant per package type.
//!
//! [`PackageSource`] is the validated form of the loosely typed coordinates
//! in [`PackageInfo`]. Everything that branches on the package type (install
//! layout, checksum identity, download location) lives here.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::package::{PackageInfo, PackageType};

/// Metadata that cannot describe a package of its type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A coordinate the type needs is absent or empty.
    #[error("{kind} package requires '{field}'")]
    MissingField {
        /// Package type being validated.
        kind: PackageType,
        /// Registry field name.
        field: &'static str,
    },

    /// The name cannot be used as a path component.
    #[error("Invalid package name '{0}'")]
    InvalidName(String),
}

/// Validated coordinates of a package, by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    /// A release asset.
    GithubRelease {
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
    },
    /// A file in a repository at the version tag.
    GithubContent {
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
        /// Path template inside the repository.
        path: String,
    },
    /// The source tarball of the version tag.
    GithubArchive {
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
    },
    /// Any URL.
    Http {
        /// URL template.
        url: String,
    },
    /// A source tarball built with `go build`.
    Go {
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
    },
    /// A module installed with `go install`.
    GoInstall {
        /// Module path.
        path: String,
    },
}

fn require(
    value: Option<&String>,
    kind: PackageType,
    field: &'static str,
) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(ValidationError::MissingField { kind, field }),
    }
}

impl PackageSource {
    /// Validate the coordinates of an (override-resolved) package.
    ///
    /// `path` and `url` are still templates at this point.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingField`] when the type's coordinates are incomplete.
    pub fn from_info(info: &PackageInfo) -> Result<Self, ValidationError> {
        let kind = info.kind;
        let owner = || require(info.repo_owner.as_ref(), kind, "repo_owner");
        let repo = || require(info.repo_name.as_ref(), kind, "repo_name");

        Ok(match kind {
            PackageType::GithubRelease => {
                require(info.asset.as_ref(), kind, "asset")?;
                Self::GithubRelease {
                    owner: owner()?,
                    repo: repo()?,
                }
            }
            PackageType::GithubContent => Self::GithubContent {
                owner: owner()?,
                repo: repo()?,
                path: require(info.path.as_ref(), kind, "path")?,
            },
            PackageType::GithubArchive => Self::GithubArchive {
                owner: owner()?,
                repo: repo()?,
            },
            PackageType::Http => Self::Http {
                url: require(info.url.as_ref(), kind, "url")?,
            },
            PackageType::Go => Self::Go {
                owner: owner()?,
                repo: repo()?,
            },
            PackageType::GoInstall => {
                let path = match (&info.path, &info.repo_owner, &info.repo_name) {
                    (Some(p), _, _) if !p.is_empty() => p.clone(),
                    (_, Some(o), Some(r)) => format!("github.com/{o}/{r}"),
                    _ => return Err(ValidationError::MissingField { kind, field: "path" }),
                };
                Self::GoInstall { path }
            }
        })
    }

    /// The package type this source was validated as.
    pub fn kind(&self) -> PackageType {
        match self {
            Self::GithubRelease { .. } => PackageType::GithubRelease,
            Self::GithubContent { .. } => PackageType::GithubContent,
            Self::GithubArchive { .. } => PackageType::GithubArchive,
            Self::Http { .. } => PackageType::Http,
            Self::Go { .. } => PackageType::Go,
            Self::GoInstall { .. } => PackageType::GoInstall,
        }
    }

    /// Go packages are built from source and have no upstream digest.
    pub fn supports_checksum(&self) -> bool {
        !matches!(self, Self::Go { .. } | Self::GoInstall { .. })
    }

    /// Checksum ID for this source at `version`.
    ///
    /// `artifact` is the rendered asset name (`github_release`), rendered
    /// content path (`github_content`) or rendered URL (`http`). Returns
    /// `None` for Go sources.
    pub fn checksum_id(&self, version: &str, artifact: &str) -> Option<String> {
        match self {
            Self::GithubRelease { owner, repo } => Some(format!(
                "github_release/github.com/{owner}/{repo}/{version}/{artifact}"
            )),
            Self::GithubContent { owner, repo, .. } => Some(format!(
                "github_content/github.com/{owner}/{repo}/{version}/{artifact}"
            )),
            Self::GithubArchive { owner, repo } => Some(format!(
                "github_archive/github.com/{owner}/{repo}/{version}"
            )),
            Self::Http { .. } => Some(format!("http/{artifact}")),
            Self::Go { .. } | Self::GoInstall { .. } => None,
        }
    }

    /// Directory under `root` that holds the installed artifact.
    ///
    /// For Go sources this is the directory holding the extracted source
    /// (`go`) or the `GOBIN` (`go_install`).
    pub fn install_dir(&self, root: &Path, version: &str, artifact: &str) -> PathBuf {
        let pkgs = root.join("pkgs");
        match self {
            Self::GithubRelease { owner, repo } => pkgs
                .join("github_release/github.com")
                .join(owner)
                .join(repo)
                .join(version)
                .join(artifact),
            Self::GithubContent { owner, repo, .. } => pkgs
                .join("github_content/github.com")
                .join(owner)
                .join(repo)
                .join(version)
                .join(artifact),
            Self::GithubArchive { owner, repo } => pkgs
                .join("github_archive/github.com")
                .join(owner)
                .join(repo)
                .join(version),
            Self::Http { .. } => {
                let trimmed = artifact
                    .trim_start_matches("https://")
                    .trim_start_matches("http://");
                pkgs.join("http").join(trimmed)
            }
            Self::Go { owner, repo } => go_root(root, owner, repo, version).join("src"),
            Self::GoInstall { path } => pkgs
                .join("go_install")
                .join(path)
                .join(version)
                .join("bin"),
        }
    }
}

/// `<root>/pkgs/go/github.com/<owner>/<repo>/<version>`, shared by the source
/// tree and the build output of `go` packages.
pub fn go_root(root: &Path, owner: &str, repo: &str, version: &str) -> PathBuf {
    root.join("pkgs/go/github.com")
        .join(owner)
        .join(repo)
        .join(version)
}
