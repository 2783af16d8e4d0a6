//! Package descriptors (what the user asked for) and registry metadata
//! (how to fetch it), plus the rendering that turns both into concrete
//! asset names, checksum IDs and install paths for one runtime.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checksum::{ChecksumConfig, ChecksumSourceType};
use crate::overrides::Override;
use crate::runtime::Runtime;
use crate::source::{PackageSource, ValidationError};
use crate::template::{self, TemplateContext, TemplateError};

/// Registry used when a package entry names none.
pub const DEFAULT_REGISTRY: &str = "standard";

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

/// A package requested by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Registry lookup key, e.g. `cli/cli`. `name@version` shorthand is accepted.
    pub name: String,
    /// Pinned version, e.g. `v2.40.0`.
    #[serde(default)]
    pub version: String,
    /// Registry the metadata is looked up in.
    #[serde(default = "default_registry")]
    pub registry: String,
    /// Labels matched by `--tags` / `--exclude-tags`.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PackageDescriptor {
    /// A descriptor in the default registry, without tags.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            registry: default_registry(),
            tags: Vec::new(),
        }
        .normalized()
    }

    /// Split `name@version` shorthand when no explicit version is given.
    pub fn normalized(mut self) -> Self {
        if self.version.is_empty() {
            if let Some((name, version)) = self.name.rsplit_once('@') {
                let (name, version) = (name.to_string(), version.to_string());
                self.name = name;
                self.version = version;
            }
        }
        self
    }
}

/// How a package is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    /// A release asset on GitHub.
    #[default]
    GithubRelease,
    /// A single file from a repository at a tag.
    GithubContent,
    /// The source tarball of a tag.
    GithubArchive,
    /// Any URL.
    Http,
    /// A source tarball built locally with `go build`.
    Go,
    /// `go install <path>@<version>`.
    GoInstall,
}

impl PackageType {
    /// Name as written in registries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GithubRelease => "github_release",
            Self::GithubContent => "github_content",
            Self::GithubArchive => "github_archive",
            Self::Http => "http",
            Self::Go => "go",
            Self::GoInstall => "go_install",
        }
    }
}

impl std::fmt::Display for PackageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archive layout of a downloaded artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveFormat {
    /// Gzip-compressed tarball.
    #[serde(rename = "tar.gz", alias = "tgz")]
    TarGz,
    /// Zstandard-compressed tarball.
    #[serde(rename = "tar.zst", alias = "tzst")]
    TarZst,
    /// Uncompressed tarball.
    #[serde(rename = "tar")]
    Tar,
    /// Zip archive.
    #[serde(rename = "zip")]
    Zip,
    /// A bare executable.
    #[serde(rename = "raw")]
    Raw,
}

impl ArchiveFormat {
    /// Name as written in registries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
            Self::Tar => "tar",
            Self::Zip => "zip",
            Self::Raw => "raw",
        }
    }

    /// Guess the format from a file name's extension. Unknown is raw.
    pub fn detect(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else if lower.ends_with(".tar.zst") || lower.ends_with(".tzst") {
            Self::TarZst
        } else if lower.ends_with(".tar") {
            Self::Tar
        } else if lower.ends_with(".zip") {
            Self::Zip
        } else {
            Self::Raw
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An executable shipped by a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    /// Command name exposed on PATH.
    pub name: String,
    /// Path inside the extracted tree (template). Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Build directory inside the source tree, for `go` packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl File {
    /// A command found under its own name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            src: None,
            dir: None,
        }
    }
}

/// Maps Go platform names onto the names used in asset file names.
pub type Replacements = BTreeMap<String, String>;

/// Registry metadata describing how to fetch, verify and unpack a package.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Lookup key when it differs from `owner/repo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// How the package is obtained.
    #[serde(rename = "type", default)]
    pub kind: PackageType,
    /// GitHub owner, for the `github_*` and `go` types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_owner: Option<String>,
    /// GitHub repository, for the `github_*` and `go` types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    /// Download URL template, for `http`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Content path template for `github_content`, module path for `go_install`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Release asset template, for `github_release`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Archive format. Detected from the file name when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ArchiveFormat>,
    /// Commands the package provides. See [`PackageInfo::files`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    /// Upstream checksum file declaration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<ChecksumConfig>,
    /// Per-platform patches; the first match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<Override>,
    /// Substitutions for `{{.OS}}` and `{{.Arch}}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replacements: Replacements,
    /// Append the Windows extension to executables. Defaults to true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_windows_ext: Option<bool>,
    /// Windows executable extension. Defaults to `.exe`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_ext: Option<String>,
    /// Platforms the package is published for, e.g. `darwin`, `linux/amd64`.
    /// Empty means every default platform.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_envs: Vec<String>,
}

impl PackageInfo {
    /// Name used for registry lookups: explicit `name`, else `owner/repo`, else `path`.
    pub fn registry_name(&self) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        match (&self.repo_owner, &self.repo_name) {
            (Some(owner), Some(repo)) => Some(format!("{owner}/{repo}")),
            _ => self.path.clone(),
        }
    }

    /// Declared files, or one file named after the last segment of the package name.
    pub fn files(&self) -> Vec<File> {
        if !self.files.is_empty() {
            return self.files.clone();
        }
        let name = self
            .repo_name
            .clone()
            .or_else(|| self.registry_name())
            .unwrap_or_default();
        let cmd = name.rsplit('/').next().unwrap_or_default();
        if cmd.is_empty() {
            Vec::new()
        } else {
            vec![File::new(cmd)]
        }
    }

    /// Extension appended to Windows executables, `.exe` by default.
    pub fn windows_ext(&self) -> &str {
        self.windows_ext.as_deref().unwrap_or(".exe")
    }

    /// Whether Windows executables get [`PackageInfo::windows_ext`] appended.
    pub fn complete_windows_ext(&self) -> bool {
        self.complete_windows_ext.unwrap_or(true)
    }

    /// The checksum block, if present and not disabled.
    pub fn active_checksum(&self) -> Option<&ChecksumConfig> {
        self.checksum.as_ref().filter(|c| c.is_enabled())
    }
}

/// Errors rendering package metadata for a runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    /// A template did not render.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The metadata is incomplete for its type.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The type has no upstream artifact to verify.
    #[error("{0} packages are built from source and have no checksum")]
    NoChecksum(PackageType),

    /// The checksum block lacks the named field.
    #[error("Checksum file for {0} packages needs '{1}'")]
    ChecksumSource(PackageType, &'static str),
}

/// Where the upstream checksum file for an artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumLocation {
    /// A release asset.
    GithubRelease {
        /// Repository owner.
        owner: String,
        /// Repository name.
        repo: String,
        /// Release tag.
        version: String,
        /// Rendered asset name.
        asset: String,
    },
    /// A plain URL.
    Http {
        /// Rendered URL.
        url: String,
    },
}

/// An upstream checksum file, keyed the same way as package artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumFile {
    /// Identity used to fetch each checksum file at most once per run.
    pub id: String,
    /// Where to download it from.
    pub location: ChecksumLocation,
}

/// A requested package joined with its registry metadata.
///
/// `info` is the base metadata until [`Package::resolve`] is called, after
/// which it is the effective metadata for that runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// What the config asked for.
    pub descriptor: PackageDescriptor,
    /// Registry metadata.
    pub info: PackageInfo,
}

impl Package {
    /// Join a descriptor with its metadata.
    pub fn new(descriptor: PackageDescriptor, info: PackageInfo) -> Self {
        Self { descriptor, info }
    }

    /// Name from the descriptor.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Pinned version.
    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    /// Registry name.
    pub fn registry(&self) -> &str {
        &self.descriptor.registry
    }

    /// A copy with the platform overrides for `rt` applied.
    pub fn resolve(&self, rt: Runtime) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            info: self.info.resolve(rt),
        }
    }

    /// # Errors
    ///
    /// See [`PackageSource::from_info`].
    pub fn source(&self) -> Result<PackageSource, ValidationError> {
        PackageSource::from_info(&self.info)
    }

    fn replaced(&self, key: &str) -> String {
        self.info
            .replacements
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    fn template_context(&self, rt: Runtime) -> TemplateContext {
        TemplateContext {
            version: self.version().to_string(),
            os: self.replaced(rt.os.as_str()),
            arch: self.replaced(rt.arch.as_str()),
            format: self
                .info
                .format
                .map(|f| f.as_str().to_string())
                .unwrap_or_default(),
            asset: None,
        }
    }

    fn render(&self, tpl: &str, rt: Runtime) -> Result<String, TemplateError> {
        template::render(tpl, &self.template_context(rt))
    }

    fn complete_ext(&self, mut name: String, rt: Runtime) -> String {
        let ext = self.info.windows_ext();
        if rt.is_windows() && self.info.complete_windows_ext() && !name.ends_with(ext) {
            name.push_str(ext);
        }
        name
    }

    /// `name` with the Windows extension appended when targeting Windows.
    pub fn executable_name(&self, name: &str, rt: Runtime) -> String {
        self.complete_ext(name.to_string(), rt)
    }

    /// Render the release asset name for `rt`.
    ///
    /// On Windows a bare executable asset gets the Windows extension appended
    /// unless `complete_windows_ext = false`.
    ///
    /// # Errors
    ///
    /// Fails when no asset is declared or its template does not render.
    pub fn render_asset(&self, rt: Runtime) -> Result<String, PackageError> {
        let tpl = self
            .info
            .asset
            .as_deref()
            .ok_or(ValidationError::MissingField {
                kind: self.info.kind,
                field: "asset",
            })?;
        let asset = self.render(tpl, rt)?;
        let format = self
            .info
            .format
            .unwrap_or_else(|| ArchiveFormat::detect(&asset));
        let raw = format == ArchiveFormat::Raw;
        Ok(if raw { self.complete_ext(asset, rt) } else { asset })
    }

    /// The rendered identity of the artifact: asset name, content path or URL.
    /// Empty for types that are addressed by version alone.
    ///
    /// # Errors
    ///
    /// Fails on missing coordinates or unrenderable templates.
    pub fn artifact(&self, rt: Runtime) -> Result<String, PackageError> {
        match self.source()? {
            PackageSource::GithubRelease { .. } => self.render_asset(rt),
            PackageSource::GithubContent { path, .. } => Ok(self.render(&path, rt)?),
            PackageSource::Http { url } => Ok(self.render(&url, rt)?),
            PackageSource::GoInstall { path } => Ok(path),
            PackageSource::GithubArchive { .. } | PackageSource::Go { .. } => Ok(String::new()),
        }
    }

    /// File name the downloaded artifact is stored under.
    ///
    /// # Errors
    ///
    /// See [`Package::artifact`].
    pub fn download_file_name(&self, rt: Runtime) -> Result<String, PackageError> {
        let artifact = self.artifact(rt)?;
        let base = artifact.rsplit('/').next().unwrap_or_default();
        if base.is_empty() {
            Ok(format!("{}.tar.gz", self.version()))
        } else {
            Ok(base.to_string())
        }
    }

    /// Effective archive format for `rt`.
    ///
    /// # Errors
    ///
    /// See [`Package::artifact`].
    pub fn format(&self, rt: Runtime) -> Result<ArchiveFormat, PackageError> {
        if let Some(format) = self.info.format {
            return Ok(format);
        }
        Ok(match self.info.kind {
            PackageType::GithubArchive | PackageType::Go => ArchiveFormat::TarGz,
            PackageType::GithubContent | PackageType::GoInstall => ArchiveFormat::Raw,
            PackageType::GithubRelease | PackageType::Http => {
                ArchiveFormat::detect(&self.download_file_name(rt)?)
            }
        })
    }

    /// Checksum ID of this package's artifact on `rt`.
    ///
    /// # Errors
    ///
    /// [`PackageError::NoChecksum`] for Go packages, or rendering errors.
    pub fn checksum_id(&self, rt: Runtime) -> Result<String, PackageError> {
        let source = self.source()?;
        let artifact = self.artifact(rt)?;
        source
            .checksum_id(self.version(), &artifact)
            .ok_or(PackageError::NoChecksum(source.kind()))
    }

    /// Checksum ID for an arbitrary asset name found in a multi-asset
    /// checksum file. Only release assets are addressable this way.
    ///
    /// # Errors
    ///
    /// See [`PackageSource::from_info`].
    pub fn checksum_id_for_asset(&self, asset: &str) -> Result<Option<String>, PackageError> {
        Ok(match self.source()? {
            source @ PackageSource::GithubRelease { .. } => {
                source.checksum_id(self.version(), asset)
            }
            _ => None,
        })
    }

    /// Where the upstream checksum file lives, if the package declares one.
    ///
    /// # Errors
    ///
    /// Fails when the checksum block lacks the coordinates its type needs.
    pub fn checksum_file(&self, rt: Runtime) -> Result<Option<ChecksumFile>, PackageError> {
        let Some(cfg) = self.info.active_checksum() else {
            return Ok(None);
        };
        let source = self.source()?;

        let kind = match cfg.kind {
            Some(kind) => kind,
            None if matches!(source, PackageSource::GithubRelease { .. })
                && cfg.asset.is_some() =>
            {
                ChecksumSourceType::GithubRelease
            }
            None if cfg.url.is_some() => ChecksumSourceType::Http,
            None => return Ok(None),
        };

        let mut ctx = self.template_context(rt);
        ctx.asset = Some(self.artifact(rt)?);

        match kind {
            ChecksumSourceType::GithubRelease => {
                let (owner, repo) = match (&self.info.repo_owner, &self.info.repo_name) {
                    (Some(o), Some(r)) => (o.clone(), r.clone()),
                    _ => return Err(PackageError::ChecksumSource(source.kind(), "repo_owner")),
                };
                let tpl = cfg
                    .asset
                    .as_deref()
                    .ok_or(PackageError::ChecksumSource(source.kind(), "checksum.asset"))?;
                let asset = template::render(tpl, &ctx)?;
                Ok(Some(ChecksumFile {
                    id: format!(
                        "github_release/github.com/{owner}/{repo}/{}/{asset}",
                        self.version()
                    ),
                    location: ChecksumLocation::GithubRelease {
                        owner,
                        repo,
                        version: self.version().to_string(),
                        asset,
                    },
                }))
            }
            ChecksumSourceType::Http => {
                let tpl = cfg
                    .url
                    .as_deref()
                    .ok_or(PackageError::ChecksumSource(source.kind(), "checksum.url"))?;
                let url = template::render(tpl, &ctx)?;
                Ok(Some(ChecksumFile {
                    id: format!("http/{url}"),
                    location: ChecksumLocation::Http { url },
                }))
            }
        }
    }

    /// Directory holding the installed artifact on `rt`.
    ///
    /// # Errors
    ///
    /// See [`Package::artifact`].
    pub fn install_dir(&self, root: &Path, rt: Runtime) -> Result<PathBuf, PackageError> {
        let source = self.source()?;
        let artifact = self.artifact(rt)?;
        Ok(source.install_dir(root, self.version(), &artifact))
    }

    /// Path of `file`'s executable relative to the install directory.
    ///
    /// Raw artifacts are stored under their download name, so that is the
    /// default; archives default to the command name.
    ///
    /// # Errors
    ///
    /// Fails when `src` does not render.
    pub fn file_src(&self, file: &File, rt: Runtime) -> Result<String, PackageError> {
        let src = if let Some(tpl) = &file.src {
            template::render(tpl, &self.file_context(rt)?)?
        } else if self.info.kind != PackageType::GoInstall
            && self.format(rt)? == ArchiveFormat::Raw
        {
            self.download_file_name(rt)?
        } else {
            file.name.clone()
        };
        Ok(self.complete_ext(src, rt))
    }

    fn file_context(&self, rt: Runtime) -> Result<TemplateContext, PackageError> {
        let mut ctx = self.template_context(rt);
        ctx.asset = Some(self.download_file_name(rt)?);
        Ok(ctx)
    }

    /// Build directory of `file` relative to a `go` package's source tree,
    /// rendered. Empty when the file declares none.
    ///
    /// # Errors
    ///
    /// Fails when the template does not render.
    pub fn file_dir(&self, file: &File, rt: Runtime) -> Result<String, PackageError> {
        match &file.dir {
            Some(tpl) => Ok(template::render(tpl, &self.file_context(rt)?)?),
            None => Ok(String::new()),
        }
    }

    /// Package path handed to `go build` for `file`, rendered. Defaults to `.`.
    ///
    /// # Errors
    ///
    /// Fails when the template does not render.
    pub fn go_build_src(&self, file: &File, rt: Runtime) -> Result<String, PackageError> {
        match &file.src {
            Some(tpl) => Ok(template::render(tpl, &self.file_context(rt)?)?),
            None => Ok(".".to_string()),
        }
    }
}
