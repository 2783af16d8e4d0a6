//! Artifact and checksum-file transport.
//!
//! The installer only sees the [`PackageDownloader`] and
//! [`ChecksumDownloader`] traits; [`HttpDownloader`] implements both over
//! reqwest against GitHub and plain HTTP.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use rig_schema::{
    Algorithm, ChecksumFile, ChecksumLocation, Package, PackageError, PackageSource, PackageType,
    Runtime,
};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::checksum::Hasher;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GET {url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("{0} packages are not downloaded")]
    Unsupported(PackageType),

    #[error("Download cancelled")]
    Cancelled,
}

/// A body being downloaded, chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// Fetches package artifacts.
#[async_trait]
pub trait PackageDownloader: Send + Sync {
    /// Open the artifact of an override-resolved package for `rt`.
    async fn get_stream(&self, pkg: &Package, rt: Runtime) -> Result<ByteStream, DownloadError>;
}

/// Fetches upstream checksum files.
#[async_trait]
pub trait ChecksumDownloader: Send + Sync {
    async fn download_checksum_file(&self, file: &ChecksumFile) -> Result<String, DownloadError>;
}

/// User Agent string for outgoing requests
pub const USER_AGENT: &str = concat!("rig/", env!("CARGO_PKG_VERSION"));

const GITHUB_BASE: &str = "https://github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";

/// reqwest-backed downloader for every package type except `go_install`.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    github_base: String,
    raw_base: String,
    token: Option<String>,
}

impl HttpDownloader {
    /// Uses `GITHUB_TOKEN` from the environment when set.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            github_base: GITHUB_BASE.to_string(),
            raw_base: RAW_BASE.to_string(),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }

    /// Point GitHub traffic somewhere else (mirrors, tests).
    pub fn with_bases(mut self, github: impl Into<String>, raw: impl Into<String>) -> Self {
        self.github_base = github.into();
        self.raw_base = raw.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn release_url(&self, owner: &str, repo: &str, version: &str, asset: &str) -> String {
        format!(
            "{}/{owner}/{repo}/releases/download/{version}/{asset}",
            self.github_base
        )
    }

    /// Resolve the download URL of a package artifact.
    ///
    /// # Errors
    ///
    /// Fails for `go_install` packages and on rendering errors.
    pub fn artifact_url(&self, pkg: &Package, rt: Runtime) -> Result<String, DownloadError> {
        let version = pkg.version();
        match pkg.source().map_err(PackageError::from)? {
            PackageSource::GithubRelease { owner, repo } => {
                let asset = pkg.render_asset(rt)?;
                Ok(self.release_url(&owner, &repo, version, &asset))
            }
            PackageSource::GithubContent { owner, repo, .. } => {
                let path = pkg.artifact(rt)?;
                Ok(format!("{}/{owner}/{repo}/{version}/{path}", self.raw_base))
            }
            PackageSource::GithubArchive { owner, repo } | PackageSource::Go { owner, repo } => {
                Ok(format!(
                    "{}/{owner}/{repo}/archive/refs/tags/{version}.tar.gz",
                    self.github_base
                ))
            }
            PackageSource::Http { .. } => Ok(pkg.artifact(rt)?),
            PackageSource::GoInstall { .. } => {
                Err(DownloadError::Unsupported(PackageType::GoInstall))
            }
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let mut req = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        if let Some(token) = &self.token {
            if url.starts_with(&self.github_base) || url.starts_with(&self.raw_base) {
                req = req.bearer_auth(token);
            }
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl PackageDownloader for HttpDownloader {
    async fn get_stream(&self, pkg: &Package, rt: Runtime) -> Result<ByteStream, DownloadError> {
        let url = self.artifact_url(pkg, rt)?;
        tracing::debug!(url = %url, "downloading");
        let resp = self.get(&url).await?;
        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(DownloadError::from))
            .boxed())
    }
}

#[async_trait]
impl ChecksumDownloader for HttpDownloader {
    async fn download_checksum_file(&self, file: &ChecksumFile) -> Result<String, DownloadError> {
        let url = match &file.location {
            ChecksumLocation::GithubRelease {
                owner,
                repo,
                version,
                asset,
            } => self.release_url(owner, repo, version, asset),
            ChecksumLocation::Http { url } => url.clone(),
        };
        tracing::debug!(url = %url, checksum_id = %file.id, "downloading checksum file");
        Ok(self.get(&url).await?.text().await?)
    }
}

/// What [`write_stream`] saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub digest: String,
    pub size: u64,
}

/// Drain `stream` into `dest`, hashing as it goes.
///
/// Each chunk read is raced against `cancel`. `progress` receives the running
/// byte count.
///
/// # Errors
///
/// [`DownloadError::Cancelled`] if the token fires, otherwise stream or I/O errors.
pub async fn write_stream(
    mut stream: ByteStream,
    dest: &Path,
    algorithm: Algorithm,
    cancel: &CancellationToken,
    mut progress: impl FnMut(u64) + Send,
) -> Result<Downloaded, DownloadError> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut hasher = Hasher::new(algorithm);
    let mut size: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
        progress(size);
    }

    file.flush().await?;
    Ok(Downloaded {
        digest: hasher.finalize_hex(),
        size,
    })
}

/// Hash `stream` without keeping the body.
///
/// # Errors
///
/// [`DownloadError::Cancelled`] if the token fires, otherwise stream errors.
pub async fn hash_stream(
    mut stream: ByteStream,
    algorithm: Algorithm,
    cancel: &CancellationToken,
) -> Result<Downloaded, DownloadError> {
    let mut hasher = Hasher::new(algorithm);
    let mut size: u64 = 0;
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
    }
    Ok(Downloaded {
        digest: hasher.finalize_hex(),
        size,
    })
}
