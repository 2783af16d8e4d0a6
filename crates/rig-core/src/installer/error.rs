//! Domain-specific errors for package installation

use std::path::PathBuf;

use rig_schema::{PackageError, RuntimeError, ValidationError};
use thiserror::Error;

use crate::checksum::{FetchError, StoreError};
use crate::config::ConfigError;
use crate::exec::ExecError;
use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;
use crate::link::LinkError;
use crate::policy::PolicyError;
use crate::registry::RegistryError;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("go_install packages can't be installed with version 'latest'; pin a version")]
    GoInstallLatestForbidden,

    #[error("Checksum is required but not found: {id}")]
    ChecksumRequired { id: String },

    #[error("Checksum mismatch for {id}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Checksum(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("Executable not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Executable path is a directory: {0}")]
    IsDirectory(PathBuf),

    #[error("Failed to make {path} executable: {source}")]
    Chmod {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cancelled")]
    Cancelled,

    #[error("{context}: {message}")]
    Context {
        context: &'static str,
        message: String,
    },

    #[error("Failed to install some packages")]
    Failed,
}

impl InstallError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }

    /// Only a checksum mismatch is worth downloading again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChecksumMismatch { .. })
    }
}
