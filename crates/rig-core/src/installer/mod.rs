//! Package installation.
//!
//! [`Installer`] bundles the collaborators one install needs. The
//! per-package pipeline lives in [`pipeline`], locating and fixing up
//! executables in [`locate`], and the bounded fan-out over many packages in
//! [`parallel`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rig_schema::Runtime;
use tokio_util::sync::CancellationToken;

use crate::exec::{Executor, GoExecutor};
use crate::io::download::{ChecksumDownloader, HttpDownloader, PackageDownloader};
use crate::io::extract::{ArchiveUnarchiver, Unarchiver};
use crate::link::{FsLinker, Linker};
use crate::paths::DEFAULT_MAX_PARALLELISM;
use crate::policy::{AllowAll, PolicyChecker};
use crate::reporter::{NullReporter, Reporter};

pub mod error;
pub mod locate;
pub mod parallel;
pub mod pipeline;

pub use error::InstallError;
pub use parallel::matches_tags;
pub use pipeline::MAX_RETRY_DOWNLOAD;

/// Flags of one `rig install` run.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Create links and stop.
    pub only_link: bool,
    /// Skip link creation.
    pub skip_link: bool,
    /// Treat a misconfigured file location as an error instead of a warning.
    pub test: bool,
    /// Also copy every executable into this directory.
    pub copy_dir: Option<PathBuf>,
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    /// Maximum number of packages installed at once.
    pub max_parallelism: usize,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            only_link: false,
            skip_link: false,
            test: false,
            copy_dir: None,
            tags: Vec::new(),
            exclude_tags: Vec::new(),
            max_parallelism: DEFAULT_MAX_PARALLELISM,
        }
    }
}

/// Installs packages for one runtime under one root directory.
///
/// Cheap to clone; every collaborator is shared.
#[derive(Clone)]
pub struct Installer {
    root: PathBuf,
    runtime: Runtime,
    downloader: Arc<dyn PackageDownloader>,
    checksum_downloader: Arc<dyn ChecksumDownloader>,
    unarchiver: Arc<dyn Unarchiver>,
    linker: Arc<dyn Linker>,
    executor: Arc<dyn Executor>,
    policy: Arc<dyn PolicyChecker>,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("root", &self.root)
            .field("runtime", &self.runtime)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// An installer wired to the real network, filesystem and `go`.
    pub fn new(root: impl Into<PathBuf>, runtime: Runtime) -> Self {
        let http = Arc::new(HttpDownloader::new(reqwest::Client::new()));
        Self {
            root: root.into(),
            runtime,
            downloader: http.clone(),
            checksum_downloader: http,
            unarchiver: Arc::new(ArchiveUnarchiver),
            linker: Arc::new(FsLinker),
            executor: Arc::new(GoExecutor::new()),
            policy: Arc::new(AllowAll),
            reporter: Arc::new(NullReporter),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn PackageDownloader>) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_checksum_downloader(mut self, downloader: Arc<dyn ChecksumDownloader>) -> Self {
        self.checksum_downloader = downloader;
        self
    }

    pub fn with_unarchiver(mut self, unarchiver: Arc<dyn Unarchiver>) -> Self {
        self.unarchiver = unarchiver;
        self
    }

    pub fn with_linker(mut self, linker: Arc<dyn Linker>) -> Self {
        self.linker = linker;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn PolicyChecker>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime
    }
}
