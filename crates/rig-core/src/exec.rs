//! Running the Go toolchain for packages built from source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("`go` was not found on PATH")]
    GoNotFound,

    #[error("Failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {code:?}")]
    Failed { command: String, code: Option<i32> },
}

/// Builds or installs Go programs.
#[async_trait]
pub trait Executor: Send + Sync {
    /// `go build -o <exe_path> <src>` inside `build_dir`.
    async fn go_build(
        &self,
        build_dir: &Path,
        src: &str,
        exe_path: &Path,
    ) -> Result<(), ExecError>;

    /// `go install <path>@<version>` with `GOBIN=<gobin>`.
    async fn go_install(&self, path: &str, version: &str, gobin: &Path) -> Result<(), ExecError>;
}

/// [`Executor`] that shells out to the `go` binary on PATH.
#[derive(Debug, Clone, Default)]
pub struct GoExecutor {
    go: Option<PathBuf>,
}

impl GoExecutor {
    pub fn new() -> Self {
        Self {
            go: which::which("go").ok(),
        }
    }

    fn go(&self) -> Result<&Path, ExecError> {
        self.go.as_deref().ok_or(ExecError::GoNotFound)
    }

    async fn run(mut cmd: Command, cmd_line: String) -> Result<(), ExecError> {
        tracing::info!(command = %cmd_line, "running");
        let status = cmd.status().await.map_err(|source| ExecError::Spawn {
            command: cmd_line.clone(),
            source,
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(ExecError::Failed {
                command: cmd_line,
                code: status.code(),
            })
        }
    }
}

#[async_trait]
impl Executor for GoExecutor {
    async fn go_build(
        &self,
        build_dir: &Path,
        src: &str,
        exe_path: &Path,
    ) -> Result<(), ExecError> {
        let mut cmd = Command::new(self.go()?);
        cmd.arg("build")
            .arg("-o")
            .arg(exe_path)
            .arg(src)
            .current_dir(build_dir);
        Self::run(cmd, format!("go build -o {} {src}", exe_path.display())).await
    }

    async fn go_install(&self, path: &str, version: &str, gobin: &Path) -> Result<(), ExecError> {
        let target = format!("{path}@{version}");
        let mut cmd = Command::new(self.go()?);
        cmd.arg("install").arg(&target).env("GOBIN", gobin);
        Self::run(cmd, format!("go install {target}")).await
    }
}
