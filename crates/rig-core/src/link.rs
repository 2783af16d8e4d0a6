//! Exposing installed commands on PATH.
//!
//! Every command resolves to the shared proxy. On unix-like systems that is a
//! symlink `<root>/bin/<cmd> -> rig-proxy`; on Windows it is a pair of small
//! launcher scripts that call `rig exec -- <cmd>`.

use std::io;
use std::path::{Path, PathBuf};

use rig_schema::Runtime;
use thiserror::Error;

use crate::paths::{PROXY_NAME, bat_dir, bin_dir};

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("{0} is a directory")]
    IsDirectory(PathBuf),

    #[error("{0} exists and is not a symlink")]
    NotSymlink(PathBuf),

    #[error("Failed to link {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> LinkError + '_ {
    move |source| LinkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What [`Linker::create_link`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Unchanged,
    Replaced,
}

/// Creates the symlinks (or Windows launchers) that point commands at the
/// proxy.
pub trait Linker: Send + Sync {
    /// Ensure `link` is a symlink to `target`.
    ///
    /// A symlink to a different target is replaced. A regular file or a
    /// directory at `link` is an error.
    fn create_link(&self, link: &Path, target: &Path) -> Result<LinkOutcome, LinkError>;

    /// Write a launcher script to `path` unless something is already there.
    /// Returns whether it was written.
    fn write_launcher(&self, path: &Path, content: &str) -> Result<bool, LinkError>;
}

/// [`Linker`] over the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLinker;

impl Linker for FsLinker {
    fn create_link(&self, link: &Path, target: &Path) -> Result<LinkOutcome, LinkError> {
        let outcome = match std::fs::symlink_metadata(link) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => LinkOutcome::Created,
            Err(e) => return Err(io_err(link)(e)),
            Ok(meta) if meta.file_type().is_symlink() => {
                let current = std::fs::read_link(link).map_err(io_err(link))?;
                if current == target {
                    return Ok(LinkOutcome::Unchanged);
                }
                std::fs::remove_file(link).map_err(io_err(link))?;
                LinkOutcome::Replaced
            }
            Ok(meta) if meta.is_dir() => return Err(LinkError::IsDirectory(link.to_path_buf())),
            Ok(_) => return Err(LinkError::NotSymlink(link.to_path_buf())),
        };

        if let Some(parent) = link.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        symlink(target, link).map_err(io_err(link))?;
        Ok(outcome)
    }

    fn write_launcher(&self, path: &Path, content: &str) -> Result<bool, LinkError> {
        if path.symlink_metadata().is_ok() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        std::fs::write(path, content).map_err(io_err(path))?;
        Ok(true)
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

fn sh_launcher(cmd: &str) -> String {
    format!("#!/usr/bin/env sh\nexec rig exec -- {cmd} \"$@\"\n")
}

fn bat_launcher(cmd: &str) -> String {
    format!("@echo off\r\nrig exec -- {cmd} %*\r\n")
}

/// Make `cmd` callable from `<root>/bin` on `rt`.
///
/// # Errors
///
/// See [`LinkError`].
pub fn expose_command(
    linker: &dyn Linker,
    root: &Path,
    cmd: &str,
    rt: Runtime,
) -> Result<(), LinkError> {
    if rt.is_windows() {
        let sh = bin_dir(root).join(cmd);
        if linker.write_launcher(&sh, &sh_launcher(cmd))? {
            tracing::info!(file_name = cmd, "created launcher");
        }
        let bat = bat_dir(root).join(format!("{cmd}.bat"));
        linker.write_launcher(&bat, &bat_launcher(cmd))?;
        return Ok(());
    }

    let link = bin_dir(root).join(cmd);
    match linker.create_link(&link, Path::new(PROXY_NAME))? {
        LinkOutcome::Created => {
            tracing::info!(link_file = %link.display(), "create a symbolic link");
        }
        LinkOutcome::Replaced => {
            tracing::info!(link_file = %link.display(), "recreate a symbolic link");
        }
        LinkOutcome::Unchanged => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rig_schema::{Arch, Os};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        links: Mutex<Vec<PathBuf>>,
        launchers: Mutex<Vec<(PathBuf, String)>>,
    }

    impl Linker for Recorder {
        fn create_link(&self, link: &Path, _: &Path) -> Result<LinkOutcome, LinkError> {
            self.links.lock().unwrap().push(link.to_path_buf());
            Ok(LinkOutcome::Created)
        }

        fn write_launcher(&self, path: &Path, content: &str) -> Result<bool, LinkError> {
            self.launchers
                .lock()
                .unwrap()
                .push((path.to_path_buf(), content.to_string()));
            Ok(true)
        }
    }

    const WINDOWS: Runtime = Runtime::new(Os::Windows, Arch::Amd64);

    #[test]
    fn windows_gets_launchers_not_links() {
        let root = tempfile::tempdir().unwrap();
        let rec = Recorder::default();
        expose_command(&rec, root.path(), "gh", WINDOWS).unwrap();

        assert!(rec.links.lock().unwrap().is_empty());
        let launchers = rec.launchers.lock().unwrap();
        assert_eq!(launchers.len(), 2);
        assert_eq!(launchers[0].0, root.path().join("bin/gh"));
        assert!(launchers[0].1.contains("rig exec -- gh"));
        assert_eq!(launchers[1].0, root.path().join("bat/gh.bat"));
        assert!(launchers[1].1.contains("rig exec -- gh %*"));
        assert!(!root.path().join("bin").exists());
    }

    #[test]
    fn fs_launchers_are_written_once() {
        let root = tempfile::tempdir().unwrap();
        expose_command(&FsLinker, root.path(), "gh", WINDOWS).unwrap();
        let sh = root.path().join("bin/gh");
        assert!(std::fs::read_to_string(&sh).unwrap().contains("rig exec -- gh"));
        let bat = std::fs::read_to_string(root.path().join("bat/gh.bat")).unwrap();
        assert!(bat.contains("rig exec -- gh %*"));

        std::fs::write(&sh, "custom").unwrap();
        expose_command(&FsLinker, root.path(), "gh", WINDOWS).unwrap();
        assert_eq!(std::fs::read_to_string(&sh).unwrap(), "custom");
    }

    #[test]
    fn unix_gets_a_link() {
        let root = tempfile::tempdir().unwrap();
        let rec = Recorder::default();
        expose_command(&rec, root.path(), "gh", Runtime::new(Os::Linux, Arch::Amd64)).unwrap();
        assert_eq!(*rec.links.lock().unwrap(), vec![root.path().join("bin/gh")]);
        assert!(rec.launchers.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn fs_linker_semantics() {
        let root = tempfile::tempdir().unwrap();
        let link = root.path().join("bin/gh");
        let target = Path::new(PROXY_NAME);

        assert_eq!(FsLinker.create_link(&link, target).unwrap(), LinkOutcome::Created);
        assert_eq!(FsLinker.create_link(&link, target).unwrap(), LinkOutcome::Unchanged);
        assert_eq!(
            FsLinker.create_link(&link, Path::new("other")).unwrap(),
            LinkOutcome::Replaced
        );
        assert_eq!(std::fs::read_link(&link).unwrap(), PathBuf::from("other"));

        let file = root.path().join("bin/plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FsLinker.create_link(&file, target),
            Err(LinkError::NotSymlink(_))
        ));

        let dir = root.path().join("bin/dir");
        std::fs::create_dir_all(&dir).unwrap();
        assert!(matches!(
            FsLinker.create_link(&dir, target),
            Err(LinkError::IsDirectory(_))
        ));
    }
}
