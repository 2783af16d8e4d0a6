//! Archive extraction module
//!
//! Handles tar.gz, tar.zst, tar, zip and bare executables.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use rig_schema::ArchiveFormat;
use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Invalid path in archive: {0}")]
    UnsafePath(PathBuf),
}

/// Unpacks a downloaded artifact. Blocking; callers run it off the async runtime.
pub trait Unarchiver: Send + Sync {
    /// Unpack `src` into `dest`. A raw artifact is copied to `dest/<file_name>`.
    fn unarchive(
        &self,
        src: &Path,
        dest: &Path,
        format: ArchiveFormat,
        file_name: &str,
    ) -> Result<(), ExtractError>;
}

/// Default [`Unarchiver`] built on the tar, flate2, zstd and zip crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveUnarchiver;

impl Unarchiver for ArchiveUnarchiver {
    fn unarchive(
        &self,
        src: &Path,
        dest: &Path,
        format: ArchiveFormat,
        file_name: &str,
    ) -> Result<(), ExtractError> {
        match format {
            ArchiveFormat::TarGz => {
                let reader = BufReader::new(File::open(src)?);
                extract_tar(flate2::read::GzDecoder::new(reader), dest)
            }
            ArchiveFormat::TarZst => {
                let reader = BufReader::new(File::open(src)?);
                extract_tar(ZstdDecoder::new(reader)?, dest)
            }
            ArchiveFormat::Tar => extract_tar(BufReader::new(File::open(src)?), dest),
            ArchiveFormat::Zip => extract_zip(src, dest),
            ArchiveFormat::Raw => copy_raw(src, dest, file_name),
        }
    }
}

fn checked_join(dest_dir: &Path, relative: &Path) -> Result<PathBuf, ExtractError> {
    let safe = relative
        .components()
        .all(|c| matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir));
    if !safe {
        return Err(ExtractError::UnsafePath(relative.to_path_buf()));
    }
    Ok(dest_dir.join(relative))
}

/// Extract a tar stream into `dest_dir`.
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative_path = entry.path()?.into_owned();
        let absolute_path = checked_join(dest_dir, &relative_path)?;

        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&absolute_path)?;
    }

    Ok(())
}

/// Extract a zip archive, keeping unix modes when present.
fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            return Err(ExtractError::UnsafePath(PathBuf::from(file.name())));
        };

        let absolute_path = dest_dir.join(&relative_path);
        if file.is_dir() {
            fs::create_dir_all(&absolute_path)?;
            continue;
        }
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(())
}

/// Bare executables are copied as-is and made executable.
fn copy_raw(src: &Path, dest_dir: &Path, file_name: &str) -> Result<(), ExtractError> {
    fs::create_dir_all(dest_dir)?;
    let dest_path = checked_join(dest_dir, Path::new(file_name))?;
    fs::copy(src, &dest_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dest_path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
