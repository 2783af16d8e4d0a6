//! Seeding the store from an upstream checksum file.

use rig_schema::{ChecksumFile, ChecksumRecord, Package, PackageError, Runtime};
use thiserror::Error;

use super::parser::{ChecksumFileParser, ParseError, ParsedChecksums};
use super::store::ChecksumStore;
use crate::io::download::{ChecksumDownloader, DownloadError};

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to download checksum file: {0}")]
    Download(#[from] DownloadError),

    #[error("Failed to parse checksum file: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Package(#[from] PackageError),
}

/// Download `file`, parse it with `pkg`'s checksum metadata and record every
/// digest that can be attributed to an asset of `pkg`.
///
/// Multi-asset files seed records for every platform at once. Returns the
/// number of records written.
///
/// # Errors
///
/// See [`FetchError`].
pub async fn fetch_checksums(
    pkg: &Package,
    rt: Runtime,
    file: &ChecksumFile,
    store: &ChecksumStore,
    downloader: &dyn ChecksumDownloader,
) -> Result<usize, FetchError> {
    let Some(cfg) = pkg.info.active_checksum() else {
        return Ok(0);
    };
    let parser = ChecksumFileParser::from_config(cfg)?;
    let content = downloader.download_checksum_file(file).await?;
    let parsed = parser.parse(&content)?;

    let id = pkg.checksum_id(rt)?;
    let artifact = pkg.download_file_name(rt)?;
    let algorithm = cfg.algorithm;
    let mut written = 0;

    if let ParsedChecksums::Map(map) = &parsed {
        for (asset, digest) in map {
            if let Some(asset_id) = pkg.checksum_id_for_asset(asset)? {
                let record = ChecksumRecord::new(asset_id.clone(), digest.as_str(), algorithm);
                store.set(asset_id, record);
                written += 1;
            }
        }
    }

    if let Some(digest) = parsed.get(&artifact) {
        store.set(id.clone(), ChecksumRecord::new(id.as_str(), digest, algorithm));
        written += 1;
    } else {
        tracing::warn!(
            checksum_id = %id,
            asset_name = %artifact,
            "checksum file has no entry for the asset"
        );
    }

    Ok(written)
}
