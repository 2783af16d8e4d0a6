//! In-memory checksum records backed by a JSON manifest on disk.
//!
//! The manifest is read once per config file, mutated concurrently by
//! install tasks, and written back once at the end of the run.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use rig_schema::ChecksumRecord;
use thiserror::Error;

/// File name of the checksum manifest, placed next to the config file.
pub const CHECKSUM_FILE_NAME: &str = "rig-checksums.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read checksum manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed checksum manifest {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write checksum manifest {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize checksum manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The manifest path for a config file.
pub fn checksum_file_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(CHECKSUM_FILE_NAME)
}

/// Concurrency-safe map of checksum ID to record.
#[derive(Debug, Default)]
pub struct ChecksumStore {
    records: RwLock<HashMap<String, ChecksumRecord>>,
    dirty: AtomicBool,
}

impl ChecksumStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<ChecksumRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Insert or overwrite the record for `id`. Setting an identical record
    /// does not mark the store as modified.
    pub fn set(&self, id: impl Into<String>, mut record: ChecksumRecord) {
        let id = id.into();
        record.id.clone_from(&id);
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        if records.get(&id) != Some(&record) {
            records.insert(id, record);
            self.dirty.store(true, Ordering::Release);
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether anything changed since the last read or write.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Merge records from `path` into the store. A missing file is empty.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub async fn read_file(&self, path: &Path) -> Result<(), StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(());
        }

        let parsed: BTreeMap<String, ChecksumRecord> =
            serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        for (id, mut record) in parsed {
            record.id.clone_from(&id);
            records.insert(id, record);
        }
        Ok(())
    }

    /// Serialized manifest, sorted by ID, or `None` when nothing changed.
    fn snapshot(&self) -> Result<Option<Vec<u8>>, StoreError> {
        if !self.is_dirty() {
            return Ok(None);
        }
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let sorted: BTreeMap<&String, &ChecksumRecord> = records.iter().collect();
        let mut json = serde_json::to_vec_pretty(&sorted)?;
        json.push(b'\n');
        Ok(Some(json))
    }

    /// Write the manifest to `path` if anything changed.
    ///
    /// The file is first written to a temporary location and then renamed so
    /// a crash never leaves a truncated manifest behind.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, file writing, or the rename fails.
    pub async fn update_file(&self, path: &Path) -> Result<(), StoreError> {
        let Some(content) = self.snapshot()? else {
            return Ok(());
        };
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await.map_err(write_err)?;
        tokio::fs::rename(&temp_path, path).await.map_err(write_err)?;
        self.dirty.store(false, Ordering::Release);
        tracing::debug!(path = %path.display(), "checksum manifest updated");
        Ok(())
    }

    fn update_file_blocking(&self, path: &Path) -> Result<(), StoreError> {
        let Some(content) = self.snapshot()? else {
            return Ok(());
        };
        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content).map_err(write_err)?;
        std::fs::rename(&temp_path, path).map_err(write_err)?;
        self.dirty.store(false, Ordering::Release);
        Ok(())
    }

    /// Tie the manifest write to a scope. See [`FlushGuard`].
    pub fn flush_guard(self: &Arc<Self>, path: impl Into<PathBuf>) -> FlushGuard {
        FlushGuard {
            store: Arc::clone(self),
            path: path.into(),
            finished: false,
        }
    }
}

/// Writes the store back to disk when the scope ends.
///
/// Call [`FlushGuard::finish`] to observe the write error. If the guard is
/// dropped instead (early return, `?`, panic unwind) the write still happens
/// and a failure is logged.
#[derive(Debug)]
pub struct FlushGuard {
    store: Arc<ChecksumStore>,
    path: PathBuf,
    finished: bool,
}

impl FlushGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    ///
    /// See [`ChecksumStore::update_file`].
    pub async fn finish(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.store.update_file(&self.path).await
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.store.update_file_blocking(&self.path) {
            tracing::error!(error = %e, "failed to update the checksum manifest");
        }
    }
}
