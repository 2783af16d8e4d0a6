//! rig-core - the installation engine behind `rig`
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Installs pinned versions of CLI tools from registry metadata, verifying
//! every download against a checksum manifest kept next to the config file.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── bin/        # One symlink per command, all pointing at rig-proxy
//! ├── bat/        # Windows launchers
//! └── pkgs/       # Extracted artifacts by type/source/version/asset
//! ```
//!
//! - [`installer`]: the per-package pipeline and the bounded parallel engine
//! - [`backfill`]: `update-checksum`, filling the manifest for every platform
//! - [`checksum`]: the manifest store, upstream file parsing and hashing

pub mod backfill;
pub mod checksum;
pub mod config;
pub mod exec;
pub mod installer;
pub mod io;
pub mod link;
pub mod paths;
pub mod policy;
pub mod registry;
pub mod reporter;

pub use backfill::{BackfillError, BackfillOptions, ChecksumBackfillController};
pub use checksum::{ChecksumFileParser, ChecksumStore};
pub use config::{Config, ConfigError, ConfigReader, TomlConfigReader};
pub use installer::{InstallError, InstallOptions, Installer};
pub use paths::*;
pub use reporter::{NullReporter, Reporter, TracingReporter};
