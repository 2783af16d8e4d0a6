//! # rig-schema
//!
//! Data model shared by the rig crates: target runtimes, package descriptors
//! and registry metadata, platform overrides, checksum records and the
//! template rendering that ties them together. Nothing here touches the
//! filesystem or the network.

/// Checksum declarations and persisted records.
pub mod checksum;
/// Per-platform override blocks.
pub mod overrides;
/// Package descriptors, registry metadata and their rendering.
pub mod package;
/// Target OS/architecture pairs.
pub mod runtime;
/// Validated package sources.
pub mod source;
/// `{{ .Var }}` template rendering.
pub mod template;

pub use checksum::{
    Algorithm, ChecksumConfig, ChecksumFileFormat, ChecksumPattern, ChecksumRecord,
    ChecksumSourceType,
};
pub use overrides::Override;
pub use package::{
    ArchiveFormat, ChecksumFile, ChecksumLocation, DEFAULT_REGISTRY, File, Package,
    PackageDescriptor, PackageError, PackageInfo, PackageType, Replacements,
};
pub use runtime::{Arch, Os, Runtime, RuntimeError, runtimes_from_envs};
pub use source::{PackageSource, ValidationError};
pub use template::TemplateError;
