//! Checksum metadata as declared by registries, and the records we persist.

use serde::{Deserialize, Serialize};

/// Digest algorithm of a checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// SHA-256, the default for registry checksum files.
    #[default]
    Sha256,
    /// SHA-512, used for digests we compute ourselves.
    Sha512,
}

impl Algorithm {
    /// Lowercase name as written in manifests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an upstream checksum file is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumFileFormat {
    /// The whole file is a single digest.
    Raw,
    /// Lines are matched with registry-supplied patterns.
    #[default]
    Regexp,
}

/// Regular expressions used to pull digests out of a checksum file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumPattern {
    /// Capture group 1 is the digest.
    pub checksum: String,
    /// Capture group 1 is the asset name. Absent for single-digest files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Where an upstream checksum file is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumSourceType {
    /// An asset of the package's own GitHub release.
    GithubRelease,
    /// An arbitrary URL.
    Http,
}

/// Checksum support declared by a package.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChecksumConfig {
    /// Where the checksum file lives. Defaults to the package's own source.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChecksumSourceType>,

    /// Release asset template, for `github_release` sources. May use `{{.Asset}}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,

    /// URL template, for `http` sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Layout of the checksum file.
    #[serde(default)]
    pub file_format: ChecksumFileFormat,

    /// Algorithm of the digests in the file.
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Extraction patterns for `regexp` files. Without one, lines are read
    /// as `<digest>  <file name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<ChecksumPattern>,

    /// `Some(false)` turns the block off without removing it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl ChecksumConfig {
    /// A declared checksum block is on unless explicitly disabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// An expected digest for one checksum ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumRecord {
    /// The key this record is stored under. Not serialized; the manifest key carries it.
    #[serde(skip)]
    pub id: String,
    /// Lowercase hex digest.
    pub checksum: String,
    /// Algorithm that produced `checksum`.
    pub algorithm: Algorithm,
}

impl ChecksumRecord {
    /// A record for `id`; the digest is lowercased.
    pub fn new(id: impl Into<String>, checksum: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            id: id.into(),
            checksum: checksum.into().to_lowercase(),
            algorithm,
        }
    }

    /// Compare against a computed hex digest, ignoring case.
    pub fn matches(&self, actual: &str) -> bool {
        self.checksum.eq_ignore_ascii_case(actual.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_config_defaults() {
        let cfg: ChecksumConfig = toml::from_str(
            r#"
            type = "github_release"
            asset = "checksums.txt"
            "#,
        )
        .unwrap();
        assert!(cfg.is_enabled());
        assert_eq!(cfg.file_format, ChecksumFileFormat::Regexp);
        assert_eq!(cfg.algorithm, Algorithm::Sha256);
        assert_eq!(cfg.kind, Some(ChecksumSourceType::GithubRelease));
    }

    #[test]
    fn record_comparison_ignores_case() {
        let rec = ChecksumRecord::new("id", "ABCDEF", Algorithm::Sha256);
        assert_eq!(rec.checksum, "abcdef");
        assert!(rec.matches("abcdef\n"));
        assert!(!rec.matches("abcdee"));
    }
}
