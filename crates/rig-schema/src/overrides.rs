//! Platform-conditional patches over registry metadata.

use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumConfig;
use crate::package::{ArchiveFormat, File, PackageInfo, PackageType, Replacements};
use crate::runtime::{Arch, Os, Runtime};

/// A patch applied to [`PackageInfo`] when the runtime matches.
///
/// An unset `goos` / `goarch` matches anything. Only fields that are set
/// replace the base value; `replacements` is merged key by key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Override {
    /// OS this override applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goos: Option<Os>,
    /// Architecture this override applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goarch: Option<Arch>,
    /// Merged into the base replacements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacements: Option<Replacements>,
    /// Replaces the archive format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ArchiveFormat>,
    /// Replaces the asset template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Replaces the command list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<File>>,
    /// Replaces the download URL template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Replaces the Windows extension toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_windows_ext: Option<bool>,
    /// Replaces the Windows executable extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows_ext: Option<String>,
    /// Replaces the whole checksum block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<ChecksumConfig>,
    /// Replaces the package type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PackageType>,
}

impl Override {
    /// Whether this override applies to `rt`.
    pub fn matches(&self, rt: Runtime) -> bool {
        self.goos.is_none_or(|os| os == rt.os) && self.goarch.is_none_or(|arch| arch == rt.arch)
    }
}

impl PackageInfo {
    /// Effective metadata for `rt`: the first matching override in
    /// declaration order is overlaid on a copy of `self`. Later overrides
    /// are ignored even if they also match.
    pub fn resolve(&self, rt: Runtime) -> PackageInfo {
        let mut out = self.clone();
        let Some(ov) = self.overrides.iter().find(|ov| ov.matches(rt)) else {
            return out;
        };

        if let Some(kind) = ov.kind {
            out.kind = kind;
        }
        if let Some(format) = ov.format {
            out.format = Some(format);
        }
        if let Some(asset) = &ov.asset {
            out.asset = Some(asset.clone());
        }
        if let Some(files) = &ov.files {
            out.files.clone_from(files);
        }
        if let Some(url) = &ov.url {
            out.url = Some(url.clone());
        }
        if let Some(complete) = ov.complete_windows_ext {
            out.complete_windows_ext = Some(complete);
        }
        if let Some(ext) = &ov.windows_ext {
            out.windows_ext = Some(ext.clone());
        }
        if let Some(checksum) = &ov.checksum {
            out.checksum = Some(checksum.clone());
        }
        if let Some(replacements) = &ov.replacements {
            out.replacements
                .extend(replacements.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> PackageInfo {
        toml::from_str(
            r#"
            repo_owner = "o"
            repo_name = "r"
            asset = "r_{{.OS}}_{{.Arch}}.tar.gz"
            format = "tar.gz"
            replacements = { amd64 = "x86_64" }

            [[overrides]]
            goos = "windows"
            format = "zip"
            asset = "r_{{.OS}}_{{.Arch}}.zip"

            [[overrides]]
            goos = "windows"
            goarch = "arm64"
            asset = "never-used"

            [[overrides]]
            goarch = "arm64"
            replacements = { darwin = "macos" }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn first_match_wins() {
        let eff = info().resolve(Runtime::new(Os::Windows, Arch::Arm64));
        assert_eq!(eff.format, Some(ArchiveFormat::Zip));
        assert_eq!(eff.asset.as_deref(), Some("r_{{.OS}}_{{.Arch}}.zip"));
    }

    #[test]
    fn no_match_returns_base() {
        let base = info();
        let eff = base.resolve(Runtime::new(Os::Linux, Arch::Amd64));
        assert_eq!(eff, base);
    }

    #[test]
    fn replacements_merge_and_base_is_untouched() {
        let base = info();
        let eff = base.resolve(Runtime::new(Os::Darwin, Arch::Arm64));
        assert_eq!(eff.replacements.get("darwin").map(String::as_str), Some("macos"));
        assert_eq!(eff.replacements.get("amd64").map(String::as_str), Some("x86_64"));
        assert_eq!(eff.format, Some(ArchiveFormat::TarGz));
        assert!(!base.replacements.contains_key("darwin"));
    }

    #[test]
    fn resolution_is_deterministic() {
        let base = info();
        let rt = Runtime::new(Os::Windows, Arch::Amd64);
        assert_eq!(base.resolve(rt), base.resolve(rt));
    }
}
