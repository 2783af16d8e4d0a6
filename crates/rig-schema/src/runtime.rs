//! Target platform description.
//!
//! Registries describe assets using Go-style platform names (`darwin`,
//! `amd64`, ...), so that is the vocabulary used here regardless of the
//! host toolchain's own naming.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operating system of a runtime environment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// macOS.
    Darwin,
    /// Linux.
    Linux,
    /// Microsoft Windows.
    Windows,
    /// FreeBSD.
    Freebsd,
}

impl Os {
    /// The host operating system.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Self::Darwin,
            "windows" => Self::Windows,
            "freebsd" => Self::Freebsd,
            _ => Self::Linux,
        }
    }

    /// Go-style name (`darwin`, `linux`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Darwin => "darwin",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Freebsd => "freebsd",
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "darwin" | "macos" => Ok(Self::Darwin),
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            "freebsd" => Ok(Self::Freebsd),
            _ => Err(format!("Unknown operating system: {s}")),
        }
    }
}

/// CPU architecture of a runtime environment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Arch {
    /// `x86_64`.
    #[serde(rename = "amd64")]
    Amd64,
    /// 64-bit ARM.
    #[serde(rename = "arm64")]
    Arm64,
    /// 32-bit x86.
    #[serde(rename = "386")]
    I386,
    /// 32-bit ARM.
    #[serde(rename = "arm")]
    Arm,
}

impl Arch {
    /// The host architecture.
    pub fn current() -> Self {
        match std::env::consts::ARCH {
            "aarch64" => Self::Arm64,
            "x86" => Self::I386,
            "arm" => Self::Arm,
            _ => Self::Amd64,
        }
    }

    /// Go-style name (`amd64`, `arm64`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
            Self::I386 => "386",
            Self::Arm => "arm",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "amd64" | "x86_64" => Ok(Self::Amd64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "386" | "i386" | "x86" => Ok(Self::I386),
            "arm" => Ok(Self::Arm),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

/// Operating systems every package is checked against by default.
pub const SUPPORTED_OS: [Os; 3] = [Os::Darwin, Os::Linux, Os::Windows];

/// Architectures every package is checked against by default.
pub const SUPPORTED_ARCH: [Arch; 2] = [Arch::Amd64, Arch::Arm64];

/// Errors raised while interpreting platform strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A `supported_envs` entry names neither an OS, an arch, nor an `os/arch` pair.
    #[error("Unknown platform in supported_envs: {0}")]
    UnknownEnv(String),

    /// `RIG_GOOS` / `RIG_GOARCH` holds something we cannot parse.
    #[error("Invalid runtime override: {0}")]
    InvalidOverride(String),
}

/// A concrete (OS, architecture) pair that an install targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Runtime {
    /// Target operating system.
    pub os: Os,
    /// Target architecture.
    pub arch: Arch,
}

impl Runtime {
    /// Build a runtime from its parts.
    pub const fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// The platform this process is running on.
    pub fn host() -> Self {
        Self::new(Os::current(), Arch::current())
    }

    /// The host platform, with `RIG_GOOS` / `RIG_GOARCH` taking precedence.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidOverride`] if either variable is set to
    /// an unknown value.
    pub fn from_env() -> Result<Self, RuntimeError> {
        let host = Self::host();
        let os = match std::env::var("RIG_GOOS") {
            Ok(v) if !v.is_empty() => v.parse().map_err(RuntimeError::InvalidOverride)?,
            _ => host.os,
        };
        let arch = match std::env::var("RIG_GOARCH") {
            Ok(v) if !v.is_empty() => v.parse().map_err(RuntimeError::InvalidOverride)?,
            _ => host.arch,
        };
        Ok(Self::new(os, arch))
    }

    /// Whether this runtime targets Windows.
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// The full default platform matrix.
pub fn default_runtimes() -> Vec<Runtime> {
    SUPPORTED_OS
        .iter()
        .flat_map(|os| SUPPORTED_ARCH.iter().map(|arch| Runtime::new(*os, *arch)))
        .collect()
}

/// Expand a package's `supported_envs` into concrete runtimes.
///
/// Entries may be `all`, an OS (`darwin`), an architecture (`arm64`) or an
/// exact `os/arch` pair. An empty list means every runtime in the default
/// matrix. The result is sorted and free of duplicates.
///
/// # Errors
///
/// Returns [`RuntimeError::UnknownEnv`] for an entry that matches nothing.
pub fn runtimes_from_envs(envs: &[String]) -> Result<Vec<Runtime>, RuntimeError> {
    if envs.is_empty() {
        return Ok(default_runtimes());
    }

    let mut out = BTreeSet::new();
    for env in envs {
        if env == "all" {
            out.extend(default_runtimes());
            continue;
        }
        if let Some((os, arch)) = env.split_once('/') {
            let os: Os = os.parse().map_err(|_| RuntimeError::UnknownEnv(env.clone()))?;
            let arch: Arch = arch
                .parse()
                .map_err(|_| RuntimeError::UnknownEnv(env.clone()))?;
            out.insert(Runtime::new(os, arch));
        } else if let Ok(os) = env.parse::<Os>() {
            out.extend(SUPPORTED_ARCH.iter().map(|arch| Runtime::new(os, *arch)));
        } else if let Ok(arch) = env.parse::<Arch>() {
            out.extend(SUPPORTED_OS.iter().map(|os| Runtime::new(*os, arch)));
        } else {
            return Err(RuntimeError::UnknownEnv(env.clone()));
        }
    }
    Ok(out.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envs(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn empty_envs_expand_to_full_matrix() {
        let rts = runtimes_from_envs(&[]).unwrap();
        assert_eq!(rts.len(), 6);
    }

    #[test]
    fn os_only_expands_over_arches() {
        let rts = runtimes_from_envs(&envs(&["darwin"])).unwrap();
        assert_eq!(
            rts,
            vec![
                Runtime::new(Os::Darwin, Arch::Amd64),
                Runtime::new(Os::Darwin, Arch::Arm64)
            ]
        );
    }

    #[test]
    fn arch_only_and_pairs_are_deduplicated() {
        let rts = runtimes_from_envs(&envs(&["arm64", "linux/arm64"])).unwrap();
        assert_eq!(rts.len(), 3);
        assert!(rts.contains(&Runtime::new(Os::Windows, Arch::Arm64)));
    }

    #[test]
    fn unknown_env_is_an_error() {
        let err = runtimes_from_envs(&envs(&["plan9"])).unwrap_err();
        assert_eq!(err, RuntimeError::UnknownEnv("plan9".to_string()));
    }

    #[test]
    fn parses_rust_style_names() {
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("macos".parse::<Os>().unwrap(), Os::Darwin);
        assert_eq!(Runtime::new(Os::Linux, Arch::I386).to_string(), "linux/386");
    }
}
