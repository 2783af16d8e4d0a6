use std::path::{Path, PathBuf};

/// Name of the shared dispatch executable every command links to.
pub const PROXY_NAME: &str = "rig-proxy";

/// Default number of packages installed at once.
pub const DEFAULT_MAX_PARALLELISM: usize = 5;

/// Returns the root directory, or None if no data directory can be resolved.
pub fn try_root_dir() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("RIG_ROOT_DIR") {
        if !val.is_empty() {
            return Some(PathBuf::from(val));
        }
    }
    dirs::data_dir().map(|d| d.join("rig"))
}

/// Concurrency bound from `RIG_MAX_PARALLELISM`, falling back to the default
/// when unset, unparsable or zero.
pub fn max_parallelism() -> usize {
    std::env::var("RIG_MAX_PARALLELISM")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_PARALLELISM)
}

/// Global config files from `RIG_GLOBAL_CONFIG` (a path list), in order.
pub fn global_config_files() -> Vec<PathBuf> {
    std::env::var_os("RIG_GLOBAL_CONFIG")
        .map(|v| std::env::split_paths(&v).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default()
}

/// Link directory: <root>/bin
pub fn bin_dir(root: &Path) -> PathBuf {
    root.join("bin")
}

/// Windows batch launchers: <root>/bat
pub fn bat_dir(root: &Path) -> PathBuf {
    root.join("bat")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let root = Path::new("/r");
        assert_eq!(bin_dir(root), PathBuf::from("/r/bin"));
        assert_eq!(bat_dir(root), PathBuf::from("/r/bat"));
    }
}
