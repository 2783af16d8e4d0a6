//! Reporter trait for dependency injection
//!
//! Lets the installer report per-package progress without being coupled to
//! a particular terminal UI.

/// Progress sink for package operations.
pub trait Reporter: Send + Sync {
    /// Updates the progress of a download.
    fn downloading(&self, name: &str, version: &str, current: u64, total: Option<u64>);

    /// A downloaded artifact is being unpacked.
    fn extracting(&self, name: &str, version: &str);

    /// Files are being located, fixed up and linked.
    fn installing(&self, name: &str, version: &str);

    /// Marks a package operation as successfully completed.
    fn done(&self, name: &str, version: &str, detail: &str);

    /// Marks a package operation as failed with a specific reason.
    fn failed(&self, name: &str, version: &str, reason: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn downloading(&self, name: &str, version: &str, current: u64, total: Option<u64>) {
        (**self).downloading(name, version, current, total);
    }
    fn extracting(&self, name: &str, version: &str) {
        (**self).extracting(name, version);
    }
    fn installing(&self, name: &str, version: &str) {
        (**self).installing(name, version);
    }
    fn done(&self, name: &str, version: &str, detail: &str) {
        (**self).done(name, version, detail);
    }
    fn failed(&self, name: &str, version: &str, reason: &str) {
        (**self).failed(name, version, reason);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., backfill, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn downloading(&self, _: &str, _: &str, _: u64, _: Option<u64>) {}
    fn extracting(&self, _: &str, _: &str) {}
    fn installing(&self, _: &str, _: &str) {}
    fn done(&self, _: &str, _: &str, _: &str) {}
    fn failed(&self, _: &str, _: &str, _: &str) {}
    fn warning(&self, _: &str) {}
}

/// Forwards every event to `tracing`. Used by the CLI.
#[derive(Debug, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn downloading(&self, name: &str, version: &str, current: u64, total: Option<u64>) {
        if current == 0 {
            tracing::info!(package_name = name, package_version = version, total, "download");
        }
    }
    fn extracting(&self, name: &str, version: &str) {
        tracing::debug!(package_name = name, package_version = version, "extract");
    }
    fn installing(&self, name: &str, version: &str) {
        tracing::debug!(package_name = name, package_version = version, "install");
    }
    fn done(&self, name: &str, version: &str, detail: &str) {
        tracing::info!(package_name = name, package_version = version, "{detail}");
    }
    fn failed(&self, name: &str, version: &str, reason: &str) {
        tracing::error!(package_name = name, package_version = version, "{reason}");
    }
    fn warning(&self, msg: &str) {
        tracing::warn!("{msg}");
    }
}
