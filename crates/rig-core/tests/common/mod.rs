//! Fakes shared by the engine tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use rig_core::exec::{ExecError, Executor};
use rig_core::io::{ByteStream, DownloadError, PackageDownloader};
use rig_schema::{Package, PackageDescriptor, PackageInfo, Runtime};

pub const BODY: &[u8] = b"#!/bin/sh\necho tool\n";

/// Serves [`BODY`] (or queued bodies first) and records how many requests
/// were in flight at once.
#[derive(Default)]
pub struct FakeDownloader {
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    delay: Duration,
    queued: Mutex<VecDeque<Vec<u8>>>,
    failing: Vec<String>,
}

impl FakeDownloader {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn queue(self, body: &[u8]) -> Self {
        self.queued.lock().unwrap().push_back(body.to_vec());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageDownloader for FakeDownloader {
    async fn get_stream(&self, pkg: &Package, _: Runtime) -> Result<ByteStream, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|n| n == pkg.name()) {
            return Err(DownloadError::Status {
                url: format!("https://example.com/{}", pkg.name()),
                status: 404,
            });
        }
        let body = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| BODY.to_vec());
        Ok(Box::pin(stream::iter(vec![Ok(Bytes::from(body))])))
    }
}

/// Counts Go invocations and records `go build` arguments. Builds write a
/// stub executable.
#[derive(Default)]
pub struct FakeExecutor {
    pub calls: AtomicUsize,
    pub builds: Mutex<Vec<(PathBuf, String, PathBuf)>>,
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn go_build(&self, build_dir: &Path, src: &str, exe: &Path) -> Result<(), ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.builds
            .lock()
            .unwrap()
            .push((build_dir.to_path_buf(), src.to_string(), exe.to_path_buf()));
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(exe, BODY).unwrap();
        Ok(())
    }

    async fn go_install(&self, _: &str, _: &str, _: &Path) -> Result<(), ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Registry entry for a raw executable served over HTTP.
pub fn http_info(name: &str) -> String {
    r#"
    name = "NAME"
    type = "http"
    url = "https://example.com/NAME/{{.Version}}/NAME_{{.OS}}_{{.Arch}}"
    format = "raw"
    files = [{ name = "NAME" }]
    "#
    .replace("NAME", name)
}

pub fn http_pkg(name: &str) -> Package {
    let info: PackageInfo = toml::from_str(&http_info(name)).unwrap();
    Package::new(PackageDescriptor::new(name, "v1"), info)
}

pub fn tagged(mut pkg: Package, tags: &[&str]) -> Package {
    pkg.descriptor.tags = tags.iter().map(ToString::to_string).collect();
    pkg
}

/// `<root>/pkgs/http/...` directory of an [`http_pkg`] on linux/amd64.
pub fn installed_exe(root: &Path, name: &str) -> PathBuf {
    let asset = format!("{name}_linux_amd64");
    root.join("pkgs/http/example.com")
        .join(name)
        .join("v1")
        .join(&asset)
        .join(&asset)
}
