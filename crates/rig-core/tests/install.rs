//! Engine-level install scenarios against fake collaborators.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::{BODY, FakeDownloader, FakeExecutor, http_pkg, installed_exe, tagged};
use futures::StreamExt;
use futures::stream;
use rig_core::checksum::{ChecksumStore, checksum_file_path, digest_bytes};
use rig_core::config::ChecksumSettings;
use rig_core::installer::MAX_RETRY_DOWNLOAD;
use rig_core::installer::pipeline::ChecksumPolicy;
use rig_core::io::{ByteStream, DownloadError, PackageDownloader};
use rig_core::{InstallError, InstallOptions, Installer};
use tokio_util::sync::CancellationToken;
use rig_schema::runtime::default_runtimes;
use rig_schema::{
    Algorithm, Arch, ChecksumRecord, Os, Package, PackageDescriptor, PackageInfo, Runtime,
};

const LINUX: Runtime = Runtime::new(Os::Linux, Arch::Amd64);

fn installer(root: &std::path::Path, downloader: &Arc<FakeDownloader>) -> Installer {
    Installer::new(root, LINUX).with_downloader(downloader.clone())
}

fn disabled() -> ChecksumSettings {
    ChecksumSettings::default()
}

#[tokio::test]
async fn at_most_k_packages_are_in_flight() {
    let root = tempfile::tempdir().unwrap();
    let downloader = Arc::new(FakeDownloader::default().with_delay(Duration::from_millis(200)));
    let packages = (1..=6).map(|i| http_pkg(&format!("tool{i}"))).collect();
    let opts = InstallOptions {
        max_parallelism: 2,
        ..InstallOptions::default()
    };

    installer(root.path(), &downloader)
        .install_packages(packages, &disabled(), &root.path().join("unused.json"), &opts)
        .await
        .unwrap();

    assert_eq!(downloader.calls(), 6);
    assert_eq!(downloader.max_in_flight.load(Ordering::SeqCst), 2);
    for i in 1..=6 {
        let name = format!("tool{i}");
        assert!(installed_exe(root.path(), &name).is_file());
        let link = root.path().join("bin").join(&name);
        assert_eq!(std::fs::read_link(link).unwrap(), std::path::Path::new("rig-proxy"));
    }
}

#[tokio::test]
async fn a_failing_package_does_not_stop_its_siblings() {
    let root = tempfile::tempdir().unwrap();
    let downloader = Arc::new(FakeDownloader::default().failing("tool2"));
    let packages = vec![http_pkg("tool1"), http_pkg("tool2"), http_pkg("tool3")];

    let err = installer(root.path(), &downloader)
        .install_packages(
            packages,
            &disabled(),
            &root.path().join("unused.json"),
            &InstallOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Failed));
    assert_eq!(downloader.calls(), 3);
    assert!(installed_exe(root.path(), "tool1").is_file());
    assert!(!installed_exe(root.path(), "tool2").exists());
    assert!(installed_exe(root.path(), "tool3").is_file());
}

#[tokio::test]
async fn go_install_latest_is_rejected_before_any_work() {
    let info: PackageInfo = toml::from_str(
        r#"
        type = "go_install"
        name = "example.com/x/cmd/x"
        path = "example.com/x/cmd/x"
        "#,
    )
    .unwrap();
    let pkg = Package::new(PackageDescriptor::new("example.com/x/cmd/x", "latest"), info);

    for rt in default_runtimes() {
        let root = tempfile::tempdir().unwrap();
        let downloader = Arc::new(FakeDownloader::default());
        let executor = Arc::new(FakeExecutor::default());
        let err = Installer::new(root.path(), rt)
            .with_downloader(downloader.clone())
            .with_executor(executor.clone())
            .install_package(&pkg, None, &InstallOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::GoInstallLatestForbidden), "{rt}");
        assert_eq!(downloader.calls(), 0);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
        assert!(!root.path().join("pkgs").exists());
    }
}

#[tokio::test]
async fn required_checksum_must_be_known_before_download() {
    let root = tempfile::tempdir().unwrap();
    let downloader = Arc::new(FakeDownloader::default());
    let store = ChecksumStore::new();
    let policy = ChecksumPolicy {
        store: &store,
        require: true,
    };

    let err = installer(root.path(), &downloader)
        .install_package(&http_pkg("tool"), Some(policy), &InstallOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::ChecksumRequired { .. }));
    assert_eq!(downloader.calls(), 0);
}

#[tokio::test]
async fn mismatch_is_retried_once() {
    let root = tempfile::tempdir().unwrap();
    let pkg = http_pkg("tool");
    let id = pkg.checksum_id(LINUX).unwrap();
    let store = ChecksumStore::new();
    store.set(
        id.as_str(),
        ChecksumRecord::new(id.as_str(), digest_bytes(BODY, Algorithm::Sha256), Algorithm::Sha256),
    );
    let policy = ChecksumPolicy {
        store: &store,
        require: true,
    };

    let downloader = Arc::new(FakeDownloader::default().queue(b"truncated"));
    installer(root.path(), &downloader)
        .install_package(&pkg, Some(policy), &InstallOptions::default())
        .await
        .unwrap();
    assert_eq!(downloader.calls(), 2);

    let root = tempfile::tempdir().unwrap();
    let downloader = Arc::new(
        FakeDownloader::default()
            .queue(b"bad")
            .queue(b"still bad")
            .queue(b"never asked"),
    );
    let err = installer(root.path(), &downloader)
        .install_package(&pkg, Some(policy), &InstallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::ChecksumMismatch { .. }));
    assert_eq!(downloader.calls(), MAX_RETRY_DOWNLOAD + 1);
    assert!(!installed_exe(root.path(), "tool").exists());
}

#[tokio::test]
async fn first_download_is_recorded_when_checksums_are_optional() {
    let root = tempfile::tempdir().unwrap();
    let config = root.path().join("rig.toml");
    let manifest = checksum_file_path(&config);
    let downloader = Arc::new(FakeDownloader::default());
    let settings = ChecksumSettings {
        enabled: true,
        ..ChecksumSettings::default()
    };

    installer(root.path(), &downloader)
        .install_packages(
            vec![http_pkg("tool")],
            &settings,
            &manifest,
            &InstallOptions::default(),
        )
        .await
        .unwrap();

    let store = ChecksumStore::new();
    store.read_file(&manifest).await.unwrap();
    let id = http_pkg("tool").checksum_id(LINUX).unwrap();
    let record = store.get(&id).unwrap();
    assert_eq!(record.algorithm, Algorithm::Sha512);
    assert_eq!(record.checksum, digest_bytes(BODY, Algorithm::Sha512));
}

#[tokio::test]
async fn misplaced_file_is_only_fatal_in_test_mode() {
    let info: PackageInfo = toml::from_str(&common::http_info("tool").replace(
        r#"files = [{ name = "tool" }]"#,
        r#"files = [{ name = "tool", src = "nope" }]"#,
    ))
    .unwrap();
    let pkg = Package::new(PackageDescriptor::new("tool", "v1"), info);

    let root = tempfile::tempdir().unwrap();
    let downloader = Arc::new(FakeDownloader::default());
    installer(root.path(), &downloader)
        .install_package(&pkg, None, &InstallOptions::default())
        .await
        .unwrap();

    let opts = InstallOptions {
        test: true,
        ..InstallOptions::default()
    };
    let err = installer(root.path(), &downloader)
        .install_package(&pkg, None, &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::FileNotFound(_)));
}

#[tokio::test]
async fn only_link_never_downloads() {
    let root = tempfile::tempdir().unwrap();
    let downloader = Arc::new(FakeDownloader::default());
    let opts = InstallOptions {
        only_link: true,
        ..InstallOptions::default()
    };

    installer(root.path(), &downloader)
        .install_packages(
            vec![http_pkg("tool")],
            &disabled(),
            &root.path().join("unused.json"),
            &opts,
        )
        .await
        .unwrap();

    assert_eq!(downloader.calls(), 0);
    assert!(root.path().join("bin/tool").symlink_metadata().is_ok());
    assert!(!root.path().join("pkgs").exists());
}

#[tokio::test]
async fn tag_filter_runs_before_linking() {
    let root = tempfile::tempdir().unwrap();
    let downloader = Arc::new(FakeDownloader::default());
    let packages = vec![
        tagged(http_pkg("ci-tool"), &["ci"]),
        tagged(http_pkg("dev-tool"), &["dev"]),
        http_pkg("plain"),
    ];
    let opts = InstallOptions {
        tags: vec!["ci".to_string()],
        ..InstallOptions::default()
    };

    installer(root.path(), &downloader)
        .install_packages(packages, &disabled(), &root.path().join("unused.json"), &opts)
        .await
        .unwrap();

    assert_eq!(downloader.calls(), 1);
    assert!(root.path().join("bin/ci-tool").symlink_metadata().is_ok());
    assert!(root.path().join("bin/dev-tool").symlink_metadata().is_err());
    assert!(root.path().join("bin/plain").symlink_metadata().is_err());
}

#[tokio::test]
async fn reinstall_skips_populated_destination() {
    let root = tempfile::tempdir().unwrap();
    let downloader = Arc::new(FakeDownloader::default());
    let inst = installer(root.path(), &downloader);
    let pkg = http_pkg("tool");

    inst.install_package(&pkg, None, &InstallOptions::default())
        .await
        .unwrap();
    inst.install_package(&pkg, None, &InstallOptions::default())
        .await
        .unwrap();
    assert_eq!(downloader.calls(), 1);
}

#[tokio::test]
async fn records_survive_a_failed_run() {
    let root = tempfile::tempdir().unwrap();
    let manifest = checksum_file_path(&root.path().join("rig.toml"));
    let downloader = Arc::new(FakeDownloader::default().failing("broken"));
    let settings = ChecksumSettings {
        enabled: true,
        ..ChecksumSettings::default()
    };

    let err = installer(root.path(), &downloader)
        .install_packages(
            vec![http_pkg("tool"), http_pkg("broken")],
            &settings,
            &manifest,
            &InstallOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Failed));

    let store = ChecksumStore::new();
    store.read_file(&manifest).await.unwrap();
    let id = http_pkg("tool").checksum_id(LINUX).unwrap();
    assert_eq!(
        store.get(&id).unwrap().checksum,
        digest_bytes(BODY, Algorithm::Sha512)
    );
    let broken = http_pkg("broken").checksum_id(LINUX).unwrap();
    assert!(store.get(&broken).is_none());
}

#[tokio::test]
async fn go_build_uses_the_rendered_dir_and_file_src() {
    let info: PackageInfo = toml::from_str(
        r#"
        type = "go"
        repo_owner = "o"
        repo_name = "t"
        files = [{ name = "t", dir = "t-{{trimV .Version}}", src = "./cmd/t" }]
        "#,
    )
    .unwrap();
    let pkg = Package::new(PackageDescriptor::new("o/t", "v1.2.3"), info);

    let root = tempfile::tempdir().unwrap();
    let go_root = root.path().join("pkgs/go/github.com/o/t/v1.2.3");
    std::fs::create_dir_all(go_root.join("src/t-1.2.3")).unwrap();
    let executor = Arc::new(FakeExecutor::default());
    let opts = InstallOptions {
        test: true,
        ..InstallOptions::default()
    };

    Installer::new(root.path(), LINUX)
        .with_executor(executor.clone())
        .install_package(&pkg, None, &opts)
        .await
        .unwrap();

    assert_eq!(
        *executor.builds.lock().unwrap(),
        vec![(
            go_root.join("src/t-1.2.3"),
            "./cmd/t".to_string(),
            go_root.join("bin/t"),
        )]
    );
}

#[tokio::test]
async fn cancellation_abandons_in_flight_and_queued_packages() {
    let root = tempfile::tempdir().unwrap();
    let downloader = Arc::new(FakeDownloader::default().with_delay(Duration::from_millis(300)));
    let cancel = CancellationToken::new();
    let opts = InstallOptions {
        max_parallelism: 1,
        ..InstallOptions::default()
    };
    let packages = vec![http_pkg("tool1"), http_pkg("tool2"), http_pkg("tool3")];

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = installer(root.path(), &downloader)
        .with_cancellation(cancel)
        .install_packages(packages, &disabled(), &root.path().join("unused.json"), &opts)
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Failed));
    assert_eq!(downloader.calls(), 1);
    for name in ["tool1", "tool2", "tool3"] {
        assert!(!installed_exe(root.path(), name).exists(), "{name}");
    }
}

/// Serves a corrupt body and cancels `token` once the body has been read.
struct CancelAfterBody {
    token: CancellationToken,
    calls: AtomicUsize,
}

#[async_trait]
impl PackageDownloader for CancelAfterBody {
    async fn get_stream(&self, _: &Package, _: Runtime) -> Result<ByteStream, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let token = self.token.clone();
        let body = stream::iter(vec![Ok(Bytes::from_static(b"corrupt"))]);
        let cancel = stream::once(async move { token.cancel() })
            .filter_map(|()| async { None::<Result<Bytes, DownloadError>> });
        Ok(body.chain(cancel).boxed())
    }
}

#[tokio::test]
async fn cancellation_stops_before_the_retry() {
    let root = tempfile::tempdir().unwrap();
    let pkg = http_pkg("tool");
    let id = pkg.checksum_id(LINUX).unwrap();
    let store = ChecksumStore::new();
    store.set(
        id.as_str(),
        ChecksumRecord::new(id.as_str(), digest_bytes(BODY, Algorithm::Sha256), Algorithm::Sha256),
    );
    let policy = ChecksumPolicy {
        store: &store,
        require: true,
    };
    let cancel = CancellationToken::new();
    let downloader = Arc::new(CancelAfterBody {
        token: cancel.clone(),
        calls: AtomicUsize::new(0),
    });

    let err = Installer::new(root.path(), LINUX)
        .with_downloader(downloader.clone())
        .with_cancellation(cancel)
        .install_package(&pkg, Some(policy), &InstallOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, InstallError::Cancelled));
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);
    assert!(!installed_exe(root.path(), "tool").exists());
}
