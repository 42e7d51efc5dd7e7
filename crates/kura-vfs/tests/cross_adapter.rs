//! Integration tests for dispatch across adapter kinds.
//!
//! The `system` adapter talks to an in-process fake endpoint that serves the
//! remote VFS protocol out of a [`MemoryAdapter`], so network mounts,
//! memory mounts and the cross-adapter fallback run end to end.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use kura_vfs::adapter::{RemoteRequest, RemoteResponse, RequestBody};
use kura_vfs::{
    Adapter, AdapterKind, AdapterRegistry, Download, FallbackStep, Filesystem, ListOptions,
    MemoryAdapter, MountpointConfig, NetworkConfig, Options, Payload, Representation, Transport,
    Vfs, VfsConfig, VfsError, VfsEvent, VfsResult,
};

// ============================================================================
// Fake remote endpoint
// ============================================================================

const BASE_URL: &str = "http://remote/vfs";

/// Serves readdir/readfile/writefile/... from one shared memory tree.
#[derive(Default)]
struct FakeRemote {
    store: MemoryAdapter,
    calls: Mutex<Vec<String>>,
    fail_unlink: bool,
}

impl FakeRemote {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn handle(&self, endpoint: &str, body: RequestBody) -> VfsResult<RemoteResponse> {
        let opts = Options::new();
        let args = match body {
            RequestBody::Upload { path, data, .. } => {
                let written = self.store.write_bytes(&path, data, &opts).await?;
                return Ok(RemoteResponse::json(&json!(written)));
            }
            RequestBody::Json(args) => args,
        };
        let path = args["path"].as_str().unwrap_or_default();
        let from = args["from"].as_str().unwrap_or_default();
        let to = args["to"].as_str().unwrap_or_default();

        let value = match endpoint {
            "readdir" => json!(self.store.list(path, &ListOptions::new()).await?),
            "readfile" => {
                let raw = self
                    .store
                    .read_bytes(path, Representation::Binary, &opts)
                    .await?;
                return Ok(RemoteResponse::bytes(raw.mime, raw.bytes));
            }
            "stat" => json!(self.store.stat(path, &opts).await?),
            "exists" => json!(self.store.exists(path, &opts).await?),
            "mkdir" => json!(self.store.create_directory(path, &opts).await?),
            "touch" => json!(self.store.touch(path, &opts).await?),
            "copy" => json!(self.store.copy(from, to, &opts).await?),
            "rename" => json!(self.store.rename(from, to, &opts).await?),
            "unlink" if self.fail_unlink => {
                return Err(VfsError::PermissionDenied(path.to_string()));
            }
            "unlink" => json!(self.store.delete(path, &opts).await?),
            other => return Err(VfsError::other(format!("no endpoint {other}"))),
        };
        Ok(RemoteResponse::json(&value))
    }
}

#[async_trait]
impl Transport for FakeRemote {
    async fn request(&self, request: RemoteRequest) -> VfsResult<RemoteResponse> {
        let endpoint = request.url.rsplit('/').next().unwrap_or_default().to_string();
        self.calls.lock().push(endpoint.clone());

        // Errors travel as HTTP statuses, like a real server
        Ok(self
            .handle(&endpoint, request.body)
            .await
            .unwrap_or_else(|e| RemoteResponse {
                status: 500,
                headers: Vec::new(),
                body: e.to_string().into_bytes(),
            }))
    }
}

async fn setup(remote: Arc<FakeRemote>, watch: bool) -> Vfs {
    let config = VfsConfig {
        watch,
        network: Some(NetworkConfig {
            base_url: BASE_URL.to_string(),
        }),
        mountpoints: vec![
            MountpointConfig::new("home", AdapterKind::System).with_label("Home"),
            MountpointConfig::new("shared", AdapterKind::System),
            MountpointConfig::new("scratch", AdapterKind::Memory),
        ],
        ..VfsConfig::default()
    };
    let mut adapters = AdapterRegistry::new();
    adapters.register_network_from(&config, remote).unwrap();

    let fs = Filesystem::new(config, adapters);
    fs.mount_all(true).await.unwrap();
    Vfs::from(fs)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn network_mount_roundtrip() {
    let remote = Arc::new(FakeRemote::default());
    let vfs = setup(Arc::clone(&remote), false).await;

    assert_eq!(vfs.write("home:/a.txt", "hello", Options::new()).await.unwrap(), 5);
    vfs.mkdir("home:/docs", Options::new()).await.unwrap();

    let entries = vfs.list("home:/", ListOptions::new()).await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["docs", "a.txt"]);
    assert!(entries[0].is_directory && !entries[0].is_file);

    let text = vfs
        .read("home:/a.txt", Representation::Text, Options::new())
        .await
        .unwrap();
    assert_eq!(text, Payload::Text("hello".into()));

    let stat = vfs.stat("home:/a.txt", Options::new()).await.unwrap();
    assert_eq!(stat.mime.as_deref(), Some("text/plain"));

    assert_eq!(
        remote.calls(),
        vec!["writefile", "mkdir", "readdir", "readfile", "stat"]
    );
}

#[tokio::test]
async fn urls_resolve_without_requests() {
    let remote = Arc::new(FakeRemote::default());
    let vfs = setup(Arc::clone(&remote), false).await;

    let url = vfs.url("home:/a b.txt", Options::new()).await.unwrap();
    assert_eq!(
        url.as_deref(),
        Some("http://remote/vfs/readfile?path=home%3A%2Fa%20b.txt")
    );
    assert!(matches!(
        vfs.download("home:/a.txt", Options::new()).await.unwrap(),
        Download::Url(u) if u.starts_with("http://remote/vfs/readfile?options=")
    ));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn same_kind_transfer_is_delegated() {
    let remote = Arc::new(FakeRemote::default());
    let vfs = setup(Arc::clone(&remote), false).await;
    vfs.write("home:/a.txt", "x", Options::new()).await.unwrap();

    assert!(vfs.copy("home:/a.txt", "shared:/b.txt", Options::new()).await.unwrap());
    assert_eq!(remote.calls(), vec!["writefile", "copy"]);
}

#[tokio::test]
async fn rename_across_adapters_moves_content() {
    let remote = Arc::new(FakeRemote::default());
    let vfs = setup(Arc::clone(&remote), false).await;
    vfs.write("home:/report.txt", "q3 numbers", Options::new()).await.unwrap();

    assert!(vfs
        .rename("home:/report.txt", "scratch:/report.txt", Options::new())
        .await
        .unwrap());

    let moved = vfs
        .read("scratch:/report.txt", Representation::Text, Options::new())
        .await
        .unwrap();
    assert_eq!(moved, Payload::Text("q3 numbers".into()));
    assert!(!vfs.exists("home:/report.txt", Options::new()).await.unwrap());
    assert_eq!(
        remote.calls(),
        vec!["writefile", "readfile", "unlink", "exists"]
    );
}

#[tokio::test]
async fn failed_delete_leaves_content_in_both() {
    let remote = Arc::new(FakeRemote {
        fail_unlink: true,
        ..FakeRemote::default()
    });
    let vfs = setup(Arc::clone(&remote), false).await;
    vfs.write("home:/report.txt", "q3", Options::new()).await.unwrap();

    let err = vfs
        .rename("home:/report.txt", "scratch:/report.txt", Options::new())
        .await
        .unwrap_err();
    match err {
        VfsError::Fallback { step, source } => {
            assert_eq!(step, FallbackStep::Delete);
            assert!(matches!(*source, VfsError::Remote { status: 500, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(vfs.exists("home:/report.txt", Options::new()).await.unwrap());
    assert!(vfs.exists("scratch:/report.txt", Options::new()).await.unwrap());
}

#[tokio::test]
async fn failed_read_aborts_before_write() {
    let remote = Arc::new(FakeRemote::default());
    let vfs = setup(Arc::clone(&remote), false).await;

    let err = vfs
        .copy("home:/missing.txt", "scratch:/copy.txt", Options::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VfsError::Fallback {
            step: FallbackStep::Read,
            ..
        }
    ));
    assert!(!vfs.exists("scratch:/copy.txt", Options::new()).await.unwrap());
}

#[tokio::test]
async fn watch_reports_touched_directories() {
    let remote = Arc::new(FakeRemote::default());
    let vfs = setup(remote, true).await;
    let mut rx = vfs.filesystem().subscribe();

    vfs.write("scratch:/in/a.txt", "1", Options::new()).await.unwrap();
    vfs.copy("scratch:/in/a.txt", "home:/out/a.txt", Options::new())
        .await
        .unwrap();

    let mut changed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let VfsEvent::DirectoryChanged { path } = event {
            changed.push(path);
        }
    }
    assert_eq!(changed, vec!["scratch:/in/", "home:/out/"]);
}

#[tokio::test]
async fn duplicate_home_leaves_one_mountpoint() {
    let config = VfsConfig::from_toml_str(
        r#"
        [[mountpoints]]
        name = "home"
        adapter = "memory"

        [[mountpoints]]
        name = "home"
        label = "Home again"
        adapter = "null"
        "#,
    )
    .unwrap();
    let fs = Filesystem::new(config, AdapterRegistry::new());
    fs.mount_all(false).await.unwrap();

    let mounts = fs.get_mounts(false);
    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].adapter, AdapterKind::Memory);
}
