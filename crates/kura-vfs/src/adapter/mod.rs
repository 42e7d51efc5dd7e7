//! Storage adapters.
//!
//! An [`Adapter`] implements the uniform per-path operation contract for
//! one kind of backend. Every method has a default that behaves like the
//! null adapter (empty or `false` results), so a backend only overrides
//! what it supports and anything else fails safe.
//!
//! Mountpoints never hold a bare adapter: the registry builds an
//! [`AdapterBinding`] through the [`AdapterRegistry`] factory for the
//! configured [`AdapterKind`].

mod local;
mod memory;
mod network;
mod null;

pub use local::LocalAdapter;
pub use memory::MemoryAdapter;
pub use network::{Method, NetworkAdapter, RemoteRequest, RemoteResponse, RequestBody, Transport};
pub use null::NullAdapter;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{MountpointConfig, VfsConfig};
use crate::error::{VfsError, VfsResult};
use crate::mountpoint::MountInfo;
use crate::path;
use crate::types::{
    DEFAULT_MIME, Download, FileRecord, ListOptions, Options, RawPayload, Representation,
};

/// Uniform storage operation contract.
///
/// Paths are full namespaced VFS paths (`home:/a/b`); adapters strip the
/// prefix themselves when they need a backend-relative path.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// List a directory.
    async fn list(&self, _path: &str, _options: &ListOptions) -> VfsResult<Vec<FileRecord>> {
        Ok(Vec::new())
    }

    /// Read a whole file. `representation` is a hint; conversion happens
    /// after the adapter returns.
    async fn read_bytes(
        &self,
        _path: &str,
        _representation: Representation,
        _options: &Options,
    ) -> VfsResult<RawPayload> {
        Ok(RawPayload::empty())
    }

    /// Replace a file's content. Returns bytes written, or -1 on failure.
    async fn write_bytes(&self, _path: &str, _data: Vec<u8>, _options: &Options) -> VfsResult<i64> {
        Ok(-1)
    }

    /// Copy within this backend.
    async fn copy(&self, _from: &str, _to: &str, _options: &Options) -> VfsResult<bool> {
        Ok(false)
    }

    /// Rename within this backend.
    async fn rename(&self, _from: &str, _to: &str, _options: &Options) -> VfsResult<bool> {
        Ok(false)
    }

    /// Create a directory.
    async fn create_directory(&self, _path: &str, _options: &Options) -> VfsResult<bool> {
        Ok(false)
    }

    /// Delete a file or directory tree.
    async fn delete(&self, _path: &str, _options: &Options) -> VfsResult<bool> {
        Ok(false)
    }

    /// Check whether a path exists.
    async fn exists(&self, _path: &str, _options: &Options) -> VfsResult<bool> {
        Ok(false)
    }

    /// Metadata for a single path.
    async fn stat(&self, path: &str, _options: &Options) -> VfsResult<FileRecord> {
        Ok(FileRecord::empty(path))
    }

    /// A URL the content can be fetched from, if the backend has one.
    async fn resolve_url(&self, _path: &str, _options: &Options) -> VfsResult<Option<String>> {
        Ok(None)
    }

    /// Find entries under `root` whose name matches `pattern`.
    async fn search(
        &self,
        _root: &str,
        _pattern: &str,
        _options: &ListOptions,
    ) -> VfsResult<Vec<FileRecord>> {
        Ok(Vec::new())
    }

    /// Create an empty file or bump its modification time.
    async fn touch(&self, _path: &str, _options: &Options) -> VfsResult<bool> {
        Ok(false)
    }

    /// Called when the owning mountpoint is mounted.
    async fn mount(&self, _mount: &MountInfo) -> VfsResult<bool> {
        Ok(true)
    }

    /// Called when the owning mountpoint is unmounted.
    async fn unmount(&self, _mount: &MountInfo) -> VfsResult<bool> {
        Ok(true)
    }

    /// Prepare a download.
    ///
    /// Backends without a native download hand back the content for the
    /// caller to save.
    async fn download(&self, path: &str, options: &Options) -> VfsResult<Download> {
        let raw = self.read_bytes(path, Representation::Binary, options).await?;
        Ok(Download::Content {
            filename: path::basename(path).to_string(),
            mime: raw.mime,
            bytes: raw.bytes,
        })
    }

    /// Whether all adapters of this kind reach one store that routes by
    /// path prefix.
    ///
    /// When true, a copy or rename between two mountpoints of the same kind
    /// is delegated to the source adapter. Adapters owning a private store
    /// per mountpoint return false and go through read/write instead.
    fn shared_backend(&self) -> bool {
        true
    }
}

/// Adapter kind named by mountpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AdapterKind {
    /// Always empty, always fails safe.
    Null,
    /// Remote endpoint reached through a [`Transport`].
    #[default]
    System,
    /// Ephemeral in-memory tree.
    Memory,
    /// Directory on the host filesystem.
    Local,
    /// Any other registered factory.
    Custom(String),
}

impl AdapterKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &str {
        match self {
            AdapterKind::Null => "null",
            AdapterKind::System => "system",
            AdapterKind::Memory => "memory",
            AdapterKind::Local => "local",
            AdapterKind::Custom(name) => name,
        }
    }
}

impl FromStr for AdapterKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "null" => AdapterKind::Null,
            "system" | "network" => AdapterKind::System,
            "memory" => AdapterKind::Memory,
            "local" => AdapterKind::Local,
            _ => AdapterKind::Custom(s.to_string()),
        })
    }
}

impl From<String> for AdapterKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<AdapterKind> for String {
    fn from(kind: AdapterKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds an adapter for one mountpoint.
pub type AdapterFactory =
    Arc<dyn Fn(&MountpointConfig) -> VfsResult<Box<dyn Adapter>> + Send + Sync>;

/// Maps adapter kinds to factories.
#[derive(Clone)]
pub struct AdapterRegistry {
    factories: HashMap<AdapterKind, AdapterFactory>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().map(AdapterKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("AdapterRegistry").field("kinds", &kinds).finish()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    /// Registry with the built-in null, memory and local adapters.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(AdapterKind::Null, |_| Ok(Box::new(NullAdapter)));
        registry.register(AdapterKind::Memory, |config| {
            Ok(Box::new(if config.attributes.read_only {
                MemoryAdapter::read_only()
            } else {
                MemoryAdapter::new()
            }))
        });
        registry.register(AdapterKind::Local, |config| {
            let source = config.source.as_deref().ok_or_else(|| {
                VfsError::Config(format!(
                    "local mountpoint '{}' has no source directory",
                    config.name
                ))
            })?;
            let local = if config.attributes.read_only {
                LocalAdapter::read_only(source)
            } else {
                LocalAdapter::new(source)
            };
            Ok(Box::new(local))
        });
        registry
    }

    /// Registry with no factories at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register<F>(&mut self, kind: AdapterKind, factory: F)
    where
        F: Fn(&MountpointConfig) -> VfsResult<Box<dyn Adapter>> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Arc::new(factory));
    }

    /// Register the network adapter for [`AdapterKind::System`].
    pub fn register_network(&mut self, transport: Arc<dyn Transport>, base_url: impl Into<String>) {
        let base_url = base_url.into();
        self.register(AdapterKind::System, move |_| {
            Ok(Box::new(NetworkAdapter::new(
                Arc::clone(&transport),
                base_url.clone(),
            )))
        });
    }

    /// Register the network adapter against the `[network]` section of a
    /// config.
    pub fn register_network_from(
        &mut self,
        config: &VfsConfig,
        transport: Arc<dyn Transport>,
    ) -> VfsResult<()> {
        let network = config
            .network
            .as_ref()
            .ok_or_else(|| VfsError::Config("no [network] section".into()))?;
        self.register_network(transport, network.base_url.clone());
        Ok(())
    }

    /// Build the adapter binding for a mountpoint.
    ///
    /// Kinds with no registered factory get the null adapter.
    pub fn build(&self, config: &MountpointConfig) -> VfsResult<AdapterBinding> {
        let adapter = match self.factories.get(&config.adapter) {
            Some(factory) => factory(config)?,
            None => {
                tracing::warn!(
                    mountpoint = %config.name,
                    adapter = %config.adapter,
                    "no adapter registered, using null adapter"
                );
                Box::new(NullAdapter)
            }
        };
        Ok(AdapterBinding::new(config.adapter.clone(), adapter))
    }
}

/// The adapter instance owned by one mountpoint.
///
/// Wraps the concrete adapter once, at mountpoint construction, and tags
/// it with the kind it was built for. The registry compares kinds to
/// decide whether a copy/rename can be delegated natively.
pub struct AdapterBinding {
    kind: AdapterKind,
    inner: Box<dyn Adapter>,
}

impl std::fmt::Debug for AdapterBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterBinding")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl AdapterBinding {
    /// Bind a concrete adapter.
    pub fn new(kind: AdapterKind, inner: Box<dyn Adapter>) -> Self {
        Self { kind, inner }
    }

    /// The kind this binding was built for.
    pub fn kind(&self) -> &AdapterKind {
        &self.kind
    }
}

#[async_trait]
impl Adapter for AdapterBinding {
    async fn list(&self, path: &str, options: &ListOptions) -> VfsResult<Vec<FileRecord>> {
        let records = self.inner.list(path, options).await?;
        Ok(records.into_iter().map(FileRecord::with_consistent_kind).collect())
    }

    async fn read_bytes(
        &self,
        path: &str,
        representation: Representation,
        options: &Options,
    ) -> VfsResult<RawPayload> {
        let mut raw = self.inner.read_bytes(path, representation, options).await?;
        if raw.mime.is_empty() {
            raw.mime = DEFAULT_MIME.to_string();
        }
        Ok(raw)
    }

    async fn write_bytes(&self, path: &str, data: Vec<u8>, options: &Options) -> VfsResult<i64> {
        self.inner.write_bytes(path, data, options).await
    }

    async fn copy(&self, from: &str, to: &str, options: &Options) -> VfsResult<bool> {
        self.inner.copy(from, to, options).await
    }

    async fn rename(&self, from: &str, to: &str, options: &Options) -> VfsResult<bool> {
        self.inner.rename(from, to, options).await
    }

    async fn create_directory(&self, path: &str, options: &Options) -> VfsResult<bool> {
        self.inner.create_directory(path, options).await
    }

    async fn delete(&self, path: &str, options: &Options) -> VfsResult<bool> {
        self.inner.delete(path, options).await
    }

    async fn exists(&self, path: &str, options: &Options) -> VfsResult<bool> {
        self.inner.exists(path, options).await
    }

    async fn stat(&self, path: &str, options: &Options) -> VfsResult<FileRecord> {
        Ok(self.inner.stat(path, options).await?.with_consistent_kind())
    }

    async fn resolve_url(&self, path: &str, options: &Options) -> VfsResult<Option<String>> {
        self.inner.resolve_url(path, options).await
    }

    async fn search(
        &self,
        root: &str,
        pattern: &str,
        options: &ListOptions,
    ) -> VfsResult<Vec<FileRecord>> {
        let records = self.inner.search(root, pattern, options).await?;
        Ok(records.into_iter().map(FileRecord::with_consistent_kind).collect())
    }

    async fn touch(&self, path: &str, options: &Options) -> VfsResult<bool> {
        self.inner.touch(path, options).await
    }

    async fn mount(&self, mount: &MountInfo) -> VfsResult<bool> {
        self.inner.mount(mount).await
    }

    async fn unmount(&self, mount: &MountInfo) -> VfsResult<bool> {
        self.inner.unmount(mount).await
    }

    async fn download(&self, path: &str, options: &Options) -> VfsResult<Download> {
        self.inner.download(path, options).await
    }

    fn shared_backend(&self) -> bool {
        self.inner.shared_backend()
    }
}

/// Compile a search pattern into a filename matcher.
///
/// `*` and `?` are wildcards; a pattern without wildcards matches any name
/// containing it. Matching ignores case.
pub(crate) fn search_matcher(pattern: &str) -> VfsResult<Regex> {
    let pattern = if pattern.contains(['*', '?']) {
        pattern.to_string()
    } else {
        format!("*{pattern}*")
    };

    let mut re = String::from("(?i)^");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                re.push_str(&regex::escape(&literal));
                literal.clear();
                re.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    re.push_str(&regex::escape(&literal));
    re.push('$');

    Regex::new(&re).map_err(|e| VfsError::other(format!("bad search pattern: {e}")))
}

/// Compose a full VFS path from the prefix of `reference` and a
/// backend-relative path.
pub(crate) fn full_path(reference: &str, relative: &str) -> String {
    match path::parse_mount_prefix(reference) {
        Some(prefix) => format!("{prefix}:{relative}"),
        None => relative.to_string(),
    }
}
