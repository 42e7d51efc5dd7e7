//! Local filesystem adapter.
//!
//! Maps a mountpoint onto a host directory, with path security to prevent
//! escaping that directory.

use async_trait::async_trait;
use serde_json::json;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use super::{Adapter, full_path, search_matcher};
use crate::error::{VfsError, VfsResult};
use crate::path;
use crate::transform::mime_for_filename;
use crate::types::{FileRecord, ListOptions, Options, RawPayload, Representation, epoch_millis};

/// Local filesystem adapter.
///
/// All operations are relative to `root`. If `root` is `/srv/share`, then
/// `share:/docs/a.txt` maps to `/srv/share/docs/a.txt`.
#[derive(Debug, Clone)]
pub struct LocalAdapter {
    root: PathBuf,
    read_only: bool,
}

impl LocalAdapter {
    /// Create an adapter rooted at the given directory.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            read_only: false,
        }
    }

    /// Create a read-only adapter.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::new(root)
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a VFS path to a host path within the root.
    ///
    /// Returns an error if the path escapes the root (via `..` or a
    /// symlink).
    fn resolve(&self, vfs_path: &str) -> VfsResult<PathBuf> {
        let relative = path::relative_path(vfs_path);
        let relative = Path::new(relative.trim_start_matches('/'));

        if relative.as_os_str().is_empty() {
            return Ok(self.root.clone());
        }

        let mut full = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(s) => full.push(s),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !full.pop() || !full.starts_with(&self.root) {
                        return Err(VfsError::path_escapes_root(vfs_path));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {}
            }
        }

        // Symlinks inside the tree may still point outside it
        let canonical = if full.exists() {
            full.canonicalize()?
        } else {
            match (full.parent(), full.file_name()) {
                (Some(parent), Some(name)) if parent.exists() => {
                    parent.canonicalize()?.join(name)
                }
                _ => full,
            }
        };

        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok(canonical)
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn record(vfs_path: String, meta: &std::fs::Metadata) -> FileRecord {
        let record = if meta.is_dir() {
            FileRecord::directory(vfs_path)
        } else {
            let record = FileRecord::file(vfs_path, meta.len());
            let mime = mime_for_filename(&record.filename);
            record.with_mime(mime)
        };

        let mut record = record.with_stat(json!({ "readonly": meta.permissions().readonly() }));
        record.mtime = meta.modified().ok().map(epoch_millis);
        record.ctime = meta.created().ok().map(epoch_millis);
        record.atime = meta.accessed().ok().map(epoch_millis);
        record
    }

    /// VFS path for a host path under the root.
    fn vfs_path(&self, reference: &str, host: &Path) -> String {
        let relative = host.strip_prefix(&self.root).unwrap_or(host);
        let relative = relative.to_string_lossy().replace('\\', "/");
        full_path(reference, &format!("/{relative}"))
    }

    async fn copy_tree(from: &Path, to: &Path) -> VfsResult<()> {
        let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
        while let Some((src, dst)) = pending.pop() {
            let meta = fs::metadata(&src).await.map_err(|e| io_error(&src, e))?;
            if meta.is_dir() {
                fs::create_dir_all(&dst).await?;
                let mut dir = fs::read_dir(&src).await?;
                while let Some(entry) = dir.next_entry().await? {
                    pending.push((entry.path(), dst.join(entry.file_name())));
                }
            } else {
                fs::copy(&src, &dst).await.map_err(|e| io_error(&src, e))?;
            }
        }
        Ok(())
    }

    async fn ensure_parent(full: &Path) -> VfsResult<()> {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Map common I/O failures to typed errors naming the path.
fn io_error(path: &Path, err: io::Error) -> VfsError {
    let shown = path.display().to_string();
    match err.kind() {
        io::ErrorKind::NotFound => VfsError::NotFound(shown),
        io::ErrorKind::AlreadyExists => VfsError::AlreadyExists(shown),
        io::ErrorKind::PermissionDenied => VfsError::PermissionDenied(shown),
        _ => VfsError::Io(err),
    }
}

#[async_trait]
impl Adapter for LocalAdapter {
    async fn list(&self, path: &str, _options: &ListOptions) -> VfsResult<Vec<FileRecord>> {
        let full = self.resolve(path)?;
        let mut dir = fs::read_dir(&full).await.map_err(|e| io_error(&full, e))?;

        let mut records = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            records.push(Self::record(self.vfs_path(path, &entry.path()), &meta));
        }

        records.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(records)
    }

    async fn read_bytes(
        &self,
        path: &str,
        _representation: Representation,
        _options: &Options,
    ) -> VfsResult<RawPayload> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await.map_err(|e| io_error(&full, e))?;
        if meta.is_dir() {
            return Err(VfsError::is_a_directory(path));
        }
        let bytes = fs::read(&full).await.map_err(|e| io_error(&full, e))?;
        Ok(RawPayload::new(
            mime_for_filename(path::basename(path)),
            bytes,
        ))
    }

    async fn write_bytes(&self, path: &str, data: Vec<u8>, _options: &Options) -> VfsResult<i64> {
        self.check_writable()?;
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(VfsError::is_a_directory(path));
        }
        Self::ensure_parent(&full).await?;
        let len = data.len() as i64;
        fs::write(&full, data).await.map_err(|e| io_error(&full, e))?;
        Ok(len)
    }

    async fn copy(&self, from: &str, to: &str, _options: &Options) -> VfsResult<bool> {
        self.check_writable()?;
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        if dst.starts_with(&src) {
            return Err(VfsError::invalid_path(format!("{to} is inside {from}")));
        }
        Self::ensure_parent(&dst).await?;
        Self::copy_tree(&src, &dst).await?;
        Ok(true)
    }

    async fn rename(&self, from: &str, to: &str, _options: &Options) -> VfsResult<bool> {
        self.check_writable()?;
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        Self::ensure_parent(&dst).await?;
        fs::rename(&src, &dst).await.map_err(|e| io_error(&src, e))?;
        Ok(true)
    }

    async fn create_directory(&self, path: &str, _options: &Options) -> VfsResult<bool> {
        self.check_writable()?;
        let full = self.resolve(path)?;
        Self::ensure_parent(&full).await?;
        fs::create_dir(&full).await.map_err(|e| io_error(&full, e))?;
        Ok(true)
    }

    async fn delete(&self, path: &str, _options: &Options) -> VfsResult<bool> {
        self.check_writable()?;
        let full = self.resolve(path)?;
        if full == self.root {
            return Err(VfsError::PermissionDenied("cannot delete the root".into()));
        }
        let meta = fs::symlink_metadata(&full)
            .await
            .map_err(|e| io_error(&full, e))?;
        if meta.is_dir() {
            fs::remove_dir_all(&full).await?;
        } else {
            fs::remove_file(&full).await?;
        }
        Ok(true)
    }

    async fn exists(&self, path: &str, _options: &Options) -> VfsResult<bool> {
        let full = self.resolve(path)?;
        Ok(fs::try_exists(&full).await?)
    }

    async fn stat(&self, path: &str, _options: &Options) -> VfsResult<FileRecord> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await.map_err(|e| io_error(&full, e))?;
        Ok(Self::record(self.vfs_path(path, &full), &meta))
    }

    async fn resolve_url(&self, path: &str, _options: &Options) -> VfsResult<Option<String>> {
        let full = self.resolve(path)?;
        Ok(Some(format!("file://{}", full.display())))
    }

    async fn search(
        &self,
        root: &str,
        pattern: &str,
        _options: &ListOptions,
    ) -> VfsResult<Vec<FileRecord>> {
        let matcher = search_matcher(pattern)?;
        let start = self.resolve(root)?;

        let mut found = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|e| io_error(&dir, e))?;
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    pending.push(entry.path());
                }
                if matcher.is_match(&entry.file_name().to_string_lossy()) {
                    found.push(Self::record(self.vfs_path(root, &entry.path()), &meta));
                }
            }
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    async fn touch(&self, path: &str, _options: &Options) -> VfsResult<bool> {
        self.check_writable()?;
        let full = self.resolve(path)?;
        Self::ensure_parent(&full).await?;
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .await
            .map_err(|e| io_error(&full, e))?;
        file.into_std().await.set_modified(SystemTime::now())?;
        Ok(true)
    }

    fn shared_backend(&self) -> bool {
        false
    }
}
