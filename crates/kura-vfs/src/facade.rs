//! Named entry points over [`Filesystem::dispatch`].

use std::sync::Arc;

use crate::error::VfsResult;
use crate::ops::{Operation, OperationResult};
use crate::registry::Filesystem;
use crate::types::{Download, FileRecord, ListOptions, Options, Payload, Representation};

/// One method per VFS operation, all routed through the registry.
///
/// Cheap to clone; holds no state of its own.
#[derive(Debug, Clone)]
pub struct Vfs {
    fs: Arc<Filesystem>,
}

impl Vfs {
    pub fn new(fs: Arc<Filesystem>) -> Self {
        Self { fs }
    }

    /// The underlying registry.
    pub fn filesystem(&self) -> &Arc<Filesystem> {
        &self.fs
    }

    /// Dispatch an already-built operation.
    pub async fn call(&self, op: Operation) -> VfsResult<OperationResult> {
        self.fs.dispatch(op).await
    }

    pub async fn list(&self, path: &str, options: ListOptions) -> VfsResult<Vec<FileRecord>> {
        self.call(Operation::List {
            path: path.to_string(),
            options,
        })
        .await?
        .into_entries()
    }

    pub async fn read(
        &self,
        path: &str,
        representation: Representation,
        options: Options,
    ) -> VfsResult<Payload> {
        self.call(Operation::Read {
            path: path.to_string(),
            representation,
            options,
        })
        .await?
        .into_payload()
    }

    /// Returns bytes written, or -1 if the adapter refused.
    pub async fn write(&self, path: &str, data: impl Into<Vec<u8>>, options: Options) -> VfsResult<i64> {
        self.call(Operation::Write {
            path: path.to_string(),
            data: data.into(),
            options,
        })
        .await?
        .into_written()
    }

    pub async fn copy(&self, from: &str, to: &str, options: Options) -> VfsResult<bool> {
        self.call(Operation::Copy {
            from: from.to_string(),
            to: to.to_string(),
            options,
        })
        .await?
        .into_bool()
    }

    pub async fn rename(&self, from: &str, to: &str, options: Options) -> VfsResult<bool> {
        self.call(Operation::Rename {
            from: from.to_string(),
            to: to.to_string(),
            options,
        })
        .await?
        .into_bool()
    }

    pub async fn mkdir(&self, path: &str, options: Options) -> VfsResult<bool> {
        self.call(Operation::CreateDirectory {
            path: path.to_string(),
            options,
        })
        .await?
        .into_bool()
    }

    pub async fn delete(&self, path: &str, options: Options) -> VfsResult<bool> {
        self.call(Operation::Delete {
            path: path.to_string(),
            options,
        })
        .await?
        .into_bool()
    }

    pub async fn exists(&self, path: &str, options: Options) -> VfsResult<bool> {
        self.call(Operation::Exists {
            path: path.to_string(),
            options,
        })
        .await?
        .into_bool()
    }

    pub async fn stat(&self, path: &str, options: Options) -> VfsResult<FileRecord> {
        self.call(Operation::Stat {
            path: path.to_string(),
            options,
        })
        .await?
        .into_record()
    }

    pub async fn url(&self, path: &str, options: Options) -> VfsResult<Option<String>> {
        self.call(Operation::ResolveUrl {
            path: path.to_string(),
            options,
        })
        .await?
        .into_url()
    }

    pub async fn search(
        &self,
        root: &str,
        pattern: &str,
        options: ListOptions,
    ) -> VfsResult<Vec<FileRecord>> {
        self.call(Operation::Search {
            root: root.to_string(),
            pattern: pattern.to_string(),
            options,
        })
        .await?
        .into_entries()
    }

    pub async fn touch(&self, path: &str, options: Options) -> VfsResult<bool> {
        self.call(Operation::Touch {
            path: path.to_string(),
            options,
        })
        .await?
        .into_bool()
    }

    pub async fn download(&self, path: &str, options: Options) -> VfsResult<Download> {
        self.call(Operation::Download {
            path: path.to_string(),
            options,
        })
        .await?
        .into_download()
    }
}

impl From<Filesystem> for Vfs {
    fn from(fs: Filesystem) -> Self {
        Self::new(Arc::new(fs))
    }
}
