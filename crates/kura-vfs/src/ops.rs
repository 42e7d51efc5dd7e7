//! Dispatchable operations and their results.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::EnumString;

use crate::error::{VfsError, VfsResult};
use crate::types::{Download, FileRecord, ListOptions, Options, Payload, Representation};

/// Name of a VFS operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum OperationKind {
    #[strum(serialize = "list", serialize = "readdir")]
    List,
    #[strum(serialize = "read", serialize = "readfile")]
    Read,
    #[strum(serialize = "write", serialize = "writefile")]
    Write,
    Copy,
    Rename,
    #[serde(rename = "mkdir")]
    #[strum(serialize = "mkdir")]
    CreateDirectory,
    #[strum(serialize = "delete", serialize = "unlink")]
    Delete,
    Exists,
    Stat,
    #[serde(rename = "url")]
    #[strum(serialize = "url")]
    ResolveUrl,
    Search,
    Touch,
    Download,
}

impl OperationKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::List => "list",
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Copy => "copy",
            OperationKind::Rename => "rename",
            OperationKind::CreateDirectory => "mkdir",
            OperationKind::Delete => "delete",
            OperationKind::Exists => "exists",
            OperationKind::Stat => "stat",
            OperationKind::ResolveUrl => "url",
            OperationKind::Search => "search",
            OperationKind::Touch => "touch",
            OperationKind::Download => "download",
        }
    }

    /// Operations that change backend state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            OperationKind::Write
                | OperationKind::Copy
                | OperationKind::Rename
                | OperationKind::CreateDirectory
                | OperationKind::Delete
                | OperationKind::Touch
        )
    }

    /// Operations that take a source and a destination path.
    pub fn is_transfer(&self) -> bool {
        matches!(self, OperationKind::Copy | OperationKind::Rename)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A VFS operation with its arguments.
#[derive(Debug, Clone)]
pub enum Operation {
    List {
        path: String,
        options: ListOptions,
    },
    Read {
        path: String,
        representation: Representation,
        options: Options,
    },
    Write {
        path: String,
        data: Vec<u8>,
        options: Options,
    },
    Copy {
        from: String,
        to: String,
        options: Options,
    },
    Rename {
        from: String,
        to: String,
        options: Options,
    },
    CreateDirectory {
        path: String,
        options: Options,
    },
    Delete {
        path: String,
        options: Options,
    },
    Exists {
        path: String,
        options: Options,
    },
    Stat {
        path: String,
        options: Options,
    },
    ResolveUrl {
        path: String,
        options: Options,
    },
    Search {
        root: String,
        pattern: String,
        options: ListOptions,
    },
    Touch {
        path: String,
        options: Options,
    },
    Download {
        path: String,
        options: Options,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::List { .. } => OperationKind::List,
            Operation::Read { .. } => OperationKind::Read,
            Operation::Write { .. } => OperationKind::Write,
            Operation::Copy { .. } => OperationKind::Copy,
            Operation::Rename { .. } => OperationKind::Rename,
            Operation::CreateDirectory { .. } => OperationKind::CreateDirectory,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Exists { .. } => OperationKind::Exists,
            Operation::Stat { .. } => OperationKind::Stat,
            Operation::ResolveUrl { .. } => OperationKind::ResolveUrl,
            Operation::Search { .. } => OperationKind::Search,
            Operation::Touch { .. } => OperationKind::Touch,
            Operation::Download { .. } => OperationKind::Download,
        }
    }

    /// Paths the operation addresses, source first.
    pub fn paths(&self) -> Vec<&str> {
        match self {
            Operation::Copy { from, to, .. } | Operation::Rename { from, to, .. } => {
                vec![from.as_str(), to.as_str()]
            }
            Operation::Search { root, .. } => vec![root.as_str()],
            Operation::List { path, .. }
            | Operation::Read { path, .. }
            | Operation::Write { path, .. }
            | Operation::CreateDirectory { path, .. }
            | Operation::Delete { path, .. }
            | Operation::Exists { path, .. }
            | Operation::Stat { path, .. }
            | Operation::ResolveUrl { path, .. }
            | Operation::Touch { path, .. }
            | Operation::Download { path, .. } => vec![path.as_str()],
        }
    }
}

/// Result of a dispatched operation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Entries(Vec<FileRecord>),
    Payload(Payload),
    Written(i64),
    Bool(bool),
    Record(FileRecord),
    Url(Option<String>),
    Download(Download),
}

fn mismatch(expected: &str, got: &OperationResult) -> VfsError {
    VfsError::other(format!("expected {expected} result, got {got:?}"))
}

impl OperationResult {
    pub fn into_entries(self) -> VfsResult<Vec<FileRecord>> {
        match self {
            OperationResult::Entries(entries) => Ok(entries),
            other => Err(mismatch("entries", &other)),
        }
    }

    pub fn into_payload(self) -> VfsResult<Payload> {
        match self {
            OperationResult::Payload(payload) => Ok(payload),
            other => Err(mismatch("payload", &other)),
        }
    }

    pub fn into_written(self) -> VfsResult<i64> {
        match self {
            OperationResult::Written(n) => Ok(n),
            other => Err(mismatch("written", &other)),
        }
    }

    pub fn into_bool(self) -> VfsResult<bool> {
        match self {
            OperationResult::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }

    pub fn into_record(self) -> VfsResult<FileRecord> {
        match self {
            OperationResult::Record(record) => Ok(record),
            other => Err(mismatch("record", &other)),
        }
    }

    pub fn into_url(self) -> VfsResult<Option<String>> {
        match self {
            OperationResult::Url(url) => Ok(url),
            other => Err(mismatch("url", &other)),
        }
    }

    pub fn into_download(self) -> VfsResult<Download> {
        match self {
            OperationResult::Download(download) => Ok(download),
            other => Err(mismatch("download", &other)),
        }
    }

    /// Whether the adapter reported success.
    ///
    /// Booleans report themselves and writes succeed unless they return -1.
    /// Every other result counts as success.
    pub fn is_success(&self) -> bool {
        match self {
            OperationResult::Bool(b) => *b,
            OperationResult::Written(n) => *n >= 0,
            _ => true,
        }
    }
}
