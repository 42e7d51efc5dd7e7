//! Core VFS value types.
//!
//! These types cross the adapter boundary, so they serialize to the same
//! camelCase JSON shape remote endpoints speak.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use strum::EnumString;

use crate::path;

/// Free-form per-call options forwarded to adapters untouched.
pub type Options = serde_json::Map<String, serde_json::Value>;

/// MIME used whenever a backend does not report one.
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Milliseconds since the Unix epoch.
pub fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Normalized metadata for a file or directory entry.
///
/// Exactly one of `is_directory` / `is_file` is true for records built by
/// the constructors; records decoded from remote JSON go through
/// [`FileRecord::with_consistent_kind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Full namespaced path (`home:/a/b.txt`).
    pub path: String,
    /// Last path segment.
    pub filename: String,
    /// MIME type, if known.
    #[serde(default)]
    pub mime: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub is_file: bool,
    /// Backend-specific metadata, opaque to the VFS.
    #[serde(default)]
    pub stat: serde_json::Value,
    /// Modification time in epoch milliseconds.
    #[serde(default)]
    pub mtime: Option<u64>,
    /// Creation time in epoch milliseconds.
    #[serde(default)]
    pub ctime: Option<u64>,
    /// Access time in epoch milliseconds.
    #[serde(default)]
    pub atime: Option<u64>,
    /// Human-readable size, filled in by listing normalization.
    #[serde(default)]
    pub human_size: String,
}

impl FileRecord {
    fn new(path: impl Into<String>, is_directory: bool) -> Self {
        let path = path.into();
        let filename = path::basename(&path).to_string();
        Self {
            path,
            filename,
            mime: None,
            size: 0,
            is_directory,
            is_file: !is_directory,
            stat: serde_json::Value::Null,
            mtime: None,
            ctime: None,
            atime: None,
            human_size: String::new(),
        }
    }

    /// Record for a regular file.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        let mut record = Self::new(path, false);
        record.size = size;
        record
    }

    /// Record for a directory.
    pub fn directory(path: impl Into<String>) -> Self {
        Self::new(path, true)
    }

    /// The empty record returned by adapters that know nothing about a path.
    pub fn empty(path: impl Into<String>) -> Self {
        Self::file(path, 0)
    }

    /// Synthesized `..` entry pointing at `parent`.
    pub fn parent_entry(parent: impl Into<String>) -> Self {
        let mut record = Self::directory(parent);
        record.filename = "..".to_string();
        record
    }

    /// Set the MIME type.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Set the modification time.
    pub fn with_mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = Some(epoch_millis(mtime));
        self
    }

    /// Set the backend metadata blob.
    pub fn with_stat(mut self, stat: serde_json::Value) -> Self {
        self.stat = stat;
        self
    }

    /// Force the directory/file flags to be mutually exclusive.
    ///
    /// A record claiming to be a directory wins; anything else is a file.
    /// A missing filename is derived from the path.
    pub fn with_consistent_kind(mut self) -> Self {
        self.is_file = !self.is_directory;
        if self.filename.is_empty() {
            self.filename = path::basename(&self.path).to_string();
        }
        self
    }
}

impl AsRef<str> for FileRecord {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

/// Listing sort key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum SortBy {
    #[default]
    Filename,
    Mime,
    Size,
    Mtime,
    Ctime,
    Atime,
}

/// How two records are compared for a given [`SortBy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortStrategy {
    /// String comparison.
    Lexicographic,
    /// Timestamp comparison; unknown times sort first.
    Date,
    /// Plain ordering of the raw value.
    Generic,
}

impl SortBy {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// The comparison strategy for this key.
    pub fn strategy(&self) -> SortStrategy {
        match self {
            SortBy::Filename | SortBy::Mime => SortStrategy::Lexicographic,
            SortBy::Mtime | SortBy::Ctime | SortBy::Atime => SortStrategy::Date,
            SortBy::Size => SortStrategy::Generic,
        }
    }
}

/// Listing sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Caller-supplied listing predicate.
pub type EntryFilter = Arc<dyn Fn(&FileRecord) -> bool + Send + Sync>;

/// Options for `list` and `search`.
#[derive(Clone, Default)]
pub struct ListOptions {
    /// Include entries whose name starts with `.`.
    pub show_hidden: bool,
    pub sort_by: SortBy,
    pub sort_dir: SortDirection,
    /// Extra predicate applied after the hidden-entry filter.
    pub filter: Option<EntryFilter>,
    /// Options forwarded to the adapter.
    pub extra: Options,
}

impl std::fmt::Debug for ListOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListOptions")
            .field("show_hidden", &self.show_hidden)
            .field("sort_by", &self.sort_by)
            .field("sort_dir", &self.sort_dir)
            .field("filter", &self.filter.as_ref().map(|_| "<fn>"))
            .field("extra", &self.extra)
            .finish()
    }
}

impl ListOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include hidden entries.
    pub fn with_hidden(mut self, show_hidden: bool) -> Self {
        self.show_hidden = show_hidden;
        self
    }

    /// Sort by the given key and direction.
    pub fn sorted(mut self, sort_by: SortBy, sort_dir: SortDirection) -> Self {
        self.sort_by = sort_by;
        self.sort_dir = sort_dir;
        self
    }

    /// Keep only entries matching `filter`.
    pub fn with_filter(
        mut self,
        filter: impl Fn(&FileRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }
}

/// Target representation for `read`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Representation {
    /// UTF-8 text (lossy).
    #[strum(serialize = "text", serialize = "string")]
    Text,
    /// `data:<mime>;base64,...`
    #[strum(serialize = "uri", serialize = "datauri")]
    DataUri,
    /// Bytes tagged with their MIME.
    Blob,
    /// Raw bytes, unchanged.
    #[default]
    #[strum(serialize = "binary", serialize = "arraybuffer")]
    Binary,
}

impl Representation {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }
}

/// Raw bytes as returned by an adapter, before conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl RawPayload {
    /// Create a payload.
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Zero-length payload with the default MIME.
    pub fn empty() -> Self {
        Self::new(DEFAULT_MIME, Vec::new())
    }
}

/// Payload converted to the caller's requested representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    DataUri(String),
    Blob { mime: String, bytes: Vec<u8> },
    Binary(Vec<u8>),
}

impl Payload {
    /// Raw bytes for any representation. Data URIs yield their text form.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Text(s) | Payload::DataUri(s) => s.into_bytes(),
            Payload::Blob { bytes, .. } | Payload::Binary(bytes) => bytes,
        }
    }
}

/// Result of `download`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    /// The backend serves the file itself.
    Url(String),
    /// The caller must save the content.
    Content {
        filename: String,
        mime: String,
        bytes: Vec<u8>,
    },
}
