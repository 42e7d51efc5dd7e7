//! VFS error types.

use std::io;
use thiserror::Error;

/// Step of the cross-adapter copy/rename sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStep {
    /// Reading the full source content.
    Read,
    /// Writing the content to the destination.
    Write,
    /// Deleting the source after a successful write (rename only).
    Delete,
}

impl std::fmt::Display for FallbackStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FallbackStep::Read => "read",
            FallbackStep::Write => "write",
            FallbackStep::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    // ========================================================================
    // Resolution errors
    // ========================================================================
    /// Path does not match `prefix:/...`.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// No mountpoint is registered for the path prefix.
    #[error("mountpoint not found for '{0}'")]
    MountpointNotFound(String),

    // ========================================================================
    // State errors
    // ========================================================================
    /// Mount requested on a mounted mountpoint.
    #[error("mountpoint '{0}' already mounted")]
    AlreadyMounted(String),

    /// Unmount requested on an unmounted mountpoint.
    #[error("mountpoint '{0}' not mounted")]
    NotMounted(String),

    /// A mountpoint with the same name, label or root is already registered.
    #[error("duplicate mountpoint: {0}")]
    DuplicateMountpoint(String),

    // ========================================================================
    // Adapter errors
    // ========================================================================
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Backend is read-only.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Path escapes the backend root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Remote endpoint answered with a non-success status.
    #[error("remote error {status}: {message}")]
    Remote { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),

    // ========================================================================
    // Fallback errors
    // ========================================================================
    /// A step of the cross-adapter copy/rename failed. Earlier steps are not
    /// rolled back.
    #[error("cross-adapter {step} failed: {source}")]
    Fallback {
        step: FallbackStep,
        #[source]
        source: Box<VfsError>,
    },
}

impl VfsError {
    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a MountpointNotFound error.
    pub fn mountpoint_not_found(name: impl Into<String>) -> Self {
        Self::MountpointNotFound(name.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create a Decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Wrap the error of a failed cross-adapter step.
    pub fn fallback(step: FallbackStep, source: VfsError) -> Self {
        Self::Fallback {
            step,
            source: Box::new(source),
        }
    }

    /// Path could not be mapped to a mountpoint.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::InvalidPath(_) | Self::MountpointNotFound(_))
    }

    /// Mount state did not allow the requested transition.
    pub fn is_state(&self) -> bool {
        matches!(self, Self::AlreadyMounted(_) | Self::NotMounted(_))
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
