//! Virtual filesystem mount registry.
//!
//! Storage backends of different kinds sit behind one adapter contract and
//! are addressed through namespaced paths like `home:/docs/a.txt`.
//! Key components:
//!
//! - [`Adapter`] - Per-path operation contract with null-safe defaults
//! - [`Filesystem`] - Mountpoint registry, path resolution and dispatch
//! - [`Vfs`] - One method per operation over the registry
//! - [`NetworkAdapter`] - Forwards operations to a remote endpoint
//! - [`MemoryAdapter`] / [`LocalAdapter`] - In-process backends
//!
//! ## Design Decisions
//!
//! - **Prefix routing**: the text before the first `:` names the
//!   mountpoint; there is no nesting of mounts.
//! - **Best-effort transfers**: copy/rename between unrelated backends is
//!   read, write, then delete, with no rollback.
//! - **Events over a broadcast channel**: lifecycle, before/after and
//!   directory-change notifications go to every subscriber.

pub mod adapter;
pub mod config;
mod error;
pub mod events;
mod facade;
mod mountpoint;
pub mod ops;
pub mod path;
mod registry;
pub mod transform;
mod types;

pub use adapter::{
    Adapter, AdapterBinding, AdapterFactory, AdapterKind, AdapterRegistry, LocalAdapter,
    MemoryAdapter, NetworkAdapter, NullAdapter, Transport,
};
pub use config::{MountAttributes, MountpointConfig, NetworkConfig, VfsConfig, Visibility};
pub use error::{FallbackStep, VfsError, VfsResult};
pub use events::{EventBus, VfsEvent};
pub use facade::Vfs;
pub use mountpoint::{Identity, MountInfo, Mountpoint, groups_permit};
pub use ops::{Operation, OperationKind, OperationResult};
pub use registry::Filesystem;
pub use transform::{FileIconResolver, human_size, normalize_listing};
pub use types::{
    DEFAULT_MIME, Download, EntryFilter, FileRecord, ListOptions, Options, Payload, RawPayload,
    Representation, SortBy, SortDirection, SortStrategy,
};
