//! VFS event surface.
//!
//! Lifecycle, before/after and watch notifications are published on a
//! broadcast channel. Publishing never blocks and never fails; with no
//! subscribers the event is dropped.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::ops::OperationKind;

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event emitted by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VfsEvent {
    /// About to dispatch an operation.
    Before {
        op: OperationKind,
        paths: Vec<String>,
    },
    /// An operation finished. `ok` is false on errors and on adapter
    /// failure values.
    After {
        op: OperationKind,
        paths: Vec<String>,
        ok: bool,
    },
    Mounted {
        name: String,
    },
    Unmounted {
        name: String,
    },
    MountChanged {
        name: String,
        mounted: bool,
    },
    /// Contents of a directory changed (watch mode only).
    DirectoryChanged {
        path: String,
    },
}

impl VfsEvent {
    /// Event name, e.g. `before:read` or `mountChanged`.
    pub fn name(&self) -> String {
        match self {
            VfsEvent::Before { op, .. } => format!("before:{op}"),
            VfsEvent::After { op, .. } => format!("after:{op}"),
            VfsEvent::Mounted { .. } => "mounted".to_string(),
            VfsEvent::Unmounted { .. } => "unmounted".to_string(),
            VfsEvent::MountChanged { .. } => "mountChanged".to_string(),
            VfsEvent::DirectoryChanged { .. } => "directoryChanged".to_string(),
        }
    }
}

/// Multi-subscriber event channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VfsEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: VfsEvent) -> usize {
        tracing::trace!(event = %event.name(), "vfs event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VfsEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
