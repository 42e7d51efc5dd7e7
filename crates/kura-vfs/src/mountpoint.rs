//! Mountpoints and their redacted views.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::adapter::{AdapterBinding, AdapterKind};
use crate::config::{MountAttributes, MountpointConfig};

/// A named root bound to one adapter.
///
/// Everything except the mounted flag is fixed at construction.
#[derive(Debug)]
pub struct Mountpoint {
    name: String,
    label: String,
    root: String,
    icon: Option<String>,
    enabled: bool,
    attributes: MountAttributes,
    adapter: AdapterBinding,
    mounted: AtomicBool,
}

impl Mountpoint {
    /// Bind a configured mountpoint to its adapter. Starts unmounted.
    pub fn new(config: &MountpointConfig, adapter: AdapterBinding) -> Self {
        Self {
            name: config.name.clone(),
            label: config.label().to_string(),
            root: config.root(),
            icon: config.icon.clone(),
            enabled: config.enabled,
            attributes: config.attributes.clone(),
            adapter,
            mounted: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn attributes(&self) -> &MountAttributes {
        &self.attributes
    }

    pub fn adapter_kind(&self) -> &AdapterKind {
        self.adapter.kind()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::Acquire)
    }

    pub(crate) fn adapter(&self) -> &AdapterBinding {
        &self.adapter
    }

    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.mounted.store(mounted, Ordering::Release);
    }

    /// Returns true if `other` would shadow this mountpoint.
    pub(crate) fn collides_with(&self, config: &MountpointConfig) -> bool {
        self.name == config.name || self.label == config.label() || self.root == config.root()
    }

    /// Redacted descriptor, safe to hand to callers and adapters.
    pub fn info(&self) -> MountInfo {
        MountInfo {
            name: self.name.clone(),
            label: self.label.clone(),
            root: self.root.clone(),
            icon: self.icon.clone(),
            adapter: self.adapter.kind().clone(),
            mounted: self.is_mounted(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Public view of a mountpoint without its adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    pub name: String,
    pub label: String,
    pub root: String,
    pub icon: Option<String>,
    pub adapter: AdapterKind,
    pub mounted: bool,
    pub attributes: MountAttributes,
}

#[cfg(test)]
impl MountInfo {
    pub(crate) fn for_test(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: name.to_string(),
            root: crate::path::mount_root(name),
            icon: None,
            adapter: AdapterKind::Null,
            mounted: false,
            attributes: MountAttributes::default(),
        }
    }
}

/// The caller on whose behalf mountpoints are listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub groups: Vec<String>,
}

impl Identity {
    pub fn new(username: impl Into<String>, groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

/// Group check for mountpoint visibility.
///
/// No required groups permits everyone. Strict mode needs every required
/// group, otherwise any one of them suffices.
pub fn groups_permit(user_groups: &[String], required: Option<&[String]>, strict: bool) -> bool {
    let Some(required) = required else {
        return true;
    };
    if required.is_empty() {
        return true;
    }
    if strict {
        required.iter().all(|g| user_groups.contains(g))
    } else {
        required.iter().any(|g| user_groups.contains(g))
    }
}
