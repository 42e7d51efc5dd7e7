//! Mountpoint configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! watch = true
//!
//! [network]
//! base_url = "http://localhost:8000/vfs"
//!
//! [[icons]]
//! pattern = "^text/"
//! icon = "text-x-generic"
//!
//! [[mountpoints]]
//! name = "home"
//! label = "Home"
//! adapter = "system"
//!
//! [[mountpoints]]
//! name = "scratch"
//! adapter = "memory"
//! attributes = { searchable = false }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::adapter::AdapterKind;
use crate::error::{VfsError, VfsResult};
use crate::path;
use crate::transform::FileIconResolver;

/// Who may see a mountpoint in listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Global,
    Restricted,
}

/// Behavioral attributes of a mountpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountAttributes {
    pub visibility: Visibility,
    /// Backed by storage on this host rather than a shared service.
    pub local: bool,
    /// `search` is forwarded to the adapter.
    pub searchable: bool,
    pub read_only: bool,
    /// Groups allowed to see the mountpoint. `None` means everyone.
    pub groups: Option<Vec<String>>,
    /// Require every listed group instead of any one of them.
    pub strict_groups: bool,
}

impl Default for MountAttributes {
    fn default() -> Self {
        Self {
            visibility: Visibility::Global,
            local: true,
            searchable: true,
            read_only: false,
            groups: None,
            strict_groups: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// One configured mountpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountpointConfig {
    /// Path prefix; unique across the registry.
    pub name: String,
    /// Display name, defaults to `name`.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub adapter: AdapterKind,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub attributes: MountAttributes,
    /// Adapter-specific source, e.g. the host directory of a local mount.
    #[serde(default)]
    pub source: Option<String>,
}

impl MountpointConfig {
    pub fn new(name: impl Into<String>, adapter: AdapterKind) -> Self {
        Self {
            name: name.into(),
            label: None,
            adapter,
            icon: None,
            enabled: true,
            attributes: MountAttributes::default(),
            source: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_attributes(mut self, attributes: MountAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Effective display label.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Root path (`name:/`).
    pub fn root(&self) -> String {
        path::mount_root(&self.name)
    }
}

/// Remote endpoint used by the network adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub base_url: String,
}

/// MIME pattern to icon name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconRule {
    pub pattern: String,
    pub icon: String,
}

/// Top-level VFS configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
    /// Emit `DirectoryChanged` events after mutating operations.
    pub watch: bool,
    pub network: Option<NetworkConfig>,
    /// Icon rules, first match wins.
    pub icons: Vec<IconRule>,
    pub mountpoints: Vec<MountpointConfig>,
}

impl VfsConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> VfsResult<Self> {
        toml::from_str(s).map_err(|e| VfsError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> VfsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| VfsError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// `$XDG_CONFIG_HOME/kura/vfs.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kura").join("vfs.toml"))
    }

    /// Build the icon resolver for the configured rules.
    pub fn icon_resolver(&self) -> VfsResult<FileIconResolver> {
        FileIconResolver::new(
            self.icons
                .iter()
                .map(|rule| (rule.pattern.as_str(), rule.icon.as_str())),
        )
    }
}

/// Drop mountpoints whose label or root collides with an earlier entry.
///
/// The first occurrence wins; every dropped entry is logged.
pub fn dedupe_mountpoints(configs: &[MountpointConfig]) -> Vec<MountpointConfig> {
    let mut labels = HashSet::new();
    let mut roots = HashSet::new();
    let mut kept = Vec::with_capacity(configs.len());

    for config in configs {
        let label = config.label().to_string();
        let root = config.root();
        if labels.contains(&label) || roots.contains(&root) {
            tracing::warn!(
                mountpoint = %config.name,
                label = %label,
                "dropping mountpoint with duplicate label or root"
            );
            continue;
        }
        labels.insert(label);
        roots.insert(root);
        kept.push(config.clone());
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let config = VfsConfig::from_toml_str(
            r#"
            watch = true

            [network]
            base_url = "http://localhost/vfs"

            [[icons]]
            pattern = "^text/"
            icon = "text-x-generic"

            [[mountpoints]]
            name = "home"
            label = "Home"

            [[mountpoints]]
            name = "scratch"
            adapter = "memory"
            enabled = false
            attributes = { searchable = false, groups = ["admin"] }
            "#,
        )
        .unwrap();

        assert!(config.watch);
        assert_eq!(config.network.unwrap().base_url, "http://localhost/vfs");
        assert_eq!(config.icons.len(), 1);

        let home = &config.mountpoints[0];
        assert_eq!(home.adapter, AdapterKind::System);
        assert_eq!(home.label(), "Home");
        assert_eq!(home.root(), "home:/");
        assert!(home.enabled);
        assert!(home.attributes.searchable);
        assert!(home.attributes.strict_groups);

        let scratch = &config.mountpoints[1];
        assert_eq!(scratch.adapter, AdapterKind::Memory);
        assert_eq!(scratch.label(), "scratch");
        assert!(!scratch.enabled);
        assert!(!scratch.attributes.searchable);
        assert!(scratch.attributes.local);
        assert_eq!(scratch.attributes.groups, Some(vec!["admin".to_string()]));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            VfsConfig::from_toml_str("mountpoints = 3"),
            Err(VfsError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("vfs.toml");
        std::fs::write(&file, "[[mountpoints]]\nname = \"a\"\nadapter = \"null\"\n").unwrap();
        let config = VfsConfig::load(&file).unwrap();
        assert_eq!(config.mountpoints[0].adapter, AdapterKind::Null);
        assert!(VfsConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_dedupe_by_label_and_root() {
        let configs = vec![
            MountpointConfig::new("home", AdapterKind::Memory),
            MountpointConfig::new("home", AdapterKind::Null).with_label("Other"),
            MountpointConfig::new("docs", AdapterKind::Memory).with_label("home"),
            MountpointConfig::new("shared", AdapterKind::Memory),
        ];
        let kept = dedupe_mountpoints(&configs);
        let names: Vec<_> = kept.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["home", "shared"]);
        assert_eq!(kept[0].adapter, AdapterKind::Memory);
    }
}
