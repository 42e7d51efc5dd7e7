//! Mountpoint registry and operation dispatch.
//!
//! [`Filesystem`] owns every mountpoint, resolves `prefix:/path` strings to
//! the owning mountpoint, and routes operations to the bound adapter. A
//! copy or rename between mountpoints that do not share a backend runs as
//! read, write and (for rename) delete.

use futures::future::{join_all, try_join_all};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::adapter::{Adapter, AdapterRegistry};
use crate::config::{MountpointConfig, VfsConfig, dedupe_mountpoints};
use crate::error::{FallbackStep, VfsError, VfsResult};
use crate::events::{EventBus, VfsEvent};
use crate::mountpoint::{Identity, MountInfo, Mountpoint, groups_permit};
use crate::ops::{Operation, OperationKind, OperationResult};
use crate::path;
use crate::transform::{convert_payload, normalize_listing, sort_entries};
use crate::types::{ListOptions, Options, Representation};

/// The VFS mount registry.
pub struct Filesystem {
    config: VfsConfig,
    adapters: AdapterRegistry,
    mountpoints: RwLock<Vec<Arc<Mountpoint>>>,
    identity: RwLock<Identity>,
    events: EventBus,
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .mountpoints
            .read()
            .iter()
            .map(|mp| mp.name().to_string())
            .collect();
        f.debug_struct("Filesystem")
            .field("mountpoints", &names)
            .field("adapters", &self.adapters)
            .field("watch", &self.config.watch)
            .finish()
    }
}

impl Filesystem {
    /// Create a registry. Nothing is mounted until [`Filesystem::mount_all`]
    /// or [`Filesystem::add_mountpoint`] runs.
    pub fn new(config: VfsConfig, adapters: AdapterRegistry) -> Self {
        Self {
            config,
            adapters,
            mountpoints: RwLock::new(Vec::new()),
            identity: RwLock::new(Identity::default()),
            events: EventBus::default(),
        }
    }

    /// Set the identity used to filter [`Filesystem::get_mounts`].
    pub fn with_identity(self, identity: Identity) -> Self {
        *self.identity.write() = identity;
        self
    }

    pub fn set_identity(&self, identity: Identity) {
        *self.identity.write() = identity;
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    /// Subscribe to lifecycle, operation and watch events.
    pub fn subscribe(&self) -> broadcast::Receiver<VfsEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Mount lifecycle
    // ========================================================================

    /// Build every configured mountpoint and mount them concurrently.
    ///
    /// Configured entries whose label or root repeats an earlier one are
    /// dropped. Mountpoints added with [`Filesystem::add_mountpoint`] survive
    /// unless a configured entry collides with them. On a repeat call the
    /// previous instances are unmounted and replaced, so in-process backends
    /// start empty. With `stop_on_error`
    /// the first failure is returned; otherwise failures are logged and the
    /// remaining mountpoints are still mounted.
    #[tracing::instrument(skip(self), name = "vfs.mount_all")]
    pub async fn mount_all(&self, stop_on_error: bool) -> VfsResult<()> {
        let configs = dedupe_mountpoints(&self.config.mountpoints);

        let mut built = Vec::with_capacity(configs.len());
        for config in &configs {
            match self.adapters.build(config) {
                Ok(binding) => built.push(Arc::new(Mountpoint::new(config, binding))),
                Err(e) if stop_on_error => return Err(e),
                Err(e) => {
                    tracing::warn!(mountpoint = %config.name, error = %e, "skipping mountpoint");
                }
            }
        }

        let replaced: Vec<Arc<Mountpoint>> = {
            let mut mountpoints = self.mountpoints.write();
            let (replaced, mut kept): (Vec<_>, Vec<_>) =
                mountpoints.drain(..).partition(|existing| {
                    configs.iter().any(|config| existing.collides_with(config))
                });
            let mut all = built.clone();
            all.append(&mut kept);
            *mountpoints = all;
            replaced
        };

        for mp in replaced.into_iter().filter(|mp| mp.is_mounted()) {
            if let Err(e) = self.unmount_point(&mp).await {
                tracing::warn!(mountpoint = %mp.name(), error = %e, "unmount of replaced mountpoint failed");
            }
        }

        let mounts = built.iter().map(|mp| self.mount_point(Arc::clone(mp)));
        if stop_on_error {
            try_join_all(mounts).await?;
        } else {
            for (mp, result) in built.iter().zip(join_all(mounts).await) {
                if let Err(e) = result {
                    tracing::warn!(mountpoint = %mp.name(), error = %e, "mount failed");
                }
            }
        }

        tracing::info!(count = built.len(), "mountpoints initialized");
        Ok(())
    }

    /// Register a mountpoint built in code.
    ///
    /// Fails if its name, label or root is already taken.
    #[tracing::instrument(skip(self, config), fields(mountpoint = %config.name))]
    pub async fn add_mountpoint(
        &self,
        config: MountpointConfig,
        automount: bool,
    ) -> VfsResult<MountInfo> {
        let binding = self.adapters.build(&config)?;
        let mp = Arc::new(Mountpoint::new(&config, binding));

        {
            let mut mountpoints = self.mountpoints.write();
            if mountpoints.iter().any(|existing| existing.collides_with(&config)) {
                return Err(VfsError::DuplicateMountpoint(config.name));
            }
            mountpoints.push(Arc::clone(&mp));
        }

        if automount {
            self.mount_point(Arc::clone(&mp)).await?;
        }
        Ok(mp.info())
    }

    /// Mount a registered mountpoint by name.
    #[tracing::instrument(skip(self), name = "vfs.mount")]
    pub async fn mount(&self, name: &str) -> VfsResult<()> {
        let mp = self
            .get_mountpoint(name)
            .ok_or_else(|| VfsError::mountpoint_not_found(name))?;
        if mp.is_mounted() {
            return Err(VfsError::AlreadyMounted(name.to_string()));
        }
        self.mount_point(mp).await
    }

    /// Unmount a registered mountpoint by name.
    #[tracing::instrument(skip(self), name = "vfs.unmount")]
    pub async fn unmount(&self, name: &str) -> VfsResult<()> {
        let mp = self
            .get_mountpoint(name)
            .ok_or_else(|| VfsError::mountpoint_not_found(name))?;
        if !mp.is_mounted() {
            return Err(VfsError::NotMounted(name.to_string()));
        }
        self.unmount_point(&mp).await
    }

    async fn unmount_point(&self, mp: &Mountpoint) -> VfsResult<()> {
        mp.adapter().unmount(&mp.info()).await?;
        mp.set_mounted(false);
        tracing::info!(mountpoint = %mp.name(), "unmounted");
        self.events.publish(VfsEvent::Unmounted {
            name: mp.name().to_string(),
        });
        self.events.publish(VfsEvent::MountChanged {
            name: mp.name().to_string(),
            mounted: false,
        });
        Ok(())
    }

    async fn mount_point(&self, mp: Arc<Mountpoint>) -> VfsResult<()> {
        mp.adapter().mount(&mp.info()).await?;
        mp.set_mounted(true);
        tracing::info!(mountpoint = %mp.name(), adapter = %mp.adapter_kind(), "mounted");
        self.events.publish(VfsEvent::Mounted {
            name: mp.name().to_string(),
        });
        self.events.publish(VfsEvent::MountChanged {
            name: mp.name().to_string(),
            mounted: true,
        });
        Ok(())
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Registered mountpoint by name.
    pub fn get_mountpoint(&self, name: &str) -> Option<Arc<Mountpoint>> {
        self.mountpoints
            .read()
            .iter()
            .find(|mp| mp.name() == name)
            .cloned()
    }

    /// Resolve a path (or anything carrying one, like a file record) to its
    /// mountpoint.
    ///
    /// Resolution does not look at the mounted state.
    pub fn get_mountpoint_from_path(&self, path: impl AsRef<str>) -> VfsResult<Arc<Mountpoint>> {
        let path = path.as_ref();
        let prefix =
            path::parse_mount_prefix(path).ok_or_else(|| VfsError::invalid_path(path))?;
        self.get_mountpoint(prefix)
            .ok_or_else(|| VfsError::mountpoint_not_found(prefix))
    }

    /// Mountpoints visible to the current identity.
    ///
    /// Disabled mountpoints are never listed; unmounted ones only when
    /// `include_unmounted` is set.
    pub fn get_mounts(&self, include_unmounted: bool) -> Vec<MountInfo> {
        let identity = self.identity.read().clone();
        self.mountpoints
            .read()
            .iter()
            .filter(|mp| include_unmounted || mp.is_mounted())
            .filter(|mp| mp.enabled())
            .filter(|mp| {
                let attrs = mp.attributes();
                groups_permit(&identity.groups, attrs.groups.as_deref(), attrs.strict_groups)
            })
            .map(|mp| mp.info())
            .collect()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Run one operation.
    ///
    /// Paths are resolved before anything else happens, so resolution
    /// errors emit no events and reach no adapter.
    #[tracing::instrument(skip(self, op), fields(op = %op.kind()))]
    pub async fn dispatch(&self, op: Operation) -> VfsResult<OperationResult> {
        let kind = op.kind();
        let paths: Vec<String> = op.paths().into_iter().map(String::from).collect();
        let mut mounts = Vec::with_capacity(paths.len());
        for p in &paths {
            mounts.push(self.get_mountpoint_from_path(p)?);
        }
        let source = Arc::clone(&mounts[0]);
        let target = if kind.is_transfer() {
            Arc::clone(&mounts[1])
        } else {
            Arc::clone(&source)
        };

        if kind.is_mutating() {
            let read_only = if kind == OperationKind::Rename {
                mounts.iter().find(|mp| mp.attributes().read_only)
            } else {
                Some(&target).filter(|mp| mp.attributes().read_only)
            };
            if let Some(mp) = read_only {
                tracing::debug!(mountpoint = %mp.name(), "rejecting write to read-only mountpoint");
                return Err(VfsError::ReadOnly);
            }
        }

        tracing::debug!(?paths, mountpoint = %source.name(), "dispatch");
        self.events.publish(VfsEvent::Before {
            op: kind,
            paths: paths.clone(),
        });

        let result = self.route(op, &source, &target).await;
        let ok = result.as_ref().is_ok_and(OperationResult::is_success);

        self.events.publish(VfsEvent::After {
            op: kind,
            paths: paths.clone(),
            ok,
        });
        if ok && kind.is_mutating() && self.config.watch {
            self.notify_changed(kind, &paths);
        }

        if let Err(e) = &result {
            tracing::debug!(error = %e, "operation failed");
        }
        result
    }

    async fn route(
        &self,
        op: Operation,
        source: &Mountpoint,
        target: &Mountpoint,
    ) -> VfsResult<OperationResult> {
        let adapter = source.adapter();
        Ok(match op {
            Operation::List { path, options } => {
                let entries = adapter.list(&path, &options).await?;
                OperationResult::Entries(normalize_listing(&path, entries, &options))
            }
            Operation::Read {
                path,
                representation,
                options,
            } => {
                let raw = adapter.read_bytes(&path, representation, &options).await?;
                OperationResult::Payload(convert_payload(raw, representation))
            }
            Operation::Write {
                path,
                data,
                options,
            } => OperationResult::Written(adapter.write_bytes(&path, data, &options).await?),
            Operation::Copy { from, to, options } => {
                self.transfer(OperationKind::Copy, source, target, &from, &to, &options)
                    .await?
            }
            Operation::Rename { from, to, options } => {
                self.transfer(OperationKind::Rename, source, target, &from, &to, &options)
                    .await?
            }
            Operation::CreateDirectory { path, options } => {
                OperationResult::Bool(adapter.create_directory(&path, &options).await?)
            }
            Operation::Delete { path, options } => {
                OperationResult::Bool(adapter.delete(&path, &options).await?)
            }
            Operation::Exists { path, options } => {
                OperationResult::Bool(adapter.exists(&path, &options).await?)
            }
            Operation::Stat { path, options } => {
                OperationResult::Record(adapter.stat(&path, &options).await?)
            }
            Operation::ResolveUrl { path, options } => {
                OperationResult::Url(adapter.resolve_url(&path, &options).await?)
            }
            Operation::Search {
                root,
                pattern,
                options,
            } => {
                if !source.attributes().searchable {
                    tracing::debug!(mountpoint = %source.name(), "mountpoint not searchable");
                    return Ok(OperationResult::Entries(Vec::new()));
                }
                let entries = adapter.search(&root, &pattern, &options).await?;
                let options = ListOptions {
                    show_hidden: true,
                    ..options
                };
                OperationResult::Entries(sort_entries(entries, &options))
            }
            Operation::Touch { path, options } => {
                OperationResult::Bool(adapter.touch(&path, &options).await?)
            }
            Operation::Download { path, options } => {
                OperationResult::Download(adapter.download(&path, &options).await?)
            }
        })
    }

    /// Copy or rename between two mountpoints.
    ///
    /// Mountpoints sharing a backend delegate to the source adapter.
    /// Otherwise the source is read in full, written to the destination
    /// and, for rename, deleted. Steps run in order and stop at the first
    /// failure; completed steps are not undone.
    async fn transfer(
        &self,
        kind: OperationKind,
        source: &Mountpoint,
        target: &Mountpoint,
        from: &str,
        to: &str,
        options: &Options,
    ) -> VfsResult<OperationResult> {
        let same_mount = source.name() == target.name();
        let native = source.adapter_kind() == target.adapter_kind()
            && (same_mount || source.adapter().shared_backend());

        if native {
            let ok = match kind {
                OperationKind::Rename => source.adapter().rename(from, to, options).await?,
                _ => source.adapter().copy(from, to, options).await?,
            };
            return Ok(OperationResult::Bool(ok));
        }

        tracing::debug!(
            from = %from,
            to = %to,
            source = %source.adapter_kind(),
            target = %target.adapter_kind(),
            "cross-adapter {kind}"
        );

        let raw = source
            .adapter()
            .read_bytes(from, Representation::Binary, options)
            .await
            .map_err(|e| VfsError::fallback(FallbackStep::Read, e))?;

        let written = target
            .adapter()
            .write_bytes(to, raw.bytes, options)
            .await
            .map_err(|e| VfsError::fallback(FallbackStep::Write, e))?;
        if written < 0 {
            return Err(VfsError::fallback(
                FallbackStep::Write,
                VfsError::other(format!("{to}: write rejected")),
            ));
        }

        if kind == OperationKind::Rename {
            let deleted = source
                .adapter()
                .delete(from, options)
                .await
                .map_err(|e| VfsError::fallback(FallbackStep::Delete, e))?;
            if !deleted {
                return Err(VfsError::fallback(
                    FallbackStep::Delete,
                    VfsError::other(format!("{from}: delete rejected")),
                ));
            }
        }

        Ok(OperationResult::Bool(true))
    }

    fn notify_changed(&self, kind: OperationKind, paths: &[String]) {
        let mut dirs: Vec<String> = Vec::with_capacity(2);
        let touched: &[String] = match kind {
            OperationKind::Copy => &paths[paths.len() - 1..],
            _ => paths,
        };
        // Destination first for rename
        for p in touched.iter().rev() {
            let dir = path::parent_directory(p);
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        for dir in dirs {
            self.events.publish(VfsEvent::DirectoryChanged { path: dir });
        }
    }
}
