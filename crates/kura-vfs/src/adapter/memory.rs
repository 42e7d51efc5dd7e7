//! In-memory adapter.
//!
//! Used for scratch mountpoints and testing. All data is ephemeral.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::SystemTime;

use super::{Adapter, full_path, search_matcher};
use crate::error::{VfsError, VfsResult};
use crate::path;
use crate::transform::mime_for_filename;
use crate::types::{FileRecord, ListOptions, Options, RawPayload, Representation};

/// Entry in the memory tree.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, mtime: SystemTime },
    Directory { mtime: SystemTime },
}

impl Entry {
    fn directory() -> Self {
        Entry::Directory {
            mtime: SystemTime::now(),
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory { .. })
    }
}

/// In-memory adapter.
///
/// Entries are keyed by mount-relative path (`/a/b`). Thread-safe via an
/// internal `RwLock`; all data is lost when dropped.
#[derive(Debug)]
pub struct MemoryAdapter {
    entries: RwLock<BTreeMap<String, Entry>>,
    read_only: bool,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    /// Create an empty tree.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        // Root directory always exists
        entries.insert("/".to_string(), Entry::directory());
        Self {
            entries: RwLock::new(entries),
            read_only: false,
        }
    }

    /// Create an empty tree that rejects every mutation.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::new()
        }
    }

    /// Seed a file, bypassing the read-only flag.
    pub fn with_file(self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        let key = Self::normalize(path);
        if let Ok(mut entries) = self.entries.write() {
            Self::ensure_parents(&mut entries, &key);
            entries.insert(
                key,
                Entry::File {
                    data: data.into(),
                    mtime: SystemTime::now(),
                },
            );
        }
        self
    }

    /// Normalize a VFS path to a key: strip the prefix, resolve `.`/`..`.
    fn normalize(path: &str) -> String {
        let relative = path::relative_path(path);
        let mut parts: Vec<&str> = Vec::new();
        for segment in relative.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                s => parts.push(s),
            }
        }
        format!("/{}", parts.join("/"))
    }

    fn parent_key(key: &str) -> Option<&str> {
        if key == "/" {
            return None;
        }
        match key.rfind('/') {
            Some(0) => Some("/"),
            Some(idx) => Some(&key[..idx]),
            None => None,
        }
    }

    fn is_within(key: &str, root: &str) -> bool {
        root == "/" || key == root || key.starts_with(&format!("{root}/"))
    }

    /// Ensure all parent directories exist.
    fn ensure_parents(entries: &mut BTreeMap<String, Entry>, key: &str) {
        let mut current = String::new();
        let parent = Self::parent_key(key).unwrap_or("/");
        for segment in parent.split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            entries
                .entry(current.clone())
                .or_insert_with(Entry::directory);
        }
    }

    /// Check if write operations are allowed.
    fn check_writable(&self) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn read_lock(
        &self,
    ) -> VfsResult<std::sync::RwLockReadGuard<'_, BTreeMap<String, Entry>>> {
        self.entries
            .read()
            .map_err(|_| VfsError::other("lock poisoned"))
    }

    fn write_lock(
        &self,
    ) -> VfsResult<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Entry>>> {
        self.entries
            .write()
            .map_err(|_| VfsError::other("lock poisoned"))
    }

    fn record(reference: &str, key: &str, entry: &Entry) -> FileRecord {
        let path = full_path(reference, key);
        match entry {
            Entry::File { data, mtime } => {
                let record = FileRecord::file(path, data.len() as u64).with_mtime(*mtime);
                let mime = mime_for_filename(&record.filename);
                record.with_mime(mime)
            }
            Entry::Directory { mtime } => FileRecord::directory(path).with_mtime(*mtime),
        }
    }

    /// Copy (or move) the subtree at `from` to `to`.
    fn transfer(&self, from: &str, to: &str, remove_source: bool) -> VfsResult<bool> {
        self.check_writable()?;
        let from = Self::normalize(from);
        let to = Self::normalize(to);
        if from == "/" {
            return Err(VfsError::PermissionDenied("cannot move the root".into()));
        }
        if Self::is_within(&to, &from) {
            return Err(VfsError::invalid_path(format!("{to} is inside {from}")));
        }

        let mut entries = self.write_lock()?;
        if !entries.contains_key(&from) {
            return Err(VfsError::not_found(from));
        }

        let moved: Vec<(String, Entry)> = entries
            .iter()
            .filter(|(key, _)| Self::is_within(key, &from))
            .map(|(key, entry)| (format!("{to}{}", &key[from.len()..]), entry.clone()))
            .collect();

        if remove_source {
            entries.retain(|key, _| !Self::is_within(key, &from));
        }
        Self::ensure_parents(&mut entries, &to);
        entries.retain(|key, _| !Self::is_within(key, &to));
        entries.extend(moved);
        Ok(true)
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn list(&self, path: &str, _options: &ListOptions) -> VfsResult<Vec<FileRecord>> {
        let key = Self::normalize(path);
        let entries = self.read_lock()?;

        match entries.get(&key) {
            Some(entry) if entry.is_dir() => {}
            Some(_) => return Err(VfsError::not_a_directory(key)),
            None => return Err(VfsError::not_found(key)),
        }

        Ok(entries
            .iter()
            .filter(|(child, _)| Self::parent_key(child) == Some(key.as_str()))
            .map(|(child, entry)| Self::record(path, child, entry))
            .collect())
    }

    async fn read_bytes(
        &self,
        path: &str,
        _representation: Representation,
        _options: &Options,
    ) -> VfsResult<RawPayload> {
        let key = Self::normalize(path);
        let entries = self.read_lock()?;
        match entries.get(&key) {
            Some(Entry::File { data, .. }) => Ok(RawPayload::new(
                mime_for_filename(path::basename(&key)),
                data.clone(),
            )),
            Some(Entry::Directory { .. }) => Err(VfsError::is_a_directory(key)),
            None => Err(VfsError::not_found(key)),
        }
    }

    async fn write_bytes(&self, path: &str, data: Vec<u8>, _options: &Options) -> VfsResult<i64> {
        self.check_writable()?;
        let key = Self::normalize(path);
        let mut entries = self.write_lock()?;
        if entries.get(&key).is_some_and(Entry::is_dir) {
            return Err(VfsError::is_a_directory(key));
        }

        Self::ensure_parents(&mut entries, &key);
        let len = data.len() as i64;
        entries.insert(
            key,
            Entry::File {
                data,
                mtime: SystemTime::now(),
            },
        );
        Ok(len)
    }

    async fn copy(&self, from: &str, to: &str, _options: &Options) -> VfsResult<bool> {
        self.transfer(from, to, false)
    }

    async fn rename(&self, from: &str, to: &str, _options: &Options) -> VfsResult<bool> {
        self.transfer(from, to, true)
    }

    async fn create_directory(&self, path: &str, _options: &Options) -> VfsResult<bool> {
        self.check_writable()?;
        let key = Self::normalize(path);
        let mut entries = self.write_lock()?;
        if entries.contains_key(&key) {
            return Err(VfsError::already_exists(key));
        }
        Self::ensure_parents(&mut entries, &key);
        entries.insert(key, Entry::directory());
        Ok(true)
    }

    async fn delete(&self, path: &str, _options: &Options) -> VfsResult<bool> {
        self.check_writable()?;
        let key = Self::normalize(path);
        if key == "/" {
            return Err(VfsError::PermissionDenied("cannot delete the root".into()));
        }
        let mut entries = self.write_lock()?;
        if !entries.contains_key(&key) {
            return Err(VfsError::not_found(key));
        }
        entries.retain(|k, _| !Self::is_within(k, &key));
        Ok(true)
    }

    async fn exists(&self, path: &str, _options: &Options) -> VfsResult<bool> {
        let key = Self::normalize(path);
        Ok(self.read_lock()?.contains_key(&key))
    }

    async fn stat(&self, path: &str, _options: &Options) -> VfsResult<FileRecord> {
        let key = Self::normalize(path);
        let entries = self.read_lock()?;
        entries
            .get(&key)
            .map(|entry| Self::record(path, &key, entry))
            .ok_or_else(|| VfsError::not_found(key))
    }

    async fn search(
        &self,
        root: &str,
        pattern: &str,
        _options: &ListOptions,
    ) -> VfsResult<Vec<FileRecord>> {
        let matcher = search_matcher(pattern)?;
        let key = Self::normalize(root);
        let entries = self.read_lock()?;
        Ok(entries
            .iter()
            .filter(|(child, _)| child.as_str() != key && Self::is_within(child, &key))
            .filter(|(child, _)| matcher.is_match(path::basename(child)))
            .map(|(child, entry)| Self::record(root, child, entry))
            .collect())
    }

    async fn touch(&self, path: &str, _options: &Options) -> VfsResult<bool> {
        self.check_writable()?;
        let key = Self::normalize(path);
        let mut entries = self.write_lock()?;
        let now = SystemTime::now();
        match entries.get_mut(&key) {
            Some(Entry::File { mtime, .. }) | Some(Entry::Directory { mtime }) => *mtime = now,
            None => {
                Self::ensure_parents(&mut entries, &key);
                entries.insert(
                    key,
                    Entry::File {
                        data: Vec::new(),
                        mtime: now,
                    },
                );
            }
        }
        Ok(true)
    }

    fn shared_backend(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> Options {
        Options::new()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let fs = MemoryAdapter::new();
        assert_eq!(fs.write_bytes("mem:/a/b.txt", b"hello".to_vec(), &opts()).await.unwrap(), 5);

        let raw = fs
            .read_bytes("mem:/a/b.txt", Representation::Binary, &opts())
            .await
            .unwrap();
        assert_eq!(raw.bytes, b"hello");
        assert_eq!(raw.mime, "text/plain");

        // Parent was created implicitly
        let stat = fs.stat("mem:/a", &opts()).await.unwrap();
        assert!(stat.is_directory);
        assert_eq!(stat.path, "mem:/a");
    }

    #[tokio::test]
    async fn test_list_direct_children() {
        let fs = MemoryAdapter::new()
            .with_file("mem:/top.txt", "1")
            .with_file("mem:/dir/inner.txt", "22")
            .with_file("mem:/dir/deep/x.txt", "333");

        let root = fs.list("mem:/", &ListOptions::new()).await.unwrap();
        let names: Vec<_> = root.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["dir", "top.txt"]);

        let dir = fs.list("mem:/dir", &ListOptions::new()).await.unwrap();
        let paths: Vec<_> = dir.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["mem:/dir/deep", "mem:/dir/inner.txt"]);

        let err = fs.list("mem:/top.txt", &ListOptions::new()).await.unwrap_err();
        assert!(matches!(err, VfsError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_copy_and_rename_subtree() {
        let fs = MemoryAdapter::new()
            .with_file("mem:/src/a.txt", "a")
            .with_file("mem:/src/sub/b.txt", "b");

        assert!(fs.copy("mem:/src", "mem:/copy", &opts()).await.unwrap());
        assert!(fs.exists("mem:/copy/sub/b.txt", &opts()).await.unwrap());
        assert!(fs.exists("mem:/src/a.txt", &opts()).await.unwrap());

        assert!(fs.rename("mem:/src", "mem:/moved/here", &opts()).await.unwrap());
        assert!(!fs.exists("mem:/src", &opts()).await.unwrap());
        assert!(!fs.exists("mem:/src/sub/b.txt", &opts()).await.unwrap());
        assert!(fs.exists("mem:/moved/here/sub/b.txt", &opts()).await.unwrap());

        let err = fs.rename("mem:/copy", "mem:/copy/inside", &opts()).await.unwrap_err();
        assert!(matches!(err, VfsError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn test_mkdir_delete_touch() {
        let fs = MemoryAdapter::new();
        assert!(fs.create_directory("mem:/d", &opts()).await.unwrap());
        assert!(matches!(
            fs.create_directory("mem:/d", &opts()).await,
            Err(VfsError::AlreadyExists(_))
        ));

        assert!(fs.touch("mem:/d/empty", &opts()).await.unwrap());
        assert_eq!(fs.stat("mem:/d/empty", &opts()).await.unwrap().size, 0);

        assert!(fs.delete("mem:/d", &opts()).await.unwrap());
        assert!(!fs.exists("mem:/d/empty", &opts()).await.unwrap());
        assert!(matches!(
            fs.delete("mem:/d", &opts()).await,
            Err(VfsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search() {
        let fs = MemoryAdapter::new()
            .with_file("mem:/notes.md", "")
            .with_file("mem:/work/Notes-2024.md", "")
            .with_file("mem:/work/todo.txt", "");

        let found = fs.search("mem:/", "notes", &ListOptions::new()).await.unwrap();
        let paths: Vec<_> = found.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["mem:/notes.md", "mem:/work/Notes-2024.md"]);

        let found = fs.search("mem:/work", "*.txt", &ListOptions::new()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "todo.txt");
    }

    #[tokio::test]
    async fn test_read_only() {
        let fs = MemoryAdapter::read_only().with_file("mem:/a.txt", "seed");
        assert!(matches!(
            fs.write_bytes("mem:/b.txt", vec![], &opts()).await,
            Err(VfsError::ReadOnly)
        ));
        assert!(matches!(fs.delete("mem:/a.txt", &opts()).await, Err(VfsError::ReadOnly)));
        let raw = fs
            .read_bytes("mem:/a.txt", Representation::Text, &opts())
            .await
            .unwrap();
        assert_eq!(raw.bytes, b"seed");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(MemoryAdapter::normalize("mem:/"), "/");
        assert_eq!(MemoryAdapter::normalize("mem://a/./b/../c/"), "/a/c");
        assert_eq!(MemoryAdapter::normalize("mem:/../.."), "/");
    }
}
