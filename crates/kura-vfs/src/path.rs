//! Namespaced path helpers.
//!
//! VFS paths have the form `prefix:/segment/segment`, where `prefix` is the
//! name of the owning mountpoint. All helpers here are pure string
//! functions; none of them touch a backend.

/// Extract the mountpoint prefix of a path.
///
/// Returns `None` unless the path matches `^[^:]+:/`.
pub fn parse_mount_prefix(path: &str) -> Option<&str> {
    let (prefix, rest) = path.split_once(':')?;
    if prefix.is_empty() || !rest.starts_with('/') {
        return None;
    }
    Some(prefix)
}

/// The canonical root path of a mountpoint (`name:/`).
pub fn mount_root(name: &str) -> String {
    format!("{name}:/")
}

/// Collapse runs of `/` into a single slash.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Path relative to its mountpoint, always starting with `/`.
///
/// `home:/a//b/` becomes `/a/b`. The mountpoint root maps to `/`.
pub fn relative_path(path: &str) -> String {
    let rest = match parse_mount_prefix(path) {
        Some(prefix) => &path[prefix.len() + 1..],
        None => path,
    };
    let normalized = normalize_path(rest);
    let trimmed = normalized.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Returns true if the path addresses a mountpoint root (`name:/`).
pub fn is_root(path: &str) -> bool {
    relative_path(path) == "/"
}

/// Parent directory of a path, with a single trailing slash.
///
/// `home:/a/b` becomes `home:/a/`. The parent of a root is the root.
pub fn parent_directory(path: &str) -> String {
    let normalized = normalize_path(path);
    if is_root(&normalized) {
        return match parse_mount_prefix(&normalized) {
            Some(prefix) => mount_root(prefix),
            None => "/".to_string(),
        };
    }

    let trimmed = normalized.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => format!("{}/", &trimmed[..idx]),
        None => "/".to_string(),
    }
}

/// Last segment of a path. Empty for a mountpoint root.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind(['/', ':']) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Join a segment onto a base path.
pub fn path_join(base: &str, segment: &str) -> String {
    let segment = segment.trim_start_matches('/');
    if segment.is_empty() {
        return normalize_path(base);
    }
    normalize_path(&format!("{}/{}", base.trim_end_matches('/'), segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mount_prefix() {
        assert_eq!(parse_mount_prefix("home:/a/b"), Some("home"));
        assert_eq!(parse_mount_prefix("home:/"), Some("home"));
        assert_eq!(parse_mount_prefix("my-mount:/x"), Some("my-mount"));
        assert_eq!(parse_mount_prefix("home:a"), None);
        assert_eq!(parse_mount_prefix(":/a"), None);
        assert_eq!(parse_mount_prefix("/a/b"), None);
        assert_eq!(parse_mount_prefix(""), None);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("home:///a//b/"), "home:/a/b/");
        assert_eq!(normalize_path("home:/a"), "home:/a");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("home:/"), "/");
        assert_eq!(relative_path("home:/a//b/"), "/a/b");
        assert_eq!(relative_path("home:/a"), "/a");
    }

    #[test]
    fn test_parent_directory() {
        assert_eq!(parent_directory("home:/a/b"), "home:/a/");
        assert_eq!(parent_directory("home:/a/b/"), "home:/a/");
        assert_eq!(parent_directory("home:/a"), "home:/");
        assert_eq!(parent_directory("home://a///b"), "home:/a/");
        assert_eq!(parent_directory("home:/"), "home:/");
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("home:/a/b.txt"), "b.txt");
        assert_eq!(basename("home:/a/dir/"), "dir");
        assert_eq!(basename("home:/"), "");
    }

    #[test]
    fn test_path_join() {
        assert_eq!(path_join("home:/", "a.txt"), "home:/a.txt");
        assert_eq!(path_join("home:/dir/", "/a.txt"), "home:/dir/a.txt");
        assert_eq!(path_join("home:/dir", ""), "home:/dir");
    }
}
