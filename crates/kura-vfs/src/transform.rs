//! Result transforms applied between adapters and callers.
//!
//! Everything here is stateless: listings are filtered and ordered, sizes
//! are made human-readable, raw payloads are converted to the requested
//! representation, and MIME types are mapped to icons.

use std::cmp::Ordering;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;

use crate::error::{VfsError, VfsResult};
use crate::path;
use crate::types::{
    FileRecord, ListOptions, Payload, RawPayload, Representation, SortBy, SortDirection,
    SortStrategy,
};

const IEC_UNITS: [&str; 8] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];
const SI_UNITS: [&str; 8] = ["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Icon used for every directory.
pub const FOLDER_ICON: &str = "folder";

/// Icon used when no MIME rule matches.
pub const DEFAULT_FILE_ICON: &str = "application-x-executable";

/// Format a byte count for display.
///
/// Base 1024 with `KiB`-style units, or base 1000 with `kB`-style units
/// when `si` is set. Values below the first threshold print as `<n> B`.
pub fn human_size(bytes: u64, si: bool) -> String {
    let (thresh, units) = if si {
        (1000.0, &SI_UNITS)
    } else {
        (1024.0, &IEC_UNITS)
    };

    if (bytes as f64) < thresh {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    value /= thresh;
    while value >= thresh && unit < units.len() - 1 {
        value /= thresh;
        unit += 1;
    }
    format!("{value:.1} {}", units[unit])
}

fn compare_records(a: &FileRecord, b: &FileRecord, sort_by: SortBy) -> Ordering {
    match sort_by.strategy() {
        SortStrategy::Lexicographic => {
            let (ka, kb) = match sort_by {
                SortBy::Mime => (
                    a.mime.as_deref().unwrap_or(""),
                    b.mime.as_deref().unwrap_or(""),
                ),
                _ => (a.filename.as_str(), b.filename.as_str()),
            };
            ka.to_lowercase()
                .cmp(&kb.to_lowercase())
                .then_with(|| ka.cmp(kb))
        }
        SortStrategy::Date => {
            let time = |r: &FileRecord| match sort_by {
                SortBy::Ctime => r.ctime,
                SortBy::Atime => r.atime,
                _ => r.mtime,
            };
            time(a).cmp(&time(b))
        }
        SortStrategy::Generic => a.size.cmp(&b.size),
    }
}

fn sort_records(records: &mut [FileRecord], sort_by: SortBy, sort_dir: SortDirection) {
    records.sort_by(|a, b| {
        let ord = compare_records(a, b, sort_by);
        match sort_dir {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

fn with_human_size(mut record: FileRecord) -> FileRecord {
    record.human_size = human_size(record.size, false);
    record
}

/// Filter and order a raw listing of `root`.
///
/// Output order is: synthesized `..` entry (only when `root` is not a
/// mountpoint root), then directories, then files, each group sorted on
/// its own. Incoming `..` entries are dropped so repeated application
/// yields the same listing.
pub fn normalize_listing(
    root: &str,
    entries: Vec<FileRecord>,
    options: &ListOptions,
) -> Vec<FileRecord> {
    let mut result = Vec::with_capacity(entries.len() + 1);
    if !path::is_root(root) {
        result.push(with_human_size(FileRecord::parent_entry(
            path::parent_directory(root),
        )));
    }

    result.extend(sort_entries(entries, options));
    result
}

/// Filter and order entries without synthesizing a parent entry.
pub fn sort_entries(entries: Vec<FileRecord>, options: &ListOptions) -> Vec<FileRecord> {
    let (mut dirs, mut files): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .filter(|e| e.filename != "..")
        .filter(|e| options.show_hidden || !e.filename.starts_with('.'))
        .filter(|e| options.filter.as_ref().is_none_or(|f| f(e)))
        .map(with_human_size)
        .partition(|e| e.is_directory);

    sort_records(&mut dirs, options.sort_by, options.sort_dir);
    sort_records(&mut files, options.sort_by, options.sort_dir);
    dirs.extend(files);
    dirs
}

/// Convert a raw adapter payload to the requested representation.
pub fn convert_payload(raw: RawPayload, representation: Representation) -> Payload {
    match representation {
        Representation::Text => Payload::Text(String::from_utf8_lossy(&raw.bytes).into_owned()),
        Representation::DataUri => Payload::DataUri(format!(
            "data:{};base64,{}",
            raw.mime,
            STANDARD.encode(&raw.bytes)
        )),
        Representation::Blob => Payload::Blob {
            mime: raw.mime,
            bytes: raw.bytes,
        },
        Representation::Binary => Payload::Binary(raw.bytes),
    }
}

/// Guess a MIME type from a filename extension.
pub fn mime_for_filename(filename: &str) -> &'static str {
    let ext = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return crate::types::DEFAULT_MIME,
    };
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => crate::types::DEFAULT_MIME,
    }
}

/// Maps file records to icon names by MIME.
///
/// Rules are tried in insertion order and the first matching regex wins.
/// Directories always resolve to [`FOLDER_ICON`].
#[derive(Debug, Clone)]
pub struct FileIconResolver {
    rules: Vec<(Regex, String)>,
}

impl FileIconResolver {
    /// Compile an ordered `(mime regex, icon)` map.
    pub fn new<K, V>(map: impl IntoIterator<Item = (K, V)>) -> VfsResult<Self>
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let rules = map
            .into_iter()
            .map(|(pattern, icon)| {
                Regex::new(pattern.as_ref())
                    .map(|re| (re, icon.into()))
                    .map_err(|e| VfsError::other(format!("bad icon pattern: {e}")))
            })
            .collect::<VfsResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Icon name for a record.
    pub fn resolve(&self, record: &FileRecord) -> &str {
        if record.is_directory {
            return FOLDER_ICON;
        }
        let mime = record.mime.as_deref().unwrap_or("");
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(mime))
            .map(|(_, icon)| icon.as_str())
            .unwrap_or(DEFAULT_FILE_ICON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> Vec<FileRecord> {
        vec![
            FileRecord::file("home:/dir/b.txt", 2048),
            FileRecord::directory("home:/dir/zeta"),
            FileRecord::file("home:/dir/.hidden", 1),
            FileRecord::file("home:/dir/A.txt", 10),
            FileRecord::directory("home:/dir/alpha"),
        ]
    }

    fn names(records: &[FileRecord]) -> Vec<&str> {
        records.iter().map(|r| r.filename.as_str()).collect()
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0, false), "0 B");
        assert_eq!(human_size(1023, false), "1023 B");
        assert_eq!(human_size(1024, false), "1.0 KiB");
        assert_eq!(human_size(1024, true), "1.0 kB");
        assert_eq!(human_size(999, true), "999 B");
        assert_eq!(human_size(1536, false), "1.5 KiB");
        assert_eq!(human_size(1024 * 1024, false), "1.0 MiB");
        assert_eq!(human_size(5_000_000_000, true), "5.0 GB");
    }

    #[test]
    fn test_listing_order() {
        let out = normalize_listing("home:/dir", listing(), &ListOptions::new());
        assert_eq!(names(&out), vec!["..", "alpha", "zeta", "A.txt", "b.txt"]);
        assert_eq!(out[0].path, "home:/");
        assert_eq!(out[4].human_size, "2.0 KiB");
    }

    #[test]
    fn test_listing_root_has_no_parent() {
        let out = normalize_listing("home:/", listing(), &ListOptions::new());
        assert_eq!(names(&out), vec!["alpha", "zeta", "A.txt", "b.txt"]);
    }

    #[test]
    fn test_listing_hidden_and_filter() {
        let opts = ListOptions::new().with_hidden(true);
        let out = normalize_listing("home:/", listing(), &opts);
        assert!(names(&out).contains(&".hidden"));

        let opts = ListOptions::new().with_filter(|r| r.is_directory);
        let out = normalize_listing("home:/", listing(), &opts);
        assert_eq!(names(&out), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_listing_sort_desc_by_size() {
        let opts = ListOptions::new().sorted(SortBy::Size, SortDirection::Desc);
        let out = normalize_listing("home:/", listing(), &opts);
        // Equal sizes keep their incoming order.
        assert_eq!(names(&out), vec!["zeta", "alpha", "b.txt", "A.txt"]);
    }

    #[test]
    fn test_listing_sort_by_date() {
        let mut entries = listing();
        entries[0].mtime = Some(300);
        entries[3].mtime = Some(100);
        let opts = ListOptions::new().sorted(SortBy::Mtime, SortDirection::Asc);
        let out = normalize_listing("home:/", entries, &opts);
        assert_eq!(names(&out)[2..], ["A.txt", "b.txt"]);
    }

    #[test]
    fn test_listing_idempotent() {
        for opts in [
            ListOptions::new(),
            ListOptions::new().with_hidden(true),
            ListOptions::new().sorted(SortBy::Size, SortDirection::Desc),
        ] {
            let once = normalize_listing("home:/dir", listing(), &opts);
            let twice = normalize_listing("home:/dir", once.clone(), &opts);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_convert_payload() {
        let raw = || RawPayload::new("text/plain", b"hi".to_vec());
        assert_eq!(
            convert_payload(raw(), Representation::Text),
            Payload::Text("hi".into())
        );
        assert_eq!(
            convert_payload(raw(), Representation::DataUri),
            Payload::DataUri("data:text/plain;base64,aGk=".into())
        );
        assert_eq!(
            convert_payload(raw(), Representation::Blob),
            Payload::Blob {
                mime: "text/plain".into(),
                bytes: b"hi".to_vec()
            }
        );
        assert_eq!(
            convert_payload(raw(), Representation::Binary),
            Payload::Binary(b"hi".to_vec())
        );
    }

    #[test]
    fn test_icon_resolver() {
        let icons = FileIconResolver::new([
            ("^image/png", "image-png"),
            ("^image/", "image-x-generic"),
            ("^text/", "text-x-generic"),
        ])
        .unwrap();

        let png = FileRecord::file("home:/a.png", 1).with_mime("image/png");
        let gif = FileRecord::file("home:/a.gif", 1).with_mime("image/gif");
        let bin = FileRecord::file("home:/a.bin", 1).with_mime("application/x-foo");
        let dir = FileRecord::directory("home:/pics").with_mime("image/png");

        assert_eq!(icons.resolve(&png), "image-png");
        assert_eq!(icons.resolve(&gif), "image-x-generic");
        assert_eq!(icons.resolve(&bin), DEFAULT_FILE_ICON);
        assert_eq!(icons.resolve(&dir), FOLDER_ICON);
    }

    #[test]
    fn test_icon_resolver_bad_pattern() {
        assert!(FileIconResolver::new([("(", "broken")]).is_err());
    }

    #[test]
    fn test_mime_for_filename() {
        assert_eq!(mime_for_filename("a.PNG"), "image/png");
        assert_eq!(mime_for_filename(".bashrc"), "application/octet-stream");
        assert_eq!(mime_for_filename("README"), "application/octet-stream");
    }
}
