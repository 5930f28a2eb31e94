use std::path::{Path, PathBuf};

use crate::error::MigrationError;

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;
const SECONDS_PER_DAY: u64 = 86400;

/// Format a byte count as a human readable size (base-1024, "B"/"KB"/... as
/// the original prints them — not the binary "KiB" suffixes).
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} PB")
}

/// Format a duration in seconds the way the original `format_duration` does.
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    if seconds < SECONDS_PER_MINUTE {
        return format!("{seconds}s");
    }
    if seconds < SECONDS_PER_HOUR {
        return format!("{}m {}s", seconds / SECONDS_PER_MINUTE, seconds % SECONDS_PER_MINUTE);
    }
    if seconds < SECONDS_PER_DAY {
        let hours = seconds / SECONDS_PER_HOUR;
        let minutes = (seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE;
        return format!("{hours}h {minutes}m");
    }
    let days = seconds / SECONDS_PER_DAY;
    let hours = (seconds % SECONDS_PER_DAY) / SECONDS_PER_HOUR;
    format!("{days}d {hours}h")
}

/// Convert a `(bucket, key)` pair into the expected local filesystem path,
/// normalizing `\` to `/`, dropping empty and `.` components, and rejecting
/// `..` components or any path that would escape `base_path/bucket`.
///
/// Returns `None` on path traversal so batch callers can skip the key
/// rather than aborting.
pub fn derive_local_path(base_path: &Path, bucket: &str, key: &str) -> Option<PathBuf> {
    let normalized = key.replace('\\', "/");
    let mut candidate = base_path.join(bucket);
    let bucket_root = candidate.clone();
    for part in normalized.split('/') {
        match part {
            "" | "." => continue,
            ".." => return None,
            other => candidate.push(other),
        }
    }
    if candidate.strip_prefix(&bucket_root).is_err() {
        return None;
    }
    Some(candidate)
}

pub fn derive_local_path_strict(base_path: &Path, bucket: &str, key: &str) -> Result<PathBuf, MigrationError> {
    derive_local_path(base_path, bucket, key).ok_or_else(|| MigrationError::PathTraversal { key: key.to_string() })
}

/// Local files considered OS-created metadata rather than migrated content
/// (see spec §6.5). Matched against the final path component.
const IGNORED_FILE_PATTERNS: &[&str] = &[
    ".DS_Store",
    "._.DS_Store",
    "Thumbs.db",
    "desktop.ini",
    ".Spotlight-V100",
    ".TemporaryItems",
    ".Trashes",
];

pub fn should_ignore_key(key: &str) -> bool {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    IGNORED_FILE_PATTERNS
        .iter()
        .any(|pattern| file_name == *pattern || file_name.ends_with(pattern))
}

/// Unquote an S3 ETag header value (`"abc123"` -> `abc123`).
pub fn unquote_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

pub fn etag_is_multipart(etag: &str) -> bool {
    etag.contains('-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn format_size_steps_units() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
    }

    #[test]
    fn format_duration_buckets() {
        assert_eq!(format_duration(45.0), "45s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3725.0), "1h 2m");
        assert_eq!(format_duration(90000.0), "1d 1h");
    }

    #[test]
    fn derive_local_path_normalizes_and_joins() {
        let base = Path::new("/data");
        let path = derive_local_path(base, "my-bucket", "a/b/c.txt").unwrap();
        assert_eq!(path, Path::new("/data/my-bucket/a/b/c.txt"));
    }

    #[test]
    fn derive_local_path_drops_empty_and_dot_components() {
        let base = Path::new("/data");
        let path = derive_local_path(base, "bkt", "./a//b/./c").unwrap();
        assert_eq!(path, Path::new("/data/bkt/a/b/c"));
    }

    #[test]
    fn derive_local_path_rejects_parent_traversal() {
        let base = Path::new("/data");
        assert!(derive_local_path(base, "bkt", "../../etc/passwd").is_none());
    }

    #[test]
    fn derive_local_path_normalizes_backslashes() {
        let base = Path::new("/data");
        let path = derive_local_path(base, "bkt", "a\\b\\c.txt").unwrap();
        assert_eq!(path, Path::new("/data/bkt/a/b/c.txt"));
    }

    #[test]
    fn ignored_keys_match_system_files() {
        assert!(should_ignore_key("a/b/.DS_Store"));
        assert!(should_ignore_key("Thumbs.db"));
        assert!(!should_ignore_key("a/b/photo.jpg"));
    }

    #[test]
    fn etag_multipart_detection() {
        assert!(etag_is_multipart("abcdef-3"));
        assert!(!etag_is_multipart("d41d8cd98f00b204e9800998ecf8427e"));
    }
}
