use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::util::should_ignore_key;

/// Result of comparing the expected key set against what's actually on disk.
#[derive(Debug, Default)]
pub struct InventoryReport {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub ignored: Vec<String>,
}

impl InventoryReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Recursively lists every file under `bucket_root`, relative to it, with
/// path separators normalized to `/`. No external walker crate: a plain
/// `read_dir` recursion is all this needs.
pub fn scan_local_directory(bucket_root: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    if bucket_root.exists() {
        walk(bucket_root, bucket_root, &mut out)?;
    }
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk(root, &path, out)?;
        } else if file_type.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(to_key(relative));
            }
        }
    }
    Ok(())
}

fn to_key(relative: &Path) -> String {
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

/// Compares the set of keys expected (from the state store) against what was
/// found on disk, separating ignored OS-noise files from real discrepancies.
pub fn partition_inventory(expected_keys: &[String], local_keys: &[String]) -> InventoryReport {
    let expected: BTreeSet<&str> = expected_keys.iter().map(String::as_str).collect();
    let local: BTreeSet<&str> = local_keys.iter().map(String::as_str).collect();

    let mut report = InventoryReport::default();
    for key in expected.difference(&local) {
        report.missing.push((*key).to_string());
    }
    for key in local.difference(&expected) {
        if should_ignore_key(key) {
            report.ignored.push((*key).to_string());
        } else {
            report.extra.push((*key).to_string());
        }
    }
    report
}

pub fn bucket_root(base_path: &Path, bucket: &str) -> PathBuf {
    base_path.join(bucket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_separates_missing_extra_and_ignored() {
        let expected = vec!["a.txt".to_string(), "b/c.txt".to_string()];
        let local = vec!["a.txt".to_string(), "b/.DS_Store".to_string(), "stray.txt".to_string()];
        let report = partition_inventory(&expected, &local);
        assert_eq!(report.missing, vec!["b/c.txt".to_string()]);
        assert_eq!(report.extra, vec!["stray.txt".to_string()]);
        assert_eq!(report.ignored, vec!["b/.DS_Store".to_string()]);
        assert!(!report.is_clean());
    }

    #[test]
    fn clean_inventory_has_no_missing_or_extra() {
        let expected = vec!["a.txt".to_string()];
        let local = vec!["a.txt".to_string()];
        assert!(partition_inventory(&expected, &local).is_clean());
    }

    #[test]
    fn scan_local_directory_finds_nested_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("nested")).unwrap();
        std::fs::write(tmp.path().join("top.txt"), b"x").unwrap();
        std::fs::write(tmp.path().join("nested/deep.txt"), b"y").unwrap();
        let mut keys = scan_local_directory(tmp.path()).unwrap();
        keys.sort();
        assert_eq!(keys, vec!["nested/deep.txt".to_string(), "top.txt".to_string()]);
    }

    #[test]
    fn scan_local_directory_on_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");
        assert!(scan_local_directory(&missing).unwrap().is_empty());
    }
}
