pub mod analysis;
pub mod compression;

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::params;

pub use analysis::{parse_size, should_skip_by_suffix, suffix_tokens, CandidateFile};

/// Queries the migration state database directly for files at or above
/// `min_size`, optionally restricted to a set of buckets, skipping anything
/// `should_skip_by_suffix` would rule out. This binary only ever reads the
/// database the evacuator writes; it never touches the object store.
pub fn find_candidates(
    db_path: &Path,
    min_size: i64,
    buckets: &[String],
    limit: Option<usize>,
) -> Result<Vec<CandidateFile>> {
    let conn = rusqlite::Connection::open(db_path).context("opening state database")?;
    let mut sql = "SELECT bucket, key, size FROM files WHERE size >= ?1".to_string();
    if !buckets.is_empty() {
        let placeholders = buckets.iter().enumerate().map(|(i, _)| format!("?{}", i + 2)).collect::<Vec<_>>().join(", ");
        sql.push_str(&format!(" AND bucket IN ({placeholders})"));
    }
    sql.push_str(" ORDER BY size DESC");

    let mut stmt = conn.prepare(&sql)?;
    let mut param_values: Vec<&dyn rusqlite::ToSql> = vec![&min_size];
    for bucket in buckets {
        param_values.push(bucket);
    }

    let rows = stmt.query_map(param_values.as_slice(), |row| {
        Ok(CandidateFile { bucket: row.get(0)?, key: row.get(1)?, size: row.get(2)? })
    })?;

    let mut candidates = Vec::new();
    for row in rows {
        let candidate = row?;
        if should_skip_by_suffix(&candidate.key) {
            continue;
        }
        candidates.push(candidate);
        if let Some(limit) = limit {
            if candidates.len() >= limit {
                break;
            }
        }
    }
    Ok(candidates)
}

pub fn print_scan_summary(candidates: &[CandidateFile]) {
    let total_bytes: i64 = candidates.iter().map(|c| c.size).sum();
    println!(
        "{} candidate file(s) totalling {}",
        candidates.len(),
        crate::util::format_size(total_bytes.max(0) as u64)
    );
    for candidate in candidates {
        println!("  {}/{}  {}", candidate.bucket, candidate.key, crate::util::format_size(candidate.size.max(0) as u64));
    }
}

pub struct CompressionSummary {
    pub compressed: usize,
    pub failed: usize,
    pub bytes_before: i64,
}

pub fn print_compression_summary(summary: &CompressionSummary) {
    println!(
        "compressed {} file(s) ({} failed), {} processed",
        summary.compressed,
        summary.failed,
        crate::util::format_size(summary.bytes_before.max(0) as u64)
    );
}

/// Drives the `--compress` path: for each candidate whose local copy
/// exists, runs `xz`, verifies the result, and tallies outcomes. Local
/// candidates with no file on disk yet (not downloaded) are skipped.
pub fn report_and_compress_candidates(
    base_path: &Path,
    candidates: &[CandidateFile],
    compress: bool,
) -> CompressionSummary {
    let mut summary = CompressionSummary { compressed: 0, failed: 0, bytes_before: 0 };
    print_scan_summary(candidates);
    if !compress {
        return summary;
    }
    for candidate in candidates {
        let local_path = match crate::util::derive_local_path(base_path, &candidate.bucket, &candidate.key) {
            Some(path) => path,
            None => {
                summary.failed += 1;
                continue;
            }
        };
        if !local_path.exists() {
            continue;
        }
        match compression::compress_with_xz(&local_path) {
            Ok(()) => {
                let mut compressed_name = local_path.clone().into_os_string();
                compressed_name.push(".xz");
                let compressed_path = std::path::PathBuf::from(compressed_name);
                match compression::verify_compressed_file(&compressed_path) {
                    Ok(true) => {
                        summary.compressed += 1;
                        summary.bytes_before += candidate.size;
                    }
                    _ => summary.failed += 1,
                }
            }
            Err(_) => summary.failed += 1,
        }
    }
    summary
}
