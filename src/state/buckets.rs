use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

use super::now_iso;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BucketRecord {
    pub bucket: String,
    pub file_count: i64,
    pub total_size: i64,
    pub scan_complete: bool,
    pub sync_complete: bool,
    pub verify_complete: bool,
    pub delete_complete: bool,
    pub local_file_count: Option<i64>,
    pub verified_file_count: Option<i64>,
    pub size_verified_count: Option<i64>,
    pub checksum_verified_count: Option<i64>,
    pub total_bytes_verified: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct VerifyMetrics {
    pub local_file_count: i64,
    pub verified_file_count: i64,
    pub size_verified_count: i64,
    pub checksum_verified_count: i64,
    pub total_bytes_verified: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub bucket_count: i64,
    pub total_files: i64,
    pub total_size: i64,
}

pub(super) struct BucketStore<'a> {
    pub(super) conn: &'a Arc<Mutex<Connection>>,
}

impl BucketStore<'_> {
    /// `INSERT OR REPLACE`, preserving the original `created_at` via a
    /// correlated subquery so re-scanning a bucket doesn't reset its age.
    pub fn save_bucket(
        &self,
        bucket: &str,
        file_count: i64,
        total_size: i64,
        storage_class_counts: &BTreeMap<String, i64>,
        scan_complete: bool,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let counts_json = serde_json::to_string(storage_class_counts).unwrap_or_default();
        let now = now_iso();
        conn.execute(
            "INSERT INTO bucket_status
                (bucket, file_count, total_size, storage_class_counts, scan_complete, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(bucket) DO UPDATE SET
                file_count = excluded.file_count,
                total_size = excluded.total_size,
                storage_class_counts = excluded.storage_class_counts,
                scan_complete = excluded.scan_complete,
                updated_at = excluded.updated_at",
            params![bucket, file_count, total_size, counts_json, scan_complete, now],
        )?;
        Ok(())
    }

    pub fn mark_flag(&self, bucket: &str, column: &'static str) -> Result<()> {
        debug_assert!(matches!(column, "sync_complete" | "delete_complete"));
        let conn = self.conn.lock().unwrap();
        let sql = format!("UPDATE bucket_status SET {column} = 1, updated_at = ?1 WHERE bucket = ?2");
        conn.execute(&sql, params![now_iso(), bucket])?;
        Ok(())
    }

    pub fn mark_verify_complete(&self, bucket: &str, metrics: VerifyMetrics) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE bucket_status SET
                verify_complete = 1,
                local_file_count = ?1,
                verified_file_count = ?2,
                size_verified_count = ?3,
                checksum_verified_count = ?4,
                total_bytes_verified = ?5,
                updated_at = ?6
             WHERE bucket = ?7",
            params![
                metrics.local_file_count,
                metrics.verified_file_count,
                metrics.size_verified_count,
                metrics.checksum_verified_count,
                metrics.total_bytes_verified,
                now_iso(),
                bucket,
            ],
        )?;
        Ok(())
    }

    pub fn all_buckets(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT bucket FROM bucket_status ORDER BY bucket")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn completed_buckets(&self, phase_field: &str) -> Result<Vec<String>> {
        debug_assert!(matches!(
            phase_field,
            "scan_complete" | "sync_complete" | "verify_complete" | "delete_complete"
        ));
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT bucket FROM bucket_status WHERE {phase_field} = 1 ORDER BY bucket");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn bucket_info(&self, bucket: &str) -> Result<Option<BucketRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT bucket, file_count, total_size, scan_complete, sync_complete, verify_complete,
                    delete_complete, local_file_count, verified_file_count, size_verified_count,
                    checksum_verified_count, total_bytes_verified
             FROM bucket_status WHERE bucket = ?1",
            params![bucket],
            row_to_bucket,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn scan_summary(&self) -> Result<ScanSummary> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(file_count), 0), COALESCE(SUM(total_size), 0) FROM bucket_status",
            [],
            |row| {
                Ok(ScanSummary {
                    bucket_count: row.get(0)?,
                    total_files: row.get(1)?,
                    total_size: row.get(2)?,
                })
            },
        )
        .map_err(Into::into)
    }
}

fn row_to_bucket(row: &rusqlite::Row<'_>) -> rusqlite::Result<BucketRecord> {
    Ok(BucketRecord {
        bucket: row.get(0)?,
        file_count: row.get(1)?,
        total_size: row.get(2)?,
        scan_complete: row.get::<_, i64>(3)? != 0,
        sync_complete: row.get::<_, i64>(4)? != 0,
        verify_complete: row.get::<_, i64>(5)? != 0,
        delete_complete: row.get::<_, i64>(6)? != 0,
        local_file_count: row.get(7)?,
        verified_file_count: row.get(8)?,
        size_verified_count: row.get(9)?,
        checksum_verified_count: row.get(10)?,
        total_bytes_verified: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::state::{MigrationStateStore, VerifyMetrics};

    #[test]
    fn save_bucket_preserves_created_at_across_rescans() {
        let store = MigrationStateStore::open_in_memory().unwrap();
        let mut counts = BTreeMap::new();
        counts.insert("STANDARD".to_string(), 3);
        store.save_bucket("b", 3, 300, &counts, true).unwrap();
        store.save_bucket("b", 5, 500, &counts, true).unwrap();
        let info = store.bucket_info("b").unwrap().unwrap();
        assert_eq!(info.file_count, 5);
        assert_eq!(info.total_size, 500);
    }

    #[test]
    fn verify_complete_records_all_metrics() {
        let store = MigrationStateStore::open_in_memory().unwrap();
        store.save_bucket("b", 1, 100, &BTreeMap::new(), true).unwrap();
        store
            .mark_bucket_verify_complete(
                "b",
                VerifyMetrics {
                    local_file_count: 1,
                    verified_file_count: 1,
                    size_verified_count: 1,
                    checksum_verified_count: 1,
                    total_bytes_verified: 100,
                },
            )
            .unwrap();
        let info = store.bucket_info("b").unwrap().unwrap();
        assert!(info.verify_complete);
        assert_eq!(info.total_bytes_verified, Some(100));
    }

    #[test]
    fn completed_buckets_filters_by_flag() {
        let store = MigrationStateStore::open_in_memory().unwrap();
        store.save_bucket("a", 1, 1, &BTreeMap::new(), true).unwrap();
        store.save_bucket("b", 1, 1, &BTreeMap::new(), true).unwrap();
        store.mark_bucket_sync_complete("a").unwrap();
        assert_eq!(store.completed_buckets("sync_complete").unwrap(), vec!["a".to_string()]);
    }
}
