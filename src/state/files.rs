use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

use super::now_iso;

/// A single tracked object, as scanned from the source bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRecord {
    pub bucket: String,
    pub key: String,
    pub size: i64,
    pub etag: String,
    pub storage_class: String,
    pub last_modified: String,
}

const GLACIER_CLASSES: &[&str] = &["GLACIER", "DEEP_ARCHIVE"];

pub(super) struct FileStore<'a> {
    pub(super) conn: &'a Arc<Mutex<Connection>>,
}

impl FileStore<'_> {
    /// Record a scanned object. Idempotent: re-scanning a key the store
    /// already knows about leaves its restore/verify progress untouched.
    pub fn add_object(
        &self,
        bucket: &str,
        key: &str,
        size: i64,
        etag: &str,
        storage_class: &str,
        last_modified: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = now_iso();
        conn.execute(
            "INSERT OR IGNORE INTO files
                (bucket, key, size, etag, storage_class, last_modified, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'discovered', ?7, ?7)",
            params![bucket, key, size, etag, storage_class, last_modified, now],
        )?;
        Ok(())
    }

    pub fn mark_restore_requested(&self, bucket: &str, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE files SET state = 'restore_requested', glacier_restore_requested_at = ?1, updated_at = ?1
             WHERE bucket = ?2 AND key = ?3",
            params![now_iso(), bucket, key],
        )?;
        Ok(())
    }

    pub fn mark_restore_ready(&self, bucket: &str, key: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE files SET state = 'restore_ready', glacier_restored_at = ?1, updated_at = ?1
             WHERE bucket = ?2 AND key = ?3",
            params![now_iso(), bucket, key],
        )?;
        Ok(())
    }

    /// Glacier/Deep Archive objects that have never had a restore requested.
    pub fn objects_needing_restore(&self) -> Result<Vec<ObjectRecord>> {
        let conn = self.conn.lock().unwrap();
        let placeholders = GLACIER_CLASSES.iter().map(|c| format!("'{c}'")).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT bucket, key, size, etag, storage_class, last_modified FROM files
             WHERE storage_class IN ({placeholders}) AND glacier_restore_requested_at IS NULL
             ORDER BY bucket, key"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_object)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Objects whose restore was requested but not yet confirmed ready.
    pub fn objects_in_restore(&self) -> Result<Vec<ObjectRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT bucket, key, size, etag, storage_class, last_modified FROM files
             WHERE glacier_restore_requested_at IS NOT NULL AND glacier_restored_at IS NULL
             ORDER BY bucket, key",
        )?;
        let rows = stmt.query_map([], row_to_object)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn objects_for_bucket(&self, bucket: &str) -> Result<Vec<ObjectRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT bucket, key, size, etag, storage_class, last_modified FROM files
             WHERE bucket = ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![bucket], row_to_object)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    #[cfg(test)]
    pub fn get(&self, bucket: &str, key: &str) -> Result<Option<ObjectRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT bucket, key, size, etag, storage_class, last_modified FROM files
             WHERE bucket = ?1 AND key = ?2",
            params![bucket, key],
            row_to_object,
        )
        .optional()
        .map_err(Into::into)
    }
}

fn row_to_object(row: &rusqlite::Row<'_>) -> rusqlite::Result<ObjectRecord> {
    Ok(ObjectRecord {
        bucket: row.get(0)?,
        key: row.get(1)?,
        size: row.get(2)?,
        etag: row.get(3)?,
        storage_class: row.get(4)?,
        last_modified: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::state::MigrationStateStore;

    #[test]
    fn add_object_is_idempotent() {
        let store = MigrationStateStore::open_in_memory().unwrap();
        store.add_object("b", "k", 10, "etag1", "STANDARD", "2024-01-01").unwrap();
        store.add_object("b", "k", 999, "etag2", "GLACIER", "2024-02-02").unwrap();
        let record = store.files().get("b", "k").unwrap().unwrap();
        assert_eq!(record.size, 10);
        assert_eq!(record.storage_class, "STANDARD");
    }

    #[test]
    fn glacier_objects_need_restore_until_requested() {
        let store = MigrationStateStore::open_in_memory().unwrap();
        store.add_object("b", "k1", 1, "e1", "GLACIER", "2024-01-01").unwrap();
        store.add_object("b", "k2", 1, "e2", "STANDARD", "2024-01-01").unwrap();
        let pending = store.objects_needing_restore().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, "k1");

        store.mark_restore_requested("b", "k1").unwrap();
        assert!(store.objects_needing_restore().unwrap().is_empty());
        assert_eq!(store.objects_in_restore().unwrap().len(), 1);

        store.mark_restore_ready("b", "k1").unwrap();
        assert!(store.objects_in_restore().unwrap().is_empty());
    }
}
