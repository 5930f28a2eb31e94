mod buckets;
mod files;
mod phase;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub use buckets::{BucketRecord, VerifyMetrics};
pub use files::ObjectRecord;
pub use phase::Phase;

use crate::error::Result;

const TABLE_DEFINITIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS files (
        bucket TEXT NOT NULL,
        key TEXT NOT NULL,
        size INTEGER NOT NULL,
        etag TEXT,
        storage_class TEXT,
        last_modified TEXT,
        state TEXT NOT NULL,
        error_message TEXT,
        glacier_restore_requested_at TEXT,
        glacier_restored_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (bucket, key)
    )",
    "CREATE TABLE IF NOT EXISTS bucket_status (
        bucket TEXT PRIMARY KEY,
        file_count INTEGER NOT NULL,
        total_size INTEGER NOT NULL,
        storage_class_counts TEXT,
        scan_complete INTEGER NOT NULL DEFAULT 0,
        sync_complete INTEGER NOT NULL DEFAULT 0,
        verify_complete INTEGER NOT NULL DEFAULT 0,
        delete_complete INTEGER NOT NULL DEFAULT 0,
        local_file_count INTEGER,
        verified_file_count INTEGER,
        size_verified_count INTEGER,
        checksum_verified_count INTEGER,
        total_bytes_verified INTEGER,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS migration_metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
];

const INDEX_DEFINITIONS: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_files_state ON files(state)",
    "CREATE INDEX IF NOT EXISTS idx_files_storage_class ON files(storage_class)",
    "CREATE INDEX IF NOT EXISTS idx_files_bucket ON files(bucket)",
];

/// Columns added after the v1 schema. Applied with `ALTER TABLE`, swallowing
/// "duplicate column name" so reopening an older database is a no-op.
const BUCKET_STATUS_MIGRATIONS: &[&str] = &[
    "local_file_count INTEGER",
    "verified_file_count INTEGER",
    "size_verified_count INTEGER",
    "checksum_verified_count INTEGER",
    "total_bytes_verified INTEGER",
];

fn init_schema(conn: &Connection) -> Result<()> {
    conn.busy_timeout(Duration::from_secs(30))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    for statement in TABLE_DEFINITIONS {
        conn.execute(statement, [])?;
    }
    for statement in INDEX_DEFINITIONS {
        conn.execute(statement, [])?;
    }
    for column in BUCKET_STATUS_MIGRATIONS {
        let ddl = format!("ALTER TABLE bucket_status ADD COLUMN {column}");
        if let Err(err) = conn.execute(&ddl, []) {
            let message = err.to_string().to_lowercase();
            if !message.contains("duplicate column name") {
                return Err(err.into());
            }
        }
    }
    Ok(())
}

/// Durable record of every object, bucket, and the current migration phase.
///
/// Composes three collaborators — file, bucket, and phase operations — each
/// sharing the same connection behind a mutex, per the "explicit composition,
/// no mixins" design note: `MigrationStateStore` itself only forwards.
///
/// Cheaply `Clone`: clones share the same connection and mutex, so handing a
/// clone to each download worker is just an `Arc` bump, not a new connection.
#[derive(Clone)]
pub struct MigrationStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl MigrationStateStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        init_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));
        let store = Self { conn };
        store.phases().init_phase()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn files(&self) -> files::FileStore<'_> {
        files::FileStore { conn: &self.conn }
    }

    fn buckets(&self) -> buckets::BucketStore<'_> {
        buckets::BucketStore { conn: &self.conn }
    }

    fn phases(&self) -> phase::PhaseStore<'_> {
        phase::PhaseStore { conn: &self.conn }
    }

    // --- file operations ---

    pub fn add_object(
        &self,
        bucket: &str,
        key: &str,
        size: i64,
        etag: &str,
        storage_class: &str,
        last_modified: &str,
    ) -> Result<()> {
        self.files().add_object(bucket, key, size, etag, storage_class, last_modified)
    }

    pub fn mark_restore_requested(&self, bucket: &str, key: &str) -> Result<()> {
        self.files().mark_restore_requested(bucket, key)
    }

    pub fn mark_restore_ready(&self, bucket: &str, key: &str) -> Result<()> {
        self.files().mark_restore_ready(bucket, key)
    }

    pub fn objects_needing_restore(&self) -> Result<Vec<ObjectRecord>> {
        self.files().objects_needing_restore()
    }

    pub fn objects_in_restore(&self) -> Result<Vec<ObjectRecord>> {
        self.files().objects_in_restore()
    }

    pub fn objects_for_bucket(&self, bucket: &str) -> Result<Vec<ObjectRecord>> {
        self.files().objects_for_bucket(bucket)
    }

    // --- bucket operations ---

    pub fn save_bucket(
        &self,
        bucket: &str,
        file_count: i64,
        total_size: i64,
        storage_class_counts: &std::collections::BTreeMap<String, i64>,
        scan_complete: bool,
    ) -> Result<()> {
        self.buckets().save_bucket(bucket, file_count, total_size, storage_class_counts, scan_complete)
    }

    pub fn mark_bucket_sync_complete(&self, bucket: &str) -> Result<()> {
        self.buckets().mark_flag(bucket, "sync_complete")
    }

    pub fn mark_bucket_delete_complete(&self, bucket: &str) -> Result<()> {
        self.buckets().mark_flag(bucket, "delete_complete")
    }

    pub fn mark_bucket_verify_complete(&self, bucket: &str, metrics: VerifyMetrics) -> Result<()> {
        self.buckets().mark_verify_complete(bucket, metrics)
    }

    pub fn all_buckets(&self) -> Result<Vec<String>> {
        self.buckets().all_buckets()
    }

    pub fn completed_buckets(&self, phase_field: &str) -> Result<Vec<String>> {
        self.buckets().completed_buckets(phase_field)
    }

    pub fn bucket_info(&self, bucket: &str) -> Result<Option<BucketRecord>> {
        self.buckets().bucket_info(bucket)
    }

    pub fn scan_summary(&self) -> Result<buckets::ScanSummary> {
        self.buckets().scan_summary()
    }

    // --- phase operations ---

    pub fn get_phase(&self) -> Result<Phase> {
        self.phases().get_phase()
    }

    pub fn set_phase(&self, phase: Phase) -> Result<()> {
        self.phases().set_phase(phase)
    }
}

pub(crate) fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}
