use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the migration pipeline.
///
/// Every per-bucket step (sync, verify, delete) fails the bucket rather than
/// the run by returning one of these; the orchestrator decides which
/// variants abort the whole process (see `MigrationError::is_drive_error`).
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("DRIVE NOT AVAILABLE: {path} does not exist or is not mounted")]
    DriveUnavailable { path: PathBuf },

    #[error("PERMISSION DENIED: cannot write to {path}")]
    PermissionDenied { path: PathBuf },

    #[error("path traversal detected in key: {key}")]
    PathTraversal { key: String },

    #[error("local path does not exist: {0}")]
    LocalPathMissing(PathBuf),

    #[error("file inventory mismatch: {missing} missing, {extra} extra")]
    InventoryMismatch { missing: usize, extra: usize },

    #[error("Verification failed: {0} file(s) with issues")]
    VerificationFailed(usize),

    #[error("count mismatch: {verified} verified vs {expected} expected")]
    CountMismatch { verified: usize, expected: usize },

    #[error(
        "Bucket still contains objects after delete pass. Re-run deletion once remaining versions are cleared."
    )]
    BucketNotEmpty,

    #[error("bucket '{0}' not found in migration state")]
    UnknownBucket(String),

    #[error("object store error: {0}")]
    ObjectStore(#[from] anyhow::Error),

    #[error("state store error: {0}")]
    State(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Drive errors and permission errors abort the whole run (Category 4 in
    /// the error taxonomy); everything else only fails its own bucket.
    pub fn is_drive_error(&self) -> bool {
        matches!(
            self,
            MigrationError::DriveUnavailable { .. } | MigrationError::PermissionDenied { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
