use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{MigrationError, Result};
use crate::state::{MigrationStateStore, VerifyMetrics};

use super::checksum::{verify_single_file, ChecksumOutcome};
use super::common::{truncate_for_display, MAX_ERROR_DISPLAY};
use super::inventory::{bucket_root, partition_inventory, scan_local_directory};

pub struct BucketVerifier<'a> {
    store: &'a MigrationStateStore,
    base_path: &'a Path,
}

pub struct VerifyOutcome {
    pub metrics: VerifyMetrics,
    pub errors: Vec<String>,
}

impl<'a> BucketVerifier<'a> {
    pub fn new(store: &'a MigrationStateStore, base_path: &'a Path) -> Self {
        Self { store, base_path }
    }

    /// Confirms every tracked object exists locally with the right size and
    /// checksum, and that nothing unexpected sits alongside it. Returns the
    /// aggregated metrics on success, or a `MigrationError` describing the
    /// first class of failure encountered (inventory before checksums,
    /// matching how a human would want the errors ordered).
    pub async fn verify_bucket(&self, bucket: &str, cancel: &CancellationToken) -> Result<VerifyOutcome> {
        let expected = self.store.objects_for_bucket(bucket)?;
        let expected_keys: Vec<String> = expected.iter().map(|o| o.key.clone()).collect();

        let root = bucket_root(self.base_path, bucket);
        let local_keys = scan_local_directory(&root)?;
        let inventory = partition_inventory(&expected_keys, &local_keys);
        if !inventory.is_clean() {
            let (shown, hidden) = truncate_for_display(
                &inventory
                    .missing
                    .iter()
                    .map(|k| format!("missing: {k}"))
                    .chain(inventory.extra.iter().map(|k| format!("extra: {k}")))
                    .collect::<Vec<_>>(),
            );
            for message in shown {
                warn!("{bucket}: {message}");
            }
            if hidden > 0 {
                warn!("{bucket}: ...and {hidden} more inventory issue(s)");
            }
            return Err(MigrationError::InventoryMismatch {
                missing: inventory.missing.len(),
                extra: inventory.extra.len(),
            });
        }

        let mut size_verified = 0i64;
        let mut checksum_verified = 0i64;
        let mut total_bytes = 0i64;
        let mut errors = Vec::new();

        for object in &expected {
            if cancel.is_cancelled() {
                break;
            }
            let local_path = root.join(&object.key);
            match verify_single_file(&local_path, object.size, &object.etag).await {
                Ok(ChecksumOutcome::Matched) | Ok(ChecksumOutcome::HealthCheckPassed) => {
                    size_verified += 1;
                    checksum_verified += 1;
                    total_bytes += object.size;
                }
                Ok(ChecksumOutcome::Mismatch { expected, actual }) => {
                    errors.push(format!("{}: expected {expected}, got {actual}", object.key));
                }
                Err(err) => errors.push(format!("{}: {err}", object.key)),
            }
            if errors.len() > MAX_ERROR_DISPLAY * 100 {
                break;
            }
        }

        if !errors.is_empty() {
            let (shown, hidden) = truncate_for_display(&errors);
            for message in shown {
                warn!("{bucket}: {message}");
            }
            if hidden > 0 {
                warn!("{bucket}: ...and {hidden} more verification error(s)");
            }
            return Err(MigrationError::VerificationFailed(errors.len()));
        }

        if checksum_verified as usize != expected.len() {
            return Err(MigrationError::CountMismatch {
                verified: checksum_verified as usize,
                expected: expected.len(),
            });
        }

        let metrics = VerifyMetrics {
            local_file_count: local_keys.len() as i64,
            verified_file_count: checksum_verified,
            size_verified_count: size_verified,
            checksum_verified_count: checksum_verified,
            total_bytes_verified: total_bytes,
        };
        self.store.mark_bucket_verify_complete(bucket, metrics.clone())?;
        info!("{bucket}: verified {checksum_verified} file(s), {total_bytes} bytes");
        Ok(VerifyOutcome { metrics, errors: Vec::new() })
    }
}
