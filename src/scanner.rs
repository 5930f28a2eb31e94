use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::aws_client::ObjectStoreClient;
use crate::error::Result;
use crate::state::MigrationStateStore;
use crate::util::unquote_etag;

/// Enumerates every live object in every (non-excluded) bucket and records
/// it in the state store. Directory markers (zero-byte keys ending in `/`)
/// are skipped, matching the original scanner.
pub struct BucketScanner<'a> {
    client: &'a ObjectStoreClient,
    store: &'a MigrationStateStore,
    excluded_buckets: &'a [String],
    cancel: CancellationToken,
}

#[derive(Debug, Default, Clone)]
pub struct BucketScanResult {
    pub bucket: String,
    pub file_count: i64,
    pub total_size: i64,
    pub storage_class_counts: BTreeMap<String, i64>,
}

impl<'a> BucketScanner<'a> {
    pub fn new(
        client: &'a ObjectStoreClient,
        store: &'a MigrationStateStore,
        excluded_buckets: &'a [String],
        cancel: CancellationToken,
    ) -> Self {
        Self { client, store, excluded_buckets, cancel }
    }

    pub async fn scan_all_buckets(&self) -> Result<Vec<BucketScanResult>> {
        let buckets = self.client.list_buckets().await.map_err(Into::into)?;
        let mut results = Vec::new();
        for bucket in buckets {
            if self.cancel.is_cancelled() {
                info!("scan cancelled before bucket {bucket}");
                break;
            }
            if self.excluded_buckets.iter().any(|excluded| excluded == &bucket) {
                info!("skipping excluded bucket {bucket}");
                continue;
            }
            if let Some(info) = self.store.bucket_info(&bucket)? {
                if info.scan_complete {
                    info!("{bucket}: already scanned, resuming past it");
                    continue;
                }
            }
            results.push(self.scan_bucket(&bucket).await?);
        }
        Ok(results)
    }

    pub async fn scan_bucket(&self, bucket: &str) -> Result<BucketScanResult> {
        info!("scanning bucket {bucket}");
        let mut file_count = 0i64;
        let mut total_size = 0i64;
        let mut storage_class_counts: BTreeMap<String, i64> = BTreeMap::new();
        let mut scanned_since_log = 0u64;

        let mut io_error = None;
        self.client
            .list_objects(bucket, |page| {
                for object in page {
                    if object.key.ends_with('/') {
                        continue;
                    }
                    let etag = unquote_etag(&object.etag);
                    if let Err(err) = self.store.add_object(
                        bucket,
                        &object.key,
                        object.size,
                        &etag,
                        &object.storage_class,
                        &object.last_modified,
                    ) {
                        io_error.get_or_insert(err);
                        continue;
                    }
                    file_count += 1;
                    total_size += object.size;
                    *storage_class_counts.entry(object.storage_class.clone()).or_insert(0) += 1;
                    scanned_since_log += 1;
                    if scanned_since_log >= 10_000 {
                        info!("{bucket}: scanned {file_count} objects so far");
                        scanned_since_log = 0;
                    }
                }
            })
            .await
            .map_err(Into::into)?;
        if let Some(err) = io_error {
            return Err(err);
        }

        self.store.save_bucket(bucket, file_count, total_size, &storage_class_counts, true)?;
        info!("{bucket}: {file_count} objects, {total_size} bytes");
        Ok(BucketScanResult { bucket: bucket.to_string(), file_count, total_size, storage_class_counts })
    }
}
