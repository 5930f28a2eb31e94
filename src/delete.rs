use tracing::{info, warn};

use crate::aws_client::{ObjectStoreClient, VersionEntry};
use crate::error::{MigrationError, Result};
use crate::state::MigrationStateStore;

const DELETE_BATCH_SIZE: usize = 1000;

/// Empties and deletes a bucket: every object version, every delete marker,
/// and any in-flight multipart upload that would otherwise keep the bucket
/// non-empty.
pub struct BucketDeleter<'a> {
    client: &'a ObjectStoreClient,
    store: &'a MigrationStateStore,
}

pub struct DeleteOutcome {
    pub deleted: usize,
    pub aborted_multipart: usize,
}

impl<'a> BucketDeleter<'a> {
    pub fn new(client: &'a ObjectStoreClient, store: &'a MigrationStateStore) -> Self {
        Self { client, store }
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<DeleteOutcome> {
        let entries = self.collect_objects_to_delete(bucket).await?;
        let mut deleted = 0usize;
        for batch in entries.chunks(DELETE_BATCH_SIZE) {
            let errors = self.client.delete_objects(bucket, batch).await.map_err(Into::into)?;
            for error in &errors {
                warn!("{bucket}: delete error: {error}");
            }
            deleted += batch.len() - errors.len();
        }

        let aborted_multipart = self.abort_multipart_uploads(bucket).await?;

        if self.client.bucket_has_contents(bucket).await.map_err(Into::into)? {
            return Err(MigrationError::BucketNotEmpty);
        }

        self.client.delete_bucket(bucket).await.map_err(Into::into)?;
        self.store.mark_bucket_delete_complete(bucket)?;
        info!("{bucket}: deleted {deleted} version(s), aborted {aborted_multipart} multipart upload(s)");
        Ok(DeleteOutcome { deleted, aborted_multipart })
    }

    async fn collect_objects_to_delete(&self, bucket: &str) -> Result<Vec<VersionEntry>> {
        let mut entries = Vec::new();
        self.client
            .list_object_versions(bucket, |page| entries.extend(page))
            .await
            .map_err(Into::into)?;
        Ok(entries)
    }

    async fn abort_multipart_uploads(&self, bucket: &str) -> Result<usize> {
        let uploads = self.client.list_multipart_uploads(bucket).await.map_err(Into::into)?;
        for (key, upload_id) in &uploads {
            self.client.abort_multipart_upload(bucket, key, upload_id).await.map_err(Into::into)?;
        }
        Ok(uploads.len())
    }
}
