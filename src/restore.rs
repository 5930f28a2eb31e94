use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aws_client::ObjectStoreClient;
use crate::error::Result;
use crate::state::MigrationStateStore;

const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Requests Glacier/Deep Archive restores for every object that needs one.
/// Deep Archive objects always use the `Bulk` tier regardless of the
/// configured default, since Standard/Expedited aren't available for them.
pub struct GlacierRestorer<'a> {
    client: &'a ObjectStoreClient,
    store: &'a MigrationStateStore,
    restore_days: i32,
    default_tier: &'a str,
}

impl<'a> GlacierRestorer<'a> {
    pub fn new(
        client: &'a ObjectStoreClient,
        store: &'a MigrationStateStore,
        restore_days: i32,
        default_tier: &'a str,
    ) -> Self {
        Self { client, store, restore_days, default_tier }
    }

    pub async fn request_all_restores(&self, cancel: &CancellationToken) -> Result<usize> {
        let pending = self.store.objects_needing_restore()?;
        let mut requested = 0;
        for object in pending {
            if cancel.is_cancelled() {
                break;
            }
            let tier = if object.storage_class == "DEEP_ARCHIVE" { "Bulk" } else { self.default_tier };
            self.client
                .restore_object(&object.bucket, &object.key, self.restore_days, tier)
                .await
                .map_err(Into::into)?;
            self.store.mark_restore_requested(&object.bucket, &object.key)?;
            requested += 1;
        }
        info!("requested restore for {requested} object(s)");
        Ok(requested)
    }
}

/// Polls outstanding restores until every one has completed, sleeping
/// between rounds so as not to hammer `HeadObject`.
pub struct GlacierWaiter<'a> {
    client: &'a ObjectStoreClient,
    store: &'a MigrationStateStore,
}

impl<'a> GlacierWaiter<'a> {
    pub fn new(client: &'a ObjectStoreClient, store: &'a MigrationStateStore) -> Self {
        Self { client, store }
    }

    pub async fn wait_for_restores(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let in_progress = self.store.objects_in_restore()?;
            if in_progress.is_empty() {
                return Ok(());
            }
            if cancel.is_cancelled() {
                warn!("cancelled while {} restore(s) still outstanding", in_progress.len());
                return Ok(());
            }
            let mut still_pending = 0;
            for object in &in_progress {
                if cancel.is_cancelled() {
                    break;
                }
                match self.client.head_object(&object.bucket, &object.key).await {
                    Ok(head) if !head.restore_in_progress => {
                        self.store.mark_restore_ready(&object.bucket, &object.key)?;
                    }
                    Ok(_) => still_pending += 1,
                    Err(err) => {
                        warn!("head_object failed for {}/{}: {err}", object.bucket, object.key);
                        still_pending += 1;
                    }
                }
            }
            if still_pending == 0 {
                return Ok(());
            }
            info!("{still_pending} object(s) still restoring, waiting");
            tokio::select! {
                _ = tokio::time::sleep(WAIT_POLL_INTERVAL) => {}
                _ = cancel.cancelled() => return Ok(()),
            }
        }
    }
}
