use std::io::Write as _;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aws_client::ObjectStoreClient;
use crate::config::Config;
use crate::delete::BucketDeleter;
use crate::download::Downloader;
use crate::error::{MigrationError, Result};
use crate::restore::{GlacierRestorer, GlacierWaiter};
use crate::scanner::BucketScanner;
use crate::state::{MigrationStateStore, Phase};
use crate::util::format_duration;
use crate::verify::BucketVerifier;

/// Drives one bucket through sync, verify, and delete, skipping any step
/// the state store already marks complete so a resumed run picks up where
/// it left off.
pub struct BucketMigrator<'a> {
    client: &'a ObjectStoreClient,
    store: &'a MigrationStateStore,
    config: &'a Config,
    auto_confirm: bool,
}

impl<'a> BucketMigrator<'a> {
    pub fn new(client: &'a ObjectStoreClient, store: &'a MigrationStateStore, config: &'a Config, auto_confirm: bool) -> Self {
        Self { client, store, config, auto_confirm }
    }

    pub async fn process_bucket(&self, bucket: &str, cancel: &CancellationToken) -> Result<()> {
        let info_before = self.store.bucket_info(bucket)?.ok_or_else(|| MigrationError::UnknownBucket(bucket.to_string()))?;

        if !info_before.sync_complete {
            info!("{bucket}: downloading");
            let downloader = Downloader::new(self.client, self.store, &self.config.base_path, self.config.download_concurrency);
            let stats = downloader.download_bucket(bucket, cancel).await?;
            info!("{bucket}: downloaded {} object(s), skipped {}, failed {}", stats.downloaded, stats.skipped, stats.failed);
            if stats.failed == 0 && !cancel.is_cancelled() {
                self.store.mark_bucket_sync_complete(bucket)?;
            } else {
                return Ok(());
            }
        }

        let info_after_sync = self.store.bucket_info(bucket)?.ok_or_else(|| MigrationError::UnknownBucket(bucket.to_string()))?;
        if !info_after_sync.verify_complete || info_after_sync.verified_file_count.is_none() {
            info!("{bucket}: verifying");
            let verifier = BucketVerifier::new(self.store, &self.config.base_path);
            verifier.verify_bucket(bucket, cancel).await?;
        }

        if cancel.is_cancelled() {
            return Ok(());
        }

        let info_after_verify = self.store.bucket_info(bucket)?.ok_or_else(|| MigrationError::UnknownBucket(bucket.to_string()))?;
        if !info_after_verify.delete_complete {
            if !self.confirm_delete(bucket)? {
                info!("{bucket}: delete skipped by operator");
                return Ok(());
            }
            info!("{bucket}: deleting");
            let deleter = BucketDeleter::new(self.client, self.store);
            deleter.delete_bucket(bucket).await?;
        }

        Ok(())
    }

    fn confirm_delete(&self, bucket: &str) -> Result<bool> {
        if self.auto_confirm {
            return Ok(true);
        }
        print!("Delete all objects in '{bucket}' now that it has been verified? [y/N] ");
        std::io::stdout().flush().ok();
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// Top-level phase dispatch: scanning -> glacier_restore -> glacier_wait ->
/// (syncing/verifying/deleting per bucket) -> complete.
pub struct MigrationOrchestrator {
    client: ObjectStoreClient,
    store: MigrationStateStore,
    config: Config,
    auto_confirm: bool,
}

impl MigrationOrchestrator {
    pub fn new(client: ObjectStoreClient, store: MigrationStateStore, config: Config, auto_confirm: bool) -> Self {
        Self { client, store, config, auto_confirm }
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let started = std::time::Instant::now();
        loop {
            if cancel.is_cancelled() {
                warn!("migration cancelled, state preserved for resume");
                return Ok(());
            }
            let phase = self.store.get_phase()?;
            match phase {
                Phase::Scanning => {
                    let scanner = BucketScanner::new(&self.client, &self.store, &self.config.excluded_buckets, cancel.clone());
                    scanner.scan_all_buckets().await?;
                    self.store.set_phase(Phase::GlacierRestore)?;
                }
                Phase::GlacierRestore => {
                    let restorer = GlacierRestorer::new(
                        &self.client,
                        &self.store,
                        self.config.glacier_restore_days,
                        &self.config.glacier_restore_tier,
                    );
                    restorer.request_all_restores(&cancel).await?;
                    self.store.set_phase(Phase::GlacierWait)?;
                }
                Phase::GlacierWait => {
                    let waiter = GlacierWaiter::new(&self.client, &self.store);
                    waiter.wait_for_restores(&cancel).await?;
                    self.store.set_phase(Phase::Syncing)?;
                }
                Phase::Syncing | Phase::Verifying | Phase::Deleting => {
                    self.run_per_bucket_pipeline(&cancel).await?;
                    if cancel.is_cancelled() {
                        return Ok(());
                    }
                    let all_buckets = self.store.all_buckets()?;
                    let deleted = self.store.completed_buckets("delete_complete")?;
                    if deleted.len() == all_buckets.len() {
                        self.store.set_phase(Phase::Complete)?;
                    } else {
                        info!("one or more buckets were skipped by the operator; re-run to resume and re-prompt");
                        return Ok(());
                    }
                }
                Phase::Complete => {
                    info!("migration complete in {}", format_duration(started.elapsed().as_secs_f64()));
                    return Ok(());
                }
            }
        }
    }

    /// Processes buckets in deterministic order. A per-bucket infrastructure
    /// failure (Category 3 in the error taxonomy: SDK errors during sync,
    /// delete API refusals, `BucketNotEmpty`) is not swallowed and moved past
    /// — it aborts this whole invocation after the failing bucket's partial
    /// progress is already durably saved, so the operator re-runs the binary
    /// to resume with that bucket picked back up (or skipped, if it reached
    /// `delete_complete` some other way in the meantime).
    async fn run_per_bucket_pipeline(&self, cancel: &CancellationToken) -> Result<()> {
        let migrator = BucketMigrator::new(&self.client, &self.store, &self.config, self.auto_confirm);
        for bucket in self.store.all_buckets()? {
            if cancel.is_cancelled() {
                break;
            }
            match migrator.process_bucket(&bucket, cancel).await {
                Ok(()) => {}
                Err(err) if err.is_drive_error() => {
                    error!("DRIVE ERROR: {err}");
                    return Err(err);
                }
                Err(err) => {
                    error!("{bucket}: migration error, state saved, resume by re-running: {err}");
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

/// Installs a Ctrl-C handler that cancels `token` exactly once.
pub fn install_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing current step and saving state");
            token.cancel();
        }
    });
}
