use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::TryStreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aws_client::ObjectStoreClient;
use crate::error::{MigrationError, Result};
use crate::state::{MigrationStateStore, ObjectRecord};
use crate::util::derive_local_path_strict;

/// Streams every tracked object in a bucket to `base_path/bucket/key` through
/// a bounded pool of spawned workers, one streaming body per worker, rather
/// than shelling out to `aws s3 sync`. Files already present with the
/// expected size are left alone so a resumed run doesn't re-download
/// everything.
pub struct Downloader<'a> {
    client: &'a ObjectStoreClient,
    store: &'a MigrationStateStore,
    base_path: &'a Path,
    concurrency: usize,
}

pub struct DownloadStats {
    pub downloaded: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl<'a> Downloader<'a> {
    pub fn new(client: &'a ObjectStoreClient, store: &'a MigrationStateStore, base_path: &'a Path, concurrency: usize) -> Self {
        Self { client, store, base_path, concurrency }
    }

    pub async fn download_bucket(&self, bucket: &str, cancel: &CancellationToken) -> Result<DownloadStats> {
        let objects = self.store.objects_for_bucket(bucket)?;
        verify_base_path_writable(self.base_path)?;

        let total_bytes: u64 = objects.iter().map(|o| o.size.max(0) as u64).sum();
        let progress = MultiProgress::new();
        let bar = progress.add(ProgressBar::new(total_bytes));
        if let Ok(style) = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta}) {msg}",
        ) {
            bar.set_style(style);
        }
        bar.set_message(bucket.to_string());

        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut workers = Vec::with_capacity(objects.len());

        for object in objects {
            if cancel.is_cancelled() {
                info!("download cancelled for bucket {bucket}");
                break;
            }
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
            let client = self.client.clone();
            let base_path = self.base_path.to_path_buf();
            let bucket = bucket.to_string();
            let bar = bar.clone();
            let object_size = object.size.max(0) as u64;
            workers.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = download_one(&client, &base_path, &bucket, &object).await;
                bar.inc(object_size);
                outcome
            }));
        }

        let mut downloaded = 0u64;
        let mut skipped = 0u64;
        let mut failed = 0u64;
        for worker in workers {
            match worker.await {
                Ok(Ok(true)) => downloaded += 1,
                Ok(Ok(false)) => skipped += 1,
                Ok(Err(err)) => {
                    warn!("failed to download object in {bucket}: {err}");
                    failed += 1;
                }
                Err(join_err) => {
                    warn!("download worker panicked for {bucket}: {join_err}");
                    failed += 1;
                }
            }
        }
        bar.finish_with_message(format!("{bucket} done"));
        Ok(DownloadStats { downloaded, skipped, failed })
    }
}

/// Returns `Ok(true)` if the object was downloaded, `Ok(false)` if an
/// existing local copy of the right size was left in place.
async fn download_one(client: &ObjectStoreClient, base_path: &PathBuf, bucket: &str, object: &ObjectRecord) -> Result<bool> {
    let local_path = derive_local_path_strict(base_path, bucket, &object.key)?;
    if let Ok(metadata) = fs::metadata(&local_path).await {
        if metadata.len() == object.size.max(0) as u64 {
            return Ok(false);
        }
    }
    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut stream = client.get_object_stream(bucket, &object.key).await.map_err(Into::into)?;
    let tmp_path = local_path.with_extension("part");
    let mut file = fs::File::create(&tmp_path).await?;
    while let Some(chunk) = stream.try_next().await.map_err(|err| MigrationError::ObjectStore(err.into()))? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);
    fs::rename(&tmp_path, &local_path).await?;
    Ok(true)
}

fn verify_base_path_writable(base_path: &Path) -> Result<()> {
    if !base_path.exists() {
        std::fs::create_dir_all(base_path).map_err(|_| MigrationError::DriveUnavailable { path: base_path.to_path_buf() })?;
    }
    let probe = base_path.join(".write_probe");
    std::fs::write(&probe, b"").map_err(|_| MigrationError::PermissionDenied { path: base_path.to_path_buf() })?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}
