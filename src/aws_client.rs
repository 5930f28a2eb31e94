use anyhow::{Context, Result};
use aws_sdk_s3::operation::restore_object::RestoreObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier, ObjectVersion, RestoreRequest, Tier as GlacierJobTier};
use aws_sdk_s3::Client;
use tokio::io::AsyncRead;

/// One page worth of live objects, as returned by `list_objects_v2`.
#[derive(Debug, Clone)]
pub struct ListedObject {
    pub key: String,
    pub size: i64,
    pub etag: String,
    pub storage_class: String,
    pub last_modified: String,
}

/// One version or delete marker, as returned by `list_object_versions`.
#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub key: String,
    pub version_id: Option<String>,
    pub is_delete_marker: bool,
}

/// Head-object metadata used to confirm a Glacier restore has completed.
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub storage_class: String,
    pub restore_in_progress: bool,
    pub restore_expiry: Option<String>,
}

/// Thin wrapper over `aws_sdk_s3::Client`. Every pipeline component that
/// talks to the object store goes through this rather than holding the SDK
/// client directly, so pagination and retry-relevant quirks live in one
/// place.
#[derive(Clone)]
pub struct ObjectStoreClient {
    client: Client,
}

impl ObjectStoreClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self { client: Client::new(&config) }
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        let output = self.client.list_buckets().send().await.context("list_buckets")?;
        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    /// Pages through every live object in `bucket`, invoking `visit` per page.
    pub async fn list_objects(&self, bucket: &str, mut visit: impl FnMut(Vec<ListedObject>)) -> Result<()> {
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }
            let output = request.send().await.context("list_objects_v2")?;
            let page = output
                .contents()
                .iter()
                .map(|obj| ListedObject {
                    key: obj.key().unwrap_or_default().to_string(),
                    size: obj.size().unwrap_or(0),
                    etag: obj.e_tag().unwrap_or_default().to_string(),
                    storage_class: obj
                        .storage_class()
                        .map(|c| c.as_str().to_string())
                        .unwrap_or_else(|| "STANDARD".to_string()),
                    last_modified: obj
                        .last_modified()
                        .map(|t| t.to_string())
                        .unwrap_or_default(),
                })
                .collect();
            visit(page);
            if output.is_truncated().unwrap_or(false) {
                continuation = output.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Pages through every object version and delete marker in `bucket`.
    pub async fn list_object_versions(
        &self,
        bucket: &str,
        mut visit: impl FnMut(Vec<VersionEntry>),
    ) -> Result<()> {
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;
        loop {
            let mut request = self.client.list_object_versions().bucket(bucket);
            if let Some(marker) = key_marker.take() {
                request = request.key_marker(marker);
            }
            if let Some(marker) = version_id_marker.take() {
                request = request.version_id_marker(marker);
            }
            let output = request.send().await.context("list_object_versions")?;
            let mut page = Vec::new();
            for version in output.versions() {
                page.push(version_entry(version));
            }
            for marker in output.delete_markers() {
                page.push(VersionEntry {
                    key: marker.key().unwrap_or_default().to_string(),
                    version_id: marker.version_id().map(str::to_string),
                    is_delete_marker: true,
                });
            }
            visit(page);
            if output.is_truncated().unwrap_or(false) {
                key_marker = output.next_key_marker().map(str::to_string);
                version_id_marker = output.next_version_id_marker().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(())
    }

    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context("head_object")?;
        let restore_header = output.restore().map(str::to_string);
        Ok(ObjectHead {
            storage_class: output
                .storage_class()
                .map(|c| c.as_str().to_string())
                .unwrap_or_else(|| "STANDARD".to_string()),
            restore_in_progress: restore_header
                .as_deref()
                .map(|h| h.contains("ongoing-request=\"true\""))
                .unwrap_or(false),
            restore_expiry: restore_header.and_then(|h| parse_restore_expiry(&h)),
        })
    }

    /// Requests a Glacier/Deep Archive restore. `RestoreAlreadyInProgress` is
    /// swallowed since re-running the migration against an in-flight restore
    /// is the common resume path, not an error.
    pub async fn restore_object(&self, bucket: &str, key: &str, days: i32, tier: &str) -> Result<()> {
        let glacier_tier = match tier {
            "Bulk" => GlacierJobTier::Bulk,
            "Expedited" => GlacierJobTier::Expedited,
            _ => GlacierJobTier::Standard,
        };
        let request = RestoreRequest::builder()
            .days(days)
            .glacier_job_parameters(
                aws_sdk_s3::types::GlacierJobParameters::builder()
                    .tier(glacier_tier)
                    .build()
                    .expect("tier is always set"),
            )
            .build();
        let result: std::result::Result<RestoreObjectOutput, _> = self
            .client
            .restore_object()
            .bucket(bucket)
            .key(key)
            .restore_request(request)
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.to_string();
                if service_err.contains("RestoreAlreadyInProgress") {
                    Ok(())
                } else {
                    Err(err).context("restore_object")
                }
            }
        }
    }

    /// Streams an object body. The caller is responsible for writing it to
    /// disk in chunks; this never buffers the whole object in memory.
    pub async fn get_object_stream(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .context("get_object")?;
        Ok(output.body)
    }

    /// Deletes up to 1000 object/version pairs in one batched call.
    pub async fn delete_objects(&self, bucket: &str, entries: &[VersionEntry]) -> Result<Vec<String>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let identifiers = entries
            .iter()
            .map(|entry| {
                let mut builder = ObjectIdentifier::builder().key(entry.key.clone());
                if let Some(version_id) = &entry.version_id {
                    builder = builder.version_id(version_id.clone());
                }
                builder.build().expect("key is always set")
            })
            .collect();
        let delete = Delete::builder().set_objects(Some(identifiers)).quiet(true).build()?;
        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .context("delete_objects")?;
        Ok(output
            .errors()
            .iter()
            .map(|e| format!("{}: {}", e.key().unwrap_or_default(), e.message().unwrap_or_default()))
            .collect())
    }

    pub async fn list_multipart_uploads(&self, bucket: &str) -> Result<Vec<(String, String)>> {
        let output = self
            .client
            .list_multipart_uploads()
            .bucket(bucket)
            .send()
            .await
            .context("list_multipart_uploads")?;
        Ok(output
            .uploads()
            .iter()
            .map(|u| (u.key().unwrap_or_default().to_string(), u.upload_id().unwrap_or_default().to_string()))
            .collect())
    }

    pub async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .context("abort_multipart_upload")?;
        Ok(())
    }

    /// `true` if the bucket still has at least one object or delete marker.
    pub async fn bucket_has_contents(&self, bucket: &str) -> Result<bool> {
        let output = self
            .client
            .list_object_versions()
            .bucket(bucket)
            .max_keys(1)
            .send()
            .await
            .context("list_object_versions (probe)")?;
        Ok(!output.versions().is_empty() || !output.delete_markers().is_empty())
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.client.delete_bucket().bucket(bucket).send().await.context("delete_bucket")?;
        Ok(())
    }
}

fn version_entry(version: &ObjectVersion) -> VersionEntry {
    VersionEntry {
        key: version.key().unwrap_or_default().to_string(),
        version_id: version.version_id().map(str::to_string),
        is_delete_marker: false,
    }
}

/// Parses `expiry-date="Fri, 21 Dec 2012 00:00:00 GMT"` out of the `Restore`
/// header. Absent for objects whose restore has not completed.
fn parse_restore_expiry(header: &str) -> Option<String> {
    let marker = "expiry-date=\"";
    let start = header.find(marker)? + marker.len();
    let rest = &header[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Helper retained for callers that need to drain a `ByteStream` without the
/// higher-level chunked writer in `download`.
pub async fn into_async_read(stream: ByteStream) -> impl AsyncRead + Unpin {
    stream.into_async_read()
}

#[cfg(test)]
mod tests {
    use super::parse_restore_expiry;

    #[test]
    fn parses_expiry_from_restore_header() {
        let header = r#"ongoing-request="false", expiry-date="Fri, 21 Dec 2012 00:00:00 GMT""#;
        assert_eq!(parse_restore_expiry(header).as_deref(), Some("Fri, 21 Dec 2012 00:00:00 GMT"));
    }

    #[test]
    fn missing_expiry_returns_none() {
        let header = r#"ongoing-request="true""#;
        assert_eq!(parse_restore_expiry(header), None);
    }
}
