//! AWS S3 object store.
//!
//! Forwards every operation to a single S3 bucket (or an S3-compatible
//! endpoint such as MinIO or LocalStack).  Keys are passed through
//! unchanged.
//!
//! Credentials come from the configuration when both halves are set,
//! otherwise from the standard AWS credential chain (env vars,
//! `~/.aws/credentials`, IAM role, etc.).

use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, error, info, warn};

use super::backend::{ObjectStore, ObjectSummary, PrefixListing};
use crate::config::AwsStorageConfig;

/// Maximum number of keys S3 accepts in one `DeleteObjects` call.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Characters left unescaped in a `CopySource` value.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Object store backed by one S3 bucket.
pub struct S3Store {
    /// AWS S3 SDK client.
    client: Client,
    /// Bucket name.
    bucket: String,
}

impl S3Store {
    /// Build the SDK client from explicit configuration.
    pub async fn new(config: &AwsStorageConfig) -> anyhow::Result<Self> {
        if config.bucket.is_empty() {
            anyhow::bail!("storage.aws.bucket must not be empty");
        }

        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if !config.endpoint_url.is_empty() {
            config_loader = config_loader.endpoint_url(&config.endpoint_url);
        }

        if !config.access_key_id.is_empty() && !config.secret_access_key.is_empty() {
            let creds = aws_sdk_s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None, // session_token
                None, // expiry
                "portfolio-browser-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        let s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.use_path_style);

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "S3 store initialized: bucket={} region={}",
            config.bucket, config.region
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }

    /// Build the URL-encoded `CopySource` value for `key`.
    fn copy_source(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.bucket,
            utf8_percent_encode(key, COPY_SOURCE)
        )
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("AWS S3 {context}: {err}")
    }

    fn to_summary(obj: &aws_sdk_s3::types::Object) -> Option<ObjectSummary> {
        let key = obj.key()?.to_string();
        let last_modified = obj
            .last_modified()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
            .unwrap_or_default();
        Some(ObjectSummary {
            key,
            size: obj.size().unwrap_or(0).max(0) as u64,
            last_modified,
        })
    }
}

impl ObjectStore for S3Store {
    fn list_with_prefix(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PrefixListing>> + Send + '_>> {
        let prefix = prefix.to_string();
        let delimiter = delimiter.map(|d| d.to_string());
        Box::pin(async move {
            debug!(
                "AWS list_objects_v2: bucket={} prefix={} delimiter={:?}",
                self.bucket, prefix, delimiter
            );

            let mut listing = PrefixListing::default();
            let mut continuation_token: Option<String> = None;
            loop {
                let mut req = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(&prefix);
                if let Some(ref d) = delimiter {
                    req = req.delimiter(d);
                }
                if let Some(ref token) = continuation_token {
                    req = req.continuation_token(token);
                }
                let resp = req
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error("list_objects_v2", e.into_service_error()))?;

                listing
                    .objects
                    .extend(resp.contents().iter().filter_map(Self::to_summary));
                listing.common_prefixes.extend(
                    resp.common_prefixes()
                        .iter()
                        .filter_map(|cp| cp.prefix().map(|p| p.to_string())),
                );

                continuation_token =
                    next_page_token(resp.is_truncated(), resp.next_continuation_token());
                if continuation_token.is_none() {
                    if resp.is_truncated() == Some(true) {
                        warn!("Truncated listing without continuation token: prefix={prefix}");
                    }
                    break;
                }
            }

            Ok(listing)
        })
    }

    fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        let content_type = content_type.map(|s| s.to_string());
        Box::pin(async move {
            debug!(
                "AWS put_object: bucket={} key={} size={}",
                self.bucket,
                key,
                data.len()
            );

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .set_content_type(content_type)
                .body(aws_sdk_s3::primitives::ByteStream::from(data))
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e.into_service_error()))?;

            Ok(())
        })
    }

    fn copy(
        &self,
        src_key: &str,
        dst_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let copy_source = self.copy_source(src_key);
        let dst_key = dst_key.to_string();
        Box::pin(async move {
            debug!(
                "AWS copy_object: src={} dst={}/{}",
                copy_source, self.bucket, dst_key
            );

            self.client
                .copy_object()
                .bucket(&self.bucket)
                .key(&dst_key)
                .copy_source(&copy_source)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("copy_object", e.into_service_error()))?;

            Ok(())
        })
    }

    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let key = key.to_string();
        Box::pin(async move {
            debug!("AWS delete_object: bucket={} key={}", self.bucket, key);

            // S3 delete_object is idempotent -- no error for missing keys.
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e.into_service_error()))?;

            Ok(())
        })
    }

    fn delete_many(
        &self,
        keys: &[String],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        let keys = keys.to_vec();
        Box::pin(async move {
            let mut deleted = Vec::with_capacity(keys.len());

            for chunk in delete_batches(&keys) {
                debug!(
                    "AWS delete_objects: bucket={} count={}",
                    self.bucket,
                    chunk.len()
                );

                let objects = chunk
                    .iter()
                    .map(|k| ObjectIdentifier::builder().key(k).build())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| Self::map_sdk_error("delete_objects build", e))?;
                let delete = Delete::builder()
                    .set_objects(Some(objects))
                    .quiet(false)
                    .build()
                    .map_err(|e| Self::map_sdk_error("delete_objects build", e))?;

                let resp = self
                    .client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| Self::map_sdk_error("delete_objects", e.into_service_error()))?;

                deleted.extend(
                    resp.deleted()
                        .iter()
                        .filter_map(|d| d.key().map(|k| k.to_string())),
                );
                for err in resp.errors() {
                    error!(
                        "AWS delete_objects: key={} code={} message={}",
                        err.key().unwrap_or(""),
                        err.code().unwrap_or(""),
                        err.message().unwrap_or("")
                    );
                }
            }

            Ok(deleted)
        })
    }
}

/// Token for the next `list_objects_v2` page, or `None` when the listing is
/// complete.
fn next_page_token(is_truncated: Option<bool>, next_token: Option<&str>) -> Option<String> {
    match is_truncated {
        Some(true) => next_token.map(|t| t.to_string()),
        _ => None,
    }
}

/// Split `keys` into `DeleteObjects`-sized batches.
fn delete_batches(keys: &[String]) -> std::slice::Chunks<'_, String> {
    keys.chunks(MAX_DELETE_BATCH)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_source_encoding() {
        // Key encoding is independent of the client, so test the set directly.
        let encode = |key: &str| utf8_percent_encode(key, COPY_SOURCE).to_string();
        assert_eq!(encode("acme/deal1/spec.pdf"), "acme/deal1/spec.pdf");
        assert_eq!(encode("acme/deal 1/spec v2.pdf"), "acme/deal%201/spec%20v2.pdf");
        assert_eq!(encode("a+b&c.txt"), "a%2Bb%26c.txt");
        assert_eq!(encode("naïve.txt"), "na%C3%AFve.txt");
    }

    #[test]
    fn test_to_summary() {
        let obj = aws_sdk_s3::types::Object::builder()
            .key("acme/spec.pdf")
            .size(42)
            .last_modified(aws_sdk_s3::primitives::DateTime::from_secs(1_700_000_000))
            .build();
        let summary = S3Store::to_summary(&obj).unwrap();
        assert_eq!(summary.key, "acme/spec.pdf");
        assert_eq!(summary.size, 42);
        assert_eq!(summary.last_modified.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_to_summary_without_key() {
        let obj = aws_sdk_s3::types::Object::builder().size(1).build();
        assert!(S3Store::to_summary(&obj).is_none());
    }

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p/k{i}")).collect()
    }

    #[test]
    fn test_delete_batches() {
        assert_eq!(delete_batches(&keys(0)).count(), 0);

        let full = keys(1000);
        let sizes: Vec<usize> = delete_batches(&full).map(<[String]>::len).collect();
        assert_eq!(sizes, vec![1000]);

        let over = keys(1001);
        let batches: Vec<&[String]> = delete_batches(&over).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 1000);
        assert_eq!(batches[1], ["p/k1000".to_string()]);
    }

    #[test]
    fn test_next_page_token() {
        assert_eq!(next_page_token(Some(true), Some("t1")).as_deref(), Some("t1"));
        assert_eq!(next_page_token(Some(false), Some("t1")), None);
        assert_eq!(next_page_token(None, Some("t1")), None);
        assert_eq!(next_page_token(Some(true), None), None);
    }
}
