use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::disk::Disk;
use crate::crop::content_type;
use crate::error::IoError;

/// S3-backed implementation of `Disk`.
///
/// Keys are stored under an optional prefix inside the bucket. `PutObject`
/// replaces an object atomically, so readers never see partial crops.
#[derive(Clone)]
pub struct S3Disk {
    client: Client,
    bucket: String,
    prefix: String,
    identifier: String,
}

impl S3Disk {
    /// Create a disk for `bucket`, optionally scoped to `prefix`.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: Option<&str>) -> Self {
        let bucket = bucket.into();
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .unwrap_or_default();
        let identifier = if prefix.is_empty() {
            format!("s3://{}", bucket)
        } else {
            format!("s3://{}/{}", bucket, prefix)
        };
        Self {
            client,
            bucket,
            prefix,
            identifier,
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Object key for a disk key.
    pub fn object_key(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    fn disk_key(&self, object_key: &str) -> String {
        if self.prefix.is_empty() {
            object_key.to_string()
        } else {
            object_key
                .strip_prefix(&self.prefix)
                .map(|k| k.trim_start_matches('/'))
                .unwrap_or(object_key)
                .to_string()
        }
    }

    async fn list_prefix(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> Result<Vec<String>, IoError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .max_keys(1000);

            if let Some(delimiter) = delimiter {
                request = request.delimiter(delimiter);
            }
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let result = request
                .send()
                .await
                .map_err(|e| IoError::S3(e.to_string()))?;

            for obj in result.contents() {
                if let Some(key) = obj.key() {
                    if !key.ends_with('/') {
                        keys.push(self.disk_key(key));
                    }
                }
            }

            if result.is_truncated() == Some(true) {
                continuation_token = result.next_continuation_token().map(|s| s.to_string());
            } else {
                break;
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Whether an SDK error means the object does not exist.
fn is_not_found<E, R>(err: &SdkError<E, R>) -> bool
where
    E: ProvideErrorMetadata + std::fmt::Debug,
    R: std::fmt::Debug,
{
    if let Some(code) = err.as_service_error().and_then(|se| se.code()) {
        if code == "NoSuchKey" || code == "NotFound" {
            return true;
        }
    }

    // HEAD responses carry no error body, so fall back to the message
    let err_str = format!("{:?}", err);
    err_str.contains("NotFound") || err_str.contains("NoSuchKey") || err_str.contains("404")
}

#[async_trait]
impl Disk for S3Disk {
    async fn read(&self, key: &str) -> Result<Bytes, IoError> {
        let object_key = self.object_key(key);
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    IoError::NotFound(format!("s3://{}/{}", self.bucket, object_key))
                } else {
                    IoError::S3(e.to_string())
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .into_bytes();

        Ok(data)
    }

    async fn write(&self, key: &str, data: Bytes) -> Result<(), IoError> {
        let object_key = self.object_key(key);
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(data));

        if let Some(content_type) = content_type(key) {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|e| IoError::S3(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, IoError> {
        let object_key = self.object_key(key);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let status_is_404 = e
                    .raw_response()
                    .map(|r| r.status().as_u16() == 404)
                    .unwrap_or(false);
                if status_is_404 || is_not_found(&e) {
                    Ok(false)
                } else {
                    Err(IoError::S3(e.to_string()))
                }
            }
        }
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>, IoError> {
        let dir = dir.trim_matches('/');
        let prefix = if dir.is_empty() {
            if self.prefix.is_empty() {
                String::new()
            } else {
                format!("{}/", self.prefix)
            }
        } else {
            format!("{}/", self.object_key(dir))
        };
        self.list_prefix(&prefix, Some("/")).await
    }

    async fn list_all(&self) -> Result<Vec<String>, IoError> {
        let prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        };
        self.list_prefix(&prefix, None).await
    }

    async fn delete(&self, key: &str) -> Result<(), IoError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| IoError::S3(e.to_string()))?;
        Ok(())
    }

    fn local_root(&self) -> Option<&Path> {
        None
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services usually need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
