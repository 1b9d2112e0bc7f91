use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{AppName, BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use cloud_profile::ClientSettings;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

use crate::store::{ClientFactory, ObjectHead, ObjectStorage, ObjectSummary, ProgressFn, PutOutcome};
use crate::{StorageError, StorageResult};

/// Identifies this plugin in the SDK user agent.
pub const APP_NAME: &str = "b2ai-comfyui";

/// Region used for signing when the configuration leaves it empty.
pub const FALLBACK_REGION: &str = "us-east-1";

const MAX_ATTEMPTS: u32 = 3;

/// Largest page S3 will return for a list call.
const MAX_PAGE_SIZE: usize = 1000;

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Turn an SDK failure into a [`StorageError`], keeping the service error
/// code when there is one. Replies without a body (HEAD) carry no code, so
/// those are classified by HTTP status.
fn map_sdk_error<E>(bucket: &str, key: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    SdkError<E, HttpResponse>: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = err.message().unwrap_or_default().to_string();
    if let Some(code) = err.code() {
        return StorageError::from_service(bucket, key, code, &message);
    }
    match &err {
        SdkError::ServiceError(context) => {
            let status = context.raw().status().as_u16();
            StorageError::from_status(bucket, key, status, &message)
        }
        _ => StorageError::backend(err),
    }
}

/// S3-compatible object storage backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct S3ObjectStorage {
    client: Client,
}

impl S3ObjectStorage {
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Build a client for the given settings: static credentials, adaptive
    /// retries, optional custom endpoint and path-style addressing.
    pub async fn connect(settings: &ClientSettings) -> StorageResult<Self> {
        let credentials = Credentials::new(
            settings.access_key.expose(),
            settings.secret_key.expose(),
            None,
            None,
            "cloud-profile",
        );

        let region = if settings.region.is_empty() {
            FALLBACK_REGION.to_string()
        } else {
            settings.region.clone()
        };

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::adaptive().with_max_attempts(MAX_ATTEMPTS))
            .app_name(AppName::new(APP_NAME).map_err(StorageError::backend)?);

        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let aws_config = loader.load().await;
        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(settings.force_path_style)
                .build(),
        );

        tracing::debug!(
            provider = %settings.provider,
            endpoint = settings.endpoint_url.as_deref().unwrap_or("(aws default)"),
            force_path_style = settings.force_path_style,
            "S3 client created"
        );

        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<PutOutcome> {
        let start = Instant::now();
        let size = body.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let result = request.send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = elapsed_ms(start),
                "S3 upload failed"
            );
            map_sdk_error(bucket, key, e)
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = elapsed_ms(start),
            "S3 upload successful"
        );

        Ok(PutOutcome {
            etag: result.e_tag,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let start = Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = elapsed_ms(start),
                    "S3 download failed"
                );
                map_sdk_error(bucket, key, e)
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(StorageError::backend)?
            .into_bytes();

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = data.len() as u64,
            duration_ms = elapsed_ms(start),
            "S3 download successful"
        );

        Ok(data)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHead> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(bucket, key, e))?;

        Ok(ObjectHead {
            size_bytes: result.content_length.unwrap_or(0).max(0) as u64,
            etag: result.e_tag.unwrap_or_default(),
            content_type: result.content_type,
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_items: usize,
    ) -> StorageResult<Vec<ObjectSummary>> {
        let start = Instant::now();
        let mut objects = Vec::new();
        if max_items == 0 {
            return Ok(objects);
        }

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_items.min(MAX_PAGE_SIZE) as i32)
            .into_paginator()
            .send();

        'pages: while let Some(page) = pages.next().await {
            let page = page.map_err(|e| map_sdk_error(bucket, prefix, e))?;
            for object in page.contents.unwrap_or_default() {
                if let Some(key) = object.key {
                    objects.push(ObjectSummary {
                        key,
                        size_bytes: object.size.unwrap_or(0).max(0) as u64,
                    });
                    if objects.len() >= max_items {
                        break 'pages;
                    }
                }
            }
        }

        tracing::debug!(
            bucket = %bucket,
            prefix = %prefix,
            count = objects.len(),
            duration_ms = elapsed_ms(start),
            "S3 list complete"
        );

        Ok(objects)
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let presigning_config = PresigningConfig::expires_in(expires_in).map_err(StorageError::backend)?;

        let presigned_request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| map_sdk_error(bucket, key, e))?;

        Ok(presigned_request.uri().to_string())
    }

    async fn download_to_path(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        progress: ProgressFn<'_>,
    ) -> StorageResult<u64> {
        let start = Instant::now();

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(bucket, key, e))?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;

        while let Some(chunk) = body.try_next().await.map_err(StorageError::backend)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress(chunk.len() as u64);
        }
        file.flush().await?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = written,
            duration_ms = elapsed_ms(start),
            path = %path.display(),
            "S3 download to file successful"
        );

        Ok(written)
    }
}

/// Connects [`S3ObjectStorage`] clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3ClientFactory;

#[async_trait]
impl ClientFactory for S3ClientFactory {
    async fn connect(&self, settings: &ClientSettings) -> StorageResult<Arc<dyn ObjectStorage>> {
        Ok(Arc::new(S3ObjectStorage::connect(settings).await?))
    }
}
