use async_trait::async_trait;
use bytes::Bytes;
use cloud_profile::ClientSettings;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::store::{ClientFactory, ObjectHead, ObjectStorage, ObjectSummary, ProgressFn, PutOutcome};
use crate::{StorageError, StorageResult};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    content_type: Option<String>,
    etag: String,
}

#[derive(Debug, Default)]
struct Buckets {
    objects: BTreeMap<(String, String), StoredObject>,
    version: u64,
}

/// Object storage held in process memory. Keys list in lexical order like
/// S3. Entity tags change on every write.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStorage {
    inner: Arc<Mutex<Buckets>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buckets> {
        // A poisoned map is still structurally valid.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn object(&self, bucket: &str, key: &str) -> StorageResult<StoredObject> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }

    /// Content type of a stored object, if any.
    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.object(bucket, key).ok().and_then(|o| o.content_type)
    }

    /// All keys in a bucket.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<PutOutcome> {
        let mut buckets = self.lock();
        buckets.version += 1;
        let etag = format!("\"mem-{}\"", buckets.version);
        buckets.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body,
                content_type: content_type.map(str::to_string),
                etag: etag.clone(),
            },
        );
        Ok(PutOutcome { etag: Some(etag) })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        Ok(self.object(bucket, key)?.body)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHead> {
        let object = self.object(bucket, key)?;
        Ok(ObjectHead {
            size_bytes: object.body.len() as u64,
            etag: object.etag,
            content_type: object.content_type,
        })
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_items: usize,
    ) -> StorageResult<Vec<ObjectSummary>> {
        Ok(self
            .lock()
            .objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .take(max_items)
            .map(|((_, key), object)| ObjectSummary {
                key: key.clone(),
                size_bytes: object.body.len() as u64,
            })
            .collect())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "memory://{}/{}?expires={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }

    async fn download_to_path(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        progress: ProgressFn<'_>,
    ) -> StorageResult<u64> {
        let body = self.object(bucket, key)?.body;
        let mut file = tokio::fs::File::create(path).await?;
        for chunk in body.chunks(CHUNK_SIZE) {
            file.write_all(chunk).await?;
            progress(chunk.len() as u64);
        }
        file.flush().await?;
        Ok(body.len() as u64)
    }
}

/// Hands out the same in-memory store for every connection.
#[derive(Debug, Clone, Default)]
pub struct MemoryClientFactory {
    storage: MemoryObjectStorage,
}

impl MemoryClientFactory {
    pub fn new(storage: MemoryObjectStorage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &MemoryObjectStorage {
        &self.storage
    }
}

#[async_trait]
impl ClientFactory for MemoryClientFactory {
    async fn connect(&self, _settings: &ClientSettings) -> StorageResult<Arc<dyn ObjectStorage>> {
        Ok(Arc::new(self.storage.clone()))
    }
}
