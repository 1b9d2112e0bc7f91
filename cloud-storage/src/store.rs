use async_trait::async_trait;
use bytes::Bytes;
use cloud_profile::ClientSettings;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::StorageResult;

/// Called with the size of each chunk as it lands on disk.
pub type ProgressFn<'a> = &'a (dyn Fn(u64) + Send + Sync);

/// Object storage operations the nodes need. Signing, retries, pagination
/// and transfer belong to the implementation's client library.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a whole object
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<PutOutcome>;

    /// Download a whole object into memory
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Object metadata without content
    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHead>;

    /// Keys under `prefix`, at most `max_items`, in listing order
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        max_items: usize,
    ) -> StorageResult<Vec<ObjectSummary>>;

    /// Time-limited GET URL
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Stream an object to `path`, reporting progress per chunk. Returns
    /// the number of bytes written.
    async fn download_to_path(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        progress: ProgressFn<'_>,
    ) -> StorageResult<u64>;
}

/// Builds a storage client for resolved settings.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, settings: &ClientSettings) -> StorageResult<Arc<dyn ObjectStorage>>;
}

/// Result of a successful put
#[derive(Debug, Clone, Default)]
pub struct PutOutcome {
    pub etag: Option<String>,
}

/// Metadata about an object
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    pub size_bytes: u64,
    /// Change fingerprint; empty when the store gives none.
    pub etag: String,
    pub content_type: Option<String>,
}

/// One listed object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size_bytes: u64,
}

impl ObjectSummary {
    /// `"<key>  (<size> MB)"` with one decimal.
    pub fn display_line(&self) -> String {
        let size_mb = self.size_bytes as f64 / (1024.0 * 1024.0);
        format!("{}  ({:.1} MB)", self.key, size_mb)
    }
}
