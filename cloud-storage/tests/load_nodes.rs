use async_trait::async_trait;
use bytes::Bytes;
use cloud_profile::{ClientSettings, MapEnv, MemoryProfileStore, ProfileResolver, StorageConfig};
use cloud_storage::media::encode_image;
use cloud_storage::store::ProgressFn;
use cloud_storage::{
    AdapterConfig, ClientFactory, CloudAdapter, ImageFileFormat, ImageTensor,
    MemoryClientFactory, MemoryObjectStorage, ModelType, NoProgress, ObjectHead, ObjectStorage,
    ObjectSummary, PutOutcome, StaticModelDirectories, StorageError, StorageResult,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_test::traced_test;

/// Test factory functions
fn credentials_env() -> MapEnv {
    MapEnv::new()
        .with("COMFY_S3_ACCESS_KEY", "key")
        .with("COMFY_S3_SECRET_KEY", "secret")
        .with("COMFY_S3_BUCKET", "assets")
}

fn adapter_for(storage: &MemoryObjectStorage, env: MapEnv) -> CloudAdapter {
    CloudAdapter::new(
        ProfileResolver::new(env, MemoryProfileStore::new()),
        MemoryClientFactory::new(storage.clone()),
        AdapterConfig::default(),
    )
}

fn with_prefix(adapter: &CloudAdapter, prefix: &str) -> StorageConfig {
    StorageConfig {
        path_prefix: prefix.to_string(),
        ..adapter.resolver().resolve_default()
    }
}

fn png(width: u32, height: u32, channels: u8, value: f32) -> Bytes {
    let len = (width * height) as usize * channels as usize;
    let tensor = ImageTensor::new(width, height, channels, vec![value; len]).unwrap();
    Bytes::from(encode_image(&tensor, ImageFileFormat::Png, 95, None).unwrap())
}

async fn put(storage: &MemoryObjectStorage, key: &str, body: Bytes) -> String {
    storage
        .put_object("assets", key, body, None)
        .await
        .unwrap()
        .etag
        .unwrap()
}

/// Answers every call with a fixed service error.
struct RejectingStorage {
    code: &'static str,
}

#[async_trait]
impl ObjectStorage for RejectingStorage {
    async fn put_object(&self, bucket: &str, key: &str, _: Bytes, _: Option<&str>) -> StorageResult<PutOutcome> {
        Err(StorageError::from_service(bucket, key, self.code, "rejected"))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        Err(StorageError::from_service(bucket, key, self.code, "rejected"))
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHead> {
        Err(StorageError::from_service(bucket, key, self.code, "rejected"))
    }

    async fn list_objects(&self, bucket: &str, prefix: &str, _: usize) -> StorageResult<Vec<ObjectSummary>> {
        Err(StorageError::from_service(bucket, prefix, self.code, "rejected"))
    }

    async fn presign_get(&self, bucket: &str, key: &str, _: Duration) -> StorageResult<String> {
        Err(StorageError::from_service(bucket, key, self.code, "rejected"))
    }

    async fn download_to_path(
        &self,
        bucket: &str,
        key: &str,
        _: &Path,
        _: ProgressFn<'_>,
    ) -> StorageResult<u64> {
        Err(StorageError::from_service(bucket, key, self.code, "rejected"))
    }
}

struct RejectingFactory(&'static str);

#[async_trait]
impl ClientFactory for RejectingFactory {
    async fn connect(&self, _: &ClientSettings) -> StorageResult<Arc<dyn ObjectStorage>> {
        Ok(Arc::new(RejectingStorage { code: self.0 }))
    }
}

fn rejecting_adapter(code: &'static str) -> CloudAdapter {
    CloudAdapter::new(
        ProfileResolver::new(credentials_env(), MemoryProfileStore::new()),
        RejectingFactory(code),
        AdapterConfig::default(),
    )
}

/// Delegates to memory storage, counting HEAD calls and optionally cutting
/// every download short after writing part of the file.
struct FlakyStorage {
    inner: MemoryObjectStorage,
    heads: AtomicUsize,
    cut_downloads: bool,
}

impl FlakyStorage {
    fn new(inner: MemoryObjectStorage, cut_downloads: bool) -> Self {
        Self {
            inner,
            heads: AtomicUsize::new(0),
            cut_downloads,
        }
    }
}

#[async_trait]
impl ObjectStorage for FlakyStorage {
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes, ct: Option<&str>) -> StorageResult<PutOutcome> {
        self.inner.put_object(bucket, key, body, ct).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        self.inner.get_object(bucket, key).await
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHead> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        self.inner.head_object(bucket, key).await
    }

    async fn list_objects(&self, bucket: &str, prefix: &str, max: usize) -> StorageResult<Vec<ObjectSummary>> {
        self.inner.list_objects(bucket, prefix, max).await
    }

    async fn presign_get(&self, bucket: &str, key: &str, expires: Duration) -> StorageResult<String> {
        self.inner.presign_get(bucket, key, expires).await
    }

    async fn download_to_path(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        progress: ProgressFn<'_>,
    ) -> StorageResult<u64> {
        if !self.cut_downloads {
            return self.inner.download_to_path(bucket, key, path, progress).await;
        }
        tokio::fs::write(path, b"partial").await?;
        progress(7);
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset").into())
    }
}

struct SharedFactory(Arc<FlakyStorage>);

#[async_trait]
impl ClientFactory for SharedFactory {
    async fn connect(&self, _: &ClientSettings) -> StorageResult<Arc<dyn ObjectStorage>> {
        Ok(self.0.clone())
    }
}

fn flaky_adapter(storage: &Arc<FlakyStorage>) -> CloudAdapter {
    CloudAdapter::new(
        ProfileResolver::new(credentials_env(), MemoryProfileStore::new()),
        SharedFactory(storage.clone()),
        AdapterConfig::default(),
    )
}

#[tokio::test]
async fn test_load_image_applies_path_prefix() {
    let storage = MemoryObjectStorage::new();
    put(&storage, "team/inputs/a.png", png(4, 3, 3, 1.0)).await;
    let adapter = adapter_for(&storage, credentials_env());

    let (image, mask) = adapter
        .load_image("inputs/a.png", Some(with_prefix(&adapter, "team/")))
        .await
        .unwrap();

    assert_eq!((image.width(), image.height(), image.channels()), (4, 3, 3));
    assert!(image.data().iter().all(|v| *v == 1.0));
    assert_eq!((mask.width(), mask.height()), (4, 3));
    assert!(mask.data().iter().all(|v| *v == 0.0));
}

#[tokio::test]
async fn test_load_image_absolute_key_skips_prefix() {
    let storage = MemoryObjectStorage::new();
    put(&storage, "/shared/a.png", png(2, 2, 4, 0.0)).await;
    let adapter = adapter_for(&storage, credentials_env());

    let (_, mask) = adapter
        .load_image("/shared/a.png", Some(with_prefix(&adapter, "team/")))
        .await
        .unwrap();

    // Fully transparent
    assert!(mask.data().iter().all(|v| *v == 1.0));
}

#[tokio::test]
async fn test_load_missing_image() {
    let storage = MemoryObjectStorage::new();
    let adapter = adapter_for(&storage, credentials_env());

    let err = adapter.load_image("nope.png", None).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Object not found: s3://assets/nope.png");
}

#[tokio::test]
async fn test_image_fingerprint_follows_etag() {
    let storage = MemoryObjectStorage::new();
    let first = put(&storage, "a.png", png(1, 1, 3, 0.5)).await;
    let adapter = adapter_for(&storage, credentials_env());

    assert_eq!(adapter.image_fingerprint("a.png", None).await, first);

    let second = put(&storage, "a.png", png(1, 1, 3, 0.2)).await;
    assert_ne!(first, second);
    assert_eq!(adapter.image_fingerprint("a.png", None).await, second);
}

#[tokio::test]
async fn test_image_fingerprint_is_empty_on_failure() {
    let storage = MemoryObjectStorage::new();
    assert_eq!(
        adapter_for(&storage, credentials_env()).image_fingerprint("missing.png", None).await,
        ""
    );
    assert_eq!(
        adapter_for(&storage, MapEnv::new()).image_fingerprint("a.png", None).await,
        ""
    );
}

#[tokio::test]
async fn test_load_model_downloads_and_records_etag() {
    let storage = MemoryObjectStorage::new();
    let body = Bytes::from(vec![7u8; 200 * 1024]);
    let etag = put(&storage, "models/sd_xl_base_1.0.safetensors", body.clone()).await;
    let adapter = adapter_for(&storage, credentials_env());
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());

    let updates = Mutex::new(Vec::new());
    let progress = |done: u64, total: u64| updates.lock().unwrap().push((done, total));

    let filename = adapter
        .load_model(
            ModelType::Checkpoints,
            "models/sd_xl_base_1.0.safetensors",
            false,
            &dirs,
            &progress,
            None,
        )
        .await
        .unwrap();

    assert_eq!(filename, "sd_xl_base_1.0.safetensors");
    let local = root.path().join("checkpoints").join(&filename);
    assert_eq!(std::fs::read(&local).unwrap(), body.to_vec());
    assert_eq!(
        std::fs::read_to_string(local.with_extension("safetensors.s3etag")).unwrap(),
        etag
    );
    assert!(!local.with_extension("safetensors.download").exists());

    let updates = updates.into_inner().unwrap();
    assert!(updates.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(updates.last(), Some(&(body.len() as u64, body.len() as u64)));
}

#[tokio::test]
async fn test_load_model_cache_hit_skips_download() {
    let storage = MemoryObjectStorage::new();
    put(&storage, "lora.safetensors", Bytes::from_static(b"weights")).await;
    let adapter = adapter_for(&storage, credentials_env());
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());

    adapter
        .load_model(ModelType::Loras, "lora.safetensors", false, &dirs, &NoProgress, None)
        .await
        .unwrap();

    let local = root.path().join("loras/lora.safetensors");
    std::fs::write(&local, b"edited locally").unwrap();

    let calls = Mutex::new(0usize);
    let progress = |_: u64, _: u64| *calls.lock().unwrap() += 1;
    adapter
        .load_model(ModelType::Loras, "lora.safetensors", false, &dirs, &progress, None)
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), 0);
    assert_eq!(std::fs::read(&local).unwrap(), b"edited locally");
}

#[tokio::test]
async fn test_load_model_refreshes_on_remote_change() {
    let storage = MemoryObjectStorage::new();
    put(&storage, "vae.pt", Bytes::from_static(b"v1")).await;
    let adapter = adapter_for(&storage, credentials_env());
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());

    adapter
        .load_model(ModelType::Vae, "vae.pt", false, &dirs, &NoProgress, None)
        .await
        .unwrap();
    let etag = put(&storage, "vae.pt", Bytes::from_static(b"v2")).await;
    adapter
        .load_model(ModelType::Vae, "vae.pt", false, &dirs, &NoProgress, None)
        .await
        .unwrap();

    assert_eq!(std::fs::read(root.path().join("vae/vae.pt")).unwrap(), b"v2");
    assert_eq!(
        std::fs::read_to_string(root.path().join("vae/vae.pt.s3etag")).unwrap(),
        etag
    );
}

#[tokio::test]
async fn test_load_model_without_sidecar_redownloads() {
    let storage = MemoryObjectStorage::new();
    put(&storage, "emb.pt", Bytes::from_static(b"remote")).await;
    let adapter = adapter_for(&storage, credentials_env());
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());
    std::fs::create_dir_all(root.path().join("embeddings")).unwrap();
    std::fs::write(root.path().join("embeddings/emb.pt"), b"stale").unwrap();

    adapter
        .load_model(ModelType::Embeddings, "emb.pt", false, &dirs, &NoProgress, None)
        .await
        .unwrap();

    assert_eq!(std::fs::read(root.path().join("embeddings/emb.pt")).unwrap(), b"remote");
}

#[tokio::test]
async fn test_force_redownload() {
    let storage = MemoryObjectStorage::new();
    put(&storage, "up.pth", Bytes::from_static(b"remote")).await;
    let adapter = adapter_for(&storage, credentials_env());
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());

    adapter
        .load_model(ModelType::UpscaleModels, "up.pth", false, &dirs, &NoProgress, None)
        .await
        .unwrap();
    std::fs::write(root.path().join("upscale_models/up.pth"), b"tampered").unwrap();

    adapter
        .load_model(ModelType::UpscaleModels, "up.pth", true, &dirs, &NoProgress, None)
        .await
        .unwrap();

    assert_eq!(std::fs::read(root.path().join("upscale_models/up.pth")).unwrap(), b"remote");
}

#[tokio::test]
#[traced_test]
async fn test_unverifiable_cache_is_used() {
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());
    std::fs::create_dir_all(root.path().join("controlnet")).unwrap();
    std::fs::write(root.path().join("controlnet/cn.safetensors"), b"local").unwrap();

    // Remote object is gone
    let storage = MemoryObjectStorage::new();
    let filename = adapter_for(&storage, credentials_env())
        .load_model(ModelType::Controlnet, "cn.safetensors", false, &dirs, &NoProgress, None)
        .await
        .unwrap();

    assert_eq!(filename, "cn.safetensors");
    assert!(logs_contain("could not verify cached model"));
}

#[tokio::test]
async fn test_credential_errors_bypass_cache() {
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());
    std::fs::create_dir_all(root.path().join("loras")).unwrap();
    std::fs::write(root.path().join("loras/l.safetensors"), b"local").unwrap();

    let err = rejecting_adapter("AccessDenied")
        .load_model(ModelType::Loras, "l.safetensors", false, &dirs, &NoProgress, None)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::AccessDenied { .. }));

    let filename = rejecting_adapter("SlowDown")
        .load_model(ModelType::Loras, "l.safetensors", false, &dirs, &NoProgress, None)
        .await
        .unwrap();
    assert_eq!(filename, "l.safetensors");
}

#[tokio::test]
async fn test_missing_model_leaves_no_files() {
    let storage = MemoryObjectStorage::new();
    let adapter = adapter_for(&storage, credentials_env());
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());

    let err = adapter
        .load_model(ModelType::ClipVision, "models/absent.bin", false, &dirs, &NoProgress, None)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Object not found: s3://assets/models/absent.bin");
    assert!(!root.path().join("clip_vision/absent.bin").exists());
    assert!(!root.path().join("clip_vision/absent.bin.download").exists());
}

#[tokio::test]
async fn test_model_type_without_directory() {
    let storage = MemoryObjectStorage::new();
    put(&storage, "m.bin", Bytes::from_static(b"x")).await;
    let adapter = adapter_for(&storage, credentials_env());

    let err = adapter
        .load_model(
            ModelType::Vae,
            "m.bin",
            false,
            &StaticModelDirectories::new(),
            &NoProgress,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Invalid { .. }));
}

#[tokio::test]
async fn test_interrupted_download_leaves_no_files() {
    let memory = MemoryObjectStorage::new();
    put(&memory, "models/big.safetensors", Bytes::from(vec![1u8; 4096])).await;
    let storage = Arc::new(FlakyStorage::new(memory, true));
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());

    let err = flaky_adapter(&storage)
        .load_model(ModelType::DiffusionModels, "models/big.safetensors", false, &dirs, &NoProgress, None)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Io { .. }), "{err}");
    let dir = root.path().join("diffusion_models");
    assert!(!dir.join("big.safetensors").exists());
    assert!(!dir.join("big.safetensors.download").exists());
    assert!(!dir.join("big.safetensors.s3etag").exists());
}

#[tokio::test]
async fn test_stale_cache_checks_remote_once() {
    let memory = MemoryObjectStorage::new();
    put(&memory, "te.safetensors", Bytes::from_static(b"remote")).await;
    let storage = Arc::new(FlakyStorage::new(memory, false));
    let root = tempfile::tempdir().unwrap();
    let dirs = StaticModelDirectories::under_root(root.path());
    std::fs::create_dir_all(root.path().join("text_encoders")).unwrap();
    std::fs::write(root.path().join("text_encoders/te.safetensors"), b"stale").unwrap();

    flaky_adapter(&storage)
        .load_model(ModelType::TextEncoders, "te.safetensors", false, &dirs, &NoProgress, None)
        .await
        .unwrap();

    assert_eq!(storage.heads.load(Ordering::SeqCst), 1);
    assert_eq!(
        std::fs::read(root.path().join("text_encoders/te.safetensors")).unwrap(),
        b"remote"
    );
}
