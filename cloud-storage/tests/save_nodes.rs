use async_trait::async_trait;
use bytes::Bytes;
use cloud_profile::{
    ClientSettings, MapEnv, MemoryProfileStore, PartialConfig, ProfileResolver, StorageConfig,
};
use cloud_storage::media::png_text_chunks;
use cloud_storage::{
    AdapterConfig, AudioFormat, AudioSource, ClientFactory, CloudAdapter, EncodedVideo,
    ImageFileFormat, ImageTensor, MemoryClientFactory, MemoryObjectStorage, ObjectStorage,
    SaveAudioRequest, SaveImageRequest, SaveVideoRequest, StorageError, StorageResult,
    VideoFormat, VideoSource, WorkflowMetadata,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Test factory functions
fn credentials_env() -> MapEnv {
    MapEnv::new()
        .with("COMFY_S3_ACCESS_KEY", "key")
        .with("COMFY_S3_SECRET_KEY", "secret")
        .with("COMFY_S3_BUCKET", "renders")
}

fn adapter_with(env: MapEnv, config: AdapterConfig) -> (CloudAdapter, MemoryObjectStorage) {
    let storage = MemoryObjectStorage::new();
    let adapter = CloudAdapter::new(
        ProfileResolver::new(env, MemoryProfileStore::new()),
        MemoryClientFactory::new(storage.clone()),
        config,
    );
    (adapter, storage)
}

fn adapter() -> (CloudAdapter, MemoryObjectStorage) {
    adapter_with(credentials_env(), AdapterConfig::default())
}

fn gray(value: f32) -> ImageTensor {
    ImageTensor::new(3, 2, 3, vec![value; 18]).unwrap()
}

fn workflow() -> WorkflowMetadata {
    WorkflowMetadata::new()
        .with_prompt(json!({"3": {"class_type": "KSampler"}}))
        .with_extra("workflow", json!({"nodes": [1, 2]}))
}

/// Counts connections so tests can prove storage was never reached.
#[derive(Default)]
struct CountingFactory {
    connects: Arc<AtomicUsize>,
    inner: MemoryClientFactory,
}

#[async_trait]
impl ClientFactory for CountingFactory {
    async fn connect(&self, settings: &ClientSettings) -> StorageResult<Arc<dyn ObjectStorage>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.connect(settings).await
    }
}

struct FakeVideo {
    seen_metadata: Mutex<Option<Option<Value>>>,
}

impl FakeVideo {
    fn new() -> Self {
        Self {
            seen_metadata: Mutex::new(None),
        }
    }
}

impl VideoSource for FakeVideo {
    fn encode(&self, format: &VideoFormat, metadata: Option<&Value>) -> StorageResult<EncodedVideo> {
        *self.seen_metadata.lock().unwrap() = Some(metadata.cloned());
        let extension = if format.container == "auto" { "mp4" } else { format.container.as_str() };
        Ok(EncodedVideo {
            bytes: Bytes::from_static(b"\x00\x00\x00\x18ftypmp42"),
            extension: extension.to_string(),
            content_type: Some("video/mp4".to_string()),
        })
    }
}

struct FakeAudio;

impl AudioSource for FakeAudio {
    fn encode(&self, format: AudioFormat) -> StorageResult<Bytes> {
        Ok(Bytes::from(format!("{format}-bytes")))
    }
}

#[tokio::test]
async fn test_save_images_keys_and_uris() {
    let (adapter, storage) = adapter();
    let profile = StorageConfig {
        path_prefix: "team/".to_string(),
        ..adapter.resolver().resolve_default()
    };

    let uris = adapter
        .save_images(&[gray(0.1), gray(0.9)], &SaveImageRequest::new(), None, Some(profile))
        .await
        .unwrap();

    assert_eq!(
        uris,
        vec![
            "s3://renders/team/comfyui/images/ComfyUI_0.png",
            "s3://renders/team/comfyui/images/ComfyUI_1.png",
        ]
    );
    assert_eq!(
        storage.content_type("renders", "team/comfyui/images/ComfyUI_0.png").as_deref(),
        Some("image/png")
    );
}

#[tokio::test]
async fn test_save_images_custom_name_and_format() {
    let (adapter, storage) = adapter();
    let request = SaveImageRequest::new()
        .with_key_prefix("out/")
        .with_filename("shot_%batch_num%_final")
        .with_format(ImageFileFormat::Jpg)
        .with_quality(70);

    let uris = adapter.save_images(&[gray(0.5)], &request, None, None).await.unwrap();

    assert_eq!(uris, vec!["s3://renders/out/shot_0_final.jpg"]);
    assert_eq!(
        storage.content_type("renders", "out/shot_0_final.jpg").as_deref(),
        Some("image/jpeg")
    );
    let body = storage.get_object("renders", "out/shot_0_final.jpg").await.unwrap();
    assert_eq!(&body[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_png_carries_workflow_metadata() {
    let (adapter, storage) = adapter();
    let meta = workflow();

    adapter
        .save_images(&[gray(0.5)], &SaveImageRequest::new(), Some(&meta), None)
        .await
        .unwrap();

    let body = storage.get_object("renders", "comfyui/images/ComfyUI_0.png").await.unwrap();
    let chunks = png_text_chunks(&body).unwrap();
    assert_eq!(
        chunks,
        vec![
            ("prompt".to_string(), r#"{"3":{"class_type":"KSampler"}}"#.to_string()),
            ("workflow".to_string(), r#"{"nodes":[1,2]}"#.to_string()),
        ]
    );
}

#[tokio::test]
async fn test_metadata_can_be_disabled() {
    let (adapter, storage) = adapter_with(credentials_env(), AdapterConfig::new().disable_metadata());
    let meta = workflow();

    adapter
        .save_images(&[gray(0.5)], &SaveImageRequest::new(), Some(&meta), None)
        .await
        .unwrap();

    let body = storage.get_object("renders", "comfyui/images/ComfyUI_0.png").await.unwrap();
    assert!(png_text_chunks(&body).unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_quality_is_rejected() {
    let (adapter, storage) = adapter();
    let request = SaveImageRequest::new().with_quality(0);

    let err = adapter.save_images(&[gray(0.5)], &request, None, None).await.unwrap_err();

    assert!(matches!(err, StorageError::Invalid { .. }));
    assert!(storage.keys("renders").is_empty());
}

#[tokio::test]
async fn test_missing_credentials_fail_before_connecting() {
    let factory = CountingFactory::default();
    let connects = factory.connects.clone();
    let adapter = CloudAdapter::new(
        ProfileResolver::new(
            MapEnv::new().with("COMFY_S3_BUCKET", "renders"),
            MemoryProfileStore::new(),
        ),
        factory,
        AdapterConfig::default(),
    );

    let err = adapter
        .save_images(&[gray(0.5)], &SaveImageRequest::new(), None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Config(_)));
    assert!(err.to_string().contains("COMFY_S3_ACCESS_KEY"));
    assert_eq!(connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_connected_profile_wins_over_env() {
    let store = MemoryProfileStore::new().with_profile(
        "archive",
        PartialConfig::new().with_bucket("archive-bucket"),
    );
    let storage = MemoryObjectStorage::new();
    let adapter = CloudAdapter::new(
        ProfileResolver::new(credentials_env(), store),
        MemoryClientFactory::new(storage.clone()),
        AdapterConfig::default(),
    );
    let profile = adapter
        .profile(&"archive".into(), &Default::default())
        .unwrap();

    let uris = adapter
        .save_images(&[gray(0.5)], &SaveImageRequest::new(), None, Some(profile))
        .await
        .unwrap();

    assert_eq!(uris, vec!["s3://archive-bucket/comfyui/images/ComfyUI_0.png"]);
    assert!(storage.keys("renders").is_empty());
}

#[tokio::test]
async fn test_save_video_passes_metadata_to_host() {
    let (adapter, storage) = adapter();
    let video = FakeVideo::new();

    let uri = adapter
        .save_video(&video, &SaveVideoRequest::new(), Some(&workflow()), None)
        .await
        .unwrap();

    assert_eq!(uri, "s3://renders/comfyui/videos/ComfyUI_video.mp4");
    assert_eq!(
        storage.content_type("renders", "comfyui/videos/ComfyUI_video.mp4").as_deref(),
        Some("video/mp4")
    );
    let seen = video.seen_metadata.lock().unwrap().clone().unwrap();
    assert_eq!(
        seen,
        Some(json!({
            "workflow": {"nodes": [1, 2]},
            "prompt": {"3": {"class_type": "KSampler"}}
        }))
    );
}

#[tokio::test]
async fn test_save_video_without_metadata() {
    let (adapter, _storage) = adapter_with(credentials_env(), AdapterConfig::new().disable_metadata());
    let video = FakeVideo::new();
    let request = SaveVideoRequest::new().with_filename("clip").with_format("webm", "vp9");

    let uri = adapter
        .save_video(&video, &request, Some(&workflow()), None)
        .await
        .unwrap();

    assert_eq!(uri, "s3://renders/comfyui/videos/clip.webm");
    assert_eq!(*video.seen_metadata.lock().unwrap(), Some(None));
}

#[tokio::test]
async fn test_save_audio_formats() {
    let (adapter, storage) = adapter();

    let uri = adapter
        .save_audio(&FakeAudio, &SaveAudioRequest::new().with_format(AudioFormat::Mp3), None)
        .await
        .unwrap();

    assert_eq!(uri, "s3://renders/comfyui/audio/ComfyUI_audio.mp3");
    assert_eq!(
        storage.content_type("renders", "comfyui/audio/ComfyUI_audio.mp3").as_deref(),
        Some("audio/mpeg")
    );
    let body = storage.get_object("renders", "comfyui/audio/ComfyUI_audio.mp3").await.unwrap();
    assert_eq!(&body[..], b"mp3-bytes");
}
