//! # cloud-storage: generated media on S3-compatible object storage
//!
//! `cloud-storage` implements the storage nodes of an image-generation
//! host: save images, video and audio; load images and models; list a
//! bucket and share objects through presigned URLs. Configuration comes
//! from [`cloud_profile`].
//!
//! ## Quick Start
//!
//! ```rust
//! use cloud_storage::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> StorageResult<()> {
//! let env = MapEnv::new()
//!     .with("COMFY_S3_ACCESS_KEY", "key")
//!     .with("COMFY_S3_SECRET_KEY", "secret")
//!     .with("COMFY_S3_BUCKET", "renders");
//! let resolver = ProfileResolver::new(env, MemoryProfileStore::new());
//! let adapter = CloudAdapter::new(resolver, MemoryClientFactory::default(), AdapterConfig::default());
//!
//! let image = ImageTensor::new(2, 2, 3, vec![0.5; 12])?;
//! let uris = adapter
//!     .save_images(&[image], &SaveImageRequest::new(), None, None)
//!     .await?;
//! assert_eq!(uris, vec!["s3://renders/comfyui/images/ComfyUI_0.png"]);
//!
//! let listing = adapter.list_bucket("comfyui/", None, None).await?;
//! assert!(listing.starts_with("comfyui/images/ComfyUI_0.png  ("));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   Host nodes     │  ← tensors, media sources, model directories
//! ├──────────────────┤
//! │   CloudAdapter   │  ← key shaping, encoding, model cache
//! ├──────────────────┤
//! │  ObjectStorage   │  ← S3 (feature `s3`) or in-memory
//! └──────────────────┘
//! ```
//!
//! Every operation validates the resolved profile before a client is
//! built, so missing credentials fail fast with a message naming the
//! environment variable and the profile file to fix.

mod adapter;
mod browse;
mod config;
mod error;
pub mod keys;
mod load;
pub mod media;
mod memory;
pub mod model_cache;
#[cfg(feature = "s3")]
mod s3;
mod save;
pub mod store;
mod types;

pub use adapter::CloudAdapter;
pub use config::AdapterConfig;
pub use error::{StorageError, StorageResult};
pub use media::{
    AudioFormat, AudioSource, EncodedVideo, ImageFileFormat, ImageTensor, Mask, VideoFormat,
    VideoSource, WorkflowMetadata,
};
pub use memory::{MemoryClientFactory, MemoryObjectStorage};
pub use model_cache::{
    ModelDirectories, ModelType, NoProgress, ProgressReporter, StaticModelDirectories,
};
#[cfg(feature = "s3")]
pub use s3::{S3ClientFactory, S3ObjectStorage, APP_NAME, FALLBACK_REGION};
pub use store::{ClientFactory, ObjectHead, ObjectStorage, ObjectSummary, PutOutcome};
pub use types::{SaveAudioRequest, SaveImageRequest, SaveVideoRequest};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AdapterConfig, CloudAdapter, ImageFileFormat, ImageTensor, MemoryClientFactory,
        ModelType, SaveImageRequest, StorageError, StorageResult,
    };
    pub use cloud_profile::prelude::*;
}
