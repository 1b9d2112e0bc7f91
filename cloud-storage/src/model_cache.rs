//! Local cache for downloaded model files.
//!
//! A model lives at `<first directory for its type>/<basename of key>`. Next
//! to it, `<file>.s3etag` records the entity tag it was downloaded at, and
//! `<file>.download` holds a transfer in progress.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{StorageError, StorageResult};

pub const ETAG_SUFFIX: &str = ".s3etag";
pub const DOWNLOAD_SUFFIX: &str = ".download";

/// Model categories the host keeps in separate directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelType {
    #[default]
    Checkpoints,
    Loras,
    Vae,
    TextEncoders,
    Controlnet,
    DiffusionModels,
    UpscaleModels,
    Embeddings,
    ClipVision,
}

impl ModelType {
    pub const ALL: [ModelType; 9] = [
        ModelType::Checkpoints,
        ModelType::Loras,
        ModelType::Vae,
        ModelType::TextEncoders,
        ModelType::Controlnet,
        ModelType::DiffusionModels,
        ModelType::UpscaleModels,
        ModelType::Embeddings,
        ModelType::ClipVision,
    ];

    /// Folder name the host uses for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Checkpoints => "checkpoints",
            ModelType::Loras => "loras",
            ModelType::Vae => "vae",
            ModelType::TextEncoders => "text_encoders",
            ModelType::Controlnet => "controlnet",
            ModelType::DiffusionModels => "diffusion_models",
            ModelType::UpscaleModels => "upscale_models",
            ModelType::Embeddings => "embeddings",
            ModelType::ClipVision => "clip_vision",
        }
    }
}

impl FromStr for ModelType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StorageError::invalid(format!("unknown model type: {s}")))
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host capability listing the directories configured per model type.
pub trait ModelDirectories: Send + Sync {
    fn directories(&self, model_type: ModelType) -> Vec<PathBuf>;
}

/// Fixed directory table.
#[derive(Debug, Clone, Default)]
pub struct StaticModelDirectories {
    dirs: HashMap<ModelType, Vec<PathBuf>>,
}

impl StaticModelDirectories {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<root>/<type>` for every model type.
    pub fn under_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let dirs = ModelType::ALL
            .into_iter()
            .map(|t| (t, vec![root.join(t.as_str())]))
            .collect();
        Self { dirs }
    }

    pub fn with_directory(mut self, model_type: ModelType, dir: impl Into<PathBuf>) -> Self {
        self.dirs.entry(model_type).or_default().push(dir.into());
        self
    }
}

impl ModelDirectories for StaticModelDirectories {
    fn directories(&self, model_type: ModelType) -> Vec<PathBuf> {
        self.dirs.get(&model_type).cloned().unwrap_or_default()
    }
}

/// Receives absolute download progress.
pub trait ProgressReporter: Send + Sync {
    fn update_absolute(&self, downloaded: u64, total: u64);
}

impl<F> ProgressReporter for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn update_absolute(&self, downloaded: u64, total: u64) {
        self(downloaded, total)
    }
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update_absolute(&self, _downloaded: u64, _total: u64) {}
}

/// Files involved in caching one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedModel {
    pub filename: String,
    pub local_path: PathBuf,
    pub etag_path: PathBuf,
    pub temp_path: PathBuf,
}

impl CachedModel {
    pub fn locate(
        dirs: &dyn ModelDirectories,
        model_type: ModelType,
        filename: &str,
    ) -> StorageResult<Self> {
        let dir = dirs.directories(model_type).into_iter().next().ok_or_else(|| {
            StorageError::invalid(format!("No directory configured for model type: {model_type}"))
        })?;
        if filename.is_empty() {
            return Err(StorageError::invalid("model key has no file name"));
        }

        let local_path = dir.join(filename);
        Ok(Self {
            filename: filename.to_string(),
            etag_path: with_suffix(&local_path, ETAG_SUFFIX),
            temp_path: with_suffix(&local_path, DOWNLOAD_SUFFIX),
            local_path,
        })
    }

    pub fn directory(&self) -> &Path {
        self.local_path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.local_path).await.unwrap_or(false)
    }

    /// Entity tag recorded at the last download, if any.
    pub async fn cached_etag(&self) -> Option<String> {
        tokio::fs::read_to_string(&self.etag_path)
            .await
            .ok()
            .map(|s| s.trim().to_string())
    }

    pub async fn record_etag(&self, etag: &str) -> StorageResult<()> {
        tokio::fs::write(&self.etag_path, etag).await?;
        Ok(())
    }

    /// Move a finished download into place.
    pub async fn commit(&self) -> StorageResult<()> {
        tokio::fs::rename(&self.temp_path, &self.local_path).await?;
        Ok(())
    }

    /// Remove a partial download. Missing files are fine.
    pub async fn discard_partial(&self) {
        if let Err(err) = tokio::fs::remove_file(&self.temp_path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.temp_path.display(), error = %err, "failed to remove partial download");
            }
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
