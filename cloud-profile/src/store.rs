//! Named profile storage.
//!
//! Profiles live in a JSON document:
//!
//! ```json
//! {
//!   "profiles": {
//!     "production": { "provider": "Backblaze B2", "bucket": "renders", "region": "eu-central-003" },
//!     "scratch": { "bucket": "tmp" }
//!   }
//! }
//! ```
//!
//! Any subset of the configuration fields may appear. File order is kept.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::PartialConfig;
use crate::env::EnvSource;
use crate::error::StoreError;

pub const PROFILES_FILE_NAME: &str = "profiles.json";

/// Directory under the user's home used when the host gives no directory.
pub const FALLBACK_DIR_NAME: &str = ".comfyui-cloud-storage";

/// A persisted, named partial configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedProfile {
    pub name: String,
    pub settings: PartialConfig,
}

impl NamedProfile {
    pub fn new<S: Into<String>>(name: S, settings: PartialConfig) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }
}

/// Source of named profiles. Read on every resolution; never cached.
pub trait ProfileStore: Send + Sync {
    /// All profiles in stored order. Unreadable stores yield nothing.
    fn profiles(&self) -> Vec<NamedProfile>;

    /// Human-readable location, used in error messages.
    fn location(&self) -> String;
}

#[derive(Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: serde_json::Map<String, serde_json::Value>,
}

/// Profiles read from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// `profiles.json` inside the host's per-application directory.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(PROFILES_FILE_NAME))
    }

    /// `~/.comfyui-cloud-storage/profiles.json`, for running outside a host.
    pub fn fallback(env: &dyn EnvSource) -> Self {
        let home = env
            .var("HOME")
            .filter(|h| !h.is_empty())
            .or_else(|| env.var("USERPROFILE").filter(|h| !h.is_empty()))
            .unwrap_or_else(|| ".".to_string());
        Self::in_dir(Path::new(&home).join(FALLBACK_DIR_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the file. A missing file is not an error.
    pub fn try_load(&self) -> Result<Vec<NamedProfile>, StoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no cloud storage profile file");
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        let malformed = |source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        };

        let file: ProfileFile = serde_json::from_str(&raw).map_err(malformed)?;
        file.profiles
            .into_iter()
            .map(|(name, value)| -> Result<NamedProfile, StoreError> {
                let settings = serde_json::from_value(value).map_err(malformed)?;
                Ok(NamedProfile { name, settings })
            })
            .collect()
    }
}

impl ProfileStore for JsonFileStore {
    fn profiles(&self) -> Vec<NamedProfile> {
        match self.try_load() {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!(error = %err, "failed to load cloud storage profiles");
                Vec::new()
            }
        }
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory profiles.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Vec<NamedProfile>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile<S: Into<String>>(mut self, name: S, settings: PartialConfig) -> Self {
        self.profiles.push(NamedProfile::new(name, settings));
        self
    }
}

impl ProfileStore for MemoryProfileStore {
    fn profiles(&self) -> Vec<NamedProfile> {
        self.profiles.clone()
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}
