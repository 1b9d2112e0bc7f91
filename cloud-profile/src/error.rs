use std::path::PathBuf;
use thiserror::Error;

use crate::ConfigField;

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A required setting is missing after every layer has been applied.
///
/// Each message names the missing field and the three places it can come
/// from: the environment, the named profile file, or a profile node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "Cloud storage access key not configured. Set {} env var, create a profile in {profiles_location}, or connect a CloudStorageProfile node.",
        ConfigField::AccessKey.env_var()
    )]
    MissingAccessKey { profiles_location: String },

    #[error(
        "Cloud storage secret key not configured. Set {} env var, create a profile in {profiles_location}, or connect a CloudStorageProfile node.",
        ConfigField::SecretKey.env_var()
    )]
    MissingSecretKey { profiles_location: String },

    #[error(
        "Cloud storage bucket not configured. Set {} env var, create a profile in {profiles_location}, or set the bucket on a CloudStorageProfile node.",
        ConfigField::Bucket.env_var()
    )]
    MissingBucket { profiles_location: String },
}

impl ConfigError {
    /// Missing access key
    pub fn missing_access_key<S: Into<String>>(profiles_location: S) -> Self {
        Self::MissingAccessKey {
            profiles_location: profiles_location.into(),
        }
    }

    /// Missing secret key
    pub fn missing_secret_key<S: Into<String>>(profiles_location: S) -> Self {
        Self::MissingSecretKey {
            profiles_location: profiles_location.into(),
        }
    }

    /// Missing bucket
    pub fn missing_bucket<S: Into<String>>(profiles_location: S) -> Self {
        Self::MissingBucket {
            profiles_location: profiles_location.into(),
        }
    }

    /// The field that failed validation
    pub fn field(&self) -> ConfigField {
        match self {
            Self::MissingAccessKey { .. } => ConfigField::AccessKey,
            Self::MissingSecretKey { .. } => ConfigField::SecretKey,
            Self::MissingBucket { .. } => ConfigField::Bucket,
        }
    }
}

/// Failure reading the named profile file. Never surfaced to callers of the
/// resolver: the store logs it and behaves as if it held no profiles.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed profile file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
