//! # cloud-profile: credentials and endpoints for S3-compatible storage
//!
//! `cloud-profile` turns three configuration sources into one effective
//! [`StorageConfig`] and tells a storage client where to connect.
//!
//! ## Layers
//!
//! Lowest to highest precedence:
//!
//! 1. **Environment**: `COMFY_S3_PROVIDER`, `COMFY_S3_ACCESS_KEY`,
//!    `COMFY_S3_SECRET_KEY`, `COMFY_S3_REGION`, `COMFY_S3_BUCKET`,
//!    `COMFY_S3_ENDPOINT_URL`, `COMFY_S3_ACCOUNT_ID`, `COMFY_S3_PATH_PREFIX`
//! 2. **Named profile** from `profiles.json`
//! 3. **Per-call overrides**: provider, bucket and path prefix only
//!
//! A layer only replaces the fields it sets to a non-empty value.
//!
//! ## Quick Start
//!
//! ```rust
//! use cloud_profile::prelude::*;
//!
//! let env = MapEnv::new()
//!     .with("COMFY_S3_ACCESS_KEY", "envkey")
//!     .with("COMFY_S3_SECRET_KEY", "envsecret")
//!     .with("COMFY_S3_BUCKET", "envbucket");
//! let store = MemoryProfileStore::new().with_profile(
//!     "b2",
//!     PartialConfig::new().with_provider("Backblaze B2").with_region("eu-central-003"),
//! );
//! let resolver = ProfileResolver::new(env, store);
//!
//! let config = resolver.resolve(
//!     &ProfileSelector::from("b2"),
//!     &Overrides::new().with_path_prefix("renders/"),
//! );
//! resolver.validate(&config).unwrap();
//!
//! let settings = ClientSettings::from_config(&config);
//! assert_eq!(
//!     settings.endpoint_url.as_deref(),
//!     Some("https://s3.eu-central-003.backblazeb2.com")
//! );
//! ```
//!
//! Environment and profile file are injected as [`EnvSource`] and
//! [`ProfileStore`] capabilities, so tests never touch process state.

mod config;
mod env;
mod error;
pub mod providers;
mod resolver;
mod secret;
mod settings;
mod store;

pub use config::{ConfigField, PartialConfig, StorageConfig, DEFAULT_PROVIDER, ENV_PREFIX};
pub use env::{layer_from_env, EnvSource, MapEnv, ProcessEnv};
pub use error::{ConfigError, ConfigResult, StoreError};
pub use providers::{derive_endpoint, lookup, provider_names, ProviderPreset, PROVIDERS};
pub use resolver::{
    validate_config, Overrides, ProfileResolver, ProfileSelector, ProviderOverride,
    ENV_ONLY_LABEL, FROM_PROFILE_LABEL,
};
pub use secret::{Secret, MIN_REVEAL_LEN};
pub use settings::ClientSettings;
pub use store::{JsonFileStore, MemoryProfileStore, NamedProfile, ProfileStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        ClientSettings, ConfigError, MapEnv, MemoryProfileStore, Overrides, PartialConfig,
        ProfileResolver, ProfileSelector, ProviderOverride, StorageConfig,
    };
}
