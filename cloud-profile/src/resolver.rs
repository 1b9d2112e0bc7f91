use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{PartialConfig, StorageConfig};
use crate::env::{layer_from_env, EnvSource, ProcessEnv};
use crate::error::{ConfigError, ConfigResult};
use crate::store::{JsonFileStore, ProfileStore};

/// Selector label meaning "environment only, no named profile".
pub const ENV_ONLY_LABEL: &str = "(env vars)";

/// Provider label meaning "keep whatever the profile/environment says".
pub const FROM_PROFILE_LABEL: &str = "(from profile)";

/// Which named profile, if any, to layer over the environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProfileSelector {
    #[default]
    EnvOnly,
    Named(String),
}

impl From<&str> for ProfileSelector {
    fn from(label: &str) -> Self {
        if label.is_empty() || label == ENV_ONLY_LABEL {
            ProfileSelector::EnvOnly
        } else {
            ProfileSelector::Named(label.to_string())
        }
    }
}

/// Per-call provider choice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderOverride {
    #[default]
    FromProfile,
    Named(String),
}

impl From<&str> for ProviderOverride {
    fn from(label: &str) -> Self {
        if label.is_empty() || label == FROM_PROFILE_LABEL {
            ProviderOverride::FromProfile
        } else {
            ProviderOverride::Named(label.to_string())
        }
    }
}

/// The per-call layer. Credentials cannot be supplied here: call-site
/// parameters end up in logs and saved workflows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub provider: ProviderOverride,
    /// Ignored when empty.
    pub bucket: String,
    /// Ignored when empty.
    pub path_prefix: String,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider<P: Into<ProviderOverride>>(mut self, provider: P) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_bucket<S: Into<String>>(mut self, bucket: S) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_path_prefix<S: Into<String>>(mut self, path_prefix: S) -> Self {
        self.path_prefix = path_prefix.into();
        self
    }

    fn layer(&self) -> PartialConfig {
        let layer = match &self.provider {
            ProviderOverride::FromProfile => PartialConfig::new(),
            ProviderOverride::Named(name) => PartialConfig::new().with_provider(name.as_str()),
        };
        layer
            .with_bucket(self.bucket.as_str())
            .with_path_prefix(self.path_prefix.as_str())
    }
}

/// Merges defaults, environment, named profile and per-call overrides into
/// one [`StorageConfig`].
///
/// Both capabilities are re-read on every call; nothing is cached.
#[derive(Clone)]
pub struct ProfileResolver {
    env: Arc<dyn EnvSource>,
    store: Arc<dyn ProfileStore>,
}

impl ProfileResolver {
    pub fn new<E, S>(env: E, store: S) -> Self
    where
        E: EnvSource + 'static,
        S: ProfileStore + 'static,
    {
        Self {
            env: Arc::new(env),
            store: Arc::new(store),
        }
    }

    pub fn from_shared(env: Arc<dyn EnvSource>, store: Arc<dyn ProfileStore>) -> Self {
        Self { env, store }
    }

    /// Process environment plus the profile file in the host's directory,
    /// or the home-directory fallback when the host gives none.
    pub fn system(system_user_dir: Option<&Path>) -> Self {
        let store = match system_user_dir {
            Some(dir) => JsonFileStore::in_dir(dir),
            None => JsonFileStore::fallback(&ProcessEnv),
        };
        Self::new(ProcessEnv, store)
    }

    /// Resolve the effective configuration. Never fails; a missing profile
    /// only logs a warning.
    pub fn resolve(&self, selector: &ProfileSelector, overrides: &Overrides) -> StorageConfig {
        let layers = [
            PartialConfig::defaults(),
            layer_from_env(self.env.as_ref()),
            self.profile_layer(selector),
            overrides.layer(),
        ];
        let config = StorageConfig::from(
            layers
                .into_iter()
                .fold(PartialConfig::new(), PartialConfig::overlay),
        );

        debug!(
            selector = ?selector,
            provider = %config.provider,
            bucket = %config.bucket,
            "resolved cloud storage profile"
        );
        config
    }

    /// Environment only.
    pub fn resolve_default(&self) -> StorageConfig {
        self.resolve(&ProfileSelector::EnvOnly, &Overrides::default())
    }

    pub fn validate(&self, config: &StorageConfig) -> ConfigResult<()> {
        validate_config(config, &self.store.location())
    }

    /// Profile names in stored order.
    pub fn list_profile_names(&self) -> Vec<String> {
        self.store.profiles().into_iter().map(|p| p.name).collect()
    }

    pub fn profiles_location(&self) -> String {
        self.store.location()
    }

    fn profile_layer(&self, selector: &ProfileSelector) -> PartialConfig {
        let ProfileSelector::Named(name) = selector else {
            return PartialConfig::new();
        };

        match self.store.profiles().into_iter().find(|p| &p.name == name) {
            Some(profile) if !profile.settings.is_empty() => profile.settings,
            _ => {
                warn!(
                    profile = %name,
                    location = %self.store.location(),
                    "cloud storage profile not found"
                );
                PartialConfig::new()
            }
        }
    }
}

impl std::fmt::Debug for ProfileResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileResolver")
            .field("store", &self.store.location())
            .finish()
    }
}

/// Check the fields every storage call needs: access key, secret key and
/// bucket, in that order. Region, provider, prefix and endpoint are optional.
pub fn validate_config(config: &StorageConfig, profiles_location: &str) -> ConfigResult<()> {
    if config.access_key.is_empty() {
        return Err(ConfigError::missing_access_key(profiles_location));
    }
    if config.secret_key.is_empty() {
        return Err(ConfigError::missing_secret_key(profiles_location));
    }
    if config.bucket.is_empty() {
        return Err(ConfigError::missing_bucket(profiles_location));
    }
    Ok(())
}
