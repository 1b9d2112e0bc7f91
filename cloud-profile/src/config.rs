//! # Storage configuration
//!
//! [`StorageConfig`] is the effective, fully merged configuration used for a
//! single storage operation. [`PartialConfig`] is one layer of it: only the
//! fields a source actually sets.
//!
//! Layers are merged with [`PartialConfig::overlay`], which never lets an
//! absent or empty field erase a value set by a lower layer:
//!
//! ```rust
//! use cloud_profile::PartialConfig;
//!
//! let env = PartialConfig::new().with_bucket("envbucket").with_region("us-east-1");
//! let profile = PartialConfig::new().with_bucket("profilebucket").with_region("");
//!
//! let merged = env.overlay(profile);
//! assert_eq!(merged.bucket.as_deref(), Some("profilebucket"));
//! assert_eq!(merged.region.as_deref(), Some("us-east-1"));
//! ```

use serde::Deserialize;

use crate::providers::{self, ProviderPreset};
use crate::secret::Secret;

/// Provider used when no layer names one.
pub const DEFAULT_PROVIDER: &str = "AWS S3";

/// Namespace prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "COMFY_S3_";

/// The recognised configuration fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigField {
    Provider,
    AccessKey,
    SecretKey,
    Region,
    Bucket,
    EndpointUrl,
    AccountId,
    PathPrefix,
}

impl ConfigField {
    pub const ALL: [ConfigField; 8] = [
        ConfigField::Provider,
        ConfigField::AccessKey,
        ConfigField::SecretKey,
        ConfigField::Region,
        ConfigField::Bucket,
        ConfigField::EndpointUrl,
        ConfigField::AccountId,
        ConfigField::PathPrefix,
    ];

    /// Key used in the profile file.
    pub fn key(&self) -> &'static str {
        match self {
            ConfigField::Provider => "provider",
            ConfigField::AccessKey => "access_key",
            ConfigField::SecretKey => "secret_key",
            ConfigField::Region => "region",
            ConfigField::Bucket => "bucket",
            ConfigField::EndpointUrl => "endpoint_url",
            ConfigField::AccountId => "account_id",
            ConfigField::PathPrefix => "path_prefix",
        }
    }

    /// Environment variable carrying this field, e.g. `COMFY_S3_ACCESS_KEY`.
    pub fn env_var(&self) -> String {
        format!("{}{}", ENV_PREFIX, self.key().to_ascii_uppercase())
    }
}

/// One configuration layer. `None` and `Some("")` both mean "not set here".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PartialConfig {
    pub provider: Option<String>,
    pub access_key: Option<Secret>,
    pub secret_key: Option<Secret>,
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub endpoint_url: Option<String>,
    pub account_id: Option<String>,
    pub path_prefix: Option<String>,
}

fn pick(lower: Option<String>, upper: Option<String>) -> Option<String> {
    match upper {
        Some(value) if !value.is_empty() => Some(value),
        _ => lower,
    }
}

fn pick_secret(lower: Option<Secret>, upper: Option<Secret>) -> Option<Secret> {
    match upper {
        Some(value) if !value.is_empty() => Some(value),
        _ => lower,
    }
}

impl PartialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in defaults: everything empty except the provider.
    pub fn defaults() -> Self {
        Self::new().with_provider(DEFAULT_PROVIDER)
    }

    /// Layer `upper` on top of `self`, field by field.
    pub fn overlay(self, upper: PartialConfig) -> PartialConfig {
        PartialConfig {
            provider: pick(self.provider, upper.provider),
            access_key: pick_secret(self.access_key, upper.access_key),
            secret_key: pick_secret(self.secret_key, upper.secret_key),
            region: pick(self.region, upper.region),
            bucket: pick(self.bucket, upper.bucket),
            endpoint_url: pick(self.endpoint_url, upper.endpoint_url),
            account_id: pick(self.account_id, upper.account_id),
            path_prefix: pick(self.path_prefix, upper.path_prefix),
        }
    }

    /// True when no field carries a non-empty value.
    pub fn is_empty(&self) -> bool {
        [
            &self.provider,
            &self.region,
            &self.bucket,
            &self.endpoint_url,
            &self.account_id,
            &self.path_prefix,
        ]
        .iter()
        .all(|v| v.as_deref().map_or(true, str::is_empty))
            && self.access_key.as_ref().map_or(true, Secret::is_empty)
            && self.secret_key.as_ref().map_or(true, Secret::is_empty)
    }

    /// Set a field from its string form. Used by the environment layer.
    pub fn with_field<S: Into<String>>(mut self, field: ConfigField, value: S) -> Self {
        let value = value.into();
        match field {
            ConfigField::Provider => self.provider = Some(value),
            ConfigField::AccessKey => self.access_key = Some(Secret::new(value)),
            ConfigField::SecretKey => self.secret_key = Some(Secret::new(value)),
            ConfigField::Region => self.region = Some(value),
            ConfigField::Bucket => self.bucket = Some(value),
            ConfigField::EndpointUrl => self.endpoint_url = Some(value),
            ConfigField::AccountId => self.account_id = Some(value),
            ConfigField::PathPrefix => self.path_prefix = Some(value),
        }
        self
    }

    pub fn with_provider<S: Into<String>>(self, provider: S) -> Self {
        self.with_field(ConfigField::Provider, provider)
    }

    pub fn with_access_key<S: Into<String>>(self, access_key: S) -> Self {
        self.with_field(ConfigField::AccessKey, access_key)
    }

    pub fn with_secret_key<S: Into<String>>(self, secret_key: S) -> Self {
        self.with_field(ConfigField::SecretKey, secret_key)
    }

    pub fn with_region<S: Into<String>>(self, region: S) -> Self {
        self.with_field(ConfigField::Region, region)
    }

    pub fn with_bucket<S: Into<String>>(self, bucket: S) -> Self {
        self.with_field(ConfigField::Bucket, bucket)
    }

    pub fn with_endpoint_url<S: Into<String>>(self, endpoint_url: S) -> Self {
        self.with_field(ConfigField::EndpointUrl, endpoint_url)
    }

    pub fn with_account_id<S: Into<String>>(self, account_id: S) -> Self {
        self.with_field(ConfigField::AccountId, account_id)
    }

    pub fn with_path_prefix<S: Into<String>>(self, path_prefix: S) -> Self {
        self.with_field(ConfigField::PathPrefix, path_prefix)
    }
}

/// The effective configuration for one storage operation.
///
/// Credentials are [`Secret`]s, so the derived `Debug` is safe to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub provider: String,
    pub access_key: Secret,
    pub secret_key: Secret,
    /// Empty means "use the provider's default region".
    pub region: String,
    pub bucket: String,
    /// Empty means "derive from the provider".
    pub endpoint_url: String,
    /// Only used by providers whose endpoint is keyed by account.
    pub account_id: String,
    /// Prepended to every object key.
    pub path_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::from(PartialConfig::defaults())
    }
}

impl From<PartialConfig> for StorageConfig {
    fn from(layer: PartialConfig) -> Self {
        Self {
            provider: layer.provider.unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            access_key: layer.access_key.unwrap_or_default(),
            secret_key: layer.secret_key.unwrap_or_default(),
            region: layer.region.unwrap_or_default(),
            bucket: layer.bucket.unwrap_or_default(),
            endpoint_url: layer.endpoint_url.unwrap_or_default(),
            account_id: layer.account_id.unwrap_or_default(),
            path_prefix: layer.path_prefix.unwrap_or_default(),
        }
    }
}

impl StorageConfig {
    /// The provider preset, falling back to `Custom` for unknown names.
    pub fn preset(&self) -> &'static ProviderPreset {
        providers::lookup(&self.provider)
    }

    /// `path_prefix` followed by `key`.
    pub fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.path_prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_names() {
        assert_eq!(ConfigField::AccessKey.env_var(), "COMFY_S3_ACCESS_KEY");
        assert_eq!(ConfigField::EndpointUrl.env_var(), "COMFY_S3_ENDPOINT_URL");
        assert_eq!(ConfigField::PathPrefix.env_var(), "COMFY_S3_PATH_PREFIX");
    }

    #[test]
    fn overlay_ignores_empty_upper_values() {
        let lower = PartialConfig::new().with_access_key("envkey");
        let upper = PartialConfig::new().with_access_key("");
        let merged = lower.overlay(upper);
        assert_eq!(merged.access_key.unwrap().expose(), "envkey");
    }

    #[test]
    fn default_config_uses_default_provider() {
        let config = StorageConfig::default();
        assert_eq!(config.provider, DEFAULT_PROVIDER);
        assert!(config.access_key.is_empty());
        assert_eq!(config.region, "");
    }

    #[test]
    fn empty_detection() {
        assert!(PartialConfig::new().is_empty());
        assert!(PartialConfig::new().with_bucket("").is_empty());
        assert!(!PartialConfig::new().with_bucket("b").is_empty());
        assert!(!PartialConfig::new().with_secret_key("s").is_empty());
    }

    #[test]
    fn full_key_prepends_prefix() {
        let config = StorageConfig {
            path_prefix: "team/".to_string(),
            ..StorageConfig::default()
        };
        assert_eq!(config.full_key("a.png"), "team/a.png");
    }
}
