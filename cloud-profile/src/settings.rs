use crate::config::StorageConfig;
use crate::providers;
use crate::secret::Secret;

/// Everything a storage client factory needs, derived from a resolved
/// configuration and its provider preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub provider: String,
    pub access_key: Secret,
    pub secret_key: Secret,
    /// Caller region or the preset default. Empty only for `Custom`
    /// without a region.
    pub region: String,
    /// `None` leaves endpoint resolution to the client.
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

impl ClientSettings {
    pub fn from_config(config: &StorageConfig) -> Self {
        let preset = providers::lookup(&config.provider);
        let region = preset.effective_region(&config.region).to_string();
        let endpoint =
            providers::derive_endpoint(preset, &config.endpoint_url, &region, &config.account_id);

        Self {
            provider: config.provider.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            region,
            endpoint_url: (!endpoint.is_empty()).then_some(endpoint),
            force_path_style: preset.force_path_style,
        }
    }
}

impl From<&StorageConfig> for ClientSettings {
    fn from(config: &StorageConfig) -> Self {
        Self::from_config(config)
    }
}
