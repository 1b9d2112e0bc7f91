use std::sync::Arc;

use cloud_profile::{
    provider_names, ClientSettings, Overrides, ProfileResolver, ProfileSelector, StorageConfig,
    ENV_ONLY_LABEL, FROM_PROFILE_LABEL,
};

use crate::{AdapterConfig, ClientFactory, ObjectStorage, StorageResult};

/// Entry point for every cloud storage node.
///
/// Each operation takes an optional resolved profile. `None` means "use
/// whatever the environment provides", which is what an unconnected
/// profile input does in the host.
#[derive(Clone)]
pub struct CloudAdapter {
    resolver: ProfileResolver,
    factory: Arc<dyn ClientFactory>,
    config: AdapterConfig,
}

/// A validated configuration and the client built from it
pub(crate) struct Connection {
    pub config: StorageConfig,
    pub storage: Arc<dyn ObjectStorage>,
}

impl Connection {
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }
}

impl CloudAdapter {
    /// Create a new adapter
    pub fn new<F: ClientFactory + 'static>(
        resolver: ProfileResolver,
        factory: F,
        config: AdapterConfig,
    ) -> Self {
        Self {
            resolver,
            factory: Arc::new(factory),
            config,
        }
    }

    /// Create from an already shared factory
    pub fn from_shared(
        resolver: ProfileResolver,
        factory: Arc<dyn ClientFactory>,
        config: AdapterConfig,
    ) -> Self {
        Self {
            resolver,
            factory,
            config,
        }
    }

    pub fn resolver(&self) -> &ProfileResolver {
        &self.resolver
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// The profile node: resolve the selection, then make sure it is usable.
    pub fn profile(
        &self,
        selector: &ProfileSelector,
        overrides: &Overrides,
    ) -> StorageResult<StorageConfig> {
        let config = self.resolver.resolve(selector, overrides);
        self.resolver.validate(&config)?;
        Ok(config)
    }

    /// Choices for the profile selector, env-only first.
    pub fn profile_choices(&self) -> Vec<String> {
        std::iter::once(ENV_ONLY_LABEL.to_string())
            .chain(self.resolver.list_profile_names())
            .collect()
    }

    /// Choices for the provider override, "keep the profile's" first.
    pub fn provider_choices(&self) -> Vec<String> {
        std::iter::once(FROM_PROFILE_LABEL)
            .chain(provider_names())
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn resolve_profile(&self, profile: Option<StorageConfig>) -> StorageConfig {
        profile.unwrap_or_else(|| self.resolver.resolve_default())
    }

    /// Validate, then build a client. Nothing touches storage before the
    /// configuration is known to be complete.
    pub(crate) async fn connect(&self, profile: Option<StorageConfig>) -> StorageResult<Connection> {
        let config = self.resolve_profile(profile);
        self.resolver.validate(&config)?;
        let storage = self.factory.connect(&ClientSettings::from_config(&config)).await?;
        Ok(Connection { config, storage })
    }
}

impl std::fmt::Debug for CloudAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudAdapter")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
