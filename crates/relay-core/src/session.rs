//! Builds ready-to-use adapters from the user's configuration.

use crate::config::Config;
use crate::credentials::{self, CredentialKind};
use crate::error::RelayError;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use relay_provider::{Credential, Provider, Registry};
use std::sync::Arc;

/// Configuration plus the registry it was applied to.
pub struct Session {
    config: Config,
    registry: Arc<Registry>,
}

impl Session {
    /// Build a registry holding the built-in providers and every provider
    /// declared in `config`.
    pub fn new(config: Config) -> Result<Self, RelayError> {
        let registry = Registry::with_builtins();
        for provider in &config.providers {
            registry.register_config(provider.clone())?;
            tracing::debug!(provider = %provider.name, "Registered configured provider");
        }
        Ok(Self::with_registry(config, Arc::new(registry)))
    }

    pub fn with_registry(config: Config, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Credential kind the named provider needs.
    pub fn credential_kind(&self, provider: &str) -> CredentialKind {
        CredentialKind::for_config(self.registry.config(provider).as_ref())
    }

    /// Build an adapter, resolving credentials from the environment and the
    /// config file. `None` selects the configured default provider or model.
    pub fn provider(
        &self,
        name: Option<&str>,
        model: Option<&str>,
    ) -> Result<Box<dyn Provider>, RelayError> {
        let name = name.unwrap_or(self.config.provider.as_str());
        let credential = credentials::resolve(name, self.credential_kind(name), &self.config)?;
        self.provider_with(name, model, credential)
    }

    /// Build an adapter with an already-resolved credential.
    pub fn provider_with(
        &self,
        name: &str,
        model: Option<&str>,
        credential: Credential,
    ) -> Result<Box<dyn Provider>, RelayError> {
        let model = model.unwrap_or(self.config.model.as_str());
        let headers = self.extra_headers(name)?;

        let mut provider = self.registry.get(name, credential, model, headers)?;
        provider.set_defaults(&self.config.defaults);
        tracing::debug!(provider = %name, model = %model, "Created adapter");
        Ok(provider)
    }

    fn extra_headers(&self, provider: &str) -> Result<HeaderMap, RelayError> {
        let mut headers = HeaderMap::new();
        if let Some(configured) = self.config.extra_headers.get(provider) {
            for (name, value) in configured {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(relay_provider::ProviderError::from)?;
                let value =
                    HeaderValue::from_str(value).map_err(relay_provider::ProviderError::from)?;
                headers.insert(name, value);
            }
        }
        Ok(headers)
    }
}
