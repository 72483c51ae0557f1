//! Provider registry: maps a provider name to the constructor that builds its
//! adapter and, for configuration-driven providers, to its [`ProviderConfig`].

use crate::config::{ProviderConfig, WireFormat};
use crate::error::ProviderError;
use crate::providers::bedrock::{self, BedrockProvider};
use crate::providers::generic::GenericProvider;
use crate::traits::Provider;
use crate::types::Credential;
use http::HeaderMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds one adapter from pre-resolved credentials, a model and extra headers.
pub type Constructor = Arc<
    dyn Fn(Credential, &str, HeaderMap) -> Result<Box<dyn Provider>, ProviderError> + Send + Sync,
>;

#[derive(Default)]
struct Tables {
    constructors: HashMap<String, Constructor>,
    configs: HashMap<String, ProviderConfig>,
}

/// Registry of available providers.
///
/// Lookups take the read lock and registration takes the write lock, so a
/// shared `Arc<Registry>` can be extended while other threads build adapters.
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Registry holding every built-in provider.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for config in builtin_configs() {
            // Built-in configs are never Custom.
            let _ = registry.register_config(config);
        }
        registry.register(
            bedrock::PROVIDER_NAME,
            Arc::new(|credential: Credential, model: &str, headers: HeaderMap| {
                let provider = BedrockProvider::from_credential(credential, model, headers)?;
                Ok(Box::new(provider) as Box<dyn Provider>)
            }),
            Some(bedrock::provider_config()),
        );
        registry
    }

    /// Register a constructor under `name`, replacing any previous entry.
    pub fn register(
        &self,
        name: impl Into<String>,
        constructor: Constructor,
        config: Option<ProviderConfig>,
    ) {
        let name = name.into();
        let mut tables = self.tables.write();
        match config {
            Some(config) => {
                tables.configs.insert(name.clone(), config);
            }
            None => {
                tables.configs.remove(&name);
            }
        }
        tables.constructors.insert(name, constructor);
    }

    /// Register a provider served by the generic adapter.
    pub fn register_config(&self, config: ProviderConfig) -> Result<(), ProviderError> {
        if config.wire_format == WireFormat::Custom {
            return Err(ProviderError::InvalidConfig(format!(
                "provider '{}' uses a custom wire format and needs its own constructor",
                config.name
            )));
        }
        let name = config.name.clone();
        let captured = config.clone();
        let constructor: Constructor =
            Arc::new(move |credential: Credential, model: &str, headers: HeaderMap| {
                let provider =
                    GenericProvider::new(captured.clone(), credential, model, headers)?;
                Ok(Box::new(provider) as Box<dyn Provider>)
            });
        tracing::debug!(provider = %name, wire_format = %config.wire_format, "Registered provider config");
        self.register(name, constructor, Some(config));
        Ok(())
    }

    /// Build an adapter for `name`.
    pub fn get(
        &self,
        name: &str,
        credential: Credential,
        model: &str,
        extra_headers: HeaderMap,
    ) -> Result<Box<dyn Provider>, ProviderError> {
        // The constructor runs outside the lock.
        let constructor = self
            .tables
            .read()
            .constructors
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::ProviderNotFound(name.to_string()))?;
        constructor(credential, model, extra_headers)
    }

    /// Configuration registered for `name`, if any.
    pub fn config(&self, name: &str) -> Option<ProviderConfig> {
        self.tables.read().configs.get(name).cloned()
    }

    /// Check if a provider is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().constructors.contains_key(name)
    }

    /// All registered provider names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().constructors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.names())
            .finish()
    }
}

fn builtin_configs() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::openai_compatible("openai", "https://api.openai.com/v1/chat/completions")
            .with_schema_support(true),
        ProviderConfig {
            name: "anthropic".to_string(),
            wire_format: WireFormat::Anthropic,
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            auth_header: "x-api-key".to_string(),
            auth_prefix: String::new(),
            required_headers: Default::default(),
            endpoint_params: Default::default(),
            supports_schema: true,
            supports_streaming: true,
        }
        .with_required_header("anthropic-version", "2023-06-01"),
        ProviderConfig::openai_compatible("groq", "https://api.groq.com/openai/v1/chat/completions"),
        ProviderConfig::openai_compatible("mistral", "https://api.mistral.ai/v1/chat/completions"),
        ProviderConfig::openai_compatible("deepseek", "https://api.deepseek.com/chat/completions"),
        ProviderConfig::openai_compatible(
            "openrouter",
            "https://openrouter.ai/api/v1/chat/completions",
        )
        .with_schema_support(true),
        ProviderConfig::openai_compatible("ollama", "http://localhost:11434/v1/chat/completions")
            .without_auth(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = Registry::with_builtins();
        assert_eq!(
            registry.names(),
            vec![
                "anthropic",
                "bedrock",
                "deepseek",
                "groq",
                "mistral",
                "ollama",
                "openai",
                "openrouter"
            ]
        );
        assert!(registry.contains("bedrock"));
        assert!(!registry.contains("nonexistent"));
    }

    #[test]
    fn test_unknown_provider() {
        let registry = Registry::with_builtins();
        let result = registry.get("nonexistent", Credential::None, "m", HeaderMap::new());
        assert!(matches!(result, Err(ProviderError::ProviderNotFound(name)) if name == "nonexistent"));
    }

    #[test]
    fn test_get_builds_configured_adapter() {
        let registry = Registry::with_builtins();
        let provider = registry
            .get("groq", Credential::api_key("k"), "llama3-8b", HeaderMap::new())
            .unwrap();
        assert_eq!(provider.name(), "groq");
        assert_eq!(provider.model(), "llama3-8b");
        assert!(!provider.supports_schema());
        assert_eq!(
            provider.endpoint(),
            "https://api.groq.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_register_config_adds_provider() {
        let registry = Registry::new();
        registry
            .register_config(ProviderConfig::openai_compatible(
                "local",
                "http://localhost:8080/v1/chat/completions",
            ))
            .unwrap();

        assert!(registry.contains("local"));
        assert_eq!(
            registry.config("local").unwrap().endpoint,
            "http://localhost:8080/v1/chat/completions"
        );
        let provider = registry
            .get("local", Credential::None, "m", HeaderMap::new())
            .unwrap();
        assert_eq!(provider.name(), "local");
    }

    #[test]
    fn test_register_config_rejects_custom() {
        let registry = Registry::new();
        let mut config = ProviderConfig::openai_compatible("odd", "https://odd.example");
        config.wire_format = WireFormat::Custom;
        assert!(matches!(
            registry.register_config(config),
            Err(ProviderError::InvalidConfig(_))
        ));
        assert!(!registry.contains("odd"));
    }

    #[test]
    fn test_register_replaces_and_clears_config() {
        let registry = Registry::with_builtins();
        registry.register(
            "openai",
            Arc::new(
                |_: Credential, _: &str, _: HeaderMap| -> Result<Box<dyn Provider>, ProviderError> {
                    Err(ProviderError::InvalidConfig("disabled".to_string()))
                },
            ),
            None,
        );
        assert!(registry.config("openai").is_none());
        assert!(matches!(
            registry.get("openai", Credential::None, "gpt-4o", HeaderMap::new()),
            Err(ProviderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_shared_registry_across_threads() {
        let registry = Arc::new(Registry::with_builtins());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .register_config(ProviderConfig::openai_compatible(
                            format!("local-{i}"),
                            "http://localhost/v1",
                        ))
                        .unwrap();
                    registry
                        .get("openai", Credential::api_key("k"), "gpt-4o", HeaderMap::new())
                        .map(|p| p.name().to_string())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), "openai");
        }
        assert_eq!(registry.names().len(), 12);
    }
}
