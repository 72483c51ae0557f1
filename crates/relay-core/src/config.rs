use crate::error::RelayError;
use relay_provider::{GenerationDefaults, ProviderConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Serialized settings from ~/.relay/config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: String,
    pub model: String,
    /// Generation defaults seeded into every adapter.
    pub defaults: GenerationDefaults,
    pub api_keys: HashMap<String, String>,
    pub aws: AwsConfig,
    /// Extra headers per provider name.
    pub extra_headers: HashMap<String, HashMap<String, String>>,
    /// Additional providers served by the generic adapter.
    pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            defaults: GenerationDefaults::default(),
            api_keys: HashMap::new(),
            aws: AwsConfig::default(),
            extra_headers: HashMap::new(),
            providers: Vec::new(),
        }
    }
}

/// Signing credentials for the Bedrock gateway. Environment variables take
/// precedence over these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

/// Helper struct for storing the location to read/write global settings
pub struct ConfigStore {
    path: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".relay");
        path.push("config.json");
        Self { path }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved config. A missing file yields the defaults; a file that
    /// cannot be read or parsed is an error.
    pub fn try_load(&self) -> Result<Config, RelayError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|source| RelayError::Config {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Load the user's saved config, or fallback to Default
    pub fn load(&self) -> Config {
        self.try_load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default config");
            Config::default()
        })
    }

    /// Save the user's config back to disk
    pub fn save(&self, config: &Config) -> Result<(), RelayError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Export configured API keys as `{PROVIDER}_API_KEY`, never overwriting
    /// variables already set in the process environment.
    pub fn hydrate_env(&self) {
        let config = self.load();
        for (provider, key) in config.api_keys.iter() {
            if !key.is_empty() {
                let env_var = crate::credentials::api_key_env_var(provider);
                if std::env::var(&env_var).is_err() {
                    std::env::set_var(&env_var, key);
                }
            }
        }
    }
}
