//! Error types for the relay-core crate.

use relay_provider::ProviderError;

/// Core error type for relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config file exists but cannot be parsed
    #[error("Invalid config file {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Adapter construction, preparation or parsing failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// No API key in the environment or the config file
    #[error("No API key for '{provider}': set {env_var} or add it to api_keys in the config")]
    MissingApiKey { provider: String, env_var: String },

    /// Signing credentials could not be assembled
    #[error("Missing AWS credentials: {0}")]
    MissingAwsCredentials(String),

    /// Schema passed for validation is not a valid JSON schema
    #[error("Invalid JSON schema: {0}")]
    InvalidSchema(String),

    /// Model output does not conform to the requested schema
    #[error("Output schema validation failed: {}", .0.join("; "))]
    SchemaValidation(Vec<String>),
}

impl RelayError {
    /// Whether re-sending the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::SchemaValidation(_) => true,
            RelayError::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }
}
