//! Error types for the relay-provider crate.

/// Errors that can occur while translating requests and responses.
///
/// End-of-stream and "no token in this chunk" are not errors; they are
/// reported through [`StreamChunk`](crate::stream::StreamChunk).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No provider configuration registered under this name
    #[error("Provider config not found: {0}")]
    ConfigNotFound(String),

    /// No provider registered under this name
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Configuration cannot be served by the requested adapter
    #[error("Invalid provider config: {0}")]
    InvalidConfig(String),

    /// Schema or streaming requested from an adapter that lacks it
    #[error("Provider '{provider}' does not support {capability}")]
    UnsupportedCapability {
        provider: String,
        capability: &'static str,
    },

    /// Response body or stream chunk could not be decoded
    #[error("Malformed upstream response: {0}")]
    MalformedResponse(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Response was well-formed but carried no content
    #[error("Empty response from API")]
    EmptyResponse,

    /// API returned an error payload
    #[error("API error: {0}")]
    ApiError(String),

    /// Signing was attempted without key material
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Embedded function call could not be parsed
    #[error("Function call parse error: {0}")]
    FunctionCallParse(String),

    /// Header name or value is not valid HTTP
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// JSON serialization of a request body failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether the whole call may reasonably be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmptyResponse | Self::ApiError(_))
    }

    pub(crate) fn malformed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::MalformedResponse(err.into())
    }
}

impl From<http::header::InvalidHeaderName> for ProviderError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for ProviderError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}
