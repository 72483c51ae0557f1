//! Declarative per-provider configuration for the generic adapter.

use crate::signing::uri_encode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Family of JSON shapes a vendor's API expects and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Chat-completions shape.
    OpenAi,
    /// Messages shape.
    Anthropic,
    /// Anything else; needs a dedicated adapter.
    Custom,
}

impl std::fmt::Display for WireFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WireFormat::OpenAi => "openai",
            WireFormat::Anthropic => "anthropic",
            WireFormat::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// How to reach and authenticate against one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub wire_format: WireFormat,
    /// Endpoint template; `{model}` is replaced with the model identifier.
    pub endpoint: String,
    /// Header carrying the API key. Empty means no auth header.
    #[serde(default)]
    pub auth_header: String,
    /// Prefix prepended to the key (e.g. "Bearer ").
    #[serde(default)]
    pub auth_prefix: String,
    #[serde(default)]
    pub required_headers: BTreeMap<String, String>,
    /// Query parameters appended to the endpoint.
    #[serde(default)]
    pub endpoint_params: BTreeMap<String, String>,
    #[serde(default)]
    pub supports_schema: bool,
    #[serde(default = "default_true")]
    pub supports_streaming: bool,
}

fn default_true() -> bool {
    true
}

impl ProviderConfig {
    /// OpenAI-shaped provider using `Authorization: Bearer <key>`.
    pub fn openai_compatible(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wire_format: WireFormat::OpenAi,
            endpoint: endpoint.into(),
            auth_header: "Authorization".to_string(),
            auth_prefix: "Bearer ".to_string(),
            required_headers: BTreeMap::new(),
            endpoint_params: BTreeMap::new(),
            supports_schema: false,
            supports_streaming: true,
        }
    }

    pub fn with_schema_support(mut self, supported: bool) -> Self {
        self.supports_schema = supported;
        self
    }

    pub fn with_required_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.required_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_endpoint_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.endpoint_params.insert(key.into(), value.into());
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.auth_header.clear();
        self.auth_prefix.clear();
        self
    }

    /// Concrete URL for `model`.
    pub fn endpoint_url(&self, model: &str) -> String {
        let mut url = self.endpoint.replace("{model}", &uri_encode(model));
        if !self.endpoint_params.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.endpoint_params)
                .finish();
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query);
        }
        url
    }
}
