//! Configuration-driven adapter.
//!
//! One implementation serves every provider whose API follows one of the two
//! common shapes; a [`ProviderConfig`] supplies the endpoint, the auth header
//! and the capability flags.

use crate::config::{ProviderConfig, WireFormat};
use crate::error::ProviderError;
use crate::options::{GenerationDefaults, Options};
use crate::registry::Registry;
use crate::stream::StreamChunk;
use crate::traits::Provider;
use crate::types::{Credential, Request};
use crate::wire::{anthropic, openai, schema};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

/// A provider that speaks a standard wire format.
pub struct GenericProvider {
    config: ProviderConfig,
    api_key: Option<SecretString>,
    model: String,
    defaults: Options,
    extra_headers: HeaderMap,
}

impl GenericProvider {
    /// Create an adapter for `config`.
    ///
    /// Fails with `InvalidConfig` for a custom wire format or for signing
    /// credentials, which this adapter cannot use.
    pub fn new(
        config: ProviderConfig,
        credential: Credential,
        model: &str,
        extra_headers: HeaderMap,
    ) -> Result<Self, ProviderError> {
        if config.wire_format == WireFormat::Custom {
            return Err(ProviderError::InvalidConfig(format!(
                "provider '{}' has a custom wire format",
                config.name
            )));
        }
        let api_key = match credential {
            Credential::None => None,
            Credential::ApiKey(key) => Some(key),
            Credential::Aws(_) => {
                return Err(ProviderError::InvalidConfig(format!(
                    "provider '{}' expects an API key, not signing credentials",
                    config.name
                )))
            }
        };
        Ok(Self {
            config,
            api_key,
            model: model.to_string(),
            defaults: Options::new(),
            extra_headers,
        })
    }

    /// Create an adapter from the configuration `registry` holds for `name`.
    pub fn from_registry(
        registry: &Registry,
        name: &str,
        credential: Credential,
        model: &str,
        extra_headers: HeaderMap,
    ) -> Result<Self, ProviderError> {
        let config = registry
            .config(name)
            .ok_or_else(|| ProviderError::ConfigNotFound(name.to_string()))?;
        Self::new(config, credential, model, extra_headers)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Default options applied beneath every call's own options.
    pub fn defaults(&self) -> &Options {
        &self.defaults
    }

    fn unsupported(&self, capability: &'static str) -> ProviderError {
        ProviderError::UnsupportedCapability {
            provider: self.config.name.clone(),
            capability,
        }
    }

    fn custom_format(&self) -> ProviderError {
        ProviderError::InvalidConfig(format!(
            "provider '{}' has a custom wire format",
            self.config.name
        ))
    }

    fn build_body(&self, request: &Request, stream: bool) -> Result<Value, ProviderError> {
        match self.config.wire_format {
            WireFormat::OpenAi => Ok(openai::build_body(&self.model, request, &self.defaults, stream)),
            WireFormat::Anthropic => Ok(anthropic::build_body(
                &self.model,
                request,
                &self.defaults,
                stream,
            )),
            WireFormat::Custom => Err(self.custom_format()),
        }
    }
}

impl Provider for GenericProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        self.config.endpoint_url(&self.model)
    }

    fn headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        for (name, value) in &self.config.required_headers {
            headers.insert(
                HeaderName::from_bytes(name.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        if let Some(key) = &self.api_key {
            let key = key.expose_secret();
            if !self.config.auth_header.is_empty() && !key.is_empty() {
                let mut value =
                    HeaderValue::from_str(&format!("{}{}", self.config.auth_prefix, key))?;
                value.set_sensitive(true);
                headers.insert(HeaderName::from_bytes(self.config.auth_header.as_bytes())?, value);
            }
        }

        for (name, value) in &self.extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        Ok(headers)
    }

    fn prepare_request(&self, request: &Request) -> Result<Vec<u8>, ProviderError> {
        let body = self.build_body(request, false)?;
        Ok(serde_json::to_vec(&body)?)
    }

    fn prepare_request_with_schema(
        &self,
        request: &Request,
        schema: &Value,
    ) -> Result<Vec<u8>, ProviderError> {
        if !self.config.supports_schema {
            return Err(self.unsupported("structured output"));
        }
        let body = match self.config.wire_format {
            WireFormat::OpenAi => {
                let mut body = openai::build_body(&self.model, request, &self.defaults, false);
                openai::attach_schema(&mut body, schema);
                body
            }
            WireFormat::Anthropic => {
                let embedded = schema::embed_schema(request, schema)?;
                anthropic::build_body(&self.model, &embedded, &self.defaults, false)
            }
            WireFormat::Custom => return Err(self.custom_format()),
        };
        Ok(serde_json::to_vec(&body)?)
    }

    fn prepare_stream_request(&self, request: &Request) -> Result<Vec<u8>, ProviderError> {
        if !self.config.supports_streaming {
            return Err(self.unsupported("streaming"));
        }
        let body = self.build_body(request, true)?;
        Ok(serde_json::to_vec(&body)?)
    }

    fn parse_response(&self, body: &[u8]) -> Result<String, ProviderError> {
        match self.config.wire_format {
            WireFormat::OpenAi => openai::parse_response(body),
            WireFormat::Anthropic => anthropic::parse_response(body),
            WireFormat::Custom => Err(self.custom_format()),
        }
    }

    fn parse_stream_response(&self, chunk: &[u8]) -> Result<StreamChunk, ProviderError> {
        match self.config.wire_format {
            WireFormat::OpenAi => openai::parse_chunk(chunk),
            WireFormat::Anthropic => anthropic::parse_chunk(chunk),
            WireFormat::Custom => Err(self.custom_format()),
        }
    }

    fn supports_schema(&self) -> bool {
        self.config.supports_schema
    }

    fn supports_streaming(&self) -> bool {
        self.config.supports_streaming
    }

    fn set_option(&mut self, key: &str, value: Value) {
        self.defaults.set(key, value);
    }

    fn set_defaults(&mut self, defaults: &GenerationDefaults) {
        self.defaults = self.defaults.merged(&defaults.to_options());
    }

    fn set_extra_header(&mut self, name: &str, value: &str) -> Result<(), ProviderError> {
        self.extra_headers.insert(
            HeaderName::from_bytes(name.as_bytes())?,
            HeaderValue::from_str(value)?,
        );
        Ok(())
    }
}
