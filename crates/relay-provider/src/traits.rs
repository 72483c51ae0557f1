//! Provider trait definition.

use crate::error::ProviderError;
use crate::function_call::{self, FunctionCall};
use crate::options::GenerationDefaults;
use crate::stream::StreamChunk;
use crate::types::{Message, OutboundRequest, Request};
use http::{HeaderMap, Method};
use serde_json::Value;

/// Trait for vendor adapters.
///
/// An adapter translates the canonical [`Request`] into a vendor's request
/// bytes and the vendor's response bytes back into text. It never performs
/// network I/O; [`Provider::outbound`] hands a finished request to whatever
/// transport the caller uses.
pub trait Provider: Send + Sync {
    /// Registry name (e.g., "openai", "bedrock").
    fn name(&self) -> &str;

    /// Model identifier this adapter was built for.
    fn model(&self) -> &str;

    /// Target URL for one-shot requests.
    fn endpoint(&self) -> String;

    /// Target URL for streaming requests.
    fn stream_endpoint(&self) -> String {
        self.endpoint()
    }

    /// Request headers: static required headers, then the auth header, then
    /// caller-supplied extras. Later entries win on key collision.
    fn headers(&self) -> Result<HeaderMap, ProviderError>;

    /// Build a request body from either a prompt or a message list.
    fn prepare_request(&self, request: &Request) -> Result<Vec<u8>, ProviderError>;

    /// Build a request body asking for output that conforms to `schema`.
    ///
    /// Fails with `UnsupportedCapability` when [`Provider::supports_schema`]
    /// is false.
    fn prepare_request_with_schema(
        &self,
        request: &Request,
        schema: &Value,
    ) -> Result<Vec<u8>, ProviderError>;

    /// Build a request body from a structured conversation.
    fn prepare_request_with_messages(
        &self,
        messages: &[Message],
        request: &Request,
    ) -> Result<Vec<u8>, ProviderError> {
        self.prepare_request(&request.with_messages(messages))
    }

    /// Build a streaming request body.
    ///
    /// Fails with `UnsupportedCapability` when [`Provider::supports_streaming`]
    /// is false.
    fn prepare_stream_request(&self, request: &Request) -> Result<Vec<u8>, ProviderError>;

    /// Read the generated text out of a complete response body.
    ///
    /// Native tool calls are rendered as `<function_call>` spans.
    fn parse_response(&self, body: &[u8]) -> Result<String, ProviderError>;

    /// Decode one streaming chunk.
    fn parse_stream_response(&self, chunk: &[u8]) -> Result<StreamChunk, ProviderError>;

    /// Function calls embedded in parsed text.
    fn extract_function_calls(&self, text: &str) -> Result<Vec<FunctionCall>, ProviderError> {
        function_call::extract_function_calls(text)
    }

    /// Whether structured output can be requested.
    fn supports_schema(&self) -> bool;

    /// Whether streaming can be requested.
    fn supports_streaming(&self) -> bool;

    /// Set one default option; per-call options still override it.
    fn set_option(&mut self, key: &str, value: Value);

    /// Seed default options from global configuration.
    fn set_defaults(&mut self, defaults: &GenerationDefaults);

    /// Add a header sent with every request from this adapter.
    fn set_extra_header(&mut self, name: &str, value: &str) -> Result<(), ProviderError>;

    /// Assemble the request for an external transport, signing it if the
    /// vendor requires it.
    fn outbound(&self, body: Vec<u8>, streaming: bool) -> Result<OutboundRequest, ProviderError> {
        let url = if streaming {
            self.stream_endpoint()
        } else {
            self.endpoint()
        };
        Ok(OutboundRequest {
            method: Method::POST,
            url,
            headers: self.headers()?,
            body,
        })
    }
}

// Compile-time check: Provider must be object-safe
const _: () = {
    fn _assert_object_safe(_: &dyn Provider) {}
};

/// Build the body `request` calls for: schema output when a schema is set,
/// streaming when the `stream` option is true, a plain request otherwise.
pub fn prepare(provider: &dyn Provider, request: &Request) -> Result<Vec<u8>, ProviderError> {
    match (&request.schema, request.options.stream()) {
        (Some(schema), _) => provider.prepare_request_with_schema(request, schema),
        (None, true) => provider.prepare_stream_request(request),
        (None, false) => provider.prepare_request(request),
    }
}
