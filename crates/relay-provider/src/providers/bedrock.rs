//! Amazon Bedrock runtime adapter.
//!
//! One gateway fronts several model families, each with its own native body
//! and response fields. Requests are signed with the caller's AWS
//! credentials instead of carrying an API key.

use crate::config::{ProviderConfig, WireFormat};
use crate::error::ProviderError;
use crate::options::{GenerationDefaults, Options};
use crate::signing::{uri_encode, RequestSigner};
use crate::stream::StreamChunk;
use crate::traits::Provider;
use crate::types::{AwsCredentials, Credential, Input, OutboundRequest, Request};
use crate::wire::{anthropic, schema};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub const PROVIDER_NAME: &str = "bedrock";
pub const SERVICE: &str = "bedrock";
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

const ENDPOINT_TEMPLATE: &str = "https://bedrock-runtime.{region}.amazonaws.com/model/{model}/invoke";
const CROSS_REGION_PREFIXES: &[&str] = &["us.", "eu.", "apac."];
const METRICS_KEY: &str = "amazon-bedrock-invocationMetrics";

/// Text locations tried, in order, for models of unknown family.
const GENERIC_TEXT_POINTERS: &[&str] = &[
    "/completion",
    "/generation",
    "/outputText",
    "/text",
    "/results/0/outputText",
    "/generations/0/text",
    "/outputs/0/text",
];

/// Model families reachable through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Anthropic,
    Titan,
    Llama,
    Cohere,
    Mistral,
    Generic,
}

impl ModelFamily {
    /// Classify a model identifier, ignoring any cross-region prefix.
    pub fn classify(model: &str) -> Self {
        let base = CROSS_REGION_PREFIXES
            .iter()
            .find_map(|prefix| model.strip_prefix(prefix))
            .unwrap_or(model);

        if base.starts_with("anthropic.") {
            ModelFamily::Anthropic
        } else if base.starts_with("amazon.titan") {
            ModelFamily::Titan
        } else if base.starts_with("meta.llama") {
            ModelFamily::Llama
        } else if base.starts_with("cohere.") {
            ModelFamily::Cohere
        } else if base.starts_with("mistral.") {
            ModelFamily::Mistral
        } else {
            ModelFamily::Generic
        }
    }

    pub fn default_max_tokens(self) -> u64 {
        match self {
            ModelFamily::Anthropic => 4096,
            _ => 2048,
        }
    }
}

/// Registry entry describing the gateway. Served only by [`BedrockProvider`].
pub fn provider_config() -> ProviderConfig {
    ProviderConfig {
        name: PROVIDER_NAME.to_string(),
        wire_format: WireFormat::Custom,
        endpoint: ENDPOINT_TEMPLATE.to_string(),
        auth_header: String::new(),
        auth_prefix: String::new(),
        required_headers: Default::default(),
        endpoint_params: Default::default(),
        supports_schema: true,
        supports_streaming: true,
    }
}

/// Adapter for one model on the Bedrock runtime.
pub struct BedrockProvider {
    signer: RequestSigner,
    model: String,
    family: ModelFamily,
    defaults: Options,
    extra_headers: HeaderMap,
}

impl BedrockProvider {
    pub fn new(credentials: AwsCredentials, model: &str, extra_headers: HeaderMap) -> Self {
        Self {
            signer: RequestSigner::new(credentials, SERVICE),
            model: model.to_string(),
            family: ModelFamily::classify(model),
            defaults: Options::new(),
            extra_headers,
        }
    }

    /// Create an adapter from a pre-resolved credential, which must be the
    /// signing kind.
    pub fn from_credential(
        credential: Credential,
        model: &str,
        extra_headers: HeaderMap,
    ) -> Result<Self, ProviderError> {
        match credential {
            Credential::Aws(credentials) => Ok(Self::new(credentials, model, extra_headers)),
            _ => Err(ProviderError::MissingCredentials(
                "bedrock requires AWS credentials".to_string(),
            )),
        }
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    /// Assemble and sign a request at a fixed instant.
    pub fn outbound_at(
        &self,
        body: Vec<u8>,
        streaming: bool,
        now: DateTime<Utc>,
    ) -> Result<OutboundRequest, ProviderError> {
        let url = if streaming {
            self.stream_endpoint()
        } else {
            self.endpoint()
        };
        let mut request = OutboundRequest {
            method: Method::POST,
            url,
            headers: self.headers()?,
            body,
        };
        self.signer.sign(&mut request, now)?;
        Ok(request)
    }

    fn base_url(&self) -> String {
        format!(
            "https://bedrock-runtime.{}.amazonaws.com/model/{}",
            self.signer.region(),
            uri_encode(&self.model)
        )
    }

    fn build_body(&self, request: &Request) -> Value {
        let options = self.defaults.merged(&request.options);
        let max_tokens = options
            .max_tokens()
            .unwrap_or_else(|| self.family.default_max_tokens());
        let mut body = Map::new();

        match self.family {
            ModelFamily::Anthropic => {
                let (messages, system) = anthropic::convert_messages(request);
                body.insert("anthropic_version".to_string(), json!(ANTHROPIC_VERSION));
                body.insert("max_tokens".to_string(), json!(max_tokens));
                body.insert("messages".to_string(), Value::Array(messages));
                insert_some(&mut body, "system", system);
                insert_some(&mut body, "temperature", options.temperature());
                insert_some(&mut body, "top_p", options.top_p());
                insert_some(&mut body, "top_k", options.top_k());
                insert_some(&mut body, "stop_sequences", options.stop());
                if !request.tools.is_empty() {
                    body.insert("tools".to_string(), anthropic::convert_tools(&request.tools));
                }
                if let Some(choice) = &request.tool_choice {
                    body.insert(
                        "tool_choice".to_string(),
                        anthropic::convert_tool_choice(choice),
                    );
                }
            }
            ModelFamily::Titan => {
                let mut config = Map::new();
                config.insert("maxTokenCount".to_string(), json!(max_tokens));
                insert_some(&mut config, "temperature", options.temperature());
                insert_some(&mut config, "topP", options.top_p());
                insert_some(&mut config, "stopSequences", options.stop());
                body.insert("inputText".to_string(), json!(transcript(request)));
                body.insert("textGenerationConfig".to_string(), Value::Object(config));
            }
            ModelFamily::Llama => {
                body.insert("prompt".to_string(), json!(transcript(request)));
                body.insert("max_gen_len".to_string(), json!(max_tokens));
                insert_some(&mut body, "temperature", options.temperature());
                insert_some(&mut body, "top_p", options.top_p());
            }
            ModelFamily::Cohere => {
                body.insert("prompt".to_string(), json!(transcript(request)));
                body.insert("max_tokens".to_string(), json!(max_tokens));
                insert_some(&mut body, "temperature", options.temperature());
                insert_some(&mut body, "p", options.top_p());
                insert_some(&mut body, "k", options.top_k());
                insert_some(&mut body, "stop_sequences", options.stop());
            }
            ModelFamily::Mistral => {
                body.insert("prompt".to_string(), json!(transcript(request)));
                body.insert("max_tokens".to_string(), json!(max_tokens));
                insert_some(&mut body, "temperature", options.temperature());
                insert_some(&mut body, "top_p", options.top_p());
                insert_some(&mut body, "top_k", options.top_k());
                insert_some(&mut body, "stop", options.stop());
            }
            ModelFamily::Generic => {
                body.insert("prompt".to_string(), json!(transcript(request)));
                body.insert("max_tokens".to_string(), json!(max_tokens));
                insert_some(&mut body, "temperature", options.temperature());
                insert_some(&mut body, "top_p", options.top_p());
            }
        }

        // Vendor-specific options pass through untouched.
        for (key, value) in options.extras() {
            body.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(body)
    }

    fn flat_token<'v>(&self, event: &'v Value) -> Option<&'v str> {
        let pointer = match self.family {
            ModelFamily::Titan => "/outputText",
            ModelFamily::Llama => "/generation",
            ModelFamily::Cohere => "/text",
            ModelFamily::Mistral => "/outputs/0/text",
            ModelFamily::Anthropic | ModelFamily::Generic => {
                return GENERIC_TEXT_POINTERS
                    .iter()
                    .find_map(|p| event.pointer(p).and_then(Value::as_str));
            }
        };
        event.pointer(pointer).and_then(Value::as_str)
    }
}

impl Provider for BedrockProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/invoke", self.base_url())
    }

    fn stream_endpoint(&self) -> String {
        format!("{}/invoke-with-response-stream", self.base_url())
    }

    fn headers(&self) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &self.extra_headers {
            headers.insert(name.clone(), value.clone());
        }
        Ok(headers)
    }

    fn prepare_request(&self, request: &Request) -> Result<Vec<u8>, ProviderError> {
        Ok(serde_json::to_vec(&self.build_body(request))?)
    }

    fn prepare_request_with_schema(
        &self,
        request: &Request,
        schema: &Value,
    ) -> Result<Vec<u8>, ProviderError> {
        let embedded = schema::embed_schema(request, schema)?;
        Ok(serde_json::to_vec(&self.build_body(&embedded))?)
    }

    /// Same body as a one-shot request; streaming is selected by the endpoint.
    fn prepare_stream_request(&self, request: &Request) -> Result<Vec<u8>, ProviderError> {
        Ok(serde_json::to_vec(&self.build_body(request))?)
    }

    fn parse_response(&self, body: &[u8]) -> Result<String, ProviderError> {
        let value: Value = serde_json::from_slice(body).map_err(ProviderError::malformed)?;
        let gateway_error = || {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(|message| ProviderError::ApiError(message.to_string()))
        };

        let text = match self.family {
            ModelFamily::Anthropic => {
                if value.get("content").is_none() {
                    if let Some(err) = gateway_error() {
                        return Err(err);
                    }
                }
                return anthropic::parse_response(body);
            }
            ModelFamily::Titan => value.pointer("/results/0/outputText"),
            ModelFamily::Llama => value.pointer("/generation"),
            ModelFamily::Cohere => value.pointer("/generations/0/text"),
            ModelFamily::Mistral => value.pointer("/outputs/0/text"),
            ModelFamily::Generic => GENERIC_TEXT_POINTERS
                .iter()
                .find_map(|p| value.pointer(p)),
        }
        .and_then(Value::as_str);

        match text {
            Some(text) if !text.is_empty() => Ok(text.to_string()),
            Some(_) => Err(ProviderError::EmptyResponse),
            None => Err(gateway_error().unwrap_or(ProviderError::EmptyResponse)),
        }
    }

    fn parse_stream_response(&self, chunk: &[u8]) -> Result<StreamChunk, ProviderError> {
        let text = String::from_utf8_lossy(chunk);
        let trimmed = text.trim();
        let payload = trimmed
            .strip_prefix("data:")
            .map(str::trim_start)
            .unwrap_or(trimmed);
        if payload.is_empty() {
            return Ok(StreamChunk::Skip);
        }

        let mut event: Value = serde_json::from_str(payload).map_err(ProviderError::malformed)?;
        if let Some(inner) = event.as_object_mut().and_then(|map| map.remove("chunk")) {
            event = inner;
        }
        let decoded = event
            .get("bytes")
            .and_then(Value::as_str)
            .map(|encoded| STANDARD.decode(encoded))
            .transpose()
            .map_err(ProviderError::malformed)?;
        if let Some(bytes) = decoded {
            event = serde_json::from_slice(&bytes).map_err(ProviderError::malformed)?;
        }

        if let Some((kind, detail)) = event
            .as_object()
            .and_then(|map| map.iter().find(|(key, _)| key.ends_with("Exception")))
        {
            let message = detail
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| detail.to_string());
            return Err(ProviderError::ApiError(format!("{kind}: {message}")));
        }

        if self.family == ModelFamily::Anthropic {
            return anthropic::parse_event(event);
        }

        let token = self.flat_token(&event).filter(|token| !token.is_empty());
        Ok(match (token, is_stop(&event)) {
            (Some(token), true) => StreamChunk::Last(token.to_string()),
            (Some(token), false) => StreamChunk::Token(token.to_string()),
            (None, true) => StreamChunk::End,
            (None, false) => StreamChunk::Skip,
        })
    }

    fn supports_schema(&self) -> bool {
        true
    }

    fn supports_streaming(&self) -> bool {
        true
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

    fn outbound(&self, body: Vec<u8>, streaming: bool) -> Result<OutboundRequest, ProviderError> {
        self.outbound_at(body, streaming, Utc::now())
    }
}

fn insert_some<T: Serialize>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), json!(value));
    }
}

/// Flatten a request into a role-prefixed transcript for prompt-style models.
fn transcript(request: &Request) -> String {
    let mut parts = Vec::new();
    if let Some(system) = &request.system {
        parts.push(format!("System: {system}"));
    }
    match &request.input {
        Input::Prompt(prompt) if parts.is_empty() => return prompt.clone(),
        Input::Prompt(prompt) => parts.push(format!("User: {prompt}")),
        Input::Messages(messages) => {
            for message in messages {
                parts.push(format!("{}: {}", role_label(&message.role), message.content));
            }
        }
    }
    parts.push("Assistant:".to_string());
    parts.join("\n\n")
}

fn role_label(role: &str) -> String {
    match role {
        "system" => "System".to_string(),
        "user" | "tool" => "User".to_string(),
        "assistant" => "Assistant".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

fn is_stop(event: &Value) -> bool {
    let present = |pointer: &str| event.pointer(pointer).is_some_and(|v| !v.is_null());
    present("/completionReason")
        || present("/stop_reason")
        || present("/outputs/0/stop_reason")
        || event.get("is_finished").and_then(Value::as_bool) == Some(true)
        || event.get(METRICS_KEY).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::decode_stream;
    use crate::types::Message;
    use chrono::TimeZone;
    use secrecy::SecretString;

    fn credentials() -> AwsCredentials {
        AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: SecretString::from("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string()),
            session_token: None,
            region: "us-east-1".to_string(),
        }
    }

    fn provider(model: &str) -> BedrockProvider {
        BedrockProvider::new(credentials(), model, HeaderMap::new())
    }

    fn body_of(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    fn wrapped(event: &Value) -> String {
        let encoded = STANDARD.encode(serde_json::to_vec(event).unwrap());
        json!({"chunk": {"bytes": encoded}}).to_string()
    }

    #[test]
    fn test_classify_families() {
        assert_eq!(
            ModelFamily::classify("anthropic.claude-3-sonnet-20240229-v1:0"),
            ModelFamily::Anthropic
        );
        assert_eq!(
            ModelFamily::classify("us.anthropic.claude-3-5-sonnet-20241022-v2:0"),
            ModelFamily::Anthropic
        );
        assert_eq!(ModelFamily::classify("amazon.titan-text-express-v1"), ModelFamily::Titan);
        assert_eq!(ModelFamily::classify("eu.meta.llama3-8b-instruct-v1:0"), ModelFamily::Llama);
        assert_eq!(ModelFamily::classify("cohere.command-text-v14"), ModelFamily::Cohere);
        assert_eq!(ModelFamily::classify("apac.mistral.mistral-7b-instruct-v0:2"), ModelFamily::Mistral);
        assert_eq!(ModelFamily::classify("ai21.j2-ultra-v1"), ModelFamily::Generic);
    }

    #[test]
    fn test_anthropic_body_defaults_to_4096() {
        let p = provider("anthropic.claude-3-haiku-20240307-v1:0");
        let request = Request::prompt("Hi").with_system("Be terse");
        let body = body_of(&p.prepare_request(&request).unwrap());
        assert_eq!(
            body,
            json!({
                "anthropic_version": "bedrock-2023-05-31",
                "max_tokens": 4096,
                "messages": [{"role": "user", "content": "Hi"}],
                "system": "Be terse"
            })
        );
    }

    #[test]
    fn test_max_tokens_precedence() {
        let mut p = provider("amazon.titan-text-express-v1");
        let body = body_of(&p.prepare_request(&Request::prompt("Hi")).unwrap());
        assert_eq!(body["textGenerationConfig"]["maxTokenCount"], json!(2048));

        p.set_defaults(&GenerationDefaults {
            max_tokens: Some(512),
            ..Default::default()
        });
        let body = body_of(&p.prepare_request(&Request::prompt("Hi")).unwrap());
        assert_eq!(body["textGenerationConfig"]["maxTokenCount"], json!(512));

        let request = Request::prompt("Hi").with_option("max_tokens", 64);
        let body = body_of(&p.prepare_request(&request).unwrap());
        assert_eq!(body["textGenerationConfig"]["maxTokenCount"], json!(64));
    }

    #[test]
    fn test_titan_body() {
        let p = provider("amazon.titan-text-express-v1");
        let request = Request::prompt("Hi")
            .with_option("temperature", 0.5)
            .with_option("top_p", 0.9)
            .with_option("stop", "User:");
        let body = body_of(&p.prepare_request(&request).unwrap());
        assert_eq!(
            body,
            json!({
                "inputText": "Hi",
                "textGenerationConfig": {
                    "maxTokenCount": 2048,
                    "temperature": 0.5,
                    "topP": 0.9,
                    "stopSequences": ["User:"]
                }
            })
        );
    }

    #[test]
    fn test_llama_flattens_messages() {
        let p = provider("meta.llama3-8b-instruct-v1:0");
        let request = Request::messages(vec![
            Message::user("Hi"),
            Message::assistant("Hello"),
            Message::user("How are you?"),
        ])
        .with_system("Be kind");
        let body = body_of(&p.prepare_request(&request).unwrap());
        assert_eq!(
            body["prompt"],
            "System: Be kind\n\nUser: Hi\n\nAssistant: Hello\n\nUser: How are you?\n\nAssistant:"
        );
        assert_eq!(body["max_gen_len"], json!(2048));
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_cohere_and_mistral_field_names() {
        let request = Request::prompt("Hi").with_option("top_p", 0.8).with_option("top_k", 40);

        let cohere = body_of(&provider("cohere.command-text-v14").prepare_request(&request).unwrap());
        assert_eq!(cohere["p"], json!(0.8));
        assert_eq!(cohere["k"], json!(40));
        assert!(cohere.get("top_p").is_none());

        let mistral = body_of(
            &provider("mistral.mistral-7b-instruct-v0:2")
                .prepare_request(&request)
                .unwrap(),
        );
        assert_eq!(mistral["top_p"], json!(0.8));
        assert_eq!(mistral["top_k"], json!(40));
    }

    #[test]
    fn test_extras_pass_through() {
        let p = provider("ai21.j2-ultra-v1");
        let request = Request::prompt("Hi").with_option("countPenalty", json!({"scale": 0}));
        let body = body_of(&p.prepare_request(&request).unwrap());
        assert_eq!(body["countPenalty"], json!({"scale": 0}));
        assert_eq!(body["prompt"], "Hi");
    }

    #[test]
    fn test_schema_is_embedded() {
        let p = provider("meta.llama3-8b-instruct-v1:0");
        let body = body_of(
            &p.prepare_request_with_schema(&Request::prompt("Colors?"), &json!({"type": "array"}))
                .unwrap(),
        );
        let prompt = body["prompt"].as_str().unwrap();
        assert!(prompt.starts_with("Colors?\n\nRespond only with a JSON value"));
    }

    #[test]
    fn test_endpoints_encode_model() {
        let p = provider("anthropic.claude-3-sonnet-20240229-v1:0");
        assert_eq!(
            p.endpoint(),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/anthropic.claude-3-sonnet-20240229-v1%3A0/invoke"
        );
        assert!(p.stream_endpoint().ends_with("v1%3A0/invoke-with-response-stream"));
    }

    #[test]
    fn test_parse_response_per_family() {
        let titan = provider("amazon.titan-text-express-v1");
        let body = br#"{"inputTextTokenCount":3,"results":[{"outputText":"Hello","completionReason":"FINISH"}]}"#;
        assert_eq!(titan.parse_response(body).unwrap(), "Hello");

        let llama = provider("meta.llama3-8b-instruct-v1:0");
        assert_eq!(
            llama.parse_response(br#"{"generation":"Hi","stop_reason":"stop"}"#).unwrap(),
            "Hi"
        );

        let cohere = provider("cohere.command-text-v14");
        assert_eq!(
            cohere.parse_response(br#"{"generations":[{"text":"Yo"}]}"#).unwrap(),
            "Yo"
        );

        let mistral = provider("mistral.mistral-7b-instruct-v0:2");
        assert_eq!(
            mistral.parse_response(br#"{"outputs":[{"text":"Salut","stop_reason":"stop"}]}"#).unwrap(),
            "Salut"
        );

        let claude = provider("anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(
            claude.parse_response(br#"{"content":[{"type":"text","text":"Hey"}]}"#).unwrap(),
            "Hey"
        );
    }

    #[test]
    fn test_parse_response_gateway_error() {
        let body = br#"{"message":"The security token included in the request is invalid."}"#;
        for model in ["meta.llama3-8b-instruct-v1:0", "anthropic.claude-v2"] {
            match provider(model).parse_response(body) {
                Err(ProviderError::ApiError(msg)) => assert!(msg.contains("security token")),
                other => panic!("expected ApiError, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_response_empty() {
        let p = provider("meta.llama3-8b-instruct-v1:0");
        assert!(matches!(
            p.parse_response(br#"{"generation":""}"#),
            Err(ProviderError::EmptyResponse)
        ));
        assert!(matches!(
            p.parse_response(br#"{}"#),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn test_stream_wrapped_anthropic_events() {
        let p = provider("anthropic.claude-3-haiku-20240307-v1:0");
        let chunks = vec![
            wrapped(&json!({"type": "message_start", "message": {}})),
            wrapped(&json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Hi"}})),
            wrapped(&json!({"type": "message_stop"})),
        ];
        let results: Vec<StreamChunk> = decode_stream(&p, &chunks)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            results,
            vec![
                StreamChunk::Skip,
                StreamChunk::Token("Hi".to_string()),
                StreamChunk::End
            ]
        );
    }

    #[test]
    fn test_stream_flat_family() {
        let p = provider("amazon.titan-text-express-v1");
        let token = json!({"outputText": "Hel", "index": 0, "completionReason": null});
        let end = json!({
            "outputText": "",
            "completionReason": "FINISH",
            "amazon-bedrock-invocationMetrics": {"inputTokenCount": 3}
        });

        assert_eq!(
            p.parse_stream_response(wrapped(&token).as_bytes()).unwrap(),
            StreamChunk::Token("Hel".to_string())
        );
        assert_eq!(
            p.parse_stream_response(wrapped(&end).as_bytes()).unwrap(),
            StreamChunk::End
        );
        assert_eq!(
            p.parse_stream_response(br#"{"outputText":""}"#).unwrap(),
            StreamChunk::Skip
        );
    }

    #[test]
    fn test_stream_final_chunk_carries_text() {
        let p = provider("amazon.titan-text-express-v1");
        let chunks = vec![
            wrapped(&json!({"outputText": "Hello", "index": 0, "completionReason": null})),
            wrapped(&json!({
                "outputText": " world.",
                "index": 0,
                "completionReason": "FINISH",
                "amazon-bedrock-invocationMetrics": {"inputTokenCount": 4, "outputTokenCount": 2}
            })),
            wrapped(&json!({"outputText": "ignored", "completionReason": null})),
        ];

        let results: Vec<StreamChunk> = decode_stream(&p, &chunks)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            results,
            vec![
                StreamChunk::Token("Hello".to_string()),
                StreamChunk::Last(" world.".to_string())
            ]
        );
        assert!(results[1].is_end());
        assert_eq!(decode_stream(&p, &chunks).collect_text().unwrap(), "Hello world.");
    }

    #[test]
    fn test_stream_llama_final_generation() {
        let p = provider("meta.llama3-8b-instruct-v1:0");
        let chunk = br#"{"generation":"!","stop_reason":"stop"}"#;
        assert_eq!(
            p.parse_stream_response(chunk).unwrap(),
            StreamChunk::Last("!".to_string())
        );
    }

    #[test]
    fn test_stream_raw_event_with_data_prefix() {
        let p = provider("meta.llama3-8b-instruct-v1:0");
        let chunk = br#"data: {"generation":" there","stop_reason":null}"#;
        assert_eq!(
            p.parse_stream_response(chunk).unwrap(),
            StreamChunk::Token(" there".to_string())
        );
    }

    #[test]
    fn test_stream_exception_and_bad_bytes() {
        let p = provider("meta.llama3-8b-instruct-v1:0");
        let chunk = br#"{"throttlingException":{"message":"Too many requests"}}"#;
        match p.parse_stream_response(chunk) {
            Err(ProviderError::ApiError(msg)) => {
                assert_eq!(msg, "throttlingException: Too many requests")
            }
            other => panic!("expected ApiError, got {other:?}"),
        }

        assert!(matches!(
            p.parse_stream_response(br#"{"bytes":"!!not base64!!"}"#),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_outbound_is_signed() {
        let p = provider("anthropic.claude-3-haiku-20240307-v1:0");
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let body = p.prepare_request(&Request::prompt("Hi")).unwrap();

        let request = p.outbound_at(body.clone(), false, now).unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.headers["host"], "bedrock-runtime.us-east-1.amazonaws.com");
        assert_eq!(request.headers["x-amz-date"], "20240101T000000Z");
        let auth = request.headers["authorization"].to_str().unwrap();
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/us-east-1/bedrock/aws4_request"
        ));

        let again = p.outbound_at(body, false, now).unwrap();
        assert_eq!(again.headers["authorization"], request.headers["authorization"]);

        let streaming = p.outbound_at(Vec::new(), true, now).unwrap();
        assert!(streaming.url.ends_with("/invoke-with-response-stream"));
    }

    #[test]
    fn test_missing_secret_is_reported() {
        let mut creds = credentials();
        creds.secret_access_key = SecretString::from(String::new());
        let p = BedrockProvider::new(creds, "amazon.titan-text-express-v1", HeaderMap::new());
        assert!(matches!(
            p.outbound(b"{}".to_vec(), false),
            Err(ProviderError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_from_credential_requires_aws() {
        let result = BedrockProvider::from_credential(
            Credential::api_key("k"),
            "amazon.titan-text-express-v1",
            HeaderMap::new(),
        );
        assert!(matches!(result, Err(ProviderError::MissingCredentials(_))));
    }
}
