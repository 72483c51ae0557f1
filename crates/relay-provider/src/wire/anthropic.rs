//! Anthropic Messages shape.
//!
//! Also used for Claude models behind the Bedrock gateway, which accept the
//! same message list with a different envelope.

use crate::error::ProviderError;
use crate::function_call::format_function_call;
use crate::options::{Options, MAX_TOKENS, SEED, STREAM};
use crate::stream::StreamChunk;
use crate::types::{Input, Message, Request, ToolChoice, ToolDefinition};
use crate::wire::{frame, Frame};
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub const DEFAULT_MAX_TOKENS: u64 = 1024;
pub const MESSAGE_STOP: &str = "message_stop";

/// Body keys that options may not overwrite.
const RESERVED: &[&str] = &["model", "messages", "system", "tools", "tool_choice", MAX_TOKENS];

/// Options the Messages API does not accept.
const UNSUPPORTED: &[&str] = &[SEED];

/// Build the JSON request body.
///
/// `max_tokens` comes from the per-call options, then the adapter defaults,
/// then [`DEFAULT_MAX_TOKENS`].
pub fn build_body(model: &str, request: &Request, defaults: &Options, stream: bool) -> Value {
    let merged = defaults.merged(&request.options);
    let (messages, system) = convert_messages(request);

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert("messages".to_string(), Value::Array(messages));
    body.insert(
        MAX_TOKENS.to_string(),
        json!(merged.max_tokens().unwrap_or(DEFAULT_MAX_TOKENS)),
    );

    for (key, value) in merged.into_map() {
        if UNSUPPORTED.contains(&key.as_str()) {
            tracing::debug!(option = %key, "Dropping option unsupported by the Messages API");
        } else if !RESERVED.contains(&key.as_str()) {
            body.insert(key, value);
        }
    }
    if stream {
        body.insert(STREAM.to_string(), json!(true));
    } else {
        body.remove(STREAM);
    }

    if let Some(system) = system {
        body.insert("system".to_string(), json!(system));
    }
    if !request.tools.is_empty() {
        body.insert("tools".to_string(), convert_tools(&request.tools));
    }
    if let Some(choice) = &request.tool_choice {
        body.insert("tool_choice".to_string(), convert_tool_choice(choice));
    }

    Value::Object(body)
}

/// Messages in Anthropic form plus the effective system instruction.
///
/// System-role entries are folded into the system instruction; Anthropic only
/// accepts user and assistant turns in the message list.
pub fn convert_messages(request: &Request) -> (Vec<Value>, Option<String>) {
    let mut system_parts: Vec<&str> = request.system.iter().map(String::as_str).collect();
    let mut messages = Vec::new();

    match &request.input {
        Input::Prompt(prompt) => {
            messages.push(json!({"role": "user", "content": prompt}));
        }
        Input::Messages(list) => {
            for msg in list {
                if msg.role == "system" {
                    system_parts.push(&msg.content);
                    continue;
                }
                messages.push(convert_message(msg));
            }
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (messages, system)
}

fn convert_message(msg: &Message) -> Value {
    // Tool results are sent as user messages
    let role = match msg.role.as_str() {
        "tool" => "user",
        other => other,
    };

    match &msg.cache_control {
        Some(hint) => json!({
            "role": role,
            "content": [{
                "type": "text",
                "text": msg.content,
                "cache_control": {"type": hint},
            }],
        }),
        None => json!({"role": role, "content": msg.content}),
    }
}

pub fn convert_tools(tools: &[ToolDefinition]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect(),
    )
}

pub fn convert_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({"type": "auto"}),
        ToolChoice::None => json!({"type": "none"}),
        ToolChoice::Required => json!({"type": "any"}),
        ToolChoice::Function(name) => json!({"type": "tool", "name": name}),
    }
}

/// Concatenate text blocks; `tool_use` blocks become `<function_call>` spans.
pub fn parse_response(body: &[u8]) -> Result<String, ProviderError> {
    let resp: AnthropicResponse =
        serde_json::from_slice(body).map_err(ProviderError::malformed)?;

    if let Some(error) = resp.error {
        return Err(ProviderError::ApiError(error.message));
    }

    let blocks = resp.content.unwrap_or_default();
    if blocks.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let mut text = String::new();
    for block in blocks {
        match block {
            ContentBlock::Text { text: part } => text.push_str(&part),
            ContentBlock::ToolUse { name, input } => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&format_function_call(&name, &input)?);
            }
            ContentBlock::Other => {}
        }
    }
    if text.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(text)
}

/// Decode one SSE line.
pub fn parse_chunk(chunk: &[u8]) -> Result<StreamChunk, ProviderError> {
    match frame(chunk) {
        Frame::Empty => Ok(StreamChunk::Skip),
        Frame::Event(name) if name == MESSAGE_STOP => Ok(StreamChunk::End),
        Frame::Event(_) => Ok(StreamChunk::Skip),
        Frame::Data(data) => {
            let event: AnthropicEvent =
                serde_json::from_str(&data).map_err(ProviderError::malformed)?;
            decode_event(event)
        }
    }
}

/// Decode an already-parsed event object.
pub fn parse_event(value: Value) -> Result<StreamChunk, ProviderError> {
    let event: AnthropicEvent = serde_json::from_value(value).map_err(ProviderError::malformed)?;
    decode_event(event)
}

fn decode_event(event: AnthropicEvent) -> Result<StreamChunk, ProviderError> {
    match event {
        AnthropicEvent::ContentBlockDelta {
            delta: Delta::Text { text },
        } if !text.is_empty() => Ok(StreamChunk::Token(text)),
        AnthropicEvent::MessageStop => Ok(StreamChunk::End),
        AnthropicEvent::Error { error } => Err(ProviderError::ApiError(format!(
            "{}: {}",
            error.error_type, error.message
        ))),
        _ => Ok(StreamChunk::Skip),
    }
}

// ──────────────────────────────────────────────────────────
// Anthropic wire types (internal)
// ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Option<Vec<ContentBlock>>,
    #[serde(default)]
    error: Option<ErrorData>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text {
        #[serde(default)]
        text: String,
    },

    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },

    #[serde(other)]
    Other,
}

/// Top-level SSE event from the Messages API.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: Delta },

    #[serde(rename = "message_stop")]
    MessageStop,

    #[serde(rename = "error")]
    Error { error: ErrorData },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Delta {
    #[serde(rename = "text_delta")]
    Text { text: String },

    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

// ──────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────
