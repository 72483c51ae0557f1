//! OpenAI chat-completions shape.
//!
//! Used by OpenAI itself and the many services that copy its API (Groq,
//! Mistral, DeepSeek, OpenRouter, Ollama, ...).

use crate::error::ProviderError;
use crate::function_call::format_function_call;
use crate::options::{Options, STREAM};
use crate::stream::StreamChunk;
use crate::types::{Input, Request, ToolChoice, ToolDefinition};
use crate::wire::schema::clean_schema;
use crate::wire::{frame, Frame};
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub const DONE_MARKER: &str = "[DONE]";
pub const SCHEMA_NAME: &str = "structured_response";
pub const FORMAT_FUNCTION: &str = "format_output";

/// Body keys that options may not overwrite.
const RESERVED: &[&str] = &["model", "messages", "tools", "tool_choice"];

/// Build the JSON request body.
///
/// Precedence: adapter defaults, then per-call options, then the explicit
/// tools / tool choice fields.
pub fn build_body(model: &str, request: &Request, defaults: &Options, stream: bool) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert("messages".to_string(), Value::Array(convert_messages(request)));

    for (key, value) in defaults.merged(&request.options).into_map() {
        if !RESERVED.contains(&key.as_str()) {
            body.insert(key, value);
        }
    }
    if stream {
        body.insert(STREAM.to_string(), json!(true));
    } else {
        body.remove(STREAM);
    }

    if !request.tools.is_empty() {
        body.insert(
            "tools".to_string(),
            Value::Array(request.tools.iter().map(convert_tool).collect()),
        );
    }
    if let Some(choice) = &request.tool_choice {
        body.insert("tool_choice".to_string(), convert_tool_choice(choice));
    }

    Value::Object(body)
}

/// Attach a native structured-output directive and the synthetic formatting
/// function to an already-built body.
pub fn attach_schema(body: &mut Value, schema: &Value) {
    let cleaned = clean_schema(schema);
    for path in &cleaned.dropped {
        tracing::warn!(keyword = %path, "dropping JSON schema keyword unsupported by strict structured output");
    }

    body["response_format"] = json!({
        "type": "json_schema",
        "json_schema": {
            "name": SCHEMA_NAME,
            "schema": cleaned.schema,
            "strict": true,
        }
    });

    let format_tool = json!({
        "type": "function",
        "function": {
            "name": FORMAT_FUNCTION,
            "description": "Format the final answer so it matches the response schema",
            "parameters": cleaned.schema,
        }
    });
    match body.get_mut("tools").and_then(Value::as_array_mut) {
        Some(tools) => tools.push(format_tool),
        None => body["tools"] = json!([format_tool]),
    }
}

/// Convert the request input to OpenAI messages; the system instruction
/// becomes a leading system message.
fn convert_messages(request: &Request) -> Vec<Value> {
    let mut messages = Vec::new();

    if let Some(system) = &request.system {
        messages.push(json!({"role": "system", "content": system}));
    }

    match &request.input {
        Input::Prompt(prompt) => {
            messages.push(json!({"role": "user", "content": prompt}));
        }
        Input::Messages(list) => {
            for msg in list {
                messages.push(json!({"role": msg.role, "content": msg.content}));
            }
        }
    }

    messages
}

fn convert_tool(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn convert_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({
            "type": "function",
            "function": {"name": name},
        }),
    }
}

/// Read text, or tool calls rendered as `<function_call>` spans.
pub fn parse_response(body: &[u8]) -> Result<String, ProviderError> {
    let resp: OpenAiResponse = serde_json::from_slice(body).map_err(ProviderError::malformed)?;

    if let Some(error) = resp.error {
        return Err(ProviderError::ApiError(error.message));
    }

    let choice = resp.choices.first().ok_or(ProviderError::EmptyResponse)?;
    let message = &choice.message;

    if let Some(content) = message.content.as_deref().filter(|c| !c.is_empty()) {
        return Ok(content.to_string());
    }

    if message.tool_calls.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let mut calls = Vec::with_capacity(message.tool_calls.len());
    for call in &message.tool_calls {
        let raw = call.function.arguments.trim();
        let arguments: Value = if raw.is_empty() {
            json!({})
        } else {
            serde_json::from_str(raw).map_err(|e| {
                ProviderError::FunctionCallParse(format!(
                    "arguments of '{}': {e}",
                    call.function.name
                ))
            })?
        };
        calls.push(format_function_call(&call.function.name, &arguments)?);
    }
    Ok(calls.join("\n"))
}

/// Decode one SSE line.
///
/// Tool-call argument fragments are not decoded here: they only become valid
/// JSON once every fragment has arrived.
pub fn parse_chunk(chunk: &[u8]) -> Result<StreamChunk, ProviderError> {
    let data = match frame(chunk) {
        Frame::Data(data) => data,
        Frame::Event(_) | Frame::Empty => return Ok(StreamChunk::Skip),
    };

    if data == DONE_MARKER {
        return Ok(StreamChunk::End);
    }

    let chunk: OpenAiChunk = serde_json::from_str(&data).map_err(ProviderError::malformed)?;
    if let Some(error) = chunk.error {
        return Err(ProviderError::ApiError(error.message));
    }

    let token = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty());

    Ok(match token {
        Some(text) => StreamChunk::Token(text),
        None => StreamChunk::Skip,
    })
}

// -- OpenAI response types for deserialization --

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiResponseChoice>,
    #[serde(default)]
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiChunk {
    #[serde(default)]
    choices: Vec<OpenAiChunkChoice>,
    #[serde(default)]
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChunkChoice {
    #[serde(default)]
    delta: OpenAiDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}
