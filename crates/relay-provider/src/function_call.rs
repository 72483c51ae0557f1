//! Tag-delimited function calls embedded in free text.
//!
//! Any parsed response may carry structured calls as
//! `<function_call>{"name": ..., "arguments": {...}}</function_call>` spans.
//! The grammar is vendor-independent; adapters that receive native tool calls
//! render them in this form so callers see one convention.

use crate::error::ProviderError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const OPEN_TAG: &str = "<function_call>";
pub const CLOSE_TAG: &str = "</function_call>";

static SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<function_call>(.*?)</function_call>").expect("static regex")
});

/// A structured tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Text with its function-call spans removed.
#[derive(Debug)]
pub struct CleanedResponse {
    /// Surrounding text, concatenated verbatim.
    pub text: String,
    /// One entry per removed span, in document order.
    pub calls: Vec<Result<FunctionCall, ProviderError>>,
}

/// Parse every span independently. A malformed span does not affect the others.
pub fn function_calls(text: &str) -> Vec<Result<FunctionCall, ProviderError>> {
    SPAN.captures_iter(text)
        .map(|caps| parse_span(&caps[1]))
        .collect()
}

/// All calls in `text`, failing on the first malformed span.
pub fn extract_function_calls(text: &str) -> Result<Vec<FunctionCall>, ProviderError> {
    function_calls(text).into_iter().collect()
}

/// Remove all spans from `text`, collecting what they contained.
pub fn clean_response(text: &str) -> CleanedResponse {
    let mut cleaned = String::with_capacity(text.len());
    let mut calls = Vec::new();
    let mut last = 0;

    for caps in SPAN.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        cleaned.push_str(&text[last..whole.start()]);
        calls.push(parse_span(&caps[1]));
        last = whole.end();
    }
    cleaned.push_str(&text[last..]);

    CleanedResponse {
        text: cleaned,
        calls,
    }
}

/// Render a call in the tagged form.
///
/// String arguments holding a JSON object are decoded first so the span never
/// carries double-encoded arguments.
pub fn format_function_call(name: &str, arguments: &Value) -> Result<String, ProviderError> {
    let arguments = decode_string_arguments(arguments.clone());
    let payload = serde_json::to_string(&json!({
        "name": name,
        "arguments": arguments,
    }))?;
    Ok(format!("{OPEN_TAG}{payload}{CLOSE_TAG}"))
}

fn parse_span(raw: &str) -> Result<FunctionCall, ProviderError> {
    let mut call: FunctionCall = serde_json::from_str(raw.trim())
        .map_err(|e| ProviderError::FunctionCallParse(format!("{e}: {}", raw.trim())))?;
    call.arguments = decode_string_arguments(call.arguments);
    Ok(call)
}

/// A string holding a JSON object becomes that object; any other value,
/// including strings that merely look like JSON scalars or arrays, is kept.
fn decode_string_arguments(arguments: Value) -> Value {
    if let Value::String(s) = &arguments {
        if let Ok(decoded @ Value::Object(_)) = serde_json::from_str::<Value>(s) {
            return decoded;
        }
    }
    arguments
}
