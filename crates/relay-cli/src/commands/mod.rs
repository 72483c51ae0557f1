//! Command implementations.

pub mod decode;
pub mod prepare;
pub mod providers;
pub mod send;

use crate::cli::RequestArgs;
use anyhow::Context;
use relay_core::credentials;
use relay_core::Session;
use relay_provider::{clean_response, Message, Provider, Request, ToolChoice, ToolDefinition};
use serde_json::Value;
use std::path::Path;

/// Build the canonical request described by the command-line arguments.
pub fn build_request(args: &RequestArgs) -> anyhow::Result<Request> {
    let mut request = match (&args.messages, &args.prompt) {
        (Some(path), _) => {
            let messages: Vec<Message> = read_json(path)?;
            Request::messages(messages)
        }
        (None, Some(prompt)) => Request::prompt(prompt.as_str()),
        (None, None) => anyhow::bail!("a prompt or --messages is required"),
    };

    if let Some(system) = &args.system {
        request = request.with_system(system.as_str());
    }
    if let Some(path) = &args.tools {
        let tools: Vec<ToolDefinition> = read_json(path)?;
        request = request.with_tools(tools);
    }
    if let Some(choice) = &args.tool_choice {
        request = request.with_tool_choice(parse_tool_choice(choice));
    }
    if let Some(path) = &args.schema {
        request = request.with_schema(read_json(path)?);
    }
    for raw in &args.options {
        let (key, value) = parse_option(raw)?;
        request = request.with_option(key, value);
    }
    if args.stream {
        request = request.with_option(relay_provider::options::STREAM, true);
    }
    Ok(request)
}

/// Split `key=value`; the value is JSON when it parses as JSON, a string
/// otherwise.
pub fn parse_option(raw: &str) -> anyhow::Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("option '{raw}' is not in key=value form"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("option '{raw}' has an empty key");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub fn parse_tool_choice(raw: &str) -> ToolChoice {
    match raw {
        "auto" => ToolChoice::Auto,
        "none" => ToolChoice::None,
        "required" | "any" => ToolChoice::Required,
        name => ToolChoice::Function(name.to_string()),
    }
}

/// Adapter for offline work (decoding saved output); no credentials needed.
pub fn offline_provider(
    session: &Session,
    name: Option<&str>,
    model: Option<&str>,
) -> anyhow::Result<Box<dyn Provider>> {
    let name = name.unwrap_or(session.config().provider.as_str());
    let credential = credentials::placeholder(session.credential_kind(name), session.config());
    Ok(session.provider_with(name, model, credential)?)
}

/// Print response text with function-call spans pulled out.
pub fn print_text(text: &str) {
    let cleaned = clean_response(text);
    let remaining = cleaned.text.trim();
    if !remaining.is_empty() {
        println!("{remaining}");
    }
    for call in cleaned.calls {
        match call {
            Ok(call) => println!("function_call: {}({})", call.name, call.arguments),
            Err(e) => tracing::warn!(error = %e, "Skipping malformed function call"),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}
