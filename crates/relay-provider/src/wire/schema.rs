//! Response-schema helpers: strict-mode cleaning for native structured output
//! and instruction text for shapes that have no native field.

use crate::error::ProviderError;
use crate::types::{Input, Message, Request};
use serde_json::{Map, Value};

/// Keywords kept by [`clean_schema`]. Everything else is dropped.
const SUPPORTED_KEYWORDS: &[&str] = &[
    "type",
    "properties",
    "required",
    "items",
    "enum",
    "const",
    "description",
    "anyOf",
    "$ref",
    "$defs",
    "definitions",
];

/// A schema reduced to the keywords strict structured output accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSchema {
    pub schema: Value,
    /// JSON-pointer-like paths of every keyword that was removed.
    pub dropped: Vec<String>,
}

/// Drop unsupported keywords and force `additionalProperties: false` on every
/// object schema.
pub fn clean_schema(schema: &Value) -> CleanedSchema {
    let mut dropped = Vec::new();
    let schema = clean_node(schema, "", &mut dropped);
    CleanedSchema { schema, dropped }
}

fn clean_node(node: &Value, path: &str, dropped: &mut Vec<String>) -> Value {
    let Value::Object(map) = node else {
        return node.clone();
    };

    let mut out = Map::new();
    for (key, value) in map {
        let here = format!("{path}/{key}");
        match key.as_str() {
            "properties" | "$defs" | "definitions" => {
                let children = match value {
                    Value::Object(children) => children
                        .iter()
                        .map(|(name, child)| {
                            (name.clone(), clean_node(child, &format!("{here}/{name}"), dropped))
                        })
                        .collect(),
                    _ => Map::new(),
                };
                out.insert(key.clone(), Value::Object(children));
            }
            "items" => {
                out.insert(key.clone(), clean_node(value, &here, dropped));
            }
            "anyOf" => {
                let variants = match value {
                    Value::Array(items) => items
                        .iter()
                        .enumerate()
                        .map(|(i, v)| clean_node(v, &format!("{here}/{i}"), dropped))
                        .collect(),
                    other => vec![other.clone()],
                };
                out.insert(key.clone(), Value::Array(variants));
            }
            // Forced below for object schemas.
            "additionalProperties" => {}
            k if SUPPORTED_KEYWORDS.contains(&k) => {
                out.insert(key.clone(), value.clone());
            }
            _ => dropped.push(here),
        }
    }

    let is_object = out.get("type").and_then(Value::as_str) == Some("object")
        || out.contains_key("properties");
    if is_object {
        out.insert("additionalProperties".to_string(), Value::Bool(false));
    }
    Value::Object(out)
}

/// Instruction text asking the model to answer in the given schema.
pub fn schema_instruction(schema: &Value) -> Result<String, ProviderError> {
    Ok(format!(
        "\n\nRespond only with a JSON value that conforms to this JSON schema:\n{}",
        serde_json::to_string_pretty(schema)?
    ))
}

/// A copy of `request` with the schema instruction appended to the prompt,
/// or to the last user message of a conversation.
pub fn embed_schema(request: &Request, schema: &Value) -> Result<Request, ProviderError> {
    let instruction = schema_instruction(schema)?;
    let mut embedded = request.clone();
    embedded.schema = None;

    match &mut embedded.input {
        Input::Prompt(prompt) => prompt.push_str(&instruction),
        Input::Messages(messages) => {
            match messages.iter().rposition(|m| m.role == "user") {
                Some(i) => messages[i].content.push_str(&instruction),
                None => messages.push(Message::user(instruction.trim_start())),
            }
        }
    }
    Ok(embedded)
}
