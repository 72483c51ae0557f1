//! Canonical request, message and credential types consumed by every adapter.

use crate::options::Options;
use http::{HeaderMap, Method};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A conversation message in provider-independent form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role (system, user, assistant, tool, ...). Passed through as-is.
    pub role: String,
    /// Text content.
    pub content: String,
    /// Cache hint (e.g. "ephemeral") for shapes that support prompt caching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    /// Caller-defined metadata. Never sent upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            cache_control: None,
            metadata: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new("tool", content)
    }

    pub fn with_cache_control(mut self, hint: impl Into<String>) -> Self {
        self.cache_control = Some(hint.into());
        self
    }
}

/// Tool definition declared to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: Value,
}

/// How the model should pick among declared tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function(String),
}

/// What the model is asked to continue: a bare prompt or a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Prompt(String),
    Messages(Vec<Message>),
}

impl Default for Input {
    fn default() -> Self {
        Input::Prompt(String::new())
    }
}

/// Provider-agnostic request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub input: Input,
    pub system: Option<String>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: Option<ToolChoice>,
    /// JSON Schema the response should conform to.
    pub schema: Option<Value>,
    /// Per-call option overrides.
    pub options: Options,
}

impl Request {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            input: Input::Prompt(text.into()),
            ..Default::default()
        }
    }

    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            input: Input::Messages(messages),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.set(key, value);
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Same request, conversation replaced by `messages`.
    pub fn with_messages(&self, messages: &[Message]) -> Self {
        Self {
            input: Input::Messages(messages.to_vec()),
            ..self.clone()
        }
    }
}

/// AWS-style key material plus the region it is scoped to.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
    pub region: String,
}

/// Pre-resolved credential handed to an adapter constructor.
#[derive(Debug, Clone, Default)]
pub enum Credential {
    /// No authentication (local servers).
    #[default]
    None,
    /// Bearer-style API key.
    ApiKey(SecretString),
    /// Request-signing credentials.
    Aws(AwsCredentials),
}

impl Credential {
    pub fn api_key(key: impl Into<String>) -> Self {
        Credential::ApiKey(SecretString::from(key.into()))
    }

    pub fn as_api_key(&self) -> Option<&SecretString> {
        match self {
            Credential::ApiKey(key) => Some(key),
            _ => None,
        }
    }
}

/// A fully prepared request, ready for an external transport to send.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let msg = Message::user("hi").with_cache_control("ephemeral");
        assert_eq!(msg.role, "user");
        assert_eq!(msg.cache_control.as_deref(), Some("ephemeral"));
        assert_eq!(Message::tool("x").role, "tool");
    }

    #[test]
    fn test_with_messages_keeps_other_fields() {
        let req = Request::prompt("ignored")
            .with_system("sys")
            .with_option("temperature", 0.3);
        let swapped = req.with_messages(&[Message::user("hello")]);
        assert_eq!(swapped.system.as_deref(), Some("sys"));
        assert_eq!(swapped.options.temperature(), Some(0.3));
        assert_eq!(swapped.input, Input::Messages(vec![Message::user("hello")]));
    }

    #[test]
    fn test_tool_choice_serde() {
        let json = serde_json::to_string(&ToolChoice::Function("search".to_string())).unwrap();
        assert_eq!(json, r#"{"function":"search"}"#);
        let auto: ToolChoice = serde_json::from_str(r#""auto""#).unwrap();
        assert_eq!(auto, ToolChoice::Auto);
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let cred = Credential::api_key("sk-very-secret");
        let debug = format!("{cred:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(cred.as_api_key().is_some());
    }
}
