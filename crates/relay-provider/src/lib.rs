//! relay-provider: canonical LLM request model and vendor wire-format adapters.
//!
//! Adapters translate a [`Request`] into a vendor's request body and the
//! vendor's response or stream chunks back into text. Transport is left to
//! the caller; [`Provider::outbound`] yields a ready-to-send (and, for the
//! Bedrock gateway, signed) [`OutboundRequest`].

pub mod config;
mod error;
pub mod function_call;
pub mod options;
pub mod providers;
pub mod registry;
pub mod signing;
pub mod stream;
pub mod traits;
pub mod types;
pub mod wire;

pub use config::{ProviderConfig, WireFormat};
pub use error::ProviderError;
pub use function_call::{clean_response, extract_function_calls, CleanedResponse, FunctionCall};
pub use options::{GenerationDefaults, Options};
pub use providers::{BedrockProvider, GenericProvider, ModelFamily};
pub use registry::{Constructor, Registry};
pub use stream::{decode_stream, DecodeStream, StreamChunk};
pub use traits::{prepare, Provider};
pub use types::{
    AwsCredentials, Credential, Input, Message, OutboundRequest, Request, ToolChoice,
    ToolDefinition,
};
