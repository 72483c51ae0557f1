//! Adapter implementations.

pub mod bedrock;
pub mod generic;

pub use bedrock::{BedrockProvider, ModelFamily};
pub use generic::GenericProvider;
