//! relay-core: configuration, credential resolution and adapter sessions.

pub mod config;
pub mod credentials;
mod error;
pub mod session;
pub mod validate;

pub use config::{AwsConfig, Config, ConfigStore};
pub use credentials::CredentialKind;
pub use error::RelayError;
pub use session::Session;
pub use validate::{validate_output, DEFAULT_VALIDATION_RETRIES};
